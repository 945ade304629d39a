//! Write-option models, destination spec and crate error types.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use crate::util::{is_existing_dir, make_dir_all_with_mode, resolve_dir_mode};

////////////////////////////////////////////////////////////////////////////////
// #region EnumsInit

/// Pattern interpretation mode for ignore-predicate compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumIgnorePatternMode {
    /// Shell-like wildcards (`*`, `?`, character classes).
    Glob,
    /// Regular expression pattern.
    Regex,
    /// Plain substring match.
    Literal,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region StructsAndErrors

/// Flags controlling [`crate::copy::create_file`].
///
/// Each flag is independent; the default applies none of them, so a plain
/// create-truncate-write with the platform's default creation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpecWriteOptions {
    /// Apply the descriptor's permission bits to the destination.
    pub if_set_permissions: bool,
    /// Set the destination's access/modification time to the descriptor's mtime.
    pub if_set_times: bool,
    /// Force a durability flush (`sync_all`) before the handle is closed.
    pub if_sync: bool,
}

impl SpecWriteOptions {
    /// Propagate permissions and timestamps, without the durability flush.
    pub const PRESERVE_ALL: Self = Self {
        if_set_permissions: true,
        if_set_times: true,
        if_sync: false,
    };
}

/// Relative placement of a source's output under a copy-tree root.
///
/// An empty fragment means "directly at the root"; path-backed sources fall
/// back to their own file name in that case.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecDestination {
    /// Relative path fragment joined onto the destination root.
    pub path_rel: PathBuf,
}

impl SpecDestination {
    /// Build a destination spec from a relative path fragment.
    pub fn new<P: Into<PathBuf>>(path_rel: P) -> Self {
        Self {
            path_rel: path_rel.into(),
        }
    }

    /// True when no fragment was supplied.
    pub fn is_empty(&self) -> bool {
        self.path_rel.as_os_str().is_empty()
    }

    /// Join the fragment onto `path_dir_dst` and return the full destination
    /// path, creating any missing parent directories first.
    ///
    /// Missing parents are created with the mode resolved from the nearest
    /// existing ancestor directory.
    pub fn check(&self, path_dir_dst: &Path) -> Result<PathBuf, CopyError> {
        let path_dst = path_dir_dst.join(&self.path_rel);
        if let Some(path_parent) = path_dst.parent() {
            if !path_parent.as_os_str().is_empty() && !is_existing_dir(path_parent) {
                let mode_dir = resolve_dir_mode(path_parent).map_err(|e| CopyError::CreateDir {
                    path: path_parent.to_path_buf(),
                    source: e,
                })?;
                make_dir_all_with_mode(path_parent, mode_dir).map_err(|e| CopyError::CreateDir {
                    path: path_parent.to_path_buf(),
                    source: e,
                })?;
            }
        }
        Ok(path_dst)
    }
}

/// Errors raised by copy/write primitives and the tree copier.
///
/// The first error encountered is returned immediately; composite operations
/// wrap it with positional or path context and abandon the rest of the run.
#[derive(Debug)]
pub enum CopyError {
    /// Failed to stat the source path (missing, permission, ...).
    SourceStat {
        /// Source path that failed to stat.
        path: PathBuf,
        /// Underlying IO error; its kind distinguishes not-found from denied.
        source: io::Error,
    },
    /// Failed to stat an existing destination path.
    DestinationStat {
        /// Destination path that failed to stat.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Source is not a regular file (directory, symlink, device, ...).
    NonRegularSource(PathBuf),
    /// Existing destination is not a regular file.
    NonRegularDestination(PathBuf),
    /// Directory source path is not a directory.
    SourceNotDirectory(PathBuf),
    /// Failed to open or read source bytes.
    Read {
        /// Source path that failed.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Failed to create, write or flush the destination file.
    Write {
        /// Destination path that failed.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Failed to create a destination directory.
    CreateDir {
        /// Directory path that failed creation.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Failed to propagate timestamps or permissions.
    SetInfo {
        /// Destination path whose metadata update failed.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Failed to enumerate a directory during tree walk.
    Walk {
        /// Directory whose enumeration failed.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Invalid ignore pattern (glob or regex compile failure).
    InvalidPattern(String),
    /// Source requires a destination fragment but none was supplied.
    InvalidDestination(String),
    /// A tree-copy source failed; `index` is its zero-based list position.
    Source {
        /// Position of the failing source in the `copy_tree` list.
        index: usize,
        /// The source's own failure.
        source: Box<CopyError>,
    },
}

impl fmt::Display for CopyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceStat { path, source } => {
                write!(f, "Failed to stat source {} ({source})", path.display())
            }
            Self::DestinationStat { path, source } => {
                write!(
                    f,
                    "Failed to stat destination {} ({source})",
                    path.display()
                )
            }
            Self::NonRegularSource(path) => {
                write!(f, "Non-regular source file: {}", path.display())
            }
            Self::NonRegularDestination(path) => {
                write!(f, "Non-regular destination file: {}", path.display())
            }
            Self::SourceNotDirectory(path) => {
                write!(f, "Source is not a directory: {}", path.display())
            }
            Self::Read { path, source } => {
                write!(f, "Failed to read {} ({source})", path.display())
            }
            Self::Write { path, source } => {
                write!(f, "Failed to write {} ({source})", path.display())
            }
            Self::CreateDir { path, source } => {
                write!(
                    f,
                    "Failed to create directory {} ({source})",
                    path.display()
                )
            }
            Self::SetInfo { path, source } => {
                write!(
                    f,
                    "Failed to set file info on {} ({source})",
                    path.display()
                )
            }
            Self::Walk { path, source } => {
                write!(f, "Failed to walk directory {} ({source})", path.display())
            }
            Self::InvalidPattern(msg) => write!(f, "{msg}"),
            Self::InvalidDestination(msg) => write!(f, "{msg}"),
            Self::Source { index, source } => write!(f, "source #{index}: {source}"),
        }
    }
}

impl std::error::Error for CopyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::SourceStat { source, .. }
            | Self::DestinationStat { source, .. }
            | Self::Read { source, .. }
            | Self::Write { source, .. }
            | Self::CreateDir { source, .. }
            | Self::SetInfo { source, .. }
            | Self::Walk { source, .. } => Some(source),
            Self::Source { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{CopyError, SpecWriteOptions};

    #[test]
    fn write_options_default_applies_nothing() {
        let spec_wr_options = SpecWriteOptions::default();
        assert!(!spec_wr_options.if_set_permissions);
        assert!(!spec_wr_options.if_set_times);
        assert!(!spec_wr_options.if_sync);

        let spec_wr_all = SpecWriteOptions::PRESERVE_ALL;
        assert!(spec_wr_all.if_set_permissions);
        assert!(spec_wr_all.if_set_times);
        assert!(!spec_wr_all.if_sync);
    }

    #[test]
    fn source_error_display_carries_index() {
        let err = CopyError::Source {
            index: 2,
            source: Box::new(CopyError::NonRegularSource("a/b".into())),
        };
        let text = err.to_string();
        assert!(text.starts_with("source #2:"), "unexpected text: {text}");
    }
}
