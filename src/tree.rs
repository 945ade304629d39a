//! Copy sources and tree-copy orchestration.

use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use globset::Glob;
use regex::Regex;

use crate::copy::{copy_bytes, copy_file, copy_reader, set_file_info};
use crate::spec::{CopyError, EnumIgnorePatternMode, SpecDestination};
use crate::util::{is_existing_dir, make_dir_all_with_mode, resolve_dir_mode};

/// Exclude decision over an entry's relative path; `true` excludes the entry
/// (and, for a directory, its entire subtree).
pub type IgnorePredicate = Box<dyn Fn(&str) -> bool>;

/// Anything that can copy itself into a destination root.
pub trait Copier {
    /// Copy this source's content under `path_dir_dst`.
    ///
    /// Sources are meant to be consumed by a single invocation; no reuse
    /// guarantee is made afterwards.
    fn copy_to(&mut self, path_dir_dst: &Path) -> Result<(), CopyError>;
}

/// A [`Copier`] backed by a path on disk.
pub trait Sourcer: Copier {
    /// The source path this copier reads from.
    fn src_path(&self) -> &Path;
}

/// Compile a pattern list into a single [`IgnorePredicate`].
///
/// The predicate is true when any pattern matches the relative path, under the
/// given interpretation mode. Invalid glob/regex patterns are rejected with
/// [`CopyError::InvalidPattern`].
pub fn compile_ignore_predicate(
    patterns: &[String],
    rule_pattern: EnumIgnorePatternMode,
) -> Result<IgnorePredicate, CopyError> {
    match rule_pattern {
        EnumIgnorePatternMode::Literal => {
            let l_literal = patterns.to_vec();
            Ok(Box::new(move |path_rel| {
                l_literal.iter().any(|p| path_rel.contains(p.as_str()))
            }))
        }
        EnumIgnorePatternMode::Glob => {
            let mut l_glob = Vec::with_capacity(patterns.len());
            for pattern in patterns {
                let matcher = Glob::new(pattern)
                    .map_err(|e| {
                        CopyError::InvalidPattern(format!("Invalid ignore pattern: {e}"))
                    })?
                    .compile_matcher();
                l_glob.push(matcher);
            }
            Ok(Box::new(move |path_rel| {
                l_glob.iter().any(|m| m.is_match(path_rel))
            }))
        }
        EnumIgnorePatternMode::Regex => {
            let mut l_regex = Vec::with_capacity(patterns.len());
            for pattern in patterns {
                let regex = Regex::new(pattern).map_err(|e| {
                    CopyError::InvalidPattern(format!("Invalid ignore pattern: {e}"))
                })?;
                l_regex.push(regex);
            }
            Ok(Box::new(move |path_rel| {
                l_regex.iter().any(|r| r.is_match(path_rel))
            }))
        }
    }
}

/// An existing regular file on disk.
///
/// An empty `dest` places the file at the root under its own file name. When a
/// descriptor is supplied its metadata is propagated after the copy.
#[derive(Debug, Default)]
pub struct SrcFile {
    /// Path of the file to copy.
    pub path_src: PathBuf,
    /// Optional descriptor template propagated onto the destination.
    pub stat: Option<fs::Metadata>,
    /// Placement under the destination root.
    pub dest: SpecDestination,
}

impl SrcFile {
    /// File source with no descriptor and default placement.
    pub fn new<P: Into<PathBuf>>(path_src: P) -> Self {
        Self {
            path_src: path_src.into(),
            stat: None,
            dest: SpecDestination::default(),
        }
    }
}

impl Copier for SrcFile {
    fn copy_to(&mut self, path_dir_dst: &Path) -> Result<(), CopyError> {
        let path_dst = if self.dest.is_empty() {
            let Some(name_file) = self.path_src.file_name() else {
                return Err(CopyError::InvalidDestination(format!(
                    "Source path has no file name: {}",
                    self.path_src.display()
                )));
            };
            SpecDestination::new(name_file).check(path_dir_dst)?
        } else {
            self.dest.check(path_dir_dst)?
        };

        copy_file(&self.path_src, &path_dst)?;
        if let Some(stat_ref) = &self.stat {
            set_file_info(&path_dst, stat_ref)?;
        }
        Ok(())
    }
}

impl Sourcer for SrcFile {
    fn src_path(&self) -> &Path {
        &self.path_src
    }
}

/// An in-memory byte buffer. `dest` is required.
#[derive(Default)]
pub struct SrcBytes {
    /// Bytes written to the destination.
    pub data: Vec<u8>,
    /// Optional descriptor template propagated onto the destination.
    pub stat: Option<fs::Metadata>,
    /// Placement under the destination root.
    pub dest: SpecDestination,
}

impl SrcBytes {
    /// Buffer source writing `data` at `dest`.
    pub fn new<D: Into<Vec<u8>>, P: Into<PathBuf>>(data: D, dest: P) -> Self {
        Self {
            data: data.into(),
            stat: None,
            dest: SpecDestination::new(dest),
        }
    }
}

impl fmt::Debug for SrcBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SrcBytes")
            .field("data", &self.data.len())
            .field("stat", &self.stat.is_some())
            .field("dest", &self.dest)
            .finish()
    }
}

impl Copier for SrcBytes {
    fn copy_to(&mut self, path_dir_dst: &Path) -> Result<(), CopyError> {
        if self.dest.is_empty() {
            return Err(CopyError::InvalidDestination(
                "Buffer source requires a destination fragment".to_string(),
            ));
        }
        let path_dst = self.dest.check(path_dir_dst)?;
        copy_bytes(&self.data, &path_dst)?;
        if let Some(stat_ref) = &self.stat {
            set_file_info(&path_dst, stat_ref)?;
        }
        Ok(())
    }
}

/// An arbitrary byte-producing reader. `dest` is required.
pub struct SrcReader<R: Read> {
    /// Reader drained into the destination.
    pub reader: R,
    /// Optional descriptor template propagated onto the destination.
    pub stat: Option<fs::Metadata>,
    /// Placement under the destination root.
    pub dest: SpecDestination,
}

impl<R: Read> SrcReader<R> {
    /// Reader source writing at `dest`.
    pub fn new<P: Into<PathBuf>>(reader: R, dest: P) -> Self {
        Self {
            reader,
            stat: None,
            dest: SpecDestination::new(dest),
        }
    }
}

impl<R: Read> fmt::Debug for SrcReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SrcReader")
            .field("stat", &self.stat.is_some())
            .field("dest", &self.dest)
            .finish_non_exhaustive()
    }
}

impl<R: Read> Copier for SrcReader<R> {
    fn copy_to(&mut self, path_dir_dst: &Path) -> Result<(), CopyError> {
        if self.dest.is_empty() {
            return Err(CopyError::InvalidDestination(
                "Reader source requires a destination fragment".to_string(),
            ));
        }
        let path_dst = self.dest.check(path_dir_dst)?;
        copy_reader(&mut self.reader, &path_dst)?;
        if let Some(stat_ref) = &self.stat {
            set_file_info(&path_dst, stat_ref)?;
        }
        Ok(())
    }
}

/// A directory tree, expanded recursively at copy time.
///
/// Entries whose relative path matches any ignore predicate are skipped,
/// directories without descent. Only regular files and directories are acted
/// upon; symlinks and special files are silently skipped.
pub struct SrcDir {
    /// Root of the tree to copy.
    pub path_src: PathBuf,
    /// Placement under the destination root.
    pub dest: SpecDestination,
    /// Exclude predicates over relative paths.
    pub ignore: Vec<IgnorePredicate>,
}

impl SrcDir {
    /// Directory source with no filters and default placement.
    pub fn new<P: Into<PathBuf>>(path_src: P) -> Self {
        Self {
            path_src: path_src.into(),
            dest: SpecDestination::default(),
            ignore: Vec::new(),
        }
    }
}

impl fmt::Debug for SrcDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SrcDir")
            .field("path_src", &self.path_src)
            .field("dest", &self.dest)
            .field("ignore", &self.ignore.len())
            .finish()
    }
}

impl Copier for SrcDir {
    fn copy_to(&mut self, path_dir_dst: &Path) -> Result<(), CopyError> {
        let stat_src = fs::metadata(&self.path_src).map_err(|e| CopyError::SourceStat {
            path: self.path_src.clone(),
            source: e,
        })?;
        if !stat_src.is_dir() {
            return Err(CopyError::SourceNotDirectory(self.path_src.clone()));
        }

        // One mode for every created directory, resolved from the source root.
        let mode_dir = resolve_dir_mode(&self.path_src).map_err(|e| CopyError::SourceStat {
            path: self.path_src.clone(),
            source: e,
        })?;

        let path_dst_root = if self.dest.is_empty() {
            path_dir_dst.to_path_buf()
        } else {
            path_dir_dst.join(&self.dest.path_rel)
        };
        make_dir_all_with_mode(&path_dst_root, mode_dir).map_err(|e| CopyError::CreateDir {
            path: path_dst_root.clone(),
            source: e,
        })?;

        walk_directory(
            &self.path_src,
            &self.path_src,
            &path_dst_root,
            mode_dir,
            &self.ignore,
        )
    }
}

impl Sourcer for SrcDir {
    fn src_path(&self) -> &Path {
        &self.path_src
    }
}

/// Depth-first walk copying `path_dir_cur` under `path_dir_dst`.
///
/// Children visit in raw `read_dir` order; the first error aborts the
/// remaining walk.
fn walk_directory(
    path_dir_cur: &Path,
    path_dir_src: &Path,
    path_dir_dst: &Path,
    mode_dir: Option<u32>,
    l_ignore: &[IgnorePredicate],
) -> Result<(), CopyError> {
    let iter_entries = fs::read_dir(path_dir_cur).map_err(|e| CopyError::Walk {
        path: path_dir_cur.to_path_buf(),
        source: e,
    })?;

    for entry_res in iter_entries {
        let entry = entry_res.map_err(|e| CopyError::Walk {
            path: path_dir_cur.to_path_buf(),
            source: e,
        })?;
        let path_entry = entry.path();

        let path_rel = match path_entry.strip_prefix(path_dir_src) {
            Ok(v) => v.to_path_buf(),
            Err(_) => continue,
        };
        let c_rel = path_rel.to_string_lossy();
        if l_ignore.iter().any(|f| f(&c_rel)) {
            continue;
        }

        let cfg_file_type = entry.file_type().map_err(|e| CopyError::Walk {
            path: path_entry.clone(),
            source: e,
        })?;
        let path_dst = path_dir_dst.join(&path_rel);

        if cfg_file_type.is_dir() {
            make_dir_all_with_mode(&path_dst, mode_dir).map_err(|e| CopyError::CreateDir {
                path: path_dst.clone(),
                source: e,
            })?;
            walk_directory(&path_entry, path_dir_src, path_dir_dst, mode_dir, l_ignore)?;
        } else if cfg_file_type.is_file() {
            copy_file(&path_entry, &path_dst)?;
        }
        // Symlinks, devices and sockets are skipped by policy.
    }
    Ok(())
}

/// Copy `sources` in order into `path_dir_dst`, creating the root if absent.
///
/// Stops at the first failing source and wraps its error with the zero-based
/// list index. Already-copied sources are not rolled back; later sources are
/// never attempted.
pub fn copy_tree<'a, P: AsRef<Path>>(
    path_dir_dst: P,
    sources: &mut [Box<dyn Copier + 'a>],
) -> Result<(), CopyError> {
    let path_dir_dst = path_dir_dst.as_ref();
    if !is_existing_dir(path_dir_dst) {
        fs::create_dir_all(path_dir_dst).map_err(|e| CopyError::CreateDir {
            path: path_dir_dst.to_path_buf(),
            source: e,
        })?;
    }

    for (n_index, spec_source) in sources.iter_mut().enumerate() {
        spec_source
            .copy_to(path_dir_dst)
            .map_err(|e| CopyError::Source {
                index: n_index,
                source: Box::new(e),
            })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Cursor;

    use filetime::FileTime;

    use super::{
        Copier, Sourcer, SrcBytes, SrcDir, SrcFile, SrcReader, compile_ignore_predicate,
        copy_tree,
    };
    use crate::spec::{CopyError, EnumIgnorePatternMode, SpecDestination};
    use crate::util::testutil::{TestDir, write_text};

    #[test]
    fn copy_tree_places_heterogeneous_sources() {
        let tmp = TestDir::new();
        let path_src_file = tmp.path().join("input.txt");
        write_text(&path_src_file, "from file");
        let dst = tmp.path().join("dst");

        let mut sources: Vec<Box<dyn Copier>> = vec![
            Box::new(SrcFile {
                path_src: path_src_file,
                stat: None,
                dest: SpecDestination::new("sub/renamed.txt"),
            }),
            Box::new(SrcBytes::new(&b"from bytes"[..], "data.bin")),
            Box::new(SrcReader::new(Cursor::new(b"from reader"), "deep/stream.txt")),
        ];

        copy_tree(&dst, &mut sources).expect("copy tree");
        assert_eq!(
            fs::read(dst.join("sub/renamed.txt")).expect("read file output"),
            b"from file"
        );
        assert_eq!(
            fs::read(dst.join("data.bin")).expect("read bytes output"),
            b"from bytes"
        );
        assert_eq!(
            fs::read(dst.join("deep/stream.txt")).expect("read reader output"),
            b"from reader"
        );
    }

    #[test]
    fn file_source_defaults_to_its_file_name() {
        let tmp = TestDir::new();
        let path_src = tmp.path().join("named.txt");
        write_text(&path_src, "x");
        let dst = tmp.path().join("dst");

        let mut sources: Vec<Box<dyn Copier>> = vec![Box::new(SrcFile::new(&path_src))];
        copy_tree(&dst, &mut sources).expect("copy tree");
        assert!(dst.join("named.txt").exists());
    }

    #[test]
    fn file_source_propagates_descriptor() {
        let tmp = TestDir::new();
        let path_src = tmp.path().join("src.txt");
        let path_tpl = tmp.path().join("template.txt");
        write_text(&path_src, "x");
        write_text(&path_tpl, "t");
        filetime::set_file_mtime(&path_tpl, FileTime::from_unix_time(1_000_000_000, 0))
            .expect("set mtime");
        let stat_tpl = fs::metadata(&path_tpl).expect("stat template");

        let dst = tmp.path().join("dst");
        let mut sources: Vec<Box<dyn Copier>> = vec![Box::new(SrcFile {
            path_src,
            stat: Some(stat_tpl.clone()),
            dest: SpecDestination::new("out.txt"),
        })];
        copy_tree(&dst, &mut sources).expect("copy tree");

        let stat_out = fs::metadata(dst.join("out.txt")).expect("stat output");
        assert_eq!(
            FileTime::from_last_modification_time(&stat_out),
            FileTime::from_last_modification_time(&stat_tpl)
        );
    }

    #[test]
    fn bytes_source_requires_destination() {
        let tmp = TestDir::new();
        let dst = tmp.path().join("dst");
        let mut sources: Vec<Box<dyn Copier>> = vec![Box::new(SrcBytes {
            data: b"x".to_vec(),
            stat: None,
            dest: SpecDestination::default(),
        })];

        let err = copy_tree(&dst, &mut sources).expect_err("must fail");
        match err {
            CopyError::Source { index, source } => {
                assert_eq!(index, 0);
                assert!(matches!(*source, CopyError::InvalidDestination(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn copy_tree_reports_first_failing_index_without_rollback() {
        let tmp = TestDir::new();
        let path_ok = tmp.path().join("ok.txt");
        let path_after = tmp.path().join("after.txt");
        write_text(&path_ok, "ok");
        write_text(&path_after, "after");
        let dst = tmp.path().join("dst");

        let mut sources: Vec<Box<dyn Copier>> = vec![
            Box::new(SrcFile::new(&path_ok)),
            Box::new(SrcFile::new(tmp.path().join("missing.txt"))),
            Box::new(SrcFile::new(&path_after)),
        ];

        let err = copy_tree(&dst, &mut sources).expect_err("must fail");
        match err {
            CopyError::Source { index, .. } => assert_eq!(index, 1),
            other => panic!("unexpected error: {other}"),
        }
        // S0 landed, S2 was never attempted.
        assert!(dst.join("ok.txt").exists());
        assert!(!dst.join("after.txt").exists());
    }

    #[test]
    fn dir_source_copies_full_tree() {
        let tmp = TestDir::new();
        let src = tmp.path().join("src");
        write_text(&src.join("root.txt"), "root");
        write_text(&src.join("a/one.txt"), "1");
        write_text(&src.join("a/two.txt"), "2");
        write_text(&src.join("b/sub/three.txt"), "3");
        let dst = tmp.path().join("dst");

        let mut sources: Vec<Box<dyn Copier>> = vec![Box::new(SrcDir::new(&src))];
        copy_tree(&dst, &mut sources).expect("copy tree");

        assert_eq!(fs::read(dst.join("root.txt")).expect("root"), b"root");
        assert_eq!(fs::read(dst.join("a/one.txt")).expect("one"), b"1");
        assert_eq!(fs::read(dst.join("a/two.txt")).expect("two"), b"2");
        assert_eq!(fs::read(dst.join("b/sub/three.txt")).expect("three"), b"3");
        assert!(dst.join("a").is_dir());
        assert!(dst.join("b/sub").is_dir());
    }

    #[test]
    fn dir_source_ignore_excludes_subtree() {
        let tmp = TestDir::new();
        let src = tmp.path().join("src");
        write_text(&src.join("keep.txt"), "keep");
        write_text(&src.join("skipdir/lost.txt"), "lost");
        write_text(&src.join("skip_file.txt"), "lost");
        let dst = tmp.path().join("dst");

        let mut spec_src_dir = SrcDir::new(&src);
        spec_src_dir
            .ignore
            .push(Box::new(|path_rel: &str| path_rel.starts_with("skip")));
        let mut sources: Vec<Box<dyn Copier>> = vec![Box::new(spec_src_dir)];
        copy_tree(&dst, &mut sources).expect("copy tree");

        assert!(dst.join("keep.txt").exists());
        assert!(!dst.join("skip_file.txt").exists());
        assert!(!dst.join("skipdir").exists());
    }

    #[test]
    fn dir_source_with_destination_remap() {
        let tmp = TestDir::new();
        let src = tmp.path().join("src");
        write_text(&src.join("a/file.txt"), "x");
        let dst = tmp.path().join("dst");

        let mut spec_src_dir = SrcDir::new(&src);
        spec_src_dir.dest = SpecDestination::new("vendored");
        let mut sources: Vec<Box<dyn Copier>> = vec![Box::new(spec_src_dir)];
        copy_tree(&dst, &mut sources).expect("copy tree");

        assert_eq!(fs::read(dst.join("vendored/a/file.txt")).expect("read"), b"x");
    }

    #[test]
    fn dir_source_rejects_plain_file() {
        let tmp = TestDir::new();
        let path_plain = tmp.path().join("plain.txt");
        write_text(&path_plain, "x");
        let dst = tmp.path().join("dst");

        let mut sources: Vec<Box<dyn Copier>> = vec![Box::new(SrcDir::new(&path_plain))];
        let err = copy_tree(&dst, &mut sources).expect_err("must fail");
        match err {
            CopyError::Source { index, source } => {
                assert_eq!(index, 0);
                assert!(matches!(*source, CopyError::SourceNotDirectory(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn dir_source_skips_symlinks_silently() {
        use std::os::unix::fs::symlink;

        let tmp = TestDir::new();
        let src = tmp.path().join("src");
        write_text(&src.join("real.txt"), "real");
        symlink(src.join("real.txt"), src.join("link.txt")).expect("symlink");
        let dst = tmp.path().join("dst");

        let mut sources: Vec<Box<dyn Copier>> = vec![Box::new(SrcDir::new(&src))];
        copy_tree(&dst, &mut sources).expect("copy tree");
        assert!(dst.join("real.txt").exists());
        assert!(!dst.join("link.txt").exists());
    }

    #[test]
    fn sourcer_exposes_source_path() {
        let spec_src_file = SrcFile::new("/some/file.txt");
        assert_eq!(spec_src_file.src_path(), std::path::Path::new("/some/file.txt"));
        let spec_src_dir = SrcDir::new("/some/dir");
        assert_eq!(spec_src_dir.src_path(), std::path::Path::new("/some/dir"));
    }

    #[test]
    fn bytes_source_debug_reports_length_not_content() {
        let spec_src_bytes = SrcBytes::new(&b"secret payload"[..], "out.bin");
        let text = format!("{spec_src_bytes:?}");
        assert!(text.contains("14"), "unexpected debug text: {text}");
        assert!(!text.contains("secret"), "unexpected debug text: {text}");
    }

    #[test]
    fn ignore_predicate_glob_mode() {
        let pred = compile_ignore_predicate(
            &["*.log".to_string(), "tmp*".to_string()],
            EnumIgnorePatternMode::Glob,
        )
        .expect("compile glob");
        assert!(pred("build.log"));
        assert!(pred("tmp_cache"));
        assert!(!pred("main.rs"));
    }

    #[test]
    fn ignore_predicate_regex_mode() {
        let pred = compile_ignore_predicate(
            &[r"^target(/|$)".to_string()],
            EnumIgnorePatternMode::Regex,
        )
        .expect("compile regex");
        assert!(pred("target"));
        assert!(pred("target/debug"));
        assert!(!pred("src/target.rs"));
    }

    #[test]
    fn ignore_predicate_literal_mode() {
        let pred = compile_ignore_predicate(
            &[".git".to_string()],
            EnumIgnorePatternMode::Literal,
        )
        .expect("compile literal");
        assert!(pred(".git"));
        assert!(pred("sub/.git/config"));
        assert!(!pred("src/lib.rs"));
    }

    #[test]
    fn ignore_predicate_invalid_patterns_rejected() {
        let err = compile_ignore_predicate(&["[".to_string()], EnumIgnorePatternMode::Glob)
            .err()
            .expect("invalid glob must fail");
        assert!(matches!(err, CopyError::InvalidPattern(_)));

        let err = compile_ignore_predicate(&["(".to_string()], EnumIgnorePatternMode::Regex)
            .err()
            .expect("invalid regex must fail");
        assert!(matches!(err, CopyError::InvalidPattern(_)));
    }
}
