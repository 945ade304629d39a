use std::fs;
use std::io;
use std::path::Path;

////////////////////////////////////////////////////////////////////////////////
// #region PathUtilities

pub(crate) fn is_existing_dir(path: &Path) -> bool {
    fs::metadata(path).map(|stat| stat.is_dir()).unwrap_or(false)
}

/// Resolve the creation mode for directories under `path`: the permission bits
/// of the nearest existing ancestor directory, or `0o755` when nothing on the
/// path exists yet. Non-unix platforms carry no mode (`None`).
pub(crate) fn resolve_dir_mode(path: &Path) -> io::Result<Option<u32>> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let mut path_cursor = Some(path);
        while let Some(path_probe) = path_cursor {
            match fs::metadata(path_probe) {
                Ok(stat_probe) if stat_probe.is_dir() => {
                    return Ok(Some(stat_probe.permissions().mode() & 0o7777));
                }
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
            path_cursor = path_probe.parent();
        }
        Ok(Some(0o755))
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(None)
    }
}

/// `create_dir_all` that applies `mode_dir` to every created component when a
/// mode is carried (unix); plain recursive creation otherwise.
pub(crate) fn make_dir_all_with_mode(path: &Path, mode_dir: Option<u32>) -> io::Result<()> {
    #[cfg(unix)]
    if let Some(mode_dir) = mode_dir {
        use std::os::unix::fs::DirBuilderExt;

        return fs::DirBuilder::new()
            .recursive(true)
            .mode(mode_dir)
            .create(path);
    }
    let _ = mode_dir;
    fs::create_dir_all(path)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region IdentityChecks

/// True when two descriptors refer to the identical storage object.
pub(crate) fn is_same_stat(stat_a: &fs::Metadata, stat_b: &fs::Metadata) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;

        stat_a.dev() == stat_b.dev() && stat_a.ino() == stat_b.ino()
    }
    #[cfg(not(unix))]
    {
        let _ = (stat_a, stat_b);
        false
    }
}

/// Identity check with a canonical-path fallback for platforms where the
/// descriptor carries no device/inode pair.
pub(crate) fn is_same_entry(
    path_a: &Path,
    stat_a: &fs::Metadata,
    path_b: &Path,
    stat_b: &fs::Metadata,
) -> bool {
    if is_same_stat(stat_a, stat_b) {
        return true;
    }
    #[cfg(not(unix))]
    {
        if let (Ok(path_res_a), Ok(path_res_b)) = (fs::canonicalize(path_a), fs::canonicalize(path_b))
        {
            return path_res_a == path_res_b;
        }
    }
    let _ = (path_a, path_b);
    false
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
pub(crate) mod testutil {
    use std::path::{Path, PathBuf};
    use std::time::{SystemTime, UNIX_EPOCH};

    pub(crate) struct TestDir {
        path: PathBuf,
    }

    impl TestDir {
        pub(crate) fn new() -> Self {
            let n = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos();
            let path = std::env::temp_dir().join(format!("copykit_test_{n}"));
            std::fs::create_dir_all(&path).expect("create test dir");
            Self { path }
        }

        pub(crate) fn path(&self) -> &Path {
            &self.path
        }
    }

    impl Drop for TestDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.path);
        }
    }

    pub(crate) fn write_text(path: &Path, txt: &str) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent");
        }
        std::fs::write(path, txt).expect("write text");
    }
}
