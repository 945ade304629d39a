//! Single-file copy, content-write primitives and metadata propagation.

use std::fs;
use std::io;
use std::io::Read;
use std::path::Path;

use filetime::FileTime;

use crate::spec::{CopyError, SpecWriteOptions};
use crate::util::{is_existing_dir, is_same_entry, is_same_stat};

/// Propagate the reference descriptor's metadata onto `path_dst`.
///
/// Sets the modification time to the descriptor's mtime (access time is set to
/// "now"), then the permission bits. Timestamps strictly before permissions;
/// nothing after the chtimes call may move the final mtime.
pub fn set_file_info<P: AsRef<Path>>(path_dst: P, stat_ref: &fs::Metadata) -> Result<(), CopyError> {
    let path_dst = path_dst.as_ref();
    let wrap_info = |e: io::Error| CopyError::SetInfo {
        path: path_dst.to_path_buf(),
        source: e,
    };

    let time_modify = FileTime::from_last_modification_time(stat_ref);
    filetime::set_file_times(path_dst, FileTime::now(), time_modify).map_err(wrap_info)?;
    fs::set_permissions(path_dst, stat_ref.permissions()).map_err(wrap_info)
}

/// Copy all bytes from `reader` into `path_dst`, creating or truncating it.
///
/// The handle is flushed with `sync_all` before it drops; `File`'s `Drop`
/// would otherwise swallow a failed write-back. On error the destination may
/// be left partial (no staging is performed).
pub fn copy_reader<R, P>(reader: &mut R, path_dst: P) -> Result<(), CopyError>
where
    R: Read + ?Sized,
    P: AsRef<Path>,
{
    let path_dst = path_dst.as_ref();
    let wrap_write = |e: io::Error| CopyError::Write {
        path: path_dst.to_path_buf(),
        source: e,
    };

    let mut file_dst = fs::File::create(path_dst).map_err(wrap_write)?;
    io::copy(reader, &mut file_dst).map_err(wrap_write)?;
    file_dst.sync_all().map_err(wrap_write)
}

/// Copy an in-memory byte buffer into `path_dst`.
pub fn copy_bytes<P: AsRef<Path>>(data: &[u8], path_dst: P) -> Result<(), CopyError> {
    let mut reader = data;
    copy_reader(&mut reader, path_dst)
}

/// Copy the contents of the file at `path_src` into `path_dst`.
pub fn copy_file_contents<P, Q>(path_src: P, path_dst: Q) -> Result<(), CopyError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let path_src = path_src.as_ref();
    let mut file_src = fs::File::open(path_src).map_err(|e| CopyError::Read {
        path: path_src.to_path_buf(),
        source: e,
    })?;
    copy_reader(&mut file_src, path_dst)
}

/// Copy `reader` into `path_dst` under a reference descriptor.
///
/// Rejects a non-regular source descriptor and a non-regular existing
/// destination; succeeds as a no-op when the descriptor and the existing
/// destination refer to the identical entry (device+inode). Otherwise copies
/// the bytes and propagates the descriptor's metadata. The descriptor carries
/// no path of its own, so non-regular-source errors report the destination.
pub fn copy_reader_with_stat<R, P>(
    reader: &mut R,
    stat_src: &fs::Metadata,
    path_dst: P,
) -> Result<(), CopyError>
where
    R: Read + ?Sized,
    P: AsRef<Path>,
{
    let path_dst = path_dst.as_ref();
    if !stat_src.is_file() {
        return Err(CopyError::NonRegularSource(path_dst.to_path_buf()));
    }

    match fs::metadata(path_dst) {
        Ok(stat_dst) => {
            if !stat_dst.is_file() {
                return Err(CopyError::NonRegularDestination(path_dst.to_path_buf()));
            }
            if is_same_stat(stat_src, &stat_dst) {
                return Ok(());
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(CopyError::DestinationStat {
                path: path_dst.to_path_buf(),
                source: e,
            });
        }
    }

    copy_reader(reader, path_dst)?;
    set_file_info(path_dst, stat_src)
}

/// Copy the regular file at `path_src` to `path_dst`.
///
/// Succeeds as a no-op when source and destination are already the identical
/// entry. Otherwise tries a hard link first; a link shares the source's
/// metadata, so nothing is propagated on that path. Any link failure
/// (cross-device, existing destination, unsupported filesystem) falls back to
/// a full content copy followed by metadata propagation from the source.
pub fn copy_file<P, Q>(path_src: P, path_dst: Q) -> Result<(), CopyError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let path_src = path_src.as_ref();
    let path_dst = path_dst.as_ref();

    let stat_src = fs::metadata(path_src).map_err(|e| CopyError::SourceStat {
        path: path_src.to_path_buf(),
        source: e,
    })?;
    if !stat_src.is_file() {
        return Err(CopyError::NonRegularSource(path_src.to_path_buf()));
    }

    match fs::metadata(path_dst) {
        Ok(stat_dst) => {
            if !stat_dst.is_file() {
                return Err(CopyError::NonRegularDestination(path_dst.to_path_buf()));
            }
            if is_same_entry(path_src, &stat_src, path_dst, &stat_dst) {
                return Ok(());
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(CopyError::DestinationStat {
                path: path_dst.to_path_buf(),
                source: e,
            });
        }
    }

    if fs::hard_link(path_src, path_dst).is_ok() {
        return Ok(());
    }

    copy_file_contents(path_src, path_dst)?;
    set_file_info(path_dst, &stat_src)
}

/// Write `reader` to `path_dst`, creating missing parent directories.
///
/// Behavior is selected by [`SpecWriteOptions`]:
/// - `if_set_permissions`: open with the descriptor's mode, then chmod after
///   the write (the mode given at open is masked by the process umask);
/// - `if_set_times`: set access and modification time to the descriptor's
///   mtime;
/// - `if_sync`: `sync_all` before the handle is closed.
pub fn create_file<R, P>(
    path_dst: P,
    reader: &mut R,
    stat_src: &fs::Metadata,
    spec_wr_options: SpecWriteOptions,
) -> Result<(), CopyError>
where
    R: Read + ?Sized,
    P: AsRef<Path>,
{
    let path_dst = path_dst.as_ref();
    let wrap_write = |e: io::Error| CopyError::Write {
        path: path_dst.to_path_buf(),
        source: e,
    };
    let wrap_info = |e: io::Error| CopyError::SetInfo {
        path: path_dst.to_path_buf(),
        source: e,
    };

    if let Some(path_parent) = path_dst.parent() {
        if !path_parent.as_os_str().is_empty() && !is_existing_dir(path_parent) {
            fs::create_dir_all(path_parent).map_err(|e| CopyError::CreateDir {
                path: path_parent.to_path_buf(),
                source: e,
            })?;
        }
    }

    let mut file_dst = open_destination(path_dst, stat_src, spec_wr_options.if_set_permissions)
        .map_err(wrap_write)?;
    io::copy(reader, &mut file_dst).map_err(wrap_write)?;

    if spec_wr_options.if_set_permissions {
        fs::set_permissions(path_dst, stat_src.permissions()).map_err(wrap_info)?;
    }
    if spec_wr_options.if_set_times {
        let time_modify = FileTime::from_last_modification_time(stat_src);
        filetime::set_file_times(path_dst, time_modify, time_modify).map_err(wrap_info)?;
    }
    if spec_wr_options.if_sync {
        file_dst.sync_all().map_err(wrap_write)?;
    }
    Ok(())
}

/// [`create_file`] with [`SpecWriteOptions::PRESERVE_ALL`].
pub fn create_file_preserved<R, P>(
    path_dst: P,
    reader: &mut R,
    stat_src: &fs::Metadata,
) -> Result<(), CopyError>
where
    R: Read + ?Sized,
    P: AsRef<Path>,
{
    create_file(path_dst, reader, stat_src, SpecWriteOptions::PRESERVE_ALL)
}

fn open_destination(
    path_dst: &Path,
    stat_src: &fs::Metadata,
    if_set_permissions: bool,
) -> io::Result<fs::File> {
    #[cfg(unix)]
    if if_set_permissions {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

        return fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(stat_src.permissions().mode())
            .open(path_dst);
    }
    let _ = (stat_src, if_set_permissions);
    fs::File::create(path_dst)
}
