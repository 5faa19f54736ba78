use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
    time::SystemTime,
};

use crate::error::{FileSystemError, FileSystemResult};

pub trait FileSystemProvider {
    /// Removes the specified file or directory safely.
    ///
    /// If the path does not exist, this function returns `Ok(())` without error. If the path
    /// points to a directory, it and all of its contents are removed recursively, equivalent to
    /// [`std::fs::remove_dir_all`]. If the path points to a file, it is removed with
    /// [`std::fs::remove_file`].
    ///
    /// # Errors
    ///
    /// Returns a [`FileSystemError::File`] if the removal fails for any reason other than
    /// the path not existing (e.g., permission denied, path is in use, etc.).
    ///
    /// # Example
    ///
    /// ```no_run
    /// use tapfeed_utils::error::FileSystemResult;
    /// use tapfeed_utils::fs::{FileSystemProvider, StandardFileSystemProvider};
    ///
    /// fn main() -> FileSystemResult<()> {
    ///     let fs = StandardFileSystemProvider;
    ///     fs.safe_remove("/tmp/tapfeed/api/formula.jws.json")?;
    ///     Ok(())
    /// }
    /// ```
    fn safe_remove<P: AsRef<Path>>(&self, path: P) -> FileSystemResult<()>;

    /// Creates a directory structure if it doesn't exist.
    ///
    /// If the directory already exists, this function does nothing. If the path exists but is
    /// not a directory, this function returns an error.
    ///
    /// # Errors
    ///
    /// * [`FileSystemError::Directory`] if the directory could not be created.
    /// * [`FileSystemError::NotADirectory`] if the path exists but is not a directory.
    fn ensure_dir_exists<P: AsRef<Path>>(&self, path: P) -> FileSystemResult<()>;

    /// Sets the modification time of a file, creating it empty when missing.
    ///
    /// The file contents are never truncated.
    fn touch<P: AsRef<Path>>(&self, path: P, mtime: SystemTime) -> FileSystemResult<()>;

    /// Replaces the contents of `path` with `contents` via a sibling temporary file and a
    /// rename, so concurrent readers observe either the old or the new contents.
    fn atomic_write<P: AsRef<Path>>(&self, path: P, contents: &[u8]) -> FileSystemResult<()>;
}

#[derive(Default, Clone)]
pub struct StandardFileSystemProvider;

impl FileSystemProvider for StandardFileSystemProvider {
    fn safe_remove<P: AsRef<Path>>(&self, path: P) -> FileSystemResult<()> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(());
        }

        let result = if path.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        };

        result.map_err(|err| FileSystemError::File {
            path: path.to_path_buf(),
            action: "remove",
            source: err,
        })
    }

    fn ensure_dir_exists<P: AsRef<Path>>(&self, path: P) -> FileSystemResult<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path).map_err(|err| FileSystemError::Directory {
                path: path.to_path_buf(),
                action: "create",
                source: err,
            })?;
        } else if !path.is_dir() {
            return Err(FileSystemError::NotADirectory {
                path: path.to_path_buf(),
            });
        }

        Ok(())
    }

    fn touch<P: AsRef<Path>>(&self, path: P, mtime: SystemTime) -> FileSystemResult<()> {
        let path = path.as_ref();
        let file_err = |action, source| FileSystemError::File {
            path: path.to_path_buf(),
            action,
            source,
        };

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|err| file_err("open", err))?;

        file.set_modified(mtime)
            .map_err(|err| file_err("touch", err))
    }

    fn atomic_write<P: AsRef<Path>>(&self, path: P, contents: &[u8]) -> FileSystemResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            self.ensure_dir_exists(parent)?;
        }

        let tmp_path = temp_sibling(path);
        fs::write(&tmp_path, contents).map_err(|err| FileSystemError::File {
            path: tmp_path.clone(),
            action: "write",
            source: err,
        })?;

        fs::rename(&tmp_path, path).map_err(|err| {
            let _ = fs::remove_file(&tmp_path);
            FileSystemError::File {
                path: path.to_path_buf(),
                action: "replace",
                source: err,
            }
        })
    }
}

/// Returns a per-process temporary path next to `path`.
///
/// The process id keeps cooperating processes from clobbering each other's partial writes.
pub fn temp_sibling(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{file_name}.{}.part", std::process::id()))
}

/// Returns `true` when `path` exists and is non-empty.
pub fn has_content<P: AsRef<Path>>(path: P) -> bool {
    fs::metadata(path).is_ok_and(|meta| meta.len() > 0)
}

/// Returns the modification time of `path`, or `None` when it cannot be read.
pub fn modified_time<P: AsRef<Path>>(path: P) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

/// Creates a directory structure if it doesn't exist.
///
/// See [`FileSystemProvider::ensure_dir_exists`] for detailed documentation.
pub fn ensure_dir_exists<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    StandardFileSystemProvider.ensure_dir_exists(path)
}

/// Removes the specified file or directory safely.
///
/// See [`FileSystemProvider::safe_remove`] for detailed documentation.
pub fn safe_remove<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    StandardFileSystemProvider.safe_remove(path)
}

/// See [`FileSystemProvider::touch`].
pub fn touch<P: AsRef<Path>>(path: P, mtime: SystemTime) -> FileSystemResult<()> {
    StandardFileSystemProvider.touch(path, mtime)
}

/// See [`FileSystemProvider::atomic_write`].
pub fn atomic_write<P: AsRef<Path>>(path: P, contents: &[u8]) -> FileSystemResult<()> {
    StandardFileSystemProvider.atomic_write(path, contents)
}
