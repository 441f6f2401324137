//! Destination file for exported configuration.
//!
//! [`BackupFile`] writes into a hidden temporary sibling of the target and
//! only renames it into place on [`BackupFile::persist`], so an interrupted
//! or failed backup leaves any previous file at the target untouched.

use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir, fs_utf8::File};
use thiserror::Error;
use uuid::Uuid;

/// Default destination used by the CLI.
pub const DEFAULT_OUTPUT: &str = "backup.rsc";

/// Errors raised while preparing or finalising the destination file.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum OutputError {
    /// Raised when file system operations fail.
    #[error("failed to access {path}: {message}")]
    Io {
        /// Path that could not be accessed.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when the destination does not name a file.
    #[error("output path {path} is missing a file name")]
    MissingFileName {
        /// Path supplied by the caller.
        path: Utf8PathBuf,
    },
}

/// Write-then-rename destination for a single backup.
#[derive(Debug)]
pub struct BackupFile {
    path: Utf8PathBuf,
    dir: Dir,
    file_name: String,
    temp_name: String,
    file: Option<File>,
}

impl BackupFile {
    /// Creates the temporary file next to `path`.
    ///
    /// The parent directory must already exist.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::MissingFileName`] when `path` has no file name
    /// and [`OutputError::Io`] when the directory cannot be opened or the
    /// temporary file cannot be created.
    pub fn create(path: &Utf8Path) -> Result<Self, OutputError> {
        let file_name = path
            .file_name()
            .ok_or_else(|| OutputError::MissingFileName {
                path: path.to_path_buf(),
            })?
            .to_owned();
        let parent = match path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent,
            _ => Utf8Path::new("."),
        };

        let dir = Dir::open_ambient_dir(parent, ambient_authority())
            .map_err(|err| io_error(parent, &err))?;
        let temp_name = format!(".{file_name}.{}.partial", Uuid::new_v4().simple());
        let file = dir
            .create(&temp_name)
            .map_err(|err| io_error(&parent.join(&temp_name), &err))?;

        Ok(Self {
            path: path.to_path_buf(),
            dir,
            file_name,
            temp_name,
            file: Some(file),
        })
    }

    /// Final destination path.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Path of the temporary file currently receiving writes.
    #[must_use]
    pub fn temp_path(&self) -> Utf8PathBuf {
        self.path.with_file_name(&self.temp_name)
    }

    /// Syncs the temporary file and renames it onto the destination.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::Io`] when syncing or renaming fails. The
    /// temporary file is removed in that case.
    pub fn persist(mut self) -> Result<Utf8PathBuf, OutputError> {
        if let Some(file) = self.file.take() {
            file.sync_all()
                .map_err(|err| io_error(&self.temp_path(), &err))?;
        }
        self.dir
            .rename(&self.temp_name, &self.dir, &self.file_name)
            .map_err(|err| io_error(&self.path, &err))?;
        self.temp_name.clear();
        Ok(self.path.clone())
    }

    /// Drops everything written so far.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::Io`] when the temporary file cannot be removed.
    pub fn discard(mut self) -> Result<(), OutputError> {
        self.file = None;
        let temp_name = std::mem::take(&mut self.temp_name);
        self.dir
            .remove_file(&temp_name)
            .map_err(|err| io_error(&self.path.with_file_name(&temp_name), &err))
    }

    fn writer(&mut self) -> io::Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("backup file already finalised"))
    }
}

impl Write for BackupFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer()?.flush()
    }
}

impl Drop for BackupFile {
    fn drop(&mut self) {
        self.file = None;
        if !self.temp_name.is_empty() {
            self.dir.remove_file(&self.temp_name).ok();
        }
    }
}

fn io_error(path: &Utf8Path, err: &io::Error) -> OutputError {
    OutputError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}
