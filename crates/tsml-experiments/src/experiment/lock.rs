use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::ExperimentError;
use crate::experiment::monitor::host_name;

/// Exclusive advisory lock on a result slot, held as a lock file created
/// with `create_new`. The file is removed when the guard drops, on every
/// exit path. Acquisition never waits: a held lock is reported as
/// [`ExperimentError::LockContention`].
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
}

impl FileLock {
    pub fn try_acquire(path: &Path) -> Result<FileLock, ExperimentError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(ExperimentError::LockContention(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        let lock = FileLock {
            path: path.to_path_buf(),
        };
        writeln!(file, "pid,{}\nhost,{}", std::process::id(), host_name())?;
        log::trace!("Acquired lock {}", path.display());
        Ok(lock)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("Failed to release lock {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slot").join("fold0.lock");

        let first = FileLock::try_acquire(&path).unwrap();
        assert!(path.is_file());
        let err = FileLock::try_acquire(&path).unwrap_err();
        assert!(matches!(err, ExperimentError::LockContention(_)));

        drop(first);
        assert!(!path.exists());
        assert!(FileLock::try_acquire(&path).is_ok());
    }
}
