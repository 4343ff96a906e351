// ============================================================
// Layer 6 — Experiment Lock
// ============================================================
// At most one trainer may write to a checkpoint directory. The
// lock is a `.lock` file created exclusively and holding the
// owner's pid; it is removed when the guard drops.
//
// A crashed trainer leaves its lock behind. Remove the file by
// hand once no process is using the directory.

use std::{
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use crate::domain::error::{GanError, GanResult};

pub const LOCK_FILE: &str = ".lock";

#[derive(Debug)]
pub struct DirLock {
    path: PathBuf,
}

impl DirLock {
    pub fn acquire(dir: &Path) -> GanResult<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(LOCK_FILE);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                writeln!(file, "{}", std::process::id())?;
                tracing::debug!("Acquired experiment lock '{}'", path.display());
                Ok(Self { path })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let owner = fs::read_to_string(&path).unwrap_or_default();
                Err(GanError::checkpoint(format!(
                    "'{}' is locked by pid {}; delete the lock file if that trainer is gone",
                    dir.display(),
                    owner.trim()
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!("Could not remove lock '{}': {e}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_until_release() {
        let tmp = tempfile::tempdir().unwrap();
        let lock = DirLock::acquire(tmp.path()).unwrap();
        assert!(matches!(DirLock::acquire(tmp.path()), Err(GanError::Checkpoint(_))));

        let pid = fs::read_to_string(lock.path()).unwrap();
        assert_eq!(pid.trim(), std::process::id().to_string());

        drop(lock);
        assert!(!tmp.path().join(LOCK_FILE).exists());
        assert!(DirLock::acquire(tmp.path()).is_ok());
    }
}
