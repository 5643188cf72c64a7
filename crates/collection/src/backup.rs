//! Backup-and-swap guard for collection file writes.
//! 收藏檔寫入時的備援與換回機制。

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Moves the previous collection file aside before it is overwritten,
/// so a failed write can bring it back.
///
/// The backup name is the full file name with `.bak` appended, so
/// `demo.nvcx` backs up to `demo.nvcx.bak`. After a successful write
/// the backup stays on disk as the last-good copy.
#[derive(Debug)]
pub struct FileBackup {
    original: PathBuf,
    backup: Option<PathBuf>,
}

impl FileBackup {
    /// Rename the file at `path` to its backup name. A missing file
    /// needs no backup and the guard stays inert.
    pub fn create(path: &Path) -> io::Result<Self> {
        let backup = if path.is_file() {
            let backup = backup_path(path);
            fs::rename(path, &backup)?;
            Some(backup)
        } else {
            None
        };
        Ok(Self {
            original: path.to_path_buf(),
            backup,
        })
    }

    /// Bring the saved copy back after a failed write. A partially
    /// written replacement at the original path is discarded first.
    pub fn restore(&self) -> io::Result<()> {
        if let Some(backup) = &self.backup {
            if self.original.exists() {
                fs::remove_file(&self.original)?;
            }
            fs::rename(backup, &self.original)?;
        }
        Ok(())
    }

    /// Path of the backup file, when one was created.
    pub fn backup_file(&self) -> Option<&Path> {
        self.backup.as_deref()
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut raw = path.as_os_str().to_os_string();
    raw.push(".bak");
    PathBuf::from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_moves_the_existing_file_aside() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("demo.nvcx");
        fs::write(&target, "old content").expect("write");

        let guard = FileBackup::create(&target).expect("backup");
        assert!(!target.exists());
        let backup = guard.backup_file().expect("backup path");
        assert_eq!(backup, dir.path().join("demo.nvcx.bak"));
        assert_eq!(fs::read_to_string(backup).expect("read"), "old content");
    }

    #[test]
    fn create_without_an_existing_file_is_inert() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("demo.nvcx");

        let guard = FileBackup::create(&target).expect("backup");
        assert!(guard.backup_file().is_none());
        guard.restore().expect("restore");
        assert!(!target.exists());
    }

    #[test]
    fn restore_discards_a_partial_write() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("demo.nvcx");
        fs::write(&target, "good").expect("write");

        let guard = FileBackup::create(&target).expect("backup");
        fs::write(&target, "partial garbage").expect("write");
        guard.restore().expect("restore");

        assert_eq!(fs::read_to_string(&target).expect("read"), "good");
        assert!(!dir.path().join("demo.nvcx.bak").exists());
    }
}
