//! Run-scoped scratch directories.
//!
//! A [`ScratchWorkspace`] is a uniquely named, empty directory under an
//! injected root. It lives for exactly one reconciliation run: call
//! [`ScratchWorkspace::release`] to remove it and observe failures; any other
//! exit path (early return, panic) removes it on drop.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use lockbot_core::LOCK_FILE_NAME;

use crate::error::{workspace_io_err, WorkspaceError};

const WORKSPACE_PREFIX: &str = "lockbot-";

#[derive(Debug)]
pub struct ScratchWorkspace {
    dir: TempDir,
}

impl ScratchWorkspace {
    /// Create a fresh directory under `root`, creating `root` if needed.
    pub fn acquire(root: &Path) -> Result<Self, WorkspaceError> {
        std::fs::create_dir_all(root).map_err(|e| workspace_io_err(root, e))?;
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(root)
            .map_err(|e| workspace_io_err(root, e))?;
        tracing::debug!(path = %dir.path().display(), "scratch workspace acquired");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where the generator is expected to leave its output.
    pub fn lock_file_path(&self) -> PathBuf {
        self.dir.path().join(LOCK_FILE_NAME)
    }

    /// Remove the directory recursively.
    pub fn release(self) -> Result<(), WorkspaceError> {
        let path = self.dir.path().to_path_buf();
        self.dir.close().map_err(|e| workspace_io_err(&path, e))?;
        tracing::debug!(path = %path.display(), "scratch workspace released");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn acquire_creates_unique_empty_directories() {
        let root = TempDir::new().unwrap();
        let a = ScratchWorkspace::acquire(root.path()).unwrap();
        let b = ScratchWorkspace::acquire(root.path()).unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a.path().starts_with(root.path()));
        assert!(std::fs::read_dir(a.path()).unwrap().next().is_none());
    }

    #[test]
    fn acquire_creates_missing_root() {
        let root = TempDir::new().unwrap();
        let nested = root.path().join("scratch").join("nested");
        let ws = ScratchWorkspace::acquire(&nested).unwrap();
        assert!(ws.path().starts_with(&nested));
    }

    #[test]
    fn release_removes_directory_with_contents() {
        let root = TempDir::new().unwrap();
        let ws = ScratchWorkspace::acquire(root.path()).unwrap();
        let path = ws.path().to_path_buf();
        std::fs::write(ws.lock_file_path(), "{}").unwrap();
        std::fs::create_dir_all(path.join("cache")).unwrap();

        ws.release().unwrap();
        assert!(!path.exists(), "workspace must be gone after release");
    }

    #[test]
    fn drop_removes_directory() {
        let root = TempDir::new().unwrap();
        let path = {
            let ws = ScratchWorkspace::acquire(root.path()).unwrap();
            ws.path().to_path_buf()
        };
        assert!(!path.exists(), "workspace must be gone after drop");
    }

    #[test]
    #[cfg(unix)]
    fn acquire_fails_under_unwritable_root() {
        use std::os::unix::fs::PermissionsExt;

        let root = TempDir::new().unwrap();
        let locked = root.path().join("locked");
        std::fs::create_dir_all(&locked).unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o555)).unwrap();

        // Root bypasses permission bits; only assert when they are enforced.
        let write_attempt = std::fs::write(locked.join("canary"), "x");
        if write_attempt.is_err() {
            let err = ScratchWorkspace::acquire(&locked).unwrap_err();
            assert!(err.to_string().contains("locked"));
        }

        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
}
