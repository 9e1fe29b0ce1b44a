//! BMC password temp-file lifecycle (spec §4.5, §5 "Resource safety"):
//! mode 0600, unique path per command, unlinked on every IDLE-stage entry
//! (garbage collection) and every explicit exit path — "defends against
//! worker death between file-create and file-unlink" (spec §9).

use mtce_common::MtceError;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// A password file written for exactly one BMC command invocation.
/// `Drop` does not unlink it: unlinking is asynchronous and the lifecycle
/// is owned explicitly by the worker (`unlink`/garbage collection), not by
/// scope exit, to match the original's GC-on-IDLE-entry design rather than
/// RAII (the path must survive a worker crash between create and use).
#[derive(Debug, Clone)]
pub struct PasswordFile {
    pub path: PathBuf,
}

impl PasswordFile {
    /// Create `dir/<hostname>-<command>.pw` with mode 0600 and `password`
    /// as its sole contents.
    pub async fn create(dir: &std::path::Path, hostname: &str, tag: &str, password: &str) -> Result<Self, MtceError> {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| MtceError::FileCreate(e.to_string()))?;
        let path = dir.join(format!("{hostname}-{tag}.pw"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = tokio::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&path)
                .await
                .map_err(|e| MtceError::FileCreate(e.to_string()))?;
            file.write_all(password.as_bytes())
                .await
                .map_err(|e| MtceError::FileCreate(e.to_string()))?;
        }
        #[cfg(not(unix))]
        {
            fs::write(&path, password.as_bytes())
                .await
                .map_err(|e| MtceError::FileCreate(e.to_string()))?;
        }

        Ok(Self { path })
    }

    /// Unlink the file. Safe to call on a path that is already gone (a
    /// prior garbage-collection pass, or the worker never got far enough
    /// to create it).
    pub async fn unlink(&self) {
        if let Err(e) = fs::remove_file(&self.path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to unlink bmc password file");
            }
        }
    }
}
