use std::path::PathBuf;

use tracing::{debug, warn};
use uuid::Uuid;

use super::message::Attachment;
use crate::error::RelayError;
use crate::platform::FileSource;

/// A fetched attachment on local disk. Removed after its relay cycle.
#[derive(Debug)]
pub struct StagedFile {
    pub local_path: PathBuf,
    pub display_name: String,
    removed: bool,
}

impl StagedFile {
    fn new(local_path: PathBuf, display_name: String) -> Self {
        Self {
            local_path,
            display_name,
            removed: false,
        }
    }

    /// Delete the file. Failures are logged, never returned.
    pub async fn remove(mut self) {
        self.removed = true;
        match tokio::fs::remove_file(&self.local_path).await {
            Ok(()) => debug!("Removed staged file {}", self.local_path.display()),
            Err(e) => warn!(
                "Failed to remove staged file {}: {}",
                self.local_path.display(),
                e
            ),
        }
    }
}

impl Drop for StagedFile {
    // Reached when a relay future is cancelled between staging and cleanup.
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.local_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    "Failed to remove abandoned staged file {}: {}",
                    self.local_path.display(),
                    e
                );
            }
        }
    }
}

/// Transient directory holding attachments between fetch and send.
pub struct Staging {
    dir: PathBuf,
}

impl Staging {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Fetch `attachment` from `source` into a fresh file in the staging directory.
    pub async fn stage(
        &self,
        attachment: &Attachment,
        source: &dyn FileSource,
    ) -> Result<StagedFile, RelayError> {
        let fetch_error = |reason: String| RelayError::Fetch {
            file_id: attachment.remote_id.clone(),
            reason,
        };

        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            fetch_error(format!(
                "cannot create staging directory {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        let local_path = self.dir.join(format!(
            "{}_{}",
            Uuid::new_v4().simple(),
            sanitize_file_name(&attachment.suggested_name)
        ));

        if let Err(e) = source.fetch(&attachment.remote_id, &local_path).await {
            if let Err(rm) = tokio::fs::remove_file(&local_path).await {
                if rm.kind() != std::io::ErrorKind::NotFound {
                    warn!(
                        "Failed to remove partial download {}: {}",
                        local_path.display(),
                        rm
                    );
                }
            }
            return Err(fetch_error(format!("{:#}", e)));
        }

        debug!(
            "Staged {} {} at {}",
            attachment.kind,
            attachment.remote_id,
            local_path.display()
        );
        Ok(StagedFile::new(
            local_path,
            attachment.suggested_name.clone(),
        ))
    }
}

/// Keep a suggested name safe to join onto the staging directory.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::message::AttachmentKind;
    use async_trait::async_trait;
    use std::path::Path;

    struct BytesSource(&'static [u8]);

    #[async_trait]
    impl FileSource for BytesSource {
        async fn fetch(&self, _remote_id: &str, dest: &Path) -> anyhow::Result<()> {
            tokio::fs::write(dest, self.0).await?;
            Ok(())
        }
    }

    /// Writes part of the file, then fails.
    struct TruncatedSource;

    #[async_trait]
    impl FileSource for TruncatedSource {
        async fn fetch(&self, _remote_id: &str, dest: &Path) -> anyhow::Result<()> {
            tokio::fs::write(dest, b"partial").await?;
            anyhow::bail!("connection reset")
        }
    }

    fn attachment(name: &str) -> Attachment {
        Attachment {
            kind: AttachmentKind::Document,
            remote_id: "BQAC-1".to_string(),
            suggested_name: name.to_string(),
        }
    }

    fn staged_files(dir: &Path) -> usize {
        match std::fs::read_dir(dir) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("report.pdf"), "report.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_file_name("a\\b:c"), "a_b_c");
        assert_eq!(sanitize_file_name(".."), "file");
    }

    #[tokio::test]
    async fn test_stage_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let staging_dir = dir.path().join("staging");
        let staging = Staging::new(&staging_dir);

        let staged = staging
            .stage(&attachment("report.pdf"), &BytesSource(b"%PDF"))
            .await
            .unwrap();
        assert_eq!(staged.display_name, "report.pdf");
        assert!(staged.local_path.starts_with(&staging_dir));
        assert!(staged
            .local_path
            .to_string_lossy()
            .ends_with("_report.pdf"));
        assert_eq!(std::fs::read(&staged.local_path).unwrap(), b"%PDF");

        let path = staged.local_path.clone();
        staged.remove().await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_staged_names_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let staging = Staging::new(dir.path());
        let first = staging
            .stage(&attachment("same.txt"), &BytesSource(b"1"))
            .await
            .unwrap();
        let second = staging
            .stage(&attachment("same.txt"), &BytesSource(b"2"))
            .await
            .unwrap();
        assert_ne!(first.local_path, second.local_path);
        first.remove().await;
        second.remove().await;
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let staging = Staging::new(dir.path());

        let err = staging
            .stage(&attachment("report.pdf"), &TruncatedSource)
            .await
            .unwrap_err();
        match err {
            RelayError::Fetch { file_id, reason } => {
                assert_eq!(file_id, "BQAC-1");
                assert!(reason.contains("connection reset"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(staged_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_dropped_staged_file_is_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let staging = Staging::new(dir.path());
        let staged = staging
            .stage(&attachment("clip.mp4"), &BytesSource(b"video"))
            .await
            .unwrap();
        let path = staged.local_path.clone();
        drop(staged);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_remove_missing_file_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let staging = Staging::new(dir.path());
        let staged = staging
            .stage(&attachment("gone.txt"), &BytesSource(b"x"))
            .await
            .unwrap();
        std::fs::remove_file(&staged.local_path).unwrap();
        staged.remove().await;
    }
}
