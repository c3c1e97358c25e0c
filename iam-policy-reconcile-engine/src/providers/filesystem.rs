//! File-backed policy store using `tokio::fs`.
//!
//! A policy file holds one policy document as JSON. The etag handed out on
//! read is derived from the document content, so any change to the file
//! between a read and a write (by this process or anything else) makes the
//! write fail with a conflict.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use aws_lc_rs::digest;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use log::debug;
use tokio::fs;

use super::json::NativeJsonProvider;
use crate::errors::{ReconcileError, Result};
use crate::model::Policy;
use crate::updater::ResourceIamUpdater;

/// Number of digest bytes kept in an etag
const ETAG_DIGEST_LEN: usize = 8;

/// Compute the etag of a policy from its content, ignoring its current etag
pub fn compute_etag(policy: &Policy) -> Result<String> {
    let unstamped = Policy {
        etag: String::new(),
        ..policy.clone()
    };
    let content = NativeJsonProvider::stringify(&unstamped)?;
    let digest = digest::digest(&digest::SHA256, content.as_bytes());
    Ok(STANDARD.encode(&digest.as_ref()[..ETAG_DIGEST_LEN]))
}

/// Policy store backed by a single JSON file.
///
/// A missing file reads as an empty policy and is created on first write.
#[derive(Debug, Clone)]
pub struct FilePolicyUpdater {
    path: PathBuf,
}

impl FilePolicyUpdater {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_stored(&self) -> Result<Policy> {
        let mut policy = match fs::read_to_string(&self.path).await {
            Ok(content) => NativeJsonProvider::parse_policy(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} does not exist, starting from an empty policy", self.path.display());
                Policy::default()
            }
            Err(e) => return Err(ReconcileError::file_system("read", &self.path, e)),
        };
        policy.etag = compute_etag(&policy)?;
        Ok(policy)
    }

    fn staging_path(&self) -> PathBuf {
        let mut file_name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        file_name.push(".tmp");
        self.path.with_file_name(file_name)
    }
}

#[async_trait]
impl ResourceIamUpdater for FilePolicyUpdater {
    async fn get_resource_iam_policy(&self) -> Result<Policy> {
        self.read_stored().await
    }

    async fn set_resource_iam_policy(&self, policy: &Policy) -> Result<()> {
        let current = self.read_stored().await?;
        if current.etag != policy.etag {
            return Err(ReconcileError::Conflict {
                resource: self.describe_resource(),
                expected: policy.etag.clone(),
                found: current.etag,
            });
        }

        let stamped = Policy {
            etag: compute_etag(policy)?,
            ..policy.clone()
        };
        let mut content = NativeJsonProvider::stringify_pretty(&stamped)?;
        content.push('\n');

        let staging = self.staging_path();
        fs::write(&staging, content)
            .await
            .map_err(|e| ReconcileError::file_system("write", &staging, e))?;
        fs::rename(&staging, &self.path)
            .await
            .map_err(|e| ReconcileError::file_system("replace", &self.path, e))?;

        debug!("Wrote {} with etag {}", self.path.display(), stamped.etag);
        Ok(())
    }

    fn get_mutex_key(&self) -> String {
        format!("iam-file-{}", self.path.display())
    }

    fn get_resource_id(&self) -> String {
        self.path.display().to_string()
    }

    fn describe_resource(&self) -> String {
        format!("policy file {:?}", self.get_resource_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Binding, IAM_POLICY_VERSION};
    use crate::modify::PolicyModification;
    use crate::updater::{iam_policy_read_modify_write, PolicyLocks};
    use tempfile::TempDir;

    fn policy_with(bindings: Vec<Binding>) -> Policy {
        Policy {
            version: 1,
            bindings,
            ..Policy::default()
        }
    }

    #[test]
    fn test_compute_etag_ignores_existing_etag() {
        let policy = policy_with(vec![Binding::new("roles/viewer", ["user:a@example.com"])]);
        let stamped = Policy {
            etag: "stale".to_string(),
            ..policy.clone()
        };

        let etag = compute_etag(&policy).expect("should hash");
        assert_eq!(etag, compute_etag(&stamped).expect("should hash"));
        assert_eq!(etag.len(), 12);
        assert_ne!(etag, compute_etag(&Policy::default()).expect("should hash"));
    }

    #[tokio::test]
    async fn test_missing_file_reads_as_empty_policy() {
        let dir = TempDir::new().expect("temp dir");
        let updater = FilePolicyUpdater::new(dir.path().join("policy.json"));

        let policy = updater.get_resource_iam_policy().await.expect("should read");

        assert!(policy.bindings.is_empty());
        assert!(policy.audit_configs.is_empty());
        assert!(!policy.etag.is_empty());
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("policy.json");
        let updater = FilePolicyUpdater::new(&path);

        let mut policy = updater.get_resource_iam_policy().await.expect("should read");
        policy.bindings = vec![Binding::new("roles/viewer", ["user:a@example.com"])];
        updater.set_resource_iam_policy(&policy).await.expect("should write");

        let stored = updater.get_resource_iam_policy().await.expect("should read");
        assert_eq!(stored.bindings, policy.bindings);
        assert_ne!(stored.etag, policy.etag);

        let on_disk = std::fs::read_to_string(&path).expect("file should exist");
        assert!(on_disk.contains(&stored.etag));
        assert!(!dir.path().join("policy.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_stale_etag_is_rejected() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("policy.json");
        let updater = FilePolicyUpdater::new(&path);

        let stale = updater.get_resource_iam_policy().await.expect("should read");
        std::fs::write(
            &path,
            r#"{"version": 1, "bindings": [{"role": "roles/owner", "members": ["user:o@example.com"]}]}"#,
        )
        .expect("external edit");

        let result = updater.set_resource_iam_policy(&stale).await;

        assert!(matches!(result, Err(ref e) if e.is_conflict()), "got {:?}", result);
        let stored = updater.get_resource_iam_policy().await.expect("should read");
        assert_eq!(stored.bindings[0].role, "roles/owner");
    }

    #[tokio::test]
    async fn test_invalid_file_is_reported() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("policy.json");
        std::fs::write(&path, "not json").expect("write");

        let result = FilePolicyUpdater::new(&path).get_resource_iam_policy().await;

        assert!(matches!(result, Err(ReconcileError::Json(_))));
    }

    #[tokio::test]
    async fn test_read_modify_write_against_file() {
        let dir = TempDir::new().expect("temp dir");
        let updater = FilePolicyUpdater::new(dir.path().join("policy.json"));
        let locks = PolicyLocks::new();
        let modification = PolicyModification::SetBinding(
            Binding::new("roles/viewer", ["user:a@example.com"])
                .with_condition(crate::model::Expr::new("t", "", "true")),
        );

        let first = iam_policy_read_modify_write(&updater, &locks, &modification)
            .await
            .expect("first apply");
        let second = iam_policy_read_modify_write(&updater, &locks, &modification)
            .await
            .expect("second apply");

        assert!(first.is_updated());
        assert!(!second.is_updated());
        assert_eq!(second.policy().version, IAM_POLICY_VERSION);
        assert_eq!(updater.get_mutex_key(), format!("iam-file-{}", updater.path().display()));
    }
}
