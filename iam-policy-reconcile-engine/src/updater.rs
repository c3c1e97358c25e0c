//! Read-modify-write cycle against a policy store
//!
//! The engine does not talk to any remote API. Callers implement
//! [`ResourceIamUpdater`] for their store and hand it to
//! [`iam_policy_read_modify_write`], which fetches the current policy,
//! applies a [`PolicyModification`] and writes the result back only if it
//! changed. Stores are expected to reject writes carrying a stale etag with
//! [`ReconcileError::Conflict`]; the conflict is returned to the caller as-is.
//!
//! [`ReconcileError::Conflict`]: crate::errors::ReconcileError::Conflict

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use log::{debug, info, trace};

use crate::compare::{compare_iam_policies, debug_print_audit_configs, debug_print_bindings};
use crate::errors::Result;
use crate::model::Policy;
use crate::modify::PolicyModification;

/// Per-resource access to the policy store
#[async_trait]
pub trait ResourceIamUpdater: Send + Sync {
    /// Fetch the policy currently attached to the resource
    async fn get_resource_iam_policy(&self) -> Result<Policy>;

    /// Replace the policy attached to the resource.
    ///
    /// The policy's etag is the one read by [`Self::get_resource_iam_policy`].
    async fn set_resource_iam_policy(&self, policy: &Policy) -> Result<()>;

    /// Key serializing read-modify-write cycles on this resource,
    /// e.g. `iam-project-{id}`
    fn get_mutex_key(&self) -> String;

    /// Unique resource identifier
    fn get_resource_id(&self) -> String;

    /// Human readable description of the resource, including its identifier
    fn describe_resource(&self) -> String;
}

/// Process-local locks keyed by [`ResourceIamUpdater::get_mutex_key`].
///
/// Entries are never evicted: one lock per resource key for the lifetime of
/// the `PolicyLocks` value. Scope it to a run, not to the whole process, when
/// the set of resources is unbounded.
#[derive(Debug, Default)]
pub struct PolicyLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl PolicyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(key.to_string()).or_default())
    }
}

/// Result of a read-modify-write cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The modified policy was written
    Updated(Policy),
    /// The fetched policy already satisfied the modification; nothing was written
    Unchanged(Policy),
}

impl ApplyOutcome {
    /// The policy now attached to the resource
    pub fn policy(&self) -> &Policy {
        match self {
            Self::Updated(policy) | Self::Unchanged(policy) => policy,
        }
    }

    pub fn is_updated(&self) -> bool {
        matches!(self, Self::Updated(_))
    }
}

/// Fetch the resource's policy under its lock
pub async fn iam_policy_read(updater: &dyn ResourceIamUpdater, locks: &PolicyLocks) -> Result<Policy> {
    let mutex = locks.lock_for(&updater.get_mutex_key());
    let _guard = mutex.lock().await;

    debug!("Retrieving policy for {}", updater.describe_resource());
    let policy = updater.get_resource_iam_policy().await?;
    trace!("Retrieved policy for {}: {:?}", updater.describe_resource(), policy);
    Ok(policy)
}

/// Locked read-modify-write cycle for a resource's policy.
///
/// The write is skipped when the modification does not change the fetched
/// policy, so re-applying an already applied fragment causes no traffic.
pub async fn iam_policy_read_modify_write(
    updater: &dyn ResourceIamUpdater,
    locks: &PolicyLocks,
    modification: &PolicyModification,
) -> Result<ApplyOutcome> {
    let mutex = locks.lock_for(&updater.get_mutex_key());
    let _guard = mutex.lock().await;

    debug!("Retrieving policy for {}", updater.describe_resource());
    let fetched = updater.get_resource_iam_policy().await?;
    trace!("Retrieved policy for {}: {:?}", updater.describe_resource(), fetched);

    let mut modified = fetched.clone();
    modification.apply(&mut modified);

    if compare_iam_policies(&fetched, &modified) {
        info!(
            "Policy for {} already satisfies: {}",
            updater.describe_resource(),
            modification
        );
        return Ok(ApplyOutcome::Unchanged(fetched));
    }

    debug!(
        "Setting policy for {}: bindings {} audit configs {}",
        updater.describe_resource(),
        debug_print_bindings(&modified.bindings),
        debug_print_audit_configs(&modified.audit_configs)
    );
    updater.set_resource_iam_policy(&modified).await?;
    info!("Set policy for {}: {}", updater.describe_resource(), modification);

    Ok(ApplyOutcome::Updated(modified))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::errors::ReconcileError;
    use crate::model::Binding;

    /// In-memory store enforcing etags, counting writes
    struct MemoryUpdater {
        policy: tokio::sync::Mutex<Policy>,
        writes: AtomicUsize,
    }

    impl MemoryUpdater {
        fn new(policy: Policy) -> Self {
            Self {
                policy: tokio::sync::Mutex::new(policy),
                writes: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ResourceIamUpdater for MemoryUpdater {
        async fn get_resource_iam_policy(&self) -> Result<Policy> {
            Ok(self.policy.lock().await.clone())
        }

        async fn set_resource_iam_policy(&self, policy: &Policy) -> Result<()> {
            let mut current = self.policy.lock().await;
            if current.etag != policy.etag {
                return Err(ReconcileError::Conflict {
                    resource: self.describe_resource(),
                    expected: policy.etag.clone(),
                    found: current.etag.clone(),
                });
            }
            let generation = self.writes.fetch_add(1, Ordering::SeqCst) + 1;
            *current = policy.clone();
            current.etag = format!("etag-{}", generation);
            Ok(())
        }

        fn get_mutex_key(&self) -> String {
            "iam-memory-test".to_string()
        }

        fn get_resource_id(&self) -> String {
            "test".to_string()
        }

        fn describe_resource(&self) -> String {
            "memory resource \"test\"".to_string()
        }
    }

    /// Store whose policy moves on between every read and write
    struct RacingUpdater;

    #[async_trait]
    impl ResourceIamUpdater for RacingUpdater {
        async fn get_resource_iam_policy(&self) -> Result<Policy> {
            Ok(Policy {
                etag: "read".to_string(),
                ..Policy::default()
            })
        }

        async fn set_resource_iam_policy(&self, policy: &Policy) -> Result<()> {
            Err(ReconcileError::Conflict {
                resource: self.describe_resource(),
                expected: policy.etag.clone(),
                found: "written-by-someone-else".to_string(),
            })
        }

        fn get_mutex_key(&self) -> String {
            "iam-racing-test".to_string()
        }

        fn get_resource_id(&self) -> String {
            "racing".to_string()
        }

        fn describe_resource(&self) -> String {
            "racing resource".to_string()
        }
    }

    fn add_member(member: &str) -> PolicyModification {
        PolicyModification::AddMember {
            role: "roles/viewer".to_string(),
            member: member.to_string(),
            condition: None,
        }
    }

    #[tokio::test]
    async fn test_read_modify_write_updates_policy() {
        let updater = MemoryUpdater::new(Policy::default());
        let locks = PolicyLocks::new();

        let outcome = iam_policy_read_modify_write(&updater, &locks, &add_member("user:a@example.com"))
            .await
            .expect("write should succeed");

        assert!(outcome.is_updated());
        let stored = iam_policy_read(&updater, &locks)
            .await
            .expect("read should succeed");
        assert_eq!(
            stored.bindings,
            vec![Binding::new("roles/viewer", ["user:a@example.com"])]
        );
        assert_eq!(stored.etag, "etag-1");
    }

    #[tokio::test]
    async fn test_read_modify_write_skips_noop_write() {
        let updater = MemoryUpdater::new(Policy {
            etag: "etag-0".to_string(),
            bindings: vec![
                Binding::new("roles/viewer", ["user:b@example.com"]),
                Binding::new("roles/viewer", ["user:A@example.com"]),
            ],
            ..Policy::default()
        });
        let locks = PolicyLocks::new();

        let outcome = iam_policy_read_modify_write(&updater, &locks, &add_member("user:a@example.com"))
            .await
            .expect("read should succeed");

        assert!(!outcome.is_updated());
        assert_eq!(outcome.policy().etag, "etag-0");
        assert_eq!(updater.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_read_modify_write_returns_conflict() {
        let locks = PolicyLocks::new();

        let result =
            iam_policy_read_modify_write(&RacingUpdater, &locks, &add_member("user:a@example.com"))
                .await;

        assert!(matches!(result, Err(ref e) if e.is_conflict()), "got {:?}", result);
    }

    #[tokio::test]
    async fn test_concurrent_modifications_are_serialized() {
        let updater = Arc::new(MemoryUpdater::new(Policy::default()));
        let locks = Arc::new(PolicyLocks::new());

        let mut handles = Vec::new();
        for i in 0..8 {
            let updater = Arc::clone(&updater);
            let locks = Arc::clone(&locks);
            handles.push(tokio::spawn(async move {
                iam_policy_read_modify_write(
                    updater.as_ref(),
                    &locks,
                    &add_member(&format!("user:{}@example.com", i)),
                )
                .await
            }));
        }
        for handle in handles {
            handle
                .await
                .expect("task should not panic")
                .expect("serialized writes should not conflict");
        }

        let stored = updater
            .get_resource_iam_policy()
            .await
            .expect("read should succeed");
        assert_eq!(stored.bindings.len(), 1);
        assert_eq!(stored.bindings[0].members.len(), 8);
        assert_eq!(updater.writes.load(Ordering::SeqCst), 8);
    }
}
