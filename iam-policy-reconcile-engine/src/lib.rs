//! Convergent reconciliation of IAM policy bindings and audit configs.
//!
//! Policies are reduced to canonical maps keyed by role and condition (for
//! bindings) or by service and log type (for audit configs). Merging,
//! subtracting, filtering and comparing all go through those maps, so results
//! do not depend on input order or duplication and re-applying an operation is
//! a no-op.
//!
//! ```
//! use iam_policy_reconcile_engine::{merge_bindings, Binding};
//!
//! let merged = merge_bindings(&[
//!     Binding::new("roles/viewer", ["user:b@example.com"]),
//!     Binding::new("roles/viewer", ["user:a@example.com", "user:b@example.com"]),
//! ]);
//!
//! assert_eq!(
//!     merged,
//!     vec![Binding::new("roles/viewer", ["user:a@example.com", "user:b@example.com"])]
//! );
//! ```
//!
//! The [`updater`] module wraps these operations in a locked
//! read-modify-write cycle against any store implementing
//! [`ResourceIamUpdater`]; [`FilePolicyUpdater`] is a store backed by a JSON
//! file.

pub mod audit_configs;
pub mod bindings;
pub mod compare;
pub mod condition_key;
pub mod errors;
pub mod members;
pub mod model;
pub mod modify;
pub mod providers;
pub mod updater;

pub use audit_configs::{
    create_iam_audit_configs_map, list_from_iam_audit_config_map, merge_audit_configs,
    remove_all_audit_configs_with_service, AuditConfigMap,
};
pub use bindings::{
    create_iam_bindings_map, filter_bindings_with_role_and_condition, list_from_iam_binding_map,
    merge_bindings, subtract_from_bindings, BindingKey, BindingMap,
};
pub use compare::{
    compare_audit_configs, compare_bindings, compare_iam_policies, missing_bindings,
};
pub use condition_key::ConditionKey;
pub use errors::{ReconcileError, Result};
pub use model::{AuditConfig, AuditLogConfig, Binding, Expr, Policy, IAM_POLICY_VERSION};
pub use modify::PolicyModification;
pub use providers::{FilePolicyUpdater, NativeJsonProvider};
pub use updater::{
    iam_policy_read, iam_policy_read_modify_write, ApplyOutcome, PolicyLocks, ResourceIamUpdater,
};
