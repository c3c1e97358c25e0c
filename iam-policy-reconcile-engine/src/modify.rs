//! Policy modifications for additive and authoritative policy fragments
//!
//! Each declared fragment maps to one [`PolicyModification`]. Applying it to
//! a freshly fetched policy produces the policy to write back. Additive
//! modifications merge into whatever else is bound; authoritative ones own
//! their role+condition, service, or the whole policy.

use std::fmt;

use log::debug;

use crate::audit_configs::{merge_audit_configs, remove_all_audit_configs_with_service};
use crate::bindings::{
    filter_bindings_with_role_and_condition, merge_bindings, subtract_from_bindings,
};
use crate::condition_key::ConditionKey;
use crate::model::{AuditConfig, Binding, Expr, Policy, IAM_POLICY_VERSION};

/// A change to apply to a fetched policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyModification {
    /// Grant a role to one member, leaving other members of the role alone
    AddMember {
        role: String,
        member: String,
        condition: Option<Expr>,
    },
    /// Revoke a role from one member
    RemoveMember {
        role: String,
        member: String,
        condition: Option<Expr>,
    },
    /// Replace every member of the binding's role and condition
    SetBinding(Binding),
    /// Remove a role and condition binding entirely
    RemoveBinding {
        role: String,
        condition: Option<Expr>,
    },
    /// Replace the audit config of one service
    SetAuditConfig(AuditConfig),
    /// Remove all audit configuration for a service
    RemoveAuditConfig { service: String },
    /// Replace all bindings and audit configs
    SetPolicy {
        bindings: Vec<Binding>,
        audit_configs: Vec<AuditConfig>,
    },
}

impl PolicyModification {
    /// Apply this modification to `policy` in place.
    ///
    /// The resulting bindings and audit configs are canonical. Applying the
    /// same modification again leaves the policy unchanged.
    pub fn apply(&self, policy: &mut Policy) {
        debug!("Applying modification: {}", self);

        match self {
            Self::AddMember {
                role,
                member,
                condition,
            } => {
                let mut bindings = policy.bindings.clone();
                bindings.push(single_member_binding(role, member, condition.as_ref()));
                policy.bindings = bindings;
            }
            Self::RemoveMember {
                role,
                member,
                condition,
            } => {
                policy.bindings = subtract_from_bindings(
                    &policy.bindings,
                    &[single_member_binding(role, member, condition.as_ref())],
                );
            }
            Self::SetBinding(binding) => {
                let mut bindings = filter_bindings_with_role_and_condition(
                    &policy.bindings,
                    &binding.role,
                    binding.condition.as_ref(),
                );
                bindings.push(binding.clone());
                policy.bindings = bindings;
            }
            Self::RemoveBinding { role, condition } => {
                policy.bindings = filter_bindings_with_role_and_condition(
                    &policy.bindings,
                    role,
                    condition.as_ref(),
                );
            }
            Self::SetAuditConfig(audit_config) => {
                let mut audit_configs = remove_all_audit_configs_with_service(
                    &policy.audit_configs,
                    &audit_config.service,
                );
                audit_configs.push(audit_config.clone());
                policy.audit_configs = audit_configs;
            }
            Self::RemoveAuditConfig { service } => {
                policy.audit_configs =
                    remove_all_audit_configs_with_service(&policy.audit_configs, service);
            }
            Self::SetPolicy {
                bindings,
                audit_configs,
            } => {
                policy.bindings = bindings.clone();
                policy.audit_configs = audit_configs.clone();
            }
        }

        policy.bindings = merge_bindings(&policy.bindings);
        policy.audit_configs = merge_audit_configs(&policy.audit_configs);

        if policy.version < IAM_POLICY_VERSION
            && policy.bindings.iter().any(|binding| binding.condition.is_some())
        {
            debug!(
                "Raising policy version from {} to {} for conditional bindings",
                policy.version, IAM_POLICY_VERSION
            );
            policy.version = IAM_POLICY_VERSION;
        }
    }
}

impl fmt::Display for PolicyModification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddMember {
                role,
                member,
                condition,
            } => write!(f, "add {} to {}{}", member, role, describe(condition.as_ref())),
            Self::RemoveMember {
                role,
                member,
                condition,
            } => write!(f, "remove {} from {}{}", member, role, describe(condition.as_ref())),
            Self::SetBinding(binding) => write!(
                f,
                "set {} member(s) on {}{}",
                binding.members.len(),
                binding.role,
                describe(binding.condition.as_ref())
            ),
            Self::RemoveBinding { role, condition } => {
                write!(f, "remove binding {}{}", role, describe(condition.as_ref()))
            }
            Self::SetAuditConfig(audit_config) => {
                write!(f, "set audit config for {}", audit_config.service)
            }
            Self::RemoveAuditConfig { service } => {
                write!(f, "remove audit config for {}", service)
            }
            Self::SetPolicy {
                bindings,
                audit_configs,
            } => write!(
                f,
                "replace policy with {} binding(s) and {} audit config(s)",
                bindings.len(),
                audit_configs.len()
            ),
        }
    }
}

fn single_member_binding(role: &str, member: &str, condition: Option<&Expr>) -> Binding {
    Binding {
        role: role.to_string(),
        members: vec![member.to_string()],
        condition: condition.cloned(),
    }
}

fn describe(condition: Option<&Expr>) -> String {
    let key = ConditionKey::from_condition(condition);
    if key.is_empty() {
        String::new()
    } else {
        format!(" [{}]", key)
    }
}
