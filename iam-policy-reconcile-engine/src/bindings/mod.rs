//! Canonical binding map
//!
//! A [`BindingMap`] maps each `(role, condition)` pair to the set of members
//! bound under it. Building the map from a list and converting it back is the
//! canonicalization every binding operation goes through: duplicate keys are
//! unioned, duplicate members collapse, keys without members disappear, and
//! the emitted list is sorted by role then condition with sorted members.

use std::collections::{BTreeMap, BTreeSet};

use log::trace;

use crate::condition_key::ConditionKey;
use crate::members::normalize_member_casing;
use crate::model::{Binding, Expr};

mod filter;
mod merge;

pub use filter::{filter_bindings_with_role_and_condition, subtract_from_bindings};
pub use merge::merge_bindings;

/// Identity of a binding: role plus condition
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingKey {
    pub role: String,
    pub condition: ConditionKey,
}

impl BindingKey {
    /// Create a key for a role and an optional condition
    pub fn new(role: impl Into<String>, condition: Option<&Expr>) -> Self {
        Self {
            role: role.into(),
            condition: ConditionKey::from_condition(condition),
        }
    }

    /// Key of an existing binding
    pub fn from_binding(binding: &Binding) -> Self {
        Self::new(binding.role.clone(), binding.condition.as_ref())
    }
}

/// Canonical `(role, condition) -> members` form of a binding list
pub type BindingMap = BTreeMap<BindingKey, BTreeSet<String>>;

/// Construct the map of role and condition to member set from a list of bindings.
///
/// Members are normalized with [`normalize_member_casing`] before insertion.
/// Bindings without members contribute nothing.
pub fn create_iam_bindings_map(bindings: &[Binding]) -> BindingMap {
    let mut binding_map = BindingMap::new();

    for binding in bindings {
        if binding.members.is_empty() {
            trace!("Skipping binding for {} without members", binding.role);
            continue;
        }

        binding_map
            .entry(BindingKey::from_binding(binding))
            .or_default()
            .extend(binding.members.iter().map(|member| normalize_member_casing(member)));
    }

    binding_map
}

/// Return the ordered list of bindings for a map of role and condition to member sets.
///
/// Keys whose member set is empty are dropped, which is how a binding that
/// lost all of its members disappears from a policy.
pub fn list_from_iam_binding_map(binding_map: BindingMap) -> Vec<Binding> {
    binding_map
        .into_iter()
        .filter(|(_, members)| !members.is_empty())
        .map(|(key, members)| Binding {
            condition: key.condition.to_condition(),
            role: key.role,
            members: members.into_iter().collect(),
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod test_utils {
    use crate::model::{Binding, Expr};

    pub(crate) fn binding(role: &str, members: &[&str]) -> Binding {
        Binding::new(role, members.iter().copied())
    }

    pub(crate) fn conditional(role: &str, members: &[&str], title: &str) -> Binding {
        binding(role, members).with_condition(Expr::new(title, "", format!("{} == true", title)))
    }
}
