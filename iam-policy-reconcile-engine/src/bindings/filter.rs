//! Binding removal: whole role+condition filtering and member-level subtraction

use log::{debug, trace};

use super::{create_iam_bindings_map, list_from_iam_binding_map, BindingKey};
use crate::model::{Binding, Expr};

/// Remove a single role and condition binding from a list of bindings.
///
/// Every member under the matching key disappears regardless of value. The
/// remaining bindings come back in canonical form.
pub fn filter_bindings_with_role_and_condition(
    bindings: &[Binding],
    role: &str,
    condition: Option<&Expr>,
) -> Vec<Binding> {
    let mut binding_map = create_iam_bindings_map(bindings);
    let key = BindingKey::new(role, condition);
    if binding_map.remove(&key).is_some() {
        debug!("Removed binding for role {} ({})", role, key.condition);
    }
    list_from_iam_binding_map(binding_map)
}

/// Remove the given role+condition/member pairs from the given bindings.
///
/// Keys absent from `bindings` are ignored, subtraction never creates
/// entries. A binding that loses all of its members is dropped.
pub fn subtract_from_bindings(bindings: &[Binding], to_remove: &[Binding]) -> Vec<Binding> {
    let mut current = create_iam_bindings_map(bindings);
    let removals = create_iam_bindings_map(to_remove);

    for (key, remove_set) in removals {
        let Some(members) = current.get_mut(&key) else {
            trace!("Nothing bound for role {} ({}), skipping", key.role, key.condition);
            continue;
        };

        members.retain(|member| !remove_set.contains(member));

        if members.is_empty() {
            debug!("Binding for role {} ({}) is now empty", key.role, key.condition);
            current.remove(&key);
        }
    }

    list_from_iam_binding_map(current)
}
