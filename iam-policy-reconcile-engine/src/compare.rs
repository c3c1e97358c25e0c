//! Order-independent policy comparison
//!
//! Comparisons go through the canonical maps, so two lists that differ only
//! in ordering, duplication or member casing compare equal. This is what lets
//! a caller decide that no write is needed.

use std::collections::BTreeSet;

use log::debug;
use serde::Serialize;

use crate::audit_configs::create_iam_audit_configs_map;
use crate::bindings::{create_iam_bindings_map, list_from_iam_binding_map, BindingMap};
use crate::model::{AuditConfig, Binding, Policy};

/// Whether two binding lists grant the same members under the same keys
pub fn compare_bindings(a: &[Binding], b: &[Binding]) -> bool {
    create_iam_bindings_map(a) == create_iam_bindings_map(b)
}

/// Whether two audit config lists describe the same logging
pub fn compare_audit_configs(a: &[AuditConfig], b: &[AuditConfig]) -> bool {
    create_iam_audit_configs_map(a) == create_iam_audit_configs_map(b)
}

/// Whether two policies are equivalent: same etag, version, bindings and audit configs
pub fn compare_iam_policies(a: &Policy, b: &Policy) -> bool {
    if a.etag != b.etag {
        debug!("Policies etag differ: {:?} vs {:?}", a.etag, b.etag);
        return false;
    }
    if a.version != b.version {
        debug!("Policies version differ: {} vs {}", a.version, b.version);
        return false;
    }
    if !compare_bindings(&a.bindings, &b.bindings) {
        debug!(
            "Policies bindings differ: {} vs {}",
            debug_print_bindings(&a.bindings),
            debug_print_bindings(&b.bindings)
        );
        return false;
    }
    if !compare_audit_configs(&a.audit_configs, &b.audit_configs) {
        debug!(
            "Policies audit configs differ: {} vs {}",
            debug_print_audit_configs(&a.audit_configs),
            debug_print_audit_configs(&b.audit_configs)
        );
        return false;
    }
    true
}

/// Return the bindings that differ between `a` and `b`.
///
/// For a key present on both sides, the result holds the members bound on
/// exactly one side. Keys present on one side only are returned whole.
pub fn missing_bindings(a: &[Binding], b: &[Binding]) -> Vec<Binding> {
    let a_map = create_iam_bindings_map(a);
    let b_map = create_iam_bindings_map(b);
    let mut results = BindingMap::new();

    for (key, a_members) in &a_map {
        match b_map.get(key) {
            Some(b_members) => {
                let difference: BTreeSet<String> = a_members
                    .symmetric_difference(b_members)
                    .cloned()
                    .collect();
                if !difference.is_empty() {
                    results.insert(key.clone(), difference);
                }
            }
            None => {
                results.insert(key.clone(), a_members.clone());
            }
        }
    }

    for (key, b_members) in &b_map {
        if !a_map.contains_key(key) {
            results.insert(key.clone(), b_members.clone());
        }
    }

    list_from_iam_binding_map(results)
}

/// Render bindings as indented JSON for log output
pub fn debug_print_bindings(bindings: &[Binding]) -> String {
    debug_print(bindings)
}

/// Render audit configs as indented JSON for log output
pub fn debug_print_audit_configs(audit_configs: &[AuditConfig]) -> String {
    debug_print(audit_configs)
}

fn debug_print<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("<unprintable: {}>", e))
}
