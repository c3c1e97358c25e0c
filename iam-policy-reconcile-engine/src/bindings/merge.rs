//! Binding merge

use log::trace;

use super::{create_iam_bindings_map, list_from_iam_binding_map};
use crate::model::Binding;

/// Flatten a list of bindings so each role and condition has a single binding
/// with the combined members.
///
/// Merging is commutative and associative over the input: merging `[a, b]`
/// and then `[c]` gives the same result as merging `[a, b, c]` at once.
pub fn merge_bindings(bindings: &[Binding]) -> Vec<Binding> {
    trace!("Merging {} bindings", bindings.len());
    let merged = list_from_iam_binding_map(create_iam_bindings_map(bindings));
    trace!("Merged into {} bindings", merged.len());
    merged
}
