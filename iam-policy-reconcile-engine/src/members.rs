//! Principal identifier normalization
//!
//! IAM ignores the casing of most member values, so `user:Alice@Example.com`
//! and `user:alice@example.com` name the same principal. Members are
//! `<type>:<value>`: the type is case sensitive and kept as-is, the value is
//! lowercased unless the member is one of the case sensitive kinds below.
//! A `deleted:` prefix marks a principal that was removed out of band.

const DELETED_PREFIX: &str = "deleted:";

const CASE_SENSITIVE_IDENTIFIERS: [&str; 2] = ["allAuthenticatedUsers", "allUsers"];

const CASE_SENSITIVE_PREFIXES: [&str; 3] = ["principalSet:", "principal:", "principalHierarchy:"];

/// Whether IAM compares this member case sensitively
pub fn member_is_case_sensitive(member: &str) -> bool {
    CASE_SENSITIVE_IDENTIFIERS
        .iter()
        .any(|identifier| member.contains(identifier))
        || CASE_SENSITIVE_PREFIXES
            .iter()
            .any(|prefix| member.starts_with(prefix))
}

/// Return the member with its value lowercased where IAM ignores casing
pub fn normalize_member_casing(member: &str) -> String {
    if let Some(principal) = member.strip_prefix(DELETED_PREFIX) {
        if member_is_case_sensitive(principal) {
            return member.to_string();
        }
        return match principal.split_once(':') {
            Some((kind, value)) => format!("{}{}:{}", DELETED_PREFIX, kind, value.to_lowercase()),
            None => member.to_string(),
        };
    }

    if member_is_case_sensitive(member) {
        return member.to_string();
    }

    match member.split_once(':') {
        Some((kind, value)) => format!("{}:{}", kind, value.to_lowercase()),
        None => member.to_string(),
    }
}
