//! IAM policy data model
//!
//! These types mirror the Cloud Resource Manager v1 JSON representation of a
//! policy. Every collection defaults to empty so that missing or `null`
//! fields in fetched policies deserialize as empty sets instead of failing.
//! A binding's `role` and an audit config's `service` are required.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

/// Policy version required whenever a binding carries a condition.
pub const IAM_POLICY_VERSION: i32 = 3;

/// Deserialize an explicit `null` as the type's default
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A textual access condition in Common Expression Language syntax.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Expr {
    /// Short string describing the purpose of the expression
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    /// Longer description of the expression
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// The CEL expression text
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub expression: String,
}

impl Expr {
    /// Create a new condition expression
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        expression: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            expression: expression.into(),
        }
    }
}

/// Associates members, or principals, with a role, optionally scoped by a condition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    /// Role assigned to the members (e.g., "roles/viewer")
    pub role: String,
    /// Principals granted the role (e.g., "user:alice@example.com")
    #[serde(default, deserialize_with = "null_as_default")]
    pub members: Vec<String>,
    /// Condition scoping the binding, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Expr>,
}

impl Binding {
    /// Create an unconditional binding
    pub fn new<I, S>(role: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            role: role.into(),
            members: members.into_iter().map(Into::into).collect(),
            condition: None,
        }
    }

    /// Attach a condition to this binding
    #[must_use]
    pub fn with_condition(mut self, condition: Expr) -> Self {
        self.condition = Some(condition);
        self
    }
}

/// Configuration for logging one type of permission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogConfig {
    /// Log type (e.g., "DATA_READ", "DATA_WRITE", "ADMIN_READ")
    #[serde(default)]
    pub log_type: String,
    /// Identities exempted from this type of logging.
    ///
    /// Always serialized, an explicit empty list clears exemptions remotely.
    #[serde(default, deserialize_with = "null_as_default")]
    pub exempted_members: Vec<String>,
}

impl AuditLogConfig {
    /// Create a new audit log config
    pub fn new<I, S>(log_type: impl Into<String>, exempted_members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            log_type: log_type.into(),
            exempted_members: exempted_members.into_iter().map(Into::into).collect(),
        }
    }
}

/// Audit configuration for one service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditConfig {
    /// Service the config applies to (e.g., "storage.googleapis.com", "allServices")
    pub service: String,
    /// Per log type configuration
    #[serde(default, deserialize_with = "null_as_default")]
    pub audit_log_configs: Vec<AuditLogConfig>,
}

impl AuditConfig {
    /// Create a new audit config
    pub fn new(service: impl Into<String>, audit_log_configs: Vec<AuditLogConfig>) -> Self {
        Self {
            service: service.into(),
            audit_log_configs,
        }
    }
}

/// An IAM policy: role bindings plus audit configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    /// Policy format version (0, 1 or 3)
    #[serde(default)]
    pub version: i32,
    /// Optimistic concurrency token returned by the remote store
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub etag: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub bindings: Vec<Binding>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub audit_configs: Vec<AuditConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_deserializes_missing_fields_as_empty() {
        let policy: Policy = serde_json::from_str(r#"{"bindings": [{"role": "roles/viewer"}]}"#)
            .expect("policy should parse");

        assert_eq!(policy.version, 0);
        assert!(policy.etag.is_empty());
        assert!(policy.audit_configs.is_empty());
        assert_eq!(policy.bindings.len(), 1);
        assert!(policy.bindings[0].members.is_empty());
        assert!(policy.bindings[0].condition.is_none());
    }

    #[test]
    fn test_null_collections_deserialize_as_empty() {
        let policy: Policy = serde_json::from_str(
            r#"{
                "bindings": [{"role": "roles/viewer", "members": null}],
                "auditConfigs": [
                    {"service": "allServices", "auditLogConfigs": null},
                    {"service": "foo.googleapis.com", "auditLogConfigs": [{"logType": "DATA_READ", "exemptedMembers": null}]}
                ]
            }"#,
        )
        .expect("policy should parse");

        assert!(policy.bindings[0].members.is_empty());
        assert!(policy.audit_configs[0].audit_log_configs.is_empty());
        assert!(policy.audit_configs[1].audit_log_configs[0].exempted_members.is_empty());

        let empty: Policy = serde_json::from_str(r#"{"bindings": null, "auditConfigs": null}"#)
            .expect("policy should parse");
        assert_eq!(empty, Policy::default());
    }

    #[test]
    fn test_binding_requires_role() {
        let result = serde_json::from_str::<Binding>(r#"{"members": ["user:a@example.com"]}"#);
        assert!(result.is_err());

        let result = serde_json::from_str::<AuditConfig>(r#"{"auditLogConfigs": []}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_binding_condition_round_trips_camel_case() {
        let binding = Binding::new("roles/viewer", ["user:alice@example.com"]).with_condition(
            Expr::new("expirable", "", "request.time < timestamp('2030-01-01T00:00:00Z')"),
        );

        let json = serde_json::to_value(&binding).expect("binding should serialize");
        assert_eq!(json["condition"]["title"], "expirable");
        assert!(json["condition"].get("description").is_none());

        let parsed: Binding = serde_json::from_value(json).expect("binding should parse");
        assert_eq!(parsed, binding);
    }

    #[test]
    fn test_audit_log_config_always_sends_exempted_members() {
        let config = AuditConfig::new(
            "foo.googleapis.com",
            vec![AuditLogConfig::new("ADMIN_READ", Vec::<String>::new())],
        );

        let json = serde_json::to_string(&config).expect("config should serialize");
        assert!(json.contains(r#""exemptedMembers":[]"#), "json was: {}", json);
        assert!(json.contains(r#""auditLogConfigs""#), "json was: {}", json);
    }
}
