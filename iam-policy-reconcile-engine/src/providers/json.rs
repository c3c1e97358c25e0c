//! JSON reading and writing of policies and policy fragments.
//!
//! Policy fragments arrive either as a full policy object or as a bare list
//! (of bindings or of audit configs); both shapes are accepted wherever a
//! list is expected.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::model::{AuditConfig, Binding, Policy};

#[derive(Deserialize)]
#[serde(untagged)]
enum PolicyDocument {
    Bindings(Vec<Binding>),
    Policy(Policy),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AuditConfigsDocument {
    List(Vec<AuditConfig>),
    Policy(Policy),
}

/// Native JSON provider using `serde_json` for policy documents.
///
/// Reads full policies and the fragments the CLI and updaters pass around,
/// and writes canonical output in compact or pretty-printed form.
///
/// # Thread Safety
///
/// This provider is `Send + Sync` and can be safely shared across threads.
/// All operations are stateless and do not require mutable access.
///
/// # Document Shapes
///
/// - A policy object: `{"version": .., "etag": .., "bindings": [..], "auditConfigs": [..]}`
/// - A bare list of bindings, each carrying a `role`
/// - A bare list of audit configs, each carrying a `service`
///
/// Explicit `null` collections read as empty. A list of the wrong kind is
/// rejected rather than read as empty entries.
///
/// # Error Handling
///
/// Every failure is reported as [`ReconcileError::Json`] carrying the
/// `serde_json` error, which includes:
/// - Line and column information for syntax errors
/// - The missing field or mismatched type for shape errors
///
/// [`ReconcileError::Json`]: crate::errors::ReconcileError::Json
#[derive(Debug, Clone)]
pub struct NativeJsonProvider;

impl NativeJsonProvider {
    /// Parse JSON string into a typed value.
    ///
    /// The building block for the shape-specific parsers below; also used
    /// directly for single bindings and audit configs.
    pub fn parse<T>(json_str: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        Ok(serde_json::from_str(json_str)?)
    }

    /// Parse a policy object.
    ///
    /// Missing fields take their defaults, so `{}` is an empty policy.
    pub fn parse_policy(json_str: &str) -> Result<Policy> {
        Self::parse(json_str)
    }

    /// Parse either a policy object or a bare list of bindings.
    ///
    /// A list becomes a policy holding only those bindings.
    pub fn parse_policy_document(json_str: &str) -> Result<Policy> {
        Ok(match Self::parse::<PolicyDocument>(json_str)? {
            PolicyDocument::Bindings(bindings) => Policy {
                bindings,
                ..Policy::default()
            },
            PolicyDocument::Policy(policy) => policy,
        })
    }

    /// Parse bindings from either a policy object or a list of bindings.
    ///
    /// A list whose entries lack a `role` (an audit config list, say) is an error.
    pub fn parse_bindings(json_str: &str) -> Result<Vec<Binding>> {
        Ok(Self::parse_policy_document(json_str)?.bindings)
    }

    /// Parse audit configs from either a policy object or a list of audit configs.
    ///
    /// A list whose entries lack a `service` (a binding list, say) is an error.
    pub fn parse_audit_configs(json_str: &str) -> Result<Vec<AuditConfig>> {
        Ok(match Self::parse::<AuditConfigsDocument>(json_str)? {
            AuditConfigsDocument::List(audit_configs) => audit_configs,
            AuditConfigsDocument::Policy(policy) => policy.audit_configs,
        })
    }

    /// Serialize a value to a compact, single-line JSON string.
    pub fn stringify<T>(value: &T) -> Result<String>
    where
        T: ?Sized + Serialize,
    {
        Ok(serde_json::to_string(value)?)
    }

    /// Serialize a value to an indented JSON string.
    ///
    /// Used for policy files and `--pretty` output.
    pub fn stringify_pretty<T>(value: &T) -> Result<String>
    where
        T: ?Sized + Serialize,
    {
        Ok(serde_json::to_string_pretty(value)?)
    }
}
