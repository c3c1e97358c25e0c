//! Canonical audit config map and service removal
//!
//! Audit configs canonicalize like bindings, one level deeper:
//! `service -> log type -> exempted members`. Unlike bindings, a log type
//! with no exemptions is kept, since the presence of a log type is what
//! enables that kind of audit logging.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::model::{AuditConfig, AuditLogConfig};

/// Exempted members per log type for one service
pub type AuditLogConfigMap = BTreeMap<String, BTreeSet<String>>;

/// Canonical `service -> log type -> exempted members` form of an audit config list
pub type AuditConfigMap = BTreeMap<String, AuditLogConfigMap>;

/// Build the service to audit log config map from a list of audit configs
pub fn create_iam_audit_configs_map(audit_configs: &[AuditConfig]) -> AuditConfigMap {
    let mut audit_config_map = AuditConfigMap::new();

    for audit_config in audit_configs {
        let log_config_map = audit_config_map
            .entry(audit_config.service.clone())
            .or_default();

        for log_config in &audit_config.audit_log_configs {
            log_config_map
                .entry(log_config.log_type.clone())
                .or_default()
                .extend(log_config.exempted_members.iter().cloned());
        }
    }

    audit_config_map
}

/// Construct the list of audit configs from an audit config map.
///
/// Services without any log type are dropped. Log types without exemptions
/// are emitted with an empty exemption list.
pub fn list_from_iam_audit_config_map(audit_config_map: AuditConfigMap) -> Vec<AuditConfig> {
    audit_config_map
        .into_iter()
        .filter(|(_, log_config_map)| !log_config_map.is_empty())
        .map(|(service, log_config_map)| AuditConfig {
            service,
            audit_log_configs: log_config_map
                .into_iter()
                .map(|(log_type, exempted_members)| AuditLogConfig {
                    log_type,
                    exempted_members: exempted_members.into_iter().collect(),
                })
                .collect(),
        })
        .collect()
}

/// Flatten audit configs so each service has a single entry with one
/// config per log type carrying the combined exemptions
pub fn merge_audit_configs(audit_configs: &[AuditConfig]) -> Vec<AuditConfig> {
    list_from_iam_audit_config_map(create_iam_audit_configs_map(audit_configs))
}

/// Remove every audit config for `service`, however many entries carry it.
///
/// The remaining configs come back merged per service.
pub fn remove_all_audit_configs_with_service(
    audit_configs: &[AuditConfig],
    service: &str,
) -> Vec<AuditConfig> {
    let mut audit_config_map = create_iam_audit_configs_map(audit_configs);
    if audit_config_map.remove(service).is_some() {
        debug!("Removed audit config for service {}", service);
    }
    list_from_iam_audit_config_map(audit_config_map)
}
