//! Subcommand implementations on top of the reconcile engine

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use iam_policy_reconcile_engine::{
    compare_audit_configs, compare_bindings, filter_bindings_with_role_and_condition,
    iam_policy_read, iam_policy_read_modify_write, merge_bindings, missing_bindings,
    remove_all_audit_configs_with_service, subtract_from_bindings, ApplyOutcome, AuditConfig,
    Binding, Expr, FilePolicyUpdater, NativeJsonProvider, Policy, PolicyLocks, PolicyModification,
};
use log::{debug, info};
use serde::de::DeserializeOwned;

async fn read_input(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

async fn read_bindings(path: &Path) -> Result<Vec<Binding>> {
    Ok(read_policy_document(path).await?.bindings)
}

/// Read a policy object or a bare list of bindings
async fn read_policy_document(path: &Path) -> Result<Policy> {
    let content = read_input(path).await?;
    NativeJsonProvider::parse_policy_document(&content)
        .with_context(|| format!("Failed to parse bindings from {}", path.display()))
}

async fn read_audit_configs(path: &Path) -> Result<Vec<AuditConfig>> {
    let content = read_input(path).await?;
    NativeJsonProvider::parse_audit_configs(&content)
        .with_context(|| format!("Failed to parse audit configs from {}", path.display()))
}

/// Read a single JSON document of any shape
pub async fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = read_input(path).await?;
    NativeJsonProvider::parse(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

pub async fn read_policy(path: &Path) -> Result<Policy> {
    let content = read_input(path).await?;
    NativeJsonProvider::parse_policy(&content)
        .with_context(|| format!("Failed to parse policy from {}", path.display()))
}

pub async fn merge(files: &[PathBuf]) -> Result<Vec<Binding>> {
    let mut bindings = Vec::new();
    for file in files {
        let file_bindings = read_bindings(file).await?;
        debug!("Read {} binding(s) from {}", file_bindings.len(), file.display());
        bindings.extend(file_bindings);
    }
    Ok(merge_bindings(&bindings))
}

pub async fn subtract(base: &Path, remove: &Path) -> Result<Vec<Binding>> {
    let bindings = read_bindings(base).await?;
    let to_remove = read_bindings(remove).await?;
    Ok(subtract_from_bindings(&bindings, &to_remove))
}

pub async fn filter(file: &Path, role: &str, condition: Option<&Expr>) -> Result<Vec<Binding>> {
    let bindings = read_bindings(file).await?;
    Ok(filter_bindings_with_role_and_condition(&bindings, role, condition))
}

pub async fn remove_audit_service(file: &Path, service: &str) -> Result<Vec<AuditConfig>> {
    let audit_configs = read_audit_configs(file).await?;
    Ok(remove_all_audit_configs_with_service(&audit_configs, service))
}

/// Compare two policies; `None` when equivalent, otherwise the differing bindings
pub async fn compare(a: &Path, b: &Path) -> Result<Option<Vec<Binding>>> {
    let a_policy = read_policy_document(a).await?;
    let b_policy = read_policy_document(b).await?;

    let bindings_equal = compare_bindings(&a_policy.bindings, &b_policy.bindings);
    let audit_equal = compare_audit_configs(&a_policy.audit_configs, &b_policy.audit_configs);
    if bindings_equal && audit_equal {
        info!("{} and {} are equivalent", a.display(), b.display());
        return Ok(None);
    }

    if !audit_equal {
        info!("Audit configs of {} and {} differ", a.display(), b.display());
    }
    Ok(Some(missing_bindings(&a_policy.bindings, &b_policy.bindings)))
}

pub async fn show(policy_file: &Path) -> Result<Policy> {
    let updater = FilePolicyUpdater::new(policy_file);
    Ok(iam_policy_read(&updater, &PolicyLocks::new()).await?)
}

pub async fn apply(policy_file: &Path, modification: &PolicyModification) -> Result<ApplyOutcome> {
    let updater = FilePolicyUpdater::new(policy_file);
    iam_policy_read_modify_write(&updater, &PolicyLocks::new(), modification)
        .await
        .with_context(|| format!("Failed to apply {} to {}", modification, policy_file.display()))
}

/// JSON schema of a policy document
pub fn schema() -> Result<String> {
    let schema = schemars::schema_for!(Policy);
    Ok(NativeJsonProvider::stringify_pretty(&schema)?)
}
