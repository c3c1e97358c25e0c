//! iam-policy-reconcile command line tool.
//!
//! Reads policies and policy fragments as JSON and writes canonical JSON to
//! stdout.
//!
//! ```bash
//! # Merge the bindings of several policies
//! iam-policy-reconcile merge current.json declared.json
//!
//! # Grant a role against a policy file, idempotently
//! iam-policy-reconcile apply --policy-file policy.json \
//!     --role roles/viewer --add-member user:alice@example.com
//! ```

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use iam_policy_reconcile_engine::{ApplyOutcome, Expr, NativeJsonProvider, PolicyModification};
use log::LevelFilter;
use serde::Serialize;

/// Exit code for a comparison that found differences
const EXIT_MISMATCH: u8 = 1;
/// Exit code for invalid input or a failed operation
const EXIT_ERROR: u8 = 2;

/// Merge, subtract, compare and apply IAM policy bindings and audit configs.
#[derive(Parser)]
#[command(name = "iam-policy-reconcile")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Pretty-print JSON output
    #[arg(long, global = true, env = "IAM_RECONCILE_PRETTY")]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge the bindings of one or more policies or binding lists.
    Merge {
        /// JSON files, each a policy object or a list of bindings
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Remove the members bound in REMOVE from the bindings in BASE.
    Subtract {
        /// Policy or binding list to subtract from
        base: PathBuf,

        /// Policy or binding list to subtract
        remove: PathBuf,
    },

    /// Drop one role and condition binding entirely.
    Filter {
        /// Policy or binding list
        file: PathBuf,

        /// Role to drop
        #[arg(long)]
        role: String,

        #[command(flatten)]
        condition: ConditionArgs,
    },

    /// Drop all audit configuration of a service.
    RemoveAuditService {
        /// Policy or audit config list
        file: PathBuf,

        /// Service to drop (e.g. storage.googleapis.com, allServices)
        #[arg(long)]
        service: String,
    },

    /// Compare the bindings and audit configs of two policies.
    ///
    /// Exits 0 when equivalent, 1 otherwise; differing bindings are printed.
    Compare {
        a: PathBuf,
        b: PathBuf,
    },

    /// Print the policy stored in a policy file.
    Show {
        /// Policy file
        #[arg(long, env = "IAM_RECONCILE_POLICY_FILE")]
        policy_file: PathBuf,
    },

    /// Apply one modification to a policy file.
    Apply {
        /// Policy file, created if missing
        #[arg(long, env = "IAM_RECONCILE_POLICY_FILE")]
        policy_file: PathBuf,

        /// Role for --add-member, --remove-member and --remove-binding
        #[arg(long)]
        role: Option<String>,

        #[command(flatten)]
        condition: ConditionArgs,

        #[command(flatten)]
        modification: ModificationArgs,
    },

    /// Print the JSON schema of a policy document.
    Schema,
}

#[derive(Args)]
struct ConditionArgs {
    /// Condition title
    #[arg(long)]
    condition_title: Option<String>,

    /// Condition description
    #[arg(long)]
    condition_description: Option<String>,

    /// Condition CEL expression
    #[arg(long)]
    condition_expression: Option<String>,
}

impl ConditionArgs {
    fn to_condition(&self) -> Option<Expr> {
        if self.condition_title.is_none()
            && self.condition_description.is_none()
            && self.condition_expression.is_none()
        {
            return None;
        }
        Some(Expr::new(
            self.condition_title.clone().unwrap_or_default(),
            self.condition_description.clone().unwrap_or_default(),
            self.condition_expression.clone().unwrap_or_default(),
        ))
    }
}

/// Arguments selecting a role and condition; meaningless for modifications
/// that carry their own binding, audit config or policy
const KEY_ARGS: [&str; 4] = [
    "role",
    "condition_title",
    "condition_description",
    "condition_expression",
];

#[derive(Args)]
#[group(required = true, multiple = false)]
struct ModificationArgs {
    /// Grant --role to a member
    #[arg(long, value_name = "MEMBER")]
    add_member: Option<String>,

    /// Revoke --role from a member
    #[arg(long, value_name = "MEMBER")]
    remove_member: Option<String>,

    /// Replace the members of a binding's role and condition (JSON binding file)
    #[arg(long, value_name = "FILE", conflicts_with_all = KEY_ARGS)]
    set_binding: Option<PathBuf>,

    /// Remove the --role binding
    #[arg(long)]
    remove_binding: bool,

    /// Replace the audit config of a service (JSON audit config file)
    #[arg(long, value_name = "FILE", conflicts_with_all = KEY_ARGS)]
    set_audit_config: Option<PathBuf>,

    /// Remove all audit configuration of a service
    #[arg(long, value_name = "SERVICE", conflicts_with_all = KEY_ARGS)]
    remove_audit_service: Option<String>,

    /// Replace all bindings and audit configs (JSON policy file)
    #[arg(long, value_name = "FILE", conflicts_with_all = KEY_ARGS)]
    set_policy: Option<PathBuf>,
}

impl ModificationArgs {
    async fn to_modification(
        &self,
        role: Option<&str>,
        condition: Option<Expr>,
    ) -> Result<PolicyModification> {
        let require_role = || match role {
            Some(role) => Ok(role.to_string()),
            None => bail!("--role is required for this modification"),
        };

        if let Some(member) = &self.add_member {
            return Ok(PolicyModification::AddMember {
                role: require_role()?,
                member: member.clone(),
                condition,
            });
        }
        if let Some(member) = &self.remove_member {
            return Ok(PolicyModification::RemoveMember {
                role: require_role()?,
                member: member.clone(),
                condition,
            });
        }
        if self.remove_binding {
            return Ok(PolicyModification::RemoveBinding {
                role: require_role()?,
                condition,
            });
        }
        if let Some(service) = &self.remove_audit_service {
            return Ok(PolicyModification::RemoveAuditConfig {
                service: service.clone(),
            });
        }
        if let Some(path) = &self.set_binding {
            return Ok(PolicyModification::SetBinding(
                commands::read_document(path).await?,
            ));
        }
        if let Some(path) = &self.set_audit_config {
            return Ok(PolicyModification::SetAuditConfig(
                commands::read_document(path).await?,
            ));
        }
        if let Some(path) = &self.set_policy {
            let policy = commands::read_policy(path).await?;
            return Ok(PolicyModification::SetPolicy {
                bindings: policy.bindings,
                audit_configs: policy.audit_configs,
            });
        }
        bail!("no modification given")
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let output = if pretty {
        NativeJsonProvider::stringify_pretty(value)?
    } else {
        NativeJsonProvider::stringify(value)?
    };
    println!("{}", output);
    Ok(())
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let pretty = cli.pretty;

    match cli.command {
        Commands::Merge { files } => {
            print_json(&commands::merge(&files).await?, pretty)?;
        }
        Commands::Subtract { base, remove } => {
            print_json(&commands::subtract(&base, &remove).await?, pretty)?;
        }
        Commands::Filter {
            file,
            role,
            condition,
        } => {
            let bindings = commands::filter(&file, &role, condition.to_condition().as_ref()).await?;
            print_json(&bindings, pretty)?;
        }
        Commands::RemoveAuditService { file, service } => {
            print_json(&commands::remove_audit_service(&file, &service).await?, pretty)?;
        }
        Commands::Compare { a, b } => {
            if let Some(differences) = commands::compare(&a, &b).await? {
                print_json(&differences, pretty)?;
                return Ok(ExitCode::from(EXIT_MISMATCH));
            }
        }
        Commands::Show { policy_file } => {
            print_json(&commands::show(&policy_file).await?, pretty)?;
        }
        Commands::Apply {
            policy_file,
            role,
            condition,
            modification,
        } => {
            let modification = modification
                .to_modification(role.as_deref(), condition.to_condition())
                .await?;
            let outcome = commands::apply(&policy_file, &modification).await?;
            match &outcome {
                ApplyOutcome::Updated(_) => eprintln!("updated: {}", modification),
                ApplyOutcome::Unchanged(_) => eprintln!("unchanged: {}", modification),
            }
            print_json(outcome.policy(), pretty)?;
        }
        Commands::Schema => {
            println!("{}", commands::schema()?);
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
