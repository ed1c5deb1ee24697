mod config;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use config::{LogFormat, PolicyKitConfig, DEFAULT_CONFIG_FILE};
use policykit_catalog::{Catalog, CatalogSources, CatalogStore, CoverageReport, JsonCatalogStore};
use policykit_core::{FrameworkId, PolicyKitError};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "policykit", about = "SOC 2 and GDPR policy and control catalog")]
struct Cli {
    /// Path to config file (defaults to ./policykit.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Load the catalog from a directory (overrides config)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check referential integrity and document shape
    Validate,
    /// List catalog entries
    List {
        #[arg(value_enum)]
        kind: ListKind,
        /// Restrict requirements to one framework
        #[arg(short, long)]
        framework: Option<FrameworkId>,
    },
    /// Print one entry as JSON
    Show {
        #[command(subcommand)]
        target: ShowTarget,
    },
    /// Requirement coverage by controls
    Coverage {
        #[arg(short, long)]
        framework: Option<FrameworkId>,
    },
    /// Write the catalog as JSON files to a directory
    Export { dir: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
enum ListKind {
    Policies,
    Evidence,
    Controls,
    Videos,
    Requirements,
}

#[derive(Subcommand)]
enum ShowTarget {
    /// A policy document by catalog key
    Policy {
        key: String,
        /// Replace placeholders with the configured substitutions
        #[arg(long)]
        fill: bool,
    },
    /// A control joined with its policy, evidence and requirements
    Control { id: String },
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = PolicyKitConfig::load(&config_path, cli.config.is_some()).await?;
    init_tracing(config.log_format);

    let data_dir = cli.data_dir.or(config.data_dir.clone());

    match cli.command {
        Commands::Validate => {
            let sources = match &data_dir {
                Some(dir) => JsonCatalogStore::new(dir).read_sources().await?,
                None => CatalogSources::embedded(),
            };
            let (catalog, violations) = Catalog::load_unchecked(&sources)?;
            for violation in &violations {
                println!("{violation}");
            }
            if !violations.is_empty() {
                anyhow::bail!("{} integrity violation(s)", violations.len());
            }
            println!(
                "OK: {} policies, {} evidence items, {} controls, {} training videos",
                catalog.policies().count(),
                catalog.evidence_items().count(),
                catalog.controls().count(),
                catalog.training_videos().count()
            );
        }
        Commands::List { kind, framework } => {
            let catalog = open_catalog(data_dir).await?;
            list(&catalog, kind, framework);
        }
        Commands::Show { target } => {
            let catalog = open_catalog(data_dir).await?;
            let json = match target {
                ShowTarget::Policy { key, fill } => {
                    let policy = catalog
                        .policy(&key)
                        .ok_or_else(|| PolicyKitError::not_found("policy", &key))?;
                    if fill {
                        if config.substitutions.is_empty() {
                            warn!("No [substitutions] configured; placeholders left as is");
                        }
                        serde_json::to_string_pretty(&policy.fill(&config.substitutions))?
                    } else {
                        serde_json::to_string_pretty(policy)?
                    }
                }
                ShowTarget::Control { id } => {
                    let control = catalog
                        .control(&id)
                        .ok_or_else(|| PolicyKitError::not_found("control", &id))?;
                    serde_json::to_string_pretty(&catalog.resolve_control(control))?
                }
            };
            println!("{json}");
        }
        Commands::Coverage { framework } => {
            let catalog = open_catalog(data_dir).await?;
            let reports = match framework {
                Some(framework) => vec![CoverageReport::for_framework(&catalog, framework)],
                None => CoverageReport::all(&catalog),
            };
            for report in &reports {
                info!(framework = %report.framework, status = ?report.status, "{}", report.summary);
            }
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
        Commands::Export { dir } => {
            let catalog = open_catalog(data_dir).await?;
            let store = JsonCatalogStore::new(&dir);
            store
                .save(&catalog)
                .await
                .with_context(|| format!("failed to export catalog to '{}'", dir.display()))?;
            println!("Catalog written to {}", store.base_dir().display());
        }
    }

    Ok(())
}

async fn open_catalog(data_dir: Option<PathBuf>) -> anyhow::Result<Arc<Catalog>> {
    let catalog = match data_dir {
        Some(dir) => Arc::new(JsonCatalogStore::new(dir).load().await?),
        None => Catalog::builtin()?,
    };
    Ok(catalog)
}

fn list(catalog: &Catalog, kind: ListKind, framework: Option<FrameworkId>) {
    match kind {
        ListKind::Policies => {
            for (key, policy) in catalog.policies() {
                let meta = &policy.metadata;
                println!(
                    "{key}\t{}\t{}\t{}",
                    meta.name,
                    meta.frequency.as_str(),
                    meta.department.as_str()
                );
            }
        }
        ListKind::Evidence => {
            for evidence in catalog.evidence_items() {
                println!(
                    "{}\t{}\t{}\t{}",
                    evidence.id,
                    evidence.name,
                    evidence.frequency.as_str(),
                    evidence.department.as_str()
                );
            }
        }
        ListKind::Controls => {
            for control in catalog.controls() {
                let requirements: Vec<String> = control
                    .mapped_requirements
                    .iter()
                    .map(|r| format!("{}/{}", r.framework_id, r.requirement_id))
                    .collect();
                println!("{}\t{}\t{}", control.id, control.name, requirements.join(","));
            }
        }
        ListKind::Videos => {
            for video in catalog.training_videos() {
                println!("{}\t{}\t{}", video.id, video.title, video.url);
            }
        }
        ListKind::Requirements => {
            let frameworks = match framework {
                Some(framework) => vec![framework],
                None => FrameworkId::ALL.to_vec(),
            };
            for framework in frameworks {
                for (id, requirement) in catalog.requirements(framework) {
                    println!("{framework}\t{id}\t{}", requirement.name);
                }
            }
        }
    }
}
