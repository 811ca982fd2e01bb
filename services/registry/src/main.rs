//! Inspect a service registry described by a TOML file.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use eyre::WrapErr;
use serde::Serialize;
use service_registry::{
    Bundle, BundleId, Properties, RegistryFile, ServiceId, ServiceRecord, ServiceRegistry,
    ServiceState,
};

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(name = "service-registry")]
#[command(about = "Populate a service registry from a file and query it")]
struct Args {
    /// Registry description
    #[arg(short, long, value_name = "PATH")]
    config: Utf8PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every published name
    Names,

    /// List matching services
    Lookup {
        /// Name the services are published under
        #[arg(long)]
        name: Option<String>,

        /// Property filter, e.g. "(color=red)"
        #[arg(long)]
        filter: Option<String>,

        /// Bundle performing the lookup
        #[arg(long, default_value_t = BundleId::SYSTEM)]
        consumer: BundleId,

        /// Skip the assignability check
        #[arg(long)]
        all: bool,
    },

    /// Show the preferred service for a name
    Best {
        /// Name the service is published under
        #[arg(long)]
        name: String,

        /// Bundle performing the lookup
        #[arg(long, default_value_t = BundleId::SYSTEM)]
        consumer: BundleId,
    },
}

#[derive(Debug, Serialize)]
struct ServiceSummary {
    id: ServiceId,
    names: Vec<String>,
    owner: BundleId,
    ranking: i64,
    state: ServiceState,
    properties: Properties,
}

impl From<&ServiceRecord> for ServiceSummary {
    fn from(record: &ServiceRecord) -> Self {
        Self {
            id: record.id(),
            names: record.names().iter().map(ToString::to_string).collect(),
            owner: record.owner().id(),
            ranking: record.ranking(),
            state: record.state(),
            properties: Properties::clone(&record.properties()),
        }
    }
}

fn setup_tracing() {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load(path: &Utf8PathBuf) -> eyre::Result<RegistryFile> {
    let text =
        std::fs::read_to_string(path).wrap_err_with(|| format!("Reading registry file {path}"))?;
    toml_edit::de::from_str(&text).wrap_err_with(|| format!("Parsing registry file {path}"))
}

fn consumer_bundle(bundles: &[Bundle], id: BundleId) -> Bundle {
    bundles
        .iter()
        .find(|bundle| bundle.id() == id)
        .cloned()
        .unwrap_or_else(|| {
            if id.is_system() {
                Bundle::system()
            } else {
                Bundle::new(id, format!("bundle-{id}"))
            }
        })
}

fn run(args: Args) -> eyre::Result<serde_json::Value> {
    let file = load(&args.config)?;
    let registry = ServiceRegistry::builder()
        .config(file.registry.clone())
        .build();
    let bundles = file
        .install(&registry)
        .wrap_err("Installing declared services")?;
    tracing::info!(bundles = bundles.len(), "Registry populated");

    let output = match args.command {
        Command::Names => {
            let names: Vec<String> = registry
                .service_names()
                .iter()
                .map(ToString::to_string)
                .collect();
            serde_json::to_value(names)?
        }
        Command::Lookup {
            name,
            filter,
            consumer,
            all,
        } => {
            let consumer = consumer_bundle(&bundles, consumer);
            let found = registry
                .lookup(&consumer, name.as_deref(), filter.as_deref(), !all)
                .wrap_err("Lookup failed")?;
            let summaries: Vec<ServiceSummary> = found.iter().map(ServiceSummary::from).collect();
            serde_json::to_value(summaries)?
        }
        Command::Best { name, consumer } => {
            let consumer = consumer_bundle(&bundles, consumer);
            let best = registry
                .get_service_reference(&consumer, &name)
                .wrap_err("Lookup failed")?;
            serde_json::to_value(best.as_ref().map(ServiceSummary::from))?
        }
    };
    Ok(output)
}

fn main() -> eyre::Result<()> {
    setup_tracing();
    let args = Args::parse();
    let output = run(args)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
