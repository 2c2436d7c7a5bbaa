//! gNMI client for featureprofiles
//!
//! Queries, configures and subscribes to a device under test, optionally
//! injecting latency on every call.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::info;

use fp_gnmi::gnmi::get_request::DataType;
use fp_gnmi::telemetry::points_from_notification;
use fp_gnmi::{GnmiClient, GnmiConfig, GnmiSubscriber, SetOperation};

/// gNMI client with latency injection
#[derive(Parser, Debug)]
#[command(name = "fp-gnmi")]
#[command(about = "Query, configure and subscribe to a gNMI target")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "gnmi.json5")]
    config: PathBuf,

    /// Target name (defaults to the first configured target)
    #[arg(short, long)]
    target: Option<String>,

    /// Latency to inject on every call, as a Go duration ("250ms")
    #[arg(long)]
    latency: Option<String>,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the target's supported models and encodings
    Capabilities,

    /// Fetch paths and print one JSON line per leaf
    Get {
        /// Paths to fetch
        #[arg(required = true)]
        paths: Vec<String>,

        /// Data type to request
        #[arg(long, value_enum, default_value_t = GetType::All)]
        r#type: GetType,
    },

    /// Apply updates, replaces and deletes in one transaction
    Set {
        /// Merge a value: <path>=<json>
        #[arg(long)]
        update: Vec<String>,

        /// Replace a subtree: <path>=<json>
        #[arg(long)]
        replace: Vec<String>,

        /// Delete a subtree
        #[arg(long)]
        delete: Vec<String>,
    },

    /// Stream the target's configured subscriptions as JSON lines
    Subscribe,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum GetType {
    All,
    Config,
    State,
    Operational,
}

impl From<GetType> for DataType {
    fn from(t: GetType) -> Self {
        match t {
            GetType::All => DataType::All,
            GetType::Config => DataType::Config,
            GetType::State => DataType::State,
            GetType::Operational => DataType::Operational,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = GnmiConfig::load(&args.config)?;

    // Initialize logging
    fp_common::init_tracing(&config.logging.with_level_override(args.log_level.as_deref()))?;

    let mut target = config.target(args.target.as_deref())?.clone();
    if args.latency.is_some() {
        target.latency = args.latency.clone();
    }

    match args.command {
        Command::Capabilities => {
            let client = GnmiClient::connect(target).await?;
            let caps = client.capabilities().await?;

            let models: Vec<_> = caps
                .supported_models
                .iter()
                .map(|m| {
                    serde_json::json!({
                        "name": m.name,
                        "organization": m.organization,
                        "version": m.version,
                    })
                })
                .collect();
            let report = serde_json::json!({
                "gnmi_version": caps.g_nmi_version,
                "supported_encodings": caps.supported_encodings,
                "supported_models": models,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Get { paths, r#type } => {
            let client = GnmiClient::connect(target).await?;
            let response = client.get(&paths, r#type.into()).await?;

            for notification in &response.notification {
                for point in points_from_notification(&client.target().name, notification) {
                    println!("{}", serde_json::to_string(&point)?);
                }
            }
        }
        Command::Set {
            update,
            replace,
            delete,
        } => {
            let mut operations = Vec::new();
            for arg in &update {
                let (path, value) = SetOperation::parse_assignment(arg)?;
                operations.push(SetOperation::Update { path, value });
            }
            for arg in &replace {
                let (path, value) = SetOperation::parse_assignment(arg)?;
                operations.push(SetOperation::Replace { path, value });
            }
            for path in delete {
                operations.push(SetOperation::Delete { path });
            }
            if operations.is_empty() {
                anyhow::bail!("set needs at least one --update, --replace or --delete");
            }

            let client = GnmiClient::connect(target).await?;
            let response = client.set(&operations).await?;
            info!(
                "Set applied {} operations at {}",
                response.response.len(),
                response.timestamp
            );
        }
        Command::Subscribe => {
            let token = CancellationToken::new();
            let shutdown = token.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Received shutdown signal");
                    shutdown.cancel();
                }
            });

            let subscriber = GnmiSubscriber::new(target);
            let mut stdout = tokio::io::stdout();
            subscriber.run(&mut stdout, token).await?;
        }
    }

    Ok(())
}
