use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rust_twilio_comms::config::Config;
use rust_twilio_comms::enrichment::{enrich, import_rows, save_rows};
use rust_twilio_comms::gateway_client::{NumberValidator, TwilioGateway};

#[derive(Parser, Debug)]
#[command(name = "twilio-comms", version, about = "Twilio lookup, messaging and Studio Flow utilities")]
struct Cli {
    /// JSON credentials file (twilio_config.json); environment variables are used otherwise
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate one or more phone numbers and print the results
    Lookup {
        #[arg(required = true)]
        numbers: Vec<String>,
        /// Lookup data package to request (repeatable); defaults to carrier and caller-name
        #[arg(long = "type", value_name = "TYPE")]
        types: Vec<String>,
    },
    /// Send an SMS
    Send {
        to: String,
        body: String,
        /// Send from the alphanumeric sender ID, falling back to the number
        #[arg(long)]
        alias: bool,
    },
    /// List the Marketplace add-ons available to the account
    AddOns,
    /// Trigger or inspect a Studio Flow execution
    Flow {
        #[command(subcommand)]
        command: FlowCommands,
    },
    /// Validate every number in a CSV file and write the enriched table
    Enrich(EnrichArgs),
}

#[derive(Subcommand, Debug)]
enum FlowCommands {
    /// Start an execution for a phone number
    Start {
        to: String,
        /// Flow parameter as KEY=VALUE (repeatable)
        #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },
    /// Fetch an execution
    Get { execution: String },
    /// Fetch the accumulated context of an execution
    Context { execution: String },
    /// Fetch the context of one step of an execution
    Step { execution: String, step: String },
}

#[derive(Parser, Debug)]
struct EnrichArgs {
    /// Input CSV with a Mobile_Phone column
    #[arg(long, value_name = "PATH")]
    input: PathBuf,

    /// Output CSV
    #[arg(long, value_name = "PATH")]
    output: PathBuf,

    /// First row to process (0-based, negative counts from the end, requires --stop)
    #[arg(long, requires = "stop", allow_negative_numbers = true)]
    start: Option<i64>,

    /// Row to stop before (exclusive, negative counts from the end, requires --start)
    #[arg(long, requires = "start", allow_negative_numbers = true)]
    stop: Option<i64>,

    /// Lookup data package to request (repeatable); defaults to carrier and caller-name
    #[arg(long = "type", value_name = "TYPE")]
    types: Vec<String>,
}

fn parse_key_val(s: &str) -> Result<(String, String)> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| anyhow!("expected KEY=VALUE, got '{}'", s))?;
    if key.is_empty() {
        bail!("empty parameter name in '{}'", s);
    }
    Ok((key.to_string(), value.to_string()))
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(p) => Config::from_json_file(p),
        None => Config::from_env(),
    }
}

fn build_gateway(config: Config, types: Vec<String>) -> Result<TwilioGateway> {
    let gateway = TwilioGateway::new(config)?;
    Ok(if types.is_empty() {
        gateway
    } else {
        gateway.with_lookup_types(types)
    })
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_enrich(gateway: &TwilioGateway, args: EnrichArgs) -> Result<()> {
    let (full_run, start, stop) = match (args.start, args.stop) {
        (Some(start), Some(stop)) => (false, start, stop),
        _ => (true, 0, 0),
    };

    let mut records = import_rows(&args.input, full_run, start, stop)?;
    let summary = enrich(gateway, &mut records).await;

    if save_rows(&args.output, &records) {
        println!(
            "Saved {} row(s) to {} ({} valid, {} not valid, {} failed, {} incomplete)",
            records.len(),
            args.output.display(),
            summary.valid,
            summary.not_valid,
            summary.lookup_failures,
            summary.extraction_failures
        );
        Ok(())
    } else {
        bail!("failed to save {}", args.output.display())
    }
}

/// Main entry point.
///
/// Initializes tracing, loads the Twilio credentials once and dispatches the
/// requested utility.
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_twilio_comms=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Lookup { numbers, types } => {
            let gateway = build_gateway(config, types)?;
            for number in &numbers {
                let outcome = gateway.validate(number).await;
                println!("{} is considered {}", number, outcome);
            }
        }
        Commands::Send { to, body, alias } => {
            let gateway = build_gateway(config, Vec::new())?;
            let receipt = if alias {
                gateway.send_message_with_alias(&to, &body).await
            } else {
                gateway.send_message(&to, &body).await
            };
            match receipt {
                Some(receipt) => print_json(&receipt)?,
                None => bail!("message to {} was not sent", to),
            }
        }
        Commands::AddOns => {
            let gateway = build_gateway(config, Vec::new())?;
            match gateway.available_add_ons().await {
                Some(add_ons) => {
                    for add_on in add_ons {
                        println!("{}\t{}", add_on.sid, add_on.friendly_name);
                    }
                }
                None => bail!("could not list add-ons"),
            }
        }
        Commands::Flow { command } => {
            let gateway = build_gateway(config, Vec::new())?;
            match command {
                FlowCommands::Start { to, params } => {
                    let params: Map<String, Value> = params
                        .into_iter()
                        .map(|(k, v)| (k, Value::String(v)))
                        .collect();
                    let execution = gateway
                        .start_flow(&to, &params)
                        .await
                        .ok_or_else(|| anyhow!("flow execution for {} was not started", to))?;
                    print_json(&execution)?;
                }
                FlowCommands::Get { execution } => {
                    let found = gateway
                        .get_execution(&execution)
                        .await
                        .ok_or_else(|| anyhow!("could not fetch execution {}", execution))?;
                    print_json(&found)?;
                }
                FlowCommands::Context { execution } => {
                    let context = gateway
                        .get_execution_context(&execution)
                        .await
                        .ok_or_else(|| anyhow!("could not fetch context of {}", execution))?;
                    print_json(&context)?;
                }
                FlowCommands::Step { execution, step } => {
                    let context = gateway
                        .get_step_context(&execution, &step)
                        .await
                        .ok_or_else(|| anyhow!("could not fetch context of step {}", step))?;
                    print_json(&context)?;
                }
            }
        }
        Commands::Enrich(args) => {
            let types = args.types.clone();
            let gateway = build_gateway(config, types)?;
            run_enrich(&gateway, args).await?;
        }
    }

    Ok(())
}
