//! HostBridge - command execution bridge into a single-threaded host.
//!
//! Main entry point for the HostBridge CLI and server.

mod cli;
mod demo_host;
mod server;

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use hostbridge_client::{HttpTransport, HttpTransportConfig, SubmitAndWaitClient, TaskOutcome};
use hostbridge_config::{ConfigLoader, ConfigValidator};
use hostbridge_runloop::CommandRequest;

use crate::cli::{Cli, Commands};
use crate::server::{init_tracing, run_server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (mut config, from_file) = ConfigLoader::load_validated(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    init_tracing(&config.logging)?;

    if from_file {
        info!("Loaded configuration from {}", cli.config.display());
    } else {
        warn!(
            "Config file {} not found, using defaults",
            cli.config.display()
        );
    }
    for warning in ConfigValidator::validate(&config)?.warnings {
        warn!("Config {}: {}", warning.path, warning.message);
    }

    match cli.command {
        None => run_server(config).await,
        Some(Commands::Run { host, port }) => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            run_server(config).await
        }
        Some(Commands::Call {
            name,
            arguments,
            url,
            timeout,
        }) => call(name, &arguments, url, Duration::from_secs(timeout)).await,
        Some(Commands::Config) => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

/// Submit one command over HTTP and print its outcome.
async fn call(name: String, arguments: &str, url: String, timeout: Duration) -> anyhow::Result<()> {
    let arguments: serde_json::Value =
        serde_json::from_str(arguments).context("arguments must be JSON")?;
    let request = CommandRequest::from_json(serde_json::json!({
        "name": name,
        "arguments": arguments,
    }))?;

    let transport = HttpTransport::new(HttpTransportConfig::new(url))?;
    let client = SubmitAndWaitClient::new(transport);
    let outcome = client
        .submit_and_wait_with_progress(request, timeout, |percent, message| {
            eprintln!("[{:>5.1}%] {}", percent, message);
        })
        .await?;

    match outcome {
        TaskOutcome::Completed { result, .. } => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        TaskOutcome::Failed { error, trace, .. } => {
            if let Some(trace) = trace {
                eprintln!("{}", trace);
            }
            anyhow::bail!("command failed: {}", error)
        }
        TaskOutcome::Cancelled { reason, .. } => anyhow::bail!("command cancelled: {}", reason),
    }
}
