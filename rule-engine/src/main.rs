//! Sigflow - one-shot rule synthesis.
//!
//! Reads a JSON synthesis request from stdin and writes the plan together
//! with its deploy, cleanup and redeploy scripts as JSON to stdout. Logs go
//! to stderr so stdout carries only the artifact.

use std::io::{self, Read, Write};

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sigflow::{synthesize, Config, RunId, SynthesisArtifacts, SynthesisOptions, SynthesisRequest};

fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true).with_writer(io::stderr))
        .init();

    tracing::info!("sigflow_starting");

    // Load configuration from environment
    let config = Config::from_env();
    tracing::info!(
        tracking_endpoint_set = config.tracking_endpoint.is_some(),
        per_recipient_tracking = config.per_recipient_tracking,
        marker_scheme = ?config.marker_scheme,
        priority_range = ?config.priority_range,
        "config_loaded"
    );

    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .context("Failed to read request from stdin")?;

    let request: SynthesisRequest =
        serde_json::from_str(&input).context("Failed to parse synthesis request")?;

    let options = SynthesisOptions::from_config(&config).context("Invalid configuration")?;
    let run = RunId::generate();
    let plan = synthesize(&request, &options, &run).context("Synthesis failed")?;

    let artifacts = SynthesisArtifacts::render(plan, config.propagation_wait_secs);

    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &artifacts).context("Failed to write artifacts")?;
    writeln!(stdout)?;

    tracing::info!(
        run_id = %artifacts.plan.run_id,
        rules = artifacts.plan.rules.len(),
        status = ?artifacts.plan.status,
        "sigflow_complete"
    );

    Ok(())
}
