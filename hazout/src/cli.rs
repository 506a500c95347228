///
/// This module implements the CLI interface for hazout: command parsing,
/// argument validation and the async entrypoint.
///
/// All business logic (classification, grouping, envelopes, curve requests)
/// lives in the [`hazout-core`] crate. This module wires configuration, the S3
/// lister and the curve table into it and prints the results.
///
/// ## Output
/// - `results` prints the JSON envelope on stdout, success or error.
/// - `curve` prints the curve, the usage text, or the rejection message.
/// - Logs go to stderr.
///
/// [`hazout-core`]: ../../hazout_core/
use crate::load_config::load_optional_config;
use crate::precomputed::PrecomputedCurves;
use crate::s3::S3Client;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hazout_core::curve::{handle_curve_request, CurveOutcome};
use hazout_core::index::{ClassifyPolicy, ResultsIndexer};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// CLI for hazout: list NSHM hazard results and compute hazard curves.
#[derive(Parser)]
#[clap(
    name = "hazout",
    version,
    about = "List hazard results stored in the NSHM output bucket and compute hazard curves"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List every hazard run in the bucket, grouped by user and run directory
    Results {
        /// Path to the YAML config file
        #[clap(long)]
        config: Option<PathBuf>,
        /// Leave out unclassifiable keys and report them instead of failing
        #[clap(long)]
        skip_invalid: bool,
    },
    /// Compute a hazard curve, e.g. `hazout curve /2008/WUS/PGA/-118.25/34.05`
    Curve {
        /// Slash-delimited request: /<year>/<region>/<imt>/<lon>/<lat>
        #[clap(allow_hyphen_values = true)]
        path: Option<String>,
        /// Path to the YAML config file
        #[clap(long)]
        config: Option<PathBuf>,
    },
}

/// Async CLI entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Results {
            config,
            skip_invalid,
        } => {
            let config = load_optional_config(config.as_deref())?;
            let mut index_config = config.index_config();
            if skip_invalid {
                index_config.policy = ClassifyPolicy::SkipInvalid;
            }
            tracing::info!(command = "results", bucket = %index_config.bucket, "Starting results index");

            let lister = S3Client::new(config.store.endpoint.clone())
                .map_err(|e| anyhow::anyhow!("Failed to construct S3 client: {e}"))?;
            let indexer = ResultsIndexer::new(lister, index_config);

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            let interrupt = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupted, cancelling results index");
                    on_interrupt.cancel();
                }
            });
            let response = indexer.respond(&cancel).await;
            interrupt.abort();

            let json = response
                .to_json_pretty()
                .context("Failed to serialize response")?;
            println!("{json}");

            if response.is_success() {
                tracing::info!(command = "results", "Results index complete");
                Ok(())
            } else {
                let message = response.message.unwrap_or_default();
                tracing::error!(command = "results", error = %message, "Results index failed");
                Err(anyhow::Error::msg(message))
            }
        }
        Commands::Curve { path, config } => {
            let Some(path) = path else {
                println!("{}", CurveOutcome::Usage.body());
                return Ok(());
            };
            let config = load_optional_config(config.as_deref())?;
            let table_path = config
                .curves
                .table
                .context("No curve table configured: set curves.table in the config file")?;
            let curves = PrecomputedCurves::load(&table_path)?;

            let outcome = handle_curve_request(&curves, Some(path.as_str()));
            println!("{}", outcome.body());
            match outcome {
                CurveOutcome::Rejected(message) => Err(anyhow::Error::msg(message)),
                CurveOutcome::Curve(_) | CurveOutcome::Usage => Ok(()),
            }
        }
    }
}
