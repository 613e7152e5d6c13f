use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use futures::future::join_all;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crpt_submit::config::CrptConfig;
use crpt_submit::document::Document;
use crpt_submit::ratelimit::{RateLimiter, TimeUnit};
use crpt_submit::submit::DocumentSubmitter;

/// Submit a signed document to the registration API.
#[derive(Debug, Parser)]
#[command(name = "crpt-submit", version, about)]
struct Args {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON document to submit
    #[arg(short, long)]
    document: PathBuf,

    /// Signature sent with the document
    #[arg(short, long)]
    signature: String,

    /// Number of concurrent submissions of the document
    #[arg(long, default_value_t = 1)]
    count: usize,

    /// Override calls admitted per window
    #[arg(long, allow_negative_numbers = true)]
    max_calls: Option<i64>,

    /// Override window unit (millisecond, second, minute, hour, day)
    #[arg(long)]
    unit: Option<TimeUnit>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    info!("Starting crpt-submit");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = CrptConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(max_calls) = args.max_calls {
        config.rate_limiting.max_calls = max_calls;
    }
    if let Some(unit) = args.unit {
        config.rate_limiting.unit = unit;
    }
    let window = config.rate_limiting.window()?;
    let limiter = Arc::new(RateLimiter::new(window)?);
    let submitter = DocumentSubmitter::from_config(&config.api, Arc::clone(&limiter))?;
    info!(
        endpoint = %submitter.endpoint(),
        window = ?limiter.window().duration(),
        max_calls = limiter.window().max_calls(),
        "Configuration loaded"
    );
    let document = Arc::new(Document::from_file(&args.document)?);

    let submissions = join_all((0..args.count).map(|_| {
        let submitter = submitter.clone();
        let document = Arc::clone(&document);
        let signature = args.signature.clone();
        async move { submitter.submit(document.as_ref(), &signature).await }
    }));
    tokio::pin!(submissions);

    let results = tokio::select! {
        results = &mut submissions => results,
        _ = shutdown_signal() => {
            limiter.shutdown().await;
            submissions.await
        }
    };
    limiter.shutdown().await;

    let mut failed = 0;
    for result in &results {
        match result {
            Ok(result) => info!(
                submission_id = %result.submission_id,
                status = result.status,
                body = %result.body,
                "Response received"
            ),
            Err(e) => {
                failed += 1;
                error!(error = %e, "Submission failed");
            }
        }
    }

    info!("crpt-submit finished");
    if failed > 0 {
        bail!("{} of {} submissions failed", failed, results.len());
    }
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, cancelling pending submissions");
        }
        _ = terminate => {
            info!("Received SIGTERM, cancelling pending submissions");
        }
    }
}
