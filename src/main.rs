use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rustysplits::build_app;
use rustysplits::processing::types::{
    DEFAULT_INTERVAL_M, DEFAULT_RUNNING_SPEED_KMH, DEFAULT_SPLIT_M,
};
use rustysplits::processing::{ReductionOptions, analyze_track_bytes};
use rustysplits::templates::render_text_report;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "rustysplits",
    version,
    about = "Speed distribution and splits for GPS tracks"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the upload page and the analysis API.
    Serve {
        #[arg(long, env = "RUSTYSPLITS_ADDR", default_value = "0.0.0.0:3000")]
        addr: SocketAddr,
    },
    /// Analyze GPX or FIT files and print a report for each.
    Report {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Minimum speed (km/h) that counts as running.
        #[arg(long, default_value_t = DEFAULT_RUNNING_SPEED_KMH)]
        running_speed: f64,
        /// Interval length in meters.
        #[arg(long, default_value_t = DEFAULT_INTERVAL_M)]
        interval: f64,
        /// Split length in kilometers.
        #[arg(long, default_value_t = DEFAULT_SPLIT_M / 1000.0)]
        split_km: f64,
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rustysplits=debug,tower_http=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match Cli::parse().command {
        Command::Serve { addr } => serve(addr).await,
        Command::Report {
            inputs,
            running_speed,
            interval,
            split_km,
            json,
        } => {
            let options = ReductionOptions {
                running_speed_kmh: running_speed,
                interval_m: interval,
                split_m: split_km * 1000.0,
            };
            report(&inputs, &options, json)
        }
    }
}

async fn serve(addr: SocketAddr) -> Result<()> {
    let app = build_app();
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app.into_make_service())
        .await
        .context("server crashed")
}

fn report(inputs: &[PathBuf], options: &ReductionOptions, json: bool) -> Result<()> {
    let mut failures = 0usize;

    for path in inputs {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(file = %path.display(), error = %err, "failed to read file");
                failures += 1;
                continue;
            }
        };
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        match analyze_track_bytes(&bytes, &file_name, options) {
            Ok(report) if json => println!("{}", serde_json::to_string_pretty(&report)?),
            Ok(report) => println!("{}", render_text_report(&report)),
            Err(err) => {
                tracing::warn!(file = %path.display(), error = %err, "analysis failed");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        bail!("{failures} of {} file(s) could not be analyzed", inputs.len());
    }
    Ok(())
}
