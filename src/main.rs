//! CLI entry point for the COVID-19 data quality engine.
//!
//! Loads raw payloads from a directory or the upstream API, enriches and
//! validates them, writes warehouse CSVs plus a quality report, and
//! optionally uploads the outputs to S3.

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use covid_quality::analyzers::analyzer::{QualityEngine, RunInput};
use covid_quality::{
    config::QualityConfig,
    fetch::{BasicClient, Source},
    model::Table,
    output::write_run,
    parser::{parse_historical, parse_snapshots},
    publish::upload_outputs,
};
use std::ffi::OsStr;
use std::path::Path;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "covid_quality")]
#[command(about = "Enrich, validate and grade COVID-19 snapshot data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process one batch of raw payloads and write the graded outputs
    Run {
        /// Directory of raw JSON payloads or base URL of the API
        #[arg(value_name = "DIR_OR_URL")]
        source: String,

        /// Directory to write processed CSVs and the quality report to
        #[arg(short, long, default_value = "data/processed")]
        output_dir: String,

        /// Quality configuration JSON (falls back to QUALITY_CONFIG_PATH)
        #[arg(short, long)]
        config: Option<String>,

        /// Days of history to request from the API
        #[arg(long, default_value_t = 30)]
        lastdays: u32,

        /// Optional: S3 bucket name to upload outputs to (e.g., "my-bucket")
        #[arg(long)]
        s3_bucket: Option<String>,

        /// Optional: Gzip compress outputs before uploading to S3
        #[arg(long, default_value_t = false)]
        gzip: bool,
    },
    /// Print the effective quality configuration as JSON
    ShowConfig {
        /// Quality configuration JSON (falls back to QUALITY_CONFIG_PATH)
        #[arg(short, long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/covid_quality.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("covid_quality.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            source,
            output_dir,
            config,
            lastdays,
            s3_bucket,
            gzip,
        } => {
            let config = load_config(config)?;
            run(&source, &output_dir, config, lastdays, s3_bucket, gzip).await?;
        }
        Commands::ShowConfig { config } => {
            let config = load_config(config)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn load_config(flag: Option<String>) -> Result<QualityConfig> {
    let path = flag.or_else(|| std::env::var("QUALITY_CONFIG_PATH").ok());
    QualityConfig::load_or_default(path.as_deref())
}

/// Loads, processes and writes one batch, then applies the load gate.
#[tracing::instrument(skip(config, s3_bucket))]
async fn run(
    source: &str,
    output_dir: &str,
    config: QualityConfig,
    lastdays: u32,
    s3_bucket: Option<String>,
    gzip: bool,
) -> Result<()> {
    let min_grade = config.min_load_grade;
    let source = Source::parse(source);
    let client = BasicClient::new()?;

    let input = load_input(&source, &client, lastdays, Utc::now()).await;

    let engine = QualityEngine::new(config);
    let now = Utc::now();
    let output = tokio::task::spawn_blocking(move || engine.run(input, now)).await??;

    let written = write_run(Path::new(output_dir), &output)?;
    info!("\n{}", output.report.render_text());

    if let Some(bucket) = s3_bucket {
        let aws = aws_config::load_from_env().await;
        let s3 = aws_sdk_s3::Client::new(&aws);
        info!(bucket = %bucket, gzip, "S3 upload enabled");
        upload_outputs(&s3, &bucket, &written, gzip).await?;
    }

    let grade = output.report.grade();
    if !output.report.accepts(min_grade) {
        bail!("quality grade {grade} is below the load gate {min_grade}");
    }
    info!(grade = %grade, "Batch accepted for loading");
    Ok(())
}

/// Loads and parses every table. A table that cannot be loaded or parsed
/// as a whole is logged and contributes no rows.
async fn load_input(
    source: &Source,
    client: &BasicClient,
    lastdays: u32,
    extracted_at: DateTime<Utc>,
) -> RunInput {
    let mut input = RunInput::default();

    for table in Table::ALL {
        let bytes = match source.load(client, table, lastdays).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(table = %table, error = %e, "Table unavailable, treating as empty");
                continue;
            }
        };

        let parsed = match table.region_type() {
            Some(region_type) => parse_snapshots(&bytes, region_type, extracted_at)
                .map(|batch| input.add_snapshots(table, batch)),
            None => parse_historical(&bytes).map(|batch| input.add_historical(batch)),
        };
        if let Err(e) = parsed {
            error!(table = %table, error = %e, "Payload unreadable, treating as empty");
        }
    }

    info!(
        snapshots = input.snapshots.len(),
        historical = input.historical.len(),
        rejected = input.rejected.values().sum::<usize>(),
        "Input loaded"
    );
    input
}
