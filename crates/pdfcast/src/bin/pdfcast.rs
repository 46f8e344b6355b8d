//! `pdfcast`: turn a PDF into a narrated video from the command line.
//!
//! ```text
//! pdfcast --config pdfcast.json convert paper.pdf
//! pdfcast --config pdfcast.json check
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use pdfcast::config::validate_config;
use pdfcast::{init_logging, load_config, Config, ConversionService, Document, PollResponse};

#[derive(Parser, Debug)]
#[command(
    name = "pdfcast",
    version,
    about = "Convert PDF documents into narrated videos",
    long_about = "Extracts the text of a PDF, summarizes it into a narration script, \
                  synthesizes speech and renders a subtitled video."
)]
struct Cli {
    /// Path to the JSON configuration file. Built-in defaults are used when omitted.
    #[arg(short, long, env = "PDFCAST_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a PDF and poll until its video is ready or the job fails.
    Convert {
        /// The PDF to convert.
        pdf: PathBuf,

        /// Interval between status polls, in milliseconds.
        #[arg(long, env = "PDFCAST_POLL_MS", default_value_t = 1000)]
        poll_ms: u64,
    },
    /// Load and validate the configuration without converting anything.
    Check,
}

fn read_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => {
            let config = Config::with_defaults();
            validate_config(&config).context("Built-in configuration is invalid")?;
            Ok(config)
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = read_config(cli.config.as_deref())?;
    init_logging(&config.logging).context("Failed to initialise logging")?;

    match cli.command {
        Command::Check => check(&config),
        Command::Convert { pdf, poll_ms } => {
            convert(&config, &pdf, Duration::from_millis(poll_ms.max(1))).await
        }
    }
}

fn check(config: &Config) -> Result<ExitCode> {
    pdfcast::resolve_secret(
        config.openai.api_key.as_deref(),
        config.openai.api_key_file.as_deref(),
        config.openai.api_key_env.as_deref(),
    )
    .context("OpenAI API key is not available")?;

    println!("Configuration OK");
    println!("  uploads: {}", config.upload_dir().display());
    println!("  work:    {}", config.work_dir().display());
    println!("  videos:  {}", config.output_dir().display());
    Ok(ExitCode::SUCCESS)
}

async fn convert(config: &Config, pdf: &Path, poll_interval: Duration) -> Result<ExitCode> {
    let service = ConversionService::from_config(config)?;

    let document = Document::from_path(pdf)?;
    let job_id = service
        .submit(document)
        .await
        .with_context(|| format!("Failed to submit {}", pdf.display()))?;
    info!(job_id = %job_id, "Submitted {}", pdf.display());

    let mut ticker = tokio::time::interval(poll_interval);
    let mut last: Option<PollResponse> = None;
    loop {
        ticker.tick().await;
        let response = service.poll(&job_id)?;

        if last.as_ref() != Some(&response) {
            println!("{}", serde_json::to_string(&response)?);
        } else {
            debug!(job_id = %job_id, "No change");
        }

        match response {
            PollResponse::Processing { .. } => last = Some(response),
            PollResponse::Completed { .. } => return Ok(ExitCode::SUCCESS),
            PollResponse::Failed { .. } => return Ok(ExitCode::FAILURE),
        }
    }
}
