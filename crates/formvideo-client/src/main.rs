//! `formvideo` – command-line client for formvideo-server.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand};
use formvideo_client::{Client, PollPolicy, DEFAULT_SERVER};
use serde_json::json;
use uuid::Uuid;

#[derive(Parser)]
#[command(
    name = "formvideo",
    version,
    about = "Submit recorded videos and fetch the extracted form data",
    after_help = "EXAMPLES:\n  \
                  formvideo submit interview.mp4 --form-type job_application\n  \
                  formvideo submit clip.webm --no-wait\n  \
                  formvideo status 0b9f7f0e-2a8e-4c55-9a53-2f3f3a1d8c11"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Server base URL
    #[arg(long, global = true, env = "FORMVIDEO_SERVER", default_value = DEFAULT_SERVER)]
    server: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a video and (by default) wait for the extracted form
    Submit(SubmitArgs),

    /// Print the current status of a submission
    Status {
        /// Submission id returned by `submit`
        id: Uuid,
    },
}

#[derive(Args)]
struct SubmitArgs {
    /// Video or audio file to upload
    file: PathBuf,

    /// Form schema to fill (server default: personal_info)
    #[arg(long)]
    form_type: Option<String>,

    /// Return right after the upload is accepted
    #[arg(long)]
    no_wait: bool,

    /// Delay between status polls
    #[arg(long, value_parser = humantime::parse_duration, default_value = "5s")]
    interval: Duration,

    /// Give up waiting after this long ("0s" waits forever)
    #[arg(long, value_parser = humantime::parse_duration, default_value = "30m")]
    max_wait: Duration,

    /// Multiply the poll interval by this factor after each poll
    #[arg(long, default_value_t = 1.0)]
    backoff: f64,
}

impl SubmitArgs {
    fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: self.interval,
            max_wait: (!self.max_wait.is_zero()).then_some(self.max_wait),
            backoff_factor: self.backoff,
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let client = Client::new(&cli.server).context("failed to build HTTP client")?;

    let output = match cli.command {
        Commands::Submit(args) => {
            let submission = client
                .submit(&args.file, args.form_type.as_deref())
                .await
                .with_context(|| format!("failed to submit {}", args.file.display()))?;
            if args.no_wait {
                serde_json::to_value(&submission)?
            } else {
                eprintln!("submitted {}; waiting for processing", submission.id);
                let form = client.wait(submission.id, &args.poll_policy()).await?;
                json!({ "id": submission.id, "output": form })
            }
        }
        Commands::Status { id } => serde_json::to_value(client.status(id).await?)?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
