//! page-agent
//!
//! Drives a browser towards an objective: every step captures the page, asks the model for one
//! action on the visible nodes, and performs it.

use anyhow::{Context, bail};
use clap::Parser;
use page_agent::browser::{BrowserDriver, BrowserSession, Capture, ConnectionOptions, DEFAULT_IMAGE_WIDTH, LaunchOptions};
use page_agent::protocol::openai::{DEFAULT_MODEL, OpenAiOptions, OpenAiProposer};
use page_agent::protocol::{ActionProtocol, DEFAULT_MAX_RETRIES, ProtocolOptions, Transcript};
use page_agent::{BrowserError, Outcome, PageModel, ProtocolError, SnapshotOptions, execute_action};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Captures attempted per step before a malformed snapshot is treated as fatal
const MAX_CAPTURE_ATTEMPTS: usize = 5;

#[derive(Parser)]
#[command(name = "page-agent")]
#[command(version)]
#[command(about = "Browse towards an objective with an LLM choosing each action", long_about = None)]
struct Cli {
    /// What the agent should accomplish
    #[arg(long, short = 'o')]
    objective: String,

    /// Page to start from; `https://` is added when no scheme is given
    #[arg(long, short = 'u', default_value = "https://www.google.com")]
    url: String,

    /// Launch browser in headed mode (default: headless)
    #[arg(long, short = 'H')]
    headed: bool,

    /// Path to custom browser executable
    #[arg(long, value_name = "PATH")]
    executable_path: Option<PathBuf>,

    /// WebSocket endpoint URL for remote browser connection
    #[arg(long, value_name = "URL")]
    ws_endpoint: Option<String>,

    /// Persistent browser profile directory
    #[arg(long, value_name = "DIR")]
    user_data_dir: Option<PathBuf>,

    /// Proposals requested per step before giving up
    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
    max_retries: usize,

    /// Actions performed before giving up on the objective
    #[arg(long, default_value_t = 50)]
    max_steps: usize,

    /// Send a screenshot with every page outline
    #[arg(long)]
    vision: bool,

    /// Chat model name
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    /// OpenAI-compatible chat completions endpoint
    #[arg(long, value_name = "URL")]
    api_url: Option<String>,
}

fn open_session(cli: &Cli) -> anyhow::Result<BrowserSession> {
    if let Some(ref endpoint) = cli.ws_endpoint {
        eprintln!("WebSocket endpoint: {}", endpoint);
        let options = ConnectionOptions::new(endpoint.clone()).screenshots(cli.vision);
        return BrowserSession::connect(options).context("Failed to connect to browser");
    }

    let mut options = LaunchOptions::new().headless(!cli.headed).screenshots(cli.vision);
    if let Some(ref path) = cli.executable_path {
        options = options.chrome_path(path);
    }
    if let Some(ref dir) = cli.user_data_dir {
        options = options.user_data_dir(dir);
    }
    BrowserSession::launch(options).context("Failed to launch browser")
}

/// Capture the page, waiting and retrying while the snapshot is still malformed
async fn capture_page(session: &BrowserSession, options: &SnapshotOptions) -> anyhow::Result<(Capture, PageModel)> {
    let mut attempt = 1;
    loop {
        let result = session
            .capture_snapshot()
            .and_then(|capture| capture.page_model(options).map(|model| (capture, model)));

        match result {
            Ok(page) => return Ok(page),
            Err(BrowserError::MalformedSnapshot(reason)) if attempt < MAX_CAPTURE_ATTEMPTS => {
                // Usually a page that has not finished loading
                log::warn!("Malformed snapshot ({}), retrying in 2s", reason);
                tokio::time::sleep(Duration::from_secs(2)).await;
                attempt += 1;
            }
            Err(e) => return Err(e).context("Failed to capture page"),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    eprintln!("page-agent v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("Objective: {}", cli.objective);
    eprintln!("Browser mode: {}", if cli.headed { "headed" } else { "headless" });

    let mut openai_options = OpenAiOptions::new().model(cli.model.clone());
    if let Some(ref url) = cli.api_url {
        openai_options = openai_options.api_url(url.clone());
    }
    let proposer = OpenAiProposer::from_env(openai_options)?;

    let session = open_session(&cli)?;
    session.navigate(&cli.url)?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupted, abandoning the current request");
                cancel.cancel();
            }
        });
    }

    let protocol = ActionProtocol::new(proposer)
        .with_options(ProtocolOptions::new().max_retries(cli.max_retries))
        .with_cancellation(cancel.clone());
    let snapshot_options = SnapshotOptions::default();
    let mut transcript = Transcript::new();

    for step in 1..=cli.max_steps {
        if cancel.is_cancelled() {
            bail!("Interrupted");
        }

        let (capture, model) = capture_page(&session, &snapshot_options).await?;
        log::info!(
            "Step {}: {} clickable, {} inputable",
            step,
            model.clickable().len(),
            model.inputable().len()
        );

        let screenshot = match (cli.vision, &capture.screenshot) {
            (true, Some(screenshot)) => Some(screenshot.to_data_url(DEFAULT_IMAGE_WIDTH)?),
            _ => None,
        };

        let action = match protocol
            .next_action(&cli.objective, &mut transcript, &model, screenshot.as_deref())
            .await
        {
            Ok(action) => action,
            Err(ProtocolError::Cancelled) => bail!("Interrupted"),
            Err(e) => return Err(e).context(format!("No usable action at step {}", step)),
        };

        eprintln!("{}", action);
        if execute_action(&session, &model, &action)? == Outcome::Complete {
            eprintln!("Objective complete after {} steps", step);
            return Ok(());
        }
    }

    bail!("Objective not completed after {} steps", cli.max_steps)
}
