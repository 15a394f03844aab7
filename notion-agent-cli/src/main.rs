//! CLI entry point for notion-agent

mod repl;

use anyhow::Result;
use clap::Parser;
use console::style;
use notion_agent_agent::TaskAssistant;
use notion_agent_core::config::{validate_config, Config, ConfigLoader};
use notion_agent_core::logging::init_logging;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const BANNER: &str = "AI Assistant for current tasks. Type your question. Commands: /help, /exit";

#[derive(Parser, Debug)]
#[command(name = "notion-agent")]
#[command(about = "Ask a read-only AI assistant about your Notion TODOs")]
#[command(version)]
struct Cli {
    /// Model to use (defaults to the configured model, gemini-2.5-flash)
    #[arg(long)]
    model: Option<String>,

    /// Notion MCP endpoint
    #[arg(long)]
    notion_url: Option<String>,

    /// Notion access token
    #[arg(long, env = "NOTION_TOKEN", hide_env_values = true)]
    notion_token: Option<String>,

    /// Session identifier for conversation continuity
    #[arg(long, default_value = "default")]
    session: String,

    /// Print one line per agent event to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Configuration directory
    #[arg(short, long)]
    config_dir: Option<PathBuf>,
}

impl Cli {
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(model) = self.model.as_ref().filter(|m| !m.trim().is_empty()) {
            config.agent.model = model.trim().to_string();
        }
        if let Some(url) = self.notion_url.as_ref().filter(|u| !u.trim().is_empty()) {
            config.notion.url = url.trim().to_string();
        }
        if let Some(token) = &self.notion_token {
            config.notion.token = token.clone();
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let loader = match &cli.config_dir {
        Some(dir) => ConfigLoader::with_dir(dir),
        None => ConfigLoader::new(),
    };
    let mut config = loader.load()?;
    cli.apply_overrides(&mut config);
    validate_config(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() {
    let code = run().await;
    // A pending stdin read would otherwise hold the runtime open until the next newline.
    std::process::exit(code);
}

async fn run() -> i32 {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {:#}", style("init error:").red().bold().for_stderr(), e);
            return 1;
        }
    };
    let _log_guard = init_logging(&config.logging, cli.verbose);

    let cancel = CancellationToken::new();
    spawn_signal_listener(cancel.clone());

    let assistant = match TaskAssistant::from_config(&config, cancel.clone()).await {
        Ok(assistant) => assistant.with_verbose(cli.verbose),
        Err(e) => {
            error!("Initialization failed: {}", e);
            eprintln!("{} {}", style("init error:").red().bold().for_stderr(), e);
            return 1;
        }
    };
    info!(
        "Starting session '{}' with model {}",
        cli.session, config.agent.model
    );

    println!("{}", BANNER);
    let input = tokio::io::BufReader::new(tokio::io::stdin());
    match repl::run(&assistant, &cli.session, input, std::io::stdout(), &cancel).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{} {:#}", style("error:").red().bold().for_stderr(), e);
            1
        }
    }
}

/// Cancel `cancel` on Ctrl+C (and SIGTERM on unix).
fn spawn_signal_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("Interrupt received, cancelling in-flight work");
        cancel.cancel();
    });
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Ctrl+C handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await;
}
