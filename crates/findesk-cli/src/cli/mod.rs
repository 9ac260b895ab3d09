//! CLI entry and dispatch.

use anyhow::{Context, Result};
use clap::Parser;
use findesk_core::config::{self, BASE_URL_ENV};
use findesk_core::logging::{self, WorkerGuard};

mod commands;
mod render;

#[derive(Parser)]
#[command(name = "findesk")]
#[command(version)]
#[command(about = "Financial news assistant chat")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Backend base URL (overrides config)
    #[arg(long, global = true, env = BASE_URL_ENV, value_name = "URL")]
    base_url: Option<String>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Send one prompt and stream the reply to stdout
    Ask {
        /// The prompt to send
        #[arg(short, long)]
        prompt: String,

        /// Ask in analysis mode (report persona when references are selected)
        #[arg(short, long)]
        analysis: bool,

        /// Search news first and use every result as a reference (implies --analysis)
        #[arg(long, value_name = "QUERY")]
        news: Option<String>,

        /// Write the reply to this directory when it is a report
        #[arg(long, value_name = "DIR")]
        export: Option<std::path::PathBuf>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
    /// Save the backend base URL to the config file
    SetUrl {
        #[arg(value_name = "URL")]
        url: String,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    let Cli { command, base_url } = cli;

    // default to chat mode
    let Some(command) = command else {
        let session = Session::prepare(base_url.as_deref())?;
        return commands::chat::run(&session.config, session.base_url.as_str()).await;
    };

    match command {
        Commands::Ask {
            prompt,
            analysis,
            news,
            export,
        } => {
            let session = Session::prepare(base_url.as_deref())?;
            commands::ask::run(commands::ask::AskOptions {
                config: &session.config,
                base_url: session.base_url.as_str(),
                prompt: &prompt,
                analysis,
                news: news.as_deref(),
                export: export.as_deref(),
            })
            .await
        }

        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
            ConfigCommands::SetUrl { url } => commands::config::set_url(&url),
        },
    }
}

/// Config, logging and backend resolution shared by the chat commands.
struct Session {
    config: config::Config,
    base_url: url::Url,
    _log_guard: Option<WorkerGuard>,
}

impl Session {
    fn prepare(base_url_override: Option<&str>) -> Result<Self> {
        let config = config::Config::load().context("load config")?;
        let log_guard = logging::init(&config.log, &config::paths::logs_dir())?;
        let base_url = config.base_url_with_override(base_url_override)?;
        tracing::debug!(%base_url, "backend resolved");

        Ok(Self {
            config,
            base_url,
            _log_guard: log_guard,
        })
    }
}
