//! CLI entry and dispatch.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ichat_core::auth::{StaticToken, TokenSource, TokenStore};
use ichat_core::client::ClientConfig;
use ichat_core::config::{self, ResponseMode};
use ichat_core::{interrupt, logging};

mod commands;

#[derive(Parser)]
#[command(name = "ichat")]
#[command(version)]
#[command(about = "Terminal client for the IFSCA IntelliChat assistant")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Backend root URL (overrides ICHAT_BASE_URL and config)
    #[arg(long, global = true, value_name = "URL")]
    base_url: Option<String>,

    /// Bearer token to use instead of the stored login
    #[arg(long, global = true, env = "ICHAT_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Write debug logs to the log file
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Start an interactive chat (default)
    Chat {
        /// Wait for complete answers instead of streaming
        #[arg(long)]
        direct: bool,
    },

    /// Ask a single question and print the answer
    Ask {
        /// The question to send
        #[arg(value_name = "QUESTION")]
        question: String,

        /// Wait for a complete answer instead of streaming
        #[arg(long)]
        direct: bool,
    },

    /// Log in and store an access token
    Login {
        /// Account identifier (prompted if missing)
        #[arg(long, value_name = "ID")]
        user_id: Option<String>,

        /// Password (prompted if missing)
        #[arg(long, env = "ICHAT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Remove the stored access token
    Logout,

    /// Show backend and login status
    Status,

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
}

/// Everything a command needs to reach the backend.
pub struct AppContext {
    pub config: config::Config,
    pub client: ClientConfig,
    pub tokens: Arc<dyn TokenSource>,
}

impl AppContext {
    /// Loads config and resolves the backend and token source.
    fn load(base_url: Option<&str>, token: Option<String>) -> Result<Self> {
        let config = config::Config::load().context("load config")?;
        let client = config.client_config(base_url)?;
        let tokens: Arc<dyn TokenSource> = match token {
            Some(token) => Arc::new(StaticToken::new(token)),
            None => Arc::new(TokenStore::default()),
        };
        Ok(Self {
            config,
            client,
            tokens,
        })
    }

    fn mode(&self, direct: bool) -> ResponseMode {
        if direct {
            ResponseMode::Direct
        } else {
            self.config.response_mode
        }
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = match logging::init(cli.verbose) {
        Ok(guard) => Some(guard),
        Err(e) => {
            if cli.verbose {
                eprintln!("Logging disabled: {e:#}");
            }
            None
        }
    };

    interrupt::init()?;

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    let Cli {
        command,
        base_url,
        token,
        verbose: _,
    } = cli;
    let base_url = base_url.as_deref();

    // default to chat mode
    let Some(command) = command else {
        let ctx = AppContext::load(base_url, token)?;
        return commands::chat::run(&ctx, ctx.mode(false)).await;
    };

    match command {
        Commands::Chat { direct } => {
            let ctx = AppContext::load(base_url, token)?;
            commands::chat::run(&ctx, ctx.mode(direct)).await
        }
        Commands::Ask { question, direct } => {
            let ctx = AppContext::load(base_url, token)?;
            commands::ask::run(&ctx, &question, ctx.mode(direct)).await
        }
        Commands::Login { user_id, password } => {
            let ctx = AppContext::load(base_url, token)?;
            commands::auth::login(&ctx, user_id, password).await
        }
        Commands::Logout => commands::auth::logout(),
        Commands::Status => commands::status::run(&AppContext::load(base_url, token)?),

        // Config commands must work even when the config file is broken.
        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
        },
    }
}
