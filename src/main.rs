mod cli;
mod config;
mod desk_client;
mod display;
mod engine;
mod logging;
mod repl;
mod tickets;

use crate::config::Config;
use crate::desk_client::DeskClient;
use crate::engine::RoleContext;
use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "desk", version)]
#[command(about = "Service desk chat client with streaming answers", long_about = None)]
struct Cli {
    /// Backend base address (overrides config and DESK_API_URL)
    #[arg(long, global = true)]
    url: Option<String>,

    /// Role context for chat: user or admin
    #[arg(long, global = true)]
    role: Option<RoleContext>,

    #[command(subcommand)]
    cmd: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send one message and print the streamed answer
    Ask {
        /// Message text
        message: String,
    },
    /// Show configuration and check that the backend is up
    #[command(alias = "doctor")]
    Health,
    /// Browse and create tickets
    Tickets {
        #[command(subcommand)]
        action: TicketsAction,
    },
    /// Show ticket statistics
    Stats,
    /// Escalate a ticket to a human agent
    Escalate {
        /// Ticket number, e.g. INC0012847
        ticket_id: String,

        /// Why the ticket needs escalation (10-500 characters)
        #[arg(long)]
        reason: String,
    },
    /// List escalations
    Escalations,
}

#[derive(Subcommand, Debug)]
enum TicketsAction {
    /// List tickets
    List {
        /// Only tickets in this state (e.g. Open, "In Progress")
        #[arg(long)]
        status: Option<String>,
    },
    /// Show one ticket
    Show {
        /// Ticket number
        id: String,
    },
    /// Create a ticket
    Create {
        #[arg(long)]
        subject: String,

        #[arg(long)]
        description: String,

        /// P1, P2 or P3
        #[arg(long, default_value = "P3")]
        priority: String,

        /// Requester email
        #[arg(long)]
        email: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let (mut config, config_path) = Config::load_with_path().unwrap_or_else(|e| {
        eprintln!("Warning: failed to load config, using defaults: {e}");
        (Config::default(), None)
    });

    let cli = Cli::parse();
    if let Some(url) = cli.url.as_deref().filter(|u| !u.trim().is_empty()) {
        config.server.base_url = url.trim().to_string();
    }
    if let Some(role) = cli.role {
        config.chat.role = role;
    }
    config.validate()?;

    // Interactive chat owns the terminal; keep log lines off it.
    let interactive = cli.cmd.is_none();
    let log_dir = match logging::setup_tracing_with_settings(logging::LoggingSettings {
        level: config.logging.level.as_deref(),
        directory: config.logging.directory.as_deref(),
        retention_days: config.logging.retention_days,
        suppress_stdout: interactive,
    }) {
        Ok(path) => Some(path),
        Err(err) => {
            eprintln!("Failed to initialize logging: {err}");
            None
        }
    };

    tracing::info!("--- Service Desk Client Startup ---");
    match config_path.as_ref() {
        Some(path) => tracing::info!("Config File: {}", path.display()),
        None => tracing::info!("Config File: (default)"),
    }
    tracing::info!("Backend: {}", config.server.base_url);
    if let Some(dir) = log_dir.as_ref() {
        tracing::info!("Log Directory: {}", dir.display());
    }

    let client = DeskClient::new(&config.server.base_url);
    let chat = repl::ChatSettings {
        client: client.clone(),
        role: config.chat.role,
        idle_timeout: config.chat.stream_idle_timeout(),
    };

    match cli.cmd {
        None => repl::run_chat_repl(chat).await?,
        Some(Command::Ask { message }) => repl::ask_once(chat, &message).await?,
        Some(Command::Health) => {
            cli::health::run(&config, config_path.as_deref(), &client).await?
        }
        Some(Command::Tickets { action }) => {
            let action = match action {
                TicketsAction::List { status } => cli::tickets_cmd::TicketsAction::List { status },
                TicketsAction::Show { id } => cli::tickets_cmd::TicketsAction::Show { id },
                TicketsAction::Create {
                    subject,
                    description,
                    priority,
                    email,
                } => cli::tickets_cmd::TicketsAction::Create {
                    subject,
                    description,
                    priority,
                    email,
                },
            };
            cli::tickets_cmd::run(action, &client).await?
        }
        Some(Command::Stats) => cli::tickets_cmd::stats(&client).await?,
        Some(Command::Escalate { ticket_id, reason }) => {
            cli::tickets_cmd::escalate(&client, ticket_id, reason).await?
        }
        Some(Command::Escalations) => cli::tickets_cmd::escalations(&client).await?,
    }

    Ok(())
}
