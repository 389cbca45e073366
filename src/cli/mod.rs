use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod chat;
pub mod init;
pub mod serve;
pub mod sessions;

use crate::core::AppConfig;

#[derive(Subcommand)]
enum Command {
    /// Create the storage directory and database schema
    Init {},
    /// Run the API server
    Serve {
        /// Set the server host address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Set the server port
        #[arg(long, default_value = "2222")]
        port: String,
    },
    /// Start an interactive chat session
    Chat {
        /// Resume the session with this name or create it
        #[arg(long)]
        session: Option<String>,

        /// Model used for responses, must be available locally
        #[arg(long)]
        model: Option<String>,
    },
    /// List chat sessions, newest first
    Sessions {},
    /// Print the transcript of a session
    History {
        #[arg(long)]
        id: i64,
    },
    /// Rename a session
    Rename {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        name: String,
    },
    /// Delete a session and its messages
    Delete {
        #[arg(long)]
        id: i64,
    },
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();
    let config = AppConfig::default();

    // Handle each sub command
    match args.command {
        Some(Command::Init {}) => {
            init::run(&config).await?;
        }
        Some(Command::Serve { host, port }) => {
            serve::run(host, port, config).await?;
        }
        Some(Command::Chat { session, model }) => {
            chat::run(&config, session, model).await?;
        }
        Some(Command::Sessions {}) => {
            sessions::list(&config).await?;
        }
        Some(Command::History { id }) => {
            sessions::history(&config, id).await?;
        }
        Some(Command::Rename { id, name }) => {
            sessions::rename(&config, id, &name).await?;
        }
        Some(Command::Delete { id }) => {
            sessions::delete(&config, id).await?;
        }
        None => {}
    }

    Ok(())
}
