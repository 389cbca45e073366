use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Result, anyhow, bail};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::chat::{
    ChatMessage, CompletionStreamer, ConversationSession, Session, Transcript, create_session,
    delete_session, find_session_by_name, list_sessions, rename_session, submit_prompt,
};
use crate::core::{AppConfig, ChatError};
use crate::core::db::Database;
use crate::ollama::OllamaProvider;

pub const DEFAULT_SESSION_NAME: &str = "Default Session Name";

const HELP: &str = "Commands:
  /new NAME      start a new session
  /switch NAME   switch to an existing session
  /sessions      list sessions
  /rename NAME   rename the current session
  /delete        delete the current session
  /history       print the current transcript
  /model ID      use a different model
  /models        list available models
  /quit          exit";

#[derive(Debug, PartialEq, Eq)]
enum ReplCommand {
    New(String),
    Switch(String),
    Sessions,
    Rename(String),
    Delete,
    History,
    Model(String),
    Models,
    Help,
    Quit,
}

/// Parse a line starting with `/`, without the slash.
fn parse_command(line: &str) -> Result<ReplCommand> {
    let (name, arg) = match line.split_once(' ') {
        Some((name, arg)) => (name, arg.trim()),
        None => (line, ""),
    };
    let required = |what: &str| -> Result<String> {
        if arg.is_empty() {
            bail!("/{} requires a {}", name, what);
        }
        Ok(arg.to_string())
    };

    let cmd = match name {
        "new" => ReplCommand::New(required("session name")?),
        "switch" => ReplCommand::Switch(required("session name")?),
        "sessions" => ReplCommand::Sessions,
        "rename" => ReplCommand::Rename(required("session name")?),
        "delete" => ReplCommand::Delete,
        "history" => ReplCommand::History,
        "model" => ReplCommand::Model(required("model id")?),
        "models" => ReplCommand::Models,
        "help" => ReplCommand::Help,
        "quit" | "exit" => ReplCommand::Quit,
        other => bail!("Unknown command /{}. Try /help", other),
    };
    Ok(cmd)
}

/// Render a message the way the transcript view shows it: user
/// messages under `User`, responses under the model that wrote them.
pub fn render_message(msg: &ChatMessage) -> String {
    format!("[{}] {}\n{}", msg.timestamp.format("%Y-%m-%d %H:%M:%S"), msg.label(), msg.content)
}

fn print_transcript(conversation: &ConversationSession) {
    println!("== {} ==", conversation.name);
    for msg in conversation.transcript.iter() {
        println!("{}\n", render_message(msg));
    }
}

/// Open the session named `name`, creating it if needed.
async fn open_or_create(db: &Database, name: &str) -> Result<ConversationSession> {
    if let Some(session) = find_session_by_name(db, name).await? {
        return Ok(ConversationSession::open(db, session).await?);
    }
    let id = create_session(db, name).await?;
    Ok(ConversationSession::new(
        Session {
            id,
            name: name.to_string(),
        },
        Transcript::new(),
    ))
}

/// The most recent session, or a new default one when there are none.
async fn open_latest(db: &Database) -> Result<ConversationSession> {
    match list_sessions(db).await?.into_iter().next() {
        Some(session) => Ok(ConversationSession::open(db, session).await?),
        None => open_or_create(db, DEFAULT_SESSION_NAME).await,
    }
}

/// Returns `false` when the REPL should exit.
async fn handle_command(
    db: &Database,
    streamer: &CompletionStreamer,
    conversation: &mut ConversationSession,
    model: &mut String,
    cmd: ReplCommand,
) -> Result<bool> {
    match cmd {
        ReplCommand::New(name) => {
            let id = create_session(db, &name).await?;
            *conversation = ConversationSession::new(Session { id, name }, Transcript::new());
            println!("Started session {}", conversation.name);
        }
        ReplCommand::Switch(name) => {
            let session = find_session_by_name(db, &name)
                .await?
                .ok_or_else(|| anyhow!("No session named {}", name))?;
            *conversation = ConversationSession::open(db, session).await?;
            print_transcript(conversation);
        }
        ReplCommand::Sessions => {
            for session in list_sessions(db).await? {
                let marker = if session.id == conversation.id { "*" } else { " " };
                println!("{} {}\t{}", marker, session.id, session.name);
            }
        }
        ReplCommand::Rename(name) => {
            rename_session(db, conversation.id, &name).await?;
            *conversation = conversation.clone().renamed(&name);
            println!("Session name updated successfully.");
        }
        ReplCommand::Delete => {
            delete_session(db, conversation.id).await?;
            println!("Session {} deleted successfully.", conversation.name);
            *conversation = open_latest(db).await?;
            println!("Now in session {}", conversation.name);
        }
        ReplCommand::History => print_transcript(conversation),
        ReplCommand::Model(id) => {
            streamer.select_provider(&id)?;
            *model = id;
            println!("Using model {}", model);
        }
        ReplCommand::Models => {
            for m in streamer.models() {
                let marker = if *m == *model { "*" } else { " " };
                println!("{} {}", marker, m);
            }
        }
        ReplCommand::Help => println!("{}", HELP),
        ReplCommand::Quit => return Ok(false),
    }
    Ok(true)
}

pub async fn run(config: &AppConfig, session: Option<String>, model: Option<String>) -> Result<()> {
    // Logs go to stderr so they don't interleave with streamed output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=warn", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let db = Database::new(&config.db_path);
    db.initialize().await?;

    let provider = Arc::new(OllamaProvider::new(&config.ollama_api_hostname));
    let streamer = CompletionStreamer::new(provider, config.models.clone());

    let mut model = model.unwrap_or_else(|| config.default_model.clone());
    streamer.select_provider(&model)?;

    let mut conversation = match session {
        Some(name) => open_or_create(&db, &name).await?,
        None => open_latest(&db).await?,
    };
    print_transcript(&conversation);
    println!("Using model {}. Type /help for commands.", model);

    let mut rl = DefaultEditor::new()?;

    loop {
        let readline = rl.readline(">>> ");
        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if let Err(err) = rl.add_history_entry(line) {
                    tracing::debug!("Failed to add history entry: {}", err);
                }

                if let Some(cmd) = line.strip_prefix('/') {
                    let result = match parse_command(cmd) {
                        Ok(cmd) => {
                            handle_command(&db, &streamer, &mut conversation, &mut model, cmd)
                                .await
                        }
                        Err(err) => Err(err),
                    };
                    match result {
                        Ok(true) => {}
                        Ok(false) => break,
                        Err(err) => eprintln!("Error: {}", err),
                    }
                    continue;
                }

                println!("{}", model);
                let mut printed = 0;
                let result = submit_prompt(&db, &streamer, &mut conversation, &model, line, |text| {
                    // Only print what was added since the last fragment
                    print!("{}", &text[printed..]);
                    printed = text.len();
                    let _ = io::stdout().flush();
                })
                .await;
                println!();

                match result {
                    Ok(_) => {}
                    Err(ChatError::ProviderStream(err)) => {
                        eprintln!("Error: the response failed and was not saved: {}", err)
                    }
                    Err(err) => eprintln!("Error: {}", err),
                }
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(
            parse_command("new Trip planning").unwrap(),
            ReplCommand::New("Trip planning".to_string())
        );
        assert_eq!(
            parse_command("model llama3.1:8b").unwrap(),
            ReplCommand::Model("llama3.1:8b".to_string())
        );
        assert_eq!(parse_command("sessions").unwrap(), ReplCommand::Sessions);
        assert_eq!(parse_command("exit").unwrap(), ReplCommand::Quit);
    }

    #[test]
    fn test_parse_command_errors() {
        assert!(parse_command("rename").is_err());
        assert!(parse_command("switch   ").is_err());
        assert!(parse_command("frobnicate").is_err());
    }

    #[test]
    fn test_render_message() {
        use chrono::{TimeZone, Utc};

        use crate::chat::NewMessage;

        let ts = Utc.with_ymd_and_hms(2025, 1, 28, 9, 30, 0).unwrap();
        let msg = NewMessage::assistant("llama3.2:1b", "Hi there").stored_at(ts);
        assert_eq!(render_message(&msg), "[2025-01-28 09:30:00] llama3.2:1b\nHi there");
    }

    #[tokio::test]
    async fn test_switch_to_unknown_session() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("test.db"));
        db.initialize().await.unwrap();
        let streamer = CompletionStreamer::new(
            Arc::new(OllamaProvider::new("http://localhost:11434")),
            vec!["llama3.2:1b".to_string()],
        );
        let mut conversation = open_or_create(&db, "Notes").await.unwrap();
        let mut model = "llama3.2:1b".to_string();

        let err = handle_command(
            &db,
            &streamer,
            &mut conversation,
            &mut model,
            ReplCommand::Switch("Missing".to_string()),
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "No session named Missing");
        assert_eq!(conversation.name, "Notes");

        create_session(&db, "Other").await.unwrap();
        let keep_going = handle_command(
            &db,
            &streamer,
            &mut conversation,
            &mut model,
            ReplCommand::Switch("Other".to_string()),
        )
        .await
        .unwrap();
        assert!(keep_going);
        assert_eq!(conversation.name, "Other");
    }

    #[tokio::test]
    async fn test_open_or_create_resumes_existing_session() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("test.db"));
        db.initialize().await.unwrap();

        let first = open_or_create(&db, "Notes").await.unwrap();
        let again = open_or_create(&db, "Notes").await.unwrap();
        assert_eq!(first.id, again.id);
        assert_eq!(list_sessions(&db).await.unwrap().len(), 1);

        let latest = open_latest(&db).await.unwrap();
        assert_eq!(latest.id, first.id);
    }
}
