//! Interactive command line front-end.
//!
//! ```bash
//! MISTRAL_API_KEY=your_key tasuku --model mistral-large-latest
//! ```
//!
//! To see debug logs:
//! ```bash
//! RUST_LOG=tasuku=debug MISTRAL_API_KEY=your_key tasuku
//! ```

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use std::io::Write as _;
use std::sync::Arc;
use tasuku::config::{AccessGate, AppConfig, MISTRAL_API_KEY};
use tasuku::llm::Role;
use tasuku::providers::MistralProvider;
use tasuku::todo::TodoStore;
use tasuku::{ChatEvent, ConfigError, ResponseLoop, Session, ToolRegistry, ToolSchemaProvider};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;

const HELP: &str = "Commands: /history, /reset, /model <id>, /quit";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let mut app = match AppConfig::from_env_with_key(cli.api_key.clone()) {
        Err(ConfigError::MissingVar(MISTRAL_API_KEY)) => {
            prompt("Mistral API key: ")?;
            let key = lines.next_line().await?.unwrap_or_default();
            AppConfig::from_env_with_key(Some(key))?
        }
        other => other?,
    };
    if let Some(path) = cli.todo_path.clone() {
        app.todo_path = path;
    }
    if let Some(path) = cli.tools.clone() {
        app.tools_path = Some(path);
    }
    log::debug!("configuration {app:?}");

    let schema = match &app.tools_path {
        Some(path) => ToolSchemaProvider::from_path(path)?,
        None => ToolSchemaProvider::builtin()?,
    };

    let mut todos = TodoStore::with_storage(app.todo_path.clone());
    todos
        .load()
        .with_context(|| format!("loading to-do list from {}", app.todo_path.display()))?;
    let registry = ToolRegistry::builtin(app.bing_api_key.clone(), Arc::new(RwLock::new(todos)));

    let provider = match &app.mistral_base_url {
        Some(url) => MistralProvider::with_base_url(app.mistral_api_key.clone(), url.clone()),
        None => MistralProvider::new(app.mistral_api_key.clone()),
    };

    let chat = ResponseLoop::builder(provider)
        .tools(registry)
        .schema(schema)
        .config(cli.chat_config()?)
        .build();

    if !check_access(&app.access_gate(), &mut lines).await? {
        println!("{}", AccessGate::DENIED_MESSAGE);
        return Ok(());
    }

    let mut session = chat.new_session();
    println!("Tasuku ({}). {HELP}", session.model());
    repl(&chat, &mut session, &mut lines).await
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "tasuku=debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

async fn check_access(gate: &AccessGate, lines: &mut Lines<BufReader<Stdin>>) -> Result<bool> {
    if !gate.is_required() {
        return Ok(true);
    }
    prompt("Password: ")?;
    let attempt = lines.next_line().await?.unwrap_or_default();
    Ok(gate.admits(&attempt))
}

fn prompt(text: &str) -> Result<()> {
    print!("{text}");
    std::io::stdout().flush()?;
    Ok(())
}

async fn repl(
    chat: &ResponseLoop<MistralProvider>,
    session: &mut Session,
    lines: &mut Lines<BufReader<Stdin>>,
) -> Result<()> {
    loop {
        prompt("> ")?;
        let Some(line) = lines.next_line().await? else {
            println!();
            return Ok(());
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input.split_once(' ').map_or((input, ""), |(c, a)| (c, a.trim())) {
            ("/quit" | "/exit", _) => return Ok(()),
            ("/help", _) => println!("{HELP}"),
            ("/history", _) => print_history(session),
            ("/reset", _) => {
                session.reset();
                println!("Started a new conversation.");
            }
            ("/model", "") => {
                println!("Current model: {}", session.model());
                println!("Available: {}", chat.models().ids().collect::<Vec<_>>().join(", "));
            }
            ("/model", id) => match session.set_model(id, chat.models()) {
                Ok(()) => println!("Switched to {id}."),
                Err(e) => println!("{e}"),
            },
            (cmd, _) if cmd.starts_with('/') => println!("Unknown command {cmd}. {HELP}"),
            _ => run_turn(chat, session, input).await,
        }
    }
}

async fn run_turn(chat: &ResponseLoop<MistralProvider>, session: &mut Session, input: &str) {
    let (tx, rx) = mpsc::channel(100);
    let printer = spawn_printer(rx);

    let result = chat.run_turn(session, input, Some(&tx)).await;
    drop(tx);
    if let Err(e) = printer.await {
        log::warn!("event printer failed: {e}");
    }

    if let Err(err) = result {
        eprintln!("{}", err.user_message());
    }
}

fn spawn_printer(mut rx: mpsc::Receiver<ChatEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut stdout = std::io::stdout();
        let mut streaming = false;
        while let Some(event) = rx.recv().await {
            match event {
                ChatEvent::TextDelta { delta } => {
                    streaming = true;
                    if let Err(e) = write!(stdout, "{delta}").and_then(|()| stdout.flush()) {
                        log::debug!("failed to write to stdout: {e}");
                    }
                }
                ChatEvent::ToolCallStart { name, .. } => {
                    if streaming {
                        println!();
                        streaming = false;
                    }
                    eprintln!("  [{name}]");
                }
                ChatEvent::ToolCallEnd { name, result, .. } if !result.success => {
                    log::debug!("tool {name} failed: {}", result.output);
                }
                ChatEvent::Done {
                    usage, duration, ..
                } => {
                    println!();
                    log::debug!(
                        "turn done in {:.2}s, tokens in={} out={}",
                        duration.as_secs_f64(),
                        usage.input_tokens,
                        usage.output_tokens
                    );
                }
                ChatEvent::Error { .. } => {
                    if streaming {
                        println!();
                    }
                }
                ChatEvent::ToolCallEnd { .. } => {}
            }
        }
    })
}

fn print_history(session: &Session) {
    let mut empty = true;
    for message in session.visible_messages() {
        empty = false;
        let who = match message.role {
            Role::User => "You",
            Role::Assistant => "Tasuku",
            Role::System | Role::Tool => continue,
        };
        println!("{who}: {}", message.content);
    }
    if empty {
        println!("(no messages yet)");
    }
}
