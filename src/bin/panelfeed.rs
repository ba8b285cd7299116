use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use panelfeed::api::{read_event_log, HttpHistorySource};
use panelfeed::config::Config;
use panelfeed::state::grouping::{action_descriptor, inline_kind, InlineKind};
use panelfeed::state::GroupedItem;
use panelfeed::types::{ChatMessage, MessagePayload};
use panelfeed::ChannelSession;
use std::path::PathBuf;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "panelfeed",
    about = "Replay channel event feeds into a render-ready conversation"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded event log and print the grouped conversation
    Replay {
        /// Newline-delimited JSON event log
        file: PathBuf,

        /// Local participant id (overrides PANELFEED_SELF_ID)
        #[arg(long)]
        self_id: Option<String>,

        /// Print grouped items as JSON
        #[arg(long)]
        json: bool,

        /// Load up to N earlier pages from PANELFEED_HISTORY_URL after replay
        #[arg(long, default_value_t = 0)]
        load_earlier: usize,
    },

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() {
    if let Err(e) = init_tracing() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Replay {
            file,
            self_id,
            json,
            load_earlier,
        } => run_replay(file, self_id, json, load_earlier).await,
        Commands::Config => show_config(),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing() -> Result<()> {
    let crate_directive: Directive = "panelfeed=info".parse()?;
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(crate_directive)
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();
    Ok(())
}

async fn run_replay(
    file: PathBuf,
    self_id: Option<String>,
    json: bool,
    load_earlier: usize,
) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(self_id) = self_id {
        config.self_id = self_id;
    }
    config.validate()?;

    let events = read_event_log(&file).await?;
    let mut session = ChannelSession::new(config.session_config());
    session.join();
    let processed = session.run(futures::stream::iter(events)).await;
    tracing::info!(processed, file = %file.display(), "replayed event log");

    if load_earlier > 0 {
        let Some(source) = HttpHistorySource::from_config(&config) else {
            bail!("--load-earlier requires PANELFEED_HISTORY_URL");
        };
        for _ in 0..load_earlier {
            if !session.has_more_history() {
                break;
            }
            session
                .load_earlier(&source)
                .await
                .context("loading earlier history")?;
        }
    }

    let items = session.grouped().to_vec();
    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    for item in &items {
        match item {
            GroupedItem::Message { message } => println!("{}", message_line(&session, message)),
            GroupedItem::InlineGroup(group) => {
                println!("┊ {} ({} items)", group.key, group.items.len());
                for message in &group.items {
                    println!("┊   {}", inline_line(&session, message));
                }
            }
        }
    }
    if session.has_more_history() {
        println!("… earlier messages available");
    }
    Ok(())
}

fn sender_name(session: &ChannelSession, message: &ChatMessage) -> String {
    session
        .resolve_sender(message)
        .map(|view| view.name)
        .unwrap_or_else(|| message.sender_id.clone())
}

fn message_line(session: &ChannelSession, message: &ChatMessage) -> String {
    match message.payload() {
        MessagePayload::Disconnect(notice) => format!("⚠️  {} disconnected", notice.name),
        MessagePayload::Method(method) => format!("⚙ {}", method.call_id),
        MessagePayload::Content(content) => {
            let mut line = format!("[{}] {}", sender_name(session, message), content);
            if let Some(error) = &message.error {
                line.push_str(&format!("  (error: {error})"));
            } else if !message.complete {
                line.push_str(" …");
            }
            line
        }
    }
}

fn inline_line(session: &ChannelSession, message: &ChatMessage) -> String {
    match inline_kind(message) {
        Some(InlineKind::Method) => {
            let call_id = message.method_call_id().unwrap_or(&message.id);
            match session.method_entries().get(call_id) {
                Some(record) => format!("⚙ {} [{:?}]", record.method_name, record.status),
                None => format!("⚙ {call_id}"),
            }
        }
        Some(InlineKind::Typing) => format!("✎ {} is typing", sender_name(session, message)),
        Some(InlineKind::Action) => {
            let name = action_descriptor(message)
                .and_then(|descriptor| descriptor.name)
                .unwrap_or_else(|| "action".to_string());
            format!("▸ {name}")
        }
        _ => format!("… {}", message.content),
    }
}

fn show_config() -> Result<()> {
    let mut config = Config::load()?;
    if config.history_token.is_some() {
        config.history_token = Some("<redacted>".to_string());
    }
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
