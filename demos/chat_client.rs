//! Interactive chat client.
//!
//! Demonstrates:
//! - Building a channel for an endpoint derived from a page URL
//! - Parsing inbound chat records and acknowledging their digests
//! - Sending stdin lines as chat messages
//! - Closing the channel on EOF or Ctrl+C
//!
//! Usage:
//!   cargo run --example chat_client -- http://127.0.0.1:8000/chat/bob/
//!   cargo run --example chat_client -- http://127.0.0.1:8000/chat/bob/ --debug
//!   cargo run --example chat_client -- http://127.0.0.1:8000/chat/bob/ --token=abc --user=Ada

// ============================================================================
// Imports
// ============================================================================

use std::time::{SystemTime, UNIX_EPOCH};

use chat_channel::{
    Channel, Endpoint, EntryKind, InboundMessage, OutboundMessage, Result, Transcript,
};
use tokio::io::{AsyncBufReadExt, BufReader, stdin};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Args
// ============================================================================

/// Command-line arguments.
#[derive(Debug, Clone)]
struct Args {
    page: String,
    username: String,
    token: Option<String>,
    debug: bool,
}

impl Args {
    fn parse() -> Option<Self> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let page = args.iter().find(|a| !a.starts_with("--"))?.clone();
        let token = args
            .iter()
            .find_map(|a| a.strip_prefix("--token="))
            .map(str::to_owned);
        let username = args
            .iter()
            .find_map(|a| a.strip_prefix("--user="))
            .unwrap_or_default()
            .to_owned();

        Some(Self {
            page,
            username,
            token,
            debug: args.iter().any(|a| a == "--debug"),
        })
    }
}

/// Initialize tracing/logging.
fn init_logging(debug: bool) {
    let filter = if debug {
        "chat_channel=debug"
    } else {
        "chat_channel=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let Some(args) = Args::parse() else {
        eprintln!("usage: chat_client <page-url> [--token=TOKEN] [--user=NAME] [--debug]");
        std::process::exit(2);
    };
    init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let path = url::Url::parse(&args.page)?.path().to_owned();
    let mut endpoint = Endpoint::for_page(&args.page, &path)?;
    if let Some(token) = &args.token {
        endpoint = endpoint.with_token(token);
    }
    println!("[WEBSOCKET] {endpoint}");

    // Frames are handed to the main task, which owns the transcript
    let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel::<String>();

    let channel = Channel::builder()
        .endpoint(endpoint.to_string())
        .verbose(args.debug)
        .on_message(move |text| {
            let _ = inbound_tx.send(text);
        })
        .build()?;
    channel.open()?;

    let mut transcript = Transcript::with_limit(args.username.clone(), 500);
    let mut lines = BufReader::new(stdin()).lines();

    loop {
        tokio::select! {
            Some(frame) = inbound_rx.recv() => {
                let message = match InboundMessage::parse(&frame) {
                    Ok(message) => message,
                    Err(e) => {
                        eprintln!("[skip] {e}");
                        continue;
                    }
                };

                let digest = message.digest.clone();
                if let Some(entry) = transcript.push(message, now_ms()) {
                    let marker = match entry.kind {
                        EntryKind::Own => ">",
                        EntryKind::Reply => "<",
                        EntryKind::Notice => "*",
                    };
                    println!("{marker} {}: {}", entry.from, entry.text);
                    if let Some(video) = &entry.video {
                        println!("  [video] {}", video.embed_url);
                    }
                }
                let _ = channel.acknowledge(&digest)?;
            }

            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let mut message = OutboundMessage::new(line.trim());
                message.token = args.token.clone();
                let outcome = channel.send_message(&message)?;
                if !outcome.is_sent() {
                    eprintln!("[not sent] {outcome:?}");
                }
            }

            _ = tokio::signal::ctrl_c() => break,
        }
    }

    channel.close();
    println!(
        "Closed after {} attempt(s), {} message(s)",
        channel.attempts(),
        transcript.len()
    );
    Ok(())
}
