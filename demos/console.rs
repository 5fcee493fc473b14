//! Line-based stand-in for a chat transport.
//!
//! Anything typed is sent as a text message; `cb <token>` presses a button.
//! Completions from the download simulator are printed as they arrive.

use greentic_media_bot::{
    BotConfig, ButtonKind, Dispatcher, InboundEvent, MockSearchProvider, OutboundPayload, Reply,
    UserId,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

fn print_payload(payload: &OutboundPayload) {
    println!("\n{}", payload.text);
    for row in &payload.buttons {
        let cells: Vec<String> = row
            .iter()
            .map(|button| match &button.kind {
                ButtonKind::Action(token) => format!("[{}] (cb {token})", button.label),
                ButtonKind::ExternalLink(url) => format!("[{}] -> {url}", button.label),
            })
            .collect();
        println!("  {}", cells.join("   "));
    }
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            BotConfig::from_json(&raw)
                .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?
        }
        None => BotConfig::default(),
    };

    let provider = MockSearchProvider::new()
        .with_no_matches("zzzzqqqq")
        .failing_for("outage");
    let (dispatcher, completions) = Dispatcher::from_config(config, Arc::new(provider));
    let dispatcher = Arc::new(dispatcher);

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Reply>();
    Arc::clone(&dispatcher).spawn_completion_pump(completions, outbound_tx);
    tokio::spawn(async move {
        while let Some(reply) = outbound_rx.recv().await {
            print_payload(&reply.payload);
        }
    });

    let user = UserId::new("console");
    print_payload(
        &dispatcher
            .handle(InboundEvent::command(&user, "start", &[]))
            .await
            .payload,
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let event = match line.strip_prefix("cb ") {
            Some(token) => InboundEvent::callback(&user, token.trim()),
            None => InboundEvent::text(&user, line),
        };
        let reply = dispatcher.handle(event).await;
        print_payload(&reply.payload);
    }
    Ok(())
}
