//! EventPulse Console binary.
//!
//! Entry point for the terminal event page.

use std::sync::Arc;

use anyhow::Context;
use eventpulse_console::config::DEFAULT_LOG_FILTER;
use eventpulse_console::render::prompt;
use eventpulse_console::{parse_input, render_log, render_tally, ConsoleConfig, Input};
use eventpulse_sdk::{
    ConnectionState, EventSession, HttpTokenProvider, PublishError, Transport, WsTransport,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = ConsoleConfig::from_env().context("loading configuration")?;
    let session = config.session().context("reading page url")?;

    info!("Starting EventPulse console");
    info!("Event: {}", session.event_id());
    info!("Role: {}", session.role());
    info!("WebSocket URL: {}", config.ws_url);
    info!("Token URL: {}", config.token_url);

    let transport: Arc<dyn Transport> = Arc::new(WsTransport::new(config.ws_config())?);
    let tokens = Arc::new(HttpTokenProvider::new(config.token_config())?);
    let mut event = EventSession::new(
        session,
        Arc::clone(&transport),
        tokens,
        config.session_config(),
    )?;

    let result = run(&mut event, transport.as_ref()).await;

    event.unmount().await;
    let snapshot = event.metrics().snapshot();
    info!(
        publications = snapshot.publications_received,
        published = snapshot.reactions_published,
        dropped = snapshot.reactions_dropped,
        reconnects = snapshot.reconnects,
        uptime_secs = snapshot.uptime.as_secs(),
        "session summary"
    );

    result
}

async fn run(event: &mut EventSession, transport: &dyn Transport) -> anyhow::Result<()> {
    event.mount().await.context("mounting event session")?;

    let mut reactions = event.reactions();
    let mut tally = event.tally();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    println!("{}", prompt());

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutting down");
                return Ok(());
            }
            next = transport.next_event() => {
                let Some(ev) = next else {
                    return Ok(());
                };
                event.handle_event(ev).await?;

                if matches!(
                    event.connection_state(),
                    ConnectionState::Disconnected | ConnectionState::Failed
                ) {
                    warn!("connection closed by server");
                    return Ok(());
                }
            }
            line = lines.next_line() => {
                match line?.map(|l| parse_input(&l)) {
                    Some(Input::React(emoji)) => react(event, &emoji).await,
                    Some(Input::Empty) => {}
                    Some(Input::Quit) | None => return Ok(()),
                }
            }
        }

        if reactions.has_changed().unwrap_or(false) {
            println!("{}", render_log(&reactions.borrow_and_update()));
        }
        if let Some(rx) = tally.as_mut() {
            if rx.has_changed().unwrap_or(false) {
                println!("{}", render_tally(&rx.borrow_and_update()));
            }
        }
    }
}

async fn react(event: &mut EventSession, emoji: &str) {
    match event.publish(emoji).await {
        Ok(outcome) => info!(emoji = %outcome.reaction().emoji, ?outcome, "reaction sent"),
        Err(err @ PublishError::NotReady { .. }) => println!("{}", err),
        Err(err) => warn!(error = %err, "reaction not sent"),
    }
}
