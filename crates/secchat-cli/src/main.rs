//! # secchat
//!
//! Terminal client: connects to a room, authenticates, and relays
//! encrypted lines between stdin and the session.

#![deny(unsafe_code)]

mod input;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use secchat_core::constants::{NAME, VERSION};
use secchat_core::{AuthCredentials, FrameKind, SendOptions};
use secchat_crypto::{PayloadCipher, deterministic_user_id, hash_password};
use secchat_logging::LogFormat;
use secchat_settings::ClientSettings;
use secchat_transport::events::{
    CONNECTED, DISCONNECTED, ERROR, MESSAGE, RECONNECT_FAILED, RECONNECTING, VERSION_CHANGED,
};
use secchat_transport::{Session, SessionConfig, SessionEvent, WebSocketConnector};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::input::Input;

/// SecChat terminal client.
#[derive(Parser, Debug)]
#[command(name = NAME, about = "SecChat terminal client", version = VERSION)]
struct Cli {
    /// Server address (overrides settings).
    #[arg(long)]
    url: Option<String>,

    /// Shared room password.
    #[arg(long)]
    password: String,

    /// Display name; also seeds the user ID.
    #[arg(long)]
    name: String,

    /// Settings file (defaults to `~/.secchat/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log level (overrides settings).
    #[arg(long)]
    log_level: Option<String>,

    /// Log output, `compact` or `json` (overrides settings).
    #[arg(long)]
    log_format: Option<LogFormat>,
}

fn load_settings(cli: &Cli) -> Result<ClientSettings> {
    match &cli.settings {
        Some(path) => secchat_settings::load_settings_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display())),
        None => secchat_settings::load_settings().context("Failed to load settings"),
    }
}

/// Print everything the session reports to stdout.
fn install_listeners(session: &Session, cipher: &Arc<PayloadCipher>) {
    let cipher = Arc::clone(cipher);
    let _ = session.on(MESSAGE, move |event| {
        let Some(frame) = event.frame() else { return };
        let sender = frame.str_field("userName").unwrap_or("?");
        let id = frame.id().unwrap_or("-");
        match frame.kind {
            FrameKind::Image => println!("[{id}] {sender} sent an image"),
            _ => {
                let text = cipher.decrypt(frame.content().unwrap_or_default());
                println!("[{id}] {sender}: {text}");
            }
        }
    });

    let _ = session.on("auth_success", |_| println!("* authenticated"));
    let _ = session.on("typing", |event| {
        if let Some(name) = event.frame().and_then(|f| f.str_field("userName")) {
            println!("* {name} is typing");
        }
    });
    let _ = session.on("recall", |event| {
        if let Some(id) = event.frame().and_then(|f| f.id()) {
            println!("* message {id} was recalled");
        }
    });
    let _ = session.on("read", |event| {
        if let Some(id) = event.frame().and_then(|f| f.id()) {
            println!("* message {id} was read");
        }
    });

    for name in [
        CONNECTED,
        DISCONNECTED,
        RECONNECTING,
        RECONNECT_FAILED,
        ERROR,
        VERSION_CHANGED,
    ] {
        let _ = session.on(name, print_status);
    }
}

fn print_status(event: &SessionEvent) {
    match event {
        SessionEvent::Connected => println!("* connected"),
        SessionEvent::Disconnected { reason } => println!("* disconnected: {reason}"),
        SessionEvent::Reconnecting { attempt, delay } => {
            println!("* reconnecting (attempt {attempt}) in {delay:?}");
        }
        SessionEvent::ReconnectFailed { attempts } => {
            println!("* gave up after {attempts} attempts; restart to try again");
        }
        SessionEvent::Error { code, message } => println!("* error {code}: {message}"),
        SessionEvent::VersionChanged { previous, current } => {
            println!("* server updated from {previous} to {current}");
        }
        SessionEvent::Frame(frame) => {
            let message = frame.message().unwrap_or("unknown error");
            println!("* server error: {message}");
        }
        SessionEvent::Message(_) => {}
    }
}

/// Send one encrypted line and report the outcome when the echo arrives.
fn say(session: &Session, cipher: &PayloadCipher, text: &str) {
    let session = session.clone();
    let payload = cipher.encrypt(text);
    drop(tokio::spawn(async move {
        match session
            .send_tracked(FrameKind::Text, payload, SendOptions::default())
            .await
        {
            Ok(receipt) => info!(id = %receipt.id, "message delivered"),
            Err(e) => println!("* not delivered: {e}"),
        }
    }));
}

async fn run(session: &Session, cipher: &PayloadCipher) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        match input::parse(&line) {
            Input::Empty => {}
            Input::Say(text) => say(session, cipher, text),
            Input::Typing => {
                let _ = session.send_typing().await;
            }
            Input::Recall(id) => {
                if !session.send_recall(id).await {
                    println!("* not connected");
                }
            }
            Input::Read(id) => {
                if !session.send_read(id).await {
                    println!("* not connected");
                }
            }
            Input::Status => {
                let status = session.status();
                println!(
                    "* {} (retries: {}, server: {})",
                    status.state,
                    status.reconnect_attempts,
                    status.server_version.as_deref().unwrap_or("unknown")
                );
            }
            Input::Quit => break,
            Input::Invalid(message) => println!("* {message}"),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = load_settings(&cli)?;
    if let Some(url) = &cli.url {
        settings.server.url.clone_from(url);
    }
    let level = cli.log_level.as_deref().unwrap_or(&settings.logging.level);
    let format = match cli.log_format {
        Some(format) => format,
        None => settings.logging.format.parse().map_err(anyhow::Error::msg)?,
    };
    secchat_logging::init_subscriber_with_format(level, format);

    let config = SessionConfig::from_settings(&settings);
    let session = Session::spawn(config, WebSocketConnector::new());
    let cipher = Arc::new(PayloadCipher::from_password(&cli.password));
    install_listeners(&session, &cipher);

    let credentials = AuthCredentials::new(
        hash_password(&cli.password),
        deterministic_user_id(&cli.name),
        cli.name.clone(),
    );
    info!(
        client = NAME,
        version = VERSION,
        url = %settings.server.url,
        user = %credentials.user_id,
        "starting client"
    );

    // A failed first attempt is retried in the background.
    if let Err(e) = session.connect(settings.server.url.clone()).await {
        warn!(error = %e, "initial connect failed");
    }
    let _ = session.authenticate(credentials).await;

    let result = run(&session, &cipher).await;
    session.disconnect().await;
    result
}
