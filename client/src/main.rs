//! Hookrelay Client - Main Entry Point
//!
//! Subscribes to a hub and re-delivers matching webhooks to local targets.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use hr_common::WebhookEvent;
use tokio::sync::mpsc;
use tracing::{debug, info};

use hr_client::{
    config::{
        DEFAULT_EVENT_QUEUE_CAPACITY, DEFAULT_FORWARD_TIMEOUT, DEFAULT_MAX_RECONNECT_ATTEMPTS,
        DEFAULT_RECONNECT_INTERVAL,
    },
    intake, output,
    session::StatusCallback,
    EndpointFilter, ForwardMode, Forwarder, SessionState, SubscriberConfig, SubscriberSession,
};

#[derive(Debug, Parser)]
#[command(name = "hr-client", version, about = "Receive relayed webhooks and forward them locally")]
struct Cli {
    /// Hub address (http, https, ws or wss)
    #[arg(long, env = "HOOKRELAY_HUB")]
    hub: String,

    /// Only handle events whose endpoint starts with this prefix
    #[arg(long = "endpoint", env = "HOOKRELAY_ENDPOINTS", value_delimiter = ',')]
    endpoints: Vec<String>,

    /// Re-deliver accepted events to this URL
    #[arg(long = "forward", env = "HOOKRELAY_FORWARD", value_delimiter = ',')]
    forward: Vec<String>,

    /// Per-target forward timeout in milliseconds
    #[arg(long, env = "HOOKRELAY_TIMEOUT", default_value_t = DEFAULT_FORWARD_TIMEOUT.as_millis() as u64)]
    timeout: u64,

    /// Delay between reconnect attempts in milliseconds
    #[arg(long, env = "HOOKRELAY_RECONNECT_INTERVAL", default_value_t = DEFAULT_RECONNECT_INTERVAL.as_millis() as u64)]
    reconnect_interval: u64,

    /// Reconnect attempts before giving up
    #[arg(long, env = "HOOKRELAY_MAX_RETRIES", default_value_t = DEFAULT_MAX_RECONNECT_ATTEMPTS)]
    max_retries: u32,

    /// Heartbeat period in seconds (0 disables)
    #[arg(long, env = "HOOKRELAY_HEARTBEAT", default_value_t = 25)]
    heartbeat: u64,

    /// Accepted events waiting to be forwarded before new ones are dropped
    #[arg(long, env = "HOOKRELAY_QUEUE", default_value_t = DEFAULT_EVENT_QUEUE_CAPACITY)]
    queue: usize,

    /// Forward to all targets at once instead of one at a time
    #[arg(long, env = "HOOKRELAY_CONCURRENT")]
    concurrent: bool,

    /// Print headers and body of each event
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> Result<(SubscriberConfig, bool)> {
        let mode = if self.concurrent {
            ForwardMode::Concurrent
        } else {
            ForwardMode::Sequential
        };
        let heartbeat = (self.heartbeat > 0).then(|| Duration::from_secs(self.heartbeat));

        let config = SubscriberConfig::new(&self.hub)?
            .with_endpoints(self.endpoints)
            .with_forward_targets(self.forward)?
            .with_forward_timeout(Duration::from_millis(self.timeout))
            .with_reconnect(Duration::from_millis(self.reconnect_interval), self.max_retries)
            .with_heartbeat(heartbeat)
            .with_event_queue_capacity(self.queue)
            .with_forward_mode(mode);
        config.validate()?;

        Ok((config, self.verbose))
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout stays readable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hr_client=info".into()),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let (config, verbose) = Cli::parse().into_config()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        hub = %config.hub_url,
        endpoints = ?config.endpoints,
        targets = ?config.forward_targets,
        "Starting Hookrelay Client"
    );

    let forwarder = Forwarder::new(config.forward_targets.clone(), config.forward_timeout)?
        .with_mode(config.forward_mode);
    let (event_tx, event_rx) = mpsc::channel::<WebhookEvent>(config.event_queue_capacity);
    let worker = tokio::spawn(intake::forward_worker(
        event_rx,
        forwarder,
        verbose,
        |_, results| output::print_forward_results(results),
    ));

    let on_event = intake::event_callback(EndpointFilter::new(config.endpoints.clone()), event_tx);

    let on_status: StatusCallback = Arc::new(output::print_status);
    let session = Arc::new(SubscriberSession::with_callbacks(
        &config,
        Some(on_status),
        Some(on_event),
    ));
    let mut status = session.watch_status();

    session.connect().await?;

    let heartbeat = config.heartbeat_interval.map(|period| {
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !session.ping().await {
                    debug!("Heartbeat skipped, not connected");
                }
            }
        })
    });

    let exit = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.expect("Failed to install CTRL+C signal handler");
            info!("Received shutdown signal, disconnecting...");
            session.disconnect().await;
            ExitCode::SUCCESS
        }
        _ = status.wait_for(|s| s.state == SessionState::Failed) => {
            ExitCode::FAILURE
        }
    };

    if let Some(heartbeat) = heartbeat {
        heartbeat.abort();
        let _ = heartbeat.await;
    }

    // Dropping the session releases the event callback and closes the queue;
    // the worker finishes what it has already taken and then stops.
    drop(session);
    if let Err(e) = worker.await {
        debug!("Forward worker ended abnormally: {}", e);
    }

    info!("Client shutdown complete");

    Ok(exit)
}
