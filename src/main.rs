//! BIDDER: autonomous bidder for repeated multi-item double auctions
//!
//! Entry point. Loads configuration, initialises structured logging, reads
//! inbound events as JSON lines (from a file or stdin), and runs bidding
//! sessions until the input is exhausted or Ctrl+C arrives. Outbound
//! messages are written to stdout as JSON lines; logs go to stderr.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use bidder::config;
use bidder::engine::controller::BiddingSessionController;
use bidder::gateway::journal::{read_events, JournalGateway};
use bidder::types::Inbound;

const BANNER: &str = r#"
 ____ ___ ____  ____  _____ ____
| __ )_ _|  _ \|  _ \| ____|  _ \
|  _ \| || | | | | | |  _| | |_) |
| |_) | || |_| | |_| | |___|  _ <
|____/___|____/|____/|_____|_| \_\

  Repeated multi-item double auction bidder
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let mut args = std::env::args().skip(1);
    let config_path = args
        .next()
        .or_else(|| std::env::var("BIDDER_CONFIG").ok())
        .unwrap_or_else(|| "config.toml".to_string());
    let events_path = args.next();

    let cfg = config::AppConfig::load(&config_path)?;

    init_logging();

    eprintln!("{BANNER}");
    info!(
        agent_id = %cfg.agent.id,
        policy = ?cfg.strategy.policy,
        on_non_positive = ?cfg.strategy.non_positive_price,
        on_digest = ?cfg.settlement.on_digest,
        "BIDDER starting up"
    );

    // -- Inbound events --------------------------------------------------

    let events = match &events_path {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("Failed to open events file: {path}"))?;
            read_events(BufReader::new(file))?
        }
        None => read_events(io::stdin().lock())?,
    };
    info!(count = events.len(), source = events_path.as_deref().unwrap_or("stdin"), "Events loaded");

    let (tx, mut rx) = mpsc::unbounded_channel::<Inbound>();
    for event in events {
        tx.send(event).context("Event channel closed")?;
    }
    drop(tx);

    // -- Main loop -------------------------------------------------------

    let gateway = JournalGateway::new(io::stdout());
    let mut controller = BiddingSessionController::new(&cfg);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut sessions = 0u32;
    loop {
        tokio::select! {
            result = controller.run_session(&mut rx, &gateway) => {
                match result {
                    Ok(Some(summary)) => {
                        sessions += 1;
                        info!(
                            session = sessions,
                            trades = summary.trades,
                            offers = summary.offers,
                            cash_ins = summary.cash_ins,
                            credits = format!("{:.2}", summary.final_credits),
                            value = format!("{:.2}", summary.final_value),
                            "Session complete"
                        );
                    }
                    Ok(None) => {
                        if controller.state().is_active() {
                            warn!(phase = %controller.phase(), "Input ended mid-session");
                        }
                        break;
                    }
                    Err(e) => {
                        error!(error = %e, "Session failed");
                        break;
                    }
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    info!(sessions, "BIDDER shut down cleanly.");
    Ok(())
}

/// Initialise the `tracing` subscriber on stderr.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("bidder=info"));

    let json_logging = std::env::var("BIDDER_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(io::stderr)
            .init();
    }
}
