//! JSON-lines journal: inbound events are read from a script, outbound
//! messages are written one JSON object per line.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::{BufRead, Write};
use std::sync::Mutex;
use tracing::debug;

use crate::gateway::AuctionGateway;
use crate::types::{Inbound, Outbound};

/// Writes every dispatched message as a JSON line.
pub struct JournalGateway<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> JournalGateway<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl<W: Write + Send> AuctionGateway for JournalGateway<W> {
    async fn dispatch(&self, message: Outbound) -> Result<()> {
        let line = serde_json::to_string(&message).context("Failed to serialise outbound message")?;
        let mut out = self
            .out
            .lock()
            .map_err(|_| anyhow::anyhow!("journal writer poisoned"))?;
        writeln!(out, "{line}").context("Failed to write outbound message")?;
        out.flush().context("Failed to flush journal")?;
        debug!(%message, "Journaled");
        Ok(())
    }
}

/// Parse inbound events, one JSON object per line. Blank lines and lines
/// starting with `#` are skipped.
pub fn read_events<R: BufRead>(reader: R) -> Result<Vec<Inbound>> {
    let mut events = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read event line {}", index + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let event: Inbound = serde_json::from_str(trimmed)
            .with_context(|| format!("Failed to parse event on line {}", index + 1))?;
        events.push(event);
    }
    Ok(events)
}
