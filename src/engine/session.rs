//! Explicit per-session state, threaded through the controller.
//!
//! Everything mutable about a bidding session lives here and is owned by
//! exactly one controller; nothing else writes to it.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, Secret};
use serde::Serialize;
use std::fmt;

use crate::config::AppConfig;
use crate::engine::ledger::SettlementLedger;
use crate::engine::pending::PendingRequests;
use crate::strategy::estimator::MarketEstimator;
use crate::strategy::PrivateValues;
use crate::types::{BidderError, CorrelationId, Price};
use crate::valuation::ValuationEngine;
use crate::wallet::Wallet;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unregistered,
    /// Register sent, waiting for the acknowledgement.
    Registering(CorrelationId),
    Registered,
    Closed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Unregistered => write!(f, "UNREGISTERED"),
            Phase::Registering(_) => write!(f, "REGISTERING"),
            Phase::Registered => write!(f, "REGISTERED"),
            Phase::Closed => write!(f, "CLOSED"),
        }
    }
}

// ---------------------------------------------------------------------------
// Secret
// ---------------------------------------------------------------------------

/// Token issued at registration, required on every authenticated action.
pub struct SecretToken(Secret<i64>);

impl SecretToken {
    pub fn new(value: i64) -> Self {
        Self(Secret::new(value))
    }

    pub fn expose(&self) -> i64 {
        *self.0.expose_secret()
    }
}

impl fmt::Debug for SecretToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretToken([REDACTED])")
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    pub started_at: Option<DateTime<Utc>>,
    pub trades: u64,
    pub offers: u64,
    pub publications: u64,
    pub cash_ins: u64,
}

/// Outcome of a closed session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub agent_id: String,
    pub started_at: Option<DateTime<Utc>>,
    pub closed_at: DateTime<Utc>,
    pub trades: u64,
    pub offers: u64,
    pub publications: u64,
    pub cash_ins: u64,
    pub final_credits: Price,
    pub final_value: Price,
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | trades={} offers={} published={} cash_ins={} | credits={:.2} value={:.2}",
            self.agent_id,
            self.trades,
            self.offers,
            self.publications,
            self.cash_ins,
            self.final_credits,
            self.final_value,
        )
    }
}

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct SessionState {
    pub agent_id: String,
    pub phase: Phase,
    wallet: Option<Wallet>,
    secret: Option<SecretToken>,
    pub estimator: MarketEstimator,
    pub ledger: SettlementLedger,
    pub private_values: PrivateValues,
    pub pending: PendingRequests,
    pub stats: SessionStats,
}

impl SessionState {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            agent_id: config.agent.id.clone(),
            phase: Phase::Unregistered,
            wallet: None,
            secret: None,
            estimator: MarketEstimator::new(&config.strategy),
            ledger: SettlementLedger::new(config.settlement.on_digest),
            private_values: PrivateValues::new(),
            pending: PendingRequests::new(),
            stats: SessionStats::default(),
        }
    }

    /// Install the wallet and secret from a `Registered` message.
    pub fn activate(&mut self, wallet: Wallet, secret: i64) {
        self.wallet = Some(wallet);
        self.secret = Some(SecretToken::new(secret));
        self.phase = Phase::Registered;
        self.stats.started_at = Some(Utc::now());
    }

    pub fn is_active(&self) -> bool {
        self.wallet.is_some()
    }

    pub fn wallet(&self) -> Result<&Wallet, BidderError> {
        self.wallet
            .as_ref()
            .ok_or_else(|| BidderError::InvalidState(format!("no active wallet ({})", self.phase)))
    }

    pub fn wallet_mut(&mut self) -> Result<&mut Wallet, BidderError> {
        let phase = self.phase;
        self.wallet
            .as_mut()
            .ok_or_else(|| BidderError::InvalidState(format!("no active wallet ({phase})")))
    }

    pub fn secret(&self) -> Result<i64, BidderError> {
        self.secret
            .as_ref()
            .map(SecretToken::expose)
            .ok_or_else(|| BidderError::InvalidState("no secret token issued".into()))
    }

    /// The wallet as it will look once every outstanding cash-in settles at
    /// `unit_value` per unit.
    pub fn available_wallet<F>(&self, unit_value: F) -> Result<Wallet, BidderError>
    where
        F: Fn(&crate::types::Item) -> Price,
    {
        let mut available = self.wallet()?.copy();
        for (item, count) in self.pending.cash_ins() {
            available.update(&item, -count, unit_value(&item) * count as f64);
        }
        Ok(available)
    }

    pub fn summary(&self, valuation: &ValuationEngine) -> Result<SessionSummary, BidderError> {
        let wallet = self.wallet()?;
        Ok(SessionSummary {
            agent_id: self.agent_id.clone(),
            started_at: self.stats.started_at,
            closed_at: Utc::now(),
            trades: self.stats.trades,
            offers: self.stats.offers,
            publications: self.stats.publications,
            cash_ins: self.stats.cash_ins,
            final_credits: wallet.credits(),
            final_value: valuation.value(wallet),
        })
    }

    /// Discard wallet, secret, histories and queues.
    pub fn teardown(&mut self) {
        self.wallet = None;
        self.secret = None;
        self.estimator.reset();
        self.ledger.clear();
        self.private_values.clear();
        self.pending.clear();
        self.stats = SessionStats::default();
        self.phase = Phase::Closed;
    }
}
