//! Shared types for the bidder agent.
//!
//! These types form the data model used across all modules: items and
//! prices, trade directions, the market digest, and the inbound/outbound
//! message contracts exchanged with the auctioneer and the broadcast bus.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// A price or credit amount. Negative values are only meaningful as deltas.
pub type Price = f64;

/// Correlates an outbound request with its later-arriving confirmation.
pub type CorrelationId = Uuid;

// ---------------------------------------------------------------------------
// Item
// ---------------------------------------------------------------------------

/// Opaque identifier for a tradable good type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Item(String);

impl Item {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Item {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Direction of a one-unit move in an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Sell,
    Stay,
    Buy,
}

impl Direction {
    /// Signed unit count: Sell = -1, Stay = 0, Buy = +1.
    pub fn sign(&self) -> i64 {
        match self {
            Direction::Sell => -1,
            Direction::Stay => 0,
            Direction::Buy => 1,
        }
    }

    pub fn signum(&self) -> f64 {
        self.sign() as f64
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Sell => write!(f, "SELL"),
            Direction::Stay => write!(f, "STAY"),
            Direction::Buy => write!(f, "BUY"),
        }
    }
}

/// Outcome of one of our own offers, as reported by the auctioneer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transfer {
    Sold,
    Bought,
    Rejected,
}

impl Transfer {
    /// The wallet direction this outcome implies (`Rejected` moves nothing).
    pub fn direction(&self) -> Direction {
        match self {
            Transfer::Sold => Direction::Sell,
            Transfer::Bought => Direction::Buy,
            Transfer::Rejected => Direction::Stay,
        }
    }
}

impl fmt::Display for Transfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transfer::Sold => write!(f, "SOLD"),
            Transfer::Bought => write!(f, "BOUGHT"),
            Transfer::Rejected => write!(f, "REJECTED"),
        }
    }
}

// ---------------------------------------------------------------------------
// Market statistics
// ---------------------------------------------------------------------------

/// Statistics for one item over the most recent settlement period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemStats {
    pub median: Price,
    #[serde(default)]
    pub min: Option<Price>,
    #[serde(default)]
    pub max: Option<Price>,
    /// Number of settled trades the statistics were computed from.
    #[serde(default)]
    pub count: Option<u64>,
}

impl ItemStats {
    pub fn with_median(median: Price) -> Self {
        Self {
            median,
            min: None,
            max: None,
            count: None,
        }
    }
}

/// Periodic authoritative broadcast of per-item market statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Digest {
    pub item_stats: HashMap<Item, ItemStats>,
}

impl Digest {
    /// Median for an item, if the item is present in this digest.
    pub fn median(&self, item: &Item) -> Option<Price> {
        self.item_stats.get(item).map(|s| s.median)
    }
}

impl FromIterator<(Item, Price)> for Digest {
    fn from_iter<T: IntoIterator<Item = (Item, Price)>>(iter: T) -> Self {
        Self {
            item_stats: iter
                .into_iter()
                .map(|(item, median)| (item, ItemStats::with_median(median)))
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Message contracts
// ---------------------------------------------------------------------------

/// Public interest broadcast ("LookingFor") on the bidders topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookingFor {
    pub item: Item,
    pub price: Price,
    /// Publishing agent, when the bus reports it.
    #[serde(default)]
    pub from: Option<String>,
}

/// Messages delivered to the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Inbound {
    SessionStart,
    RegisterAck {
        correlation_id: CorrelationId,
        accepted: bool,
    },
    Registered {
        items: HashMap<Item, i64>,
        credits: Price,
        secret: i64,
    },
    LookingFor(LookingFor),
    OfferAck {
        correlation_id: CorrelationId,
        accepted: bool,
    },
    OfferResult {
        item: Item,
        price: Price,
        transfer: Transfer,
    },
    Digest(Digest),
    CashInResult {
        correlation_id: CorrelationId,
        credits: Price,
    },
    SessionResult,
}

impl Inbound {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Inbound::SessionStart => "SessionStart",
            Inbound::RegisterAck { .. } => "RegisterAck",
            Inbound::Registered { .. } => "Registered",
            Inbound::LookingFor(_) => "LookingFor",
            Inbound::OfferAck { .. } => "OfferAck",
            Inbound::OfferResult { .. } => "OfferResult",
            Inbound::Digest(_) => "Digest",
            Inbound::CashInResult { .. } => "CashInResult",
            Inbound::SessionResult => "SessionResult",
        }
    }
}

/// Messages the agent sends. `Offer` and `CashIn` are authenticated with the
/// secret issued at registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Outbound {
    Register {
        correlation_id: CorrelationId,
        agent_id: String,
    },
    LookingFor(LookingFor),
    Offer {
        correlation_id: CorrelationId,
        agent_id: String,
        secret: i64,
        item: Item,
        price: Price,
    },
    CashIn {
        correlation_id: CorrelationId,
        agent_id: String,
        secret: i64,
        item: Item,
        count: i64,
    },
}

impl fmt::Display for Outbound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outbound::Register { agent_id, .. } => write!(f, "Register({agent_id})"),
            Outbound::LookingFor(lf) => write!(f, "LookingFor({} @ {:.2})", lf.item, lf.price),
            Outbound::Offer { item, price, .. } => write!(f, "Offer({item} @ {price:.2})"),
            Outbound::CashIn { item, count, .. } => write!(f, "CashIn({item} x{count})"),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for the bidder.
#[derive(Debug, thiserror::Error)]
pub enum BidderError {
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Non-positive price {price} computed for {item}")]
    NonPositivePrice { item: Item, price: Price },

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
