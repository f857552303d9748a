//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs. Every
//! section has defaults, so a partial file (or no `[section]` at all) is
//! valid. The path can be overridden with the `BIDDER_CONFIG` env var.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;

use crate::types::{BidderError, Item};

/// Golden ratio, the default bluff factor.
pub const GOLDEN_RATIO: f64 = 1.618_033_988_749_895;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub strategy: StrategyConfig,
    pub scoring: ScoringConfig,
    pub valuation: ValuationConfig,
    pub settlement: SettlementConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AgentConfig {
    pub id: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            id: "bidder-001".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// What to do when a strategy computes a price that is not strictly positive.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum NonPositivePrice {
    /// Skip this item for this round.
    #[default]
    Abstain,
    /// Abort the decision with `BidderError::NonPositivePrice`.
    Fatal,
}

/// Pricing policy and its parameters, tagged by `kind` in TOML.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyConfig {
    ConservativeMean,
    PrivateValueMaximizing {
        #[serde(default = "default_surplus_share")]
        surplus_share: f64,
    },
    BluffingMedian {
        #[serde(default = "default_bluff_factor")]
        bluff_factor: f64,
        #[serde(default = "default_surplus_share")]
        surplus_share: f64,
    },
    ExplorationLiquidation {
        #[serde(default = "default_exploration_rate")]
        exploration_rate: f64,
        #[serde(default = "default_surplus_share")]
        surplus_share: f64,
        /// Fixed RNG seed for reproducible runs.
        #[serde(default)]
        seed: Option<u64>,
    },
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig::ConservativeMean
    }
}

fn default_surplus_share() -> f64 {
    0.5
}

fn default_bluff_factor() -> f64 {
    GOLDEN_RATIO
}

fn default_exploration_rate() -> f64 {
    0.1
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StrategyConfig {
    pub policy: PolicyConfig,
    pub non_positive_price: NonPositivePrice,
    /// Geometric weight of the rival median against the digest median.
    pub rival_weight: f64,
    pub trust_floor: f64,
    pub trust_ceiling: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            policy: PolicyConfig::default(),
            non_positive_price: NonPositivePrice::default(),
            rival_weight: 0.5,
            trust_floor: 0.5,
            trust_ceiling: 2.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Scoring & valuation
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScoringConfig {
    /// Multiplier on the transfer price when the agent holds none of the item.
    pub empty_holding_cost_factor: f64,
    /// Multiplier on the magnitude of a sell that opens or extends a short.
    pub short_sell_punishment: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            empty_holding_cost_factor: 1.0,
            short_sell_punishment: 1.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct ItemValuationConfig {
    pub unit_value: f64,
    #[serde(default = "default_decay")]
    pub decay: f64,
}

fn default_decay() -> f64 {
    0.9
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ValuationConfig {
    pub default_unit_value: f64,
    pub default_decay: f64,
    pub short_multiplier: f64,
    pub items: HashMap<Item, ItemValuationConfig>,
}

impl Default for ValuationConfig {
    fn default() -> Self {
        Self {
            default_unit_value: 10.0,
            default_decay: default_decay(),
            short_multiplier: 1.5,
            items: HashMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Settlement
// ---------------------------------------------------------------------------

/// Ledger behaviour on each digest.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DigestAction {
    /// Cash in units sized by the best-profit trade of the round.
    #[default]
    CashInBest,
    /// Log the net position per item; no cash-in.
    Diagnose,
    /// Only clear the queues.
    Hold,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct SettlementConfig {
    pub on_digest: DigestAction,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config = Self::parse(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Parse and validate a TOML document.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject parameter combinations the strategies cannot work with.
    pub fn validate(&self) -> Result<(), BidderError> {
        if self.agent.id.trim().is_empty() {
            return Err(BidderError::Config("agent.id must not be empty".into()));
        }
        if !(0.0..=1.0).contains(&self.strategy.rival_weight) {
            return Err(BidderError::Config(format!(
                "strategy.rival_weight must be in [0, 1], got {}",
                self.strategy.rival_weight
            )));
        }
        if self.strategy.trust_floor <= 0.0 || self.strategy.trust_floor > self.strategy.trust_ceiling {
            return Err(BidderError::Config(format!(
                "invalid trust bounds [{}, {}]",
                self.strategy.trust_floor, self.strategy.trust_ceiling
            )));
        }
        match &self.strategy.policy {
            PolicyConfig::ConservativeMean => {}
            PolicyConfig::PrivateValueMaximizing { surplus_share } => check_share(*surplus_share)?,
            PolicyConfig::BluffingMedian { bluff_factor, surplus_share } => {
                check_share(*surplus_share)?;
                if *bluff_factor < 1.0 {
                    return Err(BidderError::Config(format!(
                        "bluff_factor must be >= 1, got {bluff_factor}"
                    )));
                }
            }
            PolicyConfig::ExplorationLiquidation { exploration_rate, surplus_share, .. } => {
                check_share(*surplus_share)?;
                if !(0.0..=1.0).contains(exploration_rate) {
                    return Err(BidderError::Config(format!(
                        "exploration_rate must be in [0, 1], got {exploration_rate}"
                    )));
                }
            }
        }
        if self.scoring.empty_holding_cost_factor < 1.0 || self.scoring.short_sell_punishment < 1.0 {
            return Err(BidderError::Config("scoring multipliers must be >= 1".into()));
        }
        let decays = std::iter::once(self.valuation.default_decay)
            .chain(self.valuation.items.values().map(|v| v.decay));
        for decay in decays {
            if !(decay > 0.0 && decay <= 1.0) {
                return Err(BidderError::Config(format!("decay must be in (0, 1], got {decay}")));
            }
        }
        Ok(())
    }
}

fn check_share(share: f64) -> Result<(), BidderError> {
    if (0.0..=1.0).contains(&share) {
        Ok(())
    } else {
        Err(BidderError::Config(format!("surplus_share must be in [0, 1], got {share}")))
    }
}
