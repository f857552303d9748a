//! Pricing strategy: turns wallet, valuation and market estimates into
//! prices to publish or offer.
//!
//! One [`PricingStrategy`] covers every configured policy
//! ([`PolicyConfig`]); the policies share the valuation and estimation
//! primitives and differ only in the numeric rule applied at each trigger.

pub mod bluff;
pub mod estimator;
pub mod guard;

use std::collections::HashMap;

use tracing::debug;

use crate::config::{AppConfig, PolicyConfig};
use crate::types::{BidderError, Digest, Direction, Item, Price};
use crate::valuation::{ValuationEngine, ValuationModel};
use crate::wallet::Wallet;
use estimator::{MarketEstimator, TrustEstimate};
use guard::PriceGuard;

/// Score of a one-unit move per item and direction, recomputed on each digest.
pub type PrivateValues = HashMap<(Item, Direction), Price>;

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

/// Something the strategy wants sent. An empty decision list is abstention.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// Broadcast a `LookingFor` at this price.
    Publish { item: Item, price: Price },
    /// Submit an authenticated offer to the auctioneer.
    Offer { item: Item, price: Price },
}

/// Read-only view of session state handed to the strategy on each trigger.
pub struct StrategyContext<'a> {
    pub wallet: &'a Wallet,
    pub estimator: &'a MarketEstimator,
    pub private_values: &'a PrivateValues,
}

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PricingStrategy {
    policy: PolicyConfig,
    guard: PriceGuard,
    valuation: ValuationEngine,
}

impl PricingStrategy {
    pub fn new(policy: PolicyConfig, guard: PriceGuard, valuation: ValuationEngine) -> Self {
        Self {
            policy,
            guard,
            valuation,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.strategy.policy.clone(),
            PriceGuard::new(config.strategy.non_positive_price),
            ValuationEngine::new(ValuationModel::new(&config.valuation), config.scoring.clone()),
        )
    }

    pub fn valuation(&self) -> &ValuationEngine {
        &self.valuation
    }

    /// Whether this policy may sell what it does not hold.
    pub fn allows_short(&self) -> bool {
        matches!(
            self.policy,
            PolicyConfig::PrivateValueMaximizing { .. } | PolicyConfig::BluffingMedian { .. }
        )
    }

    // -- triggers -------------------------------------------------------------

    /// Initial interest price, from private valuation only.
    pub fn on_registered(&self, wallet: &Wallet, item: &Item) -> Result<Vec<Intent>, BidderError> {
        let price = match &self.policy {
            PolicyConfig::BluffingMedian { bluff_factor, .. } => {
                let (base, intent) = self.registration_intent(wallet, item);
                let fake = bluff::fake_price(base, intent, *bluff_factor);
                debug!(item = %item, base, intent = %intent, fake, "Bluffing initial interest");
                Some(fake)
            }
            _ => self.valuation.mean_item_price(wallet, item),
        };
        let Some(price) = price else {
            debug!(item = %item, "No holdings, no initial interest");
            return Ok(Vec::new());
        };
        self.publish(item, price)
    }

    /// Counter-offer after a rival `LookingFor` has been recorded.
    pub fn on_looking_for(
        &self,
        ctx: &StrategyContext<'_>,
        item: &Item,
        observed: Price,
    ) -> Result<Vec<Intent>, BidderError> {
        match &self.policy {
            PolicyConfig::ConservativeMean => match self.valuation.mean_item_price(ctx.wallet, item) {
                Some(price) => self.offer(item, price),
                None => Ok(Vec::new()),
            },
            PolicyConfig::PrivateValueMaximizing { surplus_share }
            | PolicyConfig::ExplorationLiquidation { surplus_share, .. } => {
                let Some(market) = ctx.estimator.market_estimate(item) else {
                    return Ok(Vec::new());
                };
                let use_cached = matches!(self.policy, PolicyConfig::PrivateValueMaximizing { .. });
                let cached = if use_cached { Some(ctx.private_values) } else { None };
                match self.best_direction(ctx.wallet, item, market, cached) {
                    Some((dir, surplus)) => {
                        let price = market + dir.signum() * surplus_share * surplus;
                        debug!(item = %item, observed, market, dir = %dir, surplus, price, "Counter-offer");
                        self.offer(item, price)
                    }
                    None => {
                        debug!(item = %item, observed, market, "No profitable direction");
                        Ok(Vec::new())
                    }
                }
            }
            PolicyConfig::BluffingMedian {
                bluff_factor,
                surplus_share,
            } => {
                let Some(market) = ctx.estimator.market_estimate(item) else {
                    return Ok(Vec::new());
                };
                let Some((dir, surplus)) = self.best_direction(ctx.wallet, item, market, None) else {
                    return Ok(Vec::new());
                };
                let true_price = market + dir.signum() * surplus_share * surplus;
                let fake = bluff::fake_price(market, dir, *bluff_factor);
                debug!(item = %item, observed, market, dir = %dir, true_price, fake, "Bluffed counter-offer");
                let mut intents = self.offer(item, true_price)?;
                intents.extend(self.publish(item, fake)?);
                Ok(intents)
            }
        }
    }

    /// New interest price for the round opened by a digest.
    pub fn on_digest(
        &self,
        ctx: &StrategyContext<'_>,
        item: &Item,
        trust: &TrustEstimate,
    ) -> Result<Vec<Intent>, BidderError> {
        let median = trust.authoritative;
        match &self.policy {
            PolicyConfig::ConservativeMean => match self.valuation.mean_item_price(ctx.wallet, item) {
                Some(price) => self.publish(item, price),
                None => Ok(Vec::new()),
            },
            PolicyConfig::PrivateValueMaximizing { surplus_share }
            | PolicyConfig::ExplorationLiquidation { surplus_share, .. } => {
                match self.best_direction(ctx.wallet, item, median, None) {
                    Some((dir, surplus)) => {
                        let price = median + dir.signum() * surplus_share * surplus * trust.factor;
                        debug!(item = %item, median, dir = %dir, factor = trust.factor, price, "Republishing");
                        self.publish(item, price)
                    }
                    None => Ok(Vec::new()),
                }
            }
            PolicyConfig::BluffingMedian { bluff_factor, .. } => {
                let dir = self
                    .best_direction(ctx.wallet, item, median, None)
                    .map(|(dir, _)| dir)
                    .unwrap_or(Direction::Stay);
                let fake = bluff::fake_price(median, dir, *bluff_factor);
                let price = match trust.rival_median {
                    Some(r) if r > 0.0 => bluff::geometric_blend(fake, trust.inferred_true_price).unwrap_or(fake),
                    _ => fake,
                };
                debug!(
                    item = %item,
                    median,
                    dir = %dir,
                    fake,
                    inferred = trust.inferred_true_price,
                    price,
                    "Bluffing against rival tendency"
                );
                self.publish(item, price)
            }
        }
    }

    /// Scores for selling and buying one unit of every tracked item at the
    /// digest median.
    pub fn private_values(&self, wallet: &Wallet, digest: &Digest) -> PrivateValues {
        let mut values = PrivateValues::new();
        for item in wallet.item_names() {
            let Some(median) = digest.median(&item) else {
                continue;
            };
            for dir in [Direction::Sell, Direction::Buy] {
                values.insert((item.clone(), dir), self.valuation.score(wallet, &item, dir, median));
            }
        }
        values
    }

    // -- helpers --------------------------------------------------------------

    /// Most profitable direction at `market` and its surplus. `None` when
    /// neither direction gains anything.
    fn best_direction(
        &self,
        wallet: &Wallet,
        item: &Item,
        market: Price,
        cached: Option<&PrivateValues>,
    ) -> Option<(Direction, Price)> {
        let score = |dir: Direction| {
            cached
                .and_then(|values| values.get(&(item.clone(), dir)).copied())
                .unwrap_or_else(|| self.valuation.score(wallet, item, dir, market))
        };
        let buy = score(Direction::Buy);
        let sell = if self.allows_short() || wallet.count(item) > 0 {
            score(Direction::Sell)
        } else {
            f64::NEG_INFINITY
        };
        let (dir, surplus) = if sell > buy {
            (Direction::Sell, sell)
        } else {
            (Direction::Buy, buy)
        };
        (surplus > 0.0).then_some((dir, surplus))
    }

    /// Base price and true intent used for the opening bluff. With holdings,
    /// a last unit worth less than the average one means we lean to selling.
    fn registration_intent(&self, wallet: &Wallet, item: &Item) -> (Price, Direction) {
        match self.valuation.mean_item_price(wallet, item) {
            Some(mean) => {
                let marginal = self.valuation.diff_wallet(wallet, item, 1, 0.0);
                let intent = if marginal < mean {
                    Direction::Sell
                } else {
                    Direction::Buy
                };
                (mean, intent)
            }
            None => (-self.valuation.diff_wallet(wallet, item, -1, 0.0), Direction::Buy),
        }
    }

    fn publish(&self, item: &Item, price: Price) -> Result<Vec<Intent>, BidderError> {
        Ok(self
            .guard
            .check(item, price)?
            .map(|price| Intent::Publish {
                item: item.clone(),
                price,
            })
            .into_iter()
            .collect())
    }

    fn offer(&self, item: &Item, price: Price) -> Result<Vec<Intent>, BidderError> {
        Ok(self
            .guard
            .check(item, price)?
            .map(|price| Intent::Offer {
                item: item.clone(),
                price,
            })
            .into_iter()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
