//! Market price estimation from rival bids and authoritative digests.
//!
//! Rival `LookingFor` prices are collected per item for the current round
//! only. When a digest arrives, the round's rival median is compared with
//! the authoritative median to gauge how far rivals are bluffing, then the
//! round is cleared.

use std::collections::HashMap;

use tracing::debug;

use crate::config::StrategyConfig;
use crate::types::{Digest, Item, Price};

/// Median of a set of observations. Even-length sets average the two middle
/// elements. `None` for an empty set.
pub fn median(values: &[Price]) -> Option<Price> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

/// Result of comparing the rival median with the authoritative median.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrustEstimate {
    pub authoritative: Price,
    pub rival_median: Option<Price>,
    /// Rival price with the observed bluff inverted: `d² / r`.
    pub inferred_true_price: Price,
    /// How far to lean away from the private valuation, `d / r` clamped.
    pub factor: f64,
}

#[derive(Debug, Clone)]
pub struct MarketEstimator {
    /// Rival bids seen since the last digest.
    round: HashMap<Item, Vec<Price>>,
    /// Last authoritative median per item. Survives the round clear.
    last_medians: HashMap<Item, Price>,
    rival_weight: f64,
    trust_floor: f64,
    trust_ceiling: f64,
}

impl MarketEstimator {
    pub fn new(config: &StrategyConfig) -> Self {
        Self {
            round: HashMap::new(),
            last_medians: HashMap::new(),
            rival_weight: config.rival_weight,
            trust_floor: config.trust_floor,
            trust_ceiling: config.trust_ceiling,
        }
    }

    pub fn observe_rival_bid(&mut self, item: &Item, price: Price) {
        if !price.is_finite() {
            debug!(item = %item, price, "Ignoring non-finite rival bid");
            return;
        }
        self.round.entry(item.clone()).or_default().push(price);
    }

    pub fn observations(&self, item: &Item) -> &[Price] {
        self.round.get(item).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn median_rival_price(&self, item: &Item) -> Option<Price> {
        median(self.observations(item))
    }

    pub fn last_median(&self, item: &Item) -> Option<Price> {
        self.last_medians.get(item).copied()
    }

    /// Trusted market price: the rival median and last digest median blended
    /// geometrically, or whichever one exists.
    pub fn market_estimate(&self, item: &Item) -> Option<Price> {
        let rival = self.median_rival_price(item).filter(|r| *r > 0.0);
        let digest = self.last_median(item).filter(|d| *d > 0.0);
        match (rival, digest) {
            (Some(r), Some(d)) => Some(d * (r / d).powf(self.rival_weight)),
            (Some(r), None) => Some(r),
            (None, Some(d)) => Some(d),
            (None, None) => None,
        }
    }

    /// Compare this round's rival median against `digest_median`. Falls back
    /// to the authoritative median unadjusted when there is no usable rival
    /// median.
    pub fn trust_adjusted_price(&self, item: &Item, digest_median: Price) -> TrustEstimate {
        match self.median_rival_price(item) {
            Some(r) if r > 0.0 && digest_median > 0.0 => TrustEstimate {
                authoritative: digest_median,
                rival_median: Some(r),
                inferred_true_price: digest_median * digest_median / r,
                factor: (digest_median / r).clamp(self.trust_floor, self.trust_ceiling),
            },
            rival => TrustEstimate {
                authoritative: digest_median,
                rival_median: rival,
                inferred_true_price: digest_median,
                factor: 1.0,
            },
        }
    }

    /// Compute trust estimates for every item in the digest and remember the
    /// authoritative medians. Does not clear the round; call
    /// [`clear_round`](Self::clear_round) once all consumers are done.
    pub fn absorb_digest(&mut self, digest: &Digest) -> HashMap<Item, TrustEstimate> {
        let estimates: HashMap<_, _> = digest
            .item_stats
            .iter()
            .map(|(item, stats)| (item.clone(), self.trust_adjusted_price(item, stats.median)))
            .collect();
        for (item, stats) in &digest.item_stats {
            self.last_medians.insert(item.clone(), stats.median);
        }
        estimates
    }

    pub fn clear_round(&mut self) {
        let observed: usize = self.round.values().map(Vec::len).sum();
        debug!(observed, "Clearing rival bid round");
        self.round.clear();
    }

    /// Forget everything, including authoritative medians (session teardown).
    pub fn reset(&mut self) {
        self.round.clear();
        self.last_medians.clear();
    }
}
