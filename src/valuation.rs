//! Private valuation of holdings and hypothetical trades.
//!
//! [`ValuationModel`] says what a count of an item is worth to this agent
//! (diminishing returns on long positions, a surcharge on shorts).
//! [`ValuationEngine`] builds on it to price hypothetical trades; every
//! pricing policy funnels through [`ValuationEngine::diff_wallet`].

use std::collections::HashMap;

use crate::config::{ItemValuationConfig, ScoringConfig, ValuationConfig};
use crate::types::{Direction, Item, Price};
use crate::wallet::Wallet;

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// Per-item value curves.
#[derive(Debug, Clone)]
pub struct ValuationModel {
    default: ItemValuationConfig,
    items: HashMap<Item, ItemValuationConfig>,
    short_multiplier: f64,
}

impl ValuationModel {
    pub fn new(config: &ValuationConfig) -> Self {
        Self {
            default: ItemValuationConfig {
                unit_value: config.default_unit_value,
                decay: config.default_decay,
            },
            items: config.items.clone(),
            short_multiplier: config.short_multiplier,
        }
    }

    fn curve(&self, item: &Item) -> &ItemValuationConfig {
        self.items.get(item).unwrap_or(&self.default)
    }

    /// Worth of holding `count` units of `item`.
    ///
    /// Long positions follow a geometric series: the k-th unit is worth
    /// `unit_value * decay^(k-1)`. Short positions cost `short_multiplier`
    /// times the undiscounted unit value per unit owed.
    pub fn item_value(&self, item: &Item, count: i64) -> Price {
        let curve = self.curve(item);
        if count >= 0 {
            if (curve.decay - 1.0).abs() < f64::EPSILON {
                curve.unit_value * count as f64
            } else {
                let exponent = i32::try_from(count).unwrap_or(i32::MAX);
                curve.unit_value * (1.0 - curve.decay.powi(exponent)) / (1.0 - curve.decay)
            }
        } else {
            -curve.unit_value * count.unsigned_abs() as f64 * self.short_multiplier
        }
    }

    /// Undiscounted value of one unit.
    pub fn unit_value(&self, item: &Item) -> Price {
        self.curve(item).unit_value
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ValuationEngine {
    model: ValuationModel,
    scoring: ScoringConfig,
}

impl ValuationEngine {
    pub fn new(model: ValuationModel, scoring: ScoringConfig) -> Self {
        Self { model, scoring }
    }

    pub fn model(&self) -> &ValuationModel {
        &self.model
    }

    pub fn value(&self, wallet: &Wallet) -> Price {
        wallet.value(&self.model)
    }

    /// `value(W) - value(W')` where `W'` is a copy of `W` holding `count`
    /// fewer units of `item` and `credits` more credits. The live wallet is
    /// never touched.
    pub fn diff_wallet(&self, wallet: &Wallet, item: &Item, count: i64, credits: Price) -> Price {
        let mut without = wallet.copy();
        without.update(item, -count, credits);
        self.value(wallet) - self.value(&without)
    }

    /// Average value per held unit, `diff_wallet(W, item, n, 0) / n`.
    /// `None` when nothing is held.
    pub fn mean_item_price(&self, wallet: &Wallet, item: &Item) -> Option<Price> {
        let count = wallet.count(item);
        if count <= 0 {
            return None;
        }
        Some(self.diff_wallet(wallet, item, count, 0.0) / count as f64)
    }

    /// Value gained by moving one unit of `item` in `direction` at
    /// `market_price`, after the scoring adjustments.
    pub fn score(&self, wallet: &Wallet, item: &Item, direction: Direction, market_price: Price) -> Price {
        if direction == Direction::Stay {
            return 0.0;
        }
        let dir = direction.signum();
        let raw = -self.diff_wallet(wallet, item, -direction.sign(), -dir * market_price);

        let held = wallet.count(item);
        let mut score = raw;
        if held == 0 {
            score -= (self.scoring.empty_holding_cost_factor - 1.0) * market_price.abs();
        }
        if direction == Direction::Sell && held <= 0 {
            score -= (self.scoring.short_sell_punishment - 1.0) * score.abs();
        }
        score
    }

    /// Realized value of a trade that has just filled, measured on the
    /// pre-trade wallet with no scoring adjustments.
    pub fn realized_value(&self, wallet: &Wallet, item: &Item, direction: Direction, price: Price) -> Price {
        if direction == Direction::Stay {
            return 0.0;
        }
        -self.diff_wallet(wallet, item, -direction.sign(), -direction.signum() * price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_engine(scoring: ScoringConfig) -> ValuationEngine {
        let config = ValuationConfig {
            default_unit_value: 10.0,
            default_decay: 0.9,
            short_multiplier: 1.5,
            items: HashMap::from([(
                Item::from("Gadget"),
                ItemValuationConfig {
                    unit_value: 20.0,
                    decay: 1.0,
                },
            )]),
        };
        ValuationEngine::new(ValuationModel::new(&config), scoring)
    }

    fn make_wallet(widgets: i64, credits: Price) -> Wallet {
        Wallet::new("b1", HashMap::from([(Item::from("Widget"), widgets)]), credits)
    }

    #[test]
    fn test_item_value_geometric_series() {
        let engine = make_engine(ScoringConfig::default());
        let widget = Item::from("Widget");
        // 10 + 9 + 8.1
        assert!((engine.model().item_value(&widget, 3) - 27.1).abs() < 1e-9);
        assert_eq!(engine.model().item_value(&widget, 0), 0.0);
        assert!((engine.model().item_value(&widget, -2) + 30.0).abs() < 1e-9);
        assert!((engine.model().item_value(&Item::from("Gadget"), 3) - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_item_value_saturates_for_huge_holdings() {
        let engine = make_engine(ScoringConfig::default());
        // 2^32 units would wrap to zero as an i32 exponent.
        let value = engine.model().item_value(&Item::from("Widget"), 1 << 32);
        assert!((value - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_diff_wallet_does_not_mutate() {
        let engine = make_engine(ScoringConfig::default());
        let wallet = make_wallet(4, 100.0);
        let before = wallet.clone();
        engine.diff_wallet(&wallet, &Item::from("Widget"), 2, 15.0);
        assert_eq!(wallet, before);
    }

    #[test]
    fn test_diff_wallet_reverse_trade_symmetry() {
        let engine = make_engine(ScoringConfig::default());
        let widget = Item::from("Widget");
        for (held, c) in [(4, 1), (4, 3), (1, 2), (0, 1), (2, -2)] {
            let wallet = make_wallet(held, 50.0);
            let forward = engine.diff_wallet(&wallet, &widget, c, 0.0);

            // The post-trade wallet, reversed.
            let mut after = wallet.copy();
            after.update(&widget, -c, 0.0);
            let backward = engine.diff_wallet(&after, &widget, -c, 0.0);

            assert!((forward + backward).abs() < 1e-9, "held={held} c={c}");
        }
    }

    #[test]
    fn test_mean_price_scenario() {
        let engine = make_engine(ScoringConfig::default());
        let widget = Item::from("Widget");
        let wallet = make_wallet(4, 100.0);

        let mean = engine.mean_item_price(&wallet, &widget).unwrap();
        assert!((mean - engine.diff_wallet(&wallet, &widget, 4, 0.0) / 4.0).abs() < 1e-12);

        let mut emptied = wallet.copy();
        emptied.update(&widget, -4, 0.0);
        let expected = (engine.value(&wallet) - engine.value(&emptied)) / 4.0;
        assert!((mean - expected).abs() < 1e-12);
    }

    #[test]
    fn test_mean_price_none_without_holdings() {
        let engine = make_engine(ScoringConfig::default());
        assert!(engine.mean_item_price(&make_wallet(0, 10.0), &Item::from("Widget")).is_none());
        assert!(engine.mean_item_price(&make_wallet(-1, 10.0), &Item::from("Widget")).is_none());
    }

    #[test]
    fn test_score_buy_and_sell() {
        let engine = make_engine(ScoringConfig::default());
        let widget = Item::from("Widget");
        let wallet = make_wallet(2, 100.0);
        // 3rd unit is worth 8.1; buying at 5 gains 3.1.
        assert!((engine.score(&wallet, &widget, Direction::Buy, 5.0) - 3.1).abs() < 1e-9);
        // 2nd unit is worth 9; selling at 12 gains 3.
        assert!((engine.score(&wallet, &widget, Direction::Sell, 12.0) - 3.0).abs() < 1e-9);
        assert_eq!(engine.score(&wallet, &widget, Direction::Stay, 12.0), 0.0);
    }

    #[test]
    fn test_score_doubles_cost_when_empty() {
        let plain = make_engine(ScoringConfig::default());
        let penalised = make_engine(ScoringConfig {
            empty_holding_cost_factor: 2.0,
            short_sell_punishment: 1.0,
        });
        let widget = Item::from("Widget");
        let wallet = make_wallet(0, 100.0);
        let base = plain.score(&wallet, &widget, Direction::Buy, 4.0);
        let doubled = penalised.score(&wallet, &widget, Direction::Buy, 4.0);
        assert!((base - doubled - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_score_punishes_selling_into_short() {
        let plain = make_engine(ScoringConfig::default());
        let punishing = make_engine(ScoringConfig {
            empty_holding_cost_factor: 1.0,
            short_sell_punishment: 2.0,
        });
        let widget = Item::from("Widget");
        let wallet = make_wallet(0, 100.0);
        let base = plain.score(&wallet, &widget, Direction::Sell, 20.0);
        let punished = punishing.score(&wallet, &widget, Direction::Sell, 20.0);
        // Short of one unit costs 15; selling at 20 gains 5, halved to 0.
        assert!((base - 5.0).abs() < 1e-9);
        assert!(punished.abs() < 1e-9);

        // Long wallets are not punished.
        let long = make_wallet(3, 100.0);
        assert_eq!(
            plain.score(&long, &widget, Direction::Sell, 20.0),
            punishing.score(&long, &widget, Direction::Sell, 20.0)
        );
    }

    #[test]
    fn test_realized_value_of_fill() {
        let engine = make_engine(ScoringConfig::default());
        let widget = Item::from("Widget");
        let wallet = make_wallet(1, 100.0);
        // Selling the only unit (worth 10) at 14.
        assert!((engine.realized_value(&wallet, &widget, Direction::Sell, 14.0) - 4.0).abs() < 1e-9);
        // Buying a 2nd (worth 9) at 14.
        assert!((engine.realized_value(&wallet, &widget, Direction::Buy, 14.0) + 5.0).abs() < 1e-9);
    }
}
