//! Exploration-based liquidation.
//!
//! When credits go negative after a fill, sell off single units until the
//! projected credits are back above zero or nothing is left to sell. With
//! probability `exploration_rate` a uniformly random held item is chosen,
//! otherwise the item with the largest holding.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::engine::ledger::CashInOrder;
use crate::types::{Item, Price};
use crate::wallet::Wallet;

#[derive(Debug, Clone)]
pub struct ExplorationLiquidator {
    exploration_rate: f64,
    rng: StdRng,
}

impl ExplorationLiquidator {
    pub fn new(exploration_rate: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            exploration_rate,
            rng,
        }
    }

    /// Single-unit cash-ins for `available`, projecting each unit at
    /// `unit_value`. Never plans more units of an item than are held.
    pub fn plan<F>(&mut self, available: &Wallet, unit_value: F) -> Vec<CashInOrder>
    where
        F: Fn(&Item) -> Price,
    {
        let mut scratch = available.copy();
        let mut orders = Vec::new();

        while scratch.credits() < 0.0 {
            let held = scratch.held();
            if held.is_empty() {
                debug!(credits = scratch.credits(), "Inventory exhausted, still in debt");
                break;
            }
            let explore = self.rng.gen::<f64>() < self.exploration_rate;
            let item = if explore {
                held[self.rng.gen_range(0..held.len())].0.clone()
            } else {
                // `held` is sorted by item; max_by_key keeps the last maximum,
                // so compare reversed to keep the first.
                held.iter()
                    .rev()
                    .max_by_key(|(_, count)| *count)
                    .map(|(item, _)| item.clone())
                    .unwrap_or_else(|| held[0].0.clone())
            };
            let proceeds = unit_value(&item).max(0.0);
            debug!(item = %item, explore, proceeds, "Liquidating one unit");
            scratch.update(&item, -1, proceeds);
            orders.push(CashInOrder { item, count: 1 });
        }
        orders
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn make_wallet(a: i64, b: i64, credits: Price) -> Wallet {
        Wallet::new(
            "b1",
            HashMap::from([(Item::from("A"), a), (Item::from("B"), b)]),
            credits,
        )
    }

    fn units_of(orders: &[CashInOrder], item: &str) -> i64 {
        orders
            .iter()
            .filter(|o| o.item.as_str() == item)
            .map(|o| o.count)
            .sum()
    }

    #[test]
    fn test_no_debt_no_orders() {
        let mut liquidator = ExplorationLiquidator::new(0.5, Some(7));
        assert!(liquidator.plan(&make_wallet(3, 2, 0.0), |_| 1.0).is_empty());
    }

    #[test]
    fn test_greedy_sells_largest_holding_first() {
        let mut liquidator = ExplorationLiquidator::new(0.0, Some(7));
        let orders = liquidator.plan(&make_wallet(3, 2, -4.0), |_| 3.0);
        // -4 + 3 + 3 >= 0 after two units: A (3) then A/B tie at 2 -> A.
        assert_eq!(orders.len(), 2);
        assert_eq!(units_of(&orders, "A"), 2);
    }

    #[test]
    fn test_terminates_and_respects_holdings() {
        for seed in 0..50 {
            let mut liquidator = ExplorationLiquidator::new(0.7, Some(seed));
            let orders = liquidator.plan(&make_wallet(3, 2, -10.0), |_| 0.5);
            // Proceeds never cover the debt: everything goes, nothing more.
            assert_eq!(orders.len(), 5);
            assert_eq!(units_of(&orders, "A"), 3);
            assert_eq!(units_of(&orders, "B"), 2);
            assert!(orders.iter().all(|o| o.count == 1));
        }
    }

    #[test]
    fn test_stops_once_credits_recover() {
        let mut liquidator = ExplorationLiquidator::new(1.0, Some(3));
        let orders = liquidator.plan(&make_wallet(3, 2, -10.0), |_| 4.0);
        assert_eq!(orders.len(), 3);
    }
}
