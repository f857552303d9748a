//! Inventory and credit ledger of a single bidding session.
//!
//! The wallet stores counts only. What the holdings are worth is decided by
//! the [`ValuationEngine`](crate::valuation::ValuationEngine); see
//! [`Wallet::value`].
//!
//! Counts may go negative. Whether a short position is acceptable is a
//! policy decision made by the pricing strategy, not by the wallet.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::types::{Item, Price};
use crate::valuation::ValuationModel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub owner_id: String,
    items: HashMap<Item, i64>,
    credits: Price,
}

impl fmt::Display for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut items: Vec<_> = self.items.iter().collect();
        items.sort_by(|a, b| a.0.cmp(b.0));
        write!(f, "{} | credits={:.2} |", self.owner_id, self.credits)?;
        for (item, count) in items {
            write!(f, " {item}={count}")?;
        }
        Ok(())
    }
}

impl Wallet {
    pub fn new(owner_id: impl Into<String>, items: HashMap<Item, i64>, credits: Price) -> Self {
        Self {
            owner_id: owner_id.into(),
            items,
            credits,
        }
    }

    /// Apply a signed inventory and credit change. No check against negative
    /// counts: short positions are representable.
    pub fn update(&mut self, item: &Item, delta_count: i64, delta_credits: Price) {
        *self.items.entry(item.clone()).or_insert(0) += delta_count;
        self.credits += delta_credits;
    }

    /// Total imputed worth: credits plus the model's value of every holding.
    pub fn value(&self, model: &ValuationModel) -> Price {
        self.credits
            + self
                .items
                .iter()
                .map(|(item, count)| model.item_value(item, *count))
                .sum::<Price>()
    }

    /// Independent snapshot for what-if valuation.
    pub fn copy(&self) -> Wallet {
        self.clone()
    }

    pub fn count(&self, item: &Item) -> i64 {
        self.items.get(item).copied().unwrap_or(0)
    }

    /// Whether the item has an entry at all (a zero count still counts).
    pub fn tracks(&self, item: &Item) -> bool {
        self.items.contains_key(item)
    }

    pub fn credits(&self) -> Price {
        self.credits
    }

    /// Items with a strictly positive count, sorted for deterministic iteration.
    pub fn held(&self) -> Vec<(Item, i64)> {
        let mut held: Vec<_> = self
            .items
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(item, count)| (item.clone(), *count))
            .collect();
        held.sort_by(|a, b| a.0.cmp(&b.0));
        held
    }

    /// Every tracked item, sorted.
    pub fn item_names(&self) -> Vec<Item> {
        let mut names: Vec<_> = self.items.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValuationConfig;

    fn make_wallet() -> Wallet {
        Wallet::new(
            "b1",
            HashMap::from([(Item::from("Widget"), 4), (Item::from("Gadget"), 1)]),
            100.0,
        )
    }

    fn linear_model() -> ValuationModel {
        ValuationModel::new(&ValuationConfig {
            default_unit_value: 10.0,
            default_decay: 1.0,
            ..ValuationConfig::default()
        })
    }

    #[test]
    fn test_update_allows_short_positions() {
        let mut wallet = make_wallet();
        wallet.update(&Item::from("Gadget"), -3, 45.0);
        assert_eq!(wallet.count(&Item::from("Gadget")), -2);
        assert_eq!(wallet.credits(), 145.0);
    }

    #[test]
    fn test_update_creates_entry_for_new_item() {
        let mut wallet = make_wallet();
        let item = Item::from("Sprocket");
        assert!(!wallet.tracks(&item));
        wallet.update(&item, 1, -5.0);
        assert!(wallet.tracks(&item));
        assert_eq!(wallet.count(&item), 1);
    }

    #[test]
    fn test_copy_is_independent() {
        let wallet = make_wallet();
        let mut snapshot = wallet.copy();
        snapshot.update(&Item::from("Widget"), -4, 10.0);
        assert_eq!(wallet.count(&Item::from("Widget")), 4);
        assert_eq!(wallet.credits(), 100.0);
        assert_eq!(snapshot.count(&Item::from("Widget")), 0);
    }

    #[test]
    fn test_value_is_credits_plus_holdings() {
        let wallet = make_wallet();
        // Linear model: 5 units at 10 each.
        assert!((wallet.value(&linear_model()) - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_held_skips_empty_and_short() {
        let mut wallet = make_wallet();
        wallet.update(&Item::from("Gadget"), -2, 0.0);
        wallet.update(&Item::from("Sprocket"), 0, 0.0);
        assert_eq!(wallet.held(), vec![(Item::from("Widget"), 4)]);
    }
}
