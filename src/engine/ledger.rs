//! Settlement ledger: filled trades since the last digest, best profit first.
//!
//! Each confirmed fill is valued against the pre-trade wallet and queued per
//! item. On every digest the queues drive a cash-in (or a diagnostic
//! position summary) and are cleared; at auction close everything still
//! held is cashed in.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use tracing::{debug, info};

use crate::config::DigestAction;
use crate::types::{Direction, Item, Price};
use crate::valuation::ValuationEngine;
use crate::wallet::Wallet;

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AcceptedTrade {
    pub realized_value: Price,
    pub direction: Direction,
    pub trade_price: Price,
    pub units: i64,
    pub filled_at: DateTime<Utc>,
}

impl PartialEq for AcceptedTrade {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for AcceptedTrade {}

impl PartialOrd for AcceptedTrade {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Ordered by realized value only, so the heap top is the most profitable.
impl Ord for AcceptedTrade {
    fn cmp(&self, other: &Self) -> Ordering {
        self.realized_value.total_cmp(&other.realized_value)
    }
}

/// A cash-in the ledger wants issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CashInOrder {
    pub item: Item,
    pub count: i64,
}

/// Net position over one round of fills, for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSummary {
    pub item: Item,
    pub net_units: i64,
    pub mean_price: Price,
    pub best_value: Price,
}

/// What a digest made the ledger do.
#[derive(Debug, Clone, Default)]
pub struct DigestSettlement {
    pub cash_ins: Vec<CashInOrder>,
    pub positions: Vec<PositionSummary>,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SettlementLedger {
    queues: HashMap<Item, BinaryHeap<AcceptedTrade>>,
    action: DigestAction,
}

impl SettlementLedger {
    pub fn new(action: DigestAction) -> Self {
        Self {
            queues: HashMap::new(),
            action,
        }
    }

    /// Value a fill against the pre-trade `wallet` and queue it. Returns the
    /// realized value.
    pub fn record_fill(
        &mut self,
        valuation: &ValuationEngine,
        wallet: &Wallet,
        item: &Item,
        direction: Direction,
        price: Price,
    ) -> Price {
        let realized_value = valuation.realized_value(wallet, item, direction, price);
        self.record(
            item,
            AcceptedTrade {
                realized_value,
                direction,
                trade_price: price,
                units: 1,
                filled_at: Utc::now(),
            },
        );
        realized_value
    }

    pub fn record(&mut self, item: &Item, trade: AcceptedTrade) {
        debug!(
            item = %item,
            value = trade.realized_value,
            direction = %trade.direction,
            price = trade.trade_price,
            "Trade queued"
        );
        self.queues.entry(item.clone()).or_default().push(trade);
    }

    pub fn top(&self, item: &Item) -> Option<&AcceptedTrade> {
        self.queues.get(item).and_then(BinaryHeap::peek)
    }

    pub fn len(&self, item: &Item) -> usize {
        self.queues.get(item).map(BinaryHeap::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.queues.values().all(BinaryHeap::is_empty)
    }

    /// Act on every non-empty queue according to the configured action, then
    /// clear it. `available` is the wallet with units already promised to
    /// outstanding cash-ins taken out.
    pub fn on_digest(&mut self, available: &Wallet) -> DigestSettlement {
        let mut settlement = DigestSettlement::default();
        let mut items: Vec<_> = self.queues.keys().cloned().collect();
        items.sort();

        for item in items {
            let Some(queue) = self.queues.remove(&item) else {
                continue;
            };
            let Some(best) = queue.peek() else {
                continue;
            };
            match self.action {
                DigestAction::CashInBest => {
                    let held = available.count(&item);
                    if best.realized_value > 0.0 && held > 0 {
                        let count = best.units.min(held);
                        info!(item = %item, count, best = best.realized_value, "Cashing in after digest");
                        settlement.cash_ins.push(CashInOrder { item: item.clone(), count });
                    }
                }
                DigestAction::Diagnose => {
                    let summary = summarize(&item, &queue);
                    info!(
                        item = %item,
                        net_units = summary.net_units,
                        mean_price = format!("{:.2}", summary.mean_price),
                        best = summary.best_value,
                        "Round position"
                    );
                    settlement.positions.push(summary);
                }
                DigestAction::Hold => {
                    debug!(item = %item, trades = queue.len(), "Holding after digest");
                }
            }
        }
        settlement
    }

    /// One cash-in per held item for the full available count.
    pub fn close(&mut self, available: &Wallet) -> Vec<CashInOrder> {
        self.queues.clear();
        available
            .held()
            .into_iter()
            .map(|(item, count)| CashInOrder { item, count })
            .collect()
    }

    pub fn clear(&mut self) {
        self.queues.clear();
    }
}

fn summarize(item: &Item, queue: &BinaryHeap<AcceptedTrade>) -> PositionSummary {
    let net_units = queue.iter().map(|t| t.direction.sign() * t.units).sum();
    let total_units: i64 = queue.iter().map(|t| t.units).sum();
    let mean_price = if total_units > 0 {
        queue.iter().map(|t| t.trade_price * t.units as f64).sum::<Price>() / total_units as f64
    } else {
        0.0
    };
    PositionSummary {
        item: item.clone(),
        net_units,
        mean_price,
        best_value: queue.peek().map(|t| t.realized_value).unwrap_or(0.0),
    }
}
