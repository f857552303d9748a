//! Outstanding requests awaiting confirmation.
//!
//! Every Register/Offer/CashIn goes out with a fresh correlation id; the
//! confirmation handler looks the request up here. A confirmation that never
//! arrives simply leaves its entry behind until session teardown.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::types::{CorrelationId, Item, Price};

#[derive(Debug, Clone, PartialEq)]
pub enum PendingRequest {
    Register,
    Offer { item: Item, price: Price },
    CashIn { item: Item, count: i64 },
}

#[derive(Debug, Clone)]
struct Entry {
    request: PendingRequest,
    issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct PendingRequests {
    entries: HashMap<CorrelationId, Entry>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request and return its correlation id.
    pub fn issue(&mut self, request: PendingRequest) -> CorrelationId {
        let id = Uuid::new_v4();
        self.entries.insert(
            id,
            Entry {
                request,
                issued_at: Utc::now(),
            },
        );
        id
    }

    /// Remove and return the request for `id`, with how long it was pending.
    pub fn resolve(&mut self, id: &CorrelationId) -> Option<(PendingRequest, chrono::Duration)> {
        self.entries
            .remove(id)
            .map(|entry| (entry.request, Utc::now() - entry.issued_at))
    }

    /// Units of `item` already promised to outstanding cash-ins.
    pub fn reserved_units(&self, item: &Item) -> i64 {
        self.entries
            .values()
            .filter_map(|entry| match &entry.request {
                PendingRequest::CashIn { item: i, count } if i == item => Some(*count),
                _ => None,
            })
            .sum()
    }

    /// Every outstanding cash-in as `(item, count)`.
    pub fn cash_ins(&self) -> Vec<(Item, i64)> {
        self.entries
            .values()
            .filter_map(|entry| match &entry.request {
                PendingRequest::CashIn { item, count } => Some((item.clone(), *count)),
                _ => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
