//! Mock auctioneer for integration testing.
//!
//! Implements `AuctionGateway` and answers every outbound message the way a
//! small, deterministic auctioneer would, by pushing inbound events back
//! onto the agent's channel. All state is in-memory.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;

use bidder::gateway::AuctionGateway;
use bidder::types::*;

pub struct MockAuctioneer {
    inbound: UnboundedSender<Inbound>,
    items: HashMap<Item, i64>,
    credits: Price,
    secret: i64,
    /// Rival interest announced right after registration, per item.
    rival_price: Price,
    sent: Mutex<Vec<Outbound>>,
    bad_secrets: Mutex<u32>,
}

impl MockAuctioneer {
    pub fn new(inbound: UnboundedSender<Inbound>, items: &[(&str, i64)], credits: Price, secret: i64) -> Self {
        Self {
            inbound,
            items: items.iter().map(|(name, count)| (Item::from(*name), *count)).collect(),
            credits,
            secret,
            rival_price: 8.0,
            sent: Mutex::new(Vec::new()),
            bad_secrets: Mutex::new(0),
        }
    }

    /// Everything the agent has dispatched so far.
    pub fn sent(&self) -> Vec<Outbound> {
        self.sent.lock().unwrap().clone()
    }

    pub fn bad_secrets(&self) -> u32 {
        *self.bad_secrets.lock().unwrap()
    }

    fn push(&self, event: Inbound) -> Result<()> {
        self.inbound.send(event).map_err(|_| anyhow!("agent channel closed"))
    }

    fn check_secret(&self, secret: i64) -> bool {
        if secret != self.secret {
            *self.bad_secrets.lock().unwrap() += 1;
            return false;
        }
        true
    }
}

#[async_trait]
impl AuctionGateway for MockAuctioneer {
    async fn dispatch(&self, message: Outbound) -> Result<()> {
        self.sent.lock().unwrap().push(message.clone());
        match message {
            Outbound::Register { correlation_id, .. } => {
                self.push(Inbound::RegisterAck { correlation_id, accepted: true })?;
                self.push(Inbound::Registered {
                    items: self.items.clone(),
                    credits: self.credits,
                    secret: self.secret,
                })?;
                let mut names: Vec<_> = self.items.keys().cloned().collect();
                names.sort();
                for item in names {
                    self.push(Inbound::LookingFor(LookingFor {
                        item,
                        price: self.rival_price,
                        from: Some("rival-1".into()),
                    }))?;
                }
            }
            Outbound::Offer { correlation_id, secret, item, price, .. } => {
                let accepted = self.check_secret(secret);
                self.push(Inbound::OfferAck { correlation_id, accepted })?;
                if accepted {
                    // Every accepted offer sells one unit at the asking price,
                    // then the round closes and the auction ends.
                    self.push(Inbound::OfferResult {
                        item: item.clone(),
                        price,
                        transfer: Transfer::Sold,
                    })?;
                    self.push(Inbound::Digest([(item, price)].into_iter().collect()))?;
                    self.push(Inbound::SessionResult)?;
                }
            }
            Outbound::CashIn { correlation_id, secret, count, .. } => {
                if self.check_secret(secret) {
                    self.push(Inbound::CashInResult {
                        correlation_id,
                        credits: count as Price * 5.0,
                    })?;
                }
            }
            Outbound::LookingFor(_) => {}
        }
        Ok(())
    }
}
