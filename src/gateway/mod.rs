//! Outbound side of the agent.
//!
//! Defines the `AuctionGateway` trait: the single seam between the decision
//! core and whatever actually carries messages to the auctioneer and the
//! bidders topic. Confirmations come back as inbound events, never as return
//! values, so dispatch is fire-and-forget.

pub mod journal;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::Outbound;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuctionGateway: Send + Sync {
    /// Hand one message to the transport. Must not wait for a reply.
    async fn dispatch(&self, message: Outbound) -> Result<()>;
}
