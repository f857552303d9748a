//! Last check on any price before it leaves the agent.

use tracing::{debug, error};

use crate::config::NonPositivePrice;
use crate::types::{BidderError, Item, Price};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceGuard {
    mode: NonPositivePrice,
}

impl PriceGuard {
    pub fn new(mode: NonPositivePrice) -> Self {
        Self { mode }
    }

    /// Pass a strictly positive, finite price through. Otherwise abstain
    /// (`Ok(None)`) or fail, depending on the configured mode.
    pub fn check(&self, item: &Item, price: Price) -> Result<Option<Price>, BidderError> {
        if price.is_finite() && price > 0.0 {
            return Ok(Some(price));
        }
        match self.mode {
            NonPositivePrice::Abstain => {
                debug!(item = %item, price, "Non-positive price, abstaining");
                Ok(None)
            }
            NonPositivePrice::Fatal => {
                error!(item = %item, price, "Non-positive price computed");
                Err(BidderError::NonPositivePrice {
                    item: item.clone(),
                    price,
                })
            }
        }
    }
}
