//! Bidding session controller: binds wallet, estimator, strategy and ledger
//! to the inbound event stream.
//!
//! `Unregistered → Registering → Registered → Closed`. Events are handled one
//! at a time to completion by [`BiddingSessionController::handle`], which
//! returns the outbound messages to send. [`BiddingSessionController::run_session`]
//! is the async driver that pulls events from a channel and forwards the
//! results to an [`AuctionGateway`].

use anyhow::Result;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::{AppConfig, PolicyConfig};
use crate::engine::ledger::CashInOrder;
use crate::engine::liquidator::ExplorationLiquidator;
use crate::engine::pending::PendingRequest;
use crate::engine::session::{Phase, SessionState, SessionSummary};
use crate::gateway::AuctionGateway;
use crate::strategy::{Intent, PricingStrategy, StrategyContext};
use crate::types::{
    BidderError, CorrelationId, Digest, Inbound, Item, LookingFor, Outbound, Price, Transfer,
};
use crate::wallet::Wallet;

pub struct BiddingSessionController {
    strategy: PricingStrategy,
    liquidator: Option<ExplorationLiquidator>,
    state: SessionState,
    last_summary: Option<SessionSummary>,
}

impl BiddingSessionController {
    pub fn new(config: &AppConfig) -> Self {
        let liquidator = match &config.strategy.policy {
            PolicyConfig::ExplorationLiquidation {
                exploration_rate,
                seed,
                ..
            } => Some(ExplorationLiquidator::new(*exploration_rate, *seed)),
            _ => None,
        };
        Self {
            strategy: PricingStrategy::from_config(config),
            liquidator,
            state: SessionState::new(config),
            last_summary: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn strategy(&self) -> &PricingStrategy {
        &self.strategy
    }

    /// Summary of the most recently closed session, if not yet taken.
    pub fn take_summary(&mut self) -> Option<SessionSummary> {
        self.last_summary.take()
    }

    // -- event loop -------------------------------------------------------------

    /// Process inbound events until the session closes or the channel does.
    /// A failed event is logged and skipped; the loop keeps going.
    pub async fn run_session(
        &mut self,
        inbound: &mut mpsc::UnboundedReceiver<Inbound>,
        gateway: &dyn AuctionGateway,
    ) -> Result<Option<SessionSummary>> {
        while let Some(event) = inbound.recv().await {
            let kind = event.kind();
            match self.handle(event) {
                Ok(outbound) => {
                    for message in outbound {
                        if let Err(e) = gateway.dispatch(message).await {
                            error!(event = kind, error = %e, "Dispatch failed");
                        }
                    }
                }
                Err(e) => {
                    error!(event = kind, phase = %self.state.phase, error = %e, "Event failed, continuing");
                }
            }
            if let Some(summary) = self.take_summary() {
                return Ok(Some(summary));
            }
        }
        info!(phase = %self.state.phase, "Inbound channel closed");
        Ok(None)
    }

    /// Handle one inbound event to completion.
    pub fn handle(&mut self, event: Inbound) -> Result<Vec<Outbound>, BidderError> {
        debug!(event = event.kind(), phase = %self.state.phase, "Handling event");
        match event {
            Inbound::SessionStart => self.on_session_start(),
            Inbound::RegisterAck {
                correlation_id,
                accepted,
            } => self.on_register_ack(correlation_id, accepted),
            Inbound::Registered {
                items,
                credits,
                secret,
            } => self.on_registered(items, credits, secret),
            Inbound::LookingFor(looking_for) => self.on_looking_for(looking_for),
            Inbound::OfferAck {
                correlation_id,
                accepted,
            } => self.on_offer_ack(correlation_id, accepted),
            Inbound::OfferResult {
                item,
                price,
                transfer,
            } => self.on_offer_result(item, price, transfer),
            Inbound::Digest(digest) => self.on_digest(digest),
            Inbound::CashInResult {
                correlation_id,
                credits,
            } => self.on_cash_in_result(correlation_id, credits),
            Inbound::SessionResult => self.on_session_result(),
        }
    }

    // -- handlers ---------------------------------------------------------------

    fn on_session_start(&mut self) -> Result<Vec<Outbound>, BidderError> {
        match self.state.phase {
            Phase::Unregistered | Phase::Closed => {
                let correlation_id = self.state.pending.issue(PendingRequest::Register);
                self.state.phase = Phase::Registering(correlation_id);
                info!(agent_id = %self.state.agent_id, "Session started, registering");
                Ok(vec![Outbound::Register {
                    correlation_id,
                    agent_id: self.state.agent_id.clone(),
                }])
            }
            phase => {
                warn!(phase = %phase, "Session start ignored, already in a session");
                Ok(Vec::new())
            }
        }
    }

    fn on_register_ack(&mut self, id: CorrelationId, accepted: bool) -> Result<Vec<Outbound>, BidderError> {
        match self.state.pending.resolve(&id) {
            Some((PendingRequest::Register, waited)) => {
                info!(accepted, waited_ms = waited.num_milliseconds(), "Registration acknowledged");
                match (self.state.phase, accepted) {
                    (Phase::Registering(expected), true) if expected == id => {
                        self.state.phase = Phase::Registered;
                    }
                    (Phase::Registering(expected), false) if expected == id => {
                        warn!("Registration rejected");
                        self.state.phase = Phase::Unregistered;
                    }
                    (phase, _) => {
                        debug!(phase = %phase, "Acknowledgement after registration completed");
                    }
                }
            }
            Some((other, _)) => warn!(request = ?other, "Register ack for a different request"),
            None => warn!(correlation_id = %id, "Register ack for unknown request"),
        }
        Ok(Vec::new())
    }

    fn on_registered(
        &mut self,
        items: HashMap<Item, i64>,
        credits: Price,
        secret: i64,
    ) -> Result<Vec<Outbound>, BidderError> {
        match self.state.phase {
            Phase::Registering(_) => {}
            Phase::Registered if !self.state.is_active() => {}
            phase => {
                return Err(BidderError::InvalidState(format!(
                    "Registered received while {phase}"
                )))
            }
        }
        let wallet = Wallet::new(self.state.agent_id.clone(), items, credits);
        info!(wallet = %wallet, "Initialized wallet");
        self.state.activate(wallet, secret);

        let wallet = self.state.wallet()?;
        let mut intents = Vec::new();
        for item in wallet.item_names() {
            intents.extend(self.strategy.on_registered(wallet, &item)?);
        }
        self.emit(intents)
    }

    fn on_looking_for(&mut self, looking_for: LookingFor) -> Result<Vec<Outbound>, BidderError> {
        self.state.wallet()?;
        if looking_for.from.as_deref() == Some(self.state.agent_id.as_str()) {
            return Ok(Vec::new());
        }
        let LookingFor { item, price, .. } = looking_for;
        self.state.estimator.observe_rival_bid(&item, price);

        let ctx = StrategyContext {
            wallet: self.state.wallet()?,
            estimator: &self.state.estimator,
            private_values: &self.state.private_values,
        };
        let intents = self.strategy.on_looking_for(&ctx, &item, price)?;
        self.emit(intents)
    }

    fn on_offer_ack(&mut self, id: CorrelationId, accepted: bool) -> Result<Vec<Outbound>, BidderError> {
        match self.state.pending.resolve(&id) {
            Some((PendingRequest::Offer { item, price }, _)) if accepted => {
                debug!(item = %item, price, "Offer accepted");
            }
            Some((PendingRequest::Offer { item, price }, _)) => {
                info!(item = %item, price, "Offer not accepted");
            }
            Some((other, _)) => warn!(request = ?other, "Offer ack for a different request"),
            None => warn!(correlation_id = %id, "Offer ack for unknown request"),
        }
        Ok(Vec::new())
    }

    fn on_offer_result(&mut self, item: Item, price: Price, transfer: Transfer) -> Result<Vec<Outbound>, BidderError> {
        let wallet = self.state.wallet()?.copy();
        if transfer == Transfer::Rejected {
            info!(item = %item, price, "Offer rejected");
            return Ok(Vec::new());
        }
        if !wallet.tracks(&item) {
            warn!(item = %item, price, transfer = %transfer, "Result for untracked item, skipping");
            return Ok(Vec::new());
        }

        let direction = transfer.direction();
        let realized = self
            .state
            .ledger
            .record_fill(self.strategy.valuation(), &wallet, &item, direction, price);
        self.state.stats.trades += 1;
        let wallet = self.state.wallet_mut()?;
        wallet.update(&item, direction.sign(), -direction.signum() * price);
        info!(
            item = %item,
            transfer = %transfer,
            price,
            realized = format!("{realized:.4}"),
            credits = format!("{:.2}", wallet.credits()),
            "Trade settled"
        );

        let Some(liquidator) = self.liquidator.as_mut() else {
            return Ok(Vec::new());
        };
        let estimator = &self.state.estimator;
        let model = self.strategy.valuation().model();
        let unit_value = |item: &Item| estimator.last_median(item).unwrap_or_else(|| model.unit_value(item));
        let available = self.state.available_wallet(unit_value)?;
        if available.credits() >= 0.0 {
            return Ok(Vec::new());
        }
        warn!(credits = format!("{:.2}", available.credits()), "Credits negative, liquidating");
        let orders = liquidator.plan(&available, unit_value);
        self.cash_in(orders)
    }

    fn on_digest(&mut self, digest: Digest) -> Result<Vec<Outbound>, BidderError> {
        self.state.wallet()?;
        let result = self.digest_decisions(&digest);
        // Exactly once per digest, after every consumer has read the round.
        self.state.estimator.clear_round();
        result
    }

    fn digest_decisions(&mut self, digest: &Digest) -> Result<Vec<Outbound>, BidderError> {
        info!(items = digest.item_stats.len(), "Digest received");
        for (item, stats) in &digest.item_stats {
            debug!(
                item = %item,
                median = stats.median,
                min = ?stats.min,
                max = ?stats.max,
                trades = ?stats.count,
                "Item statistics"
            );
        }

        let trust = self.state.estimator.absorb_digest(digest);
        let private_values = self.strategy.private_values(self.state.wallet()?, digest);
        self.state.private_values = private_values;

        // Decide every item before the ledger is drained, so a rejected price
        // leaves the queued trades for the next digest.
        let wallet = self.state.wallet()?;
        let ctx = StrategyContext {
            wallet,
            estimator: &self.state.estimator,
            private_values: &self.state.private_values,
        };
        let mut intents = Vec::new();
        for item in wallet.item_names() {
            match trust.get(&item) {
                Some(estimate) => intents.extend(self.strategy.on_digest(&ctx, &item, estimate)?),
                None => debug!(item = %item, "Item missing from digest, abstaining"),
            }
        }

        let estimator = &self.state.estimator;
        let model = self.strategy.valuation().model();
        let available = self
            .state
            .available_wallet(|item| {
                digest
                    .median(item)
                    .or_else(|| estimator.last_median(item))
                    .unwrap_or_else(|| model.unit_value(item))
            })?;
        let settlement = self.state.ledger.on_digest(&available);

        let mut outbound = self.cash_in(settlement.cash_ins)?;
        outbound.extend(self.emit(intents)?);
        Ok(outbound)
    }

    fn on_cash_in_result(&mut self, id: CorrelationId, credits: Price) -> Result<Vec<Outbound>, BidderError> {
        self.state.wallet()?;
        match self.state.pending.resolve(&id) {
            Some((PendingRequest::CashIn { item, count }, _)) => {
                let wallet = self.state.wallet_mut()?;
                wallet.update(&item, -count, credits);
                info!(item = %item, count, credits, balance = format!("{:.2}", wallet.credits()), "Cash-in settled");
            }
            Some((other, _)) => warn!(request = ?other, "Cash-in result for a different request"),
            None => warn!(correlation_id = %id, "Cash-in result for unknown request"),
        }
        Ok(Vec::new())
    }

    fn on_session_result(&mut self) -> Result<Vec<Outbound>, BidderError> {
        if !self.state.is_active() {
            warn!(phase = %self.state.phase, "Auction closed before registration completed");
            self.state.teardown();
            return Ok(Vec::new());
        }
        let estimator = &self.state.estimator;
        let model = self.strategy.valuation().model();
        let available = self
            .state
            .available_wallet(|item| estimator.last_median(item).unwrap_or_else(|| model.unit_value(item)))?;
        let orders = self.state.ledger.close(&available);
        let outbound = self.cash_in(orders)?;

        let summary = self.state.summary(self.strategy.valuation())?;
        info!(summary = %summary, "Auction closed");
        self.state.teardown();
        self.last_summary = Some(summary);
        Ok(outbound)
    }

    // -- outbound ---------------------------------------------------------------

    fn emit(&mut self, intents: Vec<Intent>) -> Result<Vec<Outbound>, BidderError> {
        let mut outbound = Vec::with_capacity(intents.len());
        for intent in intents {
            match intent {
                Intent::Publish { item, price } => {
                    info!(item = %item, price = format!("{price:.4}"), "Publishing interest");
                    self.state.stats.publications += 1;
                    outbound.push(Outbound::LookingFor(LookingFor {
                        item,
                        price,
                        from: Some(self.state.agent_id.clone()),
                    }));
                }
                Intent::Offer { item, price } => {
                    let secret = self.state.secret()?;
                    let correlation_id = self.state.pending.issue(PendingRequest::Offer {
                        item: item.clone(),
                        price,
                    });
                    info!(item = %item, price = format!("{price:.4}"), "Sending offer");
                    self.state.stats.offers += 1;
                    outbound.push(Outbound::Offer {
                        correlation_id,
                        agent_id: self.state.agent_id.clone(),
                        secret,
                        item,
                        price,
                    });
                }
            }
        }
        Ok(outbound)
    }

    fn cash_in(&mut self, orders: Vec<CashInOrder>) -> Result<Vec<Outbound>, BidderError> {
        let mut outbound = Vec::with_capacity(orders.len());
        for CashInOrder { item, count } in orders {
            let secret = self.state.secret()?;
            let correlation_id = self.state.pending.issue(PendingRequest::CashIn {
                item: item.clone(),
                count,
            });
            info!(item = %item, count, "Requesting cash-in");
            self.state.stats.cash_ins += 1;
            outbound.push(Outbound::CashIn {
                correlation_id,
                agent_id: self.state.agent_id.clone(),
                secret,
                item,
                count,
            });
        }
        Ok(outbound)
    }
}
