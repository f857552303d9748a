//! Session engine: the per-session state, the settlement side, and the
//! controller that drives both from inbound events.

pub mod controller;
pub mod ledger;
pub mod liquidator;
pub mod pending;
pub mod session;
