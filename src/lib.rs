//! BIDDER: autonomous bidder for repeated multi-item double auctions
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod wallet;
pub mod valuation;
pub mod strategy;
pub mod engine;
pub mod gateway;
