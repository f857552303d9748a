//! Bluff arithmetic.
//!
//! These heuristics are one configurable policy among several: publish the
//! opposite extreme of the true intent, then blend that fake price with the
//! rival price recovered from the last digest.

use crate::types::{Direction, Price};

/// Price that signals the opposite of `intent`: low when we want to buy,
/// high when we want to sell.
pub fn fake_price(base: Price, intent: Direction, bluff_factor: f64) -> Price {
    match intent {
        Direction::Buy => base / bluff_factor,
        Direction::Sell => base * bluff_factor,
        Direction::Stay => base,
    }
}

/// Geometric mean of two prices. `None` unless both are strictly positive.
pub fn geometric_blend(a: Price, b: Price) -> Option<Price> {
    if a > 0.0 && b > 0.0 {
        Some((a * b).sqrt())
    } else {
        None
    }
}
