//! Grid geometry: level prices, initial sides, funding requirements

use rust_decimal::{Decimal, RoundingStrategy};

use crate::common::errors::{ClientError, Result};
use crate::common::types::{GridLevel, Side};

/// Funds needed to place the whole ladder at once
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequiredBalance {
    /// Quote asset locked by bids
    pub quote: Decimal,
    /// Base asset locked by asks
    pub base: Decimal,
}

/// `count` evenly spaced levels starting at `lower`
///
/// `price(i) = lower + i * (upper - lower) / count`; `upper` itself is
/// never a level.
pub fn compute_levels(lower: Decimal, upper: Decimal, count: u32) -> Result<Vec<GridLevel>> {
    if count == 0 {
        return Err(ClientError::Configuration("grid needs at least one level".into()));
    }
    if lower >= upper {
        return Err(ClientError::Configuration(format!(
            "lower price {} must be below upper price {}",
            lower, upper
        )));
    }

    let step = (upper - lower) / Decimal::from(count);
    Ok((0..count)
        .map(|index| GridLevel {
            index,
            price: lower + step * Decimal::from(index),
        })
        .collect())
}

/// Side of a level's first order relative to the market price
pub fn initial_side(price: Decimal, reference: Decimal) -> Side {
    if price < reference {
        Side::Bid
    } else {
        Side::Ask
    }
}

/// Aggregate quote and base needed to seed every level
pub fn required_balance(levels: &[GridLevel], market_price: Decimal, quantity: Decimal) -> RequiredBalance {
    levels
        .iter()
        .fold(RequiredBalance::default(), |mut acc, level| {
            match initial_side(level.price, market_price) {
                Side::Bid => acc.quote += level.price * quantity,
                Side::Ask => acc.base += quantity,
            }
            acc
        })
}

/// Level that receives the opposite order after a fill
///
/// Fills outside `[0, count - 2]` are not mirrored, and neither are fills
/// whose neighbour falls off the grid.
pub fn mirror_index(client_id: i64, side: Side, count: u32) -> Option<u32> {
    let count = i64::from(count);
    if client_id < 0 || client_id >= count - 1 {
        return None;
    }
    let mirror = match side {
        Side::Bid => client_id + 1,
        Side::Ask => client_id - 1,
    };
    if (0..count).contains(&mirror) {
        u32::try_from(mirror).ok()
    } else {
        None
    }
}

/// Render a price with exactly `decimals` places
pub fn format_price(price: Decimal, decimals: u32) -> String {
    let mut rounded = price.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(decimals);
    rounded.to_string()
}
