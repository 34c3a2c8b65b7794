//! Yes/no pricing derived from cumulative volume.
//!
//! A market's `yes_percentage` is the share of all credits wagered on the
//! yes side. The implied probability of a side is its percentage, and the
//! decimal odd paid on that side is `1 / probability`.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

pub const OPENING_PERCENTAGE: Decimal = dec!(50);

const HUNDRED: Decimal = dec!(100);

pub fn yes_percentage(yes_volume: Decimal, total_volume: Decimal) -> Decimal {
    if total_volume <= Decimal::ZERO {
        return OPENING_PERCENTAGE;
    }
    round2(yes_volume / total_volume * HUNDRED)
}

pub fn side_probability(prediction: bool, yes_percentage: Decimal) -> Decimal {
    if prediction {
        yes_percentage / HUNDRED
    } else {
        (HUNDRED - yes_percentage) / HUNDRED
    }
}

/// `None` when the side has no implied probability (nobody could win it).
pub fn decimal_odd(prediction: bool, yes_percentage: Decimal) -> Option<Decimal> {
    let probability = side_probability(prediction, yes_percentage);
    if probability <= Decimal::ZERO {
        return None;
    }
    Some(round2(Decimal::ONE / probability))
}

pub fn potential_return(amount: Decimal, prediction: bool, yes_percentage: Decimal) -> Option<Decimal> {
    let probability = side_probability(prediction, yes_percentage);
    if probability <= Decimal::ZERO {
        return None;
    }
    Some(round2(amount / probability))
}

fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
