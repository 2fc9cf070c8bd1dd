//! Bid-increment pricing rules.
//!
//! Auctions accept bids on a tiered ladder: the higher the current price,
//! the larger the minimum increment. The ladder is a fixed table of
//! half-open price bands - a band's upper bound is exclusive, so a price
//! sitting exactly on a boundary uses the next band's increment.
//!
//! These functions are pure and synchronous; bidding UIs call them to
//! pre-compute suggested amounts before placing a bid through the backend.

use rust_decimal::{Decimal, RoundingStrategy};

/// Multipliers applied to the increment for the four suggested bids.
const SUGGESTION_STEPS: [i64; 4] = [1, 2, 3, 5];

/// Returns the bid increment for `current_price`.
///
/// Prices below one unit step in 5-cent increments; the ladder widens up
/// to a flat 100.00 above 3000. Negative prices are clamped to zero and
/// therefore resolve to the lowest band.
///
/// ```
/// use rust_decimal::Decimal;
/// use mintvault_core::pricing::bid_increment;
///
/// assert_eq!(bid_increment(Decimal::new(50, 2)), Decimal::new(5, 2)); // 0.50 -> 0.05
/// assert_eq!(bid_increment(Decimal::from(45)), Decimal::from(1));     // 45 -> 1.00
/// ```
#[must_use]
pub fn bid_increment(current_price: Decimal) -> Decimal {
    let price = current_price.max(Decimal::ZERO);

    // (exclusive upper bound, increment), ascending
    let bands = [
        (Decimal::from(1), Decimal::new(5, 2)),
        (Decimal::from(5), Decimal::new(25, 2)),
        (Decimal::from(15), Decimal::new(50, 2)),
        (Decimal::from(60), Decimal::from(1)),
        (Decimal::from(150), Decimal::new(250, 2)),
        (Decimal::from(300), Decimal::from(5)),
        (Decimal::from(600), Decimal::from(10)),
        (Decimal::from(1_500), Decimal::from(25)),
        (Decimal::from(3_000), Decimal::from(50)),
    ];

    for (upper, increment) in bands {
        if price < upper {
            return increment;
        }
    }
    Decimal::from(100)
}

/// Returns the four suggested bid amounts above `current_price`.
///
/// The suggestions are `current_price + increment * k` for
/// `k in {1, 2, 3, 5}`, each rounded to two decimal places with midpoints
/// rounded away from zero (cent-level display rounding).
///
/// ```
/// use rust_decimal::Decimal;
/// use mintvault_core::pricing::suggested_bids;
///
/// let bids = suggested_bids(Decimal::from(45));
/// assert_eq!(bids, [
///     Decimal::new(46_00, 2),
///     Decimal::new(47_00, 2),
///     Decimal::new(48_00, 2),
///     Decimal::new(50_00, 2),
/// ]);
/// ```
#[must_use]
pub fn suggested_bids(current_price: Decimal) -> [Decimal; 4] {
    let price = current_price.max(Decimal::ZERO);
    let increment = bid_increment(price);

    SUGGESTION_STEPS.map(|k| {
        (price + increment * Decimal::from(k))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    })
}
