//! Bid placement.
//!
//! Bid validation and auction settlement are entirely server-side; the
//! client pre-computes suggested amounts from the pricing ladder and
//! passes the chosen amount through to the `place_bid` procedure.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use mintvault_core::pricing;
use mintvault_core::{AuctionId, BidId, UserId};

use crate::backend::{Backend, BackendError};
use crate::error::ClientError;

/// The increment and suggested amounts above a current price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidLadder {
    /// Minimum increment at this price.
    pub increment: Decimal,
    /// Suggested amounts (`price + increment * {1, 2, 3, 5}`).
    pub suggestions: [Decimal; 4],
}

/// Pre-compute the bid ladder for an auction's current price.
#[must_use]
pub fn ladder(current_price: Decimal) -> BidLadder {
    BidLadder {
        increment: pricing::bid_increment(current_price),
        suggestions: pricing::suggested_bids(current_price),
    }
}

/// Result of a bid placement, as reported by the settlement procedure.
#[derive(Debug, Clone, Deserialize)]
pub struct BidOutcome {
    /// Whether the bid was accepted.
    #[serde(default)]
    pub accepted: bool,
    /// ID of the recorded bid, when accepted.
    #[serde(default)]
    pub bid_id: Option<BidId>,
    /// The amount the backend recorded, when accepted.
    #[serde(default)]
    pub amount: Option<Decimal>,
    /// Rejection reason, when not accepted (e.g., outbid in flight,
    /// auction closed).
    #[serde(default)]
    pub message: Option<String>,
}

/// Place a bid through the backend's settlement procedure.
///
/// A rejected bid is not an error: the outcome carries `accepted = false`
/// and the rejection reason. Errors mean the procedure itself could not
/// be invoked.
///
/// # Errors
///
/// Returns [`ClientError::Backend`] on transport failure or if the
/// procedure's response cannot be decoded.
pub async fn place_bid(
    backend: &dyn Backend,
    auction_id: AuctionId,
    user_id: UserId,
    amount: Decimal,
) -> Result<BidOutcome, ClientError> {
    let result = backend
        .call_procedure(
            "place_bid",
            json!({
                "auction_id": auction_id,
                "user_id": user_id,
                "amount": amount,
            }),
        )
        .await?;
    let outcome: BidOutcome = serde_json::from_value(result).map_err(BackendError::from)?;
    Ok(outcome)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_ladder_combines_increment_and_suggestions() {
        let ladder = ladder(dec("100"));
        assert_eq!(ladder.increment, dec("2.50"));
        assert_eq!(
            ladder.suggestions,
            [dec("102.50"), dec("105.00"), dec("107.50"), dec("112.50")]
        );
    }

    #[test]
    fn test_outcome_decodes_rejection() {
        let outcome: BidOutcome = serde_json::from_value(serde_json::json!({
            "accepted": false,
            "message": "bid below minimum increment"
        }))
        .unwrap();
        assert!(!outcome.accepted);
        assert!(outcome.bid_id.is_none());
        assert_eq!(outcome.message.as_deref(), Some("bid below minimum increment"));
    }
}
