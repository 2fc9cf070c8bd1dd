//! Bidding flow integration tests: the pricing ladder feeding the
//! `place_bid` procedure pass-through.

#![allow(clippy::unwrap_used)]

use std::str::FromStr;

use rust_decimal::Decimal;
use uuid::Uuid;

use mintvault_client::bidding;
use mintvault_core::pricing::{bid_increment, suggested_bids};
use mintvault_core::{AuctionId, BidId};
use mintvault_integration_tests::{ManualClock, MockBackend, test_identity};

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

#[test]
fn increments_cover_the_full_ladder() {
    // Bottom band is flat across [0, 1).
    assert_eq!(bid_increment(dec("0")), dec("0.05"));
    assert_eq!(bid_increment(dec("0.99")), dec("0.05"));
    // Boundary prices belong to the next band up.
    assert_eq!(bid_increment(dec("1")), dec("0.25"));
    // Top band is unbounded.
    assert_eq!(bid_increment(dec("3000")), dec("100"));
    assert_eq!(bid_increment(dec("1000000")), dec("100"));
}

#[test]
fn ladder_suggestions_step_one_two_three_five() {
    let ladder = bidding::ladder(dec("45"));
    assert_eq!(ladder.increment, dec("1"));
    assert_eq!(
        ladder.suggestions,
        [dec("46.00"), dec("47.00"), dec("48.00"), dec("50.00")]
    );
    assert_eq!(ladder.suggestions, suggested_bids(dec("45")));
}

#[tokio::test]
async fn place_bid_invokes_the_settlement_procedure() {
    let backend = MockBackend::new(ManualClock::new(0));
    let bid_id = Uuid::new_v4();
    backend.set_procedure_result(serde_json::json!({
        "accepted": true,
        "bid_id": bid_id.to_string(),
        "amount": "46.00",
    }));

    let auction_id = AuctionId::new(Uuid::new_v4());
    let user_id = test_identity().id;
    let outcome = bidding::place_bid(backend.as_ref(), auction_id, user_id, dec("46.00"))
        .await
        .unwrap();

    assert!(outcome.accepted);
    assert_eq!(outcome.bid_id, Some(BidId::new(bid_id)));
    assert_eq!(outcome.amount, Some(dec("46.00")));

    let calls = backend.procedure_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "place_bid");
    assert_eq!(calls[0].1["auction_id"], auction_id.to_string().as_str());
    assert_eq!(calls[0].1["user_id"], user_id.to_string().as_str());
    assert_eq!(calls[0].1["amount"], "46.00");
}

#[tokio::test]
async fn place_bid_surfaces_rejections_as_outcomes() {
    let backend = MockBackend::new(ManualClock::new(0));
    backend.set_procedure_result(serde_json::json!({
        "accepted": false,
        "message": "outbid: current price moved to 48.00",
    }));

    let outcome = bidding::place_bid(
        backend.as_ref(),
        AuctionId::new(Uuid::new_v4()),
        test_identity().id,
        dec("46.00"),
    )
    .await
    .unwrap();

    assert!(!outcome.accepted);
    assert!(outcome.bid_id.is_none());
    assert_eq!(
        outcome.message.as_deref(),
        Some("outbid: current price moved to 48.00")
    );
}
