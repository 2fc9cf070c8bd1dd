//! Bidding commands: the pricing ladder and bid placement.
//!
//! # Usage
//!
//! ```bash
//! mintvault ladder 42.50
//! mintvault bid 7d1f0b2a-... --amount 46.00
//! ```

use rust_decimal::Decimal;

use mintvault_client::bidding;
use mintvault_core::AuctionId;

use super::{CliContext, CliError};

/// Print the bid increment and suggested bids for `price`.
#[allow(clippy::print_stdout)]
pub fn ladder(price: Decimal) {
    let ladder = bidding::ladder(price);
    println!("current price: {price}");
    println!("increment:     {}", ladder.increment);
    for (k, suggestion) in [1, 2, 3, 5].iter().zip(ladder.suggestions) {
        println!("  +{k} step{}:  {suggestion}", if *k == 1 { " " } else { "s" });
    }
}

/// Place a bid on `auction_id` as the signed-in user.
///
/// # Errors
///
/// Returns [`CliError::NotSignedIn`] when no persisted session exists,
/// or the backend's error when the procedure cannot be invoked.
#[allow(clippy::print_stdout)]
pub async fn place(auction_id: AuctionId, amount: Decimal) -> Result<(), CliError> {
    let ctx = CliContext::from_env()?;
    let session = ctx.restore_session().await?;

    tracing::info!(%auction_id, %amount, "placing bid");
    let outcome =
        bidding::place_bid(ctx.backend.as_ref(), auction_id, session.user.id, amount).await?;

    if outcome.accepted {
        println!(
            "bid accepted: {} (bid {})",
            outcome
                .amount
                .map_or_else(|| amount.to_string(), |a| a.to_string()),
            outcome
                .bid_id
                .map_or_else(|| "-".to_string(), |id| id.to_string()),
        );
    } else {
        println!(
            "bid rejected: {}",
            outcome.message.as_deref().unwrap_or("no reason given")
        );
    }
    Ok(())
}
