//! MintVault CLI - account, session, and bidding workflows.
//!
//! # Usage
//!
//! ```bash
//! # Sign in (password read from MINTVAULT_PASSWORD or prompted)
//! mintvault login -e collector@example.com
//!
//! # Show the signed-in profile
//! mintvault whoami
//!
//! # Keep the session alive and report lifecycle events
//! mintvault watch
//!
//! # Show the bid ladder for a current price
//! mintvault ladder 42.50
//!
//! # Place a bid
//! mintvault bid 7d1f... --amount 46.00
//!
//! # Sign out and clear the persisted session
//! mintvault logout
//! ```
//!
//! # Environment Variables
//!
//! - `MINTVAULT_BACKEND_URL` - Base URL of the hosted backend
//! - `MINTVAULT_API_KEY` - Public API key
//! - `MINTVAULT_PASSWORD` - Password for `login` (prompted when unset)

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use mintvault_core::AuctionId;
use rust_decimal::Decimal;

mod commands;

#[derive(Parser)]
#[command(name = "mintvault")]
#[command(author, version, about = "MintVault marketplace CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and persist the session locally
    Login {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
    /// Sign out remotely and clear the persisted session
    Logout,
    /// Show the signed-in user's profile
    Whoami,
    /// Hold the session open, refreshing it and reporting lifecycle
    /// events until it expires or ctrl-c
    Watch {
        /// Seconds between status lines
        #[arg(long, default_value_t = 30)]
        interval: u64,
    },
    /// Show the bid increment and suggested bids for a current price
    Ladder {
        /// Current auction price
        price: Decimal,
    },
    /// Place a bid on an auction
    Bid {
        /// Auction ID
        auction_id: AuctionId,
        /// Bid amount (see `ladder` for suggestions)
        #[arg(short, long)]
        amount: Decimal,
    },
}

#[tokio::main]
async fn main() {
    // Default to info-level logs for our crates; RUST_LOG overrides.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mintvault=info,mintvault_client=info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    let result = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    match cli.command {
        Commands::Login { email } => commands::account::login(&email).await?,
        Commands::Logout => commands::account::logout().await?,
        Commands::Whoami => commands::account::whoami().await?,
        Commands::Watch { interval } => commands::watch::watch(interval).await?,
        Commands::Ladder { price } => commands::bid::ladder(price),
        Commands::Bid { auction_id, amount } => commands::bid::place(auction_id, amount).await?,
    }
    Ok(())
}
