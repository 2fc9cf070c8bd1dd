//! MintVault Core - Shared types library.
//!
//! This crate provides common types used across all MintVault components:
//! - `client` - The marketplace client SDK (sessions, auth state, bidding)
//! - `cli` - Command-line tools for account and bidding workflows
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no timers. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, emails, plus
//!   session and profile records
//! - [`pricing`] - The bid-increment ladder and suggested-bid generation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod pricing;
pub mod types;

pub use types::*;
