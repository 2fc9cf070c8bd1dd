//! Core types for MintVault.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod price;
pub mod profile;
pub mod session;

pub use email::{Email, EmailError};
pub use id::*;
pub use price::{CurrencyCode, Price};
pub use profile::{ProfilePreferences, ProfileSource, UserProfile};
pub use session::{IdentityMetadata, Session, UserIdentity};
