//! Newtype IDs for type-safe entity references.
//!
//! Use the `define_id!` macro to create type-safe ID wrappers that prevent
//! accidentally mixing IDs from different entity types. All MintVault
//! entities are keyed by UUIDs issued by the hosted backend.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around [`Uuid`] with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `as_uuid()`
/// - `From<Uuid>` and `Into<Uuid>` implementations
/// - `FromStr` parsing of the canonical hyphenated form
///
/// # Example
///
/// ```rust
/// # use mintvault_core::define_id;
/// # use uuid::Uuid;
/// define_id!(UserId);
/// define_id!(AuctionId);
///
/// let user_id = UserId::new(Uuid::nil());
/// let auction_id = AuctionId::new(Uuid::nil());
///
/// // These are different types, so this won't compile:
/// // let _: UserId = auction_id;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(::uuid::Uuid);

        impl $name {
            /// Create a new ID from a UUID value.
            #[must_use]
            pub const fn new(id: ::uuid::Uuid) -> Self {
                Self(id)
            }

            /// Get the underlying UUID value.
            #[must_use]
            pub const fn as_uuid(&self) -> ::uuid::Uuid {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = ::uuid::Error;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                Ok(Self(s.parse::<::uuid::Uuid>()?))
            }
        }

        impl From<::uuid::Uuid> for $name {
            fn from(id: ::uuid::Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for ::uuid::Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

// Define standard entity IDs
define_id!(UserId);
define_id!(ListingId);
define_id!(AuctionId);
define_id!(BidId);
define_id!(OrderId);

/// A generic placeholder ID for rows whose entity type is not yet modeled.
///
/// Prefer using specific ID types like `UserId`, `AuctionId`, etc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Create a new entity ID.
    #[must_use]
    pub const fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Get the underlying UUID value.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for EntityId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl From<EntityId> for Uuid {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_distinct_types() {
        let id = Uuid::new_v4();
        let user_id = UserId::new(id);
        let bid_id = BidId::new(id);
        assert_eq!(user_id.as_uuid(), bid_id.as_uuid());
    }

    #[test]
    fn test_display_is_hyphenated() {
        let id = Uuid::new_v4();
        assert_eq!(UserId::new(id).to_string(), id.to_string());
    }

    #[test]
    fn test_from_str_round_trip() {
        let id = Uuid::new_v4();
        let parsed: AuctionId = id.to_string().parse().unwrap();
        assert_eq!(parsed.as_uuid(), id);
    }

    #[test]
    fn test_serde_transparent() {
        let id = Uuid::new_v4();
        let json = serde_json::to_string(&UserId::new(id)).unwrap();
        assert_eq!(json, format!("\"{id}\""));
    }
}
