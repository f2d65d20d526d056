//! Identifier types for renderpay.
//!
//! This module provides strongly-typed identifiers for accounts, jobs, and
//! ledger entries.
//!
//! Accounts use UUIDs (there is no useful ordering between accounts); jobs
//! and ledger entries use ULIDs so their ids sort chronologically, which the
//! store exploits for range scans over per-account history.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Macro to define a UUID-based identifier type with standard trait
/// implementations.
///
/// Generates a newtype wrapper around `uuid::Uuid` with implementations for:
/// - `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`
/// - `Serialize`, `Deserialize` (as string)
/// - `FromStr`, `Display`, `Debug`
/// - `TryFrom<String>`, `Into<String>`
/// - `AsRef<[u8]>`
macro_rules! uuid_id_type {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Create a new identifier from a UUID.
            #[must_use]
            pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Generate a new random identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Return the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }

            /// Return the bytes of the UUID (16 bytes).
            #[must_use]
            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = uuid::Uuid::parse_str(s).map_err(|_| IdError::InvalidUuid)?;
                Ok(Self(uuid))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0.to_string()
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                self.0.as_bytes()
            }
        }
    };
}

uuid_id_type!(
    AccountId,
    "An account identifier.\n\nOne account exists per external (messaging-platform) identity; the\nexternal id itself is stored on the `Account` record and indexed separately."
);

/// Macro to define a ULID-based identifier type.
///
/// ULID-based ids are time-ordered, so keys built from them sort
/// chronologically without a separate timestamp column.
macro_rules! ulid_id_type {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(Ulid);

        impl $name {
            /// Create a new identifier from a ULID.
            #[must_use]
            pub const fn from_ulid(ulid: Ulid) -> Self {
                Self(ulid)
            }

            /// Generate a new identifier with the current timestamp.
            #[must_use]
            pub fn generate() -> Self {
                Self(Ulid::new())
            }

            /// Return the underlying ULID.
            #[must_use]
            pub const fn as_ulid(&self) -> &Ulid {
                &self.0
            }

            /// Return the bytes of the ULID (16 bytes).
            #[must_use]
            pub fn to_bytes(&self) -> [u8; 16] {
                self.0.to_bytes()
            }

            /// Create an identifier from bytes.
            ///
            /// # Errors
            ///
            /// Returns an error if the bytes are invalid.
            pub fn from_bytes(bytes: [u8; 16]) -> Result<Self, IdError> {
                Ok(Self(Ulid::from_bytes(bytes)))
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let ulid = Ulid::from_string(s).map_err(|_| IdError::InvalidUlid)?;
                Ok(Self(ulid))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0.to_string()
            }
        }
    };
}

ulid_id_type!(
    JobId,
    "A job identifier (ULID for time-ordering).\n\nThe job id doubles as the refund idempotency key: at most one refund\nledger entry may ever exist for a given `JobId`."
);
ulid_id_type!(
    EntryId,
    "A ledger entry identifier (ULID for time-ordering)."
);

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input is not a valid UUID.
    #[error("invalid UUID format")]
    InvalidUuid,

    /// The input is not a valid ULID.
    #[error("invalid ULID format")]
    InvalidUlid,
}
