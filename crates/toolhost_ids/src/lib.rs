//! UUID-backed newtype identifiers.
//!
//! Every id kind the server itself mints (the correlation id of a call
//! on the worker plane, a client session id, a script run id) shares the
//! same representation but must never be interchangeable at the type
//! level; swapping a `CallId` for a `RunId` by accident is a real class
//! of bug in a system this message-heavy. Ids chosen by the remote peer
//! (a client's request id, a worker's namespace name) stay plain strings,
//! since the server only ever echoes them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid id: {0}")]
pub struct IdParseError(String);

/// Defines a UUIDv4-backed newtype id with the standard set of
/// conversions (`new`, `parse`, `as_str`, `Display`, `FromStr`, `Default`).
macro_rules! define_uuid_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn parse(s: &str) -> Result<Self, IdParseError> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|e| IdParseError(format!("{s}: {e}")))
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0.to_string()
            }
        }
    };
}

define_uuid_id!(SessionId);
define_uuid_id!(RunId);
define_uuid_id!(CallId);
