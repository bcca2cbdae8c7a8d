//! Integer identifiers
//!
//! Every identifier on the wire is a signed 32-bit integer. Client IDs and
//! chat-session IDs are drawn from shuffled pools; message IDs are
//! monotonic within a single chat session.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error when parsing an identifier from its string form
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum IdParseError {
    #[error("invalid identifier format")]
    InvalidFormat,
}

macro_rules! int_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            #[inline]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            #[inline]
            pub const fn into_inner(self) -> i32 {
                self.0
            }

            pub fn parse(s: &str) -> Result<Self, IdParseError> {
                s.trim()
                    .parse::<i32>()
                    .map(Self)
                    .map_err(|_| IdParseError::InvalidFormat)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

int_id!(
    /// Stable identity of a registered user, independent of any connection
    ClientId
);

int_id!(
    /// Globally unique chat-session identifier
    ChatSessionId
);

int_id!(
    /// Message identifier, unique within one chat session
    MessageId
);

impl MessageId {
    /// The identifier that follows this one
    #[inline]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}
