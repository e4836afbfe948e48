//! Type-safe identifiers.
//!
//! Users, polls, options and votes are keyed by positive integers assigned
//! by the store. Each kind gets its own newtype so a poll id can never be
//! passed where an option id is expected. Listeners are ephemeral and keyed
//! by a UUID v4 instead.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

macro_rules! integer_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw integer identifier.
            #[must_use]
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// Returns the raw integer value.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }

            /// Returns `true` if the identifier can refer to a stored record.
            #[must_use]
            pub const fn is_valid(self) -> bool {
                self.0 > 0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

integer_id!(
    /// Identifier of a voter. Users are owned outside this service.
    UserId
);

integer_id!(
    /// Identifier of a poll, also used as its broadcast topic.
    PollId
);

integer_id!(
    /// Identifier of a single poll option.
    OptionId
);

integer_id!(
    /// Identifier of a committed vote.
    VoteId
);

/// Identifier of a connected listener (one WebSocket connection).
///
/// Generated once when the listener registers with the
/// [`super::TopicHub`] and discarded on disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ListenerId(uuid::Uuid);

impl ListenerId {
    /// Creates a new random `ListenerId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
