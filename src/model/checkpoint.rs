//! Checkpoint: the global replay cursor.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error parsing a checkpoint token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid checkpoint token: {0:?}")]
pub struct ParseCheckpointError(pub String);

/// Globally unique, monotonically assigned commit position.
///
/// Serializes to a plain decimal string so callers can persist it as an
/// opaque token and hand it back to resume iteration. Ordering of tokens
/// follows numeric ordering of the wrapped position.
///
/// `Checkpoint::ZERO` sorts before every issued checkpoint and is the cursor
/// for "from the beginning".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Checkpoint(i64);

impl Checkpoint {
    /// Cursor positioned before the first commit.
    pub const ZERO: Checkpoint = Checkpoint(0);

    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(self) -> i64 {
        self.0
    }

    /// The position immediately after this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl From<i64> for Checkpoint {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Checkpoint {
    type Err = ParseCheckpointError;

    /// An empty token is the zero cursor.
    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let token = token.trim();
        if token.is_empty() {
            return Ok(Self::ZERO);
        }
        match token.parse::<i64>() {
            Ok(value) if value >= 0 => Ok(Self(value)),
            _ => Err(ParseCheckpointError(token.to_string())),
        }
    }
}
