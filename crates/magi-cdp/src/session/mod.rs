//! Typed session identifiers.
//!
//! A session id carries the page id it belongs to: the wire form is
//! `<pageId>-session-<seq>`. Routing a flattened command whose session is
//! not yet in any lookup table only needs the id itself.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ProtocolError;

const SEPARATOR: &str = "-session-";

/// A session identifier: one logical client channel on one page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId {
    page_id: String,
    seq: u64,
}

impl SessionId {
    /// Build a session id from a page id and a monotonic sequence number.
    #[must_use]
    pub fn new(page_id: impl Into<String>, seq: u64) -> Self {
        Self {
            page_id: page_id.into(),
            seq,
        }
    }

    /// The page this session is bound to.
    pub fn page_id(&self) -> &str {
        &self.page_id
    }

    /// The monotonic sequence number that distinguishes sessions on a page.
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}{}", self.page_id, self.seq)
    }
}

impl FromStr for SessionId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // The page id may itself contain '-', so split on the last marker.
        let idx = s
            .rfind(SEPARATOR)
            .ok_or_else(|| ProtocolError::InvalidSessionId(s.to_string()))?;
        let (page_id, rest) = s.split_at(idx);
        let seq = rest[SEPARATOR.len()..]
            .parse::<u64>()
            .map_err(|_| ProtocolError::InvalidSessionId(s.to_string()))?;
        if page_id.is_empty() {
            return Err(ProtocolError::InvalidSessionId(s.to_string()));
        }
        Ok(Self {
            page_id: page_id.to_string(),
            seq,
        })
    }
}

impl Serialize for SessionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests;
