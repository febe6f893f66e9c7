//! Task identifiers
//!
//! IDs are opaque fixed-length strings (`7f2b4c1`) derived from the task name
//! and creation timestamp. The engine only ever compares them for equality and
//! uses them as the final tie-break when ordering tasks, so hand-written IDs
//! (e.g. imported data or tests) are accepted as long as they are well formed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length of generated IDs
pub const GENERATED_ID_LEN: usize = 7;

/// Maximum accepted ID length when parsing
const MAX_ID_LEN: usize = 64;

#[derive(Debug, Error, PartialEq)]
pub enum IdError {
    #[error("Task ID cannot be empty")]
    Empty,

    #[error("Invalid task ID '{0}': only lowercase letters, digits, '-' and '_' are allowed")]
    InvalidCharacters(String),

    #[error("Invalid task ID '{0}': longer than {MAX_ID_LEN} characters")]
    TooLong(String),
}

/// Generates a hash prefix from name, timestamp and a salt
fn generate_hash(name: &str, timestamp: DateTime<Utc>, salt: u32) -> String {
    let input = format!(
        "{}{}{}",
        name,
        timestamp.timestamp_nanos_opt().unwrap_or(0),
        salt
    );
    let hash = blake3::hash(input.as_bytes());
    hash.to_hex()[..GENERATED_ID_LEN].to_string()
}

/// Opaque task identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskId(String);

impl TaskId {
    /// Generates a new ID from a task name and creation timestamp
    pub fn generate(name: &str, timestamp: DateTime<Utc>) -> Self {
        Self(generate_hash(name, timestamp, 0))
    }

    /// Generates an ID that is not already taken according to `exists`
    ///
    /// Same name at the same instant hashes identically, so collisions are
    /// resolved by salting the input until a free ID comes up.
    pub fn generate_unique(
        name: &str,
        timestamp: DateTime<Utc>,
        exists: impl Fn(&TaskId) -> bool,
    ) -> Self {
        let mut salt = 0;
        loop {
            let id = Self(generate_hash(name, timestamp, salt));
            if !exists(&id) {
                return id;
            }
            salt += 1;
        }
    }

    /// Returns the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TaskId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();

        if s.is_empty() {
            return Err(IdError::Empty);
        }
        if s.len() > MAX_ID_LEN {
            return Err(IdError::TooLong(s));
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        {
            return Err(IdError::InvalidCharacters(s));
        }

        Ok(Self(s))
    }
}

impl TryFrom<String> for TaskId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TaskId> for String {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_is_unique_for_different_timestamps() {
        let ts1 = Utc::now();
        let ts2 = ts1 + chrono::Duration::nanoseconds(1);

        assert_ne!(TaskId::generate("Same", ts1), TaskId::generate("Same", ts2));
    }

    #[test]
    fn generated_id_has_fixed_length() {
        let id = TaskId::generate("Write docs", Utc::now());
        assert_eq!(id.as_str().len(), GENERATED_ID_LEN);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generate_unique_skips_taken_ids() {
        let ts = Utc::now();
        let taken = TaskId::generate("Collide", ts);

        let fresh = TaskId::generate_unique("Collide", ts, |id| id == &taken);
        assert_ne!(fresh, taken);
    }

    #[test]
    fn parse_normalizes_case_and_whitespace() {
        let id: TaskId = "  AB12cd ".parse().unwrap();
        assert_eq!(id.as_str(), "ab12cd");
    }

    #[test]
    fn parse_rejects_invalid_input() {
        assert_eq!("".parse::<TaskId>(), Err(IdError::Empty));
        assert_eq!("   ".parse::<TaskId>(), Err(IdError::Empty));
        assert!(matches!(
            "has space".parse::<TaskId>(),
            Err(IdError::InvalidCharacters(_))
        ));
        assert!(matches!(
            "x".repeat(65).parse::<TaskId>(),
            Err(IdError::TooLong(_))
        ));
    }

    #[test]
    fn serde_uses_plain_string() {
        let id: TaskId = "abc1234".parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"abc1234\"");

        let parsed: TaskId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
        assert!(serde_json::from_str::<TaskId>("\"bad id\"").is_err());
    }
}
