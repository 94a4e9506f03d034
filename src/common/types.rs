//! Shared identifier types
//!
//! Canonical ids used by the round engine, the store and the transport.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Chat user identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Chat (group) identity; group chats are negative on most platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sequential round number, rendered as `K` + 16 digits
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueId(pub u64);

impl IssueId {
    pub const PREFIX: char = 'K';
}

impl fmt::Display for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:016}", Self::PREFIX, self.0)
    }
}

/// Store partition for one round's bets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoundScope {
    pub chat_id: ChatId,
    pub issue: IssueId,
}

impl RoundScope {
    pub fn new(chat_id: ChatId, issue: IssueId) -> Self {
        Self { chat_id, issue }
    }
}

impl fmt::Display for RoundScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.chat_id, self.issue)
    }
}

/// Account row as the store reports it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerAccount {
    pub player_id: PlayerId,
    pub name: String,
    pub balance: i64,
    /// Sum of stakes held by open bets
    pub reserved: i64,
}

impl PlayerAccount {
    /// Balance not tied up in open bets
    pub fn available(&self) -> i64 {
        self.balance - self.reserved
    }
}

/// Unix timestamp in milliseconds
pub fn current_timestamp_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
