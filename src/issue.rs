//! Sequential issue numbering
//!
//! Hands out [`IssueId`]s in order. With a counter file the next value
//! survives restarts; the file holds one integer. Every chat numbers its
//! rounds independently through [`IssueSequence::for_chat`].

use crate::common::types::{ChatId, IssueId};
use crate::errors::{DiceError, DiceResult};
use std::path::PathBuf;
use tokio::sync::Mutex;

pub struct IssueSequence {
    next: Mutex<Option<u64>>,
    first: u64,
    path: Option<PathBuf>,
}

impl IssueSequence {
    /// Counter kept in memory, starting at 1
    pub fn in_memory() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: Mutex::new(Some(first)),
            first,
            path: None,
        }
    }

    /// Counter persisted at `path`; a missing file starts at 1
    pub fn persisted(path: impl Into<PathBuf>) -> Self {
        Self {
            next: Mutex::new(None),
            first: 1,
            path: Some(path.into()),
        }
    }

    /// A fresh sequence for one chat, sharing nothing with this one.
    /// A persisted counter `issue` becomes `issue.<chat id>`.
    pub fn for_chat(&self, chat: ChatId) -> Self {
        match self.path {
            Some(ref path) => {
                let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
                name.push(format!(".{}", chat.0));
                Self::persisted(path.with_file_name(name))
            }
            None => Self::starting_at(self.first),
        }
    }

    /// Take the next issue id and advance the counter
    pub async fn next_issue(&self) -> DiceResult<IssueId> {
        let mut next = self.next.lock().await;
        let current = match *next {
            Some(value) => value,
            None => self.load().await?,
        };

        if let Some(ref path) = self.path {
            tokio::fs::write(path, (current + 1).to_string())
                .await
                .map_err(|e| DiceError::Issue(format!("write {}: {}", path.display(), e)))?;
        }
        *next = Some(current + 1);

        Ok(IssueId(current))
    }

    async fn load(&self) -> DiceResult<u64> {
        let Some(ref path) = self.path else {
            return Ok(self.first);
        };
        match tokio::fs::read_to_string(path).await {
            Ok(content) => content.trim().parse::<u64>().map_err(|_| {
                DiceError::Issue(format!(
                    "{} does not hold an issue number: '{}'",
                    path.display(),
                    content.trim()
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(self.first),
            Err(e) => Err(DiceError::Issue(format!("read {}: {}", path.display(), e))),
        }
    }
}
