//! Chat transports
//!
//! `ConsoleTransport` prints to stdout for local play; `RecordingTransport`
//! captures everything it is asked to send and can be scripted to fail.

use crate::common::traits::ChatTransport;
use crate::common::types::ChatId;
use crate::errors::TransportError;
use crate::games::types::{MAX_FACE, MIN_FACE};
use async_trait::async_trait;
use rand::Rng;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Prints outbound traffic and throws dice with the local RNG
#[derive(Debug, Default, Clone)]
pub struct ConsoleTransport;

impl ConsoleTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ChatTransport for ConsoleTransport {
    async fn send_message(&self, chat: ChatId, text: &str) -> Result<(), TransportError> {
        println!("[{}] {}", chat, text);
        Ok(())
    }

    async fn send_animation(
        &self,
        chat: ChatId,
        file: &str,
        caption: &str,
    ) -> Result<(), TransportError> {
        println!("[{}] <animation {}> {}", chat, file, caption);
        Ok(())
    }

    async fn send_die(&self, chat: ChatId) -> Result<u8, TransportError> {
        let face = rand::thread_rng().gen_range(MIN_FACE..=MAX_FACE);
        println!("[{}] 🎲 {}", chat, face);
        Ok(face)
    }
}

/// Something a [`RecordingTransport`] delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Message { chat: ChatId, text: String },
    Animation { chat: ChatId, file: String, caption: String },
    Die { chat: ChatId, face: u8 },
}

#[derive(Default)]
struct Recording {
    sent: Vec<Sent>,
    message_attempts: u32,
    die_attempts: u32,
    message_failures: VecDeque<TransportError>,
    die_failures: VecDeque<TransportError>,
    faces: VecDeque<u8>,
    next_face: u8,
}

/// In-memory transport for tests and the simulator's dry runs.
///
/// Failures are consumed in order before any call succeeds. Dice land on
/// scripted faces first, then cycle 1..=6.
#[derive(Default)]
pub struct RecordingTransport {
    inner: Mutex<Recording>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<T>(&self, f: impl FnOnce(&mut Recording) -> T) -> T {
        let mut guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    /// Fail the next message or animation attempt with `error`
    pub fn fail_next_message(&self, error: TransportError) {
        self.with(|r| r.message_failures.push_back(error));
    }

    /// Fail the next die throw with `error`
    pub fn fail_next_die(&self, error: TransportError) {
        self.with(|r| r.die_failures.push_back(error));
    }

    pub fn script_faces(&self, faces: impl IntoIterator<Item = u8>) {
        self.with(|r| r.faces.extend(faces));
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.with(|r| r.sent.clone())
    }

    /// Texts delivered to `chat`, in order
    pub fn texts(&self, chat: ChatId) -> Vec<String> {
        self.with(|r| {
            r.sent
                .iter()
                .filter_map(|s| match s {
                    Sent::Message { chat: c, text } if *c == chat => Some(text.clone()),
                    Sent::Animation { chat: c, caption, .. } if *c == chat => {
                        Some(caption.clone())
                    }
                    _ => None,
                })
                .collect()
        })
    }

    /// Faces of dice that actually landed in `chat`
    pub fn dice(&self, chat: ChatId) -> Vec<u8> {
        self.with(|r| {
            r.sent
                .iter()
                .filter_map(|s| match s {
                    Sent::Die { chat: c, face } if *c == chat => Some(*face),
                    _ => None,
                })
                .collect()
        })
    }

    pub fn message_attempts(&self) -> u32 {
        self.with(|r| r.message_attempts)
    }

    pub fn die_attempts(&self) -> u32 {
        self.with(|r| r.die_attempts)
    }

    fn deliver(&self, item: Sent) -> Result<(), TransportError> {
        self.with(|r| {
            r.message_attempts += 1;
            match r.message_failures.pop_front() {
                Some(error) => Err(error),
                None => {
                    r.sent.push(item);
                    Ok(())
                }
            }
        })
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send_message(&self, chat: ChatId, text: &str) -> Result<(), TransportError> {
        self.deliver(Sent::Message {
            chat,
            text: text.to_string(),
        })
    }

    async fn send_animation(
        &self,
        chat: ChatId,
        file: &str,
        caption: &str,
    ) -> Result<(), TransportError> {
        self.deliver(Sent::Animation {
            chat,
            file: file.to_string(),
            caption: caption.to_string(),
        })
    }

    async fn send_die(&self, chat: ChatId) -> Result<u8, TransportError> {
        self.with(|r| {
            r.die_attempts += 1;
            if let Some(error) = r.die_failures.pop_front() {
                return Err(error);
            }
            let face = match r.faces.pop_front() {
                Some(face) => face,
                None => {
                    r.next_face = r.next_face % MAX_FACE + 1;
                    r.next_face
                }
            };
            r.sent.push(Sent::Die { chat, face });
            Ok(face)
        })
    }
}
