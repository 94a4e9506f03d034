//! Resilient outbound dispatch
//!
//! Wraps a [`ChatTransport`] with bounded retry. Messages use a doubling
//! backoff capped by any server-signalled wait; dice use the signalled wait
//! or a fixed pause after network failures. Every loop has a fixed attempt
//! ceiling and every sleep is bounded, so no call blocks indefinitely.

use crate::common::traits::ChatTransport;
use crate::common::types::ChatId;
use crate::config::DispatchConfig;
use crate::errors::{DispatchError, TransportError};
use crate::games::types::{MAX_FACE, MIN_FACE};
use crate::metrics::RoundMetrics;
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// A die face and where it came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RolledDie {
    pub face: u8,
    /// True when the chat throw failed and the face was generated locally
    pub fallback: bool,
}

#[derive(Clone)]
pub struct ResilientDispatcher {
    transport: Arc<dyn ChatTransport>,
    policy: DispatchConfig,
    metrics: Arc<RoundMetrics>,
}

impl ResilientDispatcher {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        policy: DispatchConfig,
        metrics: Arc<RoundMetrics>,
    ) -> Self {
        Self {
            transport,
            policy,
            metrics,
        }
    }

    /// Send a text message, retrying transient failures
    pub async fn send_message(&self, chat: ChatId, text: &str) -> Result<(), DispatchError> {
        self.with_message_retry(chat, "send_message", || {
            self.transport.send_message(chat, text)
        })
        .await
    }

    /// Send an animation with the message retry policy
    pub async fn send_animation(
        &self,
        chat: ChatId,
        file: &str,
        caption: &str,
    ) -> Result<(), DispatchError> {
        self.with_message_retry(chat, "send_animation", || {
            self.transport.send_animation(chat, file, caption)
        })
        .await
    }

    /// Best-effort message: failures are logged and swallowed
    pub async fn announce(&self, chat: ChatId, text: &str) {
        if let Err(e) = self.send_message(chat, text).await {
            tracing::warn!(chat_id = %chat, error = %e, "Announcement not delivered, continuing");
        }
    }

    /// Throw one die in the chat
    pub async fn send_die(&self, chat: ChatId) -> Result<u8, DispatchError> {
        let max_attempts = self.policy.die_max_attempts.max(1);
        let max_signalled = Duration::from_millis(self.policy.max_signalled_wait_ms);
        let network_wait = Duration::from_millis(self.policy.die_network_wait_ms);

        let mut attempt = 0;
        loop {
            attempt += 1;
            let error = match self.transport.send_die(chat).await {
                Ok(face) if (MIN_FACE..=MAX_FACE).contains(&face) => return Ok(face),
                Ok(face) => TransportError::Rejected(format!("die landed on {}", face)),
                Err(e) => e,
            };

            if !error.is_transient() {
                self.metrics.record_dispatch_failure();
                return Err(DispatchError::Permanent { attempt, error });
            }
            if attempt >= max_attempts {
                self.metrics.record_dispatch_failure();
                return Err(DispatchError::Exhausted {
                    attempts: attempt,
                    last: error,
                });
            }

            let wait = match &error {
                TransportError::RateLimited { retry_after } => (*retry_after).min(max_signalled),
                _ => network_wait,
            };
            tracing::debug!(
                chat_id = %chat,
                attempt,
                wait_ms = wait.as_millis() as u64,
                error = %error,
                "Retrying send_die"
            );
            self.metrics.record_dispatch_retry();
            tokio::time::sleep(wait).await;
        }
    }

    /// Throw a die, substituting a locally generated face if the chat throw fails
    pub async fn roll_or_fallback(&self, chat: ChatId) -> RolledDie {
        match self.send_die(chat).await {
            Ok(face) => RolledDie {
                face,
                fallback: false,
            },
            Err(e) => {
                let face = rand::thread_rng().gen_range(MIN_FACE..=MAX_FACE);
                self.metrics.record_fallback_roll();
                tracing::warn!(
                    chat_id = %chat,
                    attempts = e.attempts(),
                    error = %e,
                    face,
                    "Die throw failed, using fallback roll"
                );
                RolledDie {
                    face,
                    fallback: true,
                }
            }
        }
    }

    async fn with_message_retry<F, Fut>(
        &self,
        chat: ChatId,
        operation: &'static str,
        mut call: F,
    ) -> Result<(), DispatchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), TransportError>>,
    {
        let max_attempts = self.policy.message_max_attempts.max(1);
        let max_backoff = Duration::from_millis(self.policy.message_max_backoff_ms);
        let mut backoff = Duration::from_millis(self.policy.message_initial_backoff_ms).min(max_backoff);

        let mut attempt = 0;
        loop {
            attempt += 1;
            let error = match call().await {
                Ok(()) => {
                    if attempt > 1 {
                        tracing::debug!(chat_id = %chat, attempt, operation, "Delivered after retry");
                    }
                    return Ok(());
                }
                Err(e) => e,
            };

            if !error.is_transient() {
                self.metrics.record_dispatch_failure();
                tracing::warn!(chat_id = %chat, attempt, operation, error = %error, "Permanent delivery failure");
                return Err(DispatchError::Permanent { attempt, error });
            }
            if attempt >= max_attempts {
                self.metrics.record_dispatch_failure();
                tracing::warn!(chat_id = %chat, attempts = attempt, operation, error = %error, "Delivery attempts exhausted");
                return Err(DispatchError::Exhausted {
                    attempts: attempt,
                    last: error,
                });
            }

            let wait = message_wait(&error, backoff);
            backoff = (backoff * 2).min(max_backoff);

            tracing::debug!(
                chat_id = %chat,
                attempt,
                operation,
                wait_ms = wait.as_millis() as u64,
                error = %error,
                "Retrying delivery"
            );
            self.metrics.record_dispatch_retry();
            tokio::time::sleep(wait).await;
        }
    }
}

/// Wait before the next message attempt: the current backoff, shortened to
/// the signalled retry-after when the server asks for less
fn message_wait(error: &TransportError, backoff: Duration) -> Duration {
    match error {
        TransportError::RateLimited { retry_after } => (*retry_after).min(backoff),
        _ => backoff,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RecordingTransport;
    use tokio::time::Instant;

    fn dispatcher(transport: Arc<RecordingTransport>) -> (ResilientDispatcher, Arc<RoundMetrics>) {
        let metrics = Arc::new(RoundMetrics::new());
        (
            ResilientDispatcher::new(transport, DispatchConfig::default(), metrics.clone()),
            metrics,
        )
    }

    fn rate_limited(secs: u64) -> TransportError {
        TransportError::RateLimited {
            retry_after: Duration::from_secs(secs),
        }
    }

    #[test]
    fn test_message_wait_takes_lesser() {
        let backoff = Duration::from_secs(4);
        assert_eq!(message_wait(&rate_limited(1), backoff), Duration::from_secs(1));
        assert_eq!(message_wait(&rate_limited(30), backoff), backoff);
        assert_eq!(
            message_wait(&TransportError::Network("reset".into()), backoff),
            backoff
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_four_rate_limits_then_success() {
        let transport = Arc::new(RecordingTransport::new());
        for _ in 0..4 {
            transport.fail_next_message(rate_limited(100));
        }
        let (dispatcher, metrics) = dispatcher(transport.clone());

        let started = Instant::now();
        dispatcher.send_message(ChatId(1), "hello").await.unwrap();

        assert_eq!(transport.message_attempts(), 5);
        assert_eq!(transport.texts(ChatId(1)), vec!["hello".to_string()]);
        // 1 + 2 + 4 + 8 seconds of backoff
        assert_eq!(started.elapsed(), Duration::from_secs(15));
        assert_eq!(metrics.snapshot().dispatch_retries, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_message_exhaustion_is_reported_not_raised() {
        let transport = Arc::new(RecordingTransport::new());
        for _ in 0..5 {
            transport.fail_next_message(TransportError::Network("timeout".into()));
        }
        let (dispatcher, metrics) = dispatcher(transport.clone());

        let result = dispatcher.send_message(ChatId(1), "lost").await;
        assert!(matches!(result, Err(DispatchError::Exhausted { attempts: 5, .. })));
        assert_eq!(transport.message_attempts(), 5);
        assert_eq!(metrics.snapshot().dispatch_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_message_is_not_retried() {
        let transport = Arc::new(RecordingTransport::new());
        transport.fail_next_message(TransportError::Rejected("chat not found".into()));
        let (dispatcher, _) = dispatcher(transport.clone());

        let result = dispatcher.send_message(ChatId(1), "x").await;
        assert!(matches!(result, Err(DispatchError::Permanent { attempt: 1, .. })));
        assert_eq!(transport.message_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_die_waits_signalled_then_fixed() {
        let transport = Arc::new(RecordingTransport::new());
        transport.fail_next_die(rate_limited(3));
        transport.fail_next_die(TransportError::Network("reset".into()));
        transport.script_faces([6]);
        let (dispatcher, _) = dispatcher(transport.clone());

        let started = Instant::now();
        assert_eq!(dispatcher.send_die(ChatId(1)).await.unwrap(), 6);
        assert_eq!(started.elapsed(), Duration::from_secs(3 + 5));
        assert_eq!(transport.die_attempts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_die_failure_falls_back_to_local_roll() {
        let transport = Arc::new(RecordingTransport::new());
        for _ in 0..3 {
            transport.fail_next_die(TransportError::Network("down".into()));
        }
        let (dispatcher, metrics) = dispatcher(transport.clone());

        let rolled = dispatcher.roll_or_fallback(ChatId(1)).await;
        assert!(rolled.fallback);
        assert!((1..=6).contains(&rolled.face));
        assert_eq!(transport.die_attempts(), 3);
        assert_eq!(metrics.snapshot().fallback_rolls, 1);
    }
}
