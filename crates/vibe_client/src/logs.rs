use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use vibe_logging::{vibe_debug, vibe_warn};

use crate::{Backend, ClientError, LogRecord};

#[derive(Debug, Clone, PartialEq)]
pub enum LogEvent {
    Connected,
    Record(LogRecord),
    /// The stream broke; a reconnect follows after the configured delay.
    Disconnected(String),
}

/// Follows the backend log stream, reconnecting after transport errors
/// until cancelled.
pub struct LogStreamer {
    backend: Arc<dyn Backend>,
    reconnect_delay: Duration,
}

impl LogStreamer {
    pub fn new(backend: Arc<dyn Backend>, reconnect_delay: Duration) -> Self {
        Self {
            backend,
            reconnect_delay,
        }
    }

    pub async fn run(
        &self,
        cancel: &CancellationToken,
        on_event: &mut (dyn FnMut(LogEvent) + Send),
    ) {
        loop {
            let reason = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                reason = self.follow(cancel, on_event) => reason,
            };
            let Some(reason) = reason else {
                return;
            };
            vibe_warn!(
                "Log stream lost ({}); reconnecting in {:?}",
                reason,
                self.reconnect_delay
            );
            on_event(LogEvent::Disconnected(reason));

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }
    }

    /// Returns why the stream ended, or `None` when cancelled.
    async fn follow(
        &self,
        cancel: &CancellationToken,
        on_event: &mut (dyn FnMut(LogEvent) + Send),
    ) -> Option<String> {
        let mut records = match self.backend.log_events().await {
            Ok(records) => records,
            Err(err) => return Some(err.to_string()),
        };
        on_event(LogEvent::Connected);

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                next = records.next() => next,
            };
            match next {
                Some(Ok(record)) if record.is_heartbeat() => {}
                Some(Ok(record)) => on_event(LogEvent::Record(record)),
                Some(Err(ClientError::Decode(err))) => {
                    vibe_debug!("Skipping malformed log record: {}", err);
                }
                Some(Err(err)) => return Some(err.to_string()),
                None => return Some("stream closed by server".to_string()),
            }
        }
    }
}
