//! JSON-lines delivery.
//!
//! Stands in for a chat transport: every message is serialized as one line
//! on stdout, stamped with the recipient and the send time.
//!
//! ```text
//! {"recipient":42,"sent_at":"2025-05-06T08:00:15Z","message":{"text":"..."}}
//! ```

use super::Transport;
use crate::error::PipelineError;
use crate::models::{OutgoingMessage, RecipientId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt, Stdout, stdout};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

#[derive(Debug, Serialize)]
struct Envelope<'a> {
    recipient: RecipientId,
    sent_at: DateTime<Utc>,
    message: &'a OutgoingMessage,
}

/// Writes one JSON object per delivered message.
///
/// Writes are serialized through a mutex so concurrent deliveries never
/// interleave within a line.
pub struct JsonLinesTransport<W = Stdout> {
    out: Mutex<W>,
}

impl JsonLinesTransport<Stdout> {
    pub fn stdout() -> Self {
        Self::new(stdout())
    }
}

impl<W> JsonLinesTransport<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W> Transport for JsonLinesTransport<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    #[instrument(level = "debug", skip(self, message))]
    async fn deliver(
        &self,
        recipient: RecipientId,
        message: &OutgoingMessage,
    ) -> Result<(), PipelineError> {
        let envelope = Envelope {
            recipient,
            sent_at: Utc::now(),
            message,
        };
        let mut line = serde_json::to_vec(&envelope)
            .map_err(|e| PipelineError::ParseFailure(e.to_string()))?;
        line.push(b'\n');

        let mut out = self.out.lock().await;
        out.write_all(&line)
            .await
            .map_err(|e| PipelineError::NetworkFailure(e.to_string()))?;
        out.flush()
            .await
            .map_err(|e| PipelineError::NetworkFailure(e.to_string()))?;
        debug!(bytes = line.len(), "Delivered message");
        Ok(())
    }
}
