//! Delivery boundary and message formatting.
//!
//! # Submodules
//!
//! - [`messages`]: turns quotes and enriched articles into [`OutgoingMessage`]s
//! - [`json`]: a [`Transport`] that writes each message as a JSON line to stdout
//!
//! The core never talks to a chat service directly; it hands payloads to a
//! [`Transport`] and logs delivery failures.

pub mod json;
pub mod messages;

use crate::error::PipelineError;
use crate::models::{OutgoingMessage, RecipientId};
use std::future::Future;

pub trait Transport: Send + Sync + 'static {
    /// Deliver one message to `recipient`.
    fn deliver(
        &self,
        recipient: RecipientId,
        message: &OutgoingMessage,
    ) -> impl Future<Output = Result<(), PipelineError>> + Send;
}
