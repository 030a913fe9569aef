//! In-crate test doubles for the fetch, summarizer and transport seams.

use crate::api::{AskAsync, CompletionRequest};
use crate::error::PipelineError;
use crate::fetch::{FetchedPage, PageFetcher};
use crate::models::{OutgoingMessage, RecipientId};
use crate::outputs::Transport;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Serves canned pages; any other URL is a network failure.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    pages: HashMap<String, FetchedPage>,
    requests: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, status: u16, body: &str) -> Self {
        self.pages.insert(
            url.to_string(),
            FetchedPage {
                status,
                body: body.to_string(),
            },
        );
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl PageFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, PipelineError> {
        self.requests.lock().unwrap().push(url.to_string());
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| PipelineError::NetworkFailure(format!("no route to {url}")))
    }
}

/// Summarizer that counts calls and replies with a fixed text (or fails).
#[derive(Debug)]
pub struct CountingSummarizer {
    reply: Option<String>,
    calls: AtomicUsize,
    last: Mutex<Option<CompletionRequest>>,
}

impl CountingSummarizer {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.last.lock().unwrap().clone()
    }
}

impl AskAsync for CountingSummarizer {
    async fn ask(&self, request: &CompletionRequest) -> Result<String, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(request.clone());
        self.reply
            .clone()
            .ok_or_else(|| PipelineError::CapabilityFailure("summarizer down".to_string()))
    }
}

/// Records every delivery attempt; optionally fails them all, or only the
/// ones carrying an image.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    fail: bool,
    reject_photos: bool,
    attempts: AtomicUsize,
    sent: Mutex<Vec<(RecipientId, OutgoingMessage)>>,
}

impl RecordingTransport {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn rejecting_photos() -> Self {
        Self {
            reject_photos: true,
            ..Self::default()
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<(RecipientId, OutgoingMessage)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Transport for RecordingTransport {
    async fn deliver(
        &self,
        recipient: RecipientId,
        message: &OutgoingMessage,
    ) -> Result<(), PipelineError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PipelineError::NetworkFailure("chat API unreachable".to_string()));
        }
        if self.reject_photos && message.image_url.is_some() {
            return Err(PipelineError::HttpStatus(400));
        }
        self.sent.lock().unwrap().push((recipient, message.clone()));
        Ok(())
    }
}
