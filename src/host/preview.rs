use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::warn;

use crate::bridge::events::HostMessage;
use crate::document::MapDocument;

use super::{RenderSurface, SurfaceError};

const MAX_QUEUED_MESSAGES: usize = 64;

#[derive(Debug, Default)]
struct PreviewFrame {
    revision: u64,
    document_id: Option<String>,
    html: Option<String>,
    outbox: VecDeque<HostMessage>,
    fault: Option<String>,
}

/// What the browser shell needs on each poll.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewSnapshot {
    pub revision: u64,
    pub document_id: Option<String>,
    pub fault: Option<String>,
    pub messages: Vec<HostMessage>,
}

/// Surface backed by a browser tab. The preview server serves the current
/// document into a sandboxed iframe and relays queued messages on poll.
#[derive(Debug, Clone, Default)]
pub struct PreviewSurface {
    frame: Arc<Mutex<PreviewFrame>>,
}

impl PreviewSurface {
    pub fn html(&self) -> Option<String> {
        self.lock().html.clone()
    }

    pub fn revision(&self) -> u64 {
        self.lock().revision
    }

    /// Returns the frame state and hands queued messages to the caller.
    pub fn drain(&self) -> PreviewSnapshot {
        let mut frame = self.lock();
        PreviewSnapshot {
            revision: frame.revision,
            document_id: frame.document_id.clone(),
            fault: frame.fault.clone(),
            messages: frame.outbox.drain(..).collect(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PreviewFrame> {
        self.frame.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RenderSurface for PreviewSurface {
    fn load_document(&mut self, document: &MapDocument) -> Result<(), SurfaceError> {
        let mut frame = self.lock();
        frame.revision = frame.revision.saturating_add(1);
        frame.document_id = Some(document.id().to_string());
        frame.html = Some(document.html().to_owned());
        // Messages were addressed to the runtime being replaced.
        frame.outbox.clear();
        frame.fault = None;
        Ok(())
    }

    fn post_message(&mut self, message: &HostMessage) -> Result<(), SurfaceError> {
        let mut frame = self.lock();
        if frame.html.is_none() {
            return Err(SurfaceError::MessagingUnavailable {
                reason: "no document loaded".to_owned(),
            });
        }
        if frame.outbox.len() >= MAX_QUEUED_MESSAGES {
            let _ = frame.outbox.pop_front();
            warn!(
                limit = MAX_QUEUED_MESSAGES,
                "preview outbox full; dropping oldest message"
            );
        }
        frame.outbox.push_back(message.clone());
        Ok(())
    }

    fn show_fallback(&mut self, reason: &str) {
        self.lock().fault = Some(reason.to_owned());
    }

    fn unload(&mut self) {
        let mut frame = self.lock();
        frame.html = None;
        frame.document_id = None;
        frame.outbox.clear();
    }
}
