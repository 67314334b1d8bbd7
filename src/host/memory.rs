use crate::bridge::events::HostMessage;
use crate::document::{DocumentId, MapDocument};

use super::{RenderSurface, SurfaceError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedDocument {
    pub id: DocumentId,
    pub html: String,
}

/// Headless surface that records every load and message. Used by tests and
/// by embedders that render documents elsewhere.
#[derive(Debug, Default)]
pub struct MemorySurface {
    loads: Vec<LoadedDocument>,
    posted: Vec<HostMessage>,
    fallbacks: Vec<String>,
    pending_failure: Option<String>,
    unloaded: bool,
}

impl MemorySurface {
    pub fn loads(&self) -> &[LoadedDocument] {
        &self.loads
    }

    pub fn current(&self) -> Option<&LoadedDocument> {
        if self.unloaded {
            return None;
        }
        self.loads.last()
    }

    pub fn posted(&self) -> &[HostMessage] {
        &self.posted
    }

    pub fn fallbacks(&self) -> &[String] {
        &self.fallbacks
    }

    pub fn fail_next_load(&mut self, reason: impl Into<String>) {
        self.pending_failure = Some(reason.into());
    }
}

impl RenderSurface for MemorySurface {
    fn load_document(&mut self, document: &MapDocument) -> Result<(), SurfaceError> {
        if let Some(reason) = self.pending_failure.take() {
            return Err(SurfaceError::LoadRejected {
                document_id: document.id().to_string(),
                reason,
            });
        }

        self.loads.push(LoadedDocument {
            id: document.id().clone(),
            html: document.html().to_owned(),
        });
        self.unloaded = false;
        Ok(())
    }

    fn post_message(&mut self, message: &HostMessage) -> Result<(), SurfaceError> {
        self.posted.push(message.clone());
        Ok(())
    }

    fn show_fallback(&mut self, reason: &str) {
        self.fallbacks.push(reason.to_owned());
    }

    fn unload(&mut self) {
        self.unloaded = true;
    }
}
