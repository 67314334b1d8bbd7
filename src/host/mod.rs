//! Render host: owns the embedding surface and replaces its document.
//!
//! Host state only tracks what the host itself did. A surface is `Ready`
//! once the host handed it a document; nothing inside the runtime has to
//! acknowledge that.

use tracing::{debug, warn};

use crate::bridge::events::HostMessage;
use crate::document::{DocumentId, MapDocument};

pub mod memory;
pub mod preview;
pub mod sizing;

pub use self::memory::MemorySurface;
pub use self::preview::{PreviewSnapshot, PreviewSurface};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("surface rejected document {document_id}: {reason}")]
    LoadRejected { document_id: String, reason: String },

    #[error("surface cannot deliver messages: {reason}")]
    MessagingUnavailable { reason: String },

    #[error("surface is not mounted")]
    NotMounted,
}

/// A platform embedding surface. Documents are only ever loaded whole.
pub trait RenderSurface {
    fn load_document(&mut self, document: &MapDocument) -> Result<(), SurfaceError>;

    fn post_message(&mut self, message: &HostMessage) -> Result<(), SurfaceError>;

    /// Shows a host-side fallback in place of a faulted runtime.
    fn show_fallback(&mut self, _reason: &str) {}

    fn unload(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceState {
    Unmounted,
    Loading { revision: u64 },
    Ready { revision: u64 },
}

#[derive(Debug)]
pub struct RenderHost<S> {
    surface: S,
    state: SurfaceState,
    revision: u64,
    current_document: Option<DocumentId>,
}

impl<S: RenderSurface> RenderHost<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            state: SurfaceState::Unmounted,
            revision: 0,
            current_document: None,
        }
    }

    pub fn state(&self) -> SurfaceState {
        self.state
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn current_document(&self) -> Option<&DocumentId> {
        self.current_document.as_ref()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Swaps in `document`, abandoning whatever runtime was loaded before.
    pub fn replace(&mut self, document: &MapDocument) -> Result<u64, SurfaceError> {
        let previous = self.state;
        let revision = self.revision.saturating_add(1);
        self.state = SurfaceState::Loading { revision };

        if let Err(error) = self.surface.load_document(document) {
            warn!(
                revision,
                document_id = %document.id(),
                error = %error,
                "surface load failed; keeping previous document"
            );
            self.state = previous;
            return Err(error);
        }

        self.revision = revision;
        self.current_document = Some(document.id().clone());
        self.state = SurfaceState::Ready { revision };
        debug!(revision, document_id = %document.id(), "surface document replaced");
        Ok(revision)
    }

    pub fn post(&mut self, message: &HostMessage) -> Result<(), SurfaceError> {
        match self.state {
            SurfaceState::Ready { .. } => self.surface.post_message(message),
            SurfaceState::Unmounted | SurfaceState::Loading { .. } => {
                Err(SurfaceError::NotMounted)
            }
        }
    }

    pub fn is_current(&self, document_id: &str) -> bool {
        self.current_document
            .as_ref()
            .is_some_and(|current| current.as_str() == document_id)
    }

    pub fn unmount(&mut self) {
        self.surface.unload();
        self.state = SurfaceState::Unmounted;
        self.current_document = None;
    }

    pub fn into_surface(self) -> S {
        self.surface
    }
}
