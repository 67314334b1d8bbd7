//! Focus requests from unrelated screens to whichever map is mounted.
//!
//! A [`FocusRouter`] holds at most one live subscription; mounting a bridge
//! replaces the previous one. Callers get a typed [`FocusOutcome`] back, and
//! the process-wide [`focus`] hook discards it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};

use serde::Serialize;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::debug;

use crate::poi::{PoiCatalog, PointOfInterest};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FocusOutcome {
    Delivered { mount: u64 },
    UnknownPointOfInterest { id: String },
    NotMounted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FocusRequest {
    pub point: PointOfInterest,
}

#[derive(Debug)]
struct Registration {
    token: u64,
    tx: UnboundedSender<FocusRequest>,
}

#[derive(Debug)]
struct RouterInner {
    catalog: RwLock<PoiCatalog>,
    slot: Mutex<Option<Registration>>,
    next_token: AtomicU64,
}

#[derive(Debug, Clone)]
pub struct FocusRouter {
    inner: Arc<RouterInner>,
}

impl Default for FocusRouter {
    fn default() -> Self {
        Self::new(PoiCatalog::default())
    }
}

impl FocusRouter {
    pub fn new(catalog: PoiCatalog) -> Self {
        Self {
            inner: Arc::new(RouterInner {
                catalog: RwLock::new(catalog),
                slot: Mutex::new(None),
                next_token: AtomicU64::new(1),
            }),
        }
    }

    /// The router behind the process-wide [`focus`] hook.
    pub fn global() -> &'static FocusRouter {
        static GLOBAL: OnceLock<FocusRouter> = OnceLock::new();
        GLOBAL.get_or_init(FocusRouter::default)
    }

    pub fn set_catalog(&self, catalog: PoiCatalog) {
        *self
            .inner
            .catalog
            .write()
            .unwrap_or_else(PoisonError::into_inner) = catalog;
    }

    pub fn catalog(&self) -> PoiCatalog {
        self.inner
            .catalog
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Installs a new subscriber, displacing any earlier one.
    pub fn mount(&self) -> FocusSubscription {
        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = unbounded_channel();
        let displaced = self
            .inner
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(Registration { token, tx });
        if let Some(previous) = displaced {
            debug!(
                previous_mount = previous.token,
                mount = token,
                "focus subscription displaced"
            );
        }

        FocusSubscription {
            router: self.clone(),
            token,
            rx,
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.inner
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn focus(&self, point_of_interest_id: &str) -> FocusOutcome {
        let Some(point) = self
            .inner
            .catalog
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(point_of_interest_id)
            .cloned()
        else {
            return FocusOutcome::UnknownPointOfInterest {
                id: point_of_interest_id.to_owned(),
            };
        };

        let mut slot = self
            .inner
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(registration) = slot.as_ref() else {
            return FocusOutcome::NotMounted;
        };

        let mount = registration.token;
        if registration.tx.send(FocusRequest { point }).is_err() {
            *slot = None;
            return FocusOutcome::NotMounted;
        }
        FocusOutcome::Delivered { mount }
    }

    fn release(&self, token: u64) {
        let mut slot = self
            .inner
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot
            .as_ref()
            .is_some_and(|registration| registration.token == token)
        {
            *slot = None;
        }
    }
}

/// A mounted bridge's end of the router. Dropping it unmounts, unless a
/// newer subscription has already taken the slot.
#[derive(Debug)]
pub struct FocusSubscription {
    router: FocusRouter,
    token: u64,
    rx: UnboundedReceiver<FocusRequest>,
}

impl FocusSubscription {
    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn try_next(&mut self) -> Option<FocusRequest> {
        self.rx.try_recv().ok()
    }

    pub async fn next(&mut self) -> Option<FocusRequest> {
        self.rx.recv().await
    }
}

impl Drop for FocusSubscription {
    fn drop(&mut self) {
        self.router.release(self.token);
    }
}

/// Process-wide focus hook. Unknown ids and an unmounted map are ignored.
pub fn focus(point_of_interest_id: &str) {
    let outcome = FocusRouter::global().focus(point_of_interest_id);
    debug!(
        point_of_interest = point_of_interest_id,
        ?outcome,
        "global focus request"
    );
}
