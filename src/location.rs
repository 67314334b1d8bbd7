use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Trip endpoints shared by the planning screens. Values are free text and
/// are never validated here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationState {
    pub start: Option<String>,
    pub end: String,
}

impl LocationState {
    pub fn new(end: impl Into<String>) -> Self {
        Self {
            start: None,
            end: end.into(),
        }
    }

    pub fn with_start(mut self, start: impl Into<String>) -> Self {
        self.start = Some(start.into());
        self
    }
}

/// Session-wide location store. Planning screens write, bridges read.
#[derive(Debug, Clone)]
pub struct LocationStore {
    tx: watch::Sender<LocationState>,
}

impl LocationStore {
    pub fn new(initial: LocationState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn snapshot(&self) -> LocationState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LocationState> {
        self.tx.subscribe()
    }

    pub fn set_start(&self, start: Option<String>) {
        self.tx.send_if_modified(|state| {
            if state.start == start {
                return false;
            }
            state.start = start;
            true
        });
    }

    pub fn set_end(&self, end: impl Into<String>) {
        let end = end.into();
        self.tx.send_if_modified(|state| {
            if state.end == end {
                return false;
            }
            state.end = end;
            true
        });
    }

    pub fn replace(&self, next: LocationState) {
        self.tx.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            *state = next;
            true
        });
    }
}
