use serde::{Deserialize, Serialize};

use crate::document::DocumentId;
use crate::poi::PointOfInterest;
use crate::toggles::{Layer, ToggleState};

/// Messages the host pushes into a loaded runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostMessage {
    Focus {
        id: String,
        label: String,
        lat: f64,
        lng: f64,
        zoom: u8,
    },
    SetLayerVisibility {
        layer: Layer,
        visible: bool,
    },
}

impl HostMessage {
    pub fn focus(point: &PointOfInterest) -> Self {
        Self::Focus {
            id: point.id.clone(),
            label: point.label.clone(),
            lat: point.lat,
            lng: point.lng,
            zoom: point.zoom,
        }
    }
}

/// Messages a runtime reports about itself.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EmbeddedReport {
    Ready,
    LayerToggled { layer: Layer, visible: bool },
    Route {
        status: String,
        #[serde(default)]
        state: Option<String>,
    },
    Fault { message: String },
}

/// An embedded report tagged with the document that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EmbeddedMessage {
    pub document_id: String,
    #[serde(flatten)]
    pub report: EmbeddedReport,
}

impl EmbeddedMessage {
    pub fn new(document_id: &DocumentId, report: EmbeddedReport) -> Self {
        Self {
            document_id: document_id.as_str().to_owned(),
            report,
        }
    }
}

/// Why a document was (re)built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildReason {
    Mount,
    Toggle(Layer),
    LocationChanged,
    Resize,
}

impl RebuildReason {
    pub fn label(self) -> &'static str {
        match self {
            Self::Mount => "mount",
            Self::Toggle(Layer::Heatmap) => "toggle_heatmap",
            Self::Toggle(Layer::LiveConditions) => "toggle_live_conditions",
            Self::LocationChanged => "location_changed",
            Self::Resize => "resize",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeCommand {
    ToggleHeatmap,
    ToggleLiveConditions,
    Embedded { message: EmbeddedMessage },
    Shutdown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    DocumentReplaced {
        revision: u64,
        document_id: DocumentId,
        reason: RebuildReason,
        toggles: ToggleState,
    },
    RuntimeReady,
    LayerVisibilityPosted {
        layer: Layer,
        visible: bool,
    },
    TogglesReconciled {
        toggles: ToggleState,
    },
    RouteReported {
        status: String,
    },
    RuntimeFaulted {
        message: String,
    },
    FocusForwarded {
        point_of_interest: String,
    },
    SurfaceFailed {
        error: String,
    },
}
