use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Deserializer, Serialize};
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::bridge::events::{BridgeEvent, EmbeddedMessage};
use crate::bridge::worker::{BridgeHandle, spawn_bridge_worker};
use crate::bridge::{BridgeOptions, BridgeProps, MapBridge, RuntimeStatus};
use crate::config::MapSettings;
use crate::focus::FocusRouter;
use crate::host::{PreviewSurface, RenderSurface};
use crate::host::sizing::Viewport;
use crate::location::{LocationState, LocationStore};
use crate::poi::PoiCatalog;
use crate::toggles::{Layer, ToggleState};

mod shell;

/// Viewport assumed for the preview tab when sizing the container.
pub const PREVIEW_VIEWPORT: Viewport = Viewport {
    width: 1280,
    height: 800,
};

const STATUS_WAIT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct PreviewOptions {
    pub props: BridgeProps,
    pub start: Option<String>,
    pub viewport: Viewport,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            props: BridgeProps::default(),
            start: None,
            viewport: PREVIEW_VIEWPORT,
        }
    }
}

/// Host-side view of the mounted bridge, kept current from its events.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BridgeStatus {
    pub revision: u64,
    pub document_id: Option<String>,
    pub toggles: ToggleState,
    pub runtime: RuntimeStatus,
    pub last_route_status: Option<String>,
    pub fault: Option<String>,
    pub last_surface_error: Option<String>,
}

impl BridgeStatus {
    fn from_bridge<S: RenderSurface>(bridge: &MapBridge<S>) -> Self {
        Self {
            revision: bridge.host().revision(),
            document_id: bridge.host().current_document().map(|id| id.to_string()),
            toggles: bridge.toggles(),
            runtime: bridge.runtime_status(),
            last_route_status: bridge.last_route_status().map(str::to_owned),
            fault: None,
            last_surface_error: None,
        }
    }

    /// Folds one bridge event in. Returns `true` when anything changed.
    pub fn apply(&mut self, event: &BridgeEvent) -> bool {
        let before = self.clone();
        match event {
            BridgeEvent::DocumentReplaced {
                revision,
                document_id,
                toggles,
                ..
            } => {
                self.revision = *revision;
                self.document_id = Some(document_id.to_string());
                self.toggles = *toggles;
                self.runtime = RuntimeStatus::Pending;
                self.last_route_status = None;
                self.fault = None;
            }
            BridgeEvent::RuntimeReady => self.runtime = RuntimeStatus::Ready,
            BridgeEvent::LayerVisibilityPosted { layer, visible } => {
                self.toggles = self.toggles.with_visibility(*layer, *visible);
            }
            BridgeEvent::TogglesReconciled { toggles } => self.toggles = *toggles,
            BridgeEvent::RouteReported { status } => {
                self.last_route_status = Some(status.clone());
            }
            BridgeEvent::RuntimeFaulted { message } => {
                self.runtime = RuntimeStatus::Faulted;
                self.fault = Some(message.clone());
            }
            BridgeEvent::FocusForwarded { .. } => {}
            BridgeEvent::SurfaceFailed { error } => {
                self.last_surface_error = Some(error.clone());
            }
        }
        *self != before
    }
}

#[derive(Clone)]
struct AppState {
    bridge: BridgeHandle,
    surface: PreviewSurface,
    locations: LocationStore,
    router: FocusRouter,
    status: watch::Receiver<BridgeStatus>,
    shell: String,
}

/// Partial location write. An omitted field keeps its current value; an
/// explicit `"start": null` clears the origin.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LocationRequest {
    #[serde(default, deserialize_with = "present")]
    start: Option<Option<String>>,
    #[serde(default)]
    end: Option<String>,
}

impl LocationRequest {
    fn apply(self, current: LocationState) -> LocationState {
        LocationState {
            start: self.start.unwrap_or(current.start),
            end: self.end.unwrap_or(current.end),
        }
    }
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FocusRequestBody {
    id: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct AcceptedBody {
    accepted: bool,
}

pub async fn run_preview_server(
    settings: &MapSettings,
    options: PreviewOptions,
    bind: &str,
) -> Result<()> {
    let catalog = PoiCatalog::load_or_default(settings.poi_file.as_deref())
        .context("failed to load point-of-interest catalog")?;
    let router = FocusRouter::global().clone();
    router.set_catalog(catalog);

    let mut initial = LocationState::new(settings.default_destination.clone());
    initial.start = options.start.clone();
    let locations = LocationStore::new(initial);

    let surface = PreviewSurface::default();
    let bridge = MapBridge::mount(
        options.props,
        BridgeOptions::from_settings(settings),
        &locations,
        options.viewport,
        surface.clone(),
        &router,
    )
    .context("failed to mount map bridge on preview surface")?;

    let size = bridge.size();
    let (status_tx, status_rx) = watch::channel(BridgeStatus::from_bridge(&bridge));
    let (bridge_handle, events) = spawn_bridge_worker(&Handle::current(), bridge);
    let _sink = tokio::spawn(run_event_sink(events, status_tx));

    let state = AppState {
        bridge: bridge_handle.clone(),
        surface,
        locations,
        router,
        status: status_rx,
        shell: shell::render_shell(options.props.show_toggle_controls, size.width, size.height),
    };
    let app = Router::new()
        .route("/", get(handle_shell))
        .route("/health", get(handle_health))
        .route("/map", get(handle_map))
        .route("/surface", get(handle_surface))
        .route("/status", get(handle_status))
        .route("/pois", get(handle_pois))
        .route("/toggles/heatmap", post(handle_toggle_heatmap))
        .route("/toggles/live-conditions", post(handle_toggle_live_conditions))
        .route("/location", post(handle_location))
        .route("/focus", post(handle_focus))
        .route("/embedded", post(handle_embedded))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind preview server to `{bind}`"))?;
    let local_addr = listener.local_addr().ok();

    info!(
        refresh_policy = %settings.refresh_policy,
        control_sync = %settings.control_sync,
        width = size.width,
        height = size.height,
        requested_bind = %bind,
        bound_addr = local_addr.map(|addr| addr.to_string()),
        "starting preview server"
    );

    let served = axum::serve(listener, app)
        .await
        .context("preview server exited with an error");
    bridge_handle.shutdown();
    served
}

async fn run_event_sink(
    mut events: UnboundedReceiver<BridgeEvent>,
    status_tx: watch::Sender<BridgeStatus>,
) {
    while let Some(event) = events.recv().await {
        match &event {
            BridgeEvent::RuntimeFaulted { message } => {
                warn!(error = %message, "map runtime faulted in preview");
            }
            BridgeEvent::SurfaceFailed { error } => {
                warn!(error = %error, "preview surface failed");
            }
            other => debug!(event = ?other, "bridge event"),
        }
        status_tx.send_if_modified(|status| status.apply(&event));
    }
    debug!("bridge event stream closed");
}

async fn handle_shell(State(state): State<AppState>) -> Html<String> {
    Html(state.shell)
}

async fn handle_health() -> Json<HealthBody> {
    Json(HealthBody { status: "ok" })
}

async fn handle_map(State(state): State<AppState>) -> Response {
    match state.surface.html() {
        Some(html) => ([(header::CACHE_CONTROL, "no-store")], Html(html)).into_response(),
        None => error_response(StatusCode::SERVICE_UNAVAILABLE, "no map document loaded"),
    }
}

async fn handle_surface(State(state): State<AppState>) -> Response {
    Json(state.surface.drain()).into_response()
}

async fn handle_status(State(state): State<AppState>) -> Json<BridgeStatus> {
    Json(state.status.borrow().clone())
}

async fn handle_pois(State(state): State<AppState>) -> Response {
    Json(state.router.catalog().points().to_vec()).into_response()
}

async fn handle_toggle_heatmap(State(state): State<AppState>) -> Response {
    toggle_layer(state, Layer::Heatmap).await
}

async fn handle_toggle_live_conditions(State(state): State<AppState>) -> Response {
    toggle_layer(state, Layer::LiveConditions).await
}

async fn toggle_layer(state: AppState, layer: Layer) -> Response {
    let mut status = state.status.clone();
    let before = status.borrow_and_update().clone();

    let sent = match layer {
        Layer::Heatmap => state.bridge.toggle_heatmap(),
        Layer::LiveConditions => state.bridge.toggle_live_conditions(),
    };
    if !sent {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "map bridge is not running");
    }

    let settled = matches!(
        tokio::time::timeout(
            STATUS_WAIT,
            status.wait_for(|current| toggle_settled(&before, current)),
        )
        .await,
        Ok(Ok(_))
    );
    if !settled {
        debug!(layer = %layer, "toggle not reflected in status before timeout");
    }
    let body = status.borrow().clone();
    Json(body).into_response()
}

/// A toggle has landed once a new document replaced the old one, the flags
/// moved without a rebuild, or the surface reported a failure.
fn toggle_settled(before: &BridgeStatus, current: &BridgeStatus) -> bool {
    current.revision > before.revision
        || current.toggles != before.toggles
        || current.last_surface_error != before.last_surface_error
}

async fn handle_location(
    State(state): State<AppState>,
    Json(req): Json<LocationRequest>,
) -> Response {
    let next = req.apply(state.locations.snapshot());
    debug!(start = next.start.as_deref(), end = %next.end, "location written from preview");
    state.locations.replace(next);
    (StatusCode::ACCEPTED, Json(state.locations.snapshot())).into_response()
}

async fn handle_focus(
    State(state): State<AppState>,
    Json(req): Json<FocusRequestBody>,
) -> Response {
    let outcome = state.router.focus(&req.id);
    info!(point_of_interest = %req.id, ?outcome, "focus requested from preview");
    Json(outcome).into_response()
}

async fn handle_embedded(
    State(state): State<AppState>,
    Json(message): Json<EmbeddedMessage>,
) -> Response {
    if !state.bridge.embedded(message) {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "map bridge is not running");
    }
    (StatusCode::ACCEPTED, Json(AcceptedBody { accepted: true })).into_response()
}

fn error_response(status: StatusCode, error: &str) -> Response {
    warn!(status = status.as_u16(), error, "preview request failed");
    let body = ErrorBody {
        error: error.to_owned(),
    };
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use crate::bridge::RuntimeStatus;
    use crate::bridge::events::{BridgeEvent, RebuildReason};
    use crate::document::DocumentId;
    use crate::toggles::{Layer, ToggleState};

    use crate::location::LocationState;

    use super::{BridgeStatus, LocationRequest, toggle_settled};

    fn status() -> BridgeStatus {
        BridgeStatus {
            revision: 1,
            document_id: Some("aa".to_owned()),
            toggles: ToggleState::default(),
            runtime: RuntimeStatus::Pending,
            last_route_status: None,
            fault: None,
            last_surface_error: None,
        }
    }

    #[test]
    fn replacement_resets_runtime_view() {
        let mut status = status();
        assert!(status.apply(&BridgeEvent::RuntimeFaulted {
            message: "google is not defined".to_owned()
        }));
        assert_eq!(status.runtime, RuntimeStatus::Faulted);

        let document_id = DocumentId::random();
        assert!(status.apply(&BridgeEvent::DocumentReplaced {
            revision: 2,
            document_id: document_id.clone(),
            reason: RebuildReason::Toggle(Layer::Heatmap),
            toggles: ToggleState::new(false, false),
        }));
        assert_eq!(status.revision, 2);
        assert_eq!(status.document_id, Some(document_id.to_string()));
        assert_eq!(status.runtime, RuntimeStatus::Pending);
        assert_eq!(status.fault, None);
    }

    #[test]
    fn posted_visibility_updates_toggles_without_revision() {
        let mut status = status();
        assert!(status.apply(&BridgeEvent::LayerVisibilityPosted {
            layer: Layer::LiveConditions,
            visible: true,
        }));
        assert_eq!(status.toggles, ToggleState::new(true, true));
        assert_eq!(status.revision, 1);
    }

    #[test]
    fn focus_forwarding_leaves_status_untouched() {
        let mut status = status();
        assert!(!status.apply(&BridgeEvent::FocusForwarded {
            point_of_interest: "ram-ghat".to_owned()
        }));
        assert!(status.apply(&BridgeEvent::RuntimeReady));
        assert!(!status.apply(&BridgeEvent::RuntimeReady));
    }

    #[test]
    fn toggle_waits_past_unrelated_runtime_reports() {
        let before = status();
        let mut current = before.clone();
        current.apply(&BridgeEvent::RuntimeReady);
        current.apply(&BridgeEvent::RouteReported {
            status: "ZERO_RESULTS".to_owned(),
        });
        assert!(!toggle_settled(&before, &current));

        current.apply(&BridgeEvent::DocumentReplaced {
            revision: 2,
            document_id: DocumentId::random(),
            reason: RebuildReason::Toggle(Layer::Heatmap),
            toggles: ToggleState::new(false, false),
        });
        assert!(toggle_settled(&before, &current));

        let mut posted = before.clone();
        posted.apply(&BridgeEvent::LayerVisibilityPosted {
            layer: Layer::Heatmap,
            visible: false,
        });
        assert!(toggle_settled(&before, &posted));
    }

    #[test]
    fn location_writes_keep_omitted_fields() {
        let current = LocationState::new("Ujjain").with_start("Mumbai");

        let end_only: LocationRequest =
            serde_json::from_str(r#"{"end":"Omkareshwar"}"#).expect("body should decode");
        assert_eq!(
            end_only.apply(current.clone()),
            LocationState::new("Omkareshwar").with_start("Mumbai")
        );

        let cleared: LocationRequest =
            serde_json::from_str(r#"{"start":null}"#).expect("body should decode");
        assert_eq!(cleared.apply(current.clone()), LocationState::new("Ujjain"));

        let both: LocationRequest = serde_json::from_str(r#"{"start":"Indore","end":"Dewas"}"#)
            .expect("body should decode");
        assert_eq!(
            both.apply(current),
            LocationState::new("Dewas").with_start("Indore")
        );
    }
}
