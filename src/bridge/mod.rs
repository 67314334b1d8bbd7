//! The mounted map bridge.
//!
//! A [`MapBridge`] owns one render host and turns host-side changes (toggle
//! flips, location edits, resizes) into freshly generated documents. Reports
//! coming back from the runtime are filtered by document id so that an
//! abandoned runtime can never move host state.

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::{ControlSync, MapSettings, RefreshPolicy};
use crate::document::{DocumentInputs, GeneratorOptions, generate_document};
use crate::focus::{FocusRequest, FocusRouter, FocusSubscription};
use crate::host::sizing::{ContainerSize, Viewport, container_size};
use crate::host::{RenderHost, RenderSurface, SurfaceError};
use crate::location::{LocationState, LocationStore};
use crate::toggles::{Layer, ToggleChange, ToggleController, ToggleState};

pub mod events;
pub mod worker;

use self::events::{BridgeEvent, EmbeddedMessage, EmbeddedReport, HostMessage, RebuildReason};

/// Caller-facing props of the map widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeProps {
    pub height: Option<u32>,
    pub show_toggle_controls: bool,
    pub default_heatmap: bool,
    pub default_traffic: bool,
}

impl Default for BridgeProps {
    fn default() -> Self {
        let toggles = ToggleState::default();
        Self {
            height: None,
            show_toggle_controls: true,
            default_heatmap: toggles.heatmap_enabled,
            default_traffic: toggles.traffic_enabled,
        }
    }
}

impl BridgeProps {
    pub fn initial_toggles(&self) -> ToggleState {
        ToggleState::new(self.default_heatmap, self.default_traffic)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BridgeOptions {
    pub generator: GeneratorOptions,
    pub refresh_policy: RefreshPolicy,
    pub control_sync: ControlSync,
}

impl BridgeOptions {
    pub fn from_settings(settings: &MapSettings) -> Self {
        Self {
            generator: GeneratorOptions::from_settings(settings),
            refresh_policy: settings.refresh_policy,
            control_sync: settings.control_sync,
        }
    }
}

/// What the host knows about the runtime inside the current document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeStatus {
    Pending,
    Ready,
    Faulted,
}

/// Something the bridge should react to outside of direct method calls.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeSignal {
    Focus(FocusRequest),
    LocationChanged,
}

pub struct MapBridge<S> {
    props: BridgeProps,
    options: BridgeOptions,
    toggles: ToggleController,
    location_rx: watch::Receiver<LocationState>,
    location: LocationState,
    location_open: bool,
    size: ContainerSize,
    host: RenderHost<S>,
    focus: FocusSubscription,
    focus_open: bool,
    runtime: RuntimeStatus,
    last_route_status: Option<String>,
}

impl<S: RenderSurface> MapBridge<S> {
    /// Sizes the container, installs the focus subscription and loads the
    /// first document.
    pub fn mount(
        props: BridgeProps,
        options: BridgeOptions,
        locations: &LocationStore,
        viewport: Viewport,
        surface: S,
        router: &FocusRouter,
    ) -> Result<Self, SurfaceError> {
        let mut location_rx = locations.subscribe();
        let location = location_rx.borrow_and_update().clone();
        let size = container_size(viewport, props.height);

        let mut bridge = Self {
            props,
            options,
            toggles: ToggleController::new(props.initial_toggles()),
            location_rx,
            location,
            location_open: true,
            size,
            host: RenderHost::new(surface),
            focus: router.mount(),
            focus_open: true,
            runtime: RuntimeStatus::Pending,
            last_route_status: None,
        };

        info!(
            width = size.width,
            height = size.height,
            heatmap = bridge.toggles.state().heatmap_enabled,
            traffic = bridge.toggles.state().traffic_enabled,
            refresh_policy = %bridge.options.refresh_policy,
            control_sync = %bridge.options.control_sync,
            focus_mount = bridge.focus.token(),
            "mounting map bridge"
        );
        bridge.rebuild(RebuildReason::Mount)?;
        Ok(bridge)
    }

    pub fn props(&self) -> &BridgeProps {
        &self.props
    }

    pub fn toggles(&self) -> ToggleState {
        self.toggles.state()
    }

    pub fn location(&self) -> &LocationState {
        &self.location
    }

    pub fn size(&self) -> ContainerSize {
        self.size
    }

    pub fn host(&self) -> &RenderHost<S> {
        &self.host
    }

    pub fn runtime_status(&self) -> RuntimeStatus {
        self.runtime
    }

    pub fn last_route_status(&self) -> Option<&str> {
        self.last_route_status.as_deref()
    }

    pub fn toggle_heatmap(&mut self) -> Result<BridgeEvent, SurfaceError> {
        let previous = self.toggles.clone();
        let change = self.toggles.toggle_heatmap();
        self.apply_toggle(change, previous)
    }

    pub fn toggle_live_conditions(&mut self) -> Result<BridgeEvent, SurfaceError> {
        let previous = self.toggles.clone();
        let change = self.toggles.toggle_live_conditions();
        self.apply_toggle(change, previous)
    }

    /// Rebuilds if the location store moved since the last document.
    pub fn sync_location(&mut self) -> Result<Option<BridgeEvent>, SurfaceError> {
        let latest = self.location_rx.borrow_and_update().clone();
        if latest == self.location {
            return Ok(None);
        }

        debug!(
            start = latest.start.as_deref(),
            end = %latest.end,
            "location state changed"
        );
        self.location = latest;
        self.rebuild(RebuildReason::LocationChanged).map(Some)
    }

    /// Re-runs container sizing. Sizing is otherwise fixed at mount.
    pub fn resize(&mut self, viewport: Viewport) -> Result<Option<BridgeEvent>, SurfaceError> {
        let size = container_size(viewport, self.props.height);
        if size == self.size {
            return Ok(None);
        }
        self.size = size;
        self.rebuild(RebuildReason::Resize).map(Some)
    }

    pub fn handle_embedded(&mut self, message: EmbeddedMessage) -> Option<BridgeEvent> {
        if !self.host.is_current(&message.document_id) {
            debug!(
                document_id = %message.document_id,
                current = self.host.current_document().map(|id| id.to_string()),
                "ignoring report from replaced document"
            );
            return None;
        }

        match message.report {
            EmbeddedReport::Ready => {
                self.runtime = RuntimeStatus::Ready;
                debug!(document_id = %message.document_id, "embedded runtime ready");
                Some(BridgeEvent::RuntimeReady)
            }
            EmbeddedReport::LayerToggled { layer, visible } => {
                self.apply_embedded_toggle(layer, visible)
            }
            EmbeddedReport::Route { status, state } => {
                debug!(status = %status, state = state.as_deref(), "directions lookup finished");
                self.last_route_status = Some(status.clone());
                Some(BridgeEvent::RouteReported { status })
            }
            EmbeddedReport::Fault { message } => {
                warn!(error = %message, "embedded runtime faulted");
                self.runtime = RuntimeStatus::Faulted;
                self.host.surface_mut().show_fallback(&message);
                Some(BridgeEvent::RuntimeFaulted { message })
            }
        }
    }

    /// Forwards a focus request to the loaded runtime.
    pub fn apply_focus(&mut self, request: FocusRequest) -> Result<BridgeEvent, SurfaceError> {
        self.host.post(&HostMessage::focus(&request.point))?;
        debug!(point_of_interest = %request.point.id, "focus forwarded to runtime");
        Ok(BridgeEvent::FocusForwarded {
            point_of_interest: request.point.id,
        })
    }

    /// Applies every focus request that is already queued.
    pub fn drain_focus_requests(&mut self) -> Vec<Result<BridgeEvent, SurfaceError>> {
        let mut results = Vec::new();
        while let Some(request) = self.focus.try_next() {
            results.push(self.apply_focus(request));
        }
        results
    }

    /// Waits for the next focus request or location change.
    pub async fn next_signal(&mut self) -> BridgeSignal {
        loop {
            tokio::select! {
                request = self.focus.next(), if self.focus_open => match request {
                    Some(request) => return BridgeSignal::Focus(request),
                    None => {
                        debug!("focus subscription closed");
                        self.focus_open = false;
                    }
                },
                changed = self.location_rx.changed(), if self.location_open => match changed {
                    Ok(()) => return BridgeSignal::LocationChanged,
                    Err(_) => {
                        debug!("location store dropped");
                        self.location_open = false;
                    }
                },
                else => std::future::pending::<()>().await,
            }
        }
    }

    pub fn handle_signal(&mut self, signal: BridgeSignal) -> Result<Option<BridgeEvent>, SurfaceError> {
        match signal {
            BridgeSignal::Focus(request) => self.apply_focus(request).map(Some),
            BridgeSignal::LocationChanged => self.sync_location(),
        }
    }

    /// Tears down the surface and releases the focus slot.
    pub fn unmount(mut self) -> S {
        self.host.unmount();
        info!(focus_mount = self.focus.token(), "map bridge unmounted");
        self.host.into_surface()
    }

    /// Applies a flip already recorded in the controller. The controller is
    /// restored to `previous` when the surface keeps its old document.
    fn apply_toggle(
        &mut self,
        change: ToggleChange,
        previous: ToggleController,
    ) -> Result<BridgeEvent, SurfaceError> {
        if self.options.refresh_policy == RefreshPolicy::Incremental
            && self.runtime == RuntimeStatus::Ready
        {
            let visible = change.state.is_visible(change.layer);
            let message = HostMessage::SetLayerVisibility {
                layer: change.layer,
                visible,
            };
            match self.host.post(&message) {
                Ok(()) => {
                    debug!(layer = %change.layer, visible, "layer visibility posted");
                    return Ok(BridgeEvent::LayerVisibilityPosted {
                        layer: change.layer,
                        visible,
                    });
                }
                Err(error) => {
                    warn!(
                        layer = %change.layer,
                        error = %error,
                        "incremental update failed; rebuilding document"
                    );
                }
            }
        }

        match self.rebuild(RebuildReason::Toggle(change.layer)) {
            Ok(event) => Ok(event),
            Err(error) => {
                warn!(
                    layer = %change.layer,
                    error = %error,
                    "toggle rolled back; surface kept the previous document"
                );
                self.toggles = previous;
                Err(error)
            }
        }
    }

    fn apply_embedded_toggle(&mut self, layer: Layer, visible: bool) -> Option<BridgeEvent> {
        match self.options.control_sync {
            ControlSync::Detached => {
                debug!(
                    layer = %layer,
                    visible,
                    host_visible = self.toggles.state().is_visible(layer),
                    "in-document control changed layer; host flags left as is"
                );
                None
            }
            ControlSync::Reconciled => {
                if !self.toggles.reconcile(layer, visible) {
                    return None;
                }
                debug!(layer = %layer, visible, "host flags reconciled from runtime");
                Some(BridgeEvent::TogglesReconciled {
                    toggles: self.toggles.state(),
                })
            }
        }
    }

    fn rebuild(&mut self, reason: RebuildReason) -> Result<BridgeEvent, SurfaceError> {
        let toggles = self.toggles.state();
        let document = generate_document(
            &DocumentInputs {
                toggles,
                location: &self.location,
                size: self.size,
            },
            &self.options.generator,
        );

        let revision = self.host.replace(&document)?;
        self.runtime = RuntimeStatus::Pending;
        info!(
            revision,
            reason = reason.label(),
            document_id = %document.id(),
            points = document.points().len(),
            route_requested = document.route().is_some(),
            heatmap = toggles.heatmap_enabled,
            traffic = toggles.traffic_enabled,
            "map document rebuilt"
        );

        Ok(BridgeEvent::DocumentReplaced {
            revision,
            document_id: document.id().clone(),
            reason,
            toggles,
        })
    }
}

#[cfg(test)]
mod tests;
