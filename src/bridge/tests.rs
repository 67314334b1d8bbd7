use std::time::Duration;

use tokio::time::timeout;

use crate::config::{ControlSync, RefreshPolicy};
use crate::document::GeneratorOptions;
use crate::document::points::PointSource;
use crate::focus::{FocusOutcome, FocusRouter};
use crate::host::{MemorySurface, SurfaceError};
use crate::host::sizing::{MIN_HEIGHT, Viewport};
use crate::location::{LocationState, LocationStore};
use crate::poi::PoiCatalog;
use crate::toggles::{Layer, ToggleState};

use super::events::{BridgeEvent, EmbeddedMessage, EmbeddedReport, HostMessage, RebuildReason};
use super::{BridgeOptions, BridgeProps, BridgeSignal, MapBridge, RuntimeStatus};

const VIEWPORT: Viewport = Viewport {
    width: 400,
    height: 800,
};

fn options(refresh_policy: RefreshPolicy, control_sync: ControlSync) -> BridgeOptions {
    BridgeOptions {
        generator: GeneratorOptions {
            api_key: None,
            point_count: 40,
            point_source: PointSource::Fresh,
        },
        refresh_policy,
        control_sync,
    }
}

fn mount_with(
    props: BridgeProps,
    options: BridgeOptions,
    store: &LocationStore,
    router: &FocusRouter,
) -> MapBridge<MemorySurface> {
    MapBridge::mount(
        props,
        options,
        store,
        VIEWPORT,
        MemorySurface::default(),
        router,
    )
    .expect("mount should load the first document")
}

fn mount_default(store: &LocationStore, router: &FocusRouter) -> MapBridge<MemorySurface> {
    mount_with(
        BridgeProps::default(),
        options(RefreshPolicy::Rebuild, ControlSync::Detached),
        store,
        router,
    )
}

fn current_html(bridge: &MapBridge<MemorySurface>) -> String {
    bridge
        .host()
        .surface()
        .current()
        .map(|loaded| loaded.html.clone())
        .expect("a document should be loaded")
}

fn report(bridge: &MapBridge<MemorySurface>, report: EmbeddedReport) -> EmbeddedMessage {
    let id = bridge
        .host()
        .current_document()
        .expect("a document should be loaded");
    EmbeddedMessage::new(id, report)
}

fn store() -> LocationStore {
    LocationStore::new(LocationState::new("Ujjain"))
}

#[test]
fn mount_clamps_height_and_loads_one_document() {
    let store = store();
    let router = FocusRouter::default();
    let bridge = mount_with(
        BridgeProps {
            height: Some(40),
            show_toggle_controls: false,
            default_heatmap: false,
            default_traffic: true,
        },
        options(RefreshPolicy::Rebuild, ControlSync::Detached),
        &store,
        &router,
    );

    assert_eq!(bridge.size().height, MIN_HEIGHT);
    assert_eq!(bridge.host().surface().loads().len(), 1);
    assert_eq!(bridge.toggles(), ToggleState::new(false, true));
    assert_eq!(bridge.runtime_status(), RuntimeStatus::Pending);
    assert!(!bridge.props().show_toggle_controls);

    let html = current_html(&bridge);
    assert!(html.contains("var HEATMAP_VISIBLE = false;"));
    assert!(html.contains("var LIVE_CONDITIONS_VISIBLE = true;"));
}

#[test]
fn two_rapid_flips_rebuild_twice_and_end_on_final_flags() {
    let store = store();
    let router = FocusRouter::default();
    let mut bridge = mount_default(&store, &router);

    let first = bridge.toggle_heatmap().expect("heatmap flip should rebuild");
    let second = bridge
        .toggle_live_conditions()
        .expect("live flip should rebuild");

    assert!(matches!(
        first,
        BridgeEvent::DocumentReplaced {
            revision: 2,
            reason: RebuildReason::Toggle(Layer::Heatmap),
            ..
        }
    ));
    assert!(matches!(
        second,
        BridgeEvent::DocumentReplaced {
            revision: 3,
            reason: RebuildReason::Toggle(Layer::LiveConditions),
            toggles,
            ..
        } if toggles == ToggleState::new(false, true)
    ));

    let loads = bridge.host().surface().loads();
    assert_eq!(loads.len(), 3, "mount plus exactly two rebuilds");
    assert_ne!(loads[1].id, loads[2].id);

    let html = current_html(&bridge);
    assert!(html.contains("var HEATMAP_VISIBLE = false;"));
    assert!(html.contains("var LIVE_CONDITIONS_VISIBLE = true;"));
}

#[test]
fn failed_load_rolls_back_the_toggle() {
    let store = store();
    let router = FocusRouter::default();
    let mut bridge = mount_default(&store, &router);

    bridge.host.surface_mut().fail_next_load("webview crashed");
    let error = bridge
        .toggle_heatmap()
        .expect_err("surface should reject the rebuilt document");
    assert!(matches!(error, SurfaceError::LoadRejected { .. }));

    assert_eq!(bridge.toggles(), ToggleState::new(true, false));
    assert_eq!(bridge.host().revision(), 1);
    assert_eq!(bridge.host().surface().loads().len(), 1);
    assert!(current_html(&bridge).contains("var HEATMAP_VISIBLE = true;"));

    let event = bridge.toggle_heatmap().expect("next flip should rebuild");
    assert!(matches!(
        event,
        BridgeEvent::DocumentReplaced { revision: 2, toggles, .. }
            if toggles == ToggleState::new(false, false)
    ));
    assert!(current_html(&bridge).contains("var HEATMAP_VISIBLE = false;"));
}

#[test]
fn origin_in_store_yields_single_directions_request() {
    let store = LocationStore::new(LocationState::new("Ujjain").with_start("Mumbai"));
    let router = FocusRouter::default();
    let bridge = mount_default(&store, &router);

    let html = current_html(&bridge);
    assert_eq!(html.matches("directionsService.route(").count(), 1);
    assert!(html.contains("var origin = \"Mumbai\";"));
    assert!(html.contains("var destination = \"Ujjain\";"));
}

#[test]
fn location_changes_rebuild_only_when_state_moved() {
    let store = store();
    let router = FocusRouter::default();
    let mut bridge = mount_default(&store, &router);

    assert_eq!(bridge.sync_location(), Ok(None));

    store.set_start(Some("Indore".to_owned()));
    let event = bridge
        .sync_location()
        .expect("rebuild should succeed")
        .expect("location change should rebuild");
    assert!(matches!(
        event,
        BridgeEvent::DocumentReplaced {
            reason: RebuildReason::LocationChanged,
            ..
        }
    ));
    assert_eq!(bridge.location().start.as_deref(), Some("Indore"));
    assert!(current_html(&bridge).contains("var origin = \"Indore\";"));

    store.set_start(None);
    bridge.sync_location().expect("rebuild should succeed");
    assert_eq!(
        current_html(&bridge)
            .matches("directionsService.route(")
            .count(),
        0
    );
}

#[test]
fn unknown_focus_id_changes_nothing() {
    let store = store();
    let router = FocusRouter::new(PoiCatalog::default());
    let mut bridge = mount_default(&store, &router);

    assert!(matches!(
        router.focus("unknown-id"),
        FocusOutcome::UnknownPointOfInterest { .. }
    ));
    assert!(bridge.drain_focus_requests().is_empty());
    assert!(bridge.host().surface().posted().is_empty());
    assert_eq!(bridge.host().surface().loads().len(), 1);
}

#[test]
fn known_focus_id_is_posted_to_runtime() {
    let store = store();
    let router = FocusRouter::new(PoiCatalog::default());
    let mut bridge = mount_default(&store, &router);

    assert!(matches!(
        router.focus("ram-ghat"),
        FocusOutcome::Delivered { .. }
    ));
    let results = bridge.drain_focus_requests();
    assert_eq!(
        results,
        vec![Ok(BridgeEvent::FocusForwarded {
            point_of_interest: "ram-ghat".to_owned()
        })]
    );
    assert!(matches!(
        bridge.host().surface().posted(),
        [HostMessage::Focus { id, .. }] if id == "ram-ghat"
    ));
}

#[test]
fn reports_from_replaced_documents_are_ignored() {
    let store = store();
    let router = FocusRouter::default();
    let mut bridge = mount_default(&store, &router);
    let stale = report(
        &bridge,
        EmbeddedReport::Fault {
            message: "late".to_owned(),
        },
    );

    bridge.toggle_heatmap().expect("flip should rebuild");
    assert_eq!(bridge.handle_embedded(stale), None);
    assert_eq!(bridge.runtime_status(), RuntimeStatus::Pending);
    assert!(bridge.host().surface().fallbacks().is_empty());
}

#[test]
fn detached_controls_leave_host_flags_alone() {
    let store = store();
    let router = FocusRouter::default();
    let mut bridge = mount_default(&store, &router);

    let message = report(
        &bridge,
        EmbeddedReport::LayerToggled {
            layer: Layer::Heatmap,
            visible: false,
        },
    );
    assert_eq!(bridge.handle_embedded(message), None);
    assert_eq!(bridge.toggles(), ToggleState::new(true, false));
    assert_eq!(bridge.host().surface().loads().len(), 1);
}

#[test]
fn reconciled_controls_update_host_flags_without_rebuild() {
    let store = store();
    let router = FocusRouter::default();
    let mut bridge = mount_with(
        BridgeProps::default(),
        options(RefreshPolicy::Rebuild, ControlSync::Reconciled),
        &store,
        &router,
    );

    let message = report(
        &bridge,
        EmbeddedReport::LayerToggled {
            layer: Layer::LiveConditions,
            visible: true,
        },
    );
    assert_eq!(
        bridge.handle_embedded(message),
        Some(BridgeEvent::TogglesReconciled {
            toggles: ToggleState::new(true, true)
        })
    );
    assert_eq!(bridge.host().surface().loads().len(), 1);

    // A later host flip starts from the reconciled state.
    bridge
        .toggle_live_conditions()
        .expect("flip should rebuild");
    assert_eq!(bridge.toggles(), ToggleState::new(true, false));
}

#[test]
fn incremental_policy_posts_once_runtime_is_ready() {
    let store = store();
    let router = FocusRouter::default();
    let mut bridge = mount_with(
        BridgeProps::default(),
        options(RefreshPolicy::Incremental, ControlSync::Detached),
        &store,
        &router,
    );

    // No ready report yet: fall back to a rebuild.
    let event = bridge.toggle_heatmap().expect("flip should rebuild");
    assert!(matches!(event, BridgeEvent::DocumentReplaced { .. }));
    assert_eq!(bridge.host().surface().loads().len(), 2);

    let ready = report(&bridge, EmbeddedReport::Ready);
    assert_eq!(bridge.handle_embedded(ready), Some(BridgeEvent::RuntimeReady));
    assert_eq!(bridge.runtime_status(), RuntimeStatus::Ready);

    let event = bridge
        .toggle_live_conditions()
        .expect("flip should be posted");
    assert_eq!(
        event,
        BridgeEvent::LayerVisibilityPosted {
            layer: Layer::LiveConditions,
            visible: true
        }
    );
    assert_eq!(bridge.host().surface().loads().len(), 2);
    assert_eq!(
        bridge.host().surface().posted(),
        [HostMessage::SetLayerVisibility {
            layer: Layer::LiveConditions,
            visible: true
        }]
    );
}

#[test]
fn fault_shows_fallback_and_rebuild_resets_runtime() {
    let store = store();
    let router = FocusRouter::default();
    let mut bridge = mount_default(&store, &router);

    let fault = report(
        &bridge,
        EmbeddedReport::Fault {
            message: "google is not defined".to_owned(),
        },
    );
    assert_eq!(
        bridge.handle_embedded(fault),
        Some(BridgeEvent::RuntimeFaulted {
            message: "google is not defined".to_owned()
        })
    );
    assert_eq!(bridge.runtime_status(), RuntimeStatus::Faulted);
    assert_eq!(
        bridge.host().surface().fallbacks(),
        ["google is not defined".to_owned()]
    );

    bridge.toggle_heatmap().expect("flip should rebuild");
    assert_eq!(bridge.runtime_status(), RuntimeStatus::Pending);
}

#[test]
fn route_reports_are_recorded_but_change_nothing_else() {
    let store = LocationStore::new(LocationState::new("Ujjain").with_start("Nowhere"));
    let router = FocusRouter::default();
    let mut bridge = mount_default(&store, &router);

    let route = report(
        &bridge,
        EmbeddedReport::Route {
            status: "NOT_FOUND".to_owned(),
            state: Some("route-absent".to_owned()),
        },
    );
    assert_eq!(
        bridge.handle_embedded(route),
        Some(BridgeEvent::RouteReported {
            status: "NOT_FOUND".to_owned()
        })
    );
    assert_eq!(bridge.last_route_status(), Some("NOT_FOUND"));
    assert_eq!(bridge.host().surface().loads().len(), 1);
}

#[test]
fn resize_rebuilds_only_on_size_change() {
    let store = store();
    let router = FocusRouter::default();
    let mut bridge = mount_default(&store, &router);

    assert_eq!(bridge.resize(VIEWPORT), Ok(None));
    let event = bridge
        .resize(Viewport::new(1_000, 1_000))
        .expect("rebuild should succeed")
        .expect("new size should rebuild");
    assert!(matches!(
        event,
        BridgeEvent::DocumentReplaced {
            reason: RebuildReason::Resize,
            ..
        }
    ));
    assert_eq!(bridge.size().width, 920);
    assert!(current_html(&bridge).contains("#map { width: 920px; height: 400px; }"));
}

#[test]
fn unmount_releases_focus_slot() {
    let store = store();
    let router = FocusRouter::default();
    let bridge = mount_default(&store, &router);
    assert!(router.is_mounted());

    let surface = bridge.unmount();
    assert!(surface.current().is_none());
    assert!(!router.is_mounted());
    assert_eq!(router.focus("ram-ghat"), FocusOutcome::NotMounted);
}

#[tokio::test]
async fn next_signal_wakes_on_location_and_focus() {
    let store = store();
    let router = FocusRouter::default();
    let mut bridge = mount_default(&store, &router);

    store.set_end("Omkareshwar");
    let signal = timeout(Duration::from_secs(1), bridge.next_signal())
        .await
        .expect("location signal should arrive");
    assert_eq!(signal, BridgeSignal::LocationChanged);
    bridge
        .handle_signal(signal)
        .expect("rebuild should succeed");
    assert_eq!(bridge.location().end, "Omkareshwar");

    router.focus("harsiddhi");
    let signal = timeout(Duration::from_secs(1), bridge.next_signal())
        .await
        .expect("focus signal should arrive");
    assert!(matches!(
        &signal,
        BridgeSignal::Focus(request) if request.point.id == "harsiddhi"
    ));
}
