//! Runtime script carried inside every generated document.
//!
//! The script runs once per load inside the isolated surface. It owns the
//! map, the synthetic layers and the optional route; the host only ever sees
//! the messages it chooses to `report`.

use super::points::GeoPoint;
use super::{DocumentId, RouteRequest, js_literal};
use crate::toggles::ToggleState;

pub const REFERENCE_CENTER: (f64, f64) = (23.1800, 75.7700);
pub const REFERENCE_ZOOM: u8 = 13;
pub const HEATMAP_RADIUS_PX: u32 = 24;

pub(super) struct RuntimeParams<'a> {
    pub id: &'a DocumentId,
    pub toggles: ToggleState,
    pub points: &'a [GeoPoint],
    pub route: Option<&'a RouteRequest>,
}

pub(super) fn render_runtime(params: &RuntimeParams<'_>) -> String {
    // User-controlled text (the route endpoints) goes in last so no later
    // placeholder substitution can run over it.
    RUNTIME_TEMPLATE
        .replace("__DOCUMENT_ID__", &js_literal(params.id.as_str()))
        .replace(
            "__CENTER__",
            &format!(
                "{{ lat: {:.4}, lng: {:.4} }}",
                REFERENCE_CENTER.0, REFERENCE_CENTER.1
            ),
        )
        .replace("__ZOOM__", &REFERENCE_ZOOM.to_string())
        .replace("__HEATMAP_RADIUS__", &HEATMAP_RADIUS_PX.to_string())
        .replace(
            "__HEATMAP_VISIBLE__",
            bool_literal(params.toggles.heatmap_enabled),
        )
        .replace(
            "__LIVE_CONDITIONS_VISIBLE__",
            bool_literal(params.toggles.traffic_enabled),
        )
        .replace("__POINTS__", &points_literal(params.points))
        .replace("__ROUTE__", &route_block(params.route))
}

pub(super) fn points_literal(points: &[GeoPoint]) -> String {
    js_literal(points)
}

fn bool_literal(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

fn route_block(route: Option<&RouteRequest>) -> String {
    let Some(route) = route else {
        return "runtime.route = 'no-route-requested';".to_owned();
    };

    let origin = js_literal(&route.origin);
    let destination = js_literal(&route.destination);
    format!(
        r#"var origin = {origin};
      var destination = {destination};
      runtime.route = 'route-pending';
      var directionsService = new google.maps.DirectionsService();
      var directionsRenderer = new google.maps.DirectionsRenderer({{ preserveViewport: true }});
      directionsService.route(
        {{ origin: origin, destination: destination, travelMode: google.maps.TravelMode.DRIVING }},
        function (result, status) {{
          if (status === 'OK' && result && result.routes && result.routes.length > 0) {{
            directionsRenderer.setMap(runtime.map);
            directionsRenderer.setDirections(result);
            runtime.map.fitBounds(result.routes[0].bounds);
            runtime.route = 'route-rendered';
          }} else {{
            runtime.route = 'route-absent';
          }}
          report({{ type: 'route', status: String(status), state: runtime.route }});
        }}
      );"#
    )
}

const RUNTIME_TEMPLATE: &str = r#"(function () {
  'use strict';

  var DOCUMENT_ID = __DOCUMENT_ID__;
  var CENTER = __CENTER__;
  var ZOOM = __ZOOM__;
  var HEATMAP_VISIBLE = __HEATMAP_VISIBLE__;
  var LIVE_CONDITIONS_VISIBLE = __LIVE_CONDITIONS_VISIBLE__;
  var POINTS = __POINTS__;

  var runtime = {
    map: null,
    heatmap: null,
    traffic: null,
    clusterer: null,
    route: 'no-route-requested'
  };

  var CONTROL_IDS = {
    heatmap: 'toggle-heatmap',
    live_conditions: 'toggle-live-conditions'
  };

  function report(message) {
    message.document_id = DOCUMENT_ID;
    try {
      if (window.ipc && typeof window.ipc.postMessage === 'function') {
        window.ipc.postMessage(JSON.stringify(message));
      } else if (window.parent && window.parent !== window) {
        window.parent.postMessage(message, '*');
      }
    } catch (err) {
      // No host channel available; the message is dropped.
    }
  }

  function layerObject(layer) {
    if (layer === 'heatmap') {
      return runtime.heatmap;
    }
    if (layer === 'live_conditions') {
      return runtime.traffic;
    }
    return null;
  }

  function isLayerVisible(layer) {
    var target = layerObject(layer);
    return !!(target && target.getMap());
  }

  function setLayerVisible(layer, visible) {
    var target = layerObject(layer);
    if (!target) {
      return;
    }
    target.setMap(visible ? runtime.map : null);
    var button = document.getElementById(CONTROL_IDS[layer]);
    if (button) {
      button.setAttribute('aria-pressed', visible ? 'true' : 'false');
    }
  }

  function wireControl(layer) {
    var button = document.getElementById(CONTROL_IDS[layer]);
    if (!button) {
      return;
    }
    button.addEventListener('click', function () {
      var visible = !isLayerVisible(layer);
      setLayerVisible(layer, visible);
      report({ type: 'layer_toggled', layer: layer, visible: visible });
    });
  }

  function requestRoute() {
    __ROUTE__
  }

  function handleHostMessage(event) {
    var data = event.data;
    if (typeof data === 'string') {
      try {
        data = JSON.parse(data);
      } catch (err) {
        return;
      }
    }
    if (!data || !runtime.map) {
      return;
    }
    if (data.type === 'focus') {
      runtime.map.panTo({ lat: data.lat, lng: data.lng });
      runtime.map.setZoom(data.zoom);
    } else if (data.type === 'set_layer_visibility') {
      setLayerVisible(data.layer, data.visible);
    }
  }

  window.initMap = function () {
    try {
      runtime.map = new google.maps.Map(document.getElementById('map'), {
        center: CENTER,
        zoom: ZOOM,
        mapTypeControl: false,
        streetViewControl: false
      });

      var positions = POINTS.map(function (point) {
        return new google.maps.LatLng(point.lat, point.lng);
      });

      var markers = positions.map(function (position) {
        return new google.maps.Marker({ position: position });
      });
      runtime.clusterer = new markerClusterer.MarkerClusterer({
        map: runtime.map,
        markers: markers
      });

      runtime.heatmap = new google.maps.visualization.HeatmapLayer({
        data: POINTS.map(function (point, index) {
          return { location: positions[index], weight: point.weight };
        }),
        radius: __HEATMAP_RADIUS__
      });
      runtime.heatmap.setMap(HEATMAP_VISIBLE ? runtime.map : null);

      runtime.traffic = new google.maps.TrafficLayer();
      runtime.traffic.setMap(LIVE_CONDITIONS_VISIBLE ? runtime.map : null);

      wireControl('heatmap');
      wireControl('live_conditions');
      window.addEventListener('message', handleHostMessage);

      requestRoute();
      report({ type: 'ready' });
    } catch (err) {
      report({ type: 'fault', message: String(err && err.message ? err.message : err) });
    }
  };

  window.gm_authFailure = function () {
    report({ type: 'fault', message: 'map credential rejected' });
  };
})();"#;
