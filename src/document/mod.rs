use std::fmt::{Display, Formatter};

use rand::Rng;
use serde::Serialize;
use tracing::warn;
use url::Url;

use crate::config::MapSettings;
use crate::host::sizing::ContainerSize;
use crate::location::LocationState;
use crate::toggles::ToggleState;

pub mod points;
pub mod script;

use self::points::{BoundingBox, GeoPoint, PointSource, SYNTHETIC_BOUNDS};
use self::script::{RuntimeParams, render_runtime};

const MAP_SCRIPT_URL: &str = "https://maps.googleapis.com/maps/api/js";
const CLUSTERER_SCRIPT_URL: &str = "https://unpkg.com/@googlemaps/markerclusterer/dist/index.min.js";

/// Random per-document identity. Embedded messages echo it so the host can
/// drop reports from documents it already replaced.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn random() -> Self {
        Self(format!("{:016x}", rand::rng().random::<u64>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DocumentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRequest {
    pub origin: String,
    pub destination: String,
}

/// Everything a document is a function of, besides its own randomness.
#[derive(Debug, Clone, Copy)]
pub struct DocumentInputs<'a> {
    pub toggles: ToggleState,
    pub location: &'a LocationState,
    pub size: ContainerSize,
}

/// Fixed per-session generator configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorOptions {
    pub api_key: Option<String>,
    pub point_count: usize,
    pub point_source: PointSource,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self::from_settings(&MapSettings::default())
    }
}

impl GeneratorOptions {
    pub fn from_settings(settings: &MapSettings) -> Self {
        Self {
            api_key: settings.api_key.clone(),
            point_count: settings.point_count,
            point_source: PointSource::from_seed(settings.point_seed),
        }
    }
}

/// A complete, self-contained map document. Disposable: any input change
/// means generating a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct MapDocument {
    id: DocumentId,
    html: String,
    points: Vec<GeoPoint>,
    route: Option<RouteRequest>,
    toggles: ToggleState,
    size: ContainerSize,
}

impl MapDocument {
    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    pub fn route(&self) -> Option<&RouteRequest> {
        self.route.as_ref()
    }

    pub fn toggles(&self) -> ToggleState {
        self.toggles
    }

    pub fn size(&self) -> ContainerSize {
        self.size
    }
}

pub fn generate_document(inputs: &DocumentInputs<'_>, options: &GeneratorOptions) -> MapDocument {
    generate_document_in(inputs, options, &SYNTHETIC_BOUNDS)
}

fn generate_document_in(
    inputs: &DocumentInputs<'_>,
    options: &GeneratorOptions,
    bounds: &BoundingBox,
) -> MapDocument {
    let id = DocumentId::random();
    let points = options.point_source.generate(options.point_count, bounds);
    let route = inputs.location.start.as_ref().map(|start| RouteRequest {
        origin: start.clone(),
        destination: inputs.location.end.clone(),
    });

    let runtime = render_runtime(&RuntimeParams {
        id: &id,
        toggles: inputs.toggles,
        points: &points,
        route: route.as_ref(),
    });

    let html = DOCUMENT_TEMPLATE
        .replace("__WIDTH__", &inputs.size.width.to_string())
        .replace("__HEIGHT__", &inputs.size.height.to_string())
        .replace(
            "__HEATMAP_PRESSED__",
            pressed_attr(inputs.toggles.heatmap_enabled),
        )
        .replace(
            "__LIVE_CONDITIONS_PRESSED__",
            pressed_attr(inputs.toggles.traffic_enabled),
        )
        .replace("__CLUSTERER_SRC__", CLUSTERER_SCRIPT_URL)
        .replace("__MAP_SRC__", &map_script_src(options.api_key.as_deref()))
        .replace("__RUNTIME__", &runtime);

    MapDocument {
        id,
        html,
        points,
        route,
        toggles: inputs.toggles,
        size: inputs.size,
    }
}

/// Serializes `value` as a JS literal that is safe to inline in a `<script>`.
pub(crate) fn js_literal<T: Serialize + ?Sized>(value: &T) -> String {
    let json = serde_json::to_string(value).unwrap_or_else(|_| "null".to_owned());
    let mut escaped = String::with_capacity(json.len());
    for ch in json.chars() {
        match ch {
            '<' => escaped.push_str("\\u003c"),
            '>' => escaped.push_str("\\u003e"),
            '&' => escaped.push_str("\\u0026"),
            '\u{2028}' => escaped.push_str("\\u2028"),
            '\u{2029}' => escaped.push_str("\\u2029"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn pressed_attr(visible: bool) -> &'static str {
    if visible { "true" } else { "false" }
}

fn map_script_src(api_key: Option<&str>) -> String {
    let mut params = vec![("libraries", "visualization"), ("callback", "initMap")];
    if let Some(key) = api_key {
        params.push(("key", key));
    }

    match Url::parse_with_params(MAP_SCRIPT_URL, &params) {
        Ok(url) => url.into(),
        Err(error) => {
            warn!(error = %error, "failed to build map script URL; loading without parameters");
            MAP_SCRIPT_URL.to_owned()
        }
    }
}

const DOCUMENT_TEMPLATE: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0, maximum-scale=1.0, user-scalable=no" />
  <title>Area map</title>
  <style>
    html, body { margin: 0; padding: 0; background: #eef1f4; font-family: system-ui, sans-serif; }
    #map { width: __WIDTH__px; height: __HEIGHT__px; }
    .map-controls { position: absolute; top: 8px; left: 8px; display: flex; gap: 6px; z-index: 5; }
    .map-control {
      border: 1px solid #9aa5b1; border-radius: 14px; padding: 4px 10px;
      background: #ffffff; color: #1f2933; font-size: 12px;
    }
    .map-control[aria-pressed="true"] { background: #1f6feb; border-color: #1f6feb; color: #ffffff; }
  </style>
</head>
<body>
  <div id="map"></div>
  <div class="map-controls">
    <button type="button" id="toggle-heatmap" class="map-control" aria-pressed="__HEATMAP_PRESSED__">Crowd heatmap</button>
    <button type="button" id="toggle-live-conditions" class="map-control" aria-pressed="__LIVE_CONDITIONS_PRESSED__">Live traffic</button>
  </div>
  <script src="__CLUSTERER_SRC__"></script>
  <script>
__RUNTIME__
  </script>
  <script async src="__MAP_SRC__"></script>
</body>
</html>
"#;
