use std::cell::Cell;
use std::rc::Rc;

use serde_derive::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use crate::dataset::KEY_CODE;
use crate::konfiguration::Konfiguration;

pub const SOURCE_MUNICIPIOS: &str = "municipios";
pub const SOURCE_DEPARTAMENTOS: &str = "departamentos";
pub const SOURCE_OVERLAY: &str = "importado";

pub const LAYER_MUNICIPIOS_FILL: &str = "municipios-fill";
pub const LAYER_MUNICIPIOS_BORDERS: &str = "municipios-borders";
pub const LAYER_DEPARTAMENTOS: &str = "departamentos-layer";
pub const LAYER_HIGHLIGHT: &str = "municipio-highlight";
pub const LAYER_HIGHLIGHT_BORDER: &str = "municipio-highlight-border";
pub const LAYER_OVERLAY_FILL: &str = "importado-fill";
pub const LAYER_SKY: &str = "sky";

pub const CURSOR_MUNICIPIOS: &str = "crosshair";
pub const CURSOR_OVERLAY: &str = "pointer";

/// A single mutation of the map engine. Produced by the viewer state,
/// applied by a [`MapEngine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MapCommand {
    AddSource { id: String, source: JsonValue },
    RemoveSource { id: String },
    AddLayer { layer: JsonValue },
    RemoveLayer { id: String },
    SetFilter { layer: String, filter: JsonValue },
    SetPaintProperty { layer: String, property: String, value: JsonValue },
    SetProjection { projection: String },
    SetLight { light: JsonValue },
    FlyTo { center: [f64; 2], zoom: f64 },
    FitBounds { bounds: [[f64; 2]; 2], padding: f64, duration_ms: u32 },
    ShowPopup { lng_lat: [f64; 2], html: String },
    ClosePopup,
    PlaceMarker { lng_lat: [f64; 2] },
    RemoveMarker,
    SetCursor { cursor: String },
}

pub trait MapEngine {

    fn apply(&mut self, cmd: &MapCommand);

    /// Releases the popup, the marker and the map surface. Must be safe to
    /// call more than once.
    fn teardown(&mut self);

    fn apply_all(&mut self, cmds: &[MapCommand]) {
        for c in cmds.iter() {
            self.apply(c);
        }
    }
}

/// Filter matching one municipality, or none when `code` is empty.
/// Datasets store the code as a string or as a number, the comparison is
/// done on the string form.
pub fn code_filter(code: &str) -> JsonValue {
    if code.is_empty() {
        return json!(["==", KEY_CODE, ""]);
    }
    json!(["==", ["to-string", ["get", KEY_CODE]], code])
}

pub fn highlight_commands(code: &str) -> Vec<MapCommand> {
    [LAYER_HIGHLIGHT, LAYER_HIGHLIGHT_BORDER].iter().map(|l| MapCommand::SetFilter {
        layer: l.to_string(),
        filter: code_filter(code),
    }).collect()
}

/// Globe projection, atmosphere and light, applied on `style.load`.
pub fn style_commands() -> Vec<MapCommand> {
    vec![
        MapCommand::SetProjection { projection: "globe".to_string() },
        MapCommand::AddLayer {
            layer: json!({
                "id": LAYER_SKY,
                "type": "sky",
                "paint": {
                    "sky-type": "atmosphere",
                    "sky-atmosphere-sun": [1.5, 90],
                    "sky-atmosphere-sun-intensity": 10,
                    "sky-atmosphere-color": "#88aaff",
                },
            }),
        },
        MapCommand::SetLight {
            light: json!({
                "anchor": "map",
                "position": [1.5, 90, 80],
                "intensity": 1.5,
            }),
        },
    ]
}

/// Boundary sources and layers, applied on `load`. Departments are added
/// after municipalities so their borders stay on top.
pub fn static_layer_commands(konfiguration: &Konfiguration) -> Vec<MapCommand> {
    let hl = &konfiguration.highlight;
    vec![
        MapCommand::AddSource {
            id: SOURCE_MUNICIPIOS.to_string(),
            source: json!({ "type": "geojson", "data": konfiguration.map.municipios_url }),
        },
        MapCommand::AddLayer {
            layer: json!({
                "id": LAYER_MUNICIPIOS_FILL,
                "type": "fill",
                "source": SOURCE_MUNICIPIOS,
                "paint": { "fill-color": "#ffffff", "fill-opacity": 0.02 },
            }),
        },
        MapCommand::AddLayer {
            layer: json!({
                "id": LAYER_MUNICIPIOS_BORDERS,
                "type": "line",
                "source": SOURCE_MUNICIPIOS,
                "paint": { "line-color": "#888888", "line-width": 1 },
            }),
        },
        MapCommand::AddSource {
            id: SOURCE_DEPARTAMENTOS.to_string(),
            source: json!({ "type": "geojson", "data": konfiguration.map.departamentos_url }),
        },
        MapCommand::AddLayer {
            layer: json!({
                "id": LAYER_DEPARTAMENTOS,
                "type": "line",
                "source": SOURCE_DEPARTAMENTOS,
                "paint": { "line-color": "#ffffff", "line-width": 2 },
            }),
        },
        MapCommand::AddLayer {
            layer: json!({
                "id": LAYER_HIGHLIGHT,
                "type": "fill",
                "source": SOURCE_MUNICIPIOS,
                "paint": {
                    "fill-color": hl.fill_color,
                    "fill-opacity": hl.fill_opacity,
                    "fill-outline-color": hl.outline_color,
                },
                "filter": code_filter(""),
            }),
        },
        MapCommand::AddLayer {
            layer: json!({
                "id": LAYER_HIGHLIGHT_BORDER,
                "type": "line",
                "source": SOURCE_MUNICIPIOS,
                "paint": { "line-color": hl.outline_color, "line-width": 2 },
                "filter": code_filter(""),
            }),
        },
    ]
}

pub fn overlay_layer(fill_color: &JsonValue, opacity: f64) -> JsonValue {
    json!({
        "id": LAYER_OVERLAY_FILL,
        "type": "fill",
        "source": SOURCE_OVERLAY,
        "paint": { "fill-color": fill_color, "fill-opacity": opacity },
    })
}

/// Keeps every command; tests inspect what the viewer asked the map to do.
/// The teardown counter is shared so it can be read after the engine is gone.
#[derive(Debug, Default, Clone)]
pub struct RecordingEngine {
    pub commands: Vec<MapCommand>,
    pub torn_down: Rc<Cell<usize>>,
}

impl RecordingEngine {

    pub fn take(&mut self) -> Vec<MapCommand> {
        std::mem::take(&mut self.commands)
    }
}

impl MapEngine for RecordingEngine {

    fn apply(&mut self, cmd: &MapCommand) {
        self.commands.push(cmd.clone());
    }

    fn teardown(&mut self) {
        self.torn_down.set(self.torn_down.get() + 1);
    }
}
