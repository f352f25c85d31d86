use serde_json::json;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use crate::engine::{MapCommand, MapEngine};
use crate::js_env::log_status;
use crate::konfiguration::Konfiguration;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = maplibregl, js_name = Map)]
    pub type Map;

    #[wasm_bindgen(constructor, js_namespace = maplibregl, js_class = "Map", catch)]
    fn new(options: &JsValue) -> Result<Map, JsValue>;

    #[wasm_bindgen(method, js_name = addSource, catch)]
    fn add_source(this: &Map, id: &str, source: &JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(method, js_name = removeSource, catch)]
    fn remove_source(this: &Map, id: &str) -> Result<(), JsValue>;

    #[wasm_bindgen(method, js_name = getSource)]
    fn get_source(this: &Map, id: &str) -> JsValue;

    #[wasm_bindgen(method, js_name = addLayer, catch)]
    fn add_layer(this: &Map, layer: &JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(method, js_name = removeLayer, catch)]
    fn remove_layer(this: &Map, id: &str) -> Result<(), JsValue>;

    #[wasm_bindgen(method, js_name = getLayer)]
    fn get_layer(this: &Map, id: &str) -> JsValue;

    #[wasm_bindgen(method, js_name = setFilter, catch)]
    fn set_filter(this: &Map, layer: &str, filter: &JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(method, js_name = setPaintProperty, catch)]
    fn set_paint_property(this: &Map, layer: &str, property: &str, value: &JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(method, js_name = setProjection, catch)]
    fn set_projection(this: &Map, projection: &JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(method, js_name = setLight, catch)]
    fn set_light(this: &Map, light: &JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(method, js_name = flyTo)]
    fn fly_to(this: &Map, options: &JsValue);

    #[wasm_bindgen(method, js_name = fitBounds)]
    fn fit_bounds(this: &Map, bounds: &JsValue, options: &JsValue);

    #[wasm_bindgen(method, js_name = getCanvas)]
    fn get_canvas(this: &Map) -> web_sys::HtmlCanvasElement;

    #[wasm_bindgen(method)]
    fn on(this: &Map, event: &str, handler: &js_sys::Function);

    #[wasm_bindgen(method, js_name = on)]
    fn on_layer(this: &Map, event: &str, layer: &str, handler: &js_sys::Function);

    #[wasm_bindgen(method)]
    fn remove(this: &Map);

    #[wasm_bindgen(js_namespace = maplibregl, js_name = Popup)]
    pub type Popup;

    #[wasm_bindgen(constructor, js_namespace = maplibregl, js_class = "Popup")]
    fn new() -> Popup;

    #[wasm_bindgen(method, js_name = setLngLat)]
    fn set_lng_lat(this: &Popup, lng_lat: &JsValue) -> Popup;

    #[wasm_bindgen(method, js_name = setHTML)]
    fn set_html(this: &Popup, html: &str) -> Popup;

    #[wasm_bindgen(method, js_name = addTo)]
    fn add_to(this: &Popup, map: &Map) -> Popup;

    #[wasm_bindgen(method, js_name = remove)]
    fn remove_popup(this: &Popup);

    #[wasm_bindgen(js_namespace = maplibregl, js_name = Marker)]
    pub type Marker;

    #[wasm_bindgen(constructor, js_namespace = maplibregl, js_class = "Marker")]
    fn new() -> Marker;

    #[wasm_bindgen(method, js_name = setLngLat)]
    fn set_marker_lng_lat(this: &Marker, lng_lat: &JsValue) -> Marker;

    #[wasm_bindgen(method, js_name = addTo)]
    fn add_marker_to(this: &Marker, map: &Map) -> Marker;

    #[wasm_bindgen(method, js_name = remove)]
    fn remove_marker(this: &Marker);
}

fn to_js(v: &serde_json::Value) -> JsValue {
    match js_sys::JSON::parse(&v.to_string()) {
        Ok(o) => o,
        Err(e) => {
            log_status(&format!("JSON.parse failed: {e:?}"));
            JsValue::NULL
        }
    }
}

fn report(what: &str, r: Result<(), JsValue>) {
    if let Err(e) = r {
        log_status(&format!("{what}: {e:?}"));
    }
}

/// Live MapLibre map plus the one popup and the one marker it may carry.
pub struct MaplibreEngine {
    map: Option<Map>,
    popup: Option<Popup>,
    marker: Option<Marker>,
}

impl MaplibreEngine {

    pub fn new(container: &str, konfiguration: &Konfiguration) -> Result<MaplibreEngine, String> {
        let options = json!({
            "container": container,
            "style": konfiguration.map.style_url,
            "center": konfiguration.map.center,
            "zoom": konfiguration.map.zoom,
            "projection": "globe",
        });
        let map = Map::new(&to_js(&options)).map_err(|e| format!("no se pudo crear el mapa: {e:?}"))?;
        Ok(MaplibreEngine {
            map: Some(map),
            popup: None,
            marker: None,
        })
    }

    pub fn on(&self, event: &str, handler: &Closure<dyn FnMut(JsValue)>) {
        if let Some(map) = self.map.as_ref() {
            map.on(event, handler.as_ref().unchecked_ref());
        }
    }

    pub fn on_layer(&self, event: &str, layer: &str, handler: &Closure<dyn FnMut(JsValue)>) {
        if let Some(map) = self.map.as_ref() {
            map.on_layer(event, layer, handler.as_ref().unchecked_ref());
        }
    }

    fn close_popup(&mut self) {
        if let Some(p) = self.popup.take() {
            p.remove_popup();
        }
    }

    fn drop_marker(&mut self) {
        if let Some(m) = self.marker.take() {
            m.remove_marker();
        }
    }
}

impl MapEngine for MaplibreEngine {

    fn apply(&mut self, cmd: &MapCommand) {
        use crate::engine::MapCommand::*;

        let map = match self.map.as_ref() {
            Some(m) => m,
            None => return,
        };

        match cmd {
            AddSource { id, source } => report("addSource", map.add_source(id, &to_js(source))),
            RemoveSource { id } => {
                if !map.get_source(id).is_undefined() {
                    report("removeSource", map.remove_source(id));
                }
            },
            AddLayer { layer } => report("addLayer", map.add_layer(&to_js(layer))),
            RemoveLayer { id } => {
                if !map.get_layer(id).is_undefined() {
                    report("removeLayer", map.remove_layer(id));
                }
            },
            SetFilter { layer, filter } => report("setFilter", map.set_filter(layer, &to_js(filter))),
            SetPaintProperty { layer, property, value } => {
                report("setPaintProperty", map.set_paint_property(layer, property, &to_js(value)))
            },
            SetProjection { projection } => {
                report("setProjection", map.set_projection(&to_js(&json!({ "type": projection }))))
            },
            SetLight { light } => report("setLight", map.set_light(&to_js(light))),
            FlyTo { center, zoom } => map.fly_to(&to_js(&json!({ "center": center, "zoom": zoom }))),
            FitBounds { bounds, padding, duration_ms } => map.fit_bounds(
                &to_js(&json!(bounds)),
                &to_js(&json!({ "padding": padding, "duration": duration_ms })),
            ),
            ShowPopup { lng_lat, html } => {
                let popup = Popup::new()
                    .set_lng_lat(&to_js(&json!(lng_lat)))
                    .set_html(html)
                    .add_to(map);
                self.close_popup();
                self.popup = Some(popup);
            },
            ClosePopup => self.close_popup(),
            PlaceMarker { lng_lat } => {
                let marker = Marker::new()
                    .set_marker_lng_lat(&to_js(&json!(lng_lat)))
                    .add_marker_to(map);
                self.drop_marker();
                self.marker = Some(marker);
            },
            RemoveMarker => self.drop_marker(),
            SetCursor { cursor } => {
                let _ = map.get_canvas().style().set_property("cursor", cursor);
            },
        }
    }

    fn teardown(&mut self) {
        self.close_popup();
        self.drop_marker();
        if let Some(map) = self.map.take() {
            map.remove();
            log_status("mapa liberado");
        }
    }
}

impl Drop for MaplibreEngine {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// `e.features[0].properties` of a layer mouse event.
pub fn event_properties(e: &JsValue) -> Option<geojson::JsonObject> {
    let features = js_sys::Reflect::get(e, &"features".into()).ok()?;
    let first = js_sys::Reflect::get(&features, &0.into()).ok()?;
    let props = js_sys::Reflect::get(&first, &"properties".into()).ok()?;
    let s = js_sys::JSON::stringify(&props).ok()?.as_string()?;
    serde_json::from_str(&s).ok()
}

/// `e.lngLat` as [lng, lat].
pub fn event_lng_lat(e: &JsValue) -> Option<[f64; 2]> {
    let ll = js_sys::Reflect::get(e, &"lngLat".into()).ok()?;
    let lng = js_sys::Reflect::get(&ll, &"lng".into()).ok()?.as_f64()?;
    let lat = js_sys::Reflect::get(&ll, &"lat".into()).ok()?.as_f64()?;
    Some([lng, lat])
}
