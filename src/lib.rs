use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;

use crate::dataset::{parse_municipalities, SelectedFeature};
use crate::dms::DmsField;
use crate::engine::{MapEngine, LAYER_MUNICIPIOS_FILL, LAYER_OVERLAY_FILL};
use crate::js_env::{alert, log_status};
use crate::konfiguration::Konfiguration;
use crate::maplibre::{event_lng_lat, event_properties, MaplibreEngine};
use crate::state::{Effects, Intent, ViewerState};

pub mod classify;
pub mod dataset;
pub mod dms;
pub mod engine;
pub mod js_env;
pub mod konfiguration;
pub mod maplibre;
pub mod overlay;
pub mod search;
pub mod state;
pub mod ui;

/// Receives every new selection.
type OnSelect = Rc<dyn Fn(&SelectedFeature)>;

/// Viewer state plus the engine it drives. Shared between the exported
/// `Viewer` and the map event handlers. Dropping it tears the engine down.
struct Session<E: MapEngine> {
    state: ViewerState,
    engine: E,
    on_select: Option<OnSelect>,
}

type Lift = (OnSelect, SelectedFeature);

impl<E: MapEngine> Session<E> {

    fn new(state: ViewerState, engine: E, on_select: Option<OnSelect>) -> Session<E> {
        Session { state, engine, on_select }
    }

    /// Applies the intent's commands. A selection to hand to the host is
    /// returned instead of called here, the host callback may call back
    /// into the viewer.
    fn run(&mut self, intent: Intent) -> Result<Option<Lift>, String> {
        let Effects { commands, lifted } = self.state.dispatch(intent)?;
        self.engine.apply_all(&commands);
        Ok(match (self.on_select.as_ref(), lifted) {
            (Some(f), Some(sel)) => Some((f.clone(), sel)),
            _ => None,
        })
    }
}

impl<E: MapEngine> Drop for Session<E> {
    fn drop(&mut self) {
        self.engine.teardown();
    }
}

fn run_shared<E: MapEngine>(session: &Rc<RefCell<Session<E>>>, intent: Intent) -> Result<(), String> {
    let result = match session.try_borrow_mut() {
        Ok(mut s) => s.run(intent),
        Err(_) => Err("viewer busy, event dropped".to_string()),
    };
    match result {
        Ok(Some((f, sel))) => {
            f(&sel);
            Ok(())
        },
        Ok(None) => Ok(()),
        Err(e) => {
            log_status(&e);
            Err(e)
        }
    }
}

/// Returns an error text or "". A malformed file is reported to the
/// user and leaves any previous overlay in place.
fn import_shared<E: MapEngine>(session: &Rc<RefCell<Session<E>>>, bytes: Vec<u8>) -> String {
    let text = decode(bytes);
    let e = run_shared(session, Intent::ImportOverlay(text)).err().unwrap_or_default();
    if !e.is_empty() {
        alert(&format!("No se pudo importar el archivo: {e}"));
    }
    e
}

fn js_on_select(f: js_sys::Function) -> OnSelect {
    Rc::new(move |sel: &SelectedFeature| {
        let json = serde_json::to_string(sel).unwrap_or_default();
        let arg = js_sys::JSON::parse(&json).unwrap_or(JsValue::NULL);
        if let Err(e) = f.call1(&JsValue::NULL, &arg) {
            log_status(&format!("on_select failed: {e:?}"));
        }
    })
}

#[wasm_bindgen]
pub struct Viewer {
    session: Rc<RefCell<Session<MaplibreEngine>>>,
    handlers: Vec<Closure<dyn FnMut(JsValue)>>,
}

#[wasm_bindgen]
impl Viewer {

    #[wasm_bindgen(constructor)]
    pub fn new(container: String, konfiguration: String, on_select: Option<js_sys::Function>) -> Result<Viewer, JsValue> {
        let konfiguration = Konfiguration::from_string(&konfiguration);
        let engine = MaplibreEngine::new(&container, &konfiguration).map_err(|e| JsValue::from_str(&e))?;
        let session = Rc::new(RefCell::new(Session::new(
            ViewerState::new(konfiguration),
            engine,
            on_select.map(js_on_select),
        )));

        let mut viewer = Viewer {
            session,
            handlers: Vec::new(),
        };
        viewer.subscribe();
        Ok(viewer)
    }

    /// Provides the municipality list for search directly, instead of
    /// waiting for the fetch after `load`. Returns an error text or "".
    pub fn set_municipalities(&self, json: String) -> String {
        let m = match parse_municipalities(&json) {
            Ok(o) => o,
            Err(e) => return e,
        };
        self.run(Intent::MunicipalitiesLoaded(m))
    }

    /// Returns the suggestion list HTML.
    pub fn search(&self, query: String) -> String {
        let _ = self.run(Intent::Search(query));
        let s = self.session.borrow();
        ui::render_suggestions(&s.state.search_result_list())
    }

    /// Returns the new text of the search box.
    pub fn choose_result(&self, code: String) -> String {
        let _ = self.run(Intent::ChooseResult(code));
        self.session.borrow().state.search_query.clone()
    }

    pub fn import_overlay(&self, bytes: Vec<u8>) -> String {
        import_shared(&self.session, bytes)
    }

    pub fn toggle_classification(&self, on: bool) {
        let _ = self.run(Intent::ToggleClassification(on));
    }

    /// Empty field turns classification off.
    pub fn classify(&self, field: String) {
        let field = if field.trim().is_empty() { None } else { Some(field) };
        let _ = self.run(Intent::Classify(field));
    }

    pub fn set_opacity(&self, value: f64) {
        let _ = self.run(Intent::SetOpacity(value));
    }

    /// Returns the stored (clamped) value.
    pub fn set_dms_field(&self, field: String, raw: String) -> u32 {
        let field = match DmsField::from_str(&field) {
            Some(f) => f,
            None => {
                log_status(&format!("unknown DMS field {field}"));
                return 0;
            }
        };
        let _ = self.run(Intent::SetDmsField(field, raw));
        let s = self.session.borrow();
        match field {
            DmsField::LatDegrees => s.state.dms.lat.degrees,
            DmsField::LatMinutes => s.state.dms.lat.minutes,
            DmsField::LatSeconds => s.state.dms.lat.seconds,
            DmsField::LonDegrees => s.state.dms.lon.degrees,
            DmsField::LonMinutes => s.state.dms.lon.minutes,
            DmsField::LonSeconds => s.state.dms.lon.seconds,
        }
    }

    pub fn set_hemisphere(&self, hemisphere: String) -> String {
        self.run(Intent::SetHemisphere(hemisphere))
    }

    pub fn navigate(&self) {
        let _ = self.run(Intent::Navigate);
    }

    pub fn render_dashboard(&self) -> String {
        ui::render_dashboard(self.session.borrow().state.selected.as_ref())
    }

    pub fn render_field_list(&self) -> String {
        let s = self.session.borrow();
        let fields = s.state.overlay.as_ref().map(|o| o.fields.clone()).unwrap_or_default();
        let active = s.state.color_map.as_ref().map(|c| c.field.as_str());
        ui::render_field_list(&fields, s.state.classify_enabled, active)
    }

    pub fn render_dms_form(&self) -> String {
        ui::render_dms_form(&self.session.borrow().state.dms)
    }

    pub fn selected_json(&self) -> String {
        match self.session.borrow().state.selected.as_ref() {
            Some(s) => serde_json::to_string(s).unwrap_or_default(),
            None => String::new(),
        }
    }

    /// Releases popup, marker and map. Also runs when the viewer is freed.
    pub fn destroy(&mut self) {
        if let Ok(mut s) = self.session.try_borrow_mut() {
            s.engine.teardown();
        }
    }
}

impl Viewer {

    fn run(&self, intent: Intent) -> String {
        run_shared(&self.session, intent).err().unwrap_or_default()
    }

    fn handler(&mut self, f: impl FnMut(JsValue) + 'static) -> usize {
        self.handlers.push(Closure::wrap(Box::new(f) as Box<dyn FnMut(JsValue)>));
        self.handlers.len() - 1
    }

    fn subscribe(&mut self) {
        let sess = self.session.clone();
        let style_load = self.handler(move |_| { let _ = run_shared(&sess, Intent::StyleLoaded); });

        let sess = self.session.clone();
        let load = self.handler(move |_| {
            let _ = run_shared(&sess, Intent::MapLoaded);
            fetch_municipalities(sess.clone());
        });

        let sess = self.session.clone();
        let click = self.handler(move |e| {
            let (properties, lng_lat) = match (event_properties(&e), event_lng_lat(&e)) {
                (Some(p), Some(l)) => (p, l),
                _ => return,
            };
            let _ = run_shared(&sess, Intent::ClickMunicipality { properties, lng_lat });
        });

        let sess = self.session.clone();
        let enter = self.handler(move |_| { let _ = run_shared(&sess, Intent::HoverMunicipalities(true)); });
        let sess = self.session.clone();
        let leave = self.handler(move |_| { let _ = run_shared(&sess, Intent::HoverMunicipalities(false)); });

        let sess = self.session.clone();
        let overlay_click = self.handler(move |e| {
            let (properties, lng_lat) = match (event_properties(&e), event_lng_lat(&e)) {
                (Some(p), Some(l)) => (p, l),
                _ => return,
            };
            let _ = run_shared(&sess, Intent::ClickOverlay { properties, lng_lat });
        });

        let sess = self.session.clone();
        let overlay_enter = self.handler(move |_| { let _ = run_shared(&sess, Intent::HoverOverlay(true)); });
        let sess = self.session.clone();
        let overlay_leave = self.handler(move |_| { let _ = run_shared(&sess, Intent::HoverOverlay(false)); });

        let s = self.session.borrow();
        let h = &self.handlers;
        s.engine.on("style.load", &h[style_load]);
        s.engine.on("load", &h[load]);
        s.engine.on_layer("click", LAYER_MUNICIPIOS_FILL, &h[click]);
        s.engine.on_layer("mouseenter", LAYER_MUNICIPIOS_FILL, &h[enter]);
        s.engine.on_layer("mouseleave", LAYER_MUNICIPIOS_FILL, &h[leave]);
        s.engine.on_layer("click", LAYER_OVERLAY_FILL, &h[overlay_click]);
        s.engine.on_layer("mouseenter", LAYER_OVERLAY_FILL, &h[overlay_enter]);
        s.engine.on_layer("mouseleave", LAYER_OVERLAY_FILL, &h[overlay_leave]);
    }
}

impl Drop for Viewer {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn fetch_municipalities(session: Rc<RefCell<Session<MaplibreEngine>>>) {
    let url = match session.try_borrow() {
        Ok(s) if s.state.municipalities.is_empty() => s.state.konfiguration.map.municipios_url.clone(),
        _ => return,
    };
    wasm_bindgen_futures::spawn_local(async move {
        let text = match fetch_text(&url).await {
            Ok(o) => o,
            Err(e) => {
                log_status(&format!("no se pudo cargar {url}: {e}"));
                return;
            }
        };
        match parse_municipalities(&text) {
            Ok(m) => {
                let _ = run_shared(&session, Intent::MunicipalitiesLoaded(m));
            },
            Err(e) => log_status(&format!("municipios inválidos: {e}")),
        }
    });
}

async fn fetch_text(url: &str) -> Result<String, String> {
    let url = absolute_url(url)?;
    let response = reqwest::get(&url).await.map_err(|e| e.to_string())?;
    let response = response.error_for_status().map_err(|e| e.to_string())?;
    let bytes = response.bytes().await.map_err(|e| e.to_string())?;
    Ok(decode(bytes.to_vec()))
}

// reqwest needs an absolute URL, dataset paths are usually relative to the page
fn absolute_url(url: &str) -> Result<String, String> {
    if url.starts_with("http://") || url.starts_with("https://") {
        return Ok(url.to_string());
    }
    let window = web_sys::window().ok_or_else(|| "no window".to_string())?;
    let origin = window.location().origin().map_err(|e| format!("{e:?}"))?;
    Ok(format!("{}/{}", origin.trim_end_matches('/'), url.trim_start_matches('/')))
}

#[wasm_bindgen]
pub fn dms_to_decimal(degrees: u32, minutes: u32, seconds: u32, hemisphere: String) -> f64 {
    let h = hemisphere.trim().to_uppercase();
    let negative = h == "S" || h == "W";
    let max_degrees = if h == "N" || h == "S" { dms::MAX_LAT_DEGREES } else { dms::MAX_LON_DEGREES };
    let t = dms::DmsTriple {
        degrees: degrees.min(max_degrees),
        minutes: minutes.min(dms::MAX_MINUTES_SECONDS),
        seconds: seconds.min(dms::MAX_MINUTES_SECONDS),
    };
    t.to_decimal(negative)
}

#[wasm_bindgen]
pub fn search_municipalities_json(dataset: String, query: String) -> String {
    let m = match parse_municipalities(&dataset) {
        Ok(o) => o,
        Err(e) => return e,
    };
    let found = search::search_municipalities(&m, &query)
        .iter()
        .map(|m| m.selected())
        .collect::<Vec<_>>();
    serde_json::to_string(&found).unwrap_or_default()
}

#[wasm_bindgen]
pub fn render_dashboard(feature: String) -> String {
    let f = if feature.trim().is_empty() {
        None
    } else {
        match SelectedFeature::from_json(&feature) {
            Ok(o) => Some(o),
            Err(e) => return e,
        }
    };
    ui::render_dashboard(f.as_ref())
}

/// Decodes an uploaded file. A byte order mark wins over the guessed
/// encoding and is stripped.
pub fn decode(bytes: Vec<u8>) -> String {
    let mut detector = chardetng::EncodingDetector::new();
    let _ = detector.feed(&bytes[..], true);
    let encoding: &'static encoding_rs::Encoding = detector.guess(None, true);
    let (decoded, _, _) = encoding.decode(&bytes[..]);
    decoded.into_owned()
}
