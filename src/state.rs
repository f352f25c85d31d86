use geojson::JsonObject;
use rand_xorshift::XorShiftRng;
use serde_derive::{Deserialize, Serialize};

use crate::classify::ColorMap;
use crate::dataset::{Municipality, SelectedFeature};
use crate::dms::{DmsField, DmsInput};
use crate::engine::{self, MapCommand, CURSOR_MUNICIPIOS, CURSOR_OVERLAY, LAYER_OVERLAY_FILL, SOURCE_OVERLAY};
use crate::js_env::{color_rng, log_status};
use crate::konfiguration::{clamp_opacity, Konfiguration};
use crate::overlay::Overlay;
use crate::search::{find_by_code, search_municipalities};

/// Everything the user can ask the map panel to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    StyleLoaded,
    MapLoaded,
    MunicipalitiesLoaded(Vec<Municipality>),
    ClickMunicipality { properties: JsonObject, lng_lat: [f64; 2] },
    HoverMunicipalities(bool),
    Search(String),
    ChooseResult(String),
    ImportOverlay(String),
    ClickOverlay { properties: JsonObject, lng_lat: [f64; 2] },
    HoverOverlay(bool),
    ToggleClassification(bool),
    Classify(Option<String>),
    SetOpacity(f64),
    SetDmsField(DmsField, String),
    SetHemisphere(String),
    Navigate,
}

/// What a dispatched intent asks of the outside world.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Effects {
    pub commands: Vec<MapCommand>,
    /// new selection to hand to the dashboard
    pub lifted: Option<SelectedFeature>,
}

impl Effects {
    fn commands(commands: Vec<MapCommand>) -> Effects {
        Effects { commands, lifted: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub lng_lat: [f64; 2],
}

#[derive(Debug, Clone)]
pub struct ViewerState {
    pub konfiguration: Konfiguration,
    pub loaded: bool,
    pub municipalities: Vec<Municipality>,
    pub selected: Option<SelectedFeature>,
    /// code matched by both highlight layers, empty for none
    pub highlighted: String,
    pub search_query: String,
    /// codes of the current suggestions
    pub search_results: Vec<String>,
    pub overlay: Option<Overlay>,
    pub classify_enabled: bool,
    pub color_map: Option<ColorMap>,
    pub opacity: f64,
    pub dms: DmsInput,
    pub marker: Option<Marker>,
    pub popup_open: bool,
    rng: XorShiftRng,
}

impl ViewerState {

    pub fn new(konfiguration: Konfiguration) -> ViewerState {
        let rng = color_rng(konfiguration.color_seed);
        let opacity = konfiguration.overlay.default_opacity;
        ViewerState {
            konfiguration,
            loaded: false,
            municipalities: Vec::new(),
            selected: None,
            highlighted: String::new(),
            search_query: String::new(),
            search_results: Vec::new(),
            overlay: None,
            classify_enabled: false,
            color_map: None,
            opacity,
            dms: DmsInput::default(),
            marker: None,
            popup_open: false,
            rng,
        }
    }

    pub fn search_result_list(&self) -> Vec<&Municipality> {
        self.search_results.iter()
            .filter_map(|c| find_by_code(&self.municipalities, c))
            .collect()
    }

    pub fn dispatch(&mut self, intent: Intent) -> Result<Effects, String> {
        use self::Intent::*;
        let effects = match intent {
            StyleLoaded => Effects::commands(engine::style_commands()),
            MapLoaded => {
                if self.loaded {
                    return Ok(Effects::default());
                }
                self.loaded = true;
                Effects::commands(engine::static_layer_commands(&self.konfiguration))
            },
            MunicipalitiesLoaded(m) => {
                log_status(&format!("{} municipios cargados", m.len()));
                self.municipalities = m;
                self.refresh_search();
                Effects::default()
            },
            ClickMunicipality { properties, lng_lat } => {
                let sel = match SelectedFeature::from_properties(&properties) {
                    Some(s) => s,
                    None => return Ok(Effects::default()),
                };
                let fly_to = if self.search_query.is_empty() {
                    Some((lng_lat, self.konfiguration.zoom.click))
                } else {
                    None
                };
                self.select(sel, fly_to)
            },
            HoverMunicipalities(inside) => Effects::commands(vec![cursor(inside, CURSOR_MUNICIPIOS)]),
            Search(query) => {
                self.search_query = query;
                self.refresh_search();
                Effects::default()
            },
            ChooseResult(code) => {
                let m = match find_by_code(&self.municipalities, &code) {
                    Some(m) => m,
                    None => return Err(format!("municipio {code} no encontrado")),
                };
                let sel = m.selected();
                let label = m.search_label();
                let fly_to = m.first_coordinate().map(|c| (c, self.konfiguration.zoom.search));
                self.search_query = label;
                self.search_results.clear();
                self.select(sel, fly_to)
            },
            ImportOverlay(text) => {
                if !self.loaded {
                    return Ok(Effects::default());
                }
                // parse before touching anything, a bad file keeps the old overlay
                let overlay = Overlay::parse(&text)?;
                self.install_overlay(overlay)
            },
            ClickOverlay { properties, lng_lat } => {
                if self.overlay.is_none() {
                    return Ok(Effects::default());
                }
                self.popup_open = true;
                let html = crate::ui::render_overlay_popup(&properties, self.color_map.as_ref());
                Effects::commands(vec![MapCommand::ShowPopup { lng_lat, html }])
            },
            HoverOverlay(inside) => Effects::commands(vec![cursor(inside, CURSOR_OVERLAY)]),
            ToggleClassification(on) => {
                self.classify_enabled = on;
                if on {
                    Effects::default()
                } else {
                    self.classify(None)
                }
            },
            Classify(field) => {
                if field.is_some() {
                    self.classify_enabled = true;
                }
                self.classify(field)
            },
            SetOpacity(v) => {
                self.opacity = clamp_opacity(v);
                if self.loaded && self.overlay.is_some() {
                    Effects::commands(vec![MapCommand::SetPaintProperty {
                        layer: LAYER_OVERLAY_FILL.to_string(),
                        property: "fill-opacity".to_string(),
                        value: self.opacity.into(),
                    }])
                } else {
                    Effects::default()
                }
            },
            SetDmsField(field, raw) => {
                self.dms.set_field(field, &raw);
                Effects::default()
            },
            SetHemisphere(h) => {
                self.dms.set_hemisphere(&h)?;
                Effects::default()
            },
            Navigate => {
                if !self.loaded {
                    return Ok(Effects::default());
                }
                let lng_lat = self.dms.lng_lat();
                let mut commands = Vec::new();
                if self.marker.take().is_some() {
                    commands.push(MapCommand::RemoveMarker);
                }
                commands.push(MapCommand::PlaceMarker { lng_lat });
                commands.push(MapCommand::FlyTo { center: lng_lat, zoom: self.konfiguration.zoom.navigate });
                self.marker = Some(Marker { lng_lat });
                Effects::commands(commands)
            },
        };
        Ok(effects)
    }

    fn refresh_search(&mut self) {
        self.search_results = search_municipalities(&self.municipalities, &self.search_query)
            .into_iter()
            .map(|m| m.code.clone())
            .collect();
    }

    /// Replaces the selection and moves the highlight; the highlight stays
    /// until the next selection.
    fn select(&mut self, sel: SelectedFeature, fly_to: Option<([f64; 2], f64)>) -> Effects {
        let mut commands = Vec::new();
        if self.loaded {
            commands.extend(engine::highlight_commands(&sel.code));
            if let Some((center, zoom)) = fly_to {
                commands.push(MapCommand::FlyTo { center, zoom });
            }
        }
        self.highlighted = sel.code.clone();
        self.selected = Some(sel.clone());
        Effects {
            commands,
            lifted: Some(sel),
        }
    }

    fn install_overlay(&mut self, overlay: Overlay) -> Effects {
        let mut commands = Vec::new();
        if self.popup_open {
            commands.push(MapCommand::ClosePopup);
            self.popup_open = false;
        }
        if self.overlay.is_some() {
            commands.push(MapCommand::RemoveLayer { id: LAYER_OVERLAY_FILL.to_string() });
            commands.push(MapCommand::RemoveSource { id: SOURCE_OVERLAY.to_string() });
        }

        self.color_map = None;
        self.classify_enabled = false;
        self.opacity = self.konfiguration.overlay.default_opacity;

        let fallback = serde_json::Value::from(self.konfiguration.overlay.fallback_color.clone());
        commands.push(MapCommand::AddSource {
            id: SOURCE_OVERLAY.to_string(),
            source: serde_json::json!({ "type": "geojson", "data": overlay.to_geojson_value() }),
        });
        commands.push(MapCommand::AddLayer {
            layer: engine::overlay_layer(&fallback, self.opacity),
        });
        if let Some(bounds) = overlay.fit_bounds() {
            commands.push(MapCommand::FitBounds {
                bounds,
                padding: self.konfiguration.overlay.fit_padding,
                duration_ms: self.konfiguration.overlay.fit_duration_ms,
            });
        }

        log_status(&format!(
            "capa importada: {} elementos, campos {:?}",
            overlay.features().len(),
            overlay.fields
        ));
        self.overlay = Some(overlay);
        Effects::commands(commands)
    }

    fn classify(&mut self, field: Option<String>) -> Effects {
        let overlay = match self.overlay.as_ref() {
            Some(o) => o,
            None => return Effects::default(),
        };
        let fallback = &self.konfiguration.overlay.fallback_color;
        let (color_map, value) = match field.filter(|f| !f.is_empty()) {
            Some(f) => {
                let cm = ColorMap::build(overlay.features(), &f, fallback, &mut self.rng);
                let expr = cm.paint_expression();
                (Some(cm), expr)
            },
            None => (None, serde_json::Value::from(fallback.clone())),
        };
        self.color_map = color_map;
        if !self.loaded {
            return Effects::default();
        }
        Effects::commands(vec![MapCommand::SetPaintProperty {
            layer: LAYER_OVERLAY_FILL.to_string(),
            property: "fill-color".to_string(),
            value,
        }])
    }
}

fn cursor(inside: bool, cursor: &str) -> MapCommand {
    MapCommand::SetCursor {
        cursor: if inside { cursor.to_string() } else { String::new() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{parse_municipalities, tests::sample_dataset};
    use crate::engine::{code_filter, LAYER_HIGHLIGHT};
    use crate::overlay::tests::sample_overlay;
    use float_cmp::approx_eq;
    use serde_json::json;

    fn loaded_state() -> ViewerState {
        let mut k = Konfiguration::default();
        k.color_seed = Some(42);
        let mut s = ViewerState::new(k);
        s.dispatch(Intent::MapLoaded).unwrap();
        let m = parse_municipalities(&sample_dataset()).unwrap();
        s.dispatch(Intent::MunicipalitiesLoaded(m)).unwrap();
        s
    }

    fn props(v: serde_json::Value) -> JsonObject {
        v.as_object().cloned().unwrap()
    }

    fn fly_targets(cmds: &[MapCommand]) -> Vec<([f64; 2], f64)> {
        cmds.iter().filter_map(|c| match c {
            MapCommand::FlyTo { center, zoom } => Some((*center, *zoom)),
            _ => None,
        }).collect()
    }

    #[test]
    fn click_lifts_and_highlights() {
        let mut s = loaded_state();
        let e = s.dispatch(Intent::ClickMunicipality {
            properties: props(json!({ "MpCodigo": "05001", "MpNombre": "MEDELLÍN", "Depto": "ANTIOQUIA", "MpArea": 374.83, "MpAltitud": 1495 })),
            lng_lat: [-75.57, 6.24],
        }).unwrap();
        assert_eq!(e.lifted.as_ref().map(|s| s.code.as_str()), Some("05001"));
        assert!(e.commands.contains(&MapCommand::SetFilter { layer: LAYER_HIGHLIGHT.to_string(), filter: code_filter("05001") }));
        assert_eq!(fly_targets(&e.commands), vec![([-75.57, 6.24], 12.0)]);
        assert_eq!(s.highlighted, "05001");
    }

    #[test]
    fn numeric_codes_are_highlighted_by_string_form() {
        let expected = json!(["==", ["to-string", ["get", "MpCodigo"]], "11001"]);
        let mut s = loaded_state();
        let e = s.dispatch(Intent::ClickMunicipality {
            properties: props(json!({ "MpCodigo": 11001, "MpNombre": "BOGOTÁ, D.C.", "Depto": "BOGOTÁ, D.C." })),
            lng_lat: [-74.08, 4.6],
        }).unwrap();
        let filters = e.commands.iter().filter_map(|c| match c {
            MapCommand::SetFilter { filter, .. } => Some(filter.clone()),
            _ => None,
        }).collect::<Vec<_>>();
        assert_eq!(filters, vec![expected.clone(), expected.clone()]);

        s.dispatch(Intent::Search("bogo".to_string())).unwrap();
        let e = s.dispatch(Intent::ChooseResult("11001".to_string())).unwrap();
        assert!(e.commands.contains(&MapCommand::SetFilter { layer: LAYER_HIGHLIGHT.to_string(), filter: expected }));
    }

    #[test]
    fn click_does_not_fly_while_searching() {
        let mut s = loaded_state();
        s.dispatch(Intent::Search("bel".to_string())).unwrap();
        let e = s.dispatch(Intent::ClickMunicipality {
            properties: props(json!({ "MpCodigo": "05088", "MpNombre": "BELLO", "Depto": "ANTIOQUIA" })),
            lng_lat: [-75.5, 6.3],
        }).unwrap();
        assert!(fly_targets(&e.commands).is_empty());
        assert_eq!(e.commands.len(), 2);
    }

    #[test]
    fn last_selection_wins() {
        let mut s = loaded_state();
        s.dispatch(Intent::ClickMunicipality {
            properties: props(json!({ "MpCodigo": "05001", "MpNombre": "MEDELLÍN", "Depto": "ANTIOQUIA", "MpArea": 374.83, "MpAltitud": 1495 })),
            lng_lat: [0.0, 0.0],
        }).unwrap();
        s.dispatch(Intent::ClickMunicipality {
            properties: props(json!({ "MpCodigo": "05088", "MpNombre": "BELLO", "Depto": "ANTIOQUIA", "MpArea": 142.36 })),
            lng_lat: [0.0, 0.0],
        }).unwrap();
        let sel = s.selected.clone().unwrap();
        assert_eq!(sel.code, "05088");
        assert_eq!(sel.name, "BELLO");
        assert_eq!(sel.area, Some(142.36));
        assert_eq!(sel.altitude, None);
        assert_eq!(s.highlighted, "05088");
    }

    #[test]
    fn click_without_code_is_ignored() {
        let mut s = loaded_state();
        let e = s.dispatch(Intent::ClickMunicipality { properties: props(json!({ "MpNombre": "X" })), lng_lat: [0.0, 0.0] }).unwrap();
        assert_eq!(e, Effects::default());
        assert!(s.selected.is_none());
    }

    #[test]
    fn search_results_follow_query() {
        let mut s = loaded_state();
        s.dispatch(Intent::Search("a".to_string())).unwrap();
        assert!(s.search_results.is_empty());
        s.dispatch(Intent::Search("ANTIO".to_string())).unwrap();
        assert_eq!(s.search_results, vec!["05001", "05088"]);
        assert_eq!(s.search_result_list().len(), 2);
    }

    #[test]
    fn choosing_a_result() {
        let mut s = loaded_state();
        s.dispatch(Intent::Search("bell".to_string())).unwrap();
        let e = s.dispatch(Intent::ChooseResult("05088".to_string())).unwrap();
        assert_eq!(s.search_query, "BELLO - ANTIOQUIA");
        assert!(s.search_results.is_empty());
        assert_eq!(e.lifted.map(|s| s.code), Some("05088".to_string()));
        assert_eq!(fly_targets(&e.commands), vec![([-75.56, 6.33], 11.0)]);
        assert!(s.dispatch(Intent::ChooseResult("00000".to_string())).is_err());
    }

    #[test]
    fn import_installs_overlay_and_fits_bounds() {
        let mut s = loaded_state();
        let e = s.dispatch(Intent::ImportOverlay(sample_overlay())).unwrap();
        assert!(matches!(e.commands[0], MapCommand::AddSource { .. }));
        assert!(e.commands.contains(&MapCommand::FitBounds { bounds: [[-76.0, 3.0], [-72.5, 7.5]], padding: 40.0, duration_ms: 1000 }));
        assert!(s.overlay.is_some());
        assert!(approx_eq!(f64, s.opacity, 0.6, ulps = 2));
    }

    #[test]
    fn bad_import_keeps_previous_overlay() {
        let mut s = loaded_state();
        s.dispatch(Intent::ImportOverlay(sample_overlay())).unwrap();
        let before = s.overlay.clone();
        assert!(s.dispatch(Intent::ImportOverlay("{ roto".to_string())).is_err());
        assert_eq!(s.overlay, before);
    }

    #[test]
    fn import_before_load_is_skipped() {
        let mut k = Konfiguration::default();
        k.color_seed = Some(1);
        let mut s = ViewerState::new(k);
        let e = s.dispatch(Intent::ImportOverlay(sample_overlay())).unwrap();
        assert!(e.commands.is_empty());
        assert!(s.overlay.is_none());
        let e = s.dispatch(Intent::Navigate).unwrap();
        assert!(e.commands.is_empty());
    }

    #[test]
    fn reimport_replaces_overlay_and_colors() {
        let mut s = loaded_state();
        s.dispatch(Intent::ImportOverlay(sample_overlay())).unwrap();
        s.dispatch(Intent::Classify(Some("uso".to_string()))).unwrap();
        assert_eq!(s.color_map.as_ref().map(|c| c.len()), Some(3));

        let second = r#"{ "type": "FeatureCollection", "features": [
            { "type": "Feature", "properties": { "tipo": "x" }, "geometry": { "type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]] } }
        ] }"#;
        let e = s.dispatch(Intent::ImportOverlay(second.to_string())).unwrap();
        assert_eq!(e.commands[0], MapCommand::RemoveLayer { id: LAYER_OVERLAY_FILL.to_string() });
        assert_eq!(e.commands[1], MapCommand::RemoveSource { id: SOURCE_OVERLAY.to_string() });
        assert!(s.color_map.is_none());
        assert!(!s.classify_enabled);
        assert_eq!(s.overlay.as_ref().map(|o| o.fields.clone()), Some(vec!["tipo".to_string()]));
    }

    #[test]
    fn classification_paints_match_expression() {
        let mut s = loaded_state();
        s.dispatch(Intent::ImportOverlay(sample_overlay())).unwrap();
        let e = s.dispatch(Intent::Classify(Some("uso".to_string()))).unwrap();
        match &e.commands[..] {
            [MapCommand::SetPaintProperty { layer, property, value }] => {
                assert_eq!(layer, LAYER_OVERLAY_FILL);
                assert_eq!(property, "fill-color");
                assert_eq!(value[0], "match");
            },
            other => panic!("unexpected commands {other:?}"),
        }
        let e = s.dispatch(Intent::ToggleClassification(false)).unwrap();
        assert!(s.color_map.is_none());
        assert_eq!(e.commands, vec![MapCommand::SetPaintProperty {
            layer: LAYER_OVERLAY_FILL.to_string(),
            property: "fill-color".to_string(),
            value: json!("#cccccc"),
        }]);
    }

    #[test]
    fn opacity_is_clamped() {
        let mut s = loaded_state();
        assert!(s.dispatch(Intent::SetOpacity(0.3)).unwrap().commands.is_empty());
        s.dispatch(Intent::ImportOverlay(sample_overlay())).unwrap();
        let e = s.dispatch(Intent::SetOpacity(1.7)).unwrap();
        assert_eq!(e.commands, vec![MapCommand::SetPaintProperty {
            layer: LAYER_OVERLAY_FILL.to_string(),
            property: "fill-opacity".to_string(),
            value: json!(1.0),
        }]);
    }

    #[test]
    fn overlay_click_opens_popup() {
        let mut s = loaded_state();
        let p = props(json!({ "uso": "bosque", "nombre": null }));
        assert!(s.dispatch(Intent::ClickOverlay { properties: p.clone(), lng_lat: [1.0, 2.0] }).unwrap().commands.is_empty());
        s.dispatch(Intent::ImportOverlay(sample_overlay())).unwrap();
        let e = s.dispatch(Intent::ClickOverlay { properties: p, lng_lat: [1.0, 2.0] }).unwrap();
        match &e.commands[..] {
            [MapCommand::ShowPopup { lng_lat, html }] => {
                assert_eq!(*lng_lat, [1.0, 2.0]);
                assert!(html.contains("N/D"));
            },
            other => panic!("unexpected commands {other:?}"),
        }
        let e = s.dispatch(Intent::ImportOverlay(sample_overlay())).unwrap();
        assert_eq!(e.commands[0], MapCommand::ClosePopup);
    }

    #[test]
    fn navigate_replaces_marker() {
        let mut s = loaded_state();
        s.dispatch(Intent::SetDmsField(DmsField::LatDegrees, "4".to_string())).unwrap();
        s.dispatch(Intent::SetDmsField(DmsField::LatMinutes, "30".to_string())).unwrap();
        s.dispatch(Intent::SetDmsField(DmsField::LonDegrees, "74".to_string())).unwrap();
        s.dispatch(Intent::SetDmsField(DmsField::LonMinutes, "30".to_string())).unwrap();
        let e = s.dispatch(Intent::Navigate).unwrap();
        assert_eq!(e.commands, vec![
            MapCommand::PlaceMarker { lng_lat: [-74.5, 4.5] },
            MapCommand::FlyTo { center: [-74.5, 4.5], zoom: 10.0 },
        ]);
        s.dispatch(Intent::SetHemisphere("S".to_string())).unwrap();
        let e = s.dispatch(Intent::Navigate).unwrap();
        assert_eq!(e.commands[0], MapCommand::RemoveMarker);
        assert_eq!(s.marker, Some(Marker { lng_lat: [-74.5, -4.5] }));
        assert!(s.dispatch(Intent::SetHemisphere("X".to_string())).is_err());
    }

    #[test]
    fn hover_sets_and_clears_cursor() {
        let mut s = loaded_state();
        let e = s.dispatch(Intent::HoverMunicipalities(true)).unwrap();
        assert_eq!(e.commands, vec![MapCommand::SetCursor { cursor: "crosshair".to_string() }]);
        let e = s.dispatch(Intent::HoverOverlay(true)).unwrap();
        assert_eq!(e.commands, vec![MapCommand::SetCursor { cursor: "pointer".to_string() }]);
        let e = s.dispatch(Intent::HoverOverlay(false)).unwrap();
        assert_eq!(e.commands, vec![MapCommand::SetCursor { cursor: String::new() }]);
    }

    #[test]
    fn map_loaded_only_once() {
        let mut s = loaded_state();
        assert_eq!(s.dispatch(Intent::MapLoaded).unwrap(), Effects::default());
    }
}
