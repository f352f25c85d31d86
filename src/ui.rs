use geojson::{JsonObject, JsonValue};
use html_escape::{encode_single_quoted_attribute as attr, encode_text as text};

use crate::classify::ColorMap;
use crate::dataset::{value_to_string, Municipality, SelectedFeature};
use crate::dms::{DmsInput, LatHemisphere, LonHemisphere};

pub const PLACEHOLDER: &str = "N/D";

/// Attributes never shown in overlay popups.
const HIDDEN_FIELDS: &[&str] = &[
    "id", "fid", "objectid",
    "lat", "latitud", "latitude",
    "lon", "lng", "long", "longitud", "longitude",
];

pub fn is_hidden_field(name: &str) -> bool {
    let n = name.trim().to_lowercase();
    HIDDEN_FIELDS.iter().any(|h| *h == n)
}

// attribute panel next to the map
pub fn render_dashboard(feature: Option<&SelectedFeature>) -> String {
    let f = match feature {
        Some(s) => s,
        None => return normalize_for_js(format!("
            <div class='dashboard'>
                <p class='placeholder-text'>Seleccione un municipio</p>
            </div>
        ")),
    };

    let area = f.area.map(|a| format!("{a:.2} km²")).unwrap_or(PLACEHOLDER.to_string());
    let altitude = f.altitude.map(|a| format!("{a} m")).unwrap_or(PLACEHOLDER.to_string());

    normalize_for_js(format!("
        <div class='dashboard'>
            <div class='dashboard-content'>
                <h2>{name}</h2>
                <p><strong>Departamento:</strong> {department}</p>
                <p><strong>Código:</strong> {code}</p>
                <p><strong>Área:</strong> {area}</p>
                <p><strong>Altitud:</strong> {altitude}</p>
            </div>
        </div>
        ",
        name = text(&or_placeholder(&f.name)),
        department = text(&or_placeholder(&f.department)),
        code = text(&f.code),
    ))
}

pub fn render_suggestions(results: &[&Municipality]) -> String {
    if results.is_empty() {
        return String::new();
    }
    let items = results.iter().map(|m| {
        format!(
            "<li class='suggestion' data-code='{code}' onmousedown='chooseMunicipio(event)'>{label}</li>",
            code = attr(&m.code),
            label = text(&m.search_label()),
        )
    }).collect::<Vec<_>>().join("");

    normalize_for_js(format!("<ul class='suggestions'>{items}</ul>"))
}

/// Classify toggle plus, while classification is on, the field picker.
pub fn render_field_list(fields: &[String], enabled: bool, active: Option<&str>) -> String {
    if fields.is_empty() {
        return String::new();
    }

    let checked = if enabled { " checked" } else { "" };
    let select = if enabled {
        let options = fields.iter().map(|f| {
            let selected = if Some(f.as_str()) == active { " selected" } else { "" };
            format!("<option value='{v}'{selected}>{t}</option>", v = attr(f), t = text(f))
        }).collect::<Vec<_>>().join("");
        format!("
            <select class='field-list' onchange='classifyOverlay(event)'>
                <option value=''>Seleccione un campo</option>
                {options}
            </select>
        ")
    } else {
        String::new()
    };

    normalize_for_js(format!("
        <div class='classify'>
            <label><input type='checkbox' onchange='toggleClassification(event)'{checked}></input> Clasificar</label>
            {select}
        </div>
    "))
}

pub fn render_overlay_popup(properties: &JsonObject, color_map: Option<&ColorMap>) -> String {
    let mut rows = Vec::new();

    if let Some(cm) = color_map {
        let value = properties.get(&cm.field);
        let color = cm.color_for(value);
        rows.push(format!(
            "<p><span class='swatch' style='display:inline-block;width:12px;height:12px;background:{color};margin-right:5px;'></span><strong>{field}:</strong> {value}</p>",
            color = attr(color),
            field = text(&cm.field),
            value = text(&display_value(value)),
        ));
    }

    for (k, v) in properties.iter() {
        if is_hidden_field(k) || color_map.map(|c| c.field == *k).unwrap_or(false) {
            continue;
        }
        rows.push(format!(
            "<p><strong>{k}:</strong> {v}</p>",
            k = text(k),
            v = text(&display_value(Some(v))),
        ));
    }

    normalize_for_js(format!("<div class='popup-content'>{}</div>", rows.join("")))
}

pub fn render_dms_form(dms: &DmsInput) -> String {
    let n = if dms.lat_hemisphere == LatHemisphere::N { " selected" } else { "" };
    let s = if dms.lat_hemisphere == LatHemisphere::S { " selected" } else { "" };
    let e = if dms.lon_hemisphere == LonHemisphere::E { " selected" } else { "" };
    let w = if dms.lon_hemisphere == LonHemisphere::W { " selected" } else { "" };

    let input = |field: &str, value: u32, max: u32| format!(
        "<input type='number' min='0' max='{max}' value='{value}' data-dms-field='{field}' onchange='editDmsField(event)'></input>"
    );

    normalize_for_js(format!("
        <div class='dms'>
            <div>
                <label>Latitud</label>
                {lat_d}° {lat_m}' {lat_s}\"
                <select onchange='editHemisphere(event)'><option value='N'{n}>N</option><option value='S'{s}>S</option></select>
            </div>
            <div>
                <label>Longitud</label>
                {lon_d}° {lon_m}' {lon_s}\"
                <select onchange='editHemisphere(event)'><option value='E'{e}>E</option><option value='W'{w}>W</option></select>
            </div>
            <button onclick='navigateDms(event)'>Ir</button>
        </div>
    ",
        lat_d = input("lat-degrees", dms.lat.degrees, crate::dms::MAX_LAT_DEGREES),
        lat_m = input("lat-minutes", dms.lat.minutes, crate::dms::MAX_MINUTES_SECONDS),
        lat_s = input("lat-seconds", dms.lat.seconds, crate::dms::MAX_MINUTES_SECONDS),
        lon_d = input("lon-degrees", dms.lon.degrees, crate::dms::MAX_LON_DEGREES),
        lon_m = input("lon-minutes", dms.lon.minutes, crate::dms::MAX_MINUTES_SECONDS),
        lon_s = input("lon-seconds", dms.lon.seconds, crate::dms::MAX_MINUTES_SECONDS),
    ))
}

fn display_value(v: Option<&JsonValue>) -> String {
    v.and_then(value_to_string).unwrap_or(PLACEHOLDER.to_string())
}

fn or_placeholder(s: &str) -> String {
    if s.trim().is_empty() { PLACEHOLDER.to_string() } else { s.to_string() }
}

pub fn normalize_for_js(s: String) -> String {
    s.lines()
        .map(|s| s.trim().replace('`', "'"))
        .collect::<Vec<_>>()
        .join("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::js_env::color_rng;
    use serde_json::json;

    fn props(v: JsonValue) -> JsonObject {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn dashboard_placeholder_and_content() {
        assert!(render_dashboard(None).contains("Seleccione un municipio"));
        let f = SelectedFeature {
            code: "05001".to_string(),
            name: "MEDELLÍN".to_string(),
            department: "ANTIOQUIA".to_string(),
            area: Some(374.834),
            altitude: Some(1495.0),
        };
        let html = render_dashboard(Some(&f));
        assert!(html.contains("<h2>MEDELLÍN</h2>"));
        assert!(html.contains("374.83 km²"));
        assert!(html.contains("1495 m"));
        assert!(html.contains("05001"));
    }

    #[test]
    fn dashboard_missing_values() {
        let f = SelectedFeature { code: "1".to_string(), ..Default::default() };
        let html = render_dashboard(Some(&f));
        assert_eq!(html.matches(PLACEHOLDER).count(), 4);
    }

    #[test]
    fn popup_hides_identifier_and_coordinate_fields() {
        let p = props(json!({ "ID": 4, "Latitud": 4.5, "lng": -74.0, "nombre": "Lote <1>", "area": null }));
        let html = render_overlay_popup(&p, None);
        assert!(!html.contains("ID:"));
        assert!(!html.contains("Latitud"));
        assert!(!html.contains("lng"));
        assert!(html.contains("<strong>nombre:</strong> Lote &lt;1&gt;"));
        assert!(html.contains("<strong>area:</strong> N/D"));
    }

    #[test]
    fn popup_keeps_attribute_order() {
        let html = render_overlay_popup(&props(json!({ "zona": "norte", "altura": 12, "barrio": "centro" })), None);
        let zona = html.find("zona:").unwrap();
        let altura = html.find("altura:").unwrap();
        let barrio = html.find("barrio:").unwrap();
        assert!(zona < altura && altura < barrio);
    }

    #[test]
    fn popup_leads_with_classification() {
        let features = "{ \"type\": \"FeatureCollection\", \"features\": [{ \"type\": \"Feature\", \"properties\": { \"uso\": \"bosque\" }, \"geometry\": null }] }"
            .parse::<geojson::FeatureCollection>().unwrap().features;
        let cm = ColorMap::build(&features, "uso", "#cccccc", &mut color_rng(Some(5)));
        let color = cm.entries[0].1.clone();
        let html = render_overlay_popup(&props(json!({ "uso": "bosque", "tipo": "b" })), Some(&cm));
        assert!(html.starts_with("<div class='popup-content'><p><span class='swatch'"));
        assert!(html.contains(&color));
        assert_eq!(html.matches("uso").count(), 1);
        assert!(html.contains("<strong>tipo:</strong> b"));
    }

    #[test]
    fn suggestions_are_escaped() {
        let m = Municipality {
            code: "1'2".to_string(),
            name: "A&B".to_string(),
            department: "C".to_string(),
            area: None,
            altitude: None,
            geometry: None,
        };
        let html = render_suggestions(&[&m]);
        assert!(html.contains("A&amp;B - C"));
        assert!(!html.contains("data-code='1'2'"));
        assert_eq!(render_suggestions(&[]), "");
    }

    #[test]
    fn field_list_marks_active_field() {
        let fields = vec!["uso".to_string(), "tipo".to_string()];
        assert!(!render_field_list(&fields, false, None).contains("<select"));
        let html = render_field_list(&fields, true, Some("tipo"));
        assert!(html.contains("<option value='tipo' selected>tipo</option>"));
        assert!(html.contains(" checked"));
        assert_eq!(render_field_list(&[], true, None), "");
    }

    #[test]
    fn dms_form_reflects_input() {
        let mut dms = DmsInput::default();
        dms.set_field(crate::dms::DmsField::LatDegrees, "4");
        let html = render_dms_form(&dms);
        assert!(html.contains("value='4' data-dms-field='lat-degrees'"));
        assert!(html.contains("<option value='W' selected>W</option>"));
    }
}
