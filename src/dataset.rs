use geojson::{Feature, GeoJson, Geometry, JsonObject, JsonValue, Value};
use serde_derive::{Deserialize, Serialize};

pub const KEY_CODE: &str = "MpCodigo";
pub const KEY_NAME: &str = "MpNombre";
pub const KEY_DEPARTMENT: &str = "Depto";
pub const KEY_AREA: &str = "MpArea";
pub const KEY_ALTITUDE: &str = "MpAltitud";

#[derive(Debug, Clone, PartialEq)]
pub struct Municipality {
    pub code: String,
    pub name: String,
    pub department: String,
    /// km²
    pub area: Option<f64>,
    /// m
    pub altitude: Option<f64>,
    pub geometry: Option<Geometry>,
}

/// Attributes of the municipality shown on the dashboard. Serialized with
/// the dataset keys so the host sees the same names as the map layers.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedFeature {
    #[serde(rename = "MpCodigo")]
    pub code: String,
    #[serde(rename = "MpNombre")]
    pub name: String,
    #[serde(rename = "Depto")]
    pub department: String,
    #[serde(rename = "MpArea", default)]
    pub area: Option<f64>,
    #[serde(rename = "MpAltitud", default)]
    pub altitude: Option<f64>,
}

impl SelectedFeature {

    /// Normalizes the properties of a clicked feature. Returns `None` when
    /// the feature has no code, since nothing could be highlighted.
    pub fn from_properties(props: &JsonObject) -> Option<SelectedFeature> {
        let code = props.get(KEY_CODE).and_then(value_to_string)?;
        if code.is_empty() {
            return None;
        }
        Some(SelectedFeature {
            code,
            name: props.get(KEY_NAME).and_then(value_to_string).unwrap_or_default(),
            department: props.get(KEY_DEPARTMENT).and_then(value_to_string).unwrap_or_default(),
            area: props.get(KEY_AREA).and_then(value_to_f64),
            altitude: props.get(KEY_ALTITUDE).and_then(value_to_f64),
        })
    }

    pub fn from_json(s: &str) -> Result<SelectedFeature, String> {
        let props = serde_json::from_str::<JsonObject>(s).map_err(|e| e.to_string())?;
        SelectedFeature::from_properties(&props)
            .ok_or_else(|| format!("feature has no {KEY_CODE}"))
    }
}

impl Municipality {

    pub fn from_feature(f: &Feature) -> Option<Municipality> {
        let props = f.properties.as_ref()?;
        let sel = SelectedFeature::from_properties(props)?;
        Some(Municipality {
            code: sel.code,
            name: sel.name,
            department: sel.department,
            area: sel.area,
            altitude: sel.altitude,
            geometry: f.geometry.clone(),
        })
    }

    pub fn selected(&self) -> SelectedFeature {
        SelectedFeature {
            code: self.code.clone(),
            name: self.name.clone(),
            department: self.department.clone(),
            area: self.area,
            altitude: self.altitude,
        }
    }

    /// First coordinate of the first ring, as [lng, lat].
    pub fn first_coordinate(&self) -> Option<[f64; 2]> {
        let first_ring = match &self.geometry.as_ref()?.value {
            Value::Polygon(rings) => rings.first()?,
            Value::MultiPolygon(polys) => polys.first()?.first()?,
            _ => return None,
        };
        let pos = first_ring.first()?;
        Some([*pos.get(0)?, *pos.get(1)?])
    }

    pub fn search_label(&self) -> String {
        format!("{} - {}", self.name, self.department)
    }
}

/// Parses the municipality dataset. Features without a code are skipped.
pub fn parse_municipalities(s: &str) -> Result<Vec<Municipality>, String> {
    let geojson = s.parse::<GeoJson>().map_err(|e| e.to_string())?;
    let features = match geojson {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(_) => return Err("municipality dataset contains no features".to_string()),
    };
    Ok(features.iter().filter_map(Municipality::from_feature).collect())
}

pub fn value_to_string(v: &JsonValue) -> Option<String> {
    match v {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(format_number(n)),
        JsonValue::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

fn value_to_f64(v: &JsonValue) -> Option<f64> {
    match v {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Integral numbers print without a fractional part, as the engine's
/// `to-string` does.
pub fn format_number(n: &serde_json::Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}
