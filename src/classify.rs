use geojson::{Feature, JsonValue};
use rand::Rng;
use serde_derive::{Deserialize, Serialize};
use serde_json::json;

use crate::dataset::value_to_string;

/// Distinct values of one overlay attribute, each with its own color.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorMap {
    pub field: String,
    /// (value, "#rrggbb") in order of first occurrence
    pub entries: Vec<(String, String)>,
    pub fallback: String,
}

impl ColorMap {

    pub fn build<R: Rng>(features: &[Feature], field: &str, fallback: &str, rng: &mut R) -> ColorMap {
        let entries = distinct_values(features, field)
            .into_iter()
            .map(|v| (v, random_hex_color(rng)))
            .collect();
        ColorMap {
            field: field.to_string(),
            entries,
            fallback: fallback.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn color_for(&self, value: Option<&JsonValue>) -> &str {
        let key = match value.and_then(value_to_string) {
            Some(s) => s,
            None => return &self.fallback,
        };
        self.entries
            .iter()
            .find(|(v, _)| *v == key)
            .map(|(_, c)| c.as_str())
            .unwrap_or(&self.fallback)
    }

    /// `fill-color` for the overlay layer
    pub fn paint_expression(&self) -> JsonValue {
        if self.entries.is_empty() {
            return JsonValue::String(self.fallback.clone());
        }
        let mut expr = vec![
            json!("match"),
            json!(["to-string", ["get", self.field]]),
        ];
        for (value, color) in self.entries.iter() {
            expr.push(json!(value));
            expr.push(json!(color));
        }
        expr.push(json!(self.fallback));
        JsonValue::Array(expr)
    }
}

pub fn distinct_values(features: &[Feature], field: &str) -> Vec<String> {
    let mut seen = Vec::<String>::new();
    for f in features.iter() {
        let v = match f.properties.as_ref().and_then(|p| p.get(field)).and_then(value_to_string) {
            Some(s) => s,
            None => continue,
        };
        if !seen.contains(&v) {
            seen.push(v);
        }
    }
    seen
}

pub fn random_hex_color<R: Rng>(rng: &mut R) -> String {
    format!("#{:06x}", rng.gen_range(0..=0xffffffu32))
}
