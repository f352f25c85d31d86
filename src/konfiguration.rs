use serde_derive::{Deserialize, Serialize};

use crate::js_env::log_status;

pub const FALLBACK_COLOR: &str = "#cccccc";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Konfiguration {
    pub map: MapKonfiguration,
    pub zoom: ZoomKonfiguration,
    pub overlay: OverlayKonfiguration,
    pub highlight: HighlightKonfiguration,
    /// Seed for classification colors. Unset means a fresh seed per session.
    pub color_seed: Option<u64>,
}

impl Default for Konfiguration {
    fn default() -> Self {
        Konfiguration {
            map: MapKonfiguration::default(),
            zoom: ZoomKonfiguration::default(),
            overlay: OverlayKonfiguration::default(),
            highlight: HighlightKonfiguration::default(),
            color_seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapKonfiguration {
    pub style_url: String,
    pub departamentos_url: String,
    pub municipios_url: String,
    /// [lng, lat]
    pub center: [f64; 2],
    pub zoom: f64,
}

impl Default for MapKonfiguration {
    fn default() -> Self {
        MapKonfiguration {
            style_url: "https://demotiles.maplibre.org/style.json".to_string(),
            departamentos_url: "/departamentos.geojson".to_string(),
            municipios_url: "/municipios.json".to_string(),
            center: [-74.2973, 4.5709],
            zoom: 4.0,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomKonfiguration {
    pub click: f64,
    pub search: f64,
    pub navigate: f64,
}

impl Default for ZoomKonfiguration {
    fn default() -> Self {
        ZoomKonfiguration {
            click: 12.0,
            search: 11.0,
            navigate: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayKonfiguration {
    pub default_opacity: f64,
    pub fallback_color: String,
    pub fit_padding: f64,
    pub fit_duration_ms: u32,
}

impl Default for OverlayKonfiguration {
    fn default() -> Self {
        OverlayKonfiguration {
            default_opacity: 0.6,
            fallback_color: FALLBACK_COLOR.to_string(),
            fit_padding: 40.0,
            fit_duration_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightKonfiguration {
    pub fill_color: String,
    pub fill_opacity: f64,
    pub outline_color: String,
}

impl Default for HighlightKonfiguration {
    fn default() -> Self {
        HighlightKonfiguration {
            fill_color: "#007bff".to_string(),
            fill_opacity: 0.4,
            outline_color: "#0056b3".to_string(),
        }
    }
}

impl Konfiguration {

    pub fn from_string(s: &str) -> Konfiguration {
        if s.trim().is_empty() {
            return Konfiguration::default();
        }
        match serde_json::from_str::<Konfiguration>(s) {
            Ok(o) => o.validated(),
            Err(e) => {
                log_status(&format!("invalid configuration, using defaults: {e}"));
                Konfiguration::default()
            }
        }
    }

    /// Replaces colors the engine would reject and clamps opacities.
    pub fn validated(mut self) -> Konfiguration {
        let defaults = Konfiguration::default();
        self.overlay.fallback_color = normalize_color(&self.overlay.fallback_color)
            .unwrap_or(defaults.overlay.fallback_color);
        self.highlight.fill_color = normalize_color(&self.highlight.fill_color)
            .unwrap_or(defaults.highlight.fill_color);
        self.highlight.outline_color = normalize_color(&self.highlight.outline_color)
            .unwrap_or(defaults.highlight.outline_color);
        self.overlay.default_opacity = clamp_opacity(self.overlay.default_opacity);
        self.highlight.fill_opacity = clamp_opacity(self.highlight.fill_opacity);
        self
    }
}

fn normalize_color(s: &str) -> Option<String> {
    match csscolorparser::parse(s.trim()) {
        Ok(c) => Some(c.to_hex_string()),
        Err(e) => {
            log_status(&format!("invalid color {s:?}: {e}"));
            None
        }
    }
}

pub fn clamp_opacity(v: f64) -> f64 {
    if v.is_nan() {
        return 0.0;
    }
    v.max(0.0).min(1.0)
}
