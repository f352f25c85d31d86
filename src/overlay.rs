use geo::{coord, Rect};
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, Value};

/// User supplied GeoJSON rendered on top of the boundaries.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub collection: FeatureCollection,
    /// attribute names of the first feature
    pub fields: Vec<String>,
    pub bounds: Option<Rect<f64>>,
}

impl Overlay {

    pub fn parse(s: &str) -> Result<Overlay, String> {
        let geojson = s.trim_start_matches('\u{feff}')
            .parse::<GeoJson>()
            .map_err(|e| format!("GeoJSON inválido: {e}"))?;

        let collection = match geojson {
            GeoJson::FeatureCollection(fc) => fc,
            GeoJson::Feature(f) => FeatureCollection {
                bbox: None,
                features: vec![f],
                foreign_members: None,
            },
            GeoJson::Geometry(g) => FeatureCollection {
                bbox: None,
                features: vec![Feature {
                    bbox: None,
                    geometry: Some(g),
                    id: None,
                    properties: None,
                    foreign_members: None,
                }],
                foreign_members: None,
            },
        };

        let fields = collection.features
            .first()
            .and_then(|f| f.properties.as_ref())
            .map(|p| p.keys().cloned().collect::<Vec<_>>())
            .unwrap_or_default();

        let bounds = features_bounds(&collection.features);

        Ok(Overlay {
            collection,
            fields,
            bounds,
        })
    }

    pub fn features(&self) -> &[Feature] {
        &self.collection.features
    }

    /// [[west, south], [east, north]]
    pub fn fit_bounds(&self) -> Option<[[f64; 2]; 2]> {
        let r = self.bounds?;
        Some([[r.min().x, r.min().y], [r.max().x, r.max().y]])
    }

    pub fn to_geojson_value(&self) -> serde_json::Value {
        serde_json::to_value(&self.collection).unwrap_or(serde_json::Value::Null)
    }
}

/// Bounding box over every ring of every polygon and multipolygon.
pub fn features_bounds(features: &[Feature]) -> Option<Rect<f64>> {
    let mut bounds = None;
    for f in features.iter() {
        if let Some(g) = f.geometry.as_ref() {
            extend_with_geometry(&mut bounds, g);
        }
    }
    bounds
}

fn extend_with_geometry(bounds: &mut Option<Rect<f64>>, g: &Geometry) {
    match &g.value {
        Value::Polygon(rings) => {
            for ring in rings.iter() {
                for pos in ring.iter() {
                    extend_with_position(bounds, pos);
                }
            }
        },
        Value::MultiPolygon(polys) => {
            for rings in polys.iter() {
                for ring in rings.iter() {
                    for pos in ring.iter() {
                        extend_with_position(bounds, pos);
                    }
                }
            }
        },
        Value::GeometryCollection(geoms) => {
            for g in geoms.iter() {
                extend_with_geometry(bounds, g);
            }
        },
        _ => { },
    }
}

fn extend_with_position(bounds: &mut Option<Rect<f64>>, pos: &[f64]) {
    let (x, y) = match pos {
        [x, y, ..] if x.is_finite() && y.is_finite() => (*x, *y),
        _ => return,
    };
    *bounds = Some(match bounds.take() {
        None => Rect::new(coord! { x: x, y: y }, coord! { x: x, y: y }),
        Some(r) => Rect::new(
            coord! { x: r.min().x.min(x), y: r.min().y.min(y) },
            coord! { x: r.max().x.max(x), y: r.max().y.max(y) },
        ),
    });
}
