use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::Value;

/// Injected geospatial capability: coordinates to an administrative-region
/// label. A miss is the normal outcome for cells with unknown placement.
pub trait RegionLookup {
    fn classify(&self, lon: f64, lat: f64) -> Option<String>;
}

struct Region {
    name: String,
    rings: Vec<Vec<(f64, f64)>>,
}

/// Administrative-region polygons loaded from a GeoJSON FeatureCollection.
pub struct RegionIndex {
    regions: Vec<Region>,
}

impl RegionIndex {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading regions file {}", path.display()))?;
        Self::from_geojson(&text)
    }

    pub fn from_geojson(text: &str) -> Result<Self> {
        let doc: Value = serde_json::from_str(text).context("regions file is not valid JSON")?;
        let features = doc["features"]
            .as_array()
            .context("regions file has no features array")?;

        let mut regions = Vec::with_capacity(features.len());
        for feature in features {
            let name = feature["properties"]["name"]
                .as_str()
                .context("region feature without a name property")?
                .to_string();
            let geometry = &feature["geometry"];
            let rings = match geometry["type"].as_str() {
                Some("Polygon") => polygon_rings(&geometry["coordinates"])?,
                Some("MultiPolygon") => {
                    let mut rings = Vec::new();
                    for polygon in geometry["coordinates"].as_array().into_iter().flatten() {
                        rings.extend(polygon_rings(polygon)?);
                    }
                    rings
                }
                other => bail!("unsupported region geometry: {:?}", other),
            };
            regions.push(Region { name, rings });
        }
        Ok(RegionIndex { regions })
    }
}

impl RegionLookup for RegionIndex {
    fn classify(&self, lon: f64, lat: f64) -> Option<String> {
        self.regions
            .iter()
            .find(|region| contains(&region.rings, lon, lat))
            .map(|region| region.name.clone())
    }
}

fn polygon_rings(coordinates: &Value) -> Result<Vec<Vec<(f64, f64)>>> {
    let mut rings = Vec::new();
    for ring in coordinates.as_array().into_iter().flatten() {
        let mut points = Vec::new();
        for point in ring.as_array().into_iter().flatten() {
            let lon = point[0].as_f64().context("non-numeric coordinate")?;
            let lat = point[1].as_f64().context("non-numeric coordinate")?;
            points.push((lon, lat));
        }
        rings.push(points);
    }
    Ok(rings)
}

/// Even-odd containment over all rings, so holes subtract naturally.
fn contains(rings: &[Vec<(f64, f64)>], lon: f64, lat: f64) -> bool {
    let mut inside = false;
    for ring in rings {
        if point_in_ring(ring, lon, lat) {
            inside = !inside;
        }
    }
    inside
}

fn point_in_ring(ring: &[(f64, f64)], lon: f64, lat: f64) -> bool {
    let mut inside = false;
    let mut j = ring.len().wrapping_sub(1);
    for i in 0..ring.len() {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];
        if (yi > lat) != (yj > lat) && lon < (xj - xi) * (lat - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

// ── Tests ──
