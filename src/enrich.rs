use std::collections::HashMap;

use serde::Serialize;

/// Antenna placement attributes joined onto a canonical record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PhysicalParams {
    pub azimuth: Option<f64>,
    pub height: Option<f64>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
}

/// Placement tables for one technology: a cell-keyed table and a coarser
/// site-keyed table used as a coordinates-only fallback.
#[derive(Debug, Default)]
pub struct AtollData {
    pub cells: HashMap<String, PhysicalParams>,
    pub sites: HashMap<String, (Option<f64>, Option<f64>)>,
}

impl AtollData {
    /// Placement for one cell. Cell-keyed entry first; when it is absent or
    /// either coordinate is missing, the site entry supplies coordinates.
    /// Azimuth and height are sector-specific and never come from the site
    /// table. Unknown everywhere yields the all-None default.
    pub fn lookup(&self, cell_name: Option<&str>, site_name: Option<&str>) -> PhysicalParams {
        let mut params = cell_name
            .and_then(|name| self.cells.get(name))
            .copied()
            .unwrap_or_default();

        if params.longitude.is_none() || params.latitude.is_none() {
            if let Some((lon, lat)) = site_name.and_then(|name| self.sites.get(name)) {
                if lon.is_some() {
                    params.longitude = *lon;
                }
                if lat.is_some() {
                    params.latitude = *lat;
                }
            }
        }
        params
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> AtollData {
        let mut atoll = AtollData::default();
        atoll.cells.insert(
            "ALM001A".into(),
            PhysicalParams {
                azimuth: Some(120.0),
                height: Some(25.0),
                longitude: Some(76.9),
                latitude: Some(43.2),
            },
        );
        atoll.cells.insert(
            "AST010B".into(),
            PhysicalParams {
                azimuth: Some(12.0),
                height: Some(30.0),
                longitude: None,
                latitude: None,
            },
        );
        atoll
            .sites
            .insert("AST010".into(), (Some(71.5), Some(51.2)));
        atoll
    }

    #[test]
    fn cell_entry_with_coordinates_wins() {
        let atoll = table();
        // Site table would disagree; it must not be consulted.
        let params = atoll.lookup(Some("ALM001A"), Some("AST010"));
        assert_eq!(params.longitude, Some(76.9));
        assert_eq!(params.latitude, Some(43.2));
        assert_eq!(params.azimuth, Some(120.0));
    }

    #[test]
    fn site_fallback_fills_coordinates_only() {
        let atoll = table();
        let params = atoll.lookup(Some("AST010B"), Some("AST010"));
        assert_eq!(params.azimuth, Some(12.0));
        assert_eq!(params.height, Some(30.0));
        assert_eq!(params.longitude, Some(71.5));
        assert_eq!(params.latitude, Some(51.2));
    }

    #[test]
    fn unknown_cell_and_site_is_all_none() {
        let atoll = table();
        let params = atoll.lookup(Some("NOPE"), Some("NOPE"));
        assert_eq!(params, PhysicalParams::default());
    }

    #[test]
    fn missing_names_never_panic() {
        let atoll = table();
        assert_eq!(atoll.lookup(None, None), PhysicalParams::default());
    }
}
