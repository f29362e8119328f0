//! Partition pipeline: extract one (source, technology) batch, join
//! placement data, classify regions, drop duplicates and swap the batch
//! into the database.

use std::collections::HashSet;
use std::path::Path;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use tracing::{error, info};

use crate::db;
use crate::enrich::AtollData;
use crate::model::{CellRecord, Source, Technology};
use crate::parser;
use crate::region::RegionLookup;

/// Every partition the network actually has. Update order puts the small
/// operator feeds first so a broken shared export surfaces early.
pub const PARTITIONS: &[(Source, Technology)] = &[
    (Source::Tele2, Technology::Nr),
    (Source::Tele2, Technology::Lte),
    (Source::Tele2, Technology::Wcdma),
    (Source::Tele2, Technology::Gsm),
    (Source::BeelineNokia, Technology::Lte),
    (Source::BeelineNokia, Technology::Wcdma),
    (Source::BeelineNokia, Technology::Gsm),
    (Source::BeelineHuawei, Technology::Lte),
    (Source::BeelineHuawei, Technology::Wcdma),
    (Source::Enm1, Technology::Nr),
    (Source::Enm1, Technology::Lte),
    (Source::Enm1, Technology::Wcdma),
    (Source::Enm1, Technology::Gsm),
    (Source::Enm2, Technology::Nr),
    (Source::Enm2, Technology::Lte),
    (Source::Enm2, Technology::Wcdma),
    (Source::Enm2, Technology::Gsm),
    (Source::Oss, Technology::Wcdma),
    (Source::Oss, Technology::Gsm),
    (Source::Zte, Technology::Wcdma),
    (Source::Zte, Technology::Gsm),
];

#[derive(Debug)]
pub struct PartitionReport {
    pub source: Source,
    pub technology: Technology,
    pub inserted: usize,
    pub dropped: usize,
    pub duplicates: usize,
}

/// Join placement attributes onto every record, classify the region where
/// both coordinates are known, and collapse exact duplicates. Returns the
/// final batch and the number of duplicates removed.
fn finalize(
    mut cells: Vec<CellRecord>,
    atoll: &AtollData,
    regions: Option<&dyn RegionLookup>,
) -> Result<(Vec<CellRecord>, usize)> {
    for cell in &mut cells {
        cell.set_physical(atoll.lookup(cell.cell_name(), cell.site_name()));
        if let Some(index) = regions {
            let params = *cell.physical();
            if let (Some(lon), Some(lat)) = (params.longitude, params.latitude) {
                cell.set_region(index.classify(lon, lat));
            }
        }
    }

    // Sources repeat instances across documents; first occurrence wins.
    let mut seen = HashSet::new();
    let before = cells.len();
    let mut unique = Vec::with_capacity(before);
    for cell in cells {
        if seen.insert(serde_json::to_string(&cell)?) {
            unique.push(cell);
        }
    }
    let duplicates = before - unique.len();
    Ok((unique, duplicates))
}

pub fn run_partition(
    conn: &Connection,
    source: Source,
    technology: Technology,
    input: &Path,
    regions: Option<&dyn RegionLookup>,
) -> Result<PartitionReport> {
    let extracted = parser::extract(conn, source, technology, input)?;
    let atoll = db::load_atoll(conn, technology)?;
    let (cells, duplicates) = finalize(extracted.cells, &atoll, regions)?;
    let inserted = db::replace_partition(conn, source.label(), technology, &cells)?;
    info!(
        source = source.label(),
        technology = technology.as_str(),
        inserted,
        dropped = extracted.dropped,
        duplicates,
        "partition updated",
    );
    Ok(PartitionReport {
        source,
        technology,
        inserted,
        dropped: extracted.dropped,
        duplicates,
    })
}

/// Update every partition from a directory tree laid out one subdirectory
/// per source. A failed partition keeps its previous rows and does not stop
/// the rest of the run.
pub fn run_all(
    conn: &Connection,
    root: &Path,
    regions: Option<&dyn RegionLookup>,
) -> Result<Vec<PartitionReport>> {
    let pb = ProgressBar::new(PARTITIONS.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let mut reports = Vec::new();
    for &(source, technology) in PARTITIONS {
        pb.set_message(format!("{source} {technology}"));
        let input = root.join(source.dir_name());
        match run_partition(conn, source, technology, &input, regions) {
            Ok(report) => reports.push(report),
            Err(err) => {
                error!(
                    source = source.label(),
                    technology = technology.as_str(),
                    "partition update failed: {err:#}",
                );
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();
    Ok(reports)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::PhysicalParams;
    use crate::model::LteCell;

    struct OneRegion;

    impl RegionLookup for OneRegion {
        fn classify(&self, lon: f64, _lat: f64) -> Option<String> {
            (lon > 70.0).then(|| "Almaty region".to_string())
        }
    }

    fn lte(cell_name: &str, site_name: &str) -> CellRecord {
        CellRecord::Lte(LteCell {
            subnetwork: Some("Kcell".into()),
            oss: "ENM1".into(),
            site_name: Some(site_name.into()),
            cell_name: Some(cell_name.into()),
            enodeb_id: Some(700),
            cell_id: Some("1".into()),
            eci: Some(179201),
            earfcn_dl: Some("1602".into()),
            phys_cell_id: Some("88".into()),
            tac: Some("2500".into()),
            root_seq_index: Some("204".into()),
            qrxlevmin: Some(-122),
            state: Some("UNLOCKED".into()),
            cell_range: None,
            ip_address: None,
            vendor: "Ericsson".into(),
            insert_date: "2024-01-10".into(),
            physical: PhysicalParams::default(),
            region: None,
        })
    }

    fn atoll() -> AtollData {
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
        atoll
    }

    #[test]
    fn duplicates_are_collapsed_to_first_occurrence() {
        let batch = vec![
            lte("ALM001A", "ALM001"),
            lte("ALM001A", "ALM001"),
            lte("ALM001B", "ALM001"),
        ];
        let (cells, duplicates) = finalize(batch, &atoll(), None).unwrap();
        assert_eq!(cells.len(), 2);
        assert_eq!(duplicates, 1);
    }

    #[test]
    fn placement_and_region_are_joined_when_known() {
        let batch = vec![lte("ALM001A", "ALM001"), lte("UNKNOWN", "NOWHERE")];
        let (cells, _) = finalize(batch, &atoll(), Some(&OneRegion)).unwrap();

        let CellRecord::Lte(known) = &cells[0] else {
            panic!("expected lte records");
        };
        assert_eq!(known.physical.azimuth, Some(120.0));
        assert_eq!(known.region.as_deref(), Some("Almaty region"));

        // No coordinates means no classification attempt.
        let CellRecord::Lte(unknown) = &cells[1] else {
            panic!("expected lte records");
        };
        assert_eq!(unknown.physical, PhysicalParams::default());
        assert_eq!(unknown.region, None);
    }

    #[test]
    fn enriched_copies_of_the_same_cell_still_deduplicate() {
        let batch = vec![lte("ALM001A", "ALM001"), lte("ALM001A", "ALM001")];
        let (cells, duplicates) = finalize(batch, &atoll(), Some(&OneRegion)).unwrap();
        assert_eq!(cells.len(), 1);
        assert_eq!(duplicates, 1);
    }
}
