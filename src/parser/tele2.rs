//! Extractors for Tele2 CSV inventories of the shared LTE and NR layers.
//! Column names are a fixed contract with the Tele2 export job: a missing
//! column fails the document, a malformed row is skipped and counted.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use csv::StringRecord;
use tracing::warn;

use crate::enrich::PhysicalParams;
use crate::model::{self, CellRecord, LteCell, NrCell};
use crate::parser::{dir_files, Extracted};

/// Numeric fields arrive as floats ("70042.0"); non-numeric text means the
/// value is not assigned.
fn round_num(value: &str) -> Option<i64> {
    value.trim().parse::<f64>().ok().map(|f| f.round() as i64)
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

struct Columns {
    index: HashMap<String, usize>,
}

impl Columns {
    fn parse(headers: &StringRecord) -> Columns {
        Columns {
            index: headers
                .iter()
                .enumerate()
                .map(|(i, name)| (name.trim().to_string(), i))
                .collect(),
        }
    }

    fn require(&self, name: &str) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .with_context(|| format!("export has no column {name}"))
    }

    fn value<'a>(&self, record: &'a StringRecord, index: usize) -> &'a str {
        record.get(index).unwrap_or_default()
    }
}

// ── LTE ──

pub fn extract_lte(input: &Path) -> Result<Extracted> {
    let files = dir_files(input, "lte", ".csv")?;
    if files.is_empty() {
        bail!("no LTE export found in {}", input.display());
    }
    let mut out = Extracted::default();
    for file in files {
        let batch = parse_lte(&file).with_context(|| format!("parsing {}", file.display()))?;
        out.merge(batch);
    }
    Ok(out)
}

fn parse_lte(path: &Path) -> Result<Extracted> {
    let mut reader = csv::Reader::from_path(path)?;
    let columns = Columns::parse(reader.headers()?);

    let ta_id = columns.require("Local tracking area ID")?;
    let admin_state = columns.require("Cell admin state")?;
    let enodeb_id = columns.require("eNodeB Id")?;
    let site_name = columns.require("NENAME")?;
    let cell_name = columns.require("Cell Name")?;
    let tac = columns.require("Tracking area code")?;
    let cell_id = columns.require("Cell ID")?;
    let eci = columns.require("eCI")?;
    let earfcn_dl = columns.require("Downlink EARFCN")?;
    let qrxlevmin = columns.require("CELLSEL Minimum required RX level(2dBm)")?;
    let root_seq = columns.require("Root sequence index")?;
    let pci = columns.require("Physical cell ID")?;
    let insert_date = model::today();

    let mut out = Extracted::default();
    for record in reader.records() {
        let record = record?;
        // Tracking area 2 is the Kcell share of the node.
        if columns.value(&record, ta_id) != "2" {
            continue;
        }
        // The threshold is stored halved, like on every Huawei node.
        let Some(qrx) = columns
            .value(&record, qrxlevmin)
            .trim()
            .parse::<i64>()
            .ok()
            .map(|v| v * 2)
        else {
            warn!(
                cell = columns.value(&record, cell_name),
                "skipping row with malformed RX level",
            );
            out.dropped += 1;
            continue;
        };
        let state = if columns.value(&record, admin_state) == "CELL_UNBLOCK" {
            "UNLOCKED"
        } else {
            "LOCKED"
        };
        out.cells.push(CellRecord::Lte(LteCell {
            subnetwork: Some("Tele2".to_string()),
            oss: "Tele2".to_string(),
            site_name: non_empty(columns.value(&record, site_name)),
            cell_name: non_empty(columns.value(&record, cell_name)),
            enodeb_id: round_num(columns.value(&record, enodeb_id)),
            cell_id: non_empty(columns.value(&record, cell_id)),
            eci: round_num(columns.value(&record, eci)),
            earfcn_dl: round_num(columns.value(&record, earfcn_dl)).map(|v| v.to_string()),
            phys_cell_id: non_empty(columns.value(&record, pci)),
            tac: non_empty(columns.value(&record, tac)),
            root_seq_index: round_num(columns.value(&record, root_seq)).map(|v| v.to_string()),
            qrxlevmin: Some(qrx),
            state: Some(state.to_string()),
            cell_range: None,
            ip_address: None,
            vendor: "Huawei".to_string(),
            insert_date: insert_date.clone(),
            physical: PhysicalParams::default(),
            region: None,
        }));
    }
    Ok(out)
}

// ── NR ──

pub fn extract_nr(input: &Path) -> Result<Extracted> {
    let mut files = dir_files(input, "nr", ".csv")?;
    if files.is_empty() {
        files = dir_files(input, "5g", ".csv")?;
    }
    if files.is_empty() {
        bail!("no NR export found in {}", input.display());
    }
    let mut out = Extracted::default();
    for file in files {
        let batch = parse_nr(&file).with_context(|| format!("parsing {}", file.display()))?;
        out.merge(batch);
    }
    Ok(out)
}

fn parse_nr(path: &Path) -> Result<Extracted> {
    let mut reader = csv::Reader::from_path(path)?;
    let columns = Columns::parse(reader.headers()?);

    let site_name = columns.require("NE Name")?;
    let cell_name = columns.require("Cell Name")?;
    let local_cell_id = columns.require("CI")?;
    let gnb_id = columns.require("gNodeB ID")?;
    let nci = columns.require("eCI")?;
    let pci = columns.require("Physical Cell ID")?;
    let tac = columns.require("TAC")?;
    let root_seq = columns.require("Logical Root Sequence Index")?;
    let qrxlevmin = columns.require("Minimum RX Level(2dBm)")?;
    let arfcn_dl = columns.require("DL NARFCN")?;
    let bandwidth = columns.require("Frequency Band")?;
    let max_tx_power = columns.require("Max Transmit Power(0.1dBm)")?;
    let insert_date = model::today();

    let mut out = Extracted::default();
    for record in reader.records() {
        let record = record?;
        out.cells.push(CellRecord::Nr(NrCell {
            subnetwork: Some("Tele2".to_string()),
            oss: "Tele2".to_string(),
            site_name: non_empty(columns.value(&record, site_name)),
            cell_name: non_empty(columns.value(&record, cell_name)),
            gnb_id: round_num(columns.value(&record, gnb_id)),
            local_cell_id: non_empty(columns.value(&record, local_cell_id)),
            nci: non_empty(columns.value(&record, nci)),
            pci: non_empty(columns.value(&record, pci)),
            tac: non_empty(columns.value(&record, tac)),
            root_seq_index: non_empty(columns.value(&record, root_seq)),
            qrxlevmin: columns.value(&record, qrxlevmin).trim().parse().ok(),
            arfcn_dl: non_empty(columns.value(&record, arfcn_dl)),
            bandwidth: non_empty(columns.value(&record, bandwidth)),
            max_tx_power: non_empty(columns.value(&record, max_tx_power)),
            ssb_frequency: None,
            cell_state: None,
            ip_address: None,
            vendor: "Huawei".to_string(),
            insert_date: insert_date.clone(),
            physical: PhysicalParams::default(),
            region: None,
        }));
    }
    Ok(out)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &Path, name: &str, content: &str) {
        let mut file = std::fs::File::create(dir.join(name)).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    const LTE_CSV: &str = "\
NENAME,Cell Name,Local tracking area ID,Cell admin state,eNodeB Id,Tracking area code,Cell ID,eCI,Downlink EARFCN,CELLSEL Minimum required RX level(2dBm),Root sequence index,Physical cell ID
T2_ALA_001,ALA001T1,2,CELL_UNBLOCK,70042.0,2500,101,17930853.0,1602.0,-61,204.0,88
T2_ALA_001,ALA001T2,1,CELL_UNBLOCK,70042.0,5200,102,17930854.0,1602.0,-61,204.0,89
T2_ALA_001,ALA001T3,2,CELL_BLOCK,70042.0,2500,103,17930855.0,1602.0,bad,204.0,90
";

    #[test]
    fn lte_keeps_only_kcell_tracking_area() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "tele2_lte_log.csv", LTE_CSV);
        let out = extract_lte(dir.path()).unwrap();
        assert_eq!(out.cells.len(), 1);
        assert_eq!(out.dropped, 1);
        let CellRecord::Lte(cell) = &out.cells[0] else {
            panic!("expected an lte record");
        };
        assert_eq!(cell.cell_name.as_deref(), Some("ALA001T1"));
        assert_eq!(cell.enodeb_id, Some(70042));
        assert_eq!(cell.eci, Some(17930853));
        assert_eq!(cell.earfcn_dl.as_deref(), Some("1602"));
        assert_eq!(cell.qrxlevmin, Some(-122));
        assert_eq!(cell.state.as_deref(), Some("UNLOCKED"));
    }

    #[test]
    fn lte_missing_column_fails_document() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(
            dir.path(),
            "tele2_lte_log.csv",
            "NENAME,Cell Name\nT2_ALA_001,ALA001T1\n",
        );
        assert!(extract_lte(dir.path()).is_err());
    }

    const NR_CSV: &str = "\
NE Name,Cell Name,CI,gNodeB ID,eCI,Physical Cell ID,TAC,Logical Root Sequence Index,Minimum RX Level(2dBm),DL NARFCN,Frequency Band,Max Transmit Power(0.1dBm)
T2_AST_020,AST020N1,1,2042.0,523777,301,2500,88,-110,630000,n78,330
";

    #[test]
    fn nr_rows_map_by_column_name() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "5G_Kcell_CM-2024-01-10.csv", NR_CSV);
        let out = extract_nr(dir.path()).unwrap();
        assert_eq!(out.cells.len(), 1);
        let CellRecord::Nr(cell) = &out.cells[0] else {
            panic!("expected an nr record");
        };
        assert_eq!(cell.site_name.as_deref(), Some("T2_AST_020"));
        assert_eq!(cell.gnb_id, Some(2042));
        assert_eq!(cell.nci.as_deref(), Some("523777"));
        assert_eq!(cell.qrxlevmin, Some(-110));
        assert_eq!(cell.bandwidth.as_deref(), Some("n78"));
        assert_eq!(cell.cell_state, None);
    }

    #[test]
    fn numeric_conversion_rounds_floats() {
        assert_eq!(round_num("70042.0"), Some(70042));
        assert_eq!(round_num(" 17930853.4 "), Some(17930853));
        assert_eq!(round_num("n/a"), None);
        assert_eq!(round_num(""), None);
    }
}
