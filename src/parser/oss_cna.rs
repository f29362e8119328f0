//! Extractor for the OSS-RC CNA GSM export: a space-separated table whose
//! first line names the columns and whose hopping parameters sit in fixed
//! slots after the ch_group_1 column. Rows without a cell name are summary
//! noise in the export and are skipped.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;

use crate::enrich::PhysicalParams;
use crate::model::{self, CellRecord, GsmCell};
use crate::parser::Extracted;

const MAIO_OFFSET: usize = 2;
const TCH_OFFSET: usize = 10;
const HOPPING_SLOTS: usize = 8;

struct Header {
    columns: Vec<String>,
    ch_group: usize,
}

impl Header {
    fn parse(line: &str) -> Result<Header> {
        let columns: Vec<String> = line.split(' ').map(str::to_string).collect();
        let ch_group = columns
            .iter()
            .position(|name| name == "ch_group_1")
            .context("export header has no ch_group_1 column")?;
        Ok(Header { columns, ch_group })
    }

    fn index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|column| column == name)
            .with_context(|| format!("export header has no {name} column"))
    }
}

fn value(fields: &[&str], index: usize) -> Option<String> {
    fields
        .get(index)
        .filter(|&&field| field != "NULL")
        .map(|field| field.to_string())
}

/// MAIO or TCH list from the fixed hopping window, NULL slots dropped.
fn hopping_values(fields: &[&str], start: usize) -> Option<String> {
    let values: Vec<&str> = fields
        .iter()
        .skip(start)
        .take(HOPPING_SLOTS)
        .filter(|&&field| field != "NULL")
        .copied()
        .collect();
    (!values.is_empty()).then(|| values.join(", "))
}

pub fn extract(input: &Path) -> Result<Extracted> {
    let path = input.join("network_live_gsm_export.txt");
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    parse_gsm_cells(&text)
}

fn parse_gsm_cells(text: &str) -> Result<Extracted> {
    let mut lines = text.lines();
    let header = Header::parse(lines.next().context("export file is empty")?)?;
    // The second line underlines the header.
    lines.next();

    let cell_idx = header.index("CELL")?;
    let bsc_idx = header.index("BSC")?;
    let site_idx = header.index("SITE")?;
    let bcc_idx = header.index("bcc")?;
    let ncc_idx = header.index("ncc")?;
    let lac_idx = header.index("lac")?;
    let ci_idx = header.index("ci")?;
    let bcch_idx = header.index("bcchno")?;
    let state_idx = header.index("cell_state")?;
    let insert_date = model::today();

    let mut out = Extracted::default();
    for line in lines {
        let fields: Vec<&str> = line.split(' ').collect();
        let Some(cell_name) = value(&fields, cell_idx) else {
            warn!("skipping export row without a cell name");
            out.dropped += 1;
            continue;
        };
        out.cells.push(CellRecord::Gsm(GsmCell {
            operator: Some("Kcell".to_string()),
            oss: "OSS".to_string(),
            bsc_id: None,
            bsc_name: value(&fields, bsc_idx),
            site_name: value(&fields, site_idx),
            cell_name: Some(cell_name),
            bcc: value(&fields, bcc_idx),
            ncc: value(&fields, ncc_idx),
            lac: value(&fields, lac_idx),
            cell_id: value(&fields, ci_idx),
            bcch: value(&fields, bcch_idx),
            hsn: value(&fields, header.ch_group + 1),
            maio: hopping_values(&fields, header.ch_group + MAIO_OFFSET),
            tch_freqs: hopping_values(&fields, header.ch_group + TCH_OFFSET),
            state: value(&fields, state_idx),
            vendor: "Ericsson".to_string(),
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

    // Header layout: ch_group_1, hsn, then 8 maio slots, then 8 tch slots.
    fn export(cell: &str) -> String {
        let header = "BSC SITE CELL bcc ncc lac ci bcchno cell_state ch_group_1 hsn m1 m2 m3 m4 m5 m6 m7 m8 t1 t2 t3 t4 t5 t6 t7 t8";
        let underline = "--- ---- ---- --- --- --- -- ------ ---------- ---------- --- ...";
        let row = format!(
            "BSC_B1 ALM001 {cell} 5 2 11000 1001 77 ACTIVE 1 42 0 2 NULL NULL NULL NULL NULL NULL 71 73 NULL NULL NULL NULL NULL NULL",
        );
        format!("{header}\n{underline}\n{row}\n")
    }

    #[test]
    fn row_is_read_by_header_position() {
        let out = parse_gsm_cells(&export("ALM001A")).unwrap();
        assert_eq!(out.cells.len(), 1);
        assert_eq!(out.dropped, 0);
        let CellRecord::Gsm(cell) = &out.cells[0] else {
            panic!("expected a gsm record");
        };
        assert_eq!(cell.bsc_name.as_deref(), Some("BSC_B1"));
        assert_eq!(cell.cell_name.as_deref(), Some("ALM001A"));
        assert_eq!(cell.lac.as_deref(), Some("11000"));
        assert_eq!(cell.cell_id.as_deref(), Some("1001"));
        assert_eq!(cell.bcch.as_deref(), Some("77"));
        assert_eq!(cell.hsn.as_deref(), Some("42"));
        assert_eq!(cell.maio.as_deref(), Some("0, 2"));
        assert_eq!(cell.tch_freqs.as_deref(), Some("71, 73"));
        assert_eq!(cell.state.as_deref(), Some("ACTIVE"));
    }

    #[test]
    fn row_without_cell_is_dropped_and_counted() {
        let out = parse_gsm_cells(&export("NULL")).unwrap();
        assert!(out.cells.is_empty());
        assert_eq!(out.dropped, 1);
    }

    #[test]
    fn missing_header_column_fails_document() {
        let doc = export("ALM001A").replace("ch_group_1", "something");
        assert!(parse_gsm_cells(&doc).is_err());
    }
}
