//! Extractors for the ZTE inventory, mirrored into local tables by the
//! nightly element-manager sync. Unlike the file-based sources these read
//! straight from the database handle.

use std::collections::HashMap;

use anyhow::Result;
use rusqlite::Connection;

use crate::enrich::PhysicalParams;
use crate::model::{self, CellRecord, GsmCell, WcdmaCell};
use crate::parser::Extracted;

pub fn extract_wcdma(conn: &Connection) -> Result<Extracted> {
    let mut rnc_names: HashMap<String, String> = HashMap::new();
    let mut stmt = conn.prepare("SELECT rnc_id, rnc_name FROM zte_rnc")?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        rnc_names.insert(row.get(0)?, row.get(1)?);
    }

    let mut stmt = conn.prepare(
        "SELECT rnc_id, nodeb_name, cell_name, cell_id, local_cell_id,
                uarfcn_dl, uarfcn_ul, scrambling_code, lac, rac, sac,
                ura_list, cpich_power, max_tx_power, iub_link_ref,
                qrxlevmin, qqualmin
         FROM zte_wcdma_cells
         ORDER BY cell_name",
    )?;
    let insert_date = model::today();

    let mut cells = Vec::new();
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let rnc_id: Option<String> = row.get(0)?;
        let nodeb_name: Option<String> = row.get(1)?;
        let iub_link_ref: Option<String> = row.get(14)?;
        cells.push(CellRecord::Wcdma(WcdmaCell {
            operator: Some("Kcell".to_string()),
            oss: "ZTE".to_string(),
            rnc_name: rnc_id
                .as_deref()
                .and_then(|id| rnc_names.get(id))
                .cloned(),
            rnc_id,
            // The inventory suffixes node names with free-form labels.
            site_name: nodeb_name
                .as_deref()
                .and_then(|name| name.split(' ').next())
                .map(str::to_string),
            cell_name: row.get(2)?,
            cid: row.get(3)?,
            local_cell_id: row.get(4)?,
            uarfcn_dl: row.get(5)?,
            uarfcn_ul: row.get(6)?,
            scrambling_code: row.get(7)?,
            lac: row.get(8)?,
            rac: row.get(9)?,
            sac: row.get(10)?,
            ura: row.get(11)?,
            cpich_power: row.get(12)?,
            max_tx_power: row.get(13)?,
            iub_link: iub_link_ref
                .as_deref()
                .and_then(|link| link.rsplit('=').next())
                .map(str::to_string),
            mocn_profile: None,
            state: Some("UNLOCKED".to_string()),
            ip_address: None,
            vendor: "ZTE".to_string(),
            qrxlevmin: row.get(15)?,
            qqualmin: row.get(16)?,
            insert_date: insert_date.clone(),
            physical: PhysicalParams::default(),
            region: None,
        }));
    }
    Ok(Extracted { cells, dropped: 0 })
}

pub fn extract_gsm(conn: &Connection) -> Result<Extracted> {
    // The TRX join fans out one row per hopping list; DISTINCT collapses
    // exact duplicates, the bcch-only pass below handles the rest.
    let mut stmt = conn.prepare(
        "SELECT DISTINCT bsc_id, bsc_name, site_name, cell_name, bcc, ncc,
                lac, cell_id, bcch, tch_freqs
         FROM zte_gsm_cells
         ORDER BY cell_name",
    )?;
    let insert_date = model::today();

    let mut hopping: Vec<GsmCell> = Vec::new();
    let mut bcch_only: Vec<GsmCell> = Vec::new();
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let tch_freqs: Option<String> = row.get(9)?;
        let cell = GsmCell {
            operator: Some("Kcell".to_string()),
            oss: "ZTE".to_string(),
            bsc_id: row.get(0)?,
            bsc_name: row.get(1)?,
            site_name: row.get(2)?,
            cell_name: row.get(3)?,
            bcc: row.get(4)?,
            ncc: row.get(5)?,
            lac: row.get(6)?,
            cell_id: row.get(7)?,
            bcch: row.get(8)?,
            hsn: None,
            maio: None,
            tch_freqs: tch_freqs.clone().filter(|freqs| !freqs.is_empty()),
            state: Some("ACTIVE".to_string()),
            vendor: "ZTE".to_string(),
            insert_date: insert_date.clone(),
            physical: PhysicalParams::default(),
            region: None,
        };
        if cell.tch_freqs.is_some() {
            hopping.push(cell);
        } else {
            bcch_only.push(cell);
        }
    }

    // A cell appears once per transceiver row. Keep the hopping variant;
    // a bcch-only row stands alone only when no hopping sibling exists.
    let mut cells: Vec<CellRecord> = hopping.iter().cloned().map(CellRecord::Gsm).collect();
    for cell in bcch_only {
        let has_hopping_variant = hopping.iter().any(|other| {
            other.cell_name == cell.cell_name && other.bsc_name == cell.bsc_name
        });
        if !has_hopping_variant {
            cells.push(CellRecord::Gsm(cell));
        }
    }
    Ok(Extracted { cells, dropped: 0 })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn inventory() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO zte_rnc (rnc_name, rnc_id) VALUES ('ZRNC1', '21');
             INSERT INTO zte_wcdma_cells
                (rnc_id, nodeb_name, cell_name, cell_id, local_cell_id,
                 uarfcn_dl, uarfcn_ul, scrambling_code, lac, rac, sac,
                 ura_list, cpich_power, max_tx_power, iub_link_ref,
                 qrxlevmin, qqualmin)
             VALUES ('21', 'SHY001 south', 'SHY001A', '1001', '1001',
                     '10562', '9612', '77', '31000', '1', '3100',
                     '3121', '330', '430', 'UtranNetwork=1,IubLink=Iub_SHY001',
                     -115, -24);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn wcdma_resolves_rnc_and_trims_node_label() {
        let conn = inventory();
        let out = extract_wcdma(&conn).unwrap();
        assert_eq!(out.cells.len(), 1);
        let CellRecord::Wcdma(cell) = &out.cells[0] else {
            panic!("expected a wcdma record");
        };
        assert_eq!(cell.rnc_name.as_deref(), Some("ZRNC1"));
        assert_eq!(cell.site_name.as_deref(), Some("SHY001"));
        assert_eq!(cell.iub_link.as_deref(), Some("Iub_SHY001"));
        assert_eq!(cell.state.as_deref(), Some("UNLOCKED"));
        assert_eq!(cell.qrxlevmin, Some(-115));
    }

    #[test]
    fn wcdma_unknown_rnc_yields_null_name() {
        let conn = inventory();
        conn.execute("UPDATE zte_wcdma_cells SET rnc_id = '99'", [])
            .unwrap();
        let out = extract_wcdma(&conn).unwrap();
        let CellRecord::Wcdma(cell) = &out.cells[0] else {
            panic!("expected a wcdma record");
        };
        assert_eq!(cell.rnc_name, None);
        assert_eq!(cell.rnc_id.as_deref(), Some("99"));
    }

    fn gsm_row(conn: &Connection, cell_name: &str, tch: Option<&str>) {
        conn.execute(
            "INSERT INTO zte_gsm_cells
                (bsc_id, bsc_name, site_name, cell_name, bcc, ncc, lac,
                 cell_id, bcch, tch_freqs)
             VALUES ('3', 'ZBSC3', 'SHY002', ?1, '5', '2', '31000',
                     '2002', '80', ?2)",
            rusqlite::params![cell_name, tch],
        )
        .unwrap();
    }

    #[test]
    fn gsm_prefers_hopping_row_over_bcch_only_duplicate() {
        let conn = inventory();
        gsm_row(&conn, "SHY002A", Some("81, 83"));
        gsm_row(&conn, "SHY002A", None);
        gsm_row(&conn, "SHY002B", None);
        let out = extract_gsm(&conn).unwrap();
        assert_eq!(out.cells.len(), 2);
        let by_name: Vec<(Option<&str>, Option<&str>)> = out
            .cells
            .iter()
            .map(|record| {
                let CellRecord::Gsm(cell) = record else {
                    panic!("expected gsm records");
                };
                (cell.cell_name.as_deref(), cell.tch_freqs.as_deref())
            })
            .collect();
        assert!(by_name.contains(&(Some("SHY002A"), Some("81, 83"))));
        assert!(by_name.contains(&(Some("SHY002B"), None)));
    }

    #[test]
    fn gsm_rows_are_deduplicated() {
        let conn = inventory();
        gsm_row(&conn, "SHY002C", Some("85"));
        gsm_row(&conn, "SHY002C", Some("85"));
        let out = extract_gsm(&conn).unwrap();
        assert_eq!(out.cells.len(), 1);
    }
}
