use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::enrich::{AtollData, PhysicalParams};
use crate::model::{CellRecord, Technology};

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS gsm_cells (
            id          INTEGER PRIMARY KEY,
            operator    TEXT,
            oss         TEXT NOT NULL,
            bsc_id      TEXT,
            bsc_name    TEXT,
            site_name   TEXT,
            cell_name   TEXT,
            bcc         TEXT,
            ncc         TEXT,
            lac         TEXT,
            cell_id     TEXT,
            bcch        TEXT,
            hsn         TEXT,
            maio        TEXT,
            tch_freqs   TEXT,
            state       TEXT,
            vendor      TEXT NOT NULL,
            insert_date TEXT NOT NULL,
            azimuth     REAL,
            height      REAL,
            longitude   REAL,
            latitude    REAL,
            region      TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_gsm_oss ON gsm_cells(oss);

        CREATE TABLE IF NOT EXISTS wcdma_cells (
            id              INTEGER PRIMARY KEY,
            operator        TEXT,
            oss             TEXT NOT NULL,
            rnc_id          TEXT,
            rnc_name        TEXT,
            site_name       TEXT,
            cell_name       TEXT,
            cid             TEXT,
            local_cell_id   TEXT,
            uarfcn_dl       TEXT,
            uarfcn_ul       TEXT,
            scrambling_code TEXT,
            lac             TEXT,
            rac             TEXT,
            sac             TEXT,
            ura             TEXT,
            cpich_power     TEXT,
            max_tx_power    TEXT,
            iub_link        TEXT,
            mocn_profile    TEXT,
            state           TEXT,
            ip_address      TEXT,
            vendor          TEXT NOT NULL,
            qrxlevmin       INTEGER,
            qqualmin        INTEGER,
            insert_date     TEXT NOT NULL,
            azimuth         REAL,
            height          REAL,
            longitude       REAL,
            latitude        REAL,
            region          TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_wcdma_oss ON wcdma_cells(oss);

        CREATE TABLE IF NOT EXISTS lte_cells (
            id             INTEGER PRIMARY KEY,
            subnetwork     TEXT,
            oss            TEXT NOT NULL,
            site_name      TEXT,
            cell_name      TEXT,
            enodeb_id      INTEGER,
            cell_id        TEXT,
            eci            INTEGER,
            earfcn_dl      TEXT,
            phys_cell_id   TEXT,
            tac            TEXT,
            root_seq_index TEXT,
            qrxlevmin      INTEGER,
            state          TEXT,
            cell_range     TEXT,
            ip_address     TEXT,
            vendor         TEXT NOT NULL,
            insert_date    TEXT NOT NULL,
            azimuth        REAL,
            height         REAL,
            longitude      REAL,
            latitude       REAL,
            region         TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_lte_oss ON lte_cells(oss);

        CREATE TABLE IF NOT EXISTS nr_cells (
            id             INTEGER PRIMARY KEY,
            subnetwork     TEXT,
            oss            TEXT NOT NULL,
            site_name      TEXT,
            cell_name      TEXT,
            gnb_id         INTEGER,
            local_cell_id  TEXT,
            nci            TEXT,
            pci            TEXT,
            tac            TEXT,
            root_seq_index TEXT,
            qrxlevmin      INTEGER,
            arfcn_dl       TEXT,
            bandwidth      TEXT,
            max_tx_power   TEXT,
            ssb_frequency  TEXT,
            cell_state     TEXT,
            ip_address     TEXT,
            vendor         TEXT NOT NULL,
            insert_date    TEXT NOT NULL,
            azimuth        REAL,
            height         REAL,
            longitude      REAL,
            latitude       REAL,
            region         TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_nr_oss ON nr_cells(oss);

        -- Planning-tool placement tables, refreshed by `import`.
        CREATE TABLE IF NOT EXISTS atoll_cells (
            technology TEXT NOT NULL,
            cell_name  TEXT NOT NULL,
            azimuth    REAL,
            height     REAL,
            longitude  REAL,
            latitude   REAL,
            UNIQUE(technology, cell_name)
        );
        CREATE TABLE IF NOT EXISTS atoll_sites (
            site_name TEXT PRIMARY KEY,
            longitude REAL,
            latitude  REAL
        );

        -- ZTE inventory mirror, refreshed by the element-manager sync.
        CREATE TABLE IF NOT EXISTS zte_rnc (
            rnc_name TEXT,
            rnc_id   TEXT
        );
        CREATE TABLE IF NOT EXISTS zte_wcdma_cells (
            rnc_id          TEXT,
            nodeb_name      TEXT,
            cell_name       TEXT,
            cell_id         TEXT,
            local_cell_id   TEXT,
            uarfcn_dl       TEXT,
            uarfcn_ul       TEXT,
            scrambling_code TEXT,
            lac             TEXT,
            rac             TEXT,
            sac             TEXT,
            ura_list        TEXT,
            cpich_power     TEXT,
            max_tx_power    TEXT,
            iub_link_ref    TEXT,
            qrxlevmin       INTEGER,
            qqualmin        INTEGER
        );
        CREATE TABLE IF NOT EXISTS zte_gsm_cells (
            bsc_id    TEXT,
            bsc_name  TEXT,
            site_name TEXT,
            cell_name TEXT,
            bcc       TEXT,
            ncc       TEXT,
            lac       TEXT,
            cell_id   TEXT,
            bcch      TEXT,
            tch_freqs TEXT
        );
        ",
    )?;
    Ok(())
}

// ── Partition replacement ──

/// Swap one (source, technology) partition for a fresh batch in a single
/// transaction, so readers never see a half-updated partition.
pub fn replace_partition(
    conn: &Connection,
    oss: &str,
    technology: Technology,
    records: &[CellRecord],
) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        tx.execute(
            &format!("DELETE FROM {} WHERE oss = ?1", technology.table()),
            rusqlite::params![oss],
        )?;

        let mut gsm_stmt = tx.prepare(
            "INSERT INTO gsm_cells
             (operator, oss, bsc_id, bsc_name, site_name, cell_name, bcc, ncc,
              lac, cell_id, bcch, hsn, maio, tch_freqs, state, vendor,
              insert_date, azimuth, height, longitude, latitude, region)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,
                     ?17,?18,?19,?20,?21,?22)",
        )?;
        let mut wcdma_stmt = tx.prepare(
            "INSERT INTO wcdma_cells
             (operator, oss, rnc_id, rnc_name, site_name, cell_name, cid,
              local_cell_id, uarfcn_dl, uarfcn_ul, scrambling_code, lac, rac,
              sac, ura, cpich_power, max_tx_power, iub_link, mocn_profile,
              state, ip_address, vendor, qrxlevmin, qqualmin, insert_date,
              azimuth, height, longitude, latitude, region)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,
                     ?17,?18,?19,?20,?21,?22,?23,?24,?25,?26,?27,?28,?29,?30)",
        )?;
        let mut lte_stmt = tx.prepare(
            "INSERT INTO lte_cells
             (subnetwork, oss, site_name, cell_name, enodeb_id, cell_id, eci,
              earfcn_dl, phys_cell_id, tac, root_seq_index, qrxlevmin, state,
              cell_range, ip_address, vendor, insert_date, azimuth, height,
              longitude, latitude, region)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,
                     ?17,?18,?19,?20,?21,?22)",
        )?;
        let mut nr_stmt = tx.prepare(
            "INSERT INTO nr_cells
             (subnetwork, oss, site_name, cell_name, gnb_id, local_cell_id,
              nci, pci, tac, root_seq_index, qrxlevmin, arfcn_dl, bandwidth,
              max_tx_power, ssb_frequency, cell_state, ip_address, vendor,
              insert_date, azimuth, height, longitude, latitude, region)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,
                     ?17,?18,?19,?20,?21,?22,?23,?24)",
        )?;

        for record in records {
            // Only the cleared partition's technology is written.
            if record.technology() != technology {
                continue;
            }
            count += match record {
                CellRecord::Gsm(c) => gsm_stmt.execute(rusqlite::params![
                    c.operator, c.oss, c.bsc_id, c.bsc_name, c.site_name,
                    c.cell_name, c.bcc, c.ncc, c.lac, c.cell_id, c.bcch,
                    c.hsn, c.maio, c.tch_freqs, c.state, c.vendor,
                    c.insert_date, c.physical.azimuth, c.physical.height,
                    c.physical.longitude, c.physical.latitude, c.region,
                ])?,
                CellRecord::Wcdma(c) => wcdma_stmt.execute(rusqlite::params![
                    c.operator, c.oss, c.rnc_id, c.rnc_name, c.site_name,
                    c.cell_name, c.cid, c.local_cell_id, c.uarfcn_dl,
                    c.uarfcn_ul, c.scrambling_code, c.lac, c.rac, c.sac,
                    c.ura, c.cpich_power, c.max_tx_power, c.iub_link,
                    c.mocn_profile, c.state, c.ip_address, c.vendor,
                    c.qrxlevmin, c.qqualmin, c.insert_date,
                    c.physical.azimuth, c.physical.height,
                    c.physical.longitude, c.physical.latitude, c.region,
                ])?,
                CellRecord::Lte(c) => lte_stmt.execute(rusqlite::params![
                    c.subnetwork, c.oss, c.site_name, c.cell_name,
                    c.enodeb_id, c.cell_id, c.eci, c.earfcn_dl,
                    c.phys_cell_id, c.tac, c.root_seq_index, c.qrxlevmin,
                    c.state, c.cell_range, c.ip_address, c.vendor,
                    c.insert_date, c.physical.azimuth, c.physical.height,
                    c.physical.longitude, c.physical.latitude, c.region,
                ])?,
                CellRecord::Nr(c) => nr_stmt.execute(rusqlite::params![
                    c.subnetwork, c.oss, c.site_name, c.cell_name, c.gnb_id,
                    c.local_cell_id, c.nci, c.pci, c.tac, c.root_seq_index,
                    c.qrxlevmin, c.arfcn_dl, c.bandwidth, c.max_tx_power,
                    c.ssb_frequency, c.cell_state, c.ip_address, c.vendor,
                    c.insert_date, c.physical.azimuth, c.physical.height,
                    c.physical.longitude, c.physical.latitude, c.region,
                ])?,
            };
        }
    }
    tx.commit()?;
    Ok(count)
}

// ── Placement tables ──

fn parse_coord(value: &str) -> Option<f64> {
    value.trim().parse().ok()
}

/// Refresh the cell-keyed placement table for one technology from a CSV
/// export (cell_name, azimuth, height, longitude, latitude).
pub fn import_atoll_cells(conn: &Connection, technology: Technology, csv_path: &Path) -> Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("opening {}", csv_path.display()))?;
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        tx.execute(
            "DELETE FROM atoll_cells WHERE technology = ?1",
            rusqlite::params![technology.as_str()],
        )?;
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO atoll_cells
             (technology, cell_name, azimuth, height, longitude, latitude)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for record in reader.records() {
            let record = record?;
            let cell_name = record.get(0).unwrap_or_default().trim();
            if cell_name.is_empty() {
                continue;
            }
            count += stmt.execute(rusqlite::params![
                technology.as_str(),
                cell_name,
                record.get(1).and_then(parse_coord),
                record.get(2).and_then(parse_coord),
                record.get(3).and_then(parse_coord),
                record.get(4).and_then(parse_coord),
            ])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

/// Refresh the site-keyed coordinate table from a CSV export
/// (site_name, longitude, latitude).
pub fn import_atoll_sites(conn: &Connection, csv_path: &Path) -> Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("opening {}", csv_path.display()))?;
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        tx.execute("DELETE FROM atoll_sites", [])?;
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO atoll_sites (site_name, longitude, latitude)
             VALUES (?1, ?2, ?3)",
        )?;
        for record in reader.records() {
            let record = record?;
            let site_name = record.get(0).unwrap_or_default().trim();
            if site_name.is_empty() {
                continue;
            }
            count += stmt.execute(rusqlite::params![
                site_name,
                record.get(1).and_then(parse_coord),
                record.get(2).and_then(parse_coord),
            ])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

pub fn load_atoll(conn: &Connection, technology: Technology) -> Result<AtollData> {
    let mut atoll = AtollData::default();

    let mut stmt = conn.prepare(
        "SELECT cell_name, azimuth, height, longitude, latitude
         FROM atoll_cells WHERE technology = ?1",
    )?;
    let mut rows = stmt.query(rusqlite::params![technology.as_str()])?;
    while let Some(row) = rows.next()? {
        atoll.cells.insert(
            row.get(0)?,
            PhysicalParams {
                azimuth: row.get(1)?,
                height: row.get(2)?,
                longitude: row.get(3)?,
                latitude: row.get(4)?,
            },
        );
    }

    let mut stmt = conn.prepare("SELECT site_name, longitude, latitude FROM atoll_sites")?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        atoll
            .sites
            .insert(row.get(0)?, (row.get(1)?, row.get(2)?));
    }
    Ok(atoll)
}

// ── Stats ──

pub struct Stats {
    pub per_partition: Vec<(String, String, usize)>,
    pub atoll_cells: usize,
    pub atoll_sites: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let mut per_partition = Vec::new();
    for technology in [
        Technology::Gsm,
        Technology::Wcdma,
        Technology::Lte,
        Technology::Nr,
    ] {
        let sql = format!(
            "SELECT oss, COUNT(*) FROM {} GROUP BY oss ORDER BY oss",
            technology.table(),
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            per_partition.push((row.get(0)?, technology.as_str().to_string(), row.get(1)?));
        }
    }
    let atoll_cells: usize =
        conn.query_row("SELECT COUNT(*) FROM atoll_cells", [], |r| r.get(0))?;
    let atoll_sites: usize =
        conn.query_row("SELECT COUNT(*) FROM atoll_sites", [], |r| r.get(0))?;
    Ok(Stats {
        per_partition,
        atoll_cells,
        atoll_sites,
    })
}

// ── Tests ──
