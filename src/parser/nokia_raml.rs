//! Extractor for Nokia RAML exports shared by Beeline. One document per
//! technology, `managedObject` elements typed by the `class` attribute and
//! addressed by hierarchical `distName` paths. These exports are stitched
//! together on the Beeline side, so a record with a broken join is skipped
//! and counted instead of failing the document.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{bail, Context, Result};
use regex::Regex;
use tracing::warn;

use crate::enrich::PhysicalParams;
use crate::model::{self, CellRecord, GsmCell, LteCell, Technology, WcdmaCell};
use crate::parser::xmltree::{self, Element};
use crate::parser::{dir_files, Extracted};

/// Downlink to uplink UARFCN, fixed by band plan.
const UARFCN_UL: &[(&str, &str)] = &[
    ("2965", "2740"),
    ("2999", "2774"),
    ("10562", "9612"),
    ("10587", "9637"),
    ("10662", "9712"),
    ("10687", "9737"),
    ("10712", "9762"),
    ("10737", "9787"),
];

static LNCEL_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"LNCEL-\d+").unwrap());
static MRBTS_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"MRBTS-\d+").unwrap());

fn managed_objects<'a>(root: &'a Element, class: &str) -> Vec<&'a Element> {
    root.descendants("managedObject")
        .into_iter()
        .filter(|mo| mo.attr("class") == Some(class))
        .collect()
}

/// Value of one `p` parameter element of a managed object.
fn param<'a>(mo: &'a Element, name: &str) -> Option<&'a str> {
    mo.descendants("p")
        .into_iter()
        .find(|p| p.attr("name") == Some(name))
        .map(|p| p.text.trim())
        .filter(|text| !text.is_empty())
}

/// Site id, controller name and controller id from a cell's distName path.
fn parse_nodes(mo: &Element) -> Option<(String, String, String)> {
    let dist_name = mo.attr("distName")?;
    let nodes: Vec<&str> = dist_name.split('/').collect();
    if nodes.len() < 3 {
        return None;
    }
    let site_id = nodes[nodes.len() - 2].to_string();
    let controller = nodes[nodes.len() - 3].to_string();
    let controller_id = controller.rsplit('-').next().unwrap_or(&controller).to_string();
    Some((site_id, controller, controller_id))
}

fn object_id(mo: &Element) -> Option<&str> {
    mo.attr("distName")?.rsplit('/').next()
}

/// Site names keyed by site object id.
fn parse_sites(root: &Element, site_class: &str) -> HashMap<String, String> {
    let mut sites = HashMap::new();
    for mo in managed_objects(root, site_class) {
        if let (Some(id), Some(name)) = (object_id(mo), param(mo, "name")) {
            sites.insert(id.to_string(), name.to_string());
        }
    }
    sites
}

pub fn extract(input: &Path, technology: Technology) -> Result<Extracted> {
    let marker = match technology {
        Technology::Gsm => "GSM",
        Technology::Wcdma => "UMTS",
        Technology::Lte => "LTE",
        Technology::Nr => bail!("no Nokia export for NR"),
    };
    let files = dir_files(input, marker, ".xml")?;
    if files.is_empty() {
        bail!("no {technology} export found in {}", input.display());
    }
    let mut out = Extracted::default();
    for file in files {
        let text = std::fs::read_to_string(&file)
            .with_context(|| format!("reading {}", file.display()))?;
        let root = xmltree::parse(&text)
            .with_context(|| format!("parsing {}", file.display()))?;
        let batch = match technology {
            Technology::Gsm => parse_gsm(&root),
            Technology::Wcdma => parse_wcdma(&root),
            Technology::Lte => parse_lte(&root)?,
            Technology::Nr => unreachable!(),
        };
        out.merge(batch);
    }
    Ok(out)
}

// ── GSM ──

#[derive(Default)]
struct TrxFreqs {
    bcch: Option<String>,
    tch: Vec<String>,
}

fn parse_trx(root: &Element) -> HashMap<String, TrxFreqs> {
    let mut trxs: HashMap<String, TrxFreqs> = HashMap::new();
    for mo in managed_objects(root, "TRX") {
        let Some(dist_name) = mo.attr("distName") else {
            continue;
        };
        let parts: Vec<&str> = dist_name.split('/').collect();
        let Some(cell_id) = parts.len().checked_sub(2).map(|i| parts[i]) else {
            continue;
        };
        let Some(frequency) = param(mo, "initialFrequency") else {
            continue;
        };
        for defaults in mo.descendants("defaults") {
            let trx_type = defaults.attr("name").unwrap_or_default();
            let entry = trxs.entry(cell_id.to_string()).or_default();
            if trx_type.contains("BCCH") || trx_type.contains("System") {
                entry.bcch = Some(frequency.to_string());
            } else if trx_type.contains("TCH") {
                entry.tch.push(frequency.to_string());
            }
        }
    }
    trxs
}

fn parse_gsm(root: &Element) -> Extracted {
    let sites = parse_sites(root, "BCF");
    let trxs = parse_trx(root);
    let insert_date = model::today();

    let mut out = Extracted::default();
    for mo in managed_objects(root, "BTS") {
        let joined = (|| {
            let (site_id, bsc_name, bsc_id) = parse_nodes(mo)?;
            let cell_id = object_id(mo)?.to_string();
            let site_name = sites.get(&site_id)?.clone();
            let freqs = trxs.get(&cell_id)?;
            Some((bsc_name, bsc_id, site_name, freqs))
        })();
        let Some((bsc_name, bsc_id, site_name, freqs)) = joined else {
            warn!(object = ?mo.attr("distName"), "skipping cell with broken join");
            out.dropped += 1;
            continue;
        };
        let state = model::cell_state(param(mo, "adminState").unwrap_or_default());
        out.cells.push(CellRecord::Gsm(GsmCell {
            operator: Some("Beeline".to_string()),
            oss: "Beeline Nokia".to_string(),
            bsc_id: Some(bsc_id),
            bsc_name: Some(bsc_name),
            site_name: Some(site_name),
            cell_name: param(mo, "name").map(str::to_string),
            bcc: param(mo, "bsIdentityCodeBCC").map(str::to_string),
            ncc: param(mo, "bsIdentityCodeNCC").map(str::to_string),
            lac: param(mo, "locationAreaIdLAC").map(str::to_string),
            cell_id: param(mo, "cellId").map(str::to_string),
            bcch: freqs.bcch.clone(),
            hsn: None,
            maio: Some("0".to_string()),
            tch_freqs: (!freqs.tch.is_empty()).then(|| freqs.tch.join(", ")),
            state: Some(state.to_string()),
            vendor: "Nokia".to_string(),
            insert_date: insert_date.clone(),
            physical: PhysicalParams::default(),
            region: None,
        }));
    }
    out
}

// ── WCDMA ──

fn parse_wcdma(root: &Element) -> Extracted {
    let sites = parse_sites(root, "WBTS");
    let uarfcn_ul: HashMap<&str, &str> = UARFCN_UL.iter().copied().collect();
    let insert_date = model::today();

    let mut out = Extracted::default();
    for mo in managed_objects(root, "WCEL") {
        let joined = (|| {
            let (site_id, rnc_name, rnc_id) = parse_nodes(mo)?;
            let site_name = sites.get(&site_id)?.clone();
            let qrxlevmin: i64 = param(mo, "QrxlevMin")?.parse().ok()?;
            let qqualmin: i64 = param(mo, "QqualMin")?.parse().ok()?;
            Some((rnc_name, rnc_id, site_name, qrxlevmin * 2, qqualmin * 2))
        })();
        let Some((rnc_name, rnc_id, site_name, qrxlevmin, qqualmin)) = joined else {
            warn!(object = ?mo.attr("distName"), "skipping cell with broken join");
            out.dropped += 1;
            continue;
        };
        let state = model::admin_state(param(mo, "AdminCellState").unwrap_or_default());
        let cell_id = param(mo, "CId").map(str::to_string);
        let uarfcndl = param(mo, "UARFCN");
        out.cells.push(CellRecord::Wcdma(WcdmaCell {
            operator: Some("Beeline".to_string()),
            oss: "Beeline Nokia".to_string(),
            rnc_id: Some(rnc_id),
            rnc_name: Some(rnc_name),
            site_name: Some(site_name),
            cell_name: param(mo, "name").map(str::to_string),
            cid: cell_id.clone(),
            local_cell_id: cell_id,
            uarfcn_dl: uarfcndl.map(str::to_string),
            uarfcn_ul: uarfcndl
                .and_then(|dl| uarfcn_ul.get(dl))
                .map(|ul| ul.to_string()),
            scrambling_code: param(mo, "PriScrCode").map(str::to_string),
            lac: param(mo, "LAC").map(str::to_string),
            rac: param(mo, "RAC").map(str::to_string),
            sac: param(mo, "SAC").map(str::to_string),
            ura: None,
            cpich_power: param(mo, "PtxPrimaryCPICH").map(str::to_string),
            max_tx_power: param(mo, "PtxCellMax").map(str::to_string),
            iub_link: None,
            mocn_profile: None,
            state: Some(state.to_string()),
            ip_address: None,
            vendor: "Nokia".to_string(),
            qrxlevmin: Some(qrxlevmin),
            qqualmin: Some(qqualmin),
            insert_date: insert_date.clone(),
            physical: PhysicalParams::default(),
            region: None,
        }));
    }
    out
}

// ── LTE ──

fn lncel_id(mo: &Element) -> Option<String> {
    let dist_name = mo.attr("distName")?;
    let found = LNCEL_ID_RE.find(dist_name)?;
    found.as_str().rsplit('-').next().map(str::to_string)
}

fn parse_lte(root: &Element) -> Result<Extracted> {
    // One node per document.
    let lnbts = managed_objects(root, "LNBTS")
        .into_iter()
        .next()
        .context("document has no LNBTS object")?;
    let enodeb_id: i64 = lnbts
        .attr("distName")
        .and_then(|dn| MRBTS_ID_RE.find(dn))
        .and_then(|m| m.as_str().rsplit('-').next())
        .context("LNBTS distName has no MRBTS id")?
        .parse()
        .context("non-numeric MRBTS id")?;
    let site_name = param(lnbts, "name")
        .context("LNBTS object has no name")?
        .to_string();

    let mut fdd: HashMap<String, (String, String)> = HashMap::new();
    for mo in managed_objects(root, "LNCEL_FDD") {
        if let (Some(id), Some(earfcndl), Some(root_seq)) = (
            lncel_id(mo),
            param(mo, "earfcnDL"),
            param(mo, "rootSeqIndex"),
        ) {
            fdd.insert(id, (earfcndl.to_string(), root_seq.to_string()));
        }
    }

    let mut sib: HashMap<String, i64> = HashMap::new();
    for mo in managed_objects(root, "SIB") {
        if let (Some(id), Some(qrxlevmin)) = (
            lncel_id(mo),
            param(mo, "qrxlevmin").and_then(|v| v.parse().ok()),
        ) {
            sib.insert(id, qrxlevmin);
        }
    }

    let insert_date = model::today();
    let mut out = Extracted::default();
    for mo in managed_objects(root, "LNCEL") {
        let joined = (|| {
            let cell_id = lncel_id(mo)?;
            let (earfcn_dl, root_seq_index) = fdd.get(&cell_id)?.clone();
            let qrxlevmin = *sib.get(&cell_id)?;
            Some((cell_id, earfcn_dl, root_seq_index, qrxlevmin))
        })();
        let Some((cell_id, earfcn_dl, root_seq_index, qrxlevmin)) = joined else {
            warn!(object = ?mo.attr("distName"), "skipping cell with broken join");
            out.dropped += 1;
            continue;
        };
        let state = model::admin_state(param(mo, "administrativeState").unwrap_or_default());
        out.cells.push(CellRecord::Lte(LteCell {
            subnetwork: Some("Beeline".to_string()),
            oss: "Beeline Nokia".to_string(),
            site_name: Some(site_name.clone()),
            cell_name: param(mo, "name").map(str::to_string),
            enodeb_id: Some(enodeb_id),
            cell_id: Some(cell_id),
            eci: param(mo, "eutraCelId").and_then(|v| v.parse().ok()),
            earfcn_dl: Some(earfcn_dl),
            phys_cell_id: param(mo, "phyCellId").map(str::to_string),
            tac: param(mo, "tac").map(str::to_string),
            root_seq_index: Some(root_seq_index),
            qrxlevmin: Some(qrxlevmin),
            state: Some(state.to_string()),
            cell_range: None,
            ip_address: None,
            vendor: "Nokia".to_string(),
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

    const GSM_DOC: &str = r#"
    <raml xmlns="raml20.xsd">
      <cmData>
        <managedObject class="BCF" distName="PLMN-PLMN/BSC-101/BCF-12">
          <p name="name">BEE_KAR_012</p>
        </managedObject>
        <managedObject class="TRX" distName="PLMN-PLMN/BSC-101/BCF-12/BTS-3/TRX-1">
          <defaults name="BCCH TRX"/>
          <p name="initialFrequency">77</p>
        </managedObject>
        <managedObject class="TRX" distName="PLMN-PLMN/BSC-101/BCF-12/BTS-3/TRX-2">
          <defaults name="TCH TRX"/>
          <p name="initialFrequency">81</p>
        </managedObject>
        <managedObject class="BTS" distName="PLMN-PLMN/BSC-101/BCF-12/BTS-3">
          <p name="name">KAR012C</p>
          <p name="adminState">1</p>
          <p name="bsIdentityCodeBCC">6</p>
          <p name="bsIdentityCodeNCC">3</p>
          <p name="locationAreaIdLAC">21500</p>
          <p name="cellId">12003</p>
        </managedObject>
        <managedObject class="BTS" distName="PLMN-PLMN/BSC-101/BCF-99/BTS-9">
          <p name="name">ORPHAN</p>
        </managedObject>
      </cmData>
    </raml>"#;

    #[test]
    fn gsm_joins_site_and_trx_by_dist_name() {
        let root = xmltree::parse(GSM_DOC).unwrap();
        let out = parse_gsm(&root);
        assert_eq!(out.cells.len(), 1);
        assert_eq!(out.dropped, 1);
        let CellRecord::Gsm(cell) = &out.cells[0] else {
            panic!("expected a gsm record");
        };
        assert_eq!(cell.bsc_name.as_deref(), Some("BSC-101"));
        assert_eq!(cell.bsc_id.as_deref(), Some("101"));
        assert_eq!(cell.site_name.as_deref(), Some("BEE_KAR_012"));
        assert_eq!(cell.bcch.as_deref(), Some("77"));
        assert_eq!(cell.tch_freqs.as_deref(), Some("81"));
        assert_eq!(cell.maio.as_deref(), Some("0"));
        assert_eq!(cell.state.as_deref(), Some("ACTIVE"));
    }

    const WCDMA_DOC: &str = r#"
    <raml xmlns="raml20.xsd">
      <cmData>
        <managedObject class="WBTS" distName="PLMN-PLMN/RNC-5/WBTS-40">
          <p name="name">BEE_AST_040</p>
        </managedObject>
        <managedObject class="WCEL" distName="PLMN-PLMN/RNC-5/WBTS-40/WCEL-2">
          <p name="name">AST040B</p>
          <p name="AdminCellState">1</p>
          <p name="CId">40002</p>
          <p name="UARFCN">10562</p>
          <p name="PriScrCode">55</p>
          <p name="LAC">22000</p>
          <p name="RAC">2</p>
          <p name="SAC">4040</p>
          <p name="PtxPrimaryCPICH">330</p>
          <p name="PtxCellMax">430</p>
          <p name="QrxlevMin">-57</p>
          <p name="QqualMin">-12</p>
        </managedObject>
      </cmData>
    </raml>"#;

    #[test]
    fn wcdma_maps_uplink_uarfcn_and_doubles_thresholds() {
        let root = xmltree::parse(WCDMA_DOC).unwrap();
        let out = parse_wcdma(&root);
        assert_eq!(out.cells.len(), 1);
        let CellRecord::Wcdma(cell) = &out.cells[0] else {
            panic!("expected a wcdma record");
        };
        assert_eq!(cell.rnc_name.as_deref(), Some("RNC-5"));
        assert_eq!(cell.rnc_id.as_deref(), Some("5"));
        assert_eq!(cell.uarfcn_ul.as_deref(), Some("9612"));
        assert_eq!(cell.qrxlevmin, Some(-114));
        assert_eq!(cell.qqualmin, Some(-24));
        assert_eq!(cell.state.as_deref(), Some("UNLOCKED"));
    }

    const LTE_DOC: &str = r#"
    <raml xmlns="raml20.xsd">
      <cmData>
        <managedObject class="LNBTS" distName="MRBTS-7042/LNBTS-7042">
          <p name="name">BEE_ALA_7042</p>
        </managedObject>
        <managedObject class="LNCEL" distName="MRBTS-7042/LNBTS-7042/LNCEL-11">
          <p name="name">ALA7042A</p>
          <p name="administrativeState">1</p>
          <p name="eutraCelId">1802763</p>
          <p name="phyCellId">88</p>
          <p name="tac">2500</p>
        </managedObject>
        <managedObject class="LNCEL_FDD" distName="MRBTS-7042/LNBTS-7042/LNCEL-11/LNCEL_FDD-0">
          <p name="earfcnDL">1602</p>
          <p name="rootSeqIndex">310</p>
        </managedObject>
        <managedObject class="SIB" distName="MRBTS-7042/LNBTS-7042/LNCEL-11/SIB-0">
          <p name="qrxlevmin">-120</p>
        </managedObject>
        <managedObject class="LNCEL" distName="MRBTS-7042/LNBTS-7042/LNCEL-12">
          <p name="name">ALA7042B</p>
        </managedObject>
      </cmData>
    </raml>"#;

    #[test]
    fn lte_joins_fdd_and_sib_tables() {
        let root = xmltree::parse(LTE_DOC).unwrap();
        let out = parse_lte(&root).unwrap();
        assert_eq!(out.cells.len(), 1);
        assert_eq!(out.dropped, 1);
        let CellRecord::Lte(cell) = &out.cells[0] else {
            panic!("expected an lte record");
        };
        assert_eq!(cell.enodeb_id, Some(7042));
        assert_eq!(cell.site_name.as_deref(), Some("BEE_ALA_7042"));
        assert_eq!(cell.eci, Some(1802763));
        assert_eq!(cell.earfcn_dl.as_deref(), Some("1602"));
        assert_eq!(cell.qrxlevmin, Some(-120));
    }

    #[test]
    fn lte_without_node_object_fails_document() {
        let doc = LTE_DOC.replace("LNBTS\"", "OTHER\"");
        let root = xmltree::parse(&doc).unwrap();
        assert!(parse_lte(&root).is_err());
    }
}
