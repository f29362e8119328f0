//! Extractor for Huawei SOM controller exports (Tele2 GSM/WCDMA and the
//! Beeline Huawei 3G share). One XML document per controller: `moi`
//! elements typed by managed-object class, all keyed by CELLID. The export
//! schema is fixed, so a missing attribute is a data-integrity failure for
//! the whole document.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::enrich::PhysicalParams;
use crate::model::{self, CellRecord, GsmCell, Technology, WcdmaCell};
use crate::parser::xmltree::{self, Element};
use crate::parser::{dir_files, Extracted};

const UCELL_PARAMS: &[&str] = &[
    "LOGICRNCID",
    "NODEBNAME",
    "CELLNAME",
    "MAXTXPOWER",
    "CELLID",
    "UARFCNDOWNLINK",
    "UARFCNUPLINK",
    "PSCRAMBCODE",
    "LAC",
    "RAC",
    "SAC",
    "ACTSTATUS",
];

/// Rows of one managed-object class, in document order. Order matters for
/// reproducible batches, so the key sequence is kept beside the map.
struct MoiTable {
    order: Vec<String>,
    rows: HashMap<String, HashMap<String, String>>,
}

impl MoiTable {
    fn get(&self, cell_id: &str, param: &str) -> Option<&str> {
        self.rows.get(cell_id)?.get(param).map(String::as_str)
    }

    fn require(&self, cell_id: &str, param: &str) -> Result<&str> {
        self.get(cell_id, param)
            .with_context(|| format!("cell {cell_id} missing {param}"))
    }

    fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

fn moi_elements<'a>(root: &'a Element, moi_type: &str) -> Vec<&'a Element> {
    root.descendants("moi")
        .into_iter()
        .filter(|moi| moi.attr("type") == Some(moi_type))
        .collect()
}

fn parse_moi(root: &Element, moi_type: &str, params: &[&str]) -> Result<MoiTable> {
    let mut table = MoiTable {
        order: Vec::new(),
        rows: HashMap::new(),
    };
    for moi in moi_elements(root, moi_type) {
        let attributes = moi
            .find("attributes")
            .with_context(|| format!("{moi_type} instance without attributes"))?;
        let cell_id = attributes
            .child_text("CELLID")
            .with_context(|| format!("{moi_type} instance without CELLID"))?
            .to_string();
        let mut row = HashMap::new();
        for param in params {
            let value = attributes
                .child_text(param)
                .with_context(|| format!("{moi_type} {cell_id} missing {param}"))?;
            row.insert(param.to_string(), value.to_string());
        }
        if !table.rows.contains_key(&cell_id) {
            table.order.push(cell_id.clone());
        }
        table.rows.insert(cell_id, row);
    }
    Ok(table)
}

/// BSC/RNC name from the subsession header.
fn controller_name(root: &Element) -> Result<String> {
    root.find("subsession")
        .and_then(|sub| sub.find("NE"))
        .and_then(|ne| ne.attr("neid"))
        .map(str::to_string)
        .context("document has no subsession NE element")
}

pub fn extract(input: &Path, technology: Technology, operator: &str, oss: &str) -> Result<Extracted> {
    let marker = technology.as_str().to_lowercase();
    let files = dir_files(input, &marker, ".xml")?;
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
            Technology::Wcdma => parse_wcdma(&root, operator, oss)?,
            Technology::Gsm => parse_gsm(&root, operator, oss)?,
            other => bail!("no Huawei controller export for {other}"),
        };
        out.merge(batch);
    }
    Ok(out)
}

fn parse_wcdma(root: &Element, operator: &str, oss: &str) -> Result<Extracted> {
    let rnc_name = controller_name(root)?;
    let ucell = parse_moi(root, "UCELL", UCELL_PARAMS)?;
    let cpich = parse_moi(root, "UPCPICH", &["PCPICHPOWER"])?;
    let resel = parse_moi(root, "UCELLSELRESEL", &["QQUALMIN", "QRXLEVMIN"])?;
    let insert_date = model::today();

    let mut cells = Vec::new();
    for cell_id in ucell.iter() {
        // Reselection thresholds are stored halved on the controller.
        let qrxlevmin: i64 = resel
            .require(cell_id, "QRXLEVMIN")?
            .parse::<i64>()
            .with_context(|| format!("cell {cell_id} has non-numeric QRXLEVMIN"))?
            * 2;
        let qqualmin: i64 = resel
            .require(cell_id, "QQUALMIN")?
            .parse::<i64>()
            .with_context(|| format!("cell {cell_id} has non-numeric QQUALMIN"))?
            * 2;
        let state = model::admin_state(ucell.require(cell_id, "ACTSTATUS")?);
        cells.push(CellRecord::Wcdma(WcdmaCell {
            operator: Some(operator.to_string()),
            oss: oss.to_string(),
            rnc_id: Some(ucell.require(cell_id, "LOGICRNCID")?.to_string()),
            rnc_name: Some(rnc_name.clone()),
            site_name: Some(ucell.require(cell_id, "NODEBNAME")?.to_string()),
            cell_name: Some(ucell.require(cell_id, "CELLNAME")?.to_string()),
            cid: Some(cell_id.to_string()),
            local_cell_id: Some(cell_id.to_string()),
            uarfcn_dl: Some(ucell.require(cell_id, "UARFCNDOWNLINK")?.to_string()),
            uarfcn_ul: Some(ucell.require(cell_id, "UARFCNUPLINK")?.to_string()),
            scrambling_code: Some(ucell.require(cell_id, "PSCRAMBCODE")?.to_string()),
            lac: Some(ucell.require(cell_id, "LAC")?.to_string()),
            rac: Some(ucell.require(cell_id, "RAC")?.to_string()),
            sac: Some(ucell.require(cell_id, "SAC")?.to_string()),
            ura: None,
            cpich_power: Some(cpich.require(cell_id, "PCPICHPOWER")?.to_string()),
            max_tx_power: Some(ucell.require(cell_id, "MAXTXPOWER")?.to_string()),
            iub_link: None,
            mocn_profile: None,
            state: Some(state.to_string()),
            ip_address: None,
            vendor: "Huawei".to_string(),
            qrxlevmin: Some(qrxlevmin),
            qqualmin: Some(qqualmin),
            insert_date: insert_date.clone(),
            physical: PhysicalParams::default(),
            region: None,
        }));
    }
    Ok(Extracted { cells, dropped: 0 })
}

/// Per-cell transceiver frequencies: the BCCH carrier and the traffic
/// carriers, in document order.
#[derive(Default)]
struct TrxFreqs {
    bcch: Option<String>,
    tch: Vec<String>,
}

fn parse_trx(root: &Element) -> Result<HashMap<String, TrxFreqs>> {
    let mut trx: HashMap<String, TrxFreqs> = HashMap::new();
    for moi in moi_elements(root, "GTRX") {
        let attributes = moi
            .find("attributes")
            .context("GTRX instance without attributes")?;
        let cell_id = attributes
            .child_text("CELLID")
            .context("GTRX instance without CELLID")?;
        let freq = attributes
            .child_text("FREQ")
            .with_context(|| format!("GTRX for cell {cell_id} missing FREQ"))?;
        let entry = trx.entry(cell_id.to_string()).or_default();
        if attributes.child_text("ISMAINBCCH") == Some("1") {
            entry.bcch = Some(freq.to_string());
        } else {
            entry.tch.push(freq.to_string());
        }
    }
    Ok(trx)
}

/// Site name per cell, joined through the cell-to-BTS binding.
fn parse_site_names(root: &Element) -> Result<HashMap<String, String>> {
    let bindings = parse_moi(root, "CELLBIND2BTS", &["BTSID"])?;

    let mut bts_names = HashMap::new();
    for moi in moi_elements(root, "BTS") {
        let attributes = moi
            .find("attributes")
            .context("BTS instance without attributes")?;
        let bts_id = attributes
            .child_text("BTSID")
            .context("BTS instance without BTSID")?;
        let bts_name = attributes
            .child_text("BTSNAME")
            .with_context(|| format!("BTS {bts_id} missing BTSNAME"))?;
        bts_names.insert(bts_id.to_string(), bts_name.to_string());
    }

    let mut site_names = HashMap::new();
    for cell_id in bindings.iter() {
        let bts_id = bindings.require(cell_id, "BTSID")?;
        let site = bts_names
            .get(bts_id)
            .with_context(|| format!("cell {cell_id} bound to unknown BTS {bts_id}"))?;
        site_names.insert(cell_id.to_string(), site.clone());
    }
    Ok(site_names)
}

fn parse_gsm(root: &Element, operator: &str, oss: &str) -> Result<Extracted> {
    let bsc_name = controller_name(root)?;
    let gcell = parse_moi(
        root,
        "GCELL",
        &["CELLNAME", "BCC", "NCC", "LAC", "CI", "ACTSTATUS"],
    )?;
    let magrp = parse_moi(root, "GCELLMAGRP", &["HSN"])?;
    let trx = parse_trx(root)?;
    let site_names = parse_site_names(root)?;
    let insert_date = model::today();

    let mut cells = Vec::new();
    for cell_id in gcell.iter() {
        let freqs = trx.get(cell_id);
        let tch_freqs = freqs
            .filter(|f| !f.tch.is_empty())
            .map(|f| f.tch.join(", "));
        let state = model::cell_state(gcell.require(cell_id, "ACTSTATUS")?);
        let site = site_names
            .get(cell_id)
            .with_context(|| format!("cell {cell_id} has no BTS binding"))?;
        cells.push(CellRecord::Gsm(GsmCell {
            operator: Some(operator.to_string()),
            oss: oss.to_string(),
            bsc_id: None,
            bsc_name: Some(bsc_name.clone()),
            site_name: Some(site.clone()),
            cell_name: Some(gcell.require(cell_id, "CELLNAME")?.to_string()),
            bcc: Some(gcell.require(cell_id, "BCC")?.to_string()),
            ncc: Some(gcell.require(cell_id, "NCC")?.to_string()),
            lac: Some(gcell.require(cell_id, "LAC")?.to_string()),
            cell_id: Some(gcell.require(cell_id, "CI")?.to_string()),
            bcch: freqs.and_then(|f| f.bcch.clone()),
            hsn: magrp.get(cell_id, "HSN").map(str::to_string),
            maio: None,
            tch_freqs,
            state: Some(state.to_string()),
            vendor: "Huawei".to_string(),
            insert_date: insert_date.clone(),
            physical: PhysicalParams::default(),
            region: None,
        }));
    }
    Ok(Extracted { cells, dropped: 0 })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    const WCDMA_DOC: &str = r#"
    <som:session xmlns:som="http://www.huawei.com/specs/SOM"
                 xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
      <som:subsession><som:NE neid="RNC99"/></som:subsession>
      <som:moi xsi:type="UCELL">
        <som:attributes>
          <som:CELLID>101</som:CELLID>
          <som:LOGICRNCID>99</som:LOGICRNCID>
          <som:NODEBNAME>AST010</som:NODEBNAME>
          <som:CELLNAME>AST010B</som:CELLNAME>
          <som:MAXTXPOWER>430</som:MAXTXPOWER>
          <som:UARFCNDOWNLINK>10562</som:UARFCNDOWNLINK>
          <som:UARFCNUPLINK>9612</som:UARFCNUPLINK>
          <som:PSCRAMBCODE>120</som:PSCRAMBCODE>
          <som:LAC>11000</som:LAC>
          <som:RAC>1</som:RAC>
          <som:SAC>1010</som:SAC>
          <som:ACTSTATUS>1</som:ACTSTATUS>
        </som:attributes>
      </som:moi>
      <som:moi xsi:type="UPCPICH">
        <som:attributes>
          <som:CELLID>101</som:CELLID>
          <som:PCPICHPOWER>330</som:PCPICHPOWER>
        </som:attributes>
      </som:moi>
      <som:moi xsi:type="UCELLSELRESEL">
        <som:attributes>
          <som:CELLID>101</som:CELLID>
          <som:QRXLEVMIN>-58</som:QRXLEVMIN>
          <som:QQUALMIN>-9</som:QQUALMIN>
        </som:attributes>
      </som:moi>
    </som:session>"#;

    #[test]
    fn wcdma_cell_from_controller_export() {
        let root = xmltree::parse(WCDMA_DOC).unwrap();
        let out = parse_wcdma(&root, "Tele2", "Tele2").unwrap();
        assert_eq!(out.cells.len(), 1);
        let CellRecord::Wcdma(cell) = &out.cells[0] else {
            panic!("expected a wcdma record");
        };
        assert_eq!(cell.rnc_name.as_deref(), Some("RNC99"));
        assert_eq!(cell.cid.as_deref(), Some("101"));
        assert_eq!(cell.qrxlevmin, Some(-116));
        assert_eq!(cell.qqualmin, Some(-18));
        assert_eq!(cell.state.as_deref(), Some("UNLOCKED"));
        assert_eq!(cell.cpich_power.as_deref(), Some("330"));
    }

    #[test]
    fn wcdma_missing_reselection_row_fails_document() {
        let doc = WCDMA_DOC.replace("UCELLSELRESEL", "SOMETHINGELSE");
        let root = xmltree::parse(&doc).unwrap();
        assert!(parse_wcdma(&root, "Tele2", "Tele2").is_err());
    }

    const GSM_DOC: &str = r#"
    <som:session xmlns:som="http://www.huawei.com/specs/SOM"
                 xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
      <som:subsession><som:NE neid="BSC07"/></som:subsession>
      <som:moi xsi:type="GCELL">
        <som:attributes>
          <som:CELLID>7</som:CELLID>
          <som:CELLNAME>KAR007A</som:CELLNAME>
          <som:BCC>5</som:BCC>
          <som:NCC>2</som:NCC>
          <som:LAC>21000</som:LAC>
          <som:CI>7007</som:CI>
          <som:ACTSTATUS>1</som:ACTSTATUS>
        </som:attributes>
      </som:moi>
      <som:moi xsi:type="GTRX">
        <som:attributes>
          <som:CELLID>7</som:CELLID>
          <som:ISMAINBCCH>1</som:ISMAINBCCH>
          <som:FREQ>71</som:FREQ>
        </som:attributes>
      </som:moi>
      <som:moi xsi:type="GTRX">
        <som:attributes>
          <som:CELLID>7</som:CELLID>
          <som:ISMAINBCCH>0</som:ISMAINBCCH>
          <som:FREQ>75</som:FREQ>
        </som:attributes>
      </som:moi>
      <som:moi xsi:type="CELLBIND2BTS">
        <som:attributes>
          <som:CELLID>7</som:CELLID>
          <som:BTSID>70</som:BTSID>
        </som:attributes>
      </som:moi>
      <som:moi xsi:type="BTS">
        <som:attributes>
          <som:BTSID>70</som:BTSID>
          <som:BTSNAME>KAR007</som:BTSNAME>
        </som:attributes>
      </som:moi>
    </som:session>"#;

    #[test]
    fn gsm_cell_joins_trx_and_bts() {
        let root = xmltree::parse(GSM_DOC).unwrap();
        let out = parse_gsm(&root, "Tele2", "Tele2").unwrap();
        assert_eq!(out.cells.len(), 1);
        let CellRecord::Gsm(cell) = &out.cells[0] else {
            panic!("expected a gsm record");
        };
        assert_eq!(cell.bsc_name.as_deref(), Some("BSC07"));
        assert_eq!(cell.site_name.as_deref(), Some("KAR007"));
        assert_eq!(cell.bcch.as_deref(), Some("71"));
        assert_eq!(cell.tch_freqs.as_deref(), Some("75"));
        assert_eq!(cell.hsn, None);
        assert_eq!(cell.state.as_deref(), Some("ACTIVE"));
    }

    #[test]
    fn gsm_cell_without_bts_binding_fails_document() {
        let doc = GSM_DOC.replace("CELLBIND2BTS", "UNRELATED");
        let root = xmltree::parse(&doc).unwrap();
        assert!(parse_gsm(&root, "Tele2", "Tele2").is_err());
    }
}
