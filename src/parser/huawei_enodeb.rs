//! Extractor for Huawei eNodeB exports shared by Beeline. One XML document
//! per node. Kcell's share of a node depends on the sharing mode: MORAN
//! nodes dedicate local cell ids 100..130 to Kcell, MOCN nodes share ids
//! 0..100. The mode is part of the export file name.

use std::ops::Range;
use std::path::Path;

use anyhow::{bail, Context, Result};
use rayon::prelude::*;

use crate::enrich::PhysicalParams;
use crate::model::{self, CellRecord, LteCell};
use crate::parser::xmltree::{self, Element};
use crate::parser::{dir_files, Extracted};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Sharing {
    Moran,
    Mocn,
}

impl Sharing {
    fn from_file_name(name: &str) -> Sharing {
        if name.to_lowercase().contains("mocn") {
            Sharing::Mocn
        } else {
            Sharing::Moran
        }
    }

    /// Local cell ids belonging to Kcell on a node in this mode.
    fn cell_id_range(&self) -> Range<i64> {
        match self {
            Sharing::Moran => 100..130,
            Sharing::Mocn => 0..100,
        }
    }
}

fn attribute_text<'a>(element: &'a Element, tag: &str) -> Result<&'a str> {
    element
        .find("attributes")
        .and_then(|attrs| attrs.child_text(tag))
        .with_context(|| format!("{} instance missing {tag}", element.name))
}

/// Selection threshold per local cell id, stored halved on the node.
fn parse_qrxlevmin(root: &Element) -> Result<std::collections::HashMap<String, i64>> {
    let mut out = std::collections::HashMap::new();
    for cellsel in root.descendants("CellSel") {
        let cell_id = attribute_text(cellsel, "LocalCellId")?;
        let qrxlevmin: i64 = attribute_text(cellsel, "QRxLevMin")?
            .parse()
            .with_context(|| format!("cell {cell_id} has non-numeric QRxLevMin"))?;
        out.insert(cell_id.to_string(), qrxlevmin * 2);
    }
    Ok(out)
}

/// Kcell's tracking area. MORAN nodes carry one TA record per operator and
/// Kcell is operator 1; MOCN nodes share a single TA.
fn parse_tac(root: &Element, sharing: Sharing) -> Result<Option<String>> {
    for ta in root.descendants("CnOperatorTa") {
        if sharing == Sharing::Moran && attribute_text(ta, "TrackingAreaId")? != "1" {
            continue;
        }
        return Ok(Some(attribute_text(ta, "Tac")?.to_string()));
    }
    Ok(None)
}

fn parse_ip(root: &Element) -> Result<Option<String>> {
    for devip in root.descendants("DEVIP") {
        if attribute_text(devip, "USERLABEL")? == "S1 Kcell" {
            return Ok(Some(attribute_text(devip, "IP")?.to_string()));
        }
    }
    Ok(None)
}

fn parse_document(text: &str, sharing: Sharing) -> Result<Vec<CellRecord>> {
    let root = xmltree::parse(text)?;

    let qrxlevmin_data = parse_qrxlevmin(&root)?;
    let enodeb_id: i64 = root
        .descendants("eNodeBFunction")
        .last()
        .map(|el| attribute_text(el, "eNodeBId"))
        .transpose()?
        .context("document has no eNodeBFunction")?
        .parse()
        .context("non-numeric eNodeBId")?;
    let site_name = root
        .descendants("NE")
        .last()
        .map(|el| attribute_text(el, "NENAME"))
        .transpose()?
        .map(str::to_string);
    let tac = parse_tac(&root, sharing)?;
    let ip_address = parse_ip(&root)?;
    let insert_date = model::today();

    let range = sharing.cell_id_range();
    let mut cells = Vec::new();
    for element in root.descendants("Cell") {
        let cell_id = attribute_text(element, "LocalCellId")?;
        let numeric_id: i64 = cell_id
            .parse()
            .with_context(|| format!("non-numeric LocalCellId {cell_id}"))?;
        if !range.contains(&numeric_id) {
            continue;
        }
        let state = model::admin_state(attribute_text(element, "CellActiveState")?);
        let qrxlevmin = *qrxlevmin_data
            .get(cell_id)
            .with_context(|| format!("cell {cell_id} has no CellSel record"))?;
        cells.push(CellRecord::Lte(LteCell {
            subnetwork: Some("Beeline".to_string()),
            oss: "Beeline Huawei".to_string(),
            site_name: site_name.clone(),
            cell_name: Some(attribute_text(element, "CellName")?.to_string()),
            enodeb_id: Some(enodeb_id),
            cell_id: Some(cell_id.to_string()),
            eci: Some(model::eci(enodeb_id, numeric_id)),
            earfcn_dl: Some(attribute_text(element, "DlEarfcn")?.to_string()),
            phys_cell_id: Some(attribute_text(element, "PhyCellId")?.to_string()),
            tac: tac.clone(),
            root_seq_index: Some(attribute_text(element, "RootSequenceIdx")?.to_string()),
            qrxlevmin: Some(qrxlevmin),
            state: Some(state.to_string()),
            cell_range: None,
            ip_address: ip_address.clone(),
            vendor: "Huawei".to_string(),
            insert_date: insert_date.clone(),
            physical: PhysicalParams::default(),
            region: None,
        }));
    }
    Ok(cells)
}

pub fn extract(input: &Path) -> Result<Extracted> {
    let files = dir_files(input, "", ".xml")?;
    if files.is_empty() {
        bail!("no eNodeB exports found in {}", input.display());
    }
    let batches: Vec<Vec<CellRecord>> = files
        .par_iter()
        .map(|file| {
            let name = file.file_name().unwrap_or_default().to_string_lossy();
            let sharing = Sharing::from_file_name(&name);
            let text = std::fs::read_to_string(file)
                .with_context(|| format!("reading {}", file.display()))?;
            parse_document(&text, sharing)
                .with_context(|| format!("parsing {}", file.display()))
        })
        .collect::<Result<_>>()?;
    Ok(Extracted {
        cells: batches.into_iter().flatten().collect(),
        dropped: 0,
    })
}

// ── Tests ──
