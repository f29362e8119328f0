//! Extractor for the OSS-RC WCDMA bulk-configuration export. One large XML
//! document holds every managed node: RNC contexts carry the UtranCells,
//! the remaining contexts describe the radio nodes themselves. Nodes that
//! have migrated to the newer manager are absent from the export, so their
//! names and addresses come from captured CLI output placed next to it.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};

use crate::enrich::PhysicalParams;
use crate::model::{self, CellRecord, WcdmaCell};
use crate::parser::enm::{self, Fdn};
use crate::parser::xmltree::{self, Element};
use crate::parser::Extracted;

use std::sync::LazyLock;

use regex::Regex;

static MOCN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("vsDataMocnCellProfile=.*").unwrap());

struct RbsEntry {
    site_name: String,
    ip_address: Option<String>,
}

/// OAM address of one radio node. The address container wins over the bare
/// ipAddress attribute, and carries a prefix length that must go.
fn parse_rbs_ip(me_context: &Element) -> Option<String> {
    let mut ip_address = None;
    for container in me_context.descendants("vsDataContainer") {
        let id = container.attr("id").unwrap_or_default();
        if !id.to_lowercase().contains("oam") {
            continue;
        }
        if let Some(address) = container.descendant_text("usedAddress") {
            ip_address = Some(address.split('/').next().unwrap_or(address).to_string());
        }
    }
    ip_address.or_else(|| {
        me_context
            .descendant_text("ipAddress")
            .map(str::to_string)
    })
}

fn parse_rbs_id(me_context: &Element) -> Option<String> {
    let last_text = |name: &str| {
        me_context
            .descendants(name)
            .into_iter()
            .filter_map(|el| {
                let text = el.text.trim();
                (!text.is_empty()).then(|| text.to_string())
            })
            .next_back()
    };
    last_text("rbsIubId").or_else(|| last_text("rbsId"))
}

/// Node name and address per rbsId: export contexts first, then the CLI
/// side data overlaying the migrated nodes.
fn parse_rbs_data(
    root: &Element,
    enm_sites: &HashMap<String, String>,
    enm_ips: &HashMap<String, Option<String>>,
) -> HashMap<String, RbsEntry> {
    let mut rbs_data = HashMap::new();
    for me_context in root.descendants("MeContext") {
        let Some(id) = me_context.attr("id") else {
            continue;
        };
        if id.contains("RNC") {
            continue;
        }
        if let Some(rbs_id) = parse_rbs_id(me_context) {
            rbs_data.insert(
                rbs_id,
                RbsEntry {
                    site_name: id.to_string(),
                    ip_address: parse_rbs_ip(me_context),
                },
            );
        }
    }
    for (site_name, rbs_id) in enm_sites {
        rbs_data.insert(
            rbs_id.clone(),
            RbsEntry {
                site_name: site_name.clone(),
                ip_address: enm_ips.get(site_name).cloned().flatten(),
            },
        );
    }
    rbs_data
}

/// rbsId per IubLink, the join key between cells and nodes.
fn parse_iublink_data(root: &Element) -> HashMap<String, String> {
    let mut rbs_ids = HashMap::new();
    for iub_link in root.descendants("IubLink") {
        if let (Some(id), Some(rbs_id)) = (iub_link.attr("id"), iub_link.descendant_text("rbsId"))
        {
            rbs_ids.insert(id.to_string(), rbs_id.to_string());
        }
    }
    rbs_ids
}

fn attribute_value<'a>(cell: &'a Element, attr: &str) -> Result<&'a str> {
    cell.find("attributes")
        .and_then(|attrs| attrs.child_text(attr))
        .with_context(|| {
            format!(
                "UtranCell {} missing {attr}",
                cell.attr("id").unwrap_or("?"),
            )
        })
}

/// Profile name from the reference text, or the raw text when the
/// reference is not a distinguished name.
fn parse_mocn_value(text: &str) -> String {
    match MOCN_RE.find(text) {
        Some(found) => found
            .as_str()
            .rsplit('=')
            .next()
            .unwrap_or_default()
            .to_string(),
        None => text.to_string(),
    }
}

pub fn extract(input: &Path) -> Result<Extracted> {
    let enm_sites = enm::parse_node_parameter(&read_lines(input, "wcdma_rbs_ids")?, Fdn::MeContext);
    let mut enm_ips = enm::parse_bbu_ips(&read_lines(input, "bbu_ips")?, "oam");
    for (node, ip) in enm::parse_node_parameter(&read_lines(input, "dus_oam_ips")?, Fdn::MeContext)
    {
        enm_ips.insert(node, Some(ip));
    }

    let path = input.join("oss_utrancells.xml");
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    let root = xmltree::parse(&text).with_context(|| format!("parsing {}", path.display()))?;

    parse_wcdma_cells(&root, &enm_sites, &enm_ips)
}

fn read_lines(dir: &Path, command: &str) -> Result<Vec<String>> {
    let path = dir.join(format!("{command}.txt"));
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("reading command output {}", path.display()))?;
    Ok(text.lines().map(str::to_string).collect())
}

fn parse_wcdma_cells(
    root: &Element,
    enm_sites: &HashMap<String, String>,
    enm_ips: &HashMap<String, Option<String>>,
) -> Result<Extracted> {
    let sites = parse_rbs_data(root, enm_sites, enm_ips);
    let rbs_ids = parse_iublink_data(root);
    let insert_date = model::today();

    let mut cells = Vec::new();
    for rnc in root.descendants("MeContext") {
        let Some(rnc_name) = rnc.attr("id") else {
            continue;
        };
        if !rnc_name.contains("RNC") {
            continue;
        }
        let rnc_id = rnc.descendant_text("rncId").map(str::to_string);

        for cell in rnc.descendants("UtranCell") {
            let iub_link = attribute_value(cell, "utranCellIubLink")?
                .rsplit('=')
                .next()
                .unwrap_or_default()
                .to_string();
            let rbs_id = rbs_ids.get(&iub_link).with_context(|| {
                format!("IubLink {iub_link} resolves to no radio node")
            })?;
            // Nodes missing from both the export and the side data keep
            // the rbsId as a stand-in name.
            let (site_name, ip_address) = match sites.get(rbs_id) {
                Some(entry) => (entry.site_name.clone(), entry.ip_address.clone()),
                None => (rbs_id.clone(), None),
            };
            let state = cell
                .descendant_text("administrativeState")
                .map(model::admin_state);
            cells.push(CellRecord::Wcdma(WcdmaCell {
                operator: Some("Kcell".to_string()),
                oss: "OSS".to_string(),
                rnc_id: rnc_id.clone(),
                rnc_name: Some(rnc_name.to_string()),
                site_name: Some(site_name),
                cell_name: cell.attr("id").map(str::to_string),
                cid: Some(attribute_value(cell, "cId")?.to_string()),
                local_cell_id: Some(attribute_value(cell, "localCellId")?.to_string()),
                uarfcn_dl: Some(attribute_value(cell, "uarfcnDl")?.to_string()),
                uarfcn_ul: Some(attribute_value(cell, "uarfcnUl")?.to_string()),
                scrambling_code: Some(
                    attribute_value(cell, "primaryScramblingCode")?.to_string(),
                ),
                lac: Some(attribute_value(cell, "lac")?.to_string()),
                rac: Some(attribute_value(cell, "rac")?.to_string()),
                sac: Some(attribute_value(cell, "sac")?.to_string()),
                ura: Some(attribute_value(cell, "uraList")?.to_string()),
                cpich_power: Some(attribute_value(cell, "primaryCpichPower")?.to_string()),
                max_tx_power: Some(
                    attribute_value(cell, "maximumTransmissionPower")?.to_string(),
                ),
                iub_link: Some(iub_link),
                mocn_profile: cell
                    .descendant_text("mocnCellProfileRef")
                    .map(parse_mocn_value),
                state: state.map(str::to_string),
                ip_address,
                vendor: "Ericsson".to_string(),
                qrxlevmin: cell
                    .descendant_text("qRxLevMin")
                    .and_then(|v| v.parse().ok()),
                qqualmin: cell
                    .descendant_text("qQualMin")
                    .and_then(|v| v.parse().ok()),
                insert_date: insert_date.clone(),
                physical: PhysicalParams::default(),
                region: None,
            }));
        }
    }
    Ok(Extracted { cells, dropped: 0 })
}

// ── Tests ──
