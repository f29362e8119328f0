//! Extractors for Ericsson network-manager CLI exports.
//!
//! Each export is the captured output of one `cmedit get` command, stored
//! as `<command>.txt` in the source directory. Output is line oriented: an
//! `FDN` line opens an object instance, attribute lines follow as
//! `name : value`. The attribute set of a command is fixed, so the
//! lexicographically greatest attribute name marks the end of an instance.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

use crate::enrich::PhysicalParams;
use crate::model::{self, CellRecord, GsmCell, LteCell, NrCell, Technology, WcdmaCell};
use crate::parser::xref::{merge_site_tables, SiteTable};
use crate::parser::{Extracted, RawRecord};

pub const ATTR_DELIMITER: &str = " : ";

pub const LTE_CELL_PARAMS: &[&str] = &[
    "administrativeState",
    "cellId",
    "earfcndl",
    "physicalLayerCellId",
    "qRxLevMin",
    "rachRootSequence",
    "tac",
    "cellRange",
];

pub const WCDMA_CELL_PARAMS: &[&str] = &[
    "administrativeState",
    "cId",
    "localCellId",
    "lac",
    "rac",
    "sac",
    "uarfcnDl",
    "uarfcnUl",
    "primaryScramblingCode",
    "primaryCpichPower",
    "maximumTransmissionPower",
    "iubLinkRef",
    "mocnCellProfileRef",
    "qRxLevMin",
    "qQualMin",
    "uraRef",
];

pub const GSM_CELL_PARAMS: &[&str] = &["bcc", "bcchNo", "cgi", "ncc", "state"];

pub const NR_CELL_PARAMS: &[&str] = &[
    "cellLocalId",
    "cellState",
    "nCI",
    "nRPCI",
    "nRTAC",
    "qRxLevMin",
    "rachRootSequence",
    "ssbFrequency",
];

/// The attribute whose arrival completes an instance: `cmedit` prints
/// attributes sorted by name, so the greatest name comes last.
pub fn emission_attribute<'a>(params: &[&'a str]) -> &'a str {
    params.iter().max().copied().unwrap_or_default()
}

// ── FDN parsing ──

static SUBNETWORK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(",SubNetwork=[^,]*").unwrap());
static MECONTEXT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new("MeContext=[^,]*").unwrap());
static MANAGED_ELEMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("ManagedElement=[^,]*").unwrap());
static NR_SECTOR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new("NRSectorCarrier=.*").unwrap());
static NR_CELL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new("NRCellDU=.*").unwrap());
static EUTRAN_CELL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("EUtranCellFDD=[^,]*").unwrap());
static IUBLINK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new("IubLink=.*").unwrap());
static UTRAN_CELL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new("UtranCell=.*").unwrap());
static GSM_SECTOR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new("GsmSector=.*").unwrap());
static GERAN_CELL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new("GeranCell=.*").unwrap());
static CHANNEL_GROUP_CELL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("GeranCell=[^,]*").unwrap());

/// Managed-object class whose value is wanted from an FDN line.
#[derive(Debug, Clone, Copy)]
pub enum Fdn {
    SubNetwork,
    MeContext,
    NrSectorCarrier,
    NrCellDu,
    EutranCellFdd,
    IubLink,
    UtranCell,
    GsmSector,
    GeranCell,
    ChannelGroupCell,
}

/// Value of one managed object in a full distinguished name. A node may
/// expose `ManagedElement` instead of `MeContext`, both name the node.
pub fn parse_fdn(fdn: &str, kind: Fdn) -> Option<String> {
    let re: &Regex = match kind {
        Fdn::SubNetwork => &SUBNETWORK_RE,
        Fdn::MeContext => &MECONTEXT_RE,
        Fdn::NrSectorCarrier => &NR_SECTOR_RE,
        Fdn::NrCellDu => &NR_CELL_RE,
        Fdn::EutranCellFdd => &EUTRAN_CELL_RE,
        Fdn::IubLink => &IUBLINK_RE,
        Fdn::UtranCell => &UTRAN_CELL_RE,
        Fdn::GsmSector => &GSM_SECTOR_RE,
        Fdn::GeranCell => &GERAN_CELL_RE,
        Fdn::ChannelGroupCell => &CHANNEL_GROUP_CELL_RE,
    };
    let found = match kind {
        Fdn::MeContext => re.find(fdn).or_else(|| MANAGED_ELEMENT_RE.find(fdn)),
        _ => re.find(fdn),
    }?;
    found
        .as_str()
        .rsplit('=')
        .next()
        .map(|value| value.to_string())
}

fn split_attr(line: &str) -> Option<(&str, &str)> {
    line.split_once(ATTR_DELIMITER)
}

// ── Side tables ──

/// One value per node from a single-attribute command.
pub fn parse_node_parameter(lines: &[String], kind: Fdn) -> HashMap<String, String> {
    let mut out = HashMap::new();
    let mut node: Option<String> = None;
    for line in lines {
        if line.contains("FDN") {
            node = parse_fdn(line, kind);
        } else if let Some((_, value)) = line.rsplit_once(ATTR_DELIMITER) {
            if let Some(name) = &node {
                out.insert(name.clone(), value.to_string());
            }
        }
    }
    out
}

static IP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}\b").unwrap());

pub fn get_ip(text: &str) -> Option<String> {
    IP_RE.find(text).map(|m| m.as_str().to_string())
}

/// Node addresses from the interface dump, filtered to one router type.
/// Only the attribute line directly following a matching FDN counts.
pub fn parse_bbu_ips(lines: &[String], router_type: &str) -> HashMap<String, Option<String>> {
    let marker = router_type.to_lowercase();
    let mut out = HashMap::new();
    let mut pending: Option<String> = None;
    for line in lines {
        if line.contains("FDN") && line.to_lowercase().contains(&marker) {
            pending = parse_fdn(line, Fdn::MeContext);
        } else if line.contains(ATTR_DELIMITER) {
            if let Some(name) = pending.take() {
                out.insert(name, get_ip(line));
            }
        }
    }
    out
}

fn read_command(dir: &Path, command: &str) -> Result<Vec<String>> {
    let path = dir.join(format!("{command}.txt"));
    let text = fs::read_to_string(&path)
        .with_context(|| format!("reading command output {}", path.display()))?;
    Ok(text.lines().map(str::to_string).collect())
}

// ── Dispatch ──

pub fn extract(oss: &str, technology: Technology, input: &Path) -> Result<Extracted> {
    match technology {
        Technology::Lte => extract_lte(oss, input),
        Technology::Nr => extract_nr(oss, input),
        Technology::Wcdma => extract_wcdma(oss, input),
        Technology::Gsm => extract_gsm(oss, input),
    }
}

// ── LTE ──

fn extract_lte(oss: &str, dir: &Path) -> Result<Extracted> {
    let bbu_ips = parse_bbu_ips(&read_command(dir, "bbu_ips")?, "router=oam");
    let dus_ips = parse_node_parameter(&read_command(dir, "dus_oam_ips")?, Fdn::MeContext);
    let enbids = parse_node_parameter(&read_command(dir, "enodeb_id")?, Fdn::MeContext);

    let mut node_ips = bbu_ips;
    for (node, ip) in dus_ips {
        node_ips.insert(node, Some(ip));
    }

    let last = emission_attribute(LTE_CELL_PARAMS);
    let insert_date = model::today();
    let mut cells = Vec::new();
    let mut current: Option<RawRecord> = None;

    for line in read_command(dir, "lte_cells")? {
        if line.contains("FDN") {
            let mut rec =
                RawRecord::new(parse_fdn(&line, Fdn::EutranCellFdd).unwrap_or_default());
            rec.set("subnetwork", parse_fdn(&line, Fdn::SubNetwork));
            rec.set("site_name", parse_fdn(&line, Fdn::MeContext));
            current = Some(rec);
        } else if let Some((name, value)) = split_attr(&line) {
            if let Some(rec) = current.as_mut() {
                rec.set(name, Some(value.to_string()));
                if name == last {
                    let rec = current.take().unwrap_or_default();
                    cells.push(build_lte(oss, rec, &enbids, &node_ips, &insert_date));
                }
            }
        }
    }
    Ok(Extracted { cells, dropped: 0 })
}

fn build_lte(
    oss: &str,
    rec: RawRecord,
    enbids: &HashMap<String, String>,
    node_ips: &HashMap<String, Option<String>>,
    insert_date: &str,
) -> CellRecord {
    let site = rec.get("site_name");
    let enodeb_id: Option<i64> = site
        .and_then(|name| enbids.get(name))
        .and_then(|id| id.parse().ok());
    let ip_address = site.and_then(|name| node_ips.get(name)).cloned().flatten();
    let eci = match (enodeb_id, rec.get_i64("cellId")) {
        (Some(node), Some(cell)) => Some(model::eci(node, cell)),
        _ => None,
    };
    CellRecord::Lte(LteCell {
        subnetwork: rec.get_owned("subnetwork"),
        oss: oss.to_string(),
        site_name: site.map(str::to_string),
        cell_name: Some(rec.object_id.clone()),
        enodeb_id,
        cell_id: rec.get_owned("cellId"),
        eci,
        earfcn_dl: rec.get_owned("earfcndl"),
        phys_cell_id: rec.get_owned("physicalLayerCellId"),
        tac: rec.get_owned("tac"),
        root_seq_index: rec.get_owned("rachRootSequence"),
        qrxlevmin: rec.get_i64("qRxLevMin"),
        state: rec.get_owned("administrativeState"),
        cell_range: rec.get_owned("cellRange"),
        ip_address,
        vendor: "Ericsson".to_string(),
        insert_date: insert_date.to_string(),
        physical: PhysicalParams::default(),
        region: None,
    })
}

// ── NR ──

/// Carrier attributes keyed by sector name. The sector dump ends each
/// instance with configuredMaxTxPower.
pub fn parse_nr_sectors(lines: &[String]) -> HashMap<String, RawRecord> {
    let mut sectors = HashMap::new();
    let mut current: Option<RawRecord> = None;
    for line in lines {
        if line.contains("FDN") {
            current = parse_fdn(line, Fdn::NrSectorCarrier).map(RawRecord::new);
        } else if let Some((name, value)) = split_attr(line) {
            if let Some(rec) = current.as_mut() {
                rec.set(name, Some(value.to_string()));
                if name == "configuredMaxTxPower" {
                    if let Some(rec) = current.take() {
                        sectors.insert(rec.object_id.clone(), rec);
                    }
                }
            }
        }
    }
    sectors
}

fn extract_nr(oss: &str, dir: &Path) -> Result<Extracted> {
    let node_ips = parse_bbu_ips(&read_command(dir, "bbu_ips")?, "router=oam");
    let gnbids = parse_node_parameter(&read_command(dir, "gnbid")?, Fdn::MeContext);
    let sectors = parse_nr_sectors(&read_command(dir, "nr_sectors")?);

    let last = emission_attribute(NR_CELL_PARAMS);
    let insert_date = model::today();
    let mut cells = Vec::new();
    let mut current: Option<RawRecord> = None;

    for line in read_command(dir, "nr_cells")? {
        if line.contains("FDN") {
            let mut rec = RawRecord::new(parse_fdn(&line, Fdn::NrCellDu).unwrap_or_default());
            rec.set("subnetwork", parse_fdn(&line, Fdn::SubNetwork));
            rec.set("site_name", parse_fdn(&line, Fdn::MeContext));
            current = Some(rec);
        } else if let Some((name, value)) = split_attr(&line) {
            if let Some(rec) = current.as_mut() {
                rec.set(name, Some(value.to_string()));
                if name == last {
                    let rec = current.take().unwrap_or_default();
                    cells.push(build_nr(oss, rec, &sectors, &gnbids, &node_ips, &insert_date));
                }
            }
        }
    }
    Ok(Extracted { cells, dropped: 0 })
}

fn build_nr(
    oss: &str,
    rec: RawRecord,
    sectors: &HashMap<String, RawRecord>,
    gnbids: &HashMap<String, String>,
    node_ips: &HashMap<String, Option<String>>,
    insert_date: &str,
) -> CellRecord {
    let site = rec.get("site_name");
    let sector = sectors.get(&rec.object_id);
    // A non-numeric nCI means the cell was never integrated.
    let nci = rec
        .get("nCI")
        .filter(|value| value.chars().all(|c| c.is_ascii_digit()))
        .map(str::to_string);
    CellRecord::Nr(NrCell {
        subnetwork: rec.get_owned("subnetwork"),
        oss: oss.to_string(),
        site_name: site.map(str::to_string),
        cell_name: Some(rec.object_id.clone()),
        gnb_id: site
            .and_then(|name| gnbids.get(name))
            .and_then(|id| id.parse().ok()),
        local_cell_id: rec.get_owned("cellLocalId"),
        nci,
        pci: rec.get_owned("nRPCI"),
        tac: rec.get_owned("nRTAC"),
        root_seq_index: rec.get_owned("rachRootSequence"),
        qrxlevmin: rec.get_i64("qRxLevMin"),
        arfcn_dl: sector.and_then(|s| s.get_owned("arfcnDL")),
        bandwidth: sector.and_then(|s| s.get_owned("bSChannelBwDL")),
        max_tx_power: sector.and_then(|s| s.get_owned("configuredMaxTxPower")),
        ssb_frequency: rec.get_owned("ssbFrequency"),
        cell_state: rec.get_owned("cellState"),
        ip_address: site.and_then(|name| node_ips.get(name)).cloned().flatten(),
        vendor: "Ericsson".to_string(),
        insert_date: insert_date.to_string(),
        physical: PhysicalParams::default(),
        region: None,
    })
}

// ── WCDMA ──

fn swap_keys_vals(map: &HashMap<String, String>) -> HashMap<String, String> {
    map.iter()
        .map(|(key, value)| (value.clone(), key.clone()))
        .collect()
}

/// Site name per IubLink, resolved through the transport layer: the RNC
/// knows each link's remote address, the nodes know their own. Links whose
/// address matches no node keep the link name as the site name.
pub fn parse_wcdma_site_names(
    rnc_iublink_lines: &[String],
    dus_iub_lines: &[String],
    bbu_ip_lines: &[String],
) -> HashMap<String, String> {
    let rnc_iublink_ips = parse_node_parameter(rnc_iublink_lines, Fdn::IubLink);
    let dus_iub_ips = parse_node_parameter(dus_iub_lines, Fdn::MeContext);
    let bbu_iub_ips = parse_bbu_ips(bbu_ip_lines, "iub");

    let mut site_by_ip = swap_keys_vals(&dus_iub_ips);
    for (node, ip) in bbu_iub_ips {
        if let Some(ip) = ip {
            site_by_ip.insert(ip, node);
        }
    }

    rnc_iublink_ips
        .into_iter()
        .map(|(iublink, iub_ip)| {
            let site = site_by_ip.get(&iub_ip).cloned().unwrap_or(iublink.clone());
            (iublink, site)
        })
        .collect()
}

/// Split one attribute line. Reference attributes carry a whole FDN as
/// value; only the trailing object name and value matter, and a dangling
/// reference resolves to null. Ura references end with a stray character
/// that must go.
pub fn parse_parameter(line: &str) -> Option<(String, Option<String>)> {
    let (name, value) = split_attr(line)?;
    let Some(stripped) = name.strip_suffix("Ref") else {
        return Some((name.to_string(), Some(value.to_string())));
    };
    let tail = value.rsplit(',').next().unwrap_or(value);
    match tail.split_once('=') {
        Some(("Ura", ref_value)) => {
            let end = ref_value.len().saturating_sub(1);
            Some(("Ura".to_string(), Some(ref_value[..end].to_string())))
        }
        Some((ref_name, ref_value)) => Some((ref_name.to_string(), Some(ref_value.to_string()))),
        None => Some((stripped.to_string(), None)),
    }
}

/// Translate a sharing-profile name to the partner operator id list.
pub fn mocn_operators(profile: Option<String>) -> Option<String> {
    match profile.as_deref() {
        Some("Kcell") | None => None,
        Some("Sharing2") => Some("2, 77".to_string()),
        Some("Sharing3") => Some("1, 2, 77".to_string()),
        Some("Sharing4") => Some("1, 2".to_string()),
        Some("Veon") => Some("1".to_string()),
        Some(other) => Some(other.to_string()),
    }
}

fn extract_wcdma(oss: &str, dir: &Path) -> Result<Extracted> {
    let bbu_ip_lines = read_command(dir, "bbu_ips")?;
    let site_names = parse_wcdma_site_names(
        &read_command(dir, "rnc_iublink_ips")?,
        &read_command(dir, "dus_iub_ips")?,
        &bbu_ip_lines,
    );

    let dus_oam_ips = parse_node_parameter(&read_command(dir, "dus_oam_ips")?, Fdn::MeContext);
    let mut node_ips = parse_bbu_ips(&bbu_ip_lines, "oam");
    for (node, ip) in dus_oam_ips {
        node_ips.insert(node, Some(ip));
    }

    let rnc_ids = parse_node_parameter(&read_command(dir, "rnc_ids")?, Fdn::MeContext);

    let last = emission_attribute(WCDMA_CELL_PARAMS).to_lowercase();
    let insert_date = model::today();
    let mut cells = Vec::new();
    let mut current: Option<RawRecord> = None;

    for line in read_command(dir, "wcdma_cells")? {
        if line.contains("FDN") {
            let mut rec = RawRecord::new(parse_fdn(&line, Fdn::UtranCell).unwrap_or_default());
            rec.set("rnc_name", parse_fdn(&line, Fdn::MeContext));
            current = Some(rec);
        } else if let Some((name, value)) = parse_parameter(&line) {
            if let Some(rec) = current.as_mut() {
                let value = if name == "MocnCellProfile" {
                    mocn_operators(value)
                } else {
                    value
                };
                let done = last.contains(&name.to_lowercase());
                rec.set(name, value);
                if done {
                    let rec = current.take().unwrap_or_default();
                    cells.push(build_wcdma(
                        oss,
                        rec,
                        &site_names,
                        &rnc_ids,
                        &node_ips,
                        &insert_date,
                    ));
                }
            }
        }
    }
    Ok(Extracted { cells, dropped: 0 })
}

fn build_wcdma(
    oss: &str,
    rec: RawRecord,
    site_names: &HashMap<String, String>,
    rnc_ids: &HashMap<String, String>,
    node_ips: &HashMap<String, Option<String>>,
    insert_date: &str,
) -> CellRecord {
    let site_name = rec
        .get("IubLink")
        .and_then(|iub| site_names.get(iub))
        .cloned();
    let ip_address = site_name
        .as_deref()
        .and_then(|site| node_ips.get(site))
        .cloned()
        .flatten();
    let rnc_name = rec.get_owned("rnc_name");
    let rnc_id = rnc_name.as_deref().and_then(|rnc| rnc_ids.get(rnc)).cloned();
    CellRecord::Wcdma(WcdmaCell {
        operator: Some("Kcell".to_string()),
        oss: oss.to_string(),
        rnc_id,
        rnc_name,
        site_name,
        cell_name: Some(rec.object_id.clone()),
        cid: rec.get_owned("cId"),
        local_cell_id: rec.get_owned("localCellId"),
        uarfcn_dl: rec.get_owned("uarfcnDl"),
        uarfcn_ul: rec.get_owned("uarfcnUl"),
        scrambling_code: rec.get_owned("primaryScramblingCode"),
        lac: rec.get_owned("lac"),
        rac: rec.get_owned("rac"),
        sac: rec.get_owned("sac"),
        ura: rec.get_owned("Ura"),
        cpich_power: rec.get_owned("primaryCpichPower"),
        max_tx_power: rec.get_owned("maximumTransmissionPower"),
        iub_link: rec.get_owned("IubLink"),
        mocn_profile: rec.get_owned("MocnCellProfile"),
        state: rec.get_owned("administrativeState"),
        ip_address,
        vendor: "Ericsson".to_string(),
        qrxlevmin: rec.get_i64("qRxLevMin"),
        qqualmin: rec.get_i64("qQualMin"),
        insert_date: insert_date.to_string(),
        physical: PhysicalParams::default(),
        region: None,
    })
}

// ── GSM ──

static BSC_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z]*_B\d{1,2}").unwrap());

/// Sites served from baseband units, keyed bsc -> cell -> site.
pub fn parse_bbu_sites(lines: &[String]) -> SiteTable {
    let mut sites = SiteTable::new();
    let mut context: Option<(String, String)> = None;
    for line in lines {
        if line.contains("FDN") {
            context = match (
                parse_fdn(line, Fdn::MeContext),
                parse_fdn(line, Fdn::GsmSector),
            ) {
                (Some(site), Some(cell)) => Some((site, cell)),
                _ => None,
            };
        } else if line.contains("bscNodeIdentity") {
            let Some(bsc) = BSC_NAME_RE.find(line) else {
                continue;
            };
            if let Some((site, cell)) = &context {
                sites
                    .entry(bsc.as_str().to_string())
                    .or_default()
                    .insert(cell.clone(), Some(site.clone()));
            }
        }
    }
    sites
}

/// Sites served through transceiver groups, keyed bsc -> cell -> site.
pub fn parse_tg_sites(lines: &[String]) -> SiteTable {
    let mut sites = SiteTable::new();
    let mut bsc: Option<String> = None;
    let mut gsm_cells: Vec<String> = Vec::new();
    for line in lines {
        if line.contains("FDN") {
            bsc = parse_fdn(line, Fdn::MeContext);
        } else if line.contains("connectedChannelGroup") {
            let mut connected: Vec<String> = CHANNEL_GROUP_CELL_RE
                .find_iter(line)
                .filter_map(|m| m.as_str().rsplit('=').next())
                .map(str::to_string)
                .collect();
            connected.sort();
            connected.dedup();
            gsm_cells = connected;
        } else if line.contains("rSite") {
            let Some((_, site)) = line.rsplit_once(ATTR_DELIMITER) else {
                continue;
            };
            if let Some(bsc) = &bsc {
                let entry = sites.entry(bsc.clone()).or_default();
                for cell in &gsm_cells {
                    entry.insert(cell.clone(), Some(site.to_string()));
                }
            }
        }
    }
    sites
}

/// Hopping configuration per cell, keyed (bsc, cell) -> attrs. List-valued
/// attributes arrive bracketed.
pub fn parse_channel_group(lines: &[String]) -> HashMap<(String, String), RawRecord> {
    let mut channels = HashMap::new();
    let mut key: Option<(String, String)> = None;
    for line in lines {
        if line.contains("FDN") {
            key = match (
                parse_fdn(line, Fdn::MeContext),
                parse_fdn(line, Fdn::ChannelGroupCell),
            ) {
                (Some(bsc), Some(cell)) => {
                    channels.insert((bsc.clone(), cell.clone()), RawRecord::new(&cell));
                    Some((bsc, cell))
                }
                _ => None,
            };
        } else if let Some((name, value)) = split_attr(line) {
            if name == "channelGroupId" {
                continue;
            }
            let value = if name == "dchNo" || name == "maio" {
                value
                    .strip_prefix('[')
                    .and_then(|v| v.strip_suffix(']'))
                    .unwrap_or(value)
            } else {
                value
            };
            if let Some(key) = &key {
                if let Some(rec) = channels.get_mut(key) {
                    rec.set(name, Some(value.to_string()));
                }
            }
        }
    }
    channels
}

fn extract_gsm(oss: &str, dir: &Path) -> Result<Extracted> {
    let bbu_sites = parse_bbu_sites(&read_command(dir, "gsm_bbu_sites")?);
    let tg12_sites = parse_tg_sites(&read_command(dir, "gsm_tg12_sites")?);
    let tg31_sites = parse_tg_sites(&read_command(dir, "gsm_tg31_sites")?);
    let sites = merge_site_tables(vec![tg31_sites, tg12_sites, bbu_sites]);

    let channels = parse_channel_group(&read_command(dir, "channel_group")?);

    let last = emission_attribute(GSM_CELL_PARAMS);
    let insert_date = model::today();
    let mut cells = Vec::new();
    let mut current: Option<RawRecord> = None;

    for line in read_command(dir, "gsm_cells")? {
        if line.contains("FDN") {
            let mut rec = RawRecord::new(parse_fdn(&line, Fdn::GeranCell).unwrap_or_default());
            rec.set("bsc_name", parse_fdn(&line, Fdn::MeContext));
            current = Some(rec);
        } else if let Some((name, value)) = split_attr(&line) {
            if let Some(rec) = current.as_mut() {
                let value = (value != "null").then(|| value.to_string());
                if name == "cgi" {
                    let (lac, cell_id) = match value.as_deref() {
                        Some(cgi) => {
                            let mut parts = cgi.rsplit('-');
                            let cell_id = parts.next().map(str::to_string);
                            let lac = parts.next().map(str::to_string);
                            (lac, cell_id)
                        }
                        None => (None, None),
                    };
                    rec.set("lac", lac);
                    rec.set("cell_id", cell_id);
                } else {
                    rec.set(name, value);
                }
                if name == last {
                    let rec = current.take().unwrap_or_default();
                    cells.push(build_gsm(oss, rec, &sites, &channels, &insert_date));
                }
            }
        }
    }
    Ok(Extracted { cells, dropped: 0 })
}

fn build_gsm(
    oss: &str,
    rec: RawRecord,
    sites: &SiteTable,
    channels: &HashMap<(String, String), RawRecord>,
    insert_date: &str,
) -> CellRecord {
    let bsc_name = rec.get_owned("bsc_name");
    let cell_name = rec.object_id.clone();
    let site_name = bsc_name
        .as_deref()
        .and_then(|bsc| sites.get(bsc))
        .and_then(|per_cell| per_cell.get(&cell_name))
        .cloned()
        .flatten();
    let channel = bsc_name
        .as_deref()
        .and_then(|bsc| channels.get(&(bsc.to_string(), cell_name.clone())));
    CellRecord::Gsm(GsmCell {
        operator: Some("Kcell".to_string()),
        oss: oss.to_string(),
        bsc_id: Some("1".to_string()),
        bsc_name,
        site_name,
        cell_name: Some(cell_name),
        bcc: rec.get_owned("bcc"),
        ncc: rec.get_owned("ncc"),
        lac: rec.get_owned("lac"),
        cell_id: rec.get_owned("cell_id"),
        bcch: rec.get_owned("bcchNo"),
        hsn: channel.and_then(|c| c.get_owned("hsn")),
        maio: channel.and_then(|c| c.get_owned("maio")),
        tch_freqs: channel.and_then(|c| c.get_owned("dchNo")),
        state: rec.get_owned("state"),
        vendor: "Ericsson".to_string(),
        insert_date: insert_date.to_string(),
        physical: PhysicalParams::default(),
        region: None,
    })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    const LTE_FDN: &str = "FDN : SubNetwork=ONRM_ROOT_MO,SubNetwork=Almaty,MeContext=ALM001,ManagedElement=1,ENodeBFunction=1,EUtranCellFDD=ALM001A1";

    #[test]
    fn fdn_values() {
        assert_eq!(parse_fdn(LTE_FDN, Fdn::SubNetwork).as_deref(), Some("Almaty"));
        assert_eq!(parse_fdn(LTE_FDN, Fdn::MeContext).as_deref(), Some("ALM001"));
        assert_eq!(
            parse_fdn(LTE_FDN, Fdn::EutranCellFdd).as_deref(),
            Some("ALM001A1"),
        );
    }

    #[test]
    fn fdn_falls_back_to_managed_element() {
        let fdn = "FDN : ManagedElement=AST010,GNBDUFunction=1";
        assert_eq!(parse_fdn(fdn, Fdn::MeContext).as_deref(), Some("AST010"));
    }

    #[test]
    fn emission_attribute_is_greatest_name() {
        assert_eq!(emission_attribute(LTE_CELL_PARAMS), "tac");
        assert_eq!(emission_attribute(GSM_CELL_PARAMS), "state");
        assert_eq!(emission_attribute(WCDMA_CELL_PARAMS), "uraRef");
        assert_eq!(emission_attribute(NR_CELL_PARAMS), "ssbFrequency");
    }

    #[test]
    fn node_parameter_pairs_fdn_with_value() {
        let lines = vec![
            "FDN : SubNetwork=X,MeContext=ALM001".to_string(),
            "enbid : 12345".to_string(),
            String::new(),
            "FDN : SubNetwork=X,MeContext=ALM002".to_string(),
            "enbid : 678".to_string(),
        ];
        let out = parse_node_parameter(&lines, Fdn::MeContext);
        assert_eq!(out["ALM001"], "12345");
        assert_eq!(out["ALM002"], "678");
    }

    #[test]
    fn bbu_ips_take_only_matching_routers() {
        let lines = vec![
            "FDN : MeContext=ALM001,Router=OAM,AddressIPv4=1".to_string(),
            "address : 10.20.30.40/24".to_string(),
            "FDN : MeContext=ALM002,Router=IUB,AddressIPv4=1".to_string(),
            "address : 10.20.30.41/24".to_string(),
        ];
        let out = parse_bbu_ips(&lines, "router=oam");
        assert_eq!(out["ALM001"].as_deref(), Some("10.20.30.40"));
        assert!(!out.contains_key("ALM002"));
    }

    #[test]
    fn ip_extraction() {
        assert_eq!(get_ip("address : 10.1.2.3/30").as_deref(), Some("10.1.2.3"));
        assert_eq!(get_ip("no address here"), None);
    }

    #[test]
    fn reference_parameters_resolve_to_trailing_object() {
        let (name, value) =
            parse_parameter("utranCellIubLinkRef : RncFunction=1,IubLink=Iub_ALM001").unwrap();
        assert_eq!(name, "IubLink");
        assert_eq!(value.as_deref(), Some("Iub_ALM001"));

        let (name, value) = parse_parameter("uraRef : RncFunction=1,Ura=30771").unwrap();
        assert_eq!(name, "Ura");
        assert_eq!(value.as_deref(), Some("3077"));

        let (name, value) = parse_parameter("mocnCellProfileRef : ").unwrap();
        assert_eq!(name, "mocnCellProfile");
        assert_eq!(value, None);
    }

    #[test]
    fn mocn_profile_names_map_to_operator_lists() {
        assert_eq!(mocn_operators(Some("Kcell".into())), None);
        assert_eq!(mocn_operators(Some("Sharing3".into())).as_deref(), Some("1, 2, 77"));
        assert_eq!(mocn_operators(Some("Veon".into())).as_deref(), Some("1"));
        assert_eq!(mocn_operators(Some("Custom".into())).as_deref(), Some("Custom"));
    }

    #[test]
    fn site_names_resolve_via_iub_addresses() {
        let rnc = vec![
            "FDN : MeContext=RNC01,RncFunction=1,IubLink=Iub_ALM001".to_string(),
            "remoteCpIpAddress1 : 10.0.0.1".to_string(),
            "FDN : MeContext=RNC01,RncFunction=1,IubLink=Iub_GHOST".to_string(),
            "remoteCpIpAddress1 : 10.9.9.9".to_string(),
        ];
        let dus = vec![
            "FDN : MeContext=ALM001,Ip=1".to_string(),
            "nodeIpAddress : 10.0.0.1".to_string(),
        ];
        let names = parse_wcdma_site_names(&rnc, &dus, &[]);
        assert_eq!(names["Iub_ALM001"], "ALM001");
        // No node owns the address, the link name stands in.
        assert_eq!(names["Iub_GHOST"], "Iub_GHOST");
    }

    #[test]
    fn tg_sites_cover_all_connected_cells() {
        let lines = vec![
            "FDN : MeContext=BSC_B1,TransportGroup=TG12".to_string(),
            "connectedChannelGroup : [GeranCell=ALM001A,ChannelGroup=0, GeranCell=ALM001B,ChannelGroup=0]".to_string(),
            "rSite : SITE_ALM001".to_string(),
        ];
        let sites = parse_tg_sites(&lines);
        assert_eq!(
            sites["BSC_B1"]["ALM001A"].as_deref(),
            Some("SITE_ALM001"),
        );
        assert_eq!(
            sites["BSC_B1"]["ALM001B"].as_deref(),
            Some("SITE_ALM001"),
        );
    }

    #[test]
    fn channel_group_strips_list_brackets() {
        let lines = vec![
            "FDN : MeContext=BSC_B1,GeranCell=ALM001A,ChannelGroup=0".to_string(),
            "channelGroupId : 0".to_string(),
            "dchNo : [71, 73, 75]".to_string(),
            "hsn : 42".to_string(),
            "maio : [0]".to_string(),
        ];
        let channels = parse_channel_group(&lines);
        let rec = &channels[&("BSC_B1".to_string(), "ALM001A".to_string())];
        assert_eq!(rec.get("dchNo"), Some("71, 73, 75"));
        assert_eq!(rec.get("hsn"), Some("42"));
        assert_eq!(rec.get("maio"), Some("0"));
        assert_eq!(rec.get("channelGroupId"), None);
    }

    #[test]
    fn bbu_site_precedence_over_tg() {
        let tg = vec![
            "FDN : MeContext=BSC_B1,TG=1".to_string(),
            "connectedChannelGroup : [GeranCell=ALM001A,ChannelGroup=0]".to_string(),
            "rSite : OLD_SITE".to_string(),
        ];
        let bbu = vec![
            "FDN : MeContext=NEW_SITE,GsmSector=ALM001A".to_string(),
            "bscNodeIdentity : something BSC_B1 here".to_string(),
        ];
        let merged = merge_site_tables(vec![parse_tg_sites(&tg), parse_bbu_sites(&bbu)]);
        assert_eq!(merged["BSC_B1"]["ALM001A"].as_deref(), Some("NEW_SITE"));
    }
}
