use std::fmt;

use serde::Serialize;

use crate::enrich::PhysicalParams;

/// RAN technology of a partition. One canonical record shape per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Technology {
    Gsm,
    Wcdma,
    Lte,
    Nr,
}

impl Technology {
    pub fn as_str(&self) -> &'static str {
        match self {
            Technology::Gsm => "GSM",
            Technology::Wcdma => "WCDMA",
            Technology::Lte => "LTE",
            Technology::Nr => "NR",
        }
    }

    /// Sink table holding this technology's canonical records.
    pub fn table(&self) -> &'static str {
        match self {
            Technology::Gsm => "gsm_cells",
            Technology::Wcdma => "wcdma_cells",
            Technology::Lte => "lte_cells",
            Technology::Nr => "nr_cells",
        }
    }
}

impl fmt::Display for Technology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration source (OSS/vendor). The label is the `oss` bookkeeping
/// field of every record and the partition key in the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Source {
    Enm1,
    Enm2,
    Oss,
    Zte,
    Tele2,
    BeelineHuawei,
    BeelineNokia,
}

impl Source {
    pub fn label(&self) -> &'static str {
        match self {
            Source::Enm1 => "ENM1",
            Source::Enm2 => "ENM2",
            Source::Oss => "OSS",
            Source::Zte => "ZTE",
            Source::Tele2 => "Tele2",
            Source::BeelineHuawei => "Beeline Huawei",
            Source::BeelineNokia => "Beeline Nokia",
        }
    }

    /// Subdirectory under the `run` root holding this source's documents.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Source::Enm1 => "enm1",
            Source::Enm2 => "enm2",
            Source::Oss => "oss",
            Source::Zte => "zte",
            Source::Tele2 => "tele2",
            Source::BeelineHuawei => "beeline_huawei",
            Source::BeelineNokia => "beeline_nokia",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Multiplier joining a parent node id and a local cell id into the
/// composite cell identifier (ECI / NCI low bits). Hardware-defined.
const ECI_FACTOR: i64 = 256;

pub fn eci(node_id: i64, cell_id: i64) -> i64 {
    node_id * ECI_FACTOR + cell_id
}

/// Map a two-valued administrative-state code to the 3G/4G enumeration.
/// Every vendor encodes "in service" as "1"; anything else is locked.
pub fn admin_state(code: &str) -> &'static str {
    if code == "1" {
        "UNLOCKED"
    } else {
        "LOCKED"
    }
}

/// Same rule for the 2G enumeration.
pub fn cell_state(code: &str) -> &'static str {
    if code == "1" {
        "ACTIVE"
    } else {
        "HALTED"
    }
}

/// Today's date, the `insert_date` bookkeeping value of a batch.
pub fn today() -> String {
    chrono::Local::now().date_naive().to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GsmCell {
    pub operator: Option<String>,
    pub oss: String,
    pub bsc_id: Option<String>,
    pub bsc_name: Option<String>,
    pub site_name: Option<String>,
    pub cell_name: Option<String>,
    pub bcc: Option<String>,
    pub ncc: Option<String>,
    pub lac: Option<String>,
    pub cell_id: Option<String>,
    pub bcch: Option<String>,
    pub hsn: Option<String>,
    pub maio: Option<String>,
    pub tch_freqs: Option<String>,
    pub state: Option<String>,
    pub vendor: String,
    pub insert_date: String,
    pub physical: PhysicalParams,
    pub region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WcdmaCell {
    pub operator: Option<String>,
    pub oss: String,
    pub rnc_id: Option<String>,
    pub rnc_name: Option<String>,
    pub site_name: Option<String>,
    pub cell_name: Option<String>,
    pub cid: Option<String>,
    pub local_cell_id: Option<String>,
    pub uarfcn_dl: Option<String>,
    pub uarfcn_ul: Option<String>,
    pub scrambling_code: Option<String>,
    pub lac: Option<String>,
    pub rac: Option<String>,
    pub sac: Option<String>,
    pub ura: Option<String>,
    pub cpich_power: Option<String>,
    pub max_tx_power: Option<String>,
    pub iub_link: Option<String>,
    pub mocn_profile: Option<String>,
    pub state: Option<String>,
    pub ip_address: Option<String>,
    pub vendor: String,
    pub qrxlevmin: Option<i64>,
    pub qqualmin: Option<i64>,
    pub insert_date: String,
    pub physical: PhysicalParams,
    pub region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LteCell {
    pub subnetwork: Option<String>,
    pub oss: String,
    pub site_name: Option<String>,
    pub cell_name: Option<String>,
    pub enodeb_id: Option<i64>,
    pub cell_id: Option<String>,
    pub eci: Option<i64>,
    pub earfcn_dl: Option<String>,
    pub phys_cell_id: Option<String>,
    pub tac: Option<String>,
    pub root_seq_index: Option<String>,
    pub qrxlevmin: Option<i64>,
    pub state: Option<String>,
    pub cell_range: Option<String>,
    pub ip_address: Option<String>,
    pub vendor: String,
    pub insert_date: String,
    pub physical: PhysicalParams,
    pub region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NrCell {
    pub subnetwork: Option<String>,
    pub oss: String,
    pub site_name: Option<String>,
    pub cell_name: Option<String>,
    pub gnb_id: Option<i64>,
    pub local_cell_id: Option<String>,
    pub nci: Option<String>,
    pub pci: Option<String>,
    pub tac: Option<String>,
    pub root_seq_index: Option<String>,
    pub qrxlevmin: Option<i64>,
    pub arfcn_dl: Option<String>,
    pub bandwidth: Option<String>,
    pub max_tx_power: Option<String>,
    pub ssb_frequency: Option<String>,
    pub cell_state: Option<String>,
    pub ip_address: Option<String>,
    pub vendor: String,
    pub insert_date: String,
    pub physical: PhysicalParams,
    pub region: Option<String>,
}

/// A canonical record of any technology, for dispatch through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CellRecord {
    Gsm(GsmCell),
    Wcdma(WcdmaCell),
    Lte(LteCell),
    Nr(NrCell),
}

impl CellRecord {
    pub fn technology(&self) -> Technology {
        match self {
            CellRecord::Gsm(_) => Technology::Gsm,
            CellRecord::Wcdma(_) => Technology::Wcdma,
            CellRecord::Lte(_) => Technology::Lte,
            CellRecord::Nr(_) => Technology::Nr,
        }
    }

    pub fn cell_name(&self) -> Option<&str> {
        match self {
            CellRecord::Gsm(c) => c.cell_name.as_deref(),
            CellRecord::Wcdma(c) => c.cell_name.as_deref(),
            CellRecord::Lte(c) => c.cell_name.as_deref(),
            CellRecord::Nr(c) => c.cell_name.as_deref(),
        }
    }

    pub fn site_name(&self) -> Option<&str> {
        match self {
            CellRecord::Gsm(c) => c.site_name.as_deref(),
            CellRecord::Wcdma(c) => c.site_name.as_deref(),
            CellRecord::Lte(c) => c.site_name.as_deref(),
            CellRecord::Nr(c) => c.site_name.as_deref(),
        }
    }

    pub fn physical(&self) -> &PhysicalParams {
        match self {
            CellRecord::Gsm(c) => &c.physical,
            CellRecord::Wcdma(c) => &c.physical,
            CellRecord::Lte(c) => &c.physical,
            CellRecord::Nr(c) => &c.physical,
        }
    }

    pub fn set_physical(&mut self, params: PhysicalParams) {
        match self {
            CellRecord::Gsm(c) => c.physical = params,
            CellRecord::Wcdma(c) => c.physical = params,
            CellRecord::Lte(c) => c.physical = params,
            CellRecord::Nr(c) => c.physical = params,
        }
    }

    pub fn set_region(&mut self, region: Option<String>) {
        match self {
            CellRecord::Gsm(c) => c.region = region,
            CellRecord::Wcdma(c) => c.region = region,
            CellRecord::Lte(c) => c.region = region,
            CellRecord::Nr(c) => c.region = region,
        }
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eci_is_node_times_256_plus_cell() {
        assert_eq!(eci(12345, 3), 3160323);
    }

    #[test]
    fn admin_state_codes() {
        assert_eq!(admin_state("1"), "UNLOCKED");
        assert_eq!(admin_state("0"), "LOCKED");
        assert_eq!(admin_state("whatever"), "LOCKED");
    }

    #[test]
    fn cell_state_codes() {
        assert_eq!(cell_state("1"), "ACTIVE");
        assert_eq!(cell_state("0"), "HALTED");
    }
}
