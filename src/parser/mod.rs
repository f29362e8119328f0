pub mod enm;
pub mod ericsson_bulk;
pub mod huawei_enodeb;
pub mod huawei_som;
pub mod nokia_raml;
pub mod oss_cna;
pub mod tele2;
pub mod xmltree;
pub mod xref;
pub mod zte;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use rusqlite::Connection;

use crate::model::{CellRecord, Source, Technology};

/// One managed-object instance flattened to attribute name -> value,
/// tagged with its own object id.
#[derive(Debug, Clone, Default)]
pub struct RawRecord {
    pub object_id: String,
    pub attrs: HashMap<String, Option<String>>,
}

impl RawRecord {
    pub fn new(object_id: impl Into<String>) -> Self {
        RawRecord {
            object_id: object_id.into(),
            attrs: HashMap::new(),
        }
    }

    pub fn set(&mut self, name: impl Into<String>, value: Option<String>) {
        self.attrs.insert(name.into(), value);
    }

    /// Attribute value; missing and null are the same thing to callers.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).and_then(|v| v.as_deref())
    }

    pub fn get_owned(&self, name: &str) -> Option<String> {
        self.get(name).map(str::to_string)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(|v| v.parse().ok())
    }

    /// Strict-schema accessor: absence is a data-integrity failure.
    pub fn require(&self, name: &str) -> Result<&str> {
        self.get(name)
            .with_context(|| format!("instance {} missing attribute {}", self.object_id, name))
    }
}

/// Extraction result for one partition: the canonical batch plus the number
/// of raw instances dropped by loose-source skip rules.
#[derive(Debug, Default)]
pub struct Extracted {
    pub cells: Vec<CellRecord>,
    pub dropped: usize,
}

impl Extracted {
    pub fn merge(&mut self, other: Extracted) {
        self.cells.extend(other.cells);
        self.dropped += other.dropped;
    }
}

/// Dispatch table over (source, technology). Tagged variants, not
/// inheritance: every pair resolves to exactly one extractor function.
pub fn extract(
    conn: &Connection,
    source: Source,
    technology: Technology,
    input: &Path,
) -> Result<Extracted> {
    match (source, technology) {
        (Source::Enm1 | Source::Enm2, _) => enm::extract(source.label(), technology, input),
        (Source::Oss, Technology::Gsm) => oss_cna::extract(input),
        (Source::Oss, Technology::Wcdma) => ericsson_bulk::extract(input),
        (Source::Zte, Technology::Gsm) => zte::extract_gsm(conn),
        (Source::Zte, Technology::Wcdma) => zte::extract_wcdma(conn),
        (Source::Tele2, Technology::Lte) => tele2::extract_lte(input),
        (Source::Tele2, Technology::Nr) => tele2::extract_nr(input),
        (Source::Tele2, Technology::Gsm | Technology::Wcdma) => {
            huawei_som::extract(input, technology, "Tele2", "Tele2")
        }
        (Source::BeelineHuawei, Technology::Lte) => huawei_enodeb::extract(input),
        (Source::BeelineHuawei, Technology::Wcdma) => {
            huawei_som::extract(input, technology, "Beeline", "Beeline Huawei")
        }
        (Source::BeelineNokia, _) => nokia_raml::extract(input, technology),
        (source, technology) => bail!("no extractor for {source} {technology}"),
    }
}

/// Files in `dir` whose name contains `marker` (case-insensitive) and ends
/// with `ext`, sorted for deterministic document order.
pub fn dir_files(dir: &Path, marker: &str, ext: &str) -> Result<Vec<PathBuf>> {
    let marker = marker.to_lowercase();
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("reading input directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            name.contains(&marker) && name.ends_with(ext)
        })
        .collect();
    paths.sort();
    Ok(paths)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_record_treats_null_and_missing_alike() {
        let mut rec = RawRecord::new("cell-1");
        rec.set("lac", None);
        assert_eq!(rec.get("lac"), None);
        assert_eq!(rec.get("absent"), None);
        assert!(rec.require("lac").is_err());
    }

    #[test]
    fn raw_record_numeric_accessor() {
        let mut rec = RawRecord::new("cell-1");
        rec.set("cellId", Some("42".into()));
        rec.set("name", Some("ALM001".into()));
        assert_eq!(rec.get_i64("cellId"), Some(42));
        assert_eq!(rec.get_i64("name"), None);
    }
}
