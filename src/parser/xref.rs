use std::collections::HashMap;

/// Side table keyed by object name, each entry an attribute map.
pub type SiteTable = HashMap<String, HashMap<String, Option<String>>>;

/// Merge per-site attribute maps right-biased: tables later in the slice win
/// per attribute, earlier tables only fill what later ones left unset.
pub fn merge_site_tables(tables: Vec<SiteTable>) -> SiteTable {
    let mut merged = SiteTable::new();
    for table in tables {
        for (site, attrs) in table {
            let entry = merged.entry(site).or_default();
            for (name, value) in attrs {
                entry.insert(name, value);
            }
        }
    }
    merged
}

// ── Tests ──
