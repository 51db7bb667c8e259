use std::collections::HashMap;

use chrono::NaiveDateTime;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::feed::{self, Layout};
use crate::fetch::Lookup;
use crate::model::{PackageRecord, LONG_DATE, NOT_AVAILABLE, PACKAGE_FIELDS};

const CATALOG_JSON: &str = include_str!("../catalog.json");

const RELEASE_DATE_FIELD: &str = "currentVersionReleaseDate";

#[derive(Debug, Deserialize)]
struct CatalogFile {
    fields: HashMap<String, String>,
    ios: Vec<RawEntry>,
    macos: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    name: String,
    url: String,
    #[serde(default)]
    keys: HashMap<String, String>,
}

/// One lookup: display name, query URL, schema field -> upstream JSON key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: String,
    pub url: String,
    pub keys: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    pub ios: Vec<CatalogEntry>,
    pub macos: Vec<CatalogEntry>,
}

impl Catalog {
    /// The catalog compiled into the binary.
    pub fn builtin() -> Result<Catalog> {
        Catalog::from_json(CATALOG_JSON)
    }

    /// Per-entry `keys` override the shared `fields` mapping.
    pub fn from_json(json: &str) -> Result<Catalog> {
        let CatalogFile { fields, ios, macos } = serde_json::from_str(json)?;
        let resolve = |raw: Vec<RawEntry>| -> Vec<CatalogEntry> {
            raw.into_iter()
                .map(|e| {
                    let mut keys = fields.clone();
                    keys.extend(e.keys);
                    CatalogEntry {
                        name: e.name,
                        url: e.url,
                        keys,
                    }
                })
                .collect()
        };
        Ok(Catalog {
            ios: resolve(ios),
            macos: resolve(macos),
        })
    }

    pub fn entries(&self, platform: Platform) -> &[CatalogEntry] {
        match platform {
            Platform::Ios => &self.ios,
            Platform::Macos => &self.macos,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Platform {
    Ios,
    Macos,
}

impl Platform {
    pub fn layout(self) -> &'static Layout {
        match self {
            Platform::Ios => &feed::IOS_APPSTORE,
            Platform::Macos => &feed::MACOS_APPSTORE,
        }
    }
}

/// Build the record for one entry from its first search result.
pub fn map_entry(entry: &CatalogEntry, result: Option<&serde_json::Value>) -> PackageRecord {
    let mut record = PackageRecord::not_available(&entry.name);
    let Some(result) = result else {
        return record;
    };

    for field in PACKAGE_FIELDS {
        let Some(json_key) = entry.keys.get(field) else {
            warn!("{}: no upstream key mapped for {}", entry.name, field);
            continue;
        };
        let value = match result.get(json_key) {
            Some(v) => scalar(v),
            None => NOT_AVAILABLE.to_string(),
        };
        let value = if field == RELEASE_DATE_FIELD {
            format_release_date(&value)
        } else {
            value
        };
        debug!("{} {}: {}", entry.name, field, value);
        if let Some(slot) = record.field_mut(field) {
            *slot = value;
        }
    }
    record
}

fn scalar(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::Null => NOT_AVAILABLE.to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `2024-05-14T07:00:00Z` -> `May 14, 2024`; anything else passes through.
pub fn format_release_date(raw: &str) -> String {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%SZ")
        .map(|d| d.format(LONG_DATE).to_string())
        .unwrap_or_else(|_| raw.to_string())
}

/// One lookup per entry. A failed lookup is logged and its entry filled with
/// N/A; the remaining entries still run.
pub fn lookup_all(entries: &[CatalogEntry], lookup: &impl Lookup) -> Vec<PackageRecord> {
    let pb = ProgressBar::new(entries.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    let mut records = Vec::with_capacity(entries.len());
    let mut failed = 0usize;
    for entry in entries {
        pb.set_message(entry.name.clone());
        info!("Processing {}", entry.name);
        match lookup.first_result(&entry.url) {
            Ok(result) => {
                if result.is_none() {
                    warn!("{}: no search results, filling N/A", entry.name);
                }
                records.push(map_entry(entry, result.as_ref()));
            }
            Err(e) => {
                failed += 1;
                warn!("{}: lookup failed, filling N/A: {}", entry.name, e);
                records.push(PackageRecord::not_available(&entry.name));
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    info!("Looked up {} packages ({} failed)", records.len() - failed, failed);
    records
}
