use std::path::PathBuf;

use chrono::NaiveDate;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::{FeedError, Result};
use crate::parser::sections::parse_heading_date;

const RELEASE_NOTES_URL: &str =
    "https://learn.microsoft.com/en-us/officeupdates/release-notes-office-for-mac";
const UPDATE_HISTORY_URL: &str =
    "https://learn.microsoft.com/en-us/officeupdates/update-history-office-for-mac";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub output_dir: PathBuf,
    pub readme_path: PathBuf,
    pub release_notes_url: String,
    pub update_history_url: String,
    pub content_selector: String,
    /// Long-form date at which section extraction stops. Empty disables it.
    pub stop_date: String,
    pub group_marker: String,
    pub standalone_feed: Option<PathBuf>,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            output_dir: PathBuf::from("latest_raw_files"),
            readme_path: PathBuf::from("README.md"),
            release_notes_url: RELEASE_NOTES_URL.to_string(),
            update_history_url: UPDATE_HISTORY_URL.to_string(),
            content_selector: "main".to_string(),
            stop_date: "December 10, 2019".to_string(),
            group_marker: "security updates".to_string(),
            standalone_feed: None,
            timeout_secs: 30,
            user_agent: concat!("mofa_feeds/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Settings {
    /// Defaults, then `mofa.toml` if present, then `MOFA_*` environment variables.
    pub fn load() -> Result<Settings> {
        let settings: Settings = Config::builder()
            .add_source(File::with_name("mofa").required(false))
            .add_source(Environment::with_prefix("MOFA"))
            .build()?
            .try_deserialize()?;
        settings.stop_at()?;
        Ok(settings)
    }

    pub fn stop_at(&self) -> Result<Option<NaiveDate>> {
        let raw = self.stop_date.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        parse_heading_date(raw)
            .map(Some)
            .ok_or_else(|| FeedError::Config(format!("stop_date `{}` is not a long-form date", raw)))
    }

    pub fn standalone_feed_path(&self) -> PathBuf {
        self.standalone_feed
            .clone()
            .unwrap_or_else(|| self.output_dir.join("macos_standalone_latest.xml"))
    }
}
