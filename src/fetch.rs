use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use tracing::{debug, info};

use crate::error::Result;
use crate::settings::Settings;

/// Source of app-store search results.
pub trait Lookup {
    /// First element of the response's `results` array, if any.
    fn first_result(&self, url: &str) -> Result<Option<serde_json::Value>>;
}

pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(settings: &Settings) -> Result<Fetcher> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(settings.user_agent.clone())
            .build()?;
        Ok(Fetcher { client })
    }

    pub fn get_text(&self, url: &str) -> Result<String> {
        info!("Fetching {}", url);
        let start = Instant::now();
        let body = self.client.get(url).send()?.error_for_status()?.text()?;
        debug!("Fetched {} bytes in {}ms", body.len(), start.elapsed().as_millis());
        Ok(body)
    }

    pub fn get_json(&self, url: &str) -> Result<serde_json::Value> {
        info!("Fetching {}", url);
        Ok(self.client.get(url).send()?.error_for_status()?.json()?)
    }
}

impl Lookup for Fetcher {
    fn first_result(&self, url: &str) -> Result<Option<serde_json::Value>> {
        Ok(first_result_of(self.get_json(url)?))
    }
}

pub(crate) fn first_result_of(mut body: serde_json::Value) -> Option<serde_json::Value> {
    match body.get_mut("results")?.as_array_mut()? {
        results if results.is_empty() => None,
        results => Some(results.swap_remove(0)),
    }
}
