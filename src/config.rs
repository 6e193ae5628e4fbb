use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

const DEFAULT_CONFIG_FILE: &str = "factmine.json";

/// Pipeline settings: where workspaces live, where the external tools are,
/// and how patient the harvester is. Every field has a default so an absent
/// config file simply means defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Root under which each cid gets its workspace directory.
    pub storage_dir: Utf8PathBuf,
    /// Journal scraper definitions handed to quickscrape.
    pub scraper_dir: Utf8PathBuf,
    /// Temporary directory quickscrape writes into before relocation.
    pub scrape_tmp_dir: Utf8PathBuf,
    /// Extraction rulesets, one `<ruleset>.xml` per name.
    pub regexes_dir: Utf8PathBuf,
    /// Public base URL under which workspace files are served.
    pub store_base_url: String,
    /// Fact sink endpoint; records are POSTed to `<url>/<id>`.
    pub fact_api_url: String,
    pub bin: Binaries,
    /// Wall-clock limit per external command, 0 for none.
    pub timeout_secs: u64,
    pub harvest_attempts: u32,
    pub harvest_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Binaries {
    pub wget: String,
    pub pdftotext: String,
    pub quickscrape: String,
    pub norma: String,
    pub ami_regex: String,
    pub ami_species: String,
}

impl Default for Binaries {
    fn default() -> Self {
        Self {
            wget: "wget".to_string(),
            pdftotext: "pdftotext".to_string(),
            quickscrape: "quickscrape".to_string(),
            norma: "norma".to_string(),
            ami_regex: "ami2-regex".to_string(),
            ami_species: "ami2-species".to_string(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            storage_dir: Utf8PathBuf::from("/srv/factmine/storage"),
            scraper_dir: Utf8PathBuf::from("/srv/factmine/journal-scrapers/scrapers"),
            scrape_tmp_dir: Utf8PathBuf::from("/srv/factmine/qstmp"),
            regexes_dir: Utf8PathBuf::from("/srv/factmine/ami-regexes"),
            store_base_url: "http://localhost:5111/store".to_string(),
            fact_api_url: "http://localhost:9200/factmine/fact".to_string(),
            bin: Binaries::default(),
            timeout_secs: 600,
            harvest_attempts: 4,
            harvest_delay_ms: 10_000,
        }
    }
}

impl Settings {
    /// Loads settings from a JSON file. With an explicit path the file must
    /// exist; with none, a missing `factmine.json` in the current directory
    /// falls back to defaults.
    pub fn load(path: Option<&str>) -> Result<Self, PipelineError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| PipelineError::ConfigRead(config_path.clone()))?;
        serde_json::from_str(&content).map_err(|err| PipelineError::ConfigParse(err.to_string()))
    }

    /// Public URL for one cid's workspace.
    pub fn store_url(&self, cid: &str) -> String {
        format!("{}/{cid}", self.store_base_url.trim_end_matches('/'))
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    /// Path of a named extraction ruleset within the rules directory.
    pub fn ruleset_path(&self, name: &str) -> Utf8PathBuf {
        self.regexes_dir.join(format!("{name}.xml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let settings: Settings =
            serde_json::from_str(r#"{"storage_dir": "/tmp/storage"}"#).unwrap();
        assert_eq!(settings.storage_dir, Utf8PathBuf::from("/tmp/storage"));
        assert_eq!(settings.harvest_attempts, 4);
        assert_eq!(settings.bin.norma, "norma");
    }

    #[test]
    fn store_url_joins_without_double_slash() {
        let mut settings = Settings::default();
        settings.store_base_url = "http://store.example.org/".to_string();
        assert_eq!(settings.store_url("abc"), "http://store.example.org/abc");
    }

    #[test]
    fn zero_timeout_means_none() {
        let mut settings = Settings::default();
        settings.timeout_secs = 0;
        assert!(settings.timeout().is_none());
    }
}
