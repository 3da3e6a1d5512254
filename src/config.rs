// ⚙️ Configuration - where the query CSVs live
// Defaults < JSON config file < FOOD_DASHBOARD_DATA_DIR < --data-dir

use crate::registry::QueryKey;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding `data_dir`
pub const DATA_DIR_ENV: &str = "FOOD_DASHBOARD_DATA_DIR";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Directory holding one CSV per query key
    pub data_dir: PathBuf,

    /// Branding image inside `data_dir`
    pub logo_file: String,

    /// File name per query code ("q01" ..). Keys not listed use the default name.
    pub files: BTreeMap<String, String>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            data_dir: PathBuf::from("data"),
            logo_file: "logo.png".to_string(),
            files: QueryKey::ALL
                .iter()
                .map(|k| (k.code().to_string(), k.default_file_name().to_string()))
                .collect(),
        }
    }
}

impl DashboardConfig {
    /// Defaults rooted at a given data directory
    pub fn with_data_dir<P: Into<PathBuf>>(data_dir: P) -> Self {
        DashboardConfig {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Load config from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: DashboardConfig =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;

        Ok(config)
    }

    /// Resolve the full layering: optional file, then env, then explicit dir
    pub fn load(config_path: Option<&Path>, data_dir: Option<PathBuf>) -> Result<Self> {
        let config = match config_path {
            Some(path) => DashboardConfig::from_file(path)?,
            None => DashboardConfig::default(),
        };

        Ok(config
            .with_env_override(std::env::var(DATA_DIR_ENV).ok())
            .with_data_dir_override(data_dir))
    }

    /// Apply the value of `FOOD_DASHBOARD_DATA_DIR`, if any
    pub fn with_env_override(mut self, value: Option<String>) -> Self {
        if let Some(dir) = value.filter(|v| !v.trim().is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
        self
    }

    pub fn with_data_dir_override(mut self, data_dir: Option<PathBuf>) -> Self {
        if let Some(dir) = data_dir {
            self.data_dir = dir;
        }
        self
    }

    /// File name configured for a query key
    pub fn file_name(&self, key: QueryKey) -> &str {
        self.files
            .get(key.code())
            .map(String::as_str)
            .unwrap_or_else(|| key.default_file_name())
    }

    /// Full path of the CSV backing a query key
    pub fn path_for(&self, key: QueryKey) -> PathBuf {
        self.data_dir.join(self.file_name(key))
    }

    /// Branding image path, only when the file exists
    pub fn logo_path(&self) -> Option<PathBuf> {
        let path = self.data_dir.join(&self.logo_file);
        path.is_file().then_some(path)
    }
}

// ============================================================================
// TESTS
// ============================================================================
