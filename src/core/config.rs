use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::services::compose::ExportConfig;
use crate::services::imagegen::ImageConfig;
use crate::services::llm::LlmConfig;

pub const CONFIG_FILE: &str = "config.yml";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_output")]
    pub output_folder: String,

    /// Storyboard YAML offered as a starting point in the CLI.
    #[serde(default)]
    pub storyboard: Option<String>,

    pub image: ImageConfig,

    #[serde(default)]
    pub llm: Option<LlmConfig>,

    #[serde(default)]
    pub export: ExportConfig,
}

fn default_output() -> String {
    "output".to_string()
}

/// Empty keys in `config.yml` fall back to the `API_KEY` environment variable.
pub fn resolve_api_key(configured: &str) -> Result<String> {
    if !configured.trim().is_empty() {
        return Ok(configured.trim().to_string());
    }
    std::env::var("API_KEY")
        .ok()
        .filter(|k| !k.trim().is_empty())
        .context("API key missing: set it in config.yml or the API_KEY environment variable")
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("{} not found. Please create one.", path.display());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.output_folder)?;
        Ok(())
    }
}
