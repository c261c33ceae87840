use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::extract::{Extractor, DEFAULT_PATTERN};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub catalog: CatalogConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    pub assets: AssetsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    /// Listing endpoint without the page query argument.
    pub listing_url: String,
    #[serde(default = "default_page_param")]
    pub page_param: String,
    /// Record `url` values are `<detail_url_base>/<id>`.
    pub detail_url_base: String,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub max_retries: u32,
}

fn default_page_param() -> String {
    "page".to_string()
}
fn default_max_pages() -> u32 {
    20
}
fn default_delay_ms() -> u64 {
    500
}
fn default_user_agent() -> String {
    "Mozilla/5.0".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractConfig {
    #[serde(default = "default_pattern")]
    pub pattern: String,
    #[serde(default = "default_next_page_marker")]
    pub next_page_marker: String,
    #[serde(default = "default_placeholder_ext")]
    pub placeholder_ext: String,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            pattern: default_pattern(),
            next_page_marker: default_next_page_marker(),
            placeholder_ext: default_placeholder_ext(),
        }
    }
}

fn default_pattern() -> String {
    DEFAULT_PATTERN.to_string()
}
fn default_next_page_marker() -> String {
    "next_page".to_string()
}
fn default_placeholder_ext() -> String {
    "jpg".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AssetsConfig {
    pub dir: PathBuf,
    #[serde(default = "default_image_prefix")]
    pub image_prefix: String,
    #[serde(default)]
    pub mapping: Option<PathBuf>,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub prune_identical: bool,
}

fn default_image_prefix() -> String {
    "Products/".to_string()
}

fn default_include_globs() -> Vec<String> {
    ["*.jpg", "*.jpeg", "*.png", "*.webp", "*.gif"]
        .iter()
        .map(|g| g.to_string())
        .collect()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate source
    if config.source.max_pages == 0 {
        anyhow::bail!("source.max_pages must be >= 1");
    }
    if config.source.listing_url.contains('?') {
        anyhow::bail!(
            "source.listing_url must not carry a query string; the page argument is added as '?{}=N'",
            config.source.page_param
        );
    }
    if config.source.page_param.is_empty() {
        anyhow::bail!("source.page_param must not be empty");
    }

    // Validate extraction pattern up front so a scrape never starts with a bad one
    Extractor::new(&config.extract.pattern).with_context(|| "extract.pattern is not usable")?;

    // Validate assets
    if !config.assets.image_prefix.is_empty() && !config.assets.image_prefix.ends_with('/') {
        anyhow::bail!("assets.image_prefix must be empty or end with '/'");
    }
    if config.assets.include_globs.is_empty() {
        anyhow::bail!("assets.include_globs must not be empty");
    }

    Ok(config)
}
