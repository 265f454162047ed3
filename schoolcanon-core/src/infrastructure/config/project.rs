// schoolcanon-core/src/infrastructure/config/project.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::domain::vintage::VintageRegistry;
use crate::error::CanonError;
use crate::infrastructure::error::InfrastructureError;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Parquet,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Parquet => "parquet",
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
pub struct ProjectConfig {
    #[validate(length(min = 1, message = "Project name cannot be empty"))]
    pub name: String,

    #[serde(default = "default_version")]
    pub version: String,

    #[serde(rename = "data-path", default = "default_data_path")]
    pub data_path: String,

    #[serde(rename = "target-path", default = "default_target_path")]
    pub target_path: String,

    /// Vintage catalog replacing the built-in NYC one.
    #[serde(rename = "registry-path", default)]
    pub registry_path: Option<String>,

    /// Any failed vintage fails the run.
    #[serde(default)]
    pub strict: bool,

    #[serde(default = "default_exports")]
    pub exports: Vec<ExportFormat>,

    #[serde(rename = "clean-targets", default = "default_clean_targets")]
    pub clean_targets: Vec<String>,

    #[serde(default = "default_concurrency")]
    #[validate(range(min = 1, max = 64, message = "concurrency must be between 1 and 64"))]
    pub concurrency: usize,

    /// Explicit vintage id to file mapping, relative to `data-path`.
    #[serde(default)]
    pub sources: BTreeMap<String, String>,
}

impl ProjectConfig {
    pub fn data_dir(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.data_path)
    }

    pub fn target_dir(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.target_path)
    }
}

fn default_version() -> String {
    "1.0".to_string()
}
fn default_data_path() -> String {
    "data".to_string()
}
fn default_target_path() -> String {
    "target".to_string()
}
fn default_exports() -> Vec<ExportFormat> {
    vec![ExportFormat::Csv]
}
fn default_clean_targets() -> Vec<String> {
    vec!["target".to_string()]
}
fn default_concurrency() -> usize {
    4
}

// --- LOADER ---

#[instrument(skip(project_dir))]
pub fn load_project_config(project_dir: &Path) -> Result<ProjectConfig, InfrastructureError> {
    // 1. Main file discovery
    let config_path = find_main_config(project_dir)?;
    info!(path = ?config_path, "Loading project manifest");

    // 2. Base YAML
    let content = fs::read_to_string(&config_path)?;
    let mut config: ProjectConfig = serde_yaml::from_str(&content)?;

    // 3. Environment layering: SCHOOLCANON_TARGET_PATH=/tmp/out schoolcanon run
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    config
        .validate()
        .map_err(|e| InfrastructureError::ConfigError(e.to_string()))?;
    Ok(config)
}

fn find_main_config(root: &Path) -> Result<PathBuf, InfrastructureError> {
    let candidates = ["schoolcanon.yaml", "schoolcanon_project.yaml"];
    for filename in candidates {
        let p = root.join(filename);
        if p.exists() {
            return Ok(p);
        }
    }
    Err(InfrastructureError::ConfigNotFound(format!(
        "No configuration file found in {:?}. Checked: {:?}",
        root, candidates
    )))
}

fn apply_env_overrides(config: &mut ProjectConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(val) = lookup("SCHOOLCANON_DATA_PATH") {
        info!(old = ?config.data_path, new = ?val, "Overriding data path via ENV");
        config.data_path = val;
    }
    if let Some(val) = lookup("SCHOOLCANON_TARGET_PATH") {
        info!(old = ?config.target_path, new = ?val, "Overriding target path via ENV");
        config.target_path = val;
    }
    if let Some(val) = lookup("SCHOOLCANON_STRICT") {
        match val.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" => config.strict = true,
            "0" | "false" | "no" => config.strict = false,
            other => warn!(value = %other, "Ignoring unreadable SCHOOLCANON_STRICT"),
        }
    }
}

/// The project's vintage catalog: `registry-path` when set, the built-in
/// one otherwise. Every `sources` entry must name a registered vintage.
#[instrument(skip(project_dir, config))]
pub fn load_registry(
    project_dir: &Path,
    config: &ProjectConfig,
) -> Result<VintageRegistry, CanonError> {
    let registry = match &config.registry_path {
        Some(rel) => {
            let path = project_dir.join(rel);
            info!(path = ?path, "Loading vintage catalog");
            let content = fs::read_to_string(&path).map_err(InfrastructureError::Io)?;
            VintageRegistry::from_yaml(&content)?
        }
        None => VintageRegistry::builtin()?,
    };
    for id in config.sources.keys() {
        registry.get(id)?;
    }
    info!(vintages = registry.len(), "Vintage catalog ready");
    Ok(registry)
}
