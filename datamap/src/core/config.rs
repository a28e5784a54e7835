use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::data::coerce::CoercionPolicy;
use crate::data::columns::ColumnTypes;
use crate::data::filter::TopLevel;
use crate::utils::file::expand_path;

use super::cli::CliConfig;
use super::constants::{APP_DOT_FOLDER, CONFIG_FILE_NAME};

// =============================================================================
// File Config Structs (for JSON parsing)
// =============================================================================

/// File-based configuration (JSON)
///
/// ```json
/// {
///   "debug": false,
///   "coercion": "lenient",
///   "top_level": "merge",
///   "collections": {
///     "users": { "id": "int", "name": "string", "created_at": "time" }
///   }
/// }
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub debug: Option<bool>,
    pub coercion: Option<CoercionPolicy>,
    pub top_level: Option<TopLevel>,
    pub collections: Option<BTreeMap<String, ColumnTypes>>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    ///
    /// Collections merge by name; a collection defined in both files takes
    /// the later column table as a whole.
    fn merge(&mut self, other: FileConfig) {
        if other.debug.is_some() {
            tracing::trace!(debug = ?other.debug, "Merging debug");
            self.debug = other.debug;
        }
        if other.coercion.is_some() {
            tracing::trace!(coercion = ?other.coercion, "Merging coercion");
            self.coercion = other.coercion;
        }
        if other.top_level.is_some() {
            tracing::trace!(top_level = ?other.top_level, "Merging top_level");
            self.top_level = other.top_level;
        }
        if let Some(collections) = other.collections {
            let current = self.collections.get_or_insert_with(BTreeMap::new);
            for (name, columns) in collections {
                tracing::trace!(collection = %name, columns = columns.len(), "Merging collection");
                current.insert(name, columns);
            }
        }
    }
}

// =============================================================================
// Final Config
// =============================================================================

/// Final resolved configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub debug: bool,
    pub coercion: CoercionPolicy,
    pub top_level: TopLevel,
    /// Collection name -> column type table
    pub collections: BTreeMap<String, ColumnTypes>,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Profile directory config (~/.datamap/datamap.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");
        tracing::trace!(cli = ?cli, "CLI config");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        // 1. Load from profile dir (~/.datamap/datamap.json) - skip if not exists
        if let Some(profile_path) = get_profile_config_path()
            && profile_path.exists()
        {
            let profile_config = FileConfig::load_from_file(&profile_path)?;
            profile_config.warn_unknown_fields();
            file_config.merge(profile_config);
            found_configs.push(profile_path.display().to_string());
        }

        // 2. Load from CLI-specified path OR local directory
        let overlay_path = if let Some(ref path) = cli.config {
            let expanded = expand_path(&path.to_string_lossy());
            if !expanded.exists() {
                anyhow::bail!("Config file not found: {}", expanded.display());
            }
            Some(expanded)
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "Config files loaded");

        let config = Self::resolve(file_config, cli);
        config.validate()?;

        tracing::debug!(
            coercion = %config.coercion,
            top_level = %config.top_level,
            collections = config.collections.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Layer configs: defaults -> file config -> CLI/env overrides
    fn resolve(file_config: FileConfig, cli: &CliConfig) -> Self {
        // debug: CLI flag forces on, otherwise file config decides
        let debug = cli.debug || file_config.debug.unwrap_or(false);

        let coercion = cli
            .coercion
            .or(file_config.coercion)
            .unwrap_or_default();

        let top_level = cli
            .top_level
            .or(file_config.top_level)
            .unwrap_or_default();

        Self {
            debug,
            coercion,
            top_level,
            collections: file_config.collections.unwrap_or_default(),
        }
    }

    fn validate(&self) -> Result<()> {
        for (name, columns) in &self.collections {
            if name.trim().is_empty() {
                anyhow::bail!("Configuration error: collection names must not be empty");
            }
            if columns.iter().any(|(column, _)| column.trim().is_empty()) {
                anyhow::bail!(
                    "Configuration error: collection '{}' has an empty column name",
                    name
                );
            }
        }
        Ok(())
    }

    /// Column type table of a configured collection
    pub fn column_types(&self, collection: &str) -> Result<&ColumnTypes> {
        self.collections.get(collection).with_context(|| {
            let known: Vec<&str> = self.collections.keys().map(String::as_str).collect();
            format!(
                "Unknown collection '{}'. Configured collections: {}",
                collection,
                if known.is_empty() {
                    "none".to_string()
                } else {
                    known.join(", ")
                }
            )
        })
    }
}

fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}
