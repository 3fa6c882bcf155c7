//! User configuration, read from `config.toml` in the colcalc config dir.
//!
//! ```toml
//! rename_debounce_ms = 300
//! new_column_class = "col-draft"
//! preview_rows = 20
//! ```
//!
//! Problems never stop the CLI: they come back as warnings and the
//! defaults are used instead.

use colcalc_core::{DEFAULT_NEW_COLUMN_CLASS, DEFAULT_RENAME_DEBOUNCE};
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAX_CONFIG_BYTES: u64 = 64 * 1024;
const DEFAULT_PREVIEW_ROWS: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Config {
    pub rename_debounce: Duration,
    pub new_column_class: String,
    pub preview_rows: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            rename_debounce: DEFAULT_RENAME_DEBOUNCE,
            new_column_class: DEFAULT_NEW_COLUMN_CLASS.to_string(),
            preview_rows: DEFAULT_PREVIEW_ROWS,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    rename_debounce_ms: Option<u64>,
    new_column_class: Option<String>,
    preview_rows: Option<usize>,
}

pub(crate) fn default_config_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("", "", "colcalc")?;
    let mut path = proj.config_dir().to_path_buf();
    path.push("config.toml");
    Some(path)
}

/// Load `config_file`, or the default config path when none is given.
pub(crate) fn load_config(config_file: Option<&Path>) -> (Config, Vec<String>) {
    let mut warnings: Vec<String> = Vec::new();
    let path = match config_file {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) => path,
            None => return (Config::default(), warnings),
        },
    };

    if !path.exists() {
        if config_file.is_some() {
            warnings.push(format!("Config file not found: {}", path.display()));
        }
        return (Config::default(), warnings);
    }

    match std::fs::metadata(&path) {
        Ok(meta) if meta.len() > MAX_CONFIG_BYTES => {
            warnings.push(format!(
                "Ignoring {}: larger than {} bytes",
                path.display(),
                MAX_CONFIG_BYTES
            ));
            return (Config::default(), warnings);
        }
        _ => {}
    }

    let config = match std::fs::read_to_string(&path) {
        Ok(content) => match parse_config(&content) {
            Ok((config, errs)) => {
                warnings.extend(errs);
                config
            }
            Err(err) => {
                warnings.push(format!("Failed to parse {}: {}", path.display(), err));
                Config::default()
            }
        },
        Err(err) => {
            warnings.push(format!("Failed to read {}: {}", path.display(), err));
            Config::default()
        }
    };
    (config, warnings)
}

/// Parse config TOML. Out-of-range values are reported and replaced by defaults.
pub(crate) fn parse_config(content: &str) -> Result<(Config, Vec<String>), toml::de::Error> {
    let file: ConfigFile = toml::from_str(content)?;
    let mut config = Config::default();
    let mut warnings = Vec::new();

    if let Some(ms) = file.rename_debounce_ms {
        config.rename_debounce = Duration::from_millis(ms);
    }
    match file.new_column_class.as_deref().map(str::trim) {
        Some("") => warnings.push("new_column_class is empty; using the default".to_string()),
        Some(class) => config.new_column_class = class.to_string(),
        None => {}
    }
    match file.preview_rows {
        Some(0) => warnings.push("preview_rows must be at least 1; using the default".to_string()),
        Some(rows) => config.preview_rows = rows,
        None => {}
    }
    Ok((config, warnings))
}
