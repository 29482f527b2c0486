//! Scripter configuration.
//!
//! Settings come from an optional INI file and are overridden by command
//! line options.
//!
//! # Configuration File Format
//!
//! ```ini
//! [paths]
//! input = maps/level1.tmx
//! output = build/level1.tmx
//! script = scripts/level1.lua
//!
//! [log]
//! level = info
//!
//! [map]
//! new_layer_encoding = csv
//! ```

use crate::error::ScripterError;
use crate::tmx::DataEncoding;
use configparser::ini::Ini;
use log::info;
use std::path::{Path, PathBuf};

const DEFAULT_LOG_LEVEL: &str = "info";
/// Loaded when `--config` is not given and the file exists.
pub const DEFAULT_CONFIG_PATH: &str = "./tmxscripter.ini";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScripterConfig {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub script: Option<PathBuf>,
    /// Default `env_logger` filter, e.g. `info` or `tmxscripter=debug`.
    pub log_level: String,
    /// Encoding for layers created by `AddLayer`.
    pub new_layer_encoding: DataEncoding,
}

/// Input, output and script paths of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    pub input: PathBuf,
    pub output: PathBuf,
    pub script: PathBuf,
}

impl Default for ScripterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ScripterConfig {
    pub fn new() -> Self {
        Self {
            input: None,
            output: None,
            script: None,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            new_layer_encoding: DataEncoding::Csv,
        }
    }

    /// Load configuration from an INI file.
    ///
    /// Missing values retain their current values.
    pub fn load_from_file(&mut self, path: &Path) -> Result<(), String> {
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|e| format!("Failed to load config file {}: {e}", path.display()))?;
        self.apply(&config)?;
        info!("Loaded config from {}", path.display());
        Ok(())
    }

    /// Load configuration from INI text.
    pub fn load_from_str(&mut self, text: &str) -> Result<(), String> {
        let mut config = Ini::new();
        config
            .read(text.to_string())
            .map_err(|e| format!("Failed to parse config: {e}"))?;
        self.apply(&config)
    }

    fn apply(&mut self, config: &Ini) -> Result<(), String> {
        // [paths] section
        if let Some(input) = non_empty(config.get("paths", "input")) {
            self.input = Some(PathBuf::from(input));
        }
        if let Some(output) = non_empty(config.get("paths", "output")) {
            self.output = Some(PathBuf::from(output));
        }
        if let Some(script) = non_empty(config.get("paths", "script")) {
            self.script = Some(PathBuf::from(script));
        }

        // [log] section
        if let Some(level) = non_empty(config.get("log", "level")) {
            self.log_level = level;
        }

        // [map] section
        if let Some(encoding) = non_empty(config.get("map", "new_layer_encoding")) {
            self.new_layer_encoding = encoding.parse()?;
        }
        Ok(())
    }

    /// Replaces file values with the options given on the command line.
    pub fn override_paths(
        &mut self,
        input: Option<PathBuf>,
        output: Option<PathBuf>,
        script: Option<PathBuf>,
    ) {
        if input.is_some() {
            self.input = input;
        }
        if output.is_some() {
            self.output = output;
        }
        if script.is_some() {
            self.script = script;
        }
    }

    /// The three run paths, or a `Config` error naming the first missing one.
    pub fn run_paths(&self) -> Result<RunPaths, ScripterError> {
        let require = |value: &Option<PathBuf>, option: &str| {
            value.clone().ok_or_else(|| {
                ScripterError::Config(format!(
                    "Missing required option --{option} (or [paths] {option} in the config file)"
                ))
            })
        };
        Ok(RunPaths {
            input: require(&self.input, "input")?,
            output: require(&self.output, "output")?,
            script: require(&self.script, "script")?,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
