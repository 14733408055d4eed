//! File configuration for CLI defaults.
//!
//! The config file is a flat `key = value` subset of TOML:
//!
//! ```toml
//! # ~/.config/dufs-crawler/config.toml
//! download_folder = "/srv/downloads"
//! concurrency = 4
//! connect_timeout_secs = 10
//! read_timeout_secs = 30
//! record_history = false
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use dufs_crawler::download::DEFAULT_CONCURRENCY;
use dufs_crawler::listing::{LISTING_CONNECT_TIMEOUT_SECS, LISTING_READ_TIMEOUT_SECS};

/// Directory name under the XDG config home.
const CONFIG_DIR_NAME: &str = "dufs-crawler";

/// Config file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// History file name, written next to the config file.
const HISTORY_FILE_NAME: &str = "history.jsonl";

/// Values read from the config file. Absent keys stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Default base folder for downloads.
    pub download_folder: Option<PathBuf>,
    /// Simultaneous file downloads (1..=32).
    pub concurrency: Option<u8>,
    /// Listing connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// Listing whole-request timeout in seconds.
    pub read_timeout_secs: Option<u64>,
    /// Append completed downloads to the history file.
    pub record_history: Option<bool>,
}

impl FileConfig {
    /// Validates config values against runtime constraints.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first out-of-range key.
    pub fn validate(&self) -> Result<()> {
        if let Some(concurrency) = self.concurrency
            && !(1..=32).contains(&concurrency)
        {
            bail!("Invalid config value for `concurrency`: {concurrency}. Expected range: 1..=32");
        }
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;
        Ok(())
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Effective settings after merging defaults and the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Base folder for downloads, if configured.
    pub download_folder: Option<PathBuf>,
    /// Simultaneous file downloads.
    pub concurrency: usize,
    /// Listing connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Listing whole-request timeout in seconds.
    pub read_timeout_secs: u64,
    /// History file, when history recording is enabled.
    pub history_file: Option<PathBuf>,
}

impl Settings {
    /// Merges a loaded config over the built-in defaults.
    #[must_use]
    pub fn from_loaded(loaded: &LoadedConfig) -> Self {
        let config = loaded.config.clone().unwrap_or_default();
        let history_file = if config.record_history.unwrap_or(false) {
            loaded
                .path
                .as_deref()
                .and_then(Path::parent)
                .map(|dir| dir.join(HISTORY_FILE_NAME))
        } else {
            None
        };
        Self {
            download_folder: config.download_folder,
            concurrency: config
                .concurrency
                .map_or(DEFAULT_CONCURRENCY, usize::from),
            connect_timeout_secs: config
                .connect_timeout_secs
                .unwrap_or(LISTING_CONNECT_TIMEOUT_SECS),
            read_timeout_secs: config.read_timeout_secs.unwrap_or(LISTING_READ_TIMEOUT_SECS),
            history_file,
        }
    }
}

/// Loaded config metadata.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists.
    pub config: Option<FileConfig>,
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/dufs-crawler/config.toml`
/// 2. `$HOME/.config/dufs-crawler/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join(CONFIG_DIR_NAME)
                .join(CONFIG_FILE_NAME),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from the default path if present.
///
/// # Errors
///
/// Returns an error when the file exists but cannot be read or parsed.
pub fn load_default_config() -> Result<LoadedConfig> {
    let path = resolve_default_config_path();
    match path.as_deref() {
        Some(path_ref) if path_ref.exists() => {
            let config = load_config_file(path_ref)?;
            Ok(LoadedConfig {
                path,
                config: Some(config),
            })
        }
        _ => Ok(LoadedConfig { path, config: None }),
    }
}

/// Reads and parses one config file.
///
/// # Errors
///
/// Returns an error when the file cannot be read, parsed or validated.
pub fn load_config_file(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

/// Parses config text.
///
/// # Errors
///
/// Returns an error naming the offending line for syntax errors, unknown
/// keys and invalid values.
pub fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_no = line_index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };
        let key = raw_key.trim();
        let value = raw_value.trim();

        match key {
            "download_folder" => {
                let parsed = parse_string_literal(value).with_context(|| {
                    format!("Invalid `download_folder` value on line {line_no}")
                })?;
                cfg.download_folder = Some(PathBuf::from(parsed));
            }
            "concurrency" => {
                let parsed = parse_integer(value)
                    .with_context(|| format!("Invalid `concurrency` value on line {line_no}"))?;
                let parsed = u8::try_from(parsed).with_context(|| {
                    format!("Invalid `concurrency` value on line {line_no}: out of range")
                })?;
                cfg.concurrency = Some(parsed);
            }
            "connect_timeout_secs" => {
                let parsed = parse_integer(value).with_context(|| {
                    format!("Invalid `connect_timeout_secs` value on line {line_no}")
                })?;
                cfg.connect_timeout_secs = Some(parsed);
            }
            "read_timeout_secs" => {
                let parsed = parse_integer(value).with_context(|| {
                    format!("Invalid `read_timeout_secs` value on line {line_no}")
                })?;
                cfg.read_timeout_secs = Some(parsed);
            }
            "record_history" => {
                let parsed = parse_boolean(value)
                    .with_context(|| format!("Invalid `record_history` value on line {line_no}"))?;
                cfg.record_history = Some(parsed);
            }
            other => bail!("Unknown config key `{other}` on line {line_no}"),
        }
    }

    cfg.validate()?;
    Ok(cfg)
}

/// Strips a `#` comment that is not inside a quoted string.
fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    let mut escaped = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '\\' if in_string => escaped = !escaped,
            '"' if !escaped => {
                in_string = !in_string;
                escaped = false;
            }
            '#' if !in_string => return &line[..index],
            _ => escaped = false,
        }
    }
    line
}

fn parse_string_literal(value: &str) -> Result<String> {
    let Some(inner) = value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        bail!("expected a double-quoted string");
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => bail!("unsupported escape sequence \\{other}"),
            None => bail!("dangling escape at end of string"),
        }
    }
    Ok(out)
}

fn parse_integer(value: &str) -> Result<u64> {
    value
        .replace('_', "")
        .parse::<u64>()
        .with_context(|| format!("expected a non-negative integer, got `{value}`"))
}

fn parse_boolean(value: &str) -> Result<bool> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => bail!("expected `true` or `false`, got `{value}`"),
    }
}
