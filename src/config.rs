//! Config loader: a space-separated `key value` file under the user's XDG
//! config directory.
//!
//! Grounded on the original `config.c`/`config.h`: the same key set
//! (`name`, `version`, `group`, `for_science`, `tags`,
//! `jpamb_source_path`, `jpamb_decompiled_path`), the same
//! `XDG_CONFIG_HOME`-then-`HOME` resolution order, and the same required/
//! optional split (`for_science` defaults to `false` when absent; every
//! other field is mandatory).

use std::path::PathBuf;

use tracing::{info, warn};

const APP_NAME: &str = "java-analyzer";
const CONFIG_FILE: &str = "java-analyzer.conf";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not resolve config directory: neither XDG_CONFIG_HOME nor HOME is set")]
    NoConfigHome,

    #[error("could not open config file at {0}")]
    NotFound(PathBuf),

    #[error("invalid configuration at line {line} in {path}")]
    InvalidLine { path: PathBuf, line: usize },

    #[error("invalid configuration: missing field '{0}'")]
    MissingField(&'static str),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub name: String,
    pub version: String,
    pub group: String,
    pub for_science: bool,
    pub tags: String,
    pub jpamb_source_path: String,
    pub jpamb_decompiled_path: String,
}

#[derive(Default)]
struct RawFields {
    name: Option<String>,
    version: Option<String>,
    group: Option<String>,
    for_science: bool,
    tags: Option<String>,
    jpamb_source_path: Option<String>,
    jpamb_decompiled_path: Option<String>,
}

fn set_field(fields: &mut RawFields, line: &str) -> bool {
    let mut parts = line.split_whitespace();
    let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
        return false;
    };

    match key {
        "name" => fields.name = Some(value.to_string()),
        "version" => fields.version = Some(value.to_string()),
        "group" => fields.group = Some(value.to_string()),
        "for_science" => fields.for_science = value == "1" || value == "true",
        "tags" => fields.tags = Some(value.to_string()),
        "jpamb_source_path" => fields.jpamb_source_path = Some(value.to_string()),
        "jpamb_decompiled_path" => fields.jpamb_decompiled_path = Some(value.to_string()),
        _ => return false,
    }
    true
}

fn user_config_path() -> Result<PathBuf, ConfigError> {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg.is_empty() {
            return Ok(PathBuf::from(xdg).join(APP_NAME).join(CONFIG_FILE));
        }
    }
    if let Ok(home) = std::env::var("HOME") {
        if !home.is_empty() {
            return Ok(PathBuf::from(home).join(".config").join(APP_NAME).join(CONFIG_FILE));
        }
    }
    Err(ConfigError::NoConfigHome)
}

/// Loads the analyzer's config from the user's XDG config directory.
pub fn load() -> Result<Config, ConfigError> {
    let path = user_config_path()?;
    let text = std::fs::read_to_string(&path).map_err(|_| ConfigError::NotFound(path.clone()))?;
    info!(path = %path.display(), "config file found");

    let mut fields = RawFields::default();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        if !set_field(&mut fields, line) {
            warn!(line = idx + 1, path = %path.display(), "invalid configuration line");
            return Err(ConfigError::InvalidLine { path, line: idx + 1 });
        }
    }

    Ok(Config {
        name: fields.name.ok_or(ConfigError::MissingField("name"))?,
        version: fields.version.ok_or(ConfigError::MissingField("version"))?,
        group: fields.group.ok_or(ConfigError::MissingField("group"))?,
        for_science: fields.for_science,
        tags: fields.tags.ok_or(ConfigError::MissingField("tags"))?,
        jpamb_source_path: fields.jpamb_source_path.ok_or(ConfigError::MissingField("jpamb_source_path"))?,
        jpamb_decompiled_path: fields
            .jpamb_decompiled_path
            .ok_or(ConfigError::MissingField("jpamb_decompiled_path"))?,
    })
}

impl std::fmt::Display for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "analyzer name:                   {}", self.name)?;
        writeln!(f, "analyzer version:                {}", self.version)?;
        writeln!(f, "analyzer group:                  {}", self.group)?;
        writeln!(f, "analyzer for_science:            {}", self.for_science)?;
        writeln!(f, "analyzer tags:                   {}", self.tags)?;
        writeln!(f, "analyzer jpamb_source_path:      {}", self.jpamb_source_path)?;
        write!(f, "analyzer jpamb_decompiler_path:  {}", self.jpamb_decompiled_path)
    }
}
