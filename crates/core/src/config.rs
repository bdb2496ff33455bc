//! Configuration discovery and parsing
//!
//! A sync directory is marked by an `ssbconfig.ini` file, either in the
//! current directory or in one of its parents (similar to a git repo).
//!
//! ```ini
//! [dirs]
//! photos = yes
//!
//! [photos]
//! bucket-target = my-backups
//! bucket-folder = photos
//! source = pictures
//! sync-deletes = false
//! ```

use std::path::{Path, PathBuf};

use ini::{Ini, ParseOption, Properties};

use crate::binding::SyncBinding;
use crate::error::{Error, Result};

/// File name searched for while walking up the directory tree
pub const CONFIG_FILE_NAME: &str = "ssbconfig.ini";

const DIRS_SECTION: &str = "dirs";
const STORE_SECTION: &str = "store";

/// Connection settings for the object store client
///
/// Every field is optional; unset fields fall back to the AWS SDK defaults
/// (environment, shared config files, instance metadata).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreSettings {
    pub endpoint_url: Option<String>,
    pub region: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub force_path_style: bool,
}

/// Parsed contents of an `ssbconfig.ini`
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Location of the config file that was loaded
    pub path: PathBuf,

    /// Bindings in the order they appear in `[dirs]`
    pub bindings: Vec<SyncBinding>,

    pub store: StoreSettings,
}

impl SyncConfig {
    /// Find the config file starting at `start` and load it
    pub fn discover(start: &Path) -> Result<Self> {
        let path = discover_config(start)?;
        tracing::info!(path = %path.display(), "Config file found");
        Self::load(&path)
    }

    /// Load a config file; relative `source` entries resolve against its directory
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

        let mut config = Self::parse(&content, base_dir)?;
        config.path = path.to_path_buf();
        Ok(config)
    }

    /// Parse config text, resolving relative sources against `base_dir`
    pub fn parse(content: &str, base_dir: &Path) -> Result<Self> {
        // Escapes stay off so Windows paths keep their backslashes.
        let options = ParseOption {
            enabled_escape: false,
            ..ParseOption::default()
        };
        let ini = Ini::load_from_str_opt(content, options)
            .map_err(|e| Error::Config(format!("Invalid config syntax: {e}")))?;

        let dirs = ini
            .section(Some(DIRS_SECTION))
            .ok_or_else(|| Error::Config(format!("Missing [{DIRS_SECTION}] section")))?;

        let mut bindings = Vec::new();
        for (name, _) in dirs.iter() {
            tracing::debug!(entry = name, "Processing config entry");
            let section = ini
                .section(Some(name))
                .ok_or_else(|| Error::Config(format!("Missing section [{name}]")))?;
            let binding = parse_binding(name, section, base_dir)?;
            tracing::debug!(
                name = %binding.name,
                bucket = %binding.bucket,
                prefix = %binding.prefix(),
                source = %binding.source.display(),
                sync_deletes = binding.sync_deletes,
                "Created binding"
            );
            bindings.push(binding);
        }

        let store = match ini.section(Some(STORE_SECTION)) {
            Some(section) => parse_store(section)?,
            None => StoreSettings::default(),
        };

        Ok(Self {
            path: base_dir.join(CONFIG_FILE_NAME),
            bindings,
            store,
        })
    }
}

/// Walk from `start` up to the filesystem root looking for `ssbconfig.ini`
pub fn discover_config(start: &Path) -> Result<PathBuf> {
    for dir in start.ancestors() {
        let candidate = dir.join(CONFIG_FILE_NAME);
        tracing::trace!(path = %candidate.display(), "Looking for config");
        if candidate.is_file() {
            return Ok(candidate);
        }
    }

    Err(Error::ConfigNotFound(format!(
        "{CONFIG_FILE_NAME} not found in {} or any parent directory",
        start.display()
    )))
}

fn parse_binding(name: &str, section: &Properties, base_dir: &Path) -> Result<SyncBinding> {
    let bucket = required(name, section, "bucket-target")?;
    let folder = section.get("bucket-folder").unwrap_or_default();
    let source = required(name, section, "source")?;
    let sync_deletes = parse_bool(required(name, section, "sync-deletes")?).ok_or_else(|| {
        Error::Config(format!("[{name}] sync-deletes must be a boolean"))
    })?;

    Ok(SyncBinding::new(
        name,
        bucket,
        folder,
        base_dir.join(source),
        sync_deletes,
    ))
}

fn parse_store(section: &Properties) -> Result<StoreSettings> {
    let non_empty = |key: &str| {
        section
            .get(key)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let settings = StoreSettings {
        endpoint_url: non_empty("endpoint-url"),
        region: non_empty("region"),
        access_key: non_empty("access-key"),
        secret_key: non_empty("secret-key"),
        force_path_style: match section.get("path-style") {
            Some(v) => parse_bool(v).ok_or_else(|| {
                Error::Config(format!("[{STORE_SECTION}] path-style must be a boolean"))
            })?,
            None => false,
        },
    };

    if settings.access_key.is_some() != settings.secret_key.is_some() {
        return Err(Error::Config(format!(
            "[{STORE_SECTION}] access-key and secret-key must be set together"
        )));
    }

    Ok(settings)
}

fn required<'a>(name: &str, section: &'a Properties, key: &str) -> Result<&'a str> {
    section
        .get(key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::Config(format!("[{name}] missing required key '{key}'")))
}

/// INI-style boolean: 1/yes/true/on and 0/no/false/off
fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Some(true),
        "0" | "no" | "false" | "off" => Some(false),
        _ => None,
    }
}
