use crate::model::Config;
use anyhow::{Context, Result};
use serde::Serialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "BangerPlayer";
const CONFIG_FILE: &str = "config.json";
pub const CONFIG_DIR_ENV: &str = "BANGER_CONFIG_DIR";

/// Where the player keeps its configuration between runs.
pub trait ConfigStore {
    fn load(&self) -> Result<Config>;
    fn save(&self, config: &Config) -> Result<()>;
}

pub fn config_root() -> Result<PathBuf> {
    if let Ok(override_dir) = env::var(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(override_dir));
    }

    let data = dirs::data_dir().context("no user data directory on this platform")?;
    Ok(data.join(APP_DIR))
}

/// Defaults for a first launch: `~/Music` is registered when it exists.
pub fn default_config(home: Option<&Path>) -> Config {
    let folders = home
        .map(|home| home.join("Music"))
        .filter(|music| music.is_dir())
        .into_iter()
        .collect();
    Config {
        folders,
        ..Config::default()
    }
}

#[derive(Debug, Clone)]
pub struct JsonConfigStore {
    path: PathBuf,
    home: Option<PathBuf>,
}

impl JsonConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            home: dirs::home_dir(),
        }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(CONFIG_FILE))
    }

    pub fn with_home(mut self, home: Option<PathBuf>) -> Self {
        self.home = home;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for JsonConfigStore {
    fn load(&self) -> Result<Config> {
        if !self.path.exists() {
            log::info!(
                "no config file at {}, creating initial config",
                self.path.display()
            );
            let config = default_config(self.home.as_deref());
            self.save(&config)?;
            return Ok(config);
        }

        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read config file {}", self.path.display()))?;
        let config: Config = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", self.path.display()))?;
        log::debug!("loaded config from {}", self.path.display());
        Ok(config)
    }

    fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let json = to_indented_json(config)?;
        fs::write(&self.path, json)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        log::debug!("saved config to {}", self.path.display());
        Ok(())
    }
}

fn to_indented_json(config: &Config) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    config
        .serialize(&mut serializer)
        .context("failed to serialize config")?;
    Ok(out)
}

pub fn normalize_path(path: &Path) -> PathBuf {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    strip_windows_verbatim_prefix(&canonical)
}

pub fn strip_windows_verbatim_prefix(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();

    if let Some(trimmed) = raw.strip_prefix(r"\\?\UNC\") {
        return PathBuf::from(format!(r"\\{trimmed}"));
    }

    if let Some(trimmed) = raw.strip_prefix(r"\\?\") {
        return PathBuf::from(trimmed);
    }

    path.to_path_buf()
}
