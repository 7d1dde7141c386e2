//! Configuration RTG (poller + grapheur)
//!
//! Ordre de recherche :
//! - `$RTG_CONFIG` si défini
//! - `./rtg.toml`
//! - `<config dir>/rtg/rtg.toml`
//! - `/etc/rtg/rtg.toml`
//!
//! Si aucun fichier n'existe, la configuration par défaut est écrite
//! dans le premier emplacement inscriptible puis utilisée.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONF_FILE: &str = "rtg.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("couldn't write default config: {0}")]
    Write(String),
    #[error("invalid setting: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RtgConfig {
    /// Intervalle nominal entre deux rounds (secondes)
    pub interval_secs: u64,
    /// Taille fixe du crew de workers
    pub threads: usize,
    /// Au-delà de `high_skew_slop * interval`, l'échantillon est jugé décalé
    pub high_skew_slop: f64,
    /// En deçà de `low_skew_slop * interval`, idem
    pub low_skew_slop: f64,
    /// Borne d'une interrogation d'équipement ; absent = pas de borne
    pub poll_timeout_secs: Option<u64>,
    /// Verbosité initiale (0 = warn, 1 = info, 2 = debug, 3+ = trace)
    pub verbose: u8,
    pub pid_file: PathBuf,
    /// Autorise plusieurs instances du poller (pas de pid file)
    pub allow_multiple: bool,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub path: PathBuf,
    /// false = poll sans insertion (dry-run)
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Json,
}

impl Default for RtgConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            threads: 5,
            high_skew_slop: 1.5,
            low_skew_slop: 0.5,
            poll_timeout_secs: Some(10),
            verbose: 0,
            pid_file: std::env::temp_dir().join("rtgpoll.pid"),
            allow_multiple: false,
            store: StoreConfig::default(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Json,
            path: PathBuf::from("./data/rtg.json"),
            enabled: true,
        }
    }
}

impl RtgConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn poll_timeout(&self) -> Option<Duration> {
        self.poll_timeout_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs == 0 {
            return Err(ConfigError::Invalid("interval_secs must be > 0".into()));
        }
        if self.threads == 0 {
            return Err(ConfigError::Invalid("threads must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.low_skew_slop) {
            return Err(ConfigError::Invalid(format!(
                "low_skew_slop {} outside [0, 1]",
                self.low_skew_slop
            )));
        }
        if self.high_skew_slop < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "high_skew_slop {} below 1",
                self.high_skew_slop
            )));
        }
        Ok(())
    }

    pub fn from_toml(txt: &str, origin: &Path) -> Result<Self, ConfigError> {
        let cfg: RtgConfig = toml::from_str(txt).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Charge un fichier précis
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let txt = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&txt, path)
    }

    /// Charge la configuration selon l'ordre de recherche.
    /// Retourne aussi le chemin effectivement utilisé.
    pub fn load() -> Result<(Self, PathBuf), ConfigError> {
        if let Ok(path) = std::env::var("RTG_CONFIG") {
            let path = PathBuf::from(path);
            return Ok((Self::load_from(&path)?, path));
        }

        let candidates = Self::config_paths();
        for path in &candidates {
            if path.exists() {
                return Ok((Self::load_from(path)?, path.clone()));
            }
        }

        // Première utilisation : on écrit la config par défaut
        let cfg = Self::default();
        for path in &candidates {
            match cfg.save(path) {
                Ok(()) => {
                    tracing::warn!(path = %path.display(), "no config found, wrote defaults");
                    return Ok((cfg, path.clone()));
                }
                Err(e) => tracing::debug!(path = %path.display(), "cannot write default config: {e}"),
            }
        }
        Err(ConfigError::Write("no writable config location".into()))
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write(e.to_string()))?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Write(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::Write(e.to_string()))
    }

    pub fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(DEFAULT_CONF_FILE)];
        if let Some(mut dir) = dirs::config_dir() {
            dir.push("rtg");
            dir.push(DEFAULT_CONF_FILE);
            paths.push(dir);
        }
        paths.push(PathBuf::from("/etc/rtg").join(DEFAULT_CONF_FILE));
        paths
    }
}
