//! Target descriptions.
//!
//! A target file is a YAML document listing every counter to poll:
//!
//! ```yaml
//! targets:
//!   - host: core-router.lan
//!     community: public
//!     oid: ifHCInOctets.3
//!     group: ifInOctets
//!     id: 3
//! ```

use crate::models::{Target, TargetKey};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error("cannot read target file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid target file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("duplicate target {0}")]
    Duplicate(TargetKey),
    #[error("target {key} has an empty {field}")]
    Incomplete { key: TargetKey, field: &'static str },
}

/// Anything the registry can (re)load its target set from.
pub trait TargetSource: Send + Sync {
    fn load(&self) -> Result<Vec<Target>, TargetError>;

    /// Human readable origin, for logs.
    fn describe(&self) -> String;
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TargetList {
    #[serde(default)]
    pub targets: Vec<Target>,
}

impl TargetList {
    pub fn parse(txt: &str, origin: &Path) -> Result<Vec<Target>, TargetError> {
        if txt.trim().is_empty() {
            return Ok(Vec::new());
        }
        let list: TargetList = serde_yaml::from_str(txt).map_err(|source| TargetError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        validate(&list.targets)?;
        Ok(list.targets)
    }
}

fn validate(targets: &[Target]) -> Result<(), TargetError> {
    let mut seen = HashSet::with_capacity(targets.len());
    for target in targets {
        let key = target.key();
        if target.host.trim().is_empty() {
            return Err(TargetError::Incomplete { key, field: "host" });
        }
        if target.oid.trim().is_empty() {
            return Err(TargetError::Incomplete { key, field: "oid" });
        }
        if !seen.insert(key.clone()) {
            return Err(TargetError::Duplicate(key));
        }
    }
    Ok(())
}

/// Target file on disk, re-read on every load.
#[derive(Debug, Clone)]
pub struct TargetFile {
    path: PathBuf,
}

impl TargetFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TargetSource for TargetFile {
    fn load(&self) -> Result<Vec<Target>, TargetError> {
        let txt = std::fs::read_to_string(&self.path).map_err(|source| TargetError::Read {
            path: self.path.clone(),
            source,
        })?;
        TargetList::parse(&txt, &self.path)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
