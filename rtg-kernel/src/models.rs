use serde::{Deserialize, Serialize};
use std::fmt;

/// Clé d'une cible dans le store : groupe (table) + identifiant d'interface
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetKey {
    pub group: String,
    pub id: u32,
}

impl TargetKey {
    pub fn new(group: impl Into<String>, id: u32) -> Self {
        Self { group: group.into(), id }
    }
}

impl fmt::Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.id)
    }
}

/// Une cible pollable : équipement + descripteur du compteur
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub host: String,
    #[serde(default = "default_community")]
    pub community: String,
    pub oid: String, // ex: "ifHCInOctets.3" ou "rx_bytes:eth0" en local
    pub group: String,
    pub id: u32,
}

fn default_community() -> String {
    "public".into()
}

impl Target {
    pub fn key(&self) -> TargetKey {
        TargetKey::new(self.group.clone(), self.id)
    }
}

/// Échantillon brut : valeur du compteur + horodatage UNIX (secondes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub counter: u64,
    pub timestamp: u64,
}

impl Sample {
    pub fn new(counter: u64, timestamp: u64) -> Self {
        Self { counter, timestamp }
    }
}
