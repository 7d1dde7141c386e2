/**
 * PORTS - Interfaces vers les collaborateurs externes de RTG
 *
 * RÔLE :
 * Ce module définit les capacités dont le poller et le grapheur dépendent
 * sans en connaître l'implémentation.
 *
 * FONCTIONNEMENT :
 * - SampleStore = store ordonné d'échantillons, indexé par cible + temps
 * - DeviceQuery = "donne-moi la valeur du compteur de cette cible ou échoue"
 * - open_store() = construit le backend choisi par la configuration
 *
 * BACKENDS :
 * - MemoryStore : tout en mémoire (tests, dry-run)
 * - JsonFileStore : fichier JSON + cache mémoire, flush en fin de round
 */

pub mod device;
pub mod json_file;
pub mod memory;

pub use device::{DeviceQuery, PollError};
pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

use crate::config::{StoreBackend, StoreConfig};
use crate::models::{Sample, TargetKey};
use std::sync::Arc;

/// Erreurs possibles lors des opérations sur le store d'échantillons
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate sample for {key} at {timestamp}")]
    DuplicateTimestamp { key: TargetKey, timestamp: u64 },
    #[error("no sample stored for {0}")]
    NoData(TargetKey),
    #[error("store is closed")]
    Closed,
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Interface commune à tous les backends de stockage
///
/// Les séries renvoyées sont toujours triées par timestamp croissant.
pub trait SampleStore: Send + Sync {
    /// Ajoute un échantillon ; un timestamp déjà présent pour la cible est refusé
    fn append(&self, key: &TargetKey, counter: u64, timestamp: u64) -> Result<(), StoreError>;

    /// Échantillons dans l'intervalle `(begin, end]`
    fn read_range(&self, key: &TargetKey, begin: u64, end: u64) -> Result<Vec<Sample>, StoreError>;

    /// Dernier échantillon connu, quel que soit son âge
    fn read_latest(&self, key: &TargetKey) -> Result<Option<Sample>, StoreError>;

    /// Lecture d'intervalle avec repli sur le dernier échantillon connu.
    /// Sert à amorcer un graphe quand l'intervalle demandé ne contient rien.
    fn read_range_or_latest(&self, key: &TargetKey, begin: u64, end: u64) -> Result<Vec<Sample>, StoreError> {
        let samples = self.read_range(key, begin, end)?;
        if !samples.is_empty() {
            return Ok(samples);
        }
        Ok(self.read_latest(key)?.into_iter().collect())
    }

    /// Pousse les écritures en attente vers le support persistant
    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Ferme la connexion ; les écritures suivantes échouent
    fn close(&self) -> Result<(), StoreError> {
        self.flush()
    }
}

/// Ouvre le backend décrit par la configuration.
/// Un échec ici est fatal au démarrage (store injoignable).
pub fn open_store(cfg: &StoreConfig) -> Result<Arc<dyn SampleStore>, StoreError> {
    match cfg.backend {
        StoreBackend::Memory => {
            tracing::info!("using in-memory sample store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Json => {
            let store = JsonFileStore::open(&cfg.path)?;
            Ok(Arc::new(store))
        }
    }
}
