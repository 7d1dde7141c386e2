/**
 * STORE JSON - Persistance des échantillons dans un fichier JSON
 *
 * RÔLE :
 * Backend simple pour le poller et le grapheur : un fichier par base,
 * une entrée par cible, les échantillons triés par timestamp.
 *
 * FONCTIONNEMENT :
 * - Chargement complet au démarrage vers un cache mémoire (MemoryStore)
 * - append() écrit dans le cache et marque le store "dirty"
 * - flush() réécrit le fichier (appelé par le poller en fin de round)
 * - Écriture atomique : fichier temporaire puis rename
 *
 * FORMAT :
 * ```json
 * [
 *   { "group": "ifInOctets", "id": 3,
 *     "samples": [ { "counter": 1000, "timestamp": 1700000000 } ] }
 * ]
 * ```
 */

use super::memory::{MemoryStore, SeriesMap};
use super::{SampleStore, StoreError};
use crate::models::{Sample, TargetKey};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Une série telle qu'écrite sur disque
#[derive(Debug, Serialize, Deserialize)]
struct StoredSeries {
    group: String,
    id: u32,
    samples: Vec<Sample>,
}

pub struct JsonFileStore {
    /// Chemin du fichier de stockage JSON
    storage_path: PathBuf,
    /// Cache en mémoire des séries
    cache: MemoryStore,
    /// Écritures non encore persistées
    dirty: AtomicBool,
}

impl JsonFileStore {
    /// Ouvre (ou crée) le fichier de stockage
    pub fn open<P: Into<PathBuf>>(storage_path: P) -> Result<Self, StoreError> {
        let path = storage_path.into();
        let cache = MemoryStore::from_map(Self::load_from_disk(&path)?);
        tracing::info!(path = %path.display(), samples = cache.len(), "json sample store opened");
        Ok(Self {
            storage_path: path,
            cache,
            dirty: AtomicBool::new(false),
        })
    }

    fn load_from_disk(path: &Path) -> Result<SeriesMap, StoreError> {
        if !path.exists() {
            // Fichier n'existe pas encore, on crée un tableau vide
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, "[]")?;
        }

        let content = fs::read_to_string(path)?;
        let stored: Vec<StoredSeries> = serde_json::from_str(&content)?;

        let mut map = SeriesMap::new();
        for series in stored {
            let samples = map.entry(TargetKey::new(series.group, series.id)).or_default();
            for sample in series.samples {
                samples.insert(sample.timestamp, sample.counter);
            }
        }
        Ok(map)
    }

    fn save_to_disk(&self) -> Result<(), StoreError> {
        let stored: Vec<StoredSeries> = self
            .cache
            .snapshot()
            .into_iter()
            .map(|(key, samples)| StoredSeries {
                group: key.group,
                id: key.id,
                samples: samples.into_iter().map(|(ts, counter)| Sample::new(counter, ts)).collect(),
            })
            .collect();

        let json = serde_json::to_string_pretty(&stored)?;
        let tmp = self.storage_path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.storage_path)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.storage_path
    }
}

impl SampleStore for JsonFileStore {
    fn append(&self, key: &TargetKey, counter: u64, timestamp: u64) -> Result<(), StoreError> {
        self.cache.append(key, counter, timestamp)?;
        self.dirty.store(true, Ordering::Release);
        Ok(())
    }

    fn read_range(&self, key: &TargetKey, begin: u64, end: u64) -> Result<Vec<Sample>, StoreError> {
        self.cache.read_range(key, begin, end)
    }

    fn read_latest(&self, key: &TargetKey) -> Result<Option<Sample>, StoreError> {
        self.cache.read_latest(key)
    }

    fn flush(&self) -> Result<(), StoreError> {
        if self.dirty.swap(false, Ordering::AcqRel) {
            if let Err(e) = self.save_to_disk() {
                self.dirty.store(true, Ordering::Release);
                return Err(e);
            }
            tracing::debug!(path = %self.storage_path.display(), "sample store flushed");
        }
        Ok(())
    }

    fn close(&self) -> Result<(), StoreError> {
        let flushed = self.flush();
        self.cache.close()?;
        flushed
    }
}
