/**
 * RTG KERNEL - Socle partagé du poller et du grapheur
 *
 * RÔLE : Modèles (cibles, échantillons), ports vers les collaborateurs
 * externes (store d'échantillons, interrogation d'équipement), description
 * des cibles, configuration et logging.
 */

pub mod config;
pub mod logging;
pub mod models;
pub mod ports;
pub mod targets;

pub use config::{ConfigError, RtgConfig, StoreBackend, StoreConfig};
pub use models::{Sample, Target, TargetKey};
pub use ports::{open_store, DeviceQuery, PollError, SampleStore, StoreError};
pub use targets::{TargetError, TargetFile, TargetSource};
