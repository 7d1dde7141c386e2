use crate::models::Target;
use std::time::Duration;

/// Échecs d'une interrogation d'équipement ; toujours locaux à la cible
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollError {
    #[error("device unreachable: {0}")]
    Unreachable(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("unsupported target: {0}")]
    Unsupported(String),
    #[error("poll timed out after {0:?}")]
    Timeout(Duration),
}

/// Capacité d'interrogation : une cible donne une valeur de compteur ou échoue
pub trait DeviceQuery: Send + Sync {
    fn poll(&self, target: &Target) -> Result<u64, PollError>;
}

impl<Q: DeviceQuery + ?Sized> DeviceQuery for std::sync::Arc<Q> {
    fn poll(&self, target: &Target) -> Result<u64, PollError> {
        (**self).poll(target)
    }
}
