/**
 * REGISTRY - Ensemble des cibles à interroger
 *
 * RÔLE :
 * Détient les cibles chargées depuis la description externe et distribue
 * une cible par claim aux workers pendant un round.
 *
 * FONCTIONNEMENT :
 * - load()/reload() remplacent l'ensemble complet d'un coup
 * - begin_round() fige un instantané : un reload pendant le round
 *   ne change pas ce qui est distribué
 * - claim_next() rend la prochaine cible non réclamée, ou None
 * - le statut du dernier poll survit au reload si la cible est inchangée
 *
 * Le registry n'est pas synchronisé lui-même : le crew le garde sous
 * son verrou.
 */

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rtg_kernel::{Target, TargetError, TargetKey, TargetSource};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    Source(#[from] TargetError),
    #[error("no targets in {0}")]
    Empty(String),
}

/// Résultat du dernier poll d'une cible
#[derive(Debug, Clone, PartialEq)]
pub enum TargetStatus {
    NeverPolled,
    Ok { counter: u64, at: DateTime<Utc> },
    Failed { reason: String, at: DateTime<Utc> },
}

/// Une cible du registry ; seul le worker qui l'a réclamée écrit son statut
#[derive(Debug)]
pub struct TargetSlot {
    pub target: Target,
    status: Mutex<TargetStatus>,
}

impl TargetSlot {
    fn new(target: Target, status: TargetStatus) -> Self {
        Self {
            target,
            status: Mutex::new(status),
        }
    }

    pub fn status(&self) -> TargetStatus {
        self.status.lock().clone()
    }

    pub fn set_status(&self, status: TargetStatus) {
        *self.status.lock() = status;
    }
}

type Slots = Arc<[Arc<TargetSlot>]>;

pub struct Registry {
    source: Arc<dyn TargetSource>,
    slots: Slots,
    round: Option<(Slots, usize)>,
}

impl Registry {
    /// Chargement initial ; un ensemble vide est une erreur de démarrage
    pub fn load(source: Arc<dyn TargetSource>) -> Result<Self, RegistryError> {
        let targets = source.load()?;
        if targets.is_empty() {
            return Err(RegistryError::Empty(source.describe()));
        }
        let slots: Slots = targets
            .into_iter()
            .map(|t| Arc::new(TargetSlot::new(t, TargetStatus::NeverPolled)))
            .collect();
        tracing::info!(targets = slots.len(), source = %source.describe(), "targets loaded");
        Ok(Self {
            source,
            slots,
            round: None,
        })
    }

    /// Recharge depuis la dernière source connue.
    /// En cas d'échec l'ensemble courant reste en place.
    pub fn reload(&mut self) -> Result<usize, RegistryError> {
        let targets = self.source.load()?;
        if targets.is_empty() {
            tracing::warn!(source = %self.source.describe(), "reloaded target set is empty");
        }

        let previous: HashMap<TargetKey, &Arc<TargetSlot>> =
            self.slots.iter().map(|s| (s.target.key(), s)).collect();
        let mut kept = 0usize;
        let slots: Slots = targets
            .into_iter()
            .map(|t| {
                let status = match previous.get(&t.key()) {
                    Some(old) if old.target == t => {
                        kept += 1;
                        old.status()
                    }
                    _ => TargetStatus::NeverPolled,
                };
                Arc::new(TargetSlot::new(t, status))
            })
            .collect();

        tracing::info!(
            before = self.slots.len(),
            after = slots.len(),
            kept,
            "target registry reloaded"
        );
        self.slots = slots;
        Ok(self.slots.len())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[Arc<TargetSlot>] {
        &self.slots
    }

    pub fn find(&self, key: &TargetKey) -> Option<&Arc<TargetSlot>> {
        self.slots.iter().find(|s| &s.target.key() == key)
    }

    /// Fige l'ensemble courant pour le round ; renvoie le nombre de jobs
    pub fn begin_round(&mut self) -> usize {
        self.round = Some((self.slots.clone(), 0));
        self.slots.len()
    }

    pub fn claim_next(&mut self) -> Option<Arc<TargetSlot>> {
        let (snapshot, cursor) = self.round.as_mut()?;
        let slot = snapshot.get(*cursor)?.clone();
        *cursor += 1;
        Some(slot)
    }

    pub fn end_round(&mut self) {
        self.round = None;
    }

    pub fn in_round(&self) -> bool {
        self.round.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtg_devkit::{target, targets, SwappableTargets};

    fn registry(n: u32) -> (Arc<SwappableTargets>, Registry) {
        let source = Arc::new(SwappableTargets::new(targets("ifInOctets", n)));
        let reg = Registry::load(source.clone()).unwrap();
        (source, reg)
    }

    #[test]
    fn test_empty_initial_load_is_fatal() {
        let source = Arc::new(SwappableTargets::new(vec![]));
        assert!(matches!(Registry::load(source), Err(RegistryError::Empty(_))));
    }

    #[test]
    fn test_claim_walks_snapshot_once() {
        let (_, mut reg) = registry(3);
        assert!(reg.claim_next().is_none(), "no claim outside a round");

        assert_eq!(reg.begin_round(), 3);
        let ids: Vec<u32> = std::iter::from_fn(|| reg.claim_next())
            .map(|s| s.target.id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(reg.claim_next().is_none());
        reg.end_round();
        assert!(!reg.in_round());
    }

    #[test]
    fn test_reload_mid_round_keeps_snapshot() {
        let (source, mut reg) = registry(3);
        reg.begin_round();
        reg.claim_next();

        source.replace(targets("ifInOctets", 7));
        assert_eq!(reg.reload().unwrap(), 7);

        let rest = std::iter::from_fn(|| reg.claim_next()).count();
        assert_eq!(rest, 2);
        reg.end_round();
        assert_eq!(reg.begin_round(), 7);
    }

    #[test]
    fn test_reload_carries_status_for_unchanged_targets() {
        let (source, mut reg) = registry(2);
        let now = Utc::now();
        for slot in reg.slots() {
            slot.set_status(TargetStatus::Ok { counter: 42, at: now });
        }

        let mut changed = target("ifInOctets", 2);
        changed.host = "elsewhere.lan".into();
        source.replace(vec![target("ifInOctets", 1), changed, target("ifInOctets", 3)]);
        reg.reload().unwrap();

        let status = |id| reg.find(&TargetKey::new("ifInOctets", id)).unwrap().status();
        assert_eq!(status(1), TargetStatus::Ok { counter: 42, at: now });
        assert_eq!(status(2), TargetStatus::NeverPolled);
        assert_eq!(status(3), TargetStatus::NeverPolled);
    }

    #[test]
    fn test_failed_reload_keeps_current_set() {
        let (source, mut reg) = registry(4);
        source.break_source(true);
        assert!(reg.reload().is_err());
        assert_eq!(reg.len(), 4);
    }
}
