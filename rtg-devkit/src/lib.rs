/*!
# RTG DevKit - Doubles et utilitaires de test

Bibliothèque facilitant les tests du poller et du grapheur avec:
- Requête d'équipement scriptée (délais, échecs, portillon)
- Sources de cibles interchangeables à chaud
- Constructeurs de séries d'échantillons
- Harness de polling avec assertions sur le store
*/

pub mod fixtures;
pub mod query_stub;
pub mod test_utils;

pub use fixtures::{SwappableTargets, cumulative, samples, seed, target, targets};
pub use query_stub::{Delay, ScriptedQuery};
pub use test_utils::{PollHarness, init_test_logging};
