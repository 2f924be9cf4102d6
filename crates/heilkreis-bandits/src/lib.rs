//! ε-greedy Auswahl von Remediationsaktionen über gelernte Aktionswerte.
//!
//! Der [`RemediationAgent`] verbindet den unveränderlichen [`ActionCatalog`]
//! mit dem [`PolicyStore`] und implementiert das
//! [`Policy`](heilkreis_core::Policy)-Trait. Mit Wahrscheinlichkeit `epsilon`
//! wird zufällig ein Kandidat gewählt, sonst der mit dem höchsten Aktionswert.

mod catalog;
mod error;
mod store;

pub use catalog::ActionCatalog;
pub use error::{PolicyError, Result};
pub use store::{ActionValue, PolicyStore};

use heilkreis_core::{Decision, Policy};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Warnung über `tracing` oder, ohne `telemetry`, über stderr.
macro_rules! warn_event {
    ($($arg:tt)*) => {{
        #[cfg(feature = "telemetry")]
        ::tracing::warn!($($arg)*);
        #[cfg(not(feature = "telemetry"))]
        eprintln!($($arg)*);
    }};
}
pub(crate) use warn_event;

/// Lernparameter; fest für die Lebensdauer des Prozesses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LearningConfig {
    /// Lernrate α in (0, 1].
    pub alpha: f64,
    /// Diskontfaktor γ in [0, 1]; bei einschrittigen Episoden ohne Wirkung.
    pub gamma: f64,
    /// Explorationsrate ε in [0, 1].
    pub epsilon: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            alpha: 0.6,
            gamma: 0.0,
            epsilon: 0.2,
        }
    }
}

impl LearningConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(PolicyError::Configuration(format!(
                "alpha must be in (0, 1], got {}",
                self.alpha
            )));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(PolicyError::Configuration(format!(
                "gamma must be in [0, 1], got {}",
                self.gamma
            )));
        }
        if !(0.0..=1.0).contains(&self.epsilon) {
            return Err(PolicyError::Configuration(format!(
                "epsilon must be in [0, 1], got {}",
                self.epsilon
            )));
        }
        Ok(())
    }
}

/// ε-greedy Auswahlregel.
#[derive(Debug)]
pub struct EpsilonGreedy<R = StdRng> {
    epsilon: f64,
    rng: R,
}

impl EpsilonGreedy<StdRng> {
    pub fn new(epsilon: f64) -> Self {
        Self::with_rng(epsilon, StdRng::from_entropy())
    }

    /// Reproduzierbare Exploration.
    pub fn seeded(epsilon: f64, seed: u64) -> Self {
        Self::with_rng(epsilon, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> EpsilonGreedy<R> {
    pub fn with_rng(epsilon: f64, rng: R) -> Self {
        Self { epsilon, rng }
    }

    /// Wählt eine Aktion für `state` oder `None`, wenn der Katalog keine kennt.
    ///
    /// Bei Gleichstand gewinnt der erste Kandidat in Katalogreihenfolge; ohne
    /// Vorwissen ist das Ausnutzen damit deterministisch.
    pub fn select(
        &mut self,
        state: &str,
        catalog: &ActionCatalog,
        store: &PolicyStore,
    ) -> Option<Decision> {
        let candidates = catalog.actions_for(state);
        if candidates.is_empty() {
            warn_event!("No actions defined for state: {}", state);
            return None;
        }

        let explore = self.rng.gen::<f64>() < self.epsilon;
        let action = if explore {
            candidates.choose(&mut self.rng)?
        } else {
            best_action(candidates, |a| store.value_of(state, a))?
        };
        Some(Decision {
            state: state.to_string(),
            action: action.clone(),
            value: store.value_of(state, action),
            why: if explore { "explore ε" } else { "exploit" }.into(),
        })
    }
}

fn best_action<'a>(candidates: &'a [String], value_of: impl Fn(&str) -> f64) -> Option<&'a String> {
    let mut best: Option<(&String, f64)> = None;
    for action in candidates {
        let value = value_of(action);
        match best {
            Some((_, top)) if value <= top => {}
            _ => best = Some((action, value)),
        }
    }
    best.map(|(action, _)| action)
}

/// Lernender Agent: Katalog, Wertetabelle und Auswahlregel.
#[derive(Debug)]
pub struct RemediationAgent<R = StdRng> {
    catalog: ActionCatalog,
    store: PolicyStore,
    selector: EpsilonGreedy<R>,
}

impl RemediationAgent<StdRng> {
    /// Lädt Katalog und Wertetabelle von der Platte.
    ///
    /// Ungültige Parameter und kaputte Dokumente sind Konfigurationsfehler.
    pub fn open(
        catalog_path: &Path,
        table_path: &Path,
        config: &LearningConfig,
        seed: Option<u64>,
    ) -> Result<Self> {
        config.validate()?;
        let catalog = ActionCatalog::load_or_create(catalog_path)?;
        let store = PolicyStore::open(table_path, config)?;
        let selector = match seed {
            Some(seed) => EpsilonGreedy::seeded(config.epsilon, seed),
            None => EpsilonGreedy::new(config.epsilon),
        };
        Ok(Self::new(catalog, store, selector))
    }
}

impl<R: Rng> RemediationAgent<R> {
    pub fn new(catalog: ActionCatalog, store: PolicyStore, selector: EpsilonGreedy<R>) -> Self {
        Self {
            catalog,
            store,
            selector,
        }
    }

    /// Menschliches Feedback für ein Paar, gleiche Regel wie automatische Belohnung.
    pub fn human_feedback(&mut self, state: &str, action: &str, feedback: f64) -> f64 {
        self.store.human_update(state, action, feedback)
    }

    pub fn catalog(&self) -> &ActionCatalog {
        &self.catalog
    }

    pub fn store(&self) -> &PolicyStore {
        &self.store
    }
}

impl<R: Rng> Policy for RemediationAgent<R> {
    fn decide(&mut self, state: &str) -> Option<Decision> {
        self.selector.select(state, &self.catalog, &self.store)
    }

    fn feedback(&mut self, state: &str, action: &str, reward: f64) -> f64 {
        self.store.update(state, action, reward)
    }
}
