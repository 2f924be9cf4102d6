//! Gemeinsame Typen und Traits für den heilkreis-Regelkreis.
//!
//! Zustände und Aktionen sind bewusst offene Labels (`String`), weil der
//! Aktionskatalog datengetrieben ist: neue Zustände dürfen auftauchen, ohne
//! dass Code geändert wird.

pub mod issue;

use serde::{Deserialize, Serialize};

/// Zustand, wenn kein offenes Problem vorliegt.
pub const HEALTHY: &str = "healthy";

/// Belohnung für eine erfolgreiche Remediation.
pub const REWARD_SUCCESS: f64 = 1.0;
/// Belohnung für eine fehlgeschlagene Remediation.
pub const REWARD_FAILURE: f64 = -1.0;

/// Binäres Belohnungssignal eines Zyklus.
#[must_use]
pub fn reward_for(success: bool) -> f64 {
    if success {
        REWARD_SUCCESS
    } else {
        REWARD_FAILURE
    }
}

/// Ergebnis einer Policy-Entscheidung für einen Zustand.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Decision {
    pub state: String,
    pub action: String,
    /// Aktionswert zum Zeitpunkt der Entscheidung.
    pub value: f64,
    /// Kurzbegründung, z. B. "explore ε" oder "exploit".
    pub why: String,
}

/// Schnittstelle zwischen Regelkreis und lernender Policy.
pub trait Policy {
    /// Wählt eine Aktion für `state`; `None`, wenn der Katalog keine kennt.
    fn decide(&mut self, state: &str) -> Option<Decision>;
    /// Verbucht eine beobachtete Belohnung und liefert den neuen Aktionswert.
    fn feedback(&mut self, state: &str, action: &str, reward: f64) -> f64;
}
