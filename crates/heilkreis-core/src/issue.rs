//! Datensätze der Problemquelle (Issue-Log).
//!
//! Der Prober hängt pro erkanntem Problem einen [`IssueRecord`] an ein
//! Append-only-Journal an. Der Regelkreis liest nur den jüngsten Eintrag und
//! leitet daraus das Zustandslabel ab.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Ziel nicht erreichbar (Verbindungsfehler, Timeout).
pub const CONNECTION_FAILED: &str = "CONNECTION_FAILED";
/// Ziel antwortet, aber langsamer als der konfigurierte Schwellwert.
pub const SLOW_RESPONSE: &str = "SLOW_RESPONSE";

/// Ein erkanntes Problem.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IssueRecord {
    /// Zeitpunkt der Erkennung (RFC 3339 im Journal).
    #[serde(with = "time::serde::rfc3339")]
    pub ts: OffsetDateTime,
    /// Kategorie, z. B. [`CONNECTION_FAILED`].
    pub alert_type: String,
    /// Menschenlesbare Details.
    pub message: String,
}

impl IssueRecord {
    pub fn new(alert_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            ts: OffsetDateTime::now_utc(),
            alert_type: alert_type.into(),
            message: message.into(),
        }
    }

    /// Zustandslabel für den Aktionskatalog: die Kategorie in Kleinbuchstaben.
    #[must_use]
    pub fn state_label(&self) -> String {
        self.alert_type.to_lowercase()
    }
}
