//! Persistente Tabelle der Aktionswerte `(state, action) → value`.
//!
//! Die Tabelle ist das gesamte gelernte Gedächtnis. Jede Aktualisierung wird
//! synchron vollständig zurückgeschrieben (überschreiben, nicht anhängen);
//! schlägt das Schreiben fehl, bleibt die Tabelle im Speicher maßgeblich.

use crate::error::{PolicyError, Result};
use crate::LearningConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Jede Remediation ist eine einschrittige Episode ohne Folgezustand.
const TERMINAL_VALUE: f64 = 0.0;

/// Eine Zeile der persistierten Tabelle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionValue {
    pub state: String,
    pub action: String,
    pub value: f64,
}

#[derive(Debug)]
pub struct PolicyStore {
    path: Option<PathBuf>,
    alpha: f64,
    gamma: f64,
    values: BTreeMap<String, BTreeMap<String, f64>>,
}

impl PolicyStore {
    /// Öffnet die Tabelle an `path`. Eine fehlende Datei ergibt eine leere
    /// Tabelle, eine kaputte Datei einen Konfigurationsfehler.
    pub fn open(path: impl Into<PathBuf>, config: &LearningConfig) -> Result<Self> {
        let path = path.into();
        let mut store = Self {
            path: None,
            alpha: config.alpha,
            gamma: config.gamma,
            values: BTreeMap::new(),
        };
        if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|source| PolicyError::Io {
                path: path.clone(),
                source,
            })?;
            let rows: Vec<ActionValue> =
                serde_json::from_str(&raw).map_err(|source| PolicyError::Malformed {
                    path: path.clone(),
                    source,
                })?;
            for row in rows {
                if !row.value.is_finite() {
                    return Err(PolicyError::Configuration(format!(
                        "non-finite value for ({}, {}) in {}",
                        row.state,
                        row.action,
                        path.display()
                    )));
                }
                store.insert(row.state, row.action, row.value);
            }
        }
        store.path = Some(path);
        Ok(store)
    }

    /// Tabelle ohne Backing-Datei, z. B. für Tests und Simulationen.
    #[must_use]
    pub fn in_memory(config: &LearningConfig) -> Self {
        Self {
            path: None,
            alpha: config.alpha,
            gamma: config.gamma,
            values: BTreeMap::new(),
        }
    }

    /// Aktionswert, 0.0 für nie gesehene Paare.
    #[must_use]
    pub fn value_of(&self, state: &str, action: &str) -> f64 {
        self.values
            .get(state)
            .and_then(|actions| actions.get(action))
            .copied()
            .unwrap_or(0.0)
    }

    /// Verbucht eine automatisch gemessene Belohnung.
    pub fn update(&mut self, state: &str, action: &str, reward: f64) -> f64 {
        self.apply(state, action, reward)
    }

    /// Verbucht menschliches Feedback; gleiche Regel wie [`Self::update`].
    pub fn human_update(&mut self, state: &str, action: &str, feedback: f64) -> f64 {
        self.apply(state, action, feedback)
    }

    fn apply(&mut self, state: &str, action: &str, reward: f64) -> f64 {
        let current = self.value_of(state, action);
        let target = self.td_target(reward, TERMINAL_VALUE);
        let next = current + self.alpha * (target - current);
        if !next.is_finite() {
            crate::warn_event!(
                "Warning: discarding non-finite update for ({}, {}) with reward {}",
                state,
                action,
                reward
            );
            return current;
        }
        self.insert(state.to_string(), action.to_string(), next);

        if let Err(e) = self.flush() {
            crate::warn_event!("Warning: could not save policy table: {}", e);
        }
        next
    }

    fn td_target(&self, reward: f64, next_value: f64) -> f64 {
        reward + self.gamma * next_value
    }

    fn insert(&mut self, state: String, action: String, value: f64) {
        self.values.entry(state).or_default().insert(action, value);
    }

    /// Schreibt die gesamte Tabelle. Ohne Backing-Datei ein No-op.
    ///
    /// Geschrieben wird in eine Nachbardatei, die nach `sync_all` über das
    /// Ziel umbenannt wird; ein Absturz hinterlässt so nie eine halbe Tabelle.
    pub fn flush(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let persist_err = |source| PolicyError::Persistence {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(persist_err)?;
            }
        }
        let tmp = tmp_path(path);
        let written = write_rows(&tmp, &self.entries()).and_then(|()| fs::rename(&tmp, path));
        if let Err(source) = written {
            let _ = fs::remove_file(&tmp);
            return Err(persist_err(source));
        }
        Ok(())
    }

    /// Alle Einträge, sortiert nach Zustand und Aktion.
    #[must_use]
    pub fn entries(&self) -> Vec<ActionValue> {
        self.values
            .iter()
            .flat_map(|(state, actions)| {
                actions.iter().map(move |(action, value)| ActionValue {
                    state: state.clone(),
                    action: action.clone(),
                    value: *value,
                })
            })
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.values().map(BTreeMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

fn write_rows(path: &Path, rows: &[ActionValue]) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, rows).map_err(io::Error::from)?;
    writer.flush()?;
    writer.get_ref().sync_all()
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
