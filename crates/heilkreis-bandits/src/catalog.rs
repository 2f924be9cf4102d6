//! Aktionskatalog: Zustandslabel → geordnete Liste erlaubter Aktionen.
//!
//! Der Katalog wird einmal beim Start geladen und ist danach unveränderlich.
//! Fehlt das Dokument, wird ein Default-Katalog erzeugt und geschrieben, damit
//! spätere Starts deterministisch dasselbe laden.

use crate::error::{PolicyError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionCatalog {
    actions: BTreeMap<String, Vec<String>>,
}

impl Default for ActionCatalog {
    fn default() -> Self {
        let mut actions = BTreeMap::new();
        actions.insert(
            "connection_failed".to_string(),
            vec!["restart_deployment".to_string(), "rollback".to_string()],
        );
        actions.insert(
            "slow_response".to_string(),
            vec!["rollback".to_string(), "restart_deployment".to_string()],
        );
        actions.insert(heilkreis_core::HEALTHY.to_string(), vec!["monitor".to_string()]);
        Self { actions }
    }
}

impl ActionCatalog {
    pub fn new(actions: BTreeMap<String, Vec<String>>) -> Self {
        Self { actions }
    }

    /// Lädt den Katalog von `path` oder legt dort den Default an.
    ///
    /// Ein vorhandenes, aber kaputtes Dokument ist ein Konfigurationsfehler.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            let catalog = Self::default();
            catalog.save(path)?;
            return Ok(catalog);
        }
        let raw = fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| PolicyError::Malformed {
            path: path.to_path_buf(),
            source,
        })
    }

    fn save(&self, path: &Path) -> Result<()> {
        let io_err = |source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(io_err)
    }

    /// Kandidaten für `state` in Katalogreihenfolge; leer für unbekannte Labels.
    #[must_use]
    pub fn actions_for(&self, state: &str) -> &[String] {
        self.actions.get(state).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn states(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }
}
