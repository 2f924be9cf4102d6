//! Named environment profiles (`dev`, `staging`, ...) from a JSON file.
//!
//! A profile is a flat map of settings. Any setting can be overridden by an
//! environment variable `<ENV>_<KEY>`, e.g. `STAGING_URL` or `DEV_DEPLOY_CMD`.

use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

pub const DEFAULT_PROFILES: &str = "config/env_profiles.json";

#[derive(Debug, Clone, PartialEq)]
pub struct EnvProfile {
    pub name: String,
    fields: BTreeMap<String, String>,
}

impl EnvProfile {
    pub fn load(path: &Path, name: &str) -> Result<Self> {
        Self::load_with(path, name, |key| std::env::var(key).ok())
    }

    /// Like [`Self::load`], with overrides looked up through `lookup`.
    pub fn load_with(
        path: &Path,
        name: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open profiles {}", path.display()))?;
        let mut profiles: BTreeMap<String, BTreeMap<String, Value>> =
            serde_json::from_reader(file)
                .with_context(|| format!("Malformed profiles {}", path.display()))?;
        let Some(settings) = profiles.remove(name) else {
            anyhow::bail!(
                "Environment '{}' not found in {} (known: {})",
                name,
                path.display(),
                profiles.keys().cloned().collect::<Vec<_>>().join(", ")
            );
        };

        let prefix = name.to_uppercase();
        let fields = settings
            .into_iter()
            .map(|(key, value)| {
                let var = format!("{}_{}", prefix, key.to_uppercase());
                let value = lookup(&var)
                    .filter(|v| !v.is_empty())
                    .unwrap_or_else(|| scalar(value));
                (key, value)
            })
            .collect();
        Ok(Self {
            name: name.to_string(),
            fields,
        })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Probe target: `url`, or `http://<host>:<port>` with host defaulting to
    /// `localhost`.
    pub fn url(&self) -> Option<String> {
        if let Some(url) = self.get("url") {
            return Some(url.to_string());
        }
        let port = self.get("port")?;
        let host = self.get("host").unwrap_or("localhost");
        Some(format!("http://{host}:{port}"))
    }

    pub fn deploy_cmd(&self) -> Option<&str> {
        self.get("deploy_cmd")
    }
}

fn scalar(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}
