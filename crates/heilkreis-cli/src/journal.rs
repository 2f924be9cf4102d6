//! Append-only JSON Lines journals under the log directory.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

pub const ISSUE_LOG: &str = "issue_log.jsonl";
pub const MONITOR_LOG: &str = "monitor_log.jsonl";
pub const HEALING_LOG: &str = "healing_log.jsonl";
pub const DEPLOYMENT_LOG: &str = "deployment_log.jsonl";

#[derive(Debug)]
pub struct Journal<T> {
    path: PathBuf,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for Journal<T> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            _record: PhantomData,
        }
    }
}

impl<T: Serialize + DeserializeOwned> Journal<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _record: PhantomData,
        }
    }

    pub fn in_dir(dir: &Path, name: &str) -> Self {
        Self::new(dir.join(name))
    }

    pub fn append(&self, record: &T) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open journal {:?}", self.path))?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// All readable records with their line index. A missing file is empty;
    /// malformed lines are skipped.
    pub fn read_indexed(&self) -> Result<Vec<(usize, T)>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open journal {:?}", self.path))?;
        let mut records = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(record) => records.push((idx, record)),
                Err(e) => tracing::warn!(
                    journal = %self.path.display(),
                    line = idx + 1,
                    error = %e,
                    "Skipping malformed journal line"
                ),
            }
        }
        Ok(records)
    }

    pub fn read_all(&self) -> Result<Vec<T>> {
        Ok(self
            .read_indexed()?
            .into_iter()
            .map(|(_, record)| record)
            .collect())
    }

    /// Most recent readable record and its line index.
    pub fn latest(&self) -> Result<Option<(usize, T)>> {
        Ok(self.read_indexed()?.pop())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Line {
        n: u32,
    }

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "heilkreis_journal_{}_{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn missing_journal_is_empty() {
        let dir = scratch("missing");
        let journal: Journal<Line> = Journal::in_dir(&dir, "x.jsonl");
        assert!(journal.read_all().unwrap().is_empty());
        assert!(journal.latest().unwrap().is_none());
    }

    #[test]
    fn append_then_latest() {
        let dir = scratch("append");
        let journal: Journal<Line> = Journal::in_dir(&dir, "x.jsonl");
        journal.append(&Line { n: 1 }).unwrap();
        journal.append(&Line { n: 2 }).unwrap();

        assert_eq!(journal.read_all().unwrap(), vec![Line { n: 1 }, Line { n: 2 }]);
        assert_eq!(journal.latest().unwrap(), Some((1, Line { n: 2 })));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let dir = scratch("malformed");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("x.jsonl");
        fs::write(&path, "{\"n\":1}\nnot json\n\n{\"n\":3}\n{\"n\":").unwrap();

        let journal: Journal<Line> = Journal::new(&path);
        assert_eq!(
            journal.read_indexed().unwrap(),
            vec![(0, Line { n: 1 }), (3, Line { n: 3 })]
        );
        let _ = fs::remove_dir_all(&dir);
    }
}
