//! Saturation weights with hot-reload from config/saturation_weights.json.
//!
//! JSON shape (every field optional, missing ones keep their default):
//! {
//!   "baseline": 50,
//!   "employment_growth": -10, "employment_growth_terms": ["creation", "increase", "growth"],
//!   "employment_decline": 15, "employment_decline_terms": ["reduction", "decrease", "layoff"],
//!   "recession": 10, "recession_terms": ["slowdown", "layoff", "declin"],
//!   "positive_sentiment": -5, "negative_sentiment": 5,
//!   "supply_gap": -8, "supply_gap_terms": ["shortage", "increased demand"],
//!   "low_below": 30, "high_from": 70
//! }
//!
//! On each `current()` call we check the file's modified time and reload if changed.

use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::RwLock,
    time::SystemTime,
};

pub const DEFAULT_WEIGHTS_PATH: &str = "config/saturation_weights.json";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaturationWeights {
    pub baseline: i32,
    pub employment_growth: i32,
    pub employment_growth_terms: Vec<String>,
    pub employment_decline: i32,
    pub employment_decline_terms: Vec<String>,
    pub recession: i32,
    pub recession_terms: Vec<String>,
    pub positive_sentiment: i32,
    pub negative_sentiment: i32,
    pub supply_gap: i32,
    pub supply_gap_terms: Vec<String>,
    /// Scores below this are Low.
    pub low_below: i32,
    /// Scores at or above this are High.
    pub high_from: i32,
}

fn terms(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for SaturationWeights {
    fn default() -> Self {
        Self {
            baseline: 50,
            employment_growth: -10,
            employment_growth_terms: terms(&["creation", "increase", "growth"]),
            employment_decline: 15,
            employment_decline_terms: terms(&["reduction", "decrease", "layoff"]),
            recession: 10,
            recession_terms: terms(&["slowdown", "layoff", "declin"]),
            positive_sentiment: -5,
            negative_sentiment: 5,
            supply_gap: -8,
            supply_gap_terms: terms(&["shortage", "increased demand"]),
            low_below: 30,
            high_from: 70,
        }
    }
}

/// Hot-reload wrapper: reloads when the config file mtime changes.
#[derive(Debug)]
pub struct HotReloadSaturationWeights {
    path: PathBuf,
    inner: RwLock<State>,
}

#[derive(Debug)]
struct State {
    weights: SaturationWeights,
    last_modified: Option<SystemTime>,
}

impl HotReloadSaturationWeights {
    /// Create with a path (defaults to `DEFAULT_WEIGHTS_PATH` if `None`).
    pub fn new(path: Option<&Path>) -> Self {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_WEIGHTS_PATH));
        Self {
            path,
            inner: RwLock::new(State {
                weights: SaturationWeights::default(),
                last_modified: None,
            }),
        }
    }

    /// Latest weights, reloading if the file changed. A missing or invalid
    /// file keeps the previous weights.
    pub fn current(&self) -> SaturationWeights {
        let mtime = match fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(m) => m,
            Err(_) => return self.read_state().weights.clone(),
        };
        if self.read_state().last_modified == Some(mtime) {
            return self.read_state().weights.clone();
        }

        let mut guard = self.inner.write().unwrap_or_else(|p| p.into_inner());
        if guard.last_modified != Some(mtime) {
            match load_weights_file(&self.path) {
                Ok(w) => guard.weights = w,
                Err(e) => {
                    tracing::warn!(target: "weights", error = %e, path = %self.path.display(), "weights reload failed")
                }
            }
            guard.last_modified = Some(mtime);
        }
        guard.weights.clone()
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.inner.read().unwrap_or_else(|p| p.into_inner())
    }
}

/// Load weights directly (no caching). Public for tests/tools.
pub fn load_weights_file(path: &Path) -> io::Result<SaturationWeights> {
    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{io::Write, thread, time::Duration};

    #[test]
    fn missing_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let hot = HotReloadSaturationWeights::new(Some(&dir.path().join("nope.json")));
        assert_eq!(hot.current(), SaturationWeights::default());
    }

    #[test]
    fn loads_and_hot_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saturation_weights.json");

        {
            let mut f = fs::File::create(&path).unwrap();
            write!(f, r#"{{"baseline": 40, "recession_terms": ["recession"]}}"#).unwrap();
            f.sync_all().unwrap();
        }

        let hot = HotReloadSaturationWeights::new(Some(&path));
        let w1 = hot.current();
        assert_eq!(w1.baseline, 40);
        assert_eq!(w1.recession_terms, vec!["recession".to_string()]);
        assert_eq!(w1.high_from, 70);

        // Ensure different mtime (coarse filesystem granularity).
        thread::sleep(Duration::from_millis(1100));

        {
            let mut f = fs::File::create(&path).unwrap();
            write!(f, r#"{{"baseline": 60}}"#).unwrap();
            f.sync_all().unwrap();
        }

        let w2 = hot.current();
        assert_eq!(w2.baseline, 60);
        assert_eq!(w2.recession_terms, SaturationWeights::default().recession_terms);
    }
}
