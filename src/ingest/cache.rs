// src/ingest/cache.rs
//! Last good source listing per topic, used when live search fails.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fs;
use std::hash::{Hash, Hasher};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use crate::ingest::types::SourceItem;

pub trait SourceCache: Send + Sync {
    fn get(&self, topic: &str) -> Option<Vec<SourceItem>>;
    fn set(&self, topic: &str, items: &[SourceItem]);
}

/// Topics differing only in case or spacing share an entry.
pub fn topic_key(topic: &str) -> String {
    topic
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[derive(Default)]
pub struct InMemorySourceCache {
    inner: RwLock<HashMap<String, Vec<SourceItem>>>,
}

impl InMemorySourceCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SourceCache for InMemorySourceCache {
    fn get(&self, topic: &str) -> Option<Vec<SourceItem>> {
        let g = self.inner.read().unwrap_or_else(|p| p.into_inner());
        g.get(&topic_key(topic)).cloned()
    }

    fn set(&self, topic: &str, items: &[SourceItem]) {
        let mut g = self.inner.write().unwrap_or_else(|p| p.into_inner());
        g.insert(topic_key(topic), items.to_vec());
    }
}

/// One JSON file per topic under `dir`. Writes go through a temp file and a
/// rename so readers never see a partial listing.
pub struct FileSourceCache {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSourceCache {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        let dir = dir.into();
        if let Err(e) = fs::create_dir_all(&dir) {
            tracing::warn!(target: "cache", error = %e, dir = %dir.display(), "cache dir unavailable");
        }
        Self {
            dir,
            write_lock: Mutex::new(()),
        }
    }

    pub fn default_dir() -> PathBuf {
        PathBuf::from("cache/sources")
    }

    fn path_for(&self, topic: &str) -> PathBuf {
        let mut hasher = DefaultHasher::new();
        topic_key(topic).hash(&mut hasher);
        self.dir.join(format!("{:016x}.json", hasher.finish()))
    }
}

fn write_atomic(path: &Path, json: &str) -> io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    let mut f = fs::File::create(&tmp)?;
    f.write_all(json.as_bytes())?;
    f.sync_all()?;
    fs::rename(tmp, path)
}

impl SourceCache for FileSourceCache {
    fn get(&self, topic: &str) -> Option<Vec<SourceItem>> {
        let s = fs::read_to_string(self.path_for(topic)).ok()?;
        serde_json::from_str(&s).ok()
    }

    fn set(&self, topic: &str, items: &[SourceItem]) {
        let json = match serde_json::to_string(items) {
            Ok(j) => j,
            Err(e) => {
                tracing::warn!(target: "cache", error = %e, "source cache encode failed");
                return;
            }
        };
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        if let Err(e) = write_atomic(&self.path_for(topic), &json) {
            tracing::warn!(target: "cache", error = %e, "source cache write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(t: &str) -> SourceItem {
        SourceItem {
            title: t.into(),
            locator: format!("https://news.test/{t}"),
            short_description: String::new(),
        }
    }

    #[test]
    fn topic_key_folds_case_and_spacing() {
        assert_eq!(topic_key("  Electric   Cars "), "electric cars");
    }

    #[test]
    fn in_memory_roundtrip() {
        let c = InMemorySourceCache::new();
        assert!(c.get("ai").is_none());
        c.set("AI", &[item("a")]);
        assert_eq!(c.get(" ai ").unwrap(), vec![item("a")]);
    }

    #[test]
    fn file_cache_overwrites_and_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let c = FileSourceCache::new(dir.path());
        c.set("ai", &[item("a")]);
        c.set("ai", &[item("b"), item("c")]);

        let reopened = FileSourceCache::new(dir.path());
        assert_eq!(reopened.get("AI").unwrap(), vec![item("b"), item("c")]);
        assert!(reopened.get("other").is_none());
    }
}
