//! Filesystem-backed object store
//!
//! Objects live at `<root>/<bucket>/<key>`. Writes go to a temp file first and
//! are renamed into place, so a reader never sees a half-written page.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

use super::{ObjectSink, ObjectSource};

/// In-flight writes end in this extension and are hidden from `list`
const PARTIAL_EXT: &str = "partial";

fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{}.{}.{}", name, Uuid::new_v4(), PARTIAL_EXT))
}

#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        let bucket_path = Path::new(bucket);
        let key_path = Path::new(key);
        for part in bucket_path.components().chain(key_path.components()) {
            if !matches!(part, Component::Normal(_)) {
                bail!("invalid object path {}/{}", bucket, key);
            }
        }
        if bucket.is_empty() || key.is_empty() {
            bail!("bucket and key must be non-empty");
        }
        Ok(self.root.join(bucket_path).join(key_path))
    }
}

#[async_trait]
impl ObjectSink for LocalObjectStore {
    async fn put(&self, bucket: &str, key: &str, body: Bytes) -> Result<()> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }

        let tmp = partial_path(&path);
        tokio::fs::write(&tmp, &body)
            .await
            .with_context(|| format!("Failed to write {:?}", tmp))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("Failed to move {:?} into place", path))?;

        debug!(bucket, key, bytes = body.len(), "object written");
        Ok(())
    }
}

#[async_trait]
impl ObjectSource for LocalObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let path = self.object_path(bucket, key)?;
        let data = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read object {}/{}", bucket, key))?;
        Ok(Bytes::from(data))
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let bucket_root = self.root.join(bucket);
        if !tokio::fs::try_exists(&bucket_root).await.unwrap_or(false) {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        let mut pending = vec![bucket_root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .with_context(|| format!("Failed to list {:?}", dir))?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                if path.extension().is_some_and(|ext| ext == PARTIAL_EXT) {
                    continue;
                }
                let Ok(rel) = path.strip_prefix(&bucket_root) else {
                    continue;
                };
                let key = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_put_get_roundtrip_on_disk() {
        let dir = tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());

        store
            .put("9dt", "players/0.json", Bytes::from("{\"id\":1}"))
            .await
            .unwrap();

        assert!(dir.path().join("9dt/players/0.json").exists());
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("9dt/players"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("0.json")]);
        let body = store.get("9dt", "players/0.json").await.unwrap();
        assert_eq!(body, Bytes::from("{\"id\":1}"));
    }

    #[tokio::test]
    async fn test_list_sorted_with_prefix() {
        let dir = tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        for key in ["players/1.json", "players/0.json", "games_f/games.json"] {
            store.put("9dt", key, Bytes::from("x")).await.unwrap();
        }

        let keys = store.list("9dt", "players/").await.unwrap();
        assert_eq!(keys, vec!["players/0.json", "players/1.json"]);
        assert!(store.list("missing", "").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let dir = tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        assert!(store.put("9dt", "../evil", Bytes::new()).await.is_err());
        assert!(store.put("9dt", "/abs", Bytes::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_sibling_keys_and_tmp_suffixed_keys() {
        let dir = tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        store.put("9dt", "games_f/x.json", Bytes::from("json")).await.unwrap();
        store.put("9dt", "games_f/x.csv", Bytes::from("csv")).await.unwrap();
        store.put("9dt", "games_f/x.tmp", Bytes::from("tmp")).await.unwrap();

        assert_eq!(store.get("9dt", "games_f/x.json").await.unwrap(), Bytes::from("json"));
        assert_eq!(store.get("9dt", "games_f/x.csv").await.unwrap(), Bytes::from("csv"));
        let keys = store.list("9dt", "games_f/").await.unwrap();
        assert_eq!(keys, vec!["games_f/x.csv", "games_f/x.json", "games_f/x.tmp"]);
    }

    #[tokio::test]
    async fn test_list_skips_in_flight_writes() {
        let dir = tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        store.put("9dt", "players/0.json", Bytes::from("x")).await.unwrap();

        let target = dir.path().join("9dt/players/1.json");
        std::fs::write(partial_path(&target), "half").unwrap();

        let keys = store.list("9dt", "players/").await.unwrap();
        assert_eq!(keys, vec!["players/0.json"]);
    }
}
