//! In-process object store for tests and dry runs

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{ObjectSink, ObjectSource};

#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<RwLock<BTreeMap<(String, String), Bytes>>>,
    puts: Arc<RwLock<Vec<String>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every key written, in write order (retries included)
    pub fn put_log(&self) -> Vec<String> {
        self.puts.read().clone()
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.objects
            .read()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

#[async_trait]
impl ObjectSink for MemoryObjectStore {
    async fn put(&self, bucket: &str, key: &str, body: Bytes) -> Result<()> {
        self.objects
            .write()
            .insert((bucket.to_string(), key.to_string()), body);
        self.puts.write().push(key.to_string());
        Ok(())
    }
}

#[async_trait]
impl ObjectSource for MemoryObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes> {
        self.object(bucket, key)
            .ok_or_else(|| anyhow!("object not found: {}/{}", bucket, key))
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .objects
            .read()
            .keys()
            .filter(|(b, k)| b == bucket && k.starts_with(prefix))
            .map(|(_, k)| k.clone())
            .collect())
    }
}
