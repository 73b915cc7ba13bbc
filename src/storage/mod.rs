//! Object storage capability
//!
//! The pipeline only needs `put(bucket, key, body)` to persist pages and
//! facts, plus a read/list companion so stored pages can be consumed again.

pub mod local;
pub mod memory;

pub use local::LocalObjectStore;
pub use memory::MemoryObjectStore;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

#[async_trait]
pub trait ObjectSink: Send + Sync {
    /// Write `body` under `key`, replacing any previous object at that key.
    async fn put(&self, bucket: &str, key: &str, body: Bytes) -> Result<()>;
}

#[async_trait]
pub trait ObjectSource: Send + Sync {
    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes>;

    /// Keys under `prefix`, sorted lexicographically
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>>;
}
