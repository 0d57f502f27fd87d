// SPDX-License-Identifier: MIT

//! Key-value memory collaborator.
//!
//! Nodes may persist one state field after they complete via a `memory`
//! block. The store is namespaced so independent workflows can share one
//! backend without colliding.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::MemoryError;

#[async_trait]
pub trait Memory: Send + Sync {
    async fn read(&self, namespace: &str, key: &str) -> Result<Option<Value>, MemoryError>;
    async fn write(&self, namespace: &str, key: &str, value: Value) -> Result<(), MemoryError>;
}

/// Process-local store, the default when no external backend is wired in.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    entries: Arc<RwLock<HashMap<(String, String), Value>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Memory for InMemoryStore {
    async fn read(&self, namespace: &str, key: &str) -> Result<Option<Value>, MemoryError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(&(namespace.to_string(), key.to_string()))
            .cloned())
    }

    async fn write(&self, namespace: &str, key: &str, value: Value) -> Result<(), MemoryError> {
        let mut entries = self.entries.write().await;
        entries.insert((namespace.to_string(), key.to_string()), value);
        Ok(())
    }
}
