//! Fault-injecting backend wrapper for tests.
//!
//! [`FailingBackend`] delegates to an inner backend but fails every `put`
//! once a configured budget of successful writes is spent. Higher layers use
//! it to prove that a save interrupted at any write leaves no partial state
//! behind.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;

use mediakeep_types::{Result, StoreError};

use crate::BlobBackend;

/// Backend wrapper that injects a write failure after N successful puts.
pub struct FailingBackend<B> {
    inner: B,
    puts_remaining: AtomicI64,
}

impl<B> FailingBackend<B> {
    /// Allow `puts_before_failure` successful puts, then fail every put.
    pub fn new(inner: B, puts_before_failure: i64) -> Self {
        Self {
            inner,
            puts_remaining: AtomicI64::new(puts_before_failure),
        }
    }

    /// Reset the budget of successful puts.
    pub fn set_budget(&self, puts: i64) {
        self.puts_remaining.store(puts, Ordering::SeqCst);
    }

    /// Access the wrapped backend.
    pub fn inner(&self) -> &B {
        &self.inner
    }
}

#[async_trait]
impl<B: BlobBackend> BlobBackend for FailingBackend<B> {
    async fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        if self.puts_remaining.fetch_sub(1, Ordering::SeqCst) <= 0 {
            return Err(StoreError::WriteFailed(format!(
                "injected fault writing {}",
                key
            )));
        }
        self.inner.put(key, data).await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.inner.delete(key).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        self.inner.list(prefix).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.inner.exists(key).await
    }
}
