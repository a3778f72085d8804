//! Scope-anchored payload retention.
//!
//! Packaged payloads stay alive for the duration of the caller's unit of work
//! (a crawl, a conversion, a request). Each unit opens a scope, payloads are
//! retained under it, and releasing the scope drops every payload at once.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::debug;

use crate::fetch::walker::FetchedBody;

/// Identifier for one unit of work's payload lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u64);

/// Keeps packaged payloads alive per scope.
#[derive(Debug, Default)]
pub struct PayloadArena {
    next: AtomicU64,
    retained: DashMap<u64, Vec<Arc<FetchedBody>>>,
}

impl PayloadArena {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a fresh scope.
    #[must_use]
    pub fn open_scope(&self) -> ScopeId {
        ScopeId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Retains `body` under `scope` until the scope is released.
    pub fn retain(&self, scope: ScopeId, body: Arc<FetchedBody>) {
        self.retained.entry(scope.0).or_default().push(body);
    }

    /// Drops every payload retained under `scope`.
    pub fn release(&self, scope: ScopeId) {
        if let Some((_, payloads)) = self.retained.remove(&scope.0) {
            debug!(scope = scope.0, count = payloads.len(), "scope released");
        }
    }

    /// Number of payloads currently retained under `scope`.
    #[must_use]
    pub fn retained_count(&self, scope: ScopeId) -> usize {
        self.retained
            .get(&scope.0)
            .map_or(0, |payloads| payloads.len())
    }
}
