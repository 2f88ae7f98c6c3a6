//! The source adapter seam and the registry of configured sources.
//!
//! Each provider implements [`SourceAdapter`] to turn one
//! [`AdapterRequest`] into provider-native [`RawRecord`]s. Adapters carry
//! their own configuration (credentials, endpoints, page limits) from
//! construction; the orchestrator never hands them shared mutable state.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::AdapterError;
use crate::types::{RawRecord, SourceKind};

/// Everything an adapter needs for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterRequest {
    /// Search text, already reduced to keywords where the planner found some.
    pub query: String,
    /// Instrument symbols from the query hints.
    pub symbols: Vec<String>,
    /// Maximum records the adapter should return. Always at least 1.
    pub top_k: usize,
    /// Budget the adapter should honour for its own network calls.
    pub timeout: Duration,
    /// Provider filters forwarded from the query hints.
    pub filters: BTreeMap<String, String>,
}

impl AdapterRequest {
    pub fn new(query: impl Into<String>, top_k: usize, timeout: Duration) -> Self {
        Self {
            query: query.into(),
            symbols: Vec::new(),
            top_k: top_k.max(1),
            timeout,
            filters: BTreeMap::new(),
        }
    }

    pub fn filter(&self, key: &str) -> Option<&str> {
        self.filters.get(key).map(String::as_str)
    }
}

/// A pluggable provider backend.
///
/// Implementations must be `Send + Sync`: the orchestrator moves each call
/// onto its own task. Failures are returned, never panicked; a panic is
/// still contained at the task boundary but reads as a transport error.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Which source this adapter serves.
    fn kind(&self) -> SourceKind;

    /// Fetch raw records for one request.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] for transport failures, missing
    /// credentials, unreadable responses, or an exhausted budget.
    async fn invoke(&self, request: &AdapterRequest) -> Result<Vec<RawRecord>, AdapterError>;
}

/// Configured adapters, in registration order.
///
/// Registration order is the order enabled sources are submitted to the
/// worker pool and the order they appear in payload metadata.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    adapters: Vec<Arc<dyn SourceAdapter>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter. A second adapter for the same source replaces
    /// the first in place.
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) -> &mut Self {
        let kind = adapter.kind();
        match self.adapters.iter_mut().find(|a| a.kind() == kind) {
            Some(slot) => *slot = adapter,
            None => self.adapters.push(adapter),
        }
        self
    }

    pub fn with(mut self, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn get(&self, kind: SourceKind) -> Option<&Arc<dyn SourceAdapter>> {
        self.adapters.iter().find(|a| a.kind() == kind)
    }

    pub fn kinds(&self) -> Vec<SourceKind> {
        self.adapters.iter().map(|a| a.kind()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn SourceAdapter>> {
        self.adapters.iter()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("sources", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Static(SourceKind, usize);

    #[async_trait]
    impl SourceAdapter for Static {
        fn kind(&self) -> SourceKind {
            self.0
        }

        async fn invoke(&self, _request: &AdapterRequest) -> Result<Vec<RawRecord>, AdapterError> {
            Ok((0..self.1)
                .map(|i| RawRecord::from_pairs(self.0, [("title", format!("r{i}").as_str())]))
                .collect())
        }
    }

    #[test]
    fn adapter_trait_object_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn SourceAdapter>();
        assert_send_sync::<SourceRegistry>();
    }

    #[test]
    fn top_k_is_at_least_one() {
        let req = AdapterRequest::new("q", 0, Duration::from_secs(1));
        assert_eq!(req.top_k, 1);
    }

    #[test]
    fn registry_keeps_registration_order() {
        let registry = SourceRegistry::new()
            .with(Arc::new(Static(SourceKind::Procurement, 0)))
            .with(Arc::new(Static(SourceKind::WebSearch, 0)));
        assert_eq!(
            registry.kinds(),
            [SourceKind::Procurement, SourceKind::WebSearch]
        );
    }

    #[tokio::test]
    async fn re_registering_replaces_in_place() {
        let registry = SourceRegistry::new()
            .with(Arc::new(Static(SourceKind::WebSearch, 1)))
            .with(Arc::new(Static(SourceKind::Quotes, 1)))
            .with(Arc::new(Static(SourceKind::WebSearch, 3)));
        assert_eq!(registry.len(), 2);
        let web = registry.get(SourceKind::WebSearch).expect("web registered");
        let records = web
            .invoke(&AdapterRequest::new("q", 5, Duration::from_secs(1)))
            .await
            .expect("static adapter");
        assert_eq!(records.len(), 3);
    }
}
