//! Source Registry (C2, §4.2, §9 "polymorphism over sources"): enumerates
//! registered external-record sources and mediates selection by capability
//! and runtime availability. "Available" and "configured" are deliberately
//! distinct — a registered source that is down reports `is_available() ==
//! false` without being removed from the registry.

use super::adapter::{Capability, SourceAdapter};
use std::sync::Arc;

/// Holds every source the engine was constructed with. Construction order
/// is preserved so adapters that are tried "first" (e.g. a preferred civil
/// index) stay first.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<Arc<dyn SourceAdapter>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    pub fn register(&mut self, source: Arc<dyn SourceAdapter>) -> &mut Self {
        self.sources.push(source);
        self
    }

    pub fn all(&self) -> &[Arc<dyn SourceAdapter>] {
        &self.sources
    }

    pub fn by_name(&self, name: &str) -> Option<Arc<dyn SourceAdapter>> {
        self.sources.iter().find(|s| s.name() == name).cloned()
    }

    /// Sources exposing `cap`, regardless of current availability. Use this
    /// to decide whether a pipeline step is even attemptable (§4.10 degraded
    /// modes key off capability presence, not live availability).
    pub fn with_capability(&self, cap: Capability) -> Vec<Arc<dyn SourceAdapter>> {
        self.sources
            .iter()
            .filter(|s| s.has_capability(cap))
            .cloned()
            .collect()
    }

    /// Sources exposing `cap` that are currently reachable. Checks run
    /// concurrently since `is_available` is typically a cheap health probe.
    pub async fn available_with_capability(&self, cap: Capability) -> Vec<Arc<dyn SourceAdapter>> {
        let candidates = self.with_capability(cap);
        let checks = futures::future::join_all(
            candidates.iter().map(|s| async { s.is_available().await }),
        )
        .await;
        candidates
            .into_iter()
            .zip(checks)
            .filter_map(|(s, ok)| ok.then_some(s))
            .collect()
    }

    /// The first available source with `cap`, if any — the common case of
    /// "give me a primary index to search".
    pub async fn first_available_with_capability(
        &self,
        cap: Capability,
    ) -> Option<Arc<dyn SourceAdapter>> {
        self.available_with_capability(cap).await.into_iter().next()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::adapter::*;
    use crate::sources::mock::MockAdapterBuilder;

    #[tokio::test]
    async fn filters_by_capability_and_availability() {
        let mut registry = SourceRegistry::new();
        registry.register(Arc::new(
            MockAdapterBuilder::new("civil").with_capability(Capability::SearchPrimary).build(),
        ));
        registry.register(Arc::new(
            MockAdapterBuilder::new("tree")
                .with_capability(Capability::TreeTraversal)
                .with_capability(Capability::PersonSearch)
                .build(),
        ));

        assert_eq!(registry.with_capability(Capability::SearchPrimary).len(), 1);
        assert_eq!(
            registry
                .available_with_capability(Capability::TreeTraversal)
                .await
                .len(),
            1
        );
        assert!(registry
            .first_available_with_capability(Capability::Confirmation)
            .await
            .is_none());
    }
}
