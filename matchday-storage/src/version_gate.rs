//! Change detection against the structured store's version markers.
//!
//! Every refresh tick asks the gate before fetching a domain. The gate reads
//! the marker published at `<namespace><domain>:code`, compares it with the
//! last marker it saw, and answers whether the domain needs a fetch.

use std::sync::Arc;

use dashmap::DashMap;
use matchday_core::{StructuredStore, VersionMarker};
use tracing::{debug, warn};

use crate::store::StoreKeys;

/// Remembers the last observed marker per domain key.
pub struct VersionGate {
    store: Arc<dyn StructuredStore>,
    keys: StoreKeys,
    seen: DashMap<String, VersionMarker>,
}

impl VersionGate {
    pub fn new(store: Arc<dyn StructuredStore>, keys: StoreKeys) -> Self {
        Self {
            store,
            keys,
            seen: DashMap::new(),
        }
    }

    /// True when the domain's marker differs from the remembered one.
    ///
    /// The first observation of a domain is always a change, an absent marker
    /// included. A failed marker read answers `true` and leaves the remembered
    /// marker untouched so the next successful read still compares correctly.
    pub async fn changed(&self, domain_key: &str) -> bool {
        let marker_key = self.keys.marker(domain_key);
        let current = match self.store.get(&marker_key).await {
            Ok(Some(raw)) => VersionMarker::new(raw),
            Ok(None) => VersionMarker::absent(),
            Err(err) => {
                warn!(key = %domain_key, error = %err, "marker read failed, treating as changed");
                return true;
            }
        };

        let unchanged = self
            .seen
            .get(domain_key)
            .is_some_and(|remembered| *remembered == current);
        if unchanged {
            debug!(key = %domain_key, "marker unchanged");
            return false;
        }

        self.seen.insert(domain_key.to_string(), current);
        true
    }

    /// Drop the remembered marker so the next `changed` answers `true`.
    pub fn forget(&self, domain_key: &str) {
        self.seen.remove(domain_key);
    }

    pub fn remembered(&self, domain_key: &str) -> Option<VersionMarker> {
        self.seen.get(domain_key).map(|marker| marker.clone())
    }

    pub fn keys(&self) -> &StoreKeys {
        &self.keys
    }
}

impl std::fmt::Debug for VersionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionGate")
            .field("keys", &self.keys)
            .field("remembered", &self.seen.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStructuredStore;
    use async_trait::async_trait;
    use matchday_core::StoreError;

    struct UnreachableStore;

    #[async_trait]
    impl StructuredStore for UnreachableStore {
        async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Timeout {
                command: "GET".to_string(),
                key: key.to_string(),
            })
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Ok(())
        }

        async fn delete(&self, _keys: &[String]) -> Result<u64, StoreError> {
            Ok(0)
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Err(StoreError::Connection {
                reason: "unreachable".to_string(),
            })
        }
    }

    fn gate_over(store: Arc<InMemoryStructuredStore>) -> VersionGate {
        VersionGate::new(store, StoreKeys::default())
    }

    #[tokio::test]
    async fn test_unchanged_marker_suppresses_second_call() {
        let store = Arc::new(InMemoryStructuredStore::new());
        store.set("pgame:finished:2025-06-20:code", "17").await.unwrap();
        let gate = gate_over(store);

        assert!(gate.changed("finished:2025-06-20").await);
        assert!(!gate.changed("finished:2025-06-20").await);
    }

    #[tokio::test]
    async fn test_marker_change_triggers() {
        let store = Arc::new(InMemoryStructuredStore::new());
        store.set("pgame:recommend:code", "1").await.unwrap();
        let gate = gate_over(store.clone());

        assert!(gate.changed("recommend").await);
        store.set("pgame:recommend:code", "2").await.unwrap();
        assert!(gate.changed("recommend").await);
        assert_eq!(gate.remembered("recommend"), Some(VersionMarker::new("2")));
    }

    #[tokio::test]
    async fn test_absent_marker_is_observed_once() {
        let gate = gate_over(Arc::new(InMemoryStructuredStore::new()));
        assert!(gate.changed("finished:2025-06-20").await);
        assert!(!gate.changed("finished:2025-06-20").await);
        assert_eq!(
            gate.remembered("finished:2025-06-20"),
            Some(VersionMarker::absent())
        );
    }

    #[tokio::test]
    async fn test_forget_forces_next_change() {
        let gate = gate_over(Arc::new(InMemoryStructuredStore::new()));
        assert!(gate.changed("recommend").await);
        gate.forget("recommend");
        assert!(gate.changed("recommend").await);
    }

    #[tokio::test]
    async fn test_read_failure_counts_as_changed() {
        let gate = VersionGate::new(Arc::new(UnreachableStore), StoreKeys::default());
        assert!(gate.changed("recommend").await);
        assert!(gate.changed("recommend").await);
        assert!(gate.remembered("recommend").is_none());
    }
}
