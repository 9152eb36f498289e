//! Structured-store backends and key layout.

mod memory;
mod redis_store;

pub use self::memory::InMemoryStructuredStore;
pub use self::redis_store::{redact_url, RedisStructuredStore};

use matchday_core::marker_key;

/// Default prefix of every key the engine reads or writes in the store.
pub const DEFAULT_NAMESPACE: &str = "pgame:";

/// Maps domain keys (`finished:<date>`, `recommend`) to store keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreKeys {
    namespace: String,
}

impl StoreKeys {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// Key of the domain's JSON payload.
    pub fn data(&self, domain_key: &str) -> String {
        format!("{}{}", self.namespace, domain_key)
    }

    /// Key of the domain's version marker.
    pub fn marker(&self, domain_key: &str) -> String {
        format!("{}{}", self.namespace, marker_key(domain_key))
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl Default for StoreKeys {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}
