//! Tenant-keyed engine registry.
//!
//! One engine per tenant (a "room" in the hosting application), constructed
//! once at process start and passed by reference wherever it is needed —
//! an explicit registry instead of module-level cached singletons. Each
//! tenant persists under its own subdirectory of the base data directory.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use faceseek_core::{EngineConfig, Result};

use crate::engine::FaceSearchEngine;

/// Registry mapping an opaque tenant key to its engine.
pub struct EngineRegistry {
    base_config: EngineConfig,
    engines: RwLock<HashMap<String, Arc<FaceSearchEngine>>>,
}

impl EngineRegistry {
    /// Create a registry; each tenant's engine derives its configuration
    /// from `base_config`, with `data_dir` scoped to a per-tenant
    /// subdirectory.
    pub fn new(base_config: EngineConfig) -> Self {
        Self {
            base_config,
            engines: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch a tenant's engine if it has been opened.
    pub async fn get(&self, tenant: &str) -> Option<Arc<FaceSearchEngine>> {
        self.engines.read().await.get(tenant).cloned()
    }

    /// Fetch or open the engine for a tenant.
    ///
    /// The tenant key is opaque to the engine but doubles as the snapshot
    /// subdirectory name, so the hosting application must hand in keys that
    /// are valid path components.
    pub async fn get_or_create(&self, tenant: &str) -> Result<Arc<FaceSearchEngine>> {
        if let Some(engine) = self.get(tenant).await {
            return Ok(engine);
        }

        let mut engines = self.engines.write().await;
        // Racing callers may have opened it while we waited for the lock
        if let Some(engine) = engines.get(tenant) {
            return Ok(Arc::clone(engine));
        }

        let config = EngineConfig {
            data_dir: self
                .base_config
                .data_dir
                .as_ref()
                .map(|dir| dir.join(tenant)),
            ..self.base_config.clone()
        };
        log::info!("opening engine for tenant {tenant}");
        let engine = Arc::new(FaceSearchEngine::open(config)?);
        engines.insert(tenant.to_string(), Arc::clone(&engine));
        Ok(engine)
    }

    /// Drop a tenant's engine from the registry. Persisted snapshots stay
    /// on disk; the next `get_or_create` reopens from them.
    pub async fn evict(&self, tenant: &str) -> bool {
        self.engines.write().await.remove(tenant).is_some()
    }

    /// Currently opened tenant keys, sorted.
    pub async fn tenants(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.engines.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

// ============================================================================
// Tests
// ============================================================================
