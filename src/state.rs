//! Application state management
//!
//! Explicit, immutable application context constructed once at startup and
//! passed by reference into every component; no ambient globals. The
//! engine pool is the only piece that mutates after startup, behind its
//! own lock.

use std::sync::Arc;

use crate::config::Config;
use crate::engine::pool::EnginePool;
use crate::engine::EngineFactory;
use crate::locales::LocaleStore;
use crate::styles::StyleResolver;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    locales: LocaleStore,
    resolver: Box<dyn StyleResolver>,
    factory: Box<dyn EngineFactory>,
    pool: EnginePool,
}

impl AppState {
    /// Create a new application state; the engine pool is sized from the
    /// cache configuration.
    pub fn new(
        config: Config,
        locales: LocaleStore,
        resolver: Box<dyn StyleResolver>,
        factory: Box<dyn EngineFactory>,
    ) -> Self {
        let pool = EnginePool::new(config.cache.engine_cache_size, config.cache.clean_interval);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                locales,
                resolver,
                factory,
                pool,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the locale store
    pub fn locales(&self) -> &LocaleStore {
        &self.inner.locales
    }

    /// Get the style resolver
    pub fn resolver(&self) -> &dyn StyleResolver {
        self.inner.resolver.as_ref()
    }

    /// Get the engine factory
    pub fn factory(&self) -> &dyn EngineFactory {
        self.inner.factory.as_ref()
    }

    /// Get the engine pool
    pub fn pool(&self) -> &EnginePool {
        &self.inner.pool
    }
}
