//! `ImagePipeline` - the standard stage chain behind a coordinator.

use super::error::ServiceError;
use crate::cache::{CacheBudget, CacheStats, MemoryCache};
use crate::config::{ConfigFile, TransportConfig};
use crate::coordinator::{AssetCoordinator, CoordinatorConfig, CoordinatorStats, Subscription};
use crate::decode::{Decoder, ImageDecoder};
use crate::key::ResourceKey;
use crate::pipeline::{DecodeStage, FetchStage, MemoryCacheStage, WarmStage};
use crate::transport::{ReqwestTransport, Transport};
use crate::warm::{NoOpWarmer, Warmer};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// The standard chain: warm ◄ cache ◄ decode ◄ fetch.
pub type StandardStage<T, D, W> = WarmStage<MemoryCacheStage<DecodeStage<FetchStage<T>, D>>, W>;

/// Deduplicating, caching image fetcher.
///
/// `ImagePipeline::new` builds the production chain (reqwest transport,
/// `image` crate decoder, no warmer). [`with_stages`](Self::with_stages)
/// accepts any transport, decoder and warmer.
pub struct ImagePipeline<T = ReqwestTransport, D = ImageDecoder, W = NoOpWarmer>
where
    T: Transport,
    D: Decoder,
    D::Output: Clone,
    W: Warmer<D::Output>,
{
    coordinator: AssetCoordinator<StandardStage<T, D, W>>,
    cache: Arc<MemoryCache<D::Output>>,
}

impl ImagePipeline {
    /// Build the production pipeline from configuration.
    ///
    /// Call this outside any async context: the blocking HTTP client owns
    /// its own runtime.
    pub fn new(config: &ConfigFile) -> Result<Self, ServiceError> {
        let transport = ReqwestTransport::with_config(&transport_config(config))?;
        Ok(Self::with_stages(
            transport,
            config.decoder.clone(),
            NoOpWarmer,
            &config.cache,
            config.coordinator,
        ))
    }
}

/// Transport settings with the request timeout capped at the attempt
/// timeout, so an abandoned request ends within one attempt budget.
fn transport_config(config: &ConfigFile) -> TransportConfig {
    let budget = config.coordinator.attempt_timeout();
    if config.transport.request_timeout() <= budget {
        return config.transport.clone();
    }

    debug!(
        request_timeout_ms = config.transport.request_timeout().as_millis() as u64,
        attempt_timeout_ms = budget.as_millis() as u64,
        "Capping transport request timeout at attempt timeout"
    );
    config.transport.clone().with_request_timeout(budget)
}

impl<T, D, W> ImagePipeline<T, D, W>
where
    T: Transport,
    D: Decoder,
    D::Output: Clone,
    W: Warmer<D::Output>,
{
    /// Assemble the chain around caller-supplied collaborators.
    pub fn with_stages(
        transport: T,
        decoder: D,
        warmer: W,
        budget: &CacheBudget,
        coordinator_config: CoordinatorConfig,
    ) -> Self {
        let cache: Arc<MemoryCache<D::Output>> = Arc::new(
            MemoryCache::new(budget.max_bytes())
                .with_eviction_listener(|key, _| trace!(key = %key, "Evicted from memory cache")),
        );

        let stage = WarmStage::new(
            MemoryCacheStage::with_cache(
                DecodeStage::new(FetchStage::new(transport), decoder),
                Arc::clone(&cache),
            ),
            warmer,
        );

        info!(
            cache_budget = %budget,
            attempt_timeout_ms = coordinator_config.attempt_timeout().as_millis() as u64,
            max_attempts = coordinator_config.max_attempts(),
            "Image pipeline ready"
        );

        Self {
            coordinator: AssetCoordinator::new(stage, coordinator_config),
            cache,
        }
    }

    /// Subscribe to the image at `key`. Must be called within a Tokio runtime.
    pub fn fetch(&self, key: impl Into<ResourceKey>) -> Subscription<D::Output> {
        self.coordinator.fetch(key)
    }

    /// Evict `key` from the cache so the next fetch goes to the network.
    pub fn invalidate(&self, key: &ResourceKey) {
        self.coordinator.invalidate(key)
    }

    pub fn coordinator(&self) -> &AssetCoordinator<StandardStage<T, D, W>> {
        &self.coordinator
    }

    pub fn cache(&self) -> &Arc<MemoryCache<D::Output>> {
        &self.cache
    }

    pub fn coordinator_stats(&self) -> CoordinatorStats {
        self.coordinator.stats()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Log coordinator and cache statistics.
    pub fn log_stats(&self) {
        self.coordinator.log_stats();
        let stats = self.cache.stats();
        info!(
            hits = stats.hits,
            misses = stats.misses,
            evictions = stats.evictions,
            bypasses = stats.bypasses,
            entries = stats.entry_count,
            size_bytes = stats.size_bytes,
            hit_ratio = format!("{:.1}%", stats.hit_ratio() * 100.0),
            "Memory cache statistics"
        );
    }
}
