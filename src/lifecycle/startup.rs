//! Startup orchestration.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use notify::RecommendedWatcher;
use thiserror::Error;
use tokio::task::JoinHandle;

use super::shutdown::Shutdown;
use crate::catalog::{CatalogError, MirrorCatalog};
use crate::config::RouterConfig;
use crate::geo::maxmind::MaxMindDatabase;
use crate::geo::watcher::DatabaseWatcher;
use crate::geo::{
    AsnLookup, GeoLookup, IdentityResolver, MaxMindAsnResolver, MaxMindGeoResolver, ResolveError,
};
use crate::observability::metrics;
use crate::ranking::MirrorRouter;

/// Fatal startup failures.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Failed to open mirror catalog: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Failed to open address database: {0}")]
    Resolver(#[from] ResolveError),

    #[error("Failed to watch address databases: {0}")]
    Watch(#[from] notify::Error),

    #[error("Invalid metrics address {0:?}")]
    MetricsAddress(String),
}

/// Handles opened once at startup and shared by every request.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub config: Arc<RouterConfig>,
    pub router: MirrorRouter,
    resolver: IdentityResolver,
    databases: Vec<Arc<MaxMindDatabase>>,
}

impl AppContext {
    /// Full server startup: metrics exporter, then [`open`](Self::open).
    pub async fn build(config: RouterConfig) -> Result<Self, StartupError> {
        if config.observability.metrics_enabled {
            let addr: SocketAddr = config
                .observability
                .metrics_address
                .parse()
                .map_err(|_| StartupError::MetricsAddress(config.observability.metrics_address.clone()))?;
            metrics::init_metrics(addr);
        }
        Self::open(config).await
    }

    /// Open catalog and MaxMind databases and wire the router.
    pub async fn open(config: RouterConfig) -> Result<Self, StartupError> {
        let catalog = MirrorCatalog::open(
            Path::new(&config.catalog.database_path),
            config.catalog.max_connections,
        )
        .await?;

        let geo = MaxMindGeoResolver::open(Path::new(&config.geoip.city_db_path))?;
        let asn = MaxMindAsnResolver::open(Path::new(&config.geoip.asn_db_path))?;
        let databases = vec![geo.database(), asn.database()];

        let mut context = Self::from_parts(config, catalog, Arc::new(geo), Arc::new(asn));
        context.databases = databases;
        Ok(context)
    }

    /// Wire a context from already-open components.
    pub fn from_parts(
        config: RouterConfig,
        catalog: MirrorCatalog,
        geo: Arc<dyn GeoLookup>,
        asn: Arc<dyn AsnLookup>,
    ) -> Self {
        let resolver = IdentityResolver::new(geo, asn).with_cache(&config.cache);
        let router = MirrorRouter::new(
            catalog,
            resolver.clone(),
            Duration::from_secs(config.timeouts.request_secs),
        );

        tracing::info!(
            cache_enabled = config.cache.enabled,
            cache_ttl_secs = config.cache.ttl_secs,
            request_timeout_secs = config.timeouts.request_secs,
            "Mirror router ready"
        );

        Self {
            config: Arc::new(config),
            router,
            resolver,
            databases: Vec::new(),
        }
    }

    pub fn catalog(&self) -> &MirrorCatalog {
        self.router.catalog()
    }

    /// Whether geo/ASN lookups are backed by MaxMind files.
    pub fn has_maxmind(&self) -> bool {
        !self.databases.is_empty()
    }

    /// Start reloading MaxMind files on change, if enabled. The watcher stops
    /// when the returned handle is dropped.
    pub fn watch_databases(&self) -> Result<Option<RecommendedWatcher>, StartupError> {
        if !self.config.geoip.watch || self.databases.is_empty() {
            return Ok(None);
        }
        let watcher = DatabaseWatcher::new(self.databases.clone()).run()?;
        Ok(Some(watcher))
    }

    /// Periodically drop expired resolver cache entries until shutdown.
    pub fn spawn_cache_janitor(&self, shutdown: &Shutdown) -> Option<JoinHandle<()>> {
        if !self.config.cache.enabled {
            return None;
        }
        let resolver = self.resolver.clone();
        let period = Duration::from_secs(self.config.cache.ttl_secs.max(1));
        let mut shutdown = shutdown.subscribe();

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        resolver.purge_expired();
                    }
                    _ = shutdown.recv() => {
                        tracing::debug!("Cache janitor received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        }))
    }
}
