//! Combined geo + ASN resolution for one client.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::{AsnLookup, GeoLocation, GeoLookup, ResolveError, ResolverCache};
use crate::config::CacheConfig;

/// Resolved network identity of a client. Either part may be unknown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientIdentity {
    pub ip: IpAddr,
    pub geo: Option<GeoLocation>,
    pub asn: Option<u32>,
}

impl ClientIdentity {
    /// Identity with neither geo nor ASN signal.
    pub fn unresolved(ip: IpAddr) -> Self {
        Self {
            ip,
            geo: None,
            asn: None,
        }
    }
}

/// Runs the geo and ASN lookups for an address, optionally through caches.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    geo: Arc<dyn GeoLookup>,
    asn: Arc<dyn AsnLookup>,
    geo_cache: Option<ResolverCache<Option<GeoLocation>>>,
    asn_cache: Option<ResolverCache<Option<u32>>>,
}

impl IdentityResolver {
    pub fn new(geo: Arc<dyn GeoLookup>, asn: Arc<dyn AsnLookup>) -> Self {
        Self {
            geo,
            asn,
            geo_cache: None,
            asn_cache: None,
        }
    }

    /// Memoize lookups according to `config`. Disabled caches are a no-op.
    pub fn with_cache(mut self, config: &CacheConfig) -> Self {
        if config.enabled {
            let ttl = Duration::from_secs(config.ttl_secs);
            self.geo_cache = Some(ResolverCache::new("geoip", ttl, config.max_entries));
            self.asn_cache = Some(ResolverCache::new("asn", ttl, config.max_entries));
        }
        self
    }

    /// Drop expired cache entries. No-op without caches.
    pub fn purge_expired(&self) {
        if let Some(cache) = &self.geo_cache {
            cache.purge_expired();
        }
        if let Some(cache) = &self.asn_cache {
            cache.purge_expired();
        }
    }

    /// Resolve geo and ASN concurrently on the blocking pool.
    ///
    /// Dropping the returned future abandons the result; a lookup already
    /// running on the pool completes in the background.
    pub async fn resolve(&self, ip: IpAddr) -> Result<ClientIdentity, ResolveError> {
        let geo = self.geo.clone();
        let geo_cache = self.geo_cache.clone();
        let geo_task = tokio::task::spawn_blocking(move || match geo_cache {
            Some(cache) => cache.get_or_resolve(ip, |ip| geo.resolve_geo(ip)),
            None => geo.resolve_geo(ip),
        });

        let asn = self.asn.clone();
        let asn_cache = self.asn_cache.clone();
        let asn_task = tokio::task::spawn_blocking(move || match asn_cache {
            Some(cache) => cache.get_or_resolve(ip, |ip| asn.resolve_asn(ip)),
            None => asn.resolve_asn(ip),
        });

        let (geo, asn) = tokio::join!(geo_task, asn_task);
        let identity = ClientIdentity {
            ip,
            geo: geo??,
            asn: asn??,
        };

        tracing::debug!(
            client_ip = %ip,
            asn = ?identity.asn,
            country = ?identity.geo.as_ref().and_then(|g| g.country.as_deref()),
            "Client identity resolved"
        );
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::TableResolver;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct CountingGeo {
        calls: AtomicUsize,
    }

    impl GeoLookup for CountingGeo {
        fn resolve_geo(&self, _ip: IpAddr) -> Result<Option<GeoLocation>, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    #[derive(Debug)]
    struct BrokenAsn;

    impl AsnLookup for BrokenAsn {
        fn resolve_asn(&self, _ip: IpAddr) -> Result<Option<u32>, ResolveError> {
            Err(ResolveError::Unavailable("asn database closed".into()))
        }
    }

    #[tokio::test]
    async fn test_resolve_both() {
        let table = Arc::new(
            TableResolver::new()
                .with_geo("10.0.0.0/8".parse().unwrap(), 5.0, 6.0)
                .with_asn("10.0.0.0/8".parse().unwrap(), 1),
        );
        let resolver = IdentityResolver::new(table.clone(), table);

        let identity = resolver.resolve("10.1.2.3".parse().unwrap()).await.unwrap();
        assert_eq!(identity.asn, Some(1));
        assert_eq!(identity.geo.as_ref().map(|g| g.longitude), Some(6.0));

        let unknown = resolver.resolve("192.0.2.1".parse().unwrap()).await.unwrap();
        assert_eq!(unknown, ClientIdentity::unresolved("192.0.2.1".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_cache_skips_repeat_lookups() {
        let geo = Arc::new(CountingGeo::default());
        let resolver = IdentityResolver::new(geo.clone(), Arc::new(TableResolver::new()))
            .with_cache(&CacheConfig::default());

        let ip: IpAddr = "198.51.100.7".parse().unwrap();
        resolver.resolve(ip).await.unwrap();
        resolver.resolve(ip).await.unwrap();
        assert_eq!(geo.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disabled_cache_always_resolves() {
        let geo = Arc::new(CountingGeo::default());
        let config = CacheConfig {
            enabled: false,
            ..Default::default()
        };
        let resolver =
            IdentityResolver::new(geo.clone(), Arc::new(TableResolver::new())).with_cache(&config);

        let ip: IpAddr = "198.51.100.7".parse().unwrap();
        resolver.resolve(ip).await.unwrap();
        resolver.resolve(ip).await.unwrap();
        assert_eq!(geo.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_backing_store_error_propagates() {
        let resolver = IdentityResolver::new(Arc::new(TableResolver::new()), Arc::new(BrokenAsn));
        let err = resolver.resolve("10.0.0.1".parse().unwrap()).await.unwrap_err();
        assert!(matches!(err, ResolveError::Unavailable(_)));
    }
}
