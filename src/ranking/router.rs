//! Request-level entry point: text IP in, ranked mirrors out.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use super::engine::{self, RankedMirror};
use crate::catalog::{Mirror, MirrorCatalog};
use crate::error::MirrorError;
use crate::geo::{ClientIdentity, IdentityResolver};
use crate::observability::metrics;
use crate::resilience::timeouts::with_timeout;

/// Ranks the catalog for individual clients.
#[derive(Debug, Clone)]
pub struct MirrorRouter {
    catalog: MirrorCatalog,
    resolver: IdentityResolver,
    request_timeout: Duration,
}

impl MirrorRouter {
    pub fn new(catalog: MirrorCatalog, resolver: IdentityResolver, request_timeout: Duration) -> Self {
        Self {
            catalog,
            resolver,
            request_timeout,
        }
    }

    pub fn catalog(&self) -> &MirrorCatalog {
        &self.catalog
    }

    /// Every mirror, best first, for the client at `client_ip`.
    pub async fn rank_for(&self, client_ip: &str) -> Result<Vec<Mirror>, MirrorError> {
        let (_, ranked) = self.rank_detailed_for(client_ip).await?;
        Ok(ranked.into_iter().map(|r| r.mirror).collect())
    }

    /// Like [`rank_for`](Self::rank_for), also returning the resolved
    /// identity and each mirror's tier.
    pub async fn rank_detailed_for(
        &self,
        client_ip: &str,
    ) -> Result<(ClientIdentity, Vec<RankedMirror>), MirrorError> {
        let start = Instant::now();
        let result = self.rank_inner(client_ip).await;

        match &result {
            Ok((identity, ranked)) => {
                metrics::record_rank("ok", start);
                tracing::debug!(
                    client_ip = %identity.ip,
                    mirrors = ranked.len(),
                    first = ranked.first().map(|r| r.mirror.name.as_str()),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Mirrors ranked"
                );
            }
            Err(e) => {
                metrics::record_rank(e.outcome(), start);
                tracing::warn!(client_ip, error = %e, "Ranking failed");
            }
        }
        result
    }

    /// Resolve `client_ip` without ranking.
    pub async fn identify(&self, client_ip: &str) -> Result<ClientIdentity, MirrorError> {
        let ip = parse_client_ip(client_ip)?;
        with_timeout(self.request_timeout, async {
            self.resolver.resolve(ip).await.map_err(MirrorError::from)
        })
        .await
    }

    async fn rank_inner(
        &self,
        client_ip: &str,
    ) -> Result<(ClientIdentity, Vec<RankedMirror>), MirrorError> {
        let ip = parse_client_ip(client_ip)?;

        with_timeout(self.request_timeout, async {
            let (identity, mirrors) = tokio::try_join!(
                async { self.resolver.resolve(ip).await.map_err(MirrorError::from) },
                async { self.catalog.list_mirrors().await.map_err(MirrorError::from) },
            )?;
            let ranked = engine::rank_detailed(&identity, mirrors);
            Ok::<_, MirrorError>((identity, ranked))
        })
        .await
    }
}

/// Parse client address text. IPv4-mapped IPv6 addresses are treated as
/// their IPv4 form.
pub fn parse_client_ip(text: &str) -> Result<IpAddr, MirrorError> {
    text.trim()
        .parse::<IpAddr>()
        .map(|ip| ip.to_canonical())
        .map_err(|_| MirrorError::InvalidInput(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_client_ip() {
        assert_eq!(parse_client_ip(" 10.1.2.3 ").unwrap(), "10.1.2.3".parse::<IpAddr>().unwrap());
        assert_eq!(
            parse_client_ip("::ffff:10.1.2.3").unwrap(),
            "10.1.2.3".parse::<IpAddr>().unwrap()
        );
        assert!(parse_client_ip("2001:db8::1").unwrap().is_ipv6());
    }

    #[test]
    fn test_parse_client_ip_rejects_garbage() {
        for bad in ["", "not-an-ip", "10.1.2", "10.1.2.3.4", "10.1.2.3/8"] {
            assert!(
                matches!(parse_client_ip(bad), Err(MirrorError::InvalidInput(_))),
                "{bad:?} accepted"
            );
        }
    }
}
