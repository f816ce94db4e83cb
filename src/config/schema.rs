//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the mirror router.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouterConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Mirror catalog storage.
    pub catalog: CatalogConfig,

    /// MaxMind database locations.
    pub geoip: GeoIpConfig,

    /// Resolver cache settings.
    pub cache: CacheConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Ranked list presentation.
    pub ranking: RankingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Mirror catalog (SQLite) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Path to the SQLite database file.
    pub database_path: String,

    /// Connection pool size.
    pub max_connections: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            database_path: "/data/mirrors.db".to_string(),
            max_connections: 5,
        }
    }
}

/// MaxMind database configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GeoIpConfig {
    /// Path to the GeoIP2/GeoLite2 City database.
    pub city_db_path: String,

    /// Path to the GeoLite2 ASN database.
    pub asn_db_path: String,

    /// Reload databases when the files change on disk.
    pub watch: bool,
}

impl Default for GeoIpConfig {
    fn default() -> Self {
        Self {
            city_db_path: "geoip_db.mmdb".to_string(),
            asn_db_path: "asn_db.mmdb".to_string(),
            watch: true,
        }
    }
}

/// Resolver cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable memoization of geo/ASN lookups.
    pub enabled: bool,

    /// Time an entry stays valid, in seconds.
    pub ttl_secs: u64,

    /// Maximum number of entries per resolver before eviction.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 3600,
            max_entries: 50_000,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for a whole ranking request (resolve + catalog + rank), in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 10 }
    }
}

/// Presentation defaults for ranked lists.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Number of mirrors returned when the caller gives no limit.
    pub default_limit: usize,

    /// Protocols tried in order by the plain-text mirror list.
    pub default_protocols: Vec<String>,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            default_protocols: vec!["https".to_string(), "http".to_string()],
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
