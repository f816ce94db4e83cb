//! MaxMind database readers.
//!
//! Readers sit behind an `ArcSwap` so a reload replaces the whole database
//! while in-flight lookups finish against the old one.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use maxminddb::{geoip2, MaxMindDBError, Reader};
use tracing::{debug, info};

use super::{AsnLookup, GeoLocation, GeoLookup, ResolveError};

/// A MaxMind database file that can be reloaded in place.
pub struct MaxMindDatabase {
    kind: &'static str,
    path: PathBuf,
    reader: ArcSwap<Reader<Vec<u8>>>,
}

impl MaxMindDatabase {
    /// Open the database at `path`.
    pub fn open(kind: &'static str, path: &Path) -> Result<Self, ResolveError> {
        let reader = read(kind, path)?;
        info!(
            kind,
            path = %path.display(),
            database_type = %reader.metadata.database_type,
            build_epoch = reader.metadata.build_epoch,
            "MaxMind database loaded"
        );
        Ok(Self {
            kind,
            path: path.to_path_buf(),
            reader: ArcSwap::from_pointee(reader),
        })
    }

    /// Path the database was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the file and swap it in. On error the current reader stays.
    pub fn reload(&self) -> Result<(), ResolveError> {
        let reader = read(self.kind, &self.path)?;
        let build_epoch = reader.metadata.build_epoch;
        self.reader.store(Arc::new(reader));
        info!(kind = self.kind, path = %self.path.display(), build_epoch, "MaxMind database reloaded");
        Ok(())
    }

    /// Current reader. Lookups borrow from the returned guard.
    fn reader(&self) -> arc_swap::Guard<Arc<Reader<Vec<u8>>>> {
        self.reader.load()
    }

    /// Map "address not found" to `None`, everything else to an error.
    fn found<T>(&self, ip: IpAddr, result: Result<T, MaxMindDBError>) -> Result<Option<T>, ResolveError> {
        match result {
            Ok(record) => Ok(Some(record)),
            Err(MaxMindDBError::AddressNotFoundError(_)) => {
                debug!(kind = self.kind, %ip, "Address not in database");
                Ok(None)
            }
            Err(source) => Err(ResolveError::Lookup {
                kind: self.kind,
                source,
            }),
        }
    }
}

impl std::fmt::Debug for MaxMindDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaxMindDatabase")
            .field("kind", &self.kind)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

fn read(kind: &'static str, path: &Path) -> Result<Reader<Vec<u8>>, ResolveError> {
    Reader::open_readfile(path).map_err(|source| ResolveError::Open {
        kind,
        path: path.display().to_string(),
        source,
    })
}

/// City database lookups.
#[derive(Debug, Clone)]
pub struct MaxMindGeoResolver {
    db: Arc<MaxMindDatabase>,
}

impl MaxMindGeoResolver {
    pub fn open(path: &Path) -> Result<Self, ResolveError> {
        Ok(Self {
            db: Arc::new(MaxMindDatabase::open("geoip", path)?),
        })
    }

    /// Underlying database, for reloads.
    pub fn database(&self) -> Arc<MaxMindDatabase> {
        self.db.clone()
    }
}

impl GeoLookup for MaxMindGeoResolver {
    fn resolve_geo(&self, ip: IpAddr) -> Result<Option<GeoLocation>, ResolveError> {
        let reader = self.db.reader();
        let Some(city) = self.db.found(ip, reader.lookup::<geoip2::City>(ip))? else {
            return Ok(None);
        };

        // A record without coordinates carries no usable position.
        let Some(location) = city.location else {
            return Ok(None);
        };
        let (Some(latitude), Some(longitude)) = (location.latitude, location.longitude) else {
            return Ok(None);
        };

        Ok(Some(GeoLocation {
            continent: city.continent.and_then(|c| english_name(c.names)),
            country: city.country.and_then(|c| english_name(c.names)),
            latitude,
            longitude,
        }))
    }
}

/// ASN database lookups.
#[derive(Debug, Clone)]
pub struct MaxMindAsnResolver {
    db: Arc<MaxMindDatabase>,
}

impl MaxMindAsnResolver {
    pub fn open(path: &Path) -> Result<Self, ResolveError> {
        Ok(Self {
            db: Arc::new(MaxMindDatabase::open("asn", path)?),
        })
    }

    /// Underlying database, for reloads.
    pub fn database(&self) -> Arc<MaxMindDatabase> {
        self.db.clone()
    }
}

impl AsnLookup for MaxMindAsnResolver {
    fn resolve_asn(&self, ip: IpAddr) -> Result<Option<u32>, ResolveError> {
        let reader = self.db.reader();
        let asn = self.db.found(ip, reader.lookup::<geoip2::Asn>(ip))?;
        Ok(asn.and_then(|record| record.autonomous_system_number))
    }
}

fn english_name(names: Option<std::collections::BTreeMap<&str, &str>>) -> Option<String> {
    names.and_then(|n| n.get("en").map(|s| s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_file() {
        let err = MaxMindGeoResolver::open(Path::new("/nonexistent/geo.mmdb")).unwrap_err();
        assert!(matches!(err, ResolveError::Open { kind: "geoip", .. }));
        assert!(err.to_string().contains("/nonexistent/geo.mmdb"));
    }

    #[test]
    fn test_english_name() {
        let names = [("de", "Deutschland"), ("en", "Germany")].into_iter().collect();
        assert_eq!(english_name(Some(names)), Some("Germany".to_string()));
        assert_eq!(english_name(None), None);
    }
}
