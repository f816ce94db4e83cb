//! Fixed prefix table resolver.
//!
//! Answers geo and ASN lookups from an in-memory list of CIDR blocks. Used
//! in tests and for setups that pin a handful of networks without a MaxMind
//! subscription. First matching entry wins.

use std::net::IpAddr;

use ipnet::IpNet;

use super::{AsnLookup, GeoLocation, GeoLookup, ResolveError};

#[derive(Debug, Clone)]
struct TableEntry {
    network: IpNet,
    geo: Option<GeoLocation>,
    asn: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct TableResolver {
    entries: Vec<TableEntry>,
}

impl TableResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `network` to a position.
    pub fn with_geo(mut self, network: IpNet, latitude: f64, longitude: f64) -> Self {
        self.entries.push(TableEntry {
            network,
            geo: Some(GeoLocation {
                continent: None,
                country: None,
                latitude,
                longitude,
            }),
            asn: None,
        });
        self
    }

    /// Map `network` to an autonomous system.
    pub fn with_asn(mut self, network: IpNet, asn: u32) -> Self {
        self.entries.push(TableEntry {
            network,
            geo: None,
            asn: Some(asn),
        });
        self
    }
}

impl GeoLookup for TableResolver {
    fn resolve_geo(&self, ip: IpAddr) -> Result<Option<GeoLocation>, ResolveError> {
        Ok(self
            .entries
            .iter()
            .filter(|e| e.network.contains(&ip))
            .find_map(|e| e.geo.clone()))
    }
}

impl AsnLookup for TableResolver {
    fn resolve_asn(&self, ip: IpAddr) -> Result<Option<u32>, ResolveError> {
        Ok(self
            .entries
            .iter()
            .filter(|e| e.network.contains(&ip))
            .find_map(|e| e.asn))
    }
}
