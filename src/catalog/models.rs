//! Mirror catalog model definitions.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use super::{CatalogError, CatalogResult};

/// A CIDR block a mirror is preferred for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    pub id: i64,
    pub cidr: String,
}

impl Subnet {
    /// Parse the stored CIDR text.
    pub fn network(&self) -> CatalogResult<IpNet> {
        parse_cidr(&self.cidr)
    }
}

/// Parse CIDR text, requiring the host bits beyond the prefix to be zero.
pub fn parse_cidr(text: &str) -> CatalogResult<IpNet> {
    let net: IpNet = text
        .trim()
        .parse()
        .map_err(|_| CatalogError::InvalidSubnet(text.to_string()))?;
    if net.trunc() != net {
        return Err(CatalogError::InvalidSubnet(text.to_string()));
    }
    Ok(net)
}

/// A labeled endpoint of a mirror.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Url {
    pub id: i64,
    /// Protocol label ("http", "https", "rsync", ...). Free-form.
    pub protocol: String,
    pub endpoint: String,
}

/// A replica server as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mirror {
    pub id: i64,
    pub name: String,
    pub continent: String,
    pub country: String,
    pub ip: String,
    pub latitude: f64,
    pub longitude: f64,
    pub is_expired: bool,
    /// Only the hour of day is consumed downstream.
    pub update_frequency: NaiveDateTime,
    pub sponsor_name: String,
    pub sponsor_url: String,
    pub email: String,
    /// Autonomous system number recorded at registration; `None` = unknown.
    pub asn: Option<String>,
    pub subnets: Vec<Subnet>,
    pub urls: Vec<Url>,
}

impl Mirror {
    /// Two-digit hour string of `update_frequency`.
    pub fn update_hour(&self) -> String {
        self.update_frequency.format("%H").to_string()
    }

    /// Protocol → endpoint map. A repeated protocol keeps the last endpoint.
    pub fn urls_by_protocol(&self) -> BTreeMap<String, String> {
        self.urls
            .iter()
            .map(|u| (u.protocol.clone(), u.endpoint.clone()))
            .collect()
    }

    /// First endpoint registered for `protocol`.
    pub fn url_for(&self, protocol: &str) -> Option<&str> {
        self.urls
            .iter()
            .find(|u| u.protocol == protocol)
            .map(|u| u.endpoint.as_str())
    }

    /// Serializable projection handed to the response layer.
    pub fn view(&self) -> MirrorView {
        MirrorView {
            name: self.name.clone(),
            continent: self.continent.clone(),
            country: self.country.clone(),
            ip: self.ip.clone(),
            location: Location {
                lat: self.latitude,
                lon: self.longitude,
            },
            is_expired: self.is_expired,
            update_frequency: self.update_hour(),
            sponsor_name: self.sponsor_name.clone(),
            sponsor_url: self.sponsor_url.clone(),
            email: self.email.clone(),
            urls: self.urls_by_protocol(),
        }
    }
}

/// Geographic position in a projection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

/// Mirror projection exposed to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorView {
    pub name: String,
    pub continent: String,
    pub country: String,
    pub ip: String,
    pub location: Location,
    pub is_expired: bool,
    pub update_frequency: String,
    pub sponsor_name: String,
    pub sponsor_url: String,
    pub email: String,
    pub urls: BTreeMap<String, String>,
}

/// Input for registering (or replacing) a mirror.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMirror {
    pub name: String,
    pub continent: String,
    pub country: String,
    pub ip: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub is_expired: bool,
    pub update_frequency: NaiveDateTime,
    pub sponsor_name: String,
    pub sponsor_url: String,
    /// Stored as "unknown" when absent.
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub asn: Option<String>,
    #[serde(default)]
    pub subnets: Vec<String>,
    /// (protocol, endpoint) pairs.
    #[serde(default)]
    pub urls: Vec<(String, String)>,
}

impl NewMirror {
    /// Check the catalog invariants before anything is written.
    pub fn validate(&self) -> CatalogResult<()> {
        if self.name.trim().is_empty() {
            return Err(CatalogError::MissingField("name"));
        }
        if !(-90.0..=90.0).contains(&self.latitude) || !(-180.0..=180.0).contains(&self.longitude)
        {
            return Err(CatalogError::InvalidCoordinates {
                name: self.name.clone(),
                latitude: self.latitude,
                longitude: self.longitude,
            });
        }
        for cidr in &self.subnets {
            parse_cidr(cidr)?;
        }
        for (protocol, endpoint) in &self.urls {
            if protocol.trim().is_empty() {
                return Err(CatalogError::MissingField("urls.protocol"));
            }
            if url::Url::parse(endpoint).is_err() {
                return Err(CatalogError::InvalidUrl {
                    protocol: protocol.clone(),
                    endpoint: endpoint.clone(),
                });
            }
        }
        Ok(())
    }
}
