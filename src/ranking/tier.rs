//! Locality predicates.
//!
//! Pure functions over a client identity and one mirror. Shared by the
//! ranking engine and anything else that needs to explain a placement.

use std::cmp::Ordering;
use std::net::IpAddr;

use serde::Serialize;
use tracing::warn;

use crate::catalog::Mirror;
use crate::geo::{ClientIdentity, GeoLocation};

/// Locality class of a mirror relative to a client. Lower is preferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Client address lies inside one of the mirror's subnets.
    Subnet = 0,
    /// Mirror sits in the client's autonomous system.
    Asn = 1,
    /// Everything else, ordered by distance.
    Geo = 2,
}

impl Tier {
    pub fn of(identity: &ClientIdentity, mirror: &Mirror) -> Self {
        if in_any_subnet(identity.ip, mirror) {
            Tier::Subnet
        } else if same_asn(identity.asn, mirror) {
            Tier::Asn
        } else {
            Tier::Geo
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Subnet => "subnet",
            Tier::Asn => "asn",
            Tier::Geo => "geo",
        }
    }
}

/// Whether `ip` is contained in any of the mirror's subnets.
///
/// A CIDR that fails to parse is skipped for this comparison. Address
/// families never cross: an IPv4 client cannot match an IPv6 block.
pub fn in_any_subnet(ip: IpAddr, mirror: &Mirror) -> bool {
    mirror.subnets.iter().any(|subnet| match subnet.network() {
        Ok(net) => net.contains(&ip),
        Err(e) => {
            warn!(mirror = %mirror.name, cidr = %subnet.cidr, error = %e, "Skipping malformed subnet");
            false
        }
    })
}

/// Parse stored ASN text: surrounding whitespace and an optional `AS`
/// prefix (any case) are ignored.
pub fn normalize_asn(text: &str) -> Option<u32> {
    let trimmed = text.trim();
    let digits = match trimmed.get(..2) {
        Some(prefix) if prefix.eq_ignore_ascii_case("as") => &trimmed[2..],
        _ => trimmed,
    };
    digits.trim().parse().ok()
}

/// Whether the mirror is registered in the client's ASN. Unknown on
/// either side never matches.
pub fn same_asn(client_asn: Option<u32>, mirror: &Mirror) -> bool {
    match (client_asn, mirror.asn.as_deref().and_then(normalize_asn)) {
        (Some(client), Some(registered)) => client == registered,
        _ => false,
    }
}

/// Manhattan distance in degrees, or 0 when the client has no position.
///
/// Longitude does not wrap at the antimeridian.
pub fn conditional_distance(client: Option<&GeoLocation>, mirror: &Mirror) -> f64 {
    match client {
        Some(geo) => (mirror.longitude - geo.longitude).abs() + (mirror.latitude - geo.latitude).abs(),
        None => 0.0,
    }
}

/// Composite ordering key of one mirror.
#[derive(Debug, Clone, Copy)]
pub struct RankKey {
    pub tier: Tier,
    pub is_expired: bool,
    pub distance: f64,
}

impl RankKey {
    pub fn of(identity: &ClientIdentity, mirror: &Mirror) -> Self {
        Self {
            tier: Tier::of(identity, mirror),
            is_expired: mirror.is_expired,
            distance: conditional_distance(identity.geo.as_ref(), mirror),
        }
    }

    pub fn compare(&self, other: &Self) -> Ordering {
        self.tier
            .cmp(&other.tier)
            .then(self.is_expired.cmp(&other.is_expired))
            .then(self.distance.total_cmp(&other.distance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Subnet;
    use chrono::NaiveDateTime;

    fn mirror(asn: Option<&str>, subnets: &[&str]) -> Mirror {
        Mirror {
            id: 1,
            name: "m".into(),
            continent: "Europe".into(),
            country: "DE".into(),
            ip: "192.0.2.10".into(),
            latitude: 50.0,
            longitude: 8.0,
            is_expired: false,
            update_frequency: NaiveDateTime::default(),
            sponsor_name: String::new(),
            sponsor_url: String::new(),
            email: "unknown".into(),
            asn: asn.map(String::from),
            subnets: subnets
                .iter()
                .enumerate()
                .map(|(i, cidr)| Subnet {
                    id: i as i64,
                    cidr: cidr.to_string(),
                })
                .collect(),
            urls: Vec::new(),
        }
    }

    #[test]
    fn test_normalize_asn() {
        assert_eq!(normalize_asn("64500"), Some(64500));
        assert_eq!(normalize_asn(" AS64500 "), Some(64500));
        assert_eq!(normalize_asn("as64500"), Some(64500));
        assert_eq!(normalize_asn("AS 64500"), Some(64500));
        assert_eq!(normalize_asn(""), None);
        assert_eq!(normalize_asn("AS"), None);
        assert_eq!(normalize_asn("unknown"), None);
        assert_eq!(normalize_asn("-1"), None);
    }

    #[test]
    fn test_same_asn_requires_both_sides() {
        assert!(same_asn(Some(64500), &mirror(Some("AS64500"), &[])));
        assert!(!same_asn(Some(64501), &mirror(Some("64500"), &[])));
        assert!(!same_asn(None, &mirror(Some("64500"), &[])));
        assert!(!same_asn(Some(64500), &mirror(None, &[])));
        assert!(!same_asn(Some(64500), &mirror(Some("garbage"), &[])));
    }

    #[test]
    fn test_subnet_containment() {
        let m = mirror(None, &["10.0.0.0/8", "2001:db8::/32"]);
        assert!(in_any_subnet("10.1.2.3".parse().unwrap(), &m));
        assert!(in_any_subnet("2001:db8::1".parse().unwrap(), &m));
        assert!(!in_any_subnet("11.0.0.1".parse().unwrap(), &m));
    }

    #[test]
    fn test_address_families_do_not_cross() {
        let v6_only = mirror(None, &["::/0"]);
        assert!(!in_any_subnet("10.1.2.3".parse().unwrap(), &v6_only));
        let v4_only = mirror(None, &["0.0.0.0/0"]);
        assert!(!in_any_subnet("2001:db8::1".parse().unwrap(), &v4_only));
    }

    #[test]
    fn test_malformed_subnet_is_skipped() {
        let m = mirror(None, &["not-a-cidr", "10.0.0.0/8"]);
        assert!(in_any_subnet("10.1.2.3".parse().unwrap(), &m));
        let broken = mirror(None, &["10.0.0.1/8"]);
        assert!(!in_any_subnet("10.1.2.3".parse().unwrap(), &broken));
    }

    #[test]
    fn test_conditional_distance() {
        let m = mirror(None, &[]);
        let client = GeoLocation {
            continent: None,
            country: None,
            latitude: 48.0,
            longitude: 11.0,
        };
        assert_eq!(conditional_distance(Some(&client), &m), 5.0);
        assert_eq!(conditional_distance(None, &m), 0.0);
    }

    #[test]
    fn test_subnet_beats_asn() {
        let identity = ClientIdentity {
            ip: "10.1.2.3".parse().unwrap(),
            geo: None,
            asn: Some(1),
        };
        assert_eq!(Tier::of(&identity, &mirror(Some("1"), &["10.0.0.0/8"])), Tier::Subnet);
        assert_eq!(Tier::of(&identity, &mirror(Some("1"), &[])), Tier::Asn);
        assert_eq!(Tier::of(&identity, &mirror(Some("2"), &[])), Tier::Geo);
    }
}
