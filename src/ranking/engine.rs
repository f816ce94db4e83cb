//! Tiered mirror ordering.

use serde::Serialize;

use super::tier::{RankKey, Tier};
use crate::catalog::Mirror;
use crate::geo::ClientIdentity;

/// A mirror with the key it was placed by.
#[derive(Debug, Clone, Serialize)]
pub struct RankedMirror {
    pub tier: Tier,
    pub distance: f64,
    pub mirror: Mirror,
}

/// Order `mirrors` for `identity`, most preferred first.
///
/// Nothing is dropped. Ties keep catalog order.
pub fn rank(identity: &ClientIdentity, mirrors: Vec<Mirror>) -> Vec<Mirror> {
    rank_detailed(identity, mirrors)
        .into_iter()
        .map(|ranked| ranked.mirror)
        .collect()
}

/// Like [`rank`], keeping each mirror's tier and distance.
pub fn rank_detailed(identity: &ClientIdentity, mirrors: Vec<Mirror>) -> Vec<RankedMirror> {
    let mut keyed: Vec<(RankKey, Mirror)> = mirrors
        .into_iter()
        .map(|mirror| (RankKey::of(identity, &mirror), mirror))
        .collect();

    // `sort_by` is stable
    keyed.sort_by(|(a, _), (b, _)| a.compare(b));

    keyed
        .into_iter()
        .map(|(key, mirror)| {
            tracing::trace!(
                client_ip = %identity.ip,
                mirror = %mirror.name,
                tier = key.tier.as_str(),
                expired = key.is_expired,
                distance = key.distance,
                "Mirror placed"
            );
            RankedMirror {
                tier: key.tier,
                distance: key.distance,
                mirror,
            }
        })
        .collect()
}
