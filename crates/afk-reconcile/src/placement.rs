//! Restore destination for a returning client.
//!
//! Three tiers, over the children of the configured sibling group:
//! 1. the origin channel, if it is a sibling and still occupied;
//! 2. otherwise the most occupied sibling (first in server order on ties);
//! 3. if every sibling is empty, a uniformly random sibling.
//!
//! Restoring someone into a channel their group has left is pointless; this
//! approximates "rejoin wherever your friends are now".

use afk_schemas::{ChannelId, ChannelOccupancy};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::warn;

use crate::Connector;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlacementResolver {
    sibling_group: ChannelId,
}

impl PlacementResolver {
    pub fn new(sibling_group: ChannelId) -> Self {
        Self { sibling_group }
    }

    pub fn sibling_group(&self) -> ChannelId {
        self.sibling_group
    }

    /// Query the sibling group and pick a destination for a client whose
    /// recorded origin is `origin`.
    ///
    /// Falls back to `origin` when the group cannot be listed or has no
    /// children; the restore is still worth attempting.
    pub fn resolve_destination<C, R>(&self, connector: &C, origin: ChannelId, rng: &mut R) -> ChannelId
    where
        C: Connector + ?Sized,
        R: Rng + ?Sized,
    {
        match connector.list_channels(self.sibling_group) {
            Ok(siblings) => choose_destination(origin, &siblings, rng).unwrap_or(origin),
            Err(e) => {
                warn!(
                    sibling_group = %self.sibling_group,
                    origin = %origin,
                    error = %e,
                    "sibling listing failed; restoring to origin"
                );
                origin
            }
        }
    }
}

/// Pure placement decision. `None` only when `siblings` is empty.
pub fn choose_destination<R: Rng + ?Sized>(
    origin: ChannelId,
    siblings: &[ChannelOccupancy],
    rng: &mut R,
) -> Option<ChannelId> {
    if siblings
        .iter()
        .any(|s| s.id == origin && s.occupancy > 0)
    {
        return Some(origin);
    }

    // Strict `>` keeps the first sibling among equals.
    let mut fullest: Option<&ChannelOccupancy> = None;
    for s in siblings {
        if fullest.map_or(true, |f| s.occupancy > f.occupancy) {
            fullest = Some(s);
        }
    }

    match fullest {
        Some(f) if f.occupancy > 0 => Some(f.id),
        Some(_) => siblings.choose(rng).map(|s| s.id),
        None => None,
    }
}
