//! Stream-network routing seam
//!
//! Contract: scavenge the per-patch lateral water the subsurface router
//! assigned as stream inflow, apply baseflow and channel routing over the
//! coupling step, and deposit any unrouted overflow back onto the surface
//! store. Channel hydraulics live behind the [`StreamNetwork`] trait so a
//! Muskingum or kinematic-channel implementation can be injected without
//! affecting the other components.

use crate::mesh::MeshIndex;
use crate::species::SpeciesLoad;

/// Channel-routing component advanced once per coupling step.
pub trait StreamNetwork: Send + Sync {
    /// Advance channel state by `tstep` seconds.
    ///
    /// `lat` is the lateral-change vector the subsurface router produced
    /// for this step (stream scavenging removes from it); `sfc` is the
    /// surface store (unrouted overflow is returned to it).
    fn advance(&mut self, mesh: &MeshIndex, tstep: f64, lat: &mut [SpeciesLoad], sfc: &mut [SpeciesLoad]);
}

/// No channel network: nothing is scavenged and nothing overflows.
///
/// The subsurface router currently assigns no lateral water to streams, so
/// this implementation is exact, not an approximation.
#[derive(Debug, Default)]
pub struct NoChannel;

impl StreamNetwork for NoChannel {
    fn advance(
        &mut self,
        _mesh: &MeshIndex,
        _tstep: f64,
        _lat: &mut [SpeciesLoad],
        _sfc: &mut [SpeciesLoad],
    ) {
    }
}
