//! Canopy routing seam
//!
//! The canopy component produces per-patch *rates* of water and solutes
//! reaching the surface (per second, not per step); the surface router
//! integrates them over its internal sub-steps. Canopy physics live behind
//! the [`CanopySource`] trait so interception and throughfall models can be
//! injected without touching the routing core.

use crate::mesh::MeshIndex;
use crate::species::SpeciesLoad;
use rayon::prelude::*;

/// Producer of per-patch surface-input rates.
///
/// Implementations fill `can` with rates in units per second. The driver
/// calls this once per coupling step, before surface routing; the rates are
/// held constant over that step.
pub trait CanopySource: Send + Sync {
    /// Fill `can[i]` with the rate of water and solutes reaching the
    /// surface of patch `i` over the next `tstep` seconds.
    fn rates(&mut self, mesh: &MeshIndex, tstep: f64, can: &mut [SpeciesLoad]);
}

/// No canopy: every rate is zero.
#[derive(Debug, Default)]
pub struct NoCanopy;

impl CanopySource for NoCanopy {
    fn rates(&mut self, _mesh: &MeshIndex, _tstep: f64, can: &mut [SpeciesLoad]) {
        can.par_iter_mut().for_each(|c| *c = SpeciesLoad::ZERO);
    }
}

/// Spatially uniform throughfall at a fixed rate.
///
/// The simplest non-trivial source: the same per-second load lands on every
/// patch. Useful for forcing tests and for steady-rain experiments.
#[derive(Debug, Clone)]
pub struct UniformThroughfall {
    /// Rate reaching every patch surface (per second)
    pub rate: SpeciesLoad,
}

impl CanopySource for UniformThroughfall {
    fn rates(&mut self, _mesh: &MeshIndex, _tstep: f64, can: &mut [SpeciesLoad]) {
        let rate = self.rate;
        can.par_iter_mut().for_each(|c| *c = rate);
    }
}
