//! Routing driver
//!
//! Owns the mesh index and the working state vectors, both allocated once
//! per basin lifetime, and advances patch state over external time steps.
//! Each external step copies patch state into the working vectors, runs the
//! coupling loop (subsurface, canopy, surface, stream, vertical, in that
//! order, over adaptive sub-intervals summing to the external step), and
//! copies the results back onto the patches.

use crate::canopy::{CanopySource, NoCanopy};
use crate::error::RoutingError;
use crate::mesh::MeshIndex;
use crate::species::SpeciesLoad;
use crate::stream::{NoChannel, StreamNetwork};
use crate::{subsurface, surface, vertical, Basin};
use rayon::prelude::*;
use serde::Serialize;

/// Default cap on the hydro-coupling time step (s)
pub const CPLMAX: f64 = 1800.0;
/// Default Courant-number target for the explicit routers
pub const COUMAX: f64 = 0.2;
/// Round-off tolerance on time comparisons (s)
pub const EPSILON: f64 = 1.0e-5;

/// Driver configuration
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Emit diagnostics for degenerate geometry and pinned water tables
    pub verbose: bool,
    /// Scale applied to each patch's terrain-roughness spread
    pub std_scale: f64,
    /// Cap on the coupling step chosen by the subsurface router (s)
    pub coupling_step_max: f64,
    /// Courant-number target for the subsurface and surface routers
    pub courant_max: f64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            std_scale: 1.0,
            coupling_step_max: CPLMAX,
            courant_max: COUMAX,
        }
    }
}

/// What one external step did
#[derive(Debug, Clone, Serialize)]
pub struct RouteSummary {
    /// Number of coupling sub-steps taken
    pub substeps: usize,
    /// Time actually routed; matches the external step to within
    /// [`EPSILON`]
    pub routed_time: f64,
}

/// Routing context: mesh index, working state, and the injected canopy and
/// stream components.
pub struct HydroRouter {
    config: RouterConfig,
    mesh: MeshIndex,
    canopy: Box<dyn CanopySource>,
    stream: Box<dyn StreamNetwork>,

    /// Surface stores (detention water + surface solutes)
    sfc: Vec<SpeciesLoad>,
    /// Soil-column totals
    tot: Vec<SpeciesLoad>,
    /// Infiltration accumulated over a coupling step
    inf: Vec<SpeciesLoad>,
    /// Net lateral change over a coupling step
    lat: Vec<SpeciesLoad>,
    /// Canopy rates for a coupling step
    can: Vec<SpeciesLoad>,
    /// Water-table elevations
    waterz: Vec<f64>,
    /// Surface-router rate buffer, reused across sub-steps
    sfcout: Vec<SpeciesLoad>,
}

impl HydroRouter {
    /// Build a router for a basin with no canopy input and no channel
    /// network.
    pub fn new(config: RouterConfig, basin: &Basin) -> Result<Self, RoutingError> {
        Self::with_components(config, basin, Box::new(NoCanopy), Box::new(NoChannel))
    }

    /// Build a router with injected canopy and stream components.
    ///
    /// Validates the basin and constructs the mesh index; both happen once
    /// per basin lifetime.
    pub fn with_components(
        config: RouterConfig,
        basin: &Basin,
        canopy: Box<dyn CanopySource>,
        stream: Box<dyn StreamNetwork>,
    ) -> Result<Self, RoutingError> {
        basin.validate()?;
        let mesh = MeshIndex::build(&basin.patches, config.std_scale, config.verbose)?;
        let n = basin.patches.len();
        Ok(Self {
            config,
            mesh,
            canopy,
            stream,
            sfc: vec![SpeciesLoad::ZERO; n],
            tot: vec![SpeciesLoad::ZERO; n],
            inf: vec![SpeciesLoad::ZERO; n],
            lat: vec![SpeciesLoad::ZERO; n],
            can: vec![SpeciesLoad::ZERO; n],
            waterz: vec![0.0; n],
            sfcout: vec![SpeciesLoad::ZERO; n],
        })
    }

    /// The mesh index built for this basin
    pub fn mesh(&self) -> &MeshIndex {
        &self.mesh
    }

    /// Advance patch state by one external time step of `ext_step` seconds.
    pub fn route(
        &mut self,
        basin: &mut Basin,
        ext_step: f64,
    ) -> Result<RouteSummary, RoutingError> {
        if basin.patches.len() != self.mesh.num_patches() {
            return Err(RoutingError::PatchCountMismatch {
                built: self.mesh.num_patches(),
                given: basin.patches.len(),
            });
        }

        // Patch state into working vectors.
        self.sfc
            .par_iter_mut()
            .zip(self.tot.par_iter_mut())
            .zip(self.waterz.par_iter_mut())
            .zip(basin.patches.par_iter())
            .for_each(|(((sfc, tot), wz), p)| {
                *sfc = SpeciesLoad {
                    h2o: p.detention_store,
                    no3: p.surface_no3,
                    nh4: p.surface_nh4,
                    doc: p.surface_doc,
                    don: p.surface_don,
                };
                *tot = SpeciesLoad {
                    h2o: p.field_capacity - p.sat_deficit,
                    no3: p.soil_ns.nitrate,
                    nh4: p.soil_ns.sminn,
                    doc: p.soil_cs.doc,
                    don: p.soil_ns.don,
                };
                *wz = p.z - p.sat_deficit_z.max(0.0);
            });

        // Coupling loop: the subsurface router picks each sub-interval;
        // every component then advances by it in lock-step.
        let mut summary = RouteSummary {
            substeps: 0,
            routed_time: 0.0,
        };
        let mut t = ext_step;
        while t > EPSILON {
            let substep = subsurface::sub_routing(
                &self.mesh,
                &basin.patches,
                &self.config,
                &self.waterz,
                &self.tot,
                &mut self.lat,
                t,
            );

            self.canopy.rates(&self.mesh, substep, &mut self.can);

            surface::sfc_routing(
                &self.mesh,
                &basin.patches,
                &self.config,
                &self.can,
                &mut self.sfc,
                &mut self.inf,
                &mut self.sfcout,
                substep,
            );

            self.stream
                .advance(&self.mesh, substep, &mut self.lat, &mut self.sfc);

            vertical::sub_vertical(
                &self.mesh,
                &basin.patches,
                self.config.verbose,
                &self.inf,
                &self.lat,
                &mut self.tot,
                &mut self.sfc,
                &mut self.waterz,
            );

            t -= substep;
            summary.substeps += 1;
            summary.routed_time += substep;
        }

        // Working vectors back onto the patches.
        let sfc = &self.sfc;
        let tot = &self.tot;
        let waterz = &self.waterz;
        basin.patches.par_iter_mut().enumerate().for_each(|(i, p)| {
            p.detention_store = sfc[i].h2o;
            p.surface_no3 = sfc[i].no3;
            p.surface_nh4 = sfc[i].nh4;
            p.surface_doc = sfc[i].doc;
            p.surface_don = sfc[i].don;

            p.sat_deficit_z = p.z - waterz[i];
            p.sat_deficit = p.field_capacity - tot[i].h2o;
            p.soil_ns.nitrate = tot[i].no3;
            p.soil_ns.sminn = tot[i].nh4;
            p.soil_ns.don = tot[i].don;
            p.soil_cs.doc = tot[i].doc;
        });

        Ok(summary)
    }
}
