//! Surface (overland) kinematic routing with infiltration
//!
//! Explicit kinematic-wave advection of the surface stores on the surface
//! inflow matrix, with its own adaptive sub-stepping inside the coupling
//! step. Each internal iteration runs two passes:
//!
//! - a rate pass computing per-patch drainage rates from the head above
//!   detention, `vel = sfcknl * hh^(2/3)` (cells per second), with a
//!   max-reduction giving the Courant-stable internal step;
//! - an update pass applying net advection (own outflow, sources' inflow
//!   via the inflow fractions, canopy rates) and then Green-Ampt style
//!   infiltration into the soil column.
//!
//! Infiltrated water and solutes accumulate in `inf` for the vertical
//! balancer; surface solute concentrations are reduced in proportion to the
//! infiltrated water fraction.

use crate::mesh::MeshIndex;
use crate::patch::Patch;
use crate::router::{RouterConfig, EPSILON};
use crate::species::SpeciesLoad;
use rayon::prelude::*;

const TWOTHIRDS: f64 = 2.0 / 3.0;

/// Route the surface stores over one coupling step.
///
/// `out` is a caller-owned rate buffer reused across sub-steps. If nothing
/// flows anywhere the single internal step spans the whole coupling step
/// and only infiltration executes.
pub(crate) fn sfc_routing(
    mesh: &MeshIndex,
    patches: &[Patch],
    config: &RouterConfig,
    can: &[SpeciesLoad],
    sfc: &mut [SpeciesLoad],
    inf: &mut [SpeciesLoad],
    out: &mut [SpeciesLoad],
    tstep: f64,
) {
    inf.par_iter_mut().for_each(|f| *f = SpeciesLoad::ZERO);

    let tfinal = tstep - EPSILON;
    let mut t = 0.0;
    while t < tfinal {
        // Drainage rates, with the Courant reduction seeded so a static
        // field takes the whole remaining step.
        let cmax_floor = config.courant_max / tstep;
        let cmax = {
            let heads: &[SpeciesLoad] = sfc;
            out.par_iter_mut()
                .enumerate()
                .fold(
                    || cmax_floor,
                    |acc, (i, out_i)| {
                        let hh = heads[i].h2o - mesh.retdep[i];
                        if hh > 0.0 {
                            let vel = mesh.sfcknl[i] * hh.powf(TWOTHIRDS);
                            let div = hh / heads[i].h2o;
                            *out_i = SpeciesLoad {
                                h2o: vel * hh,
                                no3: vel * div * heads[i].no3,
                                nh4: vel * div * heads[i].nh4,
                                doc: vel * div * heads[i].doc,
                                don: vel * div * heads[i].don,
                            };
                            acc.max(vel)
                        } else {
                            *out_i = SpeciesLoad::ZERO;
                            acc
                        }
                    },
                )
                .reduce(|| cmax_floor, f64::max)
        };

        let dt = (config.courant_max / cmax).min(tstep - t);

        // Advect on the inflow matrix, then infiltrate. Sources' rates are
        // read-only here; each patch writes only its own stores.
        let rates: &[SpeciesLoad] = out;
        sfc.par_iter_mut()
            .zip(inf.par_iter_mut())
            .enumerate()
            .for_each(|(i, (sfc_i, inf_i))| {
                let mut sum = rates[i].scaled(-1.0);
                for m in 0..mesh.sfccnti[i] {
                    let k = mesh.sfcndxi[i][m];
                    sum += rates[k].scaled(mesh.sfcgam[i][m]);
                }
                sum += can[i];
                *sfc_i += sum.scaled(dt);

                infiltrate(mesh, patches, i, dt, sfc_i, inf_i);
            });

        t += dt;
    }
}

/// Green-Ampt style infiltration of one patch's surface store over `dt`.
///
/// Active only on unsaturated patches with a conducting surface. Before
/// ponding the intake is conductivity-limited; after the ponding time the
/// sorptivity term takes over, always capped by the available surface water
/// and scaled by the pervious fraction.
fn infiltrate(
    mesh: &MeshIndex,
    patches: &[Patch],
    i: usize,
    dt: f64,
    sfc_i: &mut SpeciesLoad,
    inf_i: &mut SpeciesLoad,
) {
    if mesh.rootzs[i] >= 1.0 || mesh.ksat_0[i] <= 0.0 || sfc_i.h2o <= 0.0 {
        return;
    }

    let z = patches[i].sat_deficit_z;

    // Depth-averaged conductivity and porosity over the unsaturated zone.
    let ksat = if mesh.mz_v[i] > 0.0 && z > 0.0 {
        mesh.mz_v[i] * mesh.ksat_0[i] * (1.0 - (-z / mesh.mz_v[i]).exp()) / z
    } else {
        mesh.ksat_0[i]
    };
    let poro = if mesh.por_d[i] < 999.9 && z > 0.0 {
        mesh.por_d[i] * mesh.por_0[i] * (1.0 - (-z / mesh.por_d[i]).exp()) / z
    } else {
        mesh.por_0[i]
    };

    // Moisture content from relative saturation; wetting-front suction and
    // sorptivity estimate.
    let theta = mesh.rootzs[i] * poro;
    let psi_f = 0.76 * mesh.psiair[i];
    let sorptivity = (2.0 * ksat * psi_f).sqrt();

    let intensity = sfc_i.h2o / dt;
    let ponding_time = if intensity > ksat {
        ksat * psi_f * (poro - theta) / (intensity * (intensity - ksat))
    } else {
        dt
    };

    // Pervious fraction limits intake either way.
    let delta = if dt <= ponding_time {
        mesh.ksatv[i] * sfc_i.h2o
    } else {
        let afac = ksat.powf(1.5) / 3.0;
        let d = sorptivity * (dt - ponding_time).sqrt() + afac + ponding_time * sfc_i.h2o;
        mesh.ksatv[i] * d.min(sfc_i.h2o)
    };

    let afrac = delta / sfc_i.h2o;
    inf_i.h2o += delta;
    sfc_i.h2o -= delta;
    inf_i.no3 += afrac * sfc_i.no3;
    sfc_i.no3 -= afrac * sfc_i.no3;
    inf_i.nh4 += afrac * sfc_i.nh4;
    sfc_i.nh4 -= afrac * sfc_i.nh4;
    inf_i.doc += afrac * sfc_i.doc;
    sfc_i.doc -= afrac * sfc_i.doc;
    inf_i.don += afrac * sfc_i.don;
    sfc_i.don -= afrac * sfc_i.don;
}
