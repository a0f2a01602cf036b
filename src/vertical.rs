//! Vertical soil-column balancing
//!
//! Folds the step's infiltration and lateral net changes into each column,
//! spills anything above field capacity back onto the surface store, and
//! re-positions the water table. The spill moves water and solutes in the
//! same proportion, so column concentrations are unchanged by saturation
//! excess.

use crate::mesh::MeshIndex;
use crate::patch::Patch;
use crate::species::SpeciesLoad;
use rayon::prelude::*;

/// Balance every column over one coupling step.
///
/// `inf` and `lat` are the infiltration and lateral deltas produced by the
/// surface and subsurface routers for this step; `tot`, `sfc` and `waterz`
/// are updated in place.
pub(crate) fn sub_vertical(
    mesh: &MeshIndex,
    patches: &[Patch],
    verbose: bool,
    inf: &[SpeciesLoad],
    lat: &[SpeciesLoad],
    tot: &mut [SpeciesLoad],
    sfc: &mut [SpeciesLoad],
    waterz: &mut [f64],
) {
    tot.par_iter_mut()
        .zip(sfc.par_iter_mut())
        .zip(waterz.par_iter_mut())
        .enumerate()
        .for_each(|(i, ((tot_i, sfc_i), wz))| {
            *tot_i += inf[i] + lat[i];

            if tot_i.h2o > mesh.caph2o[i] {
                // Saturation excess: the over-capacity fraction of every
                // species moves to the surface; the table sits at grade.
                let frac = (tot_i.h2o - mesh.caph2o[i]) / tot_i.h2o;
                let moved = tot_i.scaled(frac);
                *sfc_i += moved;
                *tot_i = *tot_i - moved;
                *wz = patches[i].z;
            } else {
                let deficit = tot_i.h2o - mesh.caph2o[i];
                *wz = patches[i].z
                    - compute_z_final(
                        verbose,
                        mesh.por_0[i],
                        mesh.por_d[i],
                        mesh.dzsoil[i],
                        0.0,
                        deficit,
                    );
            }
        });
}

/// Water-table depth for a given water deficit, by inverting the
/// porosity-profile integral.
///
/// Porosity decays as `p_0 * exp(-z / p)`; values of `p` at or above 999.9
/// select a uniform profile. `delta_water` is the (non-positive) departure
/// from capacity; the return value is the depth below `z_initial` whose
/// cumulative pore volume equals that deficit. When the profile cannot hold
/// the deficit the depth saturates at `soil_depth`.
pub fn compute_z_final(
    verbose: bool,
    p_0: f64,
    p: f64,
    soil_depth: f64,
    z_initial: f64,
    delta_water: f64,
) -> f64 {
    let deficit = -delta_water;
    if deficit <= 0.0 || p_0 <= 0.0 {
        return z_initial;
    }

    if p >= 999.9 {
        return z_initial + deficit / p_0;
    }

    // Pore volume below z_initial: p_0 * p * (exp(-z_initial/p) - exp(-z/p)).
    let top = (-z_initial / p).exp();
    let capacity = p_0 * p * top;
    if deficit >= capacity {
        if verbose {
            eprintln!(
                "basinflow: water deficit {:.6} exceeds profile pore volume {:.6}; table pinned at depth {}",
                deficit, capacity, soil_depth
            );
        }
        return soil_depth;
    }
    -p * (top - deficit / (p_0 * p)).ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::DrainageEdge;
    use approx::assert_relative_eq;

    #[test]
    fn test_z_final_uniform_porosity() {
        // Uniform profile: depth is deficit over porosity.
        let z = compute_z_final(false, 0.5, 4000.0, 2.0, 0.0, -0.1);
        assert_relative_eq!(z, 0.2, max_relative = 1e-12);
        // No deficit leaves the table at the initial position.
        assert_eq!(compute_z_final(false, 0.5, 4000.0, 2.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn test_z_final_exponential_porosity() {
        // Deficit equal to the pore volume above depth 1 for p_0 = 0.5,
        // p = 1: V = 0.5 * (1 - e^-1).
        let deficit = 0.5 * (1.0 - (-1.0f64).exp());
        let z = compute_z_final(false, 0.5, 1.0, 2.0, 0.0, -deficit);
        assert_relative_eq!(z, 1.0, max_relative = 1e-12);
    }

    #[test]
    fn test_z_final_saturates_at_soil_depth() {
        // Deficit beyond the whole profile pins the table at soil depth.
        let z = compute_z_final(false, 0.5, 0.5, 2.0, 0.0, -10.0);
        assert_eq!(z, 2.0);
    }

    fn one_patch_setup(field_capacity: f64, sat_deficit: f64) -> (Vec<Patch>, MeshIndex) {
        let mut patch = Patch::new(0.0, 0.0, 5.0, 100.0);
        patch.field_capacity = field_capacity;
        patch.sat_deficit = sat_deficit;
        let patches = vec![patch];
        let mesh = MeshIndex::build(&patches, 1.0, false).unwrap();
        (patches, mesh)
    }

    #[test]
    fn test_saturation_excess_spills_to_surface() {
        // Column at 0.35, capacity 0.40, vertical input 0.10: the excess
        // 0.05 spills, carrying NO3 in proportion to its concentration.
        let (patches, mesh) = one_patch_setup(0.40, 0.05);
        let mut tot = vec![SpeciesLoad {
            h2o: 0.35,
            no3: 9.0e-3,
            ..SpeciesLoad::ZERO
        }];
        let inf = vec![SpeciesLoad {
            h2o: 0.06,
            ..SpeciesLoad::ZERO
        }];
        let lat = vec![SpeciesLoad {
            h2o: 0.04,
            ..SpeciesLoad::ZERO
        }];
        let mut sfc = vec![SpeciesLoad::ZERO];
        let mut waterz = vec![0.0];

        sub_vertical(
            &mesh, &patches, false, &inf, &lat, &mut tot, &mut sfc, &mut waterz,
        );

        assert_relative_eq!(sfc[0].h2o, 0.05, max_relative = 1e-12);
        assert_relative_eq!(tot[0].h2o, 0.40, max_relative = 1e-12);
        // NO3 moved = excess * concentration before the move.
        let expected_no3 = 0.05 * (9.0e-3 / 0.45);
        assert_relative_eq!(sfc[0].no3, expected_no3, max_relative = 1e-12);
        assert_relative_eq!(
            tot[0].no3 + sfc[0].no3,
            9.0e-3,
            max_relative = 1e-12
        );
        // Water table at grade.
        assert_eq!(waterz[0], patches[0].z);
    }

    #[test]
    fn test_below_capacity_lowers_water_table() {
        let (patches, mesh) = one_patch_setup(0.40, 0.10);
        let mut tot = vec![SpeciesLoad {
            h2o: 0.30,
            ..SpeciesLoad::ZERO
        }];
        let inf = vec![SpeciesLoad::ZERO];
        let lat = vec![SpeciesLoad::ZERO];
        let mut sfc = vec![SpeciesLoad::ZERO];
        let mut waterz = vec![patches[0].z];

        sub_vertical(
            &mesh, &patches, false, &inf, &lat, &mut tot, &mut sfc, &mut waterz,
        );

        // Deficit of 0.10 under default porosity decay (effectively
        // uniform at 0.5) puts the table 0.2 below grade.
        assert_relative_eq!(waterz[0], patches[0].z - 0.2, max_relative = 1e-9);
        assert_eq!(sfc[0], SpeciesLoad::ZERO);
    }

    #[test]
    fn test_exact_capacity_keeps_table_at_grade() {
        let (patches, mesh) = one_patch_setup(0.40, 0.0);
        let mut tot = vec![SpeciesLoad {
            h2o: 0.40,
            ..SpeciesLoad::ZERO
        }];
        let inf = vec![SpeciesLoad::ZERO];
        let lat = vec![SpeciesLoad::ZERO];
        let mut sfc = vec![SpeciesLoad::ZERO];
        let mut waterz = vec![0.0];

        sub_vertical(
            &mesh, &patches, false, &inf, &lat, &mut tot, &mut sfc, &mut waterz,
        );
        assert_eq!(waterz[0], patches[0].z);
    }

    #[test]
    fn test_lateral_loss_is_folded_in() {
        // A draining column: lateral loss deepens the deficit.
        let mut upper = Patch::new(0.0, 10.0, 5.0, 100.0);
        upper.field_capacity = 0.40;
        upper.subsurface_drainage.push(DrainageEdge {
            neighbor: 1,
            gamma: 1.0,
        });
        let lower = Patch::new(0.0, 0.0, 4.0, 100.0);
        let patches = vec![upper, lower];
        let mesh = MeshIndex::build(&patches, 1.0, false).unwrap();

        let mut tot = vec![
            SpeciesLoad {
                h2o: 0.40,
                ..SpeciesLoad::ZERO
            };
            2
        ];
        let inf = vec![SpeciesLoad::ZERO; 2];
        let lat = vec![
            SpeciesLoad {
                h2o: -0.05,
                ..SpeciesLoad::ZERO
            },
            SpeciesLoad {
                h2o: 0.05,
                ..SpeciesLoad::ZERO
            },
        ];
        let mut sfc = vec![SpeciesLoad::ZERO; 2];
        let mut waterz = vec![5.0, 4.0];

        sub_vertical(
            &mesh, &patches, false, &inf, &lat, &mut tot, &mut sfc, &mut waterz,
        );

        assert_relative_eq!(tot[0].h2o, 0.35, max_relative = 1e-12);
        assert!(waterz[0] < patches[0].z);
        // The receiving column went over capacity (default 0.3) and spilled.
        assert!(sfc[1].h2o > 0.0);
        assert_eq!(waterz[1], patches[1].z);
    }
}
