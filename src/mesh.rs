//! Time-independent mesh index
//!
//! Materializes the patch list into dense per-patch columns and inverts the
//! two outflow drainage tables into *inflow* tables. The inflow tables are
//! what makes the routing passes safe to parallelize: every patch reads its
//! neighbors' rates and writes only its own state, so there is a single
//! point of update per patch. Letting a source patch push updates into its
//! downhill neighbors would race whenever two sources share a receiver.
//!
//! Built once per basin lifetime; nothing in it depends on time step or
//! state.

use crate::error::RoutingError;
use crate::patch::Patch;
use rayon::prelude::*;

/// Fixed row stride of the neighbor tables. Multiple of 4 for alignment;
/// each inflow row holds at most `MAXNEIGHBOR - 1` sources.
pub const MAXNEIGHBOR: usize = 16;

/// Interface factor applied on diagonal exchanges
const DIAGF: f64 = 0.5 * std::f64::consts::FRAC_1_SQRT_2;

/// Neighbor-table row of indices
pub type NeighborRow = [usize; MAXNEIGHBOR];
/// Neighbor-table row of weights or distances
pub type WeightRow = [f64; MAXNEIGHBOR];

/// Dense per-patch columns and drainage matrices derived from a basin.
///
/// Column units follow the patch fields they are derived from; `sfcknl` is
/// the time-independent prefactor of the kinematic-wave velocity,
/// `sqrt(tan(slope)) / (mann_n * sqrt(area))`, in cells per second per
/// head^(2/3).
#[derive(Debug, Clone)]
pub struct MeshIndex {
    num_patches: usize,

    /// Total basin area (m²)
    pub basin_area: f64,

    /// Cell size, `sqrt(area)` (m)
    pub psize: Vec<f64>,
    /// Terrain-roughness spread, `std_scale * std` (m)
    pub pscale: Vec<f64>,
    /// Detention depth below which no overland flow occurs (m)
    pub retdep: Vec<f64>,
    /// Relative saturation governing infiltration (root zone if resolved)
    pub rootzs: Vec<f64>,
    /// Pervious fraction limiting vertical infiltration
    pub ksatv: Vec<f64>,
    /// Surface saturated vertical conductivity (m/s)
    pub ksat_0: Vec<f64>,
    /// Conductivity-decay e-folding depth (m)
    pub mz_v: Vec<f64>,
    /// Surface porosity
    pub por_0: Vec<f64>,
    /// Porosity-decay e-folding depth (m)
    pub por_d: Vec<f64>,
    /// Air-entry potential magnitude (m of suction)
    pub psiair: Vec<f64>,
    /// Soil depth (m)
    pub zsoil: Vec<f64>,
    /// Soil discretization interval (m)
    pub dzsoil: Vec<f64>,
    /// Number of soil intervals
    pub nsoil: Vec<usize>,
    /// Mineral-N depth-decay rate (1/m)
    pub ndecay: Vec<f64>,
    /// Dissolved-organic-matter depth-decay rate (1/m)
    pub ddecay: Vec<f64>,
    /// Column water content at field capacity (vertical m)
    pub caph2o: Vec<f64>,
    /// Kinematic-wave velocity prefactor
    pub sfcknl: Vec<f64>,

    /// Surface inflow counts
    pub sfccnti: Vec<usize>,
    /// Surface inflow source indices
    pub sfcndxi: Vec<NeighborRow>,
    /// Surface inflow fractions, `gamma(S,R) * area(S) / area(R)`
    pub sfcgam: Vec<WeightRow>,

    /// Subsurface outflow counts
    pub subcnto: Vec<usize>,
    /// Subsurface outflow target indices
    pub subndxo: Vec<NeighborRow>,
    /// Center-to-center distance to each outflow target (m)
    pub subdist: Vec<WeightRow>,
    /// Interface factor per outflow edge (area-ratio weighted)
    pub perimf: Vec<WeightRow>,

    /// Subsurface inflow counts
    pub subcnti: Vec<usize>,
    /// Subsurface inflow source indices
    pub subndxi: Vec<NeighborRow>,
    /// Matching outflow-edge slot on each inflow source
    pub subedgi: Vec<NeighborRow>,
}

/// Per-patch values computed independently in the parallel phase
struct PatchDerived {
    psize: f64,
    pscale: f64,
    retdep: f64,
    rootzs: f64,
    ksatv: f64,
    ksat_0: f64,
    mz_v: f64,
    por_0: f64,
    por_d: f64,
    psiair: f64,
    zsoil: f64,
    dzsoil: f64,
    nsoil: usize,
    ndecay: f64,
    ddecay: f64,
    caph2o: f64,
    sfcknl: f64,
    /// Normalized, area-weighted surface outflow fractions
    dfrac: WeightRow,
    subdist: WeightRow,
    perimf: WeightRow,
    subndxo: NeighborRow,
    subcnto: usize,
}

impl MeshIndex {
    /// Build the index from a validated patch list.
    ///
    /// Phase A derives the per-patch columns and outflow geometry in
    /// parallel; phase B serially inverts the outflow tables into inflow
    /// tables. Fails with [`RoutingError::MeshOverflow`] when any inflow
    /// row would exceed its fixed capacity.
    pub fn build(patches: &[Patch], std_scale: f64, verbose: bool) -> Result<Self, RoutingError> {
        let n = patches.len();

        let basin_area: f64 = patches.par_iter().map(|p| p.area).sum();

        let derived: Vec<PatchDerived> = patches
            .par_iter()
            .map(|patch| derive_patch(patch, patches, std_scale, verbose))
            .collect();

        let mut mesh = MeshIndex {
            num_patches: n,
            basin_area,
            psize: Vec::with_capacity(n),
            pscale: Vec::with_capacity(n),
            retdep: Vec::with_capacity(n),
            rootzs: Vec::with_capacity(n),
            ksatv: Vec::with_capacity(n),
            ksat_0: Vec::with_capacity(n),
            mz_v: Vec::with_capacity(n),
            por_0: Vec::with_capacity(n),
            por_d: Vec::with_capacity(n),
            psiair: Vec::with_capacity(n),
            zsoil: Vec::with_capacity(n),
            dzsoil: Vec::with_capacity(n),
            nsoil: Vec::with_capacity(n),
            ndecay: Vec::with_capacity(n),
            ddecay: Vec::with_capacity(n),
            caph2o: Vec::with_capacity(n),
            sfcknl: Vec::with_capacity(n),
            sfccnti: vec![0; n],
            sfcndxi: vec![[0; MAXNEIGHBOR]; n],
            sfcgam: vec![[0.0; MAXNEIGHBOR]; n],
            subcnto: Vec::with_capacity(n),
            subndxo: Vec::with_capacity(n),
            subdist: Vec::with_capacity(n),
            perimf: Vec::with_capacity(n),
            subcnti: vec![0; n],
            subndxi: vec![[0; MAXNEIGHBOR]; n],
            subedgi: vec![[0; MAXNEIGHBOR]; n],
        };

        for d in &derived {
            mesh.psize.push(d.psize);
            mesh.pscale.push(d.pscale);
            mesh.retdep.push(d.retdep);
            mesh.rootzs.push(d.rootzs);
            mesh.ksatv.push(d.ksatv);
            mesh.ksat_0.push(d.ksat_0);
            mesh.mz_v.push(d.mz_v);
            mesh.por_0.push(d.por_0);
            mesh.por_d.push(d.por_d);
            mesh.psiair.push(d.psiair);
            mesh.zsoil.push(d.zsoil);
            mesh.dzsoil.push(d.dzsoil);
            mesh.nsoil.push(d.nsoil);
            mesh.ndecay.push(d.ndecay);
            mesh.ddecay.push(d.ddecay);
            mesh.caph2o.push(d.caph2o);
            mesh.sfcknl.push(d.sfcknl);
            mesh.subcnto.push(d.subcnto);
            mesh.subndxo.push(d.subndxo);
            mesh.subdist.push(d.subdist);
            mesh.perimf.push(d.perimf);
        }

        // Serial phase: invert the surface-routing table. Each outflow edge
        // i -> k becomes an inflow entry (source = i) on k.
        for (i, patch) in patches.iter().enumerate() {
            if patch.surface_drainage.len() > MAXNEIGHBOR
                || patch.subsurface_drainage.len() > MAXNEIGHBOR
            {
                return Err(RoutingError::MeshOverflow {
                    patch: i,
                    max: MAXNEIGHBOR,
                });
            }

            for (j, edge) in patch.surface_drainage.iter().enumerate() {
                let k = edge.neighbor;
                let m = mesh.sfccnti[k];
                if m >= MAXNEIGHBOR - 1 {
                    return Err(RoutingError::MeshOverflow {
                        patch: k,
                        max: MAXNEIGHBOR - 1,
                    });
                }
                mesh.sfcndxi[k][m] = i;
                mesh.sfcgam[k][m] = derived[i].dfrac[j];
                mesh.sfccnti[k] = m + 1;
            }

            // Symmetric inversion of the subsurface table, remembering which
            // outflow slot on the source each inflow entry mirrors.
            for j in 0..mesh.subcnto[i] {
                let k = mesh.subndxo[i][j];
                let m = mesh.subcnti[k];
                if m >= MAXNEIGHBOR - 1 {
                    return Err(RoutingError::MeshOverflow {
                        patch: k,
                        max: MAXNEIGHBOR - 1,
                    });
                }
                mesh.subndxi[k][m] = i;
                mesh.subedgi[k][m] = j;
                mesh.subcnti[k] = m + 1;
            }
        }

        Ok(mesh)
    }

    /// Number of patches the index was built for
    pub fn num_patches(&self) -> usize {
        self.num_patches
    }
}

fn derive_patch(patch: &Patch, patches: &[Patch], std_scale: f64, verbose: bool) -> PatchDerived {
    let psize = patch.area.sqrt();

    // Kinematic prefactor; flat or rough-less cells simply never flow.
    let knl_denom = patch.mann_n * psize;
    let sfcknl = if knl_denom > 0.0 {
        patch.slope_max.tan().sqrt() / knl_denom
    } else {
        if verbose {
            eprintln!(
                "basinflow: patch at ({}, {}) has degenerate roughness geometry; treated as no outflow",
                patch.x, patch.y
            );
        }
        0.0
    };

    // Normalized, area-weighted surface outflow fractions.
    let mut dfrac = [0.0; MAXNEIGHBOR];
    let gsum: f64 = patch.surface_drainage.iter().map(|e| e.gamma).sum();
    if gsum > 0.0 {
        for (j, edge) in patch.surface_drainage.iter().enumerate().take(MAXNEIGHBOR) {
            let neigh = &patches[edge.neighbor];
            dfrac[j] = (edge.gamma / gsum) * patch.area / neigh.area;
        }
    } else if verbose && !patch.surface_drainage.is_empty() {
        eprintln!(
            "basinflow: patch at ({}, {}) has zero total surface gamma; treated as no outflow",
            patch.x, patch.y
        );
    }

    // Subsurface outflow geometry: distances and interface factors.
    let mut subdist = [0.0; MAXNEIGHBOR];
    let mut perimf = [0.0; MAXNEIGHBOR];
    let mut subndxo = [0; MAXNEIGHBOR];
    let subcnto = patch.subsurface_drainage.len().min(MAXNEIGHBOR);
    for (j, edge) in patch
        .subsurface_drainage
        .iter()
        .enumerate()
        .take(MAXNEIGHBOR)
    {
        let neigh = &patches[edge.neighbor];
        let dx = neigh.x - patch.x;
        let dy = neigh.y - patch.y;
        let dist = (dx * dx + dy * dy).sqrt();
        subdist[j] = dist;
        subndxo[j] = edge.neighbor;
        perimf[j] = if dx.abs() + dy.abs() < 1.1 * dist {
            DIAGF * patch.area / neigh.area
        } else {
            0.5 * patch.area / neigh.area
        };
    }

    PatchDerived {
        psize,
        pscale: std_scale * patch.std,
        retdep: patch.soil.detention_store_size,
        rootzs: if patch.rootzone.depth > 0.0 {
            patch.rootzone.s
        } else {
            patch.s
        },
        ksatv: patch.ksat_vertical,
        ksat_0: patch.soil.ksat_0_v,
        mz_v: patch.soil.mz_v,
        por_0: patch.soil.porosity_0,
        por_d: patch.soil.porosity_decay,
        // Stored as magnitude: input data records the potential as suction,
        // sometimes signed; the sorptivity root needs it non-negative.
        psiair: patch.soil.psi_air_entry.abs(),
        zsoil: patch.soil.soil_depth,
        dzsoil: patch.soil.interval_size,
        nsoil: patch.num_soil_intervals,
        ndecay: patch.soil.n_decay_rate,
        ddecay: patch.soil.dom_decay_rate,
        caph2o: patch.field_capacity,
        sfcknl,
        dfrac,
        subdist,
        perimf,
        subndxo,
        subcnto,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::DrainageEdge;
    use approx::assert_relative_eq;

    fn two_cell_basin() -> Vec<Patch> {
        let mut upper = Patch::new(0.0, 10.0, 1.0, 100.0);
        let mut lower = Patch::new(0.0, 0.0, 0.0, 100.0);
        upper.slope_max = 0.01;
        lower.slope_max = 0.01;
        upper.surface_drainage.push(DrainageEdge {
            neighbor: 1,
            gamma: 1.0,
        });
        upper.subsurface_drainage.push(DrainageEdge {
            neighbor: 1,
            gamma: 1.0,
        });
        vec![upper, lower]
    }

    #[test]
    fn test_columns_and_prefactor() {
        let patches = two_cell_basin();
        let mesh = MeshIndex::build(&patches, 1.0, false).unwrap();

        assert_eq!(mesh.num_patches(), 2);
        assert_eq!(mesh.basin_area, 200.0);
        assert_eq!(mesh.psize[0], 10.0);
        let expected = (0.01f64.tan()).sqrt() / (0.03 * 10.0);
        assert_relative_eq!(mesh.sfcknl[0], expected, max_relative = 1e-12);
    }

    #[test]
    fn test_surface_inversion_weights() {
        let patches = two_cell_basin();
        let mesh = MeshIndex::build(&patches, 1.0, false).unwrap();

        // Single edge upper -> lower, equal areas: inflow fraction is 1.
        assert_eq!(mesh.sfccnti[0], 0);
        assert_eq!(mesh.sfccnti[1], 1);
        assert_eq!(mesh.sfcndxi[1][0], 0);
        assert_relative_eq!(mesh.sfcgam[1][0], 1.0, max_relative = 1e-12);
    }

    #[test]
    fn test_subsurface_inversion_symmetry() {
        let patches = two_cell_basin();
        let mesh = MeshIndex::build(&patches, 1.0, false).unwrap();

        // Every inflow entry mirrors an existing outflow edge.
        for i in 0..mesh.num_patches() {
            for m in 0..mesh.subcnti[i] {
                let src = mesh.subndxi[i][m];
                let slot = mesh.subedgi[i][m];
                assert!(slot < mesh.subcnto[src]);
                assert_eq!(mesh.subndxo[src][slot], i);
            }
        }
        assert_eq!(mesh.subcnti[1], 1);
        assert_eq!(mesh.subndxi[1][0], 0);
        assert_eq!(mesh.subedgi[1][0], 0);
    }

    #[test]
    fn test_axis_vs_diagonal_interface_factor() {
        // Axis-aligned neighbor: |dx|+|dy| equals the distance, which is
        // below the 1.1 threshold, selecting the diagonal factor; a true
        // diagonal neighbor has |dx|+|dy| = sqrt(2)*dist and selects the
        // along-axis factor.
        let mut a = Patch::new(0.0, 0.0, 1.0, 100.0);
        let axis = Patch::new(10.0, 0.0, 0.0, 100.0);
        let diag = Patch::new(10.0, 10.0, 0.0, 100.0);
        a.subsurface_drainage.push(DrainageEdge {
            neighbor: 1,
            gamma: 0.5,
        });
        a.subsurface_drainage.push(DrainageEdge {
            neighbor: 2,
            gamma: 0.5,
        });
        let mesh = MeshIndex::build(&[a, axis, diag], 1.0, false).unwrap();

        assert_relative_eq!(mesh.perimf[0][0], DIAGF, max_relative = 1e-12);
        assert_relative_eq!(mesh.perimf[0][1], 0.5, max_relative = 1e-12);
        assert_relative_eq!(
            mesh.subdist[0][1],
            200.0f64.sqrt(),
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_mesh_overflow_star_graph() {
        // Twenty sources all draining into one sink overflows a 16-wide row.
        let mut patches: Vec<Patch> = (0..20)
            .map(|i| {
                let mut p = Patch::new(i as f64 * 10.0, 10.0, 1.0, 100.0);
                p.surface_drainage.push(DrainageEdge {
                    neighbor: 20,
                    gamma: 1.0,
                });
                p
            })
            .collect();
        patches.push(Patch::new(0.0, 0.0, 0.0, 100.0));

        match MeshIndex::build(&patches, 1.0, false) {
            Err(RoutingError::MeshOverflow { patch: 20, max }) => {
                assert_eq!(max, MAXNEIGHBOR - 1);
            }
            other => panic!("expected MeshOverflow, got {:?}", other),
        }
    }

    #[test]
    fn test_outflow_fractions_normalized() {
        let mut src = Patch::new(0.0, 10.0, 2.0, 100.0);
        let sink_a = Patch::new(0.0, 0.0, 0.0, 100.0);
        let sink_b = Patch::new(10.0, 10.0, 0.0, 200.0);
        src.surface_drainage.push(DrainageEdge {
            neighbor: 1,
            gamma: 3.0,
        });
        src.surface_drainage.push(DrainageEdge {
            neighbor: 2,
            gamma: 1.0,
        });
        let mesh = MeshIndex::build(&[src, sink_a, sink_b], 1.0, false).unwrap();

        // gamma normalized to 0.75/0.25, then area-weighted by 100/100 and
        // 100/200.
        assert_relative_eq!(mesh.sfcgam[1][0], 0.75, max_relative = 1e-12);
        assert_relative_eq!(mesh.sfcgam[2][0], 0.125, max_relative = 1e-12);
    }
}
