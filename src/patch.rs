//! Patch definitions
//!
//! A patch is one irregular land cell: the unit of state, of drainage
//! topology, and of parallelism. Patches are referenced by their position
//! in the basin's patch list; drainage edges carry that index directly.

use serde::{Deserialize, Serialize};

/// Soil-column defaults read by the routing components.
///
/// Conductivity and porosity both decay exponentially with depth from
/// their surface values; the decay constants are e-folding depths.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SoilParameters {
    /// Vertical discretization interval of the soil column (m)
    pub interval_size: f64,

    /// Total soil depth (m)
    pub soil_depth: f64,

    /// Detention storage depth; surface water below it does not flow (m)
    pub detention_store_size: f64,

    /// Saturated vertical conductivity at the surface (m/s)
    pub ksat_0_v: f64,

    /// e-folding depth of the conductivity decay (m); zero or negative
    /// selects a uniform profile
    pub mz_v: f64,

    /// Porosity at the surface (dimensionless)
    pub porosity_0: f64,

    /// e-folding depth of the porosity decay (m); values >= 999.9 select a
    /// uniform profile
    pub porosity_decay: f64,

    /// Air-entry potential (m of suction)
    pub psi_air_entry: f64,

    /// Decay rate of mineral-nitrogen concentration with depth (1/m)
    pub n_decay_rate: f64,

    /// Decay rate of dissolved organic matter with depth (1/m)
    pub dom_decay_rate: f64,
}

impl Default for SoilParameters {
    fn default() -> Self {
        Self {
            interval_size: 0.1,
            soil_depth: 2.0,
            detention_store_size: 0.01,
            ksat_0_v: 1.0e-5,
            mz_v: 0.0,
            porosity_0: 0.5,
            porosity_decay: 4000.0,
            psi_air_entry: 0.2,
            n_decay_rate: 0.5,
            dom_decay_rate: 0.5,
        }
    }
}

/// Soil-column nitrogen stores (kg/m²)
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct SoilNitrogen {
    /// Nitrate pool
    pub nitrate: f64,
    /// Soil mineral nitrogen (ammonium) pool
    pub sminn: f64,
    /// Dissolved organic nitrogen pool
    pub don: f64,
}

/// Soil-column carbon stores (kg/m²)
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct SoilCarbon {
    /// Dissolved organic carbon pool
    pub doc: f64,
}

/// Root-zone extent and relative saturation
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct RootZone {
    /// Rooting depth (m); zero means no root zone is resolved
    pub depth: f64,
    /// Relative saturation of the root zone (dimensionless)
    pub s: f64,
}

/// A directed drainage edge to a downhill neighbor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DrainageEdge {
    /// Index of the receiving patch in the basin's patch list
    pub neighbor: usize,
    /// Exchange weight toward that neighbor (dimensionless)
    pub gamma: f64,
}

/// One land cell with its geometry, soil column, drainage lists, and state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Patch {
    /// Planar x coordinate (m)
    pub x: f64,
    /// Planar y coordinate (m)
    pub y: f64,
    /// Surface elevation (m)
    pub z: f64,
    /// Patch area (m²)
    pub area: f64,
    /// Patch perimeter (m)
    pub perimeter: f64,
    /// Maximum surface slope (radians)
    pub slope_max: f64,
    /// Manning's roughness coefficient
    pub mann_n: f64,
    /// Terrain-roughness standard deviation (m)
    pub std: f64,

    /// Soil-column defaults
    pub soil: SoilParameters,

    /// Number of soil discretization intervals
    pub num_soil_intervals: usize,

    /// Transmissivity by saturation-depth interval; must hold
    /// `num_soil_intervals + 1` entries (m²/s)
    pub transmissivity_profile: Vec<f64>,

    /// Pervious fraction limiting vertical infiltration (dimensionless)
    pub ksat_vertical: f64,

    /// Column water content at field capacity (vertical m)
    pub field_capacity: f64,

    /// Surface detention store (m)
    #[serde(default)]
    pub detention_store: f64,

    /// Column water deficit below field capacity (vertical m)
    #[serde(default)]
    pub sat_deficit: f64,

    /// Depth to the water table below the surface (m)
    #[serde(default)]
    pub sat_deficit_z: f64,

    /// Surface nitrate load (kg/m²)
    #[serde(default)]
    pub surface_no3: f64,
    /// Surface ammonium load (kg/m²)
    #[serde(default)]
    pub surface_nh4: f64,
    /// Surface dissolved organic carbon load (kg/m²)
    #[serde(default)]
    pub surface_doc: f64,
    /// Surface dissolved organic nitrogen load (kg/m²)
    #[serde(default)]
    pub surface_don: f64,

    /// Soil nitrogen stores
    #[serde(default)]
    pub soil_ns: SoilNitrogen,

    /// Soil carbon stores
    #[serde(default)]
    pub soil_cs: SoilCarbon,

    /// Root zone extent and saturation
    #[serde(default)]
    pub rootzone: RootZone,

    /// Bulk relative saturation, used when no root zone is resolved
    #[serde(default)]
    pub s: f64,

    /// Subsurface drainage edges (downhill neighbors with weights)
    #[serde(default)]
    pub subsurface_drainage: Vec<DrainageEdge>,

    /// Surface drainage edges (downhill neighbors with weights)
    #[serde(default)]
    pub surface_drainage: Vec<DrainageEdge>,
}

impl Patch {
    /// Create a patch at the given position with neutral soil defaults and
    /// empty drainage lists. Callers set state and drainage afterwards.
    pub fn new(x: f64, y: f64, z: f64, area: f64) -> Self {
        let soil = SoilParameters::default();
        let num_soil_intervals = (soil.soil_depth / soil.interval_size).round() as usize;
        Self {
            x,
            y,
            z,
            area,
            perimeter: 4.0 * area.sqrt(),
            slope_max: 0.0,
            mann_n: 0.03,
            std: 0.0,
            soil,
            num_soil_intervals,
            transmissivity_profile: vec![0.0; num_soil_intervals + 1],
            ksat_vertical: 1.0,
            field_capacity: 0.3,
            detention_store: 0.0,
            sat_deficit: 0.0,
            sat_deficit_z: 0.0,
            surface_no3: 0.0,
            surface_nh4: 0.0,
            surface_doc: 0.0,
            surface_don: 0.0,
            soil_ns: SoilNitrogen::default(),
            soil_cs: SoilCarbon::default(),
            rootzone: RootZone::default(),
            s: 0.5,
            subsurface_drainage: Vec::new(),
            surface_drainage: Vec::new(),
        }
    }

    /// Cell size taken as the side of the equivalent square (m)
    pub fn cell_size(&self) -> f64 {
        self.area.sqrt()
    }
}
