//! CSV input for basins
//!
//! Parsers for building a basin from two spreadsheet-friendly tables: a
//! patch table and a drainage-link table.
//!
//! # CSV Formats
//!
//! ## Patches CSV
//! Required columns: `x`, `y`, `z`, `area`, `slope_max`, `mann_n`,
//! `field_capacity`.
//! Optional columns (soil defaults apply when blank): `perimeter`, `std`,
//! `interval_size`, `soil_depth`, `detention_store_size`, `ksat_0_v`,
//! `mz_v`, `porosity_0`, `porosity_decay`, `psi_air_entry`,
//! `n_decay_rate`, `dom_decay_rate`, `ksat_vertical`, `transmissivity`,
//! `detention_store`, `sat_deficit`, `sat_deficit_z`, `s`.
//! `transmissivity` is a uniform profile value expanded over the soil
//! discretization.
//!
//! ## Links CSV
//! Columns: `source`, `target`, `gamma`, `layer`. `layer` is `surface`
//! or `subsurface`; `source`/`target` are zero-based row numbers in the
//! patch table.

use crate::patch::{DrainageEdge, Patch};
use crate::project::Project;
use crate::Basin;
use csv::{ReaderBuilder, Trim};
use serde::Deserialize;
use std::error::Error;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// CSV record for one patch
#[derive(Debug, Deserialize)]
pub struct PatchCsvRecord {
    /// Planar x coordinate (m)
    pub x: f64,
    /// Planar y coordinate (m)
    pub y: f64,
    /// Surface elevation (m)
    pub z: f64,
    /// Patch area (m²)
    pub area: f64,
    /// Maximum surface slope (radians)
    pub slope_max: f64,
    /// Manning's roughness coefficient
    pub mann_n: f64,
    /// Column water content at field capacity (vertical m)
    pub field_capacity: f64,
    /// Patch perimeter (m) - optional
    pub perimeter: Option<f64>,
    /// Terrain-roughness standard deviation (m) - optional
    pub std: Option<f64>,
    /// Soil discretization interval (m) - optional
    pub interval_size: Option<f64>,
    /// Soil depth (m) - optional
    pub soil_depth: Option<f64>,
    /// Detention storage depth (m) - optional
    pub detention_store_size: Option<f64>,
    /// Surface saturated vertical conductivity (m/s) - optional
    pub ksat_0_v: Option<f64>,
    /// Conductivity-decay e-folding depth (m) - optional
    pub mz_v: Option<f64>,
    /// Surface porosity - optional
    pub porosity_0: Option<f64>,
    /// Porosity-decay e-folding depth (m) - optional
    pub porosity_decay: Option<f64>,
    /// Air-entry potential (m of suction) - optional
    pub psi_air_entry: Option<f64>,
    /// Mineral-N depth-decay rate (1/m) - optional
    pub n_decay_rate: Option<f64>,
    /// Dissolved-organic-matter depth-decay rate (1/m) - optional
    pub dom_decay_rate: Option<f64>,
    /// Pervious fraction - optional
    pub ksat_vertical: Option<f64>,
    /// Uniform transmissivity profile value (m²/s) - optional
    pub transmissivity: Option<f64>,
    /// Initial surface detention store (m) - optional
    pub detention_store: Option<f64>,
    /// Initial saturation deficit (vertical m) - optional
    pub sat_deficit: Option<f64>,
    /// Initial depth to the water table (m) - optional
    pub sat_deficit_z: Option<f64>,
    /// Bulk relative saturation - optional
    pub s: Option<f64>,
}

impl PatchCsvRecord {
    /// Convert CSV record to a patch (no drainage edges yet)
    pub fn to_patch(&self) -> Patch {
        let mut patch = Patch::new(self.x, self.y, self.z, self.area);
        patch.slope_max = self.slope_max;
        patch.mann_n = self.mann_n;
        patch.field_capacity = self.field_capacity;
        if let Some(v) = self.perimeter {
            patch.perimeter = v;
        }
        if let Some(v) = self.std {
            patch.std = v;
        }
        if let Some(v) = self.interval_size {
            patch.soil.interval_size = v;
        }
        if let Some(v) = self.soil_depth {
            patch.soil.soil_depth = v;
        }
        if let Some(v) = self.detention_store_size {
            patch.soil.detention_store_size = v;
        }
        if let Some(v) = self.ksat_0_v {
            patch.soil.ksat_0_v = v;
        }
        if let Some(v) = self.mz_v {
            patch.soil.mz_v = v;
        }
        if let Some(v) = self.porosity_0 {
            patch.soil.porosity_0 = v;
        }
        if let Some(v) = self.porosity_decay {
            patch.soil.porosity_decay = v;
        }
        if let Some(v) = self.psi_air_entry {
            patch.soil.psi_air_entry = v;
        }
        if let Some(v) = self.n_decay_rate {
            patch.soil.n_decay_rate = v;
        }
        if let Some(v) = self.dom_decay_rate {
            patch.soil.dom_decay_rate = v;
        }
        if let Some(v) = self.ksat_vertical {
            patch.ksat_vertical = v;
        }
        if let Some(v) = self.detention_store {
            patch.detention_store = v;
        }
        if let Some(v) = self.sat_deficit {
            patch.sat_deficit = v;
        }
        if let Some(v) = self.sat_deficit_z {
            patch.sat_deficit_z = v;
        }
        if let Some(v) = self.s {
            patch.s = v;
        }

        // Re-derive the discretization after any depth/interval override.
        patch.num_soil_intervals =
            (patch.soil.soil_depth / patch.soil.interval_size).round() as usize;
        let fill = self.transmissivity.unwrap_or(0.0);
        patch.transmissivity_profile = vec![fill; patch.num_soil_intervals + 1];

        patch
    }
}

/// CSV record for one drainage link
#[derive(Debug, Deserialize)]
pub struct LinkCsvRecord {
    /// Zero-based row number of the source patch
    pub source: usize,
    /// Zero-based row number of the target patch
    pub target: usize,
    /// Exchange weight toward the target
    pub gamma: f64,
    /// Drainage layer: "surface" or "subsurface"
    pub layer: String,
}

/// Read patches from any CSV reader
pub fn read_patches<R: Read>(reader: R) -> Result<Vec<Patch>, Box<dyn Error>> {
    let mut csv_reader = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
    let mut patches = Vec::new();
    for result in csv_reader.deserialize() {
        let record: PatchCsvRecord = result?;
        patches.push(record.to_patch());
    }
    Ok(patches)
}

/// Parse a patches CSV file
pub fn parse_patches_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Patch>, Box<dyn Error>> {
    read_patches(File::open(path)?)
}

/// Read drainage links from any CSV reader and attach them to patches
pub fn read_links<R: Read>(reader: R, patches: &mut [Patch]) -> Result<(), Box<dyn Error>> {
    let mut csv_reader = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
    for result in csv_reader.deserialize() {
        let record: LinkCsvRecord = result?;
        if record.source >= patches.len() || record.target >= patches.len() {
            return Err(format!(
                "link {} -> {} references a patch outside the table ({} rows)",
                record.source,
                record.target,
                patches.len()
            )
            .into());
        }
        let edge = DrainageEdge {
            neighbor: record.target,
            gamma: record.gamma,
        };
        match record.layer.to_lowercase().as_str() {
            "surface" => patches[record.source].surface_drainage.push(edge),
            "subsurface" => patches[record.source].subsurface_drainage.push(edge),
            other => return Err(format!("unknown drainage layer: {}", other).into()),
        }
    }
    Ok(())
}

/// Parse a links CSV file and attach the edges to patches
pub fn parse_links_csv<P: AsRef<Path>>(
    path: P,
    patches: &mut [Patch],
) -> Result<(), Box<dyn Error>> {
    read_links(File::open(path)?, patches)
}

/// Build a basin from a patches CSV file and a links CSV file
pub fn basin_from_csv<P: AsRef<Path>>(
    name: &str,
    patches_path: P,
    links_path: P,
) -> Result<Basin, Box<dyn Error>> {
    let mut patches = parse_patches_csv(patches_path)?;
    parse_links_csv(links_path, &mut patches)?;
    Ok(Basin::new(Project::named(name), patches))
}
