//! # Basinflow: coupled hydrologic routing core
//!
//! This library advances the water and solute state of a spatial mesh of
//! *patches* (irregular land cells) over an external time step by composing
//! five coupled sub-processes on an adaptive coupling cadence:
//!
//! - [`subsurface`] - lateral groundwater routing; selects the coupling step
//! - [`canopy`] - canopy throughfall rates (pluggable seam)
//! - [`surface`] - explicit kinematic-wave overland flow with infiltration
//! - [`stream`] - stream-network routing (pluggable seam)
//! - [`vertical`] - soil-column balancing and water-table update
//!
//! Supporting modules:
//!
//! - [`patch`] - patch geometry, soil column, drainage lists, and state
//! - [`mesh`] - time-independent mesh index with inflow/outflow matrices
//! - [`species`] - the water + solute quintet moved by every component
//! - [`router`] - the driver that owns working state and runs the coupling loop
//! - [`balance`] - basin-wide mass accounting reports
//! - [`csv`] - CSV ingestion of patches and drainage links
//!
//! ## Example
//!
//! ```no_run
//! use basinflow::{Basin, router::{HydroRouter, RouterConfig}};
//! use std::fs;
//!
//! let json = fs::read_to_string("basin.json").unwrap();
//! let mut basin = Basin::from_json(&json).unwrap();
//!
//! let mut router = HydroRouter::new(RouterConfig::default(), &basin).unwrap();
//! let summary = router.route(&mut basin, 3600.0).unwrap();
//! println!("coupled {} sub-steps", summary.substeps);
//! ```
//!
//! Routing mutates patch state in place; the mesh index is built once per
//! basin lifetime and reused across external steps.

pub mod balance;
pub mod canopy;
pub mod csv;
pub mod error;
pub mod mesh;
pub mod patch;
pub mod project;
pub mod router;
pub mod species;
pub mod stream;
pub mod subsurface;
pub mod surface;
pub mod vertical;

pub use error::RoutingError;
pub use patch::Patch;
pub use species::SpeciesLoad;

use serde::{Deserialize, Serialize};

/// Root-level basin model
///
/// The top-level document: project metadata plus the ordered patch list the
/// router operates on. Drainage edges reference patches by list position.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Basin {
    /// Schema version (semantic versioning)
    pub version: String,

    /// Project metadata
    pub project: project::Project,

    /// Ordered patch list; drainage edges index into it
    pub patches: Vec<Patch>,
}

impl Basin {
    /// Create a basin from project metadata and a patch list
    pub fn new(project: project::Project, patches: Vec<Patch>) -> Self {
        Self {
            version: "1.0.0".to_string(),
            project,
            patches,
        }
    }

    /// Load a basin from a JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize the basin to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Check drainage-edge indices and profile lengths.
    ///
    /// Every edge must point inside the patch list and every transmissivity
    /// profile must cover the soil discretization.
    pub fn validate(&self) -> Result<(), RoutingError> {
        let count = self.patches.len();
        for (i, patch) in self.patches.iter().enumerate() {
            for edge in patch
                .surface_drainage
                .iter()
                .chain(patch.subsurface_drainage.iter())
            {
                if edge.neighbor >= count {
                    return Err(RoutingError::BadNeighbor {
                        patch: i,
                        neighbor: edge.neighbor,
                        count,
                    });
                }
            }
            let needed = patch.num_soil_intervals + 1;
            if patch.transmissivity_profile.len() < needed {
                return Err(RoutingError::ShortProfile {
                    patch: i,
                    needed,
                    len: patch.transmissivity_profile.len(),
                });
            }
        }
        Ok(())
    }

    /// Total basin area (m²)
    pub fn area(&self) -> f64 {
        self.patches.iter().map(|p| p.area).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::DrainageEdge;

    #[test]
    fn test_minimal_basin() {
        let basin = Basin::new(project::Project::named("Test Basin"), vec![]);
        assert_eq!(basin.version, "1.0.0");
        assert_eq!(basin.project.name, "Test Basin");
        assert_eq!(basin.area(), 0.0);
    }

    #[test]
    fn test_validate_rejects_out_of_range_edge() {
        let mut patch = Patch::new(0.0, 0.0, 1.0, 100.0);
        patch.surface_drainage.push(DrainageEdge {
            neighbor: 5,
            gamma: 1.0,
        });
        let basin = Basin::new(project::Project::named("Bad Edge"), vec![patch]);
        match basin.validate() {
            Err(RoutingError::BadNeighbor { patch: 0, neighbor: 5, count: 1 }) => {}
            other => panic!("expected BadNeighbor, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_short_profile() {
        let mut patch = Patch::new(0.0, 0.0, 1.0, 100.0);
        patch.transmissivity_profile.truncate(3);
        let basin = Basin::new(project::Project::named("Short Profile"), vec![patch]);
        assert!(matches!(
            basin.validate(),
            Err(RoutingError::ShortProfile { patch: 0, .. })
        ));
    }

    #[test]
    fn test_basin_json_round_trip() {
        let basin = Basin::new(
            project::Project::named("Round Trip"),
            vec![Patch::new(0.0, 0.0, 2.0, 100.0)],
        );
        let json = basin.to_json().unwrap();
        let back = Basin::from_json(&json).unwrap();
        assert_eq!(basin, back);
    }
}
