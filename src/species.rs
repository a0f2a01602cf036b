//! Transported species quintet
//!
//! Every routing component moves the same five quantities in lock-step:
//! water plus the four dissolved species (nitrate, ammonium, dissolved
//! organic carbon, dissolved organic nitrogen). Grouping them in one value
//! keeps each parallel pass a single-writer update over one vector.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul, Sub};

/// Water plus solute load (or rate) carried by one patch store.
///
/// Water is a depth over the patch area (m, or m/s for rate vectors);
/// solutes are areal masses (kg/m², or kg/m²/s for rates).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeciesLoad {
    /// Water
    pub h2o: f64,
    /// Nitrate
    pub no3: f64,
    /// Ammonium (mineral N)
    pub nh4: f64,
    /// Dissolved organic carbon
    pub doc: f64,
    /// Dissolved organic nitrogen
    pub don: f64,
}

impl SpeciesLoad {
    pub const ZERO: SpeciesLoad = SpeciesLoad {
        h2o: 0.0,
        no3: 0.0,
        nh4: 0.0,
        doc: 0.0,
        don: 0.0,
    };

    /// All five members scaled by the same factor.
    pub fn scaled(self, f: f64) -> SpeciesLoad {
        SpeciesLoad {
            h2o: f * self.h2o,
            no3: f * self.no3,
            nh4: f * self.nh4,
            doc: f * self.doc,
            don: f * self.don,
        }
    }

    /// True when every member is finite and non-negative.
    pub fn is_non_negative(&self) -> bool {
        self.h2o >= 0.0 && self.no3 >= 0.0 && self.nh4 >= 0.0 && self.doc >= 0.0 && self.don >= 0.0
    }
}

impl Add for SpeciesLoad {
    type Output = SpeciesLoad;

    fn add(self, rhs: SpeciesLoad) -> SpeciesLoad {
        SpeciesLoad {
            h2o: self.h2o + rhs.h2o,
            no3: self.no3 + rhs.no3,
            nh4: self.nh4 + rhs.nh4,
            doc: self.doc + rhs.doc,
            don: self.don + rhs.don,
        }
    }
}

impl Sub for SpeciesLoad {
    type Output = SpeciesLoad;

    fn sub(self, rhs: SpeciesLoad) -> SpeciesLoad {
        SpeciesLoad {
            h2o: self.h2o - rhs.h2o,
            no3: self.no3 - rhs.no3,
            nh4: self.nh4 - rhs.nh4,
            doc: self.doc - rhs.doc,
            don: self.don - rhs.don,
        }
    }
}

impl AddAssign for SpeciesLoad {
    fn add_assign(&mut self, rhs: SpeciesLoad) {
        self.h2o += rhs.h2o;
        self.no3 += rhs.no3;
        self.nh4 += rhs.nh4;
        self.doc += rhs.doc;
        self.don += rhs.don;
    }
}

impl Mul<f64> for SpeciesLoad {
    type Output = SpeciesLoad;

    fn mul(self, rhs: f64) -> SpeciesLoad {
        self.scaled(rhs)
    }
}
