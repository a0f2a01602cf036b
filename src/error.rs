//! Routing error kinds
//!
//! Fatal construction-time failures surface here. Numerical stalls and
//! degenerate patch geometry are recovered locally inside the routers (a
//! stalled field simply takes the full remaining coupling step) and never
//! reach the caller as errors.

use thiserror::Error;

/// Fatal errors raised while building or driving the routing core.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// A neighbor table ran out of fixed-stride row capacity. The mesh
    /// cannot represent this drainage topology; enlarge
    /// [`crate::mesh::MAXNEIGHBOR`] and rebuild, or reduce upstream
    /// convergence.
    #[error(
        "neighbor-table overflow at patch {patch}: more than {max} entries; \
         increase MAXNEIGHBOR and rebuild"
    )]
    MeshOverflow { patch: usize, max: usize },

    /// The basin handed to `route()` does not match the mesh the router
    /// was built from.
    #[error("router was built for {built} patches but the basin has {given}")]
    PatchCountMismatch { built: usize, given: usize },

    /// A drainage edge names a patch index outside the basin.
    #[error("patch {patch} drains to neighbor {neighbor}, but the basin has only {count} patches")]
    BadNeighbor {
        patch: usize,
        neighbor: usize,
        count: usize,
    },

    /// A transmissivity profile is shorter than the soil discretization
    /// requires (`num_soil_intervals + 1` entries).
    #[error("patch {patch}: transmissivity profile has {len} entries, needs at least {needed}")]
    ShortProfile {
        patch: usize,
        needed: usize,
        len: usize,
    },
}
