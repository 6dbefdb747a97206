//! Geometry core for head-pose estimation.
//!
//! Camera intrinsics, a PnP solver tuned for small landmark constellations,
//! and rotation conversions. No detector or image handling lives here; the
//! `head-pose` crate builds the landmark gate on top of these pieces.

mod camera;
mod logger;
mod pnp;
mod rotation;

pub use camera::{project_points, CameraIntrinsics};
#[cfg(feature = "tracing")]
pub use logger::init_tracing;
pub use logger::init_with_level;
pub use pnp::{
    solve_pnp, solve_pnp_with, PnpError, PnpSolution, SolveParams, MIN_POINTS, MIN_POINTS_SPATIAL,
};
pub use rotation::{euler_turns, rodrigues, rotation_vector};
