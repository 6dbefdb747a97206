//! Gate outcomes and the diagnostic pose report.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::margins::Axis;

/// Head orientation in degrees.
///
/// Decomposition of the fitted rotation as `R = Rz(yaw) * Ry(pitch) * Rx(roll)`,
/// each angle in `[-180, 180]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EulerAngles {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl EulerAngles {
    /// Scale turn fractions in `[-0.5, 0.5]` to degrees.
    pub fn from_turns(turns: Vector3<f64>) -> Self {
        Self {
            roll: turns.x * 360.0,
            pitch: turns.y * 360.0,
            yaw: turns.z * 360.0,
        }
    }
}

impl fmt::Display for EulerAngles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "roll {:+.2}°, pitch {:+.2}°, yaw {:+.2}°",
            self.roll, self.pitch, self.yaw
        )
    }
}

/// Full diagnostic output of a pose fit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HeadPose {
    pub angles: EulerAngles,
    /// World-to-camera rotation.
    pub rotation: Matrix3<f64>,
    /// Axis-angle form of `rotation`.
    pub rvec: Vector3<f64>,
    /// World-to-camera translation, pixel units.
    pub translation: Vector3<f64>,
    /// Reprojection RMSE of the fit in pixels.
    pub reproj_rmse: f64,
    /// Refinement iterations the solver took.
    pub iterations: usize,
}

/// Why a frame was not accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// The detector reported no faces.
    NoFace,
    /// The landmark geometry did not admit a pose fit.
    SolveFailed,
    /// The named axis was the first to exceed its margin.
    Margin(Axis),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoFace => f.write_str("no-face"),
            Self::SolveFailed => f.write_str("solve-failed"),
            Self::Margin(axis) => write!(f, "{axis}"),
        }
    }
}

/// Outcome of the frontality gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Evaluation {
    Accepted,
    Rejected(RejectReason),
}

impl Evaluation {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// The rejection reason, if any.
    pub fn reason(&self) -> Option<RejectReason> {
        match self {
            Self::Accepted => None,
            Self::Rejected(reason) => Some(*reason),
        }
    }
}
