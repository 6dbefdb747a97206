//! Acceptance margins for the frontality gate.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::result::EulerAngles;

/// Rotation axes in the order they are tested.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    Roll,
    Pitch,
    Yaw,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Roll => "roll",
            Self::Pitch => "pitch",
            Self::Yaw => "yaw",
        };
        f.write_str(name)
    }
}

/// A margin was not a finite non-negative number of degrees.
#[derive(Debug, Error, PartialEq)]
#[error("margin for {axis} must be a finite non-negative number of degrees, got {value}")]
pub struct InvalidMargin {
    pub axis: Axis,
    pub value: f64,
}

/// Per-axis absolute limits in degrees.
///
/// An angle passes when it lies in `[-limit, +limit]`; both bounds are
/// inclusive. The axes are always tested roll, then pitch, then yaw.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoseMargins {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl PoseMargins {
    /// Margins validated to be finite and non-negative.
    pub fn new(roll: f64, pitch: f64, yaw: f64) -> Result<Self, InvalidMargin> {
        let margins = Self { roll, pitch, yaw };
        margins.validate()?;
        Ok(margins)
    }

    /// The same limit on all three axes.
    pub fn uniform(limit: f64) -> Result<Self, InvalidMargin> {
        Self::new(limit, limit, limit)
    }

    /// Re-check limits, e.g. after deserializing a config.
    pub fn validate(&self) -> Result<(), InvalidMargin> {
        for (axis, value) in [
            (Axis::Roll, self.roll),
            (Axis::Pitch, self.pitch),
            (Axis::Yaw, self.yaw),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(InvalidMargin { axis, value });
            }
        }
        Ok(())
    }

    /// First axis whose angle falls outside its margin, in test order.
    pub fn first_violation(&self, angles: &EulerAngles) -> Option<Axis> {
        for (axis, angle, limit) in [
            (Axis::Roll, angles.roll, self.roll),
            (Axis::Pitch, angles.pitch, self.pitch),
            (Axis::Yaw, angles.yaw, self.yaw),
        ] {
            if angle < -limit || angle > limit {
                return Some(axis);
            }
        }
        None
    }
}

impl Default for PoseMargins {
    /// Three degrees on every axis.
    fn default() -> Self {
        Self {
            roll: 3.0,
            pitch: 3.0,
            yaw: 3.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn angles(roll: f64, pitch: f64, yaw: f64) -> EulerAngles {
        EulerAngles { roll, pitch, yaw }
    }

    #[test]
    fn frontal_pose_passes_defaults() {
        let margins = PoseMargins::default();
        assert_eq!(margins.first_violation(&angles(0.0, 0.0, 0.0)), None);
        assert_eq!(margins.first_violation(&angles(-2.9, 1.0, 2.5)), None);
    }

    #[test]
    fn bounds_are_inclusive() {
        let margins = PoseMargins::default();
        assert_eq!(margins.first_violation(&angles(3.0, -3.0, 3.0)), None);
        assert_eq!(
            margins.first_violation(&angles(3.0000001, 0.0, 0.0)),
            Some(Axis::Roll)
        );
        assert_eq!(
            margins.first_violation(&angles(0.0, 0.0, -3.0000001)),
            Some(Axis::Yaw)
        );
    }

    #[test]
    fn first_violated_axis_wins() {
        let margins = PoseMargins::default();
        assert_eq!(
            margins.first_violation(&angles(10.0, 10.0, 10.0)),
            Some(Axis::Roll)
        );
        assert_eq!(
            margins.first_violation(&angles(0.0, -10.0, 10.0)),
            Some(Axis::Pitch)
        );
        assert_eq!(
            margins.first_violation(&angles(0.0, 0.0, 10.0)),
            Some(Axis::Yaw)
        );
    }

    #[test]
    fn zero_margin_requires_exact_zero() {
        let margins = PoseMargins::uniform(0.0).expect("valid");
        assert_eq!(margins.first_violation(&angles(0.0, 0.0, 0.0)), None);
        assert_eq!(
            margins.first_violation(&angles(0.001, 0.0, 0.0)),
            Some(Axis::Roll)
        );
    }

    #[test]
    fn negative_or_non_finite_margins_are_rejected() {
        assert_eq!(
            PoseMargins::new(-1.0, 3.0, 3.0),
            Err(InvalidMargin {
                axis: Axis::Roll,
                value: -1.0
            })
        );
        assert!(PoseMargins::new(3.0, f64::NAN, 3.0).is_err());
        assert!(PoseMargins::new(3.0, 3.0, f64::INFINITY).is_err());
    }

    #[test]
    fn serde_round_trip_keeps_limits() {
        let margins = PoseMargins::new(2.0, 4.0, 6.0).expect("valid");
        let json = serde_json::to_string(&margins).expect("serialize");
        let back: PoseMargins = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, margins);
        back.validate().expect("still valid");
    }
}
