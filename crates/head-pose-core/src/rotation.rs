//! Axis-angle and Euler conversions for camera poses.

use nalgebra::{Matrix3, Rotation3, Vector3};
use std::f64::consts::TAU;

/// Rotation matrix for an axis-angle vector (exponential map).
pub fn rodrigues(rvec: &Vector3<f64>) -> Matrix3<f64> {
    Rotation3::from_scaled_axis(*rvec).into_inner()
}

/// Axis-angle vector for a rotation matrix (logarithm map).
///
/// The input must already be a proper rotation.
pub fn rotation_vector(rotation: &Matrix3<f64>) -> Vector3<f64> {
    Rotation3::from_matrix_unchecked(*rotation).scaled_axis()
}

/// Decompose a rotation as `R = Rz(yaw) * Ry(pitch) * Rx(roll)` and return
/// `(roll, pitch, yaw)` as fractions of a full turn in `[-0.5, 0.5]`.
///
/// Multiply by 360 for degrees.
pub fn euler_turns(rotation: &Matrix3<f64>) -> Vector3<f64> {
    let (roll, pitch, yaw) = Rotation3::from_matrix_unchecked(*rotation).euler_angles();
    Vector3::new(roll / TAU, pitch / TAU, yaw / TAU)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn zero_vector_maps_to_identity() {
        let r = rodrigues(&Vector3::zeros());
        assert_relative_eq!(r, Matrix3::identity(), epsilon = 1e-15);
    }

    #[test]
    fn axis_angle_round_trips() {
        let rvec = Vector3::new(0.3, -0.8, 0.5);
        let back = rotation_vector(&rodrigues(&rvec));
        assert_relative_eq!(back, rvec, epsilon = 1e-12);
    }

    #[test]
    fn quarter_turn_about_z() {
        let r = rodrigues(&Vector3::new(0.0, 0.0, FRAC_PI_2));
        let turns = euler_turns(&r);
        assert_relative_eq!(turns.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(turns.y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(turns.z, 0.25, epsilon = 1e-12);
    }

    #[test]
    fn decomposition_matches_composition_order() {
        // R = Rz(yaw) * Ry(pitch) * Rx(roll)
        let (roll, pitch, yaw) = (0.21, -0.34, 0.55);
        let composed = Rotation3::from_scaled_axis(Vector3::new(0.0, 0.0, yaw))
            * Rotation3::from_scaled_axis(Vector3::new(0.0, pitch, 0.0))
            * Rotation3::from_scaled_axis(Vector3::new(roll, 0.0, 0.0));
        let turns = euler_turns(&composed.into_inner());
        assert_relative_eq!(turns.x * TAU, roll, epsilon = 1e-12);
        assert_relative_eq!(turns.y * TAU, pitch, epsilon = 1e-12);
        assert_relative_eq!(turns.z * TAU, yaw, epsilon = 1e-12);
    }

    #[test]
    fn turns_stay_in_half_open_band() {
        let r = rodrigues(&Vector3::new(0.0, 0.0, 3.0));
        let turns = euler_turns(&r);
        assert!(turns.z.abs() <= 0.5);
        assert_relative_eq!(turns.z * TAU, 3.0, epsilon = 1e-12);
    }
}
