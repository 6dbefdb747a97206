//! Pinhole camera model.
//!
//! A single focal length, a principal point and an optional four-term
//! distortion tail. `project` maps camera-frame points to pixel coordinates;
//! `normalize` maps pixels back to undistorted normalized image coordinates
//! for the solver.

use nalgebra::{Matrix3, Point2, Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Depth below which a point counts as on or behind the camera plane.
const MIN_DEPTH: f64 = 1e-9;

/// Fixed-point iterations used to invert the distortion model.
const UNDISTORT_ITERS: usize = 5;

/// Pinhole intrinsics with square pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    /// Focal length in pixels, shared by both axes.
    pub focal: f64,
    /// Principal point x, pixels.
    pub cx: f64,
    /// Principal point y, pixels.
    pub cy: f64,
    /// Radial and tangential distortion `(k1, k2, p1, p2)`.
    pub distortion: [f64; 4],
}

impl CameraIntrinsics {
    /// Distortion-free intrinsics.
    pub fn new(focal: f64, cx: f64, cy: f64) -> Self {
        Self {
            focal,
            cx,
            cy,
            distortion: [0.0; 4],
        }
    }

    /// Rough intrinsics for an uncalibrated frame: the focal length is taken
    /// as the frame width and the principal point as the image center.
    pub fn from_frame(width: usize, height: usize) -> Self {
        Self::new(width as f64, width as f64 / 2.0, height as f64 / 2.0)
    }

    /// The camera matrix `[[f, 0, cx], [0, f, cy], [0, 0, 1]]`.
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.focal, 0.0, self.cx, //
            0.0, self.focal, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    pub fn has_distortion(&self) -> bool {
        self.distortion.iter().any(|k| *k != 0.0)
    }

    /// Project a camera-frame point to pixel coordinates.
    ///
    /// Returns `None` for points on or behind the camera plane.
    pub fn project(&self, p: &Point3<f64>) -> Option<Point2<f64>> {
        if p.z < MIN_DEPTH {
            return None;
        }
        let (xd, yd) = self.distort(p.x / p.z, p.y / p.z);
        Some(Point2::new(
            self.focal * xd + self.cx,
            self.focal * yd + self.cy,
        ))
    }

    /// Undistorted normalized image coordinates for a pixel.
    pub fn normalize(&self, p: &Point2<f64>) -> Point2<f64> {
        let xd = (p.x - self.cx) / self.focal;
        let yd = (p.y - self.cy) / self.focal;
        if !self.has_distortion() {
            return Point2::new(xd, yd);
        }

        // Fixed-point inversion of the distortion model.
        let [k1, k2, p1, p2] = self.distortion;
        let mut x = xd;
        let mut y = yd;
        for _ in 0..UNDISTORT_ITERS {
            let r2 = x * x + y * y;
            let radial = 1.0 + k1 * r2 + k2 * r2 * r2;
            let dx = 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
            let dy = p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;
            x = (xd - dx) / radial;
            y = (yd - dy) / radial;
        }
        Point2::new(x, y)
    }

    fn distort(&self, x: f64, y: f64) -> (f64, f64) {
        let [k1, k2, p1, p2] = self.distortion;
        let r2 = x * x + y * y;
        let radial = 1.0 + k1 * r2 + k2 * r2 * r2;
        (
            x * radial + 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x),
            y * radial + p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y,
        )
    }
}

/// Project world points through a rigid pose into pixel coordinates.
///
/// Entries are `None` where the transformed point falls on or behind the
/// camera plane.
pub fn project_points(
    world: &[Point3<f64>],
    rotation: &Matrix3<f64>,
    translation: &Vector3<f64>,
    intrinsics: &CameraIntrinsics,
) -> Vec<Option<Point2<f64>>> {
    world
        .iter()
        .map(|p| intrinsics.project(&Point3::from(rotation * p.coords + translation)))
        .collect()
}
