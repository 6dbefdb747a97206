//! Pose from point correspondences.
//!
//! `solve_pnp` estimates the rigid transform taking world points into the
//! camera frame from world/pixel correspondences. Near-coplanar sets (faces,
//! boards) are initialized from a DLT homography between the fitted plane and
//! the normalized image plane; general clouds use a DLT projection matrix and
//! need at least six points. Either initialization is polished by a
//! backtracking Gauss-Newton pass on the reprojection residual.

use nalgebra::{
    DMatrix, Matrix2x3, Matrix2x6, Matrix3, Matrix3x4, Matrix3x6, Matrix4, Matrix6, Point2,
    Point3, Rotation3, SMatrix, SVector, Vector2, Vector3, Vector6,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::camera::{project_points, CameraIntrinsics};
use crate::rotation::rotation_vector;

/// Minimum correspondences for the coplanar (homography) path.
pub const MIN_POINTS: usize = 4;

/// Minimum correspondences for the general (projection-matrix) path.
pub const MIN_POINTS_SPATIAL: usize = 6;

const TINY: f64 = 1e-12;

/// Depth below which a transformed point counts as behind the camera.
const MIN_DEPTH: f64 = 1e-9;

/// Failure modes of the PnP solve.
#[derive(Debug, Error)]
pub enum PnpError {
    #[error("need at least {required} correspondences, got {actual}")]
    TooFewPoints { required: usize, actual: usize },
    #[error("world/image point counts differ: {world} vs {image}")]
    CountMismatch { world: usize, image: usize },
    #[error("non-finite coordinate in the input correspondences")]
    NonFiniteInput,
    #[error("correspondences are geometrically degenerate")]
    DegenerateGeometry,
}

/// Tuning knobs for the solve.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SolveParams {
    /// Gauss-Newton iteration cap.
    pub max_iterations: usize,
    /// Stop once the update step norm falls below this.
    pub tolerance: f64,
    /// Treat the point set as coplanar when the smallest scatter singular
    /// value is below this fraction of the largest.
    pub planarity_threshold: f64,
}

impl Default for SolveParams {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            tolerance: 1e-10,
            planarity_threshold: 1e-3,
        }
    }
}

/// A solved camera pose.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PnpSolution {
    /// World-to-camera rotation.
    pub rotation: Matrix3<f64>,
    /// Axis-angle form of `rotation`.
    pub rvec: Vector3<f64>,
    /// World-to-camera translation.
    pub translation: Vector3<f64>,
    /// Root-mean-square reprojection error in pixels.
    pub reproj_rmse: f64,
    /// Gauss-Newton iterations taken.
    pub iterations: usize,
    /// Whether the refinement met `tolerance` before the iteration cap.
    pub converged: bool,
}

/// Solve with default parameters.
pub fn solve_pnp(
    world: &[Point3<f64>],
    image: &[Point2<f64>],
    intrinsics: &CameraIntrinsics,
) -> Result<PnpSolution, PnpError> {
    solve_pnp_with(world, image, intrinsics, &SolveParams::default())
}

/// Solve for the pose taking `world` points onto `image` pixels.
#[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all))]
pub fn solve_pnp_with(
    world: &[Point3<f64>],
    image: &[Point2<f64>],
    intrinsics: &CameraIntrinsics,
    params: &SolveParams,
) -> Result<PnpSolution, PnpError> {
    if world.len() != image.len() {
        return Err(PnpError::CountMismatch {
            world: world.len(),
            image: image.len(),
        });
    }
    if world.len() < MIN_POINTS {
        return Err(PnpError::TooFewPoints {
            required: MIN_POINTS,
            actual: world.len(),
        });
    }
    let finite = world
        .iter()
        .all(|p| p.coords.iter().all(|c| c.is_finite()))
        && image.iter().all(|p| p.coords.iter().all(|c| c.is_finite()));
    if !finite {
        return Err(PnpError::NonFiniteInput);
    }

    // The solve runs in undistorted normalized coordinates.
    let rays: Vec<Point2<f64>> = image.iter().map(|p| intrinsics.normalize(p)).collect();
    if rays.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return Err(PnpError::NonFiniteInput);
    }

    let shape = PointShape::analyze(world)?;
    let (r0, t0) = if shape.planar(params.planarity_threshold) {
        init_planar(world, &rays, &shape)?
    } else {
        if world.len() < MIN_POINTS_SPATIAL {
            return Err(PnpError::TooFewPoints {
                required: MIN_POINTS_SPATIAL,
                actual: world.len(),
            });
        }
        init_spatial(world, &rays)?
    };

    let refined = refine(world, &rays, r0, t0, params)?;
    let reproj_rmse = pixel_rmse(
        world,
        image,
        &refined.rotation,
        &refined.translation,
        intrinsics,
    );

    Ok(PnpSolution {
        rvec: rotation_vector(&refined.rotation),
        rotation: refined.rotation,
        translation: refined.translation,
        reproj_rmse,
        iterations: refined.iterations,
        converged: refined.converged,
    })
}

/// Principal axes of the world point cloud.
struct PointShape {
    centroid: Vector3<f64>,
    /// Rows are the principal directions, strongest first.
    axes: Matrix3<f64>,
    /// Scatter singular values, descending.
    singular: Vector3<f64>,
}

impl PointShape {
    fn analyze(world: &[Point3<f64>]) -> Result<Self, PnpError> {
        let n = world.len() as f64;
        let centroid = world.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / n;

        let mut centered = DMatrix::<f64>::zeros(world.len(), 3);
        for (i, p) in world.iter().enumerate() {
            let d = p.coords - centroid;
            centered[(i, 0)] = d.x;
            centered[(i, 1)] = d.y;
            centered[(i, 2)] = d.z;
        }

        let svd = centered.svd(false, true);
        let vt = svd.v_t.ok_or(PnpError::DegenerateGeometry)?;
        let singular = Vector3::new(
            svd.singular_values[0],
            svd.singular_values[1],
            svd.singular_values[2],
        );

        // Coincident or collinear points span no plane.
        if singular[0] < TINY || singular[1] < singular[0] * 1e-9 {
            return Err(PnpError::DegenerateGeometry);
        }

        let axes = Matrix3::from_fn(|i, j| vt[(i, j)]);
        Ok(Self {
            centroid,
            axes,
            singular,
        })
    }

    fn planar(&self, threshold: f64) -> bool {
        self.singular[2] <= self.singular[0] * threshold
    }
}

/// Homography-based initialization for near-coplanar points.
fn init_planar(
    world: &[Point3<f64>],
    rays: &[Point2<f64>],
    shape: &PointShape,
) -> Result<(Matrix3<f64>, Vector3<f64>), PnpError> {
    let e1: Vector3<f64> = shape.axes.row(0).transpose();
    let e2: Vector3<f64> = shape.axes.row(1).transpose();
    // Cross product rather than the SVD's third row keeps the basis
    // right-handed regardless of the sign the decomposition picked.
    let normal = e1.cross(&e2);

    let plane_pts: Vec<Point2<f64>> = world
        .iter()
        .map(|p| {
            let d = p.coords - shape.centroid;
            Point2::new(d.dot(&e1), d.dot(&e2))
        })
        .collect();

    let h = estimate_homography(&plane_pts, rays).ok_or(PnpError::DegenerateGeometry)?;

    let h1 = h.column(0).into_owned();
    let h2 = h.column(1).into_owned();
    let h3 = h.column(2).into_owned();

    let denom = h1.norm() + h2.norm();
    if !denom.is_finite() || denom < TINY {
        return Err(PnpError::DegenerateGeometry);
    }
    let scale = 2.0 / denom;

    let mut r1 = h1 * scale;
    let mut r2 = h2 * scale;
    let mut t = h3 * scale;
    // The DLT fixes H only up to sign; the plane origin must sit in front of
    // the camera.
    if t.z < 0.0 {
        r1 = -r1;
        r2 = -r2;
        t = -t;
    }

    let r3 = r1.cross(&r2);
    let plane_rot = nearest_rotation(&Matrix3::from_columns(&[r1, r2, r3]))
        .ok_or(PnpError::DegenerateGeometry)?;

    // Compose with the plane basis to get the world-frame pose.
    let basis = Matrix3::from_columns(&[e1, e2, normal]);
    let rotation = plane_rot * basis.transpose();
    let translation = t - rotation * shape.centroid;
    Ok((rotation, translation))
}

/// Projection-matrix initialization for general point clouds.
fn init_spatial(
    world: &[Point3<f64>],
    rays: &[Point2<f64>],
) -> Result<(Matrix3<f64>, Vector3<f64>), PnpError> {
    let (wn, t3) = normalize_points3(world);
    let (rn, t2) = normalize_points(rays);

    let n = world.len();
    let mut a = DMatrix::<f64>::zeros(2 * n, 12);
    for k in 0..n {
        let p = &wn[k];
        let u = rn[k].x;
        let v = rn[k].y;

        a[(2 * k, 0)] = p.x;
        a[(2 * k, 1)] = p.y;
        a[(2 * k, 2)] = p.z;
        a[(2 * k, 3)] = 1.0;
        a[(2 * k, 8)] = -u * p.x;
        a[(2 * k, 9)] = -u * p.y;
        a[(2 * k, 10)] = -u * p.z;
        a[(2 * k, 11)] = -u;

        a[(2 * k + 1, 4)] = p.x;
        a[(2 * k + 1, 5)] = p.y;
        a[(2 * k + 1, 6)] = p.z;
        a[(2 * k + 1, 7)] = 1.0;
        a[(2 * k + 1, 8)] = -v * p.x;
        a[(2 * k + 1, 9)] = -v * p.y;
        a[(2 * k + 1, 10)] = -v * p.z;
        a[(2 * k + 1, 11)] = -v;
    }

    let svd = a.svd(false, true);
    let vt = svd.v_t.ok_or(PnpError::DegenerateGeometry)?;
    let last = vt.nrows() - 1;
    let p = vt.row(last);
    let pn = Matrix3x4::from_row_slice(&[
        p[0], p[1], p[2], p[3], //
        p[4], p[5], p[6], p[7], //
        p[8], p[9], p[10], p[11],
    ]);

    // Undo the conditioning: P = T2^-1 * Pn * T3.
    let t2_inv = t2.try_inverse().ok_or(PnpError::DegenerateGeometry)?;
    let mut proj = t2_inv * pn * t3;

    let m = proj.fixed_view::<3, 3>(0, 0).into_owned();
    let det = m.determinant();
    if det.abs() < TINY {
        return Err(PnpError::DegenerateGeometry);
    }
    if det < 0.0 {
        proj = -proj;
    }

    // Rows of a true [R|t] have unit norm; the third row fixes the scale.
    let row_scale = proj.fixed_view::<1, 3>(2, 0).norm();
    if row_scale < TINY {
        return Err(PnpError::DegenerateGeometry);
    }
    proj /= row_scale;

    let m = proj.fixed_view::<3, 3>(0, 0).into_owned();
    let rotation = nearest_rotation(&m).ok_or(PnpError::DegenerateGeometry)?;
    let translation = proj.column(3).into_owned();
    Ok((rotation, translation))
}

fn hartley_normalization(cx: f64, cy: f64, mean_dist: f64) -> Matrix3<f64> {
    let s = if mean_dist > TINY {
        (2.0_f64).sqrt() / mean_dist
    } else {
        1.0
    };
    Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0)
}

/// Hartley normalization: translate to the centroid, scale so the mean
/// distance is sqrt(2).
fn normalize_points(pts: &[Point2<f64>]) -> (Vec<Point2<f64>>, Matrix3<f64>) {
    let n = pts.len() as f64;
    let mut cx = 0.0;
    let mut cy = 0.0;
    for p in pts {
        cx += p.x;
        cy += p.y;
    }
    cx /= n;
    cy /= n;

    let mut mean_dist = 0.0;
    for p in pts {
        let dx = p.x - cx;
        let dy = p.y - cy;
        mean_dist += (dx * dx + dy * dy).sqrt();
    }
    mean_dist /= n;

    let t = hartley_normalization(cx, cy, mean_dist);
    let out = pts
        .iter()
        .map(|p| {
            let v = t * Vector3::new(p.x, p.y, 1.0);
            Point2::new(v[0], v[1])
        })
        .collect();
    (out, t)
}

/// 3D analogue of the Hartley conditioning for the projection-matrix DLT.
fn normalize_points3(pts: &[Point3<f64>]) -> (Vec<Point3<f64>>, Matrix4<f64>) {
    let n = pts.len() as f64;
    let c = pts.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / n;
    let mean_dist = pts.iter().map(|p| (p.coords - c).norm()).sum::<f64>() / n;
    let s = if mean_dist > TINY {
        (3.0_f64).sqrt() / mean_dist
    } else {
        1.0
    };

    let t = Matrix4::new(
        s, 0.0, 0.0, -s * c.x, //
        0.0, s, 0.0, -s * c.y, //
        0.0, 0.0, s, -s * c.z, //
        0.0, 0.0, 0.0, 1.0,
    );
    let out = pts.iter().map(|p| Point3::from((p.coords - c) * s)).collect();
    (out, t)
}

/// DLT estimate of H with `ray ~ H * plane`. The overall scale stays free.
fn estimate_homography(plane: &[Point2<f64>], rays: &[Point2<f64>]) -> Option<Matrix3<f64>> {
    if plane.len() == 4 {
        return homography_from_4pt(plane, rays);
    }

    let (src, t_src) = normalize_points(plane);
    let (dst, t_dst) = normalize_points(rays);

    let n = plane.len();
    let mut a = DMatrix::<f64>::zeros(2 * n, 9);
    for k in 0..n {
        let x = src[k].x;
        let y = src[k].y;
        let u = dst[k].x;
        let v = dst[k].y;

        // [ -x -y -1   0  0  0   u*x u*y u ]
        a[(2 * k, 0)] = -x;
        a[(2 * k, 1)] = -y;
        a[(2 * k, 2)] = -1.0;
        a[(2 * k, 6)] = u * x;
        a[(2 * k, 7)] = u * y;
        a[(2 * k, 8)] = u;

        // [ 0  0  0  -x -y -1   v*x v*y v ]
        a[(2 * k + 1, 3)] = -x;
        a[(2 * k + 1, 4)] = -y;
        a[(2 * k + 1, 5)] = -1.0;
        a[(2 * k + 1, 6)] = v * x;
        a[(2 * k + 1, 7)] = v * y;
        a[(2 * k + 1, 8)] = v;
    }

    // h is the right singular vector with the smallest singular value.
    let svd = a.svd(false, true);
    let vt = svd.v_t?;
    let last = vt.nrows().checked_sub(1)?;
    let h = vt.row(last);
    let hn = Matrix3::from_row_slice(&[h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]]);

    let t_dst_inv = t_dst.try_inverse()?;
    Some(t_dst_inv * hn * t_src)
}

/// Four-point specialization: the thin SVD of an 8x9 system omits the null
/// direction, so solve with `h33 = 1` in the normalized frame instead.
fn homography_from_4pt(src: &[Point2<f64>], dst: &[Point2<f64>]) -> Option<Matrix3<f64>> {
    let (src_n, t_src) = normalize_points(src);
    let (dst_n, t_dst) = normalize_points(dst);

    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();

    for k in 0..4 {
        let x = src_n[k].x;
        let y = src_n[k].y;
        let u = dst_n[k].x;
        let v = dst_n[k].y;

        let r0 = 2 * k;
        a[(r0, 0)] = x;
        a[(r0, 1)] = y;
        a[(r0, 2)] = 1.0;
        a[(r0, 6)] = -u * x;
        a[(r0, 7)] = -u * y;
        b[r0] = u;

        let r1 = 2 * k + 1;
        a[(r1, 3)] = x;
        a[(r1, 4)] = y;
        a[(r1, 5)] = 1.0;
        a[(r1, 6)] = -v * x;
        a[(r1, 7)] = -v * y;
        b[r1] = v;
    }

    let x = a.lu().solve(&b)?;
    let hn = Matrix3::new(
        x[0], x[1], x[2], //
        x[3], x[4], x[5], //
        x[6], x[7], 1.0,
    );

    let t_dst_inv = t_dst.try_inverse()?;
    Some(t_dst_inv * hn * t_src)
}

/// Nearest proper rotation in the Frobenius sense.
fn nearest_rotation(m: &Matrix3<f64>) -> Option<Matrix3<f64>> {
    let svd = m.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let sign = (u * v_t).determinant().signum();
    let d = Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, sign));
    Some(u * d * v_t)
}

struct Refined {
    rotation: Matrix3<f64>,
    translation: Vector3<f64>,
    iterations: usize,
    converged: bool,
}

/// Gauss-Newton polish of the reprojection residual in normalized
/// coordinates, with step backtracking.
fn refine(
    world: &[Point3<f64>],
    rays: &[Point2<f64>],
    rotation: Matrix3<f64>,
    translation: Vector3<f64>,
    params: &SolveParams,
) -> Result<Refined, PnpError> {
    let mut rot = Rotation3::from_matrix_unchecked(rotation);
    let mut t = translation;

    let mut cost = residual_cost(world, rays, &rot, &t).ok_or(PnpError::DegenerateGeometry)?;
    let mut converged = false;
    let mut iterations = 0;

    for _ in 0..params.max_iterations {
        let Some((jtj, jtr)) = normal_equations(world, rays, &rot, &t) else {
            // A point drifted behind the camera; keep the last good state.
            break;
        };

        let mut step = match jtj.lu().solve(&(-jtr)) {
            Some(s) => s,
            None => {
                let damped = jtj + Matrix6::identity() * 1e-9;
                match damped.lu().solve(&(-jtr)) {
                    Some(s) => s,
                    None => break,
                }
            }
        };

        // A vanishing step means the start is already at the optimum.
        if step.norm() < params.tolerance {
            iterations += 1;
            converged = true;
            break;
        }

        // Backtrack until the step stops increasing the cost.
        let mut accepted = false;
        for _ in 0..8 {
            let w = Vector3::new(step[0], step[1], step[2]);
            let dt = Vector3::new(step[3], step[4], step[5]);
            let rot_new = Rotation3::from_scaled_axis(w) * rot;
            let t_new = t + dt;
            if let Some(c) = residual_cost(world, rays, &rot_new, &t_new) {
                if c <= cost {
                    rot = rot_new;
                    t = t_new;
                    cost = c;
                    accepted = true;
                    break;
                }
            }
            step /= 2.0;
        }

        iterations += 1;
        if !accepted {
            break;
        }
        if step.norm() < params.tolerance {
            converged = true;
            break;
        }
    }

    log::trace!("pnp refine: iterations={iterations}, converged={converged}, cost={cost:.3e}");

    Ok(Refined {
        rotation: rot.into_inner(),
        translation: t,
        iterations,
        converged,
    })
}

fn residual_cost(
    world: &[Point3<f64>],
    rays: &[Point2<f64>],
    rot: &Rotation3<f64>,
    t: &Vector3<f64>,
) -> Option<f64> {
    let mut cost = 0.0;
    for (p, ray) in world.iter().zip(rays) {
        let pc = rot * p.coords + t;
        if pc.z <= MIN_DEPTH {
            return None;
        }
        let du = pc.x / pc.z - ray.x;
        let dv = pc.y / pc.z - ray.y;
        cost += du * du + dv * dv;
    }
    Some(cost)
}

fn normal_equations(
    world: &[Point3<f64>],
    rays: &[Point2<f64>],
    rot: &Rotation3<f64>,
    t: &Vector3<f64>,
) -> Option<(Matrix6<f64>, Vector6<f64>)> {
    let mut jtj = Matrix6::zeros();
    let mut jtr = Vector6::zeros();

    for (p, ray) in world.iter().zip(rays) {
        let pc = rot * p.coords + t;
        if pc.z <= MIN_DEPTH {
            return None;
        }
        let zinv = 1.0 / pc.z;
        let u = pc.x * zinv;
        let v = pc.y * zinv;

        let duv = Matrix2x3::new(
            zinv, 0.0, -u * zinv, //
            0.0, zinv, -v * zinv,
        );
        // Left perturbation: d(exp(w) * pc + dt) / d(w, dt) = [-[pc]x | I].
        let mut dpc = Matrix3x6::zeros();
        dpc.fixed_view_mut::<3, 3>(0, 0).copy_from(&(-pc.cross_matrix()));
        dpc.fixed_view_mut::<3, 3>(0, 3).copy_from(&Matrix3::identity());

        let j: Matrix2x6<f64> = duv * dpc;
        let r = Vector2::new(u - ray.x, v - ray.y);

        jtj += j.transpose() * j;
        jtr += j.transpose() * r;
    }
    Some((jtj, jtr))
}

fn pixel_rmse(
    world: &[Point3<f64>],
    image: &[Point2<f64>],
    rotation: &Matrix3<f64>,
    translation: &Vector3<f64>,
    intrinsics: &CameraIntrinsics,
) -> f64 {
    let mut sum = 0.0;
    for (proj, obs) in project_points(world, rotation, translation, intrinsics)
        .into_iter()
        .zip(image)
    {
        match proj {
            Some(p) => sum += (p - obs).norm_squared(),
            None => return f64::INFINITY,
        }
    }
    (sum / world.len() as f64).sqrt()
}
