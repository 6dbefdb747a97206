//! The frontality gate pipeline.
//!
//! A frame is accepted when the head pose fitted to six canonical facial
//! landmarks stays inside the configured roll/pitch/yaw margins. Expected
//! conditions (no face, unsolvable geometry, a wide pose) come back as
//! [`Evaluation::Rejected`]; only contract violations surface as
//! [`EvaluateError`].

use nalgebra::{Point2, Point3};

use head_pose_core::{euler_turns, solve_pnp, CameraIntrinsics};

use crate::error::EvaluateError;
use crate::frame::{FrameSize, FrameView};
use crate::landmarks::{
    CanonicalIndices, LandmarkDetector, LandmarkPoint, LandmarkSet, CANONICAL_ROLES,
};
use crate::margins::PoseMargins;
use crate::result::{EulerAngles, Evaluation, HeadPose, RejectReason};

/// Frontality gate over a landmark detector.
///
/// When the detector reports several faces, only the first one is evaluated;
/// detectors are expected to order faces by confidence.
pub struct PoseEvaluator<D> {
    detector: D,
    indices: CanonicalIndices,
}

impl<D: LandmarkDetector> PoseEvaluator<D> {
    /// Gate with the MediaPipe FaceMesh canonical indices.
    pub fn new(detector: D) -> Self {
        Self::with_indices(detector, CanonicalIndices::default())
    }

    /// Gate with a custom role-to-index mapping.
    pub fn with_indices(detector: D, indices: CanonicalIndices) -> Self {
        Self { detector, indices }
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn indices(&self) -> &CanonicalIndices {
        &self.indices
    }

    /// Run the detector on `frame` and test the first face against `margins`.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all))]
    pub fn evaluate(
        &self,
        frame: &FrameView<'_>,
        margins: &PoseMargins,
    ) -> Result<Evaluation, EvaluateError> {
        let size = frame.size();
        if size.is_empty() {
            return Err(EvaluateError::EmptyFrame {
                width: size.width,
                height: size.height,
            });
        }

        let faces = self.detector.detect(frame);
        match faces.first() {
            Some(face) => evaluate_landmarks(face, size, &self.indices, margins),
            None => Ok(Evaluation::Rejected(RejectReason::NoFace)),
        }
    }

    /// Diagnostic pose of the first face, without the margin test.
    ///
    /// Returns `Ok(None)` when no face is found. Unlike [`Self::evaluate`],
    /// solver failures surface as `EvaluateError::Solve`.
    pub fn head_pose(&self, frame: &FrameView<'_>) -> Result<Option<HeadPose>, EvaluateError> {
        let size = frame.size();
        if size.is_empty() {
            return Err(EvaluateError::EmptyFrame {
                width: size.width,
                height: size.height,
            });
        }

        match self.detector.detect(frame).first() {
            Some(face) => head_pose(face, size, &self.indices).map(Some),
            None => Ok(None),
        }
    }
}

/// Test one landmark set against the margins.
///
/// The returned `Result` never carries `EvaluateError::Solve`; geometry the
/// solver cannot handle is folded into `Rejected(SolveFailed)`.
pub fn evaluate_landmarks(
    set: &LandmarkSet,
    size: FrameSize,
    indices: &CanonicalIndices,
    margins: &PoseMargins,
) -> Result<Evaluation, EvaluateError> {
    match head_pose(set, size, indices) {
        Ok(pose) => Ok(match margins.first_violation(&pose.angles) {
            Some(axis) => {
                log::debug!("pose rejected on {axis}: {}", pose.angles);
                Evaluation::Rejected(RejectReason::Margin(axis))
            }
            None => Evaluation::Accepted,
        }),
        Err(EvaluateError::Solve(err)) => {
            log::debug!("pose fit failed: {err}");
            Ok(Evaluation::Rejected(RejectReason::SolveFailed))
        }
        Err(other) => Err(other),
    }
}

/// Fit the head pose to one landmark set.
#[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all))]
pub fn head_pose(
    set: &LandmarkSet,
    size: FrameSize,
    indices: &CanonicalIndices,
) -> Result<HeadPose, EvaluateError> {
    if size.is_empty() {
        return Err(EvaluateError::EmptyFrame {
            width: size.width,
            height: size.height,
        });
    }

    let points = resolve_points(set, indices)?;

    let mut world = Vec::with_capacity(points.len());
    let mut image = Vec::with_capacity(points.len());
    for p in &points {
        let px = truncated_pixel(p.x, size.width);
        let py = truncated_pixel(p.y, size.height);
        world.push(Point3::new(px, py, f64::from(p.z)));
        image.push(Point2::new(px, py));
    }

    let intrinsics = CameraIntrinsics::from_frame(size.width, size.height);
    let solution = solve_pnp(&world, &image, &intrinsics)?;
    let angles = EulerAngles::from_turns(euler_turns(&solution.rotation));
    log::debug!(
        "pose fit: {angles}, rmse={:.3}px, iterations={}",
        solution.reproj_rmse,
        solution.iterations
    );

    Ok(HeadPose {
        angles,
        rotation: solution.rotation,
        rvec: solution.rvec,
        translation: solution.translation,
        reproj_rmse: solution.reproj_rmse,
        iterations: solution.iterations,
    })
}

/// The six canonical points in fixed role order.
fn resolve_points(
    set: &LandmarkSet,
    indices: &CanonicalIndices,
) -> Result<Vec<LandmarkPoint>, EvaluateError> {
    let mut points = Vec::with_capacity(CANONICAL_ROLES.len());
    for role in CANONICAL_ROLES {
        let index = indices.index(role);
        let point = set
            .point(index)
            .ok_or(EvaluateError::MissingLandmark { role, index })?;
        points.push(*point);
    }
    Ok(points)
}

/// Normalized coordinate to an integer pixel position, truncated toward zero.
fn truncated_pixel(norm: f32, extent: usize) -> f64 {
    (f64::from(norm) * extent as f64).trunc()
}
