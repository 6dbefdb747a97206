//! Head-pose frontality gate.
//!
//! Plug in a facial landmark detector and the gate decides, per frame,
//! whether the first detected face looks straight enough at the camera:
//! six canonical landmarks are lifted to a metric pose with a pinhole
//! camera model, the pose is reduced to roll/pitch/yaw in degrees, and
//! each angle is tested against a configurable margin.
//!
//! ```
//! use head_pose::{
//!     Evaluation, FrameView, LandmarkDetector, LandmarkSet, PoseEvaluator, PoseMargins,
//!     RejectReason,
//! };
//!
//! struct NoFaces;
//!
//! impl LandmarkDetector for NoFaces {
//!     fn detect(&self, _frame: &FrameView<'_>) -> Vec<LandmarkSet> {
//!         Vec::new()
//!     }
//! }
//!
//! let gate = PoseEvaluator::new(NoFaces);
//! let pixels = vec![0u8; 64 * 48];
//! let frame = FrameView { width: 64, height: 48, data: &pixels };
//! let outcome = gate.evaluate(&frame, &PoseMargins::default())?;
//! assert_eq!(outcome, Evaluation::Rejected(RejectReason::NoFace));
//! # Ok::<(), head_pose::EvaluateError>(())
//! ```

mod error;
mod evaluator;
mod frame;
mod landmarks;
mod margins;
mod result;

pub use head_pose_core as core;

pub use error::EvaluateError;
pub use evaluator::{evaluate_landmarks, head_pose, PoseEvaluator};
pub use frame::{FrameSize, FrameView};
pub use landmarks::{
    CanonicalIndices, CanonicalLandmark, LandmarkDetector, LandmarkPoint, LandmarkSet,
    CANONICAL_ROLES,
};
pub use margins::{Axis, InvalidMargin, PoseMargins};
pub use result::{EulerAngles, Evaluation, HeadPose, RejectReason};

pub use head_pose_core::{PnpError, PnpSolution};
