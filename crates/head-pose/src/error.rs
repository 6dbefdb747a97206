//! Error channel for caller mistakes.
//!
//! Runtime conditions the gate expects (no face, unsolvable geometry, wide
//! pose) are reported through [`crate::Evaluation`]; this enum is reserved
//! for inputs that violate the API contract.

use head_pose_core::PnpError;
use thiserror::Error;

use crate::landmarks::CanonicalLandmark;

/// Errors returned by the evaluation entry points.
#[derive(Debug, Error)]
pub enum EvaluateError {
    #[error("frame has no pixels ({width}x{height})")]
    EmptyFrame { width: usize, height: usize },
    #[error("landmark set is missing the {role} point (mesh index {index})")]
    MissingLandmark {
        role: CanonicalLandmark,
        index: u32,
    },
    /// Carried by [`crate::head_pose`]; the gate itself folds this into
    /// `Rejected(SolveFailed)`.
    #[error(transparent)]
    Solve(#[from] PnpError),
}
