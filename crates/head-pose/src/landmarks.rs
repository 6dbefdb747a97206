//! Landmark model and the detector seam.
//!
//! Detectors report faces as sets of indexed landmarks in normalized image
//! coordinates. The gate only consumes the six canonical points named by
//! `CanonicalLandmark`; `CanonicalIndices` maps each role to a mesh index,
//! defaulting to the MediaPipe FaceMesh topology.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::frame::FrameView;

/// One detected landmark.
///
/// `x` and `y` are normalized to `[0, 1]` over the frame (detectors may emit
/// slightly out-of-range values near the border); `z` is relative depth in
/// the detector's own scale, more negative toward the camera for MediaPipe.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LandmarkPoint {
    /// Mesh index assigned by the detector.
    pub index: u32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// All landmarks of a single face.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LandmarkSet {
    points: Vec<LandmarkPoint>,
}

impl LandmarkSet {
    pub fn new(points: Vec<LandmarkPoint>) -> Self {
        Self { points }
    }

    /// Look up a landmark by its mesh index, not its position in the set.
    pub fn point(&self, index: u32) -> Option<&LandmarkPoint> {
        self.points.iter().find(|p| p.index == index)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LandmarkPoint> {
        self.points.iter()
    }
}

/// The six facial points the pose fit is anchored to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CanonicalLandmark {
    LeftEyeCorner,
    RightEyeCorner,
    NoseTip,
    MouthLeft,
    MouthRight,
    Chin,
}

impl fmt::Display for CanonicalLandmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LeftEyeCorner => "left-eye-corner",
            Self::RightEyeCorner => "right-eye-corner",
            Self::NoseTip => "nose-tip",
            Self::MouthLeft => "mouth-left",
            Self::MouthRight => "mouth-right",
            Self::Chin => "chin",
        };
        f.write_str(name)
    }
}

/// Fixed resolution order of the canonical points.
pub const CANONICAL_ROLES: [CanonicalLandmark; 6] = [
    CanonicalLandmark::LeftEyeCorner,
    CanonicalLandmark::RightEyeCorner,
    CanonicalLandmark::NoseTip,
    CanonicalLandmark::MouthLeft,
    CanonicalLandmark::MouthRight,
    CanonicalLandmark::Chin,
];

/// Mesh indices of the canonical points.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalIndices {
    pub left_eye_corner: u32,
    pub right_eye_corner: u32,
    pub nose_tip: u32,
    pub mouth_left: u32,
    pub mouth_right: u32,
    pub chin: u32,
}

impl CanonicalIndices {
    /// Indices of the 468-point MediaPipe FaceMesh topology.
    pub fn mediapipe_face_mesh() -> Self {
        Self {
            left_eye_corner: 33,
            right_eye_corner: 263,
            nose_tip: 1,
            mouth_left: 61,
            mouth_right: 291,
            chin: 199,
        }
    }

    pub fn index(&self, role: CanonicalLandmark) -> u32 {
        match role {
            CanonicalLandmark::LeftEyeCorner => self.left_eye_corner,
            CanonicalLandmark::RightEyeCorner => self.right_eye_corner,
            CanonicalLandmark::NoseTip => self.nose_tip,
            CanonicalLandmark::MouthLeft => self.mouth_left,
            CanonicalLandmark::MouthRight => self.mouth_right,
            CanonicalLandmark::Chin => self.chin,
        }
    }
}

impl Default for CanonicalIndices {
    fn default() -> Self {
        Self::mediapipe_face_mesh()
    }
}

/// A face landmark detector the gate can be built on.
///
/// Implementations return one `LandmarkSet` per detected face, best face
/// first; the gate evaluates only the first entry.
pub trait LandmarkDetector: Send + Sync {
    fn detect(&self, frame: &FrameView<'_>) -> Vec<LandmarkSet>;
}
