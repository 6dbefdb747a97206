//! Frame views passed to landmark detectors.

use serde::{Deserialize, Serialize};

/// Borrowed video frame, row-major.
///
/// The pixel layout (gray, RGB, ...) is a contract between the caller and
/// the detector; the gate itself only reads the dimensions.
#[derive(Clone, Copy, Debug)]
pub struct FrameView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8],
}

impl FrameView<'_> {
    pub fn size(&self) -> FrameSize {
        FrameSize {
            width: self.width,
            height: self.height,
        }
    }
}

/// Frame dimensions for the landmark-only entry points.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: usize,
    pub height: usize,
}

impl FrameSize {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}
