//! Raised-hand gesture classification.
//!
//! A pose shows the "help" gesture when its left wrist is confidently detected
//! above the left eye. Image rows grow downwards, so "above" means a smaller row.

use crate::detect::{BodyPart, Pose};

/// Default minimum left-wrist confidence.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;

/// Pure per-frame gesture decision.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GestureClassifier {
    confidence_threshold: f32,
}

impl GestureClassifier {
    pub fn new(confidence_threshold: f32) -> Self {
        Self {
            confidence_threshold,
        }
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    /// True when the wrist score is strictly above the threshold and the wrist
    /// row is strictly above the eye row. Missing keypoints never trigger.
    pub fn is_raised(&self, pose: &Pose) -> bool {
        let (Some(wrist), Some(eye)) = (
            pose.keypoint(BodyPart::LeftWrist),
            pose.keypoint(BodyPart::LeftEye),
        ) else {
            return false;
        };
        wrist.score > self.confidence_threshold && wrist.row < eye.row
    }

    /// True if any pose in the frame triggers.
    pub fn detect(&self, poses: &[Pose]) -> bool {
        poses.iter().any(|pose| self.is_raised(pose))
    }

    /// Number of triggering poses in the frame.
    pub fn count_triggering(&self, poses: &[Pose]) -> usize {
        poses.iter().filter(|pose| self.is_raised(pose)).count()
    }
}

impl Default for GestureClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIDENCE_THRESHOLD)
    }
}
