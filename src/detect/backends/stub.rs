use std::time::Instant;

use rand::Rng;

use crate::detect::backend::{ExtractorError, PoseBackend};
use crate::detect::result::{BodyPart, Keypoint, Pose, PoseEstimate};
use crate::frame::Frame;

/// Normalized (row, col) of a standing person with both arms down.
const STANDING: [(f32, f32); 17] = [
    (0.25, 0.50), // nose
    (0.22, 0.53), // left eye
    (0.22, 0.47), // right eye
    (0.23, 0.56), // left ear
    (0.23, 0.44), // right ear
    (0.35, 0.60), // left shoulder
    (0.35, 0.40), // right shoulder
    (0.50, 0.63), // left elbow
    (0.50, 0.37), // right elbow
    (0.62, 0.64), // left wrist
    (0.62, 0.36), // right wrist
    (0.62, 0.56), // left hip
    (0.62, 0.44), // right hip
    (0.78, 0.56), // left knee
    (0.78, 0.44), // right knee
    (0.93, 0.56), // left ankle
    (0.93, 0.44), // right ankle
];

const RAISED_LEFT_ELBOW: (f32, f32) = (0.25, 0.66);
const RAISED_LEFT_WRIST: (f32, f32) = (0.12, 0.66);

const KEYPOINT_SCORE: f32 = 0.9;

/// Stub backend for demos and tests.
///
/// Reports one synthetic person centred in the frame. The last `raise_frames`
/// frames of every `raise_period` frames have the left hand raised above eye level.
pub struct StubBackend {
    raise_period: u64,
    raise_frames: u64,
    jitter_px: f32,
    frames_seen: u64,
}

impl StubBackend {
    pub fn new(raise_period: u64, raise_frames: u64) -> Self {
        Self {
            raise_period,
            raise_frames: raise_frames.min(raise_period),
            jitter_px: 0.0,
            frames_seen: 0,
        }
    }

    /// Add uniform positional noise of up to `jitter_px` pixels per keypoint.
    pub fn with_jitter(mut self, jitter_px: f32) -> Self {
        self.jitter_px = jitter_px.max(0.0);
        self
    }

    fn hand_raised(&self) -> bool {
        if self.raise_period == 0 || self.raise_frames == 0 {
            return false;
        }
        let phase = (self.frames_seen - 1) % self.raise_period;
        phase >= self.raise_period - self.raise_frames
    }

    fn synthesize(&self, width: u32, height: u32) -> Pose {
        let raised = self.hand_raised();
        let mut rng = rand::thread_rng();
        let mut pose = Pose::new(KEYPOINT_SCORE);
        for (part, &(y, x)) in BodyPart::ALL.iter().zip(STANDING.iter()) {
            let (y, x) = match (raised, part) {
                (true, BodyPart::LeftElbow) => RAISED_LEFT_ELBOW,
                (true, BodyPart::LeftWrist) => RAISED_LEFT_WRIST,
                _ => (y, x),
            };
            let (mut row, mut col) = (y * height as f32, x * width as f32);
            if self.jitter_px > 0.0 {
                row += rng.gen_range(-self.jitter_px..=self.jitter_px);
                col += rng.gen_range(-self.jitter_px..=self.jitter_px);
            }
            pose.keypoints
                .insert(*part, Keypoint::new(row, col, KEYPOINT_SCORE));
        }
        pose
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new(100, 10)
    }
}

impl PoseBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, frame: &Frame) -> Result<PoseEstimate, ExtractorError> {
        let started = Instant::now();
        if frame.width == 0 || frame.height == 0 {
            return Err(ExtractorError::InvalidFrame("empty frame".to_string()));
        }
        self.frames_seen += 1;
        let pose = self.synthesize(frame.width, frame.height);
        Ok(PoseEstimate {
            poses: vec![pose],
            inference: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Frame {
        Frame::new(1, vec![0u8; 64 * 48 * 3], 64, 48).unwrap()
    }

    fn wrist_above_eye(estimate: &PoseEstimate) -> bool {
        let pose = &estimate.poses[0];
        let wrist = pose.keypoint(BodyPart::LeftWrist).unwrap();
        let eye = pose.keypoint(BodyPart::LeftEye).unwrap();
        wrist.row < eye.row
    }

    #[test]
    fn stub_backend_raises_hand_at_end_of_period() {
        let mut backend = StubBackend::new(4, 1);
        let frame = frame();

        let raised: Vec<bool> = (0..8)
            .map(|_| wrist_above_eye(&backend.detect(&frame).unwrap()))
            .collect();
        assert_eq!(
            raised,
            vec![false, false, false, true, false, false, false, true]
        );
    }

    #[test]
    fn stub_backend_never_raises_with_zero_period() {
        let mut backend = StubBackend::new(0, 5);
        let frame = frame();
        for _ in 0..10 {
            assert!(!wrist_above_eye(&backend.detect(&frame).unwrap()));
        }
    }

    #[test]
    fn stub_backend_scales_to_frame() {
        let mut backend = StubBackend::default();
        let estimate = backend.detect(&frame()).unwrap();
        let nose = estimate.poses[0].keypoint(BodyPart::Nose).unwrap();
        assert_eq!(nose.row, 12.0);
        assert_eq!(nose.col, 32.0);
        assert_eq!(estimate.poses[0].keypoints.len(), 17);
    }
}
