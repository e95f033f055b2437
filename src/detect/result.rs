use std::collections::BTreeMap;
use std::time::Duration;

use super::backend::ExtractorError;

/// Body-part labels in model output order (COCO keypoint order).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BodyPart {
    Nose,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl BodyPart {
    pub const ALL: [BodyPart; 17] = [
        BodyPart::Nose,
        BodyPart::LeftEye,
        BodyPart::RightEye,
        BodyPart::LeftEar,
        BodyPart::RightEar,
        BodyPart::LeftShoulder,
        BodyPart::RightShoulder,
        BodyPart::LeftElbow,
        BodyPart::RightElbow,
        BodyPart::LeftWrist,
        BodyPart::RightWrist,
        BodyPart::LeftHip,
        BodyPart::RightHip,
        BodyPart::LeftKnee,
        BodyPart::RightKnee,
        BodyPart::LeftAnkle,
        BodyPart::RightAnkle,
    ];

    pub fn label(self) -> &'static str {
        match self {
            BodyPart::Nose => "nose",
            BodyPart::LeftEye => "left eye",
            BodyPart::RightEye => "right eye",
            BodyPart::LeftEar => "left ear",
            BodyPart::RightEar => "right ear",
            BodyPart::LeftShoulder => "left shoulder",
            BodyPart::RightShoulder => "right shoulder",
            BodyPart::LeftElbow => "left elbow",
            BodyPart::RightElbow => "right elbow",
            BodyPart::LeftWrist => "left wrist",
            BodyPart::RightWrist => "right wrist",
            BodyPart::LeftHip => "left hip",
            BodyPart::RightHip => "right hip",
            BodyPart::LeftKnee => "left knee",
            BodyPart::RightKnee => "right knee",
            BodyPart::LeftAnkle => "left ankle",
            BodyPart::RightAnkle => "right ankle",
        }
    }
}

/// Skeleton edges drawn by the overlay.
pub const SKELETON_EDGES: [(BodyPart, BodyPart); 19] = [
    (BodyPart::Nose, BodyPart::LeftEye),
    (BodyPart::Nose, BodyPart::RightEye),
    (BodyPart::Nose, BodyPart::LeftEar),
    (BodyPart::Nose, BodyPart::RightEar),
    (BodyPart::LeftEar, BodyPart::LeftEye),
    (BodyPart::RightEar, BodyPart::RightEye),
    (BodyPart::LeftEye, BodyPart::RightEye),
    (BodyPart::LeftShoulder, BodyPart::RightShoulder),
    (BodyPart::LeftShoulder, BodyPart::LeftElbow),
    (BodyPart::LeftShoulder, BodyPart::LeftHip),
    (BodyPart::RightShoulder, BodyPart::RightElbow),
    (BodyPart::RightShoulder, BodyPart::RightHip),
    (BodyPart::LeftElbow, BodyPart::LeftWrist),
    (BodyPart::RightElbow, BodyPart::RightWrist),
    (BodyPart::LeftHip, BodyPart::RightHip),
    (BodyPart::LeftHip, BodyPart::LeftKnee),
    (BodyPart::RightHip, BodyPart::RightKnee),
    (BodyPart::LeftKnee, BodyPart::LeftAnkle),
    (BodyPart::RightKnee, BodyPart::RightAnkle),
];

/// A labeled body-part location in image pixels (row grows downwards).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Keypoint {
    pub row: f32,
    pub col: f32,
    /// Confidence in 0..=1.
    pub score: f32,
}

impl Keypoint {
    pub fn new(row: f32, col: f32, score: f32) -> Self {
        Self { row, col, score }
    }
}

/// One detected person. Low-confidence parts may be absent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Pose {
    pub score: f32,
    pub keypoints: BTreeMap<BodyPart, Keypoint>,
}

impl Pose {
    pub fn new(score: f32) -> Self {
        Self {
            score,
            keypoints: BTreeMap::new(),
        }
    }

    pub fn with_keypoint(mut self, part: BodyPart, keypoint: Keypoint) -> Self {
        self.keypoints.insert(part, keypoint);
        self
    }

    pub fn keypoint(&self, part: BodyPart) -> Option<&Keypoint> {
        self.keypoints.get(&part)
    }
}

/// Backend output for one frame.
#[derive(Clone, Debug, Default)]
pub struct PoseEstimate {
    pub poses: Vec<Pose>,
    /// Inference latency as reported by the backend.
    pub inference: Duration,
}

impl PoseEstimate {
    pub fn inference_ms(&self) -> f64 {
        self.inference.as_secs_f64() * 1000.0
    }
}

/// Decode a flat `[17 x (y, x, score)]` single-pose tensor with normalized
/// coordinates into pixel space.
pub fn decode_single_pose(values: &[f32], width: u32, height: u32) -> Result<Pose, ExtractorError> {
    let expected = BodyPart::ALL.len() * 3;
    if values.len() != expected {
        return Err(ExtractorError::MalformedOutput(format!(
            "expected {} keypoint values, got {}",
            expected,
            values.len()
        )));
    }

    let mut pose = Pose::default();
    let mut score_sum = 0.0f32;
    for (part, chunk) in BodyPart::ALL.iter().zip(values.chunks_exact(3)) {
        let (y, x, score) = (chunk[0], chunk[1], chunk[2]);
        if !(y.is_finite() && x.is_finite() && score.is_finite()) {
            return Err(ExtractorError::MalformedOutput(format!(
                "non-finite value for {}",
                part.label()
            )));
        }
        let row = y * height as f32;
        let col = x * width as f32;
        let score = score.clamp(0.0, 1.0);
        score_sum += score;
        pose.keypoints.insert(*part, Keypoint::new(row, col, score));
    }
    pose.score = score_sum / BodyPart::ALL.len() as f32;
    Ok(pose)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_scales_normalized_coordinates() {
        let mut values = vec![0.0f32; 51];
        // left wrist is index 9
        values[27] = 0.25;
        values[28] = 0.5;
        values[29] = 0.8;

        let pose = decode_single_pose(&values, 640, 480).unwrap();
        let wrist = pose.keypoint(BodyPart::LeftWrist).unwrap();
        assert_eq!(wrist.row, 120.0);
        assert_eq!(wrist.col, 320.0);
        assert_eq!(wrist.score, 0.8);
        assert_eq!(pose.keypoints.len(), 17);
    }

    #[test]
    fn decode_rejects_non_finite_values() {
        let mut values = vec![0.0f32; 51];
        values[4] = f32::NAN;
        assert!(decode_single_pose(&values, 640, 480).is_err());
    }

    #[test]
    fn decode_rejects_wrong_length() {
        let err = decode_single_pose(&[0.0; 10], 640, 480).unwrap_err();
        assert!(matches!(err, ExtractorError::MalformedOutput(_)));
    }

    #[test]
    fn labels_match_model_order() {
        assert_eq!(BodyPart::ALL[9].label(), "left wrist");
        assert_eq!(BodyPart::ALL[1].label(), "left eye");
    }
}
