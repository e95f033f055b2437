use thiserror::Error;

use crate::detect::result::PoseEstimate;
use crate::frame::Frame;

/// Recoverable failure of a single detection call.
///
/// The frame processor skips the overlay and gesture logic for the frame and
/// moves on; one bad frame never ends the session.
#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("frame rejected by backend: {0}")]
    InvalidFrame(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("malformed backend output: {0}")]
    MalformedOutput(String),
}

/// Pose backend trait (the keypoint extractor).
///
/// Implementations treat the frame as read-only and must not retain it past
/// the `detect` call.
pub trait PoseBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Detect poses in a frame and report the inference latency.
    fn detect(&mut self, frame: &Frame) -> Result<PoseEstimate, ExtractorError>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<(), ExtractorError> {
        Ok(())
    }
}
