mod backend;
mod backends;
mod registry;
mod result;

pub use backend::{ExtractorError, PoseBackend};
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use registry::BackendRegistry;
pub use result::{decode_single_pose, BodyPart, Keypoint, Pose, PoseEstimate, SKELETON_EDGES};
