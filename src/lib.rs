//! Pose Sentinel
//!
//! Watches a camera feed for people raising a hand and raises a rate-limited
//! alert over a Sigfox serial modem.
//!
//! # Architecture
//!
//! Each decoded frame goes through the `FrameProcessor`:
//!
//! 1. A pose backend turns the frame into zero or more poses.
//! 2. Session metrics are updated and a summary line is drawn.
//! 3. Each pose is drawn; the gesture classifier checks whether the left wrist
//!    is confidently above the left eye.
//! 4. A triggering frame asks the alert channel for an alert. The channel applies
//!    a cooldown and sends an incrementing counter through the modem handshake.
//!
//! # Module Structure
//!
//! - `frame`: RGB24 frames handed over by sources
//! - `ingest`: Frame sources (camera, image directories, stub)
//! - `detect`: Pose types, backends and the backend registry
//! - `gesture`: Raised-hand classification
//! - `metrics`: Per-frame timing and running averages
//! - `overlay`: Pose/summary drawing onto a `DrawSurface`
//! - `alert`: Rate limiter, Sigfox transport and background dispatch
//! - `pipeline`: The per-frame processing step
//! - `config`: Layered daemon configuration

pub mod alert;
pub mod config;
pub mod detect;
pub mod frame;
pub mod gesture;
pub mod ingest;
pub mod metrics;
pub mod overlay;
pub mod pipeline;

pub use alert::{
    AlertChannel, AlertDecision, AlertDispatch, AlertTransport, CounterOrder, LogTransport,
    RateLimiter, SerialSigfoxTransport, SigfoxConfig, TransmitError,
};
pub use config::{Resolution, SentinelConfig, TransportKind};
pub use detect::{
    BackendRegistry, BodyPart, ExtractorError, Keypoint, Pose, PoseBackend, PoseEstimate,
    StubBackend,
};
pub use frame::Frame;
pub use gesture::GestureClassifier;
pub use ingest::{CameraConfig, CameraSource};
pub use metrics::{MetricsAggregator, MetricsSnapshot};
pub use overlay::{DrawSurface, SvgOverlay};
pub use pipeline::{FrameProcessor, FrameReport};
