//! Frame ingestion sources.
//!
//! - Camera devices through GStreamer (feature: camera-gstreamer)
//! - Still-image directories (feature: ingest-images)
//! - Stub source (`stub://`, testing)
//!
//! All sources produce RGB24 `Frame`s at the configured sink size, already
//! mirrored when mirroring is enabled.

pub mod camera;
#[cfg(feature = "ingest-images")]
pub mod images;

pub use camera::{CameraConfig, CameraSource, CameraStats};
#[cfg(feature = "ingest-images")]
pub use images::{ImageDirConfig, ImageDirSource};
