//! Camera frame source.
//!
//! `CameraSource` drives the frame loop from a local video device. It is
//! responsible for:
//! - Opening the capture device (V4L2 via GStreamer)
//! - Decoding (raw or H.264 input), scaling to the sink size and optional mirroring
//! - Producing RGB24 `Frame` instances
//!
//! `stub://` URLs produce synthetic frames without any device.

#[cfg(feature = "camera-gstreamer")]
use anyhow::Context;
use anyhow::Result;
#[cfg(feature = "camera-gstreamer")]
use std::time::{Duration, Instant};

use crate::frame::Frame;

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Device path (e.g., "/dev/video1") or "stub://name".
    pub url: String,
    /// Target frame rate (frames per second).
    pub target_fps: u32,
    /// Sink (output) frame width.
    pub width: u32,
    /// Sink (output) frame height.
    pub height: u32,
    /// Capture size requested from the device; `None` lets the device choose.
    pub source_size: Option<(u32, u32)>,
    /// Flip frames horizontally.
    pub mirror: bool,
    /// Device delivers H.264 instead of raw video.
    pub h264: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            url: "/dev/video1".to_string(),
            target_fps: 30,
            width: 640,
            height: 480,
            source_size: None,
            mirror: false,
            h264: false,
        }
    }
}

/// Camera frame source.
///
/// Uses GStreamer for real capture, with a synthetic fallback for `stub://` URLs.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCameraSource),
    #[cfg(feature = "camera-gstreamer")]
    Gstreamer(GstreamerCameraSource),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Result<Self> {
        if config.url.starts_with("stub://") {
            Ok(Self {
                backend: CameraBackend::Synthetic(SyntheticCameraSource::new(config)),
            })
        } else {
            #[cfg(feature = "camera-gstreamer")]
            {
                Ok(Self {
                    backend: CameraBackend::Gstreamer(GstreamerCameraSource::new(config)?),
                })
            }
            #[cfg(not(feature = "camera-gstreamer"))]
            {
                anyhow::bail!("camera capture requires the camera-gstreamer feature")
            }
        }
    }

    /// Start capturing.
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "camera-gstreamer")]
            CameraBackend::Gstreamer(source) => source.connect(),
        }
    }

    /// Capture the next frame.
    pub fn next_frame(&mut self) -> Result<Frame> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "camera-gstreamer")]
            CameraBackend::Gstreamer(source) => source.next_frame(),
        }
    }

    /// Check if the source is healthy.
    pub fn is_healthy(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.is_healthy(),
            #[cfg(feature = "camera-gstreamer")]
            CameraBackend::Gstreamer(source) => source.is_healthy(),
        }
    }

    /// Get frame statistics.
    pub fn stats(&self) -> CameraStats {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "camera-gstreamer")]
            CameraBackend::Gstreamer(source) => source.stats(),
        }
    }
}

/// Statistics for a camera source.
#[derive(Clone, Debug)]
pub struct CameraStats {
    pub frames_captured: u64,
    pub url: String,
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests
// ----------------------------------------------------------------------------

struct SyntheticCameraSource {
    config: CameraConfig,
    frame_count: u64,
}

impl SyntheticCameraSource {
    fn new(config: CameraConfig) -> Self {
        Self {
            config,
            frame_count: 0,
        }
    }

    /// Synthetic sources are always "connected".
    fn connect(&mut self) -> Result<()> {
        log::info!("CameraSource: connected to {} (synthetic)", self.config.url);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        self.frame_count += 1;
        let pixels = self.generate_synthetic_pixels();
        Frame::new(
            self.frame_count,
            pixels,
            self.config.width,
            self.config.height,
        )
    }

    /// Horizontal gradient that drifts one column per frame.
    fn generate_synthetic_pixels(&self) -> Vec<u8> {
        let width = self.config.width as u64;
        let pixel_count = (self.config.width * self.config.height) as usize;
        let mut pixels = Vec::with_capacity(pixel_count * 3);
        for i in 0..pixel_count as u64 {
            let mut col = i % width;
            if self.config.mirror {
                col = width - 1 - col;
            }
            let value = ((col + self.frame_count) % 256) as u8;
            pixels.extend_from_slice(&[value, value / 2, 255 - value]);
        }
        pixels
    }

    fn is_healthy(&self) -> bool {
        true
    }

    fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            url: self.config.url.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// GStreamer capture
// ----------------------------------------------------------------------------

#[cfg(feature = "camera-gstreamer")]
const CONNECT_GRACE: Duration = Duration::from_secs(5);

#[cfg(feature = "camera-gstreamer")]
struct GstreamerCameraSource {
    config: CameraConfig,
    pipeline: gstreamer::Pipeline,
    appsink: gstreamer_app::AppSink,
    frame_count: u64,
    last_frame_at: Option<Instant>,
    connected_at: Option<Instant>,
    last_error: Option<String>,
}

#[cfg(feature = "camera-gstreamer")]
impl GstreamerCameraSource {
    fn new(config: CameraConfig) -> Result<Self> {
        gstreamer::init().context("initialize gstreamer")?;

        let pipeline_description = pipeline_description(&config);
        log::debug!("camera pipeline: {}", pipeline_description);
        let pipeline = gstreamer::parse::launch(&pipeline_description)
            .context("build camera pipeline")?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| anyhow::anyhow!("camera pipeline is not a Pipeline"))?;

        let appsink = pipeline
            .by_name("appsink")
            .context("appsink element missing from pipeline")?
            .downcast::<gstreamer_app::AppSink>()
            .map_err(|_| anyhow::anyhow!("appsink element has unexpected type"))?;

        appsink.set_max_buffers(1);
        appsink.set_drop(true);
        appsink.set_sync(false);

        Ok(Self {
            config,
            pipeline,
            appsink,
            frame_count: 0,
            last_frame_at: None,
            connected_at: None,
            last_error: None,
        })
    }

    fn connect(&mut self) -> Result<()> {
        self.pipeline
            .set_state(gstreamer::State::Playing)
            .context("set camera pipeline to Playing")?;
        self.connected_at = Some(Instant::now());
        log::info!("CameraSource: capturing from {}", self.config.url);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        self.poll_bus();

        let timeout = self.frame_timeout();
        let sample = self
            .appsink
            .try_pull_sample(timeout)
            .ok_or_else(|| anyhow::anyhow!("camera stream stalled"))?;

        let (pixels, width, height) = sample_to_pixels(&sample)?;

        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());

        Frame::new(self.frame_count, pixels, width, height)
    }

    fn is_healthy(&self) -> bool {
        if self.last_error.is_some() {
            return false;
        }
        match (self.connected_at, self.last_frame_at) {
            (None, _) => false,
            // Give the device a moment to deliver the first frame.
            (Some(connected_at), None) => connected_at.elapsed() <= CONNECT_GRACE,
            (Some(_), Some(last_frame_at)) => last_frame_at.elapsed() <= self.health_grace(),
        }
    }

    fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            url: self.config.url.clone(),
        }
    }

    /// Nominal milliseconds between frames.
    fn frame_period_ms(&self) -> u64 {
        1000 / u64::from(self.config.target_fps.max(1))
    }

    /// Wait up to four frame periods for a sample, never less than 500ms.
    fn frame_timeout(&self) -> gstreamer::ClockTime {
        gstreamer::ClockTime::from_mseconds((self.frame_period_ms() * 4).max(500))
    }

    /// Unhealthy after six missed frame periods, never less than 2s.
    fn health_grace(&self) -> Duration {
        Duration::from_millis((self.frame_period_ms() * 6).max(2_000))
    }

    fn poll_bus(&mut self) {
        let Some(bus) = self.pipeline.bus() else {
            return;
        };
        while let Some(message) = bus.pop() {
            use gstreamer::MessageView;
            match message.view() {
                MessageView::Error(err) => {
                    self.last_error = Some(format!(
                        "gstreamer error from {:?}: {}",
                        err.src().map(|s| s.path_string()),
                        err.error()
                    ));
                }
                MessageView::Eos(..) => {
                    self.last_error = Some("gstreamer reached EOS".to_string());
                }
                _ => {}
            }
        }
    }
}

#[cfg(feature = "camera-gstreamer")]
impl Drop for GstreamerCameraSource {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gstreamer::State::Null);
    }
}

#[cfg(feature = "camera-gstreamer")]
fn sample_to_pixels(sample: &gstreamer::Sample) -> Result<(Vec<u8>, u32, u32)> {
    let buffer = sample.buffer().context("camera sample missing buffer")?;
    let caps = sample.caps().context("camera sample missing caps")?;
    let info =
        gstreamer_video::VideoInfo::from_caps(caps).context("parse camera caps as video info")?;

    let width = info.width();
    let height = info.height();
    let row_bytes = (width as usize) * 3;
    let stride = info.stride()[0] as usize;

    let map = buffer.map_readable().context("map camera buffer")?;
    let data = map.as_slice();

    if stride == row_bytes {
        return Ok((data.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("camera buffer row is out of bounds")?,
        );
    }

    Ok((pixels, width, height))
}

/// GStreamer launch line for a camera config.
pub fn pipeline_description(config: &CameraConfig) -> String {
    let size = config
        .source_size
        .map(|(w, h)| format!(",width={},height={}", w, h))
        .unwrap_or_default();
    let source = if config.h264 {
        format!("video/x-h264{} ! h264parse ! avdec_h264 ! ", size)
    } else if size.is_empty() {
        String::new()
    } else {
        format!("video/x-raw{} ! ", size)
    };
    let flip = if config.mirror {
        "videoflip method=horizontal-flip ! "
    } else {
        ""
    };
    format!(
        "v4l2src device={} ! {}videoconvert ! videoscale ! {}\
         video/x-raw,format=RGB,width={},height={} ! \
         appsink name=appsink sync=false max-buffers=1 drop=true",
        config.url, source, flip, config.width, config.height
    )
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
