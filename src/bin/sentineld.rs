//! sentineld - raised-hand watch daemon
//!
//! This daemon:
//! 1. Captures frames from the configured camera (or a stub/image source)
//! 2. Runs pose estimation on every frame
//! 3. Draws poses and the timing summary onto an SVG overlay
//! 4. Sends a rate-limited Sigfox alert whenever someone raises a hand

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use pose_sentinel::{
    AlertChannel, BackendRegistry, CameraSource, Frame, FrameProcessor, GestureClassifier,
    Resolution, SentinelConfig, StubBackend, SvgOverlay,
};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);
const SHUTDOWN_FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Flip the camera image horizontally.
    #[arg(long)]
    mirror: bool,
    /// Pose model file (defaults to the model matching --res).
    #[arg(long)]
    model: Option<PathBuf>,
    /// Capture resolution: 480x360, 640x480 or 1280x720.
    #[arg(long)]
    res: Option<Resolution>,
    /// Video device, or stub://name for synthetic frames.
    #[arg(long)]
    videosrc: Option<String>,
    /// The camera delivers H.264.
    #[arg(long)]
    h264: bool,
    /// Pose backend: stub or tract.
    #[arg(long)]
    backend: Option<String>,
    /// Replay the images of a directory instead of a camera.
    #[arg(long)]
    images: Option<PathBuf>,
    /// Write the overlay SVG here after every frame.
    #[arg(long)]
    overlay: Option<PathBuf>,
}

impl Args {
    fn apply(self, cfg: &mut SentinelConfig) -> Option<PathBuf> {
        if self.mirror {
            cfg.video.mirror = true;
        }
        if self.h264 {
            cfg.video.h264 = true;
        }
        if let Some(model) = self.model {
            cfg.model.path = Some(model);
        }
        if let Some(res) = self.res {
            cfg.video.resolution = res;
        }
        if let Some(url) = self.videosrc {
            cfg.video.url = url;
        }
        if let Some(backend) = self.backend {
            cfg.model.backend = backend;
        }
        if let Some(overlay) = self.overlay {
            cfg.overlay_path = Some(overlay);
        }
        self.images
    }
}

enum Source {
    Camera(CameraSource),
    #[cfg(feature = "ingest-images")]
    Images(pose_sentinel::ingest::ImageDirSource),
}

impl Source {
    fn open(cfg: &SentinelConfig, images: Option<PathBuf>) -> Result<Self> {
        let camera = cfg.camera_config();
        match images {
            None => {
                let mut source = CameraSource::new(camera)?;
                source.connect()?;
                Ok(Source::Camera(source))
            }
            #[cfg(feature = "ingest-images")]
            Some(dir) => {
                let source =
                    pose_sentinel::ingest::ImageDirSource::new(pose_sentinel::ingest::ImageDirConfig {
                        dir,
                        width: camera.width,
                        height: camera.height,
                        mirror: camera.mirror,
                        looping: true,
                    })?;
                Ok(Source::Images(source))
            }
            #[cfg(not(feature = "ingest-images"))]
            Some(_) => Err(anyhow!("--images requires the ingest-images feature")),
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match self {
            Source::Camera(source) => source.next_frame().map(Some),
            #[cfg(feature = "ingest-images")]
            Source::Images(source) => source.next_frame(),
        }
    }

    fn log_health(&self) {
        match self {
            Source::Camera(source) => {
                let stats = source.stats();
                log::info!(
                    "camera health={} frames={} url={}",
                    source.is_healthy(),
                    stats.frames_captured,
                    stats.url
                );
            }
            #[cfg(feature = "ingest-images")]
            Source::Images(source) => {
                log::info!("image source: {} file(s)", source.len());
            }
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = SentinelConfig::load()?;
    let images = args.apply(&mut cfg);
    cfg.validate()?;

    let registry = build_registry(&cfg)?;
    registry
        .warm_up()
        .map_err(|e| anyhow!("pose backend warm-up failed: {}", e))?;

    let alerts = AlertChannel::new(
        cfg.alert_transport(),
        cfg.rate_limiter(),
        cfg.alert.dispatch,
    )?;
    log::info!(
        "alerts via {} ({:?} dispatch, cooldown {:.1}s)",
        alerts.transport_name(),
        cfg.alert.dispatch,
        cfg.alert.cooldown_secs
    );

    let mut processor = FrameProcessor::new(
        registry,
        GestureClassifier::new(cfg.gesture.confidence_threshold),
        alerts,
        cfg.gesture.keypoint_draw_threshold,
    );

    let mut source = Source::open(&cfg, images)?;
    let (sink_width, sink_height) = cfg.video.resolution.sink_size();
    let camera = cfg.camera_config();
    let mut overlay = SvgOverlay::new(camera.width, camera.height);
    log::info!(
        "sentineld running. source={} resolution={:?} (display {}x{}) backend={}",
        cfg.video.url,
        cfg.video.resolution,
        sink_width,
        sink_height,
        processor.backends().default_name().unwrap_or("none")
    );

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        handler_flag.store(false, Ordering::SeqCst);
    })
    .context("error setting Ctrl-C handler")?;

    let frame_interval = Duration::from_secs_f64(1.0 / cfg.video.target_fps as f64);
    let mut last_health_log = Instant::now();

    while running.load(Ordering::SeqCst) {
        let loop_started = Instant::now();

        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                log::info!("frame source exhausted");
                break;
            }
            Err(e) => {
                log::warn!("frame capture failed: {:#}", e);
                std::thread::sleep(frame_interval);
                continue;
            }
        };

        overlay.clear();
        match processor.process(&frame, &mut overlay) {
            Ok(report) => {
                if let Some(path) = &cfg.overlay_path {
                    if let Err(e) = std::fs::write(path, overlay.finish()) {
                        log::warn!("overlay write to {} failed: {}", path.display(), e);
                    }
                }
                if report.triggered() {
                    log::debug!("frame {}: alert {:?}", report.sequence, report.alert);
                }
            }
            Err(e) => log::warn!("frame {}: pose estimation failed: {}", frame.sequence, e),
        }

        if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
            source.log_health();
            let metrics = processor.metrics();
            log::info!(
                "frames={} fps={:.2} inference={:.1}ms overhead={:.2}ms detections={} alerts_sent={}",
                metrics.frames,
                metrics.avg_fps,
                metrics.avg_inference_ms,
                metrics.avg_overhead_ms,
                processor.detections(),
                processor.alerts().limiter().counter()
            );
            last_health_log = Instant::now();
        }

        let spent = loop_started.elapsed();
        if spent < frame_interval {
            std::thread::sleep(frame_interval - spent);
        }
    }

    log::info!("shutdown signal received, flushing alerts...");
    let mut alerts = processor.into_alerts();
    if !alerts.flush(SHUTDOWN_FLUSH_TIMEOUT) {
        log::warn!("alert transmission still running after {:?}", SHUTDOWN_FLUSH_TIMEOUT);
    }
    alerts.shutdown()?;
    Ok(())
}

fn build_registry(cfg: &SentinelConfig) -> Result<BackendRegistry> {
    let mut registry = BackendRegistry::new();
    match cfg.model.backend.as_str() {
        "stub" => registry.register(StubBackend::default()),
        #[cfg(feature = "backend-tract")]
        "tract" => {
            let (width, height) = cfg.video.resolution.model_size();
            let model_path = cfg.model_path();
            log::info!("loading pose model {}", model_path.display());
            registry.register(pose_sentinel::detect::TractBackend::new(
                &model_path,
                width,
                height,
            )?);
        }
        #[cfg(not(feature = "backend-tract"))]
        "tract" => return Err(anyhow!("the tract backend requires the backend-tract feature")),
        other => return Err(anyhow!("unknown pose backend '{}'", other)),
    }
    registry.set_default(&cfg.model.backend)?;
    Ok(registry)
}
