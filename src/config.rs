use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::alert::sigfox::{
    DEFAULT_BAUD_RATE, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_REGION_COMMAND, DEFAULT_SERIAL_DEVICE,
    DEFAULT_STEP_DELAY,
};
use crate::alert::{
    AlertDispatch, AlertTransport, CounterOrder, LogTransport, RateLimiter,
    SerialSigfoxTransport, SigfoxConfig,
};
use crate::gesture::DEFAULT_CONFIDENCE_THRESHOLD;
use crate::ingest::CameraConfig;
use crate::overlay::DEFAULT_KEYPOINT_DRAW_THRESHOLD;

const DEFAULT_VIDEO_SRC: &str = "/dev/video1";
const DEFAULT_TARGET_FPS: u32 = 30;
const DEFAULT_BACKEND: &str = "stub";
const DEFAULT_COOLDOWN_SECS: f64 = 1.0;

/// Capture/display/model sizes offered on the command line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub enum Resolution {
    #[serde(rename = "480x360")]
    R480x360,
    #[default]
    #[serde(rename = "640x480")]
    R640x480,
    #[serde(rename = "1280x720")]
    R1280x720,
}

impl Resolution {
    /// Size requested from the camera.
    pub fn source_size(self) -> (u32, u32) {
        match self {
            Resolution::R480x360 => (640, 480),
            Resolution::R640x480 => (640, 480),
            Resolution::R1280x720 => (1280, 720),
        }
    }

    /// Size the overlay is displayed at.
    pub fn sink_size(self) -> (u32, u32) {
        match self {
            Resolution::R480x360 => (480, 360),
            Resolution::R640x480 => (640, 480),
            Resolution::R1280x720 => (1280, 720),
        }
    }

    /// Input size of the matching pose model.
    pub fn model_size(self) -> (u32, u32) {
        match self {
            Resolution::R480x360 => (481, 353),
            Resolution::R640x480 => (641, 481),
            Resolution::R1280x720 => (1281, 721),
        }
    }

    pub fn default_model_path(self) -> PathBuf {
        let (w, h) = self.model_size();
        PathBuf::from(format!("models/posenet_{}x{}.onnx", w, h))
    }
}

impl std::str::FromStr for Resolution {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "480x360" => Ok(Resolution::R480x360),
            "640x480" => Ok(Resolution::R640x480),
            "1280x720" => Ok(Resolution::R1280x720),
            other => Err(anyhow!(
                "unsupported resolution '{}'; expected 480x360, 640x480 or 1280x720",
                other
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Log the handshake instead of driving hardware.
    #[default]
    Log,
    Serial,
}

impl std::str::FromStr for TransportKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "log" => Ok(TransportKind::Log),
            "serial" => Ok(TransportKind::Serial),
            other => Err(anyhow!(
                "unknown alert transport '{}'; expected log or serial",
                other
            )),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct SentinelConfigFile {
    video: Option<VideoConfigFile>,
    model: Option<ModelConfigFile>,
    gesture: Option<GestureConfigFile>,
    alert: Option<AlertConfigFile>,
    overlay_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct VideoConfigFile {
    url: Option<String>,
    resolution: Option<Resolution>,
    mirror: Option<bool>,
    h264: Option<bool>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    backend: Option<String>,
    path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct GestureConfigFile {
    confidence_threshold: Option<f32>,
    keypoint_draw_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct AlertConfigFile {
    cooldown_secs: Option<f64>,
    counter_order: Option<CounterOrder>,
    dispatch: Option<AlertDispatch>,
    transport: Option<TransportKind>,
    device: Option<String>,
    baud_rate: Option<u32>,
    region_command: Option<String>,
    step_delay_ms: Option<u64>,
    handshake_timeout_ms: Option<u64>,
    read_ack: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct SentinelConfig {
    pub video: VideoSettings,
    pub model: ModelSettings,
    pub gesture: GestureSettings,
    pub alert: AlertSettings,
    pub overlay_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct VideoSettings {
    pub url: String,
    pub resolution: Resolution,
    pub mirror: bool,
    pub h264: bool,
    pub target_fps: u32,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub backend: String,
    /// Explicit model file; `None` means the resolution's default.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct GestureSettings {
    pub confidence_threshold: f32,
    pub keypoint_draw_threshold: f32,
}

#[derive(Debug, Clone)]
pub struct AlertSettings {
    pub cooldown_secs: f64,
    pub counter_order: CounterOrder,
    pub dispatch: AlertDispatch,
    pub transport: TransportKind,
    pub device: String,
    pub baud_rate: u32,
    pub region_command: String,
    pub step_delay: Duration,
    pub handshake_timeout: Duration,
    pub read_ack: bool,
}

impl SentinelConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SENTINEL_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: SentinelConfigFile) -> Self {
        let video = file.video.unwrap_or_default();
        let model = file.model.unwrap_or_default();
        let gesture = file.gesture.unwrap_or_default();
        let alert = file.alert.unwrap_or_default();

        Self {
            video: VideoSettings {
                url: video.url.unwrap_or_else(|| DEFAULT_VIDEO_SRC.to_string()),
                resolution: video.resolution.unwrap_or_default(),
                mirror: video.mirror.unwrap_or(false),
                h264: video.h264.unwrap_or(false),
                target_fps: video.target_fps.unwrap_or(DEFAULT_TARGET_FPS),
            },
            model: ModelSettings {
                backend: model.backend.unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
                path: model.path,
            },
            gesture: GestureSettings {
                confidence_threshold: gesture
                    .confidence_threshold
                    .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
                keypoint_draw_threshold: gesture
                    .keypoint_draw_threshold
                    .unwrap_or(DEFAULT_KEYPOINT_DRAW_THRESHOLD),
            },
            alert: AlertSettings {
                cooldown_secs: alert.cooldown_secs.unwrap_or(DEFAULT_COOLDOWN_SECS),
                counter_order: alert.counter_order.unwrap_or_default(),
                dispatch: alert.dispatch.unwrap_or_default(),
                transport: alert.transport.unwrap_or_default(),
                device: alert
                    .device
                    .unwrap_or_else(|| DEFAULT_SERIAL_DEVICE.to_string()),
                baud_rate: alert.baud_rate.unwrap_or(DEFAULT_BAUD_RATE),
                region_command: alert
                    .region_command
                    .unwrap_or_else(|| DEFAULT_REGION_COMMAND.to_string()),
                step_delay: alert
                    .step_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(DEFAULT_STEP_DELAY),
                handshake_timeout: alert
                    .handshake_timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(DEFAULT_HANDSHAKE_TIMEOUT),
                read_ack: alert.read_ack.unwrap_or(false),
            },
            overlay_path: file.overlay_path,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(url) = non_empty_env("SENTINEL_VIDEO_SRC") {
            self.video.url = url;
        }
        if let Some(path) = non_empty_env("SENTINEL_MODEL") {
            self.model.path = Some(PathBuf::from(path));
        }
        if let Some(backend) = non_empty_env("SENTINEL_BACKEND") {
            self.model.backend = backend;
        }
        if let Some(threshold) = non_empty_env("SENTINEL_GESTURE_THRESHOLD") {
            self.gesture.confidence_threshold = threshold
                .parse()
                .map_err(|_| anyhow!("SENTINEL_GESTURE_THRESHOLD must be a number"))?;
        }
        if let Some(cooldown) = non_empty_env("SENTINEL_ALERT_COOLDOWN_SECS") {
            self.alert.cooldown_secs = cooldown
                .parse()
                .map_err(|_| anyhow!("SENTINEL_ALERT_COOLDOWN_SECS must be a number of seconds"))?;
        }
        if let Some(transport) = non_empty_env("SENTINEL_ALERT_TRANSPORT") {
            self.alert.transport = transport.parse()?;
        }
        if let Some(device) = non_empty_env("SENTINEL_SERIAL_DEVICE") {
            self.alert.device = device;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("confidence_threshold", self.gesture.confidence_threshold),
            ("keypoint_draw_threshold", self.gesture.keypoint_draw_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("{} must be within [0, 1], got {}", name, value));
            }
        }
        if Duration::try_from_secs_f64(self.alert.cooldown_secs).is_err() {
            return Err(anyhow!(
                "alert cooldown must be a non-negative number of seconds, got {}",
                self.alert.cooldown_secs
            ));
        }
        if self.alert.baud_rate == 0 {
            return Err(anyhow!("serial baud rate must be greater than zero"));
        }
        if self.alert.handshake_timeout.is_zero() {
            return Err(anyhow!("handshake timeout must be greater than zero"));
        }
        if self.video.target_fps == 0 {
            return Err(anyhow!("target fps must be greater than zero"));
        }
        if self.model.backend.trim().is_empty() {
            return Err(anyhow!("model backend must not be empty"));
        }
        Ok(())
    }

    /// Model file, falling back to the resolution's default.
    pub fn model_path(&self) -> PathBuf {
        self.model
            .path
            .clone()
            .unwrap_or_else(|| self.video.resolution.default_model_path())
    }

    /// Camera settings. The device is asked for the source size and frames are
    /// delivered at the model input size.
    pub fn camera_config(&self) -> CameraConfig {
        let (width, height) = self.video.resolution.model_size();
        CameraConfig {
            url: self.video.url.clone(),
            target_fps: self.video.target_fps,
            width,
            height,
            source_size: Some(self.video.resolution.source_size()),
            mirror: self.video.mirror,
            h264: self.video.h264,
        }
    }

    pub fn sigfox_config(&self) -> SigfoxConfig {
        SigfoxConfig {
            device: self.alert.device.clone(),
            baud_rate: self.alert.baud_rate,
            region_command: self.alert.region_command.clone(),
            step_delay: self.alert.step_delay,
            handshake_timeout: self.alert.handshake_timeout,
            read_ack: self.alert.read_ack,
        }
    }

    pub fn rate_limiter(&self) -> RateLimiter {
        // validate() rejects cooldowns a Duration cannot hold.
        let cooldown =
            Duration::try_from_secs_f64(self.alert.cooldown_secs).unwrap_or(Duration::MAX);
        RateLimiter::new(cooldown, self.alert.counter_order)
    }

    pub fn alert_transport(&self) -> Box<dyn AlertTransport> {
        match self.alert.transport {
            TransportKind::Log => Box::new(LogTransport::new(self.alert.step_delay)),
            TransportKind::Serial => Box::new(SerialSigfoxTransport::new(self.sigfox_config())),
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<SentinelConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_sizes_follow_model_table() {
        let r: Resolution = "480x360".parse().unwrap();
        assert_eq!(r.source_size(), (640, 480));
        assert_eq!(r.sink_size(), (480, 360));
        assert_eq!(r.model_size(), (481, 353));
        assert_eq!(
            Resolution::R1280x720.default_model_path(),
            PathBuf::from("models/posenet_1281x721.onnx")
        );
        assert!("800x600".parse::<Resolution>().is_err());
    }

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = SentinelConfig::from_file(SentinelConfigFile::default());
        assert_eq!(cfg.video.url, "/dev/video1");
        assert_eq!(cfg.video.resolution, Resolution::R640x480);
        assert_eq!(cfg.gesture.confidence_threshold, 0.5);
        assert_eq!(cfg.alert.cooldown_secs, 1.0);
        assert_eq!(cfg.alert.dispatch, AlertDispatch::Background);
        assert_eq!(cfg.alert.transport, TransportKind::Log);
        assert_eq!(cfg.model_path(), PathBuf::from("models/posenet_641x481.onnx"));
        cfg.validate().unwrap();
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let mut cfg = SentinelConfig::from_file(SentinelConfigFile::default());
        cfg.gesture.confidence_threshold = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = SentinelConfig::from_file(SentinelConfigFile::default());
        cfg.alert.cooldown_secs = f64::NAN;
        assert!(cfg.validate().is_err());

        let mut cfg = SentinelConfig::from_file(SentinelConfigFile::default());
        cfg.alert.handshake_timeout = Duration::ZERO;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn cooldown_too_large_for_duration_is_rejected() {
        let mut cfg = SentinelConfig::from_file(SentinelConfigFile::default());
        cfg.alert.cooldown_secs = 1e30;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("alert cooldown"));
        assert_eq!(cfg.rate_limiter().cooldown(), Duration::MAX);

        cfg.alert.cooldown_secs = -1.0;
        assert!(cfg.validate().is_err());

        cfg.alert.cooldown_secs = 86_400.0;
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.rate_limiter().cooldown(), Duration::from_secs(86_400));
    }

    #[test]
    fn camera_config_uses_model_input_size() {
        let mut cfg = SentinelConfig::from_file(SentinelConfigFile::default());
        cfg.video.resolution = Resolution::R480x360;
        cfg.video.mirror = true;
        let camera = cfg.camera_config();
        assert_eq!((camera.width, camera.height), (481, 353));
        assert_eq!(camera.source_size, Some((640, 480)));
        assert!(camera.mirror);
    }
}
