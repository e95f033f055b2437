use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use pose_sentinel::alert::{AlertDispatch, CounterOrder};
use pose_sentinel::config::{Resolution, SentinelConfig, TransportKind};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "SENTINEL_CONFIG",
        "SENTINEL_VIDEO_SRC",
        "SENTINEL_MODEL",
        "SENTINEL_BACKEND",
        "SENTINEL_GESTURE_THRESHOLD",
        "SENTINEL_ALERT_COOLDOWN_SECS",
        "SENTINEL_ALERT_TRANSPORT",
        "SENTINEL_SERIAL_DEVICE",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "video": {
            "url": "/dev/video0",
            "resolution": "1280x720",
            "mirror": true,
            "target_fps": 15
        },
        "model": { "backend": "tract" },
        "gesture": { "confidence_threshold": 0.6 },
        "alert": {
            "cooldown_secs": 30.0,
            "counter_order": "pre_increment",
            "dispatch": "inline",
            "transport": "serial",
            "region_command": "12",
            "step_delay_ms": 50
        },
        "overlay_path": "/tmp/overlay.svg"
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("SENTINEL_CONFIG", file.path());
    std::env::set_var("SENTINEL_SERIAL_DEVICE", "/dev/ttyUSB3");
    std::env::set_var("SENTINEL_ALERT_COOLDOWN_SECS", "2.5");

    let cfg = SentinelConfig::load().expect("load config");

    assert_eq!(cfg.video.url, "/dev/video0");
    assert_eq!(cfg.video.resolution, Resolution::R1280x720);
    assert!(cfg.video.mirror);
    assert!(!cfg.video.h264);
    assert_eq!(cfg.video.target_fps, 15);
    assert_eq!(cfg.model.backend, "tract");
    assert_eq!(cfg.model_path(), PathBuf::from("models/posenet_1281x721.onnx"));
    assert_eq!(cfg.gesture.confidence_threshold, 0.6);
    assert_eq!(cfg.gesture.keypoint_draw_threshold, 0.2);
    assert_eq!(cfg.alert.cooldown_secs, 2.5);
    assert_eq!(cfg.alert.counter_order, CounterOrder::PreIncrement);
    assert_eq!(cfg.alert.dispatch, AlertDispatch::Inline);
    assert_eq!(cfg.alert.transport, TransportKind::Serial);
    assert_eq!(cfg.overlay_path, Some(PathBuf::from("/tmp/overlay.svg")));

    let sigfox = cfg.sigfox_config();
    assert_eq!(sigfox.device, "/dev/ttyUSB3");
    assert_eq!(sigfox.baud_rate, 115_200);
    assert_eq!(sigfox.region_command, "12");
    assert_eq!(sigfox.step_delay, Duration::from_millis(50));
    assert_eq!(cfg.rate_limiter().cooldown(), Duration::from_millis(2500));

    clear_env();
}

#[test]
fn loads_toml_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
overlay_path = "overlay.svg"

[video]
url = "stub://porch"
resolution = "480x360"

[alert]
cooldown_secs = 5.0
read_ack = true
"#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");
    std::env::set_var("SENTINEL_CONFIG", file.path());
    std::env::set_var("SENTINEL_MODEL", "/opt/models/custom.onnx");

    let cfg = SentinelConfig::load().expect("load config");

    assert_eq!(cfg.video.url, "stub://porch");
    assert_eq!(cfg.video.resolution, Resolution::R480x360);
    assert_eq!(cfg.camera_config().width, 481);
    assert_eq!(cfg.model_path(), PathBuf::from("/opt/models/custom.onnx"));
    assert_eq!(cfg.alert.cooldown_secs, 5.0);
    assert!(cfg.alert.read_ack);
    assert_eq!(cfg.alert.dispatch, AlertDispatch::Background);

    clear_env();
}

#[test]
fn defaults_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = SentinelConfig::load().expect("load config");
    assert_eq!(cfg.video.url, "/dev/video1");
    assert_eq!(cfg.model.backend, "stub");
    assert_eq!(cfg.alert.transport, TransportKind::Log);
    assert_eq!(cfg.alert.device, "/dev/ttyACM0");
    assert_eq!(cfg.rate_limiter().cooldown(), Duration::from_secs(1));
    assert!(cfg.overlay_path.is_none());

    clear_env();
}

#[test]
fn invalid_env_values_are_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SENTINEL_GESTURE_THRESHOLD", "1.7");
    assert!(SentinelConfig::load().is_err());

    std::env::set_var("SENTINEL_GESTURE_THRESHOLD", "high");
    assert!(SentinelConfig::load().is_err());
    std::env::remove_var("SENTINEL_GESTURE_THRESHOLD");

    std::env::set_var("SENTINEL_ALERT_TRANSPORT", "carrier-pigeon");
    assert!(SentinelConfig::load().is_err());
    std::env::remove_var("SENTINEL_ALERT_TRANSPORT");

    std::env::set_var("SENTINEL_ALERT_COOLDOWN_SECS", "1e30");
    assert!(SentinelConfig::load().is_err());

    clear_env();
}

#[test]
fn missing_config_file_is_an_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SENTINEL_CONFIG", "/nonexistent/sentinel.json");
    let err = SentinelConfig::load().unwrap_err();
    assert!(err.to_string().contains("failed to read config file"));

    clear_env();
}
