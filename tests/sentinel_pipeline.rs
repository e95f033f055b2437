use std::time::Duration;

use pose_sentinel::alert::{
    AlertChannel, AlertDecision, AlertDispatch, CounterOrder, LogTransport, RateLimiter,
};
use pose_sentinel::detect::{BackendRegistry, StubBackend};
use pose_sentinel::gesture::GestureClassifier;
use pose_sentinel::ingest::{CameraConfig, CameraSource};
use pose_sentinel::overlay::SvgOverlay;
use pose_sentinel::pipeline::FrameProcessor;

fn stub_camera() -> CameraSource {
    let mut camera = CameraSource::new(CameraConfig {
        url: "stub://bench".to_string(),
        target_fps: 30,
        width: 64,
        height: 48,
        source_size: None,
        mirror: false,
        h264: false,
    })
    .expect("stub camera");
    camera.connect().expect("connect");
    camera
}

fn processor(dispatch: AlertDispatch, cooldown: Duration) -> FrameProcessor {
    let mut registry = BackendRegistry::new();
    // Left hand up on frames 3, 4, 7 and 8.
    registry.register(StubBackend::new(4, 2));
    let alerts = AlertChannel::new(
        Box::new(LogTransport::new(Duration::ZERO)),
        RateLimiter::new(cooldown, CounterOrder::PostIncrement),
        dispatch,
    )
    .expect("alert channel");
    FrameProcessor::new(registry, GestureClassifier::default(), alerts, 0.2)
}

#[test]
fn stub_session_alerts_once_within_cooldown() {
    let mut camera = stub_camera();
    let mut processor = processor(AlertDispatch::Inline, Duration::from_secs(600));
    let mut overlay = SvgOverlay::new(64, 48);

    let mut decisions = Vec::new();
    for _ in 0..8 {
        let frame = camera.next_frame().expect("frame");
        overlay.clear();
        let report = processor.process(&frame, &mut overlay).expect("process");
        assert_eq!(report.poses, 1);
        assert!(overlay.finish().contains("TrueFPS"));
        decisions.push(report.alert);
    }

    assert_eq!(
        decisions,
        vec![
            None,
            None,
            Some(AlertDecision::Sent(0)),
            Some(AlertDecision::CoolingDown),
            None,
            None,
            Some(AlertDecision::CoolingDown),
            Some(AlertDecision::CoolingDown),
        ]
    );
    assert_eq!(processor.detections(), 4);
    assert_eq!(processor.alerts().limiter().counter(), 1);
    assert_eq!(processor.metrics().frames, 8);
}

#[test]
fn background_dispatch_settles_after_flush() {
    let mut camera = stub_camera();
    let mut processor = processor(AlertDispatch::Background, Duration::from_secs(600));
    let mut overlay = SvgOverlay::new(64, 48);

    for _ in 0..3 {
        let frame = camera.next_frame().expect("frame");
        processor.process(&frame, &mut overlay).expect("process");
    }

    let mut alerts = processor.into_alerts();
    assert!(alerts.flush(Duration::from_secs(5)));
    assert_eq!(alerts.limiter().counter(), 1);
    assert!(alerts.limiter().last_sent().is_some());
    alerts.shutdown().expect("shutdown");
}
