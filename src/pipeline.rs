//! Frame processing loop.
//!
//! Called once per decoded frame by the ingestion driver:
//!
//! 1. run the pose backend, timing the call;
//! 2. update the session metrics and draw the summary line;
//! 3. draw each pose and run the gesture classifier on it;
//! 4. if any pose triggered, ask the alert channel for an alert.
//!
//! The processor owns all session state (metrics, limiter, detection counter).
//! A backend failure skips steps 2-4 for that frame and is returned to the caller,
//! which logs it and keeps going.

use std::time::Instant;

use crate::alert::{AlertChannel, AlertDecision};
use crate::detect::{BackendRegistry, ExtractorError};
use crate::frame::Frame;
use crate::gesture::GestureClassifier;
use crate::metrics::{MetricsAggregator, MetricsSnapshot};
use crate::overlay::{draw_pose, shadow_text, DrawSurface};

const SUMMARY_ORIGIN: (f32, f32) = (10.0, 20.0);

/// Per-frame result.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameReport {
    pub sequence: u64,
    pub poses: usize,
    pub triggering_poses: usize,
    pub alert: Option<AlertDecision>,
    pub summary: String,
}

impl FrameReport {
    pub fn triggered(&self) -> bool {
        self.triggering_poses > 0
    }
}

pub struct FrameProcessor {
    backends: BackendRegistry,
    classifier: GestureClassifier,
    metrics: MetricsAggregator,
    alerts: AlertChannel,
    keypoint_draw_threshold: f32,
    detections: u64,
}

impl FrameProcessor {
    pub fn new(
        backends: BackendRegistry,
        classifier: GestureClassifier,
        alerts: AlertChannel,
        keypoint_draw_threshold: f32,
    ) -> Self {
        Self {
            backends,
            classifier,
            metrics: MetricsAggregator::new(),
            alerts,
            keypoint_draw_threshold,
            detections: 0,
        }
    }

    pub fn process(
        &mut self,
        frame: &Frame,
        surface: &mut dyn DrawSurface,
    ) -> Result<FrameReport, ExtractorError> {
        let start = Instant::now();
        let estimate = self.backends.detect(frame)?;
        let end = Instant::now();

        let summary = self
            .metrics
            .record(start, end, estimate.inference, estimate.poses.len());
        shadow_text(surface, SUMMARY_ORIGIN.0, SUMMARY_ORIGIN.1, &summary);

        let mut triggering_poses = 0;
        for pose in &estimate.poses {
            draw_pose(surface, pose, self.keypoint_draw_threshold);
            if self.classifier.is_raised(pose) {
                triggering_poses += 1;
            }
        }

        let alert = if triggering_poses > 0 {
            self.detections += triggering_poses as u64;
            log::info!(
                "frame {}: raised hand detected ({} pose(s))",
                frame.sequence,
                triggering_poses
            );
            Some(self.alerts.maybe_alert(Instant::now()))
        } else {
            self.alerts.poll();
            None
        };
        log::debug!(
            "frame {}: {} | detection counter {}",
            frame.sequence,
            summary,
            self.detections
        );

        Ok(FrameReport {
            sequence: frame.sequence,
            poses: estimate.poses.len(),
            triggering_poses,
            alert,
            summary,
        })
    }

    /// Total triggering poses seen this session.
    pub fn detections(&self) -> u64 {
        self.detections
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn alerts(&self) -> &AlertChannel {
        &self.alerts
    }

    pub fn backends(&self) -> &BackendRegistry {
        &self.backends
    }

    /// Give back the alert channel so the caller can flush and shut it down.
    pub fn into_alerts(self) -> AlertChannel {
        self.alerts
    }
}
