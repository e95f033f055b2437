//! Running session metrics for the overlay.
//!
//! Simple online means over the whole session: every sum is divided by the same
//! frame count, and all of them are updated together in `record`.

use std::time::{Duration, Instant};

/// Averages reported to the overlay and the health log.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub frames: u64,
    pub avg_fps: f64,
    pub avg_overhead_ms: f64,
    pub avg_inference_ms: f64,
}

#[derive(Debug)]
pub struct MetricsAggregator {
    frames: u64,
    sum_fps: f64,
    sum_overhead_ms: f64,
    sum_inference_ms: f64,
    last_frame_end: Instant,
}

impl MetricsAggregator {
    /// Start a session now.
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Start a session at `session_start`, which seeds the first fps interval.
    pub fn starting_at(session_start: Instant) -> Self {
        Self {
            frames: 0,
            sum_fps: 0.0,
            sum_overhead_ms: 0.0,
            sum_inference_ms: 0.0,
            last_frame_end: session_start,
        }
    }

    /// Record one processed frame and return the overlay summary line.
    pub fn record(
        &mut self,
        frame_start: Instant,
        frame_end: Instant,
        inference: Duration,
        pose_count: usize,
    ) -> String {
        let interval = frame_end.saturating_duration_since(self.last_frame_end);
        // Zero interval would be an infinite rate.
        let fps = if interval.is_zero() {
            0.0
        } else {
            1.0 / interval.as_secs_f64()
        };
        let wall_ms = frame_end
            .saturating_duration_since(frame_start)
            .as_secs_f64()
            * 1000.0;
        let inference_ms = inference.as_secs_f64() * 1000.0;

        self.frames += 1;
        self.sum_fps += fps;
        self.sum_overhead_ms += wall_ms - inference_ms;
        self.sum_inference_ms += inference_ms;
        self.last_frame_end = frame_end;

        let snapshot = self.snapshot();
        format!(
            "PoseNet: {:.1}ms Frame IO: {:.2}ms TrueFPS: {:.2} Nposes {}",
            snapshot.avg_inference_ms, snapshot.avg_overhead_ms, snapshot.avg_fps, pose_count
        )
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if self.frames == 0 {
            return MetricsSnapshot::default();
        }
        let n = self.frames as f64;
        MetricsSnapshot {
            frames: self.frames,
            avg_fps: self.sum_fps / n,
            avg_overhead_ms: self.sum_overhead_ms / n,
            avg_inference_ms: self.sum_inference_ms / n,
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn averages_are_arithmetic_means() {
        let t0 = Instant::now();
        let mut metrics = MetricsAggregator::starting_at(t0);

        // frame ends at 100ms, 300ms, 400ms -> fps samples 10, 5, 10
        // wall times 40, 60, 20 ms; inference 30, 40, 5 ms -> overhead 10, 20, 15
        metrics.record(t0 + ms(60), t0 + ms(100), ms(30), 1);
        metrics.record(t0 + ms(240), t0 + ms(300), ms(40), 1);
        let line = metrics.record(t0 + ms(380), t0 + ms(400), ms(5), 2);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.frames, 3);
        assert!((snapshot.avg_fps - 25.0 / 3.0).abs() < EPS);
        assert!((snapshot.avg_overhead_ms - 15.0).abs() < EPS);
        assert!((snapshot.avg_inference_ms - 25.0).abs() < EPS);
        assert_eq!(
            line,
            "PoseNet: 25.0ms Frame IO: 15.00ms TrueFPS: 8.33 Nposes 2"
        );
    }

    #[test]
    fn first_frame_is_finite() {
        let t0 = Instant::now();
        let mut metrics = MetricsAggregator::starting_at(t0);
        metrics.record(t0, t0 + ms(50), ms(10), 0);
        let snapshot = metrics.snapshot();
        assert!(snapshot.avg_fps.is_finite());
        assert!((snapshot.avg_fps - 20.0).abs() < EPS);
    }

    #[test]
    fn zero_interval_does_not_divide_by_zero() {
        let t0 = Instant::now();
        let mut metrics = MetricsAggregator::starting_at(t0);
        metrics.record(t0, t0, Duration::ZERO, 0);
        assert_eq!(metrics.snapshot().avg_fps, 0.0);
        assert_eq!(metrics.frames(), 1);
    }

    #[test]
    fn empty_session_reports_zeros() {
        assert_eq!(MetricsAggregator::new().snapshot(), MetricsSnapshot::default());
    }
}
