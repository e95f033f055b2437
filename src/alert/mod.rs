//! Rate-limited alert channel.
//!
//! `AlertChannel::maybe_alert` is called by the frame processor whenever a frame
//! contains the gesture. The channel decides whether the cooldown allows a new
//! alert and hands the counter payload to a transport, either inline (blocking
//! the frame loop for the modem handshake) or on a single background worker.
//!
//! Transport failures stop here: they are logged and leave the limiter untouched.

mod limiter;
pub mod sigfox;
mod stub;
mod transport;
mod worker;

use anyhow::Result;
use serde::Deserialize;
use std::time::{Duration, Instant};

pub use limiter::{CounterOrder, RateLimiter, DEFAULT_ALERT_COOLDOWN};
pub use sigfox::{ModemPort, SerialSigfoxTransport, SigfoxConfig, SigfoxModem};
pub use stub::LogTransport;
pub use transport::{encode_counter, AlertTransport, HandshakeStep, TransmitError};
pub use worker::{AlertOutcome, AlertWorker};

use worker::{AlertJob, Submission};

/// How transmissions are executed relative to the frame loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertDispatch {
    /// On the caller's thread; the frame loop waits for the handshake.
    Inline,
    /// On a dedicated worker; at most one transmission in flight.
    #[default]
    Background,
}

impl std::str::FromStr for AlertDispatch {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "inline" => Ok(AlertDispatch::Inline),
            "background" => Ok(AlertDispatch::Background),
            other => Err(anyhow::anyhow!(
                "unknown alert dispatch '{}'; expected inline or background",
                other
            )),
        }
    }
}

/// What `maybe_alert` did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlertDecision {
    /// Transmitted inline with this counter value.
    Sent(u32),
    /// Handed to the background worker with this counter value.
    Dispatched(u32),
    /// Cooldown has not elapsed since the last successful alert.
    CoolingDown,
    /// A background transmission is still running; request dropped.
    InFlight,
    /// Inline transmission failed, or the background worker is gone; limiter unchanged.
    Failed,
}

enum Dispatcher {
    Inline(Box<dyn AlertTransport>),
    Background(AlertWorker),
}

pub struct AlertChannel {
    limiter: RateLimiter,
    dispatcher: Dispatcher,
}

impl AlertChannel {
    pub fn new(
        transport: Box<dyn AlertTransport>,
        limiter: RateLimiter,
        dispatch: AlertDispatch,
    ) -> Result<Self> {
        let dispatcher = match dispatch {
            AlertDispatch::Inline => Dispatcher::Inline(transport),
            AlertDispatch::Background => Dispatcher::Background(AlertWorker::spawn(transport)?),
        };
        Ok(Self {
            limiter,
            dispatcher,
        })
    }

    pub fn inline(transport: Box<dyn AlertTransport>, limiter: RateLimiter) -> Self {
        Self {
            limiter,
            dispatcher: Dispatcher::Inline(transport),
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn transport_name(&self) -> &'static str {
        match &self.dispatcher {
            Dispatcher::Inline(transport) => transport.name(),
            Dispatcher::Background(worker) => worker.transport_name(),
        }
    }

    /// Request an alert at `now`, subject to the cooldown.
    pub fn maybe_alert(&mut self, now: Instant) -> AlertDecision {
        self.poll();

        if !self.limiter.permits(now) {
            return AlertDecision::CoolingDown;
        }

        let value = self.limiter.next_value();
        let payload = encode_counter(value);
        match &mut self.dispatcher {
            Dispatcher::Inline(transport) => match transport.transmit(&payload) {
                Ok(()) => {
                    self.limiter.record_success(now);
                    log::warn!("alert #{} sent via {}", value, transport.name());
                    AlertDecision::Sent(value)
                }
                Err(e) => {
                    log::warn!("alert #{} via {} failed: {}", value, transport.name(), e);
                    AlertDecision::Failed
                }
            },
            Dispatcher::Background(worker) => {
                let job = AlertJob {
                    requested_at: now,
                    value,
                    payload,
                };
                match worker.try_submit(job) {
                    Submission::Accepted => {
                        log::debug!("alert #{} dispatched to {}", value, worker.transport_name());
                        AlertDecision::Dispatched(value)
                    }
                    Submission::Busy => {
                        log::debug!("alert #{} dropped: transmission in flight", value);
                        AlertDecision::InFlight
                    }
                    Submission::Disconnected => {
                        log::error!("alert #{} dropped: alert worker has stopped", value);
                        AlertDecision::Failed
                    }
                }
            }
        }
    }

    /// Apply finished background outcomes. Returns how many were applied.
    pub fn poll(&mut self) -> usize {
        let Dispatcher::Background(worker) = &self.dispatcher else {
            return 0;
        };
        let outcomes = worker.take_outcomes();
        let applied = outcomes.len();
        for outcome in outcomes {
            match outcome.result {
                Ok(()) => {
                    self.limiter.record_success(outcome.requested_at);
                    log::warn!(
                        "alert #{} sent via {}",
                        outcome.value,
                        worker.transport_name()
                    );
                }
                Err(e) => {
                    log::warn!(
                        "alert #{} via {} failed: {}",
                        outcome.value,
                        worker.transport_name(),
                        e
                    );
                }
            }
        }
        applied
    }

    /// Wait for any in-flight transmission, then apply its outcome.
    pub fn flush(&mut self, timeout: Duration) -> bool {
        let idle = match &self.dispatcher {
            Dispatcher::Inline(_) => true,
            Dispatcher::Background(worker) => worker.wait_idle(timeout),
        };
        self.poll();
        idle
    }

    /// Stop the background worker, if any.
    pub fn shutdown(self) -> Result<()> {
        match self.dispatcher {
            Dispatcher::Inline(_) => Ok(()),
            Dispatcher::Background(worker) => worker.stop(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorder {
        payloads: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl Recorder {
        fn sent(&self) -> Vec<Vec<u8>> {
            self.payloads.lock().unwrap().clone()
        }
    }

    impl AlertTransport for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn transmit(&mut self, payload: &[u8]) -> Result<(), TransmitError> {
            self.payloads.lock().unwrap().push(payload.to_vec());
            Ok(())
        }
    }

    struct Failing;

    impl AlertTransport for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn transmit(&mut self, _payload: &[u8]) -> Result<(), TransmitError> {
            Err(TransmitError::Timeout {
                step: HandshakeStep::Wake,
                elapsed: Duration::from_secs(5),
            })
        }
    }

    /// Blocks each transmission until the test releases it.
    struct Gated {
        release: mpsc::Receiver<()>,
        inner: Recorder,
    }

    impl AlertTransport for Gated {
        fn name(&self) -> &'static str {
            "gated"
        }

        fn transmit(&mut self, payload: &[u8]) -> Result<(), TransmitError> {
            let _ = self.release.recv();
            self.inner.transmit(payload)
        }
    }

    fn secs(value: f64) -> Duration {
        Duration::from_secs_f64(value)
    }

    #[test]
    fn triggers_within_cooldown_send_once() {
        let recorder = Recorder::default();
        let mut channel = AlertChannel::inline(Box::new(recorder.clone()), RateLimiter::default());
        let t0 = Instant::now();

        assert_eq!(channel.maybe_alert(t0), AlertDecision::Sent(0));
        assert_eq!(
            channel.maybe_alert(t0 + secs(0.5)),
            AlertDecision::CoolingDown
        );
        assert_eq!(recorder.sent().len(), 1);
        assert_eq!(channel.limiter().counter(), 1);
    }

    #[test]
    fn triggers_past_cooldown_send_twice() {
        let recorder = Recorder::default();
        let mut channel = AlertChannel::inline(Box::new(recorder.clone()), RateLimiter::default());
        let t0 = Instant::now();

        assert_eq!(channel.maybe_alert(t0), AlertDecision::Sent(0));
        assert_eq!(channel.maybe_alert(t0 + secs(1.5)), AlertDecision::Sent(1));
        assert_eq!(
            recorder.sent(),
            vec![b"00000000".to_vec(), b"00000001".to_vec()]
        );
        assert_eq!(channel.limiter().counter(), 2);
    }

    #[test]
    fn pre_increment_sends_advanced_value() {
        let recorder = Recorder::default();
        let limiter = RateLimiter::new(DEFAULT_ALERT_COOLDOWN, CounterOrder::PreIncrement);
        let mut channel = AlertChannel::inline(Box::new(recorder.clone()), limiter);

        assert_eq!(channel.maybe_alert(Instant::now()), AlertDecision::Sent(1));
        assert_eq!(recorder.sent(), vec![b"00000001".to_vec()]);
    }

    #[test]
    fn failure_leaves_limiter_untouched() {
        let mut channel = AlertChannel::inline(Box::new(Failing), RateLimiter::default());
        let t0 = Instant::now();

        assert_eq!(channel.maybe_alert(t0), AlertDecision::Failed);
        assert_eq!(channel.limiter().counter(), 0);
        assert!(channel.limiter().last_sent().is_none());
        // Immediate retry is allowed.
        assert_eq!(
            channel.maybe_alert(t0 + secs(0.1)),
            AlertDecision::Failed
        );
    }

    #[test]
    fn background_drops_requests_while_in_flight() -> Result<()> {
        let (release_tx, release_rx) = mpsc::channel();
        let recorder = Recorder::default();
        let transport = Gated {
            release: release_rx,
            inner: recorder.clone(),
        };
        let mut channel = AlertChannel::new(
            Box::new(transport),
            RateLimiter::default(),
            AlertDispatch::Background,
        )?;
        let t0 = Instant::now();

        assert_eq!(channel.maybe_alert(t0), AlertDecision::Dispatched(0));
        assert_eq!(channel.maybe_alert(t0 + secs(1.5)), AlertDecision::InFlight);

        release_tx.send(()).unwrap();
        assert!(channel.flush(Duration::from_secs(5)));
        assert_eq!(channel.limiter().counter(), 1);
        assert_eq!(channel.limiter().last_sent(), Some(t0));

        // Stamped at the request instant: 0.5s later is still cooling down.
        assert_eq!(
            channel.maybe_alert(t0 + secs(0.5)),
            AlertDecision::CoolingDown
        );
        assert_eq!(
            channel.maybe_alert(t0 + secs(1.5)),
            AlertDecision::Dispatched(1)
        );
        release_tx.send(()).unwrap();
        assert!(channel.flush(Duration::from_secs(5)));
        assert_eq!(recorder.sent().len(), 2);

        channel.shutdown()
    }

    /// Panics on its first transmission, then delivers normally.
    struct PanicsOnce {
        panicked: bool,
        inner: Recorder,
    }

    impl AlertTransport for PanicsOnce {
        fn name(&self) -> &'static str {
            "panics-once"
        }

        fn transmit(&mut self, payload: &[u8]) -> Result<(), TransmitError> {
            if !self.panicked {
                self.panicked = true;
                panic!("modem driver bug");
            }
            self.inner.transmit(payload)
        }
    }

    #[test]
    fn transport_panic_is_a_failed_alert_and_worker_keeps_serving() -> Result<()> {
        let recorder = Recorder::default();
        let transport = PanicsOnce {
            panicked: false,
            inner: recorder.clone(),
        };
        let mut channel = AlertChannel::new(
            Box::new(transport),
            RateLimiter::default(),
            AlertDispatch::Background,
        )?;
        let t0 = Instant::now();

        assert_eq!(channel.maybe_alert(t0), AlertDecision::Dispatched(0));
        assert!(channel.flush(Duration::from_secs(5)));
        assert_eq!(channel.limiter().counter(), 0);

        assert_eq!(
            channel.maybe_alert(t0 + secs(2.0)),
            AlertDecision::Dispatched(0)
        );
        assert!(channel.flush(Duration::from_secs(5)));
        assert_eq!(channel.limiter().counter(), 1);
        assert_eq!(recorder.sent(), vec![b"00000000".to_vec()]);
        channel.shutdown()
    }

    #[test]
    fn background_failure_permits_retry() -> Result<()> {
        let mut channel = AlertChannel::new(
            Box::new(Failing),
            RateLimiter::default(),
            AlertDispatch::Background,
        )?;
        let t0 = Instant::now();

        assert_eq!(channel.maybe_alert(t0), AlertDecision::Dispatched(0));
        assert!(channel.flush(Duration::from_secs(5)));
        assert_eq!(channel.limiter().counter(), 0);
        assert_eq!(
            channel.maybe_alert(t0 + secs(0.1)),
            AlertDecision::Dispatched(0)
        );
        channel.shutdown()
    }
}
