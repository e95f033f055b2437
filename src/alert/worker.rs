use anyhow::{anyhow, Result};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::transport::{AlertTransport, TransmitError};

const IDLE_POLL: Duration = Duration::from_millis(5);

pub(crate) struct AlertJob {
    pub requested_at: Instant,
    pub value: u32,
    pub payload: Vec<u8>,
}

/// What happened to a submitted job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Submission {
    Accepted,
    /// Another transmission is in flight.
    Busy,
    /// The worker thread is gone.
    Disconnected,
}

/// Result of one background transmission.
#[derive(Debug)]
pub struct AlertOutcome {
    pub requested_at: Instant,
    pub value: u32,
    pub result: Result<(), TransmitError>,
}

/// Single-slot background transmitter.
///
/// One thread owns the transport. `busy` is set while a job is queued or running,
/// so at most one transmission is ever in flight and later requests are refused
/// rather than queued.
pub struct AlertWorker {
    jobs: Option<Sender<AlertJob>>,
    outcomes: Receiver<AlertOutcome>,
    busy: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
    transport_name: &'static str,
}

impl AlertWorker {
    pub fn spawn(mut transport: Box<dyn AlertTransport>) -> Result<Self> {
        let (jobs_tx, jobs_rx) = mpsc::channel::<AlertJob>();
        let (outcomes_tx, outcomes_rx) = mpsc::channel();
        let busy = Arc::new(AtomicBool::new(false));
        let transport_name = transport.name();

        let worker_busy = busy.clone();
        let join = std::thread::Builder::new()
            .name("alert-tx".to_string())
            .spawn(move || {
                for job in jobs_rx {
                    let result =
                        panic::catch_unwind(AssertUnwindSafe(|| transport.transmit(&job.payload)))
                            .unwrap_or_else(|panic| {
                                Err(TransmitError::Aborted(panic_message(&panic)))
                            });
                    let outcome = AlertOutcome {
                        requested_at: job.requested_at,
                        value: job.value,
                        result,
                    };
                    let delivered = outcomes_tx.send(outcome).is_ok();
                    worker_busy.store(false, Ordering::SeqCst);
                    if !delivered {
                        break;
                    }
                }
                log::debug!("alert worker exiting");
            })
            .map_err(|e| anyhow!("failed to spawn alert worker: {}", e))?;

        Ok(Self {
            jobs: Some(jobs_tx),
            outcomes: outcomes_rx,
            busy,
            join: Some(join),
            transport_name,
        })
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport_name
    }

    fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Hand a job to the worker. At most one job is in flight at a time.
    pub(crate) fn try_submit(&self, job: AlertJob) -> Submission {
        let alive = self
            .join
            .as_ref()
            .map(|join| !join.is_finished())
            .unwrap_or(false);
        let Some(jobs) = self.jobs.as_ref().filter(|_| alive) else {
            return Submission::Disconnected;
        };
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Submission::Busy;
        }
        if jobs.send(job).is_err() {
            self.busy.store(false, Ordering::SeqCst);
            return Submission::Disconnected;
        }
        Submission::Accepted
    }

    /// Drain finished outcomes without blocking.
    pub fn take_outcomes(&self) -> Vec<AlertOutcome> {
        self.outcomes.try_iter().collect()
    }

    /// Wait until the in-flight job (if any) has finished, up to `timeout`.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.is_busy() {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(IDLE_POLL);
        }
        true
    }

    /// Close the job queue and join the worker thread.
    pub fn stop(mut self) -> Result<()> {
        self.shutdown_inner()
    }

    fn shutdown_inner(&mut self) -> Result<()> {
        self.jobs.take();
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("alert worker thread panicked"))?;
        }
        Ok(())
    }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "transport panicked".to_string()
    }
}

impl Drop for AlertWorker {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown_inner() {
            log::error!("{}", e);
        }
    }
}
