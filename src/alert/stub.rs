use std::time::Duration;

use super::sigfox::DEFAULT_STEP_DELAY;
use super::transport::{AlertTransport, TransmitError};

/// Simulated modem: logs each handshake step instead of touching hardware.
///
/// Keeps the modem's settle delays so the timing behaviour of the real link can
/// be observed without one attached.
pub struct LogTransport {
    step_delay: Duration,
    transmissions: u64,
}

impl LogTransport {
    pub fn new(step_delay: Duration) -> Self {
        Self {
            step_delay,
            transmissions: 0,
        }
    }

    pub fn transmissions(&self) -> u64 {
        self.transmissions
    }

    fn pause(&self) {
        if !self.step_delay.is_zero() {
            std::thread::sleep(self.step_delay);
        }
    }
}

impl Default for LogTransport {
    fn default() -> Self {
        Self::new(DEFAULT_STEP_DELAY)
    }
}

impl AlertTransport for LogTransport {
    fn name(&self) -> &'static str {
        "sigfox-log"
    }

    fn transmit(&mut self, payload: &[u8]) -> Result<(), TransmitError> {
        log::info!("sigfox(sim): connecting");
        log::info!("sigfox(sim): waking up");
        self.pause();
        log::info!("sigfox(sim): switching to European network (RCZ1)");
        self.pause();
        log::info!("sigfox(sim): transmitting payload");
        self.pause();
        self.transmissions += 1;
        log::info!(
            "sigfox(sim): payload={} (#{})",
            String::from_utf8_lossy(payload),
            self.transmissions
        );
        Ok(())
    }
}
