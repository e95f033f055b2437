//! Sigfox modem driver.
//!
//! The modem takes newline/carriage-return terminated ASCII commands over a
//! serial link. One transmission is a fixed four-step sequence:
//!
//! 1. `1`  - wake the modem
//! 2. `15` - select the radio configuration zone (RCZ1, Europe)
//! 3. `4`  - enter transmit mode
//! 4. the payload bytes
//!
//! The modem gives no feedback the reference protocol relies on, so the steps are
//! separated by a fixed settle delay (200 ms). That delay is part of the modem's
//! timing contract. When `read_ack` is enabled, the modem is listened to for up
//! to one settle delay after each step (the listening time is taken out of the
//! delay); silence passes and a response containing `ERR` fails the transmission.
//! No single port operation may outlive the handshake deadline.

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use super::transport::{AlertTransport, HandshakeStep, TransmitError};

pub const DEFAULT_SERIAL_DEVICE: &str = "/dev/ttyACM0";
pub const DEFAULT_BAUD_RATE: u32 = 115_200;
pub const DEFAULT_REGION_COMMAND: &str = "15";
pub const DEFAULT_STEP_DELAY: Duration = Duration::from_millis(200);
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

const WAKE_COMMAND: &[u8] = b"1";
const BEGIN_TRANSMISSION_COMMAND: &[u8] = b"4";
const COMMAND_TERMINATOR: &[u8] = b"\n\r";
const MAX_ACK_BYTES: usize = 64;

/// Serial and handshake settings for the modem.
#[derive(Clone, Debug, PartialEq)]
pub struct SigfoxConfig {
    pub device: String,
    pub baud_rate: u32,
    /// Region-select command (network configuration zone).
    pub region_command: String,
    /// Settle delay between handshake steps.
    pub step_delay: Duration,
    /// Upper bound on one whole handshake.
    pub handshake_timeout: Duration,
    /// Read back and check modem responses after each step.
    pub read_ack: bool,
}

impl Default for SigfoxConfig {
    fn default() -> Self {
        Self {
            device: DEFAULT_SERIAL_DEVICE.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            region_command: DEFAULT_REGION_COMMAND.to_string(),
            step_delay: DEFAULT_STEP_DELAY,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            read_ack: false,
        }
    }
}

/// Byte link to the modem whose blocking time can be bounded.
///
/// Serial ports block in `read`/`write` until their timeout expires and then
/// fail with `ErrorKind::TimedOut`; every call is given the time left until the
/// handshake deadline.
pub trait ModemPort: Read + Write {
    fn set_io_timeout(&mut self, timeout: Duration) -> std::io::Result<()>;
}

impl ModemPort for Box<dyn SerialPort> {
    fn set_io_timeout(&mut self, timeout: Duration) -> std::io::Result<()> {
        self.set_timeout(timeout).map_err(std::io::Error::from)
    }
}

/// Handshake driver over any modem port.
pub struct SigfoxModem<P> {
    port: P,
    config: SigfoxConfig,
}

impl<P: ModemPort> SigfoxModem<P> {
    pub fn new(port: P, config: SigfoxConfig) -> Self {
        Self { port, config }
    }

    pub fn into_inner(self) -> P {
        self.port
    }

    /// Run the full wake / region / begin / payload sequence.
    pub fn transmit(&mut self, payload: &[u8]) -> Result<(), TransmitError> {
        let started = Instant::now();
        let deadline = Deadline {
            started,
            limit: self.config.handshake_timeout,
        };
        let region = self.config.region_command.clone().into_bytes();
        let steps: [(HandshakeStep, &[u8]); 4] = [
            (HandshakeStep::Wake, WAKE_COMMAND),
            (HandshakeStep::SelectRegion, region.as_slice()),
            (HandshakeStep::BeginTransmission, BEGIN_TRANSMISSION_COMMAND),
            (HandshakeStep::Payload, payload),
        ];

        // Time already spent listening for an ack counts towards the settle delay.
        let mut listened = Duration::ZERO;
        for (index, (step, command)) in steps.iter().enumerate() {
            if index > 0 {
                self.settle(*step, &deadline, listened)?;
            }
            self.send(*step, command, &deadline)?;
            listened = if self.config.read_ack {
                self.check_response(*step, &deadline)?
            } else {
                Duration::ZERO
            };
        }
        log::debug!(
            "sigfox handshake complete in {:?} ({} payload bytes)",
            started.elapsed(),
            payload.len()
        );
        Ok(())
    }

    fn settle(
        &self,
        next: HandshakeStep,
        deadline: &Deadline,
        listened: Duration,
    ) -> Result<(), TransmitError> {
        let delay = self.config.step_delay.saturating_sub(listened);
        if delay > deadline.remaining() {
            return Err(deadline.expired(next));
        }
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        Ok(())
    }

    fn send(
        &mut self,
        step: HandshakeStep,
        command: &[u8],
        deadline: &Deadline,
    ) -> Result<(), TransmitError> {
        let remaining = deadline.remaining();
        if remaining.is_zero() {
            return Err(deadline.expired(step));
        }
        let mut line = Vec::with_capacity(command.len() + COMMAND_TERMINATOR.len());
        line.extend_from_slice(command);
        line.extend_from_slice(COMMAND_TERMINATOR);
        self.port
            .set_io_timeout(remaining)
            .and_then(|_| self.port.write_all(&line))
            .and_then(|_| self.port.flush())
            .map_err(|source| deadline.io_error(step, source))
    }

    /// Listen for a response for at most one settle delay. Returns the time spent.
    fn check_response(
        &mut self,
        step: HandshakeStep,
        deadline: &Deadline,
    ) -> Result<Duration, TransmitError> {
        let remaining = deadline.remaining();
        if remaining.is_zero() {
            return Err(deadline.expired(step));
        }
        // A zero window polls whatever is already buffered.
        let window = self.config.step_delay.min(remaining);
        let listen_started = Instant::now();
        self.port
            .set_io_timeout(window)
            .map_err(|source| deadline.io_error(step, source))?;

        let mut buf = [0u8; MAX_ACK_BYTES];
        let read = match self.port.read(&mut buf) {
            Ok(read) => read,
            // Silence is not an error; the modem only answers on some firmware.
            Err(err) if matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => 0,
            Err(source) => return Err(deadline.io_error(step, source)),
        };
        let listened = listen_started.elapsed();
        if read == 0 {
            return Ok(listened);
        }
        let response = String::from_utf8_lossy(&buf[..read]).trim().to_string();
        log::debug!("sigfox {} response: {:?}", step, response);
        if response.to_ascii_uppercase().contains("ERR") {
            return Err(TransmitError::Rejected { step, response });
        }
        Ok(listened)
    }
}

struct Deadline {
    started: Instant,
    limit: Duration,
}

impl Deadline {
    fn remaining(&self) -> Duration {
        self.limit.saturating_sub(self.started.elapsed())
    }

    fn expired(&self, step: HandshakeStep) -> TransmitError {
        TransmitError::Timeout {
            step,
            elapsed: self.started.elapsed(),
        }
    }

    fn io_error(&self, step: HandshakeStep, source: std::io::Error) -> TransmitError {
        if source.kind() == ErrorKind::TimedOut {
            self.expired(step)
        } else {
            TransmitError::Io { step, source }
        }
    }
}

// ----------------------------------------------------------------------------
// Serial transport
// ----------------------------------------------------------------------------

/// Sigfox modem on a serial device.
///
/// The port is opened on first use and kept open. Any failure drops it so the
/// next alert reopens the device (e.g. after a USB replug).
pub struct SerialSigfoxTransport {
    config: SigfoxConfig,
    modem: Option<SigfoxModem<Box<dyn SerialPort>>>,
}

impl SerialSigfoxTransport {
    pub fn new(config: SigfoxConfig) -> Self {
        Self {
            config,
            modem: None,
        }
    }

    fn open(&self) -> Result<SigfoxModem<Box<dyn SerialPort>>, TransmitError> {
        let port = serialport::new(self.config.device.as_str(), self.config.baud_rate)
            .data_bits(DataBits::Eight)
            .flow_control(FlowControl::None)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(self.config.handshake_timeout)
            .open()
            .map_err(|source| TransmitError::Open {
                device: self.config.device.clone(),
                source,
            })?;
        log::info!(
            "sigfox modem opened on {} at {} baud",
            self.config.device,
            self.config.baud_rate
        );
        Ok(SigfoxModem::new(port, self.config.clone()))
    }
}

impl AlertTransport for SerialSigfoxTransport {
    fn name(&self) -> &'static str {
        "sigfox-serial"
    }

    fn transmit(&mut self, payload: &[u8]) -> Result<(), TransmitError> {
        let mut modem = match self.modem.take() {
            Some(modem) => modem,
            None => self.open()?,
        };
        modem.transmit(payload)?;
        self.modem = Some(modem);
        Ok(())
    }
}
