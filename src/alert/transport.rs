use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// One step of the modem handshake.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandshakeStep {
    Wake,
    SelectRegion,
    BeginTransmission,
    Payload,
}

impl fmt::Display for HandshakeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandshakeStep::Wake => "wake",
            HandshakeStep::SelectRegion => "region select",
            HandshakeStep::BeginTransmission => "begin transmission",
            HandshakeStep::Payload => "payload",
        };
        f.write_str(name)
    }
}

/// Recoverable alert transmission failure.
///
/// Caught at the alert channel boundary and logged; it never reaches the frame loop.
#[derive(Debug, Error)]
pub enum TransmitError {
    #[error("failed to open alert device {device}: {source}")]
    Open {
        device: String,
        #[source]
        source: serialport::Error,
    },
    #[error("i/o error during {step}: {source}")]
    Io {
        step: HandshakeStep,
        #[source]
        source: std::io::Error,
    },
    #[error("{step} timed out after {elapsed:?}")]
    Timeout {
        step: HandshakeStep,
        elapsed: Duration,
    },
    #[error("modem rejected {step}: {response}")]
    Rejected {
        step: HandshakeStep,
        response: String,
    },
    #[error("transport aborted: {0}")]
    Aborted(String),
}

/// Low-bandwidth alert link.
///
/// `transmit` is fire-and-forget from the caller's point of view: it returns
/// once the payload has been handed to the device (or the attempt failed).
pub trait AlertTransport: Send {
    /// Transport identifier.
    fn name(&self) -> &'static str;

    fn transmit(&mut self, payload: &[u8]) -> Result<(), TransmitError>;
}

/// Encode an alert counter as 8 lowercase hex ASCII digits (a 4-byte Sigfox payload).
pub fn encode_counter(value: u32) -> Vec<u8> {
    format!("{:08x}", value).into_bytes()
}
