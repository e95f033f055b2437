//! sigfox_send - send one message through the Sigfox modem
//!
//! Runs the same handshake the daemon uses, once, for bench testing a modem.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::time::Duration;

use pose_sentinel::alert::sigfox::{
    SigfoxConfig, DEFAULT_BAUD_RATE, DEFAULT_REGION_COMMAND, DEFAULT_SERIAL_DEVICE,
};
use pose_sentinel::alert::{encode_counter, AlertTransport, LogTransport, SerialSigfoxTransport};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Serial device of the modem.
    #[arg(long, env = "SENTINEL_SERIAL_DEVICE", default_value = DEFAULT_SERIAL_DEVICE)]
    device: String,
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,
    /// Region-select command (network configuration zone).
    #[arg(long, default_value = DEFAULT_REGION_COMMAND)]
    region: String,
    /// Delay between handshake steps, in milliseconds.
    #[arg(long, default_value_t = 200)]
    step_delay_ms: u64,
    /// Read back modem responses after each step.
    #[arg(long)]
    read_ack: bool,
    /// Raw payload text to send.
    #[arg(long, conflicts_with = "counter")]
    payload: Option<String>,
    /// Send a counter value, encoded like daemon alerts.
    #[arg(long)]
    counter: Option<u32>,
    /// Log the handshake instead of opening the device.
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let payload = match (&args.payload, args.counter) {
        (Some(text), None) => text.clone().into_bytes(),
        (None, Some(value)) => encode_counter(value),
        (None, None) => encode_counter(0),
        (Some(_), Some(_)) => return Err(anyhow!("--payload and --counter are exclusive")),
    };
    if payload.is_empty() {
        return Err(anyhow!("payload must not be empty"));
    }

    let step_delay = Duration::from_millis(args.step_delay_ms);
    let mut transport: Box<dyn AlertTransport> = if args.dry_run {
        Box::new(LogTransport::new(step_delay))
    } else {
        let config = SigfoxConfig {
            device: args.device.clone(),
            baud_rate: args.baud,
            region_command: args.region.clone(),
            step_delay,
            read_ack: args.read_ack,
            ..SigfoxConfig::default()
        };
        Box::new(SerialSigfoxTransport::new(config))
    };

    log::info!(
        "sending {:?} via {}",
        String::from_utf8_lossy(&payload),
        transport.name()
    );
    transport.transmit(&payload)?;
    log::info!("sent");
    Ok(())
}
