//! Opening byte streams to the stick.
//!
//! Paired Bluetooth sticks show up as RFCOMM tty devices (`/dev/rfcomm0`)
//! and are driven like any serial port. `tcp://host:port` reaches a stick
//! behind a serial-to-TCP bridge or a simulator.

use std::io;
use std::net::TcpStream;
use std::time::Duration;

use tracing::info;

use crate::config::DeviceConfig;
use crate::stick::{Connection, Result};

/// Serial ports have no "no timeout" setting; this is the stand-in.
const SERIAL_BLOCKING_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

const TCP_SCHEME: &str = "tcp://";

/// Where a stick can be reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Tcp(String),
    Serial(String),
}

impl Endpoint {
    pub fn parse(address: &str) -> Self {
        match address.strip_prefix(TCP_SCHEME) {
            Some(addr) => Self::Tcp(addr.to_string()),
            None => Self::Serial(address.to_string()),
        }
    }
}

/// Open the connection described by `config`, with its I/O timeout applied.
///
/// # Errors
/// Returns `StickError::Io` (or `Timeout`) if the device cannot be opened.
pub fn open(config: &DeviceConfig) -> Result<Box<dyn Connection>> {
    let timeout = config.io_timeout();

    match Endpoint::parse(&config.address) {
        Endpoint::Tcp(addr) => {
            info!("Connecting to stick at tcp://{addr} (timeout={timeout:?})");
            let stream = TcpStream::connect(&addr)?;
            stream.set_read_timeout(timeout)?;
            stream.set_write_timeout(timeout)?;
            stream.set_nodelay(true)?;
            Ok(Box::new(stream))
        }
        Endpoint::Serial(path) => {
            info!(
                "Opening stick at {path} ({} baud, timeout={timeout:?})",
                config.baud_rate
            );
            let port = serialport::new(&path, config.baud_rate)
                .timeout(timeout.unwrap_or(SERIAL_BLOCKING_TIMEOUT))
                .open()
                .map_err(io::Error::from)?;
            Ok(Box::new(port))
        }
    }
}
