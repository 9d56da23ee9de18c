//! StickClient: framing, handshake and acknowledged transmission.

use std::io::{Read, Write};

use tracing::{debug, info, warn};

use super::cancel::CancelToken;
use super::error::{Result, StickError};
use super::image::{Playback, check_dimensions};
use super::protocol::{
    ACK_SIZE, Ack, CMD_INFO, DeviceCapabilities, INFO_REPLY_SIZE, continue_image_header, encode_column, new_image_header,
    off_frame, parse_info_reply,
};

/// Upper bound for [`StickClient::set_nack_retries`].
pub const MAX_NACK_RETRIES: u8 = 3;

/// Duplex byte stream to the stick (RFCOMM socket, serial port, TCP bridge...).
pub trait Connection: Read + Write + Send {}

impl<T: Read + Write + Send + ?Sized> Connection for T {}

/// Client side of the stick protocol.
///
/// Owns the connection, the transmit buffer and the running CRC. Provides
/// blocking I/O operations only: a single thread is expected to drive it,
/// see [`crate::sender::Sender`] for the threaded wrapper.
pub struct StickClient {
    conn: Option<Box<dyn Connection>>,
    capabilities: Option<DeviceCapabilities>,
    buf: Vec<u8>,
    crc: crc32fast::Hasher,
    nack_retries: u8,
}

impl StickClient {
    /// Create a client with no connection attached.
    pub fn new() -> Self {
        Self {
            conn: None,
            capabilities: None,
            buf: Vec::new(),
            crc: crc32fast::Hasher::new(),
            nack_retries: 0,
        }
    }

    /// Resend a frame up to `retries` times when the stick nacks it.
    ///
    /// CRC mismatches are never retried.
    pub fn set_nack_retries(&mut self, retries: u8) -> Result<()> {
        if retries > MAX_NACK_RETRIES {
            return Err(StickError::invalid_argument(format!(
                "at most {MAX_NACK_RETRIES} nack retries are allowed, got {retries}"
            )));
        }
        self.nack_retries = retries;
        Ok(())
    }

    /// Attach a connection and negotiate the stick capabilities.
    ///
    /// Any previous connection is dropped first. If the handshake fails the
    /// new connection is dropped too and the client stays disconnected.
    ///
    /// # Errors
    /// `ProtocolVersionMismatch` if the stick does not answer with the INFO
    /// magic, or any transport error.
    pub fn attach(&mut self, mut conn: Box<dyn Connection>) -> Result<DeviceCapabilities> {
        self.conn = None;
        self.capabilities = None;

        info!("Attaching stick, sending INFO");
        conn.write_all(&[CMD_INFO])?;
        conn.flush()?;

        let mut reply = [0u8; INFO_REPLY_SIZE];
        conn.read_exact(&mut reply)?;
        let caps = parse_info_reply(&reply)?;

        let needed = caps.buffer_size();
        if self.buf.capacity() < needed {
            self.buf.reserve_exact(needed - self.buf.len());
        }
        self.crc = crc32fast::Hasher::new();
        self.conn = Some(conn);
        self.capabilities = Some(caps);

        info!(
            "Stick attached: {} pixels, {} columns per message, extensions={:#04x}",
            caps.max_pixels_per_column, caps.max_columns_per_message, caps.extensions
        );
        Ok(caps)
    }

    /// Drop the connection, returning it to the caller.
    pub fn detach(&mut self) -> Option<Box<dyn Connection>> {
        self.capabilities = None;
        self.conn.take()
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Capabilities negotiated by the last successful [`StickClient::attach`].
    pub fn capabilities(&self) -> Option<DeviceCapabilities> {
        self.capabilities
    }

    /// Turn every LED off immediately.
    pub fn off(&mut self) -> Result<()> {
        if !self.is_connected() {
            return Err(StickError::NotConnected);
        }
        debug!("Turning stick off");
        self.buf.clear();
        self.buf.extend_from_slice(&off_frame(rand::random()));
        self.send_buffer()
    }

    /// Stream a row-major ARGB image to the stick, column by column.
    ///
    /// Columns are coalesced in batches of at most `max_columns_per_message`;
    /// each batch is acknowledged before the next one is written.
    /// `on_progress` receives the number of columns of the current pass the
    /// stick has acknowledged so far.
    ///
    /// With `playback.looping` the image repeats until `cancel` is set, so the
    /// call only returns with an error (`Cancelled` on a clean stop).
    ///
    /// # Errors
    /// Argument errors are returned before anything is written. Transport,
    /// nack and CRC errors abort the pass; call [`StickClient::off`] afterwards.
    pub fn show_image<F>(
        &mut self,
        width: usize,
        height: usize,
        pixels: &[u32],
        playback: &Playback,
        cancel: &CancelToken,
        mut on_progress: F,
    ) -> Result<()>
    where
        F: FnMut(usize),
    {
        let caps = match (&self.conn, self.capabilities) {
            (Some(_), Some(caps)) => caps,
            _ => return Err(StickError::NotConnected),
        };

        if height > usize::from(caps.max_pixels_per_column) {
            return Err(StickError::DeviceLimitExceeded {
                height,
                max_pixels: caps.max_pixels_per_column,
            });
        }
        check_dimensions(width, height, pixels.len())?;
        playback.validate()?;

        // Both bounded by the negotiated u8 limits.
        let rows = height as u8;
        let max_cols = usize::from(caps.max_columns_per_message);

        info!(
            "Showing {width}x{height} image: brightness={}, delay={}ms, loop={}",
            playback.brightness, playback.delay_ms, playback.looping
        );

        let final_pass = !playback.looping;
        let mut pass: u64 = 0;
        loop {
            pass += 1;
            let mut x = 0;
            let mut batch = max_cols.min(width);

            self.buf.clear();
            self.buf
                .extend_from_slice(&new_image_header(rows, playback.delay_ms, batch as u8));

            loop {
                for col in x..x + batch {
                    encode_column(&mut self.buf, pixels, width, height, col, playback.brightness);
                }

                if cancel.is_cancelled() {
                    info!("Transmission cancelled at column {x} of pass {pass}");
                    return Err(StickError::Cancelled);
                }
                self.send_buffer()?;

                for col in x..x + batch {
                    on_progress(col + 1);
                }
                x += batch;
                if x == width {
                    break;
                }

                batch = max_cols.min(width - x);
                let last = final_pass && x + batch == width;
                self.buf.clear();
                self.buf.extend_from_slice(&continue_image_header(last, batch as u8));
            }

            if final_pass {
                if width <= max_cols {
                    // The whole image went out with NEW_IMAGE, close it explicitly.
                    self.buf.clear();
                    self.buf.extend_from_slice(&continue_image_header(true, 0));
                    self.send_buffer()?;
                }
                info!("Image sent");
                return Ok(());
            }
            debug!("Pass {pass} complete, looping");
        }
    }

    /// Send the transmit buffer, resending on nack within the retry budget.
    fn send_buffer(&mut self) -> Result<()> {
        let mut attempt: u8 = 0;
        loop {
            match self.send_and_wait_ack() {
                Err(StickError::DeviceNack { status }) if attempt < self.nack_retries => {
                    attempt += 1;
                    warn!(
                        "Stick nacked frame (status {status:#04x}), retry {attempt}/{}",
                        self.nack_retries
                    );
                }
                other => return other,
            }
        }
    }

    /// Write the buffer as one frame and check the acknowledgement.
    fn send_and_wait_ack(&mut self) -> Result<()> {
        let conn = self.conn.as_mut().ok_or(StickError::NotConnected)?;
        debug!("TX {} bytes, cmd={:?}", self.buf.len(), self.buf.first().map(|&b| b as char));

        let result = exchange(&mut **conn, &self.buf, &mut self.crc);
        // The CRC window restarts after every acknowledgement, good or bad.
        let expected = std::mem::take(&mut self.crc).finalize();
        let ack = result?;

        if !ack.is_ok() {
            return Err(StickError::DeviceNack { status: ack.status });
        }
        if ack.crc != expected {
            return Err(StickError::CorruptedTransmission {
                expected,
                actual: ack.crc,
            });
        }
        Ok(())
    }
}

impl Default for StickClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Write a frame, then block until the full acknowledgement has arrived.
fn exchange(conn: &mut dyn Connection, frame: &[u8], crc: &mut crc32fast::Hasher) -> Result<Ack> {
    conn.write_all(frame)?;
    crc.update(frame);
    conn.flush()?;

    let mut reply = [0u8; ACK_SIZE];
    conn.read_exact(&mut reply)?;
    Ok(Ack::parse(&reply))
}
