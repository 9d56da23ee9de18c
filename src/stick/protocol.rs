//! Stick wire format: command bytes, frame headers and reply decoding.
//!
//! Frames have no length prefix. The payload size follows from the command:
//!
//! ```text
//! INFO            '?'
//! INFO reply      '!' ext reserved max_pixels max_cols
//! OFF             'o' pad pad pad pad
//! NEW_IMAGE       'n' height delay_ms cols   + cols * height * RGB
//! CONTINUE_IMAGE  'c' last cols              + cols * height * RGB
//! ACK             'o' crc32 (big-endian)
//! ```

use serde::Serialize;

use super::error::{Result, StickError};
use super::pixel::PixelColor;

// Host -> stick
pub const CMD_INFO: u8 = b'?';
pub const CMD_OFF: u8 = b'o';
pub const CMD_NEW_IMAGE: u8 = b'n';
pub const CMD_CONTINUE_IMAGE: u8 = b'c';

// Stick -> host
pub const INFO_MAGIC: u8 = b'!';
pub const ACK_OK: u8 = b'o';

pub const INFO_REPLY_SIZE: usize = 5;
pub const ACK_SIZE: usize = 5;
pub const OFF_FRAME_SIZE: usize = 5;
pub const NEW_IMAGE_HEADER_SIZE: usize = 4;
pub const CONTINUE_IMAGE_HEADER_SIZE: usize = 3;

/// Room reserved in the transmit buffer for the largest frame header.
pub const HEADER_SLACK: usize = NEW_IMAGE_HEADER_SIZE;

/// Limits negotiated with the stick during the INFO handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeviceCapabilities {
    /// Number of LEDs on the stick.
    pub max_pixels_per_column: u8,
    /// How many columns fit in a single message.
    pub max_columns_per_message: u8,
    /// Extension flags advertised by the firmware.
    pub extensions: u8,
}

impl DeviceCapabilities {
    /// Transmit buffer size able to hold the largest frame.
    pub fn buffer_size(&self) -> usize {
        usize::from(self.max_columns_per_message) * usize::from(self.max_pixels_per_column) * 3 + HEADER_SLACK
    }
}

/// Decode the 5 byte INFO reply.
pub fn parse_info_reply(reply: &[u8; INFO_REPLY_SIZE]) -> Result<DeviceCapabilities> {
    let [magic, extensions, _reserved, max_pixels, max_cols] = *reply;

    if magic != INFO_MAGIC {
        return Err(StickError::ProtocolVersionMismatch {
            expected: INFO_MAGIC,
            got: magic,
        });
    }
    if max_pixels == 0 || max_cols == 0 {
        return Err(StickError::InvalidResponse(format!(
            "stick reports {max_pixels} pixels and {max_cols} columns per message"
        )));
    }

    Ok(DeviceCapabilities {
        max_pixels_per_column: max_pixels,
        max_columns_per_message: max_cols,
        extensions,
    })
}

/// Acknowledgement sent by the stick after every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub status: u8,
    pub crc: u32,
}

impl Ack {
    /// The CRC goes out most significant byte first.
    pub fn parse(reply: &[u8; ACK_SIZE]) -> Self {
        let crc = reply[1..]
            .iter()
            .fold(0u32, |crc, &b| (crc << 8) | u32::from(b));
        Self { status: reply[0], crc }
    }

    pub fn encode(&self) -> [u8; ACK_SIZE] {
        let [a, b, c, d] = self.crc.to_be_bytes();
        [self.status, a, b, c, d]
    }

    pub fn is_ok(&self) -> bool {
        self.status == ACK_OK
    }
}

/// CRC-32 (IEEE) of a byte slice, as computed by the firmware.
pub fn checksum(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Build an OFF frame. The padding is ignored by the stick.
pub fn off_frame(padding: [u8; 4]) -> [u8; OFF_FRAME_SIZE] {
    let [a, b, c, d] = padding;
    [CMD_OFF, a, b, c, d]
}

/// Header announcing a new image and the columns that immediately follow.
pub fn new_image_header(height: u8, delay_ms: u8, cols: u8) -> [u8; NEW_IMAGE_HEADER_SIZE] {
    [CMD_NEW_IMAGE, height, delay_ms, cols]
}

/// Header for the next batch of columns of the current image.
pub fn continue_image_header(last_batch: bool, cols: u8) -> [u8; CONTINUE_IMAGE_HEADER_SIZE] {
    [CMD_CONTINUE_IMAGE, u8::from(last_batch), cols]
}

/// Append column `x` of a row-major image to `buf`, bottom row first.
pub(crate) fn encode_column(buf: &mut Vec<u8>, pixels: &[u32], width: usize, height: usize, x: usize, brightness: f32) {
    for row in (0..height).rev() {
        let color = PixelColor::scaled(pixels[row * width + x], brightness);
        buf.extend_from_slice(&color.to_bytes());
    }
}
