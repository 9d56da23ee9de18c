//! Light painting stick protocol client.
//!
//! Talks to the stick firmware over any duplex byte stream (Bluetooth SPP,
//! serial, TCP bridge) using a compact framed protocol: an INFO handshake
//! discovers the device limits, then images are streamed in batches of
//! columns, each batch acknowledged with a CRC-32 of the bytes received.
//!
//! # Example
//!
//! ```ignore
//! use alps_stick::stick::{CancelToken, Playback, StickClient};
//!
//! let mut client = StickClient::new();
//! client.attach(connection)?;
//! client.show_image(w, h, &pixels, &Playback::default(), &CancelToken::new(), |_| {})?;
//! client.off()?;
//! ```

mod cancel;
mod client;
mod error;
mod image;
mod pixel;
pub mod protocol;

#[cfg(test)]
pub(crate) mod sim;

pub use cancel::CancelToken;
pub use client::{Connection, MAX_NACK_RETRIES, StickClient};
pub use error::{Result, StickError};
pub use image::{Image, Playback};
pub use pixel::PixelColor;
pub use protocol::DeviceCapabilities;
