//! Host-side driver for the ALPS light painting stick.

pub mod config;
pub mod error;
pub mod pattern;
pub mod sender;
pub mod stick;
pub mod transport;

pub use error::{AppError, Result};
