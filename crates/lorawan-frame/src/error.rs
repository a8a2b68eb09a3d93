//! Frame decode errors.

use thiserror::Error;

/// Errors produced while decoding a raw frame buffer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The buffer ended before a complete header could be read.
    #[error("truncated frame: need {needed} bytes, got {got}")]
    Truncated {
        /// Bytes required to finish the current field.
        needed: usize,
        /// Bytes actually available.
        got: usize,
    },

    /// The MHDR major version bits are not LoRaWAN R1.
    #[error("unsupported major version: {0:#04x}")]
    UnsupportedMajor(u8),
}
