//! # lorawan-frame
//!
//! LoRaWAN uplink frame encoding and decoding.
//!
//! This crate provides the frame types and codec for the LoRaWAN-style
//! frames exchanged in LWSim scenarios, matching the over-the-air layout.
//!
//! ## Frame Structure
//!
//! - MHDR (1 byte): MType (bits 5-7), RFU (bits 2-4), Major (bits 0-1)
//! - FHDR (data frames only):
//!   - DevAddr (4 bytes, little-endian)
//!   - FCtrl (1 byte, low nibble = FOpts length)
//!   - FCnt (2 bytes, little-endian)
//!   - FOpts (0-15 bytes)
//! - FPort (1 byte, optional)
//! - FRMPayload (remaining bytes)
//!
//! ## Example
//!
//! ```rust
//! use lorawan_frame::{DataFrame, DevAddr, MacFrame};
//!
//! let frame = DataFrame::uplink(false, DevAddr::new(0x1234_5678), 7, vec![0xAB; 4]);
//! let encoded = frame.encode();
//! match MacFrame::decode(&encoded).unwrap() {
//!     MacFrame::Data(f) => assert_eq!(f.fhdr.fcnt, 7),
//!     MacFrame::Other(_) => unreachable!(),
//! }
//! ```

pub mod error;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use error::FrameError;

// ============================================================================
// Constants
// ============================================================================

/// Minimum length of a data frame: MHDR + DevAddr + FCtrl + FCnt.
pub const MIN_DATA_FRAME_LEN: usize = 8;

/// Maximum FOpts length encodable in FCtrl.
pub const MAX_FOPTS_LEN: usize = 15;

// ============================================================================
// Header Types
// ============================================================================

/// Message type (bits 5-7 of MHDR).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MType {
    /// Join-request.
    JoinRequest = 0x00,
    /// Join-accept.
    JoinAccept = 0x01,
    /// Unconfirmed data uplink.
    UnconfirmedDataUp = 0x02,
    /// Unconfirmed data downlink.
    UnconfirmedDataDown = 0x03,
    /// Confirmed data uplink.
    ConfirmedDataUp = 0x04,
    /// Confirmed data downlink.
    ConfirmedDataDown = 0x05,
    /// Rejoin-request.
    RejoinRequest = 0x06,
    /// Proprietary frame.
    Proprietary = 0x07,
}

impl MType {
    /// Create from the raw MHDR byte (extracts bits 5-7).
    pub fn from_mhdr(mhdr: u8) -> Self {
        match (mhdr >> 5) & 0x07 {
            0x00 => MType::JoinRequest,
            0x01 => MType::JoinAccept,
            0x02 => MType::UnconfirmedDataUp,
            0x03 => MType::UnconfirmedDataDown,
            0x04 => MType::ConfirmedDataUp,
            0x05 => MType::ConfirmedDataDown,
            0x06 => MType::RejoinRequest,
            0x07 => MType::Proprietary,
            _ => unreachable!(),
        }
    }

    /// Convert to bits for the MHDR byte (bits 5-7).
    pub fn to_bits(self) -> u8 {
        (self as u8) << 5
    }

    /// Returns true for data frame types that carry an FHDR.
    pub fn has_fhdr(self) -> bool {
        matches!(
            self,
            MType::UnconfirmedDataUp
                | MType::UnconfirmedDataDown
                | MType::ConfirmedDataUp
                | MType::ConfirmedDataDown
        )
    }

    /// Returns true for uplink data frames.
    pub fn is_uplink_data(self) -> bool {
        matches!(self, MType::UnconfirmedDataUp | MType::ConfirmedDataUp)
    }

    /// Returns true for confirmed data frames.
    pub fn is_confirmed(self) -> bool {
        matches!(self, MType::ConfirmedDataUp | MType::ConfirmedDataDown)
    }

    /// Returns a lowercase label string suitable for log fields.
    pub fn as_label(&self) -> &'static str {
        match self {
            MType::JoinRequest => "join_request",
            MType::JoinAccept => "join_accept",
            MType::UnconfirmedDataUp => "unconfirmed_data_up",
            MType::UnconfirmedDataDown => "unconfirmed_data_down",
            MType::ConfirmedDataUp => "confirmed_data_up",
            MType::ConfirmedDataDown => "confirmed_data_down",
            MType::RejoinRequest => "rejoin_request",
            MType::Proprietary => "proprietary",
        }
    }
}

impl fmt::Display for MType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MType::JoinRequest => write!(f, "JOIN_REQUEST"),
            MType::JoinAccept => write!(f, "JOIN_ACCEPT"),
            MType::UnconfirmedDataUp => write!(f, "UNCONFIRMED_DATA_UP"),
            MType::UnconfirmedDataDown => write!(f, "UNCONFIRMED_DATA_DOWN"),
            MType::ConfirmedDataUp => write!(f, "CONFIRMED_DATA_UP"),
            MType::ConfirmedDataDown => write!(f, "CONFIRMED_DATA_DOWN"),
            MType::RejoinRequest => write!(f, "REJOIN_REQUEST"),
            MType::Proprietary => write!(f, "PROPRIETARY"),
        }
    }
}

/// Frame format major version (bits 0-1 of MHDR). Only R1 (0) is valid.
pub const MAJOR_LORAWAN_R1: u8 = 0x00;

// ============================================================================
// Device Address
// ============================================================================

/// 32-bit device address assigned by the network.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct DevAddr(u32);

impl DevAddr {
    /// Create a new address from its numeric value.
    pub fn new(raw: u32) -> Self {
        DevAddr(raw)
    }

    /// Get the numeric value.
    pub fn raw(&self) -> u32 {
        self.0
    }

    /// Decode from 4 little-endian bytes.
    pub fn from_le_bytes(bytes: [u8; 4]) -> Self {
        DevAddr(u32::from_le_bytes(bytes))
    }

    /// Encode to 4 little-endian bytes.
    pub fn to_le_bytes(&self) -> [u8; 4] {
        self.0.to_le_bytes()
    }
}

impl fmt::Display for DevAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

// ============================================================================
// Frame Control / Frame Header
// ============================================================================

/// Frame control byte (FCtrl).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FCtrl(pub u8);

impl FCtrl {
    /// ADR bit (bit 7).
    pub fn adr(&self) -> bool {
        self.0 & 0x80 != 0
    }

    /// ACK bit (bit 5).
    pub fn ack(&self) -> bool {
        self.0 & 0x20 != 0
    }

    /// FOpts field length (bits 0-3).
    pub fn fopts_len(&self) -> usize {
        (self.0 & 0x0F) as usize
    }

    /// Build an FCtrl with the given FOpts length.
    pub fn with_fopts_len(len: usize) -> Self {
        FCtrl((len.min(MAX_FOPTS_LEN)) as u8)
    }
}

/// Frame header (FHDR) of a data frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fhdr {
    /// Source (uplink) or destination (downlink) device address.
    pub dev_addr: DevAddr,
    /// Frame control byte.
    pub fctrl: FCtrl,
    /// Frame counter assigned by the sender. Increments by one per new
    /// application message; repeats unchanged on retransmission.
    pub fcnt: u16,
    /// MAC commands piggybacked in the header.
    pub fopts: Vec<u8>,
}

// ============================================================================
// Frames
// ============================================================================

/// A decoded data frame (MType with an FHDR).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataFrame {
    /// Message type.
    pub mtype: MType,
    /// Frame header.
    pub fhdr: Fhdr,
    /// Application port, present when a payload follows the header.
    pub fport: Option<u8>,
    /// Application payload bytes.
    pub frm_payload: Vec<u8>,
}

impl DataFrame {
    /// Build an uplink data frame with an empty FOpts field.
    pub fn uplink(confirmed: bool, dev_addr: DevAddr, fcnt: u16, frm_payload: Vec<u8>) -> Self {
        let mtype = if confirmed {
            MType::ConfirmedDataUp
        } else {
            MType::UnconfirmedDataUp
        };
        let fport = if frm_payload.is_empty() { None } else { Some(1) };
        DataFrame {
            mtype,
            fhdr: Fhdr {
                dev_addr,
                fctrl: FCtrl::default(),
                fcnt,
                fopts: Vec::new(),
            },
            fport,
            frm_payload,
        }
    }

    /// Encode the frame to its wire representation.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(MIN_DATA_FRAME_LEN + self.fhdr.fopts.len() + 1 + self.frm_payload.len());
        buf.push(self.mtype.to_bits() | MAJOR_LORAWAN_R1);
        buf.extend_from_slice(&self.fhdr.dev_addr.to_le_bytes());
        buf.push(FCtrl::with_fopts_len(self.fhdr.fopts.len()).0 | (self.fhdr.fctrl.0 & 0xF0));
        buf.extend_from_slice(&self.fhdr.fcnt.to_le_bytes());
        buf.extend_from_slice(&self.fhdr.fopts);
        if let Some(port) = self.fport {
            buf.push(port);
            buf.extend_from_slice(&self.frm_payload);
        }
        buf
    }
}

/// Any decodable MAC frame.
///
/// Data frames are fully parsed; join and proprietary frames are surfaced
/// with their type only, since the telemetry engine ignores them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacFrame {
    /// A data frame with a parsed FHDR.
    Data(DataFrame),
    /// A non-data frame (join, rejoin, proprietary).
    Other(MType),
}

impl MacFrame {
    /// Decode a raw frame buffer.
    ///
    /// Fails with [`FrameError::Truncated`] when the buffer ends inside a
    /// header field and [`FrameError::UnsupportedMajor`] when the MHDR major
    /// bits are not LoRaWAN R1.
    pub fn decode(raw: &[u8]) -> Result<MacFrame, FrameError> {
        let mhdr = *raw.first().ok_or(FrameError::Truncated { needed: 1, got: 0 })?;
        let major = mhdr & 0x03;
        if major != MAJOR_LORAWAN_R1 {
            return Err(FrameError::UnsupportedMajor(major));
        }

        let mtype = MType::from_mhdr(mhdr);
        if !mtype.has_fhdr() {
            return Ok(MacFrame::Other(mtype));
        }

        if raw.len() < MIN_DATA_FRAME_LEN {
            return Err(FrameError::Truncated {
                needed: MIN_DATA_FRAME_LEN,
                got: raw.len(),
            });
        }

        let dev_addr = DevAddr::from_le_bytes([raw[1], raw[2], raw[3], raw[4]]);
        let fctrl = FCtrl(raw[5]);
        let fcnt = u16::from_le_bytes([raw[6], raw[7]]);

        let fopts_end = MIN_DATA_FRAME_LEN + fctrl.fopts_len();
        if raw.len() < fopts_end {
            return Err(FrameError::Truncated {
                needed: fopts_end,
                got: raw.len(),
            });
        }
        let fopts = raw[MIN_DATA_FRAME_LEN..fopts_end].to_vec();

        let (fport, frm_payload) = match raw.get(fopts_end) {
            Some(&port) => (Some(port), raw[fopts_end + 1..].to_vec()),
            None => (None, Vec::new()),
        };

        Ok(MacFrame::Data(DataFrame {
            mtype,
            fhdr: Fhdr {
                dev_addr,
                fctrl,
                fcnt,
                fopts,
            },
            fport,
            frm_payload,
        }))
    }
}
