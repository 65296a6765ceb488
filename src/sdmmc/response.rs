//! Response formats returned by the card in SPI mode.

use crate::sdmmc_proto::{DATA_START_BLOCK, NO_RESPONSE};

bitflags::bitflags! {
    /// The R1 response byte. Bit 7 is always clear in a real response, so a
    /// value with it set means the card drove nothing onto the bus.
    pub struct R1: u8 {
        const IN_IDLE_STATE = (1 << 0);
        const ERASE_RESET = (1 << 1);
        const ILLEGAL_COMMAND = (1 << 2);
        const COM_CRC_ERROR = (1 << 3);
        const ERASE_SEQUENCE_ERROR = (1 << 4);
        const ADDRESS_ERROR = (1 << 5);
        const PARAMETER_ERROR = (1 << 6);
        const START_BIT = (1 << 7);
    }
}

impl R1 {
    pub fn from_byte(value: u8) -> Self {
        Self::from_bits_truncate(value)
    }

    /// The card has left the idle state and accepts commands.
    pub fn is_ready(&self) -> bool {
        self.bits() == crate::sdmmc_proto::R1_READY_STATE
    }

    /// The card is idle with no error flagged.
    pub fn is_idle(&self) -> bool {
        self.bits() == crate::sdmmc_proto::R1_IDLE_STATE
    }

    /// Only the idle bit (or nothing) is set. Anything above bit 0 means the
    /// rest of a longer response must not be read.
    pub fn is_error_free(&self) -> bool {
        self.bits() < 0x02
    }

    pub fn is_no_response(&self) -> bool {
        self.bits() == NO_RESPONSE
    }
}

/// An R7 or R3 response: the R1 byte and, if the R1 byte carried no error,
/// the four trailing bytes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ExtendedResponse {
    r1: R1,
    trailer: Option<[u8; 4]>,
}

impl ExtendedResponse {
    pub(crate) fn new(r1: R1, trailer: Option<[u8; 4]>) -> Self {
        Self { r1, trailer }
    }

    pub fn r1(&self) -> R1 {
        self.r1
    }

    pub fn trailer(&self) -> Option<[u8; 4]> {
        self.trailer
    }

    /// Interpret the trailer as the R7 reply to CMD8.
    pub fn if_cond(&self) -> Option<IfCond> {
        self.trailer.map(IfCond)
    }

    /// Interpret the trailer as the R3 reply to CMD58.
    pub fn ocr(&self) -> Option<Ocr> {
        self.trailer.map(|t| Ocr(u32::from_be_bytes(t)))
    }
}

/// Payload of an R7 response.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct IfCond(pub [u8; 4]);

impl IfCond {
    pub fn command_version(&self) -> u8 {
        self.0[0] >> 4
    }

    pub fn voltage_accepted(&self) -> VoltageAccepted {
        VoltageAccepted::from_nibble(self.0[2] & 0x0F)
    }

    /// Echo of the low argument byte sent with CMD8.
    pub fn check_pattern(&self) -> u8 {
        self.0[3]
    }
}

#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VoltageAccepted {
    /// 2.7 - 3.6 V
    Standard,
    LowVoltage,
    Reserved(u8),
    NotDefined(u8),
}

impl VoltageAccepted {
    pub fn from_nibble(value: u8) -> Self {
        match value {
            0b0001 => Self::Standard,
            0b0010 => Self::LowVoltage,
            0b0100 | 0b1000 => Self::Reserved(value),
            _ => Self::NotDefined(value),
        }
    }
}

/// The Operation Conditions Register, as returned in an R3 response.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Ocr(pub u32);

bitflags::bitflags! {
    /// OCR bits 15 to 23, one per 0.1 V step from 2.7 V to 3.6 V.
    pub struct VoltageWindow: u16 {
        const V27_28 = (1 << 0);
        const V28_29 = (1 << 1);
        const V29_30 = (1 << 2);
        const V30_31 = (1 << 3);
        const V31_32 = (1 << 4);
        const V32_33 = (1 << 5);
        const V33_34 = (1 << 6);
        const V34_35 = (1 << 7);
        const V35_36 = (1 << 8);
    }
}

impl Ocr {
    /// Low while the card is still running its power up routine.
    pub fn power_up_complete(&self) -> bool {
        self.0 & (1 << 31) != 0
    }

    /// Card Capacity Status; only meaningful once power up is complete.
    pub fn card_capacity_status(&self) -> bool {
        self.0 & (1 << 30) != 0
    }

    pub fn voltage_window(&self) -> VoltageWindow {
        VoltageWindow::from_bits_truncate((self.0 >> 15) as u16)
    }
}

/// What came back from a single block read: the R1 byte of CMD17 and the
/// first non-filler byte seen while waiting for data.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BlockResponse {
    pub r1: u8,
    /// `0xFF` if no token arrived in time.
    pub token: u8,
}

impl BlockResponse {
    pub fn is_success(&self) -> bool {
        R1::from_byte(self.r1).is_error_free() && self.token == DATA_START_BLOCK
    }
}

// ****************************************************************************
//
// Unit Tests
//
// ****************************************************************************
