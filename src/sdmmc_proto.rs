//! sdmmc-fatconf - SD/MMC Protocol
//!
//! Command indices, response codes and polling budgets for SD cards in SPI
//! mode. Each wait gives up after exactly this many tries.

/// GO_IDLE_STATE - init card in spi mode if CS low
pub const CMD0: u8 = 0x00;
/// SEND_IF_COND - verify SD Memory Card interface operating condition.
pub const CMD8: u8 = 0x08;
/// READ_BLOCK - read a single data block from the card
pub const CMD17: u8 = 0x11;
/// APP_CMD - escape for application specific command
pub const CMD55: u8 = 0x37;
/// READ_OCR - read the OCR register of a card
pub const CMD58: u8 = 0x3A;
/// SD_SEND_OP_COMD - Sends host capacity support information and activates
/// the card's initialization process
pub const ACMD41: u8 = 0x29;

/// CMD8 argument: 2.7-3.6V supply and the 0xAA check pattern.
pub const CMD8_ARG: u32 = 0x0000_01AA;
/// The check pattern the card must echo back in its R7 response.
pub const CMD8_CHECK_PATTERN: u8 = 0xAA;
/// ACMD41 argument: the host supports high capacity cards (HCS).
pub const ACMD41_ARG: u32 = 0x4000_0000;

/// status for card in the ready state
pub const R1_READY_STATE: u8 = 0x00;
/// status for card in the idle state
pub const R1_IDLE_STATE: u8 = 0x01;
/// What the bus reads while the card drives nothing.
pub const NO_RESPONSE: u8 = 0xFF;
/// start data token for read or write single block
pub const DATA_START_BLOCK: u8 = 0xFE;

/// Filler bytes clocked with chip select released during power up; ten bytes
/// give the card the 74 clock edges it needs.
pub const POWER_UP_CLOCK_BYTES: usize = 10;
/// Settle time before the first command, between ACMD41 attempts and before
/// reading the OCR.
pub const SETTLE_DELAY_MS: u8 = 1;
/// Byte exchanges spent waiting for an R1 response.
pub const R1_POLL_ATTEMPTS: usize = 9;
/// CMD0 transactions before the card is declared missing.
pub const GO_IDLE_ATTEMPTS: usize = 10;
/// CMD55/ACMD41 rounds before initialization is abandoned.
pub const APP_INIT_ATTEMPTS: usize = 255;
/// Byte exchanges spent waiting for the data start token of a block read.
pub const DATA_TOKEN_ATTEMPTS: usize = 1563;

/// Perform the 7-bit CRC used on the SD card command frame and append the end
/// bit.
pub fn crc7(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for mut d in data.iter().cloned() {
        for _bit in 0..8 {
            crc <<= 1;
            if ((d & 0x80) ^ (crc & 0x80)) != 0 {
                crc ^= 0x09;
            }
            d <<= 1;
        }
    }
    (crc << 1) | 1
}

/// A 6 byte command frame as it goes out on the wire: start and transmission
/// bits with the command index, a big-endian argument, then CRC7 and the end
/// bit.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CommandFrame([u8; 6]);

impl CommandFrame {
    pub const LEN: usize = 6;

    pub fn new(command: u8, arg: u32) -> Self {
        let arg = arg.to_be_bytes();
        let mut buf = [0x40 | (command & 0x3F), arg[0], arg[1], arg[2], arg[3], 0];
        buf[5] = crc7(&buf[0..5]);
        CommandFrame(buf)
    }

    /// The command index, without the start and transmission bits.
    pub fn command(&self) -> u8 {
        self.0[0] & 0x3F
    }

    pub fn argument(&self) -> u32 {
        u32::from_be_bytes([self.0[1], self.0[2], self.0[3], self.0[4]])
    }

    pub fn checksum(&self) -> u8 {
        self.0[5]
    }

    pub fn bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

// ****************************************************************************
//
// Unit Tests
//
// ****************************************************************************
