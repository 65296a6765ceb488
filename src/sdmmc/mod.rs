//! sdmmc-fatconf - SDMMC Protocol
//!
//! Implements the SD card bring-up sequence and single block reads on some
//! generic SPI interface.
//!
//! This is currently optimised for readability and debugability, not
//! performance.

mod busy;
pub mod diagnostics;
pub mod response;

use busy::SdMmcSpiBusy;

use super::sdmmc_proto::*;
use super::{Block, BlockDevice, BlockIdx};
use response::{BlockResponse, ExtendedResponse, Ocr, R1};

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::blocking::spi::Transfer;
use embedded_hal::digital::v2::OutputPin;
#[cfg(feature = "log")]
use log::{debug, trace, warn};

#[cfg(feature = "defmt-log")]
use defmt::{debug, trace, warn};

/// Represents an SD Card interface.
/// Built from an SPI peripheral, a Chip Select pin and a delay source. We
/// need Chip Select to be separate so we can clock out some bytes without
/// Chip Select asserted (which puts the card into SPI mode).
///
/// The interface owns the one sector buffer every block read lands in.
pub struct SdMmcSpi<SPI, CS, DELAY, State>
where
    SPI: Transfer<u8>,
    CS: OutputPin,
    DELAY: DelayMs<u8>,
{
    card_type: CardType,
    spi: SPI,
    cs: CS,
    delay: DELAY,
    buffer: Block,
    ocr: Option<Ocr>,
    state: State,
}

/// The possible errors `SdMmcSpi` can generate.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Error {
    /// We got an error from the SPI peripheral
    Transport,
    /// Couldn't set a GPIO pin
    GpioError,
    /// The card never reported the idle state after CMD0
    CardNotFound,
    /// CMD8 failed or echoed the wrong check pattern: not an SD v2+ card
    UnsupportedCard { r1: u8, echo: u8 },
    /// We didn't get the ready state when executing this application-specific command
    TimeoutACommand(u8),
    /// We didn't get a response when executing this command
    TimeoutCommand(u8),
    /// The card flagged an error in the R1 response to this command
    CommandError { command: u8, r1: u8 },
    /// We didn't get a data start token when reading data from the card
    TimeoutReadBuffer,
    /// The card sent a data error token instead of data
    DataError(u8),
    /// The block lies beyond the 4 GiB a byte addressed card can reach
    AddressOutOfRange(u32),
}

/// The state of an SdMmcSpi if it is not initialized
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub struct NotInit;

/// The state of an SdMmcSpi if it is initialized
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub struct Initialized;

/// The different types of card we support.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CardType {
    /// Standard capacity v2 card, addressed in bytes.
    SD2,
    /// High capacity card, addressed in blocks.
    SDHC,
}

impl BlockResponse {
    /// Turn the raw pair into the error it signals, if any.
    pub fn check(&self) -> Result<(), Error> {
        let r1 = R1::from_byte(self.r1);
        if r1.is_no_response() {
            Err(Error::TimeoutCommand(CMD17))
        } else if !r1.is_error_free() {
            Err(Error::CommandError {
                command: CMD17,
                r1: self.r1,
            })
        } else if self.token == NO_RESPONSE {
            Err(Error::TimeoutReadBuffer)
        } else if self.token != DATA_START_BLOCK {
            Err(Error::DataError(self.token))
        } else {
            Ok(())
        }
    }
}

impl<SPI, CS, DELAY, State> SdMmcSpi<SPI, CS, DELAY, State>
where
    SPI: Transfer<u8>,
    CS: OutputPin,
    DELAY: DelayMs<u8>,
{
    /// Run one command transaction with chip select asserted.
    ///
    /// Chip select is always deasserted, even if an error occured in `f`
    fn with_chip_select<F, R>(&mut self, f: F) -> Result<R, Error>
    where
        F: FnOnce(&mut SdMmcSpiBusy<SPI, CS>) -> Result<R, Error>,
    {
        let mut busy = SdMmcSpiBusy::new(&mut self.spi, &mut self.cs)?;
        f(&mut busy)
    }

    fn card_command(&mut self, command: u8, arg: u32) -> Result<R1, Error> {
        let r1 = self.with_chip_select(|s| s.card_command(command, arg))?;
        trace!("CMD{} -> {:x}", command, r1.bits());
        Ok(r1)
    }

    fn card_command_extended(&mut self, command: u8, arg: u32) -> Result<ExtendedResponse, Error> {
        let response = self.with_chip_select(|s| s.card_command_extended(command, arg))?;
        trace!("CMD{} -> {:x}", command, response.r1().bits());
        Ok(response)
    }

    fn into_state<S>(self, state: S) -> SdMmcSpi<SPI, CS, DELAY, S> {
        SdMmcSpi {
            card_type: self.card_type,
            spi: self.spi,
            cs: self.cs,
            delay: self.delay,
            buffer: self.buffer,
            ocr: self.ocr,
            state,
        }
    }

    /// Give back the peripherals.
    pub fn release(self) -> (SPI, CS, DELAY) {
        (self.spi, self.cs, self.delay)
    }
}

impl<SPI, CS, DELAY> SdMmcSpi<SPI, CS, DELAY, NotInit>
where
    SPI: Transfer<u8>,
    CS: OutputPin,
    DELAY: DelayMs<u8>,
{
    /// Create a new SD/MMC controller using a raw SPI interface.
    pub fn new(spi: SPI, cs: CS, delay: DELAY) -> Self {
        SdMmcSpi {
            card_type: CardType::SDHC,
            spi,
            cs,
            delay,
            buffer: Block::new(),
            ocr: None,
            state: NotInit {},
        }
    }

    /// Initializes the card into a known state.
    ///
    /// Any failure aborts the whole sequence; nothing is retried beyond the
    /// budget of the step that failed.
    pub fn acquire(mut self) -> Result<SdMmcSpi<SPI, CS, DELAY, Initialized>, (Error, Self)> {
        debug!("acquiring card");
        let f = |s: &mut Self| -> Result<(), Error> {
            s.power_up()?;
            s.go_idle()?;
            s.check_interface()?;
            s.negotiate_operating_conditions()?;
            s.read_ocr();
            Ok(())
        };
        let result = f(&mut self);

        match result {
            Ok(_) => {
                debug!("Card ready: {:?}", self.card_type);
                Ok(self.into_state(Initialized {}))
            }
            Err(e) => {
                warn!("Card initialization failed: {:?}", e);
                Err((e, self))
            }
        }
    }

    /// Supply minimum of 74 clock cycles without CS asserted.
    fn power_up(&mut self) -> Result<(), Error> {
        trace!("Power up..");
        self.cs.set_high().map_err(|_| Error::GpioError)?;
        self.delay.delay_ms(SETTLE_DELAY_MS);
        for _ in 0..POWER_UP_CLOCK_BYTES {
            busy::transfer(&mut self.spi, NO_RESPONSE)?;
        }
        Ok(())
    }

    /// Enter SPI mode
    fn go_idle(&mut self) -> Result<(), Error> {
        for attempt in 0..GO_IDLE_ATTEMPTS {
            trace!("Enter SPI mode, attempt: {}..", attempt);
            let r1 = self.card_command(CMD0, 0)?;
            if r1.is_idle() {
                return Ok(());
            }
            warn!("Got response: {:x}, trying again..", r1.bits());
            #[cfg(feature = "log")]
            debug!("R1: {}", r1);
        }
        Err(Error::CardNotFound)
    }

    /// Only v2+ cards answer CMD8 and echo the check pattern.
    fn check_interface(&mut self) -> Result<(), Error> {
        self.delay.delay_ms(SETTLE_DELAY_MS);
        let response = self.card_command_extended(CMD8, CMD8_ARG)?;
        let echo = response
            .if_cond()
            .map(|if_cond| if_cond.check_pattern())
            .unwrap_or(NO_RESPONSE);
        #[cfg(feature = "log")]
        if let Some(if_cond) = response.if_cond() {
            debug!("CMD8: {}", if_cond);
        }
        if !response.r1().is_idle() || echo != CMD8_CHECK_PATTERN {
            return Err(Error::UnsupportedCard {
                r1: response.r1().bits(),
                echo,
            });
        }
        Ok(())
    }

    /// Repeat CMD55 + ACMD41 until the card leaves the idle state.
    fn negotiate_operating_conditions(&mut self) -> Result<(), Error> {
        for attempt in 0..APP_INIT_ATTEMPTS {
            let mut r1 = self.card_command(CMD55, 0)?;
            if r1.is_error_free() {
                r1 = self.card_command(ACMD41, ACMD41_ARG)?;
            }
            self.delay.delay_ms(SETTLE_DELAY_MS);
            if r1.is_ready() {
                debug!("ACMD41 ready after {} attempts", attempt + 1);
                return Ok(());
            }
        }
        Err(Error::TimeoutACommand(ACMD41))
    }

    /// Read the OCR for capability confirmation. Its contents never fail
    /// initialization; they only pick the addressing mode.
    fn read_ocr(&mut self) {
        self.delay.delay_ms(SETTLE_DELAY_MS);
        self.ocr = match self.card_command_extended(CMD58, 0) {
            Ok(response) => response.ocr(),
            Err(e) => {
                warn!("Reading OCR failed: {:?}", e);
                None
            }
        };
        self.card_type = match self.ocr {
            Some(ocr) if ocr.power_up_complete() && !ocr.card_capacity_status() => CardType::SD2,
            _ => CardType::SDHC,
        };
        #[cfg(feature = "log")]
        if let Some(ocr) = self.ocr {
            debug!("OCR: {}", ocr);
        }
    }
}

impl<SPI, CS, DELAY> SdMmcSpi<SPI, CS, DELAY, Initialized>
where
    SPI: Transfer<u8>,
    CS: OutputPin,
    DELAY: DelayMs<u8>,
{
    /// Mark the card as unused.
    /// This should be kept infallible, because Drop is unable to fail.
    /// See https://github.com/rust-lang/rfcs/issues/814
    pub fn deinit(self) -> SdMmcSpi<SPI, CS, DELAY, NotInit> {
        self.into_state(NotInit {})
    }

    pub fn card_type(&self) -> CardType {
        self.card_type
    }

    /// The OCR read at the end of initialization, if the card returned one.
    pub fn ocr(&self) -> Option<Ocr> {
        self.ocr
    }

    /// Read one block into the sector buffer and report the raw R1 byte and
    /// data token. The buffer only holds new data when the pair is a success.
    pub fn read_block_raw(&mut self, block_idx: BlockIdx) -> Result<BlockResponse, Error> {
        let address = match self.card_type {
            CardType::SD2 => block_idx
                .0
                .checked_mul(Block::LEN_U32)
                .ok_or(Error::AddressOutOfRange(block_idx.0))?,
            CardType::SDHC => block_idx.0,
        };
        let Self {
            spi, cs, buffer, ..
        } = self;
        let mut busy = SdMmcSpiBusy::new(spi, cs)?;
        let response = busy.read_block(address, &mut buffer.contents)?;
        drop(busy);
        if !response.is_success() {
            warn!(
                "Read of block {} failed: r1 {:x}, token {:x}",
                block_idx.0, response.r1, response.token
            );
            #[cfg(feature = "log")]
            debug!(
                "R1: {}, token: {}",
                R1::from_byte(response.r1),
                diagnostics::DataErrorToken(response.token)
            );
        }
        Ok(response)
    }

    /// The sector buffer, as left by the last block read.
    pub fn buffer(&self) -> &Block {
        &self.buffer
    }
}

impl<SPI, CS, DELAY> BlockDevice for SdMmcSpi<SPI, CS, DELAY, Initialized>
where
    SPI: Transfer<u8>,
    CS: OutputPin,
    DELAY: DelayMs<u8>,
{
    type Error = Error;

    fn read_block(&mut self, block_idx: BlockIdx) -> Result<&Block, Self::Error> {
        self.read_block_raw(block_idx)?.check()?;
        Ok(&self.buffer)
    }
}

// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
