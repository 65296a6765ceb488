use embedded_hal::{blocking::spi::Transfer, digital::v2::OutputPin};

use crate::sdmmc_proto::*;

use super::response::{BlockResponse, ExtendedResponse, R1};
use super::Error;

/// A struct used to ensure that communication only occurs
/// when CS is low.
///
/// Creating one clocks a filler byte, asserts CS and clocks another filler
/// byte. Dropping it clocks a filler byte, releases CS and clocks a trailing
/// filler byte, so the bus is idle between transactions however the
/// transaction ended.
pub struct SdMmcSpiBusy<'spi, 'cs, SPI, CS>
where
    SPI: Transfer<u8>,
    CS: OutputPin,
{
    spi: &'spi mut SPI,
    cs: &'cs mut CS,
}

impl<'spi, 'cs, SPI, CS> Drop for SdMmcSpiBusy<'spi, 'cs, SPI, CS>
where
    SPI: Transfer<u8>,
    CS: OutputPin,
{
    fn drop(&mut self) {
        self.receive().ok();
        self.cs_high().ok();
        self.receive().ok();
    }
}

impl<'spi, 'cs, SPI, CS> SdMmcSpiBusy<'spi, 'cs, SPI, CS>
where
    SPI: Transfer<u8>,
    CS: OutputPin,
{
    pub fn new(spi: &'spi mut SPI, cs: &'cs mut CS) -> Result<Self, Error> {
        transfer(spi, NO_RESPONSE)?;
        cs.set_low().map_err(|_| Error::GpioError)?;
        let mut me = Self { spi, cs };
        me.receive()?;
        Ok(me)
    }

    fn cs_high(&mut self) -> Result<(), Error> {
        self.cs.set_high().map_err(|_| Error::GpioError)
    }

    /// Receive a byte from the SD card by clocking in an 0xFF byte.
    pub fn receive(&mut self) -> Result<u8, Error> {
        transfer(self.spi, NO_RESPONSE)
    }

    /// Send a byte to the SD card.
    pub fn send(&mut self, out: u8) -> Result<(), Error> {
        let _ = transfer(self.spi, out)?;
        Ok(())
    }

    pub fn send_frame(&mut self, frame: &CommandFrame) -> Result<(), Error> {
        for b in frame.bytes().iter() {
            self.send(*b)?;
        }
        Ok(())
    }

    /// Poll for an R1 response. If the card stays silent the last byte polled
    /// (`0xFF`) is returned, which reads as "no response".
    pub fn read_r1(&mut self) -> Result<R1, Error> {
        let mut response = NO_RESPONSE;
        for _ in 0..R1_POLL_ATTEMPTS {
            response = self.receive()?;
            if response != NO_RESPONSE {
                break;
            }
        }
        Ok(R1::from_byte(response))
    }

    /// Read an R7 or R3 response. The four trailing bytes are only clocked in
    /// when the R1 byte carries no error.
    pub fn read_extended(&mut self) -> Result<ExtendedResponse, Error> {
        let r1 = self.read_r1()?;
        if !r1.is_error_free() {
            return Ok(ExtendedResponse::new(r1, None));
        }
        let mut trailer = [0u8; 4];
        for b in trailer.iter_mut() {
            *b = self.receive()?;
        }
        Ok(ExtendedResponse::new(r1, Some(trailer)))
    }

    /// Perform a command with an R1 response.
    pub fn card_command(&mut self, command: u8, arg: u32) -> Result<R1, Error> {
        self.send_frame(&CommandFrame::new(command, arg))?;
        self.read_r1()
    }

    /// Perform a command with an R7 or R3 response.
    pub fn card_command_extended(
        &mut self,
        command: u8,
        arg: u32,
    ) -> Result<ExtendedResponse, Error> {
        self.send_frame(&CommandFrame::new(command, arg))?;
        self.read_extended()
    }

    /// Read one block with CMD17. The buffer is only written once the data
    /// start token has been seen; the two CRC bytes are clocked and dropped.
    pub fn read_block(
        &mut self,
        address: u32,
        buffer: &mut [u8; 512],
    ) -> Result<BlockResponse, Error> {
        let r1 = self.card_command(CMD17, address)?;
        if !r1.is_error_free() {
            return Ok(BlockResponse {
                r1: r1.bits(),
                token: NO_RESPONSE,
            });
        }

        let mut token = NO_RESPONSE;
        for _ in 0..DATA_TOKEN_ATTEMPTS {
            token = self.receive()?;
            if token != NO_RESPONSE {
                break;
            }
        }

        if token == DATA_START_BLOCK {
            for b in buffer.iter_mut() {
                *b = self.receive()?;
            }
            self.receive()?;
            self.receive()?;
        }

        Ok(BlockResponse {
            r1: r1.bits(),
            token,
        })
    }
}

/// Send one byte and receive one byte.
pub(super) fn transfer<SPI>(spi: &mut SPI, out: u8) -> Result<u8, Error>
where
    SPI: Transfer<u8>,
{
    spi.transfer(&mut [out])
        .map(|b| b[0])
        .map_err(|_e| Error::Transport)
}
