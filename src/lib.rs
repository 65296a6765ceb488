//! # sdmmc-fatconf
//!
//! > Boot-time configuration from an SD card, in Embedded Rust
//!
//! This crate brings a raw SD card online over SPI and reads the first sector
//! of a single file from the root directory of its FAT32 volume. It is
//! `#![no_std]`, does not use `alloc`, and keeps exactly one 512 byte sector
//! buffer, owned by the card driver.
//!
//! ## Using the crate
//!
//! You need an SPI peripheral, a chip select pin and a millisecond delay, all
//! implementing the `embedded-hal` 0.2 traits.
//!
//! ```rust,ignore
//! let card = sdmmc_fatconf::SdMmcSpi::new(spi, cs, delay);
//! match card.acquire() {
//!     Ok(mut card) => {
//!         let mut volume = sdmmc_fatconf::fat::FatVolume::new(&mut card)?;
//!         let config = sdmmc_fatconf::config::load(&mut volume)?;
//!         writeln!(uart, "{:?}", config).unwrap();
//!     }
//!     Err((e, _card)) => writeln!(uart, "{:?}!", e).unwrap(),
//! };
//! ```
//!
//! Only the first sector of a file is ever read. Longer files are returned
//! truncated, see [`fat::FileSector::is_truncated`].
//!
//! ## Features
//!
//! * `defmt-log`: By turning off the default features and enabling the `defmt-log` feature you can
//! configure this crate to log messages over defmt instead.
//!
//! Make sure that either the `log` feature or the `defmt-log` feature is enabled.

#![cfg_attr(not(test), no_std)]
// #![deny(missing_docs)]

// ****************************************************************************
//
// Imports
//
// ****************************************************************************


#[macro_use]
mod structure;

pub mod block_device;
pub mod config;
pub mod fat;
pub mod mbr;
pub mod sdmmc;
pub mod sdmmc_proto;

pub use crate::block_device::{Block, BlockCount, BlockDevice, BlockIdx, MemoryBlockDevice};
pub use crate::sdmmc::Error as SdMmcError;
pub use crate::sdmmc::SdMmcSpi;

// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
