//! sdmmc-fatconf - Device configuration file
//!
//! A data logger reads where to send its readings from a text file in the
//! root directory of the card:
//!
//! ```text
//! 192.168.0.10;8080;60;logger.example;
//! ```
//!
//! The fields are the server's IPv4 address, its port, the logging interval
//! in seconds and a host name, each followed by a `;`. Parsing stops at the
//! first NUL byte; anything after the last `;` is ignored.

use crate::{
    fat::{FatError, FatVolume},
    BlockDevice,
};

#[cfg(feature = "log")]
use log::{info, warn};

#[cfg(feature = "defmt-log")]
use defmt::{info, warn};

/// Name of the configuration file in the root directory.
pub const CONFIG_FILE_NAME: &str = "config.txt";

const FIELD_SEPARATOR: u8 = b';';
const OCTET_SEPARATOR: u8 = b'.';
const OCTET_DIGITS: usize = 3;
const PORT_DIGITS: usize = 5;
const INTERVAL_DIGITS: usize = 5;

#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Field {
    Ip,
    Port,
    Interval,
    Host,
}

#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The field is empty.
    MissingField(Field),
    /// The field is not followed by a `;`.
    Unterminated(Field),
    InvalidCharacter { field: Field, byte: u8 },
    /// More digits or characters than the field allows.
    TooLong(Field),
    /// A number that does not fit the field, such as an octet above 255.
    OutOfRange(Field),
    /// The address does not have exactly four octets.
    OctetCount(usize),
}

#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LoadError<E> {
    Fat(FatError<E>),
    Config(ConfigError),
}

impl<E> From<FatError<E>> for LoadError<E> {
    fn from(e: FatError<E>) -> Self {
        Self::Fat(e)
    }
}

impl<E> From<ConfigError> for LoadError<E> {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub ip: [u8; 4],
    pub port: u16,
    /// Seconds between two readings.
    pub interval: u32,
    host: [u8; DeviceConfig::HOST_LEN],
    host_len: u8,
}

impl DeviceConfig {
    /// Longest host name that fits.
    pub const HOST_LEN: usize = 24;

    /// Parse the contents of a configuration file.
    pub fn parse(data: &[u8]) -> Result<Self, ConfigError> {
        let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
        let mut fields = Fields { rest: &data[..end] };

        let ip = parse_ip(fields.next(Field::Ip)?)?;
        let port = parse_number(fields.next(Field::Port)?, Field::Port, PORT_DIGITS)?;
        if port > u16::MAX as u32 {
            return Err(ConfigError::OutOfRange(Field::Port));
        }
        let interval = parse_number(
            fields.next(Field::Interval)?,
            Field::Interval,
            INTERVAL_DIGITS,
        )?;

        let host_field = fields.next(Field::Host)?;
        if host_field.len() > Self::HOST_LEN {
            return Err(ConfigError::TooLong(Field::Host));
        }
        if let Some(&byte) = host_field.iter().find(|b| !b.is_ascii_graphic()) {
            return Err(ConfigError::InvalidCharacter {
                field: Field::Host,
                byte,
            });
        }
        let mut host = [0u8; Self::HOST_LEN];
        host[..host_field.len()].copy_from_slice(host_field);

        Ok(Self {
            ip,
            port: port as u16,
            interval,
            host,
            host_len: host_field.len() as u8,
        })
    }

    pub fn host(&self) -> &str {
        // Only ASCII is ever stored.
        core::str::from_utf8(&self.host[..self.host_len as usize]).unwrap_or("")
    }
}

impl core::fmt::Display for DeviceConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let [a, b, c, d] = self.ip;
        write!(
            f,
            "{}.{}.{}.{}:{} every {}s ({})",
            a,
            b,
            c,
            d,
            self.port,
            self.interval,
            self.host()
        )
    }
}

/// Splits off one `;` terminated field at a time.
struct Fields<'a> {
    rest: &'a [u8],
}

impl<'a> Fields<'a> {
    fn next(&mut self, field: Field) -> Result<&'a [u8], ConfigError> {
        let rest = self.rest;
        let end = rest
            .iter()
            .position(|&b| b == FIELD_SEPARATOR)
            .ok_or(ConfigError::Unterminated(field))?;
        self.rest = &rest[end + 1..];
        if end == 0 {
            return Err(ConfigError::MissingField(field));
        }
        Ok(&rest[..end])
    }
}

fn parse_number(digits: &[u8], field: Field, max_digits: usize) -> Result<u32, ConfigError> {
    if digits.is_empty() {
        return Err(ConfigError::MissingField(field));
    }
    if digits.len() > max_digits {
        return Err(ConfigError::TooLong(field));
    }
    digits.iter().try_fold(0u32, |value, &byte| {
        if byte.is_ascii_digit() {
            Ok(value * 10 + (byte - b'0') as u32)
        } else {
            Err(ConfigError::InvalidCharacter { field, byte })
        }
    })
}

fn parse_ip(text: &[u8]) -> Result<[u8; 4], ConfigError> {
    let count = text.split(|&b| b == OCTET_SEPARATOR).count();
    if count != 4 {
        return Err(ConfigError::OctetCount(count));
    }

    let mut ip = [0u8; 4];
    for (octet, digits) in ip.iter_mut().zip(text.split(|&b| b == OCTET_SEPARATOR)) {
        let value = parse_number(digits, Field::Ip, OCTET_DIGITS)?;
        if value > u8::MAX as u32 {
            return Err(ConfigError::OutOfRange(Field::Ip));
        }
        *octet = value as u8;
    }
    Ok(ip)
}

/// Read and parse [`CONFIG_FILE_NAME`] from the root directory of `volume`.
pub fn load<BD>(volume: &mut FatVolume<BD>) -> Result<DeviceConfig, LoadError<BD::Error>>
where
    BD: BlockDevice,
{
    let file = volume.read_file(CONFIG_FILE_NAME)?;
    match DeviceConfig::parse(file.contents()) {
        Ok(config) => {
            info!("Configuration loaded: {:?}", config);
            Ok(config)
        }
        Err(e) => {
            warn!("Configuration file rejected: {:?}", e);
            Err(e.into())
        }
    }
}

// ****************************************************************************
//
// Unit Tests
//
// ****************************************************************************
