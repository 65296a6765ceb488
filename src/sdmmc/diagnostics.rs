//! Human readable rendering of card responses, for the debug log.
//!
//! Nothing here changes how the card is driven. Classification is a pure
//! function of the response bits.

use core::fmt;

use super::response::{IfCond, Ocr, VoltageAccepted, VoltageWindow, R1};

#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum R1Condition {
    /// Reported only when no bit at all is set.
    Ready,
    InIdleState,
    EraseReset,
    IllegalCommand,
    CrcError,
    EraseSequenceError,
    AddressError,
    ParameterError,
    /// Bit 7 is set, which no real R1 response does.
    StartBitSet,
}

impl R1Condition {
    pub fn description(&self) -> &'static str {
        match self {
            Self::Ready => "Card Ready",
            Self::InIdleState => "In Idle State",
            Self::EraseReset => "Erase Reset Error",
            Self::IllegalCommand => "Illegal Command",
            Self::CrcError => "CRC Error",
            Self::EraseSequenceError => "Erase Sequence Error",
            Self::AddressError => "Address Error",
            Self::ParameterError => "Parameter Error",
            Self::StartBitSet => "Error: MSB = 1",
        }
    }
}

static R1_CONDITIONS: [(R1, R1Condition); 8] = [
    (R1::START_BIT, R1Condition::StartBitSet),
    (R1::PARAMETER_ERROR, R1Condition::ParameterError),
    (R1::ADDRESS_ERROR, R1Condition::AddressError),
    (R1::ERASE_SEQUENCE_ERROR, R1Condition::EraseSequenceError),
    (R1::COM_CRC_ERROR, R1Condition::CrcError),
    (R1::ILLEGAL_COMMAND, R1Condition::IllegalCommand),
    (R1::ERASE_RESET, R1Condition::EraseReset),
    (R1::IN_IDLE_STATE, R1Condition::InIdleState),
];

impl R1 {
    /// Every condition signalled by this response byte, most significant bit
    /// first.
    pub fn conditions(self) -> impl Iterator<Item = R1Condition> {
        let ready = if self.is_empty() {
            Some(R1Condition::Ready)
        } else {
            None
        };
        ready.into_iter().chain(
            R1_CONDITIONS
                .iter()
                .filter(move |(flag, _)| self.contains(*flag))
                .map(|(_, condition)| *condition),
        )
    }
}

impl fmt::Display for R1 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, condition) in self.conditions().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            f.write_str(condition.description())?;
        }
        Ok(())
    }
}

impl fmt::Display for VoltageAccepted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => f.write_str("2.7-3.6V"),
            Self::LowVoltage => f.write_str("LOW VOLTAGE"),
            Self::Reserved(_) => f.write_str("RESERVED"),
            Self::NotDefined(_) => f.write_str("NOT DEFINED"),
        }
    }
}

impl fmt::Display for IfCond {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Command Version: {:#04x}, Voltage Accepted: {}, Echo: {:#04x}",
            self.command_version(),
            self.voltage_accepted(),
            self.check_pattern()
        )
    }
}

static VOLTAGE_STEPS: [(VoltageWindow, &str); 9] = [
    (VoltageWindow::V27_28, "2.7-2.8"),
    (VoltageWindow::V28_29, "2.8-2.9"),
    (VoltageWindow::V29_30, "2.9-3.0"),
    (VoltageWindow::V30_31, "3.0-3.1"),
    (VoltageWindow::V31_32, "3.1-3.2"),
    (VoltageWindow::V32_33, "3.2-3.3"),
    (VoltageWindow::V33_34, "3.3-3.4"),
    (VoltageWindow::V34_35, "3.4-3.5"),
    (VoltageWindow::V35_36, "3.5-3.6"),
];

impl fmt::Display for VoltageWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (step, label) in VOLTAGE_STEPS.iter() {
            if self.contains(*step) {
                if !first {
                    f.write_str(", ")?;
                }
                f.write_str(label)?;
                first = false;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Ocr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.power_up_complete() {
            write!(
                f,
                "Card Power Up Status: READY, CCS Status: {}",
                self.card_capacity_status() as u8
            )?;
        } else {
            f.write_str("Card Power Up Status: BUSY")?;
        }
        write!(f, ", VDD Window: {}", self.voltage_window())
    }
}

/// A data error token, sent by the card instead of the data start token when
/// a read fails.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DataErrorToken(pub u8);

#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TokenCondition {
    /// A high nibble bit is set, so this is not an error token at all.
    NotErrorToken,
    OutOfRange,
    CardEccFailed,
    CcError,
    Error,
}

static TOKEN_CONDITIONS: [(u8, TokenCondition); 4] = [
    (0x08, TokenCondition::OutOfRange),
    (0x04, TokenCondition::CardEccFailed),
    (0x02, TokenCondition::CcError),
    (0x01, TokenCondition::Error),
];

impl DataErrorToken {
    pub fn conditions(self) -> impl Iterator<Item = TokenCondition> {
        let token = self.0;
        let not_error = if token & 0xF0 != 0 {
            Some(TokenCondition::NotErrorToken)
        } else {
            None
        };
        not_error.into_iter().chain(
            TOKEN_CONDITIONS
                .iter()
                .filter(move |(mask, _)| token & *mask != 0)
                .map(|(_, condition)| *condition),
        )
    }
}

impl fmt::Display for DataErrorToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, condition) in self.conditions().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            f.write_str(match condition {
                TokenCondition::NotErrorToken => "Not Error token",
                TokenCondition::OutOfRange => "Data out of range",
                TokenCondition::CardEccFailed => "Card ECC failed",
                TokenCondition::CcError => "CC Error",
                TokenCondition::Error => "Error",
            })?;
        }
        Ok(())
    }
}

// ****************************************************************************
//
// Unit Tests
//
// ****************************************************************************

#[cfg(test)]
mod test {
    use super::*;

    fn conditions(value: u8) -> Vec<R1Condition> {
        R1::from_byte(value).conditions().collect()
    }

    #[test]
    fn ready_only_when_clear() {
        assert_eq!(conditions(0x00), vec![R1Condition::Ready]);
        assert_eq!(conditions(0x01), vec![R1Condition::InIdleState]);
    }

    #[test]
    fn one_condition_per_bit() {
        for value in 1..=0xFFu8 {
            let found = conditions(value);
            assert_eq!(found.len(), value.count_ones() as usize, "R1 {:#04x}", value);
            assert!(!found.contains(&R1Condition::Ready));
        }
    }

    #[test]
    fn classification_is_deterministic() {
        for value in 0..=0xFFu8 {
            assert_eq!(conditions(value), conditions(value));
        }
    }

    #[test]
    fn r1_display() {
        assert_eq!(R1::from_byte(0x05).to_string(), "Illegal Command, In Idle State");
        assert_eq!(R1::from_byte(0x00).to_string(), "Card Ready");
    }

    #[test]
    fn ocr_display() {
        let ocr = Ocr(u32::from_be_bytes([0xC0, 0x30, 0x00, 0x00]));
        assert_eq!(
            ocr.to_string(),
            "Card Power Up Status: READY, CCS Status: 1, VDD Window: 3.2-3.3, 3.3-3.4"
        );
        let busy = Ocr(0);
        assert_eq!(busy.to_string(), "Card Power Up Status: BUSY, VDD Window: ");
    }

    #[test]
    fn if_cond_display() {
        let if_cond = IfCond([0x00, 0x00, 0x01, 0xAA]);
        assert_eq!(
            if_cond.to_string(),
            "Command Version: 0x00, Voltage Accepted: 2.7-3.6V, Echo: 0xaa"
        );
    }

    #[test]
    fn data_error_token() {
        let found: Vec<_> = DataErrorToken(0x09).conditions().collect();
        assert_eq!(found, vec![TokenCondition::OutOfRange, TokenCondition::Error]);
        let found: Vec<_> = DataErrorToken(0xFE).conditions().collect();
        assert_eq!(found[0], TokenCondition::NotErrorToken);
        assert_eq!(DataErrorToken(0x04).to_string(), "Card ECC failed");
    }
}
