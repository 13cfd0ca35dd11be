use std::fmt;

use crate::domain::errors::LedgerError;

/// Luhn check-digit validation. Anything that is not a non-empty run of
/// ASCII digits is invalid.
pub fn checksum_valid(number: &str) -> bool {
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let sum: u32 = number
        .bytes()
        .rev()
        .enumerate()
        .map(|(position, byte)| {
            let digit = u32::from(byte - b'0');
            if position % 2 == 1 {
                let doubled = digit * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                digit
            }
        })
        .sum();

    sum % 10 == 0
}

/// A digit string that passed the Luhn check
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Format check then checksum check; both failures are `IncorrectFormat`.
    pub fn parse(raw: &str) -> Result<Self, LedgerError> {
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(LedgerError::IncorrectFormat(format!(
                "'{}' is not a number",
                raw
            )));
        }

        if !checksum_valid(raw) {
            return Err(LedgerError::IncorrectFormat(format!(
                "'{}' fails the check digit",
                raw
            )));
        }

        Ok(OrderNumber(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for OrderNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
