use hcn_wire::{WireError, KEY_LENGTH, VALUE_LENGTH};

use crate::error::{DispatchError, Result};

/// A `key=value` string split at its first `=`.
///
/// Both halves borrow from the original string; nothing is copied or
/// rewritten in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyValuePair<'a> {
    pub key: &'a str,
    pub value: &'a str,
}

/// Split `text` at the first `=` into key and value.
///
/// Everything after the first `=` belongs to the value, including further
/// `=` characters.
pub fn parse_key_value(text: &str) -> Result<KeyValuePair<'_>> {
    let (key, value) = text
        .split_once('=')
        .ok_or(DispatchError::MissingSeparator)?;
    Ok(KeyValuePair { key, value })
}

impl<'a> KeyValuePair<'a> {
    pub fn new(key: &'a str, value: &'a str) -> Self {
        Self { key, value }
    }

    /// Check the pair against the outbound wire bounds.
    ///
    /// Both bounds count a terminator, so a key holds at most
    /// `KEY_LENGTH - 1` bytes and a value `VALUE_LENGTH - 1`.
    pub fn validate(&self) -> Result<()> {
        check_part("key", self.key, KEY_LENGTH)?;
        check_part("value", self.value, VALUE_LENGTH)?;
        if self.key.contains('=') {
            return Err(WireError::InvalidField {
                field: "key",
                value: b'=',
            }
            .into());
        }
        Ok(())
    }

    /// Validate and join into the `key=value` wire text.
    pub fn format(&self) -> Result<String> {
        self.validate()?;
        Ok(format!("{}={}", self.key, self.value))
    }
}

impl std::fmt::Display for KeyValuePair<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

fn check_part(field: &'static str, part: &str, bound: usize) -> Result<()> {
    if let Some(byte) = part.bytes().find(|byte| !byte.is_ascii() || *byte == 0) {
        return Err(WireError::InvalidField { field, value: byte }.into());
    }
    if part.len() >= bound {
        return Err(WireError::FieldTooLong {
            field,
            len: part.len(),
            max: bound - 1,
        }
        .into());
    }
    Ok(())
}
