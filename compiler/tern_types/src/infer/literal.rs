//! Numeric literal scanning.
//!
//! The spelling picks the relaxed type: a `.` or exponent makes a float, a
//! leading `0` followed by more digits makes an octal (unsigned) integer,
//! anything else is a decimal integer usable as any numeric kind.

use std::fmt;
use std::num::IntErrorKind;

use crate::Type;

use super::LiteralValue;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub(crate) enum LiteralError {
    Empty,
    InvalidDigit { radix: u32 },
    InvalidFloat,
    TooLarge,
}

impl fmt::Display for LiteralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralError::Empty => f.write_str("numeric literal has no digits"),
            LiteralError::InvalidDigit { radix: 8 } => f.write_str("invalid digit in octal literal"),
            LiteralError::InvalidDigit { .. } => f.write_str("invalid digit in numeric literal"),
            LiteralError::InvalidFloat => f.write_str("malformed floating-point literal"),
            LiteralError::TooLarge => f.write_str("numeric literal does not fit in 64 bits"),
        }
    }
}

pub(crate) fn scan_number(text: &str) -> Result<(Type, LiteralValue), LiteralError> {
    let digits: String = text.chars().filter(|&c| c != '_').collect();
    if digits.is_empty() {
        return Err(LiteralError::Empty);
    }

    if digits.contains(|c: char| matches!(c, '.' | 'e' | 'E')) {
        let value: f64 = digits.parse().map_err(|_| LiteralError::InvalidFloat)?;
        if !value.is_finite() {
            return Err(LiteralError::TooLarge);
        }
        return Ok((Type::InferredFloat, LiteralValue::Float(value)));
    }

    let (ty, radix, body) = match digits.strip_prefix('0') {
        Some(rest) if !rest.is_empty() => (Type::InferredUnsigned, 8, rest),
        _ => (Type::InferredNumber, 10, digits.as_str()),
    };
    let value = u64::from_str_radix(body, radix).map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow => LiteralError::TooLarge,
        _ => LiteralError::InvalidDigit { radix },
    })?;
    Ok((ty, LiteralValue::Integer(value)))
}
