//! Numeric primitives: two's-complement Integer plus the MBF floats.
//!
//! Values store their canonical little-endian byte representation; every
//! operation unpacks, computes and repacks so that `to_bytes` round-trips
//! bit-exactly with program memory and token payloads.

pub mod float;

pub use float::{Double, Single};

use serde::Serialize;

use crate::token::{self, NumberLead};
use crate::BasicError;

/// Bytes ignored inside decimal number text.
pub const BLANKS: &[u8] = b" \t\n";
/// ASCII separator bytes; any of these in decimal text yields value zero.
pub const SEPARATORS: &[u8] = &[0x1C, 0x1D, 0x1E, 0x1F];

fn is_blank(b: u8) -> bool {
    BLANKS.contains(&b)
}

/// Saturated result a failing kernel hands to the error handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Saturated {
    /// No usable result.
    None,
    /// The offender was an Integer; never soft-handled.
    Int,
    Single(Single),
    Double(Double),
}

/// A math failure travelling from a numeric kernel to the error handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FloatError {
    pub kind: BasicError,
    pub saturated: Saturated,
}

impl FloatError {
    pub(crate) fn overflow_int() -> Self {
        FloatError {
            kind: BasicError::Overflow,
            saturated: Saturated::Int,
        }
    }

    pub(crate) fn div_zero_int() -> Self {
        FloatError {
            kind: BasicError::DivisionByZero,
            saturated: Saturated::Int,
        }
    }

    pub(crate) fn domain() -> Self {
        FloatError {
            kind: BasicError::IllegalFunctionCall,
            saturated: Saturated::None,
        }
    }
}

impl From<FloatError> for BasicError {
    fn from(e: FloatError) -> BasicError {
        e.kind
    }
}

/// 16-bit signed integer, little-endian two's complement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Integer([u8; 2]);

impl Integer {
    pub const SIZE: usize = 2;

    pub fn from_bytes(buf: [u8; 2]) -> Self {
        Integer(buf)
    }

    pub fn to_bytes(self) -> [u8; 2] {
        self.0
    }

    pub fn from_i16(value: i16) -> Self {
        Integer(value.to_le_bytes())
    }

    pub fn from_u16(value: u16) -> Self {
        Integer(value.to_le_bytes())
    }

    /// Range-checked construction from a host integer.
    pub fn from_int(value: i64) -> Result<Self, FloatError> {
        if !(-32768..=32767).contains(&value) {
            return Err(FloatError::overflow_int());
        }
        Ok(Integer::from_i16(value as i16))
    }

    /// Range-checked construction, reading the two bytes as unsigned.
    pub fn from_int_unsigned(value: i64) -> Result<Self, FloatError> {
        if !(0..=0xFFFF).contains(&value) {
            return Err(FloatError::overflow_int());
        }
        Ok(Integer::from_u16(value as u16))
    }

    pub fn to_int(self) -> i16 {
        i16::from_le_bytes(self.0)
    }

    pub fn to_int_unsigned(self) -> u16 {
        u16::from_le_bytes(self.0)
    }

    /// Decode an integer literal token. Jump references are not literals
    /// and are rejected.
    pub fn from_token(tok: &[u8]) -> Result<Self, BasicError> {
        let lead = *tok.first().ok_or(BasicError::Internal)?;
        if (token::C_0..=token::C_10).contains(&lead) {
            return Ok(Integer::from_i16((lead - token::C_0) as i16));
        }
        let trail = tok.get(1..).ok_or(BasicError::Internal)?;
        match NumberLead::try_from(lead) {
            Ok(NumberLead::Byte) => {
                let b = *trail.first().ok_or(BasicError::Internal)?;
                Ok(Integer::from_i16(b as i16))
            }
            Ok(NumberLead::Int | NumberLead::Hex | NumberLead::Oct) => {
                let b: [u8; 2] = trail
                    .get(..2)
                    .and_then(|s| s.try_into().ok())
                    .ok_or(BasicError::Internal)?;
                Ok(Integer(b))
            }
            _ => Err(BasicError::Internal),
        }
    }

    /// Encode as the shortest integer literal token.
    pub fn to_token(self) -> Vec<u8> {
        let v = self.to_int();
        match v {
            0..=10 => vec![token::C_0 + v as u8],
            11..=255 => vec![token::T_BYTE, v as u8],
            _ => {
                let mut out = vec![token::T_INT];
                out.extend_from_slice(&self.0);
                out
            }
        }
    }

    pub fn to_token_hex(self) -> [u8; 3] {
        [token::T_HEX, self.0[0], self.0[1]]
    }

    pub fn to_token_oct(self) -> [u8; 3] {
        [token::T_OCT, self.0[0], self.0[1]]
    }

    /// Parse hex digits (no interior whitespace, both cases).
    pub fn from_hex(digits: &[u8]) -> Result<Self, FloatError> {
        let mut acc: u32 = 0;
        for &b in digits {
            let d = (b as char).to_digit(16).ok_or(FloatError::domain())?;
            acc = acc * 16 + d;
            if acc > 0xFFFF {
                return Err(FloatError::overflow_int());
            }
        }
        Ok(Integer::from_u16(acc as u16))
    }

    /// Parse octal digits; blanks are ignored.
    pub fn from_oct(digits: &[u8]) -> Result<Self, FloatError> {
        let mut acc: u32 = 0;
        for &b in digits {
            if is_blank(b) {
                continue;
            }
            let d = (b as char).to_digit(8).ok_or(FloatError::domain())?;
            acc = acc * 8 + d;
            if acc > 0xFFFF {
                return Err(FloatError::overflow_int());
            }
        }
        Ok(Integer::from_u16(acc as u16))
    }

    /// Unsigned hex representation, as HEX$ prints it.
    pub fn to_hex(self) -> String {
        format!("{:X}", self.to_int_unsigned())
    }

    /// Unsigned octal representation, as OCT$ prints it.
    pub fn to_oct(self) -> String {
        format!("{:o}", self.to_int_unsigned())
    }

    /// Parse decimal text. Blanks are skipped; any non-digit content fails
    /// so the caller can retry on the float path.
    pub fn from_str_bytes(word: &[u8]) -> Result<Self, FloatError> {
        let mut acc: i64 = 0;
        let mut neg = false;
        let mut seen_sign = false;
        let mut seen_digit = false;
        for &b in word {
            if is_blank(b) {
                continue;
            }
            if !seen_sign && !seen_digit && (b == b'+' || b == b'-') {
                neg = b == b'-';
                seen_sign = true;
                continue;
            }
            if b.is_ascii_digit() {
                seen_digit = true;
                acc = acc * 10 + (b - b'0') as i64;
                if acc > 0xFFFF {
                    return Err(FloatError::overflow_int());
                }
            } else {
                return Err(FloatError::domain());
            }
        }
        Integer::from_int(if neg { -acc } else { acc })
    }

    pub fn to_str(self, leading_space: bool) -> String {
        let v = self.to_int();
        if v >= 0 && leading_space {
            format!(" {v}")
        } else {
            v.to_string()
        }
    }

    pub fn sign(self) -> i32 {
        self.to_int().signum() as i32
    }

    pub fn eq(self, other: Integer) -> bool {
        self.to_int() == other.to_int()
    }

    pub fn gt(self, other: Integer) -> bool {
        self.to_int() > other.to_int()
    }

    pub fn abs(self) -> Result<Self, FloatError> {
        Integer::from_int((self.to_int() as i64).abs())
    }

    pub fn neg(self) -> Result<Self, FloatError> {
        Integer::from_int(-(self.to_int() as i64))
    }

    pub fn add(self, rhs: Integer) -> Result<Self, FloatError> {
        Integer::from_int(self.to_int() as i64 + rhs.to_int() as i64)
    }

    /// Integer division, truncating towards zero.
    pub fn div_int(self, rhs: Integer) -> Result<Self, FloatError> {
        let d = rhs.to_int();
        if d == 0 {
            return Err(FloatError::div_zero_int());
        }
        Integer::from_int(self.to_int() as i64 / d as i64)
    }

    /// Remainder; the sign follows the dividend.
    pub fn modulo(self, rhs: Integer) -> Result<Self, FloatError> {
        let d = rhs.to_int();
        if d == 0 {
            return Err(FloatError::div_zero_int());
        }
        Integer::from_int(self.to_int() as i64 % d as i64)
    }

    pub fn to_single(self) -> Single {
        Single::from_int(self.to_int() as i64)
    }

    pub fn to_double(self) -> Double {
        Double::from_int(self.to_int() as i64)
    }
}

/// Result of scanning decimal float text: double flag, signed mantissa
/// digits and the power of ten that scales them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decimal {
    pub is_double: bool,
    pub mantissa: i64,
    pub exp10: i32,
}

/// Scan decimal number text into a [`Decimal`].
///
/// Blanks may appear anywhere; an ASCII separator byte yields value zero.
/// Eight or more significant digits promote to double unless `!` forces
/// single; `#` and a `D` exponent force double. With `allow_nonnum` the scan
/// stops at the first foreign byte, otherwise that byte is an error.
pub fn str_to_decimal(word: &[u8], allow_nonnum: bool) -> Result<Decimal, FloatError> {
    let mut found_sign = false;
    let mut found_point = false;
    let mut found_exp = false;
    let mut found_exp_sign = false;
    let mut neg = false;
    let mut exp_neg = false;
    let mut mantissa: i64 = 0;
    let mut exp10: i32 = 0;
    let mut exponent: i32 = 0;
    let mut digits = 0;
    let mut zeros = 0;
    let mut is_double = false;
    let mut is_single = false;

    const MANT_CAP: i64 = (i64::MAX - 9) / 10;

    'scan: for &b in word {
        if is_blank(b) {
            continue;
        }
        if SEPARATORS.contains(&b) {
            return Ok(Decimal {
                is_double: false,
                mantissa: 0,
                exp10: 0,
            });
        }
        if !found_sign {
            found_sign = true;
            if b == b'+' || b == b'-' {
                neg = b == b'-';
                continue;
            }
        }
        if !found_exp {
            match b {
                b'0'..=b'9' => {
                    if mantissa <= MANT_CAP {
                        mantissa = mantissa * 10 + (b - b'0') as i64;
                        if found_point {
                            exp10 -= 1;
                        }
                    } else if !found_point {
                        // out of mantissa precision; keep the magnitude
                        exp10 += 1;
                    }
                    if mantissa != 0 {
                        digits += 1;
                        if found_point && b == b'0' {
                            zeros += 1;
                        } else {
                            zeros = 0;
                        }
                    }
                }
                b'.' => found_point = true,
                b'E' | b'e' | b'D' | b'd' => {
                    found_exp = true;
                    is_double = matches!(b, b'D' | b'd');
                }
                b'!' => {
                    is_single = true;
                    break 'scan;
                }
                b'#' => {
                    is_double = true;
                    break 'scan;
                }
                _ => {
                    if allow_nonnum {
                        break 'scan;
                    }
                    return Err(FloatError::domain());
                }
            }
            continue;
        }
        if !found_exp_sign {
            found_exp_sign = true;
            if b == b'+' || b == b'-' {
                exp_neg = b == b'-';
                continue;
            }
        }
        if b.is_ascii_digit() {
            exponent = (exponent * 10 + (b - b'0') as i32).min(9999);
        } else if allow_nonnum {
            break 'scan;
        } else {
            return Err(FloatError::domain());
        }
    }
    exp10 += if exp_neg { -exponent } else { exponent };
    if digits - zeros > 7 && !is_single {
        is_double = true;
    }
    Ok(Decimal {
        is_double,
        mantissa: if neg { -mantissa } else { mantissa },
        exp10,
    })
}
