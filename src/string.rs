//! Length-prefixed strings and the string space they point into.
//!
//! A string value is a 3-byte descriptor: one length byte and a 2-byte
//! little-endian address into the string space. The space itself is owned by
//! the values facade; descriptors are only valid against the space that
//! produced them.

use serde::Serialize;

use crate::number::Integer;
use crate::BasicError;

/// String descriptor: length byte plus little-endian heap address.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BasicString([u8; 3]);

impl BasicString {
    pub const SIZE: usize = 3;

    pub fn from_bytes(buf: [u8; 3]) -> Self {
        BasicString(buf)
    }

    pub fn to_bytes(self) -> [u8; 3] {
        self.0
    }

    pub fn from_pointer(length: u8, address: u16) -> Self {
        let addr = address.to_le_bytes();
        BasicString([length, addr[0], addr[1]])
    }

    pub fn len(self) -> u8 {
        self.0[0]
    }

    pub fn is_empty(self) -> bool {
        self.len() == 0
    }

    pub fn address(self) -> u16 {
        u16::from_le_bytes([self.0[1], self.0[2]])
    }

    /// LEN as a BASIC Integer.
    pub fn len_value(self) -> Integer {
        Integer::from_i16(self.len() as i16)
    }
}

/// Sequential string space. `store` without an address appends; with an
/// address it overwrites in place, the way the interpreter refreshes a
/// variable slot.
#[derive(Clone, Debug, Default)]
pub struct StringHeap {
    data: Vec<u8>,
}

impl StringHeap {
    /// Addresses are 16-bit; the space never outgrows them.
    const CAPACITY: usize = 0x1_0000;

    pub fn new() -> Self {
        StringHeap::default()
    }

    pub fn store(&mut self, bytes: &[u8], address: Option<u16>) -> Result<BasicString, BasicError> {
        if bytes.len() > 255 {
            return Err(BasicError::StringTooLong);
        }
        let addr = match address {
            Some(addr) => {
                let start = addr as usize;
                let end = start + bytes.len();
                if end > Self::CAPACITY {
                    return Err(BasicError::OutOfStringSpace);
                }
                if end > self.data.len() {
                    self.data.resize(end, 0);
                }
                self.data[start..end].copy_from_slice(bytes);
                addr
            }
            None => {
                let start = self.data.len();
                if start + bytes.len() > Self::CAPACITY {
                    return Err(BasicError::OutOfStringSpace);
                }
                self.data.extend_from_slice(bytes);
                start as u16
            }
        };
        Ok(BasicString::from_pointer(bytes.len() as u8, addr))
    }

    /// The backing bytes of a descriptor.
    pub fn view(&self, s: BasicString) -> Result<&[u8], BasicError> {
        let start = s.address() as usize;
        self.data
            .get(start..start + s.len() as usize)
            .ok_or(BasicError::Internal)
    }

    /// ASC: ordinal of the first byte; the empty string has none.
    pub fn asc(&self, s: BasicString) -> Result<Integer, BasicError> {
        let bytes = self.view(s)?;
        match bytes.first() {
            Some(&b) => Ok(Integer::from_i16(b as i16)),
            None => Err(BasicError::IllegalFunctionCall),
        }
    }

    /// SPACE$: a fresh string of `count` spaces.
    pub fn space(&mut self, count: i64) -> Result<BasicString, BasicError> {
        if !(0..=255).contains(&count) {
            return Err(BasicError::IllegalFunctionCall);
        }
        self.store(&b" ".repeat(count as usize), None)
    }

    /// Concatenate into a fresh string.
    pub fn concat(&mut self, a: BasicString, b: BasicString) -> Result<BasicString, BasicError> {
        if a.len() as usize + b.len() as usize > 255 {
            return Err(BasicError::StringTooLong);
        }
        let mut bytes = Vec::with_capacity(a.len() as usize + b.len() as usize);
        bytes.extend_from_slice(self.view(a)?);
        bytes.extend_from_slice(self.view(b)?);
        self.store(&bytes, None)
    }

    /// Byte-wise ordering; a longer string wins over its prefix.
    pub fn compare(
        &self,
        a: BasicString,
        b: BasicString,
    ) -> Result<std::cmp::Ordering, BasicError> {
        Ok(self.view(a)?.cmp(self.view(b)?))
    }
}
