//! Microsoft Binary Format floats.
//!
//! Layout (little-endian): mantissa bytes, then a byte holding the sign bit
//! and the top seven mantissa bits, then the biased exponent byte. The
//! leading mantissa bit is implicit; a zero exponent byte means value zero.
//! There is no infinity and no NaN: exponent overflow is a [`FloatError`]
//! carrying the largest finite magnitude of the class.
//!
//! Arithmetic unpacks to an integer mantissa, computes in wide registers and
//! repacks with round-half-to-even at the target mantissa width.

use serde::Serialize;

use num_traits::checked_pow;

use crate::number::{FloatError, Integer, Saturated};
use crate::token;
use crate::BasicError;

/// A float split into sign, integer mantissa and biased exponent.
///
/// For a nonzero value `mant` holds exactly `bits` significant bits with the
/// top bit set, and the value is `mant / 2^bits * 2^(exp - 128)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Unpacked {
    pub neg: bool,
    pub mant: u64,
    pub exp: i32,
}

impl Unpacked {
    pub const ZERO: Unpacked = Unpacked {
        neg: false,
        mant: 0,
        exp: 0,
    };

    fn is_zero(self) -> bool {
        self.mant == 0
    }
}

/// Kernel failure before it is tagged with a class-specific saturation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Fail {
    Overflow { neg: bool },
    DivZero { neg: bool },
}

fn width(m: u128) -> i32 {
    (128 - m.leading_zeros()) as i32
}

/// Mantissa cap for the decimal scaling loops; times ten must fit u128.
const TOP: i32 = 115;

/// Normalise `m * 2^e2` to a `bits`-wide mantissa, rounding half to even.
fn pack_from(m: u128, e2: i32, bits: u32, neg: bool) -> Result<Unpacked, Fail> {
    if m == 0 {
        return Ok(Unpacked::ZERO);
    }
    let w = width(m);
    let bits_i = bits as i32;
    let mut keep;
    if w > bits_i {
        let shift = (w - bits_i) as u32;
        keep = (m >> shift) as u64;
        let rem = m & ((1u128 << shift) - 1);
        let half = 1u128 << (shift - 1);
        if rem > half || (rem == half && keep & 1 == 1) {
            keep += 1;
        }
    } else {
        keep = (m as u64) << (bits_i - w);
    }
    let mut e = e2 + w;
    if keep == 1u64 << bits {
        keep >>= 1;
        e += 1;
    }
    let exp = e + 128;
    if exp > 255 {
        return Err(Fail::Overflow { neg });
    }
    if exp < 1 {
        return Ok(Unpacked::ZERO);
    }
    Ok(Unpacked {
        neg,
        mant: keep,
        exp,
    })
}

fn add_unpacked(a: Unpacked, b: Unpacked, bits: u32) -> Result<Unpacked, Fail> {
    if a.is_zero() {
        return Ok(b);
    }
    if b.is_zero() {
        return Ok(a);
    }
    let (hi, lo) = if (a.exp, a.mant) >= (b.exp, b.mant) {
        (a, b)
    } else {
        (b, a)
    };
    let shift = (hi.exp - lo.exp) as u32;
    let (hm, lm, e2) = if shift > bits + 2 {
        // far below one ulp; fold into a sticky bit
        (
            (hi.mant as u128) << 2,
            1u128,
            hi.exp - 128 - bits as i32 - 2,
        )
    } else {
        (
            (hi.mant as u128) << shift,
            lo.mant as u128,
            lo.exp - 128 - bits as i32,
        )
    };
    let (m, neg) = if hi.neg == lo.neg {
        (hm + lm, hi.neg)
    } else if hm >= lm {
        (hm - lm, hi.neg)
    } else {
        (lm - hm, lo.neg)
    };
    pack_from(m, e2, bits, neg)
}

fn mul_unpacked(a: Unpacked, b: Unpacked, bits: u32) -> Result<Unpacked, Fail> {
    if a.is_zero() || b.is_zero() {
        return Ok(Unpacked::ZERO);
    }
    let p = a.mant as u128 * b.mant as u128;
    let e2 = a.exp + b.exp - 256 - 2 * bits as i32;
    pack_from(p, e2, bits, a.neg != b.neg)
}

fn div_unpacked(a: Unpacked, b: Unpacked, bits: u32) -> Result<Unpacked, Fail> {
    if b.is_zero() {
        return Err(Fail::DivZero {
            neg: a.neg != b.neg,
        });
    }
    if a.is_zero() {
        return Ok(Unpacked::ZERO);
    }
    let num = (a.mant as u128) << 64;
    let mut q = num / b.mant as u128;
    if num % b.mant as u128 != 0 {
        q |= 1;
    }
    let e2 = a.exp - b.exp - 64;
    pack_from(q, e2, bits, a.neg != b.neg)
}

/// Split into integer magnitude and fraction; `None` when there is no
/// fractional part to inspect (the value is already whole).
fn split_whole(u: Unpacked, bits: u32) -> Option<(u64, u64, u32)> {
    let point = u.exp - 128;
    if point >= bits as i32 {
        return None;
    }
    if point <= 0 {
        // all fraction; report magnitude relative to one half
        return Some((0, u.mant, bits));
    }
    let frac_bits = (bits as i32 - point) as u32;
    Some((
        u.mant >> frac_bits,
        u.mant & ((1u64 << frac_bits) - 1),
        frac_bits,
    ))
}

fn trunc_unpacked(u: Unpacked, bits: u32) -> Unpacked {
    match split_whole(u, bits) {
        None => u,
        Some((ip, _, _)) => whole(ip, u.neg, bits),
    }
}

fn floor_unpacked(u: Unpacked, bits: u32) -> Unpacked {
    match split_whole(u, bits) {
        None => u,
        Some((mut ip, frac, _)) => {
            if u.neg && frac != 0 {
                ip += 1;
            }
            whole(ip, u.neg, bits)
        }
    }
}

fn round_unpacked(u: Unpacked, bits: u32) -> Unpacked {
    match split_whole(u, bits) {
        None => u,
        Some((mut ip, frac, frac_bits)) => {
            // below 0.5 the reported fraction is not aligned to the half bit
            let frac = if u.exp - 128 <= 0 && u.exp != 128 { 0 } else { frac };
            let half = 1u64 << (frac_bits - 1);
            if frac > half || (frac == half && ip & 1 == 1) {
                ip += 1;
            }
            whole(ip, u.neg, bits)
        }
    }
}

fn whole(ip: u64, neg: bool, bits: u32) -> Unpacked {
    // cannot overflow: the magnitude only shrank or grew by one
    pack_from(ip as u128, 0, bits, neg).unwrap_or(Unpacked::ZERO)
}

fn to_int_unpacked(u: Unpacked, bits: u32) -> i64 {
    let r = round_unpacked(u, bits);
    if r.is_zero() {
        return 0;
    }
    let point = r.exp - 128;
    let magnitude = if point >= bits as i32 {
        (r.mant as u128) << (point - bits as i32) as u32
    } else {
        (r.mant >> (bits as i32 - point) as u32) as u128
    };
    let magnitude = magnitude.min(i64::MAX as u128) as i64;
    if r.neg {
        -magnitude
    } else {
        magnitude
    }
}

fn from_value_unpacked(v: f64, bits: u32) -> Result<Unpacked, Fail> {
    if v == 0.0 {
        return Ok(Unpacked::ZERO);
    }
    if !v.is_finite() {
        return Err(Fail::Overflow { neg: v < 0.0 });
    }
    let raw = v.to_bits();
    let neg = raw >> 63 == 1;
    let e = ((raw >> 52) & 0x7FF) as i32;
    let frac = raw & ((1u64 << 52) - 1);
    let (m, e2) = if e == 0 {
        (frac, -1074)
    } else {
        (frac | 1 << 52, e - 1075)
    };
    pack_from(m as u128, e2, bits, neg)
}

fn to_value_unpacked(u: Unpacked, bits: u32) -> f64 {
    if u.is_zero() {
        return 0.0;
    }
    let v = u.mant as f64 * 2f64.powi(u.exp - 128 - bits as i32);
    if u.neg {
        -v
    } else {
        v
    }
}

fn from_decimal_unpacked(mantissa: i64, exp10: i32, bits: u32) -> Result<Unpacked, Fail> {
    let neg = mantissa < 0;
    let mut m = mantissa.unsigned_abs() as u128;
    if m == 0 {
        return Ok(Unpacked::ZERO);
    }
    let mut e2 = 0i32;
    let mut e10 = exp10;
    while e10 > 0 {
        if width(m) >= TOP {
            m = (m >> 1) + (m & 1);
            e2 += 1;
        } else {
            m *= 10;
            e10 -= 1;
        }
    }
    while e10 < 0 {
        if width(m) < TOP {
            m <<= 1;
            e2 -= 1;
        } else {
            m = (m + 5) / 10;
            e10 += 1;
        }
    }
    pack_from(m, e2, bits, neg)
}

/// Decimal mantissa of exactly `digits` digits plus the power of ten such
/// that the value is `mant10 * 10^exp10`.
fn to_decimal_unpacked(u: Unpacked, bits: u32, digits: u32) -> (u64, i32) {
    if u.is_zero() {
        return (0, 0);
    }
    let mut m = u.mant as u128;
    let mut e2 = u.exp - 128 - bits as i32;
    let mut e10 = 0i32;
    while e2 > 0 {
        if width(m) >= TOP {
            m = (m + 5) / 10;
            e10 += 1;
        } else {
            m <<= 1;
            e2 -= 1;
        }
    }
    while e2 < 0 {
        if width(m) < TOP {
            m *= 10;
            e10 -= 1;
        } else {
            m = (m >> 1) + (m & 1);
            e2 += 1;
        }
    }
    let s = decimal_width(m);
    if s > digits {
        let drop = s - digits;
        let div = checked_pow(10u128, drop as usize).unwrap_or(u128::MAX);
        let mut q = (m / div) as u64;
        let rem = m % div;
        let half = div / 2;
        if rem > half || (rem == half && q & 1 == 1) {
            q += 1;
        }
        if q == 10u64.pow(digits) {
            (q / 10, e10 + drop as i32 + 1)
        } else {
            (q, e10 + drop as i32)
        }
    } else {
        let grow = digits - s;
        (m as u64 * 10u64.pow(grow), e10 - grow as i32)
    }
}

fn decimal_width(m: u128) -> u32 {
    let mut w = 0;
    let mut m = m;
    while m > 0 {
        m /= 10;
        w += 1;
    }
    w
}

fn cmp_unpacked(a: Unpacked, b: Unpacked) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a.is_zero(), b.is_zero()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return if b.neg { Ordering::Greater } else { Ordering::Less },
        (false, true) => return if a.neg { Ordering::Less } else { Ordering::Greater },
        (false, false) => {}
    }
    if a.neg != b.neg {
        return if a.neg { Ordering::Less } else { Ordering::Greater };
    }
    let mag = (a.exp, a.mant).cmp(&(b.exp, b.mant));
    if a.neg {
        mag.reverse()
    } else {
        mag
    }
}

fn unpack_bytes(b: &[u8], bits: u32) -> Unpacked {
    let n = b.len();
    let exp = b[n - 1] as i32;
    if exp == 0 {
        return Unpacked::ZERO;
    }
    let neg = b[n - 2] & 0x80 != 0;
    let mut le = [0u8; 8];
    le[..n - 1].copy_from_slice(&b[..n - 1]);
    le[n - 2] &= 0x7F;
    let mant = u64::from_le_bytes(le) | 1 << (bits - 1);
    Unpacked { neg, mant, exp }
}

fn pack_bytes<const N: usize>(u: Unpacked, bits: u32) -> [u8; N] {
    let mut out = [0u8; N];
    if u.is_zero() {
        return out;
    }
    let stored = u.mant & !(1u64 << (bits - 1));
    let le = stored.to_le_bytes();
    out[..N - 1].copy_from_slice(&le[..N - 1]);
    if u.neg {
        out[N - 2] |= 0x80;
    }
    out[N - 1] = u.exp as u8;
    out
}

/// Render a float the way PRINT, WRITE and LIST expect it.
fn format_unpacked(
    u: Unpacked,
    bits: u32,
    digits: u32,
    exp_char: char,
    leading_space: bool,
) -> String {
    let mut body = String::new();
    if u.is_zero() {
        body.push('0');
    } else {
        let (m10, e10) = to_decimal_unpacked(u, bits, digits);
        let mut ds = m10.to_string();
        while ds.len() > 1 && ds.ends_with('0') {
            ds.pop();
        }
        let n = ds.len() as i32;
        let point = e10 + digits as i32;
        // count of digit characters a fixed rendering would need
        let fixed_digits = if point > 0 { point.max(n) } else { n - point };
        if fixed_digits <= digits as i32 {
            if point <= 0 {
                body.push('.');
                for _ in 0..-point {
                    body.push('0');
                }
                body.push_str(&ds);
            } else if point >= n {
                body.push_str(&ds);
                for _ in 0..point - n {
                    body.push('0');
                }
            } else {
                body.push_str(&ds[..point as usize]);
                body.push('.');
                body.push_str(&ds[point as usize..]);
            }
        } else {
            body.push_str(&ds[..1]);
            if n > 1 {
                body.push('.');
                body.push_str(&ds[1..]);
            }
            body.push(exp_char);
            body.push_str(&format!("{:+03}", point - 1));
        }
    }
    if u.neg {
        format!("-{body}")
    } else if leading_space {
        format!(" {body}")
    } else {
        body
    }
}

macro_rules! mbf_float {
    (
        $name:ident, $bytes:literal, $bits:literal, $digits:literal,
        $lead:expr, $exp_char:literal, $saturated:path, $pos_max:expr
    ) => {
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
        pub struct $name([u8; $bytes]);

        impl $name {
            pub const SIZE: usize = $bytes;
            pub(crate) const BITS: u32 = $bits;
            pub(crate) const DIGITS: u32 = $digits;
            /// Largest representable magnitude, positive sign.
            pub const POS_MAX: $name = $name($pos_max);

            pub fn from_bytes(buf: [u8; $bytes]) -> Self {
                $name(buf)
            }

            pub fn to_bytes(self) -> [u8; $bytes] {
                self.0
            }

            pub(crate) fn unpack(self) -> Unpacked {
                unpack_bytes(&self.0, Self::BITS)
            }

            pub(crate) fn pack(u: Unpacked) -> Self {
                $name(pack_bytes::<$bytes>(u, Self::BITS))
            }

            /// Largest magnitude with the requested sign, used to saturate.
            pub fn max_with_sign(neg: bool) -> Self {
                let mut bytes = Self::POS_MAX.0;
                if neg {
                    bytes[$bytes - 2] |= 0x80;
                }
                $name(bytes)
            }

            fn fail(e: Fail) -> FloatError {
                match e {
                    Fail::Overflow { neg } => FloatError {
                        kind: BasicError::Overflow,
                        saturated: $saturated(Self::max_with_sign(neg)),
                    },
                    Fail::DivZero { neg } => FloatError {
                        kind: BasicError::DivisionByZero,
                        saturated: $saturated(Self::max_with_sign(neg)),
                    },
                }
            }

            pub fn is_zero(self) -> bool {
                self.unpack().is_zero()
            }

            pub fn from_int(value: i64) -> Self {
                // an i64 always fits the exponent range
                Self::pack(
                    pack_from(value.unsigned_abs() as u128, 0, Self::BITS, value < 0)
                        .unwrap_or(Unpacked::ZERO),
                )
            }

            /// Round half-to-even to a host integer; never overflows.
            pub fn to_int(self) -> i64 {
                to_int_unpacked(self.unpack(), Self::BITS)
            }

            /// Round half-to-even and range-check into an Integer.
            pub fn to_integer(self) -> Result<Integer, FloatError> {
                Integer::from_int(self.to_int())
            }

            pub fn from_value(value: f64) -> Result<Self, FloatError> {
                from_value_unpacked(value, Self::BITS)
                    .map(Self::pack)
                    .map_err(Self::fail)
            }

            pub fn to_value(self) -> f64 {
                to_value_unpacked(self.unpack(), Self::BITS)
            }

            pub fn from_decimal(mantissa: i64, exp10: i32) -> Result<Self, FloatError> {
                from_decimal_unpacked(mantissa, exp10, Self::BITS)
                    .map(Self::pack)
                    .map_err(Self::fail)
            }

            pub fn to_decimal(self) -> (u64, i32) {
                to_decimal_unpacked(self.unpack(), Self::BITS, Self::DIGITS)
            }

            pub fn from_token(tok: &[u8]) -> Result<Self, BasicError> {
                match tok.split_first() {
                    Some((&lead, trail)) if lead == $lead && trail.len() >= $bytes => {
                        let mut buf = [0u8; $bytes];
                        buf.copy_from_slice(&trail[..$bytes]);
                        Ok($name(buf))
                    }
                    _ => Err(BasicError::Internal),
                }
            }

            pub fn to_token(self) -> [u8; $bytes + 1] {
                let mut out = [0u8; $bytes + 1];
                out[0] = $lead;
                out[1..].copy_from_slice(&self.0);
                out
            }

            pub fn abs(self) -> Self {
                let mut u = self.unpack();
                u.neg = false;
                Self::pack(u)
            }

            pub fn neg(self) -> Self {
                let mut u = self.unpack();
                if !u.is_zero() {
                    u.neg = !u.neg;
                }
                Self::pack(u)
            }

            pub fn add(self, rhs: Self) -> Result<Self, FloatError> {
                add_unpacked(self.unpack(), rhs.unpack(), Self::BITS)
                    .map(Self::pack)
                    .map_err(Self::fail)
            }

            pub fn mul(self, rhs: Self) -> Result<Self, FloatError> {
                mul_unpacked(self.unpack(), rhs.unpack(), Self::BITS)
                    .map(Self::pack)
                    .map_err(Self::fail)
            }

            pub fn div(self, rhs: Self) -> Result<Self, FloatError> {
                div_unpacked(self.unpack(), rhs.unpack(), Self::BITS)
                    .map(Self::pack)
                    .map_err(Self::fail)
            }

            /// Truncate towards negative infinity.
            pub fn floor(self) -> Self {
                Self::pack(floor_unpacked(self.unpack(), Self::BITS))
            }

            /// Truncate towards zero.
            pub fn trunc(self) -> Self {
                Self::pack(trunc_unpacked(self.unpack(), Self::BITS))
            }

            /// Round to the nearest whole number, staying a float.
            pub fn round(self) -> Self {
                Self::pack(round_unpacked(self.unpack(), Self::BITS))
            }

            pub fn sign(self) -> i32 {
                let u = self.unpack();
                if u.is_zero() {
                    0
                } else if u.neg {
                    -1
                } else {
                    1
                }
            }

            pub fn eq(self, rhs: Self) -> bool {
                cmp_unpacked(self.unpack(), rhs.unpack()).is_eq()
            }

            pub fn gt(self, rhs: Self) -> bool {
                cmp_unpacked(self.unpack(), rhs.unpack()).is_gt()
            }

            pub fn to_str(self, leading_space: bool, type_sign: bool) -> String {
                let mut s = format_unpacked(
                    self.unpack(),
                    Self::BITS,
                    Self::DIGITS,
                    $exp_char,
                    leading_space,
                );
                if type_sign {
                    Self::push_type_sign(&mut s);
                }
                s
            }
        }
    };
}

mbf_float!(
    Single,
    4,
    24,
    7,
    token::T_SINGLE,
    'E',
    Saturated::Single,
    [0xFF, 0xFF, 0x7F, 0xFF]
);

mbf_float!(
    Double,
    8,
    56,
    16,
    token::T_DOUBLE,
    'D',
    Saturated::Double,
    [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x7F, 0xFF]
);

impl Single {
    /// A LIST rendering with no point and no exponent would re-tokenise as
    /// an integer; mark it as single.
    fn push_type_sign(s: &mut String) {
        if !s.contains('.') && !s.contains('E') {
            s.push('!');
        }
    }

    pub fn to_double(self) -> Double {
        let mut u = self.unpack();
        if !u.is_zero() {
            u.mant <<= Double::BITS - Single::BITS;
        }
        Double::pack(u)
    }

    /// Power with an integer exponent by repeated squaring.
    pub fn pow_int(self, exponent: Integer) -> Result<Self, FloatError> {
        let n = exponent.to_int();
        if n == 0 {
            return Ok(Single::from_int(1));
        }
        let mut e = n.unsigned_abs() as u32;
        let mut base = self;
        let mut acc = Single::from_int(1);
        loop {
            if e & 1 == 1 {
                acc = acc.mul(base)?;
            }
            e >>= 1;
            if e == 0 {
                break;
            }
            base = base.mul(base)?;
        }
        if n < 0 {
            acc = Single::from_int(1).div(acc)?;
        }
        Ok(acc)
    }
}

impl Double {
    fn push_type_sign(s: &mut String) {
        if !s.contains('D') {
            s.push('#');
        }
    }

    /// Narrow to single precision; the largest doubles overflow.
    pub fn to_single(self) -> Result<Single, FloatError> {
        let u = self.unpack();
        if u.is_zero() {
            return Ok(Single::pack(Unpacked::ZERO));
        }
        pack_from(
            u.mant as u128,
            u.exp - 128 - Double::BITS as i32,
            Single::BITS,
            u.neg,
        )
        .map(Single::pack)
        .map_err(|e| match e {
            Fail::Overflow { neg } => FloatError {
                kind: BasicError::Overflow,
                saturated: Saturated::Single(Single::max_with_sign(neg)),
            },
            Fail::DivZero { .. } => FloatError::domain(),
        })
    }
}
