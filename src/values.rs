//! Typed BASIC values and the conversions and operators over them.
//!
//! The facade owns the string space, the float error handler and the
//! `double_math` dialect switch; every operator the interpreter sees goes
//! through it. Math failures from the numeric kernels are routed to the
//! error handler, which decides between a hard error and the dialect's
//! print-and-saturate soft path.

use serde::Serialize;

use crate::number::{self, Double, FloatError, Integer, Saturated, Single};
use crate::string::{BasicString, StringHeap};
use crate::token::{self, NumberLead};
use crate::{BasicError, Sigil};

/// Screen collaborator; soft math errors print one line through it.
pub trait Screen {
    fn write_line(&mut self, text: &str);
}

/// A typed BASIC value. Numeric values carry their canonical bytes; a
/// String value carries its 3-byte descriptor into the string space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum Value {
    Integer(Integer),
    Single(Single),
    Double(Double),
    String(BasicString),
}

impl Value {
    pub fn sigil(&self) -> Sigil {
        match self {
            Value::Integer(_) => Sigil::Integer,
            Value::Single(_) => Sigil::Single,
            Value::Double(_) => Sigil::Double,
            Value::String(_) => Sigil::String,
        }
    }

    pub fn size(&self) -> usize {
        self.sigil().size()
    }

    /// Owned copy of the value's bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Value::Integer(v) => v.to_bytes().to_vec(),
            Value::Single(v) => v.to_bytes().to_vec(),
            Value::Double(v) => v.to_bytes().to_vec(),
            Value::String(v) => v.to_bytes().to_vec(),
        }
    }

    /// Literal token bytes; strings have no token form.
    pub fn to_token(&self) -> Result<Vec<u8>, BasicError> {
        match self {
            Value::Integer(v) => Ok(v.to_token()),
            Value::Single(v) => Ok(v.to_token().to_vec()),
            Value::Double(v) => Ok(v.to_token().to_vec()),
            Value::String(_) => Err(BasicError::TypeMismatch),
        }
    }

    fn is_number(&self) -> bool {
        !matches!(self, Value::String(_))
    }
}

/// An operator failure: either an interpreter error that propagates as-is,
/// or a kernel math failure still waiting for the error handler.
enum OpError {
    Basic(BasicError),
    Float(FloatError),
}

impl From<BasicError> for OpError {
    fn from(e: BasicError) -> OpError {
        OpError::Basic(e)
    }
}

impl From<FloatError> for OpError {
    fn from(e: FloatError) -> OpError {
        OpError::Float(e)
    }
}

/// Decides whether a math failure interrupts execution or prints one line
/// and continues with a saturated value.
pub struct FloatErrorHandler {
    screen: Option<Box<dyn Screen>>,
    do_raise: bool,
}

impl FloatErrorHandler {
    fn new(screen: Option<Box<dyn Screen>>) -> Self {
        FloatErrorHandler {
            screen,
            do_raise: false,
        }
    }

    /// While the interpreter runs ON ERROR recovery code, soft handling is
    /// suspended and every math error is hard.
    pub fn pause_handling(&mut self, do_raise: bool) {
        self.do_raise = do_raise;
    }

    fn handle(&mut self, e: FloatError) -> Result<Value, BasicError> {
        let soft = matches!(e.kind, BasicError::Overflow | BasicError::DivisionByZero);
        // integer offenders are never saturated
        if self.do_raise || !soft || matches!(e.saturated, Saturated::Int) {
            return Err(e.kind);
        }
        let Some(screen) = &mut self.screen else {
            return Err(e.kind);
        };
        screen.write_line(&e.kind.to_string());
        Ok(match e.saturated {
            Saturated::Single(v) => Value::Single(v),
            Saturated::Double(v) => Value::Double(v),
            _ => Value::Single(Single::POS_MAX),
        })
    }
}

/// Both operands of a binary operator brought to the higher kind.
enum Matched {
    Integers(Integer, Integer),
    Singles(Single, Single),
    Doubles(Double, Double),
    Strings(BasicString, BasicString),
}

/// Factory and conversion hub for BASIC values.
pub struct Values {
    heap: StringHeap,
    handler: FloatErrorHandler,
    /// Double-precision EXP, SIN, COS, TAN, ATN, LOG and power.
    double_math: bool,
}

impl Values {
    pub fn new(screen: Option<Box<dyn Screen>>, double_math: bool) -> Self {
        Values {
            heap: StringHeap::new(),
            handler: FloatErrorHandler::new(screen),
            double_math,
        }
    }

    pub fn heap(&self) -> &StringHeap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut StringHeap {
        &mut self.heap
    }

    /// Suspend floating-point soft error handling.
    pub fn pause_error_handling(&mut self, do_raise: bool) {
        self.handler.pause_handling(do_raise);
    }

    fn run(&mut self, r: Result<Value, OpError>) -> Result<Value, BasicError> {
        match r {
            Ok(v) => Ok(v),
            Err(OpError::Basic(e)) => Err(e),
            Err(OpError::Float(e)) => self.handler.handle(e),
        }
    }

    ///////////////////////////////////////////////////////////////////////
    // construction

    /// Wrap raw bytes as a typed value, dispatching on length.
    pub fn create(&self, buf: &[u8]) -> Result<Value, BasicError> {
        match buf.len() {
            2 => Ok(Value::Integer(Integer::from_bytes([buf[0], buf[1]]))),
            3 => Ok(Value::String(BasicString::from_bytes([
                buf[0], buf[1], buf[2],
            ]))),
            4 => {
                let mut b = [0u8; 4];
                b.copy_from_slice(buf);
                Ok(Value::Single(Single::from_bytes(b)))
            }
            8 => {
                let mut b = [0u8; 8];
                b.copy_from_slice(buf);
                Ok(Value::Double(Double::from_bytes(b)))
            }
            _ => Err(BasicError::Internal),
        }
    }

    /// Freshly zeroed value of the given kind.
    pub fn null(&self, sigil: Sigil) -> Value {
        match sigil {
            Sigil::Integer => Value::Integer(Integer::default()),
            Sigil::Single => Value::Single(Single::default()),
            Sigil::Double => Value::Double(Double::default()),
            Sigil::String => Value::String(BasicString::default()),
        }
    }

    pub fn new_string(&self) -> Value {
        self.null(Sigil::String)
    }

    pub fn new_integer(&self) -> Value {
        self.null(Sigil::Integer)
    }

    pub fn new_single(&self) -> Value {
        self.null(Sigil::Single)
    }

    pub fn new_double(&self) -> Value {
        self.null(Sigil::Double)
    }

    /// The BASIC-canonical boolean: 0 for false, all-ones -1 for true.
    pub fn from_bool(&self, b: bool) -> Value {
        if b {
            Value::Integer(Integer::from_u16(0xFFFF))
        } else {
            Value::Integer(Integer::default())
        }
    }

    ///////////////////////////////////////////////////////////////////////
    // host bridge

    /// Convert to a host float.
    pub fn to_value(&self, v: Value) -> Result<f64, BasicError> {
        match v {
            Value::Integer(i) => Ok(i.to_int() as f64),
            Value::Single(s) => Ok(s.to_value()),
            Value::Double(d) => Ok(d.to_value()),
            Value::String(_) => Err(BasicError::TypeMismatch),
        }
    }

    /// Convert a host float into the requested kind.
    pub fn from_value(&mut self, value: f64, sigil: Sigil) -> Result<Value, BasicError> {
        let r = Self::from_value_inner(value, sigil);
        self.run(r)
    }

    fn from_value_inner(value: f64, sigil: Sigil) -> Result<Value, OpError> {
        match sigil {
            Sigil::Integer => {
                if !value.is_finite() {
                    return Err(FloatError::overflow_int().into());
                }
                Ok(Value::Integer(Integer::from_int(
                    value.round_ties_even() as i64
                )?))
            }
            Sigil::Single => Ok(Value::Single(Single::from_value(value)?)),
            Sigil::Double => Ok(Value::Double(Double::from_value(value)?)),
            Sigil::String => Err(BasicError::TypeMismatch.into()),
        }
    }

    /// Round and convert to a host integer; fails outside Integer range.
    pub fn to_int(&self, v: Value) -> Result<i16, BasicError> {
        Ok(self.cint(v)?.to_int())
    }

    ///////////////////////////////////////////////////////////////////////
    // representation conversions

    pub fn from_bytes(&self, buf: &[u8]) -> Result<Value, BasicError> {
        self.create(buf)
    }

    /// Decode a numeric literal token.
    pub fn from_token(&self, tok: &[u8]) -> Result<Value, BasicError> {
        let lead = *tok.first().ok_or(BasicError::Internal)?;
        match NumberLead::try_from(lead) {
            Ok(NumberLead::Single) => Ok(Value::Single(Single::from_token(tok)?)),
            Ok(NumberLead::Double) => Ok(Value::Double(Double::from_token(tok)?)),
            _ if token::is_number_token(lead) => Ok(Value::Integer(Integer::from_token(tok)?)),
            _ => Err(BasicError::Internal),
        }
    }

    /// Convert number text to a typed value.
    ///
    /// Leading spaces and line feeds are skipped and the text upper-cased.
    /// Empty text is Integer zero; `&H`/`&O`/`&` prefixes parse as hex and
    /// octal integers; decimal text parses as Integer when it fits and falls
    /// through to the float path otherwise.
    pub fn from_str(&mut self, word: &[u8], allow_nonnum: bool) -> Result<Value, BasicError> {
        let r = Self::from_str_inner(word, allow_nonnum);
        self.run(r)
    }

    /// INPUT-style conversion: a string target keeps the text as a string.
    pub fn from_str_typed(
        &mut self,
        word: &[u8],
        allow_nonnum: bool,
        typechar: Option<Sigil>,
    ) -> Result<Value, BasicError> {
        if typechar == Some(Sigil::String) {
            return self.alloc_string(word);
        }
        self.from_str(word, allow_nonnum)
    }

    fn from_str_inner(word: &[u8], allow_nonnum: bool) -> Result<Value, OpError> {
        let start = word
            .iter()
            .position(|&b| b != b' ' && b != b'\n')
            .unwrap_or(word.len());
        let word: Vec<u8> = word[start..].to_ascii_uppercase();
        if word.is_empty() {
            return Ok(Value::Integer(Integer::default()));
        }
        if word.starts_with(b"&H") {
            return Ok(Value::Integer(Integer::from_hex(&word[2..])?));
        }
        if word.starts_with(b"&") {
            let digits = if word.get(1) == Some(&b'O') {
                &word[2..]
            } else {
                &word[1..]
            };
            return Ok(Value::Integer(Integer::from_oct(digits)?));
        }
        // integer first, so the tokeniser gets the right token type;
        // overflow and non-integer content both retry as float
        if let Ok(i) = Integer::from_str_bytes(&word) {
            return Ok(Value::Integer(i));
        }
        let dec = number::str_to_decimal(&word, allow_nonnum)?;
        if dec.is_double {
            Ok(Value::Double(Double::from_decimal(dec.mantissa, dec.exp10)?))
        } else {
            Ok(Value::Single(Single::from_decimal(dec.mantissa, dec.exp10)?))
        }
    }

    /// Number to text. PRINT and STR$ pass `(true, false)`, WRITE
    /// `(false, false)`, LIST `(false, true)`.
    pub fn to_str(
        &self,
        v: Value,
        leading_space: bool,
        type_sign: bool,
    ) -> Result<String, BasicError> {
        match v {
            Value::Integer(i) => Ok(i.to_str(leading_space)),
            Value::Single(s) => Ok(s.to_str(leading_space, type_sign)),
            Value::Double(d) => Ok(d.to_str(leading_space, type_sign)),
            Value::String(_) => Err(BasicError::TypeMismatch),
        }
    }

    ///////////////////////////////////////////////////////////////////////
    // strings

    /// A fresh string on the heap with the given bytes.
    pub fn alloc_string(&mut self, bytes: &[u8]) -> Result<Value, BasicError> {
        Ok(Value::String(self.heap.store(bytes, None)?))
    }

    /// A string stored at a fixed heap address.
    pub fn from_str_at(&mut self, bytes: &[u8], address: u16) -> Result<Value, BasicError> {
        Ok(Value::String(self.heap.store(bytes, Some(address))?))
    }

    /// STR$: the PRINT rendering of a number, as a string.
    pub fn representation(&mut self, v: Value) -> Result<Value, BasicError> {
        let text = self.to_str(pass_number(v)?, true, false)?;
        self.alloc_string(text.as_bytes())
    }

    /// VAL: the number a string spells.
    pub fn val(&mut self, v: Value) -> Result<Value, BasicError> {
        let bytes = self.heap.view(pass_string(v)?)?.to_vec();
        self.from_str(&bytes, true)
    }

    /// CHR$: one-byte string for an ASCII value.
    pub fn character(&mut self, v: Value) -> Result<Value, BasicError> {
        let code = self.to_int(v)?;
        if !(0..=255).contains(&code) {
            return Err(BasicError::IllegalFunctionCall);
        }
        self.alloc_string(&[code as u8])
    }

    /// OCT$: octal rendering, argument taken as unsigned 16-bit.
    pub fn octal(&mut self, v: Value) -> Result<Value, BasicError> {
        let i = self.cint_unsigned(v)?;
        self.alloc_string(i.to_oct().as_bytes())
    }

    /// HEX$: hex rendering, argument taken as unsigned 16-bit.
    pub fn hexadecimal(&mut self, v: Value) -> Result<Value, BasicError> {
        let i = self.cint_unsigned(v)?;
        self.alloc_string(i.to_hex().as_bytes())
    }

    /// LEN of a string.
    pub fn len(&self, v: Value) -> Result<Value, BasicError> {
        Ok(Value::Integer(pass_string(v)?.len_value()))
    }

    /// ASC of a string's first byte.
    pub fn asc(&self, v: Value) -> Result<Value, BasicError> {
        Ok(Value::Integer(self.heap.asc(pass_string(v)?)?))
    }

    /// SPACE$: a run of spaces.
    pub fn space(&mut self, v: Value) -> Result<Value, BasicError> {
        let count = self.to_int(v)?;
        Ok(Value::String(self.heap.space(count as i64)?))
    }

    ///////////////////////////////////////////////////////////////////////
    // binary representation intrinsics

    /// MKI$: the two bytes of an integer, as a string.
    pub fn mki(&mut self, v: Value) -> Result<Value, BasicError> {
        let bytes = self.cint(v)?.to_bytes();
        self.alloc_string(&bytes)
    }

    /// MKS$: the four bytes of a single, as a string.
    pub fn mks(&mut self, v: Value) -> Result<Value, BasicError> {
        let bytes = match self.csng(v)? {
            Value::Single(s) => s.to_bytes(),
            _ => return Err(BasicError::Internal),
        };
        self.alloc_string(&bytes)
    }

    /// MKD$: the eight bytes of a double, as a string.
    pub fn mkd(&mut self, v: Value) -> Result<Value, BasicError> {
        let bytes = match self.cdbl(v)? {
            Value::Double(d) => d.to_bytes(),
            _ => return Err(BasicError::Internal),
        };
        self.alloc_string(&bytes)
    }

    fn cv(&self, v: Value, size: usize) -> Result<Value, BasicError> {
        let bytes = self.heap.view(pass_string(v)?)?;
        if bytes.len() < size {
            return Err(BasicError::IllegalFunctionCall);
        }
        self.from_bytes(&bytes[..size])
    }

    /// CVI: integer from the first two bytes of a string.
    pub fn cvi(&self, v: Value) -> Result<Value, BasicError> {
        self.cv(v, Integer::SIZE)
    }

    /// CVS: single from the first four bytes of a string.
    pub fn cvs(&self, v: Value) -> Result<Value, BasicError> {
        self.cv(v, Single::SIZE)
    }

    /// CVD: double from the first eight bytes of a string.
    pub fn cvd(&self, v: Value) -> Result<Value, BasicError> {
        self.cv(v, Double::SIZE)
    }

    ///////////////////////////////////////////////////////////////////////
    // coercions

    fn to_integer_raw(v: Value) -> Result<Integer, OpError> {
        match v {
            Value::Integer(i) => Ok(i),
            Value::Single(s) => Ok(s.to_integer()?),
            Value::Double(d) => Ok(d.to_integer()?),
            Value::String(_) => Err(BasicError::TypeMismatch.into()),
        }
    }

    fn to_single_raw(v: Value) -> Result<Single, OpError> {
        match v {
            Value::Integer(i) => Ok(i.to_single()),
            Value::Single(s) => Ok(s),
            Value::Double(d) => Ok(d.to_single()?),
            Value::String(_) => Err(BasicError::TypeMismatch.into()),
        }
    }

    fn to_double_raw(v: Value) -> Result<Double, OpError> {
        match v {
            Value::Integer(i) => Ok(i.to_double()),
            Value::Single(s) => Ok(s.to_double()),
            Value::Double(d) => Ok(d),
            Value::String(_) => Err(BasicError::TypeMismatch.into()),
        }
    }

    /// Promote an Integer to Single; floats keep their kind unless
    /// `use_double` widens everything to Double.
    fn to_float_raw(v: Value, use_double: bool) -> Result<Value, OpError> {
        if use_double {
            return Ok(Value::Double(Self::to_double_raw(v)?));
        }
        match v {
            Value::Integer(i) => Ok(Value::Single(i.to_single())),
            Value::Single(_) | Value::Double(_) => Ok(v),
            Value::String(_) => Err(BasicError::TypeMismatch.into()),
        }
    }

    /// CINT: round to Integer; overflow is always hard.
    pub fn cint(&self, v: Value) -> Result<Integer, BasicError> {
        match Self::to_integer_raw(v) {
            Ok(i) => Ok(i),
            Err(OpError::Basic(e)) => Err(e),
            Err(OpError::Float(e)) => Err(e.kind),
        }
    }

    fn cint_unsigned(&self, v: Value) -> Result<Integer, BasicError> {
        let n = match v {
            Value::Integer(i) => return Ok(i),
            Value::Single(s) => s.to_int(),
            Value::Double(d) => d.to_int(),
            Value::String(_) => return Err(BasicError::TypeMismatch),
        };
        if (-32768..=-1).contains(&n) {
            Ok(Integer::from_i16(n as i16))
        } else if (0..=65535).contains(&n) {
            Ok(Integer::from_u16(n as u16))
        } else {
            Err(BasicError::Overflow)
        }
    }

    /// CSNG: convert to Single; narrowing a large Double is soft-handled.
    pub fn csng(&mut self, v: Value) -> Result<Value, BasicError> {
        let r = Self::to_single_raw(v).map(Value::Single);
        self.run(r)
    }

    /// CDBL: convert to Double.
    pub fn cdbl(&mut self, v: Value) -> Result<Value, BasicError> {
        let r = Self::to_double_raw(v).map(Value::Double);
        self.run(r)
    }

    /// Coerce to the kind named by a sigil.
    pub fn to_type(&mut self, sigil: Sigil, v: Value) -> Result<Value, BasicError> {
        match sigil {
            Sigil::String => Ok(Value::String(pass_string(v)?)),
            Sigil::Integer => Ok(Value::Integer(self.cint(v)?)),
            Sigil::Single => self.csng(v),
            Sigil::Double => self.cdbl(v),
        }
    }

    ///////////////////////////////////////////////////////////////////////
    // type matching

    fn match_types(v1: Value, v2: Value) -> Result<Matched, OpError> {
        if matches!(v1, Value::Double(_)) || matches!(v2, Value::Double(_)) {
            Ok(Matched::Doubles(
                Self::to_double_raw(v1)?,
                Self::to_double_raw(v2)?,
            ))
        } else if matches!(v1, Value::Single(_)) || matches!(v2, Value::Single(_)) {
            Ok(Matched::Singles(
                Self::to_single_raw(v1)?,
                Self::to_single_raw(v2)?,
            ))
        } else if matches!(v1, Value::Integer(_)) || matches!(v2, Value::Integer(_)) {
            Ok(Matched::Integers(
                Self::to_integer_raw(v1)?,
                Self::to_integer_raw(v2)?,
            ))
        } else {
            Ok(Matched::Strings(pass_string(v1)?, pass_string(v2)?))
        }
    }

    ///////////////////////////////////////////////////////////////////////
    // unary operators

    /// Absolute value; strings pass unchanged.
    pub fn abs(&self, v: Value) -> Result<Value, BasicError> {
        match v {
            // promote Integer to Single so ABS(-32768) cannot overflow
            Value::Integer(i) => Ok(Value::Single(i.to_single().abs())),
            Value::Single(s) => Ok(Value::Single(s.abs())),
            Value::Double(d) => Ok(Value::Double(d.abs())),
            Value::String(_) => Ok(v),
        }
    }

    /// Unary minus; strings pass unchanged.
    pub fn neg(&self, v: Value) -> Result<Value, BasicError> {
        match v {
            Value::Integer(i) => Ok(Value::Single(i.to_single().neg())),
            Value::Single(s) => Ok(Value::Single(s.neg())),
            Value::Double(d) => Ok(Value::Double(d.neg())),
            Value::String(_) => Ok(v),
        }
    }

    /// SGN.
    pub fn sgn(&self, v: Value) -> Result<Value, BasicError> {
        let sign = match v {
            Value::Integer(i) => i.sign(),
            Value::Single(s) => s.sign(),
            Value::Double(d) => d.sign(),
            Value::String(_) => return Err(BasicError::TypeMismatch),
        };
        Ok(Value::Integer(Integer::from_i16(sign as i16)))
    }

    /// INT: truncate towards negative infinity.
    pub fn int(&self, v: Value) -> Result<Value, BasicError> {
        match v {
            Value::Integer(_) => Ok(v),
            Value::Single(s) => Ok(Value::Single(s.floor())),
            Value::Double(d) => Ok(Value::Double(d.floor())),
            Value::String(_) => Err(BasicError::TypeMismatch),
        }
    }

    /// FIX: truncate towards zero.
    pub fn fix(&self, v: Value) -> Result<Value, BasicError> {
        match v {
            Value::Integer(_) => Ok(v),
            Value::Single(s) => Ok(Value::Single(s.trunc())),
            Value::Double(d) => Ok(Value::Double(d.trunc())),
            Value::String(_) => Err(BasicError::TypeMismatch),
        }
    }

    /// Round to the nearest whole number without leaving the float kinds.
    pub fn round(&mut self, v: Value) -> Result<Value, BasicError> {
        let r = Self::to_float_raw(v, false).map(|f| match f {
            Value::Single(s) => Value::Single(s.round()),
            Value::Double(d) => Value::Double(d.round()),
            other => other,
        });
        self.run(r)
    }

    ///////////////////////////////////////////////////////////////////////
    // host math functions

    fn call_float(
        &mut self,
        v: Value,
        f: impl Fn(f64) -> Result<f64, BasicError>,
    ) -> Result<Value, BasicError> {
        let use_double = self.double_math && matches!(v, Value::Double(_));
        let r = (|| -> Result<Value, OpError> {
            let x = match Self::to_float_raw(v, use_double)? {
                Value::Single(s) => s.to_value(),
                Value::Double(d) => d.to_value(),
                _ => return Err(BasicError::TypeMismatch.into()),
            };
            let y = f(x).map_err(OpError::Basic)?;
            if y.is_nan() {
                return Err(FloatError::domain().into());
            }
            if use_double {
                Ok(Value::Double(Double::from_value(y)?))
            } else {
                Ok(Value::Single(Single::from_value(y)?))
            }
        })();
        self.run(r)
    }

    /// SQR; negative arguments are a domain error.
    pub fn sqr(&mut self, v: Value) -> Result<Value, BasicError> {
        self.call_float(v, |x| {
            if x < 0.0 {
                Err(BasicError::IllegalFunctionCall)
            } else {
                Ok(x.sqrt())
            }
        })
    }

    /// EXP.
    pub fn exp(&mut self, v: Value) -> Result<Value, BasicError> {
        self.call_float(v, |x| Ok(x.exp()))
    }

    /// SIN.
    pub fn sin(&mut self, v: Value) -> Result<Value, BasicError> {
        self.call_float(v, |x| Ok(x.sin()))
    }

    /// COS.
    pub fn cos(&mut self, v: Value) -> Result<Value, BasicError> {
        self.call_float(v, |x| Ok(x.cos()))
    }

    /// TAN.
    pub fn tan(&mut self, v: Value) -> Result<Value, BasicError> {
        self.call_float(v, |x| Ok(x.tan()))
    }

    /// ATN.
    pub fn atn(&mut self, v: Value) -> Result<Value, BasicError> {
        self.call_float(v, |x| Ok(x.atan()))
    }

    /// LOG; zero and negative arguments are a domain error.
    pub fn log(&mut self, v: Value) -> Result<Value, BasicError> {
        self.call_float(v, |x| {
            if x <= 0.0 {
                Err(BasicError::IllegalFunctionCall)
            } else {
                Ok(x.ln())
            }
        })
    }

    ///////////////////////////////////////////////////////////////////////
    // binary operators

    /// Exponentiation. Integer exponents use repeated squaring on Single;
    /// with `double_math` a Double on either side forces a Double power.
    pub fn pow(&mut self, a: Value, b: Value) -> Result<Value, BasicError> {
        let double_math = self.double_math;
        let r = (|| -> Result<Value, OpError> {
            if double_math
                && (matches!(a, Value::Double(_)) || matches!(b, Value::Double(_)))
            {
                let (x, y) = (Self::to_double_raw(a)?, Self::to_double_raw(b)?);
                let p = Self::host_pow(x.to_value(), y.to_value())?;
                Ok(Value::Double(Double::from_value(p)?))
            } else if let Value::Integer(n) = b {
                Ok(Value::Single(Self::to_single_raw(a)?.pow_int(n)?))
            } else {
                let (x, y) = (Self::to_single_raw(a)?, Self::to_single_raw(b)?);
                let p = Self::host_pow(x.to_value(), y.to_value())?;
                Ok(Value::Single(Single::from_value(p)?))
            }
        })();
        self.run(r)
    }

    fn host_pow(x: f64, y: f64) -> Result<f64, OpError> {
        if x == 0.0 && y < 0.0 {
            return Err(OpError::Basic(BasicError::DivisionByZero));
        }
        let p = x.powf(y);
        if p.is_nan() {
            return Err(FloatError::domain().into());
        }
        Ok(p)
    }

    /// Add two numbers or concatenate two strings.
    pub fn add(&mut self, a: Value, b: Value) -> Result<Value, BasicError> {
        if let (Value::String(x), Value::String(y)) = (a, b) {
            return Ok(Value::String(self.heap.concat(x, y)?));
        }
        let r = (|| -> Result<Value, OpError> {
            // promote Integer to Single so -32768 + -1 cannot overflow
            let a = if a.is_number() {
                Self::to_float_raw(a, false)?
            } else {
                a
            };
            match Self::match_types(a, b)? {
                Matched::Doubles(x, y) => Ok(Value::Double(x.add(y)?)),
                Matched::Singles(x, y) => Ok(Value::Single(x.add(y)?)),
                // unreachable after promotion, but total
                Matched::Integers(x, y) => Ok(Value::Integer(x.add(y)?)),
                Matched::Strings(..) => Err(BasicError::TypeMismatch.into()),
            }
        })();
        self.run(r)
    }

    /// Subtract.
    pub fn sub(&mut self, a: Value, b: Value) -> Result<Value, BasicError> {
        let a = pass_number(a)?;
        let b = self.neg(b)?;
        self.add(a, b)
    }

    /// Multiply.
    pub fn mul(&mut self, a: Value, b: Value) -> Result<Value, BasicError> {
        let r = (|| -> Result<Value, OpError> {
            if matches!(a, Value::Double(_)) || matches!(b, Value::Double(_)) {
                Ok(Value::Double(
                    Self::to_double_raw(a)?.mul(Self::to_double_raw(b)?)?,
                ))
            } else {
                Ok(Value::Single(
                    Self::to_single_raw(a)?.mul(Self::to_single_raw(b)?)?,
                ))
            }
        })();
        self.run(r)
    }

    /// Divide.
    pub fn div(&mut self, a: Value, b: Value) -> Result<Value, BasicError> {
        let r = (|| -> Result<Value, OpError> {
            if matches!(a, Value::Double(_)) || matches!(b, Value::Double(_)) {
                Ok(Value::Double(
                    Self::to_double_raw(a)?.div(Self::to_double_raw(b)?)?,
                ))
            } else {
                Ok(Value::Single(
                    Self::to_single_raw(a)?.div(Self::to_single_raw(b)?)?,
                ))
            }
        })();
        self.run(r)
    }

    /// `\`: integer division, truncating towards zero.
    pub fn intdiv(&mut self, a: Value, b: Value) -> Result<Value, BasicError> {
        let r = (|| -> Result<Value, OpError> {
            Ok(Value::Integer(
                Self::to_integer_raw(a)?.div_int(Self::to_integer_raw(b)?)?,
            ))
        })();
        self.run(r)
    }

    /// MOD on Integers; the sign follows the dividend.
    pub fn modulo(&mut self, a: Value, b: Value) -> Result<Value, BasicError> {
        let r = (|| -> Result<Value, OpError> {
            Ok(Value::Integer(
                Self::to_integer_raw(a)?.modulo(Self::to_integer_raw(b)?)?,
            ))
        })();
        self.run(r)
    }

    ///////////////////////////////////////////////////////////////////////
    // comparisons

    fn bool_eq(&self, a: Value, b: Value) -> Result<bool, BasicError> {
        match Self::match_types(a, b).map_err(flatten)? {
            Matched::Integers(x, y) => Ok(x.eq(y)),
            Matched::Singles(x, y) => Ok(x.eq(y)),
            Matched::Doubles(x, y) => Ok(x.eq(y)),
            Matched::Strings(x, y) => Ok(self.heap.compare(x, y)?.is_eq()),
        }
    }

    fn bool_gt(&self, a: Value, b: Value) -> Result<bool, BasicError> {
        match Self::match_types(a, b).map_err(flatten)? {
            Matched::Integers(x, y) => Ok(x.gt(y)),
            Matched::Singles(x, y) => Ok(x.gt(y)),
            Matched::Doubles(x, y) => Ok(x.gt(y)),
            Matched::Strings(x, y) => Ok(self.heap.compare(x, y)?.is_gt()),
        }
    }

    /// `=` comparison: -1 if equal, 0 otherwise.
    pub fn eq(&self, a: Value, b: Value) -> Result<Value, BasicError> {
        Ok(self.from_bool(self.bool_eq(a, b)?))
    }

    /// `<>`.
    pub fn neq(&self, a: Value, b: Value) -> Result<Value, BasicError> {
        Ok(self.from_bool(!self.bool_eq(a, b)?))
    }

    /// `>`.
    pub fn gt(&self, a: Value, b: Value) -> Result<Value, BasicError> {
        Ok(self.from_bool(self.bool_gt(a, b)?))
    }

    /// `>=`.
    pub fn gte(&self, a: Value, b: Value) -> Result<Value, BasicError> {
        Ok(self.from_bool(!self.bool_gt(b, a)?))
    }

    /// `<=`.
    pub fn lte(&self, a: Value, b: Value) -> Result<Value, BasicError> {
        Ok(self.from_bool(!self.bool_gt(a, b)?))
    }

    /// `<`.
    pub fn lt(&self, a: Value, b: Value) -> Result<Value, BasicError> {
        Ok(self.from_bool(self.bool_gt(b, a)?))
    }

    ///////////////////////////////////////////////////////////////////////
    // bitwise operators, unsigned 16-bit

    /// NOT: bitwise complement, -x-1.
    pub fn not(&self, v: Value) -> Result<Value, BasicError> {
        let i = self.cint(v)?;
        Ok(Value::Integer(Integer::from_i16(!i.to_int())))
    }

    fn bitwise(
        &self,
        a: Value,
        b: Value,
        f: impl Fn(u16, u16) -> u16,
    ) -> Result<Value, BasicError> {
        let x = self.cint(a)?.to_int_unsigned();
        let y = self.cint(b)?.to_int_unsigned();
        Ok(Value::Integer(Integer::from_u16(f(x, y))))
    }

    pub fn and(&self, a: Value, b: Value) -> Result<Value, BasicError> {
        self.bitwise(a, b, |x, y| x & y)
    }

    pub fn or(&self, a: Value, b: Value) -> Result<Value, BasicError> {
        self.bitwise(a, b, |x, y| x | y)
    }

    pub fn xor(&self, a: Value, b: Value) -> Result<Value, BasicError> {
        self.bitwise(a, b, |x, y| x ^ y)
    }

    /// EQV: complement of XOR.
    pub fn eqv(&self, a: Value, b: Value) -> Result<Value, BasicError> {
        self.bitwise(a, b, |x, y| !(x ^ y))
    }

    /// IMP: complement of the left, OR the right.
    pub fn imp(&self, a: Value, b: Value) -> Result<Value, BasicError> {
        self.bitwise(a, b, |x, y| !x | y)
    }
}

fn flatten(e: OpError) -> BasicError {
    match e {
        OpError::Basic(e) => e,
        OpError::Float(e) => e.kind,
    }
}

/// Type check: the value must be a string.
fn pass_string(v: Value) -> Result<BasicString, BasicError> {
    match v {
        Value::String(s) => Ok(s),
        _ => Err(BasicError::TypeMismatch),
    }
}

/// Type check: the value must be numeric.
fn pass_number(v: Value) -> Result<Value, BasicError> {
    if v.is_number() {
        Ok(v)
    } else {
        Err(BasicError::TypeMismatch)
    }
}
