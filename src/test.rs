use rstest::rstest;

use std::cell::RefCell;
use std::io::Cursor;
use std::rc::Rc;

use crate::number::{str_to_decimal, Double, Integer, Single};
use crate::program::{read_program, tokenise_program};
use crate::tokeniser::Tokeniser;
use crate::values::{Screen, Value, Values};
use crate::{BasicError, Sigil};

/// Captures soft-error output for assertions.
#[derive(Clone, Default)]
struct TestScreen(Rc<RefCell<Vec<String>>>);

impl Screen for TestScreen {
    fn write_line(&mut self, text: &str) {
        self.0.borrow_mut().push(text.to_string());
    }
}

fn values() -> Values {
    // no screen: every math error is hard
    Values::new(None, false)
}

fn values_with_screen() -> (Values, Rc<RefCell<Vec<String>>>) {
    let screen = TestScreen::default();
    let lines = screen.0.clone();
    (Values::new(Some(Box::new(screen)), false), lines)
}

fn tok(line: &[u8]) -> Vec<u8> {
    let mut values = values();
    Tokeniser::new(&mut values).tokenise_line(line).unwrap()
}

fn int(v: i16) -> Value {
    Value::Integer(Integer::from_i16(v))
}

fn sng(v: i64) -> Value {
    Value::Single(Single::from_int(v))
}

fn sngf(v: f64) -> Value {
    Value::Single(Single::from_value(v).unwrap())
}

fn dbl(v: i64) -> Value {
    Value::Double(Double::from_int(v))
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

///////////////////////////////////////////////////////////////////////////
// tokeniser

#[rstest]
// stored-line envelope, preserved space, string literal
#[case(b"10 PRINT \"HI\"", &[0x00, 0xC0, 0xDE, 0x0A, 0x00, 0x91, 0x20, 0x22, 0x48, 0x49, 0x22])]
// direct line, jump number after GOTO
#[case(b"GOTO 100", &[0x3A, 0x89, 0x20, 0x0E, 0x64, 0x00])]
// GO TO folds across any whitespace
#[case(b"100 GO  TO 200", &[0x00, 0xC0, 0xDE, 0x64, 0x00, 0x89, 0x20, 0x0E, 0xC8, 0x00])]
// ELSE gets a statement separator, = is a one-byte operator
#[case(b"20 IF A=1 ELSE B=2", &[0x00, 0xC0, 0xDE, 0x14, 0x00, 0x8B, 0x20, 0x41, 0xE7, 0x12, 0x20, 0x3A, 0xA1, 0x20, 0x42, 0xE7, 0x13])]
// line number zero keeps its trailing space
#[case(b"0 REM HI", &[0x00, 0xC0, 0xDE, 0x00, 0x00, 0x20, 0x8F, 0x20, 0x48, 0x49])]
// any other line number eats one space
#[case(b"1 REM HI", &[0x00, 0xC0, 0xDE, 0x01, 0x00, 0x8F, 0x20, 0x48, 0x49])]
// 65536 splits into line 6553 and a literal 6
#[case(b"65536", &[0x00, 0xC0, 0xDE, 0x99, 0x19, 0x17])]
// blanks inside the line number are skipped
#[case(b"1 0 PRINT", &[0x00, 0xC0, 0xDE, 0x0A, 0x00, 0x91])]
// ? expands to PRINT and re-enables numbers
#[case(b"?2", &[0x3A, 0x91, 0x13])]
// ' expands to :REM'
#[case(b"'hi", &[0x3A, 0x3A, 0x8F, 0xD9, 0x68, 0x69])]
// a lone . after a jump keyword refers to the current line
#[case(b"GOTO .", &[0x3A, 0x89, 0x20, 0x2E])]
// GO SUB folds across a single space
#[case(b"GO SUB 10", &[0x3A, 0x8D, 0x20, 0x0E, 0x0A, 0x00])]
// two spaces keep GO and SUB as identifiers
#[case(b"GO  SUB 10", &[0x3A, 0x47, 0x4F, 0x20, 0x53, 0x55, 0x42, 0x20, 0x31, 0x30])]
// keyword folded into a longer name stays an identifier
#[case(b"printx", &[0x3A, 0x50, 0x52, 0x49, 0x4E, 0x54, 0x58])]
// FN is never extended into a name
#[case(b"FNx", &[0x3A, 0xD1, 0x58])]
// hex literal
#[case(b"A=&H0D0A", &[0x3A, 0x41, 0xE7, 0x0C, 0x0A, 0x0D])]
// octal literal without the O
#[case(b"A=&777", &[0x3A, 0x41, 0xE7, 0x0B, 0xFF, 0x01])]
// numbers may follow the closing bracket of SPC(
#[case(b"PRINT SPC(5)2", &[0x3A, 0x91, 0x20, 0xD2, 0x16, 0x29, 0x13])]
// numbers after a plain variable name are not parsed
#[case(b"OPTION BASE 1", &[0x3A, 0xB8, 0x20, 0x42, 0x41, 0x53, 0x45, 0x20, 0x31])]
// operators keep jump-number mode alive for LIST ranges
#[case(b"LIST 100-200", &[0x3A, 0x93, 0x20, 0x0E, 0x64, 0x00, 0xEA, 0x0E, 0xC8, 0x00])]
// a byte literal whose payload is the line terminator
#[case(b"10 X=13", &[0x00, 0xC0, 0xDE, 0x0A, 0x00, 0x58, 0xE7, 0x0F, 0x0D])]
// WHILE carries the loop marker
#[case(b"WHILE A", &[0x3A, 0xB1, 0xE9, 0x20, 0x41])]
// everything after NUL is dropped
#[case(b"10 PRINT\x00junk", &[0x00, 0xC0, 0xDE, 0x0A, 0x00, 0x91])]
// nonprinting bytes become spaces
#[case(b"A\x01B", &[0x3A, 0x41, 0x20, 0x42])]
// unterminated literal runs to the end of the line
#[case(b"\"AB", &[0x3A, 0x22, 0x41, 0x42])]
// blanks inside a decimal literal are stripped
#[case(b"A=1 2", &[0x3A, 0x41, 0xE7, 0x0F, 0x0C])]
// leading point parses as a number
#[case(b"A=.5", &[0x3A, 0x41, 0xE7, 0x1D, 0x00, 0x00, 0x00, 0x80])]
// an integer literal past 32767 becomes a single
#[case(b"A=32768", &[0x3A, 0x41, 0xE7, 0x1D, 0x00, 0x00, 0x00, 0x90])]
// 1ELSE must not eat the E as an exponent
#[case(b"A=1ELSE", &[0x3A, 0x41, 0xE7, 0x12, 0x3A, 0xA1])]
// type suffix makes a double
#[case(b"A=1.5#", &[0x3A, 0x41, 0xE7, 0x1F, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x40, 0x81])]
// the % suffix is swallowed
#[case(b"A=12%", &[0x3A, 0x41, 0xE7, 0x0F, 0x0C])]
// lower-case literals keep their case, names are upper-cased
#[case(b"10 a$=\"x\"", &[0x00, 0xC0, 0xDE, 0x0A, 0x00, 0x41, 0x24, 0xE7, 0x22, 0x78, 0x22])]
// a line of only a line number
#[case(b"0", &[0x00, 0xC0, 0xDE, 0x00, 0x00])]
// carriage return ends the direct line
#[case(b"\r", &[0x3A])]
fn tokenise_line_cases(#[case] line: &[u8], #[case] expected: &[u8]) {
    assert_eq!(tok(line), expected, "line {:?}", String::from_utf8_lossy(line));
}

#[test]
fn tokenise_empty_line() {
    assert!(tok(b"").is_empty());
    assert!(tok(b"   ").is_empty());
}

#[test]
fn tokenise_data_line() {
    let out = tok(b"30 DATA 1, \"a,b\", 2:PRINT");
    insta::assert_snapshot!(
        hex(&out),
        @"00 c0 de 1e 00 84 20 31 2c 20 22 61 2c 62 22 2c 20 32 3a 91"
    );
}

#[test]
fn tokenise_hex_overflow_is_hard() {
    let mut values = values();
    let err = Tokeniser::new(&mut values)
        .tokenise_line(b"A=&H10000")
        .unwrap_err();
    assert_eq!(err, BasicError::Overflow);
}

#[test]
fn tokenise_float_overflow_is_soft_with_screen() {
    let (mut values, lines) = values_with_screen();
    let out = Tokeniser::new(&mut values).tokenise_line(b"A=1E39").unwrap();
    // saturates to the largest single
    let mut expected = vec![0x3A, 0x41, 0xE7, 0x1D];
    expected.extend_from_slice(&Single::POS_MAX.to_bytes());
    assert_eq!(out, expected);
    assert_eq!(lines.borrow().as_slice(), ["Overflow"]);
}

///////////////////////////////////////////////////////////////////////////
// from_str / to_str

#[rstest]
#[case(b"", Sigil::Integer)]
#[case(b"1", Sigil::Integer)]
#[case(b"32767", Sigil::Integer)]
#[case(b"32768", Sigil::Single)]
#[case(b"1.5", Sigil::Single)]
#[case(b"1E3", Sigil::Single)]
#[case(b"12345678", Sigil::Double)]
#[case(b"1D2", Sigil::Double)]
#[case(b"1.5#", Sigil::Double)]
#[case(b"100!", Sigil::Single)]
#[case(b"&H10", Sigil::Integer)]
#[case(b"  1", Sigil::Integer)]
fn from_str_picks_the_kind(#[case] word: &[u8], #[case] sigil: Sigil) {
    let v = values().from_str(word, false).unwrap();
    assert_eq!(v.sigil(), sigil);
}

#[test]
fn from_str_values() {
    let mut values = values();
    assert_eq!(values.from_str(b"", false).unwrap(), int(0));
    assert_eq!(values.from_str(b"-123", false).unwrap(), int(-123));
    assert_eq!(values.from_str(b"&H10", false).unwrap(), int(16));
    assert_eq!(values.from_str(b"&O10", false).unwrap(), int(8));
    assert_eq!(values.from_str(b"&10", false).unwrap(), int(8));
    assert_eq!(values.from_str(b"32768", false).unwrap(), sng(32768));
    assert_eq!(values.from_str(b"1d2", false).unwrap(), dbl(100));
    let v = values.from_str(b"1.5", false).unwrap();
    assert_eq!(values.to_value(v).unwrap(), 1.5);
}

#[test]
fn from_str_overflow_without_screen_is_hard() {
    let err = values().from_str(b"1E39", false).unwrap_err();
    assert_eq!(err, BasicError::Overflow);
}

#[rstest]
#[case(int(5), true, false, " 5")]
#[case(int(-5), true, false, "-5")]
#[case(int(0), false, false, "0")]
#[case(sngf(0.5), false, false, ".5")]
#[case(sngf(-0.5), true, false, "-.5")]
#[case(sng(10_000_000), false, false, "1E+07")]
#[case(sng(1_000_000), false, false, "1000000")]
#[case(sng(1000), false, true, "1000!")]
#[case(sngf(1.5), false, true, "1.5")]
#[case(dbl(100), false, true, "100#")]
#[case(sng(0), true, false, " 0")]
fn to_str_formats(
    #[case] v: Value,
    #[case] leading_space: bool,
    #[case] type_sign: bool,
    #[case] expected: &str,
) {
    assert_eq!(values().to_str(v, leading_space, type_sign).unwrap(), expected);
}

#[test]
fn to_str_of_division_results() {
    let mut values = values();
    let third = values.div(int(1), int(3)).unwrap();
    assert_eq!(values.to_str(third, false, false).unwrap(), ".3333333");
    let small = values.div(int(2), int(30)).unwrap();
    assert_eq!(values.to_str(small, false, false).unwrap(), "6.666667E-02");
}

#[test]
fn to_str_of_string_is_type_mismatch() {
    let mut values = values();
    let s = values.alloc_string(b"X").unwrap();
    assert_eq!(values.to_str(s, true, false), Err(BasicError::TypeMismatch));
}

#[rstest]
#[case(b"1")]
#[case(b"255")]
#[case(b"32767")]
#[case(b"32768")]
#[case(b".5")]
#[case(b"1.5")]
#[case(b"1E3")]
#[case(b"6.666667E-02")]
#[case(b"12345678")]
#[case(b"1D2")]
#[case(b"100000")]
#[case(b".1")]
fn numeric_text_round_trips(#[case] word: &[u8]) {
    let mut values = values();
    let v = values.from_str(word, false).unwrap();
    let text = values.to_str(v, true, false).unwrap();
    let back = values.from_str(text.as_bytes(), false).unwrap();
    // value equality: 1D2 prints as " 100", which re-reads as an Integer
    assert_eq!(
        values.eq(v, back).unwrap(),
        int(-1),
        "{:?} -> {text:?}",
        String::from_utf8_lossy(word)
    );
}

///////////////////////////////////////////////////////////////////////////
// arithmetic and promotion

#[test]
fn integer_addition_promotes_to_single() {
    let mut values = values();
    assert_eq!(values.add(int(30000), int(30000)).unwrap(), sng(60000));
    assert_eq!(values.add(int(-32768), int(-1)).unwrap(), sng(-32769));
    assert_eq!(values.sub(int(5), int(7)).unwrap(), sng(-2));
}

#[test]
fn double_operands_force_double_kernels() {
    let mut values = values();
    let r = values.mul(dbl(3), int(4)).unwrap();
    assert_eq!(r, dbl(12));
    let r = values.div(dbl(1), int(2)).unwrap();
    assert_eq!(r.sigil(), Sigil::Double);
    assert_eq!(values.to_value(r).unwrap(), 0.5);
}

#[test]
fn string_concatenation() {
    let mut values = values();
    let a = values.alloc_string(b"FOO").unwrap();
    let b = values.alloc_string(b"BAR").unwrap();
    let c = values.add(a, b).unwrap();
    let Value::String(s) = c else { panic!() };
    assert_eq!(values.heap().view(s).unwrap(), b"FOOBAR");
    assert_eq!(values.add(a, int(1)), Err(BasicError::TypeMismatch));
    assert_eq!(values.sub(a, b), Err(BasicError::TypeMismatch));
}

#[test]
fn integer_division_and_modulo() {
    let mut values = values();
    assert_eq!(values.intdiv(int(7), int(2)).unwrap(), int(3));
    assert_eq!(values.intdiv(int(-7), int(2)).unwrap(), int(-3));
    assert_eq!(values.modulo(int(7), int(3)).unwrap(), int(1));
    assert_eq!(values.modulo(int(-7), int(3)).unwrap(), int(-1));
    // coercion rounds floats first
    assert_eq!(values.intdiv(sngf(7.6), int(2)).unwrap(), int(4));
}

#[test]
fn integer_math_errors_are_always_hard() {
    let (mut values, lines) = values_with_screen();
    assert_eq!(values.intdiv(int(1), int(0)), Err(BasicError::DivisionByZero));
    assert_eq!(values.modulo(int(1), int(0)), Err(BasicError::DivisionByZero));
    assert_eq!(
        values.intdiv(sng(-32768), int(-1)),
        Err(BasicError::Overflow)
    );
    assert!(lines.borrow().is_empty());
}

#[test]
fn float_division_by_zero_is_soft_with_screen() {
    let (mut values, lines) = values_with_screen();
    let r = values.div(int(1), int(0)).unwrap();
    assert_eq!(r, Value::Single(Single::POS_MAX));
    assert_eq!(lines.borrow().as_slice(), ["Division by zero"]);
}

#[test]
fn overflow_saturates_and_prints() {
    let (mut values, lines) = values_with_screen();
    let big = values.from_str(b"1E30", false).unwrap();
    let r = values.mul(big, big).unwrap();
    assert_eq!(r, Value::Single(Single::POS_MAX));
    assert_eq!(lines.borrow().as_slice(), ["Overflow"]);
}

#[test]
fn paused_handling_makes_soft_errors_hard() {
    let (mut values, lines) = values_with_screen();
    values.pause_error_handling(true);
    let big = values.from_str(b"1E30", false).unwrap();
    assert_eq!(values.mul(big, big), Err(BasicError::Overflow));
    assert!(lines.borrow().is_empty());
}

#[test]
fn power_with_integer_exponent() {
    let mut values = values();
    assert_eq!(values.pow(int(2), int(10)).unwrap(), sng(1024));
    assert_eq!(values.pow(int(5), int(0)).unwrap(), sng(1));
    let r = values.pow(int(2), int(-1)).unwrap();
    assert_eq!(values.to_value(r).unwrap(), 0.5);
    assert_eq!(values.pow(int(0), int(-1)), Err(BasicError::DivisionByZero));
}

#[test]
fn power_with_float_exponent() {
    let mut values = values();
    let r = values.pow(int(2), sngf(0.5)).unwrap();
    assert_eq!(r.sigil(), Sigil::Single);
    assert!((values.to_value(r).unwrap() - 2f64.sqrt()).abs() < 1e-6);
}

#[rstest]
#[case(false, Sigil::Single)]
#[case(true, Sigil::Double)]
fn power_promotion_follows_double_math(#[case] double_math: bool, #[case] sigil: Sigil) {
    let mut values = Values::new(None, double_math);
    let r = values.pow(dbl(2), int(3)).unwrap();
    assert_eq!(r.sigil(), sigil);
    assert_eq!(values.to_value(r).unwrap(), 8.0);
}

///////////////////////////////////////////////////////////////////////////
// unary operators and host math

#[test]
fn unary_operators() {
    let mut values = values();
    // Integer promotes to Single so ABS(-32768) cannot overflow
    assert_eq!(values.abs(int(-32768)).unwrap(), sng(32768));
    assert_eq!(values.neg(int(5)).unwrap(), sng(-5));
    assert_eq!(values.sgn(sngf(-3.5)).unwrap(), int(-1));
    assert_eq!(values.sgn(int(0)).unwrap(), int(0));
    assert_eq!(values.int(sngf(-2.5)).unwrap(), sng(-3));
    assert_eq!(values.fix(sngf(-2.5)).unwrap(), sng(-2));
    assert_eq!(values.int(sngf(2.5)).unwrap(), sng(2));
    assert_eq!(values.int(int(7)).unwrap(), int(7));
    // strings pass through ABS and negation unchanged
    let s = values.alloc_string(b"S").unwrap();
    assert_eq!(values.abs(s).unwrap(), s);
    assert_eq!(values.neg(s).unwrap(), s);
    assert_eq!(values.sgn(s), Err(BasicError::TypeMismatch));
}

#[test]
fn rounding_to_integer_is_half_even() {
    let mut values = values();
    assert_eq!(values.cint(sngf(2.5)).unwrap().to_int(), 2);
    assert_eq!(values.cint(sngf(3.5)).unwrap().to_int(), 4);
    assert_eq!(values.cint(sngf(-2.5)).unwrap().to_int(), -2);
    assert_eq!(values.cint(sngf(40000.0)), Err(BasicError::Overflow));
    assert_eq!(values.round(sngf(2.5)).unwrap(), sng(2));
    assert_eq!(values.round(int(7)).unwrap(), sng(7));
}

#[test]
fn host_math_functions() {
    let mut values = values();
    assert_eq!(values.sqr(int(4)).unwrap(), sng(2));
    assert_eq!(values.exp(int(0)).unwrap(), sng(1));
    assert_eq!(values.atn(int(0)).unwrap(), sng(0));
    let r = values.sin(int(0)).unwrap();
    assert_eq!(values.to_value(r).unwrap(), 0.0);
    let r = values.cos(int(0)).unwrap();
    assert_eq!(values.to_value(r).unwrap(), 1.0);
    let r = values.log(int(1)).unwrap();
    assert_eq!(values.to_value(r).unwrap(), 0.0);
    let r = values.tan(int(0)).unwrap();
    assert_eq!(values.to_value(r).unwrap(), 0.0);
}

#[test]
fn domain_errors_are_hard_even_with_a_screen() {
    let (mut values, lines) = values_with_screen();
    assert_eq!(values.sqr(int(-1)), Err(BasicError::IllegalFunctionCall));
    assert_eq!(values.log(int(0)), Err(BasicError::IllegalFunctionCall));
    assert!(lines.borrow().is_empty());
}

#[rstest]
#[case(false, Sigil::Single)]
#[case(true, Sigil::Double)]
fn transcendentals_follow_double_math(#[case] double_math: bool, #[case] sigil: Sigil) {
    let mut values = Values::new(None, double_math);
    let r = values.sqr(dbl(4)).unwrap();
    assert_eq!(r.sigil(), sigil);
    assert_eq!(values.to_value(r).unwrap(), 2.0);
}

///////////////////////////////////////////////////////////////////////////
// comparisons

#[test]
fn comparisons_return_basic_booleans() {
    let mut values = values();
    assert_eq!(values.eq(int(1), sng(1)).unwrap(), int(-1));
    assert_eq!(values.eq(int(1), int(2)).unwrap(), int(0));
    assert_eq!(values.neq(int(1), int(2)).unwrap(), int(-1));
    assert_eq!(values.gt(sngf(1.5), int(1)).unwrap(), int(-1));
    assert_eq!(values.gte(int(1), int(1)).unwrap(), int(-1));
    assert_eq!(values.lt(int(-1), int(0)).unwrap(), int(-1));
    assert_eq!(values.lte(int(1), int(0)).unwrap(), int(0));
    let a = values.alloc_string(b"A").unwrap();
    let ab = values.alloc_string(b"AB").unwrap();
    let b = values.alloc_string(b"B").unwrap();
    assert_eq!(values.gt(b, a).unwrap(), int(-1));
    assert_eq!(values.gt(ab, a).unwrap(), int(-1));
    assert_eq!(values.eq(a, a).unwrap(), int(-1));
    assert_eq!(values.eq(a, int(1)), Err(BasicError::TypeMismatch));
}

///////////////////////////////////////////////////////////////////////////
// bitwise operators

#[test]
fn bitwise_operators_are_unsigned_16_bit() {
    let values = values();
    for n in [-32768i16, -1, 0, 1, 1234, 32767] {
        let v = int(n);
        assert_eq!(values.not(values.not(v).unwrap()).unwrap(), v);
        assert_eq!(values.and(v, v).unwrap(), v);
        assert_eq!(values.or(v, v).unwrap(), v);
        assert_eq!(values.xor(v, v).unwrap(), int(0));
    }
    assert_eq!(values.from_bool(true), int(-1));
    assert_eq!(values.from_bool(false), int(0));
    assert_eq!(values.eqv(int(0), int(0)).unwrap(), int(-1));
    assert_eq!(values.imp(int(-1), int(0)).unwrap(), int(0));
    assert_eq!(values.imp(int(0), int(0)).unwrap(), int(-1));
    assert_eq!(values.and(int(-1), int(0x0F0F)).unwrap(), int(0x0F0F));
}

///////////////////////////////////////////////////////////////////////////
// intrinsics

#[test]
fn binary_representation_round_trips() {
    let mut values = values();
    let i = int(0x1234);
    let packed = values.mki(i).unwrap();
    assert_eq!(values.cvi(packed).unwrap(), i);
    let s = sngf(1.5);
    let packed = values.mks(s).unwrap();
    assert_eq!(values.cvs(packed).unwrap(), s);
    let d = dbl(-3);
    let packed = values.mkd(d).unwrap();
    assert_eq!(values.cvd(packed).unwrap(), d);
    // too short
    let short = values.alloc_string(b"A").unwrap();
    assert_eq!(values.cvi(short), Err(BasicError::IllegalFunctionCall));
}

#[test]
fn string_intrinsics() {
    let mut values = values();
    let s = values.alloc_string(b"HELLO").unwrap();
    assert_eq!(values.len(s).unwrap(), int(5));
    assert_eq!(values.asc(s).unwrap(), int(72));
    let empty = values.alloc_string(b"").unwrap();
    assert_eq!(values.asc(empty), Err(BasicError::IllegalFunctionCall));
    let Value::String(sp) = values.space(int(3)).unwrap() else {
        panic!()
    };
    assert_eq!(values.heap().view(sp).unwrap(), b"   ");
    assert_eq!(values.space(int(-1)), Err(BasicError::IllegalFunctionCall));
}

#[test]
fn character_is_range_checked() {
    let mut values = values();
    let Value::String(a) = values.character(int(65)).unwrap() else {
        panic!()
    };
    assert_eq!(values.heap().view(a).unwrap(), b"A");
    assert_eq!(values.character(int(256)), Err(BasicError::IllegalFunctionCall));
    assert_eq!(values.character(int(-1)), Err(BasicError::IllegalFunctionCall));
}

#[test]
fn hex_and_oct_take_unsigned_arguments() {
    let mut values = values();
    for (v, expected) in [
        (int(-1), "FFFF"),
        (int(255), "FF"),
        (sngf(40000.0), "9C40"),
    ] {
        let Value::String(s) = values.hexadecimal(v).unwrap() else {
            panic!()
        };
        assert_eq!(values.heap().view(s).unwrap(), expected.as_bytes());
    }
    let Value::String(s) = values.octal(int(-1)).unwrap() else { panic!() };
    assert_eq!(values.heap().view(s).unwrap(), b"177777");
    assert_eq!(values.hexadecimal(sngf(70000.0)), Err(BasicError::Overflow));
}

#[test]
fn val_and_representation() {
    let mut values = values();
    let s = values.alloc_string(b"8 9").unwrap();
    assert_eq!(values.val(s).unwrap(), int(89));
    let s = values.alloc_string(b" 64").unwrap();
    assert_eq!(values.val(s).unwrap(), int(64));
    let s = values.alloc_string(b"ABC").unwrap();
    let val_s = values.val(s).unwrap();
    assert_eq!(values.to_int(val_s).unwrap(), 0);
    let Value::String(r) = values.representation(int(-1)).unwrap() else {
        panic!()
    };
    assert_eq!(values.heap().view(r).unwrap(), b"-1");
    let Value::String(r) = values.representation(int(1)).unwrap() else {
        panic!()
    };
    assert_eq!(values.heap().view(r).unwrap(), b" 1");
}

///////////////////////////////////////////////////////////////////////////
// byte and token representations

#[test]
fn create_dispatches_on_length() {
    let values = values();
    assert_eq!(values.create(&[1, 0]).unwrap(), int(1));
    assert_eq!(values.create(&[0, 0, 0, 0x81]).unwrap(), sng(1));
    assert_eq!(values.create(&[0; 8]).unwrap().sigil(), Sigil::Double);
    assert_eq!(values.create(&[0; 3]).unwrap().sigil(), Sigil::String);
    assert_eq!(values.create(&[0; 5]), Err(BasicError::Internal));
    assert_eq!(values.null(Sigil::Double).size(), 8);
}

#[rstest]
#[case(0)]
#[case(5)]
#[case(10)]
#[case(11)]
#[case(255)]
#[case(256)]
#[case(-1)]
#[case(32767)]
fn integer_tokens_round_trip(#[case] n: i16) {
    let values = values();
    let tok = int(n).to_token().unwrap();
    assert_eq!(values.from_token(&tok).unwrap(), int(n));
}

#[test]
fn token_forms() {
    let values = values();
    assert_eq!(int(6).to_token().unwrap(), [0x17]);
    assert_eq!(int(13).to_token().unwrap(), [0x0F, 0x0D]);
    assert_eq!(int(256).to_token().unwrap(), [0x1C, 0x00, 0x01]);
    assert_eq!(sng(1).to_token().unwrap(), [0x1D, 0x00, 0x00, 0x00, 0x81]);
    let tok = values.from_token(&[0x1D, 0, 0, 0, 0x90]).unwrap();
    assert_eq!(tok, sng(32768));
    // jump references are not literal tokens
    assert_eq!(
        values.from_token(&[0x0E, 0x0A, 0x00]),
        Err(BasicError::Internal)
    );
    assert_eq!(
        Integer::from_token(&[0x0E, 0x0A, 0x00]),
        Err(BasicError::Internal)
    );
    assert_eq!(values.from_token(&[0x91]), Err(BasicError::Internal));
}

#[test]
fn mbf_byte_layouts() {
    assert_eq!(Single::from_int(1).to_bytes(), [0, 0, 0, 0x81]);
    assert_eq!(Single::from_int(10).to_bytes(), [0, 0, 0x20, 0x84]);
    assert_eq!(Single::from_int(100).to_bytes(), [0, 0, 0x48, 0x87]);
    assert_eq!(Single::from_int(-1).to_bytes(), [0, 0, 0x80, 0x81]);
    assert_eq!(Double::from_int(1).to_bytes(), [0, 0, 0, 0, 0, 0, 0, 0x81]);
    assert_eq!(Single::default().to_bytes(), [0, 0, 0, 0]);
    // largest representable magnitude
    assert!((Single::POS_MAX.to_value() - 1.7014118e38).abs() < 1e31);
}

#[test]
fn integer_kernels_range_check() {
    assert_eq!(Integer::from_int(-32768).unwrap().to_int(), -32768);
    assert!(Integer::from_int(32768).is_err());
    assert_eq!(Integer::from_int_unsigned(0xFFFF).unwrap().to_int(), -1);
    assert!(Integer::from_int_unsigned(-1).is_err());
    assert_eq!(
        Integer::from_i16(3).add(Integer::from_i16(4)).unwrap(),
        Integer::from_i16(7)
    );
    assert!(Integer::from_i16(32767).add(Integer::from_i16(1)).is_err());
    assert!(Integer::from_i16(-32768).abs().is_err());
    assert!(Integer::from_i16(-32768).neg().is_err());
    assert_eq!(Integer::from_i16(-5).abs().unwrap().to_int(), 5);
    assert_eq!(Integer::from_i16(-5).sign(), -1);
}

#[test]
fn sigils_and_sizes() {
    assert_eq!(Sigil::from_byte(b'%'), Some(Sigil::Integer));
    assert_eq!(Sigil::from_byte(b'$'), Some(Sigil::String));
    assert_eq!(Sigil::from_byte(b'?'), None);
    assert_eq!(Sigil::Single.byte(), b'!');
    for sigil in [Sigil::Integer, Sigil::Single, Sigil::Double, Sigil::String] {
        assert_eq!(Sigil::from_size(sigil.size()), Some(sigil));
        assert_eq!(values().null(sigil).sigil(), sigil);
    }
    assert_eq!(Sigil::from_size(5), None);
    let values = values();
    assert_eq!(values.new_integer(), int(0));
    assert_eq!(values.new_single(), sng(0));
    assert_eq!(values.new_double().sigil(), Sigil::Double);
    assert_eq!(values.new_string().sigil(), Sigil::String);
}

#[test]
fn host_value_bridge() {
    let mut values = values();
    assert_eq!(values.from_value(1.5, Sigil::Single).unwrap(), sngf(1.5));
    assert_eq!(values.from_value(2.5, Sigil::Integer).unwrap(), int(2));
    assert_eq!(values.from_value(8.0, Sigil::Double).unwrap(), dbl(8));
    assert_eq!(
        values.from_value(1e6, Sigil::Integer),
        Err(BasicError::Overflow)
    );
    assert_eq!(
        values.from_value(1.0, Sigil::String),
        Err(BasicError::TypeMismatch)
    );
    let s = values.alloc_string(b"X").unwrap();
    assert_eq!(values.to_value(s), Err(BasicError::TypeMismatch));
}

#[test]
fn to_type_coerces_by_sigil() {
    let mut values = values();
    assert_eq!(values.to_type(Sigil::Integer, sngf(2.5)).unwrap(), int(2));
    assert_eq!(values.to_type(Sigil::Single, int(3)).unwrap(), sng(3));
    assert_eq!(values.to_type(Sigil::Double, int(3)).unwrap(), dbl(3));
    let s = values.alloc_string(b"S").unwrap();
    assert_eq!(values.to_type(Sigil::String, s).unwrap(), s);
    assert_eq!(
        values.to_type(Sigil::Integer, s),
        Err(BasicError::TypeMismatch)
    );
    assert_eq!(values.to_type(Sigil::String, int(1)), Err(BasicError::TypeMismatch));
}

#[test]
fn typed_from_str_keeps_strings() {
    let mut values = values();
    let v = values
        .from_str_typed(b"hello", true, Some(Sigil::String))
        .unwrap();
    let Value::String(s) = v else { panic!() };
    assert_eq!(values.heap().view(s).unwrap(), b"hello");
    let v = values.from_str_typed(b"12", false, Some(Sigil::Integer)).unwrap();
    assert_eq!(v, int(12));
}

#[test]
fn strings_can_be_stored_at_an_address() {
    let mut values = values();
    let v = values.from_str_at(b"AB", 0x10).unwrap();
    let Value::String(s) = v else { panic!() };
    assert_eq!(s.address(), 0x10);
    assert_eq!(s.len(), 2);
    assert_eq!(values.heap().view(s).unwrap(), b"AB");
}

#[test]
fn value_bytes_round_trip() {
    let values = values();
    for v in [int(-2), sngf(1.5), dbl(7), values.from_bool(true)] {
        let bytes = v.to_bytes();
        assert_eq!(bytes.len(), v.size());
        assert_eq!(values.from_bytes(&bytes).unwrap(), v);
    }
}

#[test]
fn integer_hex_and_oct_parsing() {
    assert_eq!(Integer::from_hex(b"FF").unwrap().to_int(), 255);
    assert_eq!(Integer::from_hex(b"ffff").unwrap().to_int(), -1);
    assert_eq!(Integer::from_hex(b"").unwrap().to_int(), 0);
    assert!(Integer::from_hex(b"10000").is_err());
    assert_eq!(Integer::from_oct(b"7 7").unwrap().to_int(), 63);
    assert_eq!(Integer::from_oct(b"177777").unwrap().to_int(), -1);
}

#[test]
fn decimal_text_scanning() {
    let d = str_to_decimal(b"1.5", false).unwrap();
    assert_eq!((d.is_double, d.mantissa, d.exp10), (false, 15, -1));
    let d = str_to_decimal(b"-2E3", false).unwrap();
    assert_eq!((d.is_double, d.mantissa, d.exp10), (false, -2, 3));
    let d = str_to_decimal(b"1E-3", false).unwrap();
    assert_eq!(d.exp10, -3);
    // eight significant digits promote to double
    assert!(str_to_decimal(b"12345678", false).unwrap().is_double);
    // unless trailing zeros after the point carry the count
    assert!(!str_to_decimal(b"0.10000000", false).unwrap().is_double);
    // a ! suffix pins single
    assert!(!str_to_decimal(b"12345678!", false).unwrap().is_double);
    // ASCII separators mean zero
    let d = str_to_decimal(b"1\x1C2", true).unwrap();
    assert_eq!((d.mantissa, d.exp10), (0, 0));
    assert!(str_to_decimal(b"12X", false).is_err());
    assert_eq!(str_to_decimal(b"12X", true).unwrap().mantissa, 12);
}

#[test]
fn float_rounding_kernels() {
    assert_eq!(Single::from_value(2.5).unwrap().round(), Single::from_int(2));
    assert_eq!(Single::from_value(3.5).unwrap().round(), Single::from_int(4));
    assert_eq!(Single::from_value(-2.5).unwrap().to_int(), -2);
    assert_eq!(Single::from_value(-2.5).unwrap().floor(), Single::from_int(-3));
    assert_eq!(Single::from_value(-2.5).unwrap().trunc(), Single::from_int(-2));
    assert_eq!(Double::from_int(2).to_single().unwrap(), Single::from_int(2));
    assert!(Double::POS_MAX.to_single().is_err());
}

///////////////////////////////////////////////////////////////////////////
// program streams

#[test]
fn program_stream_round_trips() {
    let mut values = values();
    let text = b"10 PRINT \"HI\"\r\n20 X=13\r\n30 GOTO 10";
    let bytes = tokenise_program(&mut values, Cursor::new(&text[..])).unwrap();
    insta::assert_snapshot!(
        hex(&bytes),
        @"00 c0 de 0a 00 91 20 22 48 49 22 0d 00 c0 de 14 00 58 e7 0f 0d 0d 00 c0 de 1e 00 89 20 0e 0a 00 0d"
    );
    let lines = read_program(Cursor::new(&bytes[..])).unwrap();
    assert_eq!(
        lines.iter().map(|l| l.number).collect::<Vec<_>>(),
        [10, 20, 30]
    );
    // the 0x0D payload byte of 13 must not split the line
    assert_eq!(lines[1].body, [0x58, 0xE7, 0x0F, 0x0D]);
    assert_eq!(lines[2].body, [0x89, 0x20, 0x0E, 0x0A, 0x00]);
}

#[test]
fn program_text_splits_on_carriage_returns_only() {
    let mut values = values();
    // bare-CR line endings, no line feed anywhere
    let text = b"10 PRINT 1\r20 PRINT 2\r";
    let bytes = tokenise_program(&mut values, Cursor::new(&text[..])).unwrap();
    let lines = read_program(Cursor::new(&bytes[..])).unwrap();
    assert_eq!(lines.iter().map(|l| l.number).collect::<Vec<_>>(), [10, 20]);
    assert_eq!(lines[0].body, [0x91, 0x20, 0x12]);
    assert_eq!(lines[1].body, [0x91, 0x20, 0x13]);
}

#[test]
fn unterminated_literal_stops_at_the_line_end() {
    let mut values = values();
    // line 10 carries a literal with no closing quote
    let text = b"10 PRINT \"HI\r20 PRINT 1";
    let bytes = tokenise_program(&mut values, Cursor::new(&text[..])).unwrap();
    let lines = read_program(Cursor::new(&bytes[..])).unwrap();
    assert_eq!(lines.iter().map(|l| l.number).collect::<Vec<_>>(), [10, 20]);
    assert_eq!(lines[0].body, [0x91, 0x20, 0x22, 0x48, 0x49]);
    assert_eq!(lines[1].body, [0x91, 0x20, 0x12]);
}

#[test]
fn program_text_rejects_direct_lines() {
    let mut values = values();
    let text = b"PRINT 1\n";
    assert!(tokenise_program(&mut values, Cursor::new(&text[..])).is_err());
}

#[test]
fn truncated_program_stream_errors() {
    assert!(read_program(Cursor::new(&[0x00, 0xC0][..])).is_err());
    assert!(read_program(Cursor::new(&[0x01][..])).is_err());
    // a line with no terminator
    assert!(read_program(Cursor::new(&[0x00, 0xC0, 0xDE, 0x0A, 0x00, 0x91][..])).is_err());
}
