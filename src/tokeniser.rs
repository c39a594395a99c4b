//! Convert plain-text BASIC lines to tokenised form.
//!
//! One call scans one logical source line. The scanner never rejects
//! malformed ASCII: unknown words stay as plain identifiers, nonprinting
//! bytes become spaces and over-long line numbers split the way the dialect
//! splits them. The only errors that surface are hard math errors from
//! numeric literals (hex/oct overflow, or a float overflow while soft
//! handling is suspended).

use crate::number::{Integer, BLANKS, SEPARATORS};
use crate::token;
use crate::values::Values;
use crate::BasicError;

fn is_ws(b: u8) -> bool {
    BLANKS.contains(&b)
}

/// Peek/rewind cursor over one source line.
struct LineReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> LineReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        LineReader { buf, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    /// Up to `n` bytes ahead, fewer at end of input.
    fn peek_slice(&self, n: usize) -> &[u8] {
        &self.buf[self.pos..self.buf.len().min(self.pos + n)]
    }

    fn read(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn skip(&mut self, n: usize) {
        self.pos = self.buf.len().min(self.pos + n);
    }

    fn rewind(&mut self, n: usize) {
        self.pos -= n;
    }

    fn tell(&self) -> usize {
        self.pos
    }

    fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Consume whitespace, leaving the cursor at the next other byte.
    fn skip_ws(&mut self) {
        while self.peek().is_some_and(is_ws) {
            self.pos += 1;
        }
    }

    /// Copy bytes into `out` until end of input or a stop byte, which is
    /// left unconsumed.
    fn read_to(&mut self, stop: &[u8], out: &mut Vec<u8>) {
        while let Some(b) = self.peek() {
            if stop.contains(&b) {
                break;
            }
            out.push(b);
            self.pos += 1;
        }
    }
}

/// BASIC tokeniser.
pub struct Tokeniser<'v> {
    values: &'v mut Values,
}

impl<'v> Tokeniser<'v> {
    pub fn new(values: &'v mut Values) -> Self {
        Tokeniser { values }
    }

    /// Convert an ascii program line to tokenised form.
    pub fn tokenise_line(&mut self, line: &[u8]) -> Result<Vec<u8>, BasicError> {
        let mut ins = LineReader::new(line);
        let mut outs = Vec::new();
        ins.skip_ws();
        if ins.peek().is_none() {
            // empty line at end of input
            return Ok(outs);
        }
        tokenise_line_number(&mut ins, &mut outs);
        // expect line number
        let mut allow_jumpnum = false;
        // expect number (6553 6 -> the 6 is encoded separately)
        let mut allow_number = true;
        // inside SPC( or TAB(, numbers can follow the closing bracket
        let mut spc_or_tab = false;
        loop {
            let Some(c) = ins.peek() else { break };
            if c == b'\0' {
                // anything after NUL is ignored till the end of the line
                ins.read();
                let mut sink = Vec::new();
                ins.read_to(b"\r", &mut sink);
                break;
            } else if c == b'\r' {
                break;
            } else if is_ws(c) {
                ins.read();
                outs.push(c);
            } else if c == b'"' {
                tokenise_literal(&mut ins, &mut outs);
            } else if allow_number && allow_jumpnum && (c.is_ascii_digit() || c == b'.') {
                tokenise_jump_number(&mut ins, &mut outs);
            } else if c == b'&'
                || c == b'.'
                || (allow_number && !allow_jumpnum && c.is_ascii_digit())
            {
                // numbers right after a variable name, with no operator or
                // keyword in between, must not be parsed: OPTION BASE 1
                let tok = self.tokenise_number(&mut ins)?;
                outs.extend_from_slice(&tok);
            } else if b"+-=/\\^*<>".contains(&c) {
                // operators don't affect line number mode, so LIST 100-200
                // and RENUM arithmetic keep working
                ins.read();
                if let Some(t) = token::to_token(std::slice::from_ref(&c)) {
                    outs.extend_from_slice(t);
                }
                allow_number = true;
            } else if c == b'\'' {
                // ' -> :REM'
                ins.read();
                outs.push(b':');
                outs.push(token::REM);
                outs.push(token::O_REM);
                tokenise_rem(&mut ins, &mut outs);
            } else if c == b'?' {
                // ? -> PRINT
                ins.read();
                outs.push(token::PRINT);
                allow_number = true;
            } else if c.is_ascii_alphabetic() {
                let word = tokenise_word(&mut ins, &mut outs);
                if word == token::KW_REM || word == b"'" {
                    tokenise_rem(&mut ins, &mut outs);
                } else if word == token::KW_DATA {
                    tokenise_data(&mut ins, &mut outs);
                } else {
                    allow_jumpnum = token::is_jump_keyword(&word);
                    // numbers can follow tokenised keywords only
                    allow_number = token::is_keyword(&word);
                    if word == token::KW_SPC || word == token::KW_TAB {
                        spc_or_tab = true;
                    }
                }
            } else {
                ins.read();
                if c == b',' || c == b'#' || c == b';' {
                    // separates numbers as well as jump numbers
                    allow_number = true;
                } else if c == b'(' || c == b'[' {
                    allow_jumpnum = false;
                    allow_number = true;
                } else if c == b')' && spc_or_tab {
                    spc_or_tab = false;
                    allow_jumpnum = false;
                    allow_number = true;
                } else {
                    allow_jumpnum = false;
                    allow_number = false;
                }
                // nonprinting bytes become spaces; 0x7F is allowed
                outs.push(if (32..=127).contains(&c) { c } else { b' ' });
            }
        }
        Ok(outs)
    }

    /// Convert number text at the cursor to a literal token.
    fn tokenise_number(&mut self, ins: &mut LineReader) -> Result<Vec<u8>, BasicError> {
        match ins.peek() {
            None => Ok(Vec::new()),
            Some(b'&') => {
                ins.read();
                if ins.peek().map(|b| b.to_ascii_uppercase()) == Some(b'H') {
                    tokenise_hex(ins)
                } else {
                    tokenise_oct(ins)
                }
            }
            Some(c) if c.is_ascii_digit() || b".+-".contains(&c) => self.tokenise_dec(ins),
            Some(_) => Ok(Vec::new()),
        }
    }

    /// Decimal literal: a small state machine over point and exponent.
    fn tokenise_dec(&mut self, ins: &mut LineReader) -> Result<Vec<u8>, BasicError> {
        let mut have_exp = false;
        let mut have_point = false;
        let mut word: Vec<u8> = Vec::new();
        while let Some(raw) = ins.read() {
            let c = raw.to_ascii_uppercase();
            if c == b'.' && !have_point && !have_exp {
                have_point = true;
                word.push(c);
            } else if (c == b'E' || c == b'D') && !have_exp {
                // exception for a number followed by EL or EQ, which keeps
                // ELSE and EQV out of the exponent
                let nxt = ins.peek().map(|b| b.to_ascii_uppercase());
                if c == b'E' && matches!(nxt, Some(b'L') | Some(b'Q')) {
                    ins.rewind(1);
                    break;
                }
                have_exp = true;
                word.push(c);
            } else if (c == b'+' || c == b'-')
                && (word.is_empty() || matches!(word.last(), Some(b'E') | Some(b'D')))
            {
                // signs only lead the number or the exponent
                word.push(c);
            } else if c.is_ascii_digit() || is_ws(c) || SEPARATORS.contains(&c) {
                // blanks stay for now so the stream can rewind over them
                word.push(c);
            } else if (c == b'!' || c == b'#') && !have_exp {
                // explicit type suffix ends the number
                word.push(c);
                break;
            } else if c == b'%' {
                // swallow the integer suffix
                break;
            } else {
                ins.rewind(1);
                break;
            }
        }
        // don't claim trailing whitespace
        let kept = word
            .iter()
            .rposition(|b| !is_ws(*b))
            .map_or(0, |p| p + 1);
        ins.rewind(word.len() - kept);
        word.truncate(kept);
        word.retain(|b| !is_ws(*b));
        self.values.from_str(&word, false)?.to_token()
    }
}

fn tokenise_line_number(ins: &mut LineReader, outs: &mut Vec<u8>) {
    match tokenise_uint(ins) {
        Some(number) => {
            // a NUL leads every stored line; the next two bytes are
            // internal-use and only need to be nonzero
            outs.push(b'\0');
            outs.extend_from_slice(&[0xC0, 0xDE]);
            outs.extend_from_slice(&number.to_le_bytes());
            // eat one space after the line number, unless it is line 0
            if ins.peek() == Some(b' ') && number != 0 {
                ins.read();
            }
        }
        None => {
            // direct line; a ':' anchors the program pointer
            outs.push(b':');
        }
    }
}

fn tokenise_jump_number(ins: &mut LineReader, outs: &mut Vec<u8>) {
    match tokenise_uint(ins) {
        Some(number) => {
            outs.push(token::T_UINT);
            outs.extend_from_slice(&number.to_le_bytes());
        }
        None => {
            // a lone . refers to the current line
            if ins.peek() == Some(b'.') {
                ins.read();
                outs.push(b'.');
            }
        }
    }
}

/// Read a line or jump number of up to five digits. Stops once the value
/// passes 6552, so 65536 splits into 6553 and a separate 6 and the caller's
/// later parse reports the syntax error, as the dialect does on load.
fn tokenise_uint(ins: &mut LineReader) -> Option<u16> {
    let mut value: u32 = 0;
    let mut ndigits = 0;
    let mut nblanks = 0;
    let mut any = false;
    while ndigits < 5 {
        match ins.peek() {
            Some(c) if c.is_ascii_digit() => {
                ins.read();
                value = value * 10 + (c - b'0') as u32;
                any = true;
                nblanks = 0;
                ndigits += 1;
                if value > 6552 {
                    break;
                }
            }
            Some(c) if is_ws(c) => {
                ins.read();
                nblanks += 1;
            }
            _ => break,
        }
    }
    // don't claim trailing whitespace
    ins.rewind(nblanks);
    any.then_some(value as u16)
}

/// Keyword or identifier. Returns the upper-cased word so the caller can
/// update its scanner flags.
fn tokenise_word(ins: &mut LineReader, outs: &mut Vec<u8>) -> Vec<u8> {
    let mut word: Vec<u8> = Vec::new();
    loop {
        let Some(raw) = ins.read() else {
            outs.extend_from_slice(&word);
            break;
        };
        word.push(raw.to_ascii_uppercase());
        if word == b"GO" {
            resolve_go(ins, &mut word);
        }
        if token::is_keyword(&word) {
            // ignore if part of a longer name, except FN, SPC(, TAB(, USR
            let short_name = [token::KW_FN, token::KW_SPC, token::KW_TAB, token::KW_USR]
                .contains(&word.as_slice());
            if !short_name && ins.peek().is_some_and(token::is_name_char) {
                continue;
            }
            let Some(tok) = token::to_token(&word) else {
                break;
            };
            if word == token::KW_ELSE {
                // ELSE also separates statements
                outs.push(b':');
                outs.extend_from_slice(tok);
            } else if word == token::KW_WHILE {
                outs.extend_from_slice(tok);
                outs.push(token::O_PLUS);
            } else {
                outs.extend_from_slice(tok);
            }
            break;
        } else if !token::is_name_char(raw) {
            word.pop();
            ins.rewind(1);
            outs.extend_from_slice(&word);
            break;
        }
        // allowed names: letter then letters, digits and points
    }
    word
}

/// Multi-word GO TO and GO SUB fold into one keyword.
fn resolve_go(ins: &mut LineReader, word: &mut Vec<u8>) {
    let pos = ins.tell();
    // GO SUB allows a single space
    if ins.peek_slice(4).to_ascii_uppercase() == b" SUB" {
        *word = token::KW_GOSUB.to_vec();
        ins.skip(4);
    } else {
        // GO TO allows any amount of whitespace
        ins.skip_ws();
        if ins.peek_slice(2).to_ascii_uppercase() == b"TO" {
            ins.skip(2);
            *word = token::KW_GOTO.to_vec();
        } else {
            ins.seek(pos);
        }
    }
    if word.as_slice() == token::KW_GOTO || word.as_slice() == token::KW_GOSUB {
        // a name character right after means this was an identifier
        if ins.peek().is_some_and(token::is_name_char) {
            ins.seek(pos);
            *word = b"GO".to_vec();
        }
    }
}

/// Pass anything after REM as is till the end of the line.
fn tokenise_rem(ins: &mut LineReader, outs: &mut Vec<u8>) {
    ins.read_to(b"\r\0", outs);
}

/// Pass DATA as is till the end of the statement, except for literals.
fn tokenise_data(ins: &mut LineReader, outs: &mut Vec<u8>) {
    loop {
        ins.read_to(b"\r\0:\"", outs);
        if ins.peek() == Some(b'"') {
            tokenise_literal(ins, outs);
        } else {
            break;
        }
    }
}

/// Pass a string literal through, closing quote included when present.
fn tokenise_literal(ins: &mut LineReader, outs: &mut Vec<u8>) {
    if let Some(q) = ins.read() {
        outs.push(q);
    }
    ins.read_to(b"\r\0\"", outs);
    if ins.peek() == Some(b'"') {
        outs.push(b'"');
        ins.read();
    }
}

/// Hex literal: no whitespace allowed between the digits.
fn tokenise_hex(ins: &mut LineReader) -> Result<Vec<u8>, BasicError> {
    ins.read(); // the H of &H
    let mut word = Vec::new();
    while let Some(c) = ins.peek() {
        if c.is_ascii_hexdigit() {
            word.push(c);
            ins.read();
        } else {
            break;
        }
    }
    Ok(Integer::from_hex(&word)
        .map_err(BasicError::from)?
        .to_token_hex()
        .to_vec())
}

/// Octal literal: the O is optional and whitespace may intervene.
fn tokenise_oct(ins: &mut LineReader) -> Result<Vec<u8>, BasicError> {
    if ins.peek().map(|b| b.to_ascii_uppercase()) == Some(b'O') {
        ins.read();
    }
    let mut word = Vec::new();
    while let Some(c) = ins.peek() {
        if (b'0'..=b'7').contains(&c) || is_ws(c) {
            word.push(c);
            ins.read();
        } else {
            break;
        }
    }
    Ok(Integer::from_oct(&word)
        .map_err(BasicError::from)?
        .to_token_oct()
        .to_vec())
}
