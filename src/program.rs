//! Tokenised program streams.
//!
//! A stored program file concatenates tokenised lines, each led by the
//! 5-byte envelope (NUL, two internal-use bytes, the little-endian line
//! number) and terminated by a carriage return. Splitting a stream back
//! into lines must skip numeric token payloads and quoted literal regions,
//! whose raw bytes may contain 0x0D.

use std::io::{BufRead, Read};

use anyhow::{anyhow, bail, ensure, Context, Result};

use crate::token;
use crate::tokeniser::Tokeniser;
use crate::values::Values;

/// One stored program line, envelope stripped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenisedLine {
    pub number: u16,
    pub body: Vec<u8>,
}

/// Tokenise an ASCII listing into a program stream.
///
/// Source lines end at `\r` or end of stream; a line feed is ordinary
/// whitespace, which the tokeniser skips or copies like any blank. Every
/// line of a program file must carry a line number; direct-mode lines are
/// rejected.
pub fn tokenise_program<R: BufRead>(values: &mut Values, mut input: R) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut raw = Vec::new();
    loop {
        raw.clear();
        let n = input.read_until(b'\r', &mut raw)?;
        if n == 0 {
            break;
        }
        if raw.last() == Some(&b'\r') {
            raw.pop();
        }
        let tokenised = Tokeniser::new(values)
            .tokenise_line(&raw)
            .map_err(|e| anyhow!("{e}"))?;
        if tokenised.is_empty() {
            continue;
        }
        ensure!(
            tokenised[0] == 0,
            "direct line in program text: {:?}",
            String::from_utf8_lossy(&raw)
        );
        out.extend_from_slice(&tokenised);
        out.push(b'\r');
    }
    Ok(out)
}

/// Split a tokenised program stream into its lines.
pub fn read_program<R: Read>(mut input: R) -> Result<Vec<TokenisedLine>> {
    let mut buf = Vec::new();
    input.read_to_end(&mut buf)?;
    split_program(&buf)
}

fn split_program(buf: &[u8]) -> Result<Vec<TokenisedLine>> {
    let mut lines = Vec::new();
    let mut pos = 0;
    while pos < buf.len() {
        ensure!(buf[pos] == 0, "bad line envelope at offset {pos}");
        // skip the NUL and the two internal-use bytes
        let header = buf
            .get(pos + 3..pos + 5)
            .ok_or_else(|| anyhow!("truncated line header at offset {pos}"))?;
        let number: u16 =
            bincode::deserialize(header).context("reading a stored line number")?;
        pos += 5;
        let mut body = Vec::new();
        loop {
            let Some(&b) = buf.get(pos) else {
                bail!("line {number} has no terminator");
            };
            pos += 1;
            if b == b'\r' {
                break;
            }
            body.push(b);
            if b == b'"' {
                // literal region: raw bytes up to the closing quote; an
                // unterminated literal is implicitly closed at line end
                while let Some(&lit) = buf.get(pos) {
                    if lit == b'\r' {
                        break;
                    }
                    pos += 1;
                    body.push(lit);
                    if lit == b'"' {
                        break;
                    }
                }
            } else {
                let trail = token::token_trail_len(b);
                let payload = buf
                    .get(pos..pos + trail)
                    .ok_or_else(|| anyhow!("line {number} ends inside a token"))?;
                body.extend_from_slice(payload);
                pos += trail;
            }
        }
        lines.push(TokenisedLine { number, body });
    }
    Ok(lines)
}
