//! GW-BASIC token codes and the keyword table.
//!
//! Keywords tokenise to one byte in the 0x81..=0xF4 range or to two bytes
//! with a 0xFD/0xFE/0xFF lead. Numeric literals tokenise to a lead byte from
//! the 0x0B..=0x1F range followed by their payload.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Octal literal, 2-byte LE payload.
pub const T_OCT: u8 = 0x0B;
/// Hex literal, 2-byte LE payload.
pub const T_HEX: u8 = 0x0C;
/// Unsigned line-number reference, 2-byte LE payload.
pub const T_UINT: u8 = 0x0E;
/// Byte-sized integer literal 10..=255, 1-byte payload.
pub const T_BYTE: u8 = 0x0F;
/// Digit literals 0..=10 encode as C_0 + digit, no payload.
pub const C_0: u8 = 0x11;
pub const C_10: u8 = 0x1B;
/// Signed integer literal, 2-byte LE payload.
pub const T_INT: u8 = 0x1C;
/// Single literal, 4-byte MBF payload.
pub const T_SINGLE: u8 = 0x1D;
/// Double literal, 8-byte MBF payload.
pub const T_DOUBLE: u8 = 0x1F;

/// One-byte keyword tokens the tokeniser emits outside the keyword table.
pub const REM: u8 = 0x8F;
pub const PRINT: u8 = 0x91;
pub const ELSE: u8 = 0xA1;
pub const WHILE: u8 = 0xB1;
/// The `'` comment form of REM.
pub const O_REM: u8 = 0xD9;
/// The `+` operator token.
pub const O_PLUS: u8 = 0xE9;

/// Lead bytes of numeric tokens with a payload, for dispatch on decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum NumberLead {
    Oct = T_OCT,
    Hex = T_HEX,
    Uint = T_UINT,
    Byte = T_BYTE,
    Int = T_INT,
    Single = T_SINGLE,
    Double = T_DOUBLE,
}

/// Keyword spellings the tokeniser singles out.
pub const KW_GOTO: &[u8] = b"GOTO";
pub const KW_GOSUB: &[u8] = b"GOSUB";
pub const KW_ELSE: &[u8] = b"ELSE";
pub const KW_WHILE: &[u8] = b"WHILE";
pub const KW_REM: &[u8] = b"REM";
pub const KW_DATA: &[u8] = b"DATA";
pub const KW_FN: &[u8] = b"FN";
pub const KW_USR: &[u8] = b"USR";
pub const KW_SPC: &[u8] = b"SPC(";
pub const KW_TAB: &[u8] = b"TAB(";

/// Keywords that can be followed by one or more line numbers.
pub const JUMP_KEYWORDS: [&[u8]; 15] = [
    b"GOTO", b"THEN", b"ELSE", b"GOSUB", b"LIST", b"RENUM", b"EDIT",
    b"LLIST", b"DELETE", b"RUN", b"RESUME", b"AUTO", b"ERL", b"RESTORE",
    b"RETURN",
];

/// Bytes permitted inside a name after its first letter.
pub fn is_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'.'
}

/// Lead bytes denoting a numeric literal token (jump references excluded).
pub fn is_number_token(b: u8) -> bool {
    matches!(b, T_OCT | T_HEX | T_BYTE | T_INT | T_SINGLE | T_DOUBLE)
        || (C_0..=C_10).contains(&b)
}

/// Payload byte count that follows a numeric token lead.
pub fn token_trail_len(lead: u8) -> usize {
    match lead {
        T_OCT | T_HEX | T_UINT | T_INT => 2,
        T_BYTE => 1,
        T_SINGLE => 4,
        T_DOUBLE => 8,
        _ => 0,
    }
}

/// Map a canonical upper-case keyword spelling to its token bytes.
///
/// Complete for the GW-BASIC 3.23 keyword set, the single-character operator
/// symbols and the `'` comment marker. `?` is not a table entry; the
/// tokeniser expands it to PRINT itself.
pub fn to_token(word: &[u8]) -> Option<&'static [u8]> {
    Some(match word {
        b"END" => &[0x81],
        b"FOR" => &[0x82],
        b"NEXT" => &[0x83],
        b"DATA" => &[0x84],
        b"INPUT" => &[0x85],
        b"DIM" => &[0x86],
        b"READ" => &[0x87],
        b"LET" => &[0x88],
        b"GOTO" => &[0x89],
        b"RUN" => &[0x8A],
        b"IF" => &[0x8B],
        b"RESTORE" => &[0x8C],
        b"GOSUB" => &[0x8D],
        b"RETURN" => &[0x8E],
        b"REM" => &[REM],
        b"STOP" => &[0x90],
        b"PRINT" => &[PRINT],
        b"CLEAR" => &[0x92],
        b"LIST" => &[0x93],
        b"NEW" => &[0x94],
        b"ON" => &[0x95],
        b"WAIT" => &[0x96],
        b"DEF" => &[0x97],
        b"POKE" => &[0x98],
        b"CONT" => &[0x99],
        b"OUT" => &[0x9C],
        b"LPRINT" => &[0x9D],
        b"LLIST" => &[0x9E],
        b"WIDTH" => &[0xA0],
        b"ELSE" => &[ELSE],
        b"TRON" => &[0xA2],
        b"TROFF" => &[0xA3],
        b"SWAP" => &[0xA4],
        b"ERASE" => &[0xA5],
        b"EDIT" => &[0xA6],
        b"ERROR" => &[0xA7],
        b"RESUME" => &[0xA8],
        b"DELETE" => &[0xA9],
        b"AUTO" => &[0xAA],
        b"RENUM" => &[0xAB],
        b"DEFSTR" => &[0xAC],
        b"DEFINT" => &[0xAD],
        b"DEFSNG" => &[0xAE],
        b"DEFDBL" => &[0xAF],
        b"LINE" => &[0xB0],
        b"WHILE" => &[WHILE],
        b"WEND" => &[0xB2],
        b"CALL" => &[0xB3],
        b"WRITE" => &[0xB7],
        b"OPTION" => &[0xB8],
        b"RANDOMIZE" => &[0xB9],
        b"OPEN" => &[0xBA],
        b"CLOSE" => &[0xBB],
        b"LOAD" => &[0xBC],
        b"MERGE" => &[0xBD],
        b"SAVE" => &[0xBE],
        b"COLOR" => &[0xBF],
        b"CLS" => &[0xC0],
        b"MOTOR" => &[0xC1],
        b"BSAVE" => &[0xC2],
        b"BLOAD" => &[0xC3],
        b"SOUND" => &[0xC4],
        b"BEEP" => &[0xC5],
        b"PSET" => &[0xC6],
        b"PRESET" => &[0xC7],
        b"SCREEN" => &[0xC8],
        b"KEY" => &[0xC9],
        b"LOCATE" => &[0xCA],
        b"TO" => &[0xCC],
        b"THEN" => &[0xCD],
        b"TAB(" => &[0xCE],
        b"STEP" => &[0xCF],
        b"USR" => &[0xD0],
        b"FN" => &[0xD1],
        b"SPC(" => &[0xD2],
        b"NOT" => &[0xD3],
        b"ERL" => &[0xD4],
        b"ERR" => &[0xD5],
        b"STRING$" => &[0xD6],
        b"USING" => &[0xD7],
        b"INSTR" => &[0xD8],
        b"'" => &[O_REM],
        b"VARPTR" => &[0xDA],
        b"CSRLIN" => &[0xDB],
        b"POINT" => &[0xDC],
        b"OFF" => &[0xDD],
        b"INKEY$" => &[0xDE],
        b">" => &[0xE6],
        b"=" => &[0xE7],
        b"<" => &[0xE8],
        b"+" => &[O_PLUS],
        b"-" => &[0xEA],
        b"*" => &[0xEB],
        b"/" => &[0xEC],
        b"^" => &[0xED],
        b"AND" => &[0xEE],
        b"OR" => &[0xEF],
        b"XOR" => &[0xF0],
        b"EQV" => &[0xF1],
        b"IMP" => &[0xF2],
        b"MOD" => &[0xF3],
        b"\\" => &[0xF4],
        // two-byte tokens, 0xFD lead
        b"CVI" => &[0xFD, 0x81],
        b"CVS" => &[0xFD, 0x82],
        b"CVD" => &[0xFD, 0x83],
        b"MKI$" => &[0xFD, 0x84],
        b"MKS$" => &[0xFD, 0x85],
        b"MKD$" => &[0xFD, 0x86],
        b"EXTERR" => &[0xFD, 0x8B],
        // two-byte tokens, 0xFE lead
        b"FILES" => &[0xFE, 0x81],
        b"FIELD" => &[0xFE, 0x82],
        b"SYSTEM" => &[0xFE, 0x83],
        b"NAME" => &[0xFE, 0x84],
        b"LSET" => &[0xFE, 0x85],
        b"RSET" => &[0xFE, 0x86],
        b"KILL" => &[0xFE, 0x87],
        b"PUT" => &[0xFE, 0x88],
        b"GET" => &[0xFE, 0x89],
        b"RESET" => &[0xFE, 0x8A],
        b"COMMON" => &[0xFE, 0x8B],
        b"CHAIN" => &[0xFE, 0x8C],
        b"DATE$" => &[0xFE, 0x8D],
        b"TIME$" => &[0xFE, 0x8E],
        b"PAINT" => &[0xFE, 0x8F],
        b"COM" => &[0xFE, 0x90],
        b"CIRCLE" => &[0xFE, 0x91],
        b"DRAW" => &[0xFE, 0x92],
        b"PLAY" => &[0xFE, 0x93],
        b"TIMER" => &[0xFE, 0x94],
        b"ERDEV" => &[0xFE, 0x95],
        b"IOCTL" => &[0xFE, 0x96],
        b"CHDIR" => &[0xFE, 0x97],
        b"MKDIR" => &[0xFE, 0x98],
        b"RMDIR" => &[0xFE, 0x99],
        b"SHELL" => &[0xFE, 0x9A],
        b"ENVIRON" => &[0xFE, 0x9B],
        b"VIEW" => &[0xFE, 0x9C],
        b"WINDOW" => &[0xFE, 0x9D],
        b"PMAP" => &[0xFE, 0x9E],
        b"PALETTE" => &[0xFE, 0x9F],
        b"LCOPY" => &[0xFE, 0xA0],
        b"CALLS" => &[0xFE, 0xA1],
        b"NOISE" => &[0xFE, 0xA4],
        b"PCOPY" => &[0xFE, 0xA5],
        b"TERM" => &[0xFE, 0xA6],
        b"LOCK" => &[0xFE, 0xA7],
        b"UNLOCK" => &[0xFE, 0xA8],
        // two-byte tokens, 0xFF lead
        b"LEFT$" => &[0xFF, 0x81],
        b"RIGHT$" => &[0xFF, 0x82],
        b"MID$" => &[0xFF, 0x83],
        b"SGN" => &[0xFF, 0x84],
        b"INT" => &[0xFF, 0x85],
        b"ABS" => &[0xFF, 0x86],
        b"SQR" => &[0xFF, 0x87],
        b"RND" => &[0xFF, 0x88],
        b"SIN" => &[0xFF, 0x89],
        b"LOG" => &[0xFF, 0x8A],
        b"EXP" => &[0xFF, 0x8B],
        b"COS" => &[0xFF, 0x8C],
        b"TAN" => &[0xFF, 0x8D],
        b"ATN" => &[0xFF, 0x8E],
        b"FRE" => &[0xFF, 0x8F],
        b"INP" => &[0xFF, 0x90],
        b"POS" => &[0xFF, 0x91],
        b"LEN" => &[0xFF, 0x92],
        b"STR$" => &[0xFF, 0x93],
        b"VAL" => &[0xFF, 0x94],
        b"ASC" => &[0xFF, 0x95],
        b"CHR$" => &[0xFF, 0x96],
        b"PEEK" => &[0xFF, 0x97],
        b"SPACE$" => &[0xFF, 0x98],
        b"OCT$" => &[0xFF, 0x99],
        b"HEX$" => &[0xFF, 0x9A],
        b"LPOS" => &[0xFF, 0x9B],
        b"CINT" => &[0xFF, 0x9C],
        b"CSNG" => &[0xFF, 0x9D],
        b"CDBL" => &[0xFF, 0x9E],
        b"FIX" => &[0xFF, 0x9F],
        b"PEN" => &[0xFF, 0xA0],
        b"STICK" => &[0xFF, 0xA1],
        b"STRIG" => &[0xFF, 0xA2],
        b"EOF" => &[0xFF, 0xA3],
        b"LOC" => &[0xFF, 0xA4],
        b"LOF" => &[0xFF, 0xA5],
        _ => return None,
    })
}

/// True if the spelling is a tokenised keyword.
pub fn is_keyword(word: &[u8]) -> bool {
    to_token(word).is_some()
}

/// True if the keyword opens a jump-number context.
pub fn is_jump_keyword(word: &[u8]) -> bool {
    JUMP_KEYWORDS.contains(&word)
}
