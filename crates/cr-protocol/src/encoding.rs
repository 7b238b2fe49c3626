//! Canonical text encoding of a code list.
//!
//! ```text
//! P0415s,P0010p,U0300c
//! ```
//! Each token is `<letter><4 uppercase hex digits><suffix>`, suffix `s`
//! (stored), `p` (pending) or `c` (cleared). Tokens are joined with `,`,
//! with no whitespace. The empty list encodes as the empty string.

use std::fmt::Write as _;

use thiserror::Error;

use crate::dtc::{DiagnosticCode, DtcKind, DtcLetter};

/// Length of one encoded token: letter + 4 hex digits + suffix.
const TOKEN_LEN: usize = 6;

/// Errors produced when decoding a canonical code list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodeParseError {
    #[error("token {index} ('{token}'): expected 6 characters")]
    Length { index: usize, token: String },

    #[error("token {index} ('{token}'): unknown subsystem letter")]
    Letter { index: usize, token: String },

    #[error("token {index} ('{token}'): expected 4 uppercase hex digits")]
    Digits { index: usize, token: String },

    #[error("token {index} ('{token}'): unknown kind suffix")]
    Suffix { index: usize, token: String },
}

/// Render a single code as its canonical token, e.g. `P0415s`.
pub fn encode_code(code: &DiagnosticCode) -> String {
    let mut out = String::with_capacity(TOKEN_LEN);
    push_token(&mut out, code);
    out
}

/// Render a code list in the canonical comma-separated form.
pub fn encode_codes(codes: &[DiagnosticCode]) -> String {
    let mut out = String::with_capacity(codes.len() * (TOKEN_LEN + 1));
    for (i, code) in codes.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_token(&mut out, code);
    }
    out
}

fn push_token(out: &mut String, code: &DiagnosticCode) {
    // Writing into a String cannot fail.
    let _ = write!(out, "{}{:04X}{}", code.letter, code.code, code.kind.suffix());
}

/// Parse the canonical form back into codes, preserving order.
pub fn decode_codes(input: &str) -> Result<Vec<DiagnosticCode>, CodeParseError> {
    if input.is_empty() {
        return Ok(Vec::new());
    }
    input
        .split(',')
        .enumerate()
        .map(|(index, token)| decode_token(index, token))
        .collect()
}

fn decode_token(index: usize, token: &str) -> Result<DiagnosticCode, CodeParseError> {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() != TOKEN_LEN {
        return Err(CodeParseError::Length {
            index,
            token: token.to_string(),
        });
    }

    let letter = DtcLetter::from_char(chars[0]).ok_or_else(|| CodeParseError::Letter {
        index,
        token: token.to_string(),
    })?;

    let digits = &chars[1..5];
    if !digits
        .iter()
        .all(|c| c.is_ascii_digit() || ('A'..='F').contains(c))
    {
        return Err(CodeParseError::Digits {
            index,
            token: token.to_string(),
        });
    }
    let hex: String = digits.iter().collect();
    let code = u16::from_str_radix(&hex, 16).map_err(|_| CodeParseError::Digits {
        index,
        token: token.to_string(),
    })?;

    let kind = DtcKind::from_suffix(chars[5]).ok_or_else(|| CodeParseError::Suffix {
        index,
        token: token.to_string(),
    })?;

    Ok(DiagnosticCode { letter, code, kind })
}
