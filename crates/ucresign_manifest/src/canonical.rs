//! Canonical JSON encoding.
//!
//! Digests are computed over these exact bytes, so the output must match the
//! upstream signer bit for bit: keys sorted by byte value, no whitespace,
//! integers in the safe double range written plainly, every other number in
//! compact `E` notation, and only control characters, `\` and `"` escaped.
//! The encoded bytes then go through a fixed literal substitution pass.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Largest integer a double holds exactly (2^53 - 1).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Literal rewrites applied in order to the encoded bytes.
const SUBSTITUTIONS: [(&[u8], &[u8]); 4] = [
    (br"\u0026", b"&"),
    (br"\u003c/", br"<\/"),
    (br"\u003c", b"<"),
    (br"\u003e", b">"),
];

const HEX: &[u8; 16] = b"0123456789abcdef";

#[derive(Debug, Error)]
pub enum CanonicalError {
    /// The value could not be converted into a JSON tree.
    #[error("Cannot encode value: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A number that has no double representation.
    #[error("Unsupported number: {0}")]
    UnsupportedNumber(String),
}

/// Encode any serializable value canonically.
pub fn to_vec<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CanonicalError> {
    let tree = serde_json::to_value(value)?;
    value_to_vec(&tree)
}

/// Encode an already-built JSON tree canonically.
pub fn value_to_vec(value: &Value) -> Result<Vec<u8>, CanonicalError> {
    let mut out = Vec::with_capacity(4096);
    write_value(&mut out, value)?;
    Ok(substitute(out))
}

fn write_value(out: &mut Vec<u8>, value: &Value) -> Result<(), CanonicalError> {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(n) => {
            let f = n
                .as_f64()
                .ok_or_else(|| CanonicalError::UnsupportedNumber(n.to_string()))?;
            write_number(out, f);
        }
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(out, item)?;
            }
            out.push(b']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

            out.push(b'{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_string(out, key);
                out.push(b':');
                write_value(out, item)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}

fn write_number(out: &mut Vec<u8>, f: f64) {
    if (-MAX_SAFE_INTEGER..=MAX_SAFE_INTEGER).contains(&f) && f.fract() == 0.0 {
        // -0.0 casts to 0
        out.extend_from_slice((f as i64).to_string().as_bytes());
    } else {
        // Rust's `{:E}` is already the shortest round-trip mantissa with an
        // exponent that carries no '+' and no leading zero.
        out.extend_from_slice(format!("{f:E}").as_bytes());
    }
}

fn write_string(out: &mut Vec<u8>, s: &str) {
    out.push(b'"');
    for c in s.chars() {
        match c {
            '\u{08}' => out.extend_from_slice(br"\b"),
            '\t' => out.extend_from_slice(br"\t"),
            '\n' => out.extend_from_slice(br"\n"),
            '\u{0c}' => out.extend_from_slice(br"\f"),
            '\r' => out.extend_from_slice(br"\r"),
            c if (c as u32) < 0x20 => {
                let b = c as u8;
                out.extend_from_slice(br"\u00");
                out.push(HEX[(b >> 4) as usize]);
                out.push(HEX[(b & 0x0f) as usize]);
            }
            '\\' => out.extend_from_slice(br"\\"),
            '"' => out.extend_from_slice(br#"\""#),
            c => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    out.push(b'"');
}

fn substitute(mut data: Vec<u8>) -> Vec<u8> {
    for (from, to) in SUBSTITUTIONS {
        data = replace_all(data, from, to);
    }
    data
}

fn replace_all(data: Vec<u8>, from: &[u8], to: &[u8]) -> Vec<u8> {
    if data.len() < from.len() || !data.windows(from.len()).any(|w| w == from) {
        return data;
    }

    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        if data[i..].starts_with(from) {
            out.extend_from_slice(to);
            i += from.len();
        } else {
            out.push(data[i]);
            i += 1;
        }
    }
    out
}
