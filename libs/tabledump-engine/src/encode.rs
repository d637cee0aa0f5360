//! Rendering of rows into dump-dialect literal tuples.
//!
//! Everything here is pure: bytes in, bytes out. Output is bytes rather than
//! `String` because text and binary payloads are copied through unchanged
//! apart from escaping, and need not be valid UTF-8.

use tabledump_api::{Row, SourceError, Value};

use crate::classify::Strategy;

pub const NULL_LITERAL: &[u8] = b"NULL";
const BINARY_MARKER: &[u8] = b"_binary ";

/// Escape sequence for a byte, if it needs one.
fn escape_byte(b: u8) -> Option<&'static [u8]> {
    match b {
        b'\0' => Some(b"\\0"),
        b'\n' => Some(b"\\n"),
        b'\r' => Some(b"\\r"),
        b'\\' => Some(b"\\\\"),
        b'\'' => Some(b"\\'"),
        b'"' => Some(b"\\\""),
        0x1a => Some(b"\\Z"),
        _ => None,
    }
}

/// Append `bytes` to `out` with dump-dialect escaping applied.
pub fn escape_into(out: &mut Vec<u8>, bytes: &[u8]) {
    let mut start = 0;
    for (i, &b) in bytes.iter().enumerate() {
        if let Some(seq) = escape_byte(b) {
            out.extend_from_slice(&bytes[start..i]);
            out.extend_from_slice(seq);
            start = i + 1;
        }
    }
    out.extend_from_slice(&bytes[start..]);
}

pub fn escape(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    escape_into(&mut out, bytes);
    out
}

/// Inverse of [`escape`], following the server's rules for string literals:
/// known sequences map to their byte, any other escaped byte stands for
/// itself. A trailing lone backslash is kept.
pub fn unescape(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut iter = bytes.iter().copied();
    while let Some(b) = iter.next() {
        if b != b'\\' {
            out.push(b);
            continue;
        }
        match iter.next() {
            Some(b'0') => out.push(b'\0'),
            Some(b'n') => out.push(b'\n'),
            Some(b'r') => out.push(b'\r'),
            Some(b't') => out.push(b'\t'),
            Some(b'b') => out.push(0x08),
            Some(b'Z') => out.push(0x1a),
            Some(other) => out.push(other),
            None => out.push(b'\\'),
        }
    }
    out
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Int64(_) => "int64",
        Value::UInt64(_) => "uint64",
        Value::Float64(_) => "float64",
        Value::Text(_) => "text",
        Value::Bytes(_) => "bytes",
        Value::Null => "null",
    }
}

fn scan_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Int64(v) => Some(*v),
        Value::UInt64(v) => i64::try_from(*v).ok(),
        Value::Float64(v) if v.fract() == 0.0 && *v >= i64::MIN as f64 && *v < i64::MAX as f64 => {
            Some(*v as i64)
        }
        Value::Text(b) | Value::Bytes(b) => std::str::from_utf8(b).ok()?.parse().ok(),
        _ => None,
    }
}

/// Textual form of a non-null value, before escaping.
fn raw_bytes(value: &Value) -> std::borrow::Cow<'_, [u8]> {
    use std::borrow::Cow;
    match value {
        Value::Int64(v) => Cow::Owned(v.to_string().into_bytes()),
        Value::UInt64(v) => Cow::Owned(v.to_string().into_bytes()),
        Value::Float64(v) => Cow::Owned(v.to_string().into_bytes()),
        Value::Text(b) | Value::Bytes(b) => Cow::Borrowed(b),
        Value::Null => Cow::Borrowed(NULL_LITERAL),
    }
}

fn encode_value(
    out: &mut Vec<u8>,
    index: usize,
    value: &Value,
    strategy: Strategy,
) -> Result<(), SourceError> {
    if value.is_null() {
        out.extend_from_slice(NULL_LITERAL);
        return Ok(());
    }
    match strategy {
        Strategy::Integer => {
            let v = scan_integer(value).ok_or_else(|| {
                SourceError::scan(format!(
                    "column {index}: cannot scan {} value as integer",
                    value_kind(value)
                ))
            })?;
            out.extend_from_slice(v.to_string().as_bytes());
        }
        Strategy::Text => {
            out.push(b'\'');
            escape_into(out, &raw_bytes(value));
            out.push(b'\'');
        }
        Strategy::Binary => {
            let payload = raw_bytes(value);
            if payload.is_empty() {
                out.extend_from_slice(NULL_LITERAL);
            } else {
                out.extend_from_slice(BINARY_MARKER);
                out.push(b'\'');
                escape_into(out, &payload);
                out.push(b'\'');
            }
        }
    }
    Ok(())
}

/// Render one row as `(v0,v1,...)`, appending to `out`.
///
/// `out` is left untouched past its original length if the row cannot be
/// scanned under its column strategies.
pub fn encode_row_into(
    out: &mut Vec<u8>,
    row: &Row,
    strategies: &[Strategy],
) -> Result<(), SourceError> {
    if row.len() != strategies.len() {
        return Err(SourceError::scan(format!(
            "row has {} values, expected {}",
            row.len(),
            strategies.len()
        )));
    }
    let start = out.len();
    out.push(b'(');
    for (i, (value, strategy)) in row.values().iter().zip(strategies).enumerate() {
        if i != 0 {
            out.push(b',');
        }
        if let Err(e) = encode_value(out, i, value, *strategy) {
            out.truncate(start);
            return Err(e);
        }
    }
    out.push(b')');
    Ok(())
}

pub fn encode_row(row: &Row, strategies: &[Strategy]) -> Result<Vec<u8>, SourceError> {
    let mut out = Vec::new();
    encode_row_into(&mut out, row, strategies)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabledump_api::ErrorKind;

    fn row(values: Vec<Value>) -> Row {
        Row(values)
    }

    fn encoded(values: Vec<Value>, strategies: &[Strategy]) -> String {
        String::from_utf8(encode_row(&row(values), strategies).unwrap()).unwrap()
    }

    #[test]
    fn null_in_every_strategy() {
        let s = encoded(
            vec![Value::Null, Value::Null, Value::Null],
            &[Strategy::Integer, Strategy::Text, Strategy::Binary],
        );
        assert_eq!(s, "(NULL,NULL,NULL)");
    }

    #[test]
    fn integer_column_null_and_value() {
        assert_eq!(encoded(vec![Value::Int64(42)], &[Strategy::Integer]), "(42)");
        assert_eq!(encoded(vec![Value::Null], &[Strategy::Integer]), "(NULL)");
        assert_eq!(encoded(vec![Value::Int64(-7)], &[Strategy::Integer]), "(-7)");
    }

    #[test]
    fn integer_accepts_numeric_text() {
        assert_eq!(encoded(vec!["123".into()], &[Strategy::Integer]), "(123)");
        assert_eq!(encoded(vec![Value::UInt64(9)], &[Strategy::Integer]), "(9)");
    }

    #[test]
    fn integer_scan_failure() {
        let err = encode_row(&row(vec!["abc".into()]), &[Strategy::Integer]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Scan);
        assert!(err.message.contains("column 0"));

        let err = encode_row(&row(vec![Value::UInt64(u64::MAX)]), &[Strategy::Integer]);
        assert!(err.is_err());
    }

    #[test]
    fn failed_row_leaves_buffer_intact() {
        let mut out = b"keep".to_vec();
        let r = row(vec![Value::Int64(1), "x".into()]);
        assert!(encode_row_into(&mut out, &r, &[Strategy::Integer, Strategy::Integer]).is_err());
        assert_eq!(out, b"keep");
    }

    #[test]
    fn text_is_quoted_and_escaped() {
        let s = encoded(
            vec!["it's a \"test\"\\\n\r\0\x1a".into()],
            &[Strategy::Text],
        );
        assert_eq!(s, r#"('it\'s a \"test\"\\\n\r\0\Z')"#);
    }

    #[test]
    fn text_strategy_renders_numbers_quoted() {
        assert_eq!(
            encoded(vec![Value::Int64(5), Value::Float64(1.5)], &[Strategy::Text, Strategy::Text]),
            "('5','1.5')"
        );
    }

    #[test]
    fn empty_binary_is_null() {
        assert_eq!(encoded(vec![Value::Bytes(vec![])], &[Strategy::Binary]), "(NULL)");
        assert_eq!(encoded(vec![Value::Text(vec![])], &[Strategy::Binary]), "(NULL)");
    }

    #[test]
    fn empty_text_is_empty_string() {
        assert_eq!(encoded(vec!["".into()], &[Strategy::Text]), "('')");
    }

    #[test]
    fn binary_has_marker() {
        let out = encode_row(&row(vec![Value::Bytes(vec![0xff, b'\'', 0x00, 0x01])]), &[Strategy::Binary])
            .unwrap();
        assert_eq!(out, b"(_binary '\xff\\'\\0\x01')".to_vec());
    }

    #[test]
    fn binary_escape_round_trips() {
        let payloads: Vec<Vec<u8>> = vec![
            (0u8..=255).collect(),
            b"\\\\''\"\"\n\r\0\x1a".to_vec(),
            vec![b'\\'; 17],
            b"plain".to_vec(),
        ];
        for payload in payloads {
            let escaped = escape(&payload);
            assert!(!escaped.contains(&b'\n'));
            assert!(!escaped.contains(&0u8));
            assert_eq!(unescape(&escaped), payload);
        }
    }

    #[test]
    fn unescape_unknown_sequences() {
        assert_eq!(unescape(br"a\qb\tc\bd"), b"aqb\tc\x08d".to_vec());
        assert_eq!(unescape(b"end\\"), b"end\\".to_vec());
    }

    #[test]
    fn arity_mismatch_is_scan_error() {
        let err = encode_row(&row(vec![Value::Int64(1)]), &[Strategy::Integer, Strategy::Text])
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Scan);
    }
}
