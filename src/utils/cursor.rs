//! Connection cursors.
//!
//! A cursor is `base64("cursor:<signature>:<offset>")`. The signature is a
//! short digest of everything that determines row order (parent type,
//! relationship, filter and sort), so a cursor taken from one result set is
//! rejected by any other instead of silently pointing at an unrelated row.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use sha2::{Digest, Sha256};
use thiserror::Error;

const PREFIX: &str = "cursor";
const SIGNATURE_LEN: usize = 16;
const SEPARATOR: char = '\u{1f}';
/// Largest offset a cursor may carry; Cypher integers are signed 64-bit.
pub const MAX_OFFSET: u64 = i64::MAX as u64;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CursorDecodeError {
    #[error("cursor is not valid base64")]
    Encoding,

    #[error("cursor has an unexpected layout")]
    Format,

    #[error("cursor was issued for a different query (expected {expected}, found {found})")]
    SignatureMismatch { expected: String, found: String },

    #[error("cursor offset `{0}` is not an integer in range")]
    Offset(String),
}

/// Hex digest prefix over the ordering-relevant parts of a connection.
///
/// # Examples
/// ```
/// use cypherql::utils::cursor::signature;
///
/// let sig = signature(&["Movie", "actors", "{}", "[]"]);
/// assert_eq!(sig.len(), 16);
/// assert_eq!(sig, signature(&["Movie", "actors", "{}", "[]"]));
/// assert_ne!(sig, signature(&["Movie", "actors", "{}", "[{\"name\":\"ASC\"}]"]));
/// ```
pub fn signature(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update(SEPARATOR.to_string().as_bytes());
        }
        hasher.update(part.as_bytes());
    }
    let digest = hex::encode(hasher.finalize());
    digest[..SIGNATURE_LEN].to_string()
}

pub fn encode_cursor(signature: &str, offset: u64) -> String {
    BASE64.encode(format!("{}:{}:{}", PREFIX, signature, offset))
}

/// Decode a cursor issued under `expected_signature`.
///
/// An empty expected signature (signing disabled) accepts any signature.
pub fn decode_cursor(cursor: &str, expected_signature: &str) -> Result<u64, CursorDecodeError> {
    let bytes = BASE64
        .decode(cursor.trim())
        .map_err(|_| CursorDecodeError::Encoding)?;
    let text = String::from_utf8(bytes).map_err(|_| CursorDecodeError::Encoding)?;

    let mut parts = text.splitn(3, ':');
    let (Some(PREFIX), Some(found), Some(offset)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(CursorDecodeError::Format);
    };

    if !expected_signature.is_empty() && found != expected_signature {
        return Err(CursorDecodeError::SignatureMismatch {
            expected: expected_signature.to_string(),
            found: found.to_string(),
        });
    }
    match offset.parse::<u64>() {
        Ok(position) if position < MAX_OFFSET => Ok(position),
        _ => Err(CursorDecodeError::Offset(offset.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_round_trip() {
        let sig = signature(&["Movie", "actors"]);
        let cursor = encode_cursor(&sig, 42);
        assert_eq!(decode_cursor(&cursor, &sig), Ok(42));
    }

    #[test]
    fn test_foreign_signature_is_rejected() {
        let cursor = encode_cursor(&signature(&["Movie", "actors"]), 3);
        let other = signature(&["Series", "actors"]);
        assert!(matches!(
            decode_cursor(&cursor, &other),
            Err(CursorDecodeError::SignatureMismatch { .. })
        ));
    }

    #[test]
    fn test_unsigned_cursors() {
        let cursor = encode_cursor("", 7);
        assert_eq!(decode_cursor(&cursor, ""), Ok(7));
        let signed = encode_cursor(&signature(&["x"]), 7);
        assert_eq!(decode_cursor(&signed, ""), Ok(7));
    }

    #[test]
    fn test_out_of_range_offsets_are_rejected() {
        assert!(matches!(
            decode_cursor(&encode_cursor("", u64::MAX), ""),
            Err(CursorDecodeError::Offset(_))
        ));
        assert!(decode_cursor(&encode_cursor("", MAX_OFFSET), "").is_err());
        assert_eq!(
            decode_cursor(&encode_cursor("", MAX_OFFSET - 1), ""),
            Ok(MAX_OFFSET - 1)
        );
    }

    #[test_case("not base64!!" ; "garbage")]
    #[test_case("Y3Vyc29y" ; "prefix only")]
    #[test_case("b3RoZXI6OjE=" ; "wrong prefix")]
    #[test_case("Y3Vyc29yOjotMQ==" ; "negative offset")]
    fn test_garbage_is_rejected(cursor: &str) {
        assert!(decode_cursor(cursor, "").is_err());
    }
}
