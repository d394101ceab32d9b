// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Binary codec for the correlation headers.
//!
//! Two headers make up the wire contract, and their names must stay stable across
//! independently deployed client and server builds:
//!
//! - [`REQUEST_ID_HEADER`] carries the parent span id as a UTF-8 string.
//! - [`CORRELATION_CONTEXT_HEADER`] carries the baggage as one opaque binary
//!   envelope, and is only written when the baggage is non-empty.
//!
//! The baggage envelope is a u16 big-endian pair count followed by the pairs, each
//! string u16-length-prefixed UTF-8. Pair order is preserved end to end: receivers
//! re-propagate baggage in the exact order the sender serialized it.
//!
//! Decoding is total over arbitrary input; malformed bytes produce a
//! [`CodecError`], which callers treat as "no baggage" rather than failing the
//! call.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::CodecError;

/// Header carrying the parent span id of the outbound call.
pub const REQUEST_ID_HEADER: &str = "Request-Id";

/// Header carrying the encoded baggage envelope.
pub const CORRELATION_CONTEXT_HEADER: &str = "Correlation-Context";

/// Encode a baggage sequence into the binary envelope.
///
/// Keys and values longer than `u16::MAX` bytes are truncated at a char boundary,
/// and at most `u16::MAX` pairs are encoded (the count field cannot represent
/// more); baggage is expected to be a few small items at most.
pub fn encode_baggage(pairs: &[(String, String)]) -> Bytes {
    let count = pairs.len().min(u16::MAX as usize);
    let mut buf = BytesMut::with_capacity(2 + count * 16);
    buf.put_u16(count as u16);
    for (key, value) in &pairs[..count] {
        put_string(&mut buf, key);
        put_string(&mut buf, value);
    }
    buf.freeze()
}

/// Decode the binary envelope back into a baggage sequence.
///
/// Returns pairs in the order they were encoded. Any structural defect (truncation,
/// count mismatch, invalid UTF-8, trailing garbage) yields a [`CodecError`].
pub fn decode_baggage(bytes: &[u8]) -> Result<Vec<(String, String)>, CodecError> {
    let mut buf = bytes;
    if buf.remaining() < 2 {
        return Err(CodecError::Truncated {
            needed: 2 - buf.remaining(),
        });
    }
    let count = buf.get_u16() as usize;

    let mut pairs = Vec::with_capacity(count);
    for read in 0..count {
        if buf.remaining() == 0 {
            return Err(CodecError::CountMismatch {
                declared: count,
                read,
            });
        }
        let key = get_string(&mut buf)?;
        let value = get_string(&mut buf)?;
        pairs.push((key, value));
    }

    if buf.remaining() > 0 {
        return Err(CodecError::TrailingBytes(buf.remaining()));
    }
    Ok(pairs)
}

fn put_string(buf: &mut BytesMut, s: &str) {
    let mut end = s.len().min(u16::MAX as usize);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    buf.put_u16(end as u16);
    buf.extend_from_slice(&s.as_bytes()[..end]);
}

fn get_string(buf: &mut &[u8]) -> Result<String, CodecError> {
    if buf.remaining() < 2 {
        return Err(CodecError::Truncated {
            needed: 2 - buf.remaining(),
        });
    }
    let len = buf.get_u16() as usize;
    if buf.remaining() < len {
        return Err(CodecError::Truncated {
            needed: len - buf.remaining(),
        });
    }
    let bytes = buf.copy_to_bytes(len);
    String::from_utf8(bytes.to_vec()).map_err(|e| CodecError::InvalidUtf8(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_round_trip_preserves_order() {
        let baggage = pairs(&[("tenant", "contoso"), ("flight", "beta"), ("a", "")]);
        let encoded = encode_baggage(&baggage);
        let decoded = decode_baggage(&encoded).unwrap();
        assert_eq!(decoded, baggage);
    }

    #[test]
    fn test_round_trip_empty() {
        let encoded = encode_baggage(&[]);
        assert_eq!(encoded.len(), 2);
        assert_eq!(decode_baggage(&encoded).unwrap(), Vec::new());
    }

    #[test]
    fn test_round_trip_unicode() {
        let baggage = pairs(&[("ключ", "wärde"), ("emoji", "🧵")]);
        let decoded = decode_baggage(&encode_baggage(&baggage)).unwrap();
        assert_eq!(decoded, baggage);
    }

    #[test]
    fn test_encode_caps_pair_count() {
        let oversized = vec![(String::new(), String::new()); u16::MAX as usize + 3];
        let encoded = encode_baggage(&oversized);
        // The dropped tail must not leave trailing bytes behind the declared count.
        let decoded = decode_baggage(&encoded).unwrap();
        assert_eq!(decoded.len(), u16::MAX as usize);
    }

    #[test]
    fn test_decode_empty_input_is_error() {
        assert!(matches!(
            decode_baggage(&[]),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[test]
    fn test_decode_truncated_value() {
        let baggage = pairs(&[("key", "value")]);
        let encoded = encode_baggage(&baggage);
        let cut = &encoded[..encoded.len() - 2];
        assert!(matches!(
            decode_baggage(cut),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[test]
    fn test_decode_count_mismatch() {
        // Declares 2 pairs but carries none.
        let bytes = [0x00, 0x02];
        assert!(matches!(
            decode_baggage(&bytes),
            Err(CodecError::CountMismatch {
                declared: 2,
                read: 0
            })
        ));
    }

    #[test]
    fn test_decode_trailing_bytes() {
        let mut encoded = encode_baggage(&pairs(&[("k", "v")])).to_vec();
        encoded.push(0xFF);
        assert!(matches!(
            decode_baggage(&encoded),
            Err(CodecError::TrailingBytes(1))
        ));
    }

    #[test]
    fn test_decode_invalid_utf8() {
        // One pair, key of length 2 with invalid UTF-8, empty value.
        let bytes = [0x00, 0x01, 0x00, 0x02, 0xC0, 0x80, 0x00, 0x00];
        assert!(matches!(
            decode_baggage(&bytes),
            Err(CodecError::InvalidUtf8(_))
        ));
    }
}
