//! Chunked conversion between byte buffers and text.
//!
//! Two representations are provided:
//! - "binary text": one char per byte (U+0000..=U+00FF), the classic
//!   byte-string form;
//! - standard padded base64, the printable form the cipher operates on.
//!
//! Every conversion walks its input in fixed-size slices so peak memory and
//! stack use stay independent of the input length.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use zipseal_core::{SealError, SealResult};

use crate::DEFAULT_CHUNK_SIZE;

/// Base64 text decoded per iteration; a whole number of 4-char quanta.
const DECODE_STEP: usize = 4 * 256;

/// Map each byte to the char with the same code point, `chunk_size` bytes at a time.
///
/// A `chunk_size` of 0 is treated as 1.
pub fn bytes_to_text(bytes: &[u8], chunk_size: usize) -> String {
    // Chars above U+007F take two bytes in UTF-8.
    let high = bytes.iter().filter(|&&b| b >= 0x80).count();
    let mut out = String::with_capacity(bytes.len() + high);
    for chunk in bytes.chunks(chunk_size.max(1)) {
        out.extend(chunk.iter().map(|&b| char::from(b)));
    }
    out
}

/// Reverse of [`bytes_to_text`]. Fails on any char above U+00FF.
pub fn text_to_bytes(text: &str) -> SealResult<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len());
    for (pos, ch) in text.chars().enumerate() {
        let byte = u8::try_from(u32::from(ch)).map_err(|_| {
            SealError::DecodeError(format!(
                "char {ch:?} (U+{:04X}) at position {pos} is outside the byte range",
                u32::from(ch)
            ))
        })?;
        out.push(byte);
    }
    Ok(out)
}

/// Standard padded base64, encoded in slices of [`DEFAULT_CHUNK_SIZE`] bytes.
pub fn base64_encode(bytes: &[u8]) -> String {
    base64_encode_chunked(bytes, DEFAULT_CHUNK_SIZE)
}

/// Standard padded base64, encoded `chunk_size` bytes at a time.
///
/// `chunk_size` is rounded down to a multiple of 3 (minimum 3) so only the
/// final slice can carry padding and the concatenation stays valid base64.
pub fn base64_encode_chunked(bytes: &[u8], chunk_size: usize) -> String {
    let step = (chunk_size / 3).max(1) * 3;
    let mut out = String::with_capacity(bytes.len().div_ceil(3) * 4);
    for chunk in bytes.chunks(step) {
        STANDARD.encode_string(chunk, &mut out);
    }
    out
}

/// Decode standard padded base64.
pub fn base64_decode(text: &str) -> SealResult<Vec<u8>> {
    let input = text.as_bytes();
    if input.len() % 4 != 0 {
        return Err(SealError::DecodeError(format!(
            "base64 length {} is not a multiple of 4",
            input.len()
        )));
    }

    let mut out = Vec::with_capacity(input.len() / 4 * 3);
    let mut slices = input.chunks(DECODE_STEP).peekable();
    while let Some(slice) = slices.next() {
        if slices.peek().is_some() && slice.ends_with(b"=") {
            return Err(SealError::DecodeError("base64 padding before end of input".into()));
        }
        STANDARD
            .decode_vec(slice, &mut out)
            .map_err(|e| SealError::DecodeError(format!("base64: {e}")))?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_bytes_to_text_maps_code_points() {
        let text = bytes_to_text(&[0x00, 0x41, 0x7F, 0x80, 0xFF], 2);
        let chars: Vec<u32> = text.chars().map(u32::from).collect();
        assert_eq!(chars, vec![0x00, 0x41, 0x7F, 0x80, 0xFF]);
    }

    #[test]
    fn test_zero_chunk_size_treated_as_one() {
        let text = bytes_to_text(b"abc", 0);
        assert_eq!(text, "abc");
    }

    #[test]
    fn test_text_to_bytes_rejects_wide_chars() {
        let err = text_to_bytes("ok\u{0100}").unwrap_err();
        assert!(matches!(err, SealError::DecodeError(_)));
        assert!(err.to_string().contains("position 2"));

        assert!(text_to_bytes("emoji \u{1F512}").is_err());
    }

    #[test]
    fn test_base64_known_vectors() {
        assert_eq!(base64_encode(b""), "");
        assert_eq!(base64_encode(b"f"), "Zg==");
        assert_eq!(base64_encode(b"fo"), "Zm8=");
        assert_eq!(base64_encode(b"foo"), "Zm9v");
        assert_eq!(base64_encode(b"foobar"), "Zm9vYmFy");
    }

    #[test]
    fn test_chunked_base64_matches_single_shot() {
        let data: Vec<u8> = (0u8..=255).cycle().take(10_000).collect();
        let whole = STANDARD.encode(&data);
        for chunk in [1, 2, 3, 4, 5, 1023, 1024, 4096] {
            assert_eq!(base64_encode_chunked(&data, chunk), whole, "chunk {chunk}");
        }
    }

    #[test]
    fn test_base64_decode_spans_many_slices() {
        let data: Vec<u8> = (0..5000u32).map(|i| (i * 31 % 251) as u8).collect();
        let text = base64_encode(&data);
        assert!(text.len() > DECODE_STEP * 3);
        assert_eq!(base64_decode(&text).unwrap(), data);
    }

    #[test]
    fn test_base64_decode_errors() {
        assert!(matches!(base64_decode("abc"), Err(SealError::DecodeError(_))));
        assert!(matches!(base64_decode("ab!d"), Err(SealError::DecodeError(_))));
        assert!(matches!(base64_decode("Zg=a"), Err(SealError::DecodeError(_))));
        assert!(matches!(base64_decode("Zm9v\u{e9}ab="), Err(SealError::DecodeError(_))));
    }

    #[test]
    fn test_base64_decode_rejects_padding_mid_stream() {
        // Valid padded quanta, but padding ends a slice that is not the last one.
        let mut text = "Zg==".repeat(DECODE_STEP / 4);
        text.push_str("Zm9v");
        assert!(base64_decode(&text).is_err());
    }

    #[test]
    fn test_large_input_roundtrip() {
        let data: Vec<u8> = (0u8..=255).cycle().take(3 * 1024 * 1024 + 7).collect();
        let text = bytes_to_text(&data, DEFAULT_CHUNK_SIZE);
        assert_eq!(text_to_bytes(&text).unwrap(), data);
        assert_eq!(base64_decode(&base64_encode(&data)).unwrap(), data);
    }

    proptest! {
        #[test]
        fn binary_text_roundtrip(
            data in proptest::collection::vec(any::<u8>(), 0..=8192),
            chunk in 1usize..=2048,
        ) {
            let text = bytes_to_text(&data, chunk);
            prop_assert_eq!(text.chars().count(), data.len());
            prop_assert_eq!(text_to_bytes(&text).unwrap(), data);
        }

        #[test]
        fn base64_roundtrip(
            data in proptest::collection::vec(any::<u8>(), 0..=8192),
            chunk in 1usize..=2048,
        ) {
            let text = base64_encode_chunked(&data, chunk);
            prop_assert_eq!(base64_decode(&text).unwrap(), data);
        }
    }
}
