//! Word codec: logical integer words to big-endian byte frames and back,
//! with an optional trailing CRC field on encode.

use crate::crc::CrcEngine;
use crate::error::Error;

/// Parse a CLI word: decimal, or hexadecimal with a `0x`/`0X` prefix.
pub fn parse_word(raw: &str) -> Result<u128, Error> {
    let trimmed = raw.trim();
    let parsed = if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        u128::from_str_radix(hex, 16)
    } else {
        trimmed.parse::<u128>()
    };
    parsed.map_err(|_| Error::Format(raw.to_string()))
}

/// Encode `word` as exactly `byte_count` big-endian bytes. With a CRC engine
/// supplied, the checksum of those bytes is appended as the engine's byte
/// count worth of big-endian bytes, the value zero-extended into the field.
///
/// A word wider than `byte_count` bytes is an overflow, never a truncation.
pub fn encode(word: u128, byte_count: usize, crc: Option<&CrcEngine>) -> Result<Vec<u8>, Error> {
    if byte_count == 0 || byte_count > 16 {
        return Err(Error::Configuration(format!(
            "word length of {} bytes is outside the supported 1-16 byte range",
            byte_count
        )));
    }
    if byte_count < 16 && word >> (byte_count * 8) != 0 {
        return Err(Error::Overflow { word, byte_count });
    }

    let mut frame = word.to_be_bytes()[16 - byte_count..].to_vec();
    if let Some(engine) = crc {
        let crc_word = engine.checksum(&frame);
        frame.extend_from_slice(&crc_word.to_be_bytes()[16 - engine.byte_count()..]);
    }
    Ok(frame)
}

/// Reinterpret a frame as a big-endian unsigned integer.
pub fn decode(frame: &[u8]) -> u128 {
    debug_assert!(frame.len() <= 16);
    frame
        .iter()
        .fold(0u128, |word, byte| (word << 8) | *byte as u128)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crc8(poly: u128) -> CrcEngine {
        CrcEngine::new(8, poly, 0).unwrap()
    }

    #[test]
    fn parses_decimal_and_hex_alike() {
        assert_eq!(parse_word("43981").unwrap(), 0xABCD);
        assert_eq!(parse_word("0xABCD").unwrap(), 0xABCD);
        assert_eq!(parse_word("0Xabcd").unwrap(), 0xABCD);
        assert_eq!(parse_word(" 0xDEADBEEF ").unwrap(), 0xDEADBEEF);
    }

    #[test]
    fn rejects_malformed_numerals() {
        assert!(matches!(parse_word("abcd"), Err(Error::Format(_))));
        assert!(matches!(parse_word("0x"), Err(Error::Format(_))));
        assert!(matches!(parse_word(""), Err(Error::Format(_))));
        assert!(matches!(parse_word("-5"), Err(Error::Format(_))));
        assert!(matches!(parse_word("12.5"), Err(Error::Format(_))));
    }

    #[test]
    fn encodes_big_endian() {
        let frame = encode(0xDEADBEEF, 4, None).unwrap();
        assert_eq!(frame, vec![222, 173, 190, 239]);
    }

    #[test]
    fn encodes_with_zero_padding() {
        let frame = encode(43981, 4, None).unwrap();
        assert_eq!(frame, vec![0, 0, 171, 205]);
    }

    #[test]
    fn encodes_large_word() {
        let frame = encode(0xDEADBEEFFEEBDAED, 8, None).unwrap();
        assert_eq!(frame, vec![222, 173, 190, 239, 254, 235, 218, 237]);
    }

    #[test]
    fn overflow_is_an_error() {
        let err = encode(0xDEADBEEF, 2, None).unwrap_err();
        assert!(matches!(
            err,
            Error::Overflow {
                word: 0xDEADBEEF,
                byte_count: 2
            }
        ));
    }

    #[test]
    fn appends_crc_field() {
        let frame = encode(0xDEADBEEF, 4, Some(&crc8(0x37))).unwrap();
        assert_eq!(frame, vec![0xDE, 0xAD, 0xBE, 0xEF, 0x0A]);
    }

    #[test]
    fn crc_field_matches_recomputation() {
        let engine = crc8(0xA2);
        let frame = encode(0xF7E6D5C4, 4, Some(&engine)).unwrap();
        assert_eq!(frame.len(), 5);
        assert_eq!(u128::from(frame[4]), engine.checksum(&frame[..4]));
    }

    #[test]
    fn wide_crc_is_zero_extended_into_its_field() {
        // Width 12 occupies two bytes; the top nibble must be zero.
        let engine = CrcEngine::new(12, 0x80F, 0).unwrap();
        let frame = encode(0xDEADBEEF, 4, Some(&engine)).unwrap();
        assert_eq!(frame.len(), 6);
        assert_eq!(frame[4] & 0xF0, 0);
        assert_eq!(decode(&frame[4..]), 0x8C4);
    }

    #[test]
    fn decode_reverses_encode() {
        for word in [0u128, 1, 0xABCD, 0xDEADBEEF, u32::MAX as u128] {
            let frame = encode(word, 4, None).unwrap();
            assert_eq!(decode(&frame), word);
        }
    }

    #[test]
    fn zero_byte_count_is_a_configuration_error() {
        assert!(matches!(
            encode(0, 0, None),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn full_width_word_fits_sixteen_bytes() {
        let frame = encode(u128::MAX, 16, None).unwrap();
        assert_eq!(frame, vec![0xFF; 16]);
        assert_eq!(decode(&frame), u128::MAX);
    }
}
