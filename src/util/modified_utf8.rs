//! The "modified UTF-8" encoding used for `CONSTANT_Utf8` entries (JVMS §4.4.7).
//!
//! It differs from standard UTF-8 in two ways: the null character is written as the two bytes
//! `0xC0 0x80`, and supplementary characters are written as a surrogate pair of three-byte
//! sequences instead of one four-byte sequence.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("illegal byte {byte:#04x} at offset {offset}")]
    IllegalByte { byte: u8, offset: usize },
    #[error("truncated character starting at offset {offset}")]
    Truncated { offset: usize },
    #[error("unpaired surrogate in string")]
    UnpairedSurrogate,
}

fn continuation(bytes: &[u8], offset: usize) -> Result<u16, Error> {
    match bytes.get(offset) {
        Some(&byte) if byte & 0xC0 == 0x80 => Ok((byte & 0x3F) as u16),
        Some(&byte) => Err(Error::IllegalByte { byte, offset }),
        None => Err(Error::Truncated { offset }),
    }
}

/// Decodes modified UTF-8 bytes into a Rust string.
pub fn decode(bytes: &[u8]) -> Result<String, Error> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut offset = 0;
    while offset < bytes.len() {
        let byte = bytes[offset];
        match byte {
            0x01..=0x7F => {
                units.push(byte as u16);
                offset += 1;
            }
            0xC0..=0xDF => {
                let low = continuation(bytes, offset + 1)?;
                units.push((((byte & 0x1F) as u16) << 6) | low);
                offset += 2;
            }
            0xE0..=0xEF => {
                let middle = continuation(bytes, offset + 1)?;
                let low = continuation(bytes, offset + 2)?;
                units.push((((byte & 0x0F) as u16) << 12) | (middle << 6) | low);
                offset += 3;
            }
            _ => return Err(Error::IllegalByte { byte, offset }),
        }
    }
    String::from_utf16(&units).map_err(|_| Error::UnpairedSurrogate)
}

/// Encodes a string as modified UTF-8.
pub fn encode(value: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(value.len());
    for unit in value.encode_utf16() {
        match unit {
            0x0001..=0x007F => bytes.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                bytes.push(0xC0 | (unit >> 6) as u8);
                bytes.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                bytes.push(0xE0 | (unit >> 12) as u8);
                bytes.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                bytes.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::{decode, encode, Error};

    #[test]
    fn ascii_is_unchanged() {
        assert_eq!(decode(b"java/lang/Object").unwrap(), "java/lang/Object");
        assert_eq!(encode("main"), b"main".to_vec());
    }

    #[test]
    fn null_uses_two_bytes() {
        assert_eq!(encode("a\0b"), vec![b'a', 0xC0, 0x80, b'b']);
        assert_eq!(decode(&[b'a', 0xC0, 0x80, b'b']).unwrap(), "a\0b");
    }

    #[test]
    fn supplementary_characters_use_surrogate_pairs() {
        let encoded = encode("\u{1F600}");
        assert_eq!(encoded.len(), 6);
        assert_eq!(decode(&encoded).unwrap(), "\u{1F600}");
    }

    #[test]
    fn rejects_raw_zero_and_four_byte_forms() {
        assert_eq!(decode(&[0x00]), Err(Error::IllegalByte { byte: 0x00, offset: 0 }));
        assert_eq!(decode(&[b'x', 0xF0, 0x9F, 0x98, 0x80]),
                   Err(Error::IllegalByte { byte: 0xF0, offset: 1 }));
    }

    #[test]
    fn rejects_truncated_sequences() {
        assert_eq!(decode(&[0xE2, 0x82]), Err(Error::Truncated { offset: 2 }));
    }
}
