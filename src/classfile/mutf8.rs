//! Modified UTF-8 as used by `CONSTANT_Utf8_info` (JVMS §4.4.7).
//!
//! Two deviations from standard UTF-8 matter here: the NUL character is written as the two byte
//! sequence `C0 80`, and characters outside the Basic Multilingual Plane are written as a UTF-16
//! surrogate pair with each surrogate encoded in three bytes. Four-byte sequences never appear.
//!
//! The constant pool keeps entries as raw bytes so unmodified images re-emit byte-for-byte;
//! these functions are only used when a name has to be compared or created.

use crate::Result;

/// Encode a Rust string as modified UTF-8.
///
/// # Examples
///
/// ```rust
/// use bundleweave::classfile::mutf8;
///
/// assert_eq!(mutf8::encode("abc"), b"abc".to_vec());
/// assert_eq!(mutf8::encode("\0"), vec![0xC0, 0x80]);
/// assert_eq!(mutf8::encode("\u{1F600}").len(), 6);
/// ```
#[must_use]
pub fn encode(value: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    for unit in value.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | ((unit >> 6) & 0x1F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | ((unit >> 12) & 0x0F) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}

/// Decode modified UTF-8 bytes into a Rust string.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for truncated or invalid byte sequences, raw NUL bytes,
/// and unpaired surrogates.
///
/// # Examples
///
/// ```rust
/// use bundleweave::classfile::mutf8;
///
/// let text = "java/util/ResourceBundle\u{0}\u{E9}";
/// assert_eq!(mutf8::decode(&mutf8::encode(text))?, text);
/// # Ok::<(), bundleweave::Error>(())
/// ```
pub fn decode(bytes: &[u8]) -> Result<String> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut index = 0;

    while index < bytes.len() {
        let first = bytes[index];
        match first {
            0x01..=0x7F => {
                units.push(u16::from(first));
                index += 1;
            }
            0xC0..=0xDF => {
                let second = continuation(bytes, index + 1)?;
                units.push((u16::from(first & 0x1F) << 6) | second);
                index += 2;
            }
            0xE0..=0xEF => {
                let second = continuation(bytes, index + 1)?;
                let third = continuation(bytes, index + 2)?;
                units.push((u16::from(first & 0x0F) << 12) | (second << 6) | third);
                index += 3;
            }
            _ => {
                return Err(malformed_error!(
                    "Invalid modified UTF-8 lead byte {:#04x} at {}",
                    first,
                    index
                ))
            }
        }
    }

    String::from_utf16(&units).map_err(|_| malformed_error!("Unpaired surrogate in modified UTF-8"))
}

fn continuation(bytes: &[u8], index: usize) -> Result<u16> {
    match bytes.get(index) {
        Some(byte) if byte & 0xC0 == 0x80 => Ok(u16::from(byte & 0x3F)),
        Some(byte) => Err(malformed_error!(
            "Invalid modified UTF-8 continuation byte {:#04x} at {}",
            byte,
            index
        )),
        None => Err(malformed_error!("Truncated modified UTF-8 sequence")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_is_identity() -> Result<()> {
        let name = "__agent__getObject";
        assert_eq!(encode(name), name.as_bytes());
        assert_eq!(decode(name.as_bytes())?, name);
        Ok(())
    }

    #[test]
    fn nul_uses_two_bytes() -> Result<()> {
        assert_eq!(encode("a\0b"), vec![b'a', 0xC0, 0x80, b'b']);
        assert_eq!(decode(&[b'a', 0xC0, 0x80, b'b'])?, "a\0b");
        assert!(decode(&[b'a', 0x00]).is_err());
        Ok(())
    }

    #[test]
    fn supplementary_characters_use_surrogates() -> Result<()> {
        let encoded = encode("\u{1F600}");
        assert_eq!(encoded, vec![0xED, 0xA0, 0xBD, 0xED, 0xB8, 0x80]);
        assert_eq!(decode(&encoded)?, "\u{1F600}");
        Ok(())
    }

    #[test]
    fn rejects_broken_sequences() {
        assert!(decode(&[0xC3]).is_err());
        assert!(decode(&[0xE2, 0x82]).is_err());
        assert!(decode(&[0xF0, 0x9F, 0x98, 0x80]).is_err());
        assert!(decode(&[0xED, 0xA0, 0xBD]).is_err());
    }
}
