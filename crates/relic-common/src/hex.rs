//! Hex pair formatting used for opaque byte runs.
//!
//! Unknown byte runs are shown to humans as upper-case, space separated
//! pairs (`"DE AD BE EF"`), which is also the form they take in the JSON
//! interchange files.

use std::fmt::Write;

use crate::{Error, Result};

/// Format bytes as `"DE AD BE EF"`.
pub fn to_hex_pairs(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 3);
    for (index, byte) in bytes.iter().enumerate() {
        if index > 0 {
            output.push(' ');
        }
        // Writing into a String cannot fail.
        let _ = write!(output, "{:02X}", byte);
    }
    output
}

/// Parse a hex pair string back into bytes.
///
/// Whitespace between pairs is optional and either case is accepted.
pub fn from_hex_pairs(text: &str) -> Result<Vec<u8>> {
    let digits: Vec<u8> = text.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return Err(Error::InvalidHex(format!(
            "odd number of hex digits in {:?}",
            text
        )));
    }

    digits
        .chunks_exact(2)
        .map(|pair| match (nibble(pair[0]), nibble(pair[1])) {
            (Some(high), Some(low)) => Ok((high << 4) | low),
            _ => Err(Error::InvalidHex(format!(
                "invalid pair {:?} in {:?}",
                String::from_utf8_lossy(pair),
                text
            ))),
        })
        .collect()
}

/// Format bytes as space separated 8-bit binary groups.
pub fn to_binary_groups(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:08b}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

fn nibble(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_pairs() {
        assert_eq!(to_hex_pairs(&[0x10, 0x00, 0xde, 0xad]), "10 00 DE AD");
        assert_eq!(to_hex_pairs(&[]), "");
    }

    #[test]
    fn test_parse_hex_pairs() {
        assert_eq!(from_hex_pairs("10 00 DE AD").unwrap(), vec![0x10, 0x00, 0xde, 0xad]);
        assert_eq!(from_hex_pairs("beef").unwrap(), vec![0xbe, 0xef]);
        assert_eq!(from_hex_pairs("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(from_hex_pairs("ABC").is_err());
        assert!(from_hex_pairs("ZZ").is_err());
    }

    #[test]
    fn test_binary_groups() {
        assert_eq!(to_binary_groups(&[0x01, 0xff]), "00000001 11111111");
    }
}
