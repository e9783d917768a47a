//! Byte cursor for zero-copy parsing of undocumented binary payloads.
//!
//! [`ByteCursor`] is the only thing in Relic that knows about offsets. It
//! borrows a buffer for one decode pass and hands out sub-slices of it, so a
//! schema can be re-run against a large payload without allocating per field.

use regex::bytes::Regex;

use crate::{Error, Result};

/// The outcome of a delimiter scan.
///
/// `found` is `false` when the delimiter never occurred; `bytes` then holds
/// everything up to the end of the buffer. Callers treat this as a schema
/// mismatch warning, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scan<'a> {
    /// Bytes strictly before the delimiter.
    pub bytes: &'a [u8],
    /// Whether the delimiter was present.
    pub found: bool,
}

/// A read-only cursor over a byte slice.
///
/// # Example
///
/// ```
/// use relic_common::ByteCursor;
///
/// let data = b"hello\0\x01\x00\x00\x00";
/// let mut cursor = ByteCursor::new(data);
///
/// let scan = cursor.read_until(b"\0").unwrap();
/// assert_eq!(scan.bytes, b"hello");
/// assert!(scan.found);
/// assert_eq!(cursor.read(4).unwrap(), &[1, 0, 0, 0]);
/// assert!(cursor.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ByteCursor<'a> {
    /// Create a new cursor at the start of `data`.
    #[inline]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Current offset from the start of the buffer.
    #[inline]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Total length of the underlying buffer.
    #[inline]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Number of bytes between the offset and the end of the buffer.
    #[inline]
    pub const fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// Whether the cursor sits at the end of the buffer.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.position == self.data.len()
    }

    /// The unread part of the buffer.
    #[inline]
    pub fn remaining_bytes(&self) -> &'a [u8] {
        &self.data[self.position..]
    }

    /// Move to an absolute offset.
    pub fn seek(&mut self, position: usize) -> Result<()> {
        if position > self.data.len() {
            return Err(Error::SeekOutOfBounds {
                position,
                len: self.data.len(),
            });
        }
        self.position = position;
        Ok(())
    }

    /// Read exactly `count` bytes and advance past them.
    #[inline]
    pub fn read(&mut self, count: usize) -> Result<&'a [u8]> {
        let bytes = self.peek_bytes(count)?;
        self.position += count;
        Ok(bytes)
    }

    /// Look at the next `count` bytes without advancing.
    #[inline]
    pub fn peek_bytes(&self, count: usize) -> Result<&'a [u8]> {
        if self.remaining() < count {
            return Err(Error::UnexpectedEnd {
                offset: self.position,
                needed: count,
                available: self.remaining(),
            });
        }
        Ok(&self.data[self.position..self.position + count])
    }

    /// Read up to the first occurrence of `delimiter` and skip past it.
    ///
    /// If the delimiter is missing, everything left is returned, the cursor
    /// moves to the end and [`Scan::found`] is `false`. An empty delimiter
    /// is rejected since it would match without consuming anything.
    pub fn read_until(&mut self, delimiter: &[u8]) -> Result<Scan<'a>> {
        if delimiter.is_empty() {
            return Err(Error::EmptyDelimiter {
                offset: self.position,
            });
        }
        let rest = self.remaining_bytes();
        match memchr::memmem::find(rest, delimiter) {
            Some(index) => {
                self.position += index + delimiter.len();
                Ok(Scan {
                    bytes: &rest[..index],
                    found: true,
                })
            }
            None => {
                self.position = self.data.len();
                Ok(Scan {
                    bytes: rest,
                    found: false,
                })
            }
        }
    }

    /// Read up to the first match of `pattern` at or after the offset.
    ///
    /// With `inclusive` the matched bytes are consumed as well; otherwise the
    /// cursor stops at the start of the match so the next field sees it.
    pub fn read_until_pattern(&mut self, pattern: &Regex, inclusive: bool) -> Result<&'a [u8]> {
        let rest = self.remaining_bytes();
        let found = pattern.find(rest).ok_or_else(|| Error::PatternNotFound {
            offset: self.position,
            pattern: pattern.as_str().to_string(),
        })?;

        let end = if inclusive { found.end() } else { found.start() };
        self.position += end;
        Ok(&rest[..end])
    }

    /// Run `read` and restore the offset afterwards, whether it failed or not.
    pub fn peek<T>(&mut self, read: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved = self.position;
        let result = read(self);
        self.position = saved;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_read_exact() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05];
        let mut cursor = ByteCursor::new(&data);

        assert_eq!(cursor.read(2).unwrap(), &[0x01, 0x02]);
        assert_eq!(cursor.position(), 2);
        assert_eq!(cursor.remaining(), 3);
    }

    #[test]
    fn test_read_past_end_fails_without_moving() {
        let data = [0x01, 0x02];
        let mut cursor = ByteCursor::new(&data);

        let err = cursor.read(4).unwrap_err();
        assert!(matches!(
            err,
            Error::UnexpectedEnd {
                offset: 0,
                needed: 4,
                available: 2
            }
        ));
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_read_until_skips_delimiter() {
        let mut cursor = ByteCursor::new(b"ab\0\0cd\0");

        assert_eq!(cursor.read_until(b"\0").unwrap().bytes, b"ab");
        assert_eq!(cursor.read_until(b"\0").unwrap().bytes, b"");
        assert_eq!(cursor.read_until(b"\0").unwrap().bytes, b"cd");
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_read_until_multibyte_delimiter() {
        let mut cursor = ByteCursor::new(b"one\xff\xfetwo");

        let scan = cursor.read_until(b"\xff\xfe").unwrap();
        assert_eq!(scan.bytes, b"one");
        assert_eq!(cursor.remaining_bytes(), b"two");
    }

    #[test]
    fn test_read_until_missing_delimiter_falls_back() {
        let mut cursor = ByteCursor::new(b"xyzno-terminator");
        cursor.read(3).unwrap();

        let scan = cursor.read_until(b"\0").unwrap();
        assert!(!scan.found);
        assert_eq!(scan.bytes, b"no-terminator");
        assert!(cursor.is_empty());
        assert_eq!(cursor.position(), cursor.len());
    }

    #[test]
    fn test_read_until_rejects_empty_delimiter() {
        let mut cursor = ByteCursor::new(b"abc");
        cursor.read(1).unwrap();

        assert!(matches!(
            cursor.read_until(b""),
            Err(Error::EmptyDelimiter { offset: 1 })
        ));
        assert_eq!(cursor.position(), 1);
    }

    #[test]
    fn test_read_until_pattern() {
        let pattern = Regex::new(r"(?-u)[\x00-\x01]{2}\w{5}").unwrap();
        let data = b"\xaa\xbb\xcc\x00\x01Alpha";

        let mut cursor = ByteCursor::new(data);
        assert_eq!(cursor.read_until_pattern(&pattern, false).unwrap(), b"\xaa\xbb\xcc");
        assert_eq!(cursor.position(), 3);

        let mut cursor = ByteCursor::new(data);
        assert_eq!(cursor.read_until_pattern(&pattern, true).unwrap(), data);
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_pattern_searches_from_offset() {
        let pattern = Regex::new("X").unwrap();
        let mut cursor = ByteCursor::new(b"X..X");
        cursor.read(1).unwrap();

        assert_eq!(cursor.read_until_pattern(&pattern, false).unwrap(), b"..");
        assert_eq!(cursor.position(), 3);
    }

    #[test]
    fn test_pattern_not_found() {
        let pattern = Regex::new("zzz").unwrap();
        let mut cursor = ByteCursor::new(b"abc");
        cursor.read(1).unwrap();

        let err = cursor.read_until_pattern(&pattern, false).unwrap_err();
        assert!(matches!(err, Error::PatternNotFound { offset: 1, .. }));
        assert_eq!(cursor.position(), 1);
    }

    #[test]
    fn test_peek_restores_offset() {
        let mut cursor = ByteCursor::new(b"name\0rest");

        let scan = cursor.peek(|c| c.read_until(b"\0")).unwrap();
        assert_eq!(scan.bytes, b"name");
        assert_eq!(cursor.position(), 0);

        assert!(cursor.peek(|c| c.read(100)).is_err());
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_seek_bounds() {
        let mut cursor = ByteCursor::new(&[0u8; 4]);
        cursor.seek(4).unwrap();
        assert!(cursor.is_empty());
        assert!(matches!(
            cursor.seek(5),
            Err(Error::SeekOutOfBounds { position: 5, len: 4 })
        ));
    }

    proptest! {
        #[test]
        fn offset_advances_by_consumed_bytes(
            data in proptest::collection::vec(any::<u8>(), 0..64),
            count in 0usize..16,
        ) {
            let mut cursor = ByteCursor::new(&data);
            let before = cursor.position();
            match cursor.read(count) {
                Ok(bytes) => {
                    prop_assert_eq!(bytes.len(), count);
                    prop_assert_eq!(cursor.position(), before + count);
                }
                Err(_) => prop_assert_eq!(cursor.position(), before),
            }
        }

        #[test]
        fn delimited_read_never_moves_backwards(
            data in proptest::collection::vec(0u8..4, 0..64),
        ) {
            let mut cursor = ByteCursor::new(&data);
            while !cursor.is_empty() {
                let before = cursor.position();
                let scan = cursor.read_until(&[0]).unwrap();
                let consumed = scan.bytes.len() + usize::from(scan.found);
                prop_assert_eq!(cursor.position(), before + consumed);
                prop_assert!(cursor.position() > before);
                prop_assert!(cursor.position() <= cursor.len());
            }
        }
    }
}
