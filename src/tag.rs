//! Four byte table tags.

use crate::error::ParseError;
use std::fmt;

/// Generate a 4-byte font table tag from byte string
///
/// Example:
///
/// ```
/// assert_eq!(xtf::tag::CMAP, 0x636D6170);
/// ```
macro_rules! tag {
    ($w:expr) => {
        tag(*$w)
    };
}

/// Wrapper that formats a tag as its four characters, or as hex when it is not printable.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct DisplayTag(pub u32);

const fn tag(chars: [u8; 4]) -> u32 {
    u32::from_be_bytes(chars)
}

/// Build a tag from a string of up to four ASCII characters, padding with spaces.
pub fn from_string(s: &str) -> Result<u32, ParseError> {
    if s.len() > 4 {
        return Err(ParseError::BadValue);
    }

    let mut bytes = [b' '; 4];
    for (slot, c) in bytes.iter_mut().zip(s.chars()) {
        if !c.is_ascii() || c.is_ascii_control() {
            return Err(ParseError::BadValue);
        }
        *slot = c as u8;
    }

    Ok(tag(bytes))
}

impl fmt::Display for DisplayTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0.to_be_bytes();
        if bytes.iter().all(|b| b.is_ascii() && !b.is_ascii_control()) {
            bytes.iter().try_for_each(|&b| write!(f, "{}", char::from(b)))
        } else {
            write!(f, "0x{:08x}", self.0)
        }
    }
}

impl fmt::Debug for DisplayTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string())
    }
}

pub const CFF: u32 = tag!(b"CFF ");
pub const CMAP: u32 = tag!(b"cmap");
pub const HEAD: u32 = tag!(b"head");
pub const HHEA: u32 = tag!(b"hhea");
pub const HMTX: u32 = tag!(b"hmtx");
pub const MAXP: u32 = tag!(b"maxp");
pub const NAME: u32 = tag!(b"name");
pub const OS_2: u32 = tag!(b"OS/2");
pub const OTTO: u32 = tag!(b"OTTO");
pub const POST: u32 = tag!(b"post");
pub const TRUE: u32 = tag!(b"true");

#[cfg(test)]
mod tests {
    use super::*;

    mod from_string {
        use super::*;

        #[test]
        fn test_four_chars() {
            assert_eq!(from_string("cmap"), Ok(CMAP));
        }

        #[test]
        fn test_short_tag_is_space_padded() {
            assert_eq!(from_string("CFF"), Ok(CFF));
        }

        #[test]
        fn test_rejects_long_and_control() {
            assert_eq!(from_string("cmaps"), Err(ParseError::BadValue));
            assert_eq!(from_string("a\tb"), Err(ParseError::BadValue));
        }
    }

    mod display_tag {
        use crate::tag::{DisplayTag, OS_2};

        #[test]
        fn test_ascii() {
            assert_eq!(DisplayTag(OS_2).to_string(), "OS/2");
            assert_eq!(format!("{:?}", DisplayTag(OS_2)), "\"OS/2\"");
        }

        #[test]
        fn test_non_ascii() {
            assert_eq!(DisplayTag(0x12345678).to_string(), "0x12345678");
        }
    }
}
