//! Error types

use crate::binary::read::ReadEof;
use crate::cff::charstring::CharStringError;
use crate::tag::DisplayTag;
use std::fmt;

/// Errors that originate when parsing binary data
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ParseError {
    /// The data ended before a structure was complete.
    TruncatedData,
    BadValue,
    BadVersion,
    BadOffset,
    /// The font file does not start with a known sfnt version tag.
    UnsupportedSfntVersion(u32),
    /// A `cmap` subtable uses a format that is not decoded.
    UnsupportedCmapFormat(u16),
    /// A glyph, INDEX entry or subroutine index has no backing data.
    IndexOutOfRange,
    /// A string id is neither a standard string nor present in the String INDEX.
    StringIndexOutOfRange(u16),
    LimitExceeded,
    MissingValue,
    MissingTable(u32),
    /// A Type 2 charstring could not be decoded.
    MalformedCharstring(MalformedCharstring),
    /// The `cmap` table has no subtable for the requested platform and encoding.
    CmapSubtableNotFound { platform_id: u16, encoding_id: u16 },
    NotImplemented,
}

/// Details of a charstring that failed to decode.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct MalformedCharstring {
    /// Name of the glyph the charstring belongs to.
    pub glyph_name: String,
    /// Offset of the failing byte within the charstring or subroutine being executed.
    pub offset: usize,
    pub reason: CharStringError,
}

impl From<ReadEof> for ParseError {
    fn from(_error: ReadEof) -> Self {
        ParseError::TruncatedData
    }
}

impl From<std::num::TryFromIntError> for ParseError {
    fn from(_error: std::num::TryFromIntError) -> Self {
        ParseError::BadValue
    }
}

impl From<MalformedCharstring> for ParseError {
    fn from(error: MalformedCharstring) -> Self {
        ParseError::MalformedCharstring(error)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::TruncatedData => write!(f, "end of data reached unexpectedly"),
            ParseError::BadValue => write!(f, "invalid value"),
            ParseError::BadVersion => write!(f, "unexpected data version"),
            ParseError::BadOffset => write!(f, "invalid data offset"),
            ParseError::UnsupportedSfntVersion(version) => {
                write!(f, "unsupported sfnt version 0x{:08x}", version)
            }
            ParseError::UnsupportedCmapFormat(format) => {
                write!(f, "unsupported cmap subtable format {}", format)
            }
            ParseError::IndexOutOfRange => write!(f, "index out of range"),
            ParseError::StringIndexOutOfRange(sid) => {
                write!(f, "string id {} is out of range", sid)
            }
            ParseError::LimitExceeded => write!(f, "limit exceeded"),
            ParseError::MissingValue => write!(f, "an expected data value was missing"),
            ParseError::MissingTable(tag) => {
                write!(f, "font is missing '{}' table", DisplayTag(*tag))
            }
            ParseError::MalformedCharstring(err) => err.fmt(f),
            ParseError::CmapSubtableNotFound {
                platform_id,
                encoding_id,
            } => write!(
                f,
                "no cmap subtable for platform {} encoding {}",
                platform_id, encoding_id
            ),
            ParseError::NotImplemented => write!(f, "feature not implemented"),
        }
    }
}

impl std::error::Error for ParseError {}

impl fmt::Display for MalformedCharstring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "malformed charstring for glyph '{}' at byte {}: {}",
            self.glyph_name, self.offset, self.reason
        )
    }
}

impl std::error::Error for MalformedCharstring {}
