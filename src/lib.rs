#![warn(rust_2018_idioms)]

//! Reader for OpenType and TrueType font files.
//!
//! `xtf` exposes the table directory, the character to glyph mapping (`cmap`) table and, for
//! PostScript flavoured fonts, the Compact Font Format (`CFF `) table including a decoder for the
//! Type 2 charstrings that describe each glyph.
//!
//! ```no_run
//! use xtf::reader::XtfReader;
//! use xtf::tables::cmap::{EncodingId, PlatformId};
//!
//! # fn main() -> Result<(), xtf::error::ParseError> {
//! let data = std::fs::read("font.otf").expect("unable to read font");
//! let reader = XtfReader::new(&data)?;
//! let name = reader.map_char_code_to_glyph_name(
//!     0x41,
//!     0,
//!     PlatformId::WINDOWS,
//!     EncodingId::WINDOWS_UNICODE_BMP_UCS2,
//! )?;
//! println!("{} -> {}", reader.font_family_name()?, name);
//! # Ok(())
//! # }
//! ```

/// Reading of binary data.
pub mod binary;
pub mod cff;
/// Checksum calculation routines.
pub mod checksum;
pub mod error;
pub mod get_name;
pub mod reader;
pub mod size;
pub mod tables;
pub mod tag;
/// Shared test code.
#[cfg(test)]
pub mod tests;
