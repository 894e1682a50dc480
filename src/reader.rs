//! High level access to the tables of a font file.
//!
//! [XtfReader] parses the table directory up front and every other table the first time it is
//! asked for. Parsed tables, including failures, are kept for the lifetime of the reader so a
//! damaged table keeps failing the same way while the rest of the font stays usable.

use log::{debug, warn};
use once_cell::sync::OnceCell;

use crate::binary::read::ReadScope;
use crate::cff::charstring::CharString;
use crate::cff::{CffFont, CffTable};
use crate::error::ParseError;
use crate::tables::cmap::{Cmap, EncodingId, PlatformId};
use crate::tables::{MaxpTable, NameTable, OffsetTable};
use crate::tag::{self, DisplayTag};

/// Reader for a single OpenType or TrueType font held in memory.
pub struct XtfReader<'a> {
    scope: ReadScope<'a>,
    offset_table: OffsetTable<'a>,
    cmap: OnceCell<Result<Cmap<'a>, ParseError>>,
    cff: OnceCell<Result<CffTable<'a>, ParseError>>,
    maxp: OnceCell<Result<MaxpTable, ParseError>>,
    name: OnceCell<Result<NameTable<'a>, ParseError>>,
}

impl<'a> XtfReader<'a> {
    /// Read the table directory of the font in `data`.
    ///
    /// Tables whose checksum does not match the directory are logged but still readable.
    pub fn new(data: &'a [u8]) -> Result<Self, ParseError> {
        let scope = ReadScope::new(data);
        let offset_table = scope.read::<OffsetTable<'_>>()?;
        let mismatches = offset_table.validate_checksums(&scope);
        if mismatches > 0 {
            warn!("{} table checksum(s) failed to validate", mismatches);
        }

        Ok(XtfReader {
            scope,
            offset_table,
            cmap: OnceCell::new(),
            cff: OnceCell::new(),
            maxp: OnceCell::new(),
            name: OnceCell::new(),
        })
    }

    pub fn offset_table(&self) -> &OffsetTable<'a> {
        &self.offset_table
    }

    /// The raw bytes of the table identified by `tag`, if the font has it.
    pub fn table(&self, tag: u32) -> Option<&'a [u8]> {
        self.offset_table.table(&self.scope, tag)
    }

    fn load<'s, T, F>(
        &'s self,
        cell: &'s OnceCell<Result<T, ParseError>>,
        tag: u32,
        parse: F,
    ) -> Result<&'s T, ParseError>
    where
        F: FnOnce(ReadScope<'a>) -> Result<T, ParseError>,
    {
        cell.get_or_init(|| {
            debug!("loading table '{}'", DisplayTag(tag));
            let table = self
                .offset_table
                .read_table(&self.scope, tag)?
                .ok_or(ParseError::MissingTable(tag))?;
            parse(table)
        })
        .as_ref()
        .map_err(Clone::clone)
    }

    pub fn cmap_table(&self) -> Result<&Cmap<'a>, ParseError> {
        self.load(&self.cmap, tag::CMAP, |scope| scope.read::<Cmap<'_>>())
    }

    pub fn cff_table(&self) -> Result<&CffTable<'a>, ParseError> {
        self.load(&self.cff, tag::CFF, |scope| scope.read::<CffTable<'_>>())
    }

    pub fn maxp_table(&self) -> Result<&MaxpTable, ParseError> {
        self.load(&self.maxp, tag::MAXP, |scope| scope.read::<MaxpTable>())
    }

    pub fn name_table(&self) -> Result<&NameTable<'a>, ParseError> {
        self.load(&self.name, tag::NAME, |scope| scope.read::<NameTable<'_>>())
    }

    fn cff_font(&self, font_index: usize) -> Result<&CffFont<'a>, ParseError> {
        self.cff_table()?.font(font_index)
    }

    /// The family name of the font.
    ///
    /// The `FamilyName` of the first CFF font is preferred, falling back to name ID 1 of the
    /// `name` table.
    pub fn font_family_name(&self) -> Result<String, ParseError> {
        match self.cff_font(0) {
            Ok(font) => {
                if let Some(family_name) = font.family_name()? {
                    return Ok(family_name.to_string());
                }
            }
            Err(ParseError::MissingTable(_)) => {}
            Err(err) => warn!("unable to read CFF family name: {}", err),
        }

        self.name_table()?
            .string_for_id(NameTable::FONT_FAMILY_NAME)?
            .ok_or(ParseError::MissingValue)
    }

    /// The number of glyphs in the font, from `maxp` or failing that the CFF CharStrings INDEX.
    pub fn number_of_glyphs(&self) -> Result<usize, ParseError> {
        match self.maxp_table() {
            Ok(maxp) => Ok(usize::from(maxp.num_glyphs)),
            Err(ParseError::MissingTable(_)) => Ok(self.cff_font(0)?.num_glyphs()),
            Err(err) => Err(err),
        }
    }

    /// Map a character code to a glyph index through the `cmap` subtable for `platform_id` and
    /// `encoding_id`.
    pub fn map_char_code_to_glyph_index(
        &self,
        char_code: u32,
        platform_id: PlatformId,
        encoding_id: EncodingId,
    ) -> Result<u16, ParseError> {
        self.cmap_table()?.lookup(char_code, platform_id, encoding_id)
    }

    /// Map a character code to the name of its glyph in CFF font `font_index`.
    pub fn map_char_code_to_glyph_name(
        &self,
        char_code: u32,
        font_index: usize,
        platform_id: PlatformId,
        encoding_id: EncodingId,
    ) -> Result<String, ParseError> {
        let glyph_index = self.map_char_code_to_glyph_index(char_code, platform_id, encoding_id)?;
        self.cff_font(font_index)?.glyph_name(glyph_index)
    }

    /// Map a character code to the advance width of its glyph in CFF font `font_index`.
    pub fn map_char_code_to_width(
        &self,
        char_code: u32,
        font_index: usize,
        platform_id: PlatformId,
        encoding_id: EncodingId,
    ) -> Result<f64, ParseError> {
        let glyph_index = self.map_char_code_to_glyph_index(char_code, platform_id, encoding_id)?;
        let charstring = self.cff_font(font_index)?.charstring(glyph_index)?;
        Ok(charstring.width())
    }

    /// The advance width of the glyph called `glyph_name` in CFF font `font_index`.
    pub fn map_glyph_name_to_width(
        &self,
        glyph_name: &str,
        font_index: usize,
    ) -> Result<f64, ParseError> {
        let charstring = self.cff_font(font_index)?.charstring_by_name(glyph_name)?;
        Ok(charstring.width())
    }

    pub fn glyph_name(&self, glyph_index: u16) -> Result<String, ParseError> {
        self.cff_font(0)?.glyph_name(glyph_index)
    }

    /// The decoded charstring of `glyph_index` in the first CFF font.
    pub fn charstring(&self, glyph_index: u16) -> Result<&CharString, ParseError> {
        self.cff_font(0)?.charstring(glyph_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{self as fixtures, garamond_otf, truetype_without_cff};

    #[test]
    fn test_bad_magic() {
        let data = [0x77, 0x4F, 0x46, 0x46, 0, 0, 0, 0, 0, 0, 0, 0];
        assert!(matches!(
            XtfReader::new(&data),
            Err(ParseError::UnsupportedSfntVersion(0x774F4646))
        ));
    }

    #[test]
    fn test_tables_are_memoized() {
        let data = garamond_otf();
        let reader = XtfReader::new(&data).unwrap();

        let first = reader.cff_table().unwrap();
        let second = reader.cff_table().unwrap();
        assert!(std::ptr::eq(first, second));
        assert!(std::ptr::eq(
            reader.cmap_table().unwrap(),
            reader.cmap_table().unwrap()
        ));
    }

    #[test]
    fn test_table_bytes() {
        let data = garamond_otf();
        let reader = XtfReader::new(&data).unwrap();

        assert!(reader.offset_table().is_cff());
        assert_eq!(reader.table(tag::MAXP).map(<[u8]>::len), Some(6));
        assert_eq!(reader.table(tag::HEAD), None);
    }

    #[test]
    fn test_glyph_lookups() {
        let data = garamond_otf();
        let reader = XtfReader::new(&data).unwrap();

        assert_eq!(reader.glyph_name(fixtures::GID_A).unwrap(), "A");
        assert_eq!(
            reader.map_char_code_to_glyph_index(
                0x41,
                PlatformId::MACINTOSH,
                EncodingId::MACINTOSH_APPLE_ROMAN
            ),
            Ok(fixtures::GID_A)
        );
        assert_eq!(reader.charstring(fixtures::GID_B).unwrap().width(), 500.0);
        assert_eq!(reader.map_glyph_name_to_width("space", 0), Ok(250.0));
        assert_eq!(
            reader.map_glyph_name_to_width("space", 1),
            Err(ParseError::IndexOutOfRange)
        );
    }

    #[test]
    fn test_truetype_falls_back_to_name_and_maxp() {
        let data = truetype_without_cff();
        let reader = XtfReader::new(&data).unwrap();

        assert!(!reader.offset_table().is_cff());
        assert_eq!(reader.font_family_name().unwrap(), "Plain Sans");
        assert_eq!(reader.number_of_glyphs(), Ok(96));
        assert_eq!(
            reader.cff_table().err(),
            Some(ParseError::MissingTable(tag::CFF))
        );
        assert_eq!(
            reader.map_char_code_to_glyph_index(
                0x20,
                PlatformId::WINDOWS,
                EncodingId::WINDOWS_UNICODE_BMP_UCS2
            ),
            Ok(fixtures::GID_SPACE)
        );
        assert_eq!(
            reader.map_char_code_to_glyph_name(
                0x20,
                0,
                PlatformId::WINDOWS,
                EncodingId::WINDOWS_UNICODE_BMP_UCS2
            ),
            Err(ParseError::MissingTable(tag::CFF))
        );
    }

    #[test]
    fn test_missing_cmap_subtable() {
        let data = garamond_otf();
        let reader = XtfReader::new(&data).unwrap();

        assert_eq!(
            reader.map_char_code_to_glyph_index(
                0x41,
                PlatformId::UNICODE,
                EncodingId::UNICODE_BMP
            ),
            Err(ParseError::CmapSubtableNotFound {
                platform_id: 0,
                encoding_id: 3
            })
        );
    }
}
