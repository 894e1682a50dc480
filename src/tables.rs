//! OpenType font table directory and the small tables the reader needs.

pub mod cmap;

use crate::binary::read::{ReadArray, ReadBinary, ReadCtxt, ReadFrom, ReadScope};
use crate::binary::{I32Be, U16Be, U32Be};
use crate::checksum;
use crate::error::ParseError;
use crate::get_name;
use crate::size;
use crate::tag::{self, DisplayTag};

use log::{debug, warn};
use std::convert::TryFrom;

/// Magic value identifying a CFF font (`OTTO`)
pub const CFF_MAGIC: u32 = tag::OTTO;

/// Magic number identifying TrueType 1.0
///
/// The version number 1.0 as a 16.16 fixed-point value, indicating TrueType glyph data.
pub const TTF_MAGIC: u32 = 0x00010000;

/// Magic value used by Apple for TrueType fonts (`true`)
pub const APPLE_TTF_MAGIC: u32 = tag::TRUE;

/// 32-bit signed fixed-point number (16.16)
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Fixed(i32);

/// The F2DOT14 format consists of a signed, 2’s complement integer and an unsigned fraction.
///
/// To compute the actual value, take the integer and add the fraction.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct F2Dot14(u16);

/// OpenType Offset Table
///
/// <https://docs.microsoft.com/en-us/typography/opentype/spec/otff#organization-of-an-opentype-font>
#[derive(Clone, Debug)]
pub struct OffsetTable<'a> {
    pub sfnt_version: u32,
    pub search_range: u16,
    pub entry_selector: u16,
    pub range_shift: u16,
    pub table_records: ReadArray<'a, TableRecord>,
}

/// An entry in the Offset Table
///
/// <https://docs.microsoft.com/en-us/typography/opentype/spec/otff#organization-of-an-opentype-font>
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Hash)]
pub struct TableRecord {
    pub table_tag: u32,
    pub checksum: u32,
    pub offset: u32,
    pub length: u32,
}

/// `maxp` table
///
/// Only the glyph count is read. The TrueType specific fields of version 1.0 are skipped.
///
/// <https://docs.microsoft.com/en-us/typography/opentype/spec/maxp>
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct MaxpTable {
    pub version: u32,
    pub num_glyphs: u16,
}

/// `name` table
///
/// <https://docs.microsoft.com/en-us/typography/opentype/spec/name>
pub struct NameTable<'a> {
    pub string_storage: ReadScope<'a>,
    pub name_records: ReadArray<'a, NameRecord>,
    pub opt_langtag_records: Option<ReadArray<'a, LangTagRecord>>,
}

/// Record within the `name` table
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct NameRecord {
    pub platform_id: u16,
    pub encoding_id: u16,
    pub language_id: u16,
    pub name_id: u16,
    pub length: u16,
    pub offset: u16,
}

/// Language-tag record within the `name` table
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LangTagRecord {
    pub length: u16,
    pub offset: u16,
}

impl NameTable<'_> {
    pub const COPYRIGHT_NOTICE: u16 = 0;
    pub const FONT_FAMILY_NAME: u16 = 1;
    pub const FONT_SUBFAMILY_NAME: u16 = 2;
    pub const UNIQUE_IDENTIFIER: u16 = 3;
    pub const FULL_FONT_NAME: u16 = 4;
    pub const VERSION_STRING: u16 = 5;
    pub const POSTSCRIPT_NAME: u16 = 6;
    pub const TYPOGRAPHIC_FAMILY_NAME: u16 = 16;

    /// Decode the best available string for `name_id`.
    ///
    /// Records in encodings that cannot be decoded are skipped.
    pub fn string_for_id(&self, name_id: u16) -> Result<Option<String>, ParseError> {
        get_name::best_name(self, name_id)
    }
}

impl ReadBinary for OffsetTable<'_> {
    type HostType<'a> = OffsetTable<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<OffsetTable<'a>, ParseError> {
        let sfnt_version = ctxt.read_u32be()?;
        match sfnt_version {
            TTF_MAGIC | CFF_MAGIC | APPLE_TTF_MAGIC => {
                let num_tables = ctxt.read_u16be()?;
                let search_range = ctxt.read_u16be()?;
                let entry_selector = ctxt.read_u16be()?;
                let range_shift = ctxt.read_u16be()?;
                let table_records = ctxt.read_array::<TableRecord>(usize::from(num_tables))?;
                Ok(OffsetTable {
                    sfnt_version,
                    search_range,
                    entry_selector,
                    range_shift,
                    table_records,
                })
            }
            _ => Err(ParseError::UnsupportedSfntVersion(sfnt_version)),
        }
    }
}

impl ReadFrom for TableRecord {
    type ReadType = ((U32Be, U32Be), (U32Be, U32Be));
    fn read_from(((table_tag, checksum), (offset, length)): ((u32, u32), (u32, u32))) -> Self {
        TableRecord {
            table_tag,
            checksum,
            offset,
            length,
        }
    }
}

impl<'a> OffsetTable<'a> {
    /// True if the font carries PostScript (CFF) outlines.
    pub fn is_cff(&self) -> bool {
        self.sfnt_version == CFF_MAGIC
    }

    pub fn find_table_record(&self, tag: u32) -> Option<TableRecord> {
        self.table_records
            .iter()
            .find(|table_record| table_record.table_tag == tag)
    }

    /// Return the scope of the table identified by `tag`, if the font has one.
    ///
    /// A record that points outside of `scope` is an error.
    pub fn read_table(
        &self,
        scope: &ReadScope<'a>,
        tag: u32,
    ) -> Result<Option<ReadScope<'a>>, ParseError> {
        match self.find_table_record(tag) {
            Some(table_record) => table_record.read_table(scope).map(Some),
            None => Ok(None),
        }
    }

    /// Return the bytes of the table identified by `tag`.
    ///
    /// Absent tables and tables whose record points outside of `scope` yield `None`.
    pub fn table(&self, scope: &ReadScope<'a>, tag: u32) -> Option<&'a [u8]> {
        match self.read_table(scope, tag) {
            Ok(table) => table.map(|table| table.data()),
            Err(err) => {
                warn!("table '{}' is unreadable: {}", DisplayTag(tag), err);
                None
            }
        }
    }

    /// Compare each table's checksum against its record, logging any that disagree.
    ///
    /// Returns the number of tables that failed validation. Mismatches never prevent the font
    /// from loading.
    pub fn validate_checksums(&self, scope: &ReadScope<'a>) -> usize {
        let mut failures = 0;
        for table_record in &self.table_records {
            let tag = DisplayTag(table_record.table_tag);
            match table_record.verify_checksum(scope) {
                Ok(true) => debug!("table '{}' checksum ok", tag),
                Ok(false) => {
                    warn!("table '{}' checksum mismatch", tag);
                    failures += 1;
                }
                Err(err) => {
                    warn!("table '{}' record is invalid: {}", tag, err);
                    failures += 1;
                }
            }
        }
        failures
    }
}

impl TableRecord {
    pub const SIZE: usize = 4 * size::U32;

    pub fn read_table<'a>(&self, scope: &ReadScope<'a>) -> Result<ReadScope<'a>, ParseError> {
        let offset = usize::try_from(self.offset)?;
        let length = usize::try_from(self.length)?;
        scope.offset_length(offset, length)
    }

    /// Compute the checksum of the table data and compare it with the recorded value.
    pub fn verify_checksum(&self, scope: &ReadScope<'_>) -> Result<bool, ParseError> {
        let table = self.read_table(scope)?;
        let actual = checksum::checksum_for_tag(self.table_tag, table.data())?;
        Ok(actual.0 == self.checksum)
    }
}

impl ReadBinary for MaxpTable {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let version = ctxt.read_u32be()?;
        ctxt.check_version(version == 0x00005000 || version == 0x00010000)?;
        let num_glyphs = ctxt.read_u16be()?;
        Ok(MaxpTable {
            version,
            num_glyphs,
        })
    }
}

impl ReadBinary for NameTable<'_> {
    type HostType<'a> = NameTable<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<NameTable<'a>, ParseError> {
        let scope = ctxt.scope();

        let format = ctxt.read_u16be()?;
        ctxt.check_version(format <= 1)?;
        let count = usize::from(ctxt.read_u16be()?);
        let string_offset = usize::from(ctxt.read_u16be()?);
        let string_storage = scope.offset(string_offset);
        let name_records = ctxt.read_array::<NameRecord>(count)?;
        let opt_langtag_records = if format > 0 {
            let langtag_count = usize::from(ctxt.read_u16be()?);
            Some(ctxt.read_array::<LangTagRecord>(langtag_count)?)
        } else {
            None
        };

        Ok(NameTable {
            string_storage,
            name_records,
            opt_langtag_records,
        })
    }
}

impl ReadFrom for NameRecord {
    type ReadType = ((U16Be, U16Be, U16Be), (U16Be, U16Be, U16Be));
    fn read_from(
        ((platform_id, encoding_id, language_id), (name_id, length, offset)): (
            (u16, u16, u16),
            (u16, u16, u16),
        ),
    ) -> Self {
        NameRecord {
            platform_id,
            encoding_id,
            language_id,
            name_id,
            length,
            offset,
        }
    }
}

impl ReadFrom for LangTagRecord {
    type ReadType = (U16Be, U16Be);
    fn read_from((length, offset): (u16, u16)) -> Self {
        LangTagRecord { length, offset }
    }
}

impl ReadFrom for F2Dot14 {
    type ReadType = U16Be;

    fn read_from(value: u16) -> Self {
        F2Dot14(value)
    }
}

impl Fixed {
    pub fn new(value: i32) -> Fixed {
        Fixed(value)
    }

    /// The raw 16.16 representation.
    pub fn raw_value(self) -> i32 {
        self.0
    }

    /// The integer part, rounding towards zero.
    pub fn trunc(self) -> i32 {
        self.0 / 0x10000
    }
}

impl ReadFrom for Fixed {
    type ReadType = I32Be;

    fn read_from(value: i32) -> Self {
        Fixed(value)
    }
}

impl From<Fixed> for f32 {
    fn from(value: Fixed) -> f32 {
        f64::from(value) as f32
    }
}

impl From<Fixed> for f64 {
    fn from(value: Fixed) -> f64 {
        f64::from(value.0) / 65536.0
    }
}

impl F2Dot14 {
    pub fn new(value: u16) -> Self {
        F2Dot14(value)
    }
}

impl From<F2Dot14> for f32 {
    fn from(value: F2Dot14) -> Self {
        // The top two bits are a signed integer, the remaining 14 bits an unsigned fraction.
        let int = f32::from((value.0 as i16) >> 14);
        let fraction = value.0 & 0x3FFF;
        int + (f32::from(fraction) / 16384.)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::writer::{self, TtfType::*};

    fn directory(version: u32, records: &[(u32, u32, u32, u32)]) -> Vec<u8> {
        let mut fields = vec![
            U32(version),
            U16(records.len() as u16),
            U16(0),
            U16(0),
            U16(0),
        ];
        for &(tag, checksum, offset, length) in records {
            fields.extend_from_slice(&[U32(tag), U32(checksum), U32(offset), U32(length)]);
        }
        writer::convert(&fields)
    }

    #[test]
    fn test_read_offset_table() {
        let mut data = directory(CFF_MAGIC, &[(tag::CMAP, 1, 28, 4)]);
        data.extend_from_slice(&[0, 0, 0, 1]);
        let scope = ReadScope::new(&data);
        let offset_table = scope.read::<OffsetTable<'_>>().unwrap();

        assert!(offset_table.is_cff());
        assert_eq!(offset_table.table_records.len(), 1);
        assert_eq!(offset_table.table(&scope, tag::CMAP), Some(&[0u8, 0, 0, 1][..]));
        assert_eq!(offset_table.table(&scope, tag::HEAD), None);
        assert_eq!(offset_table.validate_checksums(&scope), 0);
    }

    #[test]
    fn test_unsupported_sfnt_version() {
        let data = directory(0x774F4646, &[]);
        match ReadScope::new(&data).read::<OffsetTable<'_>>() {
            Err(ParseError::UnsupportedSfntVersion(0x774F4646)) => {}
            _ => panic!("expected UnsupportedSfntVersion"),
        }
    }

    #[test]
    fn test_truncated_directory() {
        let mut data = directory(TTF_MAGIC, &[(tag::CMAP, 0, 28, 4)]);
        data.truncate(20);
        assert_eq!(
            ReadScope::new(&data).read::<OffsetTable<'_>>().err(),
            Some(ParseError::TruncatedData)
        );
    }

    #[test]
    fn test_record_outside_buffer() {
        let data = directory(TTF_MAGIC, &[(tag::CMAP, 0, 28, 400)]);
        let scope = ReadScope::new(&data);
        let offset_table = scope.read::<OffsetTable<'_>>().unwrap();

        assert!(offset_table.read_table(&scope, tag::CMAP).is_err());
        assert_eq!(offset_table.table(&scope, tag::CMAP), None);
        assert_eq!(offset_table.validate_checksums(&scope), 1);
    }

    #[test]
    fn test_checksum_mismatch_is_counted() {
        let mut data = directory(TTF_MAGIC, &[(tag::MAXP, 0xBAD, 28, 6)]);
        data.extend_from_slice(&writer::convert(&[U32(0x00005000), U16(3)]));
        let scope = ReadScope::new(&data);
        let offset_table = scope.read::<OffsetTable<'_>>().unwrap();

        assert_eq!(offset_table.validate_checksums(&scope), 1);
        // A bad checksum does not stop the table from being read.
        let maxp = offset_table
            .read_table(&scope, tag::MAXP)
            .unwrap()
            .unwrap()
            .read::<MaxpTable>()
            .unwrap();
        assert_eq!(maxp.num_glyphs, 3);
    }

    #[test]
    fn test_maxp_bad_version() {
        let data = writer::convert(&[U32(0x00020000), U16(3)]);
        assert_eq!(
            ReadScope::new(&data).read::<MaxpTable>(),
            Err(ParseError::BadVersion)
        );
    }

    #[test]
    fn f32_from_f2dot14() {
        // Examples from https://docs.microsoft.com/en-us/typography/opentype/spec/otff#data-types
        assert_close(f32::from(F2Dot14(0x7fff)), 1.999939);
        assert_close(f32::from(F2Dot14(0x7000)), 1.75);
        assert_close(f32::from(F2Dot14(0x0001)), 0.000061);
        assert_close(f32::from(F2Dot14(0x0000)), 0.0);
        assert_close(f32::from(F2Dot14(0xffff)), -0.000061);
        assert_close(f32::from(F2Dot14(0x8000)), -2.0);
    }

    #[test]
    fn f32_from_fixed() {
        assert_close(f32::from(Fixed(0x7fff_0000)), 32767.);
        assert_close(f32::from(Fixed(0x0001_0000)), 1.0);
        assert_close(f32::from(Fixed(0x0000_0000)), 0.0);
        assert_close(f32::from(Fixed(0x0001_8000)), 1.5);
        assert_eq!(Fixed(-0x0001_8000).trunc(), -1);
    }

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() < 0.000001,
            "{:?} != {:?}",
            actual,
            expected,
        );
    }
}
