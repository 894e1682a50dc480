//! Character to glyph index mapping table (`cmap`).
//!
//! <https://docs.microsoft.com/en-us/typography/opentype/spec/cmap>

use std::cmp::Ordering;
use std::convert::TryFrom;
use std::fmt;

use log::{debug, warn};
use once_cell::sync::OnceCell;

use crate::binary::read::{CheckIndex, ReadArray, ReadBinary, ReadCtxt, ReadFrom, ReadScope};
use crate::binary::{I16Be, U16Be, U32Be, U8};
use crate::error::ParseError;
use crate::size;

const SUB_HEADER_SIZE: usize = 4 * 2;

/// Glyph index returned for codes a subtable does not map.
pub const NOTDEF_GLYPH: u16 = 0;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct PlatformId(pub u16);

impl PlatformId {
    pub const UNICODE: PlatformId = PlatformId(0);
    pub const MACINTOSH: PlatformId = PlatformId(1);
    pub const WINDOWS: PlatformId = PlatformId(3);
    pub const CUSTOM: PlatformId = PlatformId(4);
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct EncodingId(pub u16);

impl EncodingId {
    pub const UNICODE_BMP: EncodingId = EncodingId(3);
    pub const UNICODE_FULL: EncodingId = EncodingId(4);

    pub const MACINTOSH_APPLE_ROMAN: EncodingId = EncodingId(0);

    pub const WINDOWS_SYMBOL: EncodingId = EncodingId(0);
    pub const WINDOWS_UNICODE_BMP_UCS2: EncodingId = EncodingId(1);
    pub const WINDOWS_SHIFT_JIS: EncodingId = EncodingId(2);
    pub const WINDOWS_PRC: EncodingId = EncodingId(3);
    pub const WINDOWS_BIG5: EncodingId = EncodingId(4);
    pub const WINDOWS_WANSUNG: EncodingId = EncodingId(5);
    pub const WINDOWS_JOHAB: EncodingId = EncodingId(6);
    pub const WINDOWS_UNICODE_UCS4: EncodingId = EncodingId(10);
}

/// The `cmap` table.
///
/// Subtables are decoded the first time they are requested and kept for the lifetime of the
/// table. A subtable that fails to decode only affects lookups against that subtable.
pub struct Cmap<'a> {
    pub scope: ReadScope<'a>,
    pub encoding_records: ReadArray<'a, EncodingRecord>,
    subtables: Vec<OnceCell<Result<CmapSubtable<'a>, ParseError>>>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EncodingRecord {
    pub platform_id: u16,
    pub encoding_id: u16,
    pub offset: u32,
}

/// Summary of one subtable, as listed by [`Cmap::subtables`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SubtableInfo {
    pub platform_id: PlatformId,
    pub encoding_id: EncodingId,
    pub format: u16,
}

#[derive(Debug)]
pub enum CmapSubtable<'a> {
    Format0 {
        language: u16,
        glyph_id_array: ReadArray<'a, U8>,
    },
    Format2 {
        language: u16,
        sub_header_keys: ReadArray<'a, U16Be>,
        sub_headers: ReadArray<'a, SubHeader>,
        sub_headers_scope: ReadScope<'a>,
    },
    Format4 {
        language: u16,
        end_codes: ReadArray<'a, U16Be>,
        start_codes: ReadArray<'a, U16Be>,
        id_deltas: ReadArray<'a, I16Be>,
        id_range_offsets: ReadArray<'a, U16Be>,
        glyph_id_array: ReadArray<'a, U16Be>,
    },
    Format6 {
        language: u16,
        first_code: u16,
        glyph_id_array: ReadArray<'a, U16Be>,
    },
    Format10 {
        language: u32,
        start_char_code: u32,
        glyph_id_array: ReadArray<'a, U16Be>,
    },
    Format12 {
        language: u32,
        groups: ReadArray<'a, SequentialMapGroup>,
    },
}

/// cmap subtable format 2 sub-header
#[derive(Debug, Copy, Clone)]
pub struct SubHeader {
    first_code: u16,
    entry_count: u16,
    id_delta: i16,
    id_range_offset: u16,
}

#[derive(Debug, Copy, Clone)]
pub struct SequentialMapGroup {
    start_char_code: u32,
    end_char_code: u32,
    start_glyph_id: u32,
}

impl ReadBinary for Cmap<'_> {
    type HostType<'a> = Cmap<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Cmap<'a>, ParseError> {
        let scope = ctxt.scope();
        let version = ctxt.read_u16be()?;
        ctxt.check_version(version == 0)?;
        let num_tables = usize::from(ctxt.read_u16be()?);
        let encoding_records = ctxt.read_array::<EncodingRecord>(num_tables)?;
        let subtables = (0..num_tables).map(|_| OnceCell::new()).collect();
        Ok(Cmap {
            scope,
            encoding_records,
            subtables,
        })
    }
}

impl ReadFrom for EncodingRecord {
    type ReadType = (U16Be, U16Be, U32Be);
    fn read_from((platform_id, encoding_id, offset): (u16, u16, u32)) -> Self {
        EncodingRecord {
            platform_id,
            encoding_id,
            offset,
        }
    }
}

impl<'a> Cmap<'a> {
    /// Number of encoding records, and therefore subtables, in the table.
    pub fn num_subtables(&self) -> usize {
        self.encoding_records.len()
    }

    /// List the platform, encoding and format of every subtable.
    ///
    /// Records whose subtable header cannot be read are logged and left out.
    pub fn subtables(&self) -> Vec<SubtableInfo> {
        self.encoding_records
            .iter()
            .filter_map(|record| match self.subtable_format(&record) {
                Ok(format) => Some(SubtableInfo {
                    platform_id: PlatformId(record.platform_id),
                    encoding_id: EncodingId(record.encoding_id),
                    format,
                }),
                Err(err) => {
                    warn!(
                        "skipping invalid cmap subtable ({}, {}): {}",
                        record.platform_id, record.encoding_id, err
                    );
                    None
                }
            })
            .collect()
    }

    fn subtable_format(&self, record: &EncodingRecord) -> Result<u16, ParseError> {
        let offset = usize::try_from(record.offset)?;
        self.scope.offset(offset).read::<U16Be>()
    }

    /// Find the encoding record for a platform and encoding pair.
    pub fn find_encoding_record(
        &self,
        platform_id: PlatformId,
        encoding_id: EncodingId,
    ) -> Option<(usize, EncodingRecord)> {
        self.encoding_records.iter().enumerate().find(|(_, record)| {
            record.platform_id == platform_id.0 && record.encoding_id == encoding_id.0
        })
    }

    /// Return the decoded subtable for a platform and encoding pair.
    pub fn find_subtable(
        &self,
        platform_id: PlatformId,
        encoding_id: EncodingId,
    ) -> Result<&CmapSubtable<'a>, ParseError> {
        let (index, record) = self
            .find_encoding_record(platform_id, encoding_id)
            .ok_or(ParseError::CmapSubtableNotFound {
                platform_id: platform_id.0,
                encoding_id: encoding_id.0,
            })?;
        self.subtable_at(index, &record)
    }

    fn subtable_at(
        &self,
        index: usize,
        record: &EncodingRecord,
    ) -> Result<&CmapSubtable<'a>, ParseError> {
        let cell = self.subtables.get(index).ok_or(ParseError::IndexOutOfRange)?;
        cell.get_or_init(|| {
            debug!(
                "decoding cmap subtable ({}, {})",
                record.platform_id, record.encoding_id
            );
            let offset = usize::try_from(record.offset)?;
            self.scope.offset(offset).read::<CmapSubtable<'_>>()
        })
        .as_ref()
        .map_err(Clone::clone)
    }

    /// Map a character code to a glyph index using the subtable for `platform_id` and
    /// `encoding_id`.
    ///
    /// Codes the subtable does not cover map to glyph 0 (`.notdef`).
    pub fn lookup(
        &self,
        char_code: u32,
        platform_id: PlatformId,
        encoding_id: EncodingId,
    ) -> Result<u16, ParseError> {
        let subtable = self.find_subtable(platform_id, encoding_id)?;
        Ok(subtable.map_glyph(char_code)?.unwrap_or(NOTDEF_GLYPH))
    }
}

impl fmt::Debug for Cmap<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cmap")
            .field("encoding_records", &self.encoding_records)
            .finish()
    }
}

impl ReadBinary for CmapSubtable<'_> {
    type HostType<'a> = CmapSubtable<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<CmapSubtable<'a>, ParseError> {
        let subtable_format = ctxt.read_u16be()?;
        match subtable_format {
            0 => {
                let length = usize::from(ctxt.read_u16be()?);
                ctxt.check(length >= 3 * size::U16 + 256)?;
                let language = ctxt.read_u16be()?;
                let glyph_id_array = ctxt.read_array::<U8>(256)?;
                Ok(CmapSubtable::Format0 {
                    language,
                    glyph_id_array,
                })
            }
            2 => {
                let _length = ctxt.read_u16be()?;
                let language = ctxt.read_u16be()?;
                let sub_header_keys = ctxt.read_array::<U16Be>(256)?;

                // Each key is a sub-header index multiplied by 8.
                let max_sub_header_index = sub_header_keys
                    .iter()
                    .map(|value| value / 8)
                    .max()
                    .unwrap_or(0);
                let sub_headers_scope = ctxt.scope();
                let sub_headers =
                    ctxt.read_array::<SubHeader>(usize::from(max_sub_header_index) + 1)?;

                Ok(CmapSubtable::Format2 {
                    language,
                    sub_header_keys,
                    sub_headers,
                    sub_headers_scope,
                })
            }
            4 => {
                let length = usize::from(ctxt.read_u16be()?);
                let language = ctxt.read_u16be()?;
                let seg_count_x2 = usize::from(ctxt.read_u16be()?);
                ctxt.check((seg_count_x2 & 1) == 0)?;
                let seg_count = seg_count_x2 >> 1;
                let _search_range = ctxt.read_u16be()?;
                let _entry_selector = ctxt.read_u16be()?;
                let _range_shift = ctxt.read_u16be()?;
                let end_codes = ctxt.read_array::<U16Be>(seg_count)?;
                let _reserved_pad = ctxt.read_u16be()?;
                let start_codes = ctxt.read_array::<U16Be>(seg_count)?;
                let id_deltas = ctxt.read_array::<I16Be>(seg_count)?;
                let id_range_offsets = ctxt.read_array::<U16Be>(seg_count)?;
                let header_len = (8 + 4 * seg_count) * size::U16;
                ctxt.check(length >= header_len)?;
                // Some fonts declare a length past the end of the table, so only read the glyph
                // ids that are actually present.
                let declared = (length - header_len) / size::U16;
                let available = ctxt.remaining() / size::U16;
                let glyph_id_array = ctxt.read_array::<U16Be>(declared.min(available))?;
                Ok(CmapSubtable::Format4 {
                    language,
                    end_codes,
                    start_codes,
                    id_deltas,
                    id_range_offsets,
                    glyph_id_array,
                })
            }
            6 => {
                let _length = ctxt.read_u16be()?;
                let language = ctxt.read_u16be()?;
                let first_code = ctxt.read_u16be()?;
                let entry_count = usize::from(ctxt.read_u16be()?);
                let glyph_id_array = ctxt.read_array::<U16Be>(entry_count)?;
                Ok(CmapSubtable::Format6 {
                    language,
                    first_code,
                    glyph_id_array,
                })
            }
            10 => {
                let reserved = ctxt.read_u16be()?;
                ctxt.check(reserved == 0)?;
                let _length = ctxt.read_u32be()?;
                let language = ctxt.read_u32be()?;
                let start_char_code = ctxt.read_u32be()?;
                let num_chars = usize::try_from(ctxt.read_u32be()?)?;
                let glyph_id_array = ctxt.read_array::<U16Be>(num_chars)?;
                Ok(CmapSubtable::Format10 {
                    language,
                    start_char_code,
                    glyph_id_array,
                })
            }
            12 => {
                let reserved = ctxt.read_u16be()?;
                ctxt.check(reserved == 0)?;
                let _length = ctxt.read_u32be()?;
                let language = ctxt.read_u32be()?;
                let num_groups = usize::try_from(ctxt.read_u32be()?)?;
                let groups = ctxt.read_array::<SequentialMapGroup>(num_groups)?;
                Ok(CmapSubtable::Format12 { language, groups })
            }
            _ => Err(ParseError::UnsupportedCmapFormat(subtable_format)),
        }
    }
}

impl ReadFrom for SubHeader {
    type ReadType = ((U16Be, U16Be), (I16Be, U16Be));
    fn read_from(
        ((first_code, entry_count), (id_delta, id_range_offset)): ((u16, u16), (i16, u16)),
    ) -> Self {
        SubHeader {
            first_code,
            entry_count,
            id_delta,
            id_range_offset,
        }
    }
}

impl SubHeader {
    fn contains(&self, value: u16) -> bool {
        let value = u32::from(value);
        let first_code = u32::from(self.first_code);
        (first_code..first_code + u32::from(self.entry_count)).contains(&value)
    }

    fn glyph_index_sub_array<'a>(
        &self,
        index: usize,
        sub_headers_scope: &ReadScope<'a>,
    ) -> Result<ReadArray<'a, U16Be>, ParseError> {
        if self.entry_count == 0 {
            return Ok(ReadArray::empty());
        }
        // idRangeOffset counts bytes from the idRangeOffset field itself, which is the last
        // field of the sub-header.
        let first_glyph_index_offset =
            index * SUB_HEADER_SIZE + SUB_HEADER_SIZE - size::U16 + usize::from(self.id_range_offset);
        sub_headers_scope
            .offset(first_glyph_index_offset)
            .ctxt()
            .read_array::<U16Be>(usize::from(self.entry_count))
    }
}

impl ReadFrom for SequentialMapGroup {
    type ReadType = (U32Be, U32Be, U32Be);
    fn read_from((start_char_code, end_char_code, start_glyph_id): (u32, u32, u32)) -> Self {
        SequentialMapGroup {
            start_char_code,
            end_char_code,
            start_glyph_id,
        }
    }
}

/// Add a signed delta to a glyph id, modulo 65536.
fn apply_delta(glyph_id: u32, id_delta: i16) -> u16 {
    (glyph_id as i32 + i32::from(id_delta)) as u16
}

impl<'a> CmapSubtable<'a> {
    pub fn format(&self) -> u16 {
        match self {
            CmapSubtable::Format0 { .. } => 0,
            CmapSubtable::Format2 { .. } => 2,
            CmapSubtable::Format4 { .. } => 4,
            CmapSubtable::Format6 { .. } => 6,
            CmapSubtable::Format10 { .. } => 10,
            CmapSubtable::Format12 { .. } => 12,
        }
    }

    /// The language field. Zero for subtables that are not language specific.
    pub fn language(&self) -> u32 {
        match *self {
            CmapSubtable::Format0 { language, .. }
            | CmapSubtable::Format2 { language, .. }
            | CmapSubtable::Format4 { language, .. }
            | CmapSubtable::Format6 { language, .. } => u32::from(language),
            CmapSubtable::Format10 { language, .. } | CmapSubtable::Format12 { language, .. } => {
                language
            }
        }
    }

    /// Map a character code to a glyph index.
    ///
    /// `None` is returned for codes outside the ranges covered by the subtable.
    pub fn map_glyph(&self, ch: u32) -> Result<Option<u16>, ParseError> {
        match *self {
            CmapSubtable::Format0 {
                ref glyph_id_array, ..
            } => {
                let index = usize::try_from(ch)?;
                Ok(glyph_id_array.get_item(index).map(u16::from))
            }
            CmapSubtable::Format2 {
                ref sub_header_keys,
                ref sub_headers,
                ref sub_headers_scope,
                ..
            } => {
                if ch > 0xFFFF {
                    return Ok(None);
                }
                let high_byte = usize::from((ch >> 8) as u8);
                let low_byte = (ch & 0xFF) as u16;

                // Single byte codes use sub-header 0 and are looked up by their only byte.
                let key_index = if high_byte == 0 {
                    usize::from(low_byte)
                } else {
                    high_byte
                };
                sub_header_keys.check_index(key_index)?;
                let sub_header_index = sub_header_keys.get_item(key_index).map_or(0, |key| key / 8);
                if high_byte == 0 && sub_header_index != 0 {
                    // First byte of a two byte code.
                    return Ok(None);
                }
                let sub_header_index = usize::from(sub_header_index);
                let sub_header = sub_headers.read_item(sub_header_index)?;

                if !sub_header.contains(low_byte) {
                    return Ok(None);
                }
                let glyph_id_index = usize::from(low_byte - sub_header.first_code);
                let glyph_index_sub_array =
                    sub_header.glyph_index_sub_array(sub_header_index, sub_headers_scope)?;
                let glyph_id = glyph_index_sub_array.read_item(glyph_id_index)?;

                if glyph_id == 0 {
                    Ok(Some(NOTDEF_GLYPH))
                } else {
                    Ok(Some(apply_delta(u32::from(glyph_id), sub_header.id_delta)))
                }
            }
            CmapSubtable::Format4 {
                ref end_codes,
                ref start_codes,
                ref id_deltas,
                ref id_range_offsets,
                ref glyph_id_array,
                ..
            } => {
                if ch > 0xFFFF {
                    return Ok(None);
                }
                // Segments are sorted by end code; find the first whose end code is >= ch.
                let i = match end_codes.binary_search_by(|end_code| {
                    if u32::from(end_code) < ch {
                        Ordering::Less
                    } else {
                        Ordering::Greater
                    }
                }) {
                    Ok(i) | Err(i) => i,
                };
                let start_code = match start_codes.get_item(i) {
                    Some(start_code) => u32::from(start_code),
                    None => return Ok(None),
                };
                if ch < start_code {
                    return Ok(None);
                }
                let id_delta = id_deltas.read_item(i)?;
                let id_range_offset = usize::from(id_range_offsets.read_item(i)?);
                if id_range_offset == 0 {
                    return Ok(Some(apply_delta(ch, id_delta)));
                }

                // idRangeOffset is a byte offset from its own position in the idRangeOffset
                // array, which is immediately followed by the glyph id array.
                let glyph_id_offset = id_range_offset + i * size::U16
                    + usize::try_from(ch - start_code)? * size::U16;
                let index = (glyph_id_offset / size::U16)
                    .checked_sub(id_range_offsets.len())
                    .ok_or(ParseError::BadOffset)?;
                match glyph_id_array.get_item(index) {
                    Some(0) => Ok(Some(NOTDEF_GLYPH)),
                    Some(glyph_id) => Ok(Some(apply_delta(u32::from(glyph_id), id_delta))),
                    None => {
                        warn!(
                            "format 4 idRangeOffset for 0x{:04X} points past the glyph id array",
                            ch
                        );
                        Ok(Some(NOTDEF_GLYPH))
                    }
                }
            }
            CmapSubtable::Format6 {
                first_code,
                ref glyph_id_array,
                ..
            } => match ch.checked_sub(u32::from(first_code)) {
                Some(index) => Ok(glyph_id_array.get_item(usize::try_from(index)?)),
                None => Ok(None),
            },
            CmapSubtable::Format10 {
                start_char_code,
                ref glyph_id_array,
                ..
            } => match ch.checked_sub(start_char_code) {
                Some(index) => Ok(glyph_id_array.get_item(usize::try_from(index)?)),
                None => Ok(None),
            },
            CmapSubtable::Format12 { ref groups, .. } => {
                let group = match groups.binary_search_by(|group| {
                    if group.end_char_code < ch {
                        Ordering::Less
                    } else if group.start_char_code > ch {
                        Ordering::Greater
                    } else {
                        Ordering::Equal
                    }
                }) {
                    Ok(index) => groups.read_item(index)?,
                    Err(_) => return Ok(None),
                };
                let glyph_id = group
                    .start_glyph_id
                    .checked_add(ch - group.start_char_code)
                    .ok_or(ParseError::BadValue)?;
                Ok(Some(u16::try_from(glyph_id)?))
            }
        }
    }

    /// Iterate over every `(code, glyph index)` pair the subtable maps to a non-zero glyph.
    ///
    /// Only the 16-bit formats are enumerated; codes in formats 10 and 12 are skipped.
    pub fn mappings(&self) -> Result<Vec<(u32, u16)>, ParseError> {
        let codes: Box<dyn Iterator<Item = u32>> = match *self {
            CmapSubtable::Format0 { .. } => Box::new(0..256),
            CmapSubtable::Format2 { .. } | CmapSubtable::Format4 { .. } => Box::new(0..=0xFFFF),
            CmapSubtable::Format6 {
                first_code,
                ref glyph_id_array,
                ..
            } => {
                let first_code = u32::from(first_code);
                Box::new(first_code..first_code + glyph_id_array.len() as u32)
            }
            CmapSubtable::Format10 { .. } | CmapSubtable::Format12 { .. } => {
                return Err(ParseError::NotImplemented)
            }
        };
        let mut mappings = Vec::new();
        for code in codes {
            match self.map_glyph(code)? {
                Some(NOTDEF_GLYPH) | None => {}
                Some(glyph_id) => mappings.push((code, glyph_id)),
            }
        }
        Ok(mappings)
    }
}
