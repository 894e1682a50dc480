//! Decoding of `name` table strings.

use crate::error::ParseError;
use crate::tables::NameTable;
use encoding_rs::{DecoderResult, MACINTOSH, UTF_16BE};
use log::warn;

/// Find the best scoring record for `name_id` and decode it to a `String`.
pub fn best_name(name_table: &NameTable<'_>, name_id: u16) -> Result<Option<String>, ParseError> {
    let mut best = 0;
    let mut result = None;
    for name_record in name_table
        .name_records
        .iter()
        .filter(|record| record.name_id == name_id)
    {
        let (score, encoding) = match score_encoding(
            name_record.platform_id,
            name_record.encoding_id,
            name_record.language_id,
        ) {
            Some((score, encoding)) if score > best => (score, encoding),
            Some(_) => continue,
            None => {
                warn!(
                    "skipping name record in unknown encoding (platform {}, encoding {})",
                    name_record.platform_id, name_record.encoding_id
                );
                continue;
            }
        };
        let name_data = name_table
            .string_storage
            .offset_length(usize::from(name_record.offset), usize::from(name_record.length))?
            .data();
        if let Some(name) = decode_name(encoding, name_data) {
            result = Some(name);
            best = score;
        }
    }
    Ok(result)
}

#[derive(Copy, Clone)]
enum NameEncoding {
    Utf16Be,
    AppleRoman,
}

fn score_encoding(
    platform_id: u16,
    encoding_id: u16,
    language_id: u16,
) -> Option<(usize, NameEncoding)> {
    match (platform_id, encoding_id, language_id) {
        // Windows; Unicode full repertoire
        (3, 10, _) => Some((1000, NameEncoding::Utf16Be)),

        // Unicode; Unicode full repertoire
        (0, 6, 0) => Some((900, NameEncoding::Utf16Be)),

        // Unicode; Unicode 2.0 and onwards semantics, Unicode full repertoire
        (0, 4, 0) => Some((800, NameEncoding::Utf16Be)),

        // Windows; Unicode BMP, US English preferred
        (3, 1, 0x409) => Some((750, NameEncoding::Utf16Be)),
        (3, 1, _) => Some((700, NameEncoding::Utf16Be)),

        // Unicode; BMP only, ISO/IEC 10646, 1.1 and 1.0 semantics
        (0, 3, 0) => Some((600, NameEncoding::Utf16Be)),
        (0, 2, 0) => Some((500, NameEncoding::Utf16Be)),
        (0, 1, 0) => Some((400, NameEncoding::Utf16Be)),
        (0, 0, 0) => Some((300, NameEncoding::Utf16Be)),

        // Windows, Symbol
        (3, 0, _) => Some((200, NameEncoding::Utf16Be)),

        // Apple Roman
        (1, 0, 0) => Some((150, NameEncoding::AppleRoman)),
        (1, 0, _) => Some((100, NameEncoding::AppleRoman)),
        _ => None,
    }
}

fn decode_name(encoding: NameEncoding, data: &[u8]) -> Option<String> {
    let mut decoder = match encoding {
        NameEncoding::Utf16Be => UTF_16BE.new_decoder_without_bom_handling(),
        NameEncoding::AppleRoman => MACINTOSH.new_decoder_without_bom_handling(),
    };
    let size = decoder.max_utf8_buffer_length_without_replacement(data.len())?;
    let mut s = String::with_capacity(size);
    let (res, _read) = decoder.decode_to_string_without_replacement(data, &mut s, true);
    match res {
        DecoderResult::InputEmpty => Some(s),
        DecoderResult::OutputFull | DecoderResult::Malformed(_, _) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::read::ReadScope;
    use crate::tests::writer::{self, TtfType::*};

    fn name_table(records: &[(u16, u16, u16, &[u8])]) -> Vec<u8> {
        let header_len = 6 + 12 * records.len();
        let mut fields = vec![U16(0), U16(records.len() as u16), U16(header_len as u16)];
        let mut storage = Vec::new();
        for &(platform_id, encoding_id, language_id, bytes) in records {
            fields.extend_from_slice(&[
                U16(platform_id),
                U16(encoding_id),
                U16(language_id),
                U16(NameTable::FONT_FAMILY_NAME),
                U16(bytes.len() as u16),
                U16(storage.len() as u16),
            ]);
            storage.extend_from_slice(bytes);
        }
        let mut data = writer::convert(&fields);
        data.extend_from_slice(&storage);
        data
    }

    #[test]
    fn test_prefers_windows_unicode() {
        let data = name_table(&[
            (1, 0, 0, b"Mac Name"),
            (3, 1, 0x409, &[0, b'W', 0, b'i', 0, b'n']),
        ]);
        let name = ReadScope::new(&data).read::<NameTable<'_>>().unwrap();

        assert_eq!(
            name.string_for_id(NameTable::FONT_FAMILY_NAME).unwrap(),
            Some(String::from("Win"))
        );
        assert_eq!(name.string_for_id(NameTable::POSTSCRIPT_NAME).unwrap(), None);
    }

    #[test]
    fn test_mac_roman() {
        let data = name_table(&[(1, 0, 0, &[b'C', 0x8E, b't', b'e'])]);
        let name = ReadScope::new(&data).read::<NameTable<'_>>().unwrap();

        assert_eq!(
            name.string_for_id(NameTable::FONT_FAMILY_NAME).unwrap(),
            Some(String::from("Céte"))
        );
    }

    #[test]
    fn test_unknown_encoding_is_skipped() {
        let data = name_table(&[(7, 7, 0, b"??")]);
        let name = ReadScope::new(&data).read::<NameTable<'_>>().unwrap();

        assert_eq!(name.string_for_id(NameTable::FONT_FAMILY_NAME).unwrap(), None);
    }
}
