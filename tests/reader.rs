#[allow(dead_code)]
mod common;

use regex::Regex;

use xtf::error::ParseError;
use xtf::reader::XtfReader;
use xtf::tables::cmap::{EncodingId, PlatformId};
use xtf::tag;

use crate::common::{garamond_otf, garamond_otf_truncated_charstrings};

const WINDOWS: PlatformId = PlatformId::WINDOWS;
const UNICODE_BMP: EncodingId = EncodingId::WINDOWS_UNICODE_BMP_UCS2;

#[test]
fn garamond_family_and_glyph_count() {
    let data = garamond_otf();
    let reader = XtfReader::new(&data).unwrap();

    assert_eq!(reader.font_family_name().unwrap(), "Garamond");
    assert_eq!(reader.number_of_glyphs().unwrap(), 662);
}

#[test]
fn garamond_cmap_subtables() {
    let data = garamond_otf();
    let reader = XtfReader::new(&data).unwrap();
    let cmap = reader.cmap_table().unwrap();

    assert_eq!(cmap.num_subtables(), 2);
    let formats = cmap
        .subtables()
        .iter()
        .map(|info| (info.platform_id.0, info.encoding_id.0, info.format))
        .collect::<Vec<_>>();
    assert_eq!(formats, vec![(1, 0, 0), (3, 1, 4)]);
    assert_eq!(cmap.find_subtable(WINDOWS, UNICODE_BMP).unwrap().format(), 4);
}

#[test]
fn garamond_char_code_to_glyph_name() {
    let data = garamond_otf();
    let reader = XtfReader::new(&data).unwrap();

    assert_eq!(
        reader
            .map_char_code_to_glyph_name(0x20, 0, WINDOWS, UNICODE_BMP)
            .unwrap(),
        "space"
    );
    assert_eq!(
        reader
            .map_char_code_to_glyph_name(0x41, 0, WINDOWS, UNICODE_BMP)
            .unwrap(),
        "A"
    );
    // Outside the mapped range falls back to .notdef
    assert_eq!(
        reader
            .map_char_code_to_glyph_name(0x2022, 0, WINDOWS, UNICODE_BMP)
            .unwrap(),
        ".notdef"
    );
}

#[test]
fn garamond_widths() {
    let data = garamond_otf();
    let reader = XtfReader::new(&data).unwrap();

    assert_eq!(reader.map_glyph_name_to_width("A", 0).unwrap(), 1387.0);
    assert_eq!(
        reader
            .map_char_code_to_width(0x41, 0, WINDOWS, UNICODE_BMP)
            .unwrap(),
        1387.0
    );
    assert_eq!(
        reader
            .map_char_code_to_width(
                0x20,
                0,
                PlatformId::MACINTOSH,
                EncodingId::MACINTOSH_APPLE_ROMAN
            )
            .unwrap(),
        250.0
    );
    // Repeated lookups give the same answer
    assert_eq!(reader.map_glyph_name_to_width("A", 0).unwrap(), 1387.0);
}

#[test]
fn garamond_disassembly() {
    let data = garamond_otf();
    let reader = XtfReader::new(&data).unwrap();

    let a = reader.charstring(common::GID_A).unwrap();
    assert_eq!(
        a.disassemble(),
        vec![
            "886 0 21 680 21 hstem",
            "30 0 rmoveto",
            "200 680 rlineto",
            "200 -680 rlineto",
            "endchar",
        ]
    );
    assert_eq!(a.hint_count(), 2);

    let c = reader.charstring(common::GID_C).unwrap();
    assert_eq!(
        c.disassemble(),
        vec![
            "10 50 20 300 20 hstemhm",
            "40 30 hintmask",
            "0 0 rmoveto",
            "100 0 rlineto",
            "endchar",
        ]
    );
    assert_eq!(c.width(), 511.0);
    assert_eq!(c.hint_count(), 3);
    assert_eq!(c.operators()[1].mask_bits().as_deref(), Some("10100000"));
}

#[test]
fn disassembly_grammar() {
    let line = Regex::new(r"^(-?[0-9]+(\.[0-9]+)? )*[a-z0-9]+$").unwrap();
    let data = garamond_otf();
    let reader = XtfReader::new(&data).unwrap();

    for glyph_index in 0..reader.number_of_glyphs().unwrap() as u16 {
        let charstring = reader.charstring(glyph_index).unwrap();
        let lines = charstring.disassemble();
        // The final endchar may carry the width.
        assert!(lines.last().map_or(false, |last| last.ends_with("endchar")));
        for text in lines {
            assert!(
                line.is_match(&text),
                "glyph {} has malformed line {:?}",
                glyph_index,
                text
            );
        }
    }
}

#[test]
fn truncated_charstrings_leave_cmap_usable() {
    let data = garamond_otf_truncated_charstrings();
    let reader = XtfReader::new(&data).unwrap();

    assert_eq!(reader.cff_table().err(), Some(ParseError::TruncatedData));
    // The failure is remembered
    assert_eq!(reader.cff_table().err(), Some(ParseError::TruncatedData));
    assert_eq!(
        reader.map_char_code_to_glyph_name(0x41, 0, WINDOWS, UNICODE_BMP),
        Err(ParseError::TruncatedData)
    );

    assert_eq!(
        reader.map_char_code_to_glyph_index(0x41, WINDOWS, UNICODE_BMP),
        Ok(common::GID_A)
    );
    assert_eq!(reader.number_of_glyphs(), Ok(662));
    // Falls back to the name table
    assert_eq!(reader.font_family_name().unwrap(), "Garamond");
    assert!(reader.table(tag::CFF).is_some());
}
