// Builders for synthetic fonts used by the unit and integration tests.
//
// The Garamond fixture mimics an OpenType font with PostScript outlines: 662 glyphs named by the
// standard CFF strings followed by custom `gNNN` names, so that every glyph id equals its string
// id. Only the glyphs the tests look at carry interesting charstrings.

pub const GARAMOND_NUM_GLYPHS: usize = 662;
pub const GARAMOND_DEFAULT_WIDTH_X: i32 = 250;
pub const GARAMOND_NOMINAL_WIDTH_X: i32 = 501;
pub const GARAMOND_A_WIDTH: i32 = 1387;

/// Glyph ids of the glyphs with hand written charstrings.
pub const GID_SPACE: u16 = 1;
pub const GID_A: u16 = 34;
pub const GID_B: u16 = 35;
pub const GID_C: u16 = 36;
pub const GID_ACUTE: u16 = 125;
pub const GID_AACUTE: u16 = 171;

pub const SFNT_TRUETYPE: u32 = 0x00010000;
pub const SFNT_OPENTYPE: u32 = 0x4F54544F;

// Type 2 charstring operators used by the fixtures.
pub const HSTEM: u8 = 1;
pub const RLINETO: u8 = 5;
pub const CALLSUBR: u8 = 10;
pub const RETURN: u8 = 11;
pub const ENDCHAR: u8 = 14;
pub const HSTEMHM: u8 = 18;
pub const HINTMASK: u8 = 19;
pub const RMOVETO: u8 = 21;
pub const CALLGSUBR: u8 = 29;

/// A CFF table and the position of its CharStrings INDEX.
pub struct CffFixture {
    pub data: Vec<u8>,
    pub char_strings_offset: usize,
}

/// Serialise `items` as a CFF INDEX using the smallest offset size that fits.
pub fn cff_index(items: &[Vec<u8>]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&(items.len() as u16).to_be_bytes());
    if items.is_empty() {
        return data;
    }

    let last_offset = 1 + items.iter().map(Vec::len).sum::<usize>();
    let off_size = match last_offset {
        0..=0xFF => 1,
        0x100..=0xFFFF => 2,
        0x10000..=0xFFFFFF => 3,
        _ => 4,
    };
    data.push(off_size as u8);
    let write_offset = |data: &mut Vec<u8>, offset: usize| {
        data.extend_from_slice(&(offset as u32).to_be_bytes()[4 - off_size..]);
    };
    let mut offset = 1;
    write_offset(&mut data, offset);
    for item in items {
        offset += item.len();
        write_offset(&mut data, offset);
    }
    for item in items {
        data.extend_from_slice(item);
    }
    data
}

/// A DICT entry. Operands always use the five byte encoding so entry sizes do not depend on
/// their values.
pub fn dict_entry(operands: &[i32], operator: &[u8]) -> Vec<u8> {
    let mut data = Vec::new();
    for operand in operands {
        data.push(29);
        data.extend_from_slice(&operand.to_be_bytes());
    }
    data.extend_from_slice(operator);
    data
}

/// Append a Type 2 charstring integer to `data`.
pub fn charstring_int(value: i32, data: &mut Vec<u8>) {
    match value {
        -107..=107 => data.push((value + 139) as u8),
        108..=1131 => {
            let value = value - 108;
            data.push(((value >> 8) + 247) as u8);
            data.push((value & 0xFF) as u8);
        }
        -1131..=-108 => {
            let value = -value - 108;
            data.push(((value >> 8) + 251) as u8);
            data.push((value & 0xFF) as u8);
        }
        _ => {
            data.push(28);
            data.extend_from_slice(&(value as i16).to_be_bytes());
        }
    }
}

/// Encode a charstring from `(operands, operator bytes)` pairs.
///
/// The operator bytes may carry trailing data such as hint mask bytes.
pub fn program(steps: &[(&[i32], &[u8])]) -> Vec<u8> {
    let mut data = Vec::new();
    for (operands, operator) in steps {
        for &operand in operands.iter() {
            charstring_int(operand, &mut data);
        }
        data.extend_from_slice(operator);
    }
    data
}

fn garamond_glyph(glyph_id: u16) -> Vec<u8> {
    match glyph_id {
        0 => program(&[(&[], &[ENDCHAR])]),
        GID_SPACE => program(&[(&[-251], &[ENDCHAR])]),
        GID_A => program(&[
            (&[886, 0, 21, 680, 21], &[HSTEM]),
            (&[30, 0], &[RMOVETO]),
            (&[200, 680], &[RLINETO]),
            (&[200, -680], &[RLINETO]),
            (&[], &[ENDCHAR]),
        ]),
        GID_B => program(&[
            (&[-1, 100, 0], &[RMOVETO]),
            (&[-107], &[CALLSUBR]),
            (&[-107], &[CALLGSUBR]),
            (&[], &[ENDCHAR]),
        ]),
        GID_C => program(&[
            (&[10, 50, 20, 300, 20], &[HSTEMHM]),
            (&[40, 30], &[HINTMASK, 0b1010_0000]),
            (&[0, 0], &[RMOVETO]),
            (&[100, 0], &[RLINETO]),
            (&[], &[ENDCHAR]),
        ]),
        GID_AACUTE => program(&[(&[0, 0, 65, 194], &[ENDCHAR])]),
        _ => program(&[
            (&[i32::from(glyph_id % 100), 50, 0], &[RMOVETO]),
            (&[0, 600], &[RLINETO]),
            (&[400, 0], &[RLINETO]),
            (&[], &[ENDCHAR]),
        ]),
    }
}

/// The CFF table of the Garamond fixture.
pub fn garamond_cff() -> CffFixture {
    let num_glyphs = GARAMOND_NUM_GLYPHS;
    let mut strings = (391..num_glyphs)
        .map(|sid| format!("g{}", sid).into_bytes())
        .collect::<Vec<_>>();
    let family_sid = (391 + strings.len()) as i32;
    strings.push(b"Garamond".to_vec());
    strings.push(b"Garamond Regular".to_vec());
    strings.push(b"Synthetic test font".to_vec());

    let name_index = cff_index(&[b"Garamond-Regular".to_vec()]);
    let string_index = cff_index(&strings);
    let global_subr_index = cff_index(&[program(&[(&[300, 0], &[RLINETO]), (&[], &[RETURN])])]);
    // Format 2: one range of SIDs 1..=661 covering every glyph after .notdef
    let n_left = (num_glyphs - 2) as u16;
    let mut charset = vec![2, 0, 1];
    charset.extend_from_slice(&n_left.to_be_bytes());
    let char_strings = (0..num_glyphs as u16)
        .map(garamond_glyph)
        .collect::<Vec<_>>();
    let char_strings_index = cff_index(&char_strings);
    let private_dict_len = 18;
    let private_dict = [
        dict_entry(&[GARAMOND_DEFAULT_WIDTH_X], &[20]),
        dict_entry(&[GARAMOND_NOMINAL_WIDTH_X], &[21]),
        dict_entry(&[private_dict_len], &[19]),
    ]
    .concat();
    let local_subr_index = cff_index(&[program(&[(&[0, 500], &[RLINETO]), (&[], &[RETURN])])]);

    let top_dict = |charset_offset: usize, char_strings_offset: usize, private_offset: usize| {
        [
            dict_entry(&[379], &[0]),
            dict_entry(&[family_sid + 2], &[1]),
            dict_entry(&[family_sid + 1], &[2]),
            dict_entry(&[family_sid], &[3]),
            dict_entry(&[388], &[4]),
            dict_entry(&[-60, -250, 1400, 900], &[5]),
            dict_entry(&[charset_offset as i32], &[15]),
            dict_entry(&[char_strings_offset as i32], &[17]),
            dict_entry(&[private_dict_len, private_offset as i32], &[18]),
        ]
        .concat()
    };
    let top_dict_index_len = cff_index(&[top_dict(0, 0, 0)]).len();

    let charset_offset =
        4 + name_index.len() + top_dict_index_len + string_index.len() + global_subr_index.len();
    let char_strings_offset = charset_offset + charset.len();
    let private_offset = char_strings_offset + char_strings_index.len();

    let data = [
        vec![1, 0, 4, 4],
        name_index,
        cff_index(&[top_dict(charset_offset, char_strings_offset, private_offset)]),
        string_index,
        global_subr_index,
        charset,
        char_strings_index,
        private_dict,
        local_subr_index,
    ]
    .concat();
    CffFixture {
        data,
        char_strings_offset,
    }
}

/// A CID-keyed CFF table with four glyphs split over two Font DICTs.
///
/// Glyphs 0 and 1 use a nominal width of 100, glyphs 2 and 3 a nominal width of 200. Every
/// charstring adds 10 to the nominal width.
pub fn cid_cff() -> Vec<u8> {
    let name_index = cff_index(&[b"CidTest".to_vec()]);
    let string_index = cff_index(&[b"Adobe".to_vec(), b"Identity".to_vec()]);
    let global_subr_index = cff_index(&[]);
    let charset = vec![0, 0, 100, 0, 101, 0, 102];
    // Format 3: glyphs 0..2 use Font DICT 0, glyphs 2..4 use Font DICT 1
    let fd_select = vec![3, 0, 2, 0, 0, 0, 0, 2, 1, 0, 4];
    let glyph = program(&[(&[10, 0, 0], &[RMOVETO]), (&[], &[ENDCHAR])]);
    let char_strings_index = cff_index(&vec![glyph; 4]);
    let private_dicts = [
        dict_entry(&[100], &[21]),
        dict_entry(&[200], &[21]),
    ];

    let top_dict = |charset_offset: usize, fd_select_offset: usize, char_strings_offset: usize, fd_array_offset: usize| {
        [
            dict_entry(&[391, 392, 0], &[12, 30]),
            dict_entry(&[charset_offset as i32], &[15]),
            dict_entry(&[char_strings_offset as i32], &[17]),
            dict_entry(&[fd_array_offset as i32], &[12, 36]),
            dict_entry(&[fd_select_offset as i32], &[12, 37]),
        ]
        .concat()
    };
    let top_dict_index_len = cff_index(&[top_dict(0, 0, 0, 0)]).len();

    let charset_offset =
        4 + name_index.len() + top_dict_index_len + string_index.len() + global_subr_index.len();
    let fd_select_offset = charset_offset + charset.len();
    let char_strings_offset = fd_select_offset + fd_select.len();
    let fd_array_offset = char_strings_offset + char_strings_index.len();
    // Each Font DICT holds only a Private operator, which has a fixed size.
    let font_dict_len = dict_entry(&[0, 0], &[18]).len();
    let fd_array_len = cff_index(&[vec![0; font_dict_len], vec![0; font_dict_len]]).len();
    let mut private_offset = fd_array_offset + fd_array_len;
    let mut font_dicts = Vec::new();
    for private_dict in &private_dicts {
        font_dicts.push(dict_entry(
            &[private_dict.len() as i32, private_offset as i32],
            &[18],
        ));
        private_offset += private_dict.len();
    }

    [
        vec![1, 0, 4, 4],
        name_index,
        cff_index(&[top_dict(
            charset_offset,
            fd_select_offset,
            char_strings_offset,
            fd_array_offset,
        )]),
        string_index,
        global_subr_index,
        charset,
        fd_select,
        char_strings_index,
        cff_index(&font_dicts),
        private_dicts.concat(),
    ]
    .concat()
}

/// A `cmap` with a Macintosh Roman format 0 subtable and a Windows Unicode BMP format 4 subtable.
///
/// Both map the printable ASCII range 0x20..=0x7E to glyph `code - 31`.
pub fn garamond_cmap() -> Vec<u8> {
    let mut format0 = Vec::new();
    format0.extend_from_slice(&0u16.to_be_bytes());
    format0.extend_from_slice(&262u16.to_be_bytes());
    format0.extend_from_slice(&0u16.to_be_bytes());
    format0.extend((0..=255u8).map(|code| match code {
        0x20..=0x7E => code - 31,
        _ => 0,
    }));

    let mut format4 = Vec::new();
    for value in [
        4u16, 32, 0, // format, length, language
        4, 4, 1, 0, // segCountX2, searchRange, entrySelector, rangeShift
        0x7E, 0xFFFF, // endCode
        0,    // reservedPad
        0x20, 0xFFFF, // startCode
        (-31i16) as u16, 1, // idDelta
        0, 0, // idRangeOffset
    ] {
        format4.extend_from_slice(&value.to_be_bytes());
    }

    let mut data = Vec::new();
    let format0_offset = 4 + 2 * 8;
    let format4_offset = format0_offset + format0.len();
    for value in [0u16, 2] {
        data.extend_from_slice(&value.to_be_bytes());
    }
    for (platform_id, encoding_id, offset) in [(1u16, 0u16, format0_offset), (3, 1, format4_offset)] {
        data.extend_from_slice(&platform_id.to_be_bytes());
        data.extend_from_slice(&encoding_id.to_be_bytes());
        data.extend_from_slice(&(offset as u32).to_be_bytes());
    }
    data.extend_from_slice(&format0);
    data.extend_from_slice(&format4);
    data
}

pub fn maxp(num_glyphs: u16) -> Vec<u8> {
    let mut data = 0x00005000u32.to_be_bytes().to_vec();
    data.extend_from_slice(&num_glyphs.to_be_bytes());
    data
}

/// A `name` table holding `family` as name ID 1 in Macintosh Roman and Windows Unicode records.
pub fn name_table(family: &str) -> Vec<u8> {
    let mac = family.as_bytes().to_vec();
    let windows = family
        .encode_utf16()
        .flat_map(|unit| unit.to_be_bytes())
        .collect::<Vec<_>>();
    let records = [(1u16, 0u16, 0u16, &mac), (3, 1, 0x409, &windows)];

    let mut data = Vec::new();
    let string_offset = 6 + 12 * records.len();
    for value in [0u16, records.len() as u16, string_offset as u16] {
        data.extend_from_slice(&value.to_be_bytes());
    }
    let mut storage = Vec::new();
    for (platform_id, encoding_id, language_id, bytes) in records {
        for value in [
            platform_id,
            encoding_id,
            language_id,
            1,
            bytes.len() as u16,
            storage.len() as u16,
        ] {
            data.extend_from_slice(&value.to_be_bytes());
        }
        storage.extend_from_slice(bytes);
    }
    data.extend_from_slice(&storage);
    data
}

fn sfnt_checksum(data: &[u8]) -> u32 {
    data.chunks(4).fold(0u32, |sum, chunk| {
        let mut word = [0; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        sum.wrapping_add(u32::from_be_bytes(word))
    })
}

/// Assemble a font file. Table data is laid out in the order given, the directory is sorted by
/// tag.
pub fn build_sfnt(sfnt_version: u32, tables: &[([u8; 4], Vec<u8>)]) -> Vec<u8> {
    let num_tables = tables.len();
    let mut power = 1;
    let mut entry_selector = 0u16;
    while power * 2 <= num_tables {
        power *= 2;
        entry_selector += 1;
    }
    let search_range = (power * 16) as u16;
    let range_shift = (num_tables * 16) as u16 - search_range;

    let mut offset = 12 + 16 * num_tables;
    let mut records = Vec::new();
    let mut body = Vec::new();
    for (tag, table) in tables {
        records.push((*tag, sfnt_checksum(table), offset, table.len()));
        body.extend_from_slice(table);
        while body.len() % 4 != 0 {
            body.push(0);
        }
        offset = 12 + 16 * num_tables + body.len();
    }
    records.sort_by_key(|(tag, ..)| *tag);

    let mut data = sfnt_version.to_be_bytes().to_vec();
    for value in [num_tables as u16, search_range, entry_selector, range_shift] {
        data.extend_from_slice(&value.to_be_bytes());
    }
    for (tag, checksum, offset, length) in records {
        data.extend_from_slice(&tag);
        data.extend_from_slice(&checksum.to_be_bytes());
        data.extend_from_slice(&(offset as u32).to_be_bytes());
        data.extend_from_slice(&(length as u32).to_be_bytes());
    }
    data.extend_from_slice(&body);
    data
}

fn garamond_with_cff(cff: Vec<u8>) -> Vec<u8> {
    build_sfnt(
        SFNT_OPENTYPE,
        &[
            (*b"cmap", garamond_cmap()),
            (*b"maxp", maxp(GARAMOND_NUM_GLYPHS as u16)),
            (*b"name", name_table("Garamond")),
            (*b"CFF ", cff),
        ],
    )
}

/// The complete Garamond fixture font.
pub fn garamond_otf() -> Vec<u8> {
    garamond_with_cff(garamond_cff().data)
}

/// The Garamond fixture with its `CFF ` table cut off part way through the CharStrings offsets.
pub fn garamond_otf_truncated_charstrings() -> Vec<u8> {
    let CffFixture {
        mut data,
        char_strings_offset,
    } = garamond_cff();
    // count (2) + offSize (1) + 50 two byte offsets
    data.truncate(char_strings_offset + 3 + 100);
    garamond_with_cff(data)
}

/// A TrueType flavoured font with no `CFF ` table.
pub fn truetype_without_cff() -> Vec<u8> {
    build_sfnt(
        SFNT_TRUETYPE,
        &[
            (*b"cmap", garamond_cmap()),
            (*b"maxp", maxp(96)),
            (*b"name", name_table("Plain Sans")),
        ],
    )
}
