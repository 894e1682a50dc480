#![deny(missing_docs)]

use std::num::Wrapping;

use crate::binary::read::ReadScope;
use crate::binary::U32Be;
use crate::error::ParseError;
use crate::tag;

/// Byte offset of `checksumAdjustment` within the `head` table.
const HEAD_CHECKSUM_ADJUSTMENT_OFFSET: usize = 8;

/// Calculate a checksum of `data` according to the OpenType table checksum algorithm
///
/// Tables whose length is not a multiple of four are summed as if zero padded.
///
/// https://docs.microsoft.com/en-us/typography/opentype/spec/otff#calculating-checksums
pub fn table_checksum(data: &[u8]) -> Result<Wrapping<u32>, ParseError> {
    let whole_words = data.len() / 4;
    let mut ctxt = ReadScope::new(data).ctxt();
    let array = ctxt.read_array::<U32Be>(whole_words)?;
    let sum: Wrapping<u32> = array.iter().map(Wrapping).sum();

    let tail = ctxt.read_slice(ctxt.remaining())?;
    if tail.is_empty() {
        return Ok(sum);
    }
    let mut last = [0u8; 4];
    last[..tail.len()].copy_from_slice(tail);
    Ok(sum + Wrapping(u32::from_be_bytes(last)))
}

/// Calculate the checksum of the table identified by `table_tag`.
///
/// The `head` table's `checksumAdjustment` field is treated as zero, as required when the
/// checksum stored in the table directory was computed.
pub fn checksum_for_tag(table_tag: u32, data: &[u8]) -> Result<Wrapping<u32>, ParseError> {
    let checksum = table_checksum(data)?;
    if table_tag != tag::HEAD {
        return Ok(checksum);
    }
    let adjustment = ReadScope::new(data)
        .offset(HEAD_CHECKSUM_ADJUSTMENT_OFFSET)
        .ctxt()
        .read_u32be()
        .map(Wrapping)
        .unwrap_or(Wrapping(0));
    Ok(checksum - adjustment)
}
