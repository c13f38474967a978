//! Segmented address decoding.
//!
//! C166 code splits a far address into a data page number (loaded with
//! `extp #pag` or into a DPP register) and a 16-bit in-page offset carried
//! as an instruction operand. A 32-bit quantity may be further split into a
//! low and a high word, each fetched through its own operand. The resolver
//! reads those operands out of a matched code fragment, rebuilds the file
//! offset of the data they point at, and reads the data.

use serde::Serialize;
use tracing::trace;

use crate::error::{Error, Result};
use crate::image::RomImage;
use crate::image::layout::SEGMENT_SIZE;
use crate::signature::{AddressField, AddressLayout, FieldWidth};

/// One decoded side of an address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedWord {
    /// Page number read from the code
    pub segment: u16,
    /// Physical address of the value (including the table index)
    pub physical: u32,
    /// File offset the value was read from
    pub offset: usize,
    pub value: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolved {
    Low(ResolvedWord),
    High(ResolvedWord),
    Combined { low: ResolvedWord, high: ResolvedWord },
}

impl Resolved {
    /// The decoded value. A combined address puts the high word in the upper
    /// half.
    pub fn value(&self) -> u32 {
        match self {
            Self::Low(word) | Self::High(word) => word.value,
            Self::Combined { low, high } => (high.value << 16) | (low.value & 0xFFFF),
        }
    }

    /// File offset of the (low side of the) value
    pub fn offset(&self) -> usize {
        match self {
            Self::Low(word) | Self::High(word) => word.offset,
            Self::Combined { low, .. } => low.offset,
        }
    }

    pub fn segment(&self) -> u16 {
        match self {
            Self::Low(word) | Self::High(word) => word.segment,
            Self::Combined { low, .. } => low.segment,
        }
    }
}

/// Decode `layout` relative to a match at `match_offset`.
///
/// `table_index` is a byte stride added to every decoded offset before the
/// value is read, so one layout can walk consecutive table rows. Every
/// offset is range-checked; if either side of a split address lands outside
/// the image the whole decode fails with [`Error::OutOfRange`].
pub fn resolve(
    rom: &RomImage,
    match_offset: usize,
    layout: &AddressLayout,
    table_index: usize,
) -> Result<Resolved> {
    let segment = rom.read_u16(operand_offset(rom, match_offset, layout.segment)?)?;

    let low = layout
        .low
        .map(|field| resolve_side(rom, match_offset, segment, field, table_index))
        .transpose()?;
    let high = layout
        .high
        .map(|field| resolve_side(rom, match_offset, segment, field, table_index))
        .transpose()?;

    match (low, high) {
        (Some(low), Some(high)) => Ok(Resolved::Combined { low, high }),
        (Some(low), None) => Ok(Resolved::Low(low)),
        (None, Some(high)) => Ok(Resolved::High(high)),
        (None, None) => Err(Error::InvalidSignature(
            "Address layout has neither a low nor a high word".to_string(),
        )),
    }
}

fn resolve_side(
    rom: &RomImage,
    match_offset: usize,
    segment: u16,
    field: AddressField,
    table_index: usize,
) -> Result<ResolvedWord> {
    let word = rom.read_u16(operand_offset(rom, match_offset, field.offset)?)?;
    let physical = u32::from(segment) * SEGMENT_SIZE + u32::from(word);
    let base = rom.flat_offset(physical)?;
    let offset = operand_offset(rom, base, table_index)?;

    let value = match field.width {
        FieldWidth::U16 => u32::from(rom.read_u16(offset)?),
        FieldWidth::U32 => rom.read_u32(offset)?,
    };

    trace!(
        "    seg=0x{:X} word=0x{:04X} phy=0x{:X} -> file 0x{:X} = 0x{:X}",
        segment, word, physical, offset, value
    );

    Ok(ResolvedWord {
        segment,
        physical: physical.wrapping_add(table_index as u32),
        offset,
        value,
    })
}

fn operand_offset(rom: &RomImage, base: usize, delta: usize) -> Result<usize> {
    base.checked_add(delta).ok_or(Error::OutOfRange {
        offset: base,
        len: delta,
        image_len: rom.len(),
    })
}
