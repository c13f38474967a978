//! Checksum and integrity helpers

use flate2::Crc;
use serde::Serialize;
use strum::Display;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
pub enum Verdict {
    #[strum(serialize = "OK")]
    Ok,
    #[strum(serialize = "BAD")]
    Bad,
}

impl Verdict {
    pub fn from_eq(equal: bool) -> Self {
        if equal { Self::Ok } else { Self::Bad }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// A computed sum checked against the value and complement stored in the
/// firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChecksumRecord {
    pub computed: u32,
    pub stored: u32,
    pub stored_complement: u32,
    pub sum: Verdict,
    pub complement: Verdict,
}

impl ChecksumRecord {
    pub fn new(computed: u32, stored: u32, stored_complement: u32) -> Self {
        Self {
            computed,
            stored,
            stored_complement,
            sum: Verdict::from_eq(computed == stored),
            complement: Verdict::from_eq(!computed == stored_complement),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.sum.is_ok() && self.complement.is_ok()
    }
}

/// Sum of little-endian 16-bit words covering bytes `start..=end`, modulo
/// 2^32.
///
/// Word indices run from `start / 2` through `end / 2`, so an odd `end`
/// (the usual `...FFFF` region end) includes its whole last word.
pub fn block_sum(data: &[u8], start: usize, end: usize) -> Result<u32> {
    let first = start / 2;
    let last = end / 2;
    if start > end || (last + 1) * 2 > data.len() {
        return Err(Error::OutOfRange {
            offset: start,
            len: end.saturating_sub(start) + 1,
            image_len: data.len(),
        });
    }

    Ok(data[first * 2..(last + 1) * 2]
        .chunks_exact(2)
        .fold(0u32, |sum, w| {
            sum.wrapping_add(u32::from(u16::from_le_bytes([w[0], w[1]])))
        }))
}

/// Standard (zlib) CRC32
pub fn crc32(bytes: &[u8]) -> u32 {
    let mut crc = Crc::new();
    crc.update(bytes);
    crc.sum()
}
