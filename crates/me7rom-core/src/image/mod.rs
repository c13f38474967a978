//! In-memory firmware image

pub mod layout;

use std::fs;
use std::path::Path;

use serde::Serialize;
use strum::{Display, IntoStaticStr};
use tracing::debug;

use crate::error::{Error, Result};
use layout::{ADDRESS_MASK, ROM_FILESIZE};

/// The two supported dump sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, IntoStaticStr)]
pub enum RomSize {
    #[strum(serialize = "512Kb")]
    Small,
    #[strum(serialize = "1Mb")]
    Large,
}

impl RomSize {
    pub fn from_len(len: usize) -> Option<Self> {
        [Self::Small, Self::Large]
            .into_iter()
            .find(|size| size.bytes() == len)
    }

    pub fn bytes(&self) -> usize {
        match self {
            Self::Small => ROM_FILESIZE,
            Self::Large => ROM_FILESIZE * 2,
        }
    }
}

/// A loaded firmware dump.
///
/// Reads are bounds-checked and little-endian. The only mutation points are
/// [`RomImage::write_u8`] and [`RomImage::write_slice`].
#[derive(Debug, Clone)]
pub struct RomImage {
    data: Vec<u8>,
    size: RomSize,
}

impl RomImage {
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let size = RomSize::from_len(data.len()).ok_or_else(|| Error::SizeMismatch {
            what: "Firmware image".to_string(),
            expected: format!("{} or {}", ROM_FILESIZE, ROM_FILESIZE * 2),
            actual: data.len(),
        })?;
        Ok(Self { data, size })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read(&path)?;
        debug!(
            "Read {} bytes from {}",
            data.len(),
            path.as_ref().display()
        );
        Self::from_bytes(data)
    }

    pub fn size(&self) -> RomSize {
        self.size
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Map a physical address to a file offset, rejecting anything that does
    /// not land inside the image.
    pub fn flat_offset(&self, physical: u32) -> Result<usize> {
        let offset = (physical & ADDRESS_MASK) as usize;
        self.check_range(offset, 1)?;
        Ok(offset)
    }

    pub fn check_range(&self, offset: usize, len: usize) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.data.len() => Ok(()),
            _ => Err(Error::OutOfRange {
                offset,
                len,
                image_len: self.data.len(),
            }),
        }
    }

    pub fn slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.check_range(offset, len)?;
        Ok(&self.data[offset..offset + len])
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8> {
        self.check_range(offset, 1)?;
        Ok(self.data[offset])
    }

    pub fn read_u16(&self, offset: usize) -> Result<u16> {
        let b = self.slice(offset, 2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&self, offset: usize) -> Result<u32> {
        let b = self.slice(offset, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn write_u8(&mut self, offset: usize, value: u8) -> Result<()> {
        self.check_range(offset, 1)?;
        self.data[offset] = value;
        Ok(())
    }

    pub fn write_slice(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        self.check_range(offset, bytes.len())?;
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}
