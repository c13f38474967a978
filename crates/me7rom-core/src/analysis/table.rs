//! MLHFM table description and fingerprinting

use serde::Serialize;
use strum::{Display, IntoStaticStr};

use crate::image::layout::mlhfm::ELEMENT_WIDTH;

/// Location and shape of a lookup table inside the image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TableDescriptor {
    pub entries: usize,
    pub element_width: usize,
    pub offset: usize,
}

impl TableDescriptor {
    pub fn mlhfm(entries: usize, offset: usize) -> Self {
        Self {
            entries,
            element_width: ELEMENT_WIDTH,
            offset,
        }
    }

    pub fn byte_len(&self) -> usize {
        self.entries * self.element_width
    }
}

/// Stock tables recognized by their CRC32
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, IntoStaticStr)]
pub enum KnownTable {
    Modena,
    Stradale,
}

impl KnownTable {
    const MODENA_CRC: u32 = 0x0420_0BC1;
    const STRADALE_CRC: u32 = 0x87B3_489A;

    pub fn from_crc(crc: u32) -> Option<Self> {
        match crc {
            Self::MODENA_CRC => Some(Self::Modena),
            Self::STRADALE_CRC => Some(Self::Stradale),
            _ => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Modena => "Ferrari 360 Modena/Spider/Challenge (Stock) Air Flow Meters",
            Self::Stradale => "Ferrari 360 Challenge Stradale (Stock) Air Flow Meters",
        }
    }

    /// Default dump name stem, e.g. `MLHFM_Modena`
    pub fn file_stem(&self) -> String {
        format!("MLHFM_{}", self)
    }
}
