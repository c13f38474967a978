//! Findings produced by a run. Every decode and verdict ends up here.

use std::path::PathBuf;

use serde::Serialize;

use super::table::{KnownTable, TableDescriptor};
use crate::checksum::ChecksumRecord;
use crate::config::RunMode;
use crate::error::{Error, Result};
use crate::image::RomSize;
use crate::resolver::Resolved;

/// Outcome of one extraction step
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Step<T> {
    Found(T),
    NotFound,
    Skipped { reason: String },
    Failed { kind: &'static str, reason: String },
}

impl<T> Step<T> {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    pub fn failed(err: &Error) -> Self {
        Self::Failed {
            kind: err.kind(),
            reason: err.to_string(),
        }
    }

    pub fn found(&self) -> Option<&T> {
        match self {
            Self::Found(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Error kind of a failed step
    pub fn failure_kind(&self) -> Option<&'static str> {
        match self {
            Self::Failed { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

impl<T> From<Result<Option<T>>> for Step<T> {
    fn from(result: Result<Option<T>>) -> Self {
        match result {
            Ok(Some(value)) => Self::Found(value),
            Ok(None) => Self::NotFound,
            Err(e) => Self::failed(&e),
        }
    }
}

/// Which catalog signature matched, and where
#[derive(Debug, Clone, Serialize)]
pub struct MatchInfo {
    pub entry: String,
    pub variant: String,
    pub offset: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionCount {
    pub location: MatchInfo,
    pub operand: u8,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionBlock {
    pub index: usize,
    pub start: Resolved,
    pub end: Resolved,
    pub start_offset: usize,
    pub end_offset: usize,
    pub sum: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct MainChecksum {
    pub location: MatchInfo,
    pub regions: Vec<RegionBlock>,
    pub total: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredChecksum {
    pub location: MatchInfo,
    pub stored: Resolved,
    pub complement: Resolved,
    /// Absent when the region sums could not be computed
    pub record: Option<ChecksumRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MultipointCount {
    pub location: MatchInfo,
    pub count: u16,
}

#[derive(Debug, Clone, Serialize)]
pub struct MultipointBlock {
    pub index: usize,
    pub start: u32,
    pub end: u32,
    pub stored: u32,
    pub stored_complement: u32,
    pub check: Step<ChecksumRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Multipoint {
    pub location: MatchInfo,
    pub table_offset: usize,
    pub blocks: Vec<MultipointBlock>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MlhfmTable {
    pub location: MatchInfo,
    /// Entry count as encoded in the compare instruction
    pub encoded_entries: u16,
    /// Map offset operand of the table load
    pub map_offset: u16,
    pub descriptor: TableDescriptor,
    pub crc: u32,
    pub known: Option<KnownTable>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TableAction {
    Saved {
        path: PathBuf,
    },
    AlreadyIdentical {
        crc: u32,
    },
    Merged {
        crc: u32,
        known: Option<KnownTable>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct SeedkeyPatch {
    pub location: MatchInfo,
    pub patch_offset: usize,
    pub previous: u8,
    pub applied: bool,
    pub already_patched: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub rom_size: RomSize,
    pub mode: RunMode,
    pub region_count: Step<RegionCount>,
    pub main_checksum: Step<MainChecksum>,
    pub stored_checksum: Step<StoredChecksum>,
    pub multipoint_count: Step<MultipointCount>,
    pub multipoint: Step<Multipoint>,
    pub seedkey: Option<Step<SeedkeyPatch>>,
    pub mlhfm: Step<MlhfmTable>,
    pub table_action: Option<Step<TableAction>>,
    pub patched_image: Option<PathBuf>,
}

impl RunReport {
    /// Every checksum verdict in the report, main first
    pub fn checksum_records(&self) -> Vec<&ChecksumRecord> {
        let mut records = Vec::new();
        if let Some(record) = self
            .stored_checksum
            .found()
            .and_then(|stored| stored.record.as_ref())
        {
            records.push(record);
        }
        if let Some(multipoint) = self.multipoint.found() {
            records.extend(multipoint.blocks.iter().filter_map(|b| b.check.found()));
        }
        records
    }

    pub fn checksums_ok(&self) -> bool {
        self.checksum_records().iter().all(|r| r.is_ok())
    }
}
