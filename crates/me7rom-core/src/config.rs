//! Per-run configuration

use std::path::PathBuf;

use serde::Serialize;
use strum::{Display, EnumString, IntoStaticStr};

use crate::error::{Error, Result};

/// What the run does with the MLHFM table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum RunMode {
    /// Dump the table to a file
    Read,
    /// Merge a table file into the image
    Write,
    /// Report only, never write
    Identify,
    /// Seed/key bypass only
    Patch,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunConfig {
    pub mode: RunMode,
    pub seedkey_bypass: bool,
    pub rom_path: PathBuf,
    /// Output stem in read mode, input table in write mode
    pub table_path: Option<PathBuf>,
}

impl RunConfig {
    pub fn new(mode: RunMode, rom_path: impl Into<PathBuf>) -> Self {
        Self {
            mode,
            seedkey_bypass: mode == RunMode::Patch,
            rom_path: rom_path.into(),
            table_path: None,
        }
    }

    pub fn with_table(mut self, path: impl Into<PathBuf>) -> Self {
        self.table_path = Some(path.into());
        self
    }

    pub fn with_seedkey_bypass(mut self, enabled: bool) -> Self {
        self.seedkey_bypass = enabled || self.mode == RunMode::Patch;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.mode == RunMode::Write && self.table_path.is_none() {
            return Err(Error::InvalidConfig(
                "write mode needs a table file to load".to_string(),
            ));
        }
        Ok(())
    }

    /// Identify runs never touch the filesystem
    pub fn allows_writes(&self) -> bool {
        self.mode != RunMode::Identify
    }
}
