//! # me7rom-core
//!
//! Core library for inspecting and patching Bosch ME7.3H4 (Ferrari 360)
//! firmware dumps.
//!
//! This crate provides:
//! - A data-driven signature catalog of C166 code fragments
//! - Masked pattern scanning and segmented-address decoding
//! - Main and multipoint checksum verification, CRC32 fingerprinting
//! - MLHFM table extraction and merging, seed/key bypass patching
//!
//! A run is driven by [`RomAnalyzer`], which records every finding in a
//! serializable [`RunReport`].

pub mod analysis;
pub mod checksum;
pub mod config;
pub mod error;
pub mod image;
pub mod resolver;
pub mod scanner;
pub mod signature;
pub mod storage;

pub use analysis::{
    KnownTable, MainChecksum, MatchInfo, MlhfmTable, Multipoint, MultipointBlock,
    MultipointCount, RegionBlock, RegionCount, RomAnalyzer, RunReport, SeedkeyPatch, Step,
    StoredChecksum, TableAction, TableDescriptor,
};
pub use checksum::{ChecksumRecord, Verdict, block_sum, crc32};
pub use config::{RunConfig, RunMode};
pub use error::{Error, Result};
pub use image::{RomImage, RomSize};
pub use resolver::{Resolved, ResolvedWord, resolve};
pub use scanner::{SignatureMatch, find, find_entry};
pub use signature::{
    AddressField, AddressLayout, CodeSignature, FieldWidth, Signature, SignatureCatalog,
    SignatureEntry, builtin_signatures, format_pattern, load_signatures, parse_pattern,
    save_signatures,
};
pub use storage::{ArtifactStore, FileStore, patched_image_path, table_dump_path};
