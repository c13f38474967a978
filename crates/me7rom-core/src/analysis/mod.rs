//! Extraction, verification and patching over one loaded image.
//!
//! [`RomAnalyzer::run`] walks the catalog in a fixed order: main checksum
//! region count, region table, stored main checksum, multipoint count,
//! multipoint table, MLHFM lookup, seed/key site. Every step is read-only.
//! Only after all of them have run does the analyzer merge a table or
//! write the bypass byte, and finally save the mutated image.

mod report;
mod table;

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::checksum::{self, ChecksumRecord};
use crate::config::{RunConfig, RunMode};
use crate::error::{Error, Result};
use crate::image::RomImage;
use crate::image::layout::{MAP_FILE_OFFSET, SEEDKEY_PATCH_BYTE, mlhfm, stride};
use crate::resolver;
use crate::scanner::{self, SignatureMatch};
use crate::signature::{SignatureCatalog, SignatureEntry, fields, names, roles};
use crate::storage::{ArtifactStore, patched_image_path, table_dump_path};

pub use report::{
    MainChecksum, MatchInfo, MlhfmTable, Multipoint, MultipointBlock, MultipointCount,
    RegionBlock, RegionCount, RunReport, SeedkeyPatch, Step, StoredChecksum, TableAction,
};
pub use table::{KnownTable, TableDescriptor};

/// Dump name stem for a table that matches no known fingerprint
const UNKNOWN_TABLE_STEM: &str = "MLHFM";

pub struct RomAnalyzer<'a> {
    rom: RomImage,
    catalog: &'a SignatureCatalog,
    config: RunConfig,
    modified: bool,
}

impl<'a> RomAnalyzer<'a> {
    pub fn new(rom: RomImage, catalog: &'a SignatureCatalog, config: RunConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            rom,
            catalog,
            config,
            modified: false,
        })
    }

    pub fn rom(&self) -> &RomImage {
        &self.rom
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Whether a table merge or the bypass byte changed the image
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Run every step and apply the configured action.
    ///
    /// Step failures are recorded in the report. Only a failure to save the
    /// patched image is returned as an error.
    pub fn run<S: ArtifactStore>(&mut self, store: &mut S) -> Result<RunReport> {
        info!(
            "Analyzing {} ({} image, {} mode)",
            self.config.rom_path.display(),
            self.rom.size(),
            self.config.mode
        );

        debug!("Phase 1: main checksum region count");
        let region_count = finish("Main region count", self.scan_region_count());

        debug!("Phase 2: main checksum regions");
        let main_checksum = match region_count.found() {
            Some(found) => finish("Main regions", self.scan_main_regions(found.count)),
            None => Step::skipped("main region count unavailable"),
        };

        debug!("Phase 3: stored main checksum");
        let total = main_checksum.found().map(|main| main.total);
        let stored_checksum = finish("Stored main checksum", self.scan_stored_checksum(total));

        debug!("Phase 4: multipoint checksum count");
        let multipoint_count = finish("Multipoint count", self.scan_multipoint_count());

        debug!("Phase 5: multipoint checksum table");
        let multipoint = match multipoint_count.found() {
            Some(found) => finish("Multipoint table", self.scan_multipoint_table(found.count)),
            None => Step::skipped("multipoint block count unavailable"),
        };

        debug!("Phase 6: MLHFM lookup");
        let mlhfm = finish("MLHFM lookup", self.scan_mlhfm());

        let seedkey_site = if self.config.seedkey_bypass {
            debug!("Phase 7: seed/key check");
            Some(finish("Seed/key check", self.locate_seedkey_site()))
        } else {
            None
        };

        let table_action = match self.config.mode {
            RunMode::Read => Some(self.dump_table(&mlhfm, store)),
            RunMode::Write => Some(self.merge_table(&mlhfm, store)),
            RunMode::Identify | RunMode::Patch => None,
        };
        // A failed merge produces no output image, so the bypass is not applied either
        let merge_failed = self.config.mode == RunMode::Write
            && table_action.as_ref().is_some_and(|action| action.is_failed());
        let seedkey = seedkey_site.map(|site| match site {
            Step::Found(_) if merge_failed => {
                warn!("Table merge failed, seed/key check left untouched");
                Step::skipped("table merge failed")
            }
            site => self.apply_seedkey_bypass(site),
        });

        let patched_image = if merge_failed {
            None
        } else {
            self.save_patched(store)?
        };

        Ok(RunReport {
            rom_size: self.rom.size(),
            mode: self.config.mode,
            region_count,
            main_checksum,
            stored_checksum,
            multipoint_count,
            multipoint,
            seedkey,
            mlhfm,
            table_action,
            patched_image,
        })
    }

    fn locate(&self, name: &str) -> Result<Option<(&'a SignatureEntry, SignatureMatch<'a>)>> {
        let entry = self.catalog.require(name)?;
        debug!("  Scanning for {} ({} variant(s))", name, entry.signatures.len());
        Ok(scanner::find_entry(self.rom.as_bytes(), entry)?.map(|found| (entry, found)))
    }

    /// Image offset of a `width`-byte field of a match
    fn read_field(&self, found: &SignatureMatch<'_>, name: &str, width: usize) -> Result<usize> {
        found
            .offset
            .checked_add(found.signature.field_span(name, width)?)
            .ok_or(Error::OutOfRange {
                offset: found.offset,
                len: 1,
                image_len: self.rom.len(),
            })
    }

    pub fn scan_region_count(&self) -> Result<Option<RegionCount>> {
        let Some((entry, found)) = self.locate(names::MAIN_REGION_COUNT)? else {
            return Ok(None);
        };
        let operand = self.rom.read_u8(self.read_field(&found, fields::COUNT, 1)?)?;
        let count = region_count_from_operand(operand).ok_or_else(|| {
            Error::InvalidSignature(format!(
                "Unexpected region count operand 0x{:02X} at 0x{:X}",
                operand, found.offset
            ))
        })?;
        info!("Main checksum covers {} region(s)", count);

        Ok(Some(RegionCount {
            location: match_info(entry, &found),
            operand,
            count,
        }))
    }

    pub fn scan_main_regions(&self, count: usize) -> Result<Option<MainChecksum>> {
        let Some((entry, found)) = self.locate(names::MAIN_REGIONS)? else {
            return Ok(None);
        };
        let start_layout = found.signature.address(roles::START)?;
        let end_layout = found.signature.address(roles::END)?;

        let mut regions = Vec::with_capacity(count);
        let mut total = 0u32;
        for index in 0..count {
            let row = index * stride::MAIN_REGION;
            let start = resolver::resolve(&self.rom, found.offset, start_layout, row)?;
            let end = resolver::resolve(&self.rom, found.offset, end_layout, row)?;
            let start_offset = self.rom.flat_offset(start.value())?;
            let end_offset = self.rom.flat_offset(end.value())?;
            let sum = checksum::block_sum(self.rom.as_bytes(), start_offset, end_offset)?;
            info!(
                "  Region {}: 0x{:08X}-0x{:08X} sum=0x{:08X}",
                index + 1,
                start.value(),
                end.value(),
                sum
            );
            total = total.wrapping_add(sum);
            regions.push(RegionBlock {
                index,
                start,
                end,
                start_offset,
                end_offset,
                sum,
            });
        }
        info!("Main checksum computed: 0x{:08X}", total);

        Ok(Some(MainChecksum {
            location: match_info(entry, &found),
            regions,
            total,
        }))
    }

    /// Locate the stored main checksum and, when `computed` is known,
    /// check it against the stored value and complement.
    pub fn scan_stored_checksum(&self, computed: Option<u32>) -> Result<Option<StoredChecksum>> {
        let Some((entry, found)) = self.locate(names::MAIN_CHECKSUM_STORED)? else {
            return Ok(None);
        };
        let layout = found.signature.address(roles::CHECKSUM)?;
        let stored = resolver::resolve(&self.rom, found.offset, layout, 0)?;
        let complement =
            resolver::resolve(&self.rom, found.offset, layout, stride::STORED_COMPLEMENT)?;
        debug!(
            "  Stored checksum at 0x{:X}: 0x{:08X} / ~0x{:08X}",
            stored.offset(),
            stored.value(),
            complement.value()
        );

        let record = computed.map(|sum| ChecksumRecord::new(sum, stored.value(), complement.value()));
        match &record {
            Some(record) => log_record("Main checksum", record),
            None => warn!("Stored main checksum found, but there is no computed sum to compare"),
        }

        Ok(Some(StoredChecksum {
            location: match_info(entry, &found),
            stored,
            complement,
            record,
        }))
    }

    pub fn scan_multipoint_count(&self) -> Result<Option<MultipointCount>> {
        let Some((entry, found)) = self.locate(names::MULTIPOINT_COUNT)? else {
            return Ok(None);
        };
        let count = self.rom.read_u16(self.read_field(&found, fields::COUNT, 2)?)?;
        info!("Multipoint checksum blocks: {}", count);

        Ok(Some(MultipointCount {
            location: match_info(entry, &found),
            count,
        }))
    }

    pub fn scan_multipoint_table(&self, count: u16) -> Result<Option<Multipoint>> {
        let Some((entry, found)) = self.locate(names::MULTIPOINT_TABLE)? else {
            return Ok(None);
        };
        let layout = found.signature.address(roles::TABLE)?;
        let table_offset = resolver::resolve(&self.rom, found.offset, layout, 0)?.offset();
        debug!("  Multipoint table at 0x{:X}", table_offset);

        let read = |index: usize| -> Result<u32> {
            Ok(resolver::resolve(&self.rom, found.offset, layout, index)?.value())
        };

        let mut blocks = Vec::with_capacity(usize::from(count));
        for index in 0..usize::from(count) {
            let row = index * stride::MULTIPOINT_ROW;
            let start = read(row)?;
            let end = read(row + stride::MULTIPOINT_END)?;
            let stored = read(row + stride::MULTIPOINT_SUM)?;
            let stored_complement = read(row + stride::MULTIPOINT_COMPLEMENT)?;

            let check = finish(
                &format!("Multipoint block {}", index + 1),
                self.verify_block(start, end, stored, stored_complement)
                    .map(Some),
            );
            if let Some(record) = check.found() {
                log_record(
                    &format!("  Block {} 0x{:08X}-0x{:08X}", index + 1, start, end),
                    record,
                );
            }
            blocks.push(MultipointBlock {
                index,
                start,
                end,
                stored,
                stored_complement,
                check,
            });
        }

        Ok(Some(Multipoint {
            location: match_info(entry, &found),
            table_offset,
            blocks,
        }))
    }

    fn verify_block(
        &self,
        start: u32,
        end: u32,
        stored: u32,
        stored_complement: u32,
    ) -> Result<ChecksumRecord> {
        let start_offset = self.rom.flat_offset(start)?;
        let end_offset = self.rom.flat_offset(end)?;
        let sum = checksum::block_sum(self.rom.as_bytes(), start_offset, end_offset)?;
        Ok(ChecksumRecord::new(sum, stored, stored_complement))
    }

    pub fn scan_mlhfm(&self) -> Result<Option<MlhfmTable>> {
        let Some((entry, found)) = self.locate(names::MLHFM_LOOKUP)? else {
            return Ok(None);
        };
        let encoded_entries = self
            .rom
            .read_u16(self.read_field(&found, fields::ENTRIES, 2)?)?;
        let map_offset = self
            .rom
            .read_u16(self.read_field(&found, fields::TABLE_OFFSET, 2)?)?;

        let entries = match usize::from(encoded_entries) {
            0 => {
                return Err(Error::InvalidSignature(format!(
                    "Code at 0x{:X} matches the MLHFM lookup but encodes no entries",
                    found.offset
                )));
            }
            n if n > mlhfm::MAX_ENTRIES => {
                warn!(
                    "MLHFM entry count {} exceeds {}, using {}",
                    n,
                    mlhfm::MAX_ENTRIES,
                    mlhfm::DEFAULT_ENTRIES
                );
                mlhfm::DEFAULT_ENTRIES
            }
            n => n,
        };

        let descriptor = TableDescriptor::mlhfm(entries, MAP_FILE_OFFSET + usize::from(map_offset));
        let crc = checksum::crc32(self.rom.slice(descriptor.offset, descriptor.byte_len())?);
        let known = KnownTable::from_crc(crc);
        info!(
            "MLHFM: {} entries at 0x{:X}, CRC32 0x{:08X}",
            descriptor.entries, descriptor.offset, crc
        );
        match known {
            Some(table) => info!("  Identified: {}", table.description()),
            None => info!("  Unknown MLHFM table"),
        }

        Ok(Some(MlhfmTable {
            location: match_info(entry, &found),
            encoded_entries,
            map_offset,
            descriptor,
            crc,
            known,
        }))
    }

    /// Find the seed/key check without touching it
    pub fn locate_seedkey_site(&self) -> Result<Option<SeedkeyPatch>> {
        let Some((entry, found)) = self.locate(names::SEEDKEY_BYPASS)? else {
            return Ok(None);
        };
        let patch_offset = self.read_field(&found, fields::PATCH, 1)?;
        let previous = self.rom.read_u8(patch_offset)?;
        info!(
            "Seed/key check ({}) at 0x{:X}, patch site 0x{:X} = 0x{:02X}",
            found.signature.label, found.offset, patch_offset, previous
        );

        Ok(Some(SeedkeyPatch {
            location: match_info(entry, &found),
            patch_offset,
            previous,
            applied: false,
            already_patched: previous == SEEDKEY_PATCH_BYTE,
        }))
    }

    fn apply_seedkey_bypass(&mut self, site: Step<SeedkeyPatch>) -> Step<SeedkeyPatch> {
        let Step::Found(mut patch) = site else {
            return site;
        };
        if patch.already_patched {
            info!("Seed/key check already bypassed");
            return Step::Found(patch);
        }
        if !self.config.allows_writes() {
            info!("Identify only, seed/key check left untouched");
            return Step::Found(patch);
        }

        if let Err(e) = self.rom.write_u8(patch.patch_offset, SEEDKEY_PATCH_BYTE) {
            warn!("Seed/key patch failed: {}", e);
            return Step::failed(&e);
        }
        info!(
            "Patched 0x{:X}: 0x{:02X} -> 0x{:02X}",
            patch.patch_offset, patch.previous, SEEDKEY_PATCH_BYTE
        );
        patch.applied = true;
        self.modified = true;
        Step::Found(patch)
    }

    fn dump_table<S: ArtifactStore>(
        &self,
        mlhfm: &Step<MlhfmTable>,
        store: &mut S,
    ) -> Step<TableAction> {
        let Some(table) = mlhfm.found() else {
            return Step::skipped("MLHFM table not located");
        };
        let stem = match (&self.config.table_path, table.known) {
            (Some(name), _) => name.clone(),
            (None, Some(known)) => PathBuf::from(known.file_stem()),
            (None, None) => PathBuf::from(UNKNOWN_TABLE_STEM),
        };
        let path = table_dump_path(&stem, table.crc);

        let saved = self
            .rom
            .slice(table.descriptor.offset, table.descriptor.byte_len())
            .and_then(|bytes| store.save(&path, bytes));
        match saved {
            Ok(()) => Step::Found(TableAction::Saved { path }),
            Err(e) => {
                warn!("Could not save MLHFM table: {}", e);
                Step::failed(&e)
            }
        }
    }

    fn merge_table<S: ArtifactStore>(
        &mut self,
        mlhfm: &Step<MlhfmTable>,
        store: &mut S,
    ) -> Step<TableAction> {
        let Some(table) = mlhfm.found() else {
            return Step::skipped("MLHFM table not located");
        };
        let Some(path) = self.config.table_path.clone() else {
            return Step::skipped("no table file given");
        };
        finish("MLHFM merge", self.try_merge(table, &path, store).map(Some))
    }

    fn try_merge<S: ArtifactStore>(
        &mut self,
        table: &MlhfmTable,
        path: &Path,
        store: &S,
    ) -> Result<TableAction> {
        let bytes = store.load(path)?;
        let expected = table.descriptor.byte_len();
        if bytes.len() != expected {
            return Err(Error::SizeMismatch {
                what: format!("MLHFM table {}", path.display()),
                expected: expected.to_string(),
                actual: bytes.len(),
            });
        }

        let crc = checksum::crc32(&bytes);
        let known = KnownTable::from_crc(crc);
        info!("Loaded MLHFM {} CRC32 0x{:08X}", path.display(), crc);
        if let Some(table) = known {
            info!("  Identified: {}", table.description());
        }

        if crc == table.crc {
            info!("MLHFM in image is already identical, nothing to merge");
            return Ok(TableAction::AlreadyIdentical { crc });
        }

        self.rom.write_slice(table.descriptor.offset, &bytes)?;
        self.modified = true;
        info!(
            "Merged {} bytes at 0x{:X}",
            bytes.len(),
            table.descriptor.offset
        );
        Ok(TableAction::Merged { crc, known })
    }

    fn save_patched<S: ArtifactStore>(&self, store: &mut S) -> Result<Option<PathBuf>> {
        if !self.modified || !self.config.allows_writes() {
            return Ok(None);
        }
        let path = patched_image_path(&self.config.rom_path);
        store.save(&path, self.rom.as_bytes())?;
        Ok(Some(path))
    }
}

/// Region loop bound encoded as `cmp rX, #2/#4/#6`
fn region_count_from_operand(operand: u8) -> Option<usize> {
    match operand {
        0xA2 => Some(1),
        0xA4 => Some(2),
        0xA6 => Some(3),
        _ => None,
    }
}

fn match_info(entry: &SignatureEntry, found: &SignatureMatch<'_>) -> MatchInfo {
    MatchInfo {
        entry: entry.name.clone(),
        variant: found.signature.label.clone(),
        offset: found.offset,
    }
}

fn finish<T>(what: &str, result: Result<Option<T>>) -> Step<T> {
    let step = Step::from(result);
    match &step {
        Step::NotFound => warn!("{}: not found", what),
        Step::Failed { reason, .. } => warn!("{}: {}", what, reason),
        _ => {}
    }
    step
}

fn log_record(what: &str, record: &ChecksumRecord) {
    if record.is_ok() {
        info!(
            "{}: 0x{:08X} sum {} complement {}",
            what, record.computed, record.sum, record.complement
        );
    } else {
        warn!(
            "{}: computed 0x{:08X}, stored 0x{:08X} / 0x{:08X}: sum {} complement {}",
            what,
            record.computed,
            record.stored,
            record.stored_complement,
            record.sum,
            record.complement
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::layout::ROM_FILESIZE;
    use crate::signature::{CodeSignature, builtin_signatures};
    use crate::storage::mock::MemoryStore;

    const LOOKUP_AT: usize = 0x3000;
    const SEEDKEY_AT: usize = 0x5000;
    const MAP_OFFSET: u16 = 0x2000;
    const TABLE_AT: usize = MAP_FILE_OFFSET + MAP_OFFSET as usize;

    fn plant(data: &mut [u8], at: usize, entry: &str, variant: usize) -> usize {
        let catalog = builtin_signatures();
        let sig = &catalog.require(entry).unwrap().signatures[variant];
        for (i, b) in sig.pattern_bytes().unwrap().iter().enumerate() {
            data[at + i] = b.unwrap_or(0);
        }
        at
    }

    fn rom_with_lookup(entries: u16) -> Vec<u8> {
        let mut data = vec![0u8; ROM_FILESIZE];
        let at = plant(&mut data, LOOKUP_AT, names::MLHFM_LOOKUP, 0);
        data[at + 4..at + 6].copy_from_slice(&entries.to_le_bytes());
        data[at + 14..at + 16].copy_from_slice(&MAP_OFFSET.to_le_bytes());
        for i in 0..mlhfm::TABLE_LEN {
            data[TABLE_AT + i] = (i % 251) as u8;
        }
        data
    }

    fn rom_with_seedkey(data: &mut [u8], previous: u8) -> usize {
        let at = plant(data, SEEDKEY_AT, names::SEEDKEY_BYPASS, 0);
        data[at + 0x5d] = previous;
        at + 0x5d
    }

    fn catalog_with(name: &str, signature: CodeSignature) -> SignatureCatalog {
        let mut catalog = builtin_signatures();
        let entry = catalog
            .entries
            .iter_mut()
            .find(|entry| entry.name == name)
            .unwrap();
        entry.signatures = vec![signature];
        catalog
    }

    fn run(data: Vec<u8>, config: RunConfig, store: &mut MemoryStore) -> RunReport {
        let catalog = builtin_signatures();
        let rom = RomImage::from_bytes(data).unwrap();
        RomAnalyzer::new(rom, &catalog, config)
            .unwrap()
            .run(store)
            .unwrap()
    }

    #[test]
    fn test_mlhfm_located_and_fingerprinted() {
        let data = rom_with_lookup(512);
        let expected_crc = checksum::crc32(&data[TABLE_AT..TABLE_AT + mlhfm::TABLE_LEN]);
        let mut store = MemoryStore::default();

        let report = run(data, RunConfig::new(RunMode::Identify, "rom.bin"), &mut store);
        let table = report.mlhfm.found().unwrap();
        assert_eq!(table.location.offset, LOOKUP_AT);
        assert_eq!(table.descriptor, TableDescriptor::mlhfm(512, TABLE_AT));
        assert_eq!(table.crc, expected_crc);
        assert_eq!(table.known, None);
        assert!(store.writes.is_empty());
    }

    #[test]
    fn test_mlhfm_zero_entries_fails_step() {
        let mut store = MemoryStore::default();
        let report = run(
            rom_with_lookup(0),
            RunConfig::new(RunMode::Identify, "rom.bin"),
            &mut store,
        );
        assert!(report.mlhfm.is_failed());
    }

    #[test]
    fn test_mlhfm_oversized_entry_count_uses_default() {
        let mut store = MemoryStore::default();
        let report = run(
            rom_with_lookup(0x0800),
            RunConfig::new(RunMode::Identify, "rom.bin"),
            &mut store,
        );
        let table = report.mlhfm.found().unwrap();
        assert_eq!(table.encoded_entries, 0x0800);
        assert_eq!(table.descriptor.entries, mlhfm::DEFAULT_ENTRIES);
    }

    #[test]
    fn test_read_mode_dump_names() {
        let data = rom_with_lookup(512);
        let crc = checksum::crc32(&data[TABLE_AT..TABLE_AT + mlhfm::TABLE_LEN]);

        let mut store = MemoryStore::default();
        let report = run(data.clone(), RunConfig::new(RunMode::Read, "rom.bin"), &mut store);
        let expected = PathBuf::from(format!("MLHFM_{:x}.bin", crc));
        assert!(matches!(
            report.table_action.as_ref().and_then(|a| a.found()),
            Some(TableAction::Saved { path }) if *path == expected
        ));
        assert_eq!(store.files[&expected], &data[TABLE_AT..TABLE_AT + mlhfm::TABLE_LEN]);
        assert_eq!(report.patched_image, None);

        let mut store = MemoryStore::default();
        run(
            data,
            RunConfig::new(RunMode::Read, "rom.bin").with_table("mine"),
            &mut store,
        );
        assert_eq!(store.writes, vec![PathBuf::from(format!("mine_{:x}.bin", crc))]);
    }

    #[test]
    fn test_read_mode_without_table_skips_dump() {
        let mut store = MemoryStore::default();
        let report = run(
            vec![0u8; ROM_FILESIZE],
            RunConfig::new(RunMode::Read, "rom.bin"),
            &mut store,
        );
        assert!(report.mlhfm.is_not_found());
        assert!(matches!(report.table_action, Some(Step::Skipped { .. })));
        assert!(store.writes.is_empty());
    }

    #[test]
    fn test_write_mode_merges_new_table() {
        let replacement = vec![0xABu8; mlhfm::TABLE_LEN];
        let mut store = MemoryStore::default().with_file("tune.bin", replacement.clone());
        let report = run(
            rom_with_lookup(512),
            RunConfig::new(RunMode::Write, "rom.bin").with_table("tune.bin"),
            &mut store,
        );

        assert!(matches!(
            report.table_action.as_ref().and_then(|a| a.found()),
            Some(TableAction::Merged { known: None, .. })
        ));
        let patched = PathBuf::from("rom.bin_patched.bin");
        assert_eq!(report.patched_image.as_ref(), Some(&patched));
        assert_eq!(
            &store.files[&patched][TABLE_AT..TABLE_AT + mlhfm::TABLE_LEN],
            replacement.as_slice()
        );
    }

    #[test]
    fn test_write_mode_missing_table_file_fails() {
        let mut store = MemoryStore::default();
        let report = run(
            rom_with_lookup(512),
            RunConfig::new(RunMode::Write, "rom.bin").with_table("missing.bin"),
            &mut store,
        );
        assert!(report.table_action.unwrap().is_failed());
        assert!(store.writes.is_empty());
    }

    #[test]
    fn test_patch_mode_applies_bypass() {
        let mut data = vec![0u8; ROM_FILESIZE];
        let site = rom_with_seedkey(&mut data, 0x00);
        let mut store = MemoryStore::default();

        let report = run(data, RunConfig::new(RunMode::Patch, "rom.bin"), &mut store);
        let patch = report.seedkey.as_ref().and_then(|s| s.found()).unwrap();
        assert!(patch.applied);
        assert_eq!(patch.patch_offset, site);
        assert_eq!(patch.location.variant, "variant_1");

        let image = &store.files[&PathBuf::from("rom.bin_patched.bin")];
        assert_eq!(image[site], SEEDKEY_PATCH_BYTE);
    }

    #[test]
    fn test_patch_mode_falls_back_to_second_seedkey_variant() {
        let mut data = vec![0u8; ROM_FILESIZE];
        let at = plant(&mut data, SEEDKEY_AT, names::SEEDKEY_BYPASS, 1);
        let mut store = MemoryStore::default();

        let report = run(data, RunConfig::new(RunMode::Patch, "rom.bin"), &mut store);
        let patch = report.seedkey.as_ref().and_then(|s| s.found()).unwrap();
        assert_eq!(patch.location.variant, "variant_2");
        assert_eq!(patch.location.offset, at);
        assert_eq!(patch.patch_offset, at + 0x64);
        assert!(patch.applied);

        let image = &store.files[&PathBuf::from("rom.bin_patched.bin")];
        assert_eq!(image[at + 0x64], SEEDKEY_PATCH_BYTE);
    }

    #[test]
    fn test_failed_merge_leaves_seedkey_untouched() {
        let mut data = rom_with_lookup(512);
        let site = rom_with_seedkey(&mut data, 0x00);
        let catalog = builtin_signatures();
        let rom = RomImage::from_bytes(data).unwrap();
        let config = RunConfig::new(RunMode::Write, "rom.bin")
            .with_table("missing.bin")
            .with_seedkey_bypass(true);
        let mut analyzer = RomAnalyzer::new(rom, &catalog, config).unwrap();
        let mut store = MemoryStore::default();

        let report = analyzer.run(&mut store).unwrap();
        assert!(report.table_action.as_ref().unwrap().is_failed());
        assert!(matches!(report.seedkey, Some(Step::Skipped { .. })));
        assert!(!analyzer.is_modified());
        assert_eq!(analyzer.rom().as_bytes()[site], 0x00);
        assert!(store.writes.is_empty());
    }

    #[test]
    fn test_word_field_at_pattern_end_fails_step() {
        let mut field_map = std::collections::BTreeMap::new();
        field_map.insert(fields::ENTRIES.to_string(), 3);
        field_map.insert(fields::TABLE_OFFSET.to_string(), 0);
        let catalog = catalog_with(
            names::MLHFM_LOOKUP,
            CodeSignature {
                label: "short".to_string(),
                pattern: "F0 C4 46 ??".to_string(),
                addresses: Default::default(),
                fields: field_map,
            },
        );
        catalog.validate().unwrap();

        let mut data = vec![0u8; ROM_FILESIZE];
        data[LOOKUP_AT..LOOKUP_AT + 4].copy_from_slice(&[0xF0, 0xC4, 0x46, 0x10]);
        let rom = RomImage::from_bytes(data).unwrap();
        let report = RomAnalyzer::new(rom, &catalog, RunConfig::new(RunMode::Identify, "rom.bin"))
            .unwrap()
            .run(&mut MemoryStore::default())
            .unwrap();
        assert_eq!(report.mlhfm.failure_kind(), Some("invalid_signature"));
    }

    #[test]
    fn test_identify_reports_site_without_writing() {
        let mut data = vec![0u8; ROM_FILESIZE];
        rom_with_seedkey(&mut data, 0x00);
        let mut store = MemoryStore::default();

        let report = run(
            data,
            RunConfig::new(RunMode::Identify, "rom.bin").with_seedkey_bypass(true),
            &mut store,
        );
        let patch = report.seedkey.as_ref().and_then(|s| s.found()).unwrap();
        assert!(!patch.applied);
        assert!(!patch.already_patched);
        assert_eq!(report.patched_image, None);
        assert!(store.writes.is_empty());
    }

    #[test]
    fn test_already_patched_site_is_left_alone() {
        let mut data = vec![0u8; ROM_FILESIZE];
        rom_with_seedkey(&mut data, SEEDKEY_PATCH_BYTE);
        let mut store = MemoryStore::default();

        let report = run(data, RunConfig::new(RunMode::Patch, "rom.bin"), &mut store);
        let patch = report.seedkey.as_ref().and_then(|s| s.found()).unwrap();
        assert!(patch.already_patched);
        assert!(!patch.applied);
        assert!(store.writes.is_empty());
    }

    #[test]
    fn test_dependent_steps_are_skipped() {
        let mut store = MemoryStore::default();
        let report = run(
            vec![0u8; ROM_FILESIZE],
            RunConfig::new(RunMode::Identify, "rom.bin"),
            &mut store,
        );
        assert!(report.region_count.is_not_found());
        assert!(matches!(report.main_checksum, Step::Skipped { .. }));
        assert!(report.stored_checksum.is_not_found());
        assert!(matches!(report.multipoint, Step::Skipped { .. }));
        assert!(report.seedkey.is_none());
    }

    #[test]
    fn test_missing_catalog_entries_fail_steps_not_run() {
        let catalog = SignatureCatalog {
            version: "empty".to_string(),
            entries: Vec::new(),
        };
        let rom = RomImage::from_bytes(vec![0u8; ROM_FILESIZE]).unwrap();
        let mut analyzer =
            RomAnalyzer::new(rom, &catalog, RunConfig::new(RunMode::Patch, "rom.bin")).unwrap();
        let report = analyzer.run(&mut MemoryStore::default()).unwrap();
        assert!(report.region_count.is_failed());
        assert!(report.mlhfm.is_failed());
        assert!(report.seedkey.unwrap().is_failed());
        assert!(!analyzer.is_modified());
    }

    #[test]
    fn test_rejects_invalid_config() {
        let catalog = builtin_signatures();
        let rom = RomImage::from_bytes(vec![0u8; ROM_FILESIZE]).unwrap();
        let result = RomAnalyzer::new(rom, &catalog, RunConfig::new(RunMode::Write, "rom.bin"));
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_region_count_operands() {
        assert_eq!(region_count_from_operand(0xA2), Some(1));
        assert_eq!(region_count_from_operand(0xA6), Some(3));
        assert_eq!(region_count_from_operand(0xA8), None);
    }
}
