//! Human-readable report printing

use me7rom_core::{
    ChecksumRecord, MatchInfo, RunReport, SeedkeyPatch, Step, TableAction, Verdict,
};
use owo_colors::OwoColorize;

pub fn print_report(report: &RunReport) {
    println!("=== {} image, {} mode ===", report.rom_size, report.mode);
    println!();

    println!("Main checksum:");
    println!(
        "  Region count:    {}",
        describe(&report.region_count, |c| format!(
            "{} ({}), operand 0x{:02X}",
            c.count,
            at(&c.location),
            c.operand
        ))
    );
    println!(
        "  Regions:         {}",
        describe(&report.main_checksum, |m| format!(
            "total 0x{:08X} ({})",
            m.total,
            at(&m.location)
        ))
    );
    if let Some(main) = report.main_checksum.found() {
        for region in &main.regions {
            println!(
                "    {}: 0x{:08X}-0x{:08X} sum 0x{:08X}",
                region.index + 1,
                region.start.value(),
                region.end.value(),
                region.sum
            );
        }
    }
    println!(
        "  Stored:          {}",
        describe(&report.stored_checksum, |s| match &s.record {
            Some(record) => format!("{} ({})", format_record(record), at(&s.location)),
            None => format!(
                "0x{:08X} / 0x{:08X}, nothing to compare ({})",
                s.stored.value(),
                s.complement.value(),
                at(&s.location)
            ),
        })
    );
    println!();

    println!("Multipoint checksums:");
    println!(
        "  Block count:     {}",
        describe(&report.multipoint_count, |c| format!(
            "{} ({})",
            c.count,
            at(&c.location)
        ))
    );
    match report.multipoint.found() {
        Some(multipoint) => {
            println!("  Table:           0x{:X}", multipoint.table_offset);
            for block in &multipoint.blocks {
                println!(
                    "    {}: 0x{:08X}-0x{:08X} {}",
                    block.index + 1,
                    block.start,
                    block.end,
                    describe(&block.check, format_record)
                );
            }
        }
        None => println!(
            "  Table:           {}",
            describe(&report.multipoint, |_| String::new())
        ),
    }
    println!();

    println!("MLHFM:");
    println!(
        "  Table:           {}",
        describe(&report.mlhfm, |t| format!(
            "{} entries at 0x{:X}, CRC32 0x{:08X} ({})",
            t.descriptor.entries,
            t.descriptor.offset,
            t.crc,
            at(&t.location)
        ))
    );
    if let Some(table) = report.mlhfm.found() {
        match table.known {
            Some(known) => println!("  Identified:      {}", known.description().green()),
            None => println!("  Identified:      {}", "unknown table".yellow()),
        }
    }
    if let Some(action) = &report.table_action {
        println!("  Action:          {}", describe(action, format_action));
    }

    if let Some(seedkey) = &report.seedkey {
        println!();
        println!("Seed/key:");
        println!("  Check:           {}", describe(seedkey, format_seedkey));
    }

    if let Some(path) = &report.patched_image {
        println!();
        println!("Patched image saved to {}", path.display().bold());
    }
}

fn describe<T>(step: &Step<T>, found: impl FnOnce(&T) -> String) -> String {
    match step {
        Step::Found(value) => found(value),
        Step::NotFound => "not found".yellow().to_string(),
        Step::Skipped { reason } => format!("skipped, {}", reason).dimmed().to_string(),
        Step::Failed { reason, .. } => format!("failed: {}", reason).red().to_string(),
    }
}

fn at(location: &MatchInfo) -> String {
    format!("{} at 0x{:X}", location.variant, location.offset)
}

fn verdict(verdict: Verdict) -> String {
    match verdict {
        Verdict::Ok => verdict.green().to_string(),
        Verdict::Bad => verdict.red().bold().to_string(),
    }
}

fn format_record(record: &ChecksumRecord) -> String {
    format!(
        "computed 0x{:08X}, stored 0x{:08X} / 0x{:08X}: sum {} complement {}",
        record.computed,
        record.stored,
        record.stored_complement,
        verdict(record.sum),
        verdict(record.complement)
    )
}

fn format_action(action: &TableAction) -> String {
    match action {
        TableAction::Saved { path } => format!("saved to {}", path.display()),
        TableAction::AlreadyIdentical { crc } => {
            format!("already identical (CRC32 0x{:08X}), nothing written", crc)
        }
        TableAction::Merged { crc, known } => format!(
            "merged CRC32 0x{:08X}{}",
            crc,
            known
                .map(|k| format!(", {}", k.description()))
                .unwrap_or_default()
        ),
    }
}

fn format_seedkey(patch: &SeedkeyPatch) -> String {
    let state = if patch.already_patched {
        "already bypassed".green().to_string()
    } else if patch.applied {
        format!("patched 0x{:02X} -> 0x14", patch.previous)
            .green()
            .to_string()
    } else {
        format!("found, byte 0x{:02X} left untouched", patch.previous)
    };
    format!("{} ({}, site 0x{:X})", state, at(&patch.location), patch.patch_offset)
}
