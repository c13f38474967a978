//! Hexdump command implementation.
//!
//! ```text
//! 0x012000: 48 65 6C 6C 6F 20 57 6F  72 6C 64 00 00 00 00 00  |Hello World.....|
//! ```

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use me7rom_core::RomImage;

const BYTES_PER_LINE: usize = 16;

/// Run the hexdump command
pub fn run(rom: &Path, offset: usize, size: usize, ascii: bool) -> Result<()> {
    let image =
        RomImage::load(rom).with_context(|| format!("Failed to load {}", rom.display()))?;
    let size = size.min(image.len().saturating_sub(offset));
    let bytes = image.slice(offset, size)?;

    println!(
        "Hexdump of {} at 0x{:X} ({} bytes):",
        rom.display(),
        offset,
        bytes.len()
    );
    println!();
    for (i, chunk) in bytes.chunks(BYTES_PER_LINE).enumerate() {
        println!("{}", format_line(offset + i * BYTES_PER_LINE, chunk, ascii));
    }

    Ok(())
}

/// One dump line: offset, two groups of eight bytes, optional ASCII column
pub fn format_line(offset: usize, chunk: &[u8], ascii: bool) -> String {
    let mut line = format!("0x{:06X}: ", offset);
    for j in 0..BYTES_PER_LINE {
        if j == BYTES_PER_LINE / 2 {
            line.push(' ');
        }
        match chunk.get(j) {
            Some(byte) => {
                let _ = write!(line, "{:02X} ", byte);
            }
            None => line.push_str("   "),
        }
    }

    if ascii {
        line.push_str(" |");
        line.extend(chunk.iter().map(|&b| {
            if (0x20..0x7F).contains(&b) {
                b as char
            } else {
                '.'
            }
        }));
        line.extend(std::iter::repeat_n(' ', BYTES_PER_LINE - chunk.len()));
        line.push('|');
    }
    line
}
