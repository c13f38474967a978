//! Command-line definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "me7rom")]
#[command(about = "ME7.3H4 firmware checksum, MLHFM and seed/key tool", long_about = None)]
pub struct Cli {
    /// Signature catalog (JSON) to use instead of the built-in one
    #[arg(long, global = true, env = "ME7ROM_SIGNATURES")]
    pub signatures: Option<PathBuf>,

    /// Print the run report as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Verify checksums and dump the MLHFM table
    #[command(visible_alias = "r")]
    Read {
        /// Firmware image (512 KiB or 1 MiB)
        rom: PathBuf,

        /// Output name stem, the CRC32 and .bin are appended
        name: Option<PathBuf>,

        /// Also bypass the seed/key check
        #[arg(long)]
        skey: bool,
    },

    /// Merge an MLHFM table into the image and save <rom>_patched.bin
    #[command(visible_alias = "w")]
    Write {
        /// Firmware image (512 KiB or 1 MiB)
        rom: PathBuf,

        /// Raw MLHFM table (1024 bytes)
        table: PathBuf,

        /// Also bypass the seed/key check
        #[arg(long)]
        skey: bool,
    },

    /// Report findings without writing anything
    #[command(visible_alias = "i")]
    Identify {
        /// Firmware image (512 KiB or 1 MiB)
        rom: PathBuf,

        /// Also locate the seed/key check
        #[arg(long)]
        skey: bool,
    },

    /// Bypass the seed/key check and save <rom>_patched.bin
    #[command(visible_alias = "p")]
    Patch {
        /// Firmware image (512 KiB or 1 MiB)
        rom: PathBuf,
    },

    /// Dump raw bytes from an image
    Hexdump {
        /// Firmware image (512 KiB or 1 MiB)
        rom: PathBuf,

        /// File offset (hex, e.g. 0x12000)
        offset: String,

        /// Number of bytes
        #[arg(short, long, default_value = "256")]
        size: usize,

        /// Show ASCII column
        #[arg(short, long)]
        ascii: bool,
    },

    /// Export the built-in signature catalog as JSON
    Signatures {
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
