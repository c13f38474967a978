//! Address-space and table layout constants for ME7.x firmware images
//!
//! The C166 core addresses flash through 16 KiB data pages. Code loads a
//! page number and a 16-bit in-page offset separately, so a physical address
//! is `page * SEGMENT_SIZE + offset`. The external flash is mapped at
//! `ROM_BASE_ADDRESS`; masking a physical address with `ADDRESS_MASK` drops
//! the base and leaves the byte offset into the dumped image.
//!
//! ```text
//!   physical 0x0081_9234
//!            └─┬─┘
//!              └─ cleared by ADDRESS_MASK ──► file offset 0x1_9234
//! ```

/// Size of a "small" (512 KiB) image. Large images are twice this.
pub const ROM_FILESIZE: usize = 512 * 1024;

/// Physical address the flash is mapped at.
pub const ROM_BASE_ADDRESS: u32 = 0x0080_0000;

/// Keeps the low 20 bits: the 1 MiB window that file offsets live in.
pub const ADDRESS_MASK: u32 = 0x000F_FFFF;

/// Bytes per data page (segment selector unit).
pub const SEGMENT_SIZE: u32 = 0x4000;

/// Map offsets decoded from `mov Rx, [Ry + #imm]` are relative to this.
pub const MAP_FILE_OFFSET: usize = 0x10000;

/// MLHFM (air-mass meter linearization) table layout
pub mod mlhfm {
    /// Each entry is a little-endian u16
    pub const ELEMENT_WIDTH: usize = 2;

    /// Upper bound for a believable entry count
    pub const MAX_ENTRIES: usize = 1024;

    /// Entry count assumed when the decoded count is implausible
    pub const DEFAULT_ENTRIES: usize = 512;

    /// Byte length of a stock table (512 entries)
    pub const TABLE_LEN: usize = DEFAULT_ENTRIES * ELEMENT_WIDTH;
}

/// Row strides of tables walked with a table index
pub mod stride {
    /// Main checksum region row: start lo/hi, end lo/hi (u16 each)
    pub const MAIN_REGION: usize = 8;

    /// Stored main checksum: sum followed by its complement
    pub const STORED_COMPLEMENT: usize = 4;

    /// Multipoint row: start, end, sum, ~sum (u32 each)
    pub const MULTIPOINT_ROW: usize = 16;
    pub const MULTIPOINT_END: usize = 4;
    pub const MULTIPOINT_SUM: usize = 8;
    pub const MULTIPOINT_COMPLEMENT: usize = 12;
}

/// Byte written over the bypass site (`movb rl2, #1`)
pub const SEEDKEY_PATCH_BYTE: u8 = 0x14;
