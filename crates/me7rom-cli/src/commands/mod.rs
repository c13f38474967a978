//! CLI command implementations.

pub mod hex_utils;
pub mod hexdump;
pub mod run;
pub mod signatures;
