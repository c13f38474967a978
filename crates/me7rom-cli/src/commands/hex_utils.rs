//! Hex offset parsing.

use anyhow::Result;

/// Parse a hex file offset (with or without 0x prefix).
pub fn parse_hex_address(s: &str) -> Result<usize> {
    let digits = s
        .trim()
        .trim_start_matches("0x")
        .trim_start_matches("0X")
        .replace('_', "");
    usize::from_str_radix(&digits, 16).map_err(|e| anyhow::anyhow!("Invalid hex offset '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_prefix() {
        assert_eq!(parse_hex_address("0x12000").unwrap(), 0x12000);
        assert_eq!(parse_hex_address("0X7FFFF").unwrap(), 0x7FFFF);
    }

    #[test]
    fn test_parse_without_prefix() {
        assert_eq!(parse_hex_address("1c010").unwrap(), 0x1C010);
    }

    #[test]
    fn test_parse_with_separators() {
        assert_eq!(parse_hex_address("0x1_2000").unwrap(), 0x12000);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_hex_address("0xZZ").is_err());
        assert!(parse_hex_address("").is_err());
    }
}
