//! Masked pattern scanning over an image buffer

use tracing::debug;

use crate::error::Result;
use crate::signature::{CodeSignature, Signature, SignatureEntry};

/// A signature variant that matched, and where
#[derive(Debug, Clone)]
pub struct SignatureMatch<'a> {
    pub offset: usize,
    pub variant: usize,
    pub signature: &'a CodeSignature,
}

/// Lowest offset `>= start` at which every significant byte of `signature`
/// matches `data`.
///
/// Candidates are generated from the first significant byte with `memchr`
/// and verified in full, so the result is the same as a naive left-to-right
/// scan.
pub fn find(data: &[u8], signature: &Signature, start: usize) -> Option<usize> {
    let pattern = signature.bytes();
    if pattern.is_empty() || start > data.len() || data.len() - start < pattern.len() {
        return None;
    }
    let last = data.len() - pattern.len();

    let Some((anchor, anchor_byte)) = pattern
        .iter()
        .enumerate()
        .find_map(|(i, b)| b.map(|value| (i, value)))
    else {
        // Nothing significant: every position matches
        return Some(start);
    };

    memchr::memchr_iter(anchor_byte, &data[start + anchor..=last + anchor])
        .map(|hit| start + hit)
        .find(|&pos| matches_at(data, pattern, pos))
}

fn matches_at(data: &[u8], pattern: &[Option<u8>], pos: usize) -> bool {
    pattern.iter().enumerate().all(|(j, byte)| match byte {
        Some(value) => data[pos + j] == *value,
        None => true,
    })
}

/// Try each variant of `entry` in catalog order; the first one that matches
/// anywhere wins.
pub fn find_entry<'a>(
    data: &[u8],
    entry: &'a SignatureEntry,
) -> Result<Option<SignatureMatch<'a>>> {
    for (variant, signature) in entry.signatures.iter().enumerate() {
        let compiled = signature.compile()?;
        match find(data, &compiled, 0) {
            Some(offset) => {
                debug!(
                    "  {}: variant '{}' matched at 0x{:X}",
                    entry.name, signature.label, offset
                );
                return Ok(Some(SignatureMatch {
                    offset,
                    variant,
                    signature,
                }));
            }
            None => {
                debug!("  {}: variant '{}' not found", entry.name, signature.label);
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{builtin_signatures, names};

    /// Reference implementation: plain sliding window
    fn naive_find(data: &[u8], pattern: &[Option<u8>], start: usize) -> Option<usize> {
        if data.len() < pattern.len() {
            return None;
        }
        (start..=data.len() - pattern.len()).find(|&p| matches_at(data, pattern, p))
    }

    #[test]
    fn test_finds_lowest_offset() {
        let sig = Signature::parse("AA ?? CC").unwrap();
        let data = [0x00, 0xAA, 0x01, 0xCC, 0xAA, 0x02, 0xCC];
        assert_eq!(find(&data, &sig, 0), Some(1));
        assert_eq!(find(&data, &sig, 2), Some(4));
        assert_eq!(find(&data, &sig, 5), None);
    }

    #[test]
    fn test_match_ending_at_buffer_end() {
        let sig = Signature::parse("CC DD").unwrap();
        let data = [0x00, 0x00, 0xCC, 0xDD];
        assert_eq!(find(&data, &sig, 0), Some(2));
    }

    #[test]
    fn test_leading_wildcard_anchor() {
        let sig = Signature::parse("?? ?? BB").unwrap();
        let data = [0xBB, 0xBB, 0x00, 0x00, 0xBB];
        // BB at index 0/1 cannot be position 2 of a match
        assert_eq!(find(&data, &sig, 0), Some(2));
    }

    #[test]
    fn test_all_wildcards_match_at_start() {
        let sig = Signature::parse("?? ??").unwrap();
        assert_eq!(find(&[1, 2, 3], &sig, 1), Some(1));
        assert_eq!(find(&[1, 2, 3], &sig, 2), None);
    }

    #[test]
    fn test_pattern_longer_than_data() {
        let sig = Signature::parse("01 02 03").unwrap();
        assert_eq!(find(&[1, 2], &sig, 0), None);
        assert_eq!(find(&[1, 2, 3], &sig, 4), None);
    }

    #[test]
    fn test_agrees_with_naive_scan() {
        // Deterministic pseudo-random buffer with a small alphabet so that
        // partial matches are common
        let mut state = 0x1234_5678u32;
        let data: Vec<u8> = (0..4096)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state % 4) as u8
            })
            .collect();

        for text in ["01 ?? 02", "?? 03 03 ?? 00", "02 02 02 02", "00 ?? ?? ?? 01"] {
            let sig = Signature::parse(text).unwrap();
            for start in [0, 1, 17, 1000, 4090] {
                assert_eq!(
                    find(&data, &sig, start),
                    naive_find(&data, sig.bytes(), start),
                    "{} from {}",
                    text,
                    start
                );
            }
        }
    }

    #[test]
    fn test_find_entry_falls_back_to_second_variant() {
        let catalog = builtin_signatures();
        let entry = catalog.require(names::MAIN_CHECKSUM_STORED).unwrap();

        let pattern = entry.signatures[1].pattern_bytes().unwrap();
        let mut data = vec![0u8; 0x400];
        for (i, b) in pattern.iter().enumerate() {
            data[0x100 + i] = b.unwrap_or(0x55);
        }

        let found = find_entry(&data, entry).unwrap().unwrap();
        assert_eq!(found.offset, 0x100);
        assert_eq!(found.variant, 1);
        assert_eq!(found.signature.label, "variant_b");
    }

    #[test]
    fn test_find_entry_not_found() {
        let catalog = builtin_signatures();
        let entry = catalog.require(names::SEEDKEY_BYPASS).unwrap();
        assert!(find_entry(&[0u8; 0x200], entry).unwrap().is_none());
    }
}
