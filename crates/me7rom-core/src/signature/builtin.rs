//! Built-in signatures for Bosch ME7.3H4 (Ferrari 360) firmware.
//!
//! Patterns are C166 machine code. Operand bytes that hold addresses,
//! page numbers or counts change between builds and are wildcarded; the
//! surrounding opcodes stay put.

use std::collections::BTreeMap;

use super::{
    AddressField, AddressLayout, CodeSignature, FieldWidth, SignatureCatalog, SignatureEntry,
    fields, names, roles,
};

const CATALOG_VERSION: &str = "me7.3h4";

// mov r12,r4 / cmp r12,#entries / jmpr cc_NC / shl r4,#1 / mov r5,[r4+#table]
const MLHFM_LOOKUP: &str = "F0 C4 46 FC ?? ?? 9D ?? 5C 14 F0 54 D4 54 ?? ?? CB 00";

// The region loop compares its counter against #2/#4/#6 (byte +27)
const MAIN_REGION_COUNT: &str = concat!(
    "E6 F4 ?? ?? E6 F5 ?? ?? DA ?? ?? ?? F0 48 08 42 ",
    "88 40 F0 A4 E0 08 98 40 08 A2 48 ?? 3D ??",
);

const MAIN_REGIONS: &str = concat!(
    "F0 A8 5C 3A E0 06 F0 C6 E0 07 F0 D7 D7 40 ?? ?? ",
    "D4 48 ?? ?? D4 58 ?? ?? F0 64 F0 75 06 F4 ?? ?? ",
    "18 50 5C 14 F0 48 D7 40 ?? ?? D4 68 ?? ?? D4 78 ",
    "?? ?? 20 64 30 75",
);

const MAIN_CHECKSUM_STORED_A: &str = concat!(
    "F2 F4 ?? ?? F2 F5 ?? ?? D7 40 ?? ?? D4 64 ?? ?? ",
    "D4 74 ?? ?? 20 46 3D ??",
);

const MAIN_CHECKSUM_STORED_B: &str = concat!(
    "88 60 88 70 F0 64 F0 75 DA ?? ?? ?? 08 04 18 50 ",
    "20 46 30 57 E6 F6 00 00 E6 F7 00 00 F0 C6 F0 D7 ",
    "F0 48 D7 40 ?? ?? D4 A4 ?? ?? D4 B4 ?? ?? 20 A6 ",
    "3D ??",
);

const MULTIPOINT_COUNT: &str = concat!(
    "88 90 88 80 E6 F8 00 00 E6 F9 00 00 F0 48 5C 44 ",
    "F0 59 DA ?? ?? ?? 08 81 18 90 F0 68 F0 79 26 F6 ",
    "?? ?? 36 F7 ?? ?? 08 82 46 F8 ?? ?? 3D ?? 98 80 ",
    "98 90 DB 00",
);

const MULTIPOINT_TABLE: &str = concat!(
    "88 60 88 70 88 80 E0 08 F0 48 5C 44 F0 54 E6 F6 ",
    "?? ?? E6 F7 ?? ?? DA ?? ?? ?? F0 C4 F0 D5 E0 06 ",
    "E0 07 26 F4 ?? ?? 36 F5 ?? ?? 2D ?? 08 81 46 F8 ",
    "?? ?? 3D ?? E6 F4 ?? ?? E6 F5 ?? ?? 02 F4 ?? ?? ",
    "98 80 98 70 98 60 DB 00",
);

// Patch site is the immediate of `movb rl2,#0` on the failure path
const SEEDKEY_BYPASS_1: &str = concat!(
    "88 60 88 70 88 80 88 90 F0 6C F0 7D E6 F8 ?? ?? ",
    "E6 F9 ?? ?? DA ?? ?? ?? 4D 0E F2 F4 ?? ?? F2 F5 ",
    "?? ?? 7C 14 6C 15 F0 64 F0 75 E6 F6 ?? ?? E6 F7 ",
    "?? ?? DA ?? ?? ?? F0 84 F0 95 A8 48 40 45 3D 0E ",
    "08 91 48 90 3D ?? E1 04 0D ?? F2 F4 ?? ?? F2 F5 ",
    "?? ?? 20 48 30 59 3D ?? 40 45 3D ?? E1 ?? 0D ?? ",
    "E1 04 98 90",
);

const SEEDKEY_BYPASS_2: &str = concat!(
    "00 88 60 88 70 88 80 88 90 88 A0 F0 6C F0 7D E0 ",
    "0A E6 F8 ?? ?? E6 F9 ?? ?? DA ?? ?? ?? 4D 14 F2 ",
    "F4 ?? ?? F2 F5 ?? ?? 7C 14 6C 15 F0 64 F0 75 E6 ",
    "F6 ?? ?? E6 F7 ?? ?? DA ?? ?? ?? F0 84 F0 95 A8 ",
    "48 40 45 3D 10 08 91 48 90 3D ?? 08 A1 E1 04 0D ",
    "?? F2 F4 ?? ?? F2 F5 ?? ?? 20 48 30 59 3D ?? 40 ",
    "45 3D ?? E1 ?? 0D ?? E1 04 98 A0 98 90",
);

fn word(offset: usize) -> AddressField {
    AddressField::new(offset, FieldWidth::U16)
}

fn dword(offset: usize) -> AddressField {
    AddressField::new(offset, FieldWidth::U32)
}

fn split(segment: usize, low: usize, high: usize) -> AddressLayout {
    AddressLayout {
        segment,
        low: Some(word(low)),
        high: Some(word(high)),
    }
}

fn signature(
    label: &str,
    pattern: &str,
    addresses: &[(&str, AddressLayout)],
    field_offsets: &[(&str, usize)],
) -> CodeSignature {
    CodeSignature {
        label: label.to_string(),
        pattern: pattern.to_string(),
        addresses: addresses
            .iter()
            .map(|(role, layout)| (role.to_string(), *layout))
            .collect::<BTreeMap<_, _>>(),
        fields: field_offsets
            .iter()
            .map(|(name, offset)| (name.to_string(), *offset))
            .collect::<BTreeMap<_, _>>(),
    }
}

fn entry(name: &str, description: &str, signatures: Vec<CodeSignature>) -> SignatureEntry {
    SignatureEntry {
        name: name.to_string(),
        description: description.to_string(),
        signatures,
    }
}

pub fn builtin_signatures() -> SignatureCatalog {
    let entries = vec![
        entry(
            names::MAIN_REGION_COUNT,
            "Main ROM checksum routine: number of regions",
            vec![signature(
                "main_region_count",
                MAIN_REGION_COUNT,
                &[],
                &[(fields::COUNT, 27)],
            )],
        ),
        entry(
            names::MAIN_REGIONS,
            "Main ROM checksum routine: region start/end table",
            vec![signature(
                "main_regions",
                MAIN_REGIONS,
                &[(roles::START, split(14, 18, 22)), (roles::END, split(14, 44, 48))],
                &[],
            )],
        ),
        entry(
            names::MAIN_CHECKSUM_STORED,
            "Main ROM checksum routine: stored checksum and complement",
            vec![
                signature(
                    "variant_a",
                    MAIN_CHECKSUM_STORED_A,
                    &[(roles::CHECKSUM, split(10, 14, 18))],
                    &[],
                ),
                signature(
                    "variant_b",
                    MAIN_CHECKSUM_STORED_B,
                    &[(roles::CHECKSUM, split(36, 40, 44))],
                    &[],
                ),
            ],
        ),
        entry(
            names::MULTIPOINT_COUNT,
            "Multipoint checksum routine: number of stored blocks",
            vec![signature(
                "multipoint_count",
                MULTIPOINT_COUNT,
                &[],
                &[(fields::COUNT, 42)],
            )],
        ),
        entry(
            names::MULTIPOINT_TABLE,
            "Multipoint checksum routine: stored block list",
            vec![signature(
                "multipoint_table",
                MULTIPOINT_TABLE,
                &[(
                    roles::TABLE,
                    AddressLayout {
                        segment: 58,
                        low: Some(dword(54)),
                        high: None,
                    },
                )],
                &[],
            )],
        ),
        entry(
            names::MLHFM_LOOKUP,
            "GGHFM_DHFM_Lookup: MLHFM linearization table access",
            vec![signature(
                "gghfm_lookup",
                MLHFM_LOOKUP,
                &[],
                &[(fields::ENTRIES, 4), (fields::TABLE_OFFSET, 14)],
            )],
        ),
        entry(
            names::SEEDKEY_BYPASS,
            "Security access seed/key check",
            vec![
                signature(
                    "variant_1",
                    SEEDKEY_BYPASS_1,
                    &[],
                    &[(fields::PATCH, 0x5d)],
                ),
                signature(
                    "variant_2",
                    SEEDKEY_BYPASS_2,
                    &[],
                    &[(fields::PATCH, 0x64)],
                ),
            ],
        ),
    ];

    SignatureCatalog {
        version: CATALOG_VERSION.to_string(),
        entries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_is_valid() {
        builtin_signatures().validate().unwrap();
    }

    #[test]
    fn test_operands_are_wildcarded() {
        let catalog = builtin_signatures();
        for entry in &catalog.entries {
            for sig in &entry.signatures {
                let bytes = sig.pattern_bytes().unwrap();
                for layout in sig.addresses.values() {
                    let mut offsets = vec![layout.segment];
                    offsets.extend(layout.low.map(|f| f.offset));
                    offsets.extend(layout.high.map(|f| f.offset));
                    for offset in offsets {
                        assert_eq!(bytes[offset], None, "{} +{}", sig.label, offset);
                        assert_eq!(bytes[offset + 1], None, "{} +{}", sig.label, offset + 1);
                    }
                }
                for (name, offset) in &sig.fields {
                    assert_eq!(bytes[*offset], None, "{} field {}", sig.label, name);
                }
            }
        }
    }

    #[test]
    fn test_seedkey_sites_follow_movb() {
        let catalog = builtin_signatures();
        let entry = catalog.require(names::SEEDKEY_BYPASS).unwrap();
        for sig in &entry.signatures {
            let bytes = sig.pattern_bytes().unwrap();
            let patch = sig.field(fields::PATCH).unwrap();
            assert_eq!(bytes[patch - 1], Some(0xE1), "{}", sig.label);
        }
    }

    #[test]
    fn test_fallback_order() {
        let catalog = builtin_signatures();
        let stored = catalog.require(names::MAIN_CHECKSUM_STORED).unwrap();
        let labels: Vec<_> = stored.signatures.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, ["variant_a", "variant_b"]);
    }
}
