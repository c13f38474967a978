//! Signature catalog: byte patterns for recognizable code fragments and the
//! operand layouts that are decoded out of them.

mod builtin;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use builtin::builtin_signatures;

/// Catalog entry names used by the analyzer
pub mod names {
    pub const MAIN_REGION_COUNT: &str = "main_region_count";
    pub const MAIN_REGIONS: &str = "main_regions";
    pub const MAIN_CHECKSUM_STORED: &str = "main_checksum_stored";
    pub const MULTIPOINT_COUNT: &str = "multipoint_count";
    pub const MULTIPOINT_TABLE: &str = "multipoint_table";
    pub const MLHFM_LOOKUP: &str = "mlhfm_lookup";
    pub const SEEDKEY_BYPASS: &str = "seedkey_bypass";
}

/// Address layout roles
pub mod roles {
    pub const START: &str = "start";
    pub const END: &str = "end";
    pub const CHECKSUM: &str = "checksum";
    pub const TABLE: &str = "table";
}

/// Scalar field names
pub mod fields {
    pub const COUNT: &str = "count";
    pub const ENTRIES: &str = "entries";
    pub const TABLE_OFFSET: &str = "table_offset";
    pub const PATCH: &str = "patch";
}

/// Width of the value read at a resolved address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldWidth {
    #[serde(rename = "u16")]
    U16,
    #[serde(rename = "u32")]
    U32,
}

/// One side (low or high word) of a segmented address.
///
/// `offset` locates the 16-bit in-page address inside the matched bytes;
/// `width` is how much is read at the address it points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressField {
    pub offset: usize,
    pub width: FieldWidth,
}

impl AddressField {
    pub const fn new(offset: usize, width: FieldWidth) -> Self {
        Self { offset, width }
    }
}

/// Where the segment selector and the low/high address words sit relative
/// to a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressLayout {
    pub segment: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<AddressField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<AddressField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeSignature {
    pub label: String,
    pub pattern: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub addresses: BTreeMap<String, AddressLayout>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, usize>,
}

impl CodeSignature {
    pub fn pattern_bytes(&self) -> Result<Vec<Option<u8>>> {
        parse_pattern(&self.pattern)
    }

    pub fn compile(&self) -> Result<Signature> {
        Ok(Signature {
            bytes: self.pattern_bytes()?,
        })
    }

    pub fn address(&self, role: &str) -> Result<&AddressLayout> {
        self.addresses.get(role).ok_or_else(|| {
            Error::InvalidSignature(format!(
                "Signature '{}' has no '{}' address layout",
                self.label, role
            ))
        })
    }

    pub fn field(&self, name: &str) -> Result<usize> {
        self.fields.get(name).copied().ok_or_else(|| {
            Error::InvalidSignature(format!(
                "Signature '{}' has no '{}' field",
                self.label, name
            ))
        })
    }

    /// Offset of a field that is read `width` bytes wide. The whole read
    /// must stay inside the matched pattern.
    pub fn field_span(&self, name: &str, width: usize) -> Result<usize> {
        let offset = self.field(name)?;
        self.check_span(name, offset, width, self.pattern_bytes()?.len())?;
        Ok(offset)
    }

    fn check_span(&self, what: &str, offset: usize, width: usize, len: usize) -> Result<()> {
        if offset.checked_add(width).is_none_or(|end| end > len) {
            return Err(Error::InvalidSignature(format!(
                "Signature '{}': {} at +{} exceeds pattern length {}",
                self.label, what, offset, len
            )));
        }
        Ok(())
    }

    /// Check that every operand offset lies inside the pattern
    pub fn validate(&self) -> Result<()> {
        let len = self.pattern_bytes()?.len();
        let check =
            |what: &str, offset: usize, width: usize| self.check_span(what, offset, width, len);

        for (role, layout) in &self.addresses {
            check(&format!("{} segment", role), layout.segment, 2)?;
            if layout.low.is_none() && layout.high.is_none() {
                return Err(Error::InvalidSignature(format!(
                    "Signature '{}': '{}' layout has neither a low nor a high word",
                    self.label, role
                )));
            }
            if let Some(low) = layout.low {
                check(&format!("{} low word", role), low.offset, 2)?;
            }
            if let Some(high) = layout.high {
                check(&format!("{} high word", role), high.offset, 2)?;
            }
        }
        for (name, offset) in &self.fields {
            check(name, *offset, 1)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Variants, most preferred first
    pub signatures: Vec<CodeSignature>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureCatalog {
    pub version: String,
    pub entries: Vec<SignatureEntry>,
}

impl SignatureCatalog {
    pub fn entry(&self, name: &str) -> Option<&SignatureEntry> {
        self.entries
            .iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(name))
    }

    pub fn require(&self, name: &str) -> Result<&SignatureEntry> {
        self.entry(name).ok_or_else(|| {
            Error::InvalidSignature(format!("Signature entry '{}' not found", name))
        })
    }

    pub fn validate(&self) -> Result<()> {
        for entry in &self.entries {
            if entry.signatures.is_empty() {
                return Err(Error::InvalidSignature(format!(
                    "Signature entry '{}' has no variants",
                    entry.name
                )));
            }
            for signature in &entry.signatures {
                signature.validate()?;
            }
        }
        Ok(())
    }
}

/// A compiled pattern. `None` marks a byte that is not significant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    bytes: Vec<Option<u8>>,
}

impl Signature {
    pub fn parse(pattern: &str) -> Result<Self> {
        Ok(Self {
            bytes: parse_pattern(pattern)?,
        })
    }

    pub fn bytes(&self) -> &[Option<u8>] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

pub fn load_signatures<P: AsRef<Path>>(path: P) -> Result<SignatureCatalog> {
    let content = fs::read_to_string(&path)?;
    let catalog: SignatureCatalog = serde_json::from_str(&content)?;
    catalog.validate()?;
    Ok(catalog)
}

pub fn save_signatures<P: AsRef<Path>>(path: P, catalog: &SignatureCatalog) -> Result<()> {
    let content = serde_json::to_string_pretty(catalog)?;
    fs::write(path, content)?;
    Ok(())
}

pub fn parse_pattern(pattern: &str) -> Result<Vec<Option<u8>>> {
    let mut bytes = Vec::new();
    for token in pattern.split_whitespace() {
        if token == "??" || token == "?" {
            bytes.push(None);
            continue;
        }

        let value = u8::from_str_radix(token, 16).map_err(|e| {
            Error::InvalidSignature(format!("Invalid signature token '{}': {}", token, e))
        })?;
        bytes.push(Some(value));
    }

    if bytes.is_empty() {
        return Err(Error::InvalidSignature(
            "Signature pattern is empty".to_string(),
        ));
    }

    Ok(bytes)
}

pub fn format_pattern(bytes: &[Option<u8>]) -> String {
    bytes
        .iter()
        .map(|b| match b {
            Some(value) => format!("{:02X}", value),
            None => "??".to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
