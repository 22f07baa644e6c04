//! Signature catalog - the list of file types to carve.
//!
//! A catalog is TOML with one `[[signature]]` table per record:
//!
//! ```toml
//! [[signature]]
//! name = "jpg"
//! header = '\xFF\xD8\xFF'
//! footer = '\xFF\xD9'
//! max_size = 52428800   # optional, bytes
//! extension = "jpg"     # optional, defaults to the name
//! ```
//!
//! Signatures are written as `\xNN` escapes. Records sharing a `name` form a
//! single file-type group and are scanned together.

pub mod builtin;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::Pattern;
use crate::error::{Result, SawmillError};

/// A catalog record as written on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRecord {
    pub name: String,
    pub header: String,
    pub footer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct CatalogFile {
    #[serde(default)]
    signature: Vec<SignatureRecord>,
}

/// A decoded header/footer pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub header: Vec<u8>,
    pub footer: Vec<u8>,
    pub max_size: Option<u64>,
    pub extension: String,
}

/// Every signature of one file type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTypeGroup {
    pub name: String,
    pub extension: String,
    /// Largest carve allowed for this type (the loosest of its records)
    pub max_size: Option<u64>,
    pub signatures: Vec<Signature>,
}

impl FileTypeGroup {
    /// Header and footer patterns of every signature, headers first per record
    pub fn patterns(&self) -> Vec<Pattern> {
        self.signatures
            .iter()
            .flat_map(|s| {
                [
                    Pattern::header(s.header.clone(), self.name.clone()),
                    Pattern::footer(s.footer.clone(), self.name.clone()),
                ]
            })
            .collect()
    }
}

/// A validated, decoded catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    signatures: Vec<Signature>,
}

impl Catalog {
    /// Parse catalog TOML. Every record is decoded up front, so a malformed
    /// entry fails here rather than mid-run.
    pub fn from_toml(content: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(content)?;
        let signatures = file
            .signature
            .into_iter()
            .map(Signature::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { signatures })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let catalog = Self::from_toml(&content)?;
        tracing::info!(
            path = %path.display(),
            signatures = catalog.len(),
            "Loaded signature catalog"
        );
        Ok(catalog)
    }

    /// The catalog compiled into the binary
    pub fn builtin() -> Result<Self> {
        Self::from_toml(builtin::BUILTIN_CATALOG)
    }

    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// Distinct file-type names, sorted
    pub fn names(&self) -> Vec<String> {
        self.groups().into_keys().collect()
    }

    /// Keep only the named file types. Unknown names are an error.
    pub fn retain_types(&mut self, names: &[String]) -> Result<()> {
        for name in names {
            if !self.signatures.iter().any(|s| &s.name == name) {
                return Err(SawmillError::NoSuchFileType(name.clone()));
            }
        }
        self.signatures.retain(|s| names.contains(&s.name));
        Ok(())
    }

    /// Records grouped by file-type name
    pub fn groups(&self) -> BTreeMap<String, FileTypeGroup> {
        let mut groups: BTreeMap<String, FileTypeGroup> = BTreeMap::new();
        for sig in &self.signatures {
            let group = groups
                .entry(sig.name.clone())
                .or_insert_with(|| FileTypeGroup {
                    name: sig.name.clone(),
                    extension: sig.extension.clone(),
                    max_size: sig.max_size,
                    signatures: Vec::new(),
                });
            group.max_size = match (group.max_size, sig.max_size) {
                (Some(a), Some(b)) => Some(a.max(b)),
                _ => None,
            };
            group.signatures.push(sig.clone());
        }
        groups
    }

    /// Back to the on-disk form
    pub fn to_toml(&self) -> String {
        let file = CatalogFile {
            signature: self
                .signatures
                .iter()
                .map(|s| SignatureRecord {
                    name: s.name.clone(),
                    header: encode_hex_escaped(&s.header),
                    footer: encode_hex_escaped(&s.footer),
                    max_size: s.max_size,
                    extension: (s.extension != s.name).then(|| s.extension.clone()),
                })
                .collect(),
        };
        toml::to_string_pretty(&file).unwrap_or_default()
    }
}

impl TryFrom<SignatureRecord> for Signature {
    type Error = SawmillError;

    fn try_from(record: SignatureRecord) -> Result<Self> {
        let header = decode_field(&record.name, "header", &record.header)?;
        let footer = decode_field(&record.name, "footer", &record.footer)?;
        let extension = record.extension.unwrap_or_else(|| record.name.clone());
        Ok(Self {
            name: record.name,
            header,
            footer,
            max_size: record.max_size,
            extension,
        })
    }
}

fn decode_field(name: &str, field: &'static str, value: &str) -> Result<Vec<u8>> {
    let bytes = decode_hex_escaped(value).map_err(|detail| SawmillError::MalformedSignature {
        name: name.to_string(),
        field,
        detail,
    })?;
    if bytes.is_empty() {
        return Err(SawmillError::EmptyPattern {
            file_type: name.to_string(),
        });
    }
    Ok(bytes)
}

/// Decode a `\xNN\xNN...` string. Any other text is rejected with a
/// description of the offending token.
pub fn decode_hex_escaped(s: &str) -> std::result::Result<Vec<u8>, String> {
    let mut digits = Vec::with_capacity(s.len() / 2);
    for (i, token) in s.as_bytes().chunks(4).enumerate() {
        match token {
            [b'\\', b'x' | b'X', hi, lo] => digits.extend_from_slice(&[*hi, *lo]),
            _ => {
                return Err(format!(
                    "expected '\\xNN' at byte {}, found '{}'",
                    i * 4,
                    String::from_utf8_lossy(token)
                ))
            }
        }
    }
    hex::decode(&digits).map_err(|e| format!("invalid hex digits: {e}"))
}

/// Inverse of [`decode_hex_escaped`], uppercase digits
pub fn encode_hex_escaped(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("\\x{b:02X}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_decode_hex_escaped() {
        assert_eq!(decode_hex_escaped(r"\xFF\xD8\xff").unwrap(), vec![0xFF, 0xD8, 0xFF]);
        assert_eq!(decode_hex_escaped(r"\X25\x50").unwrap(), vec![0x25, 0x50]);
        assert_eq!(decode_hex_escaped("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(decode_hex_escaped(r"\xZZ").is_err());
        assert!(decode_hex_escaped(r"\xF").is_err());
        assert!(decode_hex_escaped(r"FF\xD8").is_err());
        assert!(decode_hex_escaped(r"\xFF \xD8").is_err());
        assert!(decode_hex_escaped(r"\xé1").is_err());
    }

    #[test]
    fn test_encode_round_trips() {
        let bytes = vec![0x00, 0x3B, 0xFF];
        assert_eq!(encode_hex_escaped(&bytes), r"\x00\x3B\xFF");
        assert_eq!(decode_hex_escaped(&encode_hex_escaped(&bytes)).unwrap(), bytes);
    }

    #[test]
    fn test_parse_catalog_and_group() {
        let catalog = Catalog::from_toml(
            r#"
            [[signature]]
            name = "gif"
            header = '\x47\x49\x46\x38\x37\x61'
            footer = '\x00\x3B'
            max_size = 100

            [[signature]]
            name = "gif"
            header = '\x47\x49\x46\x38\x39\x61'
            footer = '\x00\x3B'
            max_size = 200

            [[signature]]
            name = "pdf"
            header = '\x25\x50\x44\x46'
            footer = '\x25\x25\x45\x4F\x46'
            "#,
        )
        .unwrap();

        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.names(), vec!["gif".to_string(), "pdf".to_string()]);

        let groups = catalog.groups();
        let gif = &groups["gif"];
        assert_eq!(gif.signatures.len(), 2);
        assert_eq!(gif.max_size, Some(200));
        assert_eq!(gif.extension, "gif");
        assert_eq!(gif.patterns().len(), 4);
        assert_eq!(groups["pdf"].max_size, None);
    }

    #[test]
    fn test_malformed_entry_fails_at_load() {
        let err = Catalog::from_toml(
            r#"
            [[signature]]
            name = "bad"
            header = 'FFD8'
            footer = '\xFF\xD9'
            "#,
        )
        .unwrap_err();
        match err {
            SawmillError::MalformedSignature { name, field, .. } => {
                assert_eq!(name, "bad");
                assert_eq!(field, "header");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_signature_fails_at_load() {
        let err = Catalog::from_toml(
            r#"
            [[signature]]
            name = "void"
            header = '\x00'
            footer = ''
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, SawmillError::EmptyPattern { .. }));
    }

    #[test]
    fn test_retain_types() {
        let mut catalog = Catalog::builtin().unwrap();
        catalog.retain_types(&["jpg".to_string()]).unwrap();
        assert_eq!(catalog.names(), vec!["jpg".to_string()]);

        let err = catalog.retain_types(&["nope".to_string()]).unwrap_err();
        assert!(matches!(err, SawmillError::NoSuchFileType(_)));
    }

    #[test]
    fn test_load_from_disk_and_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.toml");
        let builtin = Catalog::builtin().unwrap();
        std::fs::write(&path, builtin.to_toml()).unwrap();

        let loaded = Catalog::load(&path).unwrap();
        assert_eq!(loaded, builtin);
    }
}
