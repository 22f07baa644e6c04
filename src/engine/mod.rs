//! Matching engines - find header/footer signatures in a byte stream.
//!
//! Two interchangeable engines sit behind the [`Matcher`] trait:
//!
//! - **Commentz-Walter** ([`CommentzWalter`]): one automaton per file-type
//!   group, all of the group's signatures found in a single pass with
//!   Boyer-Moore style skips
//! - **Boyer-Moore** ([`BoyerMoore`]): one matcher per signature, file read in
//!   overlapping chunks
//!
//! Both scan from the source's current position and report [`Match`]es
//! whose `offset` is the absolute position of the first signature byte in
//! the source.

pub mod automaton;
pub mod boyer_moore;
pub mod scanner;
pub mod trie;

use std::fmt;
use std::io::{Read, Seek};

use serde::{Deserialize, Serialize, Serializer};

use crate::error::Result;

pub use automaton::Automaton;
pub use boyer_moore::BoyerMoore;
pub use scanner::CommentzWalter;

/// Default read size for both engines (1 MiB)
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// Whether a signature opens or closes an embedded file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tag {
    Header,
    Footer,
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Header => write!(f, "header"),
            Tag::Footer => write!(f, "footer"),
        }
    }
}

/// A signature to search for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pattern {
    pub bytes: Vec<u8>,
    pub tag: Tag,
    /// Owning file type (catalog name)
    pub file_type: String,
}

impl Pattern {
    pub fn new(bytes: impl Into<Vec<u8>>, tag: Tag, file_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            tag,
            file_type: file_type.into(),
        }
    }

    pub fn header(bytes: impl Into<Vec<u8>>, file_type: impl Into<String>) -> Self {
        Self::new(bytes, Tag::Header, file_type)
    }

    pub fn footer(bytes: impl Into<Vec<u8>>, file_type: impl Into<String>) -> Self {
        Self::new(bytes, Tag::Footer, file_type)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// One signature occurrence in the scanned stream
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Match {
    #[serde(serialize_with = "as_hex")]
    pub bytes: Vec<u8>,
    /// Absolute offset of the first matched byte
    pub offset: u64,
    pub tag: Tag,
    pub file_type: String,
}

impl Match {
    pub(crate) fn of(pattern: &Pattern, offset: u64) -> Self {
        Self {
            bytes: pattern.bytes.clone(),
            offset,
            tag: pattern.tag,
            file_type: pattern.file_type.clone(),
        }
    }

    /// Offset one past the last matched byte
    pub fn end(&self) -> u64 {
        self.offset + self.bytes.len() as u64
    }
}

fn as_hex<S: Serializer>(bytes: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(bytes))
}

/// Which engine a carving run uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineKind {
    #[default]
    CommentzWalter,
    BoyerMoore,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::CommentzWalter => write!(f, "commentz-walter"),
            EngineKind::BoyerMoore => write!(f, "boyer-moore"),
        }
    }
}

/// Readable, seekable input. Blanket-implemented for files and cursors.
pub trait ByteSource: Read + Seek + Send {}

impl<T: Read + Seek + Send> ByteSource for T {}

/// Matcher-to-orchestrator contract: scan a stream, return its matches
/// ordered by offset.
pub trait Matcher: Send + Sync {
    /// Short engine name for logs
    fn name(&self) -> &'static str;

    /// Patterns this matcher looks for
    fn patterns(&self) -> &[Pattern];

    fn scan(&self, source: &mut dyn ByteSource) -> Result<Vec<Match>>;
}

/// Build the matchers for one file-type group.
///
/// Commentz-Walter yields a single automaton covering every pattern;
/// Boyer-Moore yields one matcher per distinct pattern. Either way a byte
/// sequence listed twice keeps its first tag.
pub fn build_matchers(
    kind: EngineKind,
    patterns: &[Pattern],
    buffer_size: usize,
) -> Result<Vec<Box<dyn Matcher>>> {
    match kind {
        EngineKind::CommentzWalter => {
            let automaton = Automaton::build(patterns.iter().cloned())?;
            let cw = CommentzWalter::new(automaton).with_buffer_size(buffer_size)?;
            Ok(vec![Box::new(cw)])
        }
        EngineKind::BoyerMoore => patterns
            .iter()
            .enumerate()
            .filter(|&(i, p)| !patterns[..i].iter().any(|q| q.bytes == p.bytes))
            .map(|(_, p)| -> Result<Box<dyn Matcher>> {
                let bm = BoyerMoore::new(p.clone())?.with_buffer_size(buffer_size)?;
                Ok(Box::new(bm))
            })
            .collect(),
    }
}

/// Order matches by offset, headers before footers at the same offset.
pub(crate) fn sort_matches(matches: &mut [Match]) {
    matches.sort_by(|a, b| {
        (a.offset, a.tag, a.bytes.len()).cmp(&(b.offset, b.tag, b.bytes.len()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_match_end() {
        let p = Pattern::footer(vec![0xFF, 0xD9], "jpg");
        let m = Match::of(&p, 500);
        assert_eq!(m.end(), 502);
        assert_eq!(m.tag, Tag::Footer);
    }

    #[test]
    fn test_match_serializes_bytes_as_hex() {
        let m = Match::of(&Pattern::header(vec![0xFF, 0xD8, 0xFF], "jpg"), 7);
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains("\"ffd8ff\""));
        assert!(json.contains("\"Header\""));
    }

    #[test]
    fn test_engines_agree_through_trait() {
        let patterns = vec![
            Pattern::header(b"GIF89a".to_vec(), "gif"),
            Pattern::footer(vec![0x00, 0x3B], "gif"),
        ];
        let mut data = vec![0x11u8; 300];
        data[10..16].copy_from_slice(b"GIF89a");
        data[200] = 0x00;
        data[201] = 0x3B;

        let mut results = Vec::new();
        for kind in [EngineKind::CommentzWalter, EngineKind::BoyerMoore] {
            let mut found = Vec::new();
            for matcher in build_matchers(kind, &patterns, 64).unwrap() {
                found.extend(matcher.scan(&mut Cursor::new(data.clone())).unwrap());
            }
            sort_matches(&mut found);
            results.push(found);
        }

        assert_eq!(results[0], results[1]);
        assert_eq!(results[0].len(), 2);
        assert_eq!(results[0][0].offset, 10);
        assert_eq!(results[0][1].offset, 200);
    }

    #[test]
    fn test_engines_scan_from_current_position() {
        let patterns = vec![Pattern::header(vec![0xFF, 0xD8, 0xFF], "jpg")];
        let mut data = vec![0x20u8; 64];
        data[2..5].copy_from_slice(&[0xFF, 0xD8, 0xFF]);
        data[40..43].copy_from_slice(&[0xFF, 0xD8, 0xFF]);

        for kind in [EngineKind::CommentzWalter, EngineKind::BoyerMoore] {
            for buffer_size in [1, 8, 4096] {
                let matchers = build_matchers(kind, &patterns, buffer_size).unwrap();
                let mut source = Cursor::new(data.clone());
                source.seek(std::io::SeekFrom::Start(10)).unwrap();

                // Offsets stay absolute; the header before the cursor is not scanned
                let offsets: Vec<u64> =
                    matchers[0].scan(&mut source).unwrap().iter().map(|m| m.offset).collect();
                assert_eq!(offsets, vec![40], "{kind} / {buffer_size}");
            }
        }
    }

    #[test]
    fn test_boyer_moore_builds_one_matcher_per_pattern() {
        let patterns = vec![
            Pattern::header(b"%PDF".to_vec(), "pdf"),
            Pattern::footer(b"%%EOF".to_vec(), "pdf"),
        ];
        let matchers = build_matchers(EngineKind::BoyerMoore, &patterns, 1024).unwrap();
        assert_eq!(matchers.len(), 2);
        let matchers = build_matchers(EngineKind::CommentzWalter, &patterns, 1024).unwrap();
        assert_eq!(matchers.len(), 1);
        assert_eq!(matchers[0].patterns().len(), 2);
    }

    #[test]
    fn test_shared_footer_matched_once() {
        let patterns = vec![
            Pattern::header(b"<html".to_vec(), "html"),
            Pattern::footer(b"</html>".to_vec(), "html"),
            Pattern::header(b"<!DOCTYPE html".to_vec(), "html"),
            Pattern::footer(b"</html>".to_vec(), "html"),
        ];
        let data = b"<html><body></body></html>".to_vec();
        for kind in [EngineKind::CommentzWalter, EngineKind::BoyerMoore] {
            let mut found = Vec::new();
            for matcher in build_matchers(kind, &patterns, 8).unwrap() {
                found.extend(matcher.scan(&mut Cursor::new(data.clone())).unwrap());
            }
            let footers = found.iter().filter(|m| m.tag == Tag::Footer).count();
            assert_eq!(footers, 1, "{kind}");
        }
    }

    #[test]
    fn test_engine_kind_serde_names() {
        let s = serde_json::to_string(&EngineKind::BoyerMoore).unwrap();
        assert_eq!(s, "\"boyer-moore\"");
        assert_eq!(EngineKind::CommentzWalter.to_string(), "commentz-walter");
    }
}
