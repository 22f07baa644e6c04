//! Streaming Commentz-Walter scan.
//!
//! The scan keeps a window end `i` (absolute stream position) and matches
//! the automaton right-to-left from `i`. After each attempt the window end
//! advances by [`Automaton::shift`]. Input arrives in fixed-size reads; only
//! the last `max_len + 1` bytes before the window end are retained between
//! reads, so signatures straddling a read boundary are matched exactly as if
//! the stream were one buffer.

use std::io::{ErrorKind, Read};

use super::automaton::Automaton;
use super::trie::ROOT;
use super::{sort_matches, ByteSource, Match, Matcher, Pattern, DEFAULT_BUFFER_SIZE};
use crate::error::{Result, SawmillError};

/// Multi-signature scanner over a compiled [`Automaton`]
#[derive(Debug, Clone)]
pub struct CommentzWalter {
    automaton: Automaton,
    buffer_size: usize,
}

impl CommentzWalter {
    pub fn new(automaton: Automaton) -> Self {
        Self {
            automaton,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    /// Size of each read from the source. Any size works; larger reads mean
    /// fewer window compactions.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Result<Self> {
        let limit = isize::MAX as usize - self.automaton.max_len();
        if buffer_size == 0 || buffer_size > limit {
            return Err(SawmillError::InvalidBufferSize {
                size: buffer_size,
                limit,
            });
        }
        self.buffer_size = buffer_size;
        Ok(self)
    }

    pub fn automaton(&self) -> &Automaton {
        &self.automaton
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Scan everything `reader` yields. Offsets count from the first byte
    /// read.
    pub fn scan_reader<R: Read + ?Sized>(&self, reader: &mut R) -> Result<Vec<Match>> {
        let automaton = &self.automaton;
        let mut matches = Vec::new();
        if automaton.is_empty() {
            return Ok(matches);
        }

        let trie = automaton.trie();
        let keep = automaton.max_len() as u64;
        let mut chunk = vec![0u8; self.buffer_size];
        let mut window = Window::default();
        let mut i = (automaton.min_len() - 1) as u64;
        let mut reads = 0usize;

        'scan: loop {
            while i >= window.end() {
                let n = read_some(reader, &mut chunk)?;
                if n == 0 {
                    break 'scan;
                }
                reads += 1;
                window.discard_before(i.saturating_sub(keep));
                window.append(&chunk[..n]);
            }

            let mut v = ROOT;
            let mut j = 0usize;
            let mismatch = loop {
                if j as u64 > i {
                    break None;
                }
                let byte = window.at(i - j as u64);
                match trie.node(v).child(byte) {
                    Some(next) => {
                        v = next;
                        j += 1;
                        if let Some(term) = &trie.node(v).terminal {
                            let start = i + 1 - j as u64;
                            matches.push(Match::of(trie.pattern(term.pattern), start));
                        }
                    }
                    None => break Some(byte),
                }
            };

            i += automaton.shift(v, j, mismatch) as u64;
        }

        tracing::debug!(
            reads,
            bytes = window.end(),
            matches = matches.len(),
            "Commentz-Walter scan finished"
        );

        sort_matches(&mut matches);
        Ok(matches)
    }
}

impl Matcher for CommentzWalter {
    fn name(&self) -> &'static str {
        "commentz-walter"
    }

    fn patterns(&self) -> &[Pattern] {
        self.automaton.patterns()
    }

    fn scan(&self, source: &mut dyn ByteSource) -> Result<Vec<Match>> {
        let base = source
            .stream_position()
            .map_err(|_| SawmillError::NotSeekable)?;
        let mut matches = self.scan_reader(source)?;
        for m in &mut matches {
            m.offset += base;
        }
        Ok(matches)
    }
}

/// Tail of the stream that is still reachable by a backward match
#[derive(Debug, Default)]
struct Window {
    bytes: Vec<u8>,
    /// Absolute offset of `bytes[0]`
    base: u64,
}

impl Window {
    fn end(&self) -> u64 {
        self.base + self.bytes.len() as u64
    }

    fn at(&self, pos: u64) -> u8 {
        self.bytes[(pos - self.base) as usize]
    }

    fn discard_before(&mut self, pos: u64) {
        if pos > self.base {
            let drop = ((pos - self.base) as usize).min(self.bytes.len());
            self.bytes.drain(..drop);
            self.base += drop as u64;
        }
    }

    fn append(&mut self, data: &[u8]) {
        self.bytes.extend_from_slice(data);
    }
}

fn read_some<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    loop {
        match reader.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn jpeg_scanner(buffer_size: usize) -> CommentzWalter {
        let automaton = Automaton::build([
            Pattern::header(vec![0xFF, 0xD8, 0xFF], "jpg"),
            Pattern::footer(vec![0xFF, 0xD9], "jpg"),
        ])
        .unwrap();
        CommentzWalter::new(automaton).with_buffer_size(buffer_size).unwrap()
    }

    fn jpeg_image() -> Vec<u8> {
        let mut data = vec![0u8; 1024];
        data[100..103].copy_from_slice(&[0xFF, 0xD8, 0xFF]);
        data[500..502].copy_from_slice(&[0xFF, 0xD9]);
        data
    }

    #[test]
    fn test_finds_header_and_footer() {
        let matches = jpeg_scanner(4096)
            .scan_reader(&mut Cursor::new(jpeg_image()))
            .unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].offset, 100);
        assert_eq!(matches[0].tag, crate::engine::Tag::Header);
        assert_eq!(matches[1].offset, 500);
        assert_eq!(matches[1].end(), 502);
    }

    #[test]
    fn test_match_at_stream_start_and_end() {
        let mut data = vec![0x55u8; 64];
        data[0..3].copy_from_slice(&[0xFF, 0xD8, 0xFF]);
        data[62..64].copy_from_slice(&[0xFF, 0xD9]);
        let matches = jpeg_scanner(8).scan_reader(&mut Cursor::new(data)).unwrap();
        let offsets: Vec<u64> = matches.iter().map(|m| m.offset).collect();
        assert_eq!(offsets, vec![0, 62]);
    }

    #[test]
    fn test_overlapping_occurrences() {
        // FF D8 FF D8 FF holds two overlapping headers
        let data = vec![0xFF, 0xD8, 0xFF, 0xD8, 0xFF];
        let matches = jpeg_scanner(2).scan_reader(&mut Cursor::new(data)).unwrap();
        let offsets: Vec<u64> = matches.iter().map(|m| m.offset).collect();
        assert_eq!(offsets, vec![0, 2]);
    }

    #[test]
    fn test_buffer_size_does_not_change_matches() {
        let data = jpeg_image();
        let whole = jpeg_scanner(1 << 16)
            .scan_reader(&mut Cursor::new(data.clone()))
            .unwrap();
        for size in [1, 2, 3, 7, 101, 499, 500, 501] {
            let chunked = jpeg_scanner(size)
                .scan_reader(&mut Cursor::new(data.clone()))
                .unwrap();
            assert_eq!(chunked, whole, "buffer size {size}");
        }
    }

    #[test]
    fn test_no_signature_bytes() {
        let matches = jpeg_scanner(128)
            .scan_reader(&mut Cursor::new(vec![0x42u8; 5000]))
            .unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_empty_stream_and_short_stream() {
        let scanner = jpeg_scanner(16);
        assert!(scanner.scan_reader(&mut Cursor::new(Vec::new())).unwrap().is_empty());
        assert!(scanner.scan_reader(&mut Cursor::new(vec![0xFF])).unwrap().is_empty());
    }

    #[test]
    fn test_zero_buffer_rejected() {
        let automaton = Automaton::build([Pattern::header(b"abc".to_vec(), "t")]).unwrap();
        let err = CommentzWalter::new(automaton).with_buffer_size(0).unwrap_err();
        assert!(matches!(err, SawmillError::InvalidBufferSize { .. }));
    }

    #[test]
    fn test_nested_signatures_all_reported() {
        // "EOF" ends inside "%%EOF"; both must be reported
        let automaton = Automaton::build([
            Pattern::footer(b"%%EOF".to_vec(), "pdf"),
            Pattern::footer(b"EOF".to_vec(), "pdf"),
        ])
        .unwrap();
        let cw = CommentzWalter::new(automaton);
        let matches = cw
            .scan_reader(&mut Cursor::new(b"xx%%EOFyyEOF".to_vec()))
            .unwrap();
        let found: Vec<(u64, usize)> = matches.iter().map(|m| (m.offset, m.bytes.len())).collect();
        assert_eq!(found, vec![(2, 5), (4, 3), (9, 3)]);
    }
}
