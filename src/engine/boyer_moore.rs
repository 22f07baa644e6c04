//! Single-signature Boyer-Moore matcher.
//!
//! Classic bad-character + good-suffix preprocessing. File-backed search
//! reads the source in chunks of `buffer_size`, each over-read by
//! `pattern_len - 1` bytes so a match starting near the end of a chunk is
//! still seen whole. A match can only start inside the nominal chunk, so no
//! occurrence is reported twice.

use std::io::{ErrorKind, SeekFrom};

use super::{ByteSource, Match, Matcher, Pattern, DEFAULT_BUFFER_SIZE};
use crate::error::{Result, SawmillError};

#[derive(Debug, Clone)]
pub struct BoyerMoore {
    pattern: Pattern,
    bad_char: [usize; 256],
    good_suffix: Vec<usize>,
    buffer_size: usize,
}

impl BoyerMoore {
    pub fn new(pattern: Pattern) -> Result<Self> {
        if pattern.is_empty() {
            return Err(SawmillError::EmptyPattern {
                file_type: pattern.file_type,
            });
        }

        let bad_char = bad_character_table(&pattern.bytes);
        let suffixes = suffix_lengths(&pattern.bytes);
        let good_suffix = good_suffix_table(&pattern.bytes, &suffixes);

        Ok(Self {
            pattern,
            bad_char,
            good_suffix,
            buffer_size: DEFAULT_BUFFER_SIZE,
        })
    }

    /// Chunk size for file-backed search. The chunk plus the
    /// `pattern_len - 1` over-read must stay addressable.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Result<Self> {
        let limit = isize::MAX as usize - (self.pattern.len() - 1);
        if buffer_size == 0 || buffer_size > limit {
            return Err(SawmillError::InvalidBufferSize {
                size: buffer_size,
                limit,
            });
        }
        self.buffer_size = buffer_size;
        Ok(self)
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// All match start indexes in an in-memory buffer
    pub fn find_all(&self, text: &[u8]) -> Vec<usize> {
        let pattern = &self.pattern.bytes;
        let m = pattern.len();
        let mut found = Vec::new();
        if text.len() < m {
            return found;
        }

        let mut at = 0usize;
        while at <= text.len() - m {
            let mut u = m;
            while u > 0 && pattern[u - 1] == text[at + u - 1] {
                u -= 1;
            }

            if u == 0 {
                found.push(at);
                at += self.good_suffix[0];
            } else {
                let u = u - 1;
                let bad = self.bad_char[text[at + u] as usize] as isize - m as isize + 1 + u as isize;
                at += (self.good_suffix[u] as isize).max(bad) as usize;
            }
        }
        found
    }

    /// Chunked search over a seekable source from its current position.
    /// Offsets are absolute in the source.
    pub fn find_in(&self, source: &mut dyn ByteSource) -> Result<Vec<u64>> {
        let base = source
            .stream_position()
            .map_err(|_| SawmillError::NotSeekable)?;
        let total = source
            .seek(SeekFrom::End(0))
            .map_err(|_| SawmillError::NotSeekable)?;

        let m = self.pattern.len();
        let span = self.buffer_size + (m - 1);
        let mut buf = vec![0u8; span];
        let mut found = Vec::new();
        let mut chunk_index = 0u64;

        loop {
            let start = base + chunk_index * self.buffer_size as u64;
            if start >= total {
                break;
            }
            source
                .seek(SeekFrom::Start(start))
                .map_err(|_| SawmillError::NotSeekable)?;

            let n = read_up_to(source, &mut buf)?;
            if n < m {
                break;
            }

            found.extend(self.find_all(&buf[..n]).into_iter().map(|idx| start + idx as u64));
            chunk_index += 1;
        }

        tracing::debug!(
            pattern = %hex::encode(&self.pattern.bytes),
            chunks = chunk_index,
            matches = found.len(),
            "Boyer-Moore scan finished"
        );

        Ok(found)
    }
}

impl Matcher for BoyerMoore {
    fn name(&self) -> &'static str {
        "boyer-moore"
    }

    fn patterns(&self) -> &[Pattern] {
        std::slice::from_ref(&self.pattern)
    }

    fn scan(&self, source: &mut dyn ByteSource) -> Result<Vec<Match>> {
        Ok(self
            .find_in(source)?
            .into_iter()
            .map(|offset| Match::of(&self.pattern, offset))
            .collect())
    }
}

/// Fill `buf` until it is full or the source is exhausted
fn read_up_to(source: &mut dyn ByteSource, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

/// Distance from the rightmost occurrence (last byte excluded) to the end
fn bad_character_table(pattern: &[u8]) -> [usize; 256] {
    let m = pattern.len();
    let mut table = [m; 256];
    for (i, &byte) in pattern[..m - 1].iter().enumerate() {
        table[byte as usize] = m - i - 1;
    }
    table
}

/// `suff[i]` = length of the longest substring ending at `i` that is also a
/// suffix of the pattern
fn suffix_lengths(pattern: &[u8]) -> Vec<isize> {
    let m = pattern.len() as isize;
    let mut suff = vec![0isize; pattern.len()];
    suff[(m - 1) as usize] = m;

    let mut f = 0isize;
    let mut g = m - 1;
    let mut i = m - 2;
    while i >= 0 {
        if i > g && suff[(i + m - 1 - f) as usize] < i - g {
            suff[i as usize] = suff[(i + m - 1 - f) as usize];
        } else {
            if i < g {
                g = i;
            }
            f = i;
            while g >= 0 && pattern[g as usize] == pattern[(g + m - 1 - f) as usize] {
                g -= 1;
            }
            suff[i as usize] = f - g;
        }
        i -= 1;
    }
    suff
}

fn good_suffix_table(pattern: &[u8], suff: &[isize]) -> Vec<usize> {
    let m = pattern.len() as isize;
    let mut gs = vec![m as usize; pattern.len()];

    let mut j = 0isize;
    let mut i = m - 1;
    while i >= -1 {
        if i == -1 || suff[i as usize] == i + 1 {
            while j < m - 1 - i {
                if gs[j as usize] == m as usize {
                    gs[j as usize] = (m - 1 - i) as usize;
                }
                j += 1;
            }
        }
        i -= 1;
    }

    for i in 0..(m - 1).max(0) {
        gs[(m - 1 - suff[i as usize]) as usize] = (m - 1 - i) as usize;
    }
    gs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read, Seek};

    fn bm(bytes: &[u8]) -> BoyerMoore {
        BoyerMoore::new(Pattern::header(bytes.to_vec(), "t")).unwrap()
    }

    fn naive(pattern: &[u8], text: &[u8]) -> Vec<usize> {
        if text.len() < pattern.len() {
            return Vec::new();
        }
        (0..=text.len() - pattern.len())
            .filter(|&i| &text[i..i + pattern.len()] == pattern)
            .collect()
    }

    #[test]
    fn test_tables_for_textbook_pattern() {
        let m = bm(b"GCAGAGAG");
        assert_eq!(suffix_lengths(b"GCAGAGAG"), vec![1, 0, 0, 2, 0, 4, 0, 8]);
        assert_eq!(m.good_suffix, vec![7, 7, 7, 2, 7, 4, 7, 1]);
        assert_eq!(m.bad_char[b'A' as usize], 1);
        assert_eq!(m.bad_char[b'C' as usize], 6);
        assert_eq!(m.bad_char[b'G' as usize], 2);
        assert_eq!(m.bad_char[b'T' as usize], 8);
    }

    #[test]
    fn test_embedded_once() {
        let pattern = b"%%EOF";
        let mut text = b"lorem ipsum %% EO dolor ".to_vec();
        let t1_len = text.len();
        text.extend_from_slice(pattern);
        text.extend_from_slice(b" sit amet EOF%");
        assert_eq!(bm(pattern).find_all(&text), vec![t1_len]);
    }

    #[test]
    fn test_overlapping_and_repeated() {
        let text = b"aaaaaa";
        assert_eq!(bm(b"aa").find_all(text), vec![0, 1, 2, 3, 4]);
        let text = b"abababab";
        assert_eq!(bm(b"abab").find_all(text), vec![0, 2, 4]);
    }

    #[test]
    fn test_agrees_with_naive() {
        let text: Vec<u8> = (0..2000u32).map(|i| (i * 7 % 5) as u8 + b'a').collect();
        for pattern in [&b"ab"[..], b"cab", b"eabc", b"a", b"dddd", b"bcdeabcdea"] {
            assert_eq!(bm(pattern).find_all(&text), naive(pattern, &text), "{pattern:?}");
        }
    }

    #[test]
    fn test_single_byte_pattern() {
        assert_eq!(bm(&[0x3B]).find_all(&[0, 0x3B, 1, 0x3B]), vec![1, 3]);
    }

    #[test]
    fn test_text_shorter_than_pattern() {
        assert!(bm(b"abcdef").find_all(b"abc").is_empty());
    }

    #[test]
    fn test_chunked_search_matches_in_memory() {
        let mut data = vec![0u8; 1024];
        data[100..103].copy_from_slice(&[0xFF, 0xD8, 0xFF]);
        data[510..513].copy_from_slice(&[0xFF, 0xD8, 0xFF]);
        data[1021..1024].copy_from_slice(&[0xFF, 0xD8, 0xFF]);

        let expected: Vec<u64> = vec![100, 510, 1021];
        for size in [1, 2, 3, 64, 511, 512, 4096] {
            let m = bm(&[0xFF, 0xD8, 0xFF]).with_buffer_size(size).unwrap();
            let found = m.find_in(&mut Cursor::new(data.clone())).unwrap();
            assert_eq!(found, expected, "buffer size {size}");
        }
    }

    #[test]
    fn test_scan_reports_absolute_offsets() {
        let mut data = vec![0u8; 300];
        data[250..252].copy_from_slice(&[0xFF, 0xD9]);
        let m = BoyerMoore::new(Pattern::footer(vec![0xFF, 0xD9], "jpg"))
            .unwrap()
            .with_buffer_size(100)
            .unwrap();
        let matches = m.scan(&mut Cursor::new(data)).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].offset, 250);
        assert_eq!(matches[0].file_type, "jpg");
    }

    #[test]
    fn test_empty_pattern_rejected() {
        let err = BoyerMoore::new(Pattern::header(Vec::new(), "t")).unwrap_err();
        assert!(matches!(err, SawmillError::EmptyPattern { .. }));
    }

    #[test]
    fn test_buffer_size_bounds() {
        assert!(matches!(
            bm(b"abc").with_buffer_size(0).unwrap_err(),
            SawmillError::InvalidBufferSize { .. }
        ));
        assert!(matches!(
            bm(b"abc").with_buffer_size(usize::MAX).unwrap_err(),
            SawmillError::InvalidBufferSize { .. }
        ));
        assert!(bm(b"abc").with_buffer_size(isize::MAX as usize - 2).is_ok());
    }

    struct Unseekable(Cursor<Vec<u8>>);

    impl Read for Unseekable {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.0.read(buf)
        }
    }

    impl Seek for Unseekable {
        fn seek(&mut self, _: SeekFrom) -> std::io::Result<u64> {
            Err(std::io::Error::new(ErrorKind::Unsupported, "pipe"))
        }
    }

    #[test]
    fn test_unseekable_source_rejected() {
        let mut source = Unseekable(Cursor::new(vec![1, 2, 3]));
        let err = bm(b"ab").find_in(&mut source).unwrap_err();
        assert!(matches!(err, SawmillError::NotSeekable));
    }
}
