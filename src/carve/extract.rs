//! Verbatim range extraction.
//!
//! Every extraction opens its own read handle on the source, seeks to the
//! carve start and copies exactly `len` bytes, hashing them with blake3 on
//! the way. A source that ends early is a [`SawmillError::ShortRead`], never
//! a silently truncated file.

use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, SawmillError};

const COPY_CHUNK: usize = 64 * 1024;

/// `output_dir/<file_type>/<index:08>_<start:012x>.<extension>`
pub fn output_path(
    output_dir: &Path,
    file_type: &str,
    index: usize,
    start: u64,
    extension: &str,
) -> PathBuf {
    output_dir
        .join(file_type)
        .join(format!("{index:08}_{start:012x}.{extension}"))
}

/// Copy `len` bytes starting at `start` from `reader` into `writer`.
/// Returns the blake3 digest of the copied bytes.
pub fn copy_range<R, W>(reader: &mut R, start: u64, len: u64, writer: &mut W) -> Result<blake3::Hash>
where
    R: Read + Seek + ?Sized,
    W: Write + ?Sized,
{
    reader
        .seek(SeekFrom::Start(start))
        .map_err(|_| SawmillError::NotSeekable)?;

    let mut hasher = blake3::Hasher::new();
    let mut buf = vec![0u8; COPY_CHUNK.min(len as usize).max(1)];
    let mut copied = 0u64;

    while copied < len {
        let want = (len - copied).min(buf.len() as u64) as usize;
        let n = match reader.read(&mut buf[..want]) {
            Ok(0) => {
                return Err(SawmillError::ShortRead {
                    offset: start,
                    expected: len,
                    actual: copied,
                })
            }
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        hasher.update(&buf[..n]);
        writer.write_all(&buf[..n])?;
        copied += n as u64;
    }

    writer.flush()?;
    Ok(hasher.finalize())
}

/// Extract `[start, start + len)` of `source` into a new file at `dest`.
/// A partially written file is removed on failure.
pub fn extract_to_file(source: &Path, start: u64, len: u64, dest: &Path) -> Result<blake3::Hash> {
    let mut reader = File::open(source)?;
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(dest)?);

    match copy_range(&mut reader, start, len, &mut writer) {
        Ok(hash) => Ok(hash),
        Err(e) => {
            drop(writer);
            if let Err(rm) = fs::remove_file(dest) {
                tracing::debug!(path = %dest.display(), error = %rm, "Could not remove partial file");
            }
            Err(e)
        }
    }
}

/// Digest of `[start, start + len)` without writing anything (dry runs)
pub fn hash_range(source: &Path, start: u64, len: u64) -> Result<blake3::Hash> {
    let mut reader = File::open(source)?;
    copy_range(&mut reader, start, len, &mut std::io::sink())
}
