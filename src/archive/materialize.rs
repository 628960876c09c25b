//! Entry byte materialization.
//!
//! Turns an [`ArchiveEntry`] into an owned byte buffer: reads the raw data
//! range, inflates it if the entry is deflated, and verifies the result
//! against the CRC recorded in the central directory.

use bytes::Bytes;
use flate2::Crc;
use flate2::read::DeflateDecoder;
use std::io::Read;

use super::container::{ArchiveEntry, Compression, ZipContainer};
use crate::io::ReadAt;
use anyhow::{Context, Result, bail};

impl<R: ReadAt> ZipContainer<R> {
    /// Materialize an entry's decompressed bytes.
    ///
    /// # Errors
    ///
    /// Fails for directory markers, unsupported compression methods,
    /// truncated data, or a CRC mismatch.
    pub async fn read_entry(&self, entry: &ArchiveEntry) -> Result<Bytes> {
        if entry.is_directory {
            bail!("{} is a directory marker, not a file entry", entry.name);
        }

        let offset = self.data_offset(entry).await?;
        // Recorded sizes are only trusted once they fit inside the source.
        match offset.checked_add(entry.compressed_size) {
            Some(end) if end <= self.reader().size() => {}
            _ => bail!("{}: data range lies outside the archive", entry.name),
        }
        let mut raw = vec![0u8; entry.compressed_size as usize];
        self.reader()
            .read_exact_at(offset, &mut raw)
            .await
            .with_context(|| format!("failed to read data for {}", entry.name))?;

        let data = match entry.compression {
            Compression::Stored => raw,
            Compression::Deflate => inflate(&raw, entry.uncompressed_size)
                .with_context(|| format!("failed to inflate {}", entry.name))?,
            Compression::Unsupported(method) => {
                bail!("unsupported compression method {} for {}", method, entry.name)
            }
        };

        if data.len() as u64 != entry.uncompressed_size {
            bail!(
                "{}: expected {} bytes, got {}",
                entry.name,
                entry.uncompressed_size,
                data.len()
            );
        }

        let mut crc = Crc::new();
        crc.update(&data);
        if crc.sum() != entry.crc32 {
            bail!("CRC mismatch for {}", entry.name);
        }

        Ok(Bytes::from(data))
    }
}

/// Reserve at most this much ahead of inflation; the buffer still grows to
/// the real size as data arrives.
const INFLATE_RESERVE_LIMIT: u64 = 1 << 20;

/// Inflate a raw deflate stream (zip entries carry no zlib wrapper).
///
/// Output is capped one byte past the declared size, so a stream that
/// inflates beyond its headers is cut off and surfaces as a length
/// mismatch instead of expanding without bound.
fn inflate(raw: &[u8], expected_size: u64) -> Result<Vec<u8>> {
    let mut data = Vec::with_capacity(expected_size.min(INFLATE_RESERVE_LIMIT) as usize);
    DeflateDecoder::new(raw)
        .take(expected_size.saturating_add(1))
        .read_to_end(&mut data)?;
    Ok(data)
}
