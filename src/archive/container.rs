//! Central directory parsing.
//!
//! Zip archives are read from the end: the trailer (end-of-central-directory
//! record) gives the location of the central directory, and the central
//! directory carries one header per entry with its name, sizes, CRC and the
//! offset of the entry's local header. Entry data is only touched when an
//! entry is materialized.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};
use std::sync::Arc;

use crate::io::ReadAt;
use anyhow::{Result, bail};

const TRAILER_SIGNATURE: &[u8] = b"PK\x05\x06";
const TRAILER_SIZE: usize = 22;
/// The trailer may be followed by an archive comment of up to 65535 bytes,
/// which bounds the backwards search for the signature.
const MAX_COMMENT_SIZE: u64 = 65535;

const ZIP64_LOCATOR_SIGNATURE: &[u8] = b"PK\x06\x07";
const ZIP64_LOCATOR_SIZE: usize = 20;
const ZIP64_TRAILER_SIGNATURE: &[u8] = b"PK\x06\x06";
const ZIP64_TRAILER_SIZE: usize = 56;

const CENTRAL_HEADER_SIGNATURE: &[u8] = b"PK\x01\x02";
/// Fixed portion of a central directory header; name, extra field and
/// comment follow it.
const CENTRAL_HEADER_MIN_SIZE: u64 = 46;
const LOCAL_HEADER_SIGNATURE: &[u8] = b"PK\x03\x04";
const LOCAL_HEADER_SIZE: usize = 30;

/// How an entry's bytes are stored in the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Stored,
    Deflate,
    Unsupported(u16),
}

impl Compression {
    fn from_method(method: u16) -> Self {
        match method {
            0 => Compression::Stored,
            8 => Compression::Deflate,
            other => Compression::Unsupported(other),
        }
    }
}

/// One named member of a zip container.
///
/// Carries everything needed to decide whether the entry is interesting
/// (name, directory flag) and to materialize its bytes later (compression,
/// sizes, CRC, local header offset).
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    /// Path within the archive; may contain nested directory segments.
    pub name: String,
    /// Directory markers end in `/` and carry no data.
    pub is_directory: bool,
    pub compression: Compression,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub(crate) header_offset: u64,
}

/// Location of the central directory, resolved from the trailer.
struct CentralDirectory {
    offset: u64,
    size: u64,
    count: u64,
}

/// Zip container over a random-access source.
///
/// Generic over the source so the same parser serves the in-memory reader
/// path and the on-disk batch path.
pub struct ZipContainer<R: ReadAt> {
    reader: Arc<R>,
    size: u64,
}

impl<R: ReadAt> ZipContainer<R> {
    pub fn new(reader: Arc<R>) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    pub(crate) fn reader(&self) -> &R {
        &self.reader
    }

    /// Enumerate all entries in central directory order.
    ///
    /// # Errors
    ///
    /// Fails if the source is not a valid zip container or the central
    /// directory cannot be read.
    pub async fn entries(&self) -> Result<Vec<ArchiveEntry>> {
        let directory = self.central_directory().await?;
        let mut data = vec![0u8; directory.size as usize];
        self.reader.read_exact_at(directory.offset, &mut data).await?;

        let mut cursor = Cursor::new(data.as_slice());
        let mut entries = Vec::with_capacity(directory.count as usize);
        for _ in 0..directory.count {
            entries.push(parse_central_header(&mut cursor)?);
        }
        Ok(entries)
    }

    /// Resolve where an entry's data begins.
    ///
    /// The local header repeats the name and extra field with lengths that
    /// may differ from the central directory copy, so it has to be read to
    /// find the data offset.
    pub(crate) async fn data_offset(&self, entry: &ArchiveEntry) -> Result<u64> {
        let mut header = [0u8; LOCAL_HEADER_SIZE];
        self.reader.read_exact_at(entry.header_offset, &mut header).await?;

        if &header[0..4] != LOCAL_HEADER_SIGNATURE {
            bail!("invalid local header for entry {}", entry.name);
        }

        let name_len = u16::from_le_bytes([header[26], header[27]]) as u64;
        let extra_len = u16::from_le_bytes([header[28], header[29]]) as u64;
        Ok(entry.header_offset + LOCAL_HEADER_SIZE as u64 + name_len + extra_len)
    }

    /// Find the trailer and resolve the central directory location,
    /// following the ZIP64 locator when the trailer says the real values
    /// live there. The resolved geometry is validated against the source
    /// size before it is returned.
    async fn central_directory(&self) -> Result<CentralDirectory> {
        let (trailer, trailer_offset) = self.find_trailer().await?;
        let mut cursor = Cursor::new(&trailer[4..]);

        let _disk_number = cursor.read_u16::<LittleEndian>()?;
        let _disk_with_directory = cursor.read_u16::<LittleEndian>()?;
        let _disk_entries = cursor.read_u16::<LittleEndian>()?;
        let count = cursor.read_u16::<LittleEndian>()?;
        let size = cursor.read_u32::<LittleEndian>()?;
        let offset = cursor.read_u32::<LittleEndian>()?;

        let directory = if count == 0xFFFF || size == 0xFFFF_FFFF || offset == 0xFFFF_FFFF {
            self.zip64_directory(trailer_offset).await?
        } else {
            CentralDirectory {
                offset: offset as u64,
                size: size as u64,
                count: count as u64,
            }
        };

        // Trailer geometry comes straight from the archive. Bounds-check it
        // against the real source size before it sizes any allocation.
        match directory.offset.checked_add(directory.size) {
            Some(end) if end <= self.size => {}
            _ => bail!("central directory lies outside the archive"),
        }
        if directory.count > directory.size / CENTRAL_HEADER_MIN_SIZE {
            bail!("central directory too small for its claimed entry count");
        }

        Ok(directory)
    }

    /// Locate the 22-byte trailer at the end of the archive.
    ///
    /// The common case has no archive comment, so the trailer sits exactly
    /// at the tail; otherwise scan backwards through the comment window for
    /// a signature whose comment-length field matches the remaining bytes.
    async fn find_trailer(&self) -> Result<(Vec<u8>, u64)> {
        if self.size >= TRAILER_SIZE as u64 {
            let offset = self.size - TRAILER_SIZE as u64;
            let mut buf = vec![0u8; TRAILER_SIZE];
            self.reader.read_exact_at(offset, &mut buf).await?;
            if &buf[0..4] == TRAILER_SIGNATURE && buf[20..22] == [0, 0] {
                return Ok((buf, offset));
            }
        }

        let window = (MAX_COMMENT_SIZE + TRAILER_SIZE as u64).min(self.size);
        let start = self.size - window;
        let mut buf = vec![0u8; window as usize];
        self.reader.read_exact_at(start, &mut buf).await?;

        for i in (0..buf.len().saturating_sub(TRAILER_SIZE)).rev() {
            if &buf[i..i + 4] == TRAILER_SIGNATURE {
                let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;
                if comment_len == buf.len() - i - TRAILER_SIZE {
                    return Ok((buf[i..i + TRAILER_SIZE].to_vec(), start + i as u64));
                }
            }
        }

        bail!("not a valid zip archive")
    }

    /// Read the ZIP64 locator (immediately before the trailer) and the
    /// ZIP64 trailer it points at.
    async fn zip64_directory(&self, trailer_offset: u64) -> Result<CentralDirectory> {
        if trailer_offset < ZIP64_LOCATOR_SIZE as u64 {
            bail!("missing ZIP64 locator");
        }

        let mut locator = [0u8; ZIP64_LOCATOR_SIZE];
        self.reader
            .read_exact_at(trailer_offset - ZIP64_LOCATOR_SIZE as u64, &mut locator)
            .await?;
        if &locator[0..4] != ZIP64_LOCATOR_SIGNATURE {
            bail!("missing ZIP64 locator");
        }

        let mut cursor = Cursor::new(&locator[4..]);
        let _disk_with_trailer = cursor.read_u32::<LittleEndian>()?;
        let zip64_trailer_offset = cursor.read_u64::<LittleEndian>()?;

        let mut trailer = [0u8; ZIP64_TRAILER_SIZE];
        self.reader.read_exact_at(zip64_trailer_offset, &mut trailer).await?;
        if &trailer[0..4] != ZIP64_TRAILER_SIGNATURE {
            bail!("invalid ZIP64 trailer");
        }

        let mut cursor = Cursor::new(&trailer[4..]);
        let _record_size = cursor.read_u64::<LittleEndian>()?;
        let _version_made_by = cursor.read_u16::<LittleEndian>()?;
        let _version_needed = cursor.read_u16::<LittleEndian>()?;
        let _disk_number = cursor.read_u32::<LittleEndian>()?;
        let _disk_with_directory = cursor.read_u32::<LittleEndian>()?;
        let _disk_entries = cursor.read_u64::<LittleEndian>()?;
        let count = cursor.read_u64::<LittleEndian>()?;
        let size = cursor.read_u64::<LittleEndian>()?;
        let offset = cursor.read_u64::<LittleEndian>()?;

        Ok(CentralDirectory { offset, size, count })
    }
}

/// Parse one central directory header, leaving the cursor at the next one.
fn parse_central_header(cursor: &mut Cursor<&[u8]>) -> Result<ArchiveEntry> {
    let mut signature = [0u8; 4];
    cursor.read_exact(&mut signature)?;
    if signature != CENTRAL_HEADER_SIGNATURE {
        bail!("invalid central directory header");
    }

    let _version_made_by = cursor.read_u16::<LittleEndian>()?;
    let _version_needed = cursor.read_u16::<LittleEndian>()?;
    let _flags = cursor.read_u16::<LittleEndian>()?;
    let method = cursor.read_u16::<LittleEndian>()?;
    let _mod_time = cursor.read_u16::<LittleEndian>()?;
    let _mod_date = cursor.read_u16::<LittleEndian>()?;
    let crc32 = cursor.read_u32::<LittleEndian>()?;
    let mut compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let mut uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let name_len = cursor.read_u16::<LittleEndian>()?;
    let extra_len = cursor.read_u16::<LittleEndian>()?;
    let comment_len = cursor.read_u16::<LittleEndian>()?;
    let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
    let _internal_attributes = cursor.read_u16::<LittleEndian>()?;
    let _external_attributes = cursor.read_u32::<LittleEndian>()?;
    let mut header_offset = cursor.read_u32::<LittleEndian>()? as u64;

    let mut name_bytes = vec![0u8; name_len as usize];
    cursor.read_exact(&mut name_bytes)?;
    // Lossy conversion keeps non-UTF8 names displayable instead of fatal.
    let name = String::from_utf8_lossy(&name_bytes).to_string();
    let is_directory = name.ends_with('/');

    // The ZIP64 extended information field (id 0x0001) carries the real
    // value for any 32-bit field that saturated above.
    let extra_end = cursor.position() + extra_len as u64;
    while cursor.position() + 4 <= extra_end {
        let field_id = cursor.read_u16::<LittleEndian>()?;
        let field_size = cursor.read_u16::<LittleEndian>()?;
        if field_id == 0x0001 {
            if uncompressed_size == 0xFFFF_FFFF && cursor.position() + 8 <= extra_end {
                uncompressed_size = cursor.read_u64::<LittleEndian>()?;
            }
            if compressed_size == 0xFFFF_FFFF && cursor.position() + 8 <= extra_end {
                compressed_size = cursor.read_u64::<LittleEndian>()?;
            }
            if header_offset == 0xFFFF_FFFF && cursor.position() + 8 <= extra_end {
                header_offset = cursor.read_u64::<LittleEndian>()?;
            }
            break;
        }
        cursor.set_position(cursor.position() + field_size as u64);
    }
    cursor.set_position(extra_end + comment_len as u64);

    Ok(ArchiveEntry {
        name,
        is_directory,
        compression: Compression::from_method(method),
        compressed_size,
        uncompressed_size,
        crc32,
        header_offset,
    })
}
