#![allow(dead_code)]

//! Hand-built zip fixtures for the integration tests.
//!
//! Writing the container bytes directly keeps the tests independent of any
//! zip-writing crate and makes malformed-archive cases (wrong CRC, forged
//! size fields, padded comment, ZIP64 trailer) easy to produce.

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::Write;

const METHOD_STORED: u16 = 0;
const METHOD_DEFLATE: u16 = 8;

struct EntryRecord {
    name: String,
    method: u16,
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
    header_offset: u32,
}

pub struct ZipBuilder {
    buffer: Vec<u8>,
    records: Vec<EntryRecord>,
    comment: Vec<u8>,
    force_zip64: bool,
    zip64_cd_size: Option<u64>,
    zip64_cd_count: Option<u64>,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            records: Vec::new(),
            comment: Vec::new(),
            force_zip64: false,
            zip64_cd_size: None,
            zip64_cd_count: None,
        }
    }

    /// Add an uncompressed entry.
    pub fn stored(self, name: &str, data: &[u8]) -> Self {
        let crc = checksum(data);
        self.entry(name, METHOD_STORED, crc, data, data.len())
    }

    /// Add an uncompressed entry whose recorded CRC deliberately disagrees
    /// with the data.
    pub fn stored_with_bad_crc(self, name: &str, data: &[u8]) -> Self {
        let crc = checksum(data) ^ 0xDEAD_BEEF;
        self.entry(name, METHOD_STORED, crc, data, data.len())
    }

    /// Add a raw-deflate compressed entry.
    pub fn deflated(self, name: &str, data: &[u8]) -> Self {
        let crc = checksum(data);
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        let compressed = encoder.finish().unwrap();
        self.entry(name, METHOD_DEFLATE, crc, &compressed, data.len())
    }

    /// Add a directory marker. `name` should end with `/`.
    pub fn directory(self, name: &str) -> Self {
        self.entry(name, METHOD_STORED, 0, &[], 0)
    }

    /// Append an archive comment after the trailer.
    pub fn comment(mut self, text: &str) -> Self {
        self.comment = text.as_bytes().to_vec();
        self
    }

    /// Saturate the trailer fields and emit ZIP64 records, the layout large
    /// archives actually use.
    pub fn force_zip64(mut self) -> Self {
        self.force_zip64 = true;
        self
    }

    /// Emit ZIP64 records whose central directory size field is forged.
    pub fn forge_zip64_cd_size(mut self, size: u64) -> Self {
        self.force_zip64 = true;
        self.zip64_cd_size = Some(size);
        self
    }

    /// Emit ZIP64 records whose entry count fields are forged.
    pub fn forge_zip64_count(mut self, count: u64) -> Self {
        self.force_zip64 = true;
        self.zip64_cd_count = Some(count);
        self
    }

    /// Overwrite the last entry's recorded compressed size.
    pub fn forge_compressed_size(mut self, size: u32) -> Self {
        self.records.last_mut().unwrap().compressed_size = size;
        self
    }

    /// Overwrite the last entry's recorded uncompressed size.
    pub fn forge_uncompressed_size(mut self, size: u32) -> Self {
        self.records.last_mut().unwrap().uncompressed_size = size;
        self
    }

    fn entry(
        mut self,
        name: &str,
        method: u16,
        crc32: u32,
        compressed: &[u8],
        uncompressed_len: usize,
    ) -> Self {
        let header_offset = self.buffer.len() as u32;
        let buf = &mut self.buffer;
        buf.extend_from_slice(b"PK\x03\x04");
        buf.write_u16::<LittleEndian>(20).unwrap(); // version needed
        buf.write_u16::<LittleEndian>(0).unwrap(); // flags
        buf.write_u16::<LittleEndian>(method).unwrap();
        buf.write_u16::<LittleEndian>(0).unwrap(); // mod time
        buf.write_u16::<LittleEndian>(0).unwrap(); // mod date
        buf.write_u32::<LittleEndian>(crc32).unwrap();
        buf.write_u32::<LittleEndian>(compressed.len() as u32).unwrap();
        buf.write_u32::<LittleEndian>(uncompressed_len as u32).unwrap();
        buf.write_u16::<LittleEndian>(name.len() as u16).unwrap();
        buf.write_u16::<LittleEndian>(0).unwrap(); // extra len
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(compressed);

        self.records.push(EntryRecord {
            name: name.to_string(),
            method,
            crc32,
            compressed_size: compressed.len() as u32,
            uncompressed_size: uncompressed_len as u32,
            header_offset,
        });
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut buffer = self.buffer;
        let central_offset = buffer.len() as u64;

        for record in &self.records {
            let buf = &mut buffer;
            buf.extend_from_slice(b"PK\x01\x02");
            buf.write_u16::<LittleEndian>(20).unwrap(); // version made by
            buf.write_u16::<LittleEndian>(20).unwrap(); // version needed
            buf.write_u16::<LittleEndian>(0).unwrap(); // flags
            buf.write_u16::<LittleEndian>(record.method).unwrap();
            buf.write_u16::<LittleEndian>(0).unwrap(); // mod time
            buf.write_u16::<LittleEndian>(0).unwrap(); // mod date
            buf.write_u32::<LittleEndian>(record.crc32).unwrap();
            buf.write_u32::<LittleEndian>(record.compressed_size).unwrap();
            buf.write_u32::<LittleEndian>(record.uncompressed_size).unwrap();
            buf.write_u16::<LittleEndian>(record.name.len() as u16).unwrap();
            buf.write_u16::<LittleEndian>(0).unwrap(); // extra len
            buf.write_u16::<LittleEndian>(0).unwrap(); // comment len
            buf.write_u16::<LittleEndian>(0).unwrap(); // disk number start
            buf.write_u16::<LittleEndian>(0).unwrap(); // internal attributes
            buf.write_u32::<LittleEndian>(0).unwrap(); // external attributes
            buf.write_u32::<LittleEndian>(record.header_offset).unwrap();
            buf.extend_from_slice(record.name.as_bytes());
        }

        let central_size = buffer.len() as u64 - central_offset;
        let count = self.records.len();

        if self.force_zip64 {
            let claimed_count = self.zip64_cd_count.unwrap_or(count as u64);
            let claimed_size = self.zip64_cd_size.unwrap_or(central_size);
            let zip64_trailer_offset = buffer.len() as u64;
            let buf = &mut buffer;
            buf.extend_from_slice(b"PK\x06\x06");
            buf.write_u64::<LittleEndian>(44).unwrap(); // record size
            buf.write_u16::<LittleEndian>(45).unwrap(); // version made by
            buf.write_u16::<LittleEndian>(45).unwrap(); // version needed
            buf.write_u32::<LittleEndian>(0).unwrap(); // disk number
            buf.write_u32::<LittleEndian>(0).unwrap(); // disk with directory
            buf.write_u64::<LittleEndian>(claimed_count).unwrap();
            buf.write_u64::<LittleEndian>(claimed_count).unwrap();
            buf.write_u64::<LittleEndian>(claimed_size).unwrap();
            buf.write_u64::<LittleEndian>(central_offset).unwrap();

            buf.extend_from_slice(b"PK\x06\x07");
            buf.write_u32::<LittleEndian>(0).unwrap(); // disk with trailer
            buf.write_u64::<LittleEndian>(zip64_trailer_offset).unwrap();
            buf.write_u32::<LittleEndian>(1).unwrap(); // total disks
        }

        let buf = &mut buffer;
        buf.extend_from_slice(b"PK\x05\x06");
        buf.write_u16::<LittleEndian>(0).unwrap(); // disk number
        buf.write_u16::<LittleEndian>(0).unwrap(); // disk with directory
        if self.force_zip64 {
            buf.write_u16::<LittleEndian>(0xFFFF).unwrap();
            buf.write_u16::<LittleEndian>(0xFFFF).unwrap();
            buf.write_u32::<LittleEndian>(0xFFFF_FFFF).unwrap();
            buf.write_u32::<LittleEndian>(0xFFFF_FFFF).unwrap();
        } else {
            buf.write_u16::<LittleEndian>(count as u16).unwrap();
            buf.write_u16::<LittleEndian>(count as u16).unwrap();
            buf.write_u32::<LittleEndian>(central_size as u32).unwrap();
            buf.write_u32::<LittleEndian>(central_offset as u32).unwrap();
        }
        buf.write_u16::<LittleEndian>(self.comment.len() as u16).unwrap();
        buf.extend_from_slice(&self.comment);

        buffer
    }
}

fn checksum(data: &[u8]) -> u32 {
    let mut crc = flate2::Crc::new();
    crc.update(data);
    crc.sum()
}
