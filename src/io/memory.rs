use super::ReadAt;
use anyhow::{Result, bail};
use async_trait::async_trait;
use bytes::Bytes;

/// Archive source over a buffer already in memory.
///
/// This is the picked-file path of the reader: the whole archive is read
/// into memory once, then parsed and materialized from the buffer.
pub struct MemoryReader {
    data: Bytes,
}

impl MemoryReader {
    pub fn new(data: Bytes) -> Self {
        Self { data }
    }
}

impl From<Vec<u8>> for MemoryReader {
    fn from(data: Vec<u8>) -> Self {
        Self::new(Bytes::from(data))
    }
}

#[async_trait]
impl ReadAt for MemoryReader {
    async fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let len = self.data.len() as u64;
        let end = match offset.checked_add(buf.len() as u64) {
            Some(end) if end <= len => end as usize,
            _ => bail!("read past the end of the archive buffer"),
        };
        buf.copy_from_slice(&self.data[offset as usize..end]);
        Ok(())
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}
