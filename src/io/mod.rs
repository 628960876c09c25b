mod local;
mod memory;

pub use local::LocalFileReader;
pub use memory::MemoryReader;

use anyhow::Result;
use async_trait::async_trait;

/// Trait for random access reading from an archive source.
///
/// The container parser jumps around the archive (trailer first, then the
/// central directory, then each entry's data), so sources expose positioned
/// reads instead of a seekable stream.
#[async_trait]
pub trait ReadAt: Send + Sync {
    /// Fill `buf` with the bytes starting at `offset`.
    ///
    /// A short source is an error: the parser always knows exactly how many
    /// bytes a structure occupies.
    async fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Total size of the source in bytes.
    fn size(&self) -> u64;
}
