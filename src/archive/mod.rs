//! Zip container parsing and entry materialization.
//!
//! A CBZ is an ordinary zip archive whose entries are page images. This
//! module reads the container from any [`ReadAt`](crate::io::ReadAt)
//! source: it locates the end-of-central-directory trailer at the tail of
//! the archive, walks the central directory to enumerate entries, and
//! materializes an entry's bytes on demand (stored or deflated, verified
//! against the recorded CRC).
//!
//! ZIP64 archives are handled transparently; encrypted and multi-disk
//! archives are not.

mod container;
mod materialize;

pub use container::{ArchiveEntry, Compression, ZipContainer};
