//! # rcbz
//!
//! A CBZ comic archive reader and batch page extractor.
//!
//! This library opens zip-based comic book archives, picks out the entries
//! that are image pages, sorts them into reading order, and either hands
//! them to a browser reader view backed by revocable in-memory blob URLs or
//! writes them to a directory tree for static serving.
//!
//! ## Features
//!
//! - Read CBZ archives from the local filesystem or an in-memory buffer
//! - Support for ZIP64 format (archives larger than 4GB)
//! - Support for STORED (uncompressed) and DEFLATE compression methods
//! - Reader view served on localhost with fullscreen toggle and
//!   "Page X of N" captions
//! - One-shot batch extraction that mirrors nested entry paths on disk
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use rcbz::{LocalFileReader, ZipContainer};
//! use rcbz::pages;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Open an archive from disk
//!     let reader = Arc::new(LocalFileReader::new(Path::new("volume1.cbz"))?);
//!     let container = ZipContainer::new(reader);
//!
//!     // List the pages the reader would display, in reading order
//!     let mut names: Vec<String> = container
//!         .entries()
//!         .await?
//!         .into_iter()
//!         .filter(|entry| !entry.is_directory && pages::is_reader_page(&entry.name))
//!         .map(|entry| entry.name)
//!         .collect();
//!     names.sort_by(|a, b| pages::compare_names(a, b));
//!     for name in &names {
//!         println!("{name}");
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod batch;
pub mod blob;
pub mod cli;
pub mod io;
pub mod pages;
pub mod reader;
pub mod serve;

pub use archive::{ArchiveEntry, Compression, ZipContainer};
pub use batch::BatchReport;
pub use blob::{Blob, BlobHandle, BlobStore};
pub use cli::Cli;
pub use io::{LocalFileReader, MemoryReader, ReadAt};
pub use pages::ExtractedImage;
pub use reader::{ReaderError, ReaderState};
