//! Reader view state.
//!
//! [`ReaderState`] holds what the reader shows: the ordered page list of the
//! current archive, the latest user-facing error, and the fullscreen flag.
//! State changes only through the transition methods. The blob handles for a
//! page list are owned here and released when the list is replaced or the
//! state is dropped, so a handle never outlives the list it was created for.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::archive::ZipContainer;
use crate::blob::BlobStore;
use crate::io::MemoryReader;
use crate::pages::{self, ExtractedImage};

/// What the reader reports when a load goes wrong. The display string is the
/// complete user-facing message; the view adds the "Error: " prefix.
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("No file selected")]
    NoFileSelected,
    #[error("Failed to extract CBZ file")]
    ExtractionFailed(anyhow::Error),
}

/// Reader state machine.
pub struct ReaderState {
    store: BlobStore,
    images: Vec<ExtractedImage>,
    error: Option<ReaderError>,
    fullscreen: bool,
}

impl ReaderState {
    /// A fresh reader with no archive loaded, registering its pages in
    /// `store`.
    pub fn new(store: BlobStore) -> Self {
        Self {
            store,
            images: Vec::new(),
            error: None,
            fullscreen: false,
        }
    }

    /// Handle a file selection. `None` means the picker fired without a
    /// file, which records the no-selection error. Either way a failed
    /// selection leaves the currently displayed pages as they were.
    pub async fn load(&mut self, path: Option<&Path>) {
        let Some(path) = path else {
            self.error = Some(ReaderError::NoFileSelected);
            return;
        };

        match tokio::fs::read(path).await {
            Ok(data) => self.load_buffer(data).await,
            Err(err) => {
                warn!("Failed to read {}: {}", path.display(), err);
                self.error = Some(ReaderError::ExtractionFailed(err.into()));
            }
        }
    }

    /// Load an archive already buffered in memory. On success the page list
    /// is replaced wholesale and any prior error is cleared; the outgoing
    /// list's handles are released before the new list becomes visible.
    pub async fn load_buffer(&mut self, data: Vec<u8>) {
        match extract_all(&self.store, data).await {
            Ok(images) => {
                self.replace_images(images);
                self.error = None;
            }
            Err(err) => {
                warn!("Extraction failed: {:#}", err);
                self.error = Some(ReaderError::ExtractionFailed(err));
            }
        }
    }

    /// Pages of the current load, in display order.
    pub fn pages(&self) -> &[ExtractedImage] {
        &self.images
    }

    pub fn error(&self) -> Option<&ReaderError> {
        self.error.as_ref()
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    /// Request the opposite display mode. The flag mirrors what was
    /// requested, not a confirmation from the display surface.
    pub fn toggle_fullscreen(&mut self) {
        self.fullscreen = !self.fullscreen;
    }

    fn replace_images(&mut self, images: Vec<ExtractedImage>) {
        self.release_current();
        self.images = images;
    }

    fn release_current(&mut self) {
        for image in self.images.drain(..) {
            self.store.release(image.handle);
        }
    }
}

impl Drop for ReaderState {
    fn drop(&mut self) {
        self.release_current();
    }
}

async fn extract_all(store: &BlobStore, data: Vec<u8>) -> Result<Vec<ExtractedImage>> {
    let reader = Arc::new(MemoryReader::from(data));
    let container = ZipContainer::new(reader);
    pages::extract_pages(&container, store).await
}
