//! Page selection: which archive entries count as pages, and in what order.
//!
//! The reader accepts jpg, jpeg, png, gif and webp regardless of case. The
//! batch extractor accepts the narrower set without webp. Ordering is a
//! collation-style comparison of the full entry name: case-insensitive
//! first, lowercase winning ties, so `a.jpg` sorts before `B.png` sorts
//! before `C.gif`. Numeric runs are not special-cased, which keeps
//! `page10.png` ahead of `page2.png` the way a plain name sort does.

use anyhow::Result;
use bytes::Bytes;
use std::cmp::Ordering;
use std::path::Path;

use crate::archive::{ArchiveEntry, ZipContainer};
use crate::blob::{BlobHandle, BlobStore};
use crate::io::ReadAt;

/// Extensions the reader displays as pages.
pub const READER_IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// Extensions the batch extractor writes to disk. Narrower on purpose:
/// webp stays viewable in the reader but is not part of the export set.
pub const BATCH_IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// True if the entry name carries a reader-displayable image extension.
pub fn is_reader_page(name: &str) -> bool {
    extension_of(name).is_some_and(|ext| READER_IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// True if the entry name carries an extension the batch extractor exports.
pub fn is_batch_page(name: &str) -> bool {
    extension_of(name).is_some_and(|ext| BATCH_IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Collation-style name ordering: case-insensitive primary pass, then
/// lowercase-before-uppercase at the first character where only case
/// differs.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    match a.to_lowercase().cmp(&b.to_lowercase()) {
        Ordering::Equal => case_order(a, b),
        other => other,
    }
}

fn case_order(a: &str, b: &str) -> Ordering {
    for (ca, cb) in a.chars().zip(b.chars()) {
        if ca != cb {
            return match (ca.is_lowercase(), cb.is_lowercase()) {
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                // Same case class: codepoint order keeps the tiebreak
                // antisymmetric.
                _ => ca.cmp(&cb),
            };
        }
    }
    a.cmp(b)
}

/// Content type an image entry is served with, keyed on its extension.
pub(crate) fn content_type_for(name: &str) -> &'static str {
    match extension_of(name).as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// One displayable page.
#[derive(Debug, Clone)]
pub struct ExtractedImage {
    pub name: String,
    /// Owned page bytes; the same buffer the handle resolves to.
    pub content: Bytes,
    pub handle: BlobHandle,
}

/// Pull every displayable page out of the archive, in display order, and
/// register each one with the blob store.
///
/// An archive with no matching entries yields an empty list, not an error.
/// If any single entry fails to materialize, handles already acquired by
/// this call are released again before the error propagates, so a failed
/// load never leaks registrations.
pub async fn extract_pages<R: ReadAt>(
    container: &ZipContainer<R>,
    store: &BlobStore,
) -> Result<Vec<ExtractedImage>> {
    let mut entries: Vec<ArchiveEntry> = container
        .entries()
        .await?
        .into_iter()
        .filter(|entry| !entry.is_directory && is_reader_page(&entry.name))
        .collect();
    entries.sort_by(|a, b| compare_names(&a.name, &b.name));

    let mut images = Vec::with_capacity(entries.len());
    for entry in &entries {
        match container.read_entry(entry).await {
            Ok(data) => {
                let handle = store.acquire(content_type_for(&entry.name), data.clone());
                images.push(ExtractedImage {
                    name: entry.name.clone(),
                    content: data,
                    handle,
                });
            }
            Err(err) => {
                for image in &images {
                    store.release(image.handle);
                }
                return Err(err);
            }
        }
    }

    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_filter_accepts_all_image_types_case_insensitively() {
        assert!(is_reader_page("cover.jpg"));
        assert!(is_reader_page("page.JPEG"));
        assert!(is_reader_page("Page.PNG"));
        assert!(is_reader_page("anim.gif"));
        assert!(is_reader_page("modern.webp"));
        assert!(is_reader_page("nested/dir/page01.png"));
    }

    #[test]
    fn reader_filter_rejects_non_pages() {
        assert!(!is_reader_page("ComicInfo.xml"));
        assert!(!is_reader_page("notes.txt"));
        assert!(!is_reader_page("no_extension"));
        assert!(!is_reader_page("archive.zip"));
    }

    #[test]
    fn batch_filter_excludes_webp_but_ignores_case() {
        assert!(is_batch_page("page.png"));
        assert!(is_batch_page("page.JPG"));
        assert!(is_batch_page("page.jpeg"));
        assert!(is_batch_page("page.GIF"));
        assert!(!is_batch_page("page.webp"));
        assert!(!is_batch_page("page.WEBP"));
    }

    #[test]
    fn names_sort_case_insensitively_with_lowercase_first() {
        let mut names = vec!["C.gif", "a.jpg", "b.png"];
        names.sort_by(|a, b| compare_names(a, b));
        assert_eq!(names, vec!["a.jpg", "b.png", "C.gif"]);

        assert_eq!(compare_names("a.jpg", "A.jpg"), Ordering::Less);
        assert_eq!(compare_names("A.jpg", "a.jpg"), Ordering::Greater);
        assert_eq!(compare_names("a.jpg", "a.jpg"), Ordering::Equal);
    }

    #[test]
    fn case_tiebreak_orders_same_class_characters_by_codepoint() {
        // KELVIN SIGN lowercases to 'k', the same as 'K'.
        assert_eq!(compare_names("K.png", "\u{212A}.png"), Ordering::Less);
        assert_eq!(compare_names("\u{212A}.png", "K.png"), Ordering::Greater);

        let mut names = vec!["\u{212A}.png", "K.png", "k.png"];
        names.sort_by(|a, b| compare_names(a, b));
        assert_eq!(names, vec!["k.png", "K.png", "\u{212A}.png"]);
    }

    #[test]
    fn numeric_runs_are_not_special_cased() {
        let mut names = vec!["page2.png", "page10.png", "page1.png"];
        names.sort_by(|a, b| compare_names(a, b));
        assert_eq!(names, vec!["page1.png", "page10.png", "page2.png"]);
    }

    #[test]
    fn content_types_follow_the_extension() {
        assert_eq!(content_type_for("a.jpg"), "image/jpeg");
        assert_eq!(content_type_for("a.JPEG"), "image/jpeg");
        assert_eq!(content_type_for("a.png"), "image/png");
        assert_eq!(content_type_for("a.gif"), "image/gif");
        assert_eq!(content_type_for("a.webp"), "image/webp");
        assert_eq!(content_type_for("a.bin"), "application/octet-stream");
    }
}
