//! Offline batch extraction: archive on disk in, image files on disk out.
//!
//! Entries are processed one at a time and every write is awaited before the
//! next entry starts, so when this returns the files are on disk. Entry
//! names keep their internal directory structure under the output root;
//! names that try to climb out of it are rejected.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};

use crate::archive::ZipContainer;
use crate::io::LocalFileReader;
use crate::pages::is_batch_page;

/// What a batch run did: how many image entries were written and how many
/// non-directory entries were skipped for not matching the export set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    pub written: usize,
    pub skipped: usize,
}

/// Extract every exportable image from the archive at `archive` into
/// `output_dir`, mirroring nested entry paths.
///
/// The output root is created up front if missing; an existing directory is
/// fine. Intermediate directories appear as entry names require them.
pub async fn extract_archive(archive: &Path, output_dir: &Path) -> Result<BatchReport> {
    let reader = Arc::new(LocalFileReader::new(archive)?);
    let container = ZipContainer::new(reader);
    let entries = container.entries().await?;

    fs::create_dir_all(output_dir)
        .await
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    let mut report = BatchReport {
        written: 0,
        skipped: 0,
    };
    for entry in &entries {
        if entry.is_directory {
            continue;
        }
        if !is_batch_page(&entry.name) {
            debug!("Skipping {}", entry.name);
            report.skipped += 1;
            continue;
        }

        info!("Extracting: {}", entry.name);
        let data = container.read_entry(entry).await?;
        let path = safe_output_path(output_dir, &entry.name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&path, &data)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        debug!("Wrote {} ({} bytes)", path.display(), data.len());
        report.written += 1;
    }

    Ok(report)
}

/// Join an entry name onto the output root. Empty and `.` segments drop
/// out; a `..` segment fails the entry rather than letting it climb above
/// the root.
fn safe_output_path(output_dir: &Path, entry_name: &str) -> Result<PathBuf> {
    let mut path = output_dir.to_path_buf();
    for part in entry_name.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            bail!("entry name {entry_name:?} escapes the output directory");
        }
        path.push(part);
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_paths_stay_under_the_root() {
        let root = Path::new("out");
        assert_eq!(
            safe_output_path(root, "a.png").unwrap(),
            PathBuf::from("out/a.png")
        );
        assert_eq!(
            safe_output_path(root, "vol1/ch2/p3.jpg").unwrap(),
            PathBuf::from("out/vol1/ch2/p3.jpg")
        );
        assert_eq!(
            safe_output_path(root, "./p.gif").unwrap(),
            PathBuf::from("out/p.gif")
        );
        assert_eq!(
            safe_output_path(root, "/abs/p.png").unwrap(),
            PathBuf::from("out/abs/p.png")
        );
    }

    #[test]
    fn climbing_entry_names_are_rejected() {
        let root = Path::new("out");
        assert!(safe_output_path(root, "../escape.png").is_err());
        assert!(safe_output_path(root, "a/../../escape.png").is_err());
    }
}
