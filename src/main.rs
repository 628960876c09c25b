//! Main entry point for the rcbz CLI application.
//!
//! This binary works a CBZ comic archive three ways: list its pages,
//! extract them to a directory for static serving (the default), or serve
//! the interactive reader view on localhost.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use rcbz::{Cli, LocalFileReader, ZipContainer, batch, pages, serve};

/// Application entry point.
///
/// Parses command-line arguments and dispatches to the reader server,
/// the page listing, or the batch extractor.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli)?;

    if cli.serve {
        return serve::run_server(cli.archive.as_deref(), cli.port).await;
    }

    // clap enforces ARCHIVE whenever --serve is absent.
    let archive = cli.archive.as_deref().context("ARCHIVE is required")?;

    if cli.list {
        return list_pages(archive).await;
    }

    run_extract(archive, &cli).await
}

/// Wire the log filter: INFO by default, WARN with `-q`, ERROR with `-qq`.
/// `RUST_LOG` still overrides the default when set.
fn init_tracing(cli: &Cli) -> Result<()> {
    let default_level = if cli.is_very_quiet() {
        Level::ERROR
    } else if cli.is_quiet() {
        Level::WARN
    } else {
        Level::INFO
    };
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env()?;
    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_file(false))
        .with(env_filter)
        .init();
    Ok(())
}

/// List the displayable pages of the archive, one name per line, in the
/// order the reader would show them.
///
/// # Arguments
///
/// * `archive` - Path to the CBZ archive on disk
///
/// # Returns
///
/// Returns `Ok(())` on success, or an error if the archive cannot be read.
async fn list_pages(archive: &Path) -> Result<()> {
    let reader = Arc::new(LocalFileReader::new(archive)?);
    let container = ZipContainer::new(reader);

    let mut names: Vec<String> = container
        .entries()
        .await?
        .into_iter()
        .filter(|entry| !entry.is_directory && pages::is_reader_page(&entry.name))
        .map(|entry| entry.name)
        .collect();
    names.sort_by(|a, b| pages::compare_names(a, b));

    for name in &names {
        println!("{name}");
    }

    Ok(())
}

/// Extract the archive's image pages to the output directory.
async fn run_extract(archive: &Path, cli: &Cli) -> Result<()> {
    let report = batch::extract_archive(archive, &cli.output_dir).await?;

    info!("Manga images extracted!");
    info!(
        "{} pages written to {} ({} entries skipped)",
        report.written,
        cli.output_dir.display(),
        report.skipped
    );

    Ok(())
}
