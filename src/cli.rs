use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rcbz")]
#[command(version)]
#[command(about = "A CBZ comic archive reader and batch page extractor", long_about = None)]
#[command(after_help = "Examples:\n  \
  rcbz volume1.cbz                  extract pages into public/manga_images\n  \
  rcbz -l volume1.cbz               list pages without extracting\n  \
  rcbz -d pages volume1.cbz         extract pages into ./pages\n  \
  rcbz --serve volume1.cbz          open the reader on http://127.0.0.1:8080/\n  \
  rcbz --serve --port 9090          start the reader with only the picker")]
pub struct Cli {
    /// CBZ archive path
    #[arg(value_name = "ARCHIVE", required_unless_present = "serve")]
    pub archive: Option<PathBuf>,

    /// List pages (no extraction)
    #[arg(short = 'l')]
    pub list: bool,

    /// Serve the reader view on localhost
    #[arg(long)]
    pub serve: bool,

    /// Port for the reader view
    #[arg(long, value_name = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Extract pages into DIR
    #[arg(short = 'd', value_name = "DIR", default_value = "public/manga_images")]
    pub output_dir: PathBuf,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }
}
