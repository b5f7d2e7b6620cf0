use clap::Parser;
use std::path::PathBuf;

/// Convert EPUB and PDF books into a normalized book directory for a reader
#[derive(Parser, Debug)]
#[command(name = "bookdata", version, about)]
pub struct Cli {
    /// Path to the input .epub or .pdf file
    #[arg(required_unless_present = "load")]
    pub input: Option<PathBuf>,

    /// Output directory. Defaults to `{input-stem}_data` next to the input.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Load an already converted book by id instead of converting
    #[arg(long, value_name = "BOOK_ID", conflicts_with = "input")]
    pub load: Option<String>,

    /// Directory that `--load` resolves book ids against
    #[arg(long, default_value = ".")]
    pub books_root: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "bookdata=info",
            1 => "bookdata=debug",
            _ => "bookdata=trace",
        }
    }
}
