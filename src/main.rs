mod cli;

use anyhow::{bail, Context, Result};
use bookdata::{converter, store};
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    init_logging(cli.log_filter());

    if let Some(book_id) = &cli.load {
        let store = store::BookStore::new(&cli.books_root, store::DEFAULT_CAPACITY);
        let Some(book) = store
            .load(book_id)
            .with_context(|| format!("Failed to load book {book_id}"))?
        else {
            bail!("No book found for id '{book_id}' under {}", store.root().display());
        };
        converter::print_summary(&book);
        return Ok(());
    }

    let input = cli.input.as_deref().context("No input file given")?;
    let (book, output_dir) = converter::convert(input, cli.output.as_deref())?;
    converter::print_summary(&book);
    println!("Output: {}", output_dir.display());
    Ok(())
}

fn init_logging(default_filter: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    // RUST_LOG wins over --verbose.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
