use crate::epub_reader::EpubData;
use crate::error::ConvertError;
use crate::image;
use crate::model::{Book, ImageMap, FORMAT_VERSION};
use crate::pdf_reader::PdfData;
use crate::reader::{BookFormat, BookSource};
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Name of the serialized book inside an output directory.
pub const BOOK_FILE: &str = "book.json";

pub const IMAGES_DIR: &str = "images";

/// Converts `input` into `{output}/book.json` plus `{output}/images/`.
///
/// The result is staged in a sibling directory and moved into place only
/// once complete; an existing output directory is replaced.
pub fn convert(input: &Path, output: Option<&Path>) -> Result<(Book, PathBuf)> {
    if !input.is_file() {
        return Err(ConvertError::NotFound {
            path: input.to_path_buf(),
        }
        .into());
    }
    let format = BookFormat::from_path(input)?;
    let output_dir = match output {
        Some(path) => path.to_path_buf(),
        None => default_output_dir(input)?,
    };

    tracing::info!(input = %input.display(), "loading");
    let source: Box<dyn BookSource> = match format {
        BookFormat::Epub => Box::new(
            EpubData::open(input)
                .with_context(|| format!("Failed to open EPUB: {}", input.display()))?,
        ),
        BookFormat::Pdf => Box::new(
            PdfData::open(input)
                .with_context(|| format!("Failed to open PDF: {}", input.display()))?,
        ),
    };

    let parent = match output_dir.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)
        .with_context(|| format!("Failed to create {}", parent.display()))?;

    let dir_name = output_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "book".to_string());
    let staging = tempfile::Builder::new()
        .prefix(&format!(".{dir_name}.staging-"))
        .tempdir_in(&parent)
        .context("Failed to create staging directory")?;

    tracing::info!("extracting images");
    let images = image::extract_images(source.as_ref(), &staging.path().join(IMAGES_DIR))?.map;

    let source_file = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let book = assemble(source.as_ref(), images, source_file);

    write_book(&book, &staging.path().join(BOOK_FILE))?;
    publish(staging, &output_dir)?;
    tracing::info!(path = %output_dir.join(BOOK_FILE).display(), "saved book");

    Ok((book, output_dir))
}

/// Composes the parts read from `source` into a [`Book`].
pub fn assemble(source: &dyn BookSource, images: ImageMap, source_file: String) -> Book {
    let metadata = source.metadata();

    tracing::info!("processing chapters");
    let spine = source.chapters(&images);

    tracing::info!("parsing table of contents");
    let toc = source.toc(&spine);

    let book = Book {
        metadata,
        spine,
        toc,
        images,
        source_file,
        processed_at: chrono::Local::now().to_rfc3339(),
        version: FORMAT_VERSION.to_string(),
    };

    let dangling = book.dangling_toc_entries();
    if dangling > 0 {
        tracing::warn!(dangling, "table of contents entries point outside the spine");
    }
    book
}

/// `{input-stem}_data` next to the input file.
fn default_output_dir(input: &Path) -> Result<PathBuf> {
    let stem = input
        .file_stem()
        .context("Input file has no name")?
        .to_string_lossy();
    Ok(input.with_file_name(format!("{stem}_data")))
}

fn write_book(book: &Book, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, book).map_err(ConvertError::from)?;
    writer.flush()?;
    Ok(())
}

/// Replaces `output_dir` with the staged directory.
fn publish(staging: tempfile::TempDir, output_dir: &Path) -> Result<()> {
    if output_dir.exists() {
        fs::remove_dir_all(output_dir)
            .with_context(|| format!("Failed to remove previous output: {}", output_dir.display()))?;
    }

    let staged = staging.keep();
    if let Err(e) = fs::rename(&staged, output_dir) {
        let _ = fs::remove_dir_all(&staged);
        return Err(e).with_context(|| format!("Failed to move output into {}", output_dir.display()));
    }
    Ok(())
}

pub fn print_summary(book: &Book) {
    println!("\n--- Summary ---");
    println!("Title: {}", book.metadata.title);
    println!("Authors: {}", book.metadata.authors.join(", "));
    println!("Physical Files (Spine): {}", book.spine.len());
    println!("TOC Root Items: {}", book.toc.len());
    println!("Images extracted: {}", book.images.len());
}
