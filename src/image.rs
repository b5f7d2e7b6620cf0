use crate::model::ImageMap;
use crate::reader::BookSource;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Result of writing a source's images to disk.
#[derive(Debug, Default)]
pub struct ExtractedImages {
    pub map: ImageMap,
    /// Images whose sanitized filename was already taken by another image.
    pub collisions: usize,
}

/// Writes every embedded image into `images_dir` and maps both its internal
/// path and its bare filename to the output-relative path.
///
/// Sources that sanitize to the same filename overwrite each other; the
/// last one wins and the collision is reported.
pub fn extract_images(source: &dyn BookSource, images_dir: &Path) -> Result<ExtractedImages> {
    fs::create_dir_all(images_dir)
        .with_context(|| format!("Failed to create {}", images_dir.display()))?;

    let mut image_map = ImageMap::new();
    let mut written: HashMap<String, String> = HashMap::new();
    let mut collisions = 0usize;

    for img in source.images() {
        let original_name = basename(&img.original_href);
        let filename = clean_filename(original_name);
        let dest = images_dir.join(&filename);

        fs::write(&dest, &img.data)
            .with_context(|| format!("Failed to write image: {}", dest.display()))?;
        tracing::debug!(href = %img.original_href, file = %filename, "extracted image");

        if let Some(previous) = written.insert(filename.clone(), img.original_href.clone()) {
            if previous != img.original_href {
                collisions += 1;
                tracing::debug!(%previous, current = %img.original_href, "image filename collision");
            }
        }

        let rel_path = format!("images/{}", filename);
        image_map.insert(original_name.to_string(), rel_path.clone());
        image_map.insert(img.original_href, rel_path);
    }

    if collisions > 0 {
        tracing::warn!(collisions, "images shared a sanitized filename, later ones overwrote earlier ones");
    }

    Ok(ExtractedImages {
        map: image_map,
        collisions,
    })
}

fn basename(href: &str) -> &str {
    href.rsplit('/').next().unwrap_or(href)
}

/// Keeps alphanumerics and `._-`; an empty result becomes `image.bin`.
fn clean_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();

    if cleaned.is_empty() {
        "image.bin".to_string()
    } else {
        cleaned
    }
}
