use std::path::Path;

use anyhow::{Context, Result};
use image::{ImageFormat, RgbaImage};

use crate::app::loader::RadarImage;

pub fn decode_image(image_data: &[u8]) -> Result<RadarImage> {
    // Auto-detect the image format and decode
    let img = image::load_from_memory(image_data)?;

    // Convert to RGBA8 format
    Ok(RadarImage::from_rgba(img.to_rgba8()))
}

/// Write a PNG next to its destination first, then move it into place,
/// so a viewer polling the file never reads half a frame
pub fn write_png_atomic(path: &Path, image: &RgbaImage) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "frame.png".to_string());
    let tmp_path = path.with_file_name(format!(".{}.tmp", file_name));

    image
        .save_with_format(&tmp_path, ImageFormat::Png)
        .with_context(|| format!("writing {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("moving frame into place at {}", path.display()))?;
    Ok(())
}
