use std::{fs, path::Path};

use image::{imageops, ImageFormat, Rgb, RgbImage};

use crate::{
    errors::{Result, SegError},
    preprocess::load_rgb,
};

/// Places `original` on the left and `segmentation` on the right of one canvas.
///
/// The canvas is as tall as the taller of the two; the shorter one is left on a black
/// background below its last row.
pub fn concatenate(original: &RgbImage, segmentation: &RgbImage) -> RgbImage {
    let (ow, oh) = original.dimensions();
    let (sw, sh) = segmentation.dimensions();

    let mut canvas = RgbImage::from_pixel(ow + sw, oh.max(sh), Rgb([0, 0, 0]));
    imageops::replace(&mut canvas, original, 0, 0);
    imageops::replace(&mut canvas, segmentation, i64::from(ow), 0);
    canvas
}

/// Writes the segmentation result to `output_path` as PNG.
///
/// With `concatenate`, the original is decoded again from `original_path` so the left half
/// shows the untouched source pixels. Existing files are overwritten.
pub fn compose(
    segmentation: &RgbImage,
    original_path: &Path,
    output_path: &Path,
    concatenate_original: bool,
) -> Result<()> {
    let composed;
    let result = if concatenate_original {
        let original = load_rgb(original_path)?;
        composed = concatenate(&original, segmentation);
        &composed
    } else {
        segmentation
    };

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| SegError::OutputWrite {
            path: parent.to_path_buf(),
            source: Box::new(e),
        })?;
    }

    result
        .save_with_format(output_path, ImageFormat::Png)
        .map_err(|e| SegError::OutputWrite {
            path: output_path.to_path_buf(),
            source: Box::new(e),
        })
}
