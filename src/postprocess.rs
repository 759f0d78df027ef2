use std::collections::BTreeMap;

use image::RgbImage;
use ndarray::prelude::*;

use crate::{
    errors::{Result, SegError},
    palette::PaletteTable,
    preprocess::OriginalExtent,
};

/// Cuts the valid `height x width` block out of a padded label map.
///
/// Exact slice, no resampling. Everything outside the block is padding and is never read.
pub fn crop_labels(label_map: ArrayView2<'_, u32>, extent: OriginalExtent) -> Result<Array2<u32>> {
    let (h, w) = (extent.height as usize, extent.width as usize);
    let (rows, cols) = label_map.dim();
    if rows < h || cols < w {
        return Err(SegError::LabelMapShape {
            expected: (h, w),
            actual: (rows, cols),
        });
    }
    Ok(label_map.slice(s![..h, ..w]).to_owned())
}

/// Maps every label through the palette.
pub fn colorize(labels: ArrayView2<'_, u32>, palette: &PaletteTable) -> Result<RgbImage> {
    let (rows, cols) = labels.dim();
    let mut image = RgbImage::new(cols as u32, rows as u32);
    for ((y, x), &label) in labels.indexed_iter() {
        image.put_pixel(x as u32, y as u32, palette.lookup(label)?);
    }
    Ok(image)
}

pub fn postprocess(
    label_map: ArrayView2<'_, u32>,
    extent: OriginalExtent,
    palette: &PaletteTable,
) -> Result<RgbImage> {
    let labels = crop_labels(label_map, extent)?;
    colorize(labels.view(), palette)
}

/// Pixel count per label present in `labels`, ordered by label.
pub fn present_classes(labels: ArrayView2<'_, u32>) -> Vec<(u32, usize)> {
    let mut counts = BTreeMap::new();
    for &label in labels {
        *counts.entry(label).or_insert(0) += 1;
    }
    counts.into_iter().collect()
}
