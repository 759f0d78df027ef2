use std::path::Path;

use image::RgbImage;
use ndarray::prelude::*;
use nshare::AsNdarray3;

use crate::{
    errors::{Result, SegError},
    normalization::MeanSubtraction,
};

/// Height and width of an image before it was padded to the model input size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OriginalExtent {
    pub height: u32,
    pub width: u32,
}

impl OriginalExtent {
    pub const fn new(height: u32, width: u32) -> Self {
        Self { height, width }
    }
}

/// A padded model input together with the extent of the image it was built from.
///
/// The two are only ever created together, so a label map can always be cropped with the
/// extent of the image that produced it.
#[derive(Debug, Clone)]
pub struct ModelInput {
    tensor: Array3<f32>,
    extent: OriginalExtent,
}

impl ModelInput {
    /// `size x size x 3` tensor, channel last.
    pub fn tensor(&self) -> ArrayView3<'_, f32> {
        self.tensor.view()
    }

    pub const fn extent(&self) -> OriginalExtent {
        self.extent
    }

    pub fn size(&self) -> usize {
        self.tensor.shape()[0]
    }
}

/// Decodes an image file into 8-bit RGB, dropping alpha and expanding gray.
pub fn load_rgb(path: &Path) -> Result<RgbImage> {
    if !path.is_file() {
        return Err(SegError::MissingInputFile {
            path: path.to_path_buf(),
        });
    }

    let image = image::open(path).map_err(|source| SegError::ImageDecode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(image.into_rgb8())
}

/// Builds the `size x size x 3` model input for `image`.
///
/// The normalized pixels occupy the top-left `height x width` block; padding is added on
/// the bottom and right only and is exactly zero.
pub fn preprocess(image: &RgbImage, size: u32, norm: &MeanSubtraction) -> Result<ModelInput> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(SegError::EmptyImage { width, height });
    }
    if width > size || height > size {
        return Err(SegError::OversizeImage {
            path: None,
            width,
            height,
            size,
        });
    }

    let normalized = norm.normalize(image.as_ndarray3());

    let (h, w, s) = (height as usize, width as usize, size as usize);
    let mut tensor = Array3::<f32>::zeros((s, s, 3));
    tensor.slice_mut(s![..h, ..w, ..]).assign(&normalized);

    Ok(ModelInput {
        tensor,
        extent: OriginalExtent::new(height, width),
    })
}

/// Stacks model inputs into an `N x size x size x 3` batch.
pub fn stack_batch(inputs: &[ModelInput]) -> Result<Array4<f32>> {
    let views: Vec<_> = inputs.iter().map(ModelInput::tensor).collect();
    Ok(ndarray::stack(Axis(0), &views)?)
}
