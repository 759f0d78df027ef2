use crate::errors::Result;
use ndarray::prelude::*;

/// Pixel-labeling model behind the segmentation pipeline.
///
/// The pipeline only ever sees this interface, so it can be driven by the ONNX Runtime
/// model or by a fake returning synthetic label maps.
pub trait SegmentationModel: Send + Sync {
    /// Side length of the square input the model was trained on.
    fn input_size(&self) -> u32;

    /// Labels a batch of preprocessed inputs.
    ///
    /// `batch` is `N x size x size x 3` (channel last, model channel order, means removed).
    /// Returns one `size x size` map of class indices per input, as `N x size x size`.
    fn predict(&self, batch: ArrayView4<f32>) -> Result<Array3<u32>>;
}
