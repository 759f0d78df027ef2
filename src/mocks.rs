use std::sync::atomic::{AtomicUsize, Ordering};

use crate::errors::Result;
use crate::traits::SegmentationModel;
use ndarray::prelude::*;

/// Segmentation model stand-in that labels pixels from their position.
///
/// Pixel `(y, x)` of every map gets `(y / band_height) % classes`.
#[derive(Debug)]
pub struct MockSegmentationModel {
    pub image_size: u32,
    pub band_height: usize,
    pub classes: u32,
    // side of the returned maps when it differs from the input
    pub output_size: Option<usize>,
    calls: AtomicUsize,
}

impl MockSegmentationModel {
    pub const fn new(image_size: u32) -> Self {
        Self {
            image_size,
            band_height: 8,
            classes: 21,
            output_size: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub const fn with_bands(mut self, band_height: usize, classes: u32) -> Self {
        self.band_height = band_height;
        self.classes = classes;
        self
    }

    pub const fn with_output_size(mut self, output_size: usize) -> Self {
        self.output_size = Some(output_size);
        self
    }

    pub fn label_at(&self, y: usize) -> u32 {
        (y / self.band_height) as u32 % self.classes
    }

    /// Number of `predict` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SegmentationModel for MockSegmentationModel {
    fn input_size(&self) -> u32 {
        self.image_size
    }

    fn predict(&self, batch: ArrayView4<f32>) -> Result<Array3<u32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (n, h, w, _) = batch.dim();
        let (h, w) = self.output_size.map_or((h, w), |side| (side, side));
        Ok(Array3::from_shape_fn((n, h, w), |(_, y, _)| self.label_at(y)))
    }
}

/// Mock sized like the VOC DeepLab input.
pub const fn create_mock_model() -> MockSegmentationModel {
    MockSegmentationModel::new(505)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_model_creation() {
        let mock = create_mock_model();
        assert_eq!(mock.input_size(), 505);
        assert_eq!(mock.calls(), 0);
    }

    #[test]
    fn test_mock_model_predict() -> Result<()> {
        let mock = MockSegmentationModel::new(32).with_bands(4, 3);
        let input_tensor = Array4::<f32>::zeros((2, 32, 32, 3));

        let result = mock.predict(input_tensor.view())?;
        assert_eq!(result.shape(), &[2, 32, 32]);
        assert_eq!(result[[1, 0, 5]], 0);
        assert_eq!(result[[1, 5, 5]], 1);
        assert_eq!(result[[0, 12, 0]], 0);
        assert_eq!(mock.calls(), 1);
        Ok(())
    }

    #[test]
    fn test_mock_output_size() -> Result<()> {
        let mock = MockSegmentationModel::new(32).with_output_size(4);
        let result = mock.predict(Array4::<f32>::zeros((1, 32, 32, 3)).view())?;
        assert_eq!(result.shape(), &[1, 4, 4]);
        Ok(())
    }
}
