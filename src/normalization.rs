//! Per-channel mean subtraction for Caffe-trained VGG/DeepLab networks.
//!
//! Those networks were trained on BGR images with the ImageNet channel means removed and
//! no scaling, so the input keeps the 0-255 range.

use ndarray::{aview1, s, Array3, ArrayView3};

/// ImageNet channel means in BGR order, as used when the VOC DeepLab models were trained.
pub const PASCAL_MEAN_BGR: [f32; 3] = [103.939, 116.779, 123.68];

/// Channel order of the tensor handed to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    Rgb,
    /// Reverse of the decoded order.
    Bgr,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeanSubtraction {
    /// Mean for each channel, given in the output channel order.
    pub mean: [f32; 3],
    pub order: ChannelOrder,
}

impl MeanSubtraction {
    pub const fn new(mean: [f32; 3], order: ChannelOrder) -> Self {
        Self { mean, order }
    }

    pub const fn pascal() -> Self {
        Self::new(PASCAL_MEAN_BGR, ChannelOrder::Bgr)
    }

    /// Turns a channel-first RGB view into a channel-last tensor in the model's channel
    /// order with the means removed.
    pub fn normalize(&self, chw: ArrayView3<'_, u8>) -> Array3<f32> {
        let ordered = match self.order {
            ChannelOrder::Rgb => chw,
            ChannelOrder::Bgr => chw.slice_move(s![..;-1, .., ..]),
        };
        let mut hwc = ordered.permuted_axes([1, 2, 0]).mapv(f32::from);
        hwc -= &aview1(&self.mean);
        hwc
    }
}

impl Default for MeanSubtraction {
    fn default() -> Self {
        Self::pascal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_pixel() -> Array3<u8> {
        Array3::from_shape_vec((3, 1, 1), vec![10, 20, 30]).unwrap()
    }

    #[test]
    fn test_bgr_mean_subtraction() {
        let pixel = single_pixel();
        let out = MeanSubtraction::pascal().normalize(pixel.view());

        assert_eq!(out.shape(), &[1, 1, 3]);
        assert!((out[[0, 0, 0]] - (30.0 - 103.939)).abs() < 1e-4);
        assert!((out[[0, 0, 1]] - (20.0 - 116.779)).abs() < 1e-4);
        assert!((out[[0, 0, 2]] - (10.0 - 123.68)).abs() < 1e-4);
    }

    #[test]
    fn test_rgb_order_keeps_channels() {
        let pixel = single_pixel();
        let norm = MeanSubtraction::new([1.0, 2.0, 3.0], ChannelOrder::Rgb);
        let out = norm.normalize(pixel.view());
        assert_eq!(out.iter().copied().collect::<Vec<_>>(), vec![9.0, 18.0, 27.0]);
    }

    #[test]
    fn test_layout_is_height_width_channel() {
        // 2 rows, 3 columns; each pixel's red value encodes its position.
        let mut chw = Array3::<u8>::zeros((3, 2, 3));
        for y in 0..2 {
            for x in 0..3 {
                chw[[0, y, x]] = (y * 10 + x) as u8;
            }
        }
        let norm = MeanSubtraction::new([0.0; 3], ChannelOrder::Bgr);
        let out = norm.normalize(chw.view());

        assert_eq!(out.shape(), &[2, 3, 3]);
        assert_eq!(out[[1, 2, 2]], 12.0);
        assert_eq!(out[[1, 2, 0]], 0.0);
        assert_eq!(out[[0, 1, 2]], 1.0);
    }
}
