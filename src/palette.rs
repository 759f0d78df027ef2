use image::Rgb;

use crate::errors::{Result, SegError};

/// Names of the 21 PASCAL VOC classes, indexed by label.
pub const PASCAL_CLASSES: [&str; 21] = [
    "background",
    "aeroplane",
    "bicycle",
    "bird",
    "boat",
    "bottle",
    "bus",
    "car",
    "cat",
    "chair",
    "cow",
    "diningtable",
    "dog",
    "horse",
    "motorbike",
    "person",
    "pottedplant",
    "sheep",
    "sofa",
    "train",
    "tvmonitor",
];

/// Label used by VOC annotations for object boundaries and ignored pixels.
pub const VOID_LABEL: u32 = 255;

const PALETTE_LEN: usize = 256;

static PASCAL_VOC: PaletteTable = PaletteTable::voc();

/// Fixed class index to color mapping.
///
/// The table is computed at compile time and lives in a `static`, so every pipeline
/// (and every thread) reads the same immutable colors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaletteTable {
    colors: [[u8; 3]; PALETTE_LEN],
}

impl PaletteTable {
    /// The process-wide PASCAL VOC palette.
    pub fn pascal() -> &'static Self {
        &PASCAL_VOC
    }

    /// Builds the VOC palette by spreading the bits of each label over the high bits of
    /// the three channels: bit 0 goes to red, bit 1 to green, bit 2 to blue, then the
    /// next three bits one position lower, and so on.
    const fn voc() -> Self {
        let mut colors = [[0u8; 3]; PALETTE_LEN];
        let mut label = 0;
        while label < PALETTE_LEN {
            let mut code = label;
            let mut shift = 7;
            let mut rgb = [0u8; 3];
            while code > 0 {
                rgb[0] |= ((code & 1) as u8) << shift;
                rgb[1] |= (((code >> 1) & 1) as u8) << shift;
                rgb[2] |= (((code >> 2) & 1) as u8) << shift;
                code >>= 3;
                shift -= 1;
            }
            colors[label] = rgb;
            label += 1;
        }
        Self { colors }
    }

    pub const fn len(&self) -> usize {
        PALETTE_LEN
    }

    pub const fn is_empty(&self) -> bool {
        false
    }

    pub fn color(&self, label: u32) -> Option<Rgb<u8>> {
        self.colors.get(label as usize).map(|&rgb| Rgb(rgb))
    }

    /// Like [`PaletteTable::color`], but reports unknown labels as an error.
    pub fn lookup(&self, label: u32) -> Result<Rgb<u8>> {
        self.color(label).ok_or(SegError::LabelOutOfRange {
            label,
            palette_len: self.len(),
        })
    }
}

pub fn class_name(label: u32) -> Option<&'static str> {
    PASCAL_CLASSES.get(label as usize).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voc_class_colors() {
        let palette = PaletteTable::pascal();
        let expected: [[u8; 3]; 21] = [
            [0, 0, 0],
            [128, 0, 0],
            [0, 128, 0],
            [128, 128, 0],
            [0, 0, 128],
            [128, 0, 128],
            [0, 128, 128],
            [128, 128, 128],
            [64, 0, 0],
            [192, 0, 0],
            [64, 128, 0],
            [192, 128, 0],
            [64, 0, 128],
            [192, 0, 128],
            [64, 128, 128],
            [192, 128, 128],
            [0, 64, 0],
            [128, 64, 0],
            [0, 192, 0],
            [128, 192, 0],
            [0, 64, 128],
        ];

        for (label, rgb) in expected.iter().enumerate() {
            assert_eq!(palette.color(label as u32), Some(Rgb(*rgb)), "label {label}");
        }
    }

    #[test]
    fn test_void_label_color() {
        assert_eq!(
            PaletteTable::pascal().color(VOID_LABEL),
            Some(Rgb([224, 224, 192]))
        );
    }

    #[test]
    fn test_out_of_range_label() {
        let palette = PaletteTable::pascal();
        assert_eq!(palette.color(256), None);
        assert!(matches!(
            palette.lookup(300),
            Err(SegError::LabelOutOfRange {
                label: 300,
                palette_len: 256
            })
        ));
    }

    #[test]
    fn test_pascal_is_shared() {
        assert!(std::ptr::eq(PaletteTable::pascal(), PaletteTable::pascal()));
        assert_eq!(PaletteTable::pascal().len(), 256);
    }

    #[test]
    fn test_class_names() {
        assert_eq!(class_name(0), Some("background"));
        assert_eq!(class_name(15), Some("person"));
        assert_eq!(class_name(20), Some("tvmonitor"));
        assert_eq!(class_name(21), None);
    }
}
