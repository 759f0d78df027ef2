use clap::Parser;
use std::path::PathBuf;

use crate::errors::{Result, SegError};

/// Input side length of the PASCAL VOC DeepLab models.
pub const DEFAULT_IMAGE_SIZE: u32 = 505;

#[derive(Parser, Clone, Debug)]
#[command(version, about, long_about = None, allow_negative_numbers = true)]
pub struct Config {
    /// Device number used for computation
    pub device_id: i32,

    /// ONNX graph describing the network
    pub net_path: PathBuf,

    /// Weights belonging to the network (the same file for self-contained graphs)
    pub model_path: PathBuf,

    /// Images or directories of images to segment
    #[arg(required = true, num_args = 1..)]
    pub images: Vec<PathBuf>,

    /// Side length of the square model input
    #[arg(long, default_value_t = DEFAULT_IMAGE_SIZE)]
    pub image_size: u32,

    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Write only the color map instead of placing it next to the original image
    #[arg(long)]
    pub no_concat: bool,

    #[arg(short = 'j', long, default_value_t = 1)]
    pub num_threads: usize,

    #[arg(long)]
    pub no_progress: bool,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.image_size == 0 {
            return Err(SegError::Configuration {
                message: "image size must be greater than 0".to_string(),
            });
        }
        if self.num_threads == 0 {
            return Err(SegError::Configuration {
                message: "thread count must be greater than 0".to_string(),
            });
        }
        Ok(())
    }

    pub const fn concatenate(&self) -> bool {
        !self.no_concat
    }
}
