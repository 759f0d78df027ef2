use std::path::PathBuf;
use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Structured error types for the segmentation driver.
///
/// # Per-image and batch-fatal errors
///
/// Most variants describe a problem with one image and are recorded by the batch
/// orchestrator before it moves on to the next path. `ModelInitialization` and
/// `Configuration` are raised before any image is touched and end the run.
#[derive(Error, Debug)]
pub enum SegError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Input file not found: {path:?}")]
    MissingInputFile { path: PathBuf },

    #[error("Failed to decode image {path:?}")]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Image is {width}x{height}, larger than the {size}x{size} model input")]
    OversizeImage {
        path: Option<PathBuf>,
        width: u32,
        height: u32,
        size: u32,
    },

    #[error("Image has no pixels ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    #[error("Model initialization error: {operation} failed")]
    ModelInitialization {
        operation: String,
        #[source]
        source: BoxedSource,
    },

    #[error("Inference error: {operation} failed")]
    Inference {
        operation: String,
        #[source]
        source: BoxedSource,
    },

    #[error("Label {label} has no palette entry (palette holds {palette_len} colors)")]
    LabelOutOfRange { label: u32, palette_len: usize },

    #[error("Label map shape mismatch: expected {expected:?}, got {actual:?}")]
    LabelMapShape {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Failed to write {path:?}")]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: BoxedSource,
    },
}

impl SegError {
    /// Whether the image was never attempted rather than attempted and failed.
    pub const fn is_skip(&self) -> bool {
        matches!(self, Self::MissingInputFile { .. })
    }

    /// The message followed by every underlying cause, separated by `: `.
    pub fn report(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }

    /// Attaches the offending path to an oversize error raised before the path was known.
    pub fn with_path(self, image_path: impl Into<PathBuf>) -> Self {
        match self {
            Self::OversizeImage {
                path: None,
                width,
                height,
                size,
            } => Self::OversizeImage {
                path: Some(image_path.into()),
                width,
                height,
                size,
            },
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, SegError>;

/// Convert ONNX Runtime errors raised while running a session.
///
/// # Why inference rather than initialization
///
/// Session construction wraps its errors explicitly with `ModelInitialization` at the
/// call site. Anything reaching `?` later comes from a forward pass or from reading its
/// outputs, which only affects the image being processed.
impl From<ort::Error> for SegError {
    fn from(err: ort::Error) -> Self {
        Self::Inference {
            operation: "ort operation".to_string(),
            source: Box::new(err),
        }
    }
}

/// Convert ndarray shape errors to inference errors.
///
/// Shape errors only occur while reshaping model inputs and outputs.
impl From<ndarray::ShapeError> for SegError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::Inference {
            operation: "tensor shape conversion".to_string(),
            source: Box::new(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_includes_causes() {
        let err = SegError::OutputWrite {
            path: PathBuf::from("out/cat-label.png"),
            source: Box::new(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "permission denied",
            )),
        };
        assert_eq!(
            err.report(),
            "Failed to write \"out/cat-label.png\": permission denied"
        );
    }

    #[test]
    fn test_classification() {
        let missing = SegError::MissingInputFile {
            path: PathBuf::from("a.jpg"),
        };
        assert!(missing.is_skip());

        let init = SegError::ModelInitialization {
            operation: "load".to_string(),
            source: "bad path".into(),
        };
        assert!(!init.is_skip());
    }

    #[test]
    fn test_with_path_fills_oversize_only() {
        let err = SegError::OversizeImage {
            path: None,
            width: 600,
            height: 10,
            size: 505,
        }
        .with_path("big.jpg");
        assert!(matches!(
            err,
            SegError::OversizeImage { path: Some(ref p), .. } if p == std::path::Path::new("big.jpg")
        ));

        let other = SegError::EmptyImage {
            width: 0,
            height: 0,
        }
        .with_path("x.jpg");
        assert!(matches!(other, SegError::EmptyImage { .. }));
    }
}
