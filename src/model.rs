use std::{fs, path::Path};

use crate::{
    errors::{Result, SegError},
    traits::SegmentationModel,
};
use ndarray::prelude::*;
use num_traits::ToPrimitive;
use ort::{
    execution_providers::{CUDAExecutionProvider, TensorRTExecutionProvider},
    session::{builder::SessionBuilder, Session},
    value::TensorRef,
};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

/// DeepLab network running on ONNX Runtime.
///
/// The session is bound to one device and runs one batch at a time; concurrent callers
/// queue on the mutex.
pub struct Model {
    pub image_size: u32,
    input_name: String,
    output_name: String,
    session: Mutex<Session>,
}

fn init_error(
    operation: impl Into<String>,
    source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> SegError {
    SegError::ModelInitialization {
        operation: operation.into(),
        source: source.into(),
    }
}

impl Model {
    /// Loads the network graph from `net_path` with the weights in `model_path`.
    ///
    /// `model_path` is either the same file (self-contained graph) or the external data file
    /// the graph references, which ONNX Runtime resolves next to the graph. `image_size` is
    /// used when the graph leaves its spatial input dimensions symbolic.
    pub fn new(
        net_path: &Path,
        model_path: &Path,
        device_id: i32,
        image_size: u32,
    ) -> Result<Self> {
        check_weights(net_path, model_path)?;

        let mut session = SessionBuilder::new()
            .map_err(|e| init_error("session builder", e))?
            .with_execution_providers([
                TensorRTExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
                CUDAExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
            ])
            .map_err(|e| init_error("execution provider registration", e))?
            .with_memory_pattern(true)
            .map_err(|e| init_error("memory pattern", e))?
            .commit_from_file(net_path)
            .map_err(|e| init_error(format!("loading {}", net_path.display()), e))?;

        let input = session
            .inputs
            .first()
            .ok_or_else(|| init_error("model input lookup", "graph has no inputs"))?;
        let input_name = input.name.clone();
        let declared = input
            .input_type
            .tensor_shape()
            .ok_or_else(|| init_error("model input shape", "input is not a tensor"))?
            .to_vec();
        let image_size = resolve_image_size(&declared, image_size)?;

        let output_name = session
            .outputs
            .first()
            .ok_or_else(|| init_error("model output lookup", "graph has no outputs"))?
            .name
            .clone();

        // initialize model
        let data = Array4::<f32>::zeros((1, 3, image_size as usize, image_size as usize));
        let warmup = TensorRef::from_array_view(data.view())
            .map_err(|e| init_error("warm-up tensor", e))?;
        session
            .run(ort::inputs![input_name.as_str() => warmup])
            .map_err(|e| init_error("warm-up run", e))?;

        info!(
            net = %net_path.display(),
            device_id,
            image_size,
            "model loaded"
        );

        Ok(Self {
            image_size,
            input_name,
            output_name,
            session: Mutex::new(session),
        })
    }
}

impl SegmentationModel for Model {
    fn input_size(&self) -> u32 {
        self.image_size
    }

    fn predict(&self, batch: ArrayView4<f32>) -> Result<Array3<u32>> {
        let (n, h, w, _) = batch.dim();
        // NHWC -> NCHW
        let nchw = batch.permuted_axes([0, 3, 1, 2]);
        let nchw = nchw.as_standard_layout();

        let mut binding = self.session.lock();
        let outputs = binding.run(
            ort::inputs![self.input_name.as_str() => TensorRef::from_array_view(nchw.view())?],
        )?;
        let output = &outputs[self.output_name.as_str()];

        let labels = if let Ok(scores) = output.try_extract_array::<f32>() {
            debug!(shape = ?scores.shape(), "float model output");
            labels_from_scores(scores)?
        } else if let Ok(indices) = output.try_extract_array::<i64>() {
            labels_from_indices(indices)?
        } else if let Ok(indices) = output.try_extract_array::<i32>() {
            labels_from_indices(indices)?
        } else {
            labels_from_indices(output.try_extract_array::<u8>()?)?
        };

        check_label_maps(labels.dim(), (n, h, w))?;
        Ok(labels)
    }
}

fn check_label_maps(actual: (usize, usize, usize), expected: (usize, usize, usize)) -> Result<()> {
    if actual.0 != expected.0 {
        return Err(decode_error(format!(
            "model returned {} label maps for {} inputs",
            actual.0, expected.0
        )));
    }
    if (actual.1, actual.2) != (expected.1, expected.2) {
        return Err(SegError::LabelMapShape {
            expected: (expected.1, expected.2),
            actual: (actual.1, actual.2),
        });
    }
    Ok(())
}

fn check_weights(net_path: &Path, model_path: &Path) -> Result<()> {
    for path in [net_path, model_path] {
        if !path.is_file() {
            return Err(init_error(
                format!("opening {}", path.display()),
                std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
            ));
        }
    }

    let net = fs::canonicalize(net_path).map_err(|e| init_error("resolving net path", e))?;
    let weights =
        fs::canonicalize(model_path).map_err(|e| init_error("resolving model path", e))?;
    if net == weights {
        return Ok(());
    }
    if net.parent() != weights.parent() {
        return Err(init_error(
            "locating external weights",
            format!(
                "{} must be in the same directory as {}",
                model_path.display(),
                net_path.display()
            ),
        ));
    }
    // ONNX Runtime follows the graph's own external-data references, not this path
    warn!(
        net = %net_path.display(),
        weights = %model_path.display(),
        "weights path differs from the graph; only data referenced by the graph is loaded"
    );
    Ok(())
}

/// Picks the spatial input size from the graph's declared `N x 3 x H x W` shape.
fn resolve_image_size(declared: &[i64], requested: u32) -> Result<u32> {
    if declared.len() != 4 {
        return Err(init_error(
            "model input shape",
            format!("expected a 4-d input, got {declared:?}"),
        ));
    }
    match (declared[2], declared[3]) {
        (h, w) if h > 0 && w > 0 && h != w => Err(init_error(
            "model input shape",
            format!("input must be square, got {h}x{w}"),
        )),
        (h, _) if h > 0 && h != i64::from(requested) => Err(init_error(
            "model input shape",
            format!("model expects {h}x{h} inputs but {requested} was requested"),
        )),
        _ => Ok(requested),
    }
}

fn decode_error(message: String) -> SegError {
    SegError::Inference {
        operation: "label map decoding".to_string(),
        source: Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            message,
        )),
    }
}

/// Turns `N x C x H x W` class scores into labels; a single channel already holds labels.
fn labels_from_scores(scores: ArrayViewD<f32>) -> Result<Array3<u32>> {
    if scores.ndim() == 4 && scores.shape()[1] > 1 {
        let scores = scores.into_dimensionality::<Ix4>()?;
        let (n, _, h, w) = scores.dim();
        Ok(Array3::from_shape_fn((n, h, w), |(i, y, x)| {
            argmax(scores.slice(s![i, .., y, x]))
        }))
    } else {
        labels_from_indices(scores)
    }
}

/// First index of the largest score.
fn argmax(scores: ArrayView1<f32>) -> u32 {
    let mut best = (0, f32::NEG_INFINITY);
    for (class, &score) in scores.indexed_iter() {
        if score > best.1 {
            best = (class, score);
        }
    }
    best.0 as u32
}

/// Accepts `N x H x W` or `N x 1 x H x W` class indices.
fn labels_from_indices<T: ToPrimitive + Copy>(indices: ArrayViewD<T>) -> Result<Array3<u32>> {
    let indices = match indices.ndim() {
        3 => indices.into_dimensionality::<Ix3>()?,
        4 if indices.shape()[1] == 1 => indices
            .index_axis_move(Axis(1), 0)
            .into_dimensionality::<Ix3>()?,
        _ => {
            return Err(decode_error(format!(
                "unsupported label map shape {:?}",
                indices.shape()
            )))
        }
    };

    let mut labels = Array3::<u32>::zeros(indices.dim());
    for (label, index) in labels.iter_mut().zip(indices.iter()) {
        // 2.7 or -0.5 must not truncate into a valid class
        let whole = index
            .to_f64()
            .is_some_and(|value| value >= 0.0 && value.fract() == 0.0);
        *label = index
            .to_u32()
            .filter(|_| whole)
            .ok_or_else(|| decode_error("class index is not a non-negative integer".to_string()))?;
    }
    Ok(labels)
}
