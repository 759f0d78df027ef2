use std::{
    collections::{hash_map::Entry, HashMap},
    path::{Path, PathBuf},
};

use image::ImageFormat;
use indicatif::ProgressBar;
use ndarray::Axis;
use rayon::{prelude::*, ThreadPoolBuilder};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::{
    compose::compose,
    config::Config,
    errors::{Result, SegError},
    normalization::MeanSubtraction,
    palette::{class_name, PaletteTable},
    postprocess::{colorize, crop_labels, present_classes},
    preprocess::{load_rgb, preprocess, stack_batch},
    traits::SegmentationModel,
};

const OUTPUT_SUFFIX: &str = "-label.png";

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub output_dir: PathBuf,
    /// Place the original image to the left of the color map.
    pub concatenate: bool,
    pub num_threads: usize,
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            concatenate: config.concatenate(),
            num_threads: config.num_threads,
        }
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            concatenate: true,
            num_threads: 1,
        }
    }
}

/// Where a single image is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStage {
    Pending,
    Preprocessing,
    Inferring,
    Postprocessing,
    Composing,
    Done,
    Skipped,
}

#[derive(Debug)]
pub enum ImageOutcome {
    Written(PathBuf),
    /// Written, then replaced by a later input with the same output name.
    Overwritten(PathBuf),
    /// The input was not a readable file.
    Skipped(SegError),
    Failed(SegError),
}

#[derive(Debug)]
pub struct ImageReport {
    pub input: PathBuf,
    pub outcome: ImageOutcome,
}

/// Per-image results of a batch, in input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub images: Vec<ImageReport>,
}

impl BatchReport {
    pub fn written(&self) -> impl Iterator<Item = &Path> {
        self.images.iter().filter_map(|report| match &report.outcome {
            ImageOutcome::Written(path) => Some(path.as_path()),
            _ => None,
        })
    }

    pub fn skipped_count(&self) -> usize {
        self.images
            .iter()
            .filter(|report| matches!(report.outcome, ImageOutcome::Skipped(_)))
            .count()
    }

    pub fn overwritten_count(&self) -> usize {
        self.images
            .iter()
            .filter(|report| matches!(report.outcome, ImageOutcome::Overwritten(_)))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.images
            .iter()
            .filter(|report| matches!(report.outcome, ImageOutcome::Failed(_)))
            .count()
    }
}

/// Runs images through preprocess, inference, postprocess and compose.
///
/// Images never share state apart from the read-only palette and normalization, so they
/// can run on several threads; calls into the model are serialized by the model itself.
pub struct SegmentationPipeline<M: SegmentationModel> {
    model: M,
    palette: &'static PaletteTable,
    normalization: MeanSubtraction,
    options: PipelineOptions,
}

impl<M: SegmentationModel> SegmentationPipeline<M> {
    pub fn new(model: M, options: PipelineOptions) -> Self {
        Self {
            model,
            palette: PaletteTable::pascal(),
            normalization: MeanSubtraction::pascal(),
            options,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Segments one image and returns the path of the written result.
    pub fn process_image(&self, path: &Path) -> Result<PathBuf> {
        let stage = |stage: ImageStage| debug!(path = %path.display(), ?stage);
        stage(ImageStage::Pending);

        stage(ImageStage::Preprocessing);
        let image = load_rgb(path)?;
        let input = preprocess(&image, self.model.input_size(), &self.normalization)
            .map_err(|e| e.with_path(path))?;
        drop(image);
        let output_path = self.output_path(path)?;

        stage(ImageStage::Inferring);
        let batch = stack_batch(std::slice::from_ref(&input))?;
        let label_maps = self.model.predict(batch.view())?;
        let size = input.size();
        let (count, rows, cols) = label_maps.dim();
        if count == 0 || (rows, cols) != (size, size) {
            return Err(SegError::LabelMapShape {
                expected: (size, size),
                actual: (rows, cols),
            });
        }

        stage(ImageStage::Postprocessing);
        let labels = crop_labels(label_maps.index_axis(Axis(0), 0), input.extent())?;
        for (label, pixels) in present_classes(labels.view()) {
            debug!(
                path = %path.display(),
                label,
                class = class_name(label).unwrap_or("unknown"),
                pixels
            );
        }
        let segmentation = colorize(labels.view(), self.palette)?;

        stage(ImageStage::Composing);
        compose(&segmentation, path, &output_path, self.options.concatenate)?;

        stage(ImageStage::Done);
        Ok(output_path)
    }

    /// Processes every path, recording failures instead of stopping at them.
    ///
    /// Inputs that share an output file run one after another in input order, so the last
    /// of them wins and the earlier ones are reported as overwritten. Only an unusable
    /// thread pool configuration makes the whole call fail.
    pub fn run(&self, paths: &[PathBuf], progress: &ProgressBar) -> Result<BatchReport> {
        let run_one = |path: &PathBuf| {
            let outcome = match self.process_image(path) {
                Ok(output) => {
                    info!(input = %path.display(), output = %output.display(), "segmented");
                    ImageOutcome::Written(output)
                }
                Err(e) if e.is_skip() => {
                    debug!(path = %path.display(), stage = ?ImageStage::Skipped);
                    warn!("skipping {}: {}", path.display(), e.report());
                    ImageOutcome::Skipped(e)
                }
                Err(e) => {
                    error!("failed to segment {}: {}", path.display(), e.report());
                    ImageOutcome::Failed(e)
                }
            };
            progress.inc(1);
            ImageReport {
                input: path.clone(),
                outcome,
            }
        };

        let run_group = |group: &Vec<usize>| {
            let mut reports: Vec<(usize, ImageReport)> = group
                .iter()
                .map(|&index| (index, run_one(&paths[index])))
                .collect();
            mark_overwritten(&mut reports);
            reports
        };

        let groups = self.output_groups(paths);
        let grouped: Vec<Vec<(usize, ImageReport)>> = if self.options.num_threads > 1 {
            let pool = ThreadPoolBuilder::new()
                .num_threads(self.options.num_threads)
                .build()
                .map_err(|e| SegError::Configuration {
                    message: format!("failed to build thread pool: {e}"),
                })?;
            pool.install(|| groups.par_iter().map(&run_group).collect())
        } else {
            groups.iter().map(&run_group).collect()
        };

        let mut indexed: Vec<(usize, ImageReport)> = grouped.into_iter().flatten().collect();
        indexed.sort_by_key(|(index, _)| *index);
        let images = indexed.into_iter().map(|(_, report)| report).collect();

        Ok(BatchReport { images })
    }

    /// Indices of `paths` grouped by output file, each group in input order.
    fn output_groups(&self, paths: &[PathBuf]) -> Vec<Vec<usize>> {
        let mut groups: Vec<Vec<usize>> = Vec::new();
        let mut by_output: HashMap<PathBuf, usize> = HashMap::new();
        for (index, path) in paths.iter().enumerate() {
            match self.output_path(path) {
                Ok(output) => match by_output.entry(output) {
                    Entry::Occupied(entry) => groups[*entry.get()].push(index),
                    Entry::Vacant(entry) => {
                        entry.insert(groups.len());
                        groups.push(vec![index]);
                    }
                },
                // fails on its own when processed
                Err(_) => groups.push(vec![index]),
            }
        }
        groups
    }

    fn output_path(&self, path: &Path) -> Result<PathBuf> {
        let name = output_file_name(path).ok_or_else(|| SegError::MissingInputFile {
            path: path.to_path_buf(),
        })?;
        Ok(self.options.output_dir.join(name))
    }
}

/// Every write in `reports` except the last one was replaced by a later input.
fn mark_overwritten(reports: &mut [(usize, ImageReport)]) {
    let mut superseded = false;
    for (_, report) in reports.iter_mut().rev() {
        if let ImageOutcome::Written(output) = &report.outcome {
            if superseded {
                let output = output.clone();
                warn!(
                    input = %report.input.display(),
                    output = %output.display(),
                    "output replaced by a later input with the same name"
                );
                report.outcome = ImageOutcome::Overwritten(output);
            }
            superseded = true;
        }
    }
}

/// Output file name for `path`: the file name up to its first `.`, plus `-label.png`.
///
/// `/a/b/cat.jpg` becomes `cat-label.png`. Names starting with a dot keep their stem.
pub fn output_file_name(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_string_lossy();
    let base = match name.split('.').next() {
        Some(base) if !base.is_empty() => base.to_string(),
        _ => path.file_stem()?.to_string_lossy().into_owned(),
    };
    Some(format!("{base}{OUTPUT_SUFFIX}"))
}

pub fn is_supported_image(path: &Path) -> bool {
    ImageFormat::from_path(path).is_ok_and(|format| format.reading_enabled())
}

/// Replaces each directory argument with the supported images below it, sorted by name.
///
/// Other arguments are kept as given, including paths that do not exist, so they are
/// reported as skipped in their original position.
pub fn expand_inputs(paths: &[PathBuf]) -> Vec<PathBuf> {
    paths
        .iter()
        .flat_map(|path| {
            if path.is_dir() {
                WalkDir::new(path)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file() && is_supported_image(e.path()))
                    .map(|e| e.into_path())
                    .collect()
            } else {
                vec![path.clone()]
            }
        })
        .collect()
}
