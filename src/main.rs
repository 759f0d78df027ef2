use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use deeplab_seg_rs::{
    expand_inputs, init_tracing, Config, Model, PipelineOptions, SegmentationPipeline,
};

fn main() -> Result<()> {
    let config = Config::parse();
    init_tracing();
    config.validate()?;

    let model = Model::new(
        &config.net_path,
        &config.model_path,
        config.device_id,
        config.image_size,
    )
    .context("Failed to initialize the segmentation model")?;

    let image_paths = expand_inputs(&config.images);

    let progress_bar = if config.no_progress {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(image_paths.len() as u64)
    };
    progress_bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec} {eta})",
        )?
        .progress_chars("#>-"),
    );

    let pipeline = SegmentationPipeline::new(model, PipelineOptions::from_config(&config));
    let report = pipeline.run(&image_paths, &progress_bar)?;
    progress_bar.finish();

    info!(
        written = report.written().count(),
        overwritten = report.overwritten_count(),
        skipped = report.skipped_count(),
        failed = report.failed_count(),
        "batch finished"
    );

    Ok(())
}
