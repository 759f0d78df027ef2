pub mod compose;
pub mod config;
pub mod errors;
pub mod model;
pub mod normalization;
pub mod palette;
pub mod pipeline;
pub mod postprocess;
pub mod preprocess;
pub mod traits;

pub mod mocks;

pub use config::Config;
pub use errors::{Result, SegError};
pub use model::Model;
pub use normalization::{ChannelOrder, MeanSubtraction, PASCAL_MEAN_BGR};
pub use palette::PaletteTable;
pub use pipeline::{
    expand_inputs, output_file_name, BatchReport, ImageOutcome, PipelineOptions,
    SegmentationPipeline,
};
pub use preprocess::{ModelInput, OriginalExtent};
pub use traits::*;

/// Installs the global tracing subscriber.
///
/// Filtering follows `RUST_LOG` and defaults to `info`. Log lines go to stderr so they
/// share the terminal with the progress bar.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
