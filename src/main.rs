//! Image Analyzer CLI
//!
//! Runs the analysis pipeline over a list of image files or a synthetic
//! scene and optionally writes every output frame to disk.

use clap::Parser;
use image_analyzer::{
    capture::{ConfigError, FileConfig, FileListSource, FrameSource, SourceKind, SyntheticSource},
    metrics::MetricsRegistry,
    output::OutputSink,
    pipeline::Pipeline,
    sequence::Filter,
};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "image-analyzer", version, about = "Frame-by-frame video analysis")]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Text file listing one input image per line.
    #[arg(short, long, conflicts_with = "synthetic")]
    input: Option<PathBuf>,

    /// Use the generated test scene as input.
    #[arg(long)]
    synthetic: bool,

    /// Operators to run on each frame, in order.
    #[arg(short, long, value_delimiter = ',')]
    filters: Option<Vec<Filter>>,

    /// Directory to write output frames to.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Stop after this many frames (0 for no limit).
    #[arg(short = 'n', long)]
    frames: Option<u64>,

    /// Frame width (ignored for file lists, which use the first image).
    #[arg(long)]
    width: Option<u32>,

    /// Frame height (ignored for file lists, which use the first image).
    #[arg(long)]
    height: Option<u32>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// Applies command-line overrides on top of the file configuration.
    fn apply(&self, config: &mut FileConfig) {
        if let Some(path) = &self.input {
            config.capture.source = SourceKind::FileList;
            config.capture.input_list = Some(path.clone());
        }
        if self.synthetic {
            config.capture.source = SourceKind::Synthetic;
        }
        if let Some(filters) = &self.filters {
            config.pipeline.filters = filters.clone();
        }
        if let Some(dir) = &self.output {
            config.output.directory = Some(dir.clone());
        }
        if let Some(frames) = self.frames {
            config.pipeline.frame_limit = frames;
        }
        if let Some(width) = self.width {
            config.capture.width = width;
        }
        if let Some(height) = self.height {
            config.capture.height = height;
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    info!("Image Analyzer v{}", image_analyzer::VERSION);

    let mut config = match &cli.config {
        Some(path) => match FileConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => FileConfig::default(),
    };
    cli.apply(&mut config);

    let source = match build_source(&mut config) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Failed to prepare frame source: {}", e);
            std::process::exit(1);
        }
    };

    let sink: Option<Box<dyn OutputSink>> = match config.output.disk_sink() {
        Ok(sink) => sink.map(|sink| {
            info!(directory = %sink.directory().display(), "Writing output frames");
            Box::new(sink) as Box<dyn OutputSink>
        }),
        Err(e) => {
            eprintln!("Failed to prepare output: {}", e);
            std::process::exit(1);
        }
    };

    let registry = match MetricsRegistry::new() {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            eprintln!("Failed to create metrics registry: {}", e);
            std::process::exit(1);
        }
    };
    start_metrics_server(config.output.metrics_port, &registry);

    let pipeline = match Pipeline::new(config) {
        Ok(pipeline) => pipeline.with_metrics(registry),
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let stop = pipeline.stop_handle();
    if let Err(e) = ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed)) {
        warn!("Ctrl-C handler not installed: {}", e);
    }

    match pipeline.run(source, sink) {
        Ok(stats) => {
            println!(
                "Processed {} frames ({:.1} fps), wrote {}, dropped {}",
                stats.frames_processed,
                stats.fps(),
                stats.frames_written,
                stats.frames_dropped + stats.output_dropped
            );
        }
        Err(e) => {
            eprintln!("Pipeline failed: {}", e);
            std::process::exit(1);
        }
    }
}

/// Creates the configured source. File lists take their frame size from
/// the first image.
fn build_source(config: &mut FileConfig) -> Result<Box<dyn FrameSource>, Box<dyn std::error::Error>> {
    match config.capture.source {
        SourceKind::Synthetic => {
            let mut source = SyntheticSource::new();
            if let Some(frame) = config.capture.motion_after {
                source = source.with_motion_after(frame);
            }
            Ok(Box::new(source))
        }
        SourceKind::FileList => {
            let list = config
                .capture
                .input_list
                .clone()
                .ok_or(ConfigError::MissingInputList)?;
            let (width, height) = FileListSource::probe(&list)?;
            info!(width, height, list = %list.display(), "Probed input dimensions");
            config.capture.width = width;
            config.capture.height = height;
            Ok(Box::new(FileListSource::new(list)))
        }
    }
}

#[cfg(feature = "metrics")]
fn start_metrics_server(port: u16, registry: &Arc<MetricsRegistry>) {
    use image_analyzer::metrics::{MetricsServer, MetricsServerConfig};

    if port == 0 {
        return;
    }
    let server = MetricsServer::new(MetricsServerConfig::with_port(port), Arc::clone(registry));
    if let Err(e) = server.spawn() {
        warn!("Metrics server not started: {}", e);
    }
}

#[cfg(not(feature = "metrics"))]
fn start_metrics_server(port: u16, _registry: &Arc<MetricsRegistry>) {
    if port != 0 {
        warn!(port, "Built without the metrics feature, exporter disabled");
    }
}
