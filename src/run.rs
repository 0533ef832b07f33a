use crate::config::AppConfig;
use crate::export::{export_all, ExportPaths};
use crate::ingest::{PositionSource, SampleSource, SyntheticGpsSource, SyntheticIqSource};
use crate::metrics::MetricsSummary;
use crate::pipeline::ObservatoryPipeline;
use crate::types::{FeatureRecord, PositionFix, TileMetrics};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct RunArgs {
    /// Frames to pull from the sample source
    pub frames: u64,
    pub output_dir: PathBuf,
}

/// Records collected by [`drive`].
#[derive(Debug, Default)]
pub struct SessionRecords {
    pub features: Vec<FeatureRecord>,
    pub tiles: Vec<TileMetrics>,
    pub frames_rejected: u64,
}

#[derive(Debug)]
pub struct RunSummary {
    pub frames_processed: usize,
    pub frames_rejected: u64,
    pub tiles: usize,
    pub export: ExportPaths,
    pub metrics: MetricsSummary,
    pub elapsed_secs: f64,
}

/// Feed up to `max_frames` frames through the pipeline, interleaving fixes by
/// timestamp, then flush the final partial window.
///
/// Every fix that could align with a frame is delivered before that frame,
/// so results do not depend on thread timing.
pub fn drive<S, P>(
    pipeline: &mut ObservatoryPipeline,
    samples: &mut S,
    positions: &mut P,
    max_frames: u64,
) -> SessionRecords
where
    S: SampleSource + ?Sized,
    P: PositionSource + ?Sized,
{
    let mut records = SessionRecords::default();
    let mut next_fix: Option<PositionFix> = positions.next_fix();
    let tolerance_ns = pipeline.fix_tolerance_ns();

    for _ in 0..max_frames {
        let Some(frame) = samples.next_frame() else {
            tracing::info!("Sample source exhausted");
            break;
        };

        let horizon = frame.timestamp_ns.saturating_add(tolerance_ns);
        while let Some(fix) = next_fix.filter(|f| f.gps_timestamp_ns <= horizon) {
            pipeline.add_fix(fix);
            next_fix = positions.next_fix();
        }

        match pipeline.process(&frame) {
            Ok(output) => {
                records.features.push(output.features);
                records.tiles.extend(output.tiles);
            }
            Err(e) => {
                // Already logged by the pipeline
                records.frames_rejected += 1;
                if let Some(hint) = e.recovery_hint() {
                    tracing::debug!(frame_id = frame.frame_id, hint, "Skipping frame");
                }
            }
        }
    }

    records.tiles.extend(pipeline.flush());
    records
}

/// Run a synthetic capture session end to end and export the results.
pub fn run_session(config: &AppConfig, args: &RunArgs) -> Result<RunSummary> {
    let started = Instant::now();
    tracing::info!("Starting session");
    tracing::info!("Frames: {}", args.frames);
    tracing::info!("Output directory: {:?}", args.output_dir);

    config.validate().context("Invalid configuration")?;

    let mut pipeline = ObservatoryPipeline::new(config).context("Failed to build pipeline")?;
    let mut samples = SyntheticIqSource::new(&config.rf, &config.synthetic.iq)
        .context("Failed to create synthetic IQ source")?;
    let mut positions = SyntheticGpsSource::new(&config.synthetic.gps)
        .context("Failed to create synthetic GPS source")?;

    let records = drive(&mut pipeline, &mut samples, &mut positions, args.frames);

    if records.tiles.is_empty() {
        tracing::warn!("No tiles produced; check that the route lies inside the grid extent");
    }

    let export = export_all(&args.output_dir, &records.features, &records.tiles)
        .context("Failed to export session")?;

    let metrics = pipeline.metrics().summary();
    metrics.log();

    tracing::info!("Session complete");
    Ok(RunSummary {
        frames_processed: records.features.len(),
        frames_rejected: records.frames_rejected,
        tiles: records.tiles.len(),
        export,
        metrics,
        elapsed_secs: started.elapsed().as_secs_f64(),
    })
}
