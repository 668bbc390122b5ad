mod sink;
mod source;

use anyhow::{Context, Result};
use clap::Parser;
use seg_overlay::segmentation::{overlay_to_rgb8, rgb8_to_frame};
use seg_overlay::{BackendConfig, ComputeTarget, OverlayEngine};
use sink::{OverlaySink, PngDirectory};
use source::{FrameSource, ImageSequence};
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Image files or directories of images to segment
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory that receives <name>_overlay.png files
    #[arg(short, long, default_value = "overlays")]
    output_dir: PathBuf,

    /// Path to the FastSAM segmentation model (ONNX file)
    #[arg(long, default_value = "FastSAM-x.onnx")]
    model: PathBuf,

    /// Inference device: cpu, cuda[:N] or tensorrt[:N]
    #[arg(long, default_value = "cuda")]
    device: ComputeTarget,

    /// Run segmentation; without it every frame is skipped
    #[arg(long)]
    segment: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tracing::info!("seg-overlay starting");

    let mut source = ImageSequence::new(&args.inputs).context("Failed to collect input frames")?;
    let mut sink = PngDirectory::new(&args.output_dir).context("Failed to prepare output")?;

    let mut engine = OverlayEngine::new(BackendConfig {
        model: args.model,
        target: args.device,
        enabled: args.segment,
    });
    if !engine.is_enabled() {
        tracing::info!("Segmentation inactive ({:?}), no overlays will be written", engine.state());
    }

    run_pipeline(&mut source, &mut sink, &mut engine)
}

fn run_pipeline<S, O>(source: &mut S, sink: &mut O, engine: &mut OverlayEngine) -> Result<()>
where
    S: FrameSource,
    O: OverlaySink,
{
    let mut frame_count = 0u64;
    let mut overlay_count = 0u64;
    let mut total_read_time = Duration::ZERO;
    let mut total_segment_time = Duration::ZERO;
    let mut total_write_time = Duration::ZERO;

    if let Some(remaining) = source.remaining() {
        tracing::info!("Processing {} frames", remaining);
    }

    loop {
        // Read frame
        let read_start = Instant::now();
        let Some((name, image)) = source.next_frame().context("Failed to read frame")? else {
            break;
        };
        total_read_time += read_start.elapsed();

        // Segmentation
        let segment_start = Instant::now();
        let frame = rgb8_to_frame(&image);
        let overlay = engine.segment_image(frame.view());
        total_segment_time += segment_start.elapsed();

        // Output overlay
        if let Some(overlay) = overlay {
            let write_start = Instant::now();
            sink.write_overlay(&name, &overlay_to_rgb8(&overlay))
                .context("Failed to write overlay")?;
            total_write_time += write_start.elapsed();
            overlay_count += 1;
        } else {
            tracing::debug!("No overlay for {}", name);
        }

        frame_count += 1;

        // Log stats every 30 frames
        if frame_count % 30 == 0 {
            log_stats(
                frame_count,
                total_read_time,
                total_segment_time,
                total_write_time,
            );
        }
    }

    if frame_count > 0 && frame_count % 30 != 0 {
        log_stats(
            frame_count,
            total_read_time,
            total_segment_time,
            total_write_time,
        );
    }
    tracing::info!(
        "Done: {} frames, {} overlays, {} skipped",
        frame_count,
        overlay_count,
        frame_count - overlay_count
    );

    Ok(())
}

fn log_stats(frames: u64, read: Duration, segment: Duration, write: Duration) {
    let avg = |total: Duration| total.as_secs_f64() * 1000.0 / frames as f64;
    let (read_ms, segment_ms, write_ms) = (avg(read), avg(segment), avg(write));
    let total_ms = read_ms + segment_ms + write_ms;

    tracing::info!(
        "Frame {}: read={:.1}ms, segment={:.1}ms, write={:.1}ms, total={:.1}ms, fps={:.1}",
        frames,
        read_ms,
        segment_ms,
        write_ms,
        total_ms,
        if total_ms > 0.0 { 1000.0 / total_ms } else { 0.0 }
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    struct VecSource(Vec<(String, RgbImage)>);

    impl FrameSource for VecSource {
        fn next_frame(&mut self) -> Result<Option<(String, RgbImage)>> {
            Ok(if self.0.is_empty() {
                None
            } else {
                Some(self.0.remove(0))
            })
        }
    }

    #[derive(Default)]
    struct CountingSink(Vec<String>);

    impl OverlaySink for CountingSink {
        fn write_overlay(&mut self, name: &str, _overlay: &RgbImage) -> Result<()> {
            self.0.push(name.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_disabled_pipeline_reads_every_frame_and_writes_nothing() {
        let frames = (0..3)
            .map(|i| (format!("f{}", i), RgbImage::from_pixel(4, 4, Rgb([9, 9, 9]))))
            .collect();
        let mut source = VecSource(frames);
        let mut sink = CountingSink::default();
        let mut engine = OverlayEngine::new(BackendConfig::default());

        run_pipeline(&mut source, &mut sink, &mut engine).unwrap();

        assert!(source.0.is_empty());
        assert!(sink.0.is_empty());
    }
}
