//! frame-driver — drives a work queue with a synthetic frame loop.
//!
//! Every frame:
//! - calls the begin-frame hook (fallback drain + purge)
//! - submits a batch of high-priority "skinning" items split into ranges
//! - submits a few low-priority "decode" items that announce completion
//! - blocks on the skinning priority before "rendering"
//!
//! Prints the queue metrics as JSON when done.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use framequeue::{WorkContext, WorkItemCompleted, WorkQueue, WorkQueueConfig, Priority};

const SKINNING_PRIORITY: Priority = 100;
const DECODE_PRIORITY: Priority = 0;

// ── CLI ─────────────────────────────────────────────────────────────

/// Synthetic frame loop over the framequeue scheduler.
#[derive(Parser, Debug)]
#[command(name = "frame-driver", version, about)]
struct Cli {
    /// Path to a work queue TOML config file.
    #[arg(long, env = "FRAMEQUEUE_CONFIG")]
    config: Option<String>,

    /// Override the worker thread count (0 = single-threaded fallback).
    #[arg(long)]
    workers: Option<usize>,

    /// Number of frames to simulate.
    #[arg(long, default_value_t = 120)]
    frames: u64,

    /// Target frame rate.
    #[arg(long, default_value_t = 60)]
    fps: u32,

    /// Skinning ranges submitted per frame.
    #[arg(long, default_value_t = 16)]
    batches: usize,

    /// Vertices per skinning range.
    #[arg(long, default_value_t = 20_000)]
    vertices: u64,

    /// Background decode items submitted per frame.
    #[arg(long, default_value_t = 2)]
    decodes: usize,
}

fn load_config(cli: &Cli) -> WorkQueueConfig {
    let mut config = match &cli.config {
        Some(path) => match WorkQueueConfig::from_file(path) {
            Ok(cfg) => {
                info!(path = %path, "loaded work queue config");
                cfg
            }
            Err(e) => {
                warn!(error = %e, path = %path, "failed to load config, using environment");
                WorkQueueConfig::from_env()
            }
        },
        None => WorkQueueConfig::from_env(),
    };

    if let Some(workers) = cli.workers {
        config.threads_enabled = workers > 0;
        config.worker_threads = workers;
    }
    config
}

/// Stand-in for per-vertex skinning: a cheap arithmetic fold over a range.
fn skin_range(start: u64, end: u64) -> u64 {
    (start..end).fold(0u64, |acc, v| acc.wrapping_add(v.wrapping_mul(2_654_435_761) >> 7))
}

fn submit_skinning(queue: &WorkQueue, batches: usize, vertices: u64, checksum: &Arc<AtomicU64>) -> anyhow::Result<()> {
    for batch in 0..batches as u64 {
        let item = queue.get_free_item();
        let checksum = Arc::clone(checksum);
        item.set_priority(SKINNING_PRIORITY);
        item.set_context(WorkContext {
            start: Some(Arc::new(batch * vertices)),
            end: Some(Arc::new((batch + 1) * vertices)),
            aux: None,
        });
        item.set_entry_point(move |item, _thread| {
            let ctx = item.context();
            if let (Some(start), Some(end)) = (ctx.start_as::<u64>(), ctx.end_as::<u64>()) {
                checksum.fetch_add(skin_range(*start, *end), Ordering::Relaxed);
            }
        });
        queue.add_work_item(&item)?;
    }
    Ok(())
}

fn submit_decodes(queue: &WorkQueue, count: usize, frame: u64) -> anyhow::Result<()> {
    for n in 0..count {
        let item = queue.get_free_item();
        item.set_priority(DECODE_PRIORITY);
        item.set_send_event(true);
        item.set_context(WorkContext {
            aux: Some(Arc::new(format!("frame{frame}-asset{n}"))),
            ..WorkContext::default()
        });
        item.set_entry_point(|_, _| thread::sleep(Duration::from_micros(500)));
        queue.add_work_item(&item)?;
    }
    Ok(())
}

// ── main ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    framequeue_core::load_dotenv();
    let cli = Cli::parse();
    let config = load_config(&cli);
    config.validate().context("invalid work queue config")?;
    config.log_summary();

    let queue = WorkQueue::start(&config).context("failed to start work queue")?;

    let decoded = Arc::new(AtomicU64::new(0));
    let decoded_in = Arc::clone(&decoded);
    queue.set_completion_listener(Arc::new(move |event: &WorkItemCompleted| {
        let asset = event.item.context().aux_as::<String>();
        tracing::debug!(item = %event.item.id(), asset = ?asset.as_deref(), "decode finished");
        decoded_in.fetch_add(1, Ordering::Relaxed);
    }));

    let checksum = Arc::new(AtomicU64::new(0));
    let frame_time = Duration::from_secs_f64(1.0 / f64::from(cli.fps.max(1)));
    let mut over_budget = 0u64;
    let started = Instant::now();

    info!(frames = cli.frames, workers = queue.num_workers(), "frame-driver starting");

    for frame in 0..cli.frames {
        let frame_start = Instant::now();
        queue.begin_frame();

        submit_skinning(&queue, cli.batches, cli.vertices, &checksum)?;
        submit_decodes(&queue, cli.decodes, frame)?;

        // Skinning must be done before this frame renders.
        queue.complete(SKINNING_PRIORITY);

        let elapsed = frame_start.elapsed();
        if elapsed > frame_time {
            over_budget += 1;
        } else {
            thread::sleep(frame_time - elapsed);
        }
    }

    // Flush background work before shutting down.
    queue.complete(DECODE_PRIORITY);

    info!(
        frames = cli.frames,
        over_budget,
        decoded = decoded.load(Ordering::Relaxed),
        checksum = checksum.load(Ordering::Relaxed),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "frame-driver finished"
    );

    println!("{}", serde_json::to_string_pretty(&queue.metrics())?);
    Ok(())
}
