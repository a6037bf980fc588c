//! Simulated scroll-and-hover session against an in-memory blob server.
//!
//! Lays out `items` media cells in a grid, scrolls through it one step per
//! frame (with an occasional long jump), requests every visible cell's blob
//! and hovers the first visible cell. Flushes, aborts and hover transitions
//! show up in the log.

use std::env;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use parking_lot::RwLock;
use tracing::{info, warn};

use mediapanel::fetch::{BatchFuture, BlobCache, BlobClient, ResolvedBlob, ResolvedUriStore};
use mediapanel::hover::{ActivePointChange, HoverSyncController};
use mediapanel::models::{HoverTarget, MediaKind, Rect};
use mediapanel::panel::{Document, PanelController, PanelRuntime};
use mediapanel::PanelConfig;

/// Interval between simulated frames.
const FRAME_MS: u64 = 16;

/// Every this many frames the user drags the scrollbar far down.
const JUMP_EVERY: usize = 12;

#[derive(Debug, Clone)]
pub struct SimArgs {
    pub items: usize,
    pub columns: usize,
    pub quiet_ms: u64,
    pub viewport: f64,
    pub row_height: f64,
    pub scroll_step: f64,
    pub latency_ms: u64,
    pub frames: usize,
}

impl Default for SimArgs {
    fn default() -> Self {
        Self {
            items: 2000,
            columns: 6,
            quiet_ms: 100,
            viewport: 900.0,
            row_height: 180.0,
            scroll_step: 120.0,
            latency_ms: 250,
            frames: 60,
        }
    }
}

pub fn parse_args() -> Result<SimArgs> {
    let mut parsed = SimArgs::default();

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        let mut value = |name: &str| {
            args.next()
                .with_context(|| format!("Missing value for {}", name))
        };
        match arg.as_str() {
            "--items" => {
                parsed.items = value("--items")?
                    .parse()
                    .context("Failed to parse --items as a positive integer")?;
            }
            "--columns" => {
                parsed.columns = value("--columns")?
                    .parse()
                    .context("Failed to parse --columns as a positive integer")?;
            }
            "--quiet-ms" => {
                parsed.quiet_ms = value("--quiet-ms")?
                    .parse()
                    .context("Failed to parse --quiet-ms as a positive integer")?;
            }
            "--viewport" => {
                parsed.viewport = value("--viewport")?
                    .parse()
                    .context("Failed to parse --viewport as a number of pixels")?;
            }
            "--row-height" => {
                parsed.row_height = value("--row-height")?
                    .parse()
                    .context("Failed to parse --row-height as a number of pixels")?;
            }
            "--scroll-step" => {
                parsed.scroll_step = value("--scroll-step")?
                    .parse()
                    .context("Failed to parse --scroll-step as a number of pixels")?;
            }
            "--latency-ms" => {
                parsed.latency_ms = value("--latency-ms")?
                    .parse()
                    .context("Failed to parse --latency-ms as a non-negative integer")?;
            }
            "--frames" => {
                parsed.frames = value("--frames")?
                    .parse()
                    .context("Failed to parse --frames as a positive integer")?;
            }
            other => bail!("Unknown argument: {}", other),
        }
    }

    if parsed.columns == 0 {
        bail!("--columns must be greater than 0");
    }
    if parsed.row_height <= 0.0 {
        bail!("--row-height must be greater than 0");
    }
    Ok(parsed)
}

/// Serves deterministic bytes for any URI after a fixed latency.
struct SimulatedServer {
    latency: Duration,
    batches: AtomicUsize,
    uris: AtomicUsize,
}

impl BlobClient for SimulatedServer {
    fn fetch_batch(&self, kind: MediaKind, uris: Vec<String>) -> BatchFuture {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.uris.fetch_add(uris.len(), Ordering::Relaxed);
        info!(endpoint = kind.batch_endpoint(), count = uris.len(), "POST batch");

        let latency = self.latency;
        Box::pin(async move {
            tokio::time::sleep(latency).await;
            let blobs: Vec<ResolvedBlob> = uris
                .into_iter()
                .map(|uri| {
                    let data = uri.as_bytes().repeat(16);
                    ResolvedBlob::new(uri, data)
                })
                .collect();
            Ok(blobs)
        })
    }
}

#[derive(Debug)]
pub struct SimReport {
    pub batches: usize,
    pub uris_fetched: usize,
    pub resolved_at_end: usize,
    pub errors: usize,
}

fn item_uri(index: usize) -> String {
    format!("run-0/images/{}", index)
}

/// Rectangle of cell `index` in viewport coordinates at scroll `offset`.
fn cell_rect(index: usize, args: &SimArgs, offset: f64) -> Rect {
    let width = args.viewport / args.columns as f64;
    let row = (index / args.columns) as f64;
    let col = (index % args.columns) as f64;
    Rect::from_origin(col * width, row * args.row_height - offset, width, args.row_height)
}

fn visible_range(args: &SimArgs, offset: f64) -> std::ops::Range<usize> {
    let first_row = (offset / args.row_height).floor() as usize;
    let last_row = ((offset + args.viewport) / args.row_height).ceil() as usize;
    let start = (first_row * args.columns).min(args.items);
    let end = (last_row * args.columns).min(args.items);
    start..end
}

pub fn run(args: SimArgs) -> Result<SimReport> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;
    runtime.block_on(simulate(args))
}

async fn simulate(args: SimArgs) -> Result<SimReport> {
    let config = PanelConfig::builder()
        .with_env()?
        .quiet_period(Duration::from_millis(args.quiet_ms))
        .viewport_height(args.viewport)
        .build()?;

    let server = Arc::new(SimulatedServer {
        latency: Duration::from_millis(args.latency_ms),
        batches: AtomicUsize::new(0),
        uris: AtomicUsize::new(0),
    });
    let cache = BlobCache::new(config.blob_cache_mb);
    let document = Document::new();
    let offset = Arc::new(RwLock::new(0.0f64));

    let geometry = {
        let offset = Arc::clone(&offset);
        let args = args.clone();
        move |key: &str| -> Option<Rect> {
            let index = key.parse::<usize>().ok()?;
            Some(cell_rect(index, &args, *offset.read()))
        }
    };
    let hover = HoverSyncController::new(geometry).with_listener(
        |change: ActivePointChange<'_>, pinned: bool| match change {
            ActivePointChange::Entered(point) => {
                info!(key = %point.key, top = point.rect.top, pinned, "Tooltip opened")
            }
            ActivePointChange::Cleared => info!(pinned, "Tooltip closed"),
        },
    );

    let panel_runtime = PanelRuntime::new();
    let panel = PanelController::mount(
        &config,
        panel_runtime.fetcher(Arc::clone(&server), config.media_kind),
        cache.clone(),
        hover,
        Arc::new(document.clone()),
        panel_runtime.document_callback(),
    );
    let handle = panel_runtime.handle();
    let task = tokio::spawn(panel_runtime.run(panel));

    let content_height = args.items.div_ceil(args.columns) as f64 * args.row_height;
    let max_offset = (content_height - args.viewport).max(0.0);
    let mut position = 0.0f64;

    for frame in 0..args.frames {
        let step = if frame > 0 && frame % JUMP_EVERY == 0 {
            args.viewport * 3.0
        } else {
            args.scroll_step
        };
        position = (position + step).min(max_offset);

        *offset.write() = position;
        handle.scroll(position);

        let visible = visible_range(&args, position);
        for index in visible.clone() {
            if !cache.has_id(&item_uri(index)) {
                handle.request(item_uri(index));
            }
        }

        if let Some(first) = visible.clone().next() {
            let target = HoverTarget::new(
                first.to_string(),
                "run-0/images",
                cell_rect(first, &args, position),
            );
            handle.mouse_over(Some(target));
        }
        if frame % 7 == 3 {
            // Pointer wanders off to the page header.
            document.dispatch_mouse_over();
        }

        tokio::time::sleep(Duration::from_millis(FRAME_MS)).await;
    }

    // Let the last batch land.
    tokio::time::sleep(Duration::from_millis(args.quiet_ms * 2 + args.latency_ms)).await;

    let mut errors = 0;
    while let Ok(e) = handle.errors().try_recv() {
        warn!(error = %e, "Batch failed");
        errors += 1;
    }
    let resolved_at_end = cache.len();

    handle.unmount();
    task.await.context("Panel loop panicked")?;

    Ok(SimReport {
        batches: server.batches.load(Ordering::Relaxed),
        uris_fetched: server.uris.load(Ordering::Relaxed),
        resolved_at_end,
        errors,
    })
}
