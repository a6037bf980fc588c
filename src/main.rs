mod sim;

use anyhow::Result;
use tracing::info;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mediapanel=info".parse()?),
        )
        .init();

    let args = sim::parse_args()?;
    info!(
        items = args.items,
        frames = args.frames,
        quiet_ms = args.quiet_ms,
        latency_ms = args.latency_ms,
        "Starting simulated panel session"
    );

    let report = sim::run(args)?;
    info!(
        batches = report.batches,
        uris_fetched = report.uris_fetched,
        resolved = report.resolved_at_end,
        errors = report.errors,
        "Session finished"
    );
    println!(
        "batches={} uris_fetched={} resolved={} errors={}",
        report.batches, report.uris_fetched, report.resolved_at_end, report.errors
    );
    Ok(())
}
