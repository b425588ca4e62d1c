//! Skew command implementation

use std::time::Instant;

use anyhow::{Context, Result};
use contend::{Runner, Work};
use serde::Serialize;

use crate::commands::print_json;

#[derive(Serialize)]
struct SkewSummary {
    workers: usize,
    started: usize,
    first_start_us: u64,
    last_start_us: u64,
    spread_us: u64,
    median_start_us: u64,
    elapsed_ms: u64,
}

pub fn run(workers: usize) -> Result<()> {
    let runner = Runner::builder(workers)
        .thread_name_prefix("skew")
        .build(Work::producer(|| Ok(Instant::now())))
        .context("Failed to launch workers")?;
    if !runner.await_readiness() {
        anyhow::bail!("Runner was interrupted before all workers were ready");
    }

    let released = Instant::now();
    runner.start()?;
    let mut offsets: Vec<u64> = runner
        .result_values()
        .into_iter()
        .map(|instant| instant.saturating_duration_since(released).as_micros() as u64)
        .collect();
    offsets.sort_unstable();
    log::debug!("collected {} start instants", offsets.len());

    let (Some(&first), Some(&last)) = (offsets.first(), offsets.last()) else {
        anyhow::bail!("No worker started");
    };
    print_json(&SkewSummary {
        workers,
        started: offsets.len(),
        first_start_us: first,
        last_start_us: last,
        spread_us: last - first,
        median_start_us: offsets[offsets.len() / 2],
        elapsed_ms: released.elapsed().as_millis() as u64,
    })
}
