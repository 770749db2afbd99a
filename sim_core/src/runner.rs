//! Running many independent iterations, in parallel or sequentially
//!
//! Each worker builds its own [`Simulation`] through the setup function, so
//! no mutable state is shared between threads; per-chunk aggregates are
//! combined with [`AggregateMetrics::merge`] in a reduce tree.

use crate::config::SimConfig;
use crate::error::SimResult;
use crate::metrics::AggregateMetrics;
use crate::sim::Simulation;
use rayon::prelude::*;
use std::ops::Range;
use tracing::{debug, info};

/// Smallest number of iterations a worker runs on one simulation
const MIN_CHUNK: u64 = 16;

/// Run `config.iterations` iterations across the rayon thread pool.
///
/// `setup` registers actors and content on a fresh simulation; it is called
/// once per chunk of iterations. Iteration `i` is seeded with `seed + i`
/// whichever worker runs it. The first failing iteration aborts the batch.
pub fn run_batch<F>(config: &SimConfig, setup: F) -> SimResult<AggregateMetrics>
where
    F: Fn(&SimConfig) -> SimResult<Simulation> + Sync,
{
    config.validate()?;
    let total = config.iterations;
    let workers = rayon::current_num_threads().max(1) as u64;
    let chunk = total.div_ceil(workers * 4).max(MIN_CHUNK);
    let ranges: Vec<Range<u64>> = (0..total)
        .step_by(chunk as usize)
        .map(|start| start..(start + chunk).min(total))
        .collect();
    info!(iterations = total, chunks = ranges.len(), workers, "running batch");

    ranges
        .into_par_iter()
        .map(|range| run_range(config, &setup, range))
        .try_reduce(AggregateMetrics::new, |a, b| Ok(a.merge(b)))
}

/// Run every iteration on the calling thread with a single simulation
pub fn run_sequential<F>(config: &SimConfig, setup: F) -> SimResult<AggregateMetrics>
where
    F: Fn(&SimConfig) -> SimResult<Simulation>,
{
    config.validate()?;
    run_range(config, &setup, 0..config.iterations)
}

fn run_range<F>(config: &SimConfig, setup: &F, range: Range<u64>) -> SimResult<AggregateMetrics>
where
    F: Fn(&SimConfig) -> SimResult<Simulation>,
{
    debug!(start = range.start, end = range.end, "running chunk");
    let mut sim = setup(config)?;
    let mut aggregate = AggregateMetrics::new();
    for iteration in range {
        let metrics = sim.run_iteration(iteration)?;
        aggregate.record(&metrics);
    }
    Ok(aggregate)
}
