//! Race command implementation

use std::{
    collections::HashSet,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use clap::ValueEnum;
use contend::{Runner, RunnerBuilder, Work};
use serde::Serialize;

use crate::commands::print_json;

/// How long the `cancel` scenario lets its workers run before interrupting them.
const CANCEL_AFTER: Duration = Duration::from_millis(20);

/// How long each `cancel` worker would block if left alone.
const CANCEL_WORK: Duration = Duration::from_millis(1000);

#[derive(Clone, Copy, Debug, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    /// Racy read-modify-write append to a shared string
    Append,
    /// Racy load-then-store increment of a shared counter
    Increment,
    /// Producers reporting a racy post-increment; counts distinct values
    Distinct,
    /// Every second ticket fails; faults stay isolated
    Faults,
    /// Long-running workers interrupted shortly after the release
    Cancel,
}

#[derive(Serialize)]
struct RaceSummary {
    scenario: Scenario,
    workers: usize,
    expected: usize,
    observed: usize,
    lost_updates: usize,
    values: usize,
    faults: usize,
    elapsed_ms: u64,
}

impl RaceSummary {
    /// Summarizes a finished run in which every worker was expected to leave
    /// one update behind.
    fn collect<T>(
        scenario: Scenario,
        runner: &Runner<T>,
        observed: usize,
        started: Instant,
    ) -> Self {
        let expected = runner.concurrency();
        RaceSummary {
            scenario,
            workers: runner.concurrency(),
            expected,
            observed,
            lost_updates: expected.saturating_sub(observed),
            values: runner.result_values().len(),
            faults: runner.result_faults().len(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }
}

pub fn run(scenario: Scenario, workers: usize, stack_size: Option<usize>) -> Result<()> {
    let mut builder = RunnerBuilder::new(workers).thread_name_prefix("race");
    if let Some(stack_size) = stack_size {
        builder = builder.stack_size(stack_size);
    }

    let summary = match scenario {
        Scenario::Append => append(builder)?,
        Scenario::Increment => increment(builder)?,
        Scenario::Distinct => distinct(builder)?,
        Scenario::Faults => faults(builder)?,
        Scenario::Cancel => cancel(builder)?,
    };
    print_json(&summary)
}

fn launch<T: Send + 'static>(builder: RunnerBuilder, work: Work<T>) -> Result<Runner<T>> {
    let runner = builder.build(work).context("Failed to launch workers")?;
    if !runner.await_readiness() {
        anyhow::bail!("Runner was interrupted before all workers were ready");
    }
    log::info!("{} workers ready", runner.concurrency());
    Ok(runner)
}

fn append(builder: RunnerBuilder) -> Result<RaceSummary> {
    let text = Arc::new(Mutex::new(String::new()));
    let runner = {
        let text = text.clone();
        launch(
            builder,
            Work::action(move || {
                let snapshot = text.lock().map_err(|_| "text lock poisoned")?.clone();
                thread::sleep(Duration::from_micros(fastrand::u64(0..100)));
                *text.lock().map_err(|_| "text lock poisoned")? = snapshot + "x";
                Ok(())
            }),
        )?
    };

    let started = Instant::now();
    runner.start()?;
    runner.results();
    let observed = text.lock().map(|text| text.len()).unwrap_or_default();
    Ok(RaceSummary::collect(Scenario::Append, &runner, observed, started))
}

fn increment(builder: RunnerBuilder) -> Result<RaceSummary> {
    let counter = Arc::new(AtomicUsize::new(0));
    let runner = {
        let counter = counter.clone();
        launch(
            builder,
            Work::action(move || {
                let current = counter.load(Ordering::SeqCst);
                thread::yield_now();
                counter.store(current + 1, Ordering::SeqCst);
                Ok(())
            }),
        )?
    };

    let started = Instant::now();
    runner.start()?;
    runner.results();
    let observed = counter.load(Ordering::SeqCst);
    Ok(RaceSummary::collect(Scenario::Increment, &runner, observed, started))
}

fn distinct(builder: RunnerBuilder) -> Result<RaceSummary> {
    let counter = Arc::new(AtomicUsize::new(0));
    let runner = {
        let counter = counter.clone();
        launch(
            builder,
            Work::producer(move || {
                let current = counter.load(Ordering::SeqCst);
                thread::yield_now();
                counter.fetch_max(current + 1, Ordering::SeqCst);
                Ok(current + 1)
            }),
        )?
    };

    let started = Instant::now();
    runner.start()?;
    let distinct: HashSet<usize> = runner.result_values().into_iter().copied().collect();
    let last = counter.load(Ordering::SeqCst);
    if distinct.len() != last {
        log::warn!("{} distinct values, counter ended at {last}", distinct.len());
    }
    Ok(RaceSummary::collect(Scenario::Distinct, &runner, distinct.len(), started))
}

fn faults(builder: RunnerBuilder) -> Result<RaceSummary> {
    let tickets = Arc::new(AtomicUsize::new(0));
    let runner = {
        let tickets = tickets.clone();
        launch(
            builder,
            Work::producer(move || {
                let ticket = tickets.fetch_add(1, Ordering::SeqCst) + 1;
                if ticket % 2 == 0 {
                    Err(format!("rejected ticket {ticket}").into())
                } else {
                    Ok(ticket)
                }
            }),
        )?
    };

    let started = Instant::now();
    runner.start()?;
    runner.results();
    let observed = tickets.load(Ordering::SeqCst);
    Ok(RaceSummary::collect(Scenario::Faults, &runner, observed, started))
}

fn cancel(builder: RunnerBuilder) -> Result<RaceSummary> {
    let runner = launch(
        builder,
        Work::action(|| {
            thread::sleep(CANCEL_WORK);
            Ok(())
        }),
    )?;

    let started = Instant::now();
    runner.start()?;
    thread::sleep(CANCEL_AFTER);
    runner.interrupt();
    runner.results();
    let finished = runner.finished_count();
    Ok(RaceSummary::collect(Scenario::Cancel, &runner, finished, started))
}
