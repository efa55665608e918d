//! Runtime statistics for the daily report.
//!
//! Received updates are counted per update type and job runs are timed per
//! job name. Only the last 24 hours matter; older entries are pruned whenever
//! a report is built.

use crate::utils::{unix_hours_ago, unix_now};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

/// Something placed in time, compared against the 24 hour window by its last instant.
pub trait Dated {
    fn last_instant(&self) -> f64;
}

impl Dated for f64 {
    fn last_instant(&self) -> f64 {
        *self
    }
}

/// A time span, started on creation and closed with [`finish`](Self::finish).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DateSegment {
    start: f64,
    end: Option<f64>,
}

impl DateSegment {
    /// Starts a segment now.
    pub fn start() -> Self {
        Self::starting_at(unix_now())
    }

    pub fn starting_at(start: f64) -> Self {
        Self { start, end: None }
    }

    /// Closes the segment now.
    pub fn finish(&mut self) {
        self.finish_at(unix_now());
    }

    pub fn finish_at(&mut self, end: f64) {
        self.end = Some(end);
    }

    /// Seconds between start and finish. An open segment has no duration.
    pub fn duration(&self) -> f64 {
        self.end.map_or(0.0, |end| end - self.start)
    }
}

impl Dated for DateSegment {
    fn last_instant(&self) -> f64 {
        self.end.unwrap_or(self.start)
    }
}

/// A chronological list of points or segments.
#[derive(Debug, Clone, PartialEq)]
pub struct DateCache<T> {
    items: Vec<T>,
}

impl<T> Default for DateCache<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Dated> DateCache<T> {
    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Index of the first item inside the last 24 hours.
    fn day_threshold(&self) -> usize {
        let day_before = unix_hours_ago(24);
        self.items
            .iter()
            .position(|item| item.last_instant() >= day_before)
            .unwrap_or(self.items.len())
    }

    /// Items from the last 24 hours.
    pub fn day(&self) -> &[T] {
        &self.items[self.day_threshold()..]
    }

    pub fn day_count(&self) -> usize {
        self.day().len()
    }

    /// Drops everything older than 24 hours.
    pub fn clear_before_last_day(&mut self) {
        let threshold = self.day_threshold();
        self.items.drain(..threshold);
    }
}

impl DateCache<f64> {
    /// Records the current time.
    pub fn add_now(&mut self) {
        self.push(unix_now());
    }
}

impl DateCache<DateSegment> {
    /// Total seconds of the segments from the last 24 hours.
    pub fn day_duration(&self) -> f64 {
        self.day().iter().map(DateSegment::duration).sum()
    }
}

/// Counters behind the daily stats report.
#[derive(Debug, Clone, Default)]
pub struct StatsCache {
    updates: BTreeMap<String, DateCache<f64>>,
    jobs: BTreeMap<String, DateCache<DateSegment>>,
}

impl StatsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one received update of `update_type`.
    pub fn record_update(&mut self, update_type: &str) {
        self.updates
            .entry(update_type.to_string())
            .or_default()
            .add_now();
    }

    /// Stores one finished run of `job`.
    pub fn record_job(&mut self, job: &str, segment: DateSegment) {
        self.jobs.entry(job.to_string()).or_default().push(segment);
    }

    pub fn update_count(&self, update_type: &str) -> usize {
        self.updates
            .get(update_type)
            .map_or(0, DateCache::day_count)
    }

    pub fn job_duration(&self, job: &str) -> f64 {
        self.jobs.get(job).map_or(0.0, DateCache::day_duration)
    }

    /// Lines like `received 3 'message' updates`, pruning old entries.
    pub fn update_reports(&mut self) -> Vec<String> {
        self.updates
            .iter_mut()
            .map(|(update_type, dates)| {
                dates.clear_before_last_day();
                format!("received {} '{}' updates", dates.day_count(), update_type)
            })
            .collect()
    }

    /// Lines like `report_stats took 0.015 seconds total`, pruning old entries.
    pub fn job_reports(&mut self) -> Vec<String> {
        self.jobs
            .iter_mut()
            .map(|(job, segments)| {
                segments.clear_before_last_day();
                format!("{} took {:.3} seconds total", job, segments.day_duration())
            })
            .collect()
    }
}

/// Runs `job`, logs how long it took and records the run in `stats` under `name`.
pub async fn timed<F, T>(stats: &Arc<Mutex<StatsCache>>, name: &str, job: F) -> T
where
    F: Future<Output = T>,
{
    let mut segment = DateSegment::start();
    let output = job.await;
    segment.finish();
    tracing::info!(job = name, seconds = format!("{:.3}", segment.duration()), "Job executed");

    stats
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .record_job(name, segment);
    output
}
