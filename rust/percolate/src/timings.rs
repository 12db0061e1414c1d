//! Wall clock checkpoints for the stages of a run.
//!
//! Checkpoints are only recorded, they never change what the run does.

use serde::Serialize;
use std::time::{
    Duration,
    Instant,
};
use tracing::info;

/// Accumulated time per stage, in the order the stages were first seen.
#[derive(Debug, Default)]
pub struct Timings {
    stages: Vec<(&'static str, Duration)>,
    log: bool,
}

impl Timings {
    /// `log` emits every checkpoint as an INFO event when set.
    pub fn new(log: bool) -> Self {
        Self {
            stages: Vec::new(),
            log,
        }
    }

    pub fn record(&mut self, stage: &'static str, elapsed: Duration) {
        if self.log {
            info!("{} took {:.3}s", stage, elapsed.as_secs_f64());
        }
        match self.stages.iter_mut().find(|(name, _)| *name == stage) {
            Some((_, total)) => *total += elapsed,
            None => self.stages.push((stage, elapsed)),
        }
    }

    /// Runs `f` and records its duration under `stage`.
    pub fn time<T>(&mut self, stage: &'static str, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        self.record(stage, start.elapsed());
        out
    }

    pub fn get(&self, stage: &str) -> Option<Duration> {
        self.stages
            .iter()
            .find(|(name, _)| *name == stage)
            .map(|(_, d)| *d)
    }
}

impl Serialize for Timings {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut state = serializer.serialize_map(Some(self.stages.len()))?;
        for (name, elapsed) in &self.stages {
            state.serialize_entry(&format!("{}_ms", name), &elapsed.as_millis())?;
        }
        state.end()
    }
}
