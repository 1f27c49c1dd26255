use log::info;
use std::fs;
use std::time::{Duration, Instant};

/// Elapsed wall time at the end of each pipeline stage.
#[derive(Debug)]
pub struct StageTimer {
    start: Instant,
    stages: Vec<(String, Duration)>,
}

impl Default for StageTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl StageTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            stages: Vec::new(),
        }
    }

    /// Record that `stage` has finished.
    pub fn mark(&mut self, stage: &str) -> Duration {
        let elapsed = self.start.elapsed();
        info!("{} done, elapsed so far: {:.2}s", stage, elapsed.as_secs_f64());
        self.stages.push((stage.to_string(), elapsed));
        elapsed
    }

    pub fn stages(&self) -> &[(String, Duration)] {
        &self.stages
    }

    /// One line per stage.
    pub fn report(&self) -> String {
        self.stages
            .iter()
            .map(|(stage, elapsed)| format!("{}: {:.2}s\n", stage, elapsed.as_secs_f64()))
            .collect()
    }

    pub fn write_log(&self, path: &str) -> std::io::Result<()> {
        info!("Writing timing log: {}", path);
        fs::write(path, self.report())
    }
}
