//! Named stopwatches scoped to a single loop run.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};

/// Registry mapping identifiers (`"total"`, `"iteration-3"`, ...) to running
/// stopwatches. Stopping or clearing a stopwatch removes it.
#[derive(Debug, Default)]
pub struct Timer {
    watches: HashMap<String, Instant>,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) the stopwatch named `id`.
    pub fn start(&mut self, id: &str) {
        self.watches.insert(id.to_string(), Instant::now());
    }

    /// Stop the stopwatch named `id` and return the time since it started.
    pub fn stop(&mut self, id: &str) -> Result<Duration> {
        let started = self
            .watches
            .remove(id)
            .ok_or_else(|| anyhow!("timer '{id}' not found"))?;
        Ok(started.elapsed())
    }

    /// Forget the stopwatch named `id` without reading it.
    pub fn clear(&mut self, id: &str) {
        self.watches.remove(id);
    }

    #[cfg(test)]
    pub(crate) fn is_running(&self, id: &str) -> bool {
        self.watches.contains_key(id)
    }
}

/// Human-readable duration: `850ms`, `12s`, or `3m 5s`.
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        return format!("{millis}ms");
    }
    let seconds = duration.as_secs();
    let minutes = seconds / 60;
    if minutes > 0 {
        return format!("{minutes}m {}s", seconds % 60);
    }
    format!("{seconds}s")
}
