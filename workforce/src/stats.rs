use std::fmt;

/// Per-worker counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    /// Replies received, late ones included.
    pub packets: u64,
    /// Replies for chunks already completed, abandoned or from a past epoch.
    pub late: u64,
    pub timeouts: u64,
    /// Sum of the iteration totals of accepted replies.
    pub iterations: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerStats {
    pub name: String,
    pub enabled: bool,
    /// Process id reported through an identity response.
    pub pid: Option<u16>,
    pub counters: Counters,
}

/// A snapshot of every worker's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    pub workers: Vec<WorkerStats>,
}

impl Stats {
    /// Workers that computed at least one accepted chunk.
    pub fn active(&self) -> usize {
        self.workers
            .iter()
            .filter(|w| w.counters.iterations > 0)
            .count()
    }

    pub fn total_iterations(&self) -> u64 {
        self.workers.iter().map(|w| w.counters.iterations).sum()
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<22} {:>10} {:>10} {:>10} {:>10}",
            "Host", "iterations", "packets", "timeouts", "late"
        )?;

        for worker in &self.workers {
            let Counters {
                packets,
                late,
                timeouts,
                iterations,
            } = worker.counters;

            let mut name = worker.name.clone();
            if !worker.enabled {
                name.push_str(" (off)");
            }

            writeln!(
                f,
                "{name:<22} {iterations:>10} {packets:>10} {timeouts:>10} {late:>10}"
            )?;
        }

        write!(
            f,
            "{} servers, {} active, {} iterations total",
            self.workers.len(),
            self.active(),
            self.total_iterations()
        )
    }
}
