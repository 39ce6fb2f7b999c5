//! Run orchestration: start every unit on its own OS thread and wait for
//! all of them.
//!
//! All threads are scoped to [`Reactor::run`], so the shared state and log
//! outlive every unit without reference counting, and are dropped in
//! reverse order of creation when the reactor goes away.

use std::io;
use std::thread;

use serde::Serialize;

use crate::error::{ReactorError, Result};
use crate::log::EventLog;
use crate::params::RunParams;
use crate::state::{Counters, SharedState};
use crate::unit::{Kind, Unit, UnitOutcome};

/// Final result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Molecules completed.
    pub molecules: u32,
    /// Oxygen units that took part in a molecule.
    pub oxygen_consumed: u32,
    /// Hydrogen units that took part in a molecule.
    pub hydrogen_consumed: u32,
    /// Oxygen units that left on shutdown.
    pub rejected_oxygen: u32,
    /// Hydrogen units that left on shutdown.
    pub rejected_hydrogen: u32,
}

/// Owns everything one run needs and executes it.
#[derive(Debug)]
pub struct Reactor {
    shared: SharedState,
    log: EventLog,
    seed: Option<u64>,
    /// Simulated thread limit, for exercising the spawn failure path.
    #[cfg(test)]
    spawn_limit: Option<usize>,
}

impl Reactor {
    /// Prepare a run. Shutdown is pre-set here if the supply cannot form a
    /// single molecule.
    pub fn new(params: RunParams, log: EventLog) -> Self {
        Self {
            shared: SharedState::new(params),
            log,
            seed: None,
            #[cfg(test)]
            spawn_limit: None,
        }
    }

    /// Make every random delay reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Parameters of this run.
    pub fn params(&self) -> &RunParams {
        self.shared.params()
    }

    /// The event log.
    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Current counters.
    pub fn counters(&self) -> Counters {
        self.shared.snapshot()
    }

    /// Start all oxygen then all hydrogen units, wait for them to finish,
    /// and summarize.
    ///
    /// If a thread cannot be started, shutdown is forced so every unit that
    /// did start drains out through the rejection path; they are joined
    /// before the spawn error is returned.
    pub fn run(&self) -> Result<RunSummary> {
        let params = *self.shared.params();
        tracing::info!(
            oxygen = params.oxygen,
            hydrogen = params.hydrogen,
            ti = params.max_startup_delay_ms,
            tb = params.max_creation_delay_ms,
            "Starting run"
        );

        let units = (1..=params.oxygen)
            .map(|id| (Kind::Oxygen, id))
            .chain((1..=params.hydrogen).map(|id| (Kind::Hydrogen, id)));

        let (outcomes, spawn_error, panicked) = thread::scope(|s| {
            let mut handles = Vec::new();
            let mut spawn_error = None;

            for (started, (kind, id)) in units.enumerate() {
                let unit = Unit::new(kind, id, &self.shared, &self.log, self.seed);
                match self.spawn_unit(s, started, unit) {
                    Ok(handle) => handles.push((kind, handle)),
                    Err(source) => {
                        tracing::error!("Failed to spawn {} unit {}: {}", kind, id, source);
                        self.shared.force_shutdown();
                        spawn_error = Some(ReactorError::Spawn { kind, id, source });
                        break;
                    }
                }
            }

            let mut outcomes = Vec::with_capacity(handles.len());
            let mut panicked = 0;
            for (kind, handle) in handles {
                match handle.join() {
                    Ok(outcome) => outcomes.push((kind, outcome)),
                    Err(_) => panicked += 1,
                }
            }
            (outcomes, spawn_error, panicked)
        });

        if let Some(err) = spawn_error {
            return Err(err);
        }
        if panicked > 0 {
            return Err(ReactorError::UnitPanicked { count: panicked });
        }
        if let Some(err) = self.log.take_error() {
            return Err(ReactorError::Log(err));
        }

        let counters = self.shared.snapshot();
        let rejected = |kind: Kind| {
            let n = outcomes
                .iter()
                .filter(|(k, o)| *k == kind && *o == UnitOutcome::Rejected)
                .count();
            u32::try_from(n).unwrap_or(u32::MAX)
        };
        let summary = RunSummary {
            molecules: counters.molecules_formed,
            oxygen_consumed: counters.oxygen_consumed,
            hydrogen_consumed: counters.hydrogen_consumed,
            rejected_oxygen: rejected(Kind::Oxygen),
            rejected_hydrogen: rejected(Kind::Hydrogen),
        };

        tracing::info!(
            molecules = summary.molecules,
            rejected_oxygen = summary.rejected_oxygen,
            rejected_hydrogen = summary.rejected_hydrogen,
            "Run complete"
        );
        Ok(summary)
    }

    fn spawn_unit<'scope, 'env>(
        &'env self,
        scope: &'scope thread::Scope<'scope, 'env>,
        started: usize,
        unit: Unit<'env>,
    ) -> io::Result<thread::ScopedJoinHandle<'scope, UnitOutcome>> {
        self.check_spawn_limit(started)?;

        thread::Builder::new()
            .name(format!("{} {}", unit.kind().symbol(), unit.id()))
            .spawn_scoped(scope, move || unit.run())
    }

    #[cfg(test)]
    fn check_spawn_limit(&self, started: usize) -> io::Result<()> {
        match self.spawn_limit {
            Some(limit) if started >= limit => Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                "thread limit reached",
            )),
            _ => Ok(()),
        }
    }

    #[cfg(not(test))]
    fn check_spawn_limit(&self, _started: usize) -> io::Result<()> {
        Ok(())
    }
}
