//! Error types for h2o-core.
//!
//! Running out of supply is not an error: units that observe shutdown end
//! with [`UnitOutcome::Rejected`](crate::UnitOutcome::Rejected) and the run
//! still succeeds. Everything here aborts the whole run.

use crate::unit::Kind;

/// Invalid run parameters. Reported before any unit starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParamsError {
    /// At least one oxygen unit is required.
    #[error("oxygen unit count must be at least 1")]
    NoOxygen,

    /// At least one hydrogen unit is required.
    #[error("hydrogen unit count must be at least 1")]
    NoHydrogen,

    /// Startup delay bound out of range.
    #[error("max startup delay {0}ms is out of range (0..={max}ms)", max = crate::params::MAX_DELAY_MS)]
    StartupDelayOutOfRange(u32),

    /// Creation delay bound out of range.
    #[error("max creation delay {0}ms is out of range (0..={max}ms)", max = crate::params::MAX_DELAY_MS)]
    CreationDelayOutOfRange(u32),
}

/// Fatal errors while running the reactor.
#[derive(Debug, thiserror::Error)]
pub enum ReactorError {
    /// The operating system refused to start a unit thread.
    ///
    /// Units started before the failure have been drained through shutdown
    /// and joined by the time this is returned.
    #[error("failed to spawn {kind} unit {id}: {source}")]
    Spawn {
        /// Kind of the unit that could not be started.
        kind: Kind,
        /// Its 1-based sequence number.
        id: u32,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// One or more unit threads panicked.
    #[error("{count} unit thread(s) panicked")]
    UnitPanicked {
        /// Number of panicked threads.
        count: usize,
    },

    /// The event log sink failed.
    #[error("event log write failed: {0}")]
    Log(#[source] std::io::Error),
}

/// Result type alias for reactor operations.
pub type Result<T> = std::result::Result<T, ReactorError>;
