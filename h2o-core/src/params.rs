//! Run parameters shared read-only by every unit.

use std::time::Duration;

use crate::error::ParamsError;

/// Upper bound for both delay parameters, in milliseconds.
pub const MAX_DELAY_MS: u32 = 1000;

/// Immutable parameters of one run.
///
/// Use [`RunParams::new`] to get the validated form. The fields are public
/// so callers that deliberately need degenerate supplies (zero units of one
/// kind) can still build a reactor for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunParams {
    /// Number of oxygen units (`NO`).
    pub oxygen: u32,
    /// Number of hydrogen units (`NH`).
    pub hydrogen: u32,
    /// Maximum delay before a unit queues up, in milliseconds (`TI`).
    pub max_startup_delay_ms: u32,
    /// Maximum time an oxygen unit spends combining a molecule, in
    /// milliseconds (`TB`).
    pub max_creation_delay_ms: u32,
}

impl RunParams {
    /// Validate and build run parameters.
    pub fn new(
        oxygen: u32,
        hydrogen: u32,
        max_startup_delay_ms: u32,
        max_creation_delay_ms: u32,
    ) -> Result<Self, ParamsError> {
        let params = Self {
            oxygen,
            hydrogen,
            max_startup_delay_ms,
            max_creation_delay_ms,
        };
        params.validate()?;
        Ok(params)
    }

    /// Check the bounds a launcher must enforce before starting a run.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.oxygen == 0 {
            return Err(ParamsError::NoOxygen);
        }
        if self.hydrogen == 0 {
            return Err(ParamsError::NoHydrogen);
        }
        if self.max_startup_delay_ms > MAX_DELAY_MS {
            return Err(ParamsError::StartupDelayOutOfRange(
                self.max_startup_delay_ms,
            ));
        }
        if self.max_creation_delay_ms > MAX_DELAY_MS {
            return Err(ParamsError::CreationDelayOutOfRange(
                self.max_creation_delay_ms,
            ));
        }
        Ok(())
    }

    /// Upper bound of the startup delay.
    pub fn max_startup_delay(&self) -> Duration {
        Duration::from_millis(u64::from(self.max_startup_delay_ms))
    }

    /// Upper bound of the creation delay.
    pub fn max_creation_delay(&self) -> Duration {
        Duration::from_millis(u64::from(self.max_creation_delay_ms))
    }

    /// True when not even one molecule can be formed.
    pub fn supply_exhausted_at_start(&self) -> bool {
        self.oxygen == 0 || self.hydrogen < 2
    }

    /// Number of molecules a complete run produces: `min(NO, NH / 2)`.
    pub fn expected_molecules(&self) -> u32 {
        self.oxygen.min(self.hydrogen / 2)
    }

    /// Total number of units the run starts.
    pub fn total_units(&self) -> u64 {
        u64::from(self.oxygen) + u64::from(self.hydrogen)
    }
}
