//! Lifecycle of a single oxygen or hydrogen unit.
//!
//! ```text
//! Started ─► Queued ─┬─► Rejected                        (shutdown seen)
//!                    └─► Paired ─► Creating ─► AtBarrier ─► Done
//!                                  (oxygen only)
//! ```
//!
//! Each unit runs on its own thread and drives the machine with
//! [`Unit::step`] until it reaches a terminal state, which becomes the
//! unit's [`UnitOutcome`].

use std::fmt;
use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::log::{Event, EventLog};
use crate::state::{SharedState, Wake};

/// Kind of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// One per molecule; drives creation timing and the supply check.
    Oxygen,
    /// Two per molecule.
    Hydrogen,
}

impl Kind {
    /// The opposite kind.
    pub fn other(self) -> Self {
        match self {
            Kind::Oxygen => Kind::Hydrogen,
            Kind::Hydrogen => Kind::Oxygen,
        }
    }

    /// Chemical symbol used in the event log.
    pub fn symbol(self) -> char {
        match self {
            Kind::Oxygen => 'O',
            Kind::Hydrogen => 'H',
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Oxygen => f.write_str("oxygen"),
            Kind::Hydrogen => f.write_str("hydrogen"),
        }
    }
}

/// Lifecycle state of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    /// Thread running, startup delay not yet taken.
    Started,
    /// Ready to enter the queue.
    Queued,
    /// Woke up selected for a molecule.
    Paired {
        /// 1-based molecule index.
        molecule: u32,
    },
    /// Oxygen only: combining the molecule.
    Creating {
        /// 1-based molecule index.
        molecule: u32,
    },
    /// Waiting for the other two participants.
    AtBarrier {
        /// 1-based molecule index.
        molecule: u32,
    },
    /// Terminal: took part in a molecule.
    Done {
        /// 1-based molecule index.
        molecule: u32,
    },
    /// Terminal: observed shutdown, relayed it, and left.
    Rejected,
}

impl UnitState {
    /// True for `Done` and `Rejected`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, UnitState::Done { .. } | UnitState::Rejected)
    }
}

/// How a unit ended. Both variants are normal completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOutcome {
    /// Took part in the molecule with this index.
    Completed {
        /// 1-based molecule index.
        molecule: u32,
    },
    /// Left on shutdown without forming a molecule.
    Rejected,
}

/// One oxygen or hydrogen participant.
///
/// A unit borrows the run's shared state and log, and owns only its id and
/// its random number generator.
pub struct Unit<'a> {
    kind: Kind,
    id: u32,
    shared: &'a SharedState,
    log: &'a EventLog,
    rng: StdRng,
}

impl<'a> Unit<'a> {
    /// Create a unit. With a `seed`, its delays are reproducible; without,
    /// they come from OS entropy.
    pub fn new(
        kind: Kind,
        id: u32,
        shared: &'a SharedState,
        log: &'a EventLog,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(unit_seed(seed, kind, id)),
            None => StdRng::from_entropy(),
        };
        Self {
            kind,
            id,
            shared,
            log,
            rng,
        }
    }

    /// Kind of this unit.
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// 1-based id within its kind.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Run the whole lifecycle on the current thread.
    pub fn run(mut self) -> UnitOutcome {
        self.log.log(Event::Started {
            kind: self.kind,
            id: self.id,
        });

        let mut state = UnitState::Started;
        while !state.is_terminal() {
            state = self.step(state);
        }

        match state {
            UnitState::Done { molecule } => UnitOutcome::Completed { molecule },
            _ => UnitOutcome::Rejected,
        }
    }

    /// Perform one transition, blocking where the protocol blocks.
    pub fn step(&mut self, state: UnitState) -> UnitState {
        let (kind, id) = (self.kind, self.id);
        match state {
            UnitState::Started => {
                let max = self.shared.params().max_startup_delay();
                self.sleep_up_to(max);
                self.log.log(Event::Queued { kind, id });
                UnitState::Queued
            }

            UnitState::Queued => match self.shared.enqueue(kind) {
                Wake::Shutdown => {
                    self.log.log(Event::Rejected { kind, id });
                    self.shared.relay_shutdown(kind);
                    UnitState::Rejected
                }
                Wake::Paired { molecule } => {
                    self.log.log(Event::Creating { kind, id, molecule });
                    UnitState::Paired { molecule }
                }
            },

            UnitState::Paired { molecule } => match kind {
                Kind::Oxygen => UnitState::Creating { molecule },
                Kind::Hydrogen => {
                    self.shared.record_hydrogen();
                    UnitState::AtBarrier { molecule }
                }
            },

            UnitState::Creating { molecule } => {
                let max = self.shared.params().max_creation_delay();
                self.sleep_up_to(max);
                let formed = self.shared.record_molecule();
                debug_assert_eq!(formed, molecule, "molecule index drifted");
                UnitState::AtBarrier { molecule }
            }

            UnitState::AtBarrier { molecule } => {
                self.shared.barrier().rendezvous(|| {
                    self.log.log(Event::Created { kind, id, molecule });
                });
                if kind == Kind::Oxygen {
                    self.shared.finish_molecule();
                }
                tracing::trace!(%kind, id, molecule, "Unit done");
                UnitState::Done { molecule }
            }

            terminal @ (UnitState::Done { .. } | UnitState::Rejected) => terminal,
        }
    }

    fn sleep_up_to(&mut self, max: Duration) {
        let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
        if max_ms == 0 {
            return;
        }
        let ms = self.rng.gen_range(0..=max_ms);
        thread::sleep(Duration::from_millis(ms));
    }
}

impl fmt::Debug for Unit<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unit")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .finish()
    }
}

/// Derive a distinct per-unit seed from the run seed.
fn unit_seed(seed: u64, kind: Kind, id: u32) -> u64 {
    let kind_bit = match kind {
        Kind::Oxygen => 0,
        Kind::Hydrogen => 1u64 << 63,
    };
    seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ kind_bit ^ u64::from(id)
}
