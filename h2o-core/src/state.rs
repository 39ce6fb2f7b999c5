//! Shared counters, pairing, and the shutdown coordinator.
//!
//! Two locks guard the shared state:
//! - the **admission gate**, a binary semaphore taken by every arriving unit.
//!   If the arrival commits a pairing the gate stays closed until that
//!   molecule's oxygen participant has finished the supply check, so exactly
//!   one molecule is in flight at a time.
//! - the **counters mutex**, a short-lived guard around every counter read
//!   or write.
//!
//! [`Counters`] holds the pure decision logic (pairing, supply check) so it
//! can be tested without threads; [`SharedState`] performs the semaphore
//! releases those decisions call for.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::barrier::CreationBarrier;
use crate::params::RunParams;
use crate::semaphore::Semaphore;
use crate::unit::Kind;

/// Process-wide counters. Only ever read or written under the counters mutex.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    /// Oxygen units parked in the queue and not yet paired.
    pub oxygen_waiting: u32,
    /// Hydrogen units parked in the queue and not yet paired.
    pub hydrogen_waiting: u32,
    /// Pairings committed so far. Fixes the index of the molecule in flight.
    pub molecules_committed: u32,
    /// Molecules completed so far.
    pub molecules_formed: u32,
    /// Oxygen units that took part in a molecule.
    pub oxygen_consumed: u32,
    /// Hydrogen units that took part in a molecule. Always even between
    /// molecules.
    pub hydrogen_consumed: u32,
    /// Set once supply can no longer satisfy the 1:2 ratio. Never reset.
    pub shutdown: bool,
}

/// A committed selection of one oxygen and two hydrogen units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pairing {
    /// 1-based index of the molecule the pairing will form.
    pub molecule: u32,
}

impl Counters {
    /// Initial counters for a run; shutdown is pre-set if not even one
    /// molecule can be formed.
    pub fn for_run(params: &RunParams) -> Self {
        Self {
            shutdown: params.supply_exhausted_at_start(),
            ..Self::default()
        }
    }

    /// Register an arrival of `kind` and commit a pairing if the arrival
    /// completes one.
    ///
    /// Only the arrival that makes `hydrogen_waiting >= 2 && oxygen_waiting
    /// >= 1` true commits, so each pairing is committed exactly once. No
    /// pairing is committed after shutdown.
    pub fn arrive(&mut self, kind: Kind) -> Option<Pairing> {
        match kind {
            Kind::Oxygen => self.oxygen_waiting += 1,
            Kind::Hydrogen => self.hydrogen_waiting += 1,
        }

        if self.shutdown || self.hydrogen_waiting < 2 || self.oxygen_waiting < 1 {
            return None;
        }

        self.hydrogen_waiting -= 2;
        self.oxygen_waiting -= 1;
        self.molecules_committed += 1;
        Some(Pairing {
            molecule: self.molecules_committed,
        })
    }

    /// Credit the oxygen participant with a finished molecule.
    pub fn record_molecule(&mut self) -> u32 {
        self.molecules_formed += 1;
        self.oxygen_consumed += 1;
        self.molecules_formed
    }

    /// Credit one hydrogen participant.
    pub fn record_hydrogen(&mut self) {
        self.hydrogen_consumed += 1;
    }

    /// Decide whether remaining supply can still form a molecule.
    ///
    /// Returns the queue to wake when shutdown is triggered now:
    /// - oxygen left but fewer than two hydrogen → wake oxygen
    /// - no oxygen left but some hydrogen → wake hydrogen
    ///
    /// Returns `None` if pairing can continue, or if shutdown was already
    /// set (the relay is then already running).
    pub fn check_supply(&mut self, params: &RunParams) -> Option<Kind> {
        if self.shutdown {
            return None;
        }

        let oxygen_left = params.oxygen.saturating_sub(self.oxygen_consumed);
        let hydrogen_left = params.hydrogen.saturating_sub(self.hydrogen_consumed);

        let wake = if oxygen_left >= 1 && hydrogen_left < 2 {
            Kind::Oxygen
        } else if oxygen_left == 0 && hydrogen_left > 0 {
            Kind::Hydrogen
        } else {
            return None;
        };

        self.shutdown = true;
        Some(wake)
    }
}

/// Why a unit woke up from its queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// Selected for the molecule with this index.
    Paired {
        /// 1-based molecule index.
        molecule: u32,
    },
    /// Shutdown was observed; the unit must relay it and leave.
    Shutdown,
}

/// Everything the units of one run share: gate, counters, queues, barrier.
#[derive(Debug)]
pub struct SharedState {
    params: RunParams,
    gate: Semaphore,
    counters: Mutex<Counters>,
    oxygen_queue: Semaphore,
    hydrogen_queue: Semaphore,
    barrier: CreationBarrier,
}

impl SharedState {
    /// Allocate the shared state for a run.
    ///
    /// If the supply is exhausted from the start, shutdown is pre-set and
    /// both queues are released once so the first arrival of each kind sees
    /// it immediately.
    pub fn new(params: RunParams) -> Self {
        let counters = Counters::for_run(&params);
        let state = Self {
            params,
            gate: Semaphore::new(1),
            counters: Mutex::new(counters),
            oxygen_queue: Semaphore::new(0),
            hydrogen_queue: Semaphore::new(0),
            barrier: CreationBarrier::new(),
        };

        if counters.shutdown {
            tracing::debug!(
                oxygen = params.oxygen,
                hydrogen = params.hydrogen,
                "Supply exhausted at start, shutdown pre-set"
            );
            state.oxygen_queue.release();
            state.hydrogen_queue.release();
        }

        state
    }

    /// Parameters of this run.
    pub fn params(&self) -> &RunParams {
        &self.params
    }

    /// The creation barrier shared by each molecule's participants.
    pub fn barrier(&self) -> &CreationBarrier {
        &self.barrier
    }

    /// Copy of the current counters.
    pub fn snapshot(&self) -> Counters {
        *self.counters()
    }

    /// Enter the queue as `kind` and block until paired or shut down.
    ///
    /// The gate is left closed when this arrival commits a pairing; the
    /// molecule's oxygen participant reopens it in
    /// [`SharedState::finish_molecule`].
    pub fn enqueue(&self, kind: Kind) -> Wake {
        self.gate.acquire();

        let pairing = self.counters().arrive(kind);
        match pairing {
            Some(Pairing { molecule }) => {
                tracing::debug!(molecule, committer = %kind, "Pairing committed");
                self.hydrogen_queue.release();
                self.hydrogen_queue.release();
                self.oxygen_queue.release();
            }
            None => self.gate.release(),
        }

        self.queue(kind).acquire();

        let counters = self.counters();
        if counters.shutdown {
            Wake::Shutdown
        } else {
            Wake::Paired {
                molecule: counters.molecules_committed,
            }
        }
    }

    /// Oxygen side of creation: credit the molecule and its oxygen.
    pub fn record_molecule(&self) -> u32 {
        self.counters().record_molecule()
    }

    /// Hydrogen side of creation: credit one hydrogen.
    pub fn record_hydrogen(&self) {
        self.counters().record_hydrogen();
    }

    /// Called by the oxygen participant after the barrier: run the supply
    /// check, start the shutdown relay if needed, and reopen the gate.
    pub fn finish_molecule(&self) {
        let wake = self.counters().check_supply(&self.params);
        if let Some(kind) = wake {
            tracing::debug!(wake = %kind, "Supply exhausted, shutting down");
            self.queue(kind).release();
        }
        self.gate.release();
    }

    /// Forward shutdown from a rejected unit: release both queues once.
    ///
    /// Releasing the unit's own queue keeps the chain going when every
    /// remaining unit is of the same kind.
    pub fn relay_shutdown(&self, from: Kind) {
        tracing::trace!(from = %from, "Relaying shutdown");
        self.queue(from).release();
        self.queue(from.other()).release();
    }

    /// Shut down from outside the protocol (a unit could not be started).
    ///
    /// Waits for the molecule in flight, if any, so its participants are
    /// never rejected half-way. Returns false if shutdown was already set.
    pub fn force_shutdown(&self) -> bool {
        self.gate.acquire();
        let newly_set = {
            let mut counters = self.counters();
            let newly_set = !counters.shutdown;
            counters.shutdown = true;
            newly_set
        };
        if newly_set {
            tracing::warn!("Forcing shutdown of all waiting units");
            self.oxygen_queue.release();
            self.hydrogen_queue.release();
        }
        self.gate.release();
        newly_set
    }

    fn queue(&self, kind: Kind) -> &Semaphore {
        match kind {
            Kind::Oxygen => &self.oxygen_queue,
            Kind::Hydrogen => &self.hydrogen_queue,
        }
    }

    // Every critical section leaves the counters consistent, so a poisoned
    // lock still holds valid data.
    fn counters(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(oxygen: u32, hydrogen: u32) -> RunParams {
        RunParams {
            oxygen,
            hydrogen,
            max_startup_delay_ms: 0,
            max_creation_delay_ms: 0,
        }
    }

    #[test]
    fn hydrogen_completing_the_set_commits() {
        let mut c = Counters::default();
        assert_eq!(c.arrive(Kind::Oxygen), None);
        assert_eq!(c.arrive(Kind::Hydrogen), None);
        assert_eq!(c.arrive(Kind::Hydrogen), Some(Pairing { molecule: 1 }));
        assert_eq!((c.oxygen_waiting, c.hydrogen_waiting), (0, 0));
    }

    #[test]
    fn oxygen_completing_the_set_commits() {
        let mut c = Counters::default();
        assert_eq!(c.arrive(Kind::Hydrogen), None);
        assert_eq!(c.arrive(Kind::Hydrogen), None);
        assert_eq!(c.arrive(Kind::Hydrogen), None);
        assert_eq!(c.arrive(Kind::Oxygen), Some(Pairing { molecule: 1 }));
        assert_eq!((c.oxygen_waiting, c.hydrogen_waiting), (0, 1));
    }

    #[test]
    fn only_the_threshold_crossing_arrival_commits() {
        let mut c = Counters::default();
        let commits = [
            Kind::Oxygen,
            Kind::Oxygen,
            Kind::Hydrogen,
            Kind::Hydrogen,
            Kind::Hydrogen,
            Kind::Hydrogen,
        ]
        .into_iter()
        .filter_map(|k| c.arrive(k))
        .collect::<Vec<_>>();

        assert_eq!(
            commits,
            vec![Pairing { molecule: 1 }, Pairing { molecule: 2 }]
        );
        assert_eq!(c.molecules_committed, 2);
    }

    #[test]
    fn no_pairing_after_shutdown() {
        let mut c = Counters {
            shutdown: true,
            ..Counters::default()
        };
        c.arrive(Kind::Oxygen);
        c.arrive(Kind::Hydrogen);
        assert_eq!(c.arrive(Kind::Hydrogen), None);
        assert_eq!((c.oxygen_waiting, c.hydrogen_waiting), (1, 2));
    }

    #[test]
    fn supply_check_wakes_oxygen_when_hydrogen_runs_out() {
        let p = params(3, 5);
        let mut c = Counters {
            oxygen_consumed: 2,
            hydrogen_consumed: 4,
            molecules_formed: 2,
            ..Counters::default()
        };
        assert_eq!(c.check_supply(&p), Some(Kind::Oxygen));
        assert!(c.shutdown);
    }

    #[test]
    fn supply_check_wakes_hydrogen_when_oxygen_runs_out() {
        let p = params(1, 3);
        let mut c = Counters {
            oxygen_consumed: 1,
            hydrogen_consumed: 2,
            molecules_formed: 1,
            ..Counters::default()
        };
        assert_eq!(c.check_supply(&p), Some(Kind::Hydrogen));
        assert!(c.shutdown);
    }

    #[test]
    fn supply_check_continues_while_molecules_are_possible() {
        let p = params(2, 4);
        let mut c = Counters {
            oxygen_consumed: 1,
            hydrogen_consumed: 2,
            molecules_formed: 1,
            ..Counters::default()
        };
        assert_eq!(c.check_supply(&p), None);
        assert!(!c.shutdown);

        // Everything consumed: nothing left to wake
        c.oxygen_consumed = 2;
        c.hydrogen_consumed = 4;
        assert_eq!(c.check_supply(&p), None);
        assert!(!c.shutdown);
    }

    #[test]
    fn supply_check_is_one_shot() {
        let p = params(2, 2);
        let mut c = Counters {
            oxygen_consumed: 1,
            hydrogen_consumed: 2,
            ..Counters::default()
        };
        assert_eq!(c.check_supply(&p), Some(Kind::Oxygen));
        assert_eq!(c.check_supply(&p), None);
    }

    #[test]
    fn exhausted_start_presets_shutdown_and_opens_queues() {
        let state = SharedState::new(params(1, 1));
        assert!(state.snapshot().shutdown);
        assert_eq!(state.oxygen_queue.available_permits(), 1);
        assert_eq!(state.hydrogen_queue.available_permits(), 1);
    }

    #[test]
    fn viable_start_leaves_queues_closed() {
        let state = SharedState::new(params(1, 2));
        assert!(!state.snapshot().shutdown);
        assert_eq!(state.oxygen_queue.available_permits(), 0);
        assert_eq!(state.hydrogen_queue.available_permits(), 0);
        assert_eq!(state.gate.available_permits(), 1);
    }

    #[test]
    fn enqueue_after_shutdown_wakes_with_shutdown() {
        let state = SharedState::new(params(0, 3));
        assert_eq!(state.enqueue(Kind::Hydrogen), Wake::Shutdown);
        // The gate was reopened, nothing was committed
        assert_eq!(state.gate.available_permits(), 1);
        assert_eq!(state.snapshot().molecules_committed, 0);
    }

    #[test]
    fn relay_releases_both_queues() {
        let state = SharedState::new(params(2, 4));
        state.relay_shutdown(Kind::Hydrogen);
        assert_eq!(state.oxygen_queue.available_permits(), 1);
        assert_eq!(state.hydrogen_queue.available_permits(), 1);
    }

    #[test]
    fn force_shutdown_is_idempotent() {
        let state = SharedState::new(params(2, 4));
        assert!(state.force_shutdown());
        assert!(!state.force_shutdown());
        assert!(state.snapshot().shutdown);
        assert_eq!(state.oxygen_queue.available_permits(), 1);
        assert_eq!(state.gate.available_permits(), 1);
    }
}
