//! Reusable rendezvous for the three participants of one molecule.
//!
//! Two turnstiles make the barrier reusable: the arrival turnstile opens
//! only once all [`PARTIES`] have arrived, and the departure turnstile opens
//! only once all of them have left the critical section, so a fast unit of
//! the next round cannot slip through a turnstile that is still open.
//!
//! ```text
//!  arrive:  count += 1 ── count == 3 ? close depart, open arrive
//!           pass arrive turnstile (re-open for the next one)
//!  ──────────── the rendezvous closure runs here ────────────
//!  depart:  count -= 1 ── count == 0 ? close arrive, open depart
//!           pass depart turnstile (re-open for the next one)
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::semaphore::Semaphore;

/// Participants per barrier round: one oxygen and two hydrogen.
pub const PARTIES: usize = 3;

#[derive(Debug, Default)]
struct Rounds {
    /// Participants currently between arrival and departure.
    count: usize,
    /// Completed rounds.
    completed: u64,
}

/// Two-phase barrier that releases its participants as a batch of exactly
/// [`PARTIES`].
///
/// More than three concurrent participants per round is a protocol
/// violation; callers guarantee it by letting only one molecule be in
/// flight at a time.
#[derive(Debug)]
pub struct CreationBarrier {
    rounds: Mutex<Rounds>,
    arrive: Semaphore,
    depart: Semaphore,
}

impl CreationBarrier {
    /// Create an empty barrier, ready for its first round.
    pub const fn new() -> Self {
        Self {
            rounds: Mutex::new(Rounds {
                count: 0,
                completed: 0,
            }),
            arrive: Semaphore::new(0),
            depart: Semaphore::new(1),
        }
    }

    /// Wait for the rest of the round, then leave together.
    pub fn wait(&self) {
        self.rendezvous(|| ());
    }

    /// Wait until all three participants have arrived, run
    /// `at_rendezvous`, and return only once all three have finished it.
    ///
    /// Whatever `at_rendezvous` does is ordered after every participant's
    /// arrival and before every participant's departure.
    pub fn rendezvous<R>(&self, at_rendezvous: impl FnOnce() -> R) -> R {
        self.arrive_phase();
        let out = at_rendezvous();
        self.depart_phase();
        out
    }

    /// Number of rounds that have fully departed.
    pub fn completed_rounds(&self) -> u64 {
        self.lock().completed
    }

    fn arrive_phase(&self) {
        {
            let mut rounds = self.lock();
            rounds.count += 1;
            debug_assert!(rounds.count <= PARTIES, "too many barrier participants");
            if rounds.count == PARTIES {
                self.depart.acquire();
                self.arrive.release();
            }
        }
        self.arrive.acquire();
        self.arrive.release();
    }

    fn depart_phase(&self) {
        {
            let mut rounds = self.lock();
            rounds.count -= 1;
            if rounds.count == 0 {
                self.arrive.acquire();
                self.depart.release();
                rounds.completed += 1;
                tracing::trace!(round = rounds.completed, "barrier round complete");
            }
        }
        self.depart.acquire();
        self.depart.release();
    }

    fn lock(&self) -> MutexGuard<'_, Rounds> {
        self.rounds.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CreationBarrier {
    fn default() -> Self {
        Self::new()
    }
}
