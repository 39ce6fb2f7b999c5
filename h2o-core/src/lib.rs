//! # h2o-core
//!
//! Rendezvous protocol that combines independent oxygen and hydrogen
//! threads into water molecules.
//!
//! Every molecule takes exactly one oxygen and two hydrogen units. The three
//! participants are selected under mutual exclusion, released from their
//! queues together, and meet at a three-party barrier so that none of them
//! reports the molecule before it is complete. When the remaining supply can
//! no longer satisfy the 1:2 ratio, a shutdown signal is relayed from unit
//! to unit until every waiting thread has left.
//!
//! ## Building blocks
//!
//! - [`Semaphore`] - counting semaphore whose permits may be released by any thread
//! - [`CreationBarrier`] - reusable two-turnstile barrier for exactly three parties
//! - [`SharedState`] / [`Counters`] - admission gate, counters, pairing, shutdown
//! - [`Unit`] - per-thread lifecycle state machine
//! - [`EventLog`] - serialized, numbered protocol output
//! - [`Reactor`] - spawns one thread per unit and joins them
//!
//! ## Example
//!
//! ```
//! use h2o_core::{EventLog, Reactor, RunParams};
//!
//! let params = RunParams::new(2, 4, 0, 0).unwrap();
//! let reactor = Reactor::new(params, EventLog::recording());
//! let summary = reactor.run().unwrap();
//!
//! assert_eq!(summary.molecules, 2);
//! assert_eq!(summary.hydrogen_consumed, 4);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod barrier;
pub mod error;
pub mod log;
pub mod params;
pub mod reactor;
pub mod semaphore;
pub mod state;
pub mod unit;

pub use barrier::{CreationBarrier, PARTIES};
pub use error::{ParamsError, ReactorError};
pub use log::{Event, EventLog, LogEntry};
pub use params::{RunParams, MAX_DELAY_MS};
pub use reactor::{Reactor, RunSummary};
pub use semaphore::Semaphore;
pub use state::{Counters, Pairing, SharedState, Wake};
pub use unit::{Kind, Unit, UnitOutcome, UnitState};
