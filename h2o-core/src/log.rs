//! Serialized, numbered event log.
//!
//! This is the protocol's observable output, separate from `tracing`
//! diagnostics. Every line has the form `<n>: <event>` with `n` starting at
//! 1, and is flushed as soon as it is written so a crashed run still leaves
//! a usable prefix.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::unit::Kind;

/// One observable step of a unit's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The unit thread started.
    Started {
        /// Unit kind.
        kind: Kind,
        /// 1-based id within its kind.
        id: u32,
    },
    /// The unit finished its startup delay and is entering the queue.
    Queued {
        /// Unit kind.
        kind: Kind,
        /// 1-based id within its kind.
        id: u32,
    },
    /// The unit was paired and starts working on a molecule.
    Creating {
        /// Unit kind.
        kind: Kind,
        /// 1-based id within its kind.
        id: u32,
        /// 1-based index of the molecule being formed.
        molecule: u32,
    },
    /// The molecule this unit took part in is complete.
    Created {
        /// Unit kind.
        kind: Kind,
        /// 1-based id within its kind.
        id: u32,
        /// 1-based index of the completed molecule.
        molecule: u32,
    },
    /// The unit observed shutdown and leaves without forming a molecule.
    Rejected {
        /// Unit kind.
        kind: Kind,
        /// 1-based id within its kind.
        id: u32,
    },
}

impl Event {
    /// Kind of the unit that produced this event.
    pub fn kind(&self) -> Kind {
        match *self {
            Event::Started { kind, .. }
            | Event::Queued { kind, .. }
            | Event::Creating { kind, .. }
            | Event::Created { kind, .. }
            | Event::Rejected { kind, .. } => kind,
        }
    }

    /// Id of the unit that produced this event.
    pub fn id(&self) -> u32 {
        match *self {
            Event::Started { id, .. }
            | Event::Queued { id, .. }
            | Event::Creating { id, .. }
            | Event::Created { id, .. }
            | Event::Rejected { id, .. } => id,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let who = self.kind().symbol();
        match *self {
            Event::Started { id, .. } => write!(f, "{who} {id}: started"),
            Event::Queued { id, .. } => write!(f, "{who} {id}: going to queue"),
            Event::Creating { id, molecule, .. } => {
                write!(f, "{who} {id}: creating molecule {molecule}")
            }
            Event::Created { id, molecule, .. } => {
                write!(f, "{who} {id}: molecule {molecule} created")
            }
            Event::Rejected {
                kind: Kind::Oxygen,
                id,
            } => write!(f, "{who} {id}: not enough H"),
            Event::Rejected {
                kind: Kind::Hydrogen,
                id,
            } => write!(f, "{who} {id}: not enough O or H"),
        }
    }
}

/// A logged event with its line number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogEntry {
    /// 1-based line number.
    pub line: u64,
    /// The event.
    pub event: Event,
}

struct LogState {
    next_line: u64,
    sink: Box<dyn Write + Send>,
    /// Retained copies of every entry, when recording.
    entries: Option<Vec<LogEntry>>,
    /// First sink failure; later writes are skipped.
    error: Option<io::Error>,
}

/// Append-only event log, safe to call from any unit thread.
pub struct EventLog {
    state: Mutex<LogState>,
}

impl EventLog {
    /// Log to the given sink.
    pub fn new(sink: impl Write + Send + 'static) -> Self {
        Self::build(Box::new(sink), None)
    }

    /// Log into memory only, keeping every entry for inspection.
    pub fn recording() -> Self {
        Self::build(Box::new(io::sink()), Some(Vec::new()))
    }

    /// Log to the given sink and also keep every entry.
    pub fn recording_to(sink: impl Write + Send + 'static) -> Self {
        Self::build(Box::new(sink), Some(Vec::new()))
    }

    fn build(sink: Box<dyn Write + Send>, entries: Option<Vec<LogEntry>>) -> Self {
        Self {
            state: Mutex::new(LogState {
                next_line: 1,
                sink,
                entries,
                error: None,
            }),
        }
    }

    /// Append one event as the next numbered line.
    ///
    /// Sink failures do not interrupt the caller; the first one is kept and
    /// reported by [`EventLog::take_error`].
    pub fn log(&self, event: Event) {
        let mut state = self.lock();
        let line = state.next_line;
        state.next_line += 1;

        if state.error.is_none() {
            let written = writeln!(state.sink, "{line}: {event}").and_then(|()| state.sink.flush());
            if let Err(e) = written {
                tracing::warn!("Event log write failed at line {}: {}", line, e);
                state.error = Some(e);
            }
        }

        if let Some(entries) = state.entries.as_mut() {
            entries.push(LogEntry { line, event });
        }
    }

    /// Number of lines logged so far.
    pub fn len(&self) -> u64 {
        self.lock().next_line - 1
    }

    /// True if nothing has been logged yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Recorded entries in line order (empty unless recording).
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().entries.clone().unwrap_or_default()
    }

    /// Take the first sink failure, if any.
    pub fn take_error(&self) -> Option<io::Error> {
        self.lock().error.take()
    }

    fn lock(&self) -> MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("EventLog")
            .field("next_line", &state.next_line)
            .field("recording", &state.entries.is_some())
            .field("failed", &state.error.is_some())
            .finish()
    }
}
