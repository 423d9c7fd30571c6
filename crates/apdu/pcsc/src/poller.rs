//! Cancellable card presence waits
//!
//! A wait is a loop of bounded native waits of [`POLLING_LATENCY`] each, so a
//! cancellation requested from another thread is honored within one latency period.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use nexum_apdu_core::{Error, Result, TransportError};
use tracing::{debug, trace};

/// Duration of a single native wait
pub const POLLING_LATENCY: Duration = Duration::from_millis(500);

/// Slot condition awaited by a poller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceCondition {
    /// A card is in the slot
    Present,
    /// The slot is empty
    Absent,
}

impl fmt::Display for PresenceCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Present => f.write_str("card insertion"),
            Self::Absent => f.write_str("card removal"),
        }
    }
}

/// Handle stopping a running wait from another thread
#[derive(Debug, Clone)]
pub struct PollCanceller(Arc<AtomicBool>);

impl PollCanceller {
    /// Request the wait to stop
    pub fn cancel(&self) {
        self.0.store(false, Ordering::Release);
    }

    /// Whether the wait is running, i.e. whether [`Self::cancel`] would stop it
    pub fn is_waiting(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Repeats bounded presence waits until the condition holds or the wait is cancelled
#[derive(Debug)]
pub struct CardPresencePoller {
    condition: PresenceCondition,
    latency: Duration,
    active: Arc<AtomicBool>,
}

impl CardPresencePoller {
    /// Create a poller for `condition`
    pub fn new(condition: PresenceCondition) -> Self {
        Self {
            condition,
            latency: POLLING_LATENCY,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Override the duration of a single native wait
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Condition this poller waits for
    pub const fn condition(&self) -> PresenceCondition {
        self.condition
    }

    /// Whether a wait is currently running
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Handle that can stop the wait from any thread
    pub fn canceller(&self) -> PollCanceller {
        PollCanceller(Arc::clone(&self.active))
    }

    /// Stop a running wait; no effect when none is running
    pub fn cancel(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// Run the wait loop for `reader`
    ///
    /// `wait` performs one native wait bounded by the given duration and returns whether
    /// the condition holds. The loop returns once it does, fails with
    /// [`Error::TaskCancelled`] after a cancellation and with [`Error::ReaderIo`] on any
    /// native failure.
    pub fn run<F>(&self, reader: &str, mut wait: F) -> Result<()>
    where
        F: FnMut(Duration) -> Result<bool, TransportError>,
    {
        self.active.store(true, Ordering::Release);
        trace!(reader, condition = %self.condition, "wait started");

        while self.active.load(Ordering::Acquire) {
            match wait(self.latency) {
                Ok(true) => {
                    self.active.store(false, Ordering::Release);
                    debug!(reader, condition = %self.condition, "condition reached");
                    return Ok(());
                }
                Ok(false) => {}
                Err(e) => {
                    self.active.store(false, Ordering::Release);
                    return Err(Error::reader_io(
                        format!("{reader}: an error occurred while waiting for {}", self.condition),
                        e,
                    ));
                }
            }
        }

        debug!(reader, condition = %self.condition, "wait cancelled");
        Err(Error::TaskCancelled(format!(
            "{reader}: the wait for {} task has been cancelled",
            self.condition
        )))
    }
}
