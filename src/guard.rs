//! Run admission for the pipeline.
//!
//! The [`LoadGuard`] is the only state shared between pipeline runs. It
//! remembers the last completed location (and its result) and which
//! locations currently have a run in flight. Every decision is taken under a
//! single mutex so two callers can never both be admitted for one key.
//!
//! Admitting a run for a new location cancels runs still going for other
//! locations, unless the guard was built with `cancel_superseded = false`.
//! Cancellation is cooperative: the run observes its [`CancelSignal`] at its
//! next await point.
//!
//! The in-flight mark is owned by a [`RunPermit`] and removed when the permit
//! is dropped, so a run that returns early, errors or panics never leaves its
//! key stuck.

use crate::models::Coordinate;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use tokio::sync::watch;
use tracing::{debug, info};

/// Decimal places kept when deriving a key from a coordinate (~110 m).
const KEY_PRECISION: i32 = 3;

/// Identifies the location a run is for. Only used to deduplicate runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoadKey(String);

impl LoadKey {
    pub const DEFAULT: &'static str = "default";

    pub fn new(coordinate: Option<Coordinate>) -> Self {
        let Some(c) = coordinate else {
            return Self(Self::DEFAULT.to_string());
        };
        let scale = 10f64.powi(KEY_PRECISION);
        // `+ 0.0` folds -0.0 into 0.0 so both sides of the equator/meridian
        // round to the same key.
        let round = |v: f64| (v * scale).round() / scale + 0.0;
        Self(format!(
            "{:.prec$},{:.prec$}",
            round(c.lat()),
            round(c.lon()),
            prec = KEY_PRECISION as usize
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LoadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Read side of a run's cancellation flag.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the run has been cancelled; pends forever otherwise.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }
}

struct InFlight {
    run_id: u64,
    cancel: watch::Sender<bool>,
}

impl InFlight {
    fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }
}

struct GuardState<R> {
    last_completed: Option<(LoadKey, R)>,
    in_flight: HashMap<LoadKey, InFlight>,
    next_run_id: u64,
}

/// What [`LoadGuard::admit`] decided.
pub enum Admission<'a, R: Clone> {
    /// Go ahead; the permit marks the key in flight until dropped.
    Admitted(RunPermit<'a, R>),
    /// This key was the last one completed; here is its result.
    Cached(R),
    /// A run for this key is already going.
    InFlight,
}

pub struct LoadGuard<R> {
    state: Mutex<GuardState<R>>,
    cancel_superseded: bool,
}

impl<R: Clone> LoadGuard<R> {
    pub fn new(cancel_superseded: bool) -> Self {
        Self {
            state: Mutex::new(GuardState {
                last_completed: None,
                in_flight: HashMap::new(),
                next_run_id: 0,
            }),
            cancel_superseded,
        }
    }

    /// Decide whether a run for `key` may start.
    ///
    /// Checks, in order: the last completed key (reuse its result), a live
    /// run for the same key (report it as in flight), otherwise admit. On
    /// admission, runs for other keys are cancelled when the guard cancels
    /// superseded runs.
    ///
    /// # Arguments
    ///
    /// * `key` - Location the caller wants news for
    ///
    /// # Returns
    ///
    /// An [`Admission`]. Only [`Admission::Admitted`] marks the key in
    /// flight; the mark lives as long as the returned [`RunPermit`].
    pub fn admit(&self, key: LoadKey) -> Admission<'_, R> {
        let mut state = self.state.lock();

        if let Some((done, result)) = &state.last_completed {
            if *done == key {
                debug!(%key, "Location already loaded; reusing result");
                return Admission::Cached(result.clone());
            }
        }

        // A cancelled run for this key may still be unwinding; it no longer
        // counts as in flight.
        if state.in_flight.get(&key).is_some_and(|run| !run.is_cancelled()) {
            debug!(%key, "Run already in flight");
            return Admission::InFlight;
        }

        if self.cancel_superseded {
            for (other, run) in state.in_flight.iter().filter(|(k, _)| **k != key) {
                if !run.is_cancelled() {
                    info!(superseded = %other, by = %key, "Cancelling superseded run");
                    run.cancel.send_replace(true);
                }
            }
        }

        let run_id = state.next_run_id;
        state.next_run_id += 1;
        let (tx, rx) = watch::channel(false);
        state.in_flight.insert(key.clone(), InFlight { run_id, cancel: tx });

        Admission::Admitted(RunPermit {
            guard: self,
            key,
            run_id,
            signal: CancelSignal { rx },
        })
    }

    /// Cancel every run in flight. Returns how many were signalled.
    pub fn cancel_all(&self) -> usize {
        let state = self.state.lock();
        let mut count = 0;
        for (key, run) in state.in_flight.iter().filter(|(_, r)| !r.is_cancelled()) {
            info!(%key, "Cancelling run");
            run.cancel.send_replace(true);
            count += 1;
        }
        count
    }

    /// Drop the remembered result so the next request refetches.
    pub fn forget(&self) {
        self.state.lock().last_completed = None;
    }

    pub fn is_in_flight(&self, key: &LoadKey) -> bool {
        self.state.lock().in_flight.contains_key(key)
    }

    pub fn in_flight_count(&self) -> usize {
        self.state.lock().in_flight.len()
    }

    pub fn last_completed_key(&self) -> Option<LoadKey> {
        self.state
            .lock()
            .last_completed
            .as_ref()
            .map(|(key, _)| key.clone())
    }

    fn release(&self, key: &LoadKey, run_id: u64) {
        let mut state = self.state.lock();
        if state.in_flight.get(key).is_some_and(|run| run.run_id == run_id) {
            state.in_flight.remove(key);
        }
    }
}

/// Proof of admission for one run.
pub struct RunPermit<'a, R: Clone> {
    guard: &'a LoadGuard<R>,
    key: LoadKey,
    run_id: u64,
    signal: CancelSignal,
}

impl<R: Clone> RunPermit<'_, R> {
    pub fn key(&self) -> &LoadKey {
        &self.key
    }

    pub fn signal(&self) -> &CancelSignal {
        &self.signal
    }

    /// Record `result` as the last completed run and release the key, in one
    /// step.
    ///
    /// # Returns
    ///
    /// `false` if the run was cancelled before it got here. A cancelled run
    /// only releases its key; it never replaces the remembered result.
    pub fn complete(self, result: R) -> bool {
        let mut state = self.guard.state.lock();
        if state.in_flight.get(&self.key).is_some_and(|run| run.run_id == self.run_id) {
            state.in_flight.remove(&self.key);
        }
        // Checked under the lock: `admit` and `cancel_all` fire signals while
        // holding it, so a cancellation cannot slip in between.
        let recorded = !self.signal.is_cancelled();
        if recorded {
            state.last_completed = Some((self.key.clone(), result));
        }
        // Unlock before `self` drops and `release` locks again.
        drop(state);
        recorded
    }
}

impl<R: Clone> Drop for RunPermit<'_, R> {
    fn drop(&mut self) {
        self.guard.release(&self.key, self.run_id);
    }
}
