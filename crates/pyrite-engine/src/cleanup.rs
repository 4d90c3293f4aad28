//! Deferred cleanup of interpreter-local state.
//!
//! Scripts leave variables behind in their session scope, and the scope of
//! a script extends beyond its `eval` call: a host may still inspect
//! variables afterwards. So variables can only be reclaimed once the
//! owning engine is gone. The coordinator tracks every registered engine
//! through a weak observation of its liveness token and clears the
//! session's user variables after the engine is dropped, keeping many
//! short-lived engines from accumulating interpreter state.
//!
//! One polling worker per coordinator, started lazily on first
//! registration and exiting once nothing is tracked; a later registration
//! starts a fresh one. Polling (rather than blocking) means no worker
//! lingers when there is nothing to clean.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::engine::{EngineToken, PyEngine};
use crate::session::PySession;

/// Variable names cleanup must never clear.
///
/// The default set covers the interpreter's documentation/identity/builtins
/// metadata. The reserved set is extensible because the interpreter's own
/// reserved names can grow; it is deliberately not a fixed constant.
#[derive(Debug, Clone)]
pub struct ReservedNames {
    names: HashSet<String>,
}

impl ReservedNames {
    /// An empty reserved set (clears everything).
    pub fn empty() -> Self {
        Self {
            names: HashSet::new(),
        }
    }

    /// Reserve an additional name.
    pub fn insert(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    /// True if `name` must not be cleared.
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Number of reserved names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// True if no names are reserved.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for ReservedNames {
    fn default() -> Self {
        let names = [
            "__name__",
            "__doc__",
            "__builtins__",
            "__package__",
            "__spec__",
            "__loader__",
            "__annotations__",
        ]
        .into_iter()
        .map(str::to_owned)
        .collect();
        Self { names }
    }
}

impl<S: Into<String>> FromIterator<S> for ReservedNames {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Tunables for the cleanup coordinator.
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    /// How long the worker sleeps between passes. A tunable, not a
    /// contract; cleanup latency is bounded below by it.
    pub poll_interval: Duration,
    /// Names never cleared from a session.
    pub reserved: ReservedNames,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            reserved: ReservedNames::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordState {
    /// Engine still reachable by its owner.
    Registered,
    /// Engine dropped; cleanup pending in the current pass.
    Enqueued,
}

struct CleanupRecord {
    /// Non-owning observation of the engine's liveness. Never keeps the
    /// engine alive.
    watch: Weak<EngineToken>,
    /// Keeps the session reachable for the cleanup action after the
    /// engine itself is gone.
    session: PySession,
    state: RecordState,
}

struct CoordinatorState {
    records: Vec<CleanupRecord>,
    worker_running: bool,
    shutdown: bool,
}

struct CoordinatorInner {
    state: Mutex<CoordinatorState>,
    config: CleanupConfig,
}

/// Tracks live engines and reclaims their session variables after drop.
///
/// One coordinator per language provider; explicitly constructed and shut
/// down with the host component rather than living as ambient global state.
#[derive(Clone)]
pub struct CleanupCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl CleanupCoordinator {
    pub fn new(config: CleanupConfig) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                state: Mutex::new(CoordinatorState {
                    records: Vec::new(),
                    worker_running: false,
                    shutdown: false,
                }),
                config,
            }),
        }
    }

    /// Track `engine`; its session's user variables will be cleared after
    /// the engine is dropped. Starts the polling worker if none is
    /// running.
    pub fn register(&self, engine: &PyEngine) {
        let mut state = lock_state(&self.inner);
        if state.shutdown {
            warn!("cleanup coordinator is shut down; engine not tracked");
            return;
        }
        state.records.push(CleanupRecord {
            watch: Arc::downgrade(engine.token()),
            session: engine.session().clone(),
            state: RecordState::Registered,
        });
        if !state.worker_running {
            state.worker_running = true;
            let inner = Arc::clone(&self.inner);
            // Worker start is best-effort: if the spawn fails the records
            // stay tracked and the next register retries.
            if thread::Builder::new()
                .name("pyrite-cleanup".to_owned())
                .spawn(move || worker_main(inner))
                .is_err()
            {
                state.worker_running = false;
                warn!("failed to spawn cleanup worker");
            } else {
                debug!(tracked = state.records.len(), "cleanup worker started");
            }
        }
    }

    /// Number of engines currently tracked.
    pub fn tracked(&self) -> usize {
        lock_state(&self.inner).records.len()
    }

    /// Best-effort teardown: the worker exits on its next pass and pending
    /// cleanups may be skipped. Idempotent; later registrations are
    /// ignored.
    pub fn shutdown(&self) {
        lock_state(&self.inner).shutdown = true;
    }
}

impl Default for CleanupCoordinator {
    fn default() -> Self {
        Self::new(CleanupConfig::default())
    }
}

impl std::fmt::Debug for CleanupCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupCoordinator")
            .field("tracked", &self.tracked())
            .finish()
    }
}

fn lock_state(inner: &CoordinatorInner) -> std::sync::MutexGuard<'_, CoordinatorState> {
    inner
        .state
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Polling loop: detect dropped engines, run their cleanup actions, exit
/// when the tracked set is empty. One lock covers both the record set and
/// the enqueue/drain steps, so registration from caller threads and the
/// worker's pass never interleave mid-update.
fn worker_main(inner: Arc<CoordinatorInner>) {
    loop {
        thread::sleep(inner.config.poll_interval);

        let mut state = lock_state(&inner);
        if state.shutdown {
            state.worker_running = false;
            debug!("cleanup worker stopped: coordinator shut down");
            return;
        }

        for record in &mut state.records {
            if record.state == RecordState::Registered && record.watch.strong_count() == 0 {
                record.state = RecordState::Enqueued;
            }
        }

        let mut index = 0;
        while index < state.records.len() {
            if state.records[index].state != RecordState::Enqueued {
                index += 1;
                continue;
            }
            // Removing the record before judging the outcome is what makes
            // cleanup at-most-once: a failed action is not re-run.
            let record = state.records.swap_remove(index);
            match record.session.clear_locals(&inner.config.reserved) {
                Ok(cleared) => debug!(cleared, "session variables reclaimed"),
                Err(err) => warn!(error = %err, "cleanup action failed; continuing"),
            }
        }

        if state.records.is_empty() {
            state.worker_running = false;
            debug!("cleanup worker stopped: nothing tracked");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_reserved_names_cover_identity_metadata() {
        let reserved = ReservedNames::default();
        assert!(reserved.contains("__name__"));
        assert!(reserved.contains("__doc__"));
        assert!(reserved.contains("__builtins__"));
        assert!(!reserved.contains("user_var"));
    }

    #[test]
    fn reserved_names_are_extensible() {
        let mut reserved = ReservedNames::default();
        assert!(!reserved.contains("keep_me"));
        reserved.insert("keep_me");
        assert!(reserved.contains("keep_me"));
    }

    #[test]
    fn reserved_names_from_iterator() {
        let reserved: ReservedNames = ["only_this"].into_iter().collect();
        assert!(reserved.contains("only_this"));
        assert!(!reserved.contains("__name__"));
        assert_eq!(reserved.len(), 1);
    }

    #[test]
    fn empty_reserved_set_reserves_nothing() {
        let reserved = ReservedNames::empty();
        assert!(reserved.is_empty());
        assert!(!reserved.contains("__name__"));
    }

    #[test]
    fn coordinator_starts_with_nothing_tracked() {
        let coordinator = CleanupCoordinator::default();
        assert_eq!(coordinator.tracked(), 0);
    }
}
