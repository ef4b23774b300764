//! Event contract shared by every stateful object in the crate.
//!
//! [`EventEmitter`] is a name-keyed listener registry with two emission
//! modes:
//!
//! - [`emit`](EventEmitter::emit) — strict: the first listener error aborts
//!   the remaining listeners and propagates to the caller.
//! - [`safe_emit`](EventEmitter::safe_emit) — fault-isolating: listener
//!   errors are caught, logged and contained; remaining listeners still run.
//!
//! Listeners for one event run synchronously in registration order
//! (duplicates allowed). Entities compose emitters rather than inheriting
//! from a base class: each one holds a public emitter, a private control
//! emitter consumed by the owning session layer, and an observer emitter for
//! passive external monitoring.
//!
//! [`Completion`] is the suspension primitive used wherever an emission
//! carries a resolve/reject pair (`@connect`, `@getstats`): the emitting
//! side blocks on [`wait`](Completion::wait) until the session layer settles
//! it.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Condvar, Mutex};

use crate::error::{Error, Result};

static LISTENER_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Payload of the observer channel every stateful entity exposes.
///
/// Observer events (`"close"`, `"pause"`, `"resume"`, `"trackended"`) exist
/// for passive external monitoring only; application code must never drive
/// control flow back into the entity from an observer listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverEvent {
    Close,
    Pause,
    Resume,
    TrackEnded,
}

/// Handle identifying one registered listener, used for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Listener callable: receives the event payload by reference and reports
/// failure by returning `Err`.
pub type Listener<E> = Box<dyn FnMut(&E) -> Result<()> + Send>;

struct Entry<E> {
    id: ListenerId,
    once: bool,
    listener: Listener<E>,
}

/// Ordered, name-keyed listener registry with strict and fault-isolating
/// emission.
///
/// `E` is the payload type carried by every event of this emitter; entities
/// define one payload enum per channel so that listeners stay fully typed.
pub struct EventEmitter<E> {
    listeners: Mutex<HashMap<&'static str, Vec<Entry<E>>>>,
}

impl<E> Default for EventEmitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventEmitter<E> {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
        }
    }

    fn add(
        &self,
        event: &'static str,
        once: bool,
        prepend: bool,
        listener: Listener<E>,
    ) -> ListenerId {
        let id = ListenerId(LISTENER_COUNTER.fetch_add(1, Ordering::Relaxed));
        let entry = Entry { id, once, listener };
        let mut listeners = self.listeners.lock();
        let entries = listeners.entry(event).or_default();
        if prepend {
            entries.insert(0, entry);
        } else {
            entries.push(entry);
        }
        id
    }

    /// Register a listener at the end of the invocation order.
    pub fn on<F>(&self, event: &'static str, listener: F) -> ListenerId
    where
        F: FnMut(&E) -> Result<()> + Send + 'static,
    {
        self.add(event, false, false, Box::new(listener))
    }

    /// Register a one-shot listener; it is removed before its single
    /// invocation, so it observes at most one emission even if it re-emits.
    pub fn once<F>(&self, event: &'static str, listener: F) -> ListenerId
    where
        F: FnMut(&E) -> Result<()> + Send + 'static,
    {
        self.add(event, true, false, Box::new(listener))
    }

    /// Register a listener at the front of the invocation order.
    pub fn prepend<F>(&self, event: &'static str, listener: F) -> ListenerId
    where
        F: FnMut(&E) -> Result<()> + Send + 'static,
    {
        self.add(event, false, true, Box::new(listener))
    }

    /// Register a one-shot listener at the front of the invocation order.
    pub fn prepend_once<F>(&self, event: &'static str, listener: F) -> ListenerId
    where
        F: FnMut(&E) -> Result<()> + Send + 'static,
    {
        self.add(event, true, true, Box::new(listener))
    }

    /// Remove one listener by its handle. Returns whether it was present.
    pub fn off(&self, event: &'static str, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        match listeners.get_mut(event) {
            Some(entries) => {
                let before = entries.len();
                entries.retain(|entry| entry.id != id);
                entries.len() != before
            }
            None => false,
        }
    }

    /// Remove every listener registered for `event`.
    pub fn remove_all(&self, event: &'static str) {
        self.listeners.lock().remove(event);
    }

    /// Number of listeners currently registered for `event`.
    pub fn listener_count(&self, event: &'static str) -> usize {
        self.listeners
            .lock()
            .get(event)
            .map_or(0, |entries| entries.len())
    }

    /// Take the listeners due to run for one emission. Entries are removed
    /// from the registry for the duration of the dispatch (one-shot entries
    /// permanently), so listeners run outside the registry lock and may
    /// register new listeners without deadlocking.
    fn take_for_emission(&self, event: &'static str) -> Vec<(ListenerId, bool, Listener<E>)> {
        let mut listeners = self.listeners.lock();
        let Some(entries) = listeners.get_mut(event) else {
            return Vec::new();
        };
        let taken: Vec<_> = entries
            .drain(..)
            .map(|entry| (entry.id, entry.once, entry.listener))
            .collect();
        taken
    }

    fn restore(&self, event: &'static str, kept: Vec<Entry<E>>) {
        if kept.is_empty() {
            return;
        }
        let mut listeners = self.listeners.lock();
        let entries = listeners.entry(event).or_default();
        // Listeners registered during the emission keep their position after
        // the surviving pre-emission listeners.
        let mut merged = kept;
        merged.append(entries);
        *entries = merged;
    }

    fn dispatch(&self, event: &'static str, payload: &E, contain: bool) -> Result<bool> {
        let taken = self.take_for_emission(event);
        let had_listeners = !taken.is_empty();
        let mut kept: Vec<Entry<E>> = Vec::with_capacity(taken.len());
        let mut failure: Option<Error> = None;

        for (id, once, mut listener) in taken {
            if failure.is_some() {
                // Strict mode aborted; surviving listeners go back untouched.
                if !once {
                    kept.push(Entry { id, once, listener });
                }
                continue;
            }
            let result = listener(payload);
            if !once {
                kept.push(Entry { id, once, listener });
            }
            if let Err(error) = result {
                if contain {
                    tracing::error!(event, %error, "listener failed during safe emission");
                } else {
                    failure = Some(error);
                }
            }
        }

        self.restore(event, kept);
        match failure {
            Some(error) => Err(error),
            None => Ok(had_listeners),
        }
    }

    /// Invoke listeners in order; the first listener error aborts the
    /// remaining listeners and propagates. Returns whether any listener was
    /// registered.
    pub fn emit(&self, event: &'static str, payload: &E) -> Result<bool> {
        self.dispatch(event, payload, false)
    }

    /// Invoke listeners in order, containing listener errors: each failure
    /// is logged and the remaining listeners still run. Returns whether at
    /// least one listener existed before invocation began.
    pub fn safe_emit(&self, event: &'static str, payload: &E) -> bool {
        match self.dispatch(event, payload, true) {
            Ok(had_listeners) => had_listeners,
            // Contained mode never yields Err.
            Err(_) => true,
        }
    }
}

impl<E> std::fmt::Debug for EventEmitter<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.listeners.lock();
        let events: Vec<_> = listeners.keys().copied().collect();
        f.debug_struct("EventEmitter").field("events", &events).finish()
    }
}

struct CompletionState<T> {
    settled: Option<Result<T>>,
}

/// One-shot resolve/reject cell carried inside control events.
///
/// Clonable handle: the emitting side blocks on [`wait`](Self::wait) while
/// the session-layer listener settles it with [`resolve`](Self::resolve) or
/// [`reject`](Self::reject), synchronously within the emission or later from
/// another thread. The first settlement wins; later ones are ignored. There
/// is no timeout: an abandoned completion blocks its waiter forever, exactly
/// like an unsettled promise.
pub struct Completion<T> {
    state: Arc<(Mutex<CompletionState<T>>, Condvar)>,
}

impl<T> Clone for Completion<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> Default for Completion<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Completion<T> {
    pub fn new() -> Self {
        Self {
            state: Arc::new((Mutex::new(CompletionState { settled: None }), Condvar::new())),
        }
    }

    fn settle(&self, value: Result<T>) {
        let (lock, condvar) = &*self.state;
        let mut state = lock.lock();
        if state.settled.is_none() {
            state.settled = Some(value);
            condvar.notify_all();
        }
    }

    /// Settle successfully. Ignored if already settled.
    pub fn resolve(&self, value: T) {
        self.settle(Ok(value));
    }

    /// Settle with an error. Ignored if already settled.
    pub fn reject(&self, error: Error) {
        self.settle(Err(error));
    }

    /// Whether the completion has been settled either way.
    pub fn is_settled(&self) -> bool {
        self.state.0.lock().settled.is_some()
    }
}

impl<T: Clone> Completion<T> {
    /// Block until settled and return the outcome.
    pub fn wait(&self) -> Result<T> {
        let (lock, condvar) = &*self.state;
        let mut state = lock.lock();
        while state.settled.is_none() {
            condvar.wait(&mut state);
        }
        match &state.settled {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(error)) => Err(error.clone()),
            // Guarded by the wait loop above.
            None => Err(Error::InvalidState("unsettled completion")),
        }
    }
}

impl<T> std::fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("settled", &self.is_settled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    #[test]
    fn listeners_run_in_registration_order() {
        let emitter: EventEmitter<u32> = EventEmitter::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let seen = seen.clone();
            emitter.on("ev", move |_| {
                seen.lock().push(tag);
                Ok(())
            });
        }

        assert!(emitter.safe_emit("ev", &0));
        assert_eq!(*seen.lock(), vec!["a", "b", "c"]);
    }

    #[test]
    fn prepend_runs_first() {
        let emitter: EventEmitter<u32> = EventEmitter::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = seen.clone();
        emitter.on("ev", move |_| {
            s.lock().push("tail");
            Ok(())
        });
        let s = seen.clone();
        emitter.prepend("ev", move |_| {
            s.lock().push("head");
            Ok(())
        });

        emitter.safe_emit("ev", &0);
        assert_eq!(*seen.lock(), vec!["head", "tail"]);
    }

    #[test]
    fn once_runs_a_single_time() {
        let emitter: EventEmitter<u32> = EventEmitter::new();
        let calls = counter();

        let c = calls.clone();
        emitter.once("ev", move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        emitter.safe_emit("ev", &0);
        emitter.safe_emit("ev", &0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(emitter.listener_count("ev"), 0);
    }

    #[test]
    fn off_removes_one_listener() {
        let emitter: EventEmitter<u32> = EventEmitter::new();
        let calls = counter();

        let c = calls.clone();
        let id = emitter.on("ev", move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let c = calls.clone();
        emitter.on("ev", move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert!(emitter.off("ev", id));
        assert!(!emitter.off("ev", id));
        emitter.safe_emit("ev", &0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(emitter.listener_count("ev"), 1);
    }

    #[test]
    fn emit_propagates_and_aborts_remaining() {
        let emitter: EventEmitter<u32> = EventEmitter::new();
        let calls = counter();

        emitter.on("ev", |_| Err(Error::ListenerFault("boom".into())));
        let c = calls.clone();
        emitter.on("ev", move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert!(emitter.emit("ev", &0).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        // Failed listeners stay registered.
        assert_eq!(emitter.listener_count("ev"), 2);
    }

    #[test]
    fn safe_emit_contains_and_continues() {
        let emitter: EventEmitter<u32> = EventEmitter::new();
        let calls = counter();

        emitter.on("ev", |_| Err(Error::ListenerFault("boom".into())));
        let c = calls.clone();
        emitter.on("ev", move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert!(emitter.safe_emit("ev", &0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn emit_reports_whether_listeners_existed() {
        let emitter: EventEmitter<u32> = EventEmitter::new();
        assert!(!emitter.safe_emit("ev", &0));
        emitter.on("ev", |_| Ok(()));
        assert!(emitter.safe_emit("ev", &0));
    }

    #[test]
    fn duplicate_registration_is_allowed() {
        let emitter: EventEmitter<u32> = EventEmitter::new();
        let calls = counter();
        for _ in 0..2 {
            let c = calls.clone();
            emitter.on("ev", move |_| {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        emitter.safe_emit("ev", &0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn completion_first_settlement_wins() {
        let completion: Completion<u32> = Completion::new();
        completion.resolve(7);
        completion.reject(Error::InvalidState("late"));
        assert_eq!(completion.wait().ok(), Some(7));
    }

    #[test]
    fn completion_wait_across_threads() {
        let completion: Completion<&'static str> = Completion::new();
        let remote = completion.clone();
        let settler = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            remote.resolve("done");
        });
        assert_eq!(completion.wait().ok(), Some("done"));
        settler.join().ok();
    }
}
