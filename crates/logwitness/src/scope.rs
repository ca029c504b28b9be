//! Logging scopes
//!
//! A scope attaches key/value properties to every message logged while it is
//! open. Scope state is a small tagged union ([`ScopeState`]); callers convert
//! their data into it up front instead of the engine inspecting arbitrary
//! values.
//!
//! Each thread gets its own stack inside a [`ScopeStack`], so handlers
//! running on different threads never see each other's properties. Frames
//! are pushed by [`ScopeStack::push`] and released by the returned
//! [`ScopeGuard`], which can only be released once. Releasing a guard that
//! is not on top of its thread's stack removes exactly that frame and
//! reports [`ScopeError::OutOfOrder`].
//!
//! # Async code
//!
//! Stacks are keyed by OS thread, not by task. A guard held across an
//! `.await` would decorate whatever other task runs on that thread in the
//! meantime, and would be lost if its own task resumed elsewhere. To rule
//! that out, [`ScopeGuard`] is `!Send`: a future holding one across an
//! `.await` cannot be given to `tokio::spawn`. Open and close scopes inside
//! the synchronous stretch between two `.await` points:
//!
//! ```ignore
//! async fn handle(ctx: &LogValidationContext, id: &str) {
//!     {
//!         let _scope = ctx.begin_scope([("RequestId", id)]);
//!         ctx.log("http", LogLevel::Information, None, id, None, |s, _| format!("start {s}"));
//!     }
//!     fetch().await;
//! }
//! ```
//!
//! Tasks multiplexed inside one future (`join!`, `select!`, `LocalSet`) are
//! not covered by the `Send` check and must follow the same rule.

use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::ThreadId;

use serde::Serialize;

use crate::error::ScopeError;

/// Property key used when a scope was opened with a single value.
pub const SCOPE_VALUE_KEY: &str = "Scope";

// ---------------------------------------------------------------------------
// ScopeState
// ---------------------------------------------------------------------------

/// The data a scope was opened with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeState {
    /// Ordered key/value pairs.
    Pairs(Vec<(String, String)>),
    /// A single value, stored under [`SCOPE_VALUE_KEY`].
    Value(String),
}

impl ScopeState {
    /// Flatten a serializable value into its top-level fields.
    ///
    /// Objects yield one pair per field (strings unquoted, `null` as an empty
    /// string, anything nested as compact JSON). Scalars yield a
    /// [`ScopeState::Value`]. Serialization errors yield no properties.
    #[must_use]
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(serde_json::Value::Object(map)) => Self::Pairs(
                map.into_iter()
                    .map(|(k, v)| (k, render_json_scalar(v)))
                    .collect(),
            ),
            Ok(serde_json::Value::Null) | Err(_) => Self::Pairs(Vec::new()),
            Ok(other) => Self::Value(render_json_scalar(other)),
        }
    }

    /// Properties contributed by this state, in order.
    #[must_use]
    pub fn into_properties(self) -> Vec<(String, String)> {
        match self {
            Self::Pairs(pairs) => pairs,
            Self::Value(value) => vec![(SCOPE_VALUE_KEY.to_string(), value)],
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Pairs(pairs) if pairs.is_empty())
    }
}

fn render_json_scalar(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl From<&str> for ScopeState {
    fn from(value: &str) -> Self {
        Self::Value(value.to_string())
    }
}

impl From<String> for ScopeState {
    fn from(value: String) -> Self {
        Self::Value(value)
    }
}

impl<K: Into<String>, V: Into<String>> From<Vec<(K, V)>> for ScopeState {
    fn from(pairs: Vec<(K, V)>) -> Self {
        Self::Pairs(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for ScopeState {
    fn from(pairs: [(K, V); N]) -> Self {
        Self::Pairs(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: Into<String>, V: Into<String>> From<BTreeMap<K, V>> for ScopeState {
    fn from(map: BTreeMap<K, V>) -> Self {
        Self::Pairs(map.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Hash maps have no order; pairs are sorted by key.
impl<K: Into<String>, V: Into<String>, S> From<HashMap<K, V, S>> for ScopeState {
    fn from(map: HashMap<K, V, S>) -> Self {
        let mut pairs: Vec<(String, String)> =
            map.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        Self::Pairs(pairs)
    }
}

// ---------------------------------------------------------------------------
// ScopeStack
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Frame {
    id: u64,
    properties: Vec<(String, String)>,
}

/// Per-thread stacks of open scopes.
#[derive(Debug, Default)]
pub struct ScopeStack {
    next_id: AtomicU64,
    threads: Mutex<HashMap<ThreadId, Vec<Frame>>>,
}

impl ScopeStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a scope on the calling thread.
    #[must_use = "the scope closes as soon as the guard is dropped"]
    pub fn push(self: &Arc<Self>, state: ScopeState) -> ScopeGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let thread = std::thread::current().id();
        self.lock()
            .entry(thread)
            .or_default()
            .push(Frame {
                id,
                properties: state.into_properties(),
            });
        ScopeGuard {
            stack: Arc::clone(self),
            thread,
            id,
            released: false,
            _not_send: PhantomData,
        }
    }

    /// Properties of the calling thread's open scopes, outermost first.
    #[must_use]
    pub fn current_properties(&self) -> Vec<(String, String)> {
        let thread = std::thread::current().id();
        self.lock()
            .get(&thread)
            .map(|frames| {
                frames
                    .iter()
                    .flat_map(|frame| frame.properties.iter().cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of open scopes on the calling thread.
    #[must_use]
    pub fn depth(&self) -> usize {
        let thread = std::thread::current().id();
        self.lock().get(&thread).map_or(0, Vec::len)
    }

    /// Forget every open scope on every thread.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn pop(&self, thread: ThreadId, id: u64) -> Result<(), ScopeError> {
        let mut threads = self.lock();
        let Some(frames) = threads.get_mut(&thread) else {
            return Err(ScopeError::Missing);
        };
        let Some(pos) = frames.iter().rposition(|frame| frame.id == id) else {
            return Err(ScopeError::Missing);
        };
        let depth = frames.len() - 1 - pos;
        frames.remove(pos);
        if frames.is_empty() {
            threads.remove(&thread);
        }
        if depth == 0 {
            Ok(())
        } else {
            Err(ScopeError::OutOfOrder { depth })
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ThreadId, Vec<Frame>>> {
        self.threads.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// ScopeGuard
// ---------------------------------------------------------------------------

/// Keeps a scope open until dropped or [`closed`](ScopeGuard::close).
///
/// The guard belongs to the thread that opened it and cannot be sent to
/// another one, so it cannot live across an `.await` in a spawned task:
///
/// ```compile_fail
/// fn assert_send<T: Send>() {}
/// assert_send::<logwitness::ScopeGuard>();
/// ```
#[derive(Debug)]
pub struct ScopeGuard {
    stack: Arc<ScopeStack>,
    thread: ThreadId,
    id: u64,
    released: bool,
    _not_send: PhantomData<*const ()>,
}

impl ScopeGuard {
    /// Close the scope and report whether the stack was consistent.
    ///
    /// The frame is removed even when an error is returned.
    pub fn close(mut self) -> Result<(), ScopeError> {
        self.released = true;
        self.stack.pop(self.thread, self.id)
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(err) = self.stack.pop(self.thread, self.id) {
            tracing::warn!(scope_id = self.id, error = %err, "scope released inconsistently");
        }
    }
}
