// ── Interest registry ──
//
// Per-consumer demand, merged into one polling set. Every mutation
// refolds the union under the lock and publishes it through an
// `Observable`, so identical unions never reach the controller twice.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace};
use uuid::Uuid;

use crate::model::Command;
use crate::stream::{Observable, ValueStream};

/// Opaque handle for one consumer's demand entry.
///
/// Tokens are unique per [`InterestRegistry::make_token`] call and carry
/// no ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterestToken(Uuid);

impl fmt::Display for InterestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.as_simple())
    }
}

/// Shared registry of consumer demand.
///
/// Cheaply cloneable; clones share the same demand map. All operations
/// are total: unknown tokens are no-ops, never errors.
#[derive(Clone, Default)]
pub struct InterestRegistry {
    inner: Arc<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    /// Token -> demanded commands. Entries are never empty.
    demand: Mutex<HashMap<InterestToken, HashSet<Command>>>,
    union: Observable<Arc<HashSet<Command>>>,
}

impl InterestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh token. Does not touch the union.
    pub fn make_token(&self) -> InterestToken {
        InterestToken(Uuid::new_v4())
    }

    /// Set a token's full demand, overwriting any prior set. An empty set
    /// removes the token.
    pub fn replace(&self, token: InterestToken, commands: impl IntoIterator<Item = Command>) {
        let commands: HashSet<Command> = commands.into_iter().collect();
        self.mutate(token, |entry| *entry = commands);
    }

    /// Add commands to a token's existing demand.
    pub fn add(&self, token: InterestToken, commands: impl IntoIterator<Item = Command>) {
        self.mutate(token, |entry| entry.extend(commands));
    }

    /// Remove commands from a token's demand.
    pub fn remove(&self, token: InterestToken, commands: impl IntoIterator<Item = Command>) {
        let commands: HashSet<Command> = commands.into_iter().collect();
        self.mutate(token, |entry| entry.retain(|c| !commands.contains(c)));
    }

    /// Drop a token's demand entirely. Safe from any teardown path.
    pub fn clear(&self, token: InterestToken) {
        self.mutate(token, HashSet::clear);
    }

    /// Current union of every token's demand.
    pub fn union(&self) -> Arc<HashSet<Command>> {
        self.inner.union.get()
    }

    /// Subscribe to union changes. Only value changes are delivered.
    pub fn subscribe(&self) -> ValueStream<Arc<HashSet<Command>>> {
        self.inner.union.subscribe()
    }

    pub(crate) fn union_receiver(&self) -> tokio::sync::watch::Receiver<Arc<HashSet<Command>>> {
        self.inner.union.receiver()
    }

    /// A single token's demand, if it has any.
    pub fn demand(&self, token: InterestToken) -> Option<HashSet<Command>> {
        self.lock().get(&token).cloned()
    }

    /// Number of tokens with non-empty demand.
    pub fn consumer_count(&self) -> usize {
        self.lock().len()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, HashMap<InterestToken, HashSet<Command>>> {
        self.inner
            .demand
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `f` to the token's entry, drop it if it ended up empty, then
    /// refold and publish the union while still holding the lock so
    /// concurrent mutations publish in the order they were applied.
    fn mutate(&self, token: InterestToken, f: impl FnOnce(&mut HashSet<Command>)) {
        let mut demand = self.lock();

        let mut entry = demand.remove(&token).unwrap_or_default();
        f(&mut entry);
        if entry.is_empty() {
            trace!(%token, "token has no demand");
        } else {
            demand.insert(token, entry);
        }

        let union: HashSet<Command> = demand.values().flatten().copied().collect();
        let size = union.len();
        if self.inner.union.set(Arc::new(union)) {
            debug!(consumers = demand.len(), commands = size, "interest union changed");
        }
    }
}

impl fmt::Debug for InterestRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterestRegistry")
            .field("consumers", &self.consumer_count())
            .field("union", &self.union())
            .finish()
    }
}
