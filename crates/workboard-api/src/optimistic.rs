//! Local-first mutations with rollback.
//!
//! Each entity keeps its last server-confirmed value plus an ordered list of
//! pending edits. The value observers see is always the confirmed value with
//! every pending edit folded over it, so when one edit fails and is removed,
//! the edits queued behind it stay applied.
//!
//! Commits for the same entity run one at a time in the order `apply` was
//! called: every edit takes a ticket when it is staged and waits until the
//! entity is serving that ticket.

use std::collections::{BTreeSet, HashMap};
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};
use workboard_common::ApiError;

type Mutate<V> = Arc<dyn Fn(&V) -> V + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum MutationError {
    #[error("unknown entity {0}")]
    UnknownEntity(String),

    #[error(transparent)]
    Commit(#[from] ApiError),
}

/// Change notifications for observers of the store.
#[derive(Debug, Clone)]
pub enum StoreEvent<K, V> {
    /// An edit was applied locally; the remote commit has not settled.
    Applied { id: K, value: V },
    /// The server accepted an edit.
    Confirmed { id: K, value: V },
    /// The server rejected an edit; `value` is what is shown now.
    Reverted { id: K, value: V, error: ApiError },
    /// Authoritative values were loaded.
    Reloaded,
}

struct PendingEdit<V> {
    ticket: u64,
    mutate: Mutate<V>,
}

struct Entry<V> {
    confirmed: V,
    local: V,
    pending: Vec<PendingEdit<V>>,
    next_ticket: u64,
    finished: BTreeSet<u64>,
    serving: watch::Sender<u64>,
}

impl<V: Clone> Entry<V> {
    fn new(value: V) -> Self {
        let (serving, _) = watch::channel(0);
        Self {
            confirmed: value.clone(),
            local: value,
            pending: Vec::new(),
            next_ticket: 0,
            finished: BTreeSet::new(),
            serving,
        }
    }

    fn recompute(&mut self) {
        self.local = self
            .pending
            .iter()
            .fold(self.confirmed.clone(), |value, edit| (edit.mutate)(&value));
    }

    fn take_edit(&mut self, ticket: u64) -> Option<PendingEdit<V>> {
        let index = self.pending.iter().position(|e| e.ticket == ticket)?;
        Some(self.pending.remove(index))
    }

    /// Mark `ticket` done and move the serving counter past every finished ticket.
    fn finish(&mut self, ticket: u64) {
        self.finished.insert(ticket);
        let mut serving = *self.serving.borrow();
        while self.finished.remove(&serving) {
            serving += 1;
        }
        self.serving.send_replace(serving);
    }
}

struct Shared<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
    events: broadcast::Sender<StoreEvent<K, V>>,
}

impl<K, V> Shared<K, V> {
    fn lock(&self) -> MutexGuard<'_, HashMap<K, Entry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Keyed store of locally editable values.
pub struct OptimisticStore<K, V> {
    shared: Arc<Shared<K, V>>,
}

impl<K, V> Clone for OptimisticStore<K, V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K, V> Default for OptimisticStore<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> OptimisticStore<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            shared: Arc::new(Shared {
                entries: Mutex::new(HashMap::new()),
                events,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent<K, V>> {
        self.shared.events.subscribe()
    }

    fn emit(&self, event: StoreEvent<K, V>) {
        let _ = self.shared.events.send(event);
    }

    /// Current local value (confirmed value plus pending edits).
    pub fn get(&self, id: &K) -> Option<V> {
        self.shared.lock().get(id).map(|e| e.local.clone())
    }

    pub fn confirmed(&self, id: &K) -> Option<V> {
        self.shared.lock().get(id).map(|e| e.confirmed.clone())
    }

    pub fn pending_count(&self, id: &K) -> usize {
        self.shared.lock().get(id).map_or(0, |e| e.pending.len())
    }

    pub fn snapshot(&self) -> Vec<(K, V)> {
        self.shared
            .lock()
            .iter()
            .map(|(k, e)| (k.clone(), e.local.clone()))
            .collect()
    }

    /// Set the authoritative value for one entity. Pending edits stay applied on top.
    pub fn insert(&self, id: K, value: V) {
        let mut entries = self.shared.lock();
        match entries.get_mut(&id) {
            Some(entry) => {
                entry.confirmed = value;
                entry.recompute();
            }
            None => {
                entries.insert(id, Entry::new(value));
            }
        }
    }

    /// Load a full authoritative list. Entities absent from the list are
    /// dropped unless they still have edits in flight.
    pub fn replace_all(&self, values: impl IntoIterator<Item = (K, V)>) {
        {
            let mut entries = self.shared.lock();
            let incoming: HashMap<K, V> = values.into_iter().collect();
            entries.retain(|k, e| incoming.contains_key(k) || !e.pending.is_empty());
            for (id, value) in incoming {
                match entries.get_mut(&id) {
                    Some(entry) => {
                        entry.confirmed = value;
                        entry.recompute();
                    }
                    None => {
                        entries.insert(id, Entry::new(value));
                    }
                }
            }
        }
        self.emit(StoreEvent::Reloaded);
    }

    /// Apply `mutate` locally right away and commit it remotely in turn.
    ///
    /// The local change and the `Applied` event happen before this returns;
    /// the returned future drives the commit. `commit` receives the value to
    /// persist and may answer with a server value that supersedes it. On
    /// failure the edit is removed, the local value is recomputed, and the
    /// error is returned. Dropping the future before it settles abandons the
    /// edit the same way.
    pub fn apply<M, C, Fut>(
        &self,
        id: K,
        mutate: M,
        commit: C,
    ) -> impl Future<Output = Result<V, MutationError>> + Send + 'static
    where
        M: Fn(&V) -> V + Send + Sync + 'static,
        C: FnOnce(V) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Option<V>, ApiError>> + Send + 'static,
    {
        let staged = self.stage(id, Arc::new(mutate));
        async move {
            let (mut ticket, mut turn) = staged?;
            if turn.wait_for(|serving| *serving == ticket.ticket).await.is_err() {
                ticket.abandon();
                return Err(MutationError::UnknownEntity(format!("{:?}", ticket.id)));
            }

            let Some(proposed) = ticket.proposed() else {
                ticket.abandon();
                return Err(MutationError::UnknownEntity(format!("{:?}", ticket.id)));
            };
            debug!(id = ?ticket.id, ticket = ticket.ticket, "committing optimistic edit");
            let outcome = commit(proposed.clone()).await;
            ticket.settle(proposed, outcome)
        }
    }

    fn stage(&self, id: K, mutate: Mutate<V>) -> Result<(Ticket<K, V>, watch::Receiver<u64>), MutationError> {
        let (ticket, turn, value) = {
            let mut entries = self.shared.lock();
            let entry = entries
                .get_mut(&id)
                .ok_or_else(|| MutationError::UnknownEntity(format!("{id:?}")))?;
            let ticket = entry.next_ticket;
            entry.next_ticket += 1;
            entry.local = mutate(&entry.local);
            entry.pending.push(PendingEdit { ticket, mutate });
            (ticket, entry.serving.subscribe(), entry.local.clone())
        };
        self.emit(StoreEvent::Applied {
            id: id.clone(),
            value,
        });
        let ticket = Ticket {
            store: self.clone(),
            id,
            ticket,
            done: false,
        };
        Ok((ticket, turn))
    }
}

/// A staged edit waiting for, or holding, its entity's commit turn.
struct Ticket<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    store: OptimisticStore<K, V>,
    id: K,
    ticket: u64,
    done: bool,
}

impl<K, V> Ticket<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// The value to persist: this edit applied to the confirmed value. Every
    /// earlier edit has settled by now, so the confirmed value reflects them.
    fn proposed(&self) -> Option<V> {
        let entries = self.store.shared.lock();
        let entry = entries.get(&self.id)?;
        let edit = entry.pending.iter().find(|e| e.ticket == self.ticket)?;
        Some((edit.mutate)(&entry.confirmed))
    }

    fn settle(mut self, proposed: V, outcome: Result<Option<V>, ApiError>) -> Result<V, MutationError> {
        self.done = true;
        let (event, result) = {
            let mut entries = self.store.shared.lock();
            let Some(entry) = entries.get_mut(&self.id) else {
                return Err(MutationError::UnknownEntity(format!("{:?}", self.id)));
            };
            entry.take_edit(self.ticket);
            let settled = match outcome {
                Ok(server_value) => {
                    entry.confirmed = server_value.unwrap_or(proposed);
                    entry.recompute();
                    (
                        StoreEvent::Confirmed {
                            id: self.id.clone(),
                            value: entry.local.clone(),
                        },
                        Ok(entry.confirmed.clone()),
                    )
                }
                Err(error) => {
                    entry.recompute();
                    warn!(id = ?self.id, error = %error, "optimistic edit rejected; rolled back");
                    (
                        StoreEvent::Reverted {
                            id: self.id.clone(),
                            value: entry.local.clone(),
                            error: error.clone(),
                        },
                        Err(MutationError::Commit(error)),
                    )
                }
            };
            entry.finish(self.ticket);
            settled
        };
        self.store.emit(event);
        result
    }

    fn abandon(&mut self) {
        if self.done {
            return;
        }
        self.done = true;
        let mut entries = self.store.shared.lock();
        if let Some(entry) = entries.get_mut(&self.id) {
            if entry.take_edit(self.ticket).is_some() {
                entry.recompute();
            }
            entry.finish(self.ticket);
        }
    }
}

impl<K, V> Drop for Ticket<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.abandon();
    }
}
