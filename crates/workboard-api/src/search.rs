//! Debounced type-ahead search.
//!
//! Keystrokes update the visible input immediately; the remote lookup runs
//! only after a quiet period with no further input. Every keystroke bumps a
//! generation counter and aborts the previous timer, and a lookup whose
//! generation is no longer current never publishes its results.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use workboard_common::ApiError;

use crate::endpoints::WorkboardApi;
use crate::types::UserSummary;

/// Something a search result can be excluded by.
pub trait SearchKey {
    fn search_key(&self) -> String;
}

impl SearchKey for UserSummary {
    fn search_key(&self) -> String {
        self.user_id.as_str().to_string()
    }
}

/// Backend lookup behind a [`DebouncedSearch`].
#[async_trait]
pub trait SearchSource: Send + Sync + 'static {
    type Item: SearchKey + Clone + Send + Sync + 'static;

    async fn search(&self, query: &str) -> Result<Vec<Self::Item>, ApiError>;
}

#[async_trait]
impl SearchSource for Arc<WorkboardApi> {
    type Item = UserSummary;

    async fn search(&self, query: &str) -> Result<Vec<UserSummary>, ApiError> {
        self.search_users(query).await
    }
}

/// Screen-space rectangle of the search widget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Region {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn contains(&self, px: f64, py: f64) -> bool {
        px >= self.x && px <= self.x + self.width && py >= self.y && py <= self.y + self.height
    }
}

/// What the widget renders.
#[derive(Debug, Clone)]
pub struct SearchState<T> {
    pub input: String,
    pub results: Vec<T>,
    pub open: bool,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> Default for SearchState<T> {
    fn default() -> Self {
        Self {
            input: String::new(),
            results: Vec::new(),
            open: false,
            loading: false,
            error: None,
        }
    }
}

struct Inner<S: SearchSource> {
    source: S,
    delay: Duration,
    max_results: usize,
    generation: AtomicU64,
    pending: Mutex<Option<JoinHandle<()>>>,
    excluded: Mutex<HashSet<String>>,
    region: Mutex<Option<Region>>,
    state: watch::Sender<SearchState<S::Item>>,
}

impl<S: SearchSource> Inner<S> {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn cancel_pending(&self) {
        if let Some(handle) = self.pending.lock().unwrap_or_else(PoisonError::into_inner).take() {
            handle.abort();
        }
    }

    async fn run_lookup(self: Arc<Self>, generation: u64, query: String) {
        tokio::time::sleep(self.delay).await;
        if !self.is_current(generation) {
            return;
        }
        self.state.send_modify(|s| s.loading = true);
        debug!(query = %query, "search lookup");

        let result = self.source.search(&query).await;
        if !self.is_current(generation) {
            debug!(query = %query, "discarding stale search results");
            return;
        }

        let excluded = self
            .excluded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        self.state.send_modify(|s| {
            s.loading = false;
            match result {
                Ok(items) => {
                    s.results = items
                        .into_iter()
                        .filter(|item| !excluded.contains(&item.search_key()))
                        .take(self.max_results)
                        .collect();
                    s.error = None;
                    s.open = true;
                }
                Err(e) => {
                    warn!(query = %query, error = %e, "search lookup failed");
                    s.results.clear();
                    s.error = Some(e.user_message());
                    s.open = false;
                }
            }
        });
    }
}

/// Debounced remote search with exclusion filtering and outside-click close.
///
/// Dropping the search aborts any scheduled lookup.
pub struct DebouncedSearch<S: SearchSource> {
    inner: Arc<Inner<S>>,
}

impl<S: SearchSource> DebouncedSearch<S> {
    pub fn new(source: S, delay: Duration) -> Self {
        Self::with_limit(source, delay, usize::MAX)
    }

    pub fn with_limit(source: S, delay: Duration, max_results: usize) -> Self {
        let (state, _) = watch::channel(SearchState::default());
        Self {
            inner: Arc::new(Inner {
                source,
                delay,
                max_results,
                generation: AtomicU64::new(0),
                pending: Mutex::new(None),
                excluded: Mutex::new(HashSet::new()),
                region: Mutex::new(None),
                state,
            }),
        }
    }

    /// Record a keystroke. Must be called from within a Tokio runtime.
    pub fn on_input(&self, query: &str) {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.cancel_pending();
        let query = query.to_string();

        if query.trim().is_empty() {
            self.inner.state.send_modify(|s| {
                s.input = query;
                s.results.clear();
                s.open = false;
                s.loading = false;
                s.error = None;
            });
            return;
        }

        // The superseded lookup will never clear its own flag.
        self.inner.state.send_modify(|s| {
            s.input = query.clone();
            s.loading = false;
        });
        let handle = tokio::spawn(Arc::clone(&self.inner).run_lookup(generation, query));
        *self.inner.pending.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// Replace the set of keys filtered out of every result list.
    pub fn set_excluded<I>(&self, keys: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let keys: HashSet<String> = keys.into_iter().map(Into::into).collect();
        self.inner.state.send_modify(|s| {
            s.results.retain(|item| !keys.contains(&item.search_key()));
        });
        *self.inner.excluded.lock().unwrap_or_else(PoisonError::into_inner) = keys;
    }

    /// Mark an item as selected: it disappears from the current and future results.
    pub fn exclude(&self, key: impl Into<String>) {
        let key = key.into();
        self.inner.state.send_modify(|s| s.results.retain(|item| item.search_key() != key));
        self.inner
            .excluded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key);
    }

    /// Register the widget's bounds for outside-click detection.
    pub fn set_region(&self, region: Region) {
        *self.inner.region.lock().unwrap_or_else(PoisonError::into_inner) = Some(region);
    }

    /// Feed a pointer press. A press outside the registered region closes
    /// the dropdown; with no region registered nothing happens.
    pub fn on_pointer_down(&self, x: f64, y: f64) {
        let region = *self.inner.region.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(region) = region {
            if !region.contains(x, y) {
                self.close();
            }
        }
    }

    pub fn close(&self) {
        self.inner.state.send_modify(|s| s.open = false);
    }

    pub fn snapshot(&self) -> SearchState<S::Item> {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState<S::Item>> {
        self.inner.state.subscribe()
    }
}

impl<S: SearchSource> Drop for DebouncedSearch<S> {
    fn drop(&mut self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.cancel_pending();
    }
}
