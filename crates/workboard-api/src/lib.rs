//! HTTP side of the workboard client.
//!
//! Provides:
//! - A request client that normalizes every backend response
//! - Bearer credential storage and the session guard
//! - Typed endpoint wrappers
//! - Debounced user search
//! - Optimistic mutations with rollback, and the task board built on them

pub mod auth;
pub mod board;
pub mod client;
pub mod endpoints;
pub mod optimistic;
pub mod search;
pub mod session;
pub mod types;

pub use auth::{AuthTokenStore, Credential, CredentialStorage, FileStorage, MemoryStorage};
pub use board::TaskBoard;
pub use client::{ApiRequest, ApiResponse, RequestBody, RequestClient};
pub use endpoints::WorkboardApi;
pub use optimistic::{MutationError, OptimisticStore, StoreEvent};
pub use search::{DebouncedSearch, Region, SearchKey, SearchSource, SearchState};
pub use session::{AuthGuard, LoginOutcome, Session};
pub use types::{Alarm, Task, TaskStatus, UserSummary};
