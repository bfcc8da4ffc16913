pub mod errors;
pub mod events;
pub mod id;
pub mod notifications;

pub use errors::{ApiError, ConfigError, ErrorKind, WorkboardError};
pub use events::{EventBus, UiEvent};
pub use id::{new_id, EntityId, UserId};
pub use notifications::{Toast, ToastLevel, ToastQueue};

pub type Result<T> = std::result::Result<T, WorkboardError>;
