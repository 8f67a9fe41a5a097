//! Domain model (IDs, operations, status views, events, errors).

pub mod errors;
pub mod events;
pub mod ids;
pub mod operation;
pub mod status;

pub use self::errors::{ExecutorError, QueueError, StorageError};
pub use self::events::{QueueEvent, QueueEventKind};
pub use self::ids::OperationId;
pub use self::operation::{EntityKind, OperationKind, OperationStatus, QueuedOperation};
pub use self::status::{DrainReport, QueueStatus};
