//! Per-call session lifecycle (C1, §3, §4.1): the `Session` state held for
//! the duration of a call, the `SessionManager` that creates/looks up/
//! destroys sessions and coordinates with the cross-worker store, and the
//! serializable `CrossWorkerRecord` used to resume a call on another worker.

pub mod error;
pub mod manager;
pub mod types;

pub use error::{Result, SessionError};
pub use manager::SessionManager;
pub use types::{CrossWorkerRecord, Session};
