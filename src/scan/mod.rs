//! Scan Lifecycle
//!
//! The state machine for a single analysis request: queued → running →
//! (succeeded | failed), with monotone progress, a taxonomy of error codes,
//! and out-of-band cancellation that is sticky once recorded.

pub mod lifecycle;
pub mod types;

pub use lifecycle::{LifecycleError, LifecycleResult, ScanLifecycle};
pub use types::{classify_failure_message, ScanErrorCode, ScanRecord, ScanStatus};
