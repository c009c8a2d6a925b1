//! Scan submission service
//!
//! Wires the external interfaces together: identity resolution, URL
//! validation, quota gating, scan creation, and the spawned background run
//! that drives the pipeline and records its outcome. Pipeline errors are
//! classified and written to the scan document; they never cross the task
//! boundary.

pub mod error;
pub mod scan_service;

pub use error::{ServiceError, ServiceResult};
pub use scan_service::{ScanService, SubmitReceipt};
