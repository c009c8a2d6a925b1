//! Quota Ledger
//!
//! Per-principal scan counters with a daily reset boundary. Authenticated
//! principals default to the unlimited sentinel; anonymous principals get a
//! small daily allowance keyed by their hashed IP. Every submission performs
//! exactly one ledger mutation, and quota is charged for attempts, not
//! successes; there are no refunds.

pub mod ledger;

pub use ledger::{
    LedgerRecord, Quota, QuotaConfig, QuotaError, QuotaLedger, QuotaResult, QuotaUsage,
    UNLIMITED_QUOTA,
};
