//! Quota ledger implementation
//!
//! The check-and-consume path runs as one atomic store update per
//! submission: lazy row creation counts as the first unit, a crossed reset
//! boundary absorbs the current request as the first unit of the new period
//! (never reset-then-increment), and the exceeded rejection carries the
//! caller's used/limit pair. Two racing requests at a reset boundary cannot
//! both win the reset because the whole decision executes under the
//! collection lock.

use crate::core::time::TimeProvider;
use crate::identity::Principal;
use crate::store::Collection;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Sentinel limit meaning "never blocks"
pub const UNLIMITED_QUOTA: i64 = -1;

/// Per-principal quota state as persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quota {
    pub used: u32,
    pub limit: i64,
    /// Next moment `used` snaps back; absent for unlimited principals
    pub reset_at: Option<DateTime<Utc>>,
}

impl Quota {
    pub fn is_unlimited(&self) -> bool {
        self.limit == UNLIMITED_QUOTA
    }
}

/// Ledger row for one principal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub principal_id: String,
    /// Absent quota is malformed state, surfaced as an internal error
    pub quota: Option<Quota>,
    pub created_at: DateTime<Utc>,
}

/// Ledger policy knobs
#[derive(Debug, Clone)]
pub struct QuotaConfig {
    /// Daily allowance for anonymous principals
    pub anonymous_limit: i64,
    /// Allowance for authenticated principals (unlimited by default)
    pub authenticated_limit: i64,
    /// Reset window for finite limits
    pub reset_window: Duration,
    /// Retention for anonymous ledger rows (store TTL, not ledger logic)
    pub anonymous_retention: Duration,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            anonymous_limit: 3,
            authenticated_limit: UNLIMITED_QUOTA,
            reset_window: Duration::hours(24),
            anonymous_retention: Duration::hours(24),
        }
    }
}

/// Usage reported back on an allowed submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaUsage {
    pub used: u32,
    pub limit: i64,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum QuotaError {
    #[error(
        "Daily scan limit exceeded. You have used {used}/{limit} scans today. \
         Sign in for unlimited scans."
    )]
    Exceeded { used: u32, limit: i64 },

    #[error("Invalid quota data for principal {principal_id}")]
    InvalidLedger { principal_id: String },
}

pub type QuotaResult<T> = Result<T, QuotaError>;

/// Per-principal counter with a daily reset boundary
#[derive(Clone)]
pub struct QuotaLedger {
    users: Collection<LedgerRecord>,
    anonymous_users: Collection<LedgerRecord>,
    time: Arc<dyn TimeProvider>,
    config: QuotaConfig,
}

impl QuotaLedger {
    pub fn new(
        users: Collection<LedgerRecord>,
        anonymous_users: Collection<LedgerRecord>,
        time: Arc<dyn TimeProvider>,
        config: QuotaConfig,
    ) -> Self {
        Self {
            users,
            anonymous_users,
            time,
            config,
        }
    }

    /// Gate-check and consume one unit of quota for the principal
    ///
    /// On `Ok` the incremented usage has already been durably recorded.
    pub fn check_and_consume(&self, principal: &Principal) -> QuotaResult<QuotaUsage> {
        let now = self.time.now();
        let (collection, default_limit, retention) = if principal.is_authenticated() {
            (&self.users, self.config.authenticated_limit, None)
        } else {
            (
                &self.anonymous_users,
                self.config.anonymous_limit,
                Some(self.config.anonymous_retention),
            )
        };
        let window = self.config.reset_window;

        let decision = collection.update(&principal.id, |entry| {
            let record = match entry.value.as_mut() {
                None => {
                    // First submission from this principal: the row itself
                    // is the first unit of consumption.
                    let reset_at = (default_limit != UNLIMITED_QUOTA).then(|| now + window);
                    entry.value = Some(LedgerRecord {
                        principal_id: principal.id.clone(),
                        quota: Some(Quota {
                            used: 1,
                            limit: default_limit,
                            reset_at,
                        }),
                        created_at: now,
                    });
                    if let Some(retention) = retention {
                        entry.expires_at = Some(now + retention);
                    }
                    return Ok(QuotaUsage {
                        used: 1,
                        limit: default_limit,
                    });
                }
                Some(record) => record,
            };

            let quota = match record.quota.as_mut() {
                Some(quota) => quota,
                None => {
                    return Err(QuotaError::InvalidLedger {
                        principal_id: principal.id.clone(),
                    })
                }
            };

            if quota.is_unlimited() {
                // Informational only; never blocks.
                quota.used += 1;
                return Ok(QuotaUsage {
                    used: quota.used,
                    limit: quota.limit,
                });
            }

            if quota.reset_at.is_some_and(|reset_at| now >= reset_at) {
                // Reset boundary: the current request is the first unit of
                // the new period.
                quota.used = 1;
                quota.reset_at = Some(now + window);
                return Ok(QuotaUsage {
                    used: quota.used,
                    limit: quota.limit,
                });
            }

            if i64::from(quota.used) >= quota.limit {
                return Err(QuotaError::Exceeded {
                    used: quota.used,
                    limit: quota.limit,
                });
            }

            quota.used += 1;
            Ok(QuotaUsage {
                used: quota.used,
                limit: quota.limit,
            })
        });

        match &decision {
            Ok(usage) => log::debug!(
                "Quota consumed for {}: {}/{}",
                principal.id,
                usage.used,
                usage.limit
            ),
            Err(err) => log::info!("Quota rejected for {}: {}", principal.id, err),
        }
        decision
    }

    /// Current usage without consuming, for display purposes
    pub fn usage(&self, principal: &Principal) -> Option<QuotaUsage> {
        let collection = if principal.is_authenticated() {
            &self.users
        } else {
            &self.anonymous_users
        };
        collection
            .get(&principal.id)
            .and_then(|record| record.quota)
            .map(|quota| QuotaUsage {
                used: quota.used,
                limit: quota.limit,
            })
    }
}
