//! Persisted, time-bounded exclusivity for synchronization runs.
//!
//! A scope has at most one lease row. The row cycles through
//! `held -> released -> held ...`; a held row older than its timeout is
//! stale and can be taken over by the next acquirer. Staleness is never
//! written, it is derived from the clock at acquisition time.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::FutureExt;
use group_sync_sdk::{GroupId, SyncLease, TenantId};
use uuid::Uuid;

use super::clock::Clock;
use super::error::{DomainError, LeaseDenial};
use super::repo::LeaseRepository;

/// What a lease protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseScope {
    Tenant(TenantId),
    Group {
        tenant_id: TenantId,
        group_id: GroupId,
    },
}

impl LeaseScope {
    /// Storage key of the scope's lease row.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::Tenant(tenant_id) => format!("tenant:{tenant_id}"),
            Self::Group {
                tenant_id,
                group_id,
            } => format!("group:{tenant_id}:{group_id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeasePolicy {
    pub timeout: Duration,
    /// Minimum time since the last completed run. Tenant scope only.
    pub threshold: Option<Duration>,
}

/// Upper bound on lease timeouts and thresholds: one year.
pub const MAX_LEASE_MINUTES: i64 = 365 * 24 * 60;

fn bounded_minutes(field: &'static str, value: i64, min: i64) -> Result<Duration, DomainError> {
    if !(min..=MAX_LEASE_MINUTES).contains(&value) {
        return Err(DomainError::validation(
            field,
            format!("must be between {min} and {MAX_LEASE_MINUTES} minutes"),
        ));
    }
    Duration::try_minutes(value)
        .ok_or_else(|| DomainError::validation(field, "duration out of range"))
}

impl LeasePolicy {
    /// # Errors
    ///
    /// `Validation` when `timeout` is not within `1..=MAX_LEASE_MINUTES`.
    pub fn minutes(timeout: i64) -> Result<Self, DomainError> {
        Ok(Self {
            timeout: bounded_minutes("timeout_minutes", timeout, 1)?,
            threshold: None,
        })
    }

    /// # Errors
    ///
    /// `Validation` when `threshold` is not within `0..=MAX_LEASE_MINUTES`.
    pub fn with_threshold_minutes(mut self, threshold: Option<i64>) -> Result<Self, DomainError> {
        self.threshold = threshold
            .map(|minutes| bounded_minutes("time_threshold_minutes", minutes, 0))
            .transpose()?;
        Ok(self)
    }
}

/// How an acquisition replaces the current row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquisition {
    /// No row exists yet.
    Fresh,
    /// The previous run released its lease.
    AfterRelease { previous_holder: Uuid },
    /// The previous run never released and its timeout has passed.
    StaleTakeover {
        previous_holder: Uuid,
        started_at: DateTime<Utc>,
    },
}

/// Decide whether a lease may be acquired given the current row.
///
/// A held lease is stale once `now` is strictly past `started_at + timeout`.
/// The threshold is measured from the previous run's end time.
///
/// # Errors
///
/// `LeaseDenial::Held` for a live lease, `LeaseDenial::RecentlyCompleted`
/// when the threshold has not yet elapsed.
pub fn evaluate(
    current: Option<&SyncLease>,
    policy: &LeasePolicy,
    now: DateTime<Utc>,
) -> Result<Acquisition, LeaseDenial> {
    let Some(lease) = current else {
        return Ok(Acquisition::Fresh);
    };

    match lease.ended_at {
        None if now - lease.started_at > policy.timeout => Ok(Acquisition::StaleTakeover {
            previous_holder: lease.holder_id,
            started_at: lease.started_at,
        }),
        None => Err(LeaseDenial::Held),
        Some(ended_at) => match policy.threshold {
            Some(threshold) if now - ended_at < threshold => Err(LeaseDenial::RecentlyCompleted),
            _ => Ok(Acquisition::AfterRelease {
                previous_holder: lease.holder_id,
            }),
        },
    }
}

/// Proof of a confirmed lease write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseGrant {
    pub scope_key: String,
    pub holder_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub acquisition: Acquisition,
}

pub struct LeaseCoordinator {
    repo: Arc<dyn LeaseRepository>,
    clock: Arc<dyn Clock>,
}

impl LeaseCoordinator {
    pub fn new(repo: Arc<dyn LeaseRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    /// Acquire the lease for `scope`.
    ///
    /// Read, evaluation and write form one compare-and-swap: if another
    /// acquirer changes the row between the read and the write, this call is
    /// denied. Storage failures fail closed.
    ///
    /// # Errors
    ///
    /// `DomainError::LeaseDenied` or `DomainError::Storage`.
    pub async fn acquire(
        &self,
        scope: &LeaseScope,
        policy: &LeasePolicy,
    ) -> Result<LeaseGrant, DomainError> {
        let scope_key = scope.key();
        let now = self.clock.now();
        let current = self.repo.find(&scope_key).await?;

        let acquisition = evaluate(current.as_ref(), policy, now).map_err(|reason| {
            match reason {
                LeaseDenial::Held => {
                    tracing::info!(scope = %scope_key, "lease denied: held by an active run");
                }
                LeaseDenial::RecentlyCompleted => tracing::info!(
                    scope = %scope_key,
                    "lease denied: previous run finished within the threshold"
                ),
            }
            DomainError::LeaseDenied {
                scope: scope_key.clone(),
                reason,
            }
        })?;

        let lease = SyncLease {
            scope_key: scope_key.clone(),
            holder_id: Uuid::new_v4(),
            started_at: now,
            ended_at: None,
            timeout_minutes: policy.timeout.num_minutes(),
        };

        let written = match acquisition {
            Acquisition::Fresh => self.repo.insert_if_absent(&lease).await?,
            Acquisition::AfterRelease { previous_holder } => {
                self.repo.replace(previous_holder, true, &lease).await?
            }
            Acquisition::StaleTakeover {
                previous_holder,
                started_at,
            } => {
                tracing::warn!(
                    scope = %scope_key,
                    previous_holder = %previous_holder,
                    stale_since = %started_at,
                    "taking over stale lease, previous run never released it"
                );
                self.repo.replace(previous_holder, false, &lease).await?
            }
        };

        if !written {
            tracing::info!(scope = %scope_key, "lease denied: lost the race to a concurrent acquirer");
            return Err(DomainError::LeaseDenied {
                scope: scope_key,
                reason: LeaseDenial::Held,
            });
        }

        tracing::debug!(scope = %scope_key, holder_id = %lease.holder_id, "lease granted");
        Ok(LeaseGrant {
            scope_key,
            holder_id: lease.holder_id,
            started_at: now,
            acquisition,
        })
    }

    /// Mark the grant's lease as released. A lease that was taken over in
    /// the meantime is left to its new holder.
    ///
    /// # Errors
    ///
    /// `DomainError::Storage`.
    pub async fn release(&self, grant: &LeaseGrant) -> Result<(), DomainError> {
        let released = self
            .repo
            .release(&grant.scope_key, grant.holder_id, self.clock.now())
            .await?;
        if released {
            tracing::debug!(scope = %grant.scope_key, "lease released");
        } else {
            tracing::warn!(
                scope = %grant.scope_key,
                holder_id = %grant.holder_id,
                "lease was taken over before release"
            );
        }
        Ok(())
    }

    /// Run `work` under the lease for `scope`, releasing it on every exit
    /// path including a panic, which is resumed after the release.
    ///
    /// # Errors
    ///
    /// Acquisition errors only; the outcome of `work` is returned as `T`.
    pub async fn with_lease<T, Fut>(
        &self,
        scope: &LeaseScope,
        policy: &LeasePolicy,
        work: Fut,
    ) -> Result<T, DomainError>
    where
        Fut: Future<Output = T> + Send,
    {
        let grant = self.acquire(scope, policy).await?;
        let outcome = AssertUnwindSafe(work).catch_unwind().await;

        if let Err(e) = self.release(&grant).await {
            tracing::error!(scope = %grant.scope_key, error = %e, "failed to release lease");
        }

        match outcome {
            Ok(value) => Ok(value),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}
