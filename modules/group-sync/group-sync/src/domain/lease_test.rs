#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use group_sync_sdk::SyncLease;
use parking_lot::Mutex;
use uuid::Uuid;

use super::clock::ManualClock;
use super::error::{DomainError, LeaseDenial};
use super::lease::{
    Acquisition, LeaseCoordinator, LeasePolicy, LeaseScope, MAX_LEASE_MINUTES, evaluate,
};
use super::repo::LeaseRepository;

// In-memory lease table with the same compare-and-swap semantics as storage.
#[derive(Default)]
struct MemoryLeases {
    rows: Mutex<HashMap<String, SyncLease>>,
    fail: AtomicBool,
}

impl MemoryLeases {
    fn check(&self) -> Result<(), DomainError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(DomainError::storage("connection reset"))
        } else {
            Ok(())
        }
    }

    fn get(&self, key: &str) -> Option<SyncLease> {
        self.rows.lock().get(key).cloned()
    }
}

#[async_trait]
impl LeaseRepository for MemoryLeases {
    async fn find(&self, scope_key: &str) -> Result<Option<SyncLease>, DomainError> {
        self.check()?;
        Ok(self.get(scope_key))
    }

    async fn insert_if_absent(&self, lease: &SyncLease) -> Result<bool, DomainError> {
        self.check()?;
        let mut rows = self.rows.lock();
        if rows.contains_key(&lease.scope_key) {
            return Ok(false);
        }
        rows.insert(lease.scope_key.clone(), lease.clone());
        Ok(true)
    }

    async fn replace(
        &self,
        observed_holder: Uuid,
        observed_released: bool,
        lease: &SyncLease,
    ) -> Result<bool, DomainError> {
        self.check()?;
        let mut rows = self.rows.lock();
        match rows.get_mut(&lease.scope_key) {
            Some(row)
                if row.holder_id == observed_holder
                    && row.ended_at.is_some() == observed_released =>
            {
                *row = lease.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(
        &self,
        scope_key: &str,
        holder_id: Uuid,
        ended_at: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        self.check()?;
        let mut rows = self.rows.lock();
        match rows.get_mut(scope_key) {
            Some(row) if row.holder_id == holder_id && row.ended_at.is_none() => {
                row.ended_at = Some(ended_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
}

fn lease(started_at: DateTime<Utc>, ended_at: Option<DateTime<Utc>>) -> SyncLease {
    SyncLease {
        scope_key: "tenant:t1".to_owned(),
        holder_id: Uuid::new_v4(),
        started_at,
        ended_at,
        timeout_minutes: 60,
    }
}

fn setup() -> (Arc<MemoryLeases>, Arc<ManualClock>, LeaseCoordinator) {
    let repo = Arc::new(MemoryLeases::default());
    let clock = Arc::new(ManualClock::new(t0()));
    let coordinator = LeaseCoordinator::new(repo.clone(), clock.clone());
    (repo, clock, coordinator)
}

#[test]
fn evaluate_decides_by_wall_clock() {
    let policy = LeasePolicy::minutes(60).unwrap();
    assert_eq!(evaluate(None, &policy, t0()), Ok(Acquisition::Fresh));

    let held = lease(t0(), None);
    assert_eq!(
        evaluate(Some(&held), &policy, t0() + Duration::minutes(30)),
        Err(LeaseDenial::Held)
    );
    assert_eq!(
        evaluate(Some(&held), &policy, t0() + Duration::minutes(60)),
        Err(LeaseDenial::Held)
    );
    assert!(matches!(
        evaluate(Some(&held), &policy, t0() + Duration::minutes(61)),
        Ok(Acquisition::StaleTakeover { .. })
    ));
}

#[test]
fn evaluate_threshold_uses_end_time() {
    let policy = LeasePolicy::minutes(60)
        .unwrap()
        .with_threshold_minutes(Some(60))
        .unwrap();
    // started long ago, finished recently
    let released = lease(t0() - Duration::hours(5), Some(t0() - Duration::minutes(10)));

    assert_eq!(
        evaluate(Some(&released), &policy, t0()),
        Err(LeaseDenial::RecentlyCompleted)
    );
    assert!(matches!(
        evaluate(Some(&released), &LeasePolicy::minutes(60).unwrap(), t0()),
        Ok(Acquisition::AfterRelease { .. })
    ));
    assert!(matches!(
        evaluate(Some(&released), &policy, t0() + Duration::minutes(51)),
        Ok(Acquisition::AfterRelease { .. })
    ));
}

#[test]
fn policy_rejects_out_of_range_minutes() {
    for timeout in [0, -5, MAX_LEASE_MINUTES + 1, i64::MAX] {
        assert!(
            matches!(LeasePolicy::minutes(timeout), Err(DomainError::Validation { .. })),
            "timeout {timeout} should be rejected"
        );
    }
    let policy = LeasePolicy::minutes(MAX_LEASE_MINUTES).unwrap();
    assert_eq!(policy.timeout, Duration::minutes(MAX_LEASE_MINUTES));

    assert!(policy.with_threshold_minutes(Some(0)).is_ok());
    assert!(matches!(
        policy.with_threshold_minutes(Some(i64::MAX)),
        Err(DomainError::Validation { .. })
    ));
}

#[tokio::test]
async fn second_acquire_is_denied_until_stale() {
    let (repo, clock, coordinator) = setup();
    let scope = LeaseScope::Tenant(Uuid::new_v4());
    let policy = LeasePolicy::minutes(60).unwrap();

    let first = coordinator.acquire(&scope, &policy).await.unwrap();
    assert_eq!(first.acquisition, Acquisition::Fresh);

    clock.advance(Duration::minutes(30));
    let denied = coordinator.acquire(&scope, &policy).await;
    assert!(matches!(
        denied,
        Err(DomainError::LeaseDenied {
            reason: LeaseDenial::Held,
            ..
        })
    ));

    clock.advance(Duration::minutes(31));
    let third = coordinator.acquire(&scope, &policy).await.unwrap();
    assert!(matches!(third.acquisition, Acquisition::StaleTakeover { .. }));

    let row = repo.get(&scope.key()).unwrap();
    assert_eq!(row.holder_id, third.holder_id);
    assert_eq!(row.started_at, t0() + Duration::minutes(61));
    assert_eq!(row.ended_at, None);

    // the crashed run coming back cannot release the new holder's lease
    coordinator.release(&first).await.unwrap();
    assert_eq!(repo.get(&scope.key()).unwrap().ended_at, None);
}

#[tokio::test]
async fn released_lease_can_be_reacquired() {
    let (repo, clock, coordinator) = setup();
    let scope = LeaseScope::Group {
        tenant_id: Uuid::new_v4(),
        group_id: Uuid::new_v4(),
    };
    let policy = LeasePolicy::minutes(60).unwrap();

    let grant = coordinator.acquire(&scope, &policy).await.unwrap();
    clock.advance(Duration::minutes(5));
    coordinator.release(&grant).await.unwrap();
    assert_eq!(
        repo.get(&scope.key()).unwrap().ended_at,
        Some(t0() + Duration::minutes(5))
    );

    let again = coordinator.acquire(&scope, &policy).await.unwrap();
    assert_eq!(
        again.acquisition,
        Acquisition::AfterRelease {
            previous_holder: grant.holder_id
        }
    );
}

#[tokio::test]
async fn storage_failure_fails_closed() {
    let (repo, _clock, coordinator) = setup();
    repo.fail.store(true, Ordering::SeqCst);

    let policy = LeasePolicy::minutes(60).unwrap();
    let result = coordinator
        .acquire(&LeaseScope::Tenant(Uuid::new_v4()), &policy)
        .await;

    assert!(matches!(result, Err(DomainError::Storage(_))));
}

#[tokio::test]
async fn concurrent_acquirers_get_at_most_one_grant() {
    let (_repo, _clock, coordinator) = setup();
    let coordinator = Arc::new(coordinator);
    let scope = LeaseScope::Tenant(Uuid::new_v4());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                coordinator
                    .acquire(&scope, &LeasePolicy::minutes(60).unwrap())
                    .await
                    .is_ok()
            })
        })
        .collect();

    let mut granted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            granted += 1;
        }
    }
    assert_eq!(granted, 1);
}

#[tokio::test]
async fn with_lease_releases_after_work() {
    let (repo, _clock, coordinator) = setup();
    let scope = LeaseScope::Tenant(Uuid::new_v4());

    let value = coordinator
        .with_lease(&scope, &LeasePolicy::minutes(60).unwrap(), async { 42 })
        .await
        .unwrap();

    assert_eq!(value, 42);
    assert!(repo.get(&scope.key()).unwrap().ended_at.is_some());
}

#[tokio::test]
async fn with_lease_releases_on_panic() {
    let (repo, _clock, coordinator) = setup();
    let coordinator = Arc::new(coordinator);
    let scope = LeaseScope::Tenant(Uuid::new_v4());

    let task = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            coordinator
                .with_lease::<(), _>(&scope, &LeasePolicy::minutes(60).unwrap(), async {
                    panic!("sync blew up");
                })
                .await
        })
    };

    assert!(task.await.unwrap_err().is_panic());
    assert!(repo.get(&scope.key()).unwrap().ended_at.is_some());
}

#[tokio::test]
async fn with_lease_does_not_run_work_when_denied() {
    let (_repo, _clock, coordinator) = setup();
    let scope = LeaseScope::Tenant(Uuid::new_v4());
    let _held = coordinator
        .acquire(&scope, &LeasePolicy::minutes(60).unwrap())
        .await
        .unwrap();

    let ran = AtomicBool::new(false);
    let result = coordinator
        .with_lease(&scope, &LeasePolicy::minutes(60).unwrap(), async {
            ran.store(true, Ordering::SeqCst);
        })
        .await;

    assert!(result.is_err());
    assert!(!ran.load(Ordering::SeqCst));
}
