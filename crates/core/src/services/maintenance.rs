//! Periodic maintenance: ending overdue polls and expiring stale invites.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pollhub_common::AppResult;
use tokio::time::interval;

use crate::services::organization::OrganizationService;
use crate::services::poll::PollService;

/// Work performed on every maintenance tick.
#[async_trait]
pub trait MaintenanceTasks: Send + Sync {
    /// Store ENDED for ACTIVE polls past their deadline.
    async fn end_expired_polls(&self, now: DateTime<Utc>) -> AppResult<u64>;

    /// Mark lapsed PENDING invites as EXPIRED.
    async fn expire_stale_invites(&self, now: DateTime<Utc>) -> AppResult<u64>;
}

/// [`MaintenanceTasks`] backed by the domain services.
#[derive(Clone)]
pub struct ServiceMaintenance {
    polls: PollService,
    organizations: OrganizationService,
}

impl ServiceMaintenance {
    #[must_use]
    pub const fn new(polls: PollService, organizations: OrganizationService) -> Self {
        Self {
            polls,
            organizations,
        }
    }
}

#[async_trait]
impl MaintenanceTasks for ServiceMaintenance {
    async fn end_expired_polls(&self, now: DateTime<Utc>) -> AppResult<u64> {
        self.polls.end_expired_polls(now).await
    }

    async fn expire_stale_invites(&self, now: DateTime<Utc>) -> AppResult<u64> {
        self.organizations.expire_stale_invites(now).await
    }
}

/// Rows touched by one maintenance pass. `None` marks a failed task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub polls_ended: Option<u64>,
    pub invites_expired: Option<u64>,
}

/// Run every task once. A failing task is logged and does not stop the other.
pub async fn run_once<T: MaintenanceTasks + ?Sized>(
    tasks: &T,
    now: DateTime<Utc>,
) -> MaintenanceReport {
    let polls_ended = match tasks.end_expired_polls(now).await {
        Ok(count) => {
            if count > 0 {
                tracing::info!(count, "Ended expired polls");
            }
            Some(count)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to end expired polls");
            None
        }
    };

    let invites_expired = match tasks.expire_stale_invites(now).await {
        Ok(count) => {
            if count > 0 {
                tracing::info!(count, "Expired stale invites");
            }
            Some(count)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to expire stale invites");
            None
        }
    };

    MaintenanceReport {
        polls_ended,
        invites_expired,
    }
}

/// Run the maintenance loop forever, one pass per `period`.
pub async fn run_maintenance<T: MaintenanceTasks + ?Sized>(tasks: Arc<T>, period: Duration) {
    tracing::info!(interval_secs = period.as_secs(), "Maintenance loop started");

    let mut ticker = interval(period);
    loop {
        ticker.tick().await;
        run_once(tasks.as_ref(), Utc::now()).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pollhub_common::AppError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeTasks {
        fail_polls: bool,
        calls: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl MaintenanceTasks for FakeTasks {
        async fn end_expired_polls(&self, _now: DateTime<Utc>) -> AppResult<u64> {
            self.calls.lock().map(|mut c| c.push("polls")).ok();
            if self.fail_polls {
                Err(AppError::Database("connection refused".to_string()))
            } else {
                Ok(2)
            }
        }

        async fn expire_stale_invites(&self, _now: DateTime<Utc>) -> AppResult<u64> {
            self.calls.lock().map(|mut c| c.push("invites")).ok();
            Ok(1)
        }
    }

    #[tokio::test]
    async fn test_run_once_reports_counts() {
        let tasks = FakeTasks::default();
        let report = run_once(&tasks, Utc::now()).await;

        assert_eq!(
            report,
            MaintenanceReport {
                polls_ended: Some(2),
                invites_expired: Some(1),
            }
        );
    }

    #[tokio::test]
    async fn test_failed_task_does_not_stop_the_other() {
        let tasks = FakeTasks {
            fail_polls: true,
            ..FakeTasks::default()
        };
        let report = run_once(&tasks, Utc::now()).await;

        assert_eq!(report.polls_ended, None);
        assert_eq!(report.invites_expired, Some(1));
        assert_eq!(*tasks.calls.lock().unwrap(), vec!["polls", "invites"]);
    }
}
