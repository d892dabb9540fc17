use std::time::Duration;

use chrono::TimeDelta;
use rolereaper_application::ReviewCoordinator;
use tracing::{info, warn};

/// Background loop settings.
#[derive(Debug, Clone, Copy)]
pub struct ReviewWorkerSettings {
    pub poll_interval: Duration,
    pub job_retention: TimeDelta,
}

/// Drains queued review jobs, prunes expired ones, then sleeps. Never returns.
pub async fn run(coordinator: ReviewCoordinator, settings: ReviewWorkerSettings) {
    let poll_interval_ms = u64::try_from(settings.poll_interval.as_millis()).unwrap_or(u64::MAX);
    info!(
        poll_interval_ms,
        job_retention_seconds = settings.job_retention.num_seconds(),
        "review worker started"
    );

    loop {
        poll_once(&coordinator, settings.job_retention).await;
        tokio::time::sleep(settings.poll_interval).await;
    }
}

/// Runs one worker iteration; failures are logged and the loop continues.
pub async fn poll_once(coordinator: &ReviewCoordinator, job_retention: TimeDelta) {
    match coordinator.run_pending().await {
        Ok(0) => {}
        Ok(processed) => info!(processed_count = processed, "review jobs processed"),
        Err(error) => warn!(error = %error, "failed to process queued review jobs"),
    }

    if let Err(error) = coordinator.prune_finished(job_retention).await {
        warn!(error = %error, "failed to prune finished review jobs");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeDelta, Utc};
    use rolereaper_application::{
        EnqueueReviewInput, ReviewConcurrency, ReviewCoordinator, ReviewJobStatus, ReviewService,
    };
    use rolereaper_core::{TenantId, UserIdentity};
    use rolereaper_domain::ReviewSubject;
    use rolereaper_infrastructure::{
        DirectorySnapshot, InMemoryDirectoryService, InMemoryPermissionCatalog,
        InMemoryReviewJobRepository, SnapshotUser, TenantSnapshot,
    };

    use super::poll_once;

    fn coordinator(tenant_id: TenantId) -> ReviewCoordinator {
        let snapshot = DirectorySnapshot {
            tenants: vec![TenantSnapshot {
                tenant_id,
                roles: Vec::new(),
                activities: Vec::new(),
                users: vec![SnapshotUser {
                    id: "u1".to_owned(),
                    display_name: None,
                    active_role_ids: Vec::new(),
                    eligible_role_ids: Vec::new(),
                }],
                groups: Vec::new(),
                ownerships: Vec::new(),
                audit_entries: Vec::new(),
            }],
        };

        ReviewCoordinator::new(
            Arc::new(InMemoryReviewJobRepository::new()),
            ReviewService::new(
                Arc::new(InMemoryPermissionCatalog::from_snapshot(&snapshot)),
                Arc::new(InMemoryDirectoryService::from_snapshot(&snapshot)),
                ReviewConcurrency::default(),
            ),
        )
    }

    #[tokio::test]
    async fn poll_completes_queued_jobs_and_prunes_them_after_retention() {
        let tenant_id = TenantId::new();
        let coordinator = coordinator(tenant_id);
        let actor = UserIdentity::new("alice", "Alice", tenant_id);
        let now = Utc::now();
        let job_id = coordinator
            .enqueue(
                &actor,
                EnqueueReviewInput {
                    subjects: vec![ReviewSubject::User("u1".to_owned())],
                    audit_from: now - TimeDelta::days(30),
                    audit_to: now,
                },
            )
            .await
            .unwrap_or_else(|_| unreachable!());

        poll_once(&coordinator, TimeDelta::hours(1)).await;
        let completed = coordinator.get_status(&actor, job_id).await;

        poll_once(&coordinator, TimeDelta::zero()).await;
        let pruned = coordinator.get_status(&actor, job_id).await;

        assert!(completed.is_ok_and(|summary| summary.status == ReviewJobStatus::Completed));
        assert!(pruned.is_err());
    }
}
