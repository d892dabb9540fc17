use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use rolereaper_core::{AppError, AppResult, TenantId, UserIdentity};
use rolereaper_domain::{
    AuditActivity, PermissionCondition, ReviewJobResult, ReviewSubject, SuggestedRoleChanges,
    TargetResource, UserContext,
};
use tokio::sync::Notify;

use super::{EnqueueReviewInput, ReviewCoordinator, ReviewResultLookup};
use crate::review_ports::{
    DirectoryService, ReviewJob, ReviewJobOutcome, ReviewJobRepository, ReviewJobStatus,
};
use crate::review_service::{ReviewConcurrency, ReviewService};
use crate::test_support::{
    FakeCatalog, FakeDirectory, FakeReviewJobRepository, action, activity, permission_set, role,
    target,
};

const MEMBERS_UPDATE: &str = "microsoft.directory/groups/members/update";
const USERS_READ: &str = "microsoft.directory/users/basic/read";

fn coordinator(
    repository: Arc<FakeReviewJobRepository>,
    catalog: FakeCatalog,
    directory: FakeDirectory,
) -> ReviewCoordinator {
    ReviewCoordinator::new(
        repository,
        ReviewService::new(
            Arc::new(catalog),
            Arc::new(directory),
            ReviewConcurrency::default(),
        ),
    )
}

fn catalog() -> FakeCatalog {
    FakeCatalog::default()
        .with_roles(vec![
            role(
                "groups-admin",
                vec![permission_set(
                    PermissionCondition::TenantWide,
                    vec![action(MEMBERS_UPDATE, false)],
                )],
            ),
            role(
                "global-reader",
                vec![permission_set(
                    PermissionCondition::TenantWide,
                    vec![action(USERS_READ, false)],
                )],
            ),
        ])
        .with_activities(vec![
            activity("Add member to group", &[MEMBERS_UPDATE]),
            activity("Export audit data", &[USERS_READ]).excluded(true),
        ])
        .with_assignment("u1", &["global-reader"])
}

fn directory() -> FakeDirectory {
    FakeDirectory::default()
        .with_group("team", &["u1", "U1"])
        .with_activities(
            "u1",
            vec![
                AuditActivity {
                    activity_name: "Add member to group".to_owned(),
                    target_resources: vec![target("g1")],
                },
                AuditActivity {
                    activity_name: "Export audit data".to_owned(),
                    target_resources: Vec::new(),
                },
                AuditActivity {
                    activity_name: "Rename device".to_owned(),
                    target_resources: vec![target("d1")],
                },
            ],
        )
}

/// Directory that parks every activity collection until released.
#[derive(Default)]
struct GatedDirectory {
    inner: FakeDirectory,
    entered: Notify,
    release: Notify,
    collect_calls: AtomicUsize,
}

#[async_trait]
impl DirectoryService for GatedDirectory {
    async fn is_owner(
        &self,
        tenant_id: TenantId,
        user_id: &str,
        target: &TargetResource,
    ) -> AppResult<bool> {
        self.inner.is_owner(tenant_id, user_id, target).await
    }

    async fn collect_activities(
        &self,
        tenant_id: TenantId,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<AuditActivity>> {
        self.collect_calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        self.release.notified().await;
        self.inner
            .collect_activities(tenant_id, user_id, from, to)
            .await
    }

    async fn expand_users_or_groups(
        &self,
        tenant_id: TenantId,
        subjects: &[ReviewSubject],
    ) -> AppResult<Vec<String>> {
        self.inner.expand_users_or_groups(tenant_id, subjects).await
    }

    async fn get_user(&self, tenant_id: TenantId, user_id: &str) -> AppResult<UserContext> {
        self.inner.get_user(tenant_id, user_id).await
    }
}

fn input(subjects: &[&str]) -> EnqueueReviewInput {
    let now = Utc::now();
    EnqueueReviewInput {
        subjects: subjects
            .iter()
            .map(|subject| ReviewSubject::parse(subject).unwrap_or_else(|_| unreachable!()))
            .collect(),
        audit_from: now - TimeDelta::days(30),
        audit_to: now,
    }
}

fn alice(tenant_id: TenantId) -> UserIdentity {
    UserIdentity::new("alice@contoso.com", "Alice", tenant_id)
}

fn bob(tenant_id: TenantId) -> UserIdentity {
    UserIdentity::new("bob@contoso.com", "Bob", tenant_id)
}

#[tokio::test]
async fn enqueue_validates_subjects_and_window() {
    let coordinator = coordinator(Arc::default(), catalog(), directory());
    let actor = alice(TenantId::new());

    let no_subjects = coordinator.enqueue(&actor, input(&[])).await;
    let mut inverted = input(&["u1"]);
    std::mem::swap(&mut inverted.audit_from, &mut inverted.audit_to);
    let inverted_window = coordinator.enqueue(&actor, inverted).await;

    assert!(matches!(no_subjects, Err(AppError::Validation(_))));
    assert!(matches!(inverted_window, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn duplicate_in_flight_enqueue_is_rejected() {
    let coordinator = coordinator(Arc::default(), catalog(), directory());
    let tenant_id = TenantId::new();

    let first = coordinator
        .enqueue(&alice(tenant_id), input(&["u1", "group:team"]))
        .await;
    let duplicate = coordinator
        .enqueue(
            &UserIdentity::new("ALICE@contoso.com", "Alice", tenant_id),
            input(&["GROUP:TEAM", "U1"]),
        )
        .await;
    let other_requester = coordinator
        .enqueue(&bob(tenant_id), input(&["u1", "group:team"]))
        .await;

    assert!(first.is_ok());
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));
    assert!(other_requester.is_ok());
}

#[tokio::test]
async fn jobs_are_invisible_to_other_tenants() {
    let coordinator = coordinator(Arc::default(), catalog(), directory());
    let job_id = coordinator
        .enqueue(&alice(TenantId::new()), input(&["u1"]))
        .await
        .unwrap_or_else(|_| unreachable!());
    let outsider = alice(TenantId::new());

    let status = coordinator.get_status(&outsider, job_id).await;
    let cancel = coordinator.cancel(&outsider, job_id).await;
    let listed = coordinator
        .list(&outsider, None)
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(matches!(status, Err(AppError::NotFound(_))));
    assert!(matches!(cancel, Err(AppError::NotFound(_))));
    assert!(listed.is_empty());
}

#[tokio::test]
async fn cancel_by_other_requester_is_forbidden() {
    let coordinator = coordinator(Arc::default(), catalog(), directory());
    let tenant_id = TenantId::new();
    let job_id = coordinator
        .enqueue(&alice(tenant_id), input(&["u1"]))
        .await
        .unwrap_or_else(|_| unreachable!());

    let result = coordinator.cancel(&bob(tenant_id), job_id).await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn cancelled_queued_job_is_never_run() {
    let repository = Arc::new(FakeReviewJobRepository::default());
    let coordinator = coordinator(repository.clone(), catalog(), directory());
    let actor = alice(TenantId::new());
    let job_id = coordinator
        .enqueue(&actor, input(&["u1"]))
        .await
        .unwrap_or_else(|_| unreachable!());

    let cancelled = coordinator
        .cancel(&actor, job_id)
        .await
        .unwrap_or_else(|_| unreachable!());
    let processed = coordinator
        .run_pending()
        .await
        .unwrap_or_else(|_| unreachable!());
    let lookup = coordinator
        .get_result(&actor, job_id)
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(cancelled.status, ReviewJobStatus::Cancelled);
    assert_eq!(processed, 0);
    assert!(matches!(
        lookup,
        ReviewResultLookup::Unavailable(summary) if summary.status == ReviewJobStatus::Cancelled
    ));
}

#[tokio::test]
async fn run_pending_completes_job_without_excluded_activities() {
    let coordinator = coordinator(Arc::default(), catalog(), directory());
    let actor = alice(TenantId::new());
    let job_id = coordinator
        .enqueue(&actor, input(&["group:team", "u1"]))
        .await
        .unwrap_or_else(|_| unreachable!());

    let pending = coordinator
        .get_result(&actor, job_id)
        .await
        .unwrap_or_else(|_| unreachable!());
    let processed = coordinator
        .run_pending()
        .await
        .unwrap_or_else(|_| unreachable!());
    let lookup = coordinator
        .get_result(&actor, job_id)
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(matches!(pending, ReviewResultLookup::Pending(ReviewJobStatus::Queued)));
    assert_eq!(processed, 1);
    let ReviewResultLookup::Ready(result) = lookup else {
        unreachable!()
    };
    assert_eq!(result.users.len(), 1);

    let user = &result.users[0];
    let activities: Vec<&str> = user
        .activities
        .iter()
        .map(|activity| activity.activity_name.as_str())
        .collect();
    assert_eq!(activities, vec!["Add member to group", "Rename device"]);

    let added: Vec<&str> = user
        .role_changes
        .roles_to_add
        .iter()
        .map(|role| role.id.as_str())
        .collect();
    let removed: Vec<&str> = user
        .role_changes
        .roles_to_remove
        .iter()
        .map(|role| role.id.as_str())
        .collect();
    assert_eq!(added, vec!["groups-admin"]);
    assert_eq!(removed, vec!["global-reader"]);

    let evaluation = user.activities[0].evaluation.as_ref();
    assert_eq!(
        evaluation
            .and_then(|evaluation| evaluation.role.as_ref())
            .map(|role| role.id.as_str()),
        Some("groups-admin")
    );
    assert!(user.activities[1].evaluation.is_none());
}

#[tokio::test]
async fn failed_job_is_recorded_and_other_jobs_still_run() {
    let repository = Arc::new(FakeReviewJobRepository::default());
    let coordinator = coordinator(
        repository.clone(),
        catalog(),
        directory().with_failing_activity_collection("u2"),
    );
    let actor = alice(TenantId::new());
    let failing = coordinator
        .enqueue(&actor, input(&["u2"]))
        .await
        .unwrap_or_else(|_| unreachable!());
    let healthy = coordinator
        .enqueue(&actor, input(&["u1"]))
        .await
        .unwrap_or_else(|_| unreachable!());

    let processed = coordinator
        .run_pending()
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(processed, 2);
    let failing = repository
        .job(failing)
        .await
        .unwrap_or_else(|| unreachable!());
    let healthy = repository
        .job(healthy)
        .await
        .unwrap_or_else(|| unreachable!());
    assert_eq!(failing.status, ReviewJobStatus::Failed);
    assert!(failing.error.is_some_and(|error| error.contains("audit log unavailable")));
    assert_eq!(healthy.status, ReviewJobStatus::Completed);
}

#[tokio::test]
async fn concurrent_duplicate_enqueues_store_one_job() {
    let repository = Arc::new(FakeReviewJobRepository::default());
    let coordinator = coordinator(repository.clone(), catalog(), directory());
    let actor = alice(TenantId::new());

    let (first, second) = tokio::join!(
        coordinator.enqueue(&actor, input(&["u1"])),
        coordinator.enqueue(&actor, input(&["U1"]))
    );

    let conflicts = [first, second]
        .into_iter()
        .filter(|enqueued| matches!(enqueued, Err(AppError::Conflict(_))))
        .count();
    assert_eq!(conflicts, 1);
    assert_eq!(repository.jobs.lock().await.len(), 1);
}

#[tokio::test]
async fn cancelling_running_job_stops_review_and_keeps_partial_result() {
    let repository = Arc::new(FakeReviewJobRepository::default());
    let directory = Arc::new(GatedDirectory {
        inner: directory().with_activities(
            "u2",
            vec![AuditActivity {
                activity_name: "Add member to group".to_owned(),
                target_resources: vec![target("g2")],
            }],
        ),
        ..GatedDirectory::default()
    });
    let coordinator = ReviewCoordinator::new(
        repository.clone(),
        ReviewService::new(
            Arc::new(catalog()),
            directory.clone(),
            ReviewConcurrency::new(1, 1, 1).unwrap_or_else(|_| unreachable!()),
        ),
    );
    let actor = alice(TenantId::new());
    let job_id = coordinator
        .enqueue(&actor, input(&["u1", "u2"]))
        .await
        .unwrap_or_else(|_| unreachable!());

    let (processed, cancelled) = tokio::join!(coordinator.run_pending(), async {
        directory.entered.notified().await;
        let cancelled = coordinator.cancel(&actor, job_id).await;
        directory.release.notify_one();
        cancelled
    });

    assert!(matches!(processed, Ok(1)));
    let cancelled = cancelled.unwrap_or_else(|_| unreachable!());
    let stored = repository
        .job(job_id)
        .await
        .unwrap_or_else(|| unreachable!());
    assert_eq!(stored.status, ReviewJobStatus::Cancelled);
    assert_eq!(stored.completed_at, cancelled.completed_at);
    assert_eq!(directory.collect_calls.load(Ordering::SeqCst), 1);

    let partial = stored.result.unwrap_or_else(|| unreachable!());
    assert_eq!(partial.users.len(), 1);
    let interrupted = &partial.users[0];
    assert_eq!(interrupted.user.user_id, "u1");
    assert!(interrupted.activities.is_empty());
    assert_eq!(interrupted.role_changes, SuggestedRoleChanges::default());

    let late = repository
        .finish_job(
            job_id,
            ReviewJobOutcome::Cancelled(ReviewJobResult::default()),
            Utc::now(),
        )
        .await;
    assert!(matches!(late, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn cancelling_completed_job_fails_and_keeps_result() {
    let coordinator = coordinator(Arc::default(), catalog(), directory());
    let actor = alice(TenantId::new());
    let job_id = coordinator
        .enqueue(&actor, input(&["u1"]))
        .await
        .unwrap_or_else(|_| unreachable!());
    coordinator
        .run_pending()
        .await
        .unwrap_or_else(|_| unreachable!());
    let before = coordinator
        .get(&actor, job_id)
        .await
        .unwrap_or_else(|_| unreachable!());

    let cancel = coordinator.cancel(&actor, job_id).await;
    let after = coordinator
        .get(&actor, job_id)
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(matches!(cancel, Err(AppError::Conflict(_))));
    assert_eq!(after.status, ReviewJobStatus::Completed);
    assert_eq!(after.result, before.result);
    assert!(after.result.is_some());
}

#[tokio::test]
async fn list_filters_by_requester_newest_first() {
    let coordinator = coordinator(Arc::default(), catalog(), directory());
    let tenant_id = TenantId::new();
    let first = coordinator
        .enqueue(&alice(tenant_id), input(&["u1"]))
        .await
        .unwrap_or_else(|_| unreachable!());
    let second = coordinator
        .enqueue(&alice(tenant_id), input(&["u2"]))
        .await
        .unwrap_or_else(|_| unreachable!());
    coordinator
        .enqueue(&bob(tenant_id), input(&["u1"]))
        .await
        .unwrap_or_else(|_| unreachable!());

    let mine = coordinator
        .list(&alice(tenant_id), Some("Alice@Contoso.com"))
        .await
        .unwrap_or_else(|_| unreachable!());
    let all = coordinator
        .list(&alice(tenant_id), None)
        .await
        .unwrap_or_else(|_| unreachable!());

    let mine: Vec<_> = mine.iter().map(|summary| summary.job_id).collect();
    assert_eq!(mine, vec![second, first]);
    assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn prune_finished_removes_only_expired_terminal_jobs() {
    let repository = Arc::new(FakeReviewJobRepository::default());
    let coordinator = coordinator(repository.clone(), catalog(), directory());
    let tenant_id = TenantId::new();
    let now = Utc::now();

    let mut expired = ReviewJob::queued(
        "alice@contoso.com",
        tenant_id,
        vec![ReviewSubject::User("u1".to_owned())],
        now - TimeDelta::days(1),
        now,
        now - TimeDelta::hours(3),
    );
    expired
        .start(now - TimeDelta::hours(3))
        .unwrap_or_else(|_| unreachable!());
    expired
        .finish(
            ReviewJobOutcome::Completed(ReviewJobResult::default()),
            now - TimeDelta::hours(2),
        )
        .unwrap_or_else(|_| unreachable!());
    let expired_id = expired.job_id;
    repository
        .insert_job(expired)
        .await
        .unwrap_or_else(|_| unreachable!());
    let queued = coordinator
        .enqueue(&alice(tenant_id), input(&["u2"]))
        .await
        .unwrap_or_else(|_| unreachable!());

    let removed = coordinator
        .prune_finished(TimeDelta::hours(1))
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(removed, 1);
    assert!(repository.job(expired_id).await.is_none());
    assert!(repository.job(queued).await.is_some());
}
