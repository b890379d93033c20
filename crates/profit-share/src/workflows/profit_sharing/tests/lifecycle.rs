use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal_macros::dec;

use super::common::*;
use crate::workflows::profit_sharing::domain::{
    AwardId, AwardStatus, CompanyId, PlanId, StakeholderId, UserId,
};
use crate::workflows::profit_sharing::lifecycle::{
    Actor, AwardDraft, AwardEdit, AwardRef, CollaboratorWarning, LifecycleError,
};
use crate::workflows::profit_sharing::report::KpiScope;
use crate::workflows::profit_sharing::repository::{AwardEvent, AwardOwner};
use crate::workflows::profit_sharing::service::{
    DashboardRequest, ProfitSharingService, ProfitSharingServiceError,
};

fn a1() -> AwardRef {
    AwardRef {
        stakeholder_id: StakeholderId::new("s-acme"),
        award_id: AwardId::new("a-1"),
    }
}

fn admin() -> Actor {
    Actor::new("admin-1")
}

fn lifecycle_error(err: ProfitSharingServiceError) -> LifecycleError {
    match err {
        ProfitSharingServiceError::Lifecycle(inner) => inner,
        other => panic!("expected lifecycle error, got {other:?}"),
    }
}

#[test]
fn issue_then_accept_finalizes_and_notifies_both_sides() {
    let (service, store, notifications, documents) = build_service(seeded_store());
    let issued_at = timestamp("2024-04-01T09:00:00Z");
    let accepted_at = timestamp("2024-04-02T10:30:00Z");

    let issued = service
        .issue_award(&admin(), &a1(), issued_at)
        .expect("issue succeeds");
    assert_eq!(issued.award.status, AwardStatus::Issued);
    assert_eq!(issued.award.issued_by, Some(UserId::new("admin-1")));
    assert_eq!(issued.award.issued_at, Some(issued_at));
    assert!(issued.warnings.is_empty());
    assert!(issued.document.is_some());

    let accepted = service
        .accept_award(&Actor::new("user-7"), &a1(), accepted_at)
        .expect("accept succeeds");
    assert_eq!(accepted.award.status, AwardStatus::Finalized);
    assert_eq!(accepted.award.accepted_by, Some(UserId::new("user-7")));
    assert_eq!(accepted.award.accepted_at, Some(accepted_at));

    let stored = store.stored_award("s-acme", "a-1").expect("award stored");
    assert_eq!(stored, accepted.award);

    let events = notifications.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event, AwardEvent::AwardIssued);
    assert_eq!(events[0].user_id, UserId::new("user-7"));
    assert_eq!(events[0].payload.get("awardId").map(String::as_str), Some("a-1"));
    assert_eq!(events[1].event, AwardEvent::AwardAccepted);
    assert_eq!(events[1].user_id, UserId::new("admin-1"));

    assert_eq!(documents.generated().len(), 2);
}

#[test]
fn second_issue_fails_without_double_transition() {
    let (service, store, notifications, _) = build_service(seeded_store());
    let at = timestamp("2024-04-01T09:00:00Z");

    service.issue_award(&admin(), &a1(), at).expect("first issue");
    let err = service
        .issue_award(&Actor::new("admin-2"), &a1(), timestamp("2024-04-01T09:05:00Z"))
        .expect_err("second issue rejected");

    assert!(matches!(
        lifecycle_error(err),
        LifecycleError::InvalidTransition {
            from: AwardStatus::Issued,
            ..
        }
    ));
    let stored = store.stored_award("s-acme", "a-1").expect("award stored");
    assert_eq!(stored.issued_by, Some(UserId::new("admin-1")));
    assert_eq!(stored.issued_at, Some(at));
    assert_eq!(notifications.events().len(), 1);
}

#[test]
fn accept_before_issue_is_rejected() {
    let (service, store, _, _) = build_service(seeded_store());

    let err = service
        .accept_award(&Actor::new("user-7"), &a1(), timestamp("2024-04-01T09:00:00Z"))
        .expect_err("draft cannot be accepted");

    assert!(matches!(
        lifecycle_error(err),
        LifecycleError::InvalidTransition {
            from: AwardStatus::Draft,
            ..
        }
    ));
    assert_eq!(
        store.stored_award("s-acme", "a-1").map(|award| award.status),
        Some(AwardStatus::Draft)
    );
}

#[test]
fn only_the_linked_user_may_accept() {
    let (service, store, _, _) = build_service(seeded_store());
    service
        .issue_award(&admin(), &a1(), timestamp("2024-04-01T09:00:00Z"))
        .expect("issue");

    let err = service
        .accept_award(&Actor::new("user-8"), &a1(), timestamp("2024-04-02T09:00:00Z"))
        .expect_err("non-owner rejected");

    assert!(matches!(lifecycle_error(err), LifecycleError::NotOwner));
    assert_eq!(
        store.stored_award("s-acme", "a-1").map(|award| award.status),
        Some(AwardStatus::Issued)
    );
}

#[test]
fn blank_actor_is_rejected() {
    let (service, _, _, _) = build_service(seeded_store());

    let err = service
        .issue_award(&Actor::new("  "), &a1(), timestamp("2024-04-01T09:00:00Z"))
        .expect_err("actor required");
    assert!(matches!(lifecycle_error(err), LifecycleError::MissingActor));
}

#[test]
fn unknown_award_reports_not_found() {
    let (service, _, _, _) = build_service(seeded_store());
    let missing = AwardRef {
        stakeholder_id: StakeholderId::new("s-acme"),
        award_id: AwardId::new("a-404"),
    };

    let err = service
        .issue_award(&admin(), &missing, timestamp("2024-04-01T09:00:00Z"))
        .expect_err("missing award");
    assert!(matches!(lifecycle_error(err), LifecycleError::NotFound));
}

#[test]
fn edit_and_delete_are_limited_to_drafts() {
    let (service, store, _, _) = build_service(seeded_store());

    let edited = service
        .edit_award(
            &admin(),
            &a1(),
            AwardEdit {
                shares_issued: Some(150),
                ..AwardEdit::default()
            },
        )
        .expect("draft edit");
    assert_eq!(edited.shares_issued, Some(150));
    assert_eq!(edited.plan_id, Some(PlanId::new("plan-1")));

    service
        .issue_award(&admin(), &a1(), timestamp("2024-04-01T09:00:00Z"))
        .expect("issue");

    let edit_err = service
        .edit_award(
            &admin(),
            &a1(),
            AwardEdit {
                shares_issued: Some(1),
                ..AwardEdit::default()
            },
        )
        .expect_err("issued awards are frozen");
    assert!(matches!(
        lifecycle_error(edit_err),
        LifecycleError::InvalidTransition { .. }
    ));

    let delete_err = service
        .delete_award(&admin(), &a1())
        .expect_err("issued awards are kept");
    assert!(matches!(
        lifecycle_error(delete_err),
        LifecycleError::InvalidTransition { .. }
    ));
    assert_eq!(
        store.stored_award("s-acme", "a-1").and_then(|award| award.shares_issued),
        Some(150)
    );
}

#[test]
fn edit_rejects_an_inverted_interval() {
    let (service, store, _, _) = build_service(seeded_store());

    let err = service
        .edit_award(
            &admin(),
            &a1(),
            AwardEdit {
                award_end_date: NaiveDate::from_ymd_opt(2023, 6, 30),
                ..AwardEdit::default()
            },
        )
        .expect_err("end before start");

    assert!(matches!(lifecycle_error(err), LifecycleError::InvalidAward(_)));
    assert_eq!(
        store.stored_award("s-acme", "a-1").and_then(|award| award.award_end_date),
        Some(date(2024, 12, 31))
    );
}

#[test]
fn create_then_delete_draft() {
    let (service, store, _, _) = build_service(seeded_store());
    let draft = AwardDraft {
        plan_id: Some(PlanId::new("plan-1")),
        award_start_date: Some(date(2025, 1, 1)),
        award_end_date: Some(date(2025, 12, 31)),
        shares_issued: Some(25),
    };

    let created = service
        .create_award(&admin(), &StakeholderId::new("s-acme"), draft)
        .expect("draft created");
    assert_eq!(created.status, AwardStatus::Draft);
    assert_eq!(created.id, AwardId::new("award-000001"));
    assert!(store.stored_award("s-acme", created.id.as_str()).is_some());

    let removed = service
        .delete_award(&admin(), &AwardRef::from(&created))
        .expect("draft deleted");
    assert_eq!(removed.id, created.id);
    assert!(store.stored_award("s-acme", created.id.as_str()).is_none());
}

#[test]
fn create_numbers_past_ids_already_on_the_record() {
    let store = MemoryStore::default()
        .with_plan(plan("plan-1"))
        .with_stakeholder(stakeholder(
            "s-acme",
            "acme",
            Some("user-7"),
            vec![
                award_2024("award-000001", "plan-1", 10),
                award_2024("award-000007", "plan-1", 10),
                award_2024("legacy-grant", "plan-1", 10),
            ],
        ));
    let (service, store, _, _) = build_service(store);
    let draft = AwardDraft {
        plan_id: Some(PlanId::new("plan-1")),
        award_start_date: Some(date(2025, 1, 1)),
        award_end_date: Some(date(2025, 12, 31)),
        shares_issued: Some(5),
    };
    let owner = StakeholderId::new("s-acme");

    let first = service
        .create_award(&admin(), &owner, draft.clone())
        .expect("draft created");
    let second = service
        .create_award(&admin(), &owner, draft)
        .expect("second draft created");

    assert_eq!(first.id, AwardId::new("award-000008"));
    assert_eq!(second.id, AwardId::new("award-000009"));
    assert!(store.stored_award("s-acme", "award-000001").is_some());
}

#[test]
fn create_on_unknown_stakeholder_fails() {
    let (service, _, _, _) = build_service(seeded_store());

    let err = service
        .create_award(&admin(), &StakeholderId::new("s-ghost"), AwardDraft::default())
        .expect_err("unknown stakeholder");
    assert!(matches!(lifecycle_error(err), LifecycleError::NotFound));
}

#[test]
fn collaborator_failures_become_warnings_after_commit() {
    let store = seeded_store();
    let service = ProfitSharingService::new(
        Arc::new(store.clone()),
        Arc::new(FailingNotifications),
        Arc::new(FailingDocuments),
    );

    let outcome = service
        .issue_award(&admin(), &a1(), timestamp("2024-04-01T09:00:00Z"))
        .expect("transition committed despite collaborator failures");

    assert_eq!(outcome.award.status, AwardStatus::Issued);
    assert!(outcome.document.is_none());
    assert_eq!(outcome.warnings.len(), 2);
    assert!(matches!(
        outcome.warnings[0],
        CollaboratorWarning::Notification { .. }
    ));
    assert!(matches!(outcome.warnings[1], CollaboratorWarning::Document { .. }));
    assert_eq!(
        store.stored_award("s-acme", "a-1").map(|award| award.status),
        Some(AwardStatus::Issued)
    );
}

#[test]
fn issuing_for_unlinked_stakeholder_warns_about_missing_recipient() {
    let store = MemoryStore::default()
        .with_plan(plan("plan-1"))
        .with_stakeholder(stakeholder(
            "s-acme",
            "acme",
            None,
            vec![award_2024("a-1", "plan-1", 100)],
        ));
    let (service, _, notifications, _) = build_service(store);

    let outcome = service
        .issue_award(&admin(), &a1(), timestamp("2024-04-01T09:00:00Z"))
        .expect("issue");

    assert!(notifications.events().is_empty());
    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.warnings[0].to_string().contains("no linked user"));
}

#[test]
fn user_dashboard_merges_awards_across_stakeholder_records() {
    let store = seeded_store()
        .with_stakeholder(stakeholder(
            "s-globex",
            "globex",
            Some("user-7"),
            vec![award_2024("a-9", "plan-g", 10)],
        ))
        .with_valuations(vec![{
            let mut entry = actual("v-g1", "plan-g", date(2024, 6, 30), 5_000, 100);
            entry.company_id = CompanyId::new("globex");
            entry
        }]);
    let (service, _, _, _) = build_service(store);

    let dashboard = service
        .dashboard(&DashboardRequest {
            owner: AwardOwner::LinkedUser(UserId::new("user-7")),
            scope: KpiScope::default(),
            today: date(2024, 12, 31),
        })
        .expect("dashboard");

    // acme: 100 shares x $10, globex: 10 shares x $50.
    assert_eq!(dashboard.kpis.total_payout_to_date, dec!(1500));
    assert_eq!(dashboard.history.len(), 2);
    assert_eq!(dashboard.kpis.last_payout.amount, dec!(500));
}

#[test]
fn dashboard_for_unknown_owner_is_reported() {
    let (service, _, _, _) = build_service(seeded_store());

    let err = service
        .dashboard(&DashboardRequest {
            owner: AwardOwner::LinkedUser(UserId::new("user-404")),
            scope: KpiScope::default(),
            today: date(2024, 12, 31),
        })
        .expect_err("no records");
    assert!(matches!(err, ProfitSharingServiceError::UnknownOwner(_)));
}
