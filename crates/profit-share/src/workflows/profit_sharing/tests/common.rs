use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::workflows::profit_sharing::domain::{
    Award, AwardId, AwardStatus, Company, CompanyId, Plan, PlanId, PlanSchedule, PlanStatus,
    ProfitType, Stakeholder, StakeholderId, UserId, ValuationEntry, ValuationId,
};
use crate::workflows::profit_sharing::lifecycle::record_transition;
use crate::workflows::profit_sharing::repository::{
    AwardEvent, AwardOwner, AwardRepository, DocumentError, DocumentRef, DocumentRegenerator,
    NotificationDispatcher, NotificationError, PlanDirectory, RepositoryError, StatusUpdate,
    ValuationRepository,
};
use crate::workflows::profit_sharing::service::ProfitSharingService;

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .expect("valid timestamp")
        .with_timezone(&Utc)
}

pub(super) fn award(
    id: &str,
    plan: &str,
    shares: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Award {
    Award {
        id: AwardId::new(id),
        plan_id: Some(PlanId::new(plan)),
        stakeholder_id: StakeholderId::new("s-acme"),
        source_company_id: None,
        award_start_date: Some(start),
        award_end_date: Some(end),
        shares_issued: Some(shares),
        status: AwardStatus::Draft,
        issued_at: None,
        issued_by: None,
        accepted_at: None,
        accepted_by: None,
    }
}

pub(super) fn award_2024(id: &str, plan: &str, shares: i64) -> Award {
    award(id, plan, shares, date(2024, 1, 1), date(2024, 12, 31))
}

pub(super) fn valuation(
    id: &str,
    plan: &str,
    profit_type: ProfitType,
    on: NaiveDate,
    profit: i64,
    total_shares: Option<i64>,
) -> ValuationEntry {
    ValuationEntry {
        id: ValuationId::new(id),
        company_id: CompanyId::new("acme"),
        plan_id: Some(PlanId::new(plan)),
        valuation_date: Some(on),
        profit_amount: Decimal::from(profit),
        profit_type,
        price_per_share: None,
        total_shares: total_shares.map(Decimal::from),
    }
}

pub(super) fn actual(
    id: &str,
    plan: &str,
    on: NaiveDate,
    profit: i64,
    shares: i64,
) -> ValuationEntry {
    valuation(id, plan, ProfitType::Actual, on, profit, Some(shares))
}

pub(super) fn estimated(id: &str, plan: &str, on: NaiveDate, profit: i64) -> ValuationEntry {
    valuation(id, plan, ProfitType::Estimated, on, profit, None)
}

pub(super) fn plan(id: &str) -> Plan {
    Plan {
        id: PlanId::new(id),
        company_id: CompanyId::new("acme"),
        name: "Crew profit pool".to_string(),
        trigger_amount: Decimal::from(5_000),
        total_shares: 1_000,
        schedule: PlanSchedule::Quarterly,
        status: PlanStatus::Finalized,
    }
}

pub(super) fn stakeholder(
    id: &str,
    company: &str,
    user: Option<&str>,
    awards: Vec<Award>,
) -> Stakeholder {
    Stakeholder {
        id: StakeholderId::new(id),
        company_id: CompanyId::new(company),
        name: "Dana Reyes".to_string(),
        linked_user_id: user.map(UserId::new),
        awards: awards
            .into_iter()
            .map(|mut award| {
                award.stakeholder_id = StakeholderId::new(id);
                award
            })
            .collect(),
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryStore {
    pub(super) stakeholders: Arc<Mutex<HashMap<StakeholderId, Stakeholder>>>,
    pub(super) valuations: Arc<Mutex<Vec<ValuationEntry>>>,
    pub(super) plans: Arc<Mutex<HashMap<PlanId, Plan>>>,
    pub(super) companies: Arc<Mutex<HashMap<CompanyId, Company>>>,
}

impl MemoryStore {
    pub(super) fn with_stakeholder(self, record: Stakeholder) -> Self {
        self.companies
            .lock()
            .expect("store mutex poisoned")
            .entry(record.company_id.clone())
            .or_insert_with(|| Company {
                id: record.company_id.clone(),
                name: record.company_id.to_string(),
            });
        self.stakeholders
            .lock()
            .expect("store mutex poisoned")
            .insert(record.id.clone(), record);
        self
    }

    pub(super) fn with_valuations(self, entries: Vec<ValuationEntry>) -> Self {
        self.valuations
            .lock()
            .expect("store mutex poisoned")
            .extend(entries);
        self
    }

    pub(super) fn with_plan(self, plan: Plan) -> Self {
        self.plans
            .lock()
            .expect("store mutex poisoned")
            .insert(plan.id.clone(), plan);
        self
    }

    pub(super) fn stored_award(&self, stakeholder_id: &str, award_id: &str) -> Option<Award> {
        let guard = self.stakeholders.lock().expect("store mutex poisoned");
        guard
            .get(&StakeholderId::new(stakeholder_id))
            .and_then(|record| record.award(&AwardId::new(award_id)).cloned())
    }
}

fn with_award<T>(
    records: &mut HashMap<StakeholderId, Stakeholder>,
    stakeholder_id: &StakeholderId,
    award_id: &AwardId,
    expected: AwardStatus,
    apply: impl FnOnce(&mut Vec<Award>, usize) -> T,
) -> Result<T, RepositoryError> {
    let record = records
        .get_mut(stakeholder_id)
        .ok_or(RepositoryError::NotFound)?;
    let index = record
        .awards
        .iter()
        .position(|award| &award.id == award_id)
        .ok_or(RepositoryError::NotFound)?;
    let found = record.awards[index].status;
    if found != expected {
        return Err(RepositoryError::Conflict { expected, found });
    }
    Ok(apply(&mut record.awards, index))
}

impl AwardRepository for MemoryStore {
    fn list_stakeholders(&self, owner: &AwardOwner) -> Result<Vec<Stakeholder>, RepositoryError> {
        let guard = self.stakeholders.lock().expect("store mutex poisoned");
        let mut records: Vec<Stakeholder> = match owner {
            AwardOwner::Stakeholder(id) => guard.get(id).cloned().into_iter().collect(),
            AwardOwner::LinkedUser(user) => guard
                .values()
                .filter(|record| record.is_linked_to(user))
                .cloned()
                .collect(),
        };
        records.sort_by(|left, right| left.id.cmp(&right.id));
        Ok(records)
    }

    fn fetch_stakeholder(
        &self,
        id: &StakeholderId,
    ) -> Result<Option<Stakeholder>, RepositoryError> {
        let guard = self.stakeholders.lock().expect("store mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn insert_award(
        &self,
        stakeholder_id: &StakeholderId,
        award: Award,
    ) -> Result<Award, RepositoryError> {
        let mut guard = self.stakeholders.lock().expect("store mutex poisoned");
        let record = guard.get_mut(stakeholder_id).ok_or(RepositoryError::NotFound)?;
        if record.award(&award.id).is_some() {
            return Err(RepositoryError::Duplicate);
        }
        record.awards.push(award.clone());
        Ok(award)
    }

    fn replace_award(
        &self,
        stakeholder_id: &StakeholderId,
        award: Award,
        expected: AwardStatus,
    ) -> Result<Award, RepositoryError> {
        let mut guard = self.stakeholders.lock().expect("store mutex poisoned");
        let award_id = award.id.clone();
        with_award(&mut guard, stakeholder_id, &award_id, expected, |awards, index| {
            awards[index] = award;
            awards[index].clone()
        })
    }

    fn delete_award(
        &self,
        stakeholder_id: &StakeholderId,
        award_id: &AwardId,
        expected: AwardStatus,
    ) -> Result<Award, RepositoryError> {
        let mut guard = self.stakeholders.lock().expect("store mutex poisoned");
        with_award(&mut guard, stakeholder_id, award_id, expected, |awards, index| {
            awards.remove(index)
        })
    }

    fn update_award_status(&self, update: StatusUpdate) -> Result<Award, RepositoryError> {
        let mut guard = self.stakeholders.lock().expect("store mutex poisoned");
        with_award(
            &mut guard,
            &update.stakeholder_id,
            &update.award_id,
            update.expected,
            |awards, index| {
                record_transition(&mut awards[index], update.status, &update.actor, update.at);
                awards[index].clone()
            },
        )
    }
}

impl ValuationRepository for MemoryStore {
    fn list_valuations(
        &self,
        company_id: &CompanyId,
        plan_id: Option<&PlanId>,
    ) -> Result<Vec<ValuationEntry>, RepositoryError> {
        let guard = self.valuations.lock().expect("store mutex poisoned");
        Ok(guard
            .iter()
            .filter(|valuation| &valuation.company_id == company_id)
            .filter(|valuation| plan_id.is_none() || valuation.plan_id.as_ref() == plan_id)
            .cloned()
            .collect())
    }
}

impl PlanDirectory for MemoryStore {
    fn fetch_plan(&self, id: &PlanId) -> Result<Option<Plan>, RepositoryError> {
        Ok(self.plans.lock().expect("store mutex poisoned").get(id).cloned())
    }

    fn fetch_company(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError> {
        Ok(self
            .companies
            .lock()
            .expect("store mutex poisoned")
            .get(id)
            .cloned())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct SentNotification {
    pub(super) user_id: UserId,
    pub(super) event: AwardEvent,
    pub(super) payload: BTreeMap<String, String>,
}

#[derive(Default, Clone)]
pub(super) struct MemoryNotifications {
    events: Arc<Mutex<Vec<SentNotification>>>,
}

impl MemoryNotifications {
    pub(super) fn events(&self) -> Vec<SentNotification> {
        self.events.lock().expect("notification mutex poisoned").clone()
    }
}

impl NotificationDispatcher for MemoryNotifications {
    fn notify(
        &self,
        user_id: &UserId,
        event: AwardEvent,
        payload: BTreeMap<String, String>,
    ) -> Result<(), NotificationError> {
        self.events
            .lock()
            .expect("notification mutex poisoned")
            .push(SentNotification {
                user_id: user_id.clone(),
                event,
                payload,
            });
        Ok(())
    }
}

pub(super) struct FailingNotifications;

impl NotificationDispatcher for FailingNotifications {
    fn notify(
        &self,
        _user_id: &UserId,
        _event: AwardEvent,
        _payload: BTreeMap<String, String>,
    ) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("smtp relay offline".to_string()))
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryDocuments {
    generated: Arc<Mutex<Vec<AwardId>>>,
}

impl MemoryDocuments {
    pub(super) fn generated(&self) -> Vec<AwardId> {
        self.generated.lock().expect("document mutex poisoned").clone()
    }
}

impl DocumentRegenerator for MemoryDocuments {
    fn regenerate(
        &self,
        award: &Award,
        _plan: &Plan,
        stakeholder: &Stakeholder,
        _company: &Company,
    ) -> Result<DocumentRef, DocumentError> {
        let mut guard = self.generated.lock().expect("document mutex poisoned");
        guard.push(award.id.clone());
        Ok(DocumentRef {
            storage_key: format!(
                "memory://{}/{}/v{}.pdf",
                stakeholder.id,
                award.id,
                guard.len()
            ),
            generated_at: timestamp("2024-04-01T09:00:00Z"),
        })
    }
}

pub(super) struct FailingDocuments;

impl DocumentRegenerator for FailingDocuments {
    fn regenerate(
        &self,
        _award: &Award,
        _plan: &Plan,
        _stakeholder: &Stakeholder,
        _company: &Company,
    ) -> Result<DocumentRef, DocumentError> {
        Err(DocumentError::Render("template missing".to_string()))
    }
}

pub(super) type TestService =
    ProfitSharingService<MemoryStore, MemoryNotifications, MemoryDocuments>;

pub(super) fn build_service(
    store: MemoryStore,
) -> (TestService, MemoryStore, MemoryNotifications, MemoryDocuments) {
    let notifications = MemoryNotifications::default();
    let documents = MemoryDocuments::default();
    let service = ProfitSharingService::new(
        Arc::new(store.clone()),
        Arc::new(notifications.clone()),
        Arc::new(documents.clone()),
    );
    (service, store, notifications, documents)
}

/// Acme stakeholder linked to `user-7` with one 2024 draft award on `plan-1`.
pub(super) fn seeded_store() -> MemoryStore {
    MemoryStore::default()
        .with_plan(plan("plan-1"))
        .with_stakeholder(stakeholder(
            "s-acme",
            "acme",
            Some("user-7"),
            vec![award_2024("a-1", "plan-1", 100)],
        ))
        .with_valuations(vec![
            actual("v-q1", "plan-1", date(2024, 3, 31), 10_000, 1_000),
            estimated("v-next", "plan-1", date(2025, 3, 31), 12_000),
        ])
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
