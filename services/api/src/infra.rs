use chrono::{NaiveDate, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use profit_share::config::DataConfig;
use profit_share::error::AppError;
use profit_share::workflows::profit_sharing::{
    record_transition, Award, AwardEvent, AwardId, AwardOwner, AwardRepository, AwardStatus,
    Company, CompanyId, DocumentError, DocumentRef, DocumentRegenerator, NotificationDispatcher,
    NotificationError, Plan, PlanDirectory, PlanId, RepositoryError, Stakeholder, StakeholderId,
    StatusUpdate, UserId, ValuationEntry, ValuationImporter, ValuationRepository,
};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Contents of `stakeholders.json` in the seed directory.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SeedData {
    #[serde(default)]
    pub(crate) companies: Vec<Company>,
    #[serde(default)]
    pub(crate) plans: Vec<Plan>,
    #[serde(default)]
    pub(crate) stakeholders: Vec<Stakeholder>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryProfitStore {
    stakeholders: Arc<Mutex<BTreeMap<StakeholderId, Stakeholder>>>,
    valuations: Arc<Mutex<Vec<ValuationEntry>>>,
    plans: Arc<Mutex<HashMap<PlanId, Plan>>>,
    companies: Arc<Mutex<HashMap<CompanyId, Company>>>,
}

impl InMemoryProfitStore {
    /// Hydrate from the configured seed directory, or start empty when none is set.
    pub(crate) fn from_data_dir(data: &DataConfig) -> Result<Self, AppError> {
        let store = Self::default();

        if let Some(path) = data.stakeholders_path().filter(|path| path.exists()) {
            let raw = std::fs::read_to_string(&path)?;
            let seed: SeedData = serde_json::from_str(&raw)?;
            info!(
                path = %path.display(),
                stakeholders = seed.stakeholders.len(),
                plans = seed.plans.len(),
                "loaded stakeholder seed"
            );
            store.seed(seed);
        }

        if let Some(path) = data.valuations_path().filter(|path| path.exists()) {
            let import = ValuationImporter::from_path(&path)?;
            info!(
                path = %path.display(),
                entries = import.entries.len(),
                skipped = import.skipped.len(),
                "loaded valuation export"
            );
            store.add_valuations(import.entries);
        }

        Ok(store)
    }

    pub(crate) fn seed(&self, seed: SeedData) {
        let mut companies = self.companies.lock().expect("store mutex poisoned");
        for company in seed.companies {
            companies.insert(company.id.clone(), company);
        }
        drop(companies);

        let mut plans = self.plans.lock().expect("store mutex poisoned");
        for plan in seed.plans {
            plans.insert(plan.id.clone(), plan);
        }
        drop(plans);

        let mut stakeholders = self.stakeholders.lock().expect("store mutex poisoned");
        for record in seed.stakeholders {
            stakeholders.insert(record.id.clone(), record);
        }
    }

    pub(crate) fn add_valuations(&self, entries: Vec<ValuationEntry>) {
        self.valuations
            .lock()
            .expect("store mutex poisoned")
            .extend(entries);
    }

    /// Run `apply` against one award after checking its stored status.
    fn with_award<T>(
        &self,
        stakeholder_id: &StakeholderId,
        award_id: &AwardId,
        expected: AwardStatus,
        apply: impl FnOnce(&mut Vec<Award>, usize) -> T,
    ) -> Result<T, RepositoryError> {
        let mut guard = self.stakeholders.lock().expect("store mutex poisoned");
        let record = guard
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
}

impl AwardRepository for InMemoryProfitStore {
    fn list_stakeholders(&self, owner: &AwardOwner) -> Result<Vec<Stakeholder>, RepositoryError> {
        let guard = self.stakeholders.lock().expect("store mutex poisoned");
        Ok(match owner {
            AwardOwner::Stakeholder(id) => guard.get(id).cloned().into_iter().collect(),
            AwardOwner::LinkedUser(user) => guard
                .values()
                .filter(|record| record.is_linked_to(user))
                .cloned()
                .collect(),
        })
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
        let record = guard
            .get_mut(stakeholder_id)
            .ok_or(RepositoryError::NotFound)?;
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
        let award_id = award.id.clone();
        self.with_award(stakeholder_id, &award_id, expected, |awards, index| {
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
        self.with_award(stakeholder_id, award_id, expected, |awards, index| {
            awards.remove(index)
        })
    }

    fn update_award_status(&self, update: StatusUpdate) -> Result<Award, RepositoryError> {
        self.with_award(
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

impl ValuationRepository for InMemoryProfitStore {
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

impl PlanDirectory for InMemoryProfitStore {
    fn fetch_plan(&self, id: &PlanId) -> Result<Option<Plan>, RepositoryError> {
        let guard = self.plans.lock().expect("store mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn fetch_company(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError> {
        let guard = self.companies.lock().expect("store mutex poisoned");
        Ok(guard.get(id).cloned())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SentNotification {
    pub(crate) user_id: UserId,
    pub(crate) event: AwardEvent,
    pub(crate) payload: BTreeMap<String, String>,
}

/// Notification outbox that logs instead of delivering.
#[derive(Default, Clone)]
pub(crate) struct InMemoryNotifications {
    events: Arc<Mutex<Vec<SentNotification>>>,
}

impl NotificationDispatcher for InMemoryNotifications {
    fn notify(
        &self,
        user_id: &UserId,
        event: AwardEvent,
        payload: BTreeMap<String, String>,
    ) -> Result<(), NotificationError> {
        info!(user_id = %user_id, event = event.label(), "queued award notification");
        let mut guard = self.events.lock().expect("notification mutex poisoned");
        guard.push(SentNotification {
            user_id: user_id.clone(),
            event,
            payload,
        });
        Ok(())
    }
}

impl InMemoryNotifications {
    pub(crate) fn events(&self) -> Vec<SentNotification> {
        self.events
            .lock()
            .expect("notification mutex poisoned")
            .clone()
    }
}

/// Records document versions per award without rendering anything.
#[derive(Default, Clone)]
pub(crate) struct InMemoryDocuments {
    versions: Arc<Mutex<HashMap<AwardId, u32>>>,
}

impl DocumentRegenerator for InMemoryDocuments {
    fn regenerate(
        &self,
        award: &Award,
        plan: &Plan,
        stakeholder: &Stakeholder,
        company: &Company,
    ) -> Result<DocumentRef, DocumentError> {
        let mut guard = self.versions.lock().expect("document mutex poisoned");
        let version = guard.entry(award.id.clone()).or_insert(0);
        *version += 1;

        Ok(DocumentRef {
            storage_key: format!(
                "memory://{}/{}/{}/{}-v{}.pdf",
                company.id, plan.id, stakeholder.id, award.id, version
            ),
            generated_at: Utc::now(),
        })
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
