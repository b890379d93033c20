use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info};

use super::domain::{Award, CompanyId, StakeholderId, ValuationEntry, ValuationId};
use super::lifecycle::{
    Actor, AwardDraft, AwardEdit, AwardLifecycle, AwardRef, LifecycleError, TransitionOutcome,
};
use super::report::{build_dashboard, KpiScope, PayoutDashboard};
use super::repository::{
    AwardOwner, AwardRepository, DocumentRegenerator, NotificationDispatcher, PlanDirectory,
    RepositoryError, ValuationRepository,
};

/// Everything a dashboard recompute reads, loaded once per view.
#[derive(Debug, Clone, PartialEq)]
pub struct PayoutSnapshot {
    pub awards: Vec<Award>,
    pub valuations: Vec<ValuationEntry>,
}

/// Request for a stakeholder or user payout view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardRequest {
    pub owner: AwardOwner,
    pub scope: KpiScope,
    pub today: NaiveDate,
}

/// Service composing the store, the KPI engine, and the award lifecycle.
pub struct ProfitSharingService<S, N, D> {
    store: Arc<S>,
    lifecycle: AwardLifecycle<S, N, D>,
}

impl<S, N, D> ProfitSharingService<S, N, D>
where
    S: AwardRepository + ValuationRepository + PlanDirectory + 'static,
    N: NotificationDispatcher + 'static,
    D: DocumentRegenerator + 'static,
{
    pub fn new(store: Arc<S>, notifications: Arc<N>, documents: Arc<D>) -> Self {
        let lifecycle = AwardLifecycle::new(store.clone(), notifications, documents);
        Self { store, lifecycle }
    }

    pub fn lifecycle(&self) -> &AwardLifecycle<S, N, D> {
        &self.lifecycle
    }

    /// Load merged awards plus every valuation of the companies they touch.
    pub fn snapshot(
        &self,
        owner: &AwardOwner,
        scope: &KpiScope,
    ) -> Result<PayoutSnapshot, ProfitSharingServiceError> {
        let records = self.store.list_stakeholders(owner)?;
        if records.is_empty() {
            return Err(ProfitSharingServiceError::UnknownOwner(owner_label(owner)));
        }
        let awards = self.store.list_awards(owner)?;

        let mut companies: BTreeSet<&CompanyId> =
            records.iter().map(|record| &record.company_id).collect();
        if let Some(company_id) = scope.context_company_id.as_ref() {
            companies.insert(company_id);
        }

        // Company-wide lists so the plan fallback can see stale plan ids.
        let mut seen: HashSet<ValuationId> = HashSet::new();
        let mut valuations = Vec::new();
        for company_id in companies {
            for valuation in self.store.list_valuations(company_id, None)? {
                if seen.insert(valuation.id.clone()) {
                    valuations.push(valuation);
                }
            }
        }

        debug!(
            awards = awards.len(),
            valuations = valuations.len(),
            "loaded payout snapshot"
        );
        Ok(PayoutSnapshot { awards, valuations })
    }

    pub fn dashboard(
        &self,
        request: &DashboardRequest,
    ) -> Result<PayoutDashboard, ProfitSharingServiceError> {
        let snapshot = self.snapshot(&request.owner, &request.scope)?;
        let dashboard = build_dashboard(
            &snapshot.awards,
            &snapshot.valuations,
            &request.scope,
            request.today,
        );
        info!(
            owner = %owner_label(&request.owner),
            total_payout = %dashboard.kpis.total_payout_to_date,
            using_company_fallback = dashboard.kpis.using_company_fallback,
            "payout dashboard computed"
        );
        Ok(dashboard)
    }

    pub fn create_award(
        &self,
        actor: &Actor,
        stakeholder_id: &StakeholderId,
        draft: AwardDraft,
    ) -> Result<Award, ProfitSharingServiceError> {
        Ok(self.lifecycle.create(actor, stakeholder_id, draft)?)
    }

    pub fn edit_award(
        &self,
        actor: &Actor,
        award_ref: &AwardRef,
        edit: AwardEdit,
    ) -> Result<Award, ProfitSharingServiceError> {
        Ok(self.lifecycle.edit(actor, award_ref, edit)?)
    }

    pub fn delete_award(
        &self,
        actor: &Actor,
        award_ref: &AwardRef,
    ) -> Result<Award, ProfitSharingServiceError> {
        Ok(self.lifecycle.delete(actor, award_ref)?)
    }

    pub fn issue_award(
        &self,
        actor: &Actor,
        award_ref: &AwardRef,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome, ProfitSharingServiceError> {
        Ok(self.lifecycle.issue(actor, award_ref, at)?)
    }

    pub fn accept_award(
        &self,
        actor: &Actor,
        award_ref: &AwardRef,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome, ProfitSharingServiceError> {
        Ok(self.lifecycle.accept(actor, award_ref, at)?)
    }
}

fn owner_label(owner: &AwardOwner) -> String {
    match owner {
        AwardOwner::Stakeholder(id) => format!("stakeholder {id}"),
        AwardOwner::LinkedUser(id) => format!("user {id}"),
    }
}

/// Error raised by the profit-sharing service.
#[derive(Debug, thiserror::Error)]
pub enum ProfitSharingServiceError {
    #[error("no stakeholder records for {0}")]
    UnknownOwner(String),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
