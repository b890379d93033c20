use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::domain::{
    Award, AwardId, AwardStatus, Company, Plan, PlanId, Stakeholder, StakeholderId, UserId,
};
use super::repository::{
    AwardEvent, AwardRepository, DocumentError, DocumentRef, DocumentRegenerator,
    NotificationDispatcher, NotificationError, PlanDirectory, RepositoryError, StatusUpdate,
};

/// User-initiated operations on an award.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Issue,
    Accept,
    Edit,
    Delete,
}

impl LifecycleAction {
    pub const fn label(self) -> &'static str {
        match self {
            LifecycleAction::Issue => "issue",
            LifecycleAction::Accept => "accept",
            LifecycleAction::Edit => "edit",
            LifecycleAction::Delete => "delete",
        }
    }
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Status the award holds after `action`, or the rejection when `action` is not allowed.
///
/// `draft -> issued -> finalized`; edits and deletes are only allowed on drafts.
pub fn next_status(
    from: AwardStatus,
    action: LifecycleAction,
) -> Result<AwardStatus, LifecycleError> {
    match (from, action) {
        (AwardStatus::Draft, LifecycleAction::Issue) => Ok(AwardStatus::Issued),
        (AwardStatus::Issued, LifecycleAction::Accept) => Ok(AwardStatus::Finalized),
        (AwardStatus::Draft, LifecycleAction::Edit | LifecycleAction::Delete) => {
            Ok(AwardStatus::Draft)
        }
        (from, action) => Err(LifecycleError::InvalidTransition { from, action }),
    }
}

/// Stamp audit fields for a status change. Store adapters call this inside their
/// conditional write.
pub fn record_transition(
    award: &mut Award,
    status: AwardStatus,
    actor: &UserId,
    at: DateTime<Utc>,
) {
    award.status = status;
    match status {
        AwardStatus::Issued => {
            award.issued_by = Some(actor.clone());
            award.issued_at = Some(at);
        }
        AwardStatus::Finalized => {
            award.accepted_by = Some(actor.clone());
            award.accepted_at = Some(at);
        }
        AwardStatus::Draft => {}
    }
}

/// Identity performing an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub user_id: UserId,
}

impl Actor {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: UserId::new(user_id),
        }
    }
}

/// Address of an award in its system of record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardRef {
    pub stakeholder_id: StakeholderId,
    pub award_id: AwardId,
}

impl From<&Award> for AwardRef {
    fn from(award: &Award) -> Self {
        Self {
            stakeholder_id: award.stakeholder_id.clone(),
            award_id: award.id.clone(),
        }
    }
}

/// Fields supplied when an administrator drafts an award.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardDraft {
    pub plan_id: Option<PlanId>,
    pub award_start_date: Option<NaiveDate>,
    pub award_end_date: Option<NaiveDate>,
    pub shares_issued: Option<i64>,
}

/// Partial update of a draft award. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardEdit {
    #[serde(default)]
    pub plan_id: Option<PlanId>,
    #[serde(default)]
    pub award_start_date: Option<NaiveDate>,
    #[serde(default)]
    pub award_end_date: Option<NaiveDate>,
    #[serde(default)]
    pub shares_issued: Option<i64>,
}

impl AwardEdit {
    fn apply(self, award: &mut Award) {
        if let Some(plan_id) = self.plan_id {
            award.plan_id = Some(plan_id);
        }
        if let Some(start) = self.award_start_date {
            award.award_start_date = Some(start);
        }
        if let Some(end) = self.award_end_date {
            award.award_end_date = Some(end);
        }
        if let Some(shares) = self.shares_issued {
            award.shares_issued = Some(shares);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AwardValidationError {
    #[error("award starts on {start} after it ends on {end}")]
    InvertedInterval { start: NaiveDate, end: NaiveDate },
    #[error("shares issued cannot be negative (got {0})")]
    NegativeShares(i64),
}

fn validate_award(award: &Award) -> Result<(), AwardValidationError> {
    if let (Some(start), Some(end)) = (award.award_start_date, award.award_end_date) {
        if start > end {
            return Err(AwardValidationError::InvertedInterval { start, end });
        }
    }
    if let Some(shares) = award.shares_issued {
        if shares < 0 {
            return Err(AwardValidationError::NegativeShares(shares));
        }
    }
    Ok(())
}

/// Non-fatal failure of a side effect after a committed transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CollaboratorWarning {
    Notification { detail: String },
    Document { detail: String },
}

impl fmt::Display for CollaboratorWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollaboratorWarning::Notification { detail } => {
                write!(f, "notification not sent: {detail}")
            }
            CollaboratorWarning::Document { detail } => {
                write!(f, "award document not regenerated: {detail}")
            }
        }
    }
}

/// Committed award plus any side-effect warnings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionOutcome {
    pub award: Award,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<DocumentRef>,
    pub warnings: Vec<CollaboratorWarning>,
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("cannot {action} an award that is {from}")]
    InvalidTransition {
        from: AwardStatus,
        action: LifecycleAction,
    },
    #[error("only the stakeholder who owns the award may accept it")]
    NotOwner,
    #[error("an actor identity is required")]
    MissingActor,
    #[error("invalid award: {0}")]
    InvalidAward(#[from] AwardValidationError),
    #[error("award changed concurrently (expected {expected}, found {found}); reload and retry")]
    Conflict {
        expected: AwardStatus,
        found: AwardStatus,
    },
    #[error("award or stakeholder not found")]
    NotFound,
    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for LifecycleError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict { expected, found } => Self::Conflict { expected, found },
            RepositoryError::NotFound => Self::NotFound,
            other => Self::Repository(other),
        }
    }
}

const CREATE_ATTEMPTS: usize = 3;

/// `award-NNNNNN` one past the highest numbered award already on the record.
fn next_award_id(stakeholder: &Stakeholder) -> AwardId {
    let highest = stakeholder
        .awards
        .iter()
        .filter_map(|award| award.id.as_str().strip_prefix("award-"))
        .filter_map(|suffix| suffix.parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    AwardId(format!("award-{:06}", highest.saturating_add(1)))
}

/// Award state machine wired to the store and its side-effect collaborators.
pub struct AwardLifecycle<S, N, D> {
    store: Arc<S>,
    notifications: Arc<N>,
    documents: Arc<D>,
}

impl<S, N, D> AwardLifecycle<S, N, D>
where
    S: AwardRepository + PlanDirectory + 'static,
    N: NotificationDispatcher + 'static,
    D: DocumentRegenerator + 'static,
{
    pub fn new(store: Arc<S>, notifications: Arc<N>, documents: Arc<D>) -> Self {
        Self {
            store,
            notifications,
            documents,
        }
    }

    /// Create a draft award on a stakeholder record.
    pub fn create(
        &self,
        actor: &Actor,
        stakeholder_id: &StakeholderId,
        draft: AwardDraft,
    ) -> Result<Award, LifecycleError> {
        require_actor(actor)?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let stakeholder = self
                .store
                .fetch_stakeholder(stakeholder_id)?
                .ok_or(LifecycleError::NotFound)?;

            let award = Award {
                id: next_award_id(&stakeholder),
                plan_id: draft.plan_id.clone(),
                stakeholder_id: stakeholder_id.clone(),
                source_company_id: None,
                award_start_date: draft.award_start_date,
                award_end_date: draft.award_end_date,
                shares_issued: draft.shares_issued,
                status: AwardStatus::Draft,
                issued_at: None,
                issued_by: None,
                accepted_at: None,
                accepted_by: None,
            };
            validate_award(&award)?;

            match self.store.insert_award(stakeholder_id, award) {
                Ok(stored) => {
                    info!(
                        award_id = %stored.id,
                        stakeholder_id = %stakeholder_id,
                        actor = %actor.user_id,
                        "award drafted"
                    );
                    return Ok(stored);
                }
                // Another draft took the id between read and write.
                Err(RepositoryError::Duplicate) if attempt < CREATE_ATTEMPTS => {
                    debug!(stakeholder_id = %stakeholder_id, attempt, "award id taken; retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// `draft -> issued`. Notifies the stakeholder and regenerates the agreement.
    pub fn issue(
        &self,
        actor: &Actor,
        award_ref: &AwardRef,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome, LifecycleError> {
        require_actor(actor)?;
        let (stakeholder, award) = self.load(award_ref)?;
        let status = next_status(award.status, LifecycleAction::Issue)?;

        let updated = self.store.update_award_status(StatusUpdate {
            stakeholder_id: stakeholder.id.clone(),
            award_id: award.id.clone(),
            expected: award.status,
            status,
            actor: actor.user_id.clone(),
            at,
        })?;
        info!(
            award_id = %updated.id,
            stakeholder_id = %stakeholder.id,
            actor = %actor.user_id,
            "award issued"
        );

        let mut warnings = Vec::new();
        match stakeholder.linked_user_id.as_ref() {
            Some(recipient) => {
                self.notify(recipient, AwardEvent::AwardIssued, &updated, &mut warnings)
            }
            None => warnings.push(CollaboratorWarning::Notification {
                detail: format!("stakeholder {} has no linked user", stakeholder.id),
            }),
        }
        let document = self.regenerate(&updated, &stakeholder, &mut warnings);

        Ok(TransitionOutcome {
            award: updated,
            document,
            warnings,
        })
    }

    /// `issued -> finalized`. Only the owning stakeholder's linked user may accept.
    pub fn accept(
        &self,
        actor: &Actor,
        award_ref: &AwardRef,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome, LifecycleError> {
        require_actor(actor)?;
        let (stakeholder, award) = self.load(award_ref)?;
        let status = next_status(award.status, LifecycleAction::Accept)?;
        if !stakeholder.is_linked_to(&actor.user_id) {
            warn!(award_id = %award.id, actor = %actor.user_id, "accept rejected for non-owner");
            return Err(LifecycleError::NotOwner);
        }

        let updated = self.store.update_award_status(StatusUpdate {
            stakeholder_id: stakeholder.id.clone(),
            award_id: award.id.clone(),
            expected: award.status,
            status,
            actor: actor.user_id.clone(),
            at,
        })?;
        info!(
            award_id = %updated.id,
            stakeholder_id = %stakeholder.id,
            actor = %actor.user_id,
            "award accepted"
        );

        let mut warnings = Vec::new();
        if let Some(issuer) = updated.issued_by.clone() {
            self.notify(&issuer, AwardEvent::AwardAccepted, &updated, &mut warnings);
        }
        let document = self.regenerate(&updated, &stakeholder, &mut warnings);

        Ok(TransitionOutcome {
            award: updated,
            document,
            warnings,
        })
    }

    /// Update a draft award in place.
    pub fn edit(
        &self,
        actor: &Actor,
        award_ref: &AwardRef,
        edit: AwardEdit,
    ) -> Result<Award, LifecycleError> {
        require_actor(actor)?;
        let (stakeholder, mut award) = self.load(award_ref)?;
        let expected = award.status;
        next_status(expected, LifecycleAction::Edit)?;

        edit.apply(&mut award);
        validate_award(&award)?;

        let stored = self.store.replace_award(&stakeholder.id, award, expected)?;
        info!(award_id = %stored.id, actor = %actor.user_id, "award edited");
        Ok(stored)
    }

    /// Remove a draft award. Issued and finalized awards are kept as an audit trail.
    pub fn delete(&self, actor: &Actor, award_ref: &AwardRef) -> Result<Award, LifecycleError> {
        require_actor(actor)?;
        let (stakeholder, award) = self.load(award_ref)?;
        next_status(award.status, LifecycleAction::Delete)?;

        let removed = self
            .store
            .delete_award(&stakeholder.id, &award.id, award.status)?;
        info!(award_id = %removed.id, actor = %actor.user_id, "draft award deleted");
        Ok(removed)
    }

    /// Load from the owning record named in the reference, never from a merged view.
    fn load(&self, award_ref: &AwardRef) -> Result<(Stakeholder, Award), LifecycleError> {
        let stakeholder = self
            .store
            .fetch_stakeholder(&award_ref.stakeholder_id)?
            .ok_or(LifecycleError::NotFound)?;
        let award = stakeholder
            .award(&award_ref.award_id)
            .cloned()
            .ok_or(LifecycleError::NotFound)?;
        Ok((stakeholder, award))
    }

    fn notify(
        &self,
        recipient: &UserId,
        event: AwardEvent,
        award: &Award,
        warnings: &mut Vec<CollaboratorWarning>,
    ) {
        let mut payload = BTreeMap::new();
        payload.insert("awardId".to_string(), award.id.to_string());
        payload.insert("stakeholderId".to_string(), award.stakeholder_id.to_string());
        payload.insert("status".to_string(), award.status.label().to_string());
        if let Some(plan_id) = &award.plan_id {
            payload.insert("planId".to_string(), plan_id.to_string());
        }

        if let Err(NotificationError::Transport(detail)) =
            self.notifications.notify(recipient, event, payload)
        {
            warn!(
                award_id = %award.id,
                event = event.label(),
                %detail,
                "award notification failed"
            );
            warnings.push(CollaboratorWarning::Notification { detail });
        }
    }

    fn regenerate(
        &self,
        award: &Award,
        stakeholder: &Stakeholder,
        warnings: &mut Vec<CollaboratorWarning>,
    ) -> Option<DocumentRef> {
        let result = self.document_inputs(award, stakeholder).and_then(|(plan, company)| {
            self.documents
                .regenerate(award, &plan, stakeholder, &company)
                .map_err(|err| match err {
                    DocumentError::Render(detail) | DocumentError::Storage(detail) => detail,
                })
        });

        match result {
            Ok(document) => Some(document),
            Err(detail) => {
                warn!(award_id = %award.id, %detail, "award document regeneration failed");
                warnings.push(CollaboratorWarning::Document { detail });
                None
            }
        }
    }

    fn document_inputs(
        &self,
        award: &Award,
        stakeholder: &Stakeholder,
    ) -> Result<(Plan, Company), String> {
        let plan_id = award
            .plan_id
            .as_ref()
            .ok_or_else(|| "award has no plan".to_string())?;
        let plan = self
            .store
            .fetch_plan(plan_id)
            .map_err(|err| err.to_string())?
            .ok_or_else(|| format!("plan {plan_id} not found"))?;
        let company = self
            .store
            .fetch_company(&stakeholder.company_id)
            .map_err(|err| err.to_string())?
            .ok_or_else(|| format!("company {} not found", stakeholder.company_id))?;
        Ok((plan, company))
    }
}

fn require_actor(actor: &Actor) -> Result<(), LifecycleError> {
    if actor.user_id.as_str().trim().is_empty() {
        return Err(LifecycleError::MissingActor);
    }
    Ok(())
}
