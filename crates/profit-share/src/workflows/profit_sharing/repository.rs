use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    Award, AwardId, AwardStatus, Company, CompanyId, Plan, PlanId, Stakeholder, StakeholderId,
    UserId, ValuationEntry,
};
use super::merge::merge_awards;

/// Whose awards to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AwardOwner {
    /// A single stakeholder record.
    Stakeholder(StakeholderId),
    /// Every stakeholder record linked to a user, across companies.
    LinkedUser(UserId),
}

/// Conditional status write. Applied only while the stored status equals `expected`.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub stakeholder_id: StakeholderId,
    pub award_id: AwardId,
    pub expected: AwardStatus,
    pub status: AwardStatus,
    pub actor: UserId,
    pub at: DateTime<Utc>,
}

/// Document store access for stakeholder records and their embedded awards.
///
/// Every write returns the stored post-write award so callers never re-read.
pub trait AwardRepository: Send + Sync {
    fn list_stakeholders(&self, owner: &AwardOwner) -> Result<Vec<Stakeholder>, RepositoryError>;
    fn fetch_stakeholder(
        &self,
        id: &StakeholderId,
    ) -> Result<Option<Stakeholder>, RepositoryError>;
    fn insert_award(
        &self,
        stakeholder_id: &StakeholderId,
        award: Award,
    ) -> Result<Award, RepositoryError>;
    fn replace_award(
        &self,
        stakeholder_id: &StakeholderId,
        award: Award,
        expected: AwardStatus,
    ) -> Result<Award, RepositoryError>;
    fn delete_award(
        &self,
        stakeholder_id: &StakeholderId,
        award_id: &AwardId,
        expected: AwardStatus,
    ) -> Result<Award, RepositoryError>;
    fn update_award_status(&self, update: StatusUpdate) -> Result<Award, RepositoryError>;

    /// Awards for the owner, merged across stakeholder records.
    fn list_awards(&self, owner: &AwardOwner) -> Result<Vec<Award>, RepositoryError> {
        let records = self.list_stakeholders(owner)?;
        Ok(merge_awards(&records))
    }
}

/// Read access to profit entries.
pub trait ValuationRepository: Send + Sync {
    fn list_valuations(
        &self,
        company_id: &CompanyId,
        plan_id: Option<&PlanId>,
    ) -> Result<Vec<ValuationEntry>, RepositoryError>;
}

/// Plan and company lookups needed to regenerate award documents.
pub trait PlanDirectory: Send + Sync {
    fn fetch_plan(&self, id: &PlanId) -> Result<Option<Plan>, RepositoryError>;
    fn fetch_company(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError>;
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("award status changed concurrently: expected {expected}, found {found}")]
    Conflict {
        expected: AwardStatus,
        found: AwardStatus,
    },
    #[error("record already exists")]
    Duplicate,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Lifecycle events sent to the notification dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AwardEvent {
    AwardIssued,
    AwardAccepted,
}

impl AwardEvent {
    pub const fn label(self) -> &'static str {
        match self {
            AwardEvent::AwardIssued => "award_issued",
            AwardEvent::AwardAccepted => "award_accepted",
        }
    }
}

/// Outbound notification hook (e-mail, in-app inbox).
pub trait NotificationDispatcher: Send + Sync {
    fn notify(
        &self,
        user_id: &UserId,
        event: AwardEvent,
        payload: BTreeMap<String, String>,
    ) -> Result<(), NotificationError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Pointer to a generated award agreement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRef {
    pub storage_key: String,
    pub generated_at: DateTime<Utc>,
}

/// Renders the award agreement for the current award state.
pub trait DocumentRegenerator: Send + Sync {
    fn regenerate(
        &self,
        award: &Award,
        plan: &Plan,
        stakeholder: &Stakeholder,
        company: &Company,
    ) -> Result<DocumentRef, DocumentError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("document rendering failed: {0}")]
    Render(String),
    #[error("document storage failed: {0}")]
    Storage(String),
}
