//! Profit-sharing payout reconciliation and award lifecycle.
//!
//! Valuations (dated company profit entries) are matched to awards (share grants over a
//! date interval), priced per share, and reduced to the stakeholder dashboard KPIs. Awards
//! move through `draft -> issued -> finalized` via [`AwardLifecycle`].

pub mod domain;
pub mod import;
pub mod lifecycle;
pub mod matching;
pub mod merge;
pub mod pricing;
pub mod report;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    Award, AwardId, AwardInterval, AwardStatus, Company, CompanyId, Payout, Plan, PlanId,
    PlanSchedule, PlanStatus, ProfitType, Stakeholder, StakeholderId, UserId, ValuationEntry,
    ValuationId,
};
pub use import::{SkippedRow, ValuationImport, ValuationImportError, ValuationImporter};
pub use lifecycle::{
    next_status, record_transition, Actor, AwardDraft, AwardEdit, AwardLifecycle, AwardRef,
    AwardValidationError, CollaboratorWarning, LifecycleAction, LifecycleError,
    TransitionOutcome,
};
pub use matching::{
    match_award, upcoming_valuations, CandidateWindow, MatchOrder, PlanCandidates,
    ValuationMatch,
};
pub use merge::merge_awards;
pub use pricing::{payout_for, price_for_valuation, round_currency, total_payout};
pub use report::{build_dashboard, KpiAggregator, KpiScope, PayoutDashboard, PayoutKpis};
pub use repository::{
    AwardEvent, AwardOwner, AwardRepository, DocumentError, DocumentRef, DocumentRegenerator,
    NotificationDispatcher, NotificationError, PlanDirectory, RepositoryError, StatusUpdate,
    ValuationRepository,
};
pub use router::{profit_sharing_router, ACTOR_HEADER};
pub use service::{
    DashboardRequest, PayoutSnapshot, ProfitSharingService, ProfitSharingServiceError,
};
