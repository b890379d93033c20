use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;

use super::domain::{AwardId, CompanyId, PlanId, StakeholderId, UserId};
use super::lifecycle::{Actor, AwardDraft, AwardEdit, AwardRef, LifecycleError};
use super::report::KpiScope;
use super::repository::{
    AwardOwner, AwardRepository, DocumentRegenerator, NotificationDispatcher, PlanDirectory,
    ValuationRepository,
};
use super::service::{DashboardRequest, ProfitSharingService, ProfitSharingServiceError};

/// Header carrying the authenticated user id, set by the upstream auth proxy.
pub const ACTOR_HEADER: &str = "x-actor-id";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DashboardQuery {
    #[serde(default)]
    plan_id: Option<String>,
    #[serde(default)]
    company_id: Option<String>,
    #[serde(default)]
    today: Option<NaiveDate>,
}

impl DashboardQuery {
    fn scope(&self) -> KpiScope {
        KpiScope {
            selected_plan_id: self.plan_id.clone().map(PlanId),
            context_company_id: self.company_id.clone().map(CompanyId),
        }
    }
}

/// Router builder exposing payout dashboards and award lifecycle endpoints.
pub fn profit_sharing_router<S, N, D>(service: Arc<ProfitSharingService<S, N, D>>) -> Router
where
    S: AwardRepository + ValuationRepository + PlanDirectory + 'static,
    N: NotificationDispatcher + 'static,
    D: DocumentRegenerator + 'static,
{
    Router::new()
        .route(
            "/api/v1/profit-sharing/stakeholders/:stakeholder_id/dashboard",
            get(stakeholder_dashboard_handler::<S, N, D>),
        )
        .route(
            "/api/v1/profit-sharing/users/:user_id/dashboard",
            get(user_dashboard_handler::<S, N, D>),
        )
        .route(
            "/api/v1/profit-sharing/stakeholders/:stakeholder_id/awards",
            post(create_handler::<S, N, D>),
        )
        .route(
            "/api/v1/profit-sharing/stakeholders/:stakeholder_id/awards/:award_id",
            delete(delete_handler::<S, N, D>).patch(edit_handler::<S, N, D>),
        )
        .route(
            "/api/v1/profit-sharing/stakeholders/:stakeholder_id/awards/:award_id/issue",
            post(issue_handler::<S, N, D>),
        )
        .route(
            "/api/v1/profit-sharing/stakeholders/:stakeholder_id/awards/:award_id/accept",
            post(accept_handler::<S, N, D>),
        )
        .with_state(service)
}

pub(crate) async fn stakeholder_dashboard_handler<S, N, D>(
    State(service): State<Arc<ProfitSharingService<S, N, D>>>,
    Path(stakeholder_id): Path<String>,
    Query(query): Query<DashboardQuery>,
) -> Response
where
    S: AwardRepository + ValuationRepository + PlanDirectory + 'static,
    N: NotificationDispatcher + 'static,
    D: DocumentRegenerator + 'static,
{
    let owner = AwardOwner::Stakeholder(StakeholderId(stakeholder_id));
    dashboard_response(&service, owner, &query)
}

pub(crate) async fn user_dashboard_handler<S, N, D>(
    State(service): State<Arc<ProfitSharingService<S, N, D>>>,
    Path(user_id): Path<String>,
    Query(query): Query<DashboardQuery>,
) -> Response
where
    S: AwardRepository + ValuationRepository + PlanDirectory + 'static,
    N: NotificationDispatcher + 'static,
    D: DocumentRegenerator + 'static,
{
    let owner = AwardOwner::LinkedUser(UserId(user_id));
    dashboard_response(&service, owner, &query)
}

fn dashboard_response<S, N, D>(
    service: &ProfitSharingService<S, N, D>,
    owner: AwardOwner,
    query: &DashboardQuery,
) -> Response
where
    S: AwardRepository + ValuationRepository + PlanDirectory + 'static,
    N: NotificationDispatcher + 'static,
    D: DocumentRegenerator + 'static,
{
    let request = DashboardRequest {
        owner,
        scope: query.scope(),
        today: query.today.unwrap_or_else(|| Utc::now().date_naive()),
    };

    match service.dashboard(&request) {
        Ok(dashboard) => (StatusCode::OK, Json(dashboard)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn create_handler<S, N, D>(
    State(service): State<Arc<ProfitSharingService<S, N, D>>>,
    Path(stakeholder_id): Path<String>,
    headers: HeaderMap,
    Json(draft): Json<AwardDraft>,
) -> Response
where
    S: AwardRepository + ValuationRepository + PlanDirectory + 'static,
    N: NotificationDispatcher + 'static,
    D: DocumentRegenerator + 'static,
{
    let actor = actor_from_headers(&headers);
    match service.create_award(&actor, &StakeholderId(stakeholder_id), draft) {
        Ok(award) => (StatusCode::CREATED, Json(award)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn edit_handler<S, N, D>(
    State(service): State<Arc<ProfitSharingService<S, N, D>>>,
    Path((stakeholder_id, award_id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(edit): Json<AwardEdit>,
) -> Response
where
    S: AwardRepository + ValuationRepository + PlanDirectory + 'static,
    N: NotificationDispatcher + 'static,
    D: DocumentRegenerator + 'static,
{
    let actor = actor_from_headers(&headers);
    let award_ref = award_ref(stakeholder_id, award_id);
    match service.edit_award(&actor, &award_ref, edit) {
        Ok(award) => (StatusCode::OK, Json(award)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn delete_handler<S, N, D>(
    State(service): State<Arc<ProfitSharingService<S, N, D>>>,
    Path((stakeholder_id, award_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response
where
    S: AwardRepository + ValuationRepository + PlanDirectory + 'static,
    N: NotificationDispatcher + 'static,
    D: DocumentRegenerator + 'static,
{
    let actor = actor_from_headers(&headers);
    let award_ref = award_ref(stakeholder_id, award_id);
    match service.delete_award(&actor, &award_ref) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn issue_handler<S, N, D>(
    State(service): State<Arc<ProfitSharingService<S, N, D>>>,
    Path((stakeholder_id, award_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response
where
    S: AwardRepository + ValuationRepository + PlanDirectory + 'static,
    N: NotificationDispatcher + 'static,
    D: DocumentRegenerator + 'static,
{
    let actor = actor_from_headers(&headers);
    let award_ref = award_ref(stakeholder_id, award_id);
    match service.issue_award(&actor, &award_ref, Utc::now()) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn accept_handler<S, N, D>(
    State(service): State<Arc<ProfitSharingService<S, N, D>>>,
    Path((stakeholder_id, award_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response
where
    S: AwardRepository + ValuationRepository + PlanDirectory + 'static,
    N: NotificationDispatcher + 'static,
    D: DocumentRegenerator + 'static,
{
    let actor = actor_from_headers(&headers);
    let award_ref = award_ref(stakeholder_id, award_id);
    match service.accept_award(&actor, &award_ref, Utc::now()) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => error_response(err),
    }
}

fn award_ref(stakeholder_id: String, award_id: String) -> AwardRef {
    AwardRef {
        stakeholder_id: StakeholderId(stakeholder_id),
        award_id: AwardId(award_id),
    }
}

/// Missing or non-UTF-8 headers yield an empty actor, which the lifecycle rejects.
fn actor_from_headers(headers: &HeaderMap) -> Actor {
    let user_id = headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .trim()
        .to_string();
    Actor {
        user_id: UserId(user_id),
    }
}

fn error_response(err: ProfitSharingServiceError) -> Response {
    let status = match &err {
        ProfitSharingServiceError::UnknownOwner(_) => StatusCode::NOT_FOUND,
        ProfitSharingServiceError::Lifecycle(lifecycle) => match lifecycle {
            LifecycleError::InvalidTransition { .. } | LifecycleError::InvalidAward(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            LifecycleError::NotOwner => StatusCode::FORBIDDEN,
            LifecycleError::MissingActor => StatusCode::UNAUTHORIZED,
            LifecycleError::Conflict { .. } => StatusCode::CONFLICT,
            LifecycleError::NotFound => StatusCode::NOT_FOUND,
            LifecycleError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
        },
        ProfitSharingServiceError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let payload = json!({
        "error": err.to_string(),
    });
    (status, Json(payload)).into_response()
}
