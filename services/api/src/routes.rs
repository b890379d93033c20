use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use chrono::{Local, NaiveDate};
use profit_share::error::AppError;
use profit_share::workflows::profit_sharing::{
    build_dashboard, profit_sharing_router, Award, AwardRepository, CompanyId,
    DocumentRegenerator, KpiScope, NotificationDispatcher, PayoutDashboard, PlanDirectory, PlanId,
    ProfitSharingService, SkippedRow, ValuationEntry, ValuationImporter, ValuationRepository,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::io::Cursor;
use std::sync::Arc;

/// Stateless what-if report over caller-supplied awards and valuations.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PayoutReportRequest {
    pub(crate) awards: Vec<Award>,
    #[serde(default)]
    pub(crate) valuations: Vec<ValuationEntry>,
    /// Valuation export in the admin spreadsheet layout, appended to `valuations`.
    #[serde(default)]
    pub(crate) valuations_csv: Option<String>,
    #[serde(default)]
    pub(crate) plan_id: Option<PlanId>,
    #[serde(default)]
    pub(crate) company_id: Option<CompanyId>,
    #[serde(default)]
    pub(crate) today: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PayoutReportResponse {
    #[serde(flatten)]
    pub(crate) dashboard: PayoutDashboard,
    pub(crate) skipped_rows: Vec<SkippedRow>,
}

pub(crate) fn with_profit_sharing_routes<S, N, D>(
    service: Arc<ProfitSharingService<S, N, D>>,
) -> axum::Router
where
    S: AwardRepository + ValuationRepository + PlanDirectory + 'static,
    N: NotificationDispatcher + 'static,
    D: DocumentRegenerator + 'static,
{
    profit_sharing_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/profit-sharing/report",
            axum::routing::post(payout_report_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn payout_report_endpoint(
    Json(payload): Json<PayoutReportRequest>,
) -> Result<Json<PayoutReportResponse>, AppError> {
    let PayoutReportRequest {
        awards,
        mut valuations,
        valuations_csv,
        plan_id,
        company_id,
        today,
    } = payload;

    let mut skipped_rows = Vec::new();
    if let Some(csv) = valuations_csv {
        let import = ValuationImporter::from_reader(Cursor::new(csv.into_bytes()))?;
        valuations.extend(import.entries);
        skipped_rows = import.skipped;
    }

    let scope = KpiScope {
        selected_plan_id: plan_id,
        context_company_id: company_id,
    };
    let today = today.unwrap_or_else(|| Local::now().date_naive());
    let dashboard = build_dashboard(&awards, &valuations, &scope, today);

    Ok(Json(PayoutReportResponse {
        dashboard,
        skipped_rows,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Json;
    use rust_decimal::Decimal;

    const HEADER: &str =
        "id,companyId,planId,valuationDate,profitAmount,profitType,pricePerShare,totalShares\n";

    fn request(valuations_csv: Option<&str>) -> PayoutReportRequest {
        let awards: Vec<Award> = serde_json::from_value(json!([{
            "id": "a-1",
            "planId": "P1",
            "stakeholderId": "s-1",
            "awardStartDate": "2024-01-01",
            "awardEndDate": "2024-12-31",
            "sharesIssued": 100,
            "status": "finalized"
        }]))
        .expect("awards parse");

        PayoutReportRequest {
            awards,
            valuations: Vec::new(),
            valuations_csv: valuations_csv.map(str::to_string),
            plan_id: None,
            company_id: None,
            today: NaiveDate::from_ymd_opt(2024, 12, 31),
        }
    }

    #[tokio::test]
    async fn payout_report_endpoint_reconciles_csv_valuations() {
        let csv = format!(
            "{HEADER}\
             V1,C,P1,2024-03-31,\"$10,000\",actual,,1000\n\
             V2,C,P1,2025-03-31,12000,estimated,,\n"
        );

        let Json(body) = payout_report_endpoint(Json(request(Some(&csv))))
            .await
            .expect("report builds");

        assert_eq!(body.dashboard.kpis.total_payout_to_date, Decimal::from(1000));
        assert_eq!(
            body.dashboard.kpis.next_estimated_profit.amount,
            Decimal::from(12000)
        );
        assert!(body.skipped_rows.is_empty());
    }

    #[tokio::test]
    async fn payout_report_endpoint_reports_skipped_rows() {
        let csv = format!("{HEADER}V1,C,P1,2024-03-31,lots,actual,,1000\n");

        let Json(body) = payout_report_endpoint(Json(request(Some(&csv))))
            .await
            .expect("report builds");

        assert_eq!(body.skipped_rows.len(), 1);
        assert_eq!(body.dashboard.kpis.total_payout_to_date, Decimal::ZERO);
        assert!(!body.dashboard.has_history());
    }

    #[tokio::test]
    async fn healthcheck_reports_ok() {
        let Json(body) = healthcheck().await;
        assert_eq!(body["status"], "ok");
    }
}
