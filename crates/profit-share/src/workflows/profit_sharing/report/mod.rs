mod kpis;
pub mod views;

pub use kpis::{
    EstimatedPayoutKpi, EstimatedProfitKpi, KpiAggregator, KpiScope, LastPayoutKpi, PayoutKpis,
};
pub use views::PayoutDashboard;

use chrono::NaiveDate;

use super::domain::{Award, ValuationEntry};

/// Full recompute of the dashboard from a snapshot.
pub fn build_dashboard(
    awards: &[Award],
    valuations: &[ValuationEntry],
    scope: &KpiScope,
    today: NaiveDate,
) -> PayoutDashboard {
    let aggregator = KpiAggregator::new(awards, valuations, scope);
    PayoutDashboard {
        today,
        scope: scope.clone(),
        kpis: aggregator.compute(today),
        history: aggregator.payout_history(),
    }
}
