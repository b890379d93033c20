use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use super::super::domain::Payout;
use super::super::pricing::round_currency;
use super::kpis::{KpiScope, PayoutKpis};

/// Serialized payload behind the stakeholder payout screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutDashboard {
    pub today: NaiveDate,
    pub scope: KpiScope,
    pub kpis: PayoutKpis,
    pub history: Vec<Payout>,
}

/// Rounded figure with a label, for text rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiLine {
    pub label: &'static str,
    pub amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub as_of: Option<NaiveDate>,
}

impl PayoutDashboard {
    pub fn kpi_lines(&self) -> Vec<KpiLine> {
        let kpis = &self.kpis;
        vec![
            KpiLine {
                label: "Next estimated profit",
                amount: round_currency(kpis.next_estimated_profit.amount),
                as_of: kpis.next_estimated_profit.valuation_date,
            },
            KpiLine {
                label: "Next estimated payout",
                amount: round_currency(kpis.next_estimated_payout.amount),
                as_of: kpis.next_estimated_payout.valuation_date,
            },
            KpiLine {
                label: "Last payout",
                amount: round_currency(kpis.last_payout.amount),
                as_of: kpis.last_payout.valuation_date,
            },
            KpiLine {
                label: "Total payout to date",
                amount: round_currency(kpis.total_payout_to_date),
                as_of: None,
            },
        ]
    }

    pub fn has_history(&self) -> bool {
        !self.history.is_empty()
    }
}
