use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::super::domain::{Award, CompanyId, Payout, PlanId, ValuationEntry, ValuationId};
use super::super::matching::{
    chronological, match_award, CandidateWindow, MatchOrder, PlanCandidates, ValuationMatch,
};
use super::super::pricing::{payout_for, price_for_valuation, total_payout};

/// Caller-selected filters. Everything the aggregator reads comes from here or its inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiScope {
    #[serde(default)]
    pub selected_plan_id: Option<PlanId>,
    /// Company selected in an administrator's aggregate view.
    #[serde(default)]
    pub context_company_id: Option<CompanyId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimatedProfitKpi {
    pub amount: Decimal,
    pub valuation_date: Option<NaiveDate>,
    pub has_estimate: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimatedPayoutKpi {
    pub amount: Decimal,
    pub valuation_id: Option<ValuationId>,
    pub valuation_date: Option<NaiveDate>,
    pub price_per_share: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastPayoutKpi {
    pub amount: Decimal,
    pub valuation_id: Option<ValuationId>,
    pub valuation_date: Option<NaiveDate>,
}

/// Headline figures for a stakeholder view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutKpis {
    pub next_estimated_profit: EstimatedProfitKpi,
    pub next_estimated_payout: EstimatedPayoutKpi,
    pub last_payout: LastPayoutKpi,
    pub total_payout_to_date: Decimal,
    pub using_company_fallback: bool,
}

struct AwardMatch<'a> {
    award: &'a Award,
    matched: ValuationMatch<'a>,
}

/// Plan-level valuation pool, ignoring award intervals.
struct PlanPool<'a> {
    valuations: Vec<&'a ValuationEntry>,
    fallback_plans: BTreeSet<&'a PlanId>,
}

/// Reduces a snapshot of awards and valuations to KPIs and payout history.
pub struct KpiAggregator<'a> {
    scope: &'a KpiScope,
    matches: Vec<AwardMatch<'a>>,
    pool: PlanPool<'a>,
}

impl<'a> KpiAggregator<'a> {
    pub fn new(
        awards: &'a [Award],
        valuations: &'a [ValuationEntry],
        scope: &'a KpiScope,
    ) -> Self {
        let relevant: Vec<&Award> = awards
            .iter()
            .filter(|award| match &scope.selected_plan_id {
                Some(plan_id) => award.plan_id.as_ref() == Some(plan_id),
                None => true,
            })
            .collect();

        let matches = relevant
            .iter()
            .map(|&award| AwardMatch {
                award,
                matched: match_award(
                    award,
                    valuations,
                    scope.context_company_id.as_ref(),
                    MatchOrder::MostRecentFirst,
                ),
            })
            .collect();

        let pool = plan_pool(&relevant, valuations, scope);

        Self {
            scope,
            matches,
            pool,
        }
    }

    pub fn scope(&self) -> &KpiScope {
        self.scope
    }

    pub fn using_company_fallback(&self) -> bool {
        !self.pool.fallback_plans.is_empty()
            || self
                .matches
                .iter()
                .any(|entry| entry.matched.using_company_fallback)
    }

    pub fn compute(&self, today: NaiveDate) -> PayoutKpis {
        PayoutKpis {
            next_estimated_profit: self.next_estimated_profit(today),
            next_estimated_payout: self.next_estimated_payout(),
            last_payout: self.last_payout(today),
            total_payout_to_date: self.total_payout_to_date(),
            using_company_fallback: self.using_company_fallback(),
        }
    }

    /// Soonest estimated valuation dated after `today`.
    pub fn next_estimated_profit(&self, today: NaiveDate) -> EstimatedProfitKpi {
        let next = self
            .pool
            .valuations
            .iter()
            .copied()
            .filter(|valuation| valuation.is_estimated())
            .filter(|valuation| valuation.valuation_date.is_some_and(|date| date > today))
            .min_by(|left, right| chronological(left, right));

        match next {
            Some(valuation) => EstimatedProfitKpi {
                amount: valuation.profit_amount,
                valuation_date: valuation.valuation_date,
                has_estimate: true,
            },
            None => EstimatedProfitKpi {
                amount: Decimal::ZERO,
                valuation_date: None,
                has_estimate: false,
            },
        }
    }

    /// Payout across relevant awards priced from the latest pooled valuation.
    pub fn next_estimated_payout(&self) -> EstimatedPayoutKpi {
        let latest = self
            .pool
            .valuations
            .iter()
            .copied()
            .max_by(|left, right| chronological(left, right));

        let Some(latest) = latest else {
            return EstimatedPayoutKpi {
                amount: Decimal::ZERO,
                valuation_id: None,
                valuation_date: None,
                price_per_share: Decimal::ZERO,
            };
        };

        let payouts: Vec<Payout> = self
            .matches
            .iter()
            .filter(|entry| self.priced_by(entry, latest))
            .map(|entry| payout_for(entry.award, latest))
            .collect();

        EstimatedPayoutKpi {
            amount: total_payout(&payouts),
            valuation_id: Some(latest.id.clone()),
            valuation_date: latest.valuation_date,
            price_per_share: price_for_valuation(latest),
        }
    }

    /// Payout at the latest actual valuation on or before `today` inside some award interval.
    pub fn last_payout(&self, today: NaiveDate) -> LastPayoutKpi {
        let latest = self
            .matched_actuals()
            .into_iter()
            .filter(|valuation| valuation.valuation_date.is_some_and(|date| date <= today))
            .max_by(|left, right| chronological(left, right));

        let Some(latest) = latest else {
            return LastPayoutKpi {
                amount: Decimal::ZERO,
                valuation_id: None,
                valuation_date: None,
            };
        };

        let payouts: Vec<Payout> = self
            .matches
            .iter()
            .filter(|entry| entry.matched.contains(&latest.id))
            .map(|entry| payout_for(entry.award, latest))
            .collect();

        LastPayoutKpi {
            amount: total_payout(&payouts),
            valuation_id: Some(latest.id.clone()),
            valuation_date: latest.valuation_date,
        }
    }

    /// Sum over every actual valuation of the payouts of each award active at its date.
    ///
    /// There is no `today` cut-off: an actual entry is only recorded once the period has
    /// closed, so every matched actual has already been paid. [`Self::last_payout`] takes
    /// `today` because it picks a single period relative to the viewer's date.
    pub fn total_payout_to_date(&self) -> Decimal {
        self.matches
            .iter()
            .flat_map(|entry| {
                entry
                    .matched
                    .valuations
                    .iter()
                    .filter(|valuation| valuation.is_actual())
                    .map(move |valuation| payout_for(entry.award, valuation))
            })
            .filter(|payout| payout.contributes())
            .map(|payout| payout.payout)
            .sum()
    }

    /// One row per matched award/valuation pair, most recent first.
    pub fn payout_history(&self) -> Vec<Payout> {
        let mut rows: Vec<Payout> = self
            .matches
            .iter()
            .flat_map(|entry| {
                entry
                    .matched
                    .valuations
                    .iter()
                    .map(move |valuation| payout_for(entry.award, valuation))
            })
            .collect();

        rows.sort_by(|left, right| {
            right
                .profit_date
                .cmp(&left.profit_date)
                .then_with(|| left.valuation_id.cmp(&right.valuation_id))
                .then_with(|| left.award_id.cmp(&right.award_id))
        });
        rows
    }

    fn matched_actuals(&self) -> Vec<&'a ValuationEntry> {
        let mut seen: HashSet<&ValuationId> = HashSet::new();
        self.matches
            .iter()
            .flat_map(|entry| entry.matched.valuations.iter().copied())
            .filter(|valuation| valuation.is_actual())
            .filter(|valuation| seen.insert(&valuation.id))
            .collect()
    }

    /// Plan check used for the estimated payout. Awards whose own match or whose plan pool
    /// is in company-fallback mode are priced by any valuation of their company instead.
    fn priced_by(&self, entry: &AwardMatch<'_>, valuation: &ValuationEntry) -> bool {
        let award = entry.award;
        let Some(plan_id) = award.plan_id.as_ref() else {
            return false;
        };

        if valuation.plan_id.as_ref() == Some(plan_id) {
            return true;
        }

        let in_fallback =
            entry.matched.using_company_fallback || self.pool.fallback_plans.contains(plan_id);
        in_fallback
            && award.context_company(self.scope.context_company_id.as_ref())
                == Some(&valuation.company_id)
    }
}

/// Every dated valuation of the relevant plans, with no award interval applied.
///
/// The pool feeds the forward-looking figures, whose valuations usually fall after the
/// award periods they forecast, so a plan only falls back to its company here when it has
/// no dated valuations at all. Interval-level fallback is reported through each award's
/// [`ValuationMatch`].
fn plan_pool<'a>(
    awards: &[&'a Award],
    valuations: &'a [ValuationEntry],
    scope: &'a KpiScope,
) -> PlanPool<'a> {
    let mut plans: BTreeMap<&'a PlanId, Option<&'a CompanyId>> = BTreeMap::new();
    if let Some(plan_id) = scope.selected_plan_id.as_ref() {
        plans.insert(plan_id, scope.context_company_id.as_ref());
    }
    for &award in awards {
        if let Some(plan_id) = award.plan_id.as_ref() {
            let company = award.context_company(scope.context_company_id.as_ref());
            let entry = plans.entry(plan_id).or_insert(company);
            if entry.is_none() {
                *entry = company;
            }
        }
    }

    let mut seen: HashSet<&ValuationId> = HashSet::new();
    let mut pooled = Vec::new();
    let mut fallback_plans = BTreeSet::new();
    for (plan_id, company_id) in plans {
        let candidates = PlanCandidates::resolve(
            Some(plan_id),
            company_id,
            valuations,
            CandidateWindow::AnyDate,
        );
        if candidates.using_company_fallback {
            fallback_plans.insert(plan_id);
        }
        pooled.extend(
            candidates
                .valuations
                .into_iter()
                .filter(|valuation| seen.insert(&valuation.id)),
        );
    }

    PlanPool {
        valuations: pooled,
        fallback_plans,
    }
}
