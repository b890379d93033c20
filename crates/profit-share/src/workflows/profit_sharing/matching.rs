//! Pairing of awards with the valuations that price them.
//!
//! [`PlanCandidates`] applies the plan rule inside a date window and falls back to every
//! valuation of the award's company in that window when the plan rule keeps nothing (plan
//! identifiers were re-issued while historical valuations kept the old one).
//! [`match_award`] runs it with the award's interval as the window.

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::NaiveDate;
use tracing::debug;

use super::domain::{Award, AwardInterval, CompanyId, PlanId, ValuationEntry, ValuationId};

/// Sort order applied to matched valuations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOrder {
    /// `valuation_date` descending, used for payout history.
    MostRecentFirst,
    /// `valuation_date` ascending, used to find the next estimate.
    SoonestFirst,
}

/// Dates a candidate must fall on. Undated valuations never qualify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateWindow {
    Within(AwardInterval),
    AnyDate,
}

impl CandidateWindow {
    pub fn admits(&self, valuation: &ValuationEntry) -> bool {
        match (self, valuation.valuation_date) {
            (_, None) => false,
            (CandidateWindow::Within(interval), Some(date)) => interval.contains(date),
            (CandidateWindow::AnyDate, Some(_)) => true,
        }
    }
}

/// Valuations eligible for a plan inside a window.
#[derive(Debug, Clone)]
pub struct PlanCandidates<'a> {
    pub valuations: Vec<&'a ValuationEntry>,
    pub using_company_fallback: bool,
}

impl<'a> PlanCandidates<'a> {
    fn empty() -> Self {
        Self {
            valuations: Vec::new(),
            using_company_fallback: false,
        }
    }

    /// Plan valuations inside `window`, or the company's valuations inside `window` when
    /// the plan rule keeps none.
    ///
    /// The fallback activates only when `plan_id` is set, no valuation with that plan falls
    /// in the window, and at least one valuation belongs to `company_id`.
    pub fn resolve(
        plan_id: Option<&PlanId>,
        company_id: Option<&CompanyId>,
        valuations: &'a [ValuationEntry],
        window: CandidateWindow,
    ) -> Self {
        let Some(plan_id) = plan_id else {
            return Self::empty();
        };

        let by_plan: Vec<&ValuationEntry> = valuations
            .iter()
            .filter(|valuation| valuation.plan_id.as_ref() == Some(plan_id))
            .filter(|valuation| window.admits(valuation))
            .collect();
        if !by_plan.is_empty() {
            return Self {
                valuations: by_plan,
                using_company_fallback: false,
            };
        }

        let Some(company_id) = company_id else {
            return Self::empty();
        };
        if !valuations
            .iter()
            .any(|valuation| &valuation.company_id == company_id)
        {
            return Self::empty();
        }

        let by_company: Vec<&ValuationEntry> = valuations
            .iter()
            .filter(|valuation| &valuation.company_id == company_id)
            .filter(|valuation| window.admits(valuation))
            .collect();

        debug!(
            plan_id = %plan_id,
            company_id = %company_id,
            candidates = by_company.len(),
            "plan rule matched nothing; matching on company"
        );

        Self {
            valuations: by_company,
            using_company_fallback: true,
        }
    }
}

/// Valuations relevant to one award.
#[derive(Debug, Clone)]
pub struct ValuationMatch<'a> {
    pub valuations: Vec<&'a ValuationEntry>,
    /// Set when the award's plan had no valuations and the company's were used instead.
    /// Downstream plan-equality checks must be skipped for this award.
    pub using_company_fallback: bool,
}

impl<'a> ValuationMatch<'a> {
    pub fn is_empty(&self) -> bool {
        self.valuations.is_empty()
    }

    pub fn contains(&self, valuation_id: &ValuationId) -> bool {
        self.valuations
            .iter()
            .any(|valuation| &valuation.id == valuation_id)
    }

    pub fn ids(&self) -> HashSet<&'a ValuationId> {
        self.valuations.iter().map(|valuation| &valuation.id).collect()
    }
}

/// Match an award against the full valuation set.
///
/// `selected_company_id` is the company chosen in an administrator's aggregate view; the
/// award's own merge tag takes precedence over it.
pub fn match_award<'a>(
    award: &Award,
    valuations: &'a [ValuationEntry],
    selected_company_id: Option<&CompanyId>,
    order: MatchOrder,
) -> ValuationMatch<'a> {
    let Some(interval) = award.interval() else {
        return ValuationMatch {
            valuations: Vec::new(),
            using_company_fallback: false,
        };
    };

    let candidates = PlanCandidates::resolve(
        award.plan_id.as_ref(),
        award.context_company(selected_company_id),
        valuations,
        CandidateWindow::Within(interval),
    );

    let mut matched = candidates.valuations;
    sort_valuations(&mut matched, order);

    ValuationMatch {
        valuations: matched,
        using_company_fallback: candidates.using_company_fallback,
    }
}

/// Candidates for the award's plan dated strictly after `today`, soonest first.
///
/// Unlike [`match_award`] this ignores the award interval: upcoming estimates usually
/// fall after the active period they are forecasting for.
pub fn upcoming_valuations<'a>(
    award: &Award,
    valuations: &'a [ValuationEntry],
    selected_company_id: Option<&CompanyId>,
    today: NaiveDate,
) -> Vec<&'a ValuationEntry> {
    let candidates = PlanCandidates::resolve(
        award.plan_id.as_ref(),
        award.context_company(selected_company_id),
        valuations,
        CandidateWindow::AnyDate,
    );

    let mut upcoming: Vec<&ValuationEntry> = candidates
        .valuations
        .into_iter()
        .filter(|valuation| valuation.valuation_date.is_some_and(|date| date > today))
        .collect();
    sort_valuations(&mut upcoming, MatchOrder::SoonestFirst);
    upcoming
}

/// Sort by date with the valuation id as tie-breaker so output never depends on input order.
pub(crate) fn sort_valuations(valuations: &mut [&ValuationEntry], order: MatchOrder) {
    valuations.sort_by(|left, right| {
        let ascending = chronological(left, right);
        match order {
            MatchOrder::SoonestFirst => ascending,
            MatchOrder::MostRecentFirst => ascending.reverse(),
        }
    });
}

pub(crate) fn chronological(left: &ValuationEntry, right: &ValuationEntry) -> Ordering {
    left.valuation_date
        .cmp(&right.valuation_date)
        .then_with(|| left.id.cmp(&right.id))
}
