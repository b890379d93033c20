use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identifier of a profit-sharing plan.
    PlanId
);
string_id!(CompanyId);
string_id!(
    /// Identifier of a stakeholder record. A user may own one record per company.
    StakeholderId
);
string_id!(AwardId);
string_id!(ValuationId);
string_id!(
    /// Authenticated user identity, used for actors and stakeholder links.
    UserId
);

/// Cadence on which profit entries are recorded for a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlanSchedule {
    Quarterly,
    BiAnnual,
    Annual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    Draft,
    Finalized,
}

/// A named profit-sharing scheme owned by a company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: PlanId,
    pub company_id: CompanyId,
    pub name: String,
    pub trigger_amount: Decimal,
    pub total_shares: u64,
    pub schedule: PlanSchedule,
    pub status: PlanStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
}

/// Per-company stakeholder record. It is the system of record for its awards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stakeholder {
    pub id: StakeholderId,
    pub company_id: CompanyId,
    pub name: String,
    #[serde(default)]
    pub linked_user_id: Option<UserId>,
    #[serde(default)]
    pub awards: Vec<Award>,
}

impl Stakeholder {
    pub fn award(&self, award_id: &AwardId) -> Option<&Award> {
        self.awards.iter().find(|award| &award.id == award_id)
    }

    pub fn is_linked_to(&self, user_id: &UserId) -> bool {
        self.linked_user_id.as_ref() == Some(user_id)
    }
}

/// Lifecycle status of an award.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AwardStatus {
    #[default]
    Draft,
    Issued,
    Finalized,
}

impl AwardStatus {
    pub const fn label(self) -> &'static str {
        match self {
            AwardStatus::Draft => "draft",
            AwardStatus::Issued => "issued",
            AwardStatus::Finalized => "finalized",
        }
    }
}

impl fmt::Display for AwardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A grant of shares under a plan, active over an inclusive date interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Award {
    pub id: AwardId,
    #[serde(default)]
    pub plan_id: Option<PlanId>,
    pub stakeholder_id: StakeholderId,
    /// Company of the record this award was merged from.
    #[serde(
        default,
        rename = "_sourceCompanyId",
        skip_serializing_if = "Option::is_none"
    )]
    pub source_company_id: Option<CompanyId>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub award_start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub award_end_date: Option<NaiveDate>,
    #[serde(default)]
    pub shares_issued: Option<i64>,
    #[serde(default)]
    pub status: AwardStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_by: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_by: Option<UserId>,
}

impl Award {
    /// Active period, or `None` when either bound is missing or the bounds are inverted.
    pub fn interval(&self) -> Option<AwardInterval> {
        match (self.award_start_date, self.award_end_date) {
            (Some(start), Some(end)) if start <= end => Some(AwardInterval { start, end }),
            _ => None,
        }
    }

    /// Share count that participates in payouts. Absent or non-positive counts yield `None`.
    pub fn participating_shares(&self) -> Option<i64> {
        self.shares_issued.filter(|shares| *shares > 0)
    }

    /// Company used for fallback matching: the merge tag first, then the caller's selection.
    pub fn context_company<'a>(
        &'a self,
        selected_company_id: Option<&'a CompanyId>,
    ) -> Option<&'a CompanyId> {
        self.source_company_id.as_ref().or(selected_company_id)
    }
}

/// Inclusive `[start, end]` date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AwardInterval {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl AwardInterval {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfitType {
    Actual,
    Estimated,
}

impl ProfitType {
    pub const fn label(self) -> &'static str {
        match self {
            ProfitType::Actual => "actual",
            ProfitType::Estimated => "estimated",
        }
    }
}

/// Dated company profit figure used to price shares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuationEntry {
    pub id: ValuationId,
    pub company_id: CompanyId,
    #[serde(default)]
    pub plan_id: Option<PlanId>,
    /// `None` when the stored value was missing or unparseable.
    #[serde(default, deserialize_with = "lenient_date")]
    pub valuation_date: Option<NaiveDate>,
    pub profit_amount: Decimal,
    pub profit_type: ProfitType,
    #[serde(default)]
    pub price_per_share: Option<Decimal>,
    #[serde(default)]
    pub total_shares: Option<Decimal>,
}

impl ValuationEntry {
    pub fn is_actual(&self) -> bool {
        self.profit_type == ProfitType::Actual
    }

    pub fn is_estimated(&self) -> bool {
        self.profit_type == ProfitType::Estimated
    }
}

/// Derived payout for one award/valuation pairing. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payout {
    pub valuation_id: ValuationId,
    pub award_id: AwardId,
    pub profit_date: Option<NaiveDate>,
    pub profit_amount: Decimal,
    pub profit_type: ProfitType,
    pub price_per_share: Decimal,
    pub shares_issued: i64,
    pub payout: Decimal,
}

impl Payout {
    /// Whether this payout participates in sums.
    pub fn contributes(&self) -> bool {
        self.shares_issued > 0
    }
}

/// Parse a stored date, accepting `YYYY-MM-DD` or an RFC 3339 timestamp.
pub fn parse_record_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }

    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|dt| dt.naive_utc().date())
}

fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_record_date))
}
