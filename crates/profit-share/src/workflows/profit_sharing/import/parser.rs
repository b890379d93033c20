use std::io::Read;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use super::super::domain::{
    parse_record_date, CompanyId, PlanId, ProfitType, ValuationEntry, ValuationId,
};

/// Row that could not be turned into a valuation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    /// 1-based data row number, excluding the header.
    pub row: usize,
    pub reason: String,
}

pub(crate) struct ParsedValuations {
    pub(crate) entries: Vec<ValuationEntry>,
    pub(crate) skipped: Vec<SkippedRow>,
}

pub(crate) fn parse_valuations<R: Read>(reader: R) -> Result<ParsedValuations, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut entries = Vec::new();
    let mut skipped = Vec::new();

    for (index, record) in csv_reader.deserialize::<ValuationRow>().enumerate() {
        let row = record?;
        match row.into_entry() {
            Ok(entry) => entries.push(entry),
            Err(reason) => skipped.push(SkippedRow {
                row: index + 1,
                reason,
            }),
        }
    }

    Ok(ParsedValuations { entries, skipped })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValuationRow {
    id: String,
    company_id: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    plan_id: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    valuation_date: Option<String>,
    profit_amount: String,
    profit_type: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    price_per_share: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    total_shares: Option<String>,
}

impl ValuationRow {
    fn into_entry(self) -> Result<ValuationEntry, String> {
        if self.id.is_empty() {
            return Err("missing id".to_string());
        }
        if self.company_id.is_empty() {
            return Err(format!("valuation {} has no company", self.id));
        }

        let valuation_date = self
            .valuation_date
            .as_deref()
            .and_then(parse_record_date)
            .ok_or_else(|| {
                format!(
                    "valuation {} has unparseable date '{}'",
                    self.id,
                    self.valuation_date.as_deref().unwrap_or_default()
                )
            })?;

        let profit_type = match self.profit_type.to_ascii_lowercase().as_str() {
            "actual" => ProfitType::Actual,
            "estimated" | "estimate" => ProfitType::Estimated,
            other => {
                return Err(format!(
                    "valuation {} has unknown profit type '{other}'",
                    self.id
                ))
            }
        };

        let profit_amount = parse_amount(&self.id, "profitAmount", &self.profit_amount)?;
        let price_per_share = self
            .price_per_share
            .as_deref()
            .map(|raw| parse_amount(&self.id, "pricePerShare", raw))
            .transpose()?;
        let total_shares = self
            .total_shares
            .as_deref()
            .map(|raw| parse_amount(&self.id, "totalShares", raw))
            .transpose()?;

        Ok(ValuationEntry {
            id: ValuationId(self.id),
            company_id: CompanyId(self.company_id),
            plan_id: self.plan_id.map(PlanId),
            valuation_date: Some(valuation_date),
            profit_amount,
            profit_type,
            price_per_share,
            total_shares,
        })
    }
}

fn parse_amount(id: &str, column: &str, raw: &str) -> Result<Decimal, String> {
    let cleaned: String = raw
        .chars()
        .filter(|ch| !matches!(ch, '$' | ',' | ' '))
        .collect();
    Decimal::from_str(&cleaned)
        .map_err(|_| format!("valuation {id} has invalid {column} '{raw}'"))
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
