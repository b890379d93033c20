use rust_decimal::{Decimal, RoundingStrategy};
use tracing::warn;

use super::domain::{Award, Payout, ValuationEntry};

/// Price per share for a valuation.
///
/// Resolution order: an explicit non-zero price, then `profit_amount / total_shares` when
/// `total_shares > 0`, otherwise zero.
pub fn price_for_valuation(valuation: &ValuationEntry) -> Decimal {
    if let Some(price) = valuation.price_per_share.filter(|price| !price.is_zero()) {
        return price;
    }

    match valuation.total_shares {
        Some(total) if total > Decimal::ZERO => valuation
            .profit_amount
            .checked_div(total)
            .unwrap_or(Decimal::ZERO),
        _ => Decimal::ZERO,
    }
}

/// Payout for a single award/valuation pairing.
pub fn payout_for(award: &Award, valuation: &ValuationEntry) -> Payout {
    let price_per_share = price_for_valuation(valuation);
    let shares_issued = award.participating_shares().unwrap_or(0);

    let payout = if shares_issued > 0 {
        Decimal::from(shares_issued)
            .checked_mul(price_per_share)
            .unwrap_or_else(|| {
                warn!(
                    award_id = %award.id,
                    valuation_id = %valuation.id,
                    "payout overflowed decimal range; counting as zero"
                );
                Decimal::ZERO
            })
    } else {
        Decimal::ZERO
    };

    Payout {
        valuation_id: valuation.id.clone(),
        award_id: award.id.clone(),
        profit_date: valuation.valuation_date,
        profit_amount: valuation.profit_amount,
        profit_type: valuation.profit_type,
        price_per_share,
        shares_issued,
        payout,
    }
}

/// Sum of contributing payouts.
pub fn total_payout<'a, I>(payouts: I) -> Decimal
where
    I: IntoIterator<Item = &'a Payout>,
{
    payouts
        .into_iter()
        .filter(|payout| payout.contributes())
        .map(|payout| payout.payout)
        .sum()
}

/// Currency rounding for display. The engine itself never rounds.
pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
