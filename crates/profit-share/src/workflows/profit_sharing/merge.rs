use std::collections::HashSet;

use super::domain::{Award, AwardId, Stakeholder, StakeholderId};

/// Union of a user's awards across their stakeholder records.
///
/// Each award keeps its owning record in `stakeholder_id`, which is where writes must be
/// routed, and gains `source_company_id` so company-scoped matching still resolves. The
/// stored records are not modified.
pub fn merge_awards(records: &[Stakeholder]) -> Vec<Award> {
    let mut seen: HashSet<(&StakeholderId, &AwardId)> = HashSet::new();
    let mut merged = Vec::new();

    for record in records {
        for award in &record.awards {
            if !seen.insert((&record.id, &award.id)) {
                continue;
            }

            let mut projected = award.clone();
            projected.stakeholder_id = record.id.clone();
            if projected.source_company_id.is_none() {
                projected.source_company_id = Some(record.company_id.clone());
            }
            merged.push(projected);
        }
    }

    merged
}
