//! News proposals submitted to the DAO.
//!
//! Descriptions are `"<tagline> - <category> - <link>"`; the link is what
//! identifies a submission.

use crate::contracts::Proposal;

pub fn compose_description(tagline: &str, category: &str, link: &str) -> String {
    format!("{tagline} - {category} - {link}")
}

/// Whether `candidate` already appears as the trailing `-` segment of any
/// existing description.
///
/// Splits on every `-`, so a link containing `-` only compares its last piece.
/// Known limitation, kept for compatibility with proposals already on chain.
pub fn is_duplicate_proposal<'a>(
    candidate: &str,
    existing: impl IntoIterator<Item = &'a str>,
) -> bool {
    let candidate = candidate.trim();
    existing
        .into_iter()
        .filter_map(|d| d.rsplit('-').next())
        .any(|last| last.trim() == candidate)
}

pub fn format_proposal(p: &Proposal) -> String {
    format!(
        "Proposal #{}\nProposer: {}\nDescription: {}\nStatus: {}",
        p.id,
        p.proposer,
        p.description,
        p.status_label()
    )
}
