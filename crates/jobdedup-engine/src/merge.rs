//! Field-level merge of a representative with its duplicates.

use std::collections::HashSet;

use jobdedup_core::{JobListing, MergedJobListing, Salary, SimilarityGroup};

/// Fold `duplicates` into a copy of `primary`.
///
/// Identity fields (title, company, location, url, employment type, remote,
/// posted date, source, id) always come from the primary. List fields are a
/// case-insensitive union in first-seen order, the description is the
/// longest non-empty one, a missing salary is filled from the first
/// duplicate that has one, and confidence is the maximum of all inputs.
pub fn merge_duplicate_jobs(primary: &JobListing, duplicates: &[JobListing]) -> MergedJobListing {
    let mut listing = primary.clone();
    if duplicates.is_empty() {
        return MergedJobListing {
            listing,
            merged_from: Vec::new(),
        };
    }

    let all = || std::iter::once(primary).chain(duplicates.iter());

    listing.requirements = union_ignore_case(all().map(|j| j.requirements.as_slice()));
    listing.benefits = union_ignore_case(all().map(|j| j.benefits.as_slice()));
    listing.tags = union_ignore_case(all().map(|j| j.tags.as_slice()));

    if let Some(description) = longest_description(all()) {
        listing.description = Some(description.to_string());
    }

    if !primary.salary.as_ref().is_some_and(Salary::is_present) {
        if let Some(salary) = duplicates
            .iter()
            .filter_map(|d| d.salary.as_ref())
            .find(|s| s.is_present())
        {
            listing.salary = Some(salary.clone());
        }
    }

    listing.metadata.confidence = duplicates
        .iter()
        .map(|d| d.metadata.confidence)
        .fold(primary.metadata.confidence, f64::max);

    MergedJobListing {
        listing,
        merged_from: duplicates.iter().map(|d| d.id.clone()).collect(),
    }
}

/// Merge a group into its representative; `None` if the group has no valid representative.
pub fn merge_group(group: &SimilarityGroup) -> Option<MergedJobListing> {
    let representative = group.representative()?;
    let duplicates: Vec<JobListing> = group.duplicates().cloned().collect();
    Some(merge_duplicate_jobs(representative, &duplicates))
}

/// Case-insensitive union keeping first-seen spelling and order; blank entries are dropped.
pub fn union_ignore_case<'a>(lists: impl IntoIterator<Item = &'a [String]>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for entry in lists.into_iter().flatten() {
        let trimmed = entry.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_lowercase()) {
            out.push(trimmed.to_string());
        }
    }
    out
}

/// Longest non-blank description by character count; earlier inputs win ties.
fn longest_description<'a>(jobs: impl Iterator<Item = &'a JobListing>) -> Option<&'a str> {
    let mut best: Option<&str> = None;
    for description in jobs.filter_map(|j| j.description.as_deref()) {
        if description.trim().is_empty() {
            continue;
        }
        if best.map_or(true, |b| description.chars().count() > b.chars().count()) {
            best = Some(description);
        }
    }
    best
}
