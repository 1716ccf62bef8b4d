//! Pairwise similarity between two listings.

use jobdedup_core::{JobListing, MatchReason};
use serde::Serialize;
use strsim::jaro_winkler;

use crate::config::{DedupConfig, ScoringWeights};
use crate::text::{fold_key, jaccard, normalize_text, token_set};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub title: f64,
    pub company: f64,
    pub description: f64,
    pub total: f64,
}

/// Outcome of comparing a listing against a reference listing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchAssessment {
    pub reason: Option<MatchReason>,
    pub score: f64,
}

impl MatchAssessment {
    pub fn is_match(&self) -> bool {
        self.reason.is_some()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SimilarityScorer {
    weights: ScoringWeights,
    description_token_limit: usize,
}

impl Default for SimilarityScorer {
    fn default() -> Self {
        Self::from_config(&DedupConfig::default())
    }
}

impl SimilarityScorer {
    pub fn new(weights: ScoringWeights, description_token_limit: usize) -> Self {
        Self {
            weights: weights.normalized(),
            description_token_limit: description_token_limit.max(1),
        }
    }

    pub fn from_config(config: &DedupConfig) -> Self {
        Self::new(config.weights, config.description_token_limit)
    }

    /// Symmetric score in `[0, 1]`; identical normalized URLs short-circuit to 1.
    pub fn score(&self, a: &JobListing, b: &JobListing) -> f64 {
        if urls_match(a, b) {
            return 1.0;
        }
        self.breakdown(a, b).total
    }

    pub fn breakdown(&self, a: &JobListing, b: &JobListing) -> ScoreBreakdown {
        let title = title_similarity(&a.title, &b.title);
        let company = company_similarity(&a.company, &b.company);
        let description = description_similarity(
            a.description_text(),
            b.description_text(),
            self.description_token_limit,
        );
        let total = self.weights.title * title
            + self.weights.company * company
            + self.weights.description * description;
        ScoreBreakdown {
            title,
            company,
            description,
            total: total.clamp(0.0, 1.0),
        }
    }

    /// Classify `candidate` against `reference`, strongest signal first.
    pub fn assess(&self, reference: &JobListing, candidate: &JobListing, threshold: f64) -> MatchAssessment {
        if urls_match(reference, candidate) {
            return MatchAssessment {
                reason: Some(MatchReason::ExactUrlMatch),
                score: 1.0,
            };
        }
        let score = self.breakdown(reference, candidate).total;
        let reason = if title_company_match(reference, candidate) {
            Some(MatchReason::ExactTitleCompanyMatch)
        } else if score >= threshold {
            Some(MatchReason::FuzzyMatch)
        } else {
            None
        };
        MatchAssessment { reason, score }
    }
}

/// Both URLs present and equal after normalization.
pub fn urls_match(a: &JobListing, b: &JobListing) -> bool {
    let ua = a.normalized_url();
    !ua.is_empty() && ua == b.normalized_url()
}

/// Case-insensitive equality of both title and company, neither empty.
pub fn title_company_match(a: &JobListing, b: &JobListing) -> bool {
    let (ta, tb) = (fold_key(&a.title), fold_key(&b.title));
    let (ca, cb) = (fold_key(&a.company), fold_key(&b.company));
    !ta.is_empty() && !ca.is_empty() && ta == tb && ca == cb
}

/// Best of token-set Jaccard and Jaro-Winkler over the normalized titles.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let na = normalize_text(a);
    let nb = normalize_text(b);
    if na.is_empty() || nb.is_empty() {
        return 0.0;
    }
    if na == nb {
        return 1.0;
    }
    let token_score = jaccard(&token_set(&na, None), &token_set(&nb, None));
    token_score.max(jaro_winkler(&na, &nb))
}

pub fn company_similarity(a: &str, b: &str) -> f64 {
    let fa = fold_key(a);
    let fb = fold_key(b);
    if fa.is_empty() || fb.is_empty() {
        return 0.0;
    }
    if fa == fb {
        return 1.0;
    }
    jaccard(&token_set(&fa, None), &token_set(&fb, None))
}

pub fn description_similarity(a: &str, b: &str, token_limit: usize) -> f64 {
    jaccard(&token_set(a, Some(token_limit)), &token_set(b, Some(token_limit)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn mk_job(id: &str, title: &str, company: &str, url: &str, description: &str) -> JobListing {
        let mut job = JobListing::new(
            id,
            title,
            company,
            url,
            "test-site",
            Utc.with_ymd_and_hms(2026, 2, 24, 12, 0, 0).single().unwrap(),
        );
        if !description.is_empty() {
            job.description = Some(description.to_string());
        }
        job
    }

    #[test]
    fn identical_urls_short_circuit_to_one() {
        let scorer = SimilarityScorer::default();
        let a = mk_job("a", "Data Engineer", "Acme", "https://x.com/1", "");
        let b = mk_job("b", "Chef", "Other Co", "HTTPS://X.com/1/", "cooking");
        assert_eq!(scorer.score(&a, &b), 1.0);
        assert_eq!(
            scorer.assess(&a, &b, 0.75).reason,
            Some(MatchReason::ExactUrlMatch)
        );
    }

    #[test]
    fn score_is_reflexive_for_listings_with_urls() {
        let scorer = SimilarityScorer::default();
        let a = mk_job("a", "Data Engineer", "Acme", "https://x.com/1", "");
        assert_eq!(scorer.score(&a, &a), 1.0);
    }

    #[test]
    fn score_is_symmetric() {
        let scorer = SimilarityScorer::default();
        let pairs = [
            (
                mk_job("a", "Frontend Developer", "Acme", "https://a.com/1", "React and TypeScript"),
                mk_job("b", "Frontend Software Developer", "ACME", "https://b.com/2", "TypeScript, React, CSS"),
            ),
            (
                mk_job("c", "Backend Engineer", "Globex", "https://a.com/3", ""),
                mk_job("d", "Senior Backend Eng.", "Globex Corp", "https://b.com/4", "Rust services"),
            ),
            (
                mk_job("e", "", "", "https://a.com/5", ""),
                mk_job("f", "Nurse", "Hospital", "https://b.com/6", "night shifts"),
            ),
        ];
        for (a, b) in &pairs {
            assert_eq!(scorer.score(a, b), scorer.score(b, a));
        }
    }

    #[test]
    fn empty_fields_contribute_zero() {
        let scorer = SimilarityScorer::default();
        let a = mk_job("a", "", "", "https://a.com/1", "");
        let b = mk_job("b", "", "", "https://b.com/1", "");
        let breakdown = scorer.breakdown(&a, &b);
        assert_eq!(breakdown.title, 0.0);
        assert_eq!(breakdown.company, 0.0);
        assert_eq!(breakdown.description, 0.0);
        assert_eq!(breakdown.total, 0.0);
    }

    #[test]
    fn company_exact_match_ignores_case() {
        assert_eq!(company_similarity("Acme Corp", "ACME corp"), 1.0);
        assert!((company_similarity("Acme Corp", "Acme Inc") - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn related_titles_score_above_token_overlap() {
        let score = title_similarity("Frontend Developer", "Frontend Software Developer");
        assert!(score >= 2.0 / 3.0);
        assert!(title_similarity("Frontend Developer", "Registered Nurse") < 0.7);
    }

    #[test]
    fn description_similarity_only_reads_leading_tokens() {
        let a = "alpha beta gamma delta";
        let b = "alpha beta omega sigma";
        assert_eq!(description_similarity(a, b, 2), 1.0);
        assert!(description_similarity(a, b, 4) < 1.0);
    }

    #[test]
    fn same_title_and_company_is_classified_before_fuzzy() {
        let scorer = SimilarityScorer::default();
        let a = mk_job("a", "QA Analyst", "Initech", "https://a.com/1", "");
        let b = mk_job("b", "qa analyst", "INITECH", "https://b.com/1", "");
        let assessment = scorer.assess(&a, &b, 0.75);
        assert_eq!(assessment.reason, Some(MatchReason::ExactTitleCompanyMatch));
        assert!((assessment.score - 0.7).abs() < 1e-9);
    }

    #[test]
    fn unrelated_listings_do_not_match() {
        let scorer = SimilarityScorer::default();
        let a = mk_job("a", "Search Relevance Rater", "Appen", "https://a.com/1", "rate search results");
        let b = mk_job("b", "Paid Academic Study", "Prolific", "https://b.com/1", "take part in research");
        let assessment = scorer.assess(&a, &b, 0.75);
        assert!(!assessment.is_match());
        assert!(assessment.score < 0.5);
    }
}
