//! Greedy star clustering of a scraped batch.
//!
//! Each candidate is compared against cluster representatives only, so a
//! member is guaranteed to resemble the representative it joined, not every
//! other member.

use std::cmp::Ordering;

use jobdedup_core::{DuplicateMatch, JobListing, MatchReason, SimilarityGroup};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::similarity::{title_company_match, urls_match, SimilarityScorer};

/// A near miss: scored close to, but below, the duplicate threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewItem {
    pub job_id_a: String,
    pub job_id_b: String,
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DedupOutcome {
    pub unique: Vec<JobListing>,
    pub duplicates: Vec<DuplicateMatch>,
    pub review: Vec<ReviewItem>,
}

/// Indices into the input batch.
#[derive(Debug, Clone)]
pub(crate) struct Cluster {
    pub members: Vec<usize>,
    pub representative: usize,
}

impl Cluster {
    fn open(index: usize) -> Self {
        Self {
            members: vec![index],
            representative: index,
        }
    }

    pub fn duplicate_indices(&self) -> impl Iterator<Item = usize> + '_ {
        let rep = self.representative;
        self.members.iter().copied().filter(move |&m| m != rep)
    }
}

#[derive(Debug, Default)]
pub(crate) struct Clustering {
    pub clusters: Vec<Cluster>,
    pub review: Vec<ReviewItem>,
}

/// Confidence used for ordering; NaN and out-of-range values are clamped.
fn ranking_confidence(job: &JobListing) -> f64 {
    let confidence = job.metadata.confidence;
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

/// Higher confidence wins, then the more recent scrape. `Equal` leaves the earlier listing in charge.
fn compare_candidates(a: &JobListing, b: &JobListing) -> Ordering {
    ranking_confidence(a)
        .total_cmp(&ranking_confidence(b))
        .then_with(|| a.source.scraped_at.cmp(&b.source.scraped_at))
}

/// Whether every current member of `cluster` still qualifies against `candidate`.
fn can_represent(
    scorer: &SimilarityScorer,
    jobs: &[JobListing],
    cluster: &Cluster,
    candidate: usize,
    threshold: f64,
) -> bool {
    cluster
        .members
        .iter()
        .filter(|&&m| m != candidate)
        .all(|&m| scorer.assess(&jobs[candidate], &jobs[m], threshold).is_match())
}

pub(crate) fn cluster_jobs(
    scorer: &SimilarityScorer,
    jobs: &[JobListing],
    threshold: f64,
    review_threshold: Option<f64>,
) -> Clustering {
    let mut out = Clustering::default();

    for (index, job) in jobs.iter().enumerate() {
        let exact = out
            .clusters
            .iter()
            .position(|c| urls_match(&jobs[c.representative], job))
            .map(|ci| (ci, MatchReason::ExactUrlMatch, 1.0))
            .or_else(|| {
                out.clusters
                    .iter()
                    .position(|c| title_company_match(&jobs[c.representative], job))
                    .map(|ci| {
                        let score = scorer.score(&jobs[out.clusters[ci].representative], job);
                        (ci, MatchReason::ExactTitleCompanyMatch, score)
                    })
            });

        let target = match exact {
            Some(found) => Some(found),
            None => {
                let mut best: Option<(usize, f64)> = None;
                for (ci, cluster) in out.clusters.iter().enumerate() {
                    let score = scorer.score(&jobs[cluster.representative], job);
                    if best.map_or(true, |(_, b)| score > b) {
                        best = Some((ci, score));
                    }
                }
                match best {
                    Some((ci, score)) if score >= threshold => {
                        Some((ci, MatchReason::FuzzyMatch, score))
                    }
                    Some((ci, score)) => {
                        if review_threshold.is_some_and(|rt| score >= rt) {
                            out.review.push(ReviewItem {
                                job_id_a: jobs[out.clusters[ci].representative].id.clone(),
                                job_id_b: job.id.clone(),
                                score,
                            });
                        }
                        None
                    }
                    None => None,
                }
            }
        };

        let Some((ci, reason, score)) = target else {
            out.clusters.push(Cluster::open(index));
            continue;
        };

        let cluster = &mut out.clusters[ci];
        debug!(
            job_id = %job.id,
            representative_id = %jobs[cluster.representative].id,
            reason = reason.as_str(),
            score,
            "attaching listing to cluster"
        );
        cluster.members.push(index);
        // The sitting representative outranks every other eligible member, so only
        // the newcomer can take over, and only if all members qualify against it.
        if compare_candidates(job, &jobs[cluster.representative]) == Ordering::Greater {
            if can_represent(scorer, jobs, cluster, index, threshold) {
                cluster.representative = index;
            } else {
                debug!(
                    job_id = %job.id,
                    representative_id = %jobs[cluster.representative].id,
                    "higher ranked listing kept as member; not every member matches it"
                );
            }
        }
    }

    out
}

/// Lineage for every non-representative member, classified against the representative.
///
/// Every member qualifies against its representative, so each record carries
/// the reason and score of that direct comparison.
pub(crate) fn duplicate_matches(
    scorer: &SimilarityScorer,
    jobs: &[JobListing],
    cluster: &Cluster,
    threshold: f64,
) -> Vec<DuplicateMatch> {
    let representative = &jobs[cluster.representative];
    cluster
        .duplicate_indices()
        .filter_map(|m| {
            let assessment = scorer.assess(representative, &jobs[m], threshold);
            let reason = assessment.reason?;
            Some(DuplicateMatch {
                primary_id: representative.id.clone(),
                duplicate_id: jobs[m].id.clone(),
                reason,
                score: assessment.score,
            })
        })
        .collect()
}

pub fn find_duplicates(
    scorer: &SimilarityScorer,
    jobs: &[JobListing],
    threshold: f64,
    review_threshold: Option<f64>,
) -> DedupOutcome {
    let clustering = cluster_jobs(scorer, jobs, threshold, review_threshold);
    let mut outcome = DedupOutcome {
        review: clustering.review,
        ..DedupOutcome::default()
    };
    for cluster in &clustering.clusters {
        outcome.unique.push(jobs[cluster.representative].clone());
        outcome
            .duplicates
            .extend(duplicate_matches(scorer, jobs, cluster, threshold));
    }
    outcome
}

pub fn group_similar_jobs(
    scorer: &SimilarityScorer,
    jobs: &[JobListing],
    threshold: f64,
) -> Vec<SimilarityGroup> {
    cluster_jobs(scorer, jobs, threshold, None)
        .clusters
        .into_iter()
        .map(|cluster| SimilarityGroup {
            representative_index: cluster
                .members
                .iter()
                .position(|&m| m == cluster.representative)
                .unwrap_or(0),
            members: cluster.members.iter().map(|&m| jobs[m].clone()).collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 24, hour, 0, 0).single().unwrap()
    }

    fn mk_job(id: &str, title: &str, company: &str, url: &str) -> JobListing {
        let mut job = JobListing::new(id, title, company, url, "test-site", at(12));
        job.metadata.confidence = 0.5;
        job
    }

    #[test]
    fn empty_batch_yields_empty_outcome() {
        let outcome = find_duplicates(&SimilarityScorer::default(), &[], 0.75, Some(0.6));
        assert!(outcome.unique.is_empty());
        assert!(outcome.duplicates.is_empty());
        assert!(outcome.review.is_empty());
    }

    #[test]
    fn same_url_with_different_company_casing_is_exact_url_match() {
        let jobs = vec![
            mk_job("a", "Backend Engineer", "Acme", "https://x.com/1"),
            mk_job("b", "Backend Engineer", "ACME", "https://x.com/1"),
        ];
        let outcome = find_duplicates(&SimilarityScorer::default(), &jobs, 0.75, None);
        assert_eq!(outcome.unique.len(), 1);
        assert_eq!(outcome.duplicates.len(), 1);
        assert_eq!(outcome.duplicates[0].reason, MatchReason::ExactUrlMatch);
        assert_eq!(outcome.duplicates[0].primary_id, "a");
        assert_eq!(outcome.duplicates[0].duplicate_id, "b");
        assert_eq!(outcome.duplicates[0].score, 1.0);
    }

    #[test]
    fn url_match_is_checked_against_the_representative() {
        let mut a = mk_job("a", "Data Engineer", "Acme", "https://a.com/1");
        a.metadata.confidence = 0.9;
        let b = mk_job("b", "Data Engineer", "Acme", "https://b.com/1");
        let c = mk_job("c", "Totally Different", "Nobody", "https://b.com/1/");
        let outcome = find_duplicates(&SimilarityScorer::default(), &[a, b, c], 0.75, None);
        let unique: Vec<_> = outcome.unique.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(unique, vec!["a", "c"]);
        assert_eq!(outcome.duplicates.len(), 1);
        assert_eq!(outcome.duplicates[0].duplicate_id, "b");
        assert_eq!(
            outcome.duplicates[0].reason,
            MatchReason::ExactTitleCompanyMatch
        );
    }

    #[test]
    fn higher_ranked_member_is_not_promoted_over_members_it_does_not_match() {
        let mut a = mk_job("a", "Frontend Developer", "Acme", "https://a.com/1");
        let mut x = mk_job("x", "Frontend Developer Intern", "Acme", "https://x.com/1");
        let mut b = mk_job("b", "Frontend Developer", "Acme", "https://b.com/1");
        a.description = Some("Build React interfaces with TypeScript".into());
        x.description = Some("Build React interfaces with TypeScript".into());
        b.description = Some("Maintain legacy jQuery widgets".into());
        b.metadata.confidence = 0.9;
        let scorer = SimilarityScorer::default();
        assert!(scorer.score(&b, &x) < 0.75);

        let jobs = [a, x, b];
        let outcome = find_duplicates(&scorer, &jobs, 0.75, None);
        assert_eq!(outcome.unique.len(), 1);
        assert_eq!(outcome.unique[0].id, "a");
        assert_eq!(outcome.duplicates.len(), 2);

        let groups = group_similar_jobs(&scorer, &jobs, 0.75);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].representative().map(|j| j.id.as_str()), Some("a"));
    }

    #[test]
    fn lineage_agrees_with_the_representative_comparison() {
        let mut jobs = vec![
            mk_job("a", "Frontend Developer", "Acme", "https://a.com/1"),
            mk_job("x", "Frontend Developer Intern", "Acme", "https://x.com/1"),
            mk_job("b", "Frontend Developer", "Acme", "https://b.com/1"),
            mk_job("c", "Registered Nurse", "Mercy", "https://c.com/1"),
            mk_job("d", "Night Nurse", "Mercy", "https://c.com/1/"),
            mk_job("e", "Frontend Engineer", "Acme Inc", "https://x.com/1"),
        ];
        jobs[0].description = Some("Build React interfaces with TypeScript".into());
        jobs[1].description = Some("Build React interfaces with TypeScript".into());
        jobs[2].description = Some("Maintain legacy jQuery widgets".into());
        jobs[2].metadata.confidence = 0.9;
        jobs[4].metadata.confidence = 0.8;
        jobs[5].metadata.confidence = 0.95;

        let scorer = SimilarityScorer::default();
        let threshold = 0.75;
        let outcome = find_duplicates(&scorer, &jobs, threshold, None);
        for found in &outcome.duplicates {
            match found.reason {
                MatchReason::FuzzyMatch => assert!(found.score >= threshold, "{found:?}"),
                MatchReason::ExactUrlMatch => assert_eq!(found.score, 1.0, "{found:?}"),
                MatchReason::ExactTitleCompanyMatch => {}
            }
        }

        for group in group_similar_jobs(&scorer, &jobs, threshold) {
            let representative = group.representative().expect("representative");
            for member in group.duplicates() {
                assert!(
                    scorer.assess(representative, member, threshold).is_match(),
                    "{} does not match representative {}",
                    member.id,
                    representative.id
                );
            }
        }
    }

    #[test]
    fn exact_title_company_attaches_without_url() {
        let jobs = vec![
            mk_job("a", "QA Analyst", "Initech", "https://a.com/1"),
            mk_job("b", "qa analyst", "INITECH", "https://b.com/9"),
        ];
        let outcome = find_duplicates(&SimilarityScorer::default(), &jobs, 0.75, None);
        assert_eq!(outcome.unique.len(), 1);
        assert_eq!(
            outcome.duplicates[0].reason,
            MatchReason::ExactTitleCompanyMatch
        );
    }

    #[test]
    fn similar_titles_group_as_fuzzy_match() {
        let mut a = mk_job("a", "Frontend Developer", "Acme", "https://a.com/1");
        let mut b = mk_job("b", "Frontend Software Developer", "Acme", "https://b.com/2");
        a.description = Some("Build React interfaces with TypeScript".into());
        b.description = Some("Build React interfaces with TypeScript".into());
        let groups = group_similar_jobs(&SimilarityScorer::default(), &[a.clone(), b.clone()], 0.7);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);

        let outcome = find_duplicates(&SimilarityScorer::default(), &[a, b], 0.7, None);
        assert_eq!(outcome.duplicates.len(), 1);
        assert_eq!(outcome.duplicates[0].reason, MatchReason::FuzzyMatch);
        assert!(outcome.duplicates[0].score >= 0.7);
    }

    #[test]
    fn representative_prefers_confidence_then_recency_then_input_order() {
        let mut a = mk_job("a", "Site Reliability Engineer", "Globex", "https://a.com/1");
        let mut b = mk_job("b", "Site Reliability Engineer", "Globex", "https://b.com/1");
        let mut c = mk_job("c", "Site Reliability Engineer", "Globex", "https://c.com/1");
        a.metadata.confidence = 0.8;
        b.metadata.confidence = 0.8;
        c.metadata.confidence = 0.8;
        b.source.scraped_at = at(15);
        c.source.scraped_at = at(15);
        let groups = group_similar_jobs(&SimilarityScorer::default(), &[a.clone(), b.clone(), c.clone()], 0.75);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].representative().map(|j| j.id.as_str()), Some("b"));

        c.metadata.confidence = 0.95;
        let groups = group_similar_jobs(&SimilarityScorer::default(), &[a, b, c], 0.75);
        assert_eq!(groups[0].representative().map(|j| j.id.as_str()), Some("c"));
        assert_eq!(groups[0].duplicates().map(|j| j.id.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn grouping_is_deterministic() {
        let jobs = vec![
            mk_job("a", "Frontend Developer", "Acme", "https://a.com/1"),
            mk_job("b", "Backend Developer", "Acme", "https://a.com/2"),
            mk_job("c", "Frontend Developer", "Acme", "https://a.com/3"),
            mk_job("d", "Registered Nurse", "Mercy", "https://a.com/4"),
            mk_job("e", "Registered Nurse", "Mercy", "https://a.com/4/"),
        ];
        let scorer = SimilarityScorer::default();
        let first = group_similar_jobs(&scorer, &jobs, 0.8);
        for _ in 0..5 {
            assert_eq!(group_similar_jobs(&scorer, &jobs, 0.8), first);
        }
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn borderline_pairs_go_to_review_queue() {
        let mut a = mk_job("a", "Internet Assessor", "Telus", "https://a.com/1");
        let mut b = mk_job("b", "Internet Assessor Part Time", "Telus International", "https://b.com/1");
        a.description = Some("evaluate search results".into());
        b.description = Some("evaluate ads".into());
        let scorer = SimilarityScorer::default();
        let score = scorer.score(&a, &b);
        let outcome = find_duplicates(&scorer, &[a, b], 0.95, Some(score - 0.01));
        assert_eq!(outcome.unique.len(), 2);
        assert_eq!(outcome.review.len(), 1);
        assert_eq!(outcome.review[0].job_id_a, "a");
        assert_eq!(outcome.review[0].job_id_b, "b");
    }

    #[test]
    fn listings_without_text_stay_apart() {
        let jobs = vec![
            mk_job("a", "", "", "https://a.com/1"),
            mk_job("b", "", "", "https://b.com/1"),
        ];
        let outcome = find_duplicates(&SimilarityScorer::default(), &jobs, 0.75, Some(0.6));
        assert_eq!(outcome.unique.len(), 2);
        assert!(outcome.duplicates.is_empty());
    }
}
