//! Reconciliation of a fresh batch against previously persisted listings.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use jobdedup_core::{load_jobs_from_path, normalize_url, DuplicateMatch, JobListing, MatchReason};
use serde::Serialize;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::similarity::SimilarityScorer;
use crate::text::fold_key;

/// Provider of persisted listings that might be the same posting as `job`.
///
/// Retry policy, if any, belongs to the implementation.
#[async_trait]
pub trait JobLookup: Send + Sync {
    async fn find_candidates(&self, job: &JobListing) -> Result<Vec<JobListing>>;
}

/// `JobLookup` over an in-memory snapshot, matching on normalized URL or company.
#[derive(Debug, Clone, Default)]
pub struct InMemoryJobStore {
    jobs: Vec<JobListing>,
}

impl InMemoryJobStore {
    pub fn new(jobs: Vec<JobListing>) -> Self {
        Self { jobs }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(load_jobs_from_path(path)?))
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn candidates_for(&self, job: &JobListing) -> Vec<JobListing> {
        let url = normalize_url(&job.url);
        let company = fold_key(&job.company);
        self.jobs
            .iter()
            .filter(|existing| {
                (!url.is_empty() && existing.normalized_url() == url)
                    || (!company.is_empty() && fold_key(&existing.company) == company)
            })
            .cloned()
            .collect()
    }
}

#[async_trait]
impl JobLookup for InMemoryJobStore {
    async fn find_candidates(&self, job: &JobListing) -> Result<Vec<JobListing>> {
        Ok(self.candidates_for(job))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LookupFailure {
    pub job_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileReport {
    /// Listings with no persisted counterpart, in input order.
    pub kept: Vec<JobListing>,
    /// One match per dropped listing; `primary_id` is the persisted listing.
    pub known: Vec<DuplicateMatch>,
    pub failures: Vec<LookupFailure>,
    /// Ids never looked up because the batch was cancelled.
    pub unprocessed: Vec<String>,
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ItemDecision {
    New,
    Known(DuplicateMatch),
    Failed(String),
    Skipped,
}

impl ItemDecision {
    pub fn keeps(&self) -> bool {
        matches!(self, ItemDecision::New | ItemDecision::Failed(_))
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ReconcileOptions<'a> {
    pub threshold: f64,
    pub concurrency: usize,
    pub cancel: Option<&'a AtomicBool>,
}

fn reason_rank(reason: MatchReason) -> u8 {
    match reason {
        MatchReason::ExactUrlMatch => 2,
        MatchReason::ExactTitleCompanyMatch => 1,
        MatchReason::FuzzyMatch => 0,
    }
}

/// Strongest match of `job` among `existing`: URL, then title+company, then best score.
pub(crate) fn strongest_known_match(
    scorer: &SimilarityScorer,
    threshold: f64,
    job: &JobListing,
    existing: &[JobListing],
) -> Option<DuplicateMatch> {
    let mut best: Option<DuplicateMatch> = None;
    for persisted in existing {
        let assessment = scorer.assess(persisted, job, threshold);
        let Some(reason) = assessment.reason else {
            continue;
        };
        let better = best.as_ref().map_or(true, |b| {
            (reason_rank(reason), assessment.score) > (reason_rank(b.reason), b.score)
        });
        if better {
            best = Some(DuplicateMatch {
                primary_id: persisted.id.clone(),
                duplicate_id: job.id.clone(),
                reason,
                score: assessment.score,
            });
        }
    }
    best
}

async fn decide<L: JobLookup + ?Sized>(
    scorer: &SimilarityScorer,
    options: ReconcileOptions<'_>,
    lookup: &L,
    job: &JobListing,
) -> ItemDecision {
    if options.cancel.is_some_and(|flag| flag.load(Ordering::SeqCst)) {
        return ItemDecision::Skipped;
    }
    match lookup.find_candidates(job).await {
        Ok(existing) => match strongest_known_match(scorer, options.threshold, job, &existing) {
            Some(found) => ItemDecision::Known(found),
            None => ItemDecision::New,
        },
        Err(err) => ItemDecision::Failed(format!("{err:#}")),
    }
}

/// One decision per input listing, aligned with `new_jobs`.
pub(crate) async fn decide_all<L: JobLookup + ?Sized>(
    scorer: &SimilarityScorer,
    options: ReconcileOptions<'_>,
    new_jobs: &[JobListing],
    lookup: &L,
) -> Vec<ItemDecision> {
    if options.concurrency <= 1 {
        let mut decisions = Vec::with_capacity(new_jobs.len());
        for job in new_jobs {
            decisions.push(decide(scorer, options, lookup, job).await);
        }
        return decisions;
    }

    stream::iter(new_jobs)
        .map(|job| decide(scorer, options, lookup, job))
        .buffered(options.concurrency)
        .collect()
        .await
}

pub(crate) fn build_report(new_jobs: &[JobListing], decisions: Vec<ItemDecision>) -> ReconcileReport {
    let mut report = ReconcileReport::default();
    for (job, decision) in new_jobs.iter().zip(decisions) {
        match decision {
            ItemDecision::New => report.kept.push(job.clone()),
            ItemDecision::Known(found) => {
                debug!(
                    job_id = %job.id,
                    persisted_id = %found.primary_id,
                    reason = found.reason.as_str(),
                    "dropping already known listing"
                );
                report.known.push(found);
            }
            ItemDecision::Failed(error) => {
                warn!(job_id = %job.id, %error, "lookup failed; keeping listing");
                report.failures.push(LookupFailure {
                    job_id: job.id.clone(),
                    error,
                });
                report.kept.push(job.clone());
            }
            ItemDecision::Skipped => {
                report.cancelled = true;
                report.unprocessed.push(job.id.clone());
            }
        }
    }
    report
}

pub(crate) async fn remove_duplicates_from_database<L: JobLookup + ?Sized>(
    scorer: &SimilarityScorer,
    options: ReconcileOptions<'_>,
    new_jobs: &[JobListing],
    lookup: &L,
) -> ReconcileReport {
    let span = info_span!("remove_duplicates_from_database", batch = new_jobs.len());
    async move {
        let decisions = decide_all(scorer, options, new_jobs, lookup).await;
        let report = build_report(new_jobs, decisions);
        info!(
            kept = report.kept.len(),
            known = report.known.len(),
            failures = report.failures.len(),
            unprocessed = report.unprocessed.len(),
            "history reconciliation finished"
        );
        report
    }
    .instrument(span)
    .await
}
