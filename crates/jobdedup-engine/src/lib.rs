//! Deduplication and reconciliation engine for scraped job listings.
//!
//! A batch flows through the scorer and the grouper into clusters, each
//! cluster is merged into its representative, and the merged listings are
//! checked against persisted history through an injected [`JobLookup`].

pub mod config;
pub mod error;
pub mod grouping;
pub mod merge;
pub mod reconcile;
pub mod similarity;
pub mod text;

use std::sync::atomic::AtomicBool;

use jobdedup_core::{DuplicateMatch, JobListing, MergedJobListing, SimilarityGroup};
use serde::Serialize;
use tracing::{info, info_span, Instrument};

pub use config::{DedupConfig, ScoringWeights};
pub use error::DedupError;
pub use grouping::{DedupOutcome, ReviewItem};
pub use reconcile::{InMemoryJobStore, JobLookup, LookupFailure, ReconcileReport};
pub use similarity::{MatchAssessment, ScoreBreakdown, SimilarityScorer};

use crate::error::check_threshold;
use crate::reconcile::ReconcileOptions;

pub const CRATE_NAME: &str = "jobdedup-engine";

/// Merged clusters of one batch plus their lineage.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchOutcome {
    pub merged: Vec<MergedJobListing>,
    pub duplicates: Vec<DuplicateMatch>,
    pub review: Vec<ReviewItem>,
}

#[derive(Debug, Clone)]
pub struct DedupEngine {
    config: DedupConfig,
    scorer: SimilarityScorer,
}

impl DedupEngine {
    pub fn new(config: DedupConfig) -> Result<Self, DedupError> {
        config.validate()?;
        Ok(Self {
            scorer: SimilarityScorer::from_config(&config),
            config,
        })
    }

    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    pub fn find_duplicates(&self, jobs: &[JobListing]) -> DedupOutcome {
        let _span = info_span!("find_duplicates", batch = jobs.len()).entered();
        let outcome = grouping::find_duplicates(
            &self.scorer,
            jobs,
            self.config.duplicate_threshold,
            Some(self.config.review_threshold),
        );
        info!(
            unique = outcome.unique.len(),
            duplicates = outcome.duplicates.len(),
            review = outcome.review.len(),
            "batch deduplicated"
        );
        outcome
    }

    pub fn group_similar_jobs(
        &self,
        jobs: &[JobListing],
        threshold: f64,
    ) -> Result<Vec<SimilarityGroup>, DedupError> {
        let threshold = check_threshold("threshold", threshold)?;
        let _span = info_span!("group_similar_jobs", batch = jobs.len(), threshold).entered();
        let groups = grouping::group_similar_jobs(&self.scorer, jobs, threshold);
        info!(groups = groups.len(), "batch grouped");
        Ok(groups)
    }

    pub fn merge_duplicate_jobs(
        &self,
        primary: &JobListing,
        duplicates: &[JobListing],
    ) -> MergedJobListing {
        merge::merge_duplicate_jobs(primary, duplicates)
    }

    /// Cluster `jobs` and merge every cluster into its representative.
    pub fn reconcile_batch(&self, jobs: &[JobListing]) -> BatchOutcome {
        let _span = info_span!("reconcile_batch", batch = jobs.len()).entered();
        let threshold = self.config.duplicate_threshold;
        let clustering = grouping::cluster_jobs(
            &self.scorer,
            jobs,
            threshold,
            Some(self.config.review_threshold),
        );

        let mut outcome = BatchOutcome {
            review: clustering.review,
            ..BatchOutcome::default()
        };
        for cluster in &clustering.clusters {
            let duplicates: Vec<JobListing> = cluster
                .duplicate_indices()
                .map(|m| jobs[m].clone())
                .collect();
            outcome.merged.push(merge::merge_duplicate_jobs(
                &jobs[cluster.representative],
                &duplicates,
            ));
            outcome.duplicates.extend(grouping::duplicate_matches(
                &self.scorer,
                jobs,
                cluster,
                threshold,
            ));
        }
        info!(
            merged = outcome.merged.len(),
            duplicates = outcome.duplicates.len(),
            "batch merged"
        );
        outcome
    }

    /// Drop listings that already exist in persisted history.
    ///
    /// A failing lookup keeps its listing and is reported in
    /// [`ReconcileReport::failures`]; the rest of the batch still runs.
    /// Setting `cancel` stops further lookups, listings not yet looked up land
    /// in [`ReconcileReport::unprocessed`].
    pub async fn remove_duplicates_from_database<L: JobLookup + ?Sized>(
        &self,
        new_jobs: &[JobListing],
        lookup: &L,
        cancel: Option<&AtomicBool>,
    ) -> ReconcileReport {
        reconcile::remove_duplicates_from_database(
            &self.scorer,
            self.reconcile_options(cancel),
            new_jobs,
            lookup,
        )
        .await
    }

    fn reconcile_options<'a>(&self, cancel: Option<&'a AtomicBool>) -> ReconcileOptions<'a> {
        ReconcileOptions {
            threshold: self.config.history_threshold,
            concurrency: self.config.lookup_concurrency,
            cancel,
        }
    }
}

/// Everything a persistence layer needs after one ingest run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineOutcome {
    /// Merged listings with no persisted counterpart.
    pub to_persist: Vec<MergedJobListing>,
    pub batch_duplicates: Vec<DuplicateMatch>,
    pub review: Vec<ReviewItem>,
    pub history: ReconcileReport,
}

/// In-batch merge followed by history reconciliation.
pub struct DedupPipeline<L> {
    engine: DedupEngine,
    lookup: L,
}

impl<L: JobLookup> DedupPipeline<L> {
    pub fn new(engine: DedupEngine, lookup: L) -> Self {
        Self { engine, lookup }
    }

    pub async fn run(&self, candidates: &[JobListing], cancel: Option<&AtomicBool>) -> PipelineOutcome {
        let batch = self.engine.reconcile_batch(candidates);
        let listings: Vec<JobListing> = batch.merged.iter().map(|m| m.listing.clone()).collect();

        let decisions = reconcile::decide_all(
            &self.engine.scorer,
            self.engine.reconcile_options(cancel),
            &listings,
            &self.lookup,
        )
        .instrument(info_span!("remove_duplicates_from_database", batch = listings.len()))
        .await;

        let to_persist = batch
            .merged
            .into_iter()
            .zip(decisions.iter())
            .filter(|(_, decision)| decision.keeps())
            .map(|(merged, _)| merged)
            .collect();
        let history = reconcile::build_report(&listings, decisions);

        PipelineOutcome {
            to_persist,
            batch_duplicates: batch.duplicates,
            review: batch.review,
            history,
        }
    }
}
