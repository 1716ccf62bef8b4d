//! Core domain model for scraped job listings and deduplication lineage.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

pub const CRATE_NAME: &str = "jobdedup-core";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmploymentType {
    #[serde(alias = "full_time", alias = "fulltime")]
    FullTime,
    #[serde(alias = "part_time", alias = "parttime")]
    PartTime,
    Contract,
    Internship,
    Temporary,
    Freelance,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SalaryPeriod {
    Hourly,
    Daily,
    Weekly,
    Monthly,
    #[serde(alias = "annual", alias = "annually")]
    Yearly,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Salary {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub period: Option<SalaryPeriod>,
}

impl Salary {
    /// A salary counts as present once either bound was extracted.
    pub fn is_present(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }
}

/// Where and when a listing was scraped.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSource {
    #[serde(default)]
    pub site: String,
    #[serde(default)]
    pub original_url: String,
    #[serde(default)]
    pub scraped_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMetadata {
    #[serde(default)]
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<JsonValue>,
}

/// A single job posting as handed over by the acquisition layer.
///
/// Text fields the engine compares default to empty strings when absent;
/// everything else the scrapers may or may not extract is an `Option`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobListing {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub salary: Option<Salary>,
    #[serde(default)]
    pub employment_type: Option<EmploymentType>,
    #[serde(default)]
    pub remote: Option<bool>,
    #[serde(default)]
    pub posted_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub benefits: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub source: JobSource,
    #[serde(default)]
    pub metadata: JobMetadata,
}

impl JobListing {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        company: impl Into<String>,
        url: impl Into<String>,
        site: impl Into<String>,
        scraped_at: DateTime<Utc>,
    ) -> Self {
        let url = url.into();
        Self {
            id: id.into(),
            title: title.into(),
            company: company.into(),
            location: None,
            description: None,
            url: url.clone(),
            salary: None,
            employment_type: None,
            remote: None,
            posted_date: None,
            requirements: Vec::new(),
            benefits: Vec::new(),
            tags: Vec::new(),
            source: JobSource {
                site: site.into(),
                original_url: url,
                scraped_at,
            },
            metadata: JobMetadata::default(),
        }
    }

    pub fn description_text(&self) -> &str {
        self.description.as_deref().unwrap_or_default()
    }

    pub fn normalized_url(&self) -> String {
        normalize_url(&self.url)
    }

    /// Stable identifier for listings that arrive without one.
    pub fn derive_id(site: &str, url: &str) -> String {
        let source = format!("{}:{}", site.trim().to_lowercase(), normalize_url(url));
        Uuid::new_v5(&Uuid::NAMESPACE_URL, source.as_bytes()).to_string()
    }
}

/// Case-insensitive, whitespace-trimmed URL with trailing slashes removed.
pub fn normalize_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchReason {
    ExactUrlMatch,
    ExactTitleCompanyMatch,
    FuzzyMatch,
}

impl MatchReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchReason::ExactUrlMatch => "exact_url_match",
            MatchReason::ExactTitleCompanyMatch => "exact_title_company_match",
            MatchReason::FuzzyMatch => "fuzzy_match",
        }
    }
}

/// Lineage record: `duplicate_id` was folded into `primary_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateMatch {
    pub primary_id: String,
    pub duplicate_id: String,
    pub reason: MatchReason,
    pub score: f64,
}

/// A cluster of listings believed to describe the same posting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityGroup {
    /// All members in input order, representative included.
    pub members: Vec<JobListing>,
    pub representative_index: usize,
}

impl SimilarityGroup {
    /// `None` when `representative_index` is out of range, e.g. a hand-built or
    /// deserialized group.
    pub fn representative(&self) -> Option<&JobListing> {
        self.members.get(self.representative_index)
    }

    pub fn duplicates(&self) -> impl Iterator<Item = &JobListing> {
        let rep = self.representative_index;
        self.members
            .iter()
            .enumerate()
            .filter(move |(i, _)| *i != rep)
            .map(|(_, job)| job)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedJobListing {
    #[serde(flatten)]
    pub listing: JobListing,
    /// Ids of the duplicates folded into `listing`, in input order.
    #[serde(default)]
    pub merged_from: Vec<String>,
}

/// Read a JSON array of listings, assigning derived ids where missing.
pub fn load_jobs_from_path(path: impl AsRef<Path>) -> Result<Vec<JobListing>> {
    let path = path.as_ref();
    let data = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let mut jobs: Vec<JobListing> =
        serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;
    for job in &mut jobs {
        if job.id.trim().is_empty() {
            job.id = JobListing::derive_id(&job.source.site, &job.url);
        }
    }
    Ok(jobs)
}
