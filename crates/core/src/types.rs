use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Lifecycle status of a candidate as tracked by the recruiting service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateStatus {
    #[default]
    Pending,
    Shortlisted,
    Rejected,
    Accepted,
}

impl CandidateStatus {
    /// Returns the wire representation of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Shortlisted => "shortlisted",
            Self::Rejected => "rejected",
            Self::Accepted => "accepted",
        }
    }

    pub fn is_shortlisted(self) -> bool {
        matches!(self, Self::Shortlisted)
    }
}

impl fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CandidateStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "shortlisted" => Ok(Self::Shortlisted),
            "rejected" => Ok(Self::Rejected),
            "accepted" => Ok(Self::Accepted),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown candidate status '{0}' (expected pending, shortlisted, rejected or accepted)")]
pub struct UnknownStatus(pub String);

/// Identity of a single candidate/job-description pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MatchKey {
    pub candidate_id: u64,
    pub jd_id: u64,
}

impl MatchKey {
    pub fn new(candidate_id: u64, jd_id: u64) -> Self {
        Self {
            candidate_id,
            jd_id,
        }
    }
}

/// A candidate matched against one job description, with precomputed scores.
///
/// The same candidate id appears once per job description it was matched
/// against; `(id, jd_id)` is unique within a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub overall_score: f64,
    pub skills_match_score: f64,
    pub experience_match_score: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub matched_skills: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub missing_skills: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub skill_gaps: Vec<Value>,
    #[serde(default)]
    pub experience_years: Option<u32>,
    #[serde(default)]
    pub education: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: CandidateStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_shortlisted: bool,
    pub jd_id: u64,
    pub jd_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<NaiveDateTime>,
}

impl MatchRecord {
    pub fn key(&self) -> MatchKey {
        MatchKey::new(self.id, self.jd_id)
    }

    /// Re-derives `is_shortlisted` from `status`, which is authoritative.
    pub fn normalize_shortlist_flag(&mut self) {
        self.is_shortlisted = self.status.is_shortlisted();
    }

    /// Returns `true` when all three scores fall inside `[0, 1]`.
    pub fn scores_in_range(&self) -> bool {
        [
            self.overall_score,
            self.skills_match_score,
            self.experience_match_score,
        ]
        .iter()
        .all(|score| (0.0..=1.0).contains(score))
    }
}

/// Field update applied to every row of a candidate after a confirmed status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPatch {
    pub status: CandidateStatus,
}

impl StatusPatch {
    pub fn new(status: CandidateStatus) -> Self {
        Self { status }
    }

    pub fn apply(&self, record: &mut MatchRecord) {
        record.status = self.status;
        record.is_shortlisted = self.status.is_shortlisted();
    }
}

/// How the service counts shortlisted candidates in its insights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShortlistBasis {
    /// Every match row whose candidate is shortlisted counts once.
    #[default]
    MatchRows,
    /// Every shortlisted person counts once, however many rows they have.
    People,
}

impl ShortlistBasis {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MatchRows => "match_rows",
            Self::People => "people",
        }
    }
}

impl FromStr for ShortlistBasis {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "match_rows" | "rows" => Ok(Self::MatchRows),
            "people" | "persons" => Ok(Self::People),
            other => Err(other.to_string()),
        }
    }
}

/// Severity attached to a bias alert. Unrecognised values collapse to `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    High,
    Medium,
    Low,
}

impl<'de> Deserialize<'de> for AlertSeverity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        Ok(match raw.to_ascii_lowercase().as_str() {
            "high" => Self::High,
            "medium" => Self::Medium,
            _ => Self::Low,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasAlert {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub severity: AlertSeverity,
}

/// Percentage distributions of the candidate population.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiversityMetrics {
    #[serde(default)]
    pub gender_distribution: BTreeMap<String, f64>,
    #[serde(default)]
    pub experience_distribution: BTreeMap<String, f64>,
    #[serde(default)]
    pub education_distribution: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_candidates: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillCount {
    pub skill: String,
    pub count: u64,
}

/// Aggregate metrics computed by the service over the candidate population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightsSnapshot {
    pub total_candidates: u64,
    pub shortlisted_candidates: u64,
    pub average_score: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub bias_alerts: Vec<BiasAlert>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub diversity_metrics: DiversityMetrics,
    #[serde(default, deserialize_with = "numeric_entries")]
    pub risk_heatmap: BTreeMap<String, f64>,
    #[serde(default)]
    pub diversity_score: f64,
    #[serde(default, deserialize_with = "numeric_entries")]
    pub sentiment_data: BTreeMap<String, f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub top_skills: Vec<SkillCount>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub skill_gaps: Vec<SkillCount>,
    /// Set by the service when it fell back to a placeholder response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InsightsSnapshot {
    /// Builds an empty snapshot for a population of `total` rows.
    pub fn empty(total: u64) -> Self {
        Self {
            total_candidates: total,
            shortlisted_candidates: 0,
            average_score: 0.0,
            bias_alerts: Vec::new(),
            diversity_metrics: DiversityMetrics::default(),
            risk_heatmap: BTreeMap::new(),
            diversity_score: 0.0,
            sentiment_data: BTreeMap::new(),
            top_skills: Vec::new(),
            skill_gaps: Vec::new(),
            error: None,
        }
    }

    pub fn alerts_with(&self, severity: AlertSeverity) -> impl Iterator<Item = &BiasAlert> {
        self.bias_alerts
            .iter()
            .filter(move |alert| alert.severity == severity)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// The service's degraded response reuses `risk_heatmap` for a non-numeric object.
fn numeric_entries<'de, D>(deserializer: D) -> Result<BTreeMap<String, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|(key, value)| value.as_f64().map(|number| (key, number)))
        .collect())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn record(id: u64, jd_id: u64, status: CandidateStatus) -> MatchRecord {
        MatchRecord {
            id,
            name: format!("Candidate {id}"),
            email: Some(format!("candidate{id}@example.com")),
            phone: None,
            overall_score: 0.62,
            skills_match_score: 0.7,
            experience_match_score: 0.5,
            matched_skills: vec!["Rust".to_string()],
            missing_skills: vec!["Kubernetes".to_string()],
            skill_gaps: Vec::new(),
            experience_years: Some(4),
            education: Some("Bachelor".to_string()),
            gender: Some("female".to_string()),
            status,
            is_shortlisted: status.is_shortlisted(),
            jd_id,
            jd_title: format!("Role {jd_id}"),
            created_at: None,
        }
    }

    pub fn insights(total: u64, shortlisted: u64) -> InsightsSnapshot {
        InsightsSnapshot {
            shortlisted_candidates: shortlisted,
            average_score: 0.62,
            ..InsightsSnapshot::empty(total)
        }
    }
}
