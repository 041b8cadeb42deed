use reqwest::{Client, Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use talent_sync_core::{CandidateStatus, InsightsSnapshot, MatchRecord};

/// Client for the recruiting service's dashboard, candidate and collaborator endpoints.
#[derive(Clone)]
pub struct RecruitingClient {
    http: Client,
    base_url: Url,
}

impl RecruitingClient {
    /// Creates a client rooted at `base_url`, which should end with a slash.
    pub fn new(base_url: Url, http: Client) -> Self {
        Self { http, base_url }
    }

    /// Fetches ranked match rows, optionally filtered to one job description.
    pub async fn list_candidates(&self, jd_id: Option<u64>) -> Result<Vec<MatchRecord>, ClientError> {
        let url = self.endpoint("dashboard/candidates", jd_id)?;
        let response = self.http.request(Method::GET, url).send().await?;
        parse_json(response).await
    }

    /// Fetches aggregate insights, optionally filtered to one job description.
    pub async fn fetch_insights(&self, jd_id: Option<u64>) -> Result<InsightsSnapshot, ClientError> {
        let url = self.endpoint("dashboard/insights", jd_id)?;
        let response = self.http.request(Method::GET, url).send().await?;
        parse_json(response).await
    }

    /// Issues a PATCH call changing the status of a candidate.
    pub async fn update_status(
        &self,
        candidate_id: u64,
        status: CandidateStatus,
    ) -> Result<(), ClientError> {
        let url = self.base_url.join("candidate/status")?;
        let body = serde_json::json!({
            "candidate_id": candidate_id,
            "status": status.as_str(),
        });
        let response = self
            .http
            .request(Method::PATCH, url)
            .json(&body)
            .send()
            .await?;

        ensure_success(response).await.map(|_| ())
    }

    /// Shortlists a group of candidates against one job description.
    pub async fn shortlist(&self, request: &ShortlistRequest) -> Result<ShortlistReceipt, ClientError> {
        let url = self.base_url.join("dashboard/shortlist")?;
        let response = self
            .http
            .request(Method::POST, url)
            .json(request)
            .send()
            .await?;

        // Only the status code is contractual; the receipt is informational.
        let response = ensure_success(response).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes).unwrap_or_default())
    }

    /// Fetches skill demand/supply figures for display.
    pub async fn skills_heatmap(&self, jd_id: Option<u64>) -> Result<SkillsHeatmap, ClientError> {
        let url = self.endpoint("dashboard/skills-heatmap", jd_id)?;
        let response = self.http.request(Method::GET, url).send().await?;
        parse_json(response).await
    }

    pub(crate) fn endpoint(&self, path: &str, jd_id: Option<u64>) -> Result<Url, ClientError> {
        let mut url = self.base_url.join(path)?;
        if let Some(jd_id) = jd_id {
            url.query_pairs_mut()
                .append_pair("jd_id", &jd_id.to_string());
        }
        Ok(url)
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }
}

/// Body of a shortlist request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShortlistRequest {
    pub candidate_ids: Vec<u64>,
    pub jd_id: u64,
}

/// Informational response of a shortlist call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ShortlistReceipt {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub shortlisted_candidates: u64,
    #[serde(default)]
    pub email_notifications: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SkillsHeatmap {
    #[serde(default)]
    pub skills: Vec<SkillHeat>,
    #[serde(default)]
    pub total_skills: Option<u64>,
    #[serde(default)]
    pub critical_gaps: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SkillHeat {
    pub skill: String,
    pub demand: f64,
    pub supply: f64,
    pub gap: f64,
}

/// Errors produced by the recruiting client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to build url: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Url(_) => "url",
            Self::Http(_) => "transport",
            Self::Status { .. } => "status",
            Self::Decode(_) => "decode",
        }
    }
}

pub(crate) async fn ensure_success(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<unavailable>"));
        return Err(ClientError::Status { status, body });
    }
    Ok(response)
}

pub(crate) async fn parse_json<T>(response: Response) -> Result<T, ClientError>
where
    T: DeserializeOwned,
{
    let response = ensure_success(response).await?;
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}
