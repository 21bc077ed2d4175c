// Client for the remote ECG classification service
//
// The service is an external collaborator: the link only assembles the
// request from a completed session and hands back whatever the service
// answers.

use crate::link::{Lead, LeadSnapshot};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Please measure {0} first")]
    MissingLead(Lead),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Analysis service returned {status}: {body}")]
    Service { status: u16, body: String },
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Body of a classification request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub signal_lead1: Vec<i32>,
    pub signal_lead2: Option<Vec<i32>>,
    pub signal_lead3: Option<Vec<i32>>,
    pub sampling_rate: u32,
}

impl AnalysisRequest {
    /// Build a request from a session snapshot
    ///
    /// Lead I is mandatory; empty leads II and III are sent as absent.
    pub fn from_snapshot(snapshot: &LeadSnapshot, sampling_rate: u32) -> AnalysisResult<Self> {
        if snapshot.lead1.is_empty() {
            return Err(AnalysisError::MissingLead(Lead::I));
        }

        let optional = |samples: &Vec<i32>| (!samples.is_empty()).then(|| samples.clone());

        Ok(Self {
            signal_lead1: snapshot.lead1.clone(),
            signal_lead2: optional(&snapshot.lead2),
            signal_lead3: optional(&snapshot.lead3),
            sampling_rate,
        })
    }
}

/// Classification returned by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub prediction: String,
    /// Confidence in percent
    pub confidence: f64,
    #[serde(default)]
    pub probabilities: HashMap<String, f64>,
    /// Server-side processing time in seconds
    pub processing_time: f64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[async_trait]
pub trait AnalysisClient: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> AnalysisResult<Diagnosis>;

    async fn model_info(&self) -> AnalysisResult<serde_json::Value>;
}

/// HTTP implementation talking JSON to `<base_url>/predict`
pub struct HttpAnalysisClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpAnalysisClient {
    pub fn new(base_url: &str) -> AnalysisResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn check(response: reqwest::Response) -> AnalysisResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(AnalysisError::Service {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl AnalysisClient for HttpAnalysisClient {
    async fn analyze(&self, request: &AnalysisRequest) -> AnalysisResult<Diagnosis> {
        log::info!(
            "Requesting analysis ({} / {} / {} samples @ {} Hz)",
            request.signal_lead1.len(),
            request.signal_lead2.as_ref().map_or(0, Vec::len),
            request.signal_lead3.as_ref().map_or(0, Vec::len),
            request.sampling_rate
        );

        let response = self
            .client
            .post(self.endpoint("predict"))
            .json(request)
            .send()
            .await?;

        let diagnosis: Diagnosis = Self::check(response).await?.json().await?;
        log::info!(
            "Analysis result: {} ({:.2}%)",
            diagnosis.prediction,
            diagnosis.confidence
        );
        Ok(diagnosis)
    }

    async fn model_info(&self) -> AnalysisResult<serde_json::Value> {
        let response = self.client.get(self.endpoint("model-info")).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }
}
