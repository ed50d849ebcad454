use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{AnalysisResult, NewsItem};

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier unavailable: {0}")]
    Unavailable(#[from] reqwest::Error),

    #[error("classifier timed out after {0:?}")]
    Timeout(Duration),

    #[error("unexpected classifier response: {0}")]
    Unexpected(String),
}

/// Contract of the external headline classifier.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Cheap pre-filter: is this headline likely to score at least `threshold`?
    async fn quick_score(&self, title: &str, threshold: f64) -> Result<bool, ClassifierError>;

    /// Full analysis. `None` means the classifier found nothing actionable.
    async fn analyze(&self, item: &NewsItem) -> Result<Option<AnalysisResult>, ClassifierError>;
}

#[derive(Debug, Serialize)]
struct QuickScoreRequest<'a> {
    title: &'a str,
    threshold: f64,
}

#[derive(Debug, Deserialize)]
struct QuickScoreResponse {
    #[serde(alias = "is_promising")]
    promising: bool,
}

/// Classifier reached over HTTP: `POST {base}/quick_score` and
/// `POST {base}/analyze`, both JSON.
#[derive(Debug, Clone)]
pub struct HttpClassifier {
    http: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpClassifier {
    pub fn new(http: Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    async fn post<B: Serialize + Sync, T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClassifierError> {
        let url = format!("{}/{}", self.base_url, path);
        let req = async {
            let resp = self
                .http
                .post(&url)
                .json(body)
                .send()
                .await?
                .error_for_status()?;
            resp.text().await
        };

        let text = tokio::time::timeout(self.timeout, req)
            .await
            .map_err(|_| ClassifierError::Timeout(self.timeout))??;

        serde_json::from_str(&text).map_err(|e| ClassifierError::Unexpected(format!("{path}: {e}")))
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn quick_score(&self, title: &str, threshold: f64) -> Result<bool, ClassifierError> {
        let resp: QuickScoreResponse = self
            .post("quick_score", &QuickScoreRequest { title, threshold })
            .await?;
        Ok(resp.promising)
    }

    async fn analyze(&self, item: &NewsItem) -> Result<Option<AnalysisResult>, ClassifierError> {
        let result: Option<AnalysisResult> = self.post("analyze", item).await?;
        Ok(result.filter(|r| r.score.is_finite()))
    }
}
