use std::sync::Arc;

use async_trait::async_trait;
use guessme_types::{
    config::ApiConfig,
    geometry::Point,
    prediction::DigitPrediction,
    protocol::PredictRequest,
    GuessmeError, Result,
};
use tracing::{debug, warn};

use crate::network_error;

/// One-shot recognition of a whole drawing.
#[async_trait]
pub trait DigitPredictor: Send + Sync {
    async fn predict(&self, points: &[Point]) -> Result<DigitPrediction>;
}

#[async_trait]
impl<T: DigitPredictor + ?Sized> DigitPredictor for Arc<T> {
    async fn predict(&self, points: &[Point]) -> Result<DigitPrediction> {
        (**self).predict(points).await
    }
}

/// `POST {base}/predict` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpPredictor {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpPredictor {
    /// No request timeout is set; a slow predictor is waited for.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|err| network_error(err.to_string()))?;
        Ok(Self {
            client,
            endpoint: config.predict_url(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl DigitPredictor for HttpPredictor {
    async fn predict(&self, points: &[Point]) -> Result<DigitPrediction> {
        debug!(endpoint = %self.endpoint, points = points.len(), "requesting prediction");
        let body = PredictRequest {
            points: points.to_vec(),
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|err| network_error(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(endpoint = %self.endpoint, status = status.as_u16(), "predictor rejected request");
            return Err(GuessmeError::Api {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        response
            .json::<DigitPrediction>()
            .await
            .map_err(|err| network_error(err.to_string()))
    }
}
