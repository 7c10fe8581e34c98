use crate::core::{CurrencyPair, DisplayRecord, FetchError, QuoteProvider};
use crate::providers::normalize::{decode_payload, normalize};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, instrument, warn};

// AwesomeApiProvider implementation for QuoteProvider
pub struct AwesomeApiProvider {
    base_url: String,
    timeout: Duration,
}

impl AwesomeApiProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        AwesomeApiProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    fn last_quote_url(&self, pairs: &[CurrencyPair]) -> String {
        let joined = pairs
            .iter()
            .map(CurrencyPair::to_string)
            .collect::<Vec<_>>()
            .join(",");
        format!("{}/json/last/{}", self.base_url, joined)
    }
}

/// Maps a non-success HTTP status onto the fetch error taxonomy.
fn classify_status(status: StatusCode) -> Option<FetchError> {
    if status.is_success() {
        None
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        Some(FetchError::RateLimited)
    } else {
        Some(FetchError::ServerError {
            status_code: status.as_u16(),
        })
    }
}

#[async_trait]
impl QuoteProvider for AwesomeApiProvider {
    #[instrument(
        name = "AwesomeApiFetch",
        skip(self, pairs),
        fields(pair_count = pairs.len())
    )]
    async fn fetch_quotes(&self, pairs: &[CurrencyPair]) -> Result<Vec<DisplayRecord>, FetchError> {
        if pairs.is_empty() {
            return Err(FetchError::EmptyResult);
        }

        let url = self.last_quote_url(pairs);
        debug!("Requesting quotes from {}", url);

        let client = reqwest::Client::builder()
            .user_agent("fxwatch/1.0")
            .timeout(self.timeout)
            .build()
            .map_err(|e| FetchError::NetworkError(e.to_string()))?;

        let response = client.get(&url).send().await.map_err(|e| {
            warn!(error = %e, "Quote request failed");
            FetchError::NetworkError(e.to_string())
        })?;

        let status = response.status();
        debug!(%status, "Received quote response");
        if let Some(err) = classify_status(status) {
            warn!(%status, "Quote service rejected the request");
            return Err(err);
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::NetworkError(e.to_string()))?;

        let payload = decode_payload(&body)?;
        let records = normalize(&payload, pairs)?;
        debug!(
            "Normalized {} of {} quotes",
            records.len(),
            payload.len()
        );
        Ok(records)
    }
}
