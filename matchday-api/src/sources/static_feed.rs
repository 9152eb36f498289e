//! Client of the per-day static feed.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use matchday_core::{format_date, SourceError, StaticDay, StaticFeed};
use reqwest::Client;
use tracing::debug;

use super::transport_error;
use crate::constants::STATIC_FEED_SOURCE;

/// Fetches `<base_url>/<YYYY-MM-DD>.htm`.
#[derive(Debug, Clone)]
pub struct HttpStaticFeed {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpStaticFeed {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::http(STATIC_FEED_SOURCE, e))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn day_url(&self, date: NaiveDate) -> String {
        format!("{}/{}.htm", self.base_url, format_date(date))
    }
}

#[async_trait]
impl StaticFeed for HttpStaticFeed {
    async fn fetch_day(&self, date: NaiveDate) -> Result<StaticDay, SourceError> {
        let url = self.day_url(date);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error(STATIC_FEED_SOURCE, self.timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                source_name: STATIC_FEED_SOURCE.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(STATIC_FEED_SOURCE, self.timeout, e))?;
        let day: StaticDay = serde_json::from_slice(&body)
            .map_err(|e| SourceError::decode(STATIC_FEED_SOURCE, e))?;

        debug!(url = %url, records = day.list.len(), "static feed fetched");
        Ok(day)
    }
}
