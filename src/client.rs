use std::time::Duration;

use anyhow::Context;
use reqwest::StatusCode;
use serde_json::Value;

pub const DEFAULT_BASE_URL: &str = "https://portfolio.drieam.app/api/v1";

/// Terminal non-success classifications of a fetch. 401 and 404 are
/// classifications, not errors: callers match on them and carry on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchError {
    /// The bearer token is no longer valid (401).
    AuthExpired,
    /// The resource is not visible to the current viewer (404).
    NotFound,
    /// Transport or server failures survived every retry.
    Failed,
}

pub type FetchResult<T> = Result<T, FetchError>;

/// Connection and retry knobs. `Default` carries the production values;
/// tests swap in zero delays.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub cooldown: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(15),
            max_attempts: 3,
            retry_delay: Duration::from_secs(5),
            cooldown: Duration::from_secs(60),
        }
    }
}

pub struct ApiClient {
    http: reqwest::Client,
    config: ClientConfig,
    token: String,
}

impl ApiClient {
    pub fn new(config: ClientConfig, token: String) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("Mozilla/5.0")
            .timeout(config.timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            config,
            token,
        })
    }

    pub fn set_token(&mut self, token: String) {
        self.token = token;
    }

    /// Authenticated GET with bounded retries. 401 and 404 short-circuit;
    /// transport errors and every other non-2xx status retry up to
    /// `max_attempts` with `retry_delay` between attempts. After the last
    /// failure the client cools down before reporting `Failed`, so a
    /// struggling server gets a breather before the caller moves on.
    pub async fn get_json(&self, path: &str, params: &[(&str, String)]) -> FetchResult<Value> {
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), path);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.try_get(&url, params).await {
                Ok(outcome) => return outcome,
                Err(err) => {
                    tracing::warn!(
                        "request to {path} failed ({attempt}/{}): {err:#}",
                        self.config.max_attempts
                    );
                    if attempt < self.config.max_attempts {
                        tracing::info!("retrying in {:?}", self.config.retry_delay);
                        tokio::time::sleep(self.config.retry_delay).await;
                    } else {
                        tracing::warn!(
                            "{attempt} failed attempts, waiting {:?} before continuing",
                            self.config.cooldown
                        );
                        tokio::time::sleep(self.config.cooldown).await;
                        return Err(FetchError::Failed);
                    }
                }
            }
        }
    }

    /// One attempt. The `Err` channel carries retryable conditions only;
    /// terminal classifications come back through `Ok`.
    async fn try_get(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> anyhow::Result<FetchResult<Value>> {
        let response = self
            .http
            .get(url)
            .header("accept", "*/*")
            .header("authorization", format!("Bearer {}", self.token))
            .query(params)
            .send()
            .await
            .context("request failed")?;

        match response.status() {
            StatusCode::UNAUTHORIZED => return Ok(Err(FetchError::AuthExpired)),
            StatusCode::NOT_FOUND => return Ok(Err(FetchError::NotFound)),
            status if !status.is_success() => anyhow::bail!("unexpected status {status}"),
            _ => {}
        }

        match response.json::<Value>().await {
            Ok(body) => Ok(Ok(body)),
            Err(err) => {
                tracing::warn!("undecodable response body from {url}: {err}");
                Ok(Err(FetchError::Failed))
            }
        }
    }

    /// Drives `get_json` over a paginated endpoint starting at page 1.
    /// Stops after a page with fewer than `page_size` items (included) or
    /// on an empty page (not included). The short-page threshold is the
    /// page size actually requested, which differs per endpoint. Endpoints
    /// that do not accept `per_page` set `send_per_page` to false; their
    /// server-side page size still drives termination. `envelope` unwraps
    /// responses that nest the item array under a key.
    pub async fn get_paginated(
        &self,
        path: &str,
        page_size: usize,
        send_per_page: bool,
        extra: &[(&str, String)],
        envelope: Option<&str>,
    ) -> FetchResult<Vec<Value>> {
        let mut items = Vec::new();
        let mut page = 1usize;

        loop {
            let mut params: Vec<(&str, String)> = extra.to_vec();
            params.push(("page", page.to_string()));
            if send_per_page {
                params.push(("per_page", page_size.to_string()));
            }

            let body = self.get_json(path, &params).await?;
            let page_items = match envelope {
                Some(key) => body
                    .get(key)
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default(),
                None => body.as_array().cloned().unwrap_or_default(),
            };

            if page_items.is_empty() {
                break;
            }

            let short = page_items.len() < page_size;
            items.extend(page_items);
            if short {
                break;
            }
            page += 1;
        }

        Ok(items)
    }
}
