// src/ingest/fetch.rs
//! HTTP retrieval of bulletin pages: one direct attempt, then at most one
//! attempt through a content-forwarding proxy that wraps the page in a JSON
//! envelope (`{"contents": "..."}`). Each attempt is individually time-boxed
//! and both share a total budget.

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::counter;
use reqwest::{header::ACCEPT, Client, Url};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::FetchConfig;
use crate::ingest::types::{BulletinFetcher, FetchError, FetchedBulletin, Source};

#[derive(Debug, Deserialize)]
struct ProxyEnvelope {
    #[serde(default)]
    contents: Option<String>,
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    accept: String,
    proxy_url: Option<String>,
    timeout: Duration,
    proxy_timeout: Duration,
    total_timeout: Duration,
}

impl HttpFetcher {
    pub fn new(cfg: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(cfg.user_agent.clone())
            .build()
            .context("building bulletin http client")?;
        Ok(Self {
            client,
            accept: cfg.accept.clone(),
            proxy_url: cfg.proxy().map(str::to_string),
            timeout: cfg.timeout(),
            proxy_timeout: cfg.proxy_timeout(),
            total_timeout: cfg.total_timeout().max(cfg.timeout()),
        })
    }

    pub fn with_timeouts(mut self, direct: Duration, proxy: Duration, total: Duration) -> Self {
        self.timeout = direct;
        self.proxy_timeout = proxy;
        self.total_timeout = total.max(direct);
        self
    }

    pub fn with_proxy(mut self, proxy_url: Option<String>) -> Self {
        self.proxy_url = proxy_url.filter(|p| !p.trim().is_empty());
        self
    }

    async fn direct(&self, url: &str) -> Result<String, FetchError> {
        let request = async {
            let resp = self
                .client
                .get(url)
                .header(ACCEPT, self.accept.as_str())
                .send()
                .await
                .map_err(transport)?;
            let status = resp.status();
            if !status.is_success() {
                return Err(FetchError::Status(status.as_u16()));
            }
            resp.text().await.map_err(transport)
        };
        time_boxed(self.timeout, request).await
    }

    async fn via_proxy(&self, proxy: &str, url: &str, budget: Duration) -> Result<String, FetchError> {
        let target = Url::parse_with_params(proxy, &[("url", url)])
            .map_err(|e| FetchError::Transport(format!("bad proxy url: {e}")))?;
        let request = async {
            let resp = self.client.get(target).send().await.map_err(transport)?;
            let status = resp.status();
            if !status.is_success() {
                return Err(FetchError::Status(status.as_u16()));
            }
            let raw = resp.text().await.map_err(transport)?;
            let envelope: ProxyEnvelope = serde_json::from_str(&raw)
                .map_err(|e| FetchError::ProxyEnvelope(e.to_string()))?;
            match envelope.contents {
                Some(c) if !c.trim().is_empty() => Ok(c),
                _ => Err(FetchError::ProxyEnvelope("missing contents".into())),
            }
        };
        time_boxed(budget, request).await
    }
}

fn transport(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Transport(e.to_string())
    }
}

/// Dropping the inner future on expiry abandons the request; nothing partial
/// is returned.
async fn time_boxed<F>(limit: Duration, fut: F) -> Result<String, FetchError>
where
    F: Future<Output = Result<String, FetchError>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .unwrap_or(Err(FetchError::Timeout))
}

#[async_trait]
impl BulletinFetcher for HttpFetcher {
    async fn fetch(&self, source: &Source) -> Result<FetchedBulletin, FetchError> {
        let started = Instant::now();

        let direct_err = match self.direct(&source.url).await {
            Ok(body) => {
                return Ok(FetchedBulletin {
                    body,
                    via_proxy: false,
                })
            }
            Err(e) => e,
        };
        tracing::warn!(
            target: "ingest",
            source = %source.label,
            error = %direct_err,
            "direct fetch failed"
        );

        let Some(proxy) = self.proxy_url.as_deref() else {
            return Err(FetchError::ProxyDisabled(Box::new(direct_err)));
        };
        let remaining = self.total_timeout.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            return Err(FetchError::Budget);
        }

        counter!("alert_proxy_used_total").increment(1);
        let body = self
            .via_proxy(proxy, &source.url, self.proxy_timeout.min(remaining))
            .await?;
        tracing::info!(target: "ingest", source = %source.label, "fetched via proxy");
        Ok(FetchedBulletin {
            body,
            via_proxy: true,
        })
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
