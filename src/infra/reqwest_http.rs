//! Reqwest-backed HTTP adapter implementing the `Http` port; maps reqwest
//! errors into coarse domain kinds.
//!
//! Two clients are built up front: the default verifying one and an insecure
//! one for services that allow invalid certificates. Both carry the hard
//! request timeout.
use std::time::Duration;

use reqwest::header;
use tracing::{debug, warn};

use crate::domain::model::{FetchResult, HttpError, HttpErrorKind, PostResult};
use crate::ports::http::Http;

/// Hard deadline for every outbound request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub struct ReqwestHttp {
    client: reqwest::Client,
    insecure_client: reqwest::Client,
}

impl ReqwestHttp {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let insecure_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(Self {
            client,
            insecure_client,
        })
    }

    fn classify_error(e: &reqwest::Error) -> HttpErrorKind {
        if e.is_timeout() {
            HttpErrorKind::Timeout
        } else if chain_mentions_certificate(e) {
            HttpErrorKind::Tls
        } else if e.is_connect() {
            HttpErrorKind::Connect
        } else {
            HttpErrorKind::Unexpected
        }
    }
}

// reqwest surfaces TLS verification failures as connect errors; the
// certificate detail only appears in the source chain.
fn chain_mentions_certificate(e: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(e);
    while let Some(err) = source {
        let msg = err.to_string().to_ascii_lowercase();
        if msg.contains("certificate") || msg.contains("self-signed") {
            return true;
        }
        source = err.source();
    }
    false
}

#[async_trait::async_trait]
impl Http for ReqwestHttp {
    async fn get(&self, url: &str, auth_token: Option<&str>, insecure: bool) -> FetchResult {
        let client = if insecure {
            &self.insecure_client
        } else {
            &self.client
        };
        debug!(url, insecure, "HTTP GET start");

        let mut req = client.get(url);
        if let Some(token) = auth_token {
            req = req.header(header::AUTHORIZATION, format!("token {token}"));
        }

        match req.send().await {
            Ok(resp) => {
                let status = Some(resp.status().as_u16());
                match resp.text().await {
                    Ok(body) => FetchResult {
                        status,
                        body: Some(body),
                        error: None,
                    },
                    Err(e) => {
                        warn!(url, error = %e, "Failed reading body");
                        FetchResult {
                            status,
                            body: None,
                            error: Some(HttpError {
                                kind: Self::classify_error(&e),
                                message: e.to_string(),
                            }),
                        }
                    }
                }
            }
            Err(e) => {
                warn!(url, error = %e, "HTTP GET failed");
                FetchResult {
                    status: None,
                    body: None,
                    error: Some(HttpError {
                        kind: Self::classify_error(&e),
                        message: e.to_string(),
                    }),
                }
            }
        }
    }

    async fn post_json(
        &self,
        url: &str,
        body: Vec<u8>,
        headers: Vec<(String, String)>,
    ) -> PostResult {
        debug!(url, "HTTP POST start");
        let mut req = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body);
        for (name, value) in &headers {
            req = req.header(name.as_str(), value.as_str());
        }

        match req.send().await {
            Ok(resp) => {
                let status = Some(resp.status().as_u16());
                let body = resp.text().await.ok();
                PostResult {
                    status,
                    body,
                    error: None,
                }
            }
            Err(e) => {
                debug!(url, error = %e, "HTTP POST failed");
                PostResult {
                    status: None,
                    body: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}
