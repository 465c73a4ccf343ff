// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Transport used by the outlet workers.

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use tracing::debug;

use crate::config::Config;
use crate::constants::{LOGPLEX_CONTENT_TYPE, LOGPLEX_MSG_COUNT_HEADER};
use crate::errors::DeliveryError;

/// Sends one framed batch to the collector.
///
/// Any response is returned as its status; only a failure to get a response
/// is an error. Implementations must not retry.
#[async_trait]
pub trait Deliver: Send + Sync {
    async fn deliver(&self, body: Vec<u8>, count: usize) -> Result<StatusCode, DeliveryError>;
}

/// Posts batches to a Logplex HTTP endpoint.
#[derive(Debug, Clone)]
pub struct LogplexClient {
    client: reqwest::Client,
    url: Url,
    username: String,
    password: Option<String>,
}

impl LogplexClient {
    pub fn new(config: &Config) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.skip_cert_verification)
            .timeout(config.timeout)
            .build()
            .map_err(DeliveryError::Client)?;
        Ok(Self::with_client(client, &config.logplex_url))
    }

    /// Uses `client` as is; credentials are taken out of `url` and sent as
    /// basic auth.
    #[must_use]
    pub fn with_client(client: reqwest::Client, url: &Url) -> Self {
        let username = url.username().to_string();
        let password = url.password().map(str::to_string);
        let mut url = url.clone();
        // Only fails for URLs that can't hold credentials, which then hold none.
        let _ = url.set_username("");
        let _ = url.set_password(None);
        LogplexClient {
            client,
            url,
            username,
            password,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl Deliver for LogplexClient {
    async fn deliver(&self, body: Vec<u8>, count: usize) -> Result<StatusCode, DeliveryError> {
        let mut request = self
            .client
            .post(self.url.clone())
            .header(reqwest::header::CONTENT_TYPE, LOGPLEX_CONTENT_TYPE)
            .header(LOGPLEX_MSG_COUNT_HEADER, count.to_string())
            .body(body);
        if !self.username.is_empty() || self.password.is_some() {
            request = request.basic_auth(&self.username, self.password.as_ref());
        }

        let resp = request.send().await?;
        let status = resp.status();
        debug!("Logplex responded with {} for {} messages", status, count);
        Ok(status)
    }
}
