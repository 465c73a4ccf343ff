// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error types for configuration and delivery.

/// Failure to build a [`crate::config::Config`] from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("LOGPLEX_URL environment variable is not set")]
    MissingUrl,
    #[error("can't parse LOGPLEX_URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("{var} must be a non-negative integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
    #[error("{var} must be true or false, got {value:?}")]
    InvalidBool { var: &'static str, value: String },
}

/// Failure to hand a batch to the collector.
///
/// A response with a non-success status is not an error here; it is returned
/// as a status code and judged by the outlet worker.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("failed to build http client: {0}")]
    Client(reqwest::Error),
    #[error("failed to post logs: {0}")]
    Transport(#[from] reqwest::Error),
}
