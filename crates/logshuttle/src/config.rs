// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Agent configuration read from environment variables.

use std::env;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;

use crate::constants::{
    DEFAULT_BATCH_QUEUE_CAPACITY, DEFAULT_BATCH_SIZE, DEFAULT_FRONT_BUFF, DEFAULT_LOGPLEX_TOKEN,
    DEFAULT_PROCID, DEFAULT_TIMEOUT_SECS, DEFAULT_WAIT_MS, DEFAULT_WORKERS,
};
use crate::errors::ConfigError;

#[derive(Debug, Clone)]
pub struct Config {
    /// Collector endpoint. Carries basic-auth credentials once resolved.
    pub logplex_url: Url,
    /// Capacity of the line queue. 0 selects blocking (lossless) admission.
    pub front_buff: usize,
    /// Maximum number of lines per batch.
    pub batch_size: usize,
    /// Fixed flush period.
    pub wait: Duration,
    /// Number of concurrent outlet workers.
    pub workers: usize,
    pub batch_queue_capacity: usize,
    /// When set, listen on this UNIX socket instead of reading stdin.
    pub socket: Option<PathBuf>,
    pub logplex_token: String,
    pub procid: String,
    pub skip_headers: bool,
    pub skip_cert_verification: bool,
    /// Timeout for a single delivery request.
    pub timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_url = lookup("LOGPLEX_URL")
            .filter(|u| !u.is_empty())
            .ok_or(ConfigError::MissingUrl)?;
        let mut logplex_url = Url::parse(&raw_url).map_err(|e| ConfigError::InvalidUrl {
            url: raw_url.clone(),
            reason: e.to_string(),
        })?;

        let logplex_token =
            lookup("LOG_SHUTTLE_LOGPLEX_TOKEN").unwrap_or_else(|| DEFAULT_LOGPLEX_TOKEN.to_string());

        // Without credentials in the URL the token doubles as the password.
        if logplex_url.username().is_empty() && logplex_url.password().is_none() {
            let with_credentials = logplex_url.set_username("token").is_ok()
                && logplex_url.set_password(Some(&logplex_token)).is_ok();
            if !with_credentials {
                return Err(ConfigError::InvalidUrl {
                    url: raw_url,
                    reason: "url cannot carry credentials".to_string(),
                });
            }
        }

        let front_buff = parse_number(&lookup, "LOG_SHUTTLE_FRONT_BUFF", DEFAULT_FRONT_BUFF)?;
        let batch_size = parse_number(&lookup, "LOG_SHUTTLE_BATCH_SIZE", DEFAULT_BATCH_SIZE)?;
        let wait_ms = parse_number(&lookup, "LOG_SHUTTLE_WAIT", DEFAULT_WAIT_MS)?;
        let workers = parse_number(&lookup, "LOG_SHUTTLE_WORKERS", DEFAULT_WORKERS)?;
        let batch_queue_capacity = parse_number(
            &lookup,
            "LOG_SHUTTLE_BATCH_QUEUE",
            DEFAULT_BATCH_QUEUE_CAPACITY,
        )?;
        let timeout_secs = parse_number(&lookup, "LOG_SHUTTLE_TIMEOUT", DEFAULT_TIMEOUT_SECS)?;

        Ok(Config {
            logplex_url,
            front_buff,
            batch_size: batch_size.max(1),
            wait: Duration::from_millis(wait_ms.max(1) as u64),
            workers: workers.max(1),
            batch_queue_capacity: batch_queue_capacity.max(1),
            socket: lookup("LOG_SHUTTLE_SOCKET")
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            logplex_token,
            procid: lookup("LOG_SHUTTLE_PROCID").unwrap_or_else(|| DEFAULT_PROCID.to_string()),
            skip_headers: parse_bool(&lookup, "LOG_SHUTTLE_SKIP_HEADERS", false)?,
            skip_cert_verification: parse_bool(
                &lookup,
                "LOG_SHUTTLE_SKIP_CERT_VERIFICATION",
                true,
            )?,
            timeout: Duration::from_secs(timeout_secs.max(1) as u64),
        })
    }
}

/// True when the command line (program name excluded) asks for the version,
/// spelled `--version` or `-version`.
pub fn version_requested<I>(args: I) -> bool
where
    I: IntoIterator,
    I::Item: AsRef<OsStr>,
{
    args.into_iter()
        .any(|arg| matches!(arg.as_ref().to_str(), Some("--version" | "-version")))
}

fn parse_number<F>(lookup: &F, var: &'static str, default: usize) -> Result<usize, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<usize>()
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
    }
}

fn parse_bool<F>(lookup: &F, var: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => match value.trim().to_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(ConfigError::InvalidBool { var, value }),
        },
    }
}
