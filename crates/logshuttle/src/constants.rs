// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Capacity 0 means every line is handed to the batcher before the reader moves on.
pub const DEFAULT_FRONT_BUFF: usize = 0;
pub const DEFAULT_BATCH_SIZE: usize = 1;
pub const DEFAULT_WAIT_MS: usize = 500;
pub const DEFAULT_WORKERS: usize = 1;
pub const DEFAULT_BATCH_QUEUE_CAPACITY: usize = 1;
pub const DEFAULT_LOGPLEX_TOKEN: &str = "token";
pub const DEFAULT_PROCID: &str = "shuttle";
pub const DEFAULT_TIMEOUT_SECS: usize = 5;

pub const STATS_INTERVAL: Duration = Duration::from_secs(1);

// local7.info
pub const SYSLOG_PRIVAL: u8 = 190;
pub const SYSLOG_VERSION: u8 = 1;
pub const SYSLOG_HOSTNAME: &str = "hostname";

pub const LOGPLEX_CONTENT_TYPE: &str = "application/logplex-1";
pub const LOGPLEX_MSG_COUNT_HEADER: &str = "Logplex-Msg-Count";
