// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Frames a batch into a Logplex request body.
//!
//! Each line becomes an RFC 5424 syslog packet (unless headers are skipped)
//! and is written length-prefixed: `<byte length> <packet>`.

use std::io::Write;

use chrono::{DateTime, Utc};

use crate::batcher::Batch;
use crate::constants::{SYSLOG_HOSTNAME, SYSLOG_PRIVAL, SYSLOG_VERSION};

/// A framed request body plus the message count reported to the collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Framed {
    pub body: Vec<u8>,
    pub count: usize,
}

#[derive(Debug, Clone)]
pub struct Framer {
    token: String,
    procid: String,
    skip_headers: bool,
}

impl Framer {
    #[must_use]
    pub fn new(token: String, procid: String, skip_headers: bool) -> Self {
        Framer {
            token,
            procid,
            skip_headers,
        }
    }

    pub fn frame(&self, batch: &Batch) -> Framed {
        self.frame_at(batch, Utc::now())
    }

    fn frame_at(&self, batch: &Batch, now: DateTime<Utc>) -> Framed {
        let timestamp = now.format("%Y-%m-%dT%H:%M:%S+00:00").to_string();
        let mut body = Vec::new();
        let mut packet = Vec::new();
        for line in &batch.lines {
            packet.clear();
            if !self.skip_headers {
                // Writing into a Vec can't fail.
                let _ = write!(
                    packet,
                    "<{}>{} {} {} {} {} - - ",
                    SYSLOG_PRIVAL, SYSLOG_VERSION, timestamp, SYSLOG_HOSTNAME, self.token, self.procid
                );
            }
            packet.extend_from_slice(line.as_bytes());

            // Only possible when headers are skipped and the line is empty.
            if packet.is_empty() {
                continue;
            }
            let _ = write!(body, "{} ", packet.len());
            body.extend_from_slice(&packet);
        }
        Framed {
            body,
            count: batch.len(),
        }
    }
}
