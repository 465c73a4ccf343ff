// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Streaming batcher that forwards newline-delimited logs to a Logplex
//! endpoint.
//!
//! Lines read from stdin or from UNIX socket connections are admitted into a
//! line queue (blocking or lossy, see [`admission`]), grouped into batches by
//! size or on a fixed tick ([`batcher`]), and delivered by a pool of
//! competing workers ([`outlet`]). A reporter logs per-second counters and
//! queue depths ([`stats`]).

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod admission;
pub mod batcher;
pub mod config;
pub mod constants;
pub mod counters;
pub mod delivery;
pub mod errors;
pub mod format;
pub mod outlet;
pub mod reader;
pub mod shuttle;
pub mod stats;
