// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Admission of lines into the line queue.
//!
//! The policy is picked once from the configured queue capacity:
//! - capacity 0: [`Admission::Blocking`], a rendezvous. The reader waits until
//!   the batcher has taken the line and no line is ever lost. Back-pressure
//!   reaches whoever writes to the source.
//! - capacity > 0: [`Admission::Lossy`], the reader never waits; a line that
//!   finds the queue full is dropped and counted.

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;

use crate::counters::Counters;
use crate::stats::QueueGauge;

/// One input line, terminator included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line(Vec<u8>);

impl Line {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Line(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Line {
    fn from(s: &str) -> Self {
        Line(s.as_bytes().to_vec())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Blocking,
    Lossy,
}

impl Admission {
    /// Chooses the policy for a configured line queue capacity.
    #[must_use]
    pub fn for_capacity(capacity: usize) -> Self {
        if capacity == 0 {
            Admission::Blocking
        } else {
            Admission::Lossy
        }
    }
}

/// What happened to an offered line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admitted {
    Queued,
    Dropped,
    /// The batcher is gone; nothing will ever be accepted again.
    Closed,
}

/// A line travelling through the line queue.
///
/// In blocking mode the offer carries an acknowledgement that the batcher
/// fires when it takes the line; the reader is suspended until then.
#[derive(Debug)]
pub struct Offer {
    line: Line,
    ack: Option<oneshot::Sender<()>>,
}

impl Offer {
    /// Hands the line to the batcher, releasing a waiting reader.
    pub fn accept(self) -> Line {
        if let Some(ack) = self.ack {
            // A reader that gave up has nothing left to release.
            let _ = ack.send(());
        }
        self.line
    }
}

impl From<Line> for Offer {
    fn from(line: Line) -> Self {
        Offer { line, ack: None }
    }
}

/// Creates the line queue and the admitter feeding it.
///
/// Tokio channels can't have zero capacity, so blocking mode runs over a
/// single slot and completes the hand-off only when the batcher acknowledges
/// the offer. A line sitting in that slot is still owned by its reader and is
/// not counted as queued.
#[must_use]
pub fn line_queue(
    capacity: usize,
    counters: Arc<Counters>,
) -> (LineAdmitter, mpsc::Receiver<Offer>) {
    let policy = Admission::for_capacity(capacity);
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        LineAdmitter {
            tx,
            policy,
            counters,
        },
        rx,
    )
}

/// Sending half of the line queue, cloned into every reader.
#[derive(Debug, Clone)]
pub struct LineAdmitter {
    tx: mpsc::Sender<Offer>,
    policy: Admission,
    counters: Arc<Counters>,
}

impl LineAdmitter {
    pub fn policy(&self) -> Admission {
        self.policy
    }

    pub fn counters(&self) -> &Arc<Counters> {
        &self.counters
    }

    pub async fn admit(&self, line: Line) -> Admitted {
        match self.policy {
            Admission::Blocking => self.blocking_admit(line).await,
            Admission::Lossy => self.try_admit(line),
        }
    }

    async fn blocking_admit(&self, line: Line) -> Admitted {
        let (ack, accepted) = oneshot::channel();
        let offer = Offer {
            line,
            ack: Some(ack),
        };
        if self.tx.send(offer).await.is_err() {
            return Admitted::Closed;
        }
        match accepted.await {
            Ok(()) => {
                self.counters.record_read();
                Admitted::Queued
            }
            // Batcher went away with the offer unread.
            Err(_) => Admitted::Closed,
        }
    }

    fn try_admit(&self, line: Line) -> Admitted {
        match self.tx.try_send(Offer::from(line)) {
            Ok(()) => {
                self.counters.record_read();
                Admitted::Queued
            }
            Err(TrySendError::Full(_)) => {
                self.counters.record_drop();
                Admitted::Dropped
            }
            Err(TrySendError::Closed(_)) => Admitted::Closed,
        }
    }

    /// Lines accepted and waiting for the batcher. Always 0 in blocking mode.
    pub fn depth(&self) -> usize {
        self.depth_gauge().depth()
    }

    /// A depth gauge that doesn't hold the queue open.
    pub fn depth_gauge(&self) -> QueueGauge<Offer> {
        match self.policy {
            Admission::Blocking => QueueGauge::rendezvous(&self.tx),
            Admission::Lossy => QueueGauge::new(&self.tx),
        }
    }
}
