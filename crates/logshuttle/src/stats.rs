// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Periodic pipeline health report.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::counters::{Counters, InFlight};

/// Reads the depth of a queue without keeping it open.
pub struct QueueGauge<T> {
    tx: mpsc::WeakSender<T>,
    rendezvous: bool,
}

impl<T> QueueGauge<T> {
    #[must_use]
    pub fn new(tx: &mpsc::Sender<T>) -> Self {
        QueueGauge {
            tx: tx.downgrade(),
            rendezvous: false,
        }
    }

    /// Gauge for a queue used as a rendezvous: items in it have not been
    /// accepted yet, so it never reports any depth.
    #[must_use]
    pub fn rendezvous(tx: &mpsc::Sender<T>) -> Self {
        QueueGauge {
            tx: tx.downgrade(),
            rendezvous: true,
        }
    }

    /// Number of queued items; 0 once every sender is gone.
    pub fn depth(&self) -> usize {
        if self.rendezvous {
            return 0;
        }
        self.tx
            .upgrade()
            .map_or(0, |tx| tx.max_capacity() - tx.capacity())
    }
}

/// One interval's worth of pipeline health.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    pub reads: u64,
    pub drops: u64,
    pub lines: usize,
    pub batches: usize,
    pub in_flight: usize,
}

pub struct StatsReporter<L, B> {
    counters: Arc<Counters>,
    in_flight: Arc<InFlight>,
    lines: QueueGauge<L>,
    batches: QueueGauge<B>,
    period: Duration,
    cancel_token: CancellationToken,
}

impl<L, B> StatsReporter<L, B> {
    #[must_use]
    pub fn new(
        counters: Arc<Counters>,
        in_flight: Arc<InFlight>,
        lines: QueueGauge<L>,
        batches: QueueGauge<B>,
        period: Duration,
        cancel_token: CancellationToken,
    ) -> Self {
        StatsReporter {
            counters,
            in_flight,
            lines,
            batches,
            period,
            cancel_token,
        }
    }

    /// Takes the counters (resetting them) and samples queue depths.
    pub fn sample(&self) -> Report {
        let snapshot = self.counters.take();
        Report {
            reads: snapshot.reads,
            drops: snapshot.drops,
            lines: self.lines.depth(),
            batches: self.batches.depth(),
            in_flight: self.in_flight.count(),
        }
    }

    /// Reports once per period until cancelled.
    pub async fn run(self) {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.sample();
                    info!(
                        reads = report.reads,
                        drops = report.drops,
                        lines = report.lines,
                        batches = report.batches,
                        in_flight = report.in_flight,
                        "stats"
                    );
                }
                () = self.cancel_token.cancelled() => {
                    debug!("Stats reporter stopped");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn reporter(
        counters: Arc<Counters>,
        lines: &mpsc::Sender<u8>,
        batches: &mpsc::Sender<u8>,
    ) -> StatsReporter<u8, u8> {
        StatsReporter::new(
            counters,
            InFlight::new(),
            QueueGauge::new(lines),
            QueueGauge::new(batches),
            Duration::from_secs(1),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn test_sample_reports_deltas_and_depths() {
        let counters = Counters::new();
        let (lines_tx, _lines_rx) = mpsc::channel(8);
        let (batches_tx, _batches_rx) = mpsc::channel(4);
        lines_tx.send(1).await.unwrap();
        lines_tx.send(2).await.unwrap();
        batches_tx.send(3).await.unwrap();
        for _ in 0..5 {
            counters.record_read();
        }
        counters.record_drop();

        let reporter = reporter(Arc::clone(&counters), &lines_tx, &batches_tx);

        let first = reporter.sample();
        assert_eq!(
            first,
            Report {
                reads: 5,
                drops: 1,
                lines: 2,
                batches: 1,
                in_flight: 0,
            }
        );

        counters.record_read();
        let second = reporter.sample();
        assert_eq!(second.reads, 1);
        assert_eq!(second.drops, 0);
    }

    #[tokio::test]
    async fn test_rendezvous_gauge_reports_no_depth() {
        let (tx, _rx) = mpsc::channel::<u8>(1);
        tx.send(1).await.unwrap();

        assert_eq!(QueueGauge::new(&tx).depth(), 1);
        assert_eq!(QueueGauge::rendezvous(&tx).depth(), 0);
    }

    #[tokio::test]
    async fn test_gauge_does_not_keep_queue_open() {
        let (tx, mut rx) = mpsc::channel::<u8>(2);
        let gauge = QueueGauge::new(&tx);
        drop(tx);

        assert_eq!(rx.recv().await, None);
        assert_eq!(gauge.depth(), 0);
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_run_reports_every_period_until_cancelled() {
        let counters = Counters::new();
        let (lines_tx, _lines_rx) = mpsc::channel(8);
        let (batches_tx, _batches_rx) = mpsc::channel(4);
        let reporter = reporter(Arc::clone(&counters), &lines_tx, &batches_tx);
        let cancel_token = reporter.cancel_token.clone();

        counters.record_read();
        counters.record_read();
        let run = reporter.run();
        tokio::pin!(run);

        tokio::select! {
            () = &mut run => panic!("reporter stopped early"),
            () = tokio::time::sleep(Duration::from_millis(1500)) => {}
        }
        assert!(logs_contain("reads=2"));
        assert_eq!(counters.peek().reads, 0);

        cancel_token.cancel();
        run.await;
    }
}
