// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Groups lines into batches.
//!
//! A batch closes when it reaches `batch_size` lines, or when the flush
//! ticker fires while it holds at least one line. The ticker runs on a fixed
//! period from start-up and is never reset by a size flush, so two flushes
//! can be closer together than `wait`.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, trace};

use crate::admission::{Line, Offer};

/// Why a batch was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// The batch reached the configured size.
    Size,
    /// The flush ticker fired.
    Interval,
    /// The line queue closed with lines still pending.
    Drain,
}

/// An ordered, non-empty group of lines owned by a single outlet worker.
#[derive(Debug, PartialEq, Eq)]
pub struct Batch {
    pub lines: Vec<Line>,
    pub trigger: FlushTrigger,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

pub struct Batcher {
    lines: mpsc::Receiver<Offer>,
    batches: mpsc::Sender<Batch>,
    batch_size: usize,
    wait: Duration,
    current: Vec<Line>,
}

impl Batcher {
    #[must_use]
    pub fn new(
        lines: mpsc::Receiver<Offer>,
        batches: mpsc::Sender<Batch>,
        batch_size: usize,
        wait: Duration,
    ) -> Self {
        let batch_size = batch_size.max(1);
        Batcher {
            lines,
            batches,
            batch_size,
            wait: wait.max(Duration::from_millis(1)),
            current: Vec::with_capacity(batch_size),
        }
    }

    /// Runs until the line queue closes (after flushing what is left) or the
    /// batch queue closes.
    pub async fn run(mut self) {
        debug!(
            "Batcher started: batch_size={} wait={:?}",
            self.batch_size, self.wait
        );
        let mut ticker = interval_at(Instant::now() + self.wait, self.wait);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !self.current.is_empty() && !self.flush(FlushTrigger::Interval).await {
                        break;
                    }
                }
                offer = self.lines.recv() => match offer {
                    Some(offer) => {
                        self.current.push(offer.accept());
                        if self.current.len() == self.batch_size
                            && !self.flush(FlushTrigger::Size).await
                        {
                            break;
                        }
                    }
                    None => {
                        if !self.current.is_empty() {
                            self.flush(FlushTrigger::Drain).await;
                        }
                        break;
                    }
                },
            }
        }
        debug!("Batcher stopped");
    }

    /// Hands the current batch to the outlets. Returns false if they are gone.
    async fn flush(&mut self, trigger: FlushTrigger) -> bool {
        let lines = std::mem::replace(&mut self.current, Vec::with_capacity(self.batch_size));
        trace!("Flushing batch of {} lines ({:?})", lines.len(), trigger);
        if self.batches.send(Batch { lines, trigger }).await.is_err() {
            debug!("Batch queue closed, stopping batcher");
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG_WAIT: Duration = Duration::from_secs(10);

    struct Harness {
        lines: mpsc::Sender<Offer>,
        batches: mpsc::Receiver<Batch>,
        task: tokio::task::JoinHandle<()>,
    }

    fn start(batch_size: usize, wait: Duration) -> Harness {
        let (lines_tx, lines_rx) = mpsc::channel(64);
        let (batches_tx, batches_rx) = mpsc::channel(64);
        let task = tokio::spawn(Batcher::new(lines_rx, batches_tx, batch_size, wait).run());
        Harness {
            lines: lines_tx,
            batches: batches_rx,
            task,
        }
    }

    fn lines(batch: &Batch) -> Vec<&[u8]> {
        batch.lines.iter().map(Line::as_bytes).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_size_trigger_then_interval() {
        let mut h = start(3, LONG_WAIT);
        for l in ["a\n", "b\n", "c\n", "d\n"] {
            h.lines.send(Line::from(l).into()).await.unwrap();
        }

        let first = h.batches.recv().await.unwrap();
        assert_eq!(lines(&first), vec![b"a\n", b"b\n", b"c\n"]);
        assert_eq!(first.trigger, FlushTrigger::Size);
        assert!(h.batches.try_recv().is_err());

        let before = Instant::now();
        let second = h.batches.recv().await.unwrap();
        assert_eq!(lines(&second), vec![b"d\n"]);
        assert_eq!(second.trigger, FlushTrigger::Interval);
        assert!(before.elapsed() > Duration::from_secs(9));
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_batch_per_tick_for_slow_input() {
        let mut h = start(100, Duration::from_millis(200));
        for l in ["x\n", "y\n", "z\n"] {
            h.lines.send(Line::from(l).into()).await.unwrap();
            let batch = h.batches.recv().await.unwrap();
            assert_eq!(batch.len(), 1);
            assert_eq!(batch.lines[0], Line::from(l));
            assert_eq!(batch.trigger, FlushTrigger::Interval);
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_is_not_reset_by_size_flush() {
        let start_at = Instant::now();
        let mut h = start(2, Duration::from_millis(500));

        tokio::time::sleep(Duration::from_millis(100)).await;
        h.lines.send(Line::from("1\n").into()).await.unwrap();
        h.lines.send(Line::from("2\n").into()).await.unwrap();
        let sized = h.batches.recv().await.unwrap();
        assert_eq!(sized.trigger, FlushTrigger::Size);

        h.lines.send(Line::from("3\n").into()).await.unwrap();
        let timed = h.batches.recv().await.unwrap();
        assert_eq!(timed.trigger, FlushTrigger::Interval);
        assert_eq!(lines(&timed), vec![b"3\n"]);
        // Boundary stays at 500ms, not 100ms + 500ms.
        let at = start_at.elapsed();
        assert!(at >= Duration::from_millis(500), "{at:?}");
        assert!(at < Duration::from_millis(600), "{at:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_ticks_emit_nothing() {
        let mut h = start(10, Duration::from_millis(100));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(h.batches.try_recv().is_err());

        drop(h.lines);
        assert!(h.batches.recv().await.is_none());
        h.task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_flushes_remainder() {
        let mut h = start(10, LONG_WAIT);
        h.lines.send(Line::from("tail\n").into()).await.unwrap();
        drop(h.lines);

        let batch = h.batches.recv().await.unwrap();
        assert_eq!(batch.trigger, FlushTrigger::Drain);
        assert_eq!(lines(&batch), vec![b"tail\n"]);
        assert!(h.batches.recv().await.is_none());
        h.task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_batches_never_exceed_size_and_keep_order() {
        let mut h = start(4, LONG_WAIT);
        for i in 0..10 {
            h.lines
                .send(Line::new(format!("{i}\n").into_bytes()).into())
                .await
                .unwrap();
        }
        drop(h.lines);

        let mut seen = Vec::new();
        while let Some(batch) = h.batches.recv().await {
            assert!(!batch.is_empty());
            assert!(batch.len() <= 4);
            seen.extend(batch.lines);
        }
        let expected: Vec<Line> = (0..10)
            .map(|i| Line::new(format!("{i}\n").into_bytes()))
            .collect();
        assert_eq!(seen, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_batch_queue_closes() {
        let h = start(1, LONG_WAIT);
        drop(h.batches);
        h.lines.send(Line::from("lost\n").into()).await.unwrap();
        h.task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_rendezvous_admit_completes_when_batcher_takes_line() {
        use crate::admission::{line_queue, Admitted};
        use crate::counters::Counters;
        use std::sync::Arc;

        let counters = Counters::new();
        let (admitter, lines_rx) = line_queue(0, Arc::clone(&counters));
        let (batches_tx, mut batches_rx) = mpsc::channel(4);
        tokio::spawn(Batcher::new(lines_rx, batches_tx, 2, LONG_WAIT).run());

        assert_eq!(admitter.admit(Line::from("a\n")).await, Admitted::Queued);
        assert_eq!(admitter.admit(Line::from("b\n")).await, Admitted::Queued);
        assert_eq!(counters.peek().reads, 2);
        assert_eq!(admitter.depth(), 0);

        let batch = batches_rx.recv().await.unwrap();
        assert_eq!(lines(&batch), vec![b"a\n", b"b\n"]);
    }
}
