// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Wires readers, the batcher, the outlet pool and the stats reporter.
//!
//! ```text
//!   reader(s) ──> line queue ──> batcher ──> batch queue ──> outlet workers ──> Deliver
//!                      └───────────── stats reporter (depths, counters) ──────────┘
//! ```

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::admission::{line_queue, LineAdmitter};
use crate::batcher::{Batch, Batcher};
use crate::config::Config;
use crate::constants::STATS_INTERVAL;
use crate::counters::{Counters, InFlight};
use crate::delivery::Deliver;
use crate::format::Framer;
use crate::outlet::OutletPool;
use crate::reader;
use crate::stats::{QueueGauge, StatsReporter};

#[cfg_attr(not(unix), allow(dead_code))]
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// A running pipeline.
pub struct Shuttle {
    admitter: LineAdmitter,
    batcher: JoinHandle<()>,
    outlets: OutletPool,
    counters: Arc<Counters>,
    in_flight: Arc<InFlight>,
    stats_cancel_token: CancellationToken,
    stats: JoinHandle<()>,
}

impl Shuttle {
    /// Spawns the batcher, the outlet workers and the stats reporter.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: &Config, deliverer: Arc<dyn Deliver>) -> Self {
        let counters = Counters::new();
        let in_flight = InFlight::new();

        let (admitter, lines_rx) = line_queue(config.front_buff, Arc::clone(&counters));
        let (batches_tx, batches_rx) = mpsc::channel::<Batch>(config.batch_queue_capacity.max(1));

        let stats_cancel_token = CancellationToken::new();
        let stats = tokio::spawn(
            StatsReporter::new(
                Arc::clone(&counters),
                Arc::clone(&in_flight),
                admitter.depth_gauge(),
                QueueGauge::new(&batches_tx),
                STATS_INTERVAL,
                stats_cancel_token.clone(),
            )
            .run(),
        );

        let batcher = tokio::spawn(
            Batcher::new(lines_rx, batches_tx, config.batch_size, config.wait).run(),
        );

        let framer = Framer::new(
            config.logplex_token.clone(),
            config.procid.clone(),
            config.skip_headers,
        );
        let outlets = OutletPool::start(
            config.workers,
            batches_rx,
            framer,
            deliverer,
            Arc::clone(&in_flight),
        );
        debug!(
            "Shuttle started: admission={:?} workers={}",
            admitter.policy(),
            outlets.size()
        );

        Shuttle {
            admitter,
            batcher,
            outlets,
            counters,
            in_flight,
            stats_cancel_token,
            stats,
        }
    }

    /// A new handle for feeding lines into the pipeline.
    pub fn admitter(&self) -> LineAdmitter {
        self.admitter.clone()
    }

    pub fn counters(&self) -> &Arc<Counters> {
        &self.counters
    }

    pub fn in_flight(&self) -> &Arc<InFlight> {
        &self.in_flight
    }

    /// Reads standard input to the end, then drains the pipeline.
    pub async fn run_stdin(self) {
        self.run_reader(tokio::io::stdin()).await;
    }

    /// Reads `source` to the end, then drains the pipeline.
    pub async fn run_reader<R>(self, source: R)
    where
        R: AsyncRead + Unpin,
    {
        reader::read(source, self.admitter.clone()).await;
        self.drain().await;
    }

    /// Closes the line queue and waits until every pending line has been
    /// batched and every batch delivered.
    ///
    /// Admitter clones handed out by [`Shuttle::admitter`] must be dropped
    /// first or this waits for them.
    pub async fn drain(self) {
        drop(self.admitter);
        if let Err(e) = self.batcher.await {
            error!("Batcher failed: {}", e);
        }
        self.outlets.drain().await;
        self.in_flight.wait_idle().await;

        self.stats_cancel_token.cancel();
        if let Err(e) = self.stats.await {
            error!("Stats reporter failed: {}", e);
        }
        debug!("Shuttle drained");
    }

    /// Listens on a UNIX socket and reads every accepted connection. Runs
    /// until the process is terminated; only a bind failure returns.
    #[cfg(unix)]
    pub async fn serve(self, path: &std::path::Path) -> io::Result<()> {
        let listener = tokio::net::UnixListener::bind(path)?;
        tracing::info!("Listening on {}", path.display());
        self.accept(listener).await;
        Ok(())
    }

    #[cfg(unix)]
    async fn accept(self, listener: tokio::net::UnixListener) {
        let listener = &listener;
        accept_loop(
            move || async move { listener.accept().await.map(|(stream, _)| stream) },
            self.admitter.clone(),
        )
        .await;
    }
}

/// Spawns a reader per accepted stream, forever. After a failed accept the
/// loop pauses for [`ACCEPT_ERROR_BACKOFF`].
#[cfg_attr(not(unix), allow(dead_code))]
async fn accept_loop<F, Fut, S>(mut accept: F, admitter: LineAdmitter)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<S>>,
    S: AsyncRead + Unpin + Send + 'static,
{
    loop {
        match accept().await {
            Ok(stream) => {
                debug!("Accepted connection");
                tokio::spawn(reader::read(stream, admitter.clone()));
            }
            Err(e) => {
                error!("Accept error: {}", e);
                tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
            }
        }
    }
}
