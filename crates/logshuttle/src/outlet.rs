// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Outlet workers delivering batches concurrently.
//!
//! Every worker competes for the next batch on one shared queue; there is no
//! partitioning. A failed delivery is logged and the batch is discarded.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::batcher::Batch;
use crate::counters::InFlight;
use crate::delivery::Deliver;
use crate::format::Framer;

pub struct OutletPool {
    workers: Vec<JoinHandle<()>>,
}

impl OutletPool {
    /// Spawns `workers` outlets (at least one) reading from `batches`.
    pub fn start(
        workers: usize,
        batches: mpsc::Receiver<Batch>,
        framer: Framer,
        deliverer: Arc<dyn Deliver>,
        in_flight: Arc<InFlight>,
    ) -> Self {
        let batches = Arc::new(Mutex::new(batches));
        let framer = Arc::new(framer);
        let workers = (0..workers.max(1))
            .map(|id| {
                let outlet = Outlet {
                    id,
                    batches: Arc::clone(&batches),
                    framer: Arc::clone(&framer),
                    deliverer: Arc::clone(&deliverer),
                    in_flight: Arc::clone(&in_flight),
                };
                tokio::spawn(outlet.run())
            })
            .collect();
        OutletPool { workers }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Waits for every worker to finish. Workers finish once the batch queue
    /// is closed and empty, so every batch handed over has been delivered (or
    /// failed) when this returns.
    pub async fn drain(self) {
        for worker in self.workers {
            if let Err(e) = worker.await {
                error!("Outlet worker failed: {}", e);
            }
        }
    }
}

struct Outlet {
    id: usize,
    batches: Arc<Mutex<mpsc::Receiver<Batch>>>,
    framer: Arc<Framer>,
    deliverer: Arc<dyn Deliver>,
    in_flight: Arc<InFlight>,
}

impl Outlet {
    async fn run(self) {
        debug!("Outlet {} started", self.id);
        loop {
            // Hold the lock only while waiting, not while delivering.
            let next = self.batches.lock().await.recv().await;
            let Some(batch) = next else {
                break;
            };
            self.post(batch).await;
        }
        debug!("Outlet {} stopped", self.id);
    }

    async fn post(&self, batch: Batch) {
        let _guard = self.in_flight.start();
        let framed = self.framer.frame(&batch);
        drop(batch);
        match self.deliverer.deliver(framed.body, framed.count).await {
            Ok(status) if status.is_success() => {
                debug!(status = status.as_u16(), "at=logplex-post");
            }
            Ok(status) => {
                error!(status = status.as_u16(), count = framed.count, "at=logplex-post");
            }
            Err(e) => {
                error!(count = framed.count, "at=logplex-post error={}", e);
            }
        }
    }
}
