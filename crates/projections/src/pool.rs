//! Partitioned ingestion worker pool.
//!
//! Every order ID hashes to one partition, and each partition is drained
//! by a single task, so events for one order are applied strictly in the
//! order they were submitted while different orders proceed in parallel.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use common::OrderId;
use domain::{ApplyError, DomainEvent, Order, OrderEvent};
use tokio::sync::{Mutex, RwLock, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{IngestError, Result};
use crate::projection::EventIngestor;

type Reply = oneshot::Sender<std::result::Result<Arc<Order>, ApplyError>>;

enum Job {
    Apply { event: OrderEvent, reply: Option<Reply> },
    Barrier(oneshot::Sender<()>),
}

/// Worker pool feeding events to an [`EventIngestor`].
pub struct IngestionPool {
    partitions: usize,
    senders: RwLock<Vec<mpsc::Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl IngestionPool {
    /// Spawns `partitions` workers, each with a queue of `queue_capacity` events.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(ingestor: Arc<EventIngestor>, partitions: usize, queue_capacity: usize) -> Self {
        let partitions = partitions.max(1);
        let mut senders = Vec::with_capacity(partitions);
        let mut workers = Vec::with_capacity(partitions);

        for partition in 0..partitions {
            let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
            senders.push(sender);
            workers.push(tokio::spawn(run_worker(
                partition,
                Arc::clone(&ingestor),
                receiver,
            )));
        }

        tracing::info!(partitions, queue_capacity, "ingestion pool started");

        Self {
            partitions,
            senders: RwLock::new(senders),
            workers: Mutex::new(workers),
        }
    }

    /// Returns the number of partitions.
    pub fn partitions(&self) -> usize {
        self.partitions
    }

    /// Applies an event and waits for the outcome.
    pub async fn ingest(&self, event: OrderEvent) -> Result<Arc<Order>> {
        let (reply, outcome) = oneshot::channel();
        self.dispatch(event, Some(reply)).await?;
        let order = outcome.await.map_err(|_| IngestError::ShuttingDown)??;
        Ok(order)
    }

    /// Queues an event without waiting for it to be applied.
    ///
    /// Waits only when the target partition's queue is full.
    pub async fn submit(&self, event: OrderEvent) -> Result<()> {
        self.dispatch(event, None).await
    }

    /// Waits until every event queued before this call has been handled.
    pub async fn sync(&self) -> Result<()> {
        let senders = self.senders.read().await.clone();
        if senders.is_empty() {
            return Err(IngestError::ShuttingDown);
        }

        let mut acks = Vec::with_capacity(senders.len());
        for sender in senders {
            let (ack, done) = oneshot::channel();
            sender
                .send(Job::Barrier(ack))
                .await
                .map_err(|_| IngestError::ShuttingDown)?;
            acks.push(done);
        }
        for done in acks {
            done.await.map_err(|_| IngestError::ShuttingDown)?;
        }
        Ok(())
    }

    /// Stops accepting events, drains what is queued and waits for the workers.
    pub async fn shutdown(&self) {
        self.senders.write().await.clear();

        let workers = std::mem::take(&mut *self.workers.lock().await);
        for worker in workers {
            if let Err(err) = worker.await {
                tracing::error!(error = %err, "ingestion worker failed");
            }
        }
        tracing::info!("ingestion pool stopped");
    }

    async fn dispatch(&self, event: OrderEvent, reply: Option<Reply>) -> Result<()> {
        let sender = {
            let senders = self.senders.read().await;
            if senders.is_empty() {
                return Err(IngestError::ShuttingDown);
            }
            senders[partition_of(event.aggregate_id(), senders.len())].clone()
        };

        sender
            .send(Job::Apply { event, reply })
            .await
            .map_err(|_| IngestError::ShuttingDown)
    }
}

fn partition_of(order_id: &OrderId, partitions: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    order_id.hash(&mut hasher);
    (hasher.finish() % partitions as u64) as usize
}

async fn run_worker(
    partition: usize,
    ingestor: Arc<EventIngestor>,
    mut receiver: mpsc::Receiver<Job>,
) {
    while let Some(job) = receiver.recv().await {
        match job {
            Job::Apply { event, reply } => {
                let outcome = ingestor.ingest(&event).await;
                if let Some(reply) = reply {
                    // The caller may have given up waiting.
                    let _ = reply.send(outcome);
                }
            }
            Job::Barrier(ack) => {
                let _ = ack.send(());
            }
        }
    }
    tracing::debug!(partition, "ingestion worker stopped");
}
