//! Projection processor for feeding an external event feed to the projection.

use std::sync::Arc;

use domain::OrderEvent;
use futures_core::Stream;
use futures_util::{StreamExt, stream};

use crate::Result;
use crate::pool::IngestionPool;
use crate::projection::{EventIngestor, ProjectionPosition};

/// Drains event feeds into the ingestion pool.
///
/// The processor supports:
/// - Live feeds: any `Stream` of events, consumed until it ends
/// - Catch-up: replays a finite history into the projection
///
/// Rejected events are counted and logged by the ingestor; they never stop
/// the feed.
#[derive(Clone)]
pub struct ProjectionProcessor {
    pool: Arc<IngestionPool>,
    ingestor: Arc<EventIngestor>,
}

impl ProjectionProcessor {
    /// Creates a processor feeding `pool`, reporting progress from `ingestor`.
    pub fn new(pool: Arc<IngestionPool>, ingestor: Arc<EventIngestor>) -> Self {
        Self { pool, ingestor }
    }

    /// Consumes `events` until the stream ends and every event is handled.
    ///
    /// Returns how far the projection advanced meanwhile, which includes
    /// events ingested concurrently through other paths.
    #[tracing::instrument(skip_all)]
    pub async fn run<S>(&self, events: S) -> Result<ProjectionPosition>
    where
        S: Stream<Item = OrderEvent>,
    {
        let start = self.ingestor.position();
        let mut events = std::pin::pin!(events);
        let mut submitted: u64 = 0;

        while let Some(event) = events.next().await {
            self.pool.submit(event).await?;
            submitted += 1;
        }
        self.pool.sync().await?;

        let advanced = self.ingestor.position().since(start);
        tracing::info!(
            submitted,
            applied = advanced.events_applied,
            rejected = advanced.events_rejected,
            "feed drained"
        );

        Ok(advanced)
    }

    /// Replays a finite event history.
    pub async fn run_catch_up<I>(&self, events: I) -> Result<ProjectionPosition>
    where
        I: IntoIterator<Item = OrderEvent>,
    {
        self.run(stream::iter(events)).await
    }
}
