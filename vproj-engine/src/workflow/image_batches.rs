//! Image batch processor
//!
//! Tokens accumulate into a buffer; each time it reaches the batch size the
//! buffer is handed to a spawned task that looks up every item's image
//! concurrently. In-flight tasks live in a [`JoinSet`] that
//! [`finalize`](ImageBatchProcessor::finalize) drains, so no batch is lost or
//! left running once the workflow completes. Dropping the processor aborts
//! whatever is still in flight.
//!
//! The batch-completed callback runs inside each task, so callbacks arrive in
//! completion order rather than dispatch order.

use super::WorkflowLogger;
use crate::models::{ImageBatchItem, ImageBatchResult};
use crate::services::ImageService;
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

/// Invoked once per finished batch
pub type BatchCallback = Arc<dyn Fn(ImageBatchResult) + Send + Sync>;

pub struct ImageBatchProcessor {
    images: Arc<dyn ImageService>,
    batch_size: usize,
    current_batch: Vec<String>,
    batch_counter: u64,
    in_flight: JoinSet<u64>,
    on_batch: BatchCallback,
    log: WorkflowLogger,
}

impl ImageBatchProcessor {
    pub fn new(
        images: Arc<dyn ImageService>,
        batch_size: usize,
        log: WorkflowLogger,
        on_batch: BatchCallback,
    ) -> Self {
        Self {
            images,
            batch_size: batch_size.max(1),
            current_batch: Vec::new(),
            batch_counter: 0,
            in_flight: JoinSet::new(),
            on_batch,
            log,
        }
    }

    /// Queue one token; dispatches a batch when the buffer fills
    ///
    /// Returns `false` for blank tokens, which are ignored. Must be called
    /// from within a tokio runtime.
    pub fn process_item(&mut self, token: &str) -> bool {
        let token = token.trim();
        if token.is_empty() {
            return false;
        }

        self.current_batch.push(token.to_string());
        if self.current_batch.len() >= self.batch_size {
            let batch = std::mem::take(&mut self.current_batch);
            self.dispatch(batch);
        }
        true
    }

    /// Dispatch any partial batch, then wait for every batch to settle
    ///
    /// Returns the number of batches that settled during this call.
    pub async fn finalize(&mut self) -> usize {
        if !self.current_batch.is_empty() {
            let batch = std::mem::take(&mut self.current_batch);
            self.dispatch(batch);
        }

        let mut settled = 0;
        while let Some(joined) = self.in_flight.join_next().await {
            settled += 1;
            if let Err(e) = joined {
                self.log.error(format!("Image batch task failed: {}", e));
            }
        }
        settled
    }

    /// Batches dispatched so far (also the last batch number used)
    pub fn batches_dispatched(&self) -> u64 {
        self.batch_counter
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Tokens waiting for the buffer to fill
    pub fn buffered(&self) -> usize {
        self.current_batch.len()
    }

    fn dispatch(&mut self, tokens: Vec<String>) -> u64 {
        self.batch_counter += 1;
        let batch_number = self.batch_counter;

        self.in_flight.spawn(process_batch(
            Arc::clone(&self.images),
            batch_number,
            tokens,
            self.log.clone(),
            Arc::clone(&self.on_batch),
        ));

        batch_number
    }
}

async fn process_batch(
    images: Arc<dyn ImageService>,
    batch_number: u64,
    tokens: Vec<String>,
    log: WorkflowLogger,
    on_batch: BatchCallback,
) -> u64 {
    let batch_start = Instant::now();
    log.info(format!(
        "Processing batch #{} with {} items",
        batch_number,
        tokens.len()
    ));

    let items = join_all(tokens.into_iter().map(|text| {
        let images = Arc::clone(&images);
        let log = log.clone();
        async move {
            let start = Instant::now();
            let image_url = match images.fetch_thumbnail(&text).await {
                Ok(url) => url,
                Err(e) => {
                    log.error(format!("Failed to fetch image for {}: {}", text, e));
                    None
                }
            };
            let fetch_time_ms = elapsed_ms(start);
            log.debug(format!(
                "Fetched image for \"{}\" in {:.2}ms",
                text, fetch_time_ms
            ));

            ImageBatchItem {
                text,
                image_url,
                fetch_time_ms,
            }
        }
    }))
    .await;

    let processing_time_ms = elapsed_ms(batch_start);
    log.success(format!(
        "Completed batch #{} in {:.2}ms",
        batch_number, processing_time_ms
    ));

    on_batch(ImageBatchResult {
        batch_number,
        items,
        processing_time_ms,
        timestamp: Utc::now(),
    });

    batch_number
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
