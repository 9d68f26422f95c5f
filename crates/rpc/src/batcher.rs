//! Call batching over a bounded worker pool.
//!
//! Calls are cut into contiguous chunks of at most `batch_size`. A fixed set
//! of worker tasks pulls chunks from a shared queue, sends each chunk as one
//! aggregated request and retries the whole chunk with backoff when the
//! round trip fails. Results are written back by position, so the output is
//! aligned with the input no matter which worker finished first.

use crate::error::{BatchError, ProviderError};
use crate::provider::{CallProvider, CallResults, CallSpec};
use crate::retry::RetryPolicy;
use alloy_primitives::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub type CallOutcome = Result<Bytes, BatchError>;

/// Batching parameters, fixed for the lifetime of a batcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    pub batch_size: usize,
    pub max_workers: usize,
    pub retry: RetryPolicy,
    /// Upper bound for a single attempt of a single chunk.
    pub call_timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_workers: 4,
            retry: RetryPolicy::default(),
            call_timeout: Duration::from_secs(20),
        }
    }
}

struct Chunk {
    offset: usize,
    calls: Vec<CallSpec>,
}

pub struct CallBatcher {
    provider: Arc<dyn CallProvider>,
    config: BatchConfig,
}

impl CallBatcher {
    pub fn new(provider: Arc<dyn CallProvider>, config: BatchConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Run every call and return `(call, outcome)` pairs in input order.
    ///
    /// Never fails as a whole: a chunk that cannot be completed marks each of
    /// its calls as [`BatchError::Exhausted`], and chunks left undispatched
    /// after `cancel` fires are marked [`BatchError::Cancelled`].
    pub async fn submit(
        &self,
        calls: Vec<CallSpec>,
        cancel: &CancellationToken,
    ) -> Vec<(CallSpec, CallOutcome)> {
        if calls.is_empty() {
            return Vec::new();
        }

        let batch_size = self.config.batch_size.max(1);
        let queue: VecDeque<Chunk> = calls
            .chunks(batch_size)
            .enumerate()
            .map(|(n, chunk)| Chunk {
                offset: n * batch_size,
                calls: chunk.to_vec(),
            })
            .collect();
        let chunk_count = queue.len();
        let queue = Arc::new(Mutex::new(queue));
        let worker_count = self.config.max_workers.max(1).min(chunk_count);

        debug!(
            calls = calls.len(),
            chunks = chunk_count,
            workers = worker_count,
            "dispatching call batches"
        );

        let (tx, mut rx) = mpsc::unbounded_channel::<(usize, Vec<CallOutcome>)>();
        let mut workers = Vec::with_capacity(worker_count);
        for worker in 0..worker_count {
            let queue = Arc::clone(&queue);
            let tx = tx.clone();
            let provider = Arc::clone(&self.provider);
            let config = self.config.clone();
            let cancel = cancel.clone();
            workers.push(tokio::spawn(async move {
                loop {
                    // Cancellation only stops new dispatches; the chunk in hand finishes.
                    if cancel.is_cancelled() {
                        break;
                    }
                    let next = queue.lock().pop_front();
                    let Some(chunk) = next else { break };
                    let results = run_chunk(provider.as_ref(), &config, &chunk, worker).await;
                    if tx.send((chunk.offset, results)).is_err() {
                        break;
                    }
                }
            }));
        }
        // Dropping the last sender closes the channel once every worker exits.
        drop(tx);

        let mut slots: Vec<Option<CallOutcome>> = (0..calls.len()).map(|_| None).collect();
        while let Some((offset, results)) = rx.recv().await {
            for (i, result) in results.into_iter().enumerate() {
                slots[offset + i] = Some(result);
            }
        }
        for handle in workers {
            if let Err(err) = handle.await {
                warn!(error = %err, "batch worker terminated abnormally");
            }
        }

        calls
            .into_iter()
            .zip(slots)
            .map(|(call, slot)| (call, slot.unwrap_or(Err(BatchError::Cancelled))))
            .collect()
    }
}

async fn run_chunk(
    provider: &dyn CallProvider,
    config: &BatchConfig,
    chunk: &Chunk,
    worker: usize,
) -> Vec<CallOutcome> {
    let mut backoff = config.retry.backoff();
    loop {
        let attempt =
            tokio::time::timeout(config.call_timeout, provider.aggregate(&chunk.calls)).await;
        let error = match attempt {
            Err(_) => ProviderError::Timeout(config.call_timeout),
            Ok(Err(err)) => err,
            Ok(Ok(results)) => match settle(results, chunk.calls.len()) {
                Ok(outcomes) => return outcomes,
                Err(err) => err,
            },
        };

        match backoff.on_failure() {
            Some(delay) => {
                warn!(
                    worker,
                    offset = chunk.offset,
                    attempt = backoff.attempts(),
                    error = %error,
                    "batch attempt failed, retrying in {:?}",
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            None => {
                warn!(
                    worker,
                    offset = chunk.offset,
                    calls = chunk.calls.len(),
                    attempts = backoff.attempts(),
                    error = %error,
                    "batch exhausted retries"
                );
                let exhausted = BatchError::Exhausted {
                    attempts: backoff.attempts(),
                    last_error: error.to_string(),
                };
                return vec![Err(exhausted); chunk.calls.len()];
            }
        }
    }
}

/// Turn an aggregated response into per-call outcomes, or report why the
/// whole chunk has to be retried.
fn settle(results: CallResults, expected: usize) -> Result<Vec<CallOutcome>, ProviderError> {
    if results.len() != expected {
        return Err(ProviderError::malformed(format!(
            "expected {expected} results, got {}",
            results.len()
        )));
    }
    if let Some(transient) = results
        .iter()
        .find_map(|r| r.as_ref().err().filter(|e| e.is_transient()))
    {
        return Err(ProviderError::malformed(format!(
            "call in batch failed: {transient}"
        )));
    }
    Ok(results
        .into_iter()
        .map(|r| r.map_err(|e| BatchError::Call(e.to_string())))
        .collect())
}
