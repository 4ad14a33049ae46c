use std::sync::Arc;

use postern_core::{DeleteRequest, Store, StoreError};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, warn};
use typed_builder::TypedBuilder;

use crate::batch::DEFAULT_CHUNK_SIZE;

/// Number of workers pulling delete chunks concurrently.
pub const DEFAULT_WORKERS: usize = 10;

/// Cooperative cancellation signal shared by every pipeline stage.
///
/// Asserting it stops dispatch and forwarding at each stage's next
/// check; a store call already in flight is always allowed to finish.
#[derive(Debug, Clone)]
pub struct Cancellation {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Cancellation {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Signals every clone of this token.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once [`cancel`](Cancellation::cancel) has been called.
    pub async fn cancelled(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                // every clone holds the sender, so this arm is dead; a
                // token that can no longer be cancelled never resolves
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

/// Observable lifecycle of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    /// The source stage is emitting chunks.
    Dispatching,
    /// Every chunk is dispatched; workers are finishing.
    Draining,
    /// The merged outcome stream has closed.
    Done,
}

/// Result of one `delete_batch` call, as emitted by a worker.
#[derive(Debug)]
pub struct ChunkOutcome {
    /// Index of the chunk in dispatch order.
    pub chunk: usize,
    /// Number of deletion requests in the chunk.
    pub requests: usize,
    pub result: Result<(), StoreError>,
}

/// Summary of a completed pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteReport {
    pub chunks_dispatched: usize,
    pub chunks_completed: usize,
}

/// Handle to an in-flight pipeline run.
pub struct PipelineRun {
    outcomes: mpsc::Receiver<ChunkOutcome>,
    state: watch::Receiver<RunState>,
    chunks_planned: usize,
}

impl PipelineRun {
    /// Receives the next merged outcome; `None` once the stream closes.
    /// Outcome order is unspecified, the workers race.
    pub async fn next_outcome(&mut self) -> Option<ChunkOutcome> {
        self.outcomes.recv().await
    }

    /// Current lifecycle state of the run.
    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    /// Waits until the run reaches its terminal state.
    pub async fn finished(&mut self) {
        let _ = self.state.wait_for(|state| *state == RunState::Done).await;
    }

    /// Number of chunks the input was partitioned into. For a run that
    /// was not cancelled, the outcome count equals this number.
    pub fn chunks_planned(&self) -> usize {
        self.chunks_planned
    }
}

/// Applies bulk soft-deletes through a pool of concurrent workers.
///
/// Three stages over message-passing channels: a source that partitions
/// the input into chunks, a fixed fan-out pool calling
/// `Store::delete_batch` per chunk, and a fan-in merge of the per-worker
/// outcome streams. The store handle is the only shared state.
#[derive(Debug, TypedBuilder)]
pub struct DeletePipeline<S> {
    store: Arc<S>,
    #[builder(default = DEFAULT_WORKERS)]
    workers: usize,
    #[builder(default = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,
}

impl<S: Store> DeletePipeline<S> {
    /// Starts a run over `requests` and returns its handle immediately.
    ///
    /// An erroring chunk does not stop the run; callers that want
    /// fail-fast behavior cancel the token when they see the first bad
    /// outcome.
    pub fn run(&self, requests: Vec<DeleteRequest>, cancellation: Cancellation) -> PipelineRun {
        let chunks: Vec<Vec<DeleteRequest>> = requests
            .chunks(self.chunk_size)
            .map(|chunk| chunk.to_vec())
            .collect();
        let chunks_planned = chunks.len();

        let (state_tx, state_rx) = watch::channel(RunState::Idle);
        let state_tx = Arc::new(state_tx);

        // Source: one bounded channel of chunks shared by all workers.
        let (chunk_tx, chunk_rx) = mpsc::channel::<(usize, Vec<DeleteRequest>)>(self.workers);
        let chunk_rx = Arc::new(Mutex::new(chunk_rx));

        {
            let mut cancellation = cancellation.clone();
            let state_tx = Arc::clone(&state_tx);
            tokio::spawn(async move {
                let _ = state_tx.send(RunState::Dispatching);
                for (index, chunk) in chunks.into_iter().enumerate() {
                    tokio::select! {
                        biased;
                        _ = cancellation.cancelled() => {
                            debug!(chunk = index, "dispatch stopped by cancellation");
                            break;
                        }
                        sent = chunk_tx.send((index, chunk)) => {
                            if sent.is_err() {
                                break;
                            }
                        }
                    }
                }
                let _ = state_tx.send(RunState::Draining);
                // dropping chunk_tx here lets the workers drain and exit
            });
        }

        // Fan-out: a fixed pool of workers pulling from the shared
        // receiver, one outcome channel each.
        let mut worker_outcomes = Vec::with_capacity(self.workers);
        for worker in 0..self.workers {
            let (outcome_tx, outcome_rx) = mpsc::channel::<ChunkOutcome>(1);
            worker_outcomes.push(outcome_rx);

            let store = Arc::clone(&self.store);
            let chunk_rx = Arc::clone(&chunk_rx);
            let cancellation = cancellation.clone();
            tokio::spawn(async move {
                loop {
                    if cancellation.is_cancelled() {
                        break;
                    }
                    let next = {
                        let mut rx = chunk_rx.lock().await;
                        rx.recv().await
                    };
                    let Some((index, chunk)) = next else {
                        break;
                    };

                    // the store call is never aborted once issued
                    let requests = chunk.len();
                    let result = store.delete_batch(&chunk).await;
                    if let Err(ref err) = result {
                        warn!(worker, chunk = index, error = %err, "delete chunk failed");
                    }

                    let outcome = ChunkOutcome {
                        chunk: index,
                        requests,
                        result,
                    };
                    if outcome_tx.send(outcome).await.is_err() {
                        break;
                    }
                }
            });
        }

        let outcomes = Self::fan_in(worker_outcomes, cancellation, state_tx);

        PipelineRun {
            outcomes,
            state: state_rx,
            chunks_planned,
        }
    }

    /// Merges the per-worker outcome channels into one stream. The
    /// merged channel closes exactly when every forwarder has drained
    /// its worker: each forwarder owns one clone of the merged sender
    /// and the channel closes when the last clone is dropped.
    fn fan_in(
        receivers: Vec<mpsc::Receiver<ChunkOutcome>>,
        cancellation: Cancellation,
        state_tx: Arc<watch::Sender<RunState>>,
    ) -> mpsc::Receiver<ChunkOutcome> {
        let (merged_tx, merged_rx) = mpsc::channel(receivers.len().max(1));

        let mut forwarders = JoinSet::new();
        for mut rx in receivers {
            let merged_tx = merged_tx.clone();
            let mut cancellation = cancellation.clone();
            forwarders.spawn(async move {
                loop {
                    tokio::select! {
                        biased;
                        _ = cancellation.cancelled() => break,
                        outcome = rx.recv() => {
                            let Some(outcome) = outcome else { break };
                            if merged_tx.send(outcome).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            });
        }
        drop(merged_tx);

        tokio::spawn(async move {
            while forwarders.join_next().await.is_some() {}
            let _ = state_tx.send(RunState::Done);
        });

        merged_rx
    }

    /// Runs the pipeline to completion and reduces the outcome stream to
    /// one result: `Cancelled` if the run was cut short, otherwise the
    /// first chunk error, otherwise a completion report. All chunks are
    /// attempted either way.
    pub async fn delete_all(
        &self,
        requests: Vec<DeleteRequest>,
        cancellation: Cancellation,
    ) -> postern_core::Result<DeleteReport> {
        let mut run = self.run(requests, cancellation);

        let mut completed = 0usize;
        let mut first_error: Option<StoreError> = None;
        while let Some(outcome) = run.next_outcome().await {
            completed += 1;
            if let Err(err) = outcome.result {
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
        run.finished().await;

        if let Some(err) = first_error {
            return Err(err);
        }
        if completed != run.chunks_planned() {
            return Err(StoreError::Cancelled(format!(
                "{completed} of {} delete chunks completed",
                run.chunks_planned()
            )));
        }
        Ok(DeleteReport {
            chunks_dispatched: run.chunks_planned(),
            chunks_completed: completed,
        })
    }
}
