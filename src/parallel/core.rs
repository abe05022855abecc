use crate::batch::types::{OutcomeStatus, WorkItem, WorkOutcome};
use crate::error::{BatchError, ConfigError, ItemError, Stage};
use crate::parallel::progress::DispatchObserver;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Validated dispatcher settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    max_concurrency: usize,
    item_timeout: Option<Duration>,
}

impl DispatchConfig {
    /// Reject anything below one slot instead of coercing it
    pub fn new(max_concurrency: i64) -> Result<Self, ConfigError> {
        let max_concurrency = usize::try_from(max_concurrency)
            .ok()
            .filter(|n| *n >= 1)
            .ok_or(ConfigError::InvalidConcurrency(max_concurrency))?;
        Ok(Self {
            max_concurrency,
            item_timeout: None,
        })
    }

    /// Fail items still running after `timeout`; `None` waits forever
    pub fn with_item_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.item_timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn item_timeout(&self) -> Option<Duration> {
        self.item_timeout
    }
}

/// Message a worker sends when it is done with its item
struct Completion {
    index: usize,
    result: Result<(), ItemError>,
    elapsed: Duration,
}

/// Worker end of the outcome channel
///
/// Reports exactly once. If dropped unreported (the processor panicked),
/// it reports a worker-stage failure so the coordinator never waits on a
/// message that cannot arrive.
struct CompletionHandle {
    index: usize,
    started: Instant,
    tx: Option<Sender<Completion>>,
}

impl CompletionHandle {
    fn new(index: usize, tx: Sender<Completion>) -> Self {
        Self {
            index,
            started: Instant::now(),
            tx: Some(tx),
        }
    }

    fn report(mut self, result: Result<(), ItemError>) {
        self.send(result);
    }

    fn send(&mut self, result: Result<(), ItemError>) {
        if let Some(tx) = self.tx.take() {
            // The coordinator may already have given up on this item
            let _ = tx.send(Completion {
                index: self.index,
                result,
                elapsed: self.started.elapsed(),
            });
        }
    }
}

impl Drop for CompletionHandle {
    fn drop(&mut self) {
        if self.tx.is_some() {
            let message = if thread::panicking() {
                "worker panicked before reporting an outcome"
            } else {
                "worker exited without reporting an outcome"
            };
            self.send(Err(ItemError::new(Stage::Worker, message)));
        }
    }
}

/// A pool slot currently running a worker
struct ActiveWorker {
    slot: usize,
    name: String,
    started: Instant,
    deadline: Option<Instant>,
    handle: JoinHandle<()>,
}

/// Bounded pool scheduler
///
/// The calling thread is the only coordinator: it owns the pending queue and
/// the slot bookkeeping, so none of it is shared. Each work item runs on its
/// own worker thread that receives the item at spawn time and sends back a
/// single [`Completion`].
pub struct Dispatcher {
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(config: DispatchConfig) -> Self {
        Self { config }
    }

    /// Run every item and return one outcome per item, in batch order
    ///
    /// Items start in batch order as slots free up; at most
    /// `max_concurrency` workers run at once. Item failures are collected,
    /// never escalated. Only a worker that cannot be started aborts the batch.
    pub fn run<F, O>(&self, items: Vec<WorkItem>, processor: F, observer: &O) -> Result<Vec<WorkOutcome>, BatchError>
    where
        F: Fn(&WorkItem) -> Result<(), ItemError> + Send + Sync + 'static,
        O: DispatchObserver + ?Sized,
    {
        let total = items.len();
        if total == 0 {
            return Ok(Vec::new());
        }

        let slot_count = std::cmp::min(self.config.max_concurrency, total);
        tracing::debug!("Dispatching {} item(s) across {} slot(s)", total, slot_count);

        let processor = Arc::new(processor);
        let (tx, rx): (Sender<Completion>, Receiver<Completion>) = channel::unbounded();

        let mut pending: VecDeque<(usize, WorkItem)> = items.into_iter().enumerate().collect();
        let mut free_slots: Vec<usize> = (0..slot_count).rev().collect();
        let mut active: HashMap<usize, ActiveWorker> = HashMap::with_capacity(slot_count);
        let mut outcomes: Vec<Option<WorkOutcome>> = vec![None; total];

        loop {
            // Fill every free slot from the front of the queue
            while !pending.is_empty()
                && let Some(slot) = free_slots.pop()
            {
                let Some((index, item)) = pending.pop_front() else {
                    free_slots.push(slot);
                    break;
                };
                let worker = self.start(slot, index, &item, &processor, &tx)?;
                observer.item_started(slot, &item);
                active.insert(index, worker);
            }

            if active.is_empty() {
                break;
            }

            match self.next_completion(&rx, &active) {
                Ok(completion) => {
                    let Some(worker) = active.remove(&completion.index) else {
                        tracing::debug!("Discarding late outcome for item #{}", completion.index);
                        continue;
                    };
                    if worker.handle.join().is_err() {
                        tracing::debug!("Worker for `{}` panicked after reporting", worker.name);
                    }
                    free_slots.push(worker.slot);
                    let outcome = Self::record(worker.name, worker.slot, completion.result, completion.elapsed);
                    observer.item_finished(&outcome);
                    outcomes[completion.index] = Some(outcome);
                }
                Err(RecvTimeoutError::Timeout) => {
                    let now = Instant::now();
                    let expired: Vec<usize> = active
                        .iter()
                        .filter(|(_, w)| w.deadline.is_some_and(|deadline| deadline <= now))
                        .map(|(index, _)| *index)
                        .collect();

                    for index in expired {
                        if let Some(worker) = active.remove(&index) {
                            // The thread is detached; whatever it sends later is discarded
                            let elapsed = now.duration_since(worker.started);
                            let error = ItemError::new(Stage::Timeout, format!("still running after {elapsed:.2?}"));
                            free_slots.push(worker.slot);
                            let outcome = Self::record(worker.name, worker.slot, Err(error), elapsed);
                            observer.item_finished(&outcome);
                            outcomes[index] = Some(outcome);
                        }
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    // Unreachable while `tx` is alive; fail what is left rather than spin
                    for (index, worker) in active.drain() {
                        let error = ItemError::new(Stage::Worker, "outcome channel closed");
                        let outcome = Self::record(worker.name, worker.slot, Err(error), worker.started.elapsed());
                        observer.item_finished(&outcome);
                        outcomes[index] = Some(outcome);
                    }
                }
            }
        }

        let outcomes: Vec<WorkOutcome> = outcomes.into_iter().flatten().collect();
        debug_assert_eq!(outcomes.len(), total, "every item yields exactly one outcome");
        Ok(outcomes)
    }

    fn start<F>(
        &self,
        slot: usize,
        index: usize,
        item: &WorkItem,
        processor: &Arc<F>,
        tx: &Sender<Completion>,
    ) -> Result<ActiveWorker, BatchError>
    where
        F: Fn(&WorkItem) -> Result<(), ItemError> + Send + Sync + 'static,
    {
        let name = item.name.clone();
        let item = item.clone();
        let processor = Arc::clone(processor);
        let completion = CompletionHandle::new(index, tx.clone());
        let started = completion.started;

        let handle = thread::Builder::new()
            .name(format!("pixbatch-worker-{slot}"))
            .spawn(move || {
                let result = processor(&item);
                completion.report(result);
            })
            .map_err(|source| BatchError::WorkerSpawn {
                name: name.clone(),
                source,
            })?;

        tracing::debug!("Started `{}` in slot {}", name, slot);
        Ok(ActiveWorker {
            slot,
            name,
            started,
            deadline: self.config.item_timeout.map(|timeout| started + timeout),
            handle,
        })
    }

    fn next_completion(
        &self,
        rx: &Receiver<Completion>,
        active: &HashMap<usize, ActiveWorker>,
    ) -> Result<Completion, RecvTimeoutError> {
        match active.values().filter_map(|w| w.deadline).min() {
            Some(deadline) => rx.recv_deadline(deadline),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        }
    }

    fn record(name: String, slot: usize, result: Result<(), ItemError>, elapsed: Duration) -> WorkOutcome {
        let status = match result {
            Ok(()) => {
                tracing::debug!("Finished `{}` in {:.2?} (slot {})", name, elapsed, slot);
                OutcomeStatus::Succeeded
            }
            Err(error) => {
                tracing::warn!("`{}` failed: {}", name, error);
                OutcomeStatus::Failed(error)
            }
        };
        WorkOutcome {
            name,
            status,
            slot,
            elapsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_rejects_zero_and_negative() {
        assert!(matches!(DispatchConfig::new(0), Err(ConfigError::InvalidConcurrency(0))));
        assert!(matches!(DispatchConfig::new(-3), Err(ConfigError::InvalidConcurrency(-3))));
        assert_eq!(DispatchConfig::new(1).unwrap().max_concurrency(), 1);
        assert_eq!(DispatchConfig::new(64).unwrap().max_concurrency(), 64);
    }

    #[test]
    fn test_zero_timeout_means_no_deadline() {
        let config = DispatchConfig::new(2).unwrap().with_item_timeout(Some(Duration::ZERO));
        assert_eq!(config.item_timeout(), None);
        let config = config.with_item_timeout(Some(Duration::from_secs(3)));
        assert_eq!(config.item_timeout(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_dropped_handle_reports_worker_failure() {
        let (tx, rx) = channel::unbounded();
        drop(CompletionHandle::new(7, tx));
        let completion = rx.recv().unwrap();
        assert_eq!(completion.index, 7);
        assert_eq!(completion.result.unwrap_err().stage, Stage::Worker);
    }

    #[test]
    fn test_reported_handle_sends_once() {
        let (tx, rx) = channel::unbounded();
        CompletionHandle::new(1, tx).report(Ok(()));
        assert!(rx.recv().unwrap().result.is_ok());
        assert!(rx.try_recv().is_err());
    }
}
