//! Process queue for block processing
//!
//! Blocks submitted to the queue are validated by a pool of worker threads.
//! A block whose parents are unknown is parked in the dependency gate and
//! resubmitted once they commit. Workers never die silently: each one reports
//! how it exited to a supervisor thread, which stops the pool once a worker
//! hits a fatal error or panics, and sweeps expired pending blocks.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use consensus_core::block::Block;
use consensus_core::errors::{ConsensusError, ConsensusResult, ProtocolError, RuleError};
use consensus_core::Hash;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, info};

use crate::config::PipelineConfig;
use crate::pipeline::block_processor::BlockProcessor;
use crate::pipeline::deps_manager::{BlockResultReceiver, BlockTask, DepsManager};

/// How a worker thread ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    /// Stopped on request
    Ok,
    /// Hit a fatal consensus error; the processor is halted
    Fatal(ConsensusError),
    /// Panicked while processing a block; the processor is halted
    Panicked(String),
}

enum Message {
    Job(BlockTask),
    Stop,
}

#[derive(Clone)]
struct WorkerContext {
    processor: Arc<BlockProcessor>,
    deps: Arc<DepsManager>,
    jobs: Receiver<Message>,
    resubmit: Sender<Message>,
}

/// Block processing worker pool
pub struct ProcessQueue {
    jobs: Sender<Message>,
    job_receiver: Receiver<Message>,
    deps: Arc<DepsManager>,
    worker_count: usize,
    shutting_down: Arc<AtomicBool>,
    supervisor: Option<JoinHandle<Vec<WorkerExit>>>,
}

impl ProcessQueue {
    /// Spawns the workers and their supervisor
    pub fn start(processor: Arc<BlockProcessor>, config: &PipelineConfig) -> ConsensusResult<Self> {
        let (jobs, job_receiver) = crossbeam_channel::unbounded();
        let timeout = Duration::from_millis(config.pending_timeout_ms);
        let deps = Arc::new(DepsManager::new(timeout, config.max_pending_blocks));
        let shutting_down = Arc::new(AtomicBool::new(false));
        let context = WorkerContext { processor, deps: deps.clone(), jobs: job_receiver.clone(), resubmit: jobs.clone() };

        let (exits, exit_receiver) = crossbeam_channel::unbounded();
        let mut workers = Vec::with_capacity(config.worker_count);
        for id in 0..config.worker_count {
            let context = context.clone();
            match spawn_worker(id, exits.clone(), move || context.run()) {
                Ok(worker) => workers.push(worker),
                Err(err) => {
                    for _ in 0..workers.len() {
                        let _ = jobs.send(Message::Stop);
                    }
                    return Err(err);
                }
            }
        }
        drop(exits);
        let supervisor = Supervisor {
            deps: deps.clone(),
            stop: jobs.clone(),
            exit_receiver,
            workers,
            shutting_down: shutting_down.clone(),
            sweep_interval: (timeout / 4).clamp(Duration::from_millis(10), Duration::from_secs(1)),
        };
        let supervisor = thread::Builder::new()
            .name("block-supervisor".to_string())
            .spawn(move || supervisor.run())
            .map_err(|err| ConsensusError::Internal(format!("failed spawning the block supervisor: {err}")))?;
        info!("Block processing pipeline started with {} workers", config.worker_count);

        Ok(Self { jobs, job_receiver, deps, worker_count: config.worker_count, shutting_down, supervisor: Some(supervisor) })
    }

    /// Queues a block. The result arrives on the returned receiver once the
    /// block is processed, or fails if it cannot be.
    pub fn submit(&self, block: Block) -> BlockResultReceiver {
        let (task, receiver) = BlockTask::new(block);
        if self.shutting_down.load(Ordering::Acquire) {
            task.reply(Err(ProtocolError::ShuttingDown.into()));
        } else if let Err(err) = self.jobs.send(Message::Job(task)) {
            if let Message::Job(task) = err.into_inner() {
                task.reply(Err(ProtocolError::ShuttingDown.into()));
            }
        }
        receiver
    }

    /// Abandons a block waiting for its parents. Returns whether it was waiting.
    pub fn cancel(&self, hash: Hash) -> bool {
        self.deps.cancel(hash)
    }

    pub fn pending_count(&self) -> usize {
        self.deps.len()
    }

    pub fn is_pending(&self, hash: Hash) -> bool {
        self.deps.is_pending(hash)
    }

    /// Stops the pool and reports how every worker ended. Blocks still queued
    /// or waiting for parents fail with [`ProtocolError::ShuttingDown`].
    pub fn shutdown(mut self) -> Vec<WorkerExit> {
        self.stop()
    }

    fn stop(&mut self) -> Vec<WorkerExit> {
        let Some(supervisor) = self.supervisor.take() else {
            return Vec::new();
        };
        self.shutting_down.store(true, Ordering::Release);
        self.deps.shutdown();
        for _ in 0..self.worker_count {
            let _ = self.jobs.send(Message::Stop);
        }
        let exits = supervisor.join().unwrap_or_else(|payload| {
            error!("Block supervisor panicked: {}", panic_message(payload.as_ref()));
            Vec::new()
        });
        while let Ok(message) = self.job_receiver.try_recv() {
            if let Message::Job(task) = message {
                task.reply(Err(ProtocolError::ShuttingDown.into()));
            }
        }
        info!("Block processing pipeline stopped");
        exits
    }
}

impl Drop for ProcessQueue {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Supervisor {
    deps: Arc<DepsManager>,
    stop: Sender<Message>,
    exit_receiver: Receiver<(usize, WorkerExit)>,
    workers: Vec<Option<JoinHandle<()>>>,
    shutting_down: Arc<AtomicBool>,
    sweep_interval: Duration,
}

impl Supervisor {
    fn run(mut self) -> Vec<WorkerExit> {
        let mut live = self.workers.iter().filter(|worker| worker.is_some()).count();
        let mut reported = Vec::new();
        while live > 0 {
            let (id, exit) = match self.exit_receiver.recv_timeout(self.sweep_interval) {
                Ok(exit) => exit,
                Err(RecvTimeoutError::Timeout) => {
                    let expired = self.deps.expire(Instant::now());
                    if expired > 0 {
                        debug!("{} pending blocks timed out waiting for parents", expired);
                    }
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            };
            live -= 1;
            if let Some(handle) = self.workers.get_mut(id).and_then(Option::take) {
                let _ = handle.join();
            }

            match &exit {
                WorkerExit::Ok => debug!("Block worker {} stopped", id),
                WorkerExit::Panicked(message) => {
                    error!("Block worker {} panicked, stopping the pipeline: {}", id, message);
                    self.stop_workers(live);
                }
                WorkerExit::Fatal(err) => {
                    error!("Block worker {} hit a fatal error, stopping the pipeline: {}", id, err);
                    self.stop_workers(live);
                }
            }
            reported.push(exit);
        }
        reported
    }

    /// Fails pending blocks and asks the `live` remaining workers to stop, once
    fn stop_workers(&self, live: usize) {
        if self.shutting_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.deps.shutdown();
        for _ in 0..live {
            let _ = self.stop.send(Message::Stop);
        }
    }
}

fn spawn_worker<F>(id: usize, exits: Sender<(usize, WorkerExit)>, body: F) -> ConsensusResult<Option<JoinHandle<()>>>
where
    F: FnOnce() -> WorkerExit + Send + 'static,
{
    thread::Builder::new()
        .name(format!("block-worker-{id}"))
        .spawn(move || {
            let exit = body();
            let _ = exits.send((id, exit));
        })
        .map(Some)
        .map_err(|err| ConsensusError::Internal(format!("failed spawning block worker {id}: {err}")))
}

impl WorkerContext {
    fn run(&self) -> WorkerExit {
        while let Ok(message) = self.jobs.recv() {
            let task = match message {
                Message::Job(task) => task,
                Message::Stop => break,
            };
            let hash = task.hash();
            let result = match panic::catch_unwind(AssertUnwindSafe(|| self.processor.process_block(&task.block))) {
                Ok(result) => result,
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    let err = ConsensusError::Internal(format!("block worker panicked processing {hash}: {message}"));
                    task.reply(Err(self.processor.check_fatal(err)));
                    return WorkerExit::Panicked(message);
                }
            };

            match result {
                Err(ConsensusError::Rule(RuleError::MissingParents(_, missing))) => {
                    if let Some(task) = self.deps.add_pending(task, missing, |parent| self.processor.is_known(parent)) {
                        self.submit(task);
                    }
                }
                Err(err) if err.is_fatal() => {
                    task.reply(Err(err.clone()));
                    return WorkerExit::Fatal(err);
                }
                result => {
                    task.reply(result);
                    for ready in self.deps.resolve(hash) {
                        self.submit(ready);
                    }
                }
            }
        }
        WorkerExit::Ok
    }

    fn submit(&self, task: BlockTask) {
        if let Err(err) = self.resubmit.send(Message::Job(task)) {
            if let Message::Job(task) = err.into_inner() {
                task.reply(Err(ProtocolError::ShuttingDown.into()));
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consensus_core::header::Header;

    #[test]
    fn test_panicked_worker_stops_the_pipeline() {
        let deps = Arc::new(DepsManager::new(Duration::from_secs(60), 10));
        let (parent, child) = (Hash::from_u64_word(1), Hash::from_u64_word(2));
        let (task, pending) = BlockTask::new(Block::from_header(Header::from_precomputed_hash(child, vec![parent])));
        assert!(deps.add_pending(task, vec![parent], |_| false).is_none());

        let (jobs, job_receiver) = crossbeam_channel::unbounded();
        let (exits, exit_receiver) = crossbeam_channel::unbounded();
        let panicked = spawn_worker(0, exits.clone(), || WorkerExit::Panicked("boom".to_string())).unwrap();
        let idle = spawn_worker(1, exits, move || {
            while let Ok(message) = job_receiver.recv() {
                if matches!(message, Message::Stop) {
                    break;
                }
            }
            WorkerExit::Ok
        })
        .unwrap();

        let shutting_down = Arc::new(AtomicBool::new(false));
        let supervisor = Supervisor {
            deps: deps.clone(),
            stop: jobs,
            exit_receiver,
            workers: vec![panicked, idle],
            shutting_down: shutting_down.clone(),
            sweep_interval: Duration::from_millis(10),
        };
        // The panic is not followed by a respawn: the idle worker is stopped instead
        assert_eq!(supervisor.run(), vec![WorkerExit::Panicked("boom".to_string()), WorkerExit::Ok]);
        assert!(shutting_down.load(Ordering::Acquire));
        assert_eq!(pending.recv(), Err(ProtocolError::ShuttingDown.into()));
        assert!(deps.is_empty());
    }
}
