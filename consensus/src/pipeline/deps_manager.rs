//! Dependency gate for blocks with missing parents
//!
//! A block may only be processed once all of its parents are committed. A block
//! arriving before some of its parents is held here, keyed by the parents it
//! waits on, and released as soon as the last one commits. Held blocks expire
//! after a bounded timeout, and can be cancelled or drained on shutdown. Every
//! way out of the gate answers the submitter through the block's reply channel.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use consensus_core::block::Block;
use consensus_core::blockstatus::BlockStatus;
use consensus_core::errors::{BlockProcessResult, ProtocolError, RuleError};
use consensus_core::Hash;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

pub type BlockResultSender = Sender<BlockProcessResult<BlockStatus>>;

/// A block submitted for processing together with the channel its result is sent to
pub struct BlockTask {
    pub block: Block,
    reply: BlockResultSender,
}

impl BlockTask {
    /// A task and the receiver its result will arrive on
    pub fn new(block: Block) -> (Self, BlockResultReceiver) {
        let (sender, receiver) = crossbeam_channel::bounded(1);
        (Self { block, reply: sender }, BlockResultReceiver { receiver })
    }

    pub fn hash(&self) -> Hash {
        self.block.hash()
    }

    /// Sends the result. The submitter may have stopped listening, which is fine.
    pub fn reply(self, result: BlockProcessResult<BlockStatus>) {
        let _ = self.reply.send(result);
    }
}

/// Receiving end of a submitted block's result
pub struct BlockResultReceiver {
    receiver: Receiver<BlockProcessResult<BlockStatus>>,
}

impl BlockResultReceiver {
    /// Blocks until the result arrives. A task dropped without an answer reads as a shutdown.
    pub fn recv(&self) -> BlockProcessResult<BlockStatus> {
        self.receiver.recv().unwrap_or(Err(ProtocolError::ShuttingDown.into()))
    }

    /// Like [`Self::recv`], giving up after `timeout`
    pub fn recv_timeout(&self, timeout: Duration) -> Option<BlockProcessResult<BlockStatus>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(ProtocolError::ShuttingDown.into())),
        }
    }
}

struct PendingBlock {
    task: BlockTask,
    missing: HashSet<Hash>,
    deadline: Instant,
}

#[derive(Default)]
struct DepsState {
    pending: HashMap<Hash, PendingBlock>,
    /// Parent hash to the pending blocks waiting on it
    waiting_on: HashMap<Hash, Vec<Hash>>,
    shutting_down: bool,
}

/// Dependency manager holding blocks until their parents are committed
pub struct DepsManager {
    state: Mutex<DepsState>,
    timeout: Duration,
    max_pending: usize,
}

impl DepsManager {
    pub fn new(timeout: Duration, max_pending: usize) -> Self {
        Self { state: Mutex::new(DepsState::default()), timeout, max_pending }
    }

    /// Holds `task` until `missing` are all committed. `is_known` is re-checked
    /// under the gate lock, so a parent committed since the task failed is not
    /// waited on. Returns the task when nothing is missing anymore.
    pub fn add_pending(&self, task: BlockTask, missing: Vec<Hash>, is_known: impl Fn(Hash) -> bool) -> Option<BlockTask> {
        let mut state = self.state.lock();
        let hash = task.hash();
        if state.shutting_down {
            task.reply(Err(ProtocolError::ShuttingDown.into()));
            return None;
        }
        if state.pending.contains_key(&hash) {
            task.reply(Err(RuleError::DuplicateBlock(hash).into()));
            return None;
        }

        let missing: HashSet<Hash> = missing.into_iter().filter(|parent| !is_known(*parent)).collect();
        if missing.is_empty() {
            return Some(task);
        }
        if state.pending.len() >= self.max_pending {
            warn!("Dropping block {}: {} blocks already wait for parents", hash, state.pending.len());
            task.reply(Err(ProtocolError::PendingLimitReached(self.max_pending).into()));
            return None;
        }

        debug!("Block {} waits for {} missing parents", hash, missing.len());
        for parent in missing.iter() {
            state.waiting_on.entry(*parent).or_default().push(hash);
        }
        state.pending.insert(hash, PendingBlock { task, missing, deadline: Instant::now() + self.timeout });
        None
    }

    /// Marks `parent` as committed and returns the blocks it was the last missing parent of
    pub fn resolve(&self, parent: Hash) -> Vec<BlockTask> {
        let mut state = self.state.lock();
        let Some(waiting) = state.waiting_on.remove(&parent) else {
            return Vec::new();
        };
        let mut ready = Vec::new();
        for hash in waiting {
            let Some(pending) = state.pending.get_mut(&hash) else {
                continue;
            };
            pending.missing.remove(&parent);
            if pending.missing.is_empty() {
                if let Some(pending) = state.pending.remove(&hash) {
                    trace!("Block {} has all of its parents", hash);
                    ready.push(pending.task);
                }
            }
        }
        ready
    }

    /// Fails every block whose deadline passed. Returns how many expired.
    pub fn expire(&self, now: Instant) -> usize {
        let mut state = self.state.lock();
        let expired: Vec<Hash> = state.pending.iter().filter(|(_, pending)| pending.deadline <= now).map(|(hash, _)| *hash).collect();
        let timeout_ms = self.timeout.as_millis() as u64;
        for hash in expired.iter() {
            if let Some(pending) = Self::take(&mut state, *hash) {
                debug!("Block {} timed out waiting for {} parents", hash, pending.missing.len());
                pending.task.reply(Err(ProtocolError::MissingParentsTimeout(*hash, timeout_ms).into()));
            }
        }
        expired.len()
    }

    /// Abandons a held block. Returns whether it was held.
    pub fn cancel(&self, hash: Hash) -> bool {
        let mut state = self.state.lock();
        match Self::take(&mut state, hash) {
            Some(pending) => {
                pending.task.reply(Err(ProtocolError::Cancelled(hash).into()));
                true
            }
            None => false,
        }
    }

    /// Refuses new blocks and fails every held one
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        state.shutting_down = true;
        state.waiting_on.clear();
        for (_, pending) in state.pending.drain() {
            pending.task.reply(Err(ProtocolError::ShuttingDown.into()));
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_pending(&self, hash: Hash) -> bool {
        self.state.lock().pending.contains_key(&hash)
    }

    fn take(state: &mut DepsState, hash: Hash) -> Option<PendingBlock> {
        let pending = state.pending.remove(&hash)?;
        for parent in pending.missing.iter() {
            if let Some(waiting) = state.waiting_on.get_mut(parent) {
                waiting.retain(|child| *child != hash);
                if waiting.is_empty() {
                    state.waiting_on.remove(parent);
                }
            }
        }
        Some(pending)
    }
}
