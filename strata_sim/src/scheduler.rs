// Prioritized, deduplicating chunk generation scheduler with a worker pool.
//
// Callers ask for chunks with `request_chunk` (or `request_radius` to stream
// a disc around a player) and get back a `ChunkTicket` that resolves when the
// chunk is generated or has failed for good. A fixed pool of named worker
// threads pulls requests from a shared priority queue and runs the
// `TerrainGenerator` against the world.
//
// Per-coordinate state machine:
//
//   Unrequested ──request──▶ Queued ──dequeue──▶ InProgress ──ok──▶ Generated
//                              ▲                     │
//                              └──── retry ◀── err ──┤
//                                                    └─ attempts spent ─▶ Failed
//
// A request for a `Generated` chunk resolves immediately; for a `Queued` or
// `InProgress` chunk it attaches another waiter to the existing job; for an
// `Unrequested` or `Failed` chunk it enqueues a fresh job with a full retry
// budget. A coordinate is therefore in flight at most once, which makes each
// chunk single-writer without any locking in the world itself.
//
// Queue order: priority hint first (Urgent > High > Normal > Low), then
// squared distance to the reference chunk, then x, z, then insertion
// sequence. Keys are computed when an entry is pushed. Moving the reference
// marks the queue stale only once it has drifted `reprioritize_distance`
// chunks from where the queue was last ranked; the next dequeue then re-keys
// every entry and rebuilds the heap in one O(n) pass. Smaller drifts keep the
// old order, so ordering is a priority and not a strict guarantee.
//
// Stale heap entries (a chunk bumped to a higher priority, or cancelled by
// shutdown) are left in place and skipped on pop: an entry is live only if
// its sequence number matches the record's `queued_seq`.
//
// Generation runs outside the lock. Generator panics are caught by
// `run_generator` and treated as ordinary failures.
//
// Shutdown (explicit or on `Drop`) stops accepting requests, resolves every
// queued waiter with `ScheduleError::ShutDown`, lets in-progress jobs
// finish, and joins the workers.
//
// See also: `ordering.rs` for the distance key, `generator.rs` for the
// generator contract, `world.rs` for `ChunkedWorld`.

use crate::config::SchedulerConfig;
use crate::error::{GenerationError, ScheduleError};
use crate::generator::{GenerationRegion, TerrainGenerator, run_generator};
use crate::ordering::{ChunkDistanceOrder, ChunkKey};
use crate::types::{ChunkCoord, Priority};
use crate::world::ChunkedWorld;
use log::{debug, info, warn};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Outcome delivered to every waiter on a chunk.
pub type ChunkResult = Result<(), ScheduleError>;

/// Lifecycle state of one chunk coordinate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChunkStatus {
    #[default]
    Unrequested,
    Queued,
    InProgress,
    Generated,
    /// Retry budget spent. A new request resets the chunk to `Queued`.
    Failed,
}

/// Running counters, for logging and tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub requests: u64,
    /// Requests that attached to an existing job or an already generated
    /// chunk instead of enqueuing.
    pub deduplicated: u64,
    pub generated: u64,
    pub retries: u64,
    pub permanent_failures: u64,
    /// Full queue re-rankings after the reference moved.
    pub rekeys: u64,
}

// ---------------------------------------------------------------------------
// Tickets
// ---------------------------------------------------------------------------

enum TicketState {
    Ready(ChunkResult),
    Pending(Receiver<ChunkResult>),
}

/// Completion handle for one chunk request.
pub struct ChunkTicket {
    coord: ChunkCoord,
    state: TicketState,
}

impl ChunkTicket {
    fn ready(coord: ChunkCoord, result: ChunkResult) -> Self {
        Self {
            coord,
            state: TicketState::Ready(result),
        }
    }

    fn pending(coord: ChunkCoord, receiver: Receiver<ChunkResult>) -> Self {
        Self {
            coord,
            state: TicketState::Pending(receiver),
        }
    }

    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// Block until the chunk resolves.
    pub fn wait(self) -> ChunkResult {
        match self.state {
            TicketState::Ready(result) => result,
            // A dropped sender means the scheduler went away without
            // resolving us.
            TicketState::Pending(receiver) => {
                receiver.recv().unwrap_or(Err(ScheduleError::ShutDown))
            }
        }
    }

    /// Block for at most `timeout`. `None` if the chunk is still pending.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<ChunkResult> {
        let received = match &self.state {
            TicketState::Ready(result) => return Some(result.clone()),
            TicketState::Pending(receiver) => match receiver.recv_timeout(timeout) {
                Ok(result) => result,
                Err(RecvTimeoutError::Timeout) => return None,
                Err(RecvTimeoutError::Disconnected) => Err(ScheduleError::ShutDown),
            },
        };
        self.state = TicketState::Ready(received.clone());
        Some(received)
    }

    /// Non-blocking poll. `None` if the chunk is still pending.
    pub fn try_result(&mut self) -> Option<ChunkResult> {
        let received = match &self.state {
            TicketState::Ready(result) => return Some(result.clone()),
            TicketState::Pending(receiver) => match receiver.try_recv() {
                Ok(result) => result,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => Err(ScheduleError::ShutDown),
            },
        };
        self.state = TicketState::Ready(received.clone());
        Some(received)
    }
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct QueueEntry {
    priority: Priority,
    key: ChunkKey,
    seq: u64,
    coord: ChunkCoord,
    region: GenerationRegion,
}

// Max-heap: higher priority, then smaller key, then earlier sequence.
impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.key.cmp(&self.key))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct ChunkRecord {
    status: ChunkStatus,
    priority: Priority,
    /// Attempts made in the current retry budget.
    attempts: u32,
    /// Sequence number of the live heap entry while `Queued`.
    queued_seq: u64,
    waiters: Vec<Sender<ChunkResult>>,
}

impl ChunkRecord {
    fn resolve(&mut self, result: &ChunkResult) {
        for waiter in self.waiters.drain(..) {
            // The requester may have dropped its ticket.
            let _ = waiter.send(result.clone());
        }
    }
}

struct SchedulerState {
    queue: BinaryHeap<QueueEntry>,
    chunks: FxHashMap<ChunkCoord, ChunkRecord>,
    order: ChunkDistanceOrder,
    /// Reference the queued keys were computed against.
    ranked_reference: ChunkCoord,
    stale: bool,
    next_seq: u64,
    shutting_down: bool,
    stats: SchedulerStats,
}

impl SchedulerState {
    fn new() -> Self {
        Self {
            queue: BinaryHeap::new(),
            chunks: FxHashMap::default(),
            order: ChunkDistanceOrder::default(),
            ranked_reference: ChunkCoord::default(),
            stale: false,
            next_seq: 0,
            shutting_down: false,
            stats: SchedulerStats::default(),
        }
    }

    fn set_reference(&mut self, reference: ChunkCoord, threshold: u32) {
        self.order.set_reference(reference);
        let threshold = i64::from(threshold);
        let drift = reference.distance_sq(self.ranked_reference);
        if drift > 0 && drift >= threshold * threshold {
            self.stale = true;
        }
    }

    /// Push a live entry for `coord`, which must have a record.
    fn enqueue(&mut self, coord: ChunkCoord, region: GenerationRegion) {
        let seq = self.next_seq;
        self.next_seq += 1;
        let key = self.order.priority_key(coord);
        let Some(record) = self.chunks.get_mut(&coord) else {
            return;
        };
        record.status = ChunkStatus::Queued;
        record.queued_seq = seq;
        self.queue.push(QueueEntry {
            priority: record.priority,
            key,
            seq,
            coord,
            region,
        });
    }

    fn is_live(&self, entry: &QueueEntry) -> bool {
        self.chunks
            .get(&entry.coord)
            .is_some_and(|r| r.status == ChunkStatus::Queued && r.queued_seq == entry.seq)
    }

    /// Recompute every key against the current reference and rebuild the
    /// heap, dropping dead entries on the way.
    fn rekey(&mut self) {
        let entries = std::mem::take(&mut self.queue).into_vec();
        let mut live = Vec::with_capacity(entries.len());
        for mut entry in entries {
            if self.is_live(&entry) {
                entry.key = self.order.priority_key(entry.coord);
                live.push(entry);
            }
        }
        debug!(
            "re-ranked {} queued chunks around {}",
            live.len(),
            self.order.reference
        );
        self.queue = BinaryHeap::from(live);
        self.ranked_reference = self.order.reference;
        self.stale = false;
        self.stats.rekeys += 1;
    }

    fn queued_len(&self) -> usize {
        self.chunks
            .values()
            .filter(|r| r.status == ChunkStatus::Queued)
            .count()
    }
}

struct Shared {
    state: Mutex<SchedulerState>,
    work_ready: Condvar,
    world: Arc<dyn ChunkedWorld>,
    generator: Arc<dyn TerrainGenerator>,
    config: SchedulerConfig,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Job {
    coord: ChunkCoord,
    region: GenerationRegion,
    attempt: u32,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Owns the worker pool. Dropping it shuts the pool down.
pub struct ChunkScheduler {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl ChunkScheduler {
    /// Spawn `config.worker_count` workers (at least one) generating into
    /// `world`.
    pub fn new(
        world: Arc<dyn ChunkedWorld>,
        generator: Arc<dyn TerrainGenerator>,
        config: &SchedulerConfig,
    ) -> Result<Self, ScheduleError> {
        let shared = Arc::new(Shared {
            state: Mutex::new(SchedulerState::new()),
            work_ready: Condvar::new(),
            world,
            generator,
            config: config.clone(),
        });
        let mut scheduler = Self {
            shared,
            workers: Vec::new(),
        };
        for id in 0..config.worker_count.max(1) {
            let shared = Arc::clone(&scheduler.shared);
            let handle = thread::Builder::new()
                .name(format!("chunk-worker-{id}"))
                .spawn(move || worker_loop(&shared, id))
                .map_err(|e| ScheduleError::WorkerSpawn {
                    reason: e.to_string(),
                })?;
            scheduler.workers.push(handle);
        }
        info!(
            "chunk scheduler started with {} workers",
            scheduler.workers.len()
        );
        Ok(scheduler)
    }

    /// Request generation of `coord`, ranking it relative to `reference`.
    ///
    /// Malformed regions are rejected here, before anything is queued.
    pub fn request_chunk(
        &self,
        coord: ChunkCoord,
        reference: ChunkCoord,
        priority_hint: Option<Priority>,
    ) -> Result<ChunkTicket, ScheduleError> {
        let world = &self.shared.world;
        let region = GenerationRegion::for_chunk(
            coord,
            world.chunk_size(),
            world.height(),
            self.shared.config.spacing,
        )?;
        let priority = priority_hint.unwrap_or_default();

        let mut state = self.shared.lock();
        if state.shutting_down {
            return Err(ScheduleError::ShutDown);
        }
        state.set_reference(reference, self.shared.config.reprioritize_distance);
        state.stats.requests += 1;

        let record = state.chunks.entry(coord).or_default();
        match record.status {
            ChunkStatus::Generated => {
                state.stats.deduplicated += 1;
                Ok(ChunkTicket::ready(coord, Ok(())))
            }
            ChunkStatus::Queued | ChunkStatus::InProgress => {
                let (tx, rx) = mpsc::channel();
                record.waiters.push(tx);
                let bump = record.status == ChunkStatus::Queued && priority > record.priority;
                if bump {
                    record.priority = priority;
                    state.enqueue(coord, region);
                    self.shared.work_ready.notify_one();
                }
                state.stats.deduplicated += 1;
                Ok(ChunkTicket::pending(coord, rx))
            }
            ChunkStatus::Unrequested | ChunkStatus::Failed => {
                let (tx, rx) = mpsc::channel();
                record.waiters.push(tx);
                record.priority = priority;
                record.attempts = 0;
                state.enqueue(coord, region);
                self.shared.work_ready.notify_one();
                debug!("chunk {coord} queued at {priority:?}");
                Ok(ChunkTicket::pending(coord, rx))
            }
        }
    }

    /// Request every chunk whose center lies within `radius` chunks of
    /// `center`, nearest first. Fails on the first rejected chunk.
    pub fn request_radius(
        &self,
        center: ChunkCoord,
        radius: u32,
        priority_hint: Option<Priority>,
    ) -> Result<Vec<ChunkTicket>, ScheduleError> {
        let r = i32::try_from(radius).map_err(|_| ScheduleError::InvalidRegion {
            reason: format!("radius {radius} too large"),
        })?;
        let limit = i64::from(r) * i64::from(r);
        let mut coords = Vec::new();
        for dz in -r..=r {
            for dx in -r..=r {
                if i64::from(dx) * i64::from(dx) + i64::from(dz) * i64::from(dz) > limit {
                    continue;
                }
                if let (Some(x), Some(z)) = (center.x.checked_add(dx), center.z.checked_add(dz)) {
                    coords.push(ChunkCoord::new(x, z));
                }
            }
        }
        ChunkDistanceOrder::new(center).sort_nearest_first(&mut coords);
        coords
            .into_iter()
            .map(|coord| self.request_chunk(coord, center, priority_hint))
            .collect()
    }

    /// Move the point of interest. The queue is re-ranked lazily once the
    /// reference has drifted far enough.
    pub fn set_reference(&self, reference: ChunkCoord) {
        let mut state = self.shared.lock();
        state.set_reference(reference, self.shared.config.reprioritize_distance);
    }

    pub fn status(&self, coord: ChunkCoord) -> ChunkStatus {
        self.shared
            .lock()
            .chunks
            .get(&coord)
            .map_or(ChunkStatus::Unrequested, |r| r.status)
    }

    /// Chunks waiting for a worker.
    pub fn queued_len(&self) -> usize {
        self.shared.lock().queued_len()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.shared.lock().stats
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Stop accepting requests and cancel everything still queued. Workers
    /// exit after their current job.
    fn signal_shutdown(&self) {
        let mut state = self.shared.lock();
        if state.shutting_down {
            return;
        }
        state.shutting_down = true;
        state.queue.clear();
        let mut cancelled = 0;
        for record in state.chunks.values_mut() {
            if record.status == ChunkStatus::Queued {
                record.status = ChunkStatus::Unrequested;
                record.resolve(&Err(ScheduleError::ShutDown));
                cancelled += 1;
            }
        }
        drop(state);
        self.shared.work_ready.notify_all();
        info!("scheduler stopping, {cancelled} queued chunks cancelled");
    }

    /// Cancel queued work, wait for in-progress jobs, and join the workers.
    /// Idempotent.
    pub fn shutdown(&mut self) {
        self.signal_shutdown();
        for handle in self.workers.drain(..) {
            let name = handle.thread().name().unwrap_or("chunk-worker").to_string();
            if handle.join().is_err() {
                warn!("{name} exited by panic");
            }
        }
    }
}

impl Drop for ChunkScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ---------------------------------------------------------------------------
// Workers
// ---------------------------------------------------------------------------

fn worker_loop(shared: &Shared, id: usize) {
    debug!("chunk worker {id} started");
    while let Some(job) = next_job(shared) {
        shared.world.mark_pending(job.coord);
        let result = run_generator(
            shared.generator.as_ref(),
            &job.region,
            shared.world.as_modifier(),
        );
        if result.is_ok() {
            // Publish blocks before any waiter can observe `Generated`.
            shared.world.mark_generated(job.coord);
        }
        finish_job(shared, job, result);
    }
    debug!("chunk worker {id} stopped");
}

/// Block until a live entry is available or the scheduler shuts down.
fn next_job(shared: &Shared) -> Option<Job> {
    let mut state = shared.lock();
    loop {
        if state.shutting_down {
            return None;
        }
        if state.stale {
            state.rekey();
        }
        while let Some(entry) = state.queue.pop() {
            if !state.is_live(&entry) {
                continue;
            }
            let Some(record) = state.chunks.get_mut(&entry.coord) else {
                continue;
            };
            record.status = ChunkStatus::InProgress;
            record.attempts += 1;
            return Some(Job {
                coord: entry.coord,
                region: entry.region,
                attempt: record.attempts,
            });
        }
        state = shared
            .work_ready
            .wait(state)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

fn finish_job(shared: &Shared, job: Job, result: Result<(), GenerationError>) {
    let mut state = shared.lock();
    let shutting_down = state.shutting_down;
    let max_attempts = shared.config.max_attempts.max(1);
    let Some(record) = state.chunks.get_mut(&job.coord) else {
        return;
    };
    match result {
        Ok(()) => {
            record.status = ChunkStatus::Generated;
            record.resolve(&Ok(()));
            state.stats.generated += 1;
            debug!("chunk {} generated on attempt {}", job.coord, job.attempt);
        }
        Err(error) if job.attempt < max_attempts && !shutting_down => {
            warn!(
                "chunk {} attempt {}/{} failed, retrying: {error}",
                job.coord, job.attempt, max_attempts
            );
            state.enqueue(job.coord, job.region);
            state.stats.retries += 1;
            shared.work_ready.notify_one();
        }
        Err(_) if shutting_down => {
            record.status = ChunkStatus::Unrequested;
            record.resolve(&Err(ScheduleError::ShutDown));
        }
        Err(error) => {
            warn!(
                "chunk {} failed permanently after {} attempts: {error}",
                job.coord, job.attempt
            );
            record.status = ChunkStatus::Failed;
            record.resolve(&Err(ScheduleError::ChunkPermanentlyFailed {
                coord: job.coord,
                attempts: job.attempt,
                last_error: error,
            }));
            state.stats.permanent_failures += 1;
        }
    }
}
