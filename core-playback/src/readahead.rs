//! # Read-Ahead Scheduler
//!
//! Prefetches the file that is about to play so slow or sleeping storage is
//! already spun up when the native player needs it.
//!
//! ## Model
//!
//! A single named worker thread drains a time-ordered queue of steps. A step
//! is either "open this path" or "read the next chunk". Reading a chunk
//! schedules the following one after [`ReadaheadConfig::chunk_delay`], which
//! paces the worker well below foreground I/O.
//!
//! Every [`set_source`](ReadaheadHandle::set_source) or
//! [`pause`](ReadaheadHandle::pause) bumps a generation counter and drops all
//! undispatched steps. A step that is already executing is not interrupted,
//! but it will not schedule a successor once its generation is stale.
//!
//! The worker keeps the last opened file across a pause, so asking for the
//! same path again resumes where it left off instead of reopening. A resume
//! skips the debounce delay.
//!
//! ## Failure handling
//!
//! Read-ahead is advisory. Missing files, short reads, EOF and I/O errors end
//! the current loop and are logged; nothing is ever reported to the caller.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};

use crate::config::ReadaheadConfig;
use crate::error::{PlaybackError, Result};

const WORKER_NAME: &str = "readahead";

// ============================================================================
// Queue
// ============================================================================

#[derive(Debug)]
enum Step {
    Open(PathBuf),
    ReadChunk,
}

#[derive(Debug)]
struct Scheduled {
    due: Instant,
    seq: u64,
    generation: u64,
    step: Step,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due
            .cmp(&other.due)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

#[derive(Default)]
struct Queue {
    heap: BinaryHeap<Reverse<Scheduled>>,
    generation: u64,
    seq: u64,
    shutdown: bool,
    /// File the worker currently holds open
    open_path: Option<PathBuf>,
}

impl Queue {
    fn push(&mut self, due: Instant, generation: u64, step: Step) {
        self.seq += 1;
        self.heap.push(Reverse(Scheduled {
            due,
            seq: self.seq,
            generation,
            step,
        }));
    }

    /// Invalidate everything scheduled so far and return the new generation.
    fn cancel(&mut self) -> u64 {
        self.generation += 1;
        self.heap.clear();
        self.generation
    }
}

// ============================================================================
// Statistics
// ============================================================================

#[derive(Default)]
struct Counters {
    opens: AtomicU64,
    chunks: AtomicU64,
    bytes: AtomicU64,
    last_opened: Mutex<Option<PathBuf>>,
}

/// Point-in-time view of the worker's activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadaheadStats {
    /// Files opened (resumes do not count)
    pub opens: u64,
    /// Read calls issued
    pub chunks: u64,
    /// Bytes read in total
    pub bytes: u64,
    /// Most recently opened path
    pub last_opened: Option<PathBuf>,
}

struct Shared {
    queue: Mutex<Queue>,
    wakeup: Condvar,
    counters: Counters,
    config: ReadaheadConfig,
}

// ============================================================================
// Public API
// ============================================================================

/// Cheap, clonable handle for submitting read-ahead requests.
#[derive(Clone)]
pub struct ReadaheadHandle {
    shared: Arc<Shared>,
}

impl ReadaheadHandle {
    /// Start warming `path` after the debounce delay, cancelling any pending
    /// work. Re-issuing the path that is already open resumes it at once.
    pub fn set_source(&self, path: &Path) {
        let mut queue = self.shared.queue.lock();
        if queue.shutdown {
            return;
        }
        let generation = queue.cancel();
        let due = if queue.open_path.as_deref() == Some(path) {
            Instant::now()
        } else {
            Instant::now() + self.shared.config.debounce
        };
        queue.push(due, generation, Step::Open(path.to_path_buf()));
        drop(queue);

        trace!(file = ?path.file_name(), "Read-ahead requested");
        self.shared.wakeup.notify_one();
    }

    /// Cancel pending work. The open file stays open.
    pub fn pause(&self) {
        self.shared.queue.lock().cancel();
        self.shared.wakeup.notify_one();
    }

    pub fn stats(&self) -> ReadaheadStats {
        let counters = &self.shared.counters;
        ReadaheadStats {
            opens: counters.opens.load(AtomicOrdering::Relaxed),
            chunks: counters.chunks.load(AtomicOrdering::Relaxed),
            bytes: counters.bytes.load(AtomicOrdering::Relaxed),
            last_opened: counters.last_opened.lock().clone(),
        }
    }

    /// Whether any step is waiting to run.
    pub fn has_pending(&self) -> bool {
        !self.shared.queue.lock().heap.is_empty()
    }

    pub fn config(&self) -> &ReadaheadConfig {
        &self.shared.config
    }
}

/// Owner of the read-ahead worker thread.
///
/// Dropping the scheduler stops the worker and waits for it to exit.
pub struct ReadaheadScheduler {
    handle: ReadaheadHandle,
    worker: Option<JoinHandle<()>>,
}

impl ReadaheadScheduler {
    /// Validate `config` and start the worker thread.
    ///
    /// # Errors
    ///
    /// - [`PlaybackError::InvalidConfig`] for an invalid configuration
    /// - [`PlaybackError::IoError`] if the thread cannot be spawned
    pub fn new(config: ReadaheadConfig) -> Result<Self> {
        config.validate().map_err(PlaybackError::InvalidConfig)?;

        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue::default()),
            wakeup: Condvar::new(),
            counters: Counters::default(),
            config,
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name(WORKER_NAME.to_string())
            .spawn(move || Worker::new(worker_shared).run())?;

        debug!(
            chunk_size = config.chunk_size,
            chunk_delay_ms = config.chunk_delay.as_millis() as u64,
            debounce_ms = config.debounce.as_millis() as u64,
            "Read-ahead worker started"
        );

        Ok(Self {
            handle: ReadaheadHandle { shared },
            worker: Some(worker),
        })
    }

    pub fn handle(&self) -> ReadaheadHandle {
        self.handle.clone()
    }

    pub fn set_source(&self, path: &Path) {
        self.handle.set_source(path);
    }

    pub fn pause(&self) {
        self.handle.pause();
    }

    pub fn stats(&self) -> ReadaheadStats {
        self.handle.stats()
    }
}

impl Drop for ReadaheadScheduler {
    fn drop(&mut self) {
        {
            let mut queue = self.handle.shared.queue.lock();
            queue.shutdown = true;
            queue.cancel();
        }
        self.handle.shared.wakeup.notify_all();

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Read-ahead worker panicked");
            }
        }
        debug!("Read-ahead worker stopped");
    }
}

// ============================================================================
// Worker
// ============================================================================

struct Worker {
    shared: Arc<Shared>,
    current: Option<(PathBuf, File)>,
    scratch: Vec<u8>,
}

impl Worker {
    fn new(shared: Arc<Shared>) -> Self {
        let scratch = vec![0; shared.config.chunk_size];
        Self {
            shared,
            current: None,
            scratch,
        }
    }

    fn run(mut self) {
        while let Some(scheduled) = self.next_step() {
            let more = match scheduled.step {
                Step::Open(path) => self.open(path) && self.read_chunk(),
                Step::ReadChunk => self.read_chunk(),
            };

            if more {
                let mut queue = self.shared.queue.lock();
                if queue.generation == scheduled.generation && !queue.shutdown {
                    let due = Instant::now() + self.shared.config.chunk_delay;
                    queue.push(due, scheduled.generation, Step::ReadChunk);
                }
            }
        }
    }

    /// Block until a current step is due. `None` on shutdown.
    fn next_step(&self) -> Option<Scheduled> {
        let mut queue = self.shared.queue.lock();
        loop {
            if queue.shutdown {
                return None;
            }

            let due = match queue.heap.peek() {
                None => {
                    self.shared.wakeup.wait(&mut queue);
                    continue;
                }
                Some(Reverse(next)) => next.due,
            };

            if due > Instant::now() {
                self.shared.wakeup.wait_until(&mut queue, due);
                continue;
            }

            if let Some(Reverse(scheduled)) = queue.heap.pop() {
                if scheduled.generation == queue.generation {
                    return Some(scheduled);
                }
            }
        }
    }

    /// Make `path` the current file. Returns `false` if it cannot be read.
    fn open(&mut self, path: PathBuf) -> bool {
        if matches!(&self.current, Some((open, _)) if *open == path) {
            trace!(file = ?path.file_name(), "Read-ahead resumed");
            return true;
        }

        self.close();
        match File::open(&path) {
            Ok(file) => {
                debug!(file = ?path.file_name(), "Read-ahead started");
                let counters = &self.shared.counters;
                counters.opens.fetch_add(1, AtomicOrdering::Relaxed);
                *counters.last_opened.lock() = Some(path.clone());
                self.shared.queue.lock().open_path = Some(path.clone());
                self.current = Some((path, file));
                true
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(file = ?path.file_name(), "Read-ahead source missing");
                false
            }
            Err(e) => {
                warn!(file = ?path.file_name(), error = %e, "Read-ahead open failed");
                false
            }
        }
    }

    /// Read one chunk. Returns `true` if another chunk should follow.
    fn read_chunk(&mut self) -> bool {
        let Some((path, file)) = self.current.as_mut() else {
            return false;
        };

        match file.read(&mut self.scratch) {
            Ok(read) => {
                let counters = &self.shared.counters;
                counters.chunks.fetch_add(1, AtomicOrdering::Relaxed);
                counters.bytes.fetch_add(read as u64, AtomicOrdering::Relaxed);

                if read < self.scratch.len() {
                    debug!(file = ?path.file_name(), "Read-ahead finished");
                    return false;
                }
                true
            }
            Err(e) => {
                warn!(file = ?path.file_name(), error = %e, "Read-ahead read failed");
                self.close();
                false
            }
        }
    }

    fn close(&mut self) {
        if self.current.take().is_some() {
            self.shared.queue.lock().open_path = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn scheduled(due: Instant, seq: u64) -> Reverse<Scheduled> {
        Reverse(Scheduled {
            due,
            seq,
            generation: 0,
            step: Step::ReadChunk,
        })
    }

    #[test]
    fn test_queue_orders_by_due_then_seq() {
        let now = Instant::now();
        let mut heap = BinaryHeap::new();
        heap.push(scheduled(now + Duration::from_millis(5), 1));
        heap.push(scheduled(now, 3));
        heap.push(scheduled(now, 2));

        let order: Vec<u64> = std::iter::from_fn(|| heap.pop().map(|Reverse(s)| s.seq)).collect();
        assert_eq!(order, vec![2, 3, 1]);
    }

    #[test]
    fn test_cancel_bumps_generation_and_drops_steps() {
        let mut queue = Queue::default();
        queue.push(Instant::now(), 0, Step::ReadChunk);
        queue.push(Instant::now(), 0, Step::Open(PathBuf::from("/a")));

        assert_eq!(queue.cancel(), 1);
        assert!(queue.heap.is_empty());
        assert_eq!(queue.seq, 2);
    }

    fn idle_handle() -> ReadaheadHandle {
        ReadaheadHandle {
            shared: Arc::new(Shared {
                queue: Mutex::new(Queue::default()),
                wakeup: Condvar::new(),
                counters: Counters::default(),
                config: ReadaheadConfig {
                    debounce: Duration::from_secs(60),
                    ..ReadaheadConfig::default()
                },
            }),
        }
    }

    fn next_due(handle: &ReadaheadHandle) -> Instant {
        let queue = handle.shared.queue.lock();
        let Some(Reverse(next)) = queue.heap.peek() else {
            panic!("nothing scheduled");
        };
        next.due
    }

    #[test]
    fn test_open_file_resumes_without_debounce() {
        let handle = idle_handle();
        handle.shared.queue.lock().open_path = Some(PathBuf::from("/m/a.flac"));

        handle.set_source(Path::new("/m/a.flac"));
        assert!(next_due(&handle) <= Instant::now());

        handle.set_source(Path::new("/m/b.flac"));
        assert!(next_due(&handle) > Instant::now() + Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ReadaheadConfig {
            chunk_size: 0,
            ..ReadaheadConfig::default()
        };
        assert!(matches!(
            ReadaheadScheduler::new(config),
            Err(PlaybackError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_drop_joins_idle_worker() {
        let scheduler = ReadaheadScheduler::new(ReadaheadConfig::fast()).unwrap();
        scheduler.pause();
        drop(scheduler);
    }
}
