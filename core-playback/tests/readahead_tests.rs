//! Read-ahead worker behaviour against real files

use core_playback::{ReadaheadConfig, ReadaheadScheduler};
use std::io::Write;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::{NamedTempFile, TempDir};

const CHUNK: usize = 4096;

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

fn file_of(len: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&vec![0xAB; len]).unwrap();
    file.flush().unwrap();
    file
}

fn config(chunk_delay_ms: u64, debounce_ms: u64) -> ReadaheadConfig {
    ReadaheadConfig {
        chunk_size: CHUNK,
        chunk_delay: Duration::from_millis(chunk_delay_ms),
        debounce: Duration::from_millis(debounce_ms),
    }
}

#[test]
fn reads_whole_file_then_stops() {
    let file = file_of(CHUNK * 2 + 1000);
    let scheduler = ReadaheadScheduler::new(config(1, 1)).unwrap();

    scheduler.set_source(file.path());

    assert!(wait_until(Duration::from_secs(5), || {
        scheduler.stats().bytes == (CHUNK * 2 + 1000) as u64
    }));
    let stats = scheduler.stats();
    assert_eq!(stats.opens, 1);
    assert_eq!(stats.chunks, 3);
    assert_eq!(stats.last_opened.as_deref(), Some(file.path()));
    assert!(wait_until(Duration::from_secs(1), || !scheduler.handle().has_pending()));
}

#[test]
fn debounce_collapses_repeated_requests() {
    let file = file_of(CHUNK / 2);
    let scheduler = ReadaheadScheduler::new(config(1, 100)).unwrap();

    for _ in 0..5 {
        scheduler.set_source(file.path());
    }

    assert!(wait_until(Duration::from_secs(5), || scheduler.stats().chunks == 1));
    thread::sleep(Duration::from_millis(150));
    assert_eq!(scheduler.stats().opens, 1);
}

#[test]
fn replaced_source_is_never_read() {
    let a = file_of(CHUNK * 4);
    let b = file_of(CHUNK / 2);
    let scheduler = ReadaheadScheduler::new(config(1, 100)).unwrap();

    scheduler.set_source(a.path());
    scheduler.set_source(b.path());

    assert!(wait_until(Duration::from_secs(5), || scheduler.stats().chunks == 1));
    let stats = scheduler.stats();
    assert_eq!(stats.opens, 1);
    assert_eq!(stats.bytes, (CHUNK / 2) as u64);
    assert_eq!(stats.last_opened.as_deref(), Some(b.path()));
}

#[test]
fn pause_then_same_source_resumes_without_reopening() {
    let len = CHUNK * 16;
    let file = file_of(len);
    let scheduler = ReadaheadScheduler::new(config(40, 1)).unwrap();

    scheduler.set_source(file.path());
    assert!(wait_until(Duration::from_secs(5), || scheduler.stats().chunks >= 1));
    scheduler.pause();

    // At most an in-flight read completes after the pause.
    let paused_at = scheduler.stats().bytes;
    thread::sleep(Duration::from_millis(150));
    assert!(scheduler.stats().bytes <= paused_at + CHUNK as u64);
    assert!(scheduler.stats().bytes < len as u64);

    scheduler.set_source(file.path());
    assert!(wait_until(Duration::from_secs(10), || {
        scheduler.stats().bytes == len as u64
    }));
    assert_eq!(scheduler.stats().opens, 1);
}

#[test]
fn resuming_the_open_file_skips_debounce() {
    let file = file_of(CHUNK * 64);
    let scheduler = ReadaheadScheduler::new(config(50, 1000)).unwrap();

    scheduler.set_source(file.path());
    assert!(wait_until(Duration::from_secs(5), || scheduler.stats().chunks >= 1));
    scheduler.pause();
    thread::sleep(Duration::from_millis(100));
    let paused_at = scheduler.stats().chunks;

    scheduler.set_source(file.path());
    assert!(wait_until(Duration::from_millis(500), || {
        scheduler.stats().chunks > paused_at
    }));
    assert_eq!(scheduler.stats().opens, 1);
}

#[test]
fn missing_file_is_skipped_quietly() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("gone.ogg");
    let scheduler = ReadaheadScheduler::new(config(1, 1)).unwrap();

    scheduler.set_source(&missing);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(scheduler.stats().opens, 0);

    let file = file_of(100);
    scheduler.set_source(file.path());
    assert!(wait_until(Duration::from_secs(5), || scheduler.stats().bytes == 100));
    assert_eq!(scheduler.stats().last_opened.as_deref(), Some(file.path()));
}

#[test]
fn handles_share_one_worker() {
    let file = file_of(10);
    let scheduler = ReadaheadScheduler::new(config(1, 1)).unwrap();
    let handle = scheduler.handle();

    let worker = thread::spawn(move || handle.set_source(Path::new("/nonexistent/first")));
    worker.join().unwrap();
    scheduler.handle().set_source(file.path());

    assert!(wait_until(Duration::from_secs(5), || scheduler.stats().bytes == 10));
    drop(scheduler);
}
