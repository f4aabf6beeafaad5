//! Periodic progress delivered to the manager over the progress channel.

mod common;

use common::{options, TEST_DATA_1, TEST_DATA_2};
use dfm_core::{DownloadFile, DownloadId, ProgressSink};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::test]
async fn update_after_three_quarters_of_a_second_reports_bytes_and_hash_state() {
    let dir = tempfile::tempdir().unwrap();
    let (sink, mut rx) = ProgressSink::channel(16);
    let file = DownloadFile::new(DownloadId(23), options(Duration::from_millis(500)), Some(sink));
    let started = Instant::now();
    file.initialize(&dir.path().join("update.part")).unwrap();

    file.append_data(TEST_DATA_1.as_bytes()).unwrap();
    file.append_data(TEST_DATA_2.as_bytes()).unwrap();
    let n = (TEST_DATA_1.len() + TEST_DATA_2.len()) as u64;

    tokio::time::sleep(Duration::from_millis(750)).await;

    let mut last = None;
    while let Ok(u) = rx.try_recv() {
        last = Some(u);
    }
    let update = last.expect("one update within 750ms at a 500ms interval");
    let elapsed = started.elapsed().as_secs_f64();

    assert_eq!(update.id, DownloadId(23));
    assert_eq!(update.bytes_so_far, n);
    assert_eq!(update.hash_state, file.hash_state());
    assert!(update.bytes_per_sec > 0.0);
    // Measured over one interval: no shorter than 500ms, no longer than the wait.
    assert!(update.bytes_per_sec >= n as f64 / elapsed);
    assert!(update.bytes_per_sec <= n as f64 / 0.5 + 1e-6);

    file.finish().unwrap();
}

#[tokio::test]
async fn idle_download_sends_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let (sink, mut rx) = ProgressSink::channel(16);
    let file = DownloadFile::new(DownloadId(5), options(Duration::from_millis(20)), Some(sink));
    file.initialize(&dir.path().join("idle.part")).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rx.try_recv().is_err());
    file.finish().unwrap();
}

#[tokio::test]
async fn dropped_manager_does_not_disturb_producer() {
    let dir = tempfile::tempdir().unwrap();
    let (sink, rx) = ProgressSink::channel(1);
    drop(rx);
    let file = DownloadFile::new(DownloadId(6), options(Duration::from_millis(10)), Some(sink));
    file.initialize(&dir.path().join("orphan.part")).unwrap();
    for _ in 0..20 {
        file.append_data(b"chunk").unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    file.finish().unwrap();
    assert_eq!(file.bytes_so_far(), 100);
}

#[tokio::test]
async fn producer_on_blocking_thread_manager_on_runtime() {
    let dir = tempfile::tempdir().unwrap();
    let (sink, mut rx) = ProgressSink::channel(64);
    let file = Arc::new(DownloadFile::new(
        DownloadId(7),
        options(Duration::from_millis(10)),
        Some(sink),
    ));
    file.initialize(&dir.path().join("split.part")).unwrap();

    let producer = Arc::clone(&file);
    let writer = tokio::task::spawn_blocking(move || {
        for _ in 0..50 {
            producer.append_data(&[1u8; 4096]).unwrap();
            std::thread::sleep(Duration::from_millis(1));
        }
        producer.finish().unwrap()
    });

    let mut seen = Vec::new();
    let digest = writer.await.unwrap();
    while let Ok(u) = rx.try_recv() {
        seen.push(u.bytes_so_far);
    }
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "byte counts never decrease");
    assert!(seen.iter().all(|b| *b <= 50 * 4096));
    assert_eq!(file.get_hash().unwrap(), digest);
}
