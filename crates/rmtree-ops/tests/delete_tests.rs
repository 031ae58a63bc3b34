//! Integration tests for tree deletion.
//!
//! Counting convention: the root directory itself is counted. A tree with
//! N entries below the root reports N + 1 after a successful deletion.

use std::io;
use std::path::{Path, PathBuf};

use rmtree_core::{DeleteConfig, DeleteError, FsOperation, ProgressCounter};
use rmtree_fs::{FsCall, MemoryFileSystem};
use rmtree_ops::{DeleteEvent, TreeDeleter, start_delete};
use tokio_util::sync::CancellationToken;

/// `/t` = {a.txt, b.txt, sub/c.txt}
fn scenario_tree(fs: &MemoryFileSystem) {
    fs.add_file("/t/a.txt")
        .add_file("/t/b.txt")
        .add_file("/t/sub/c.txt");
}

fn deep_tree(fs: &MemoryFileSystem) -> u64 {
    let mut entries = 0;
    for d in 0..4 {
        for s in 0..3 {
            for f in 0..5 {
                fs.add_file(format!("/t/d{d}/s{s}/f{f}.txt"));
                entries += 1;
            }
            entries += 1;
        }
        fs.add_symlink(format!("/t/d{d}/link"));
        fs.add_dir(format!("/t/d{d}/empty"));
        entries += 3;
    }
    entries
}

fn small_batches() -> DeleteConfig {
    DeleteConfig::default().with_batch_size(2)
}

fn position(calls: &[FsCall], operation: FsOperation, path: &Path) -> Option<usize> {
    calls
        .iter()
        .rposition(|c| c.accepted && c.operation == operation && c.path == path)
}

#[tokio::test]
async fn test_scenario_a_counts_root() {
    let fs = MemoryFileSystem::new();
    scenario_tree(&fs);
    let deleter = TreeDeleter::new(fs.clone());

    deleter
        .delete_tree("/t", CancellationToken::new())
        .await
        .unwrap();

    assert!(!fs.exists("/t"));
    assert!(!fs.exists("/t/sub/c.txt"));
    assert!(fs.exists("/"));
    // a.txt, b.txt, c.txt, sub and t itself
    assert_eq!(deleter.progress().get(), 5);
}

#[tokio::test]
async fn test_counter_matches_entries_under_interleaving() {
    let fs = MemoryFileSystem::with_jitter();
    let entries = deep_tree(&fs);
    let deleter = TreeDeleter::new(fs.clone()).with_config(small_batches());

    deleter
        .delete_tree("/t", CancellationToken::new())
        .await
        .unwrap();

    assert!(!fs.exists("/t"));
    assert_eq!(fs.len(), 1);
    assert_eq!(deleter.progress().get(), entries + 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_multi_threaded_runtime() {
    let fs = MemoryFileSystem::with_jitter();
    let entries = deep_tree(&fs);
    let deleter = TreeDeleter::new(fs.clone()).with_config(small_batches());

    deleter
        .delete_tree("/t", CancellationToken::new())
        .await
        .unwrap();

    assert!(!fs.exists("/t"));
    assert_eq!(deleter.progress().get(), entries + 1);
}

#[tokio::test]
async fn test_directory_removed_after_children_and_exhaustion() {
    let fs = MemoryFileSystem::with_jitter();
    deep_tree(&fs);
    let deleter = TreeDeleter::new(fs.clone()).with_config(small_batches());

    deleter
        .delete_tree("/t", CancellationToken::new())
        .await
        .unwrap();

    let calls = fs.operations();
    let removed_dirs: Vec<&FsCall> = calls
        .iter()
        .filter(|c| c.accepted && c.operation == FsOperation::RemoveDirectory)
        .collect();
    // t, d0..d3, 12 s* directories and 4 empty directories
    assert_eq!(removed_dirs.len(), 21);

    for dir in removed_dirs {
        let removed_at = position(&calls, FsOperation::RemoveDirectory, &dir.path).unwrap();
        let last_fetch = position(&calls, FsOperation::FetchBatch, &dir.path).unwrap();
        assert!(last_fetch < removed_at, "{} removed before exhaustion", dir.path.display());

        for (index, call) in calls.iter().enumerate() {
            let is_descendant = call.path != dir.path && call.path.starts_with(&dir.path);
            let is_removal = matches!(
                call.operation,
                FsOperation::RemoveEntry | FsOperation::RemoveDirectory
            );
            if is_descendant && is_removal {
                assert!(
                    index < removed_at,
                    "{} removed after its parent {}",
                    call.path.display(),
                    dir.path.display()
                );
            }
        }
    }
}

#[tokio::test]
async fn test_each_directory_removed_once() {
    let fs = MemoryFileSystem::with_jitter();
    deep_tree(&fs);
    let deleter = TreeDeleter::new(fs.clone()).with_config(small_batches());

    deleter
        .delete_tree("/t", CancellationToken::new())
        .await
        .unwrap();

    let calls = fs.operations();
    let mut removed: Vec<&PathBuf> = calls
        .iter()
        .filter(|c| c.operation == FsOperation::RemoveDirectory)
        .map(|c| &c.path)
        .collect();
    let total = removed.len();
    removed.sort();
    removed.dedup();
    assert_eq!(removed.len(), total);
}

#[tokio::test]
async fn test_empty_root() {
    let fs = MemoryFileSystem::new();
    fs.add_dir("/t");
    let deleter = TreeDeleter::new(fs.clone());

    deleter
        .delete_tree("/t", CancellationToken::new())
        .await
        .unwrap();

    assert!(!fs.exists("/t"));
    assert_eq!(deleter.progress().get(), 1);
}

#[tokio::test]
async fn test_scenario_b_undeletable_file() {
    let fs = MemoryFileSystem::new();
    scenario_tree(&fs);
    fs.fail_remove("/t/a.txt");
    let deleter = TreeDeleter::new(fs.clone());

    let err = deleter
        .delete_tree("/t", CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        DeleteError::OperationFailed {
            operation,
            ref path,
            ref source,
        } => {
            assert_eq!(operation, FsOperation::RemoveEntry);
            assert_eq!(path, Path::new("/t/a.txt"));
            assert_eq!(source.kind(), io::ErrorKind::PermissionDenied);
        }
        other => panic!("unexpected error: {other}"),
    }
    // Siblings were dispatched concurrently; only the failed entry and the
    // root are known to remain.
    assert!(fs.exists("/t/a.txt"));
    assert!(fs.exists("/t"));
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let fs = MemoryFileSystem::new();
    scenario_tree(&fs);
    let deleter = TreeDeleter::new(fs.clone());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = deleter.delete_tree("/t", cancel).await.unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(deleter.progress().get(), 0);
    assert!(fs.operations().iter().all(|c| !c.accepted));
    assert_eq!(fs.len(), 6);
}

/// `/t` = {a.txt, sub/d{0..4}/e/f{0..9}.txt}; removing a.txt fails.
fn failing_tree(fs: &MemoryFileSystem) {
    fs.add_file("/t/a.txt");
    for d in 0..5 {
        for f in 0..10 {
            fs.add_file(format!("/t/sub/d{d}/e/f{f}.txt"));
        }
    }
    fs.fail_remove("/t/a.txt");
}

async fn drive_runtime() {
    for _ in 0..1000 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_nothing_dispatched_after_failure() {
    let fs = MemoryFileSystem::new();
    failing_tree(&fs);
    let deleter = TreeDeleter::new(fs.clone()).with_config(small_batches());

    let err = deleter
        .delete_tree("/t", CancellationToken::new())
        .await
        .unwrap_err();
    let returned_at = fs.operations().len();
    drive_runtime().await;

    assert_eq!(err.operation(), Some(FsOperation::RemoveEntry));
    assert_eq!(err.path(), Some(Path::new("/t/a.txt")));
    let later = &fs.operations()[returned_at..];
    assert!(
        later.iter().all(|c| !c.accepted),
        "operations accepted after the call failed: {later:?}"
    );
    assert!(fs.exists("/t/sub"));
}

#[tokio::test]
async fn test_counter_frozen_after_failure() {
    let fs = MemoryFileSystem::new();
    failing_tree(&fs);
    let deleter = TreeDeleter::new(fs.clone()).with_config(small_batches());

    deleter
        .delete_tree("/t", CancellationToken::new())
        .await
        .unwrap_err();
    let at_return = deleter.progress().get();

    // Every accepted removal but the failed one completed and was counted.
    let accepted_removals = fs
        .operations()
        .iter()
        .filter(|c| {
            c.accepted
                && matches!(
                    c.operation,
                    FsOperation::RemoveEntry | FsOperation::RemoveDirectory
                )
        })
        .count() as u64;
    assert_eq!(at_return, accepted_removals - 1);

    drive_runtime().await;
    assert_eq!(deleter.progress().get(), at_return);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failure_reported_on_multi_threaded_runtime() {
    let fs = MemoryFileSystem::with_jitter();
    failing_tree(&fs);
    let deleter = TreeDeleter::new(fs.clone()).with_config(small_batches());

    let err = deleter
        .delete_tree("/t", CancellationToken::new())
        .await
        .unwrap_err();

    // Siblings see the cancellation, the caller sees the real failure.
    assert_eq!(err.operation(), Some(FsOperation::RemoveEntry));
    assert_eq!(err.path(), Some(Path::new("/t/a.txt")));
}

#[tokio::test]
async fn test_scenario_c_cancel_mid_enumeration() {
    let fs = MemoryFileSystem::new();
    fs.add_file("/t/a.txt").add_file("/t/b.txt");
    for i in 0..5 {
        fs.add_file(format!("/t/sub/c{i}.txt"));
    }
    let cancel = CancellationToken::new();
    fs.cancel_on_fetch("/t/sub", cancel.clone());
    let deleter = TreeDeleter::new(fs.clone()).with_config(small_batches());

    let err = deleter.delete_tree("/t", cancel.clone()).await.unwrap_err();

    assert!(err.is_cancelled());
    assert!(cancel.is_cancelled());
    let after = fs.operations_after_cancel().unwrap();
    assert!(
        after.iter().all(|c| !c.accepted),
        "operations dispatched after cancellation: {after:?}"
    );
    // The first batch of `sub` was never acted upon.
    assert!(fs.exists("/t/sub/c0.txt"));
    assert!(fs.exists("/t/sub/c1.txt"));
    assert!(fs.exists("/t/sub"));
}

#[tokio::test]
async fn test_close_failure_is_ignored() {
    let fs = MemoryFileSystem::new();
    scenario_tree(&fs);
    fs.fail_close("/t").fail_close("/t/sub");
    let deleter = TreeDeleter::new(fs.clone());

    deleter
        .delete_tree("/t", CancellationToken::new())
        .await
        .unwrap();

    assert!(!fs.exists("/t"));
    assert_eq!(deleter.progress().get(), 5);
}

#[tokio::test]
async fn test_open_failure() {
    let fs = MemoryFileSystem::new();
    scenario_tree(&fs);
    fs.fail_open("/t/sub");
    let deleter = TreeDeleter::new(fs.clone());

    let err = deleter
        .delete_tree("/t", CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.operation(), Some(FsOperation::OpenEnumerator));
    assert_eq!(err.path(), Some(Path::new("/t/sub")));
    assert!(fs.exists("/t/sub/c.txt"));
}

#[tokio::test]
async fn test_fetch_failure() {
    let fs = MemoryFileSystem::new();
    scenario_tree(&fs);
    fs.inject_fault(FsOperation::FetchBatch, "/t", io::ErrorKind::Other);
    let deleter = TreeDeleter::new(fs.clone());

    let err = deleter
        .delete_tree("/t", CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.operation(), Some(FsOperation::FetchBatch));
    assert_eq!(deleter.progress().get(), 0);
    assert_eq!(fs.len(), 6);
}

#[tokio::test]
async fn test_directory_removal_failure() {
    let fs = MemoryFileSystem::new();
    scenario_tree(&fs);
    fs.inject_fault(
        FsOperation::RemoveDirectory,
        "/t/sub",
        io::ErrorKind::PermissionDenied,
    );
    let deleter = TreeDeleter::new(fs.clone());

    let err = deleter
        .delete_tree("/t", CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.operation(), Some(FsOperation::RemoveDirectory));
    assert_eq!(err.path(), Some(Path::new("/t/sub")));
    assert!(fs.exists("/t/sub"));
    assert!(!fs.exists("/t/sub/c.txt"));
}

#[tokio::test]
async fn test_missing_root() {
    let fs = MemoryFileSystem::new();
    let deleter = TreeDeleter::new(fs);

    let err = deleter
        .delete_tree("/nope", CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.operation(), Some(FsOperation::OpenEnumerator));
    assert_eq!(err.io_kind(), Some(io::ErrorKind::NotFound));
}

#[tokio::test]
async fn test_invalid_config_rejected_before_io() {
    let fs = MemoryFileSystem::new();
    scenario_tree(&fs);
    let deleter =
        TreeDeleter::new(fs.clone()).with_config(DeleteConfig::default().with_batch_size(0));

    let err = deleter
        .delete_tree("/t", CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, DeleteError::InvalidConfig { .. }));
    assert!(fs.operations().is_empty());
}

#[tokio::test]
async fn test_shared_counter_accumulates() {
    let fs = MemoryFileSystem::new();
    scenario_tree(&fs);
    fs.add_file("/u/x.txt");
    let counter = ProgressCounter::new();
    let deleter = TreeDeleter::new(fs.clone()).with_progress(counter.clone());

    deleter
        .delete_tree("/t", CancellationToken::new())
        .await
        .unwrap();
    deleter
        .delete_tree("/u", CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(counter.get(), 7);
}

#[tokio::test]
async fn test_background_deletion_events() {
    let fs = MemoryFileSystem::with_jitter();
    scenario_tree(&fs);
    let deleter = TreeDeleter::new(fs.clone())
        .with_config(DeleteConfig::default().with_progress_interval_ms(1));

    let mut rx = start_delete(deleter, PathBuf::from("/t"), CancellationToken::new());

    let mut last_progress = 0;
    let mut outcome = None;
    while let Some(event) = rx.recv().await {
        match event {
            DeleteEvent::Progress(progress) => {
                assert!(progress.entries_deleted >= last_progress);
                last_progress = progress.entries_deleted;
            }
            DeleteEvent::Complete(complete) => outcome = Some(complete),
        }
    }

    let outcome = outcome.unwrap();
    assert!(outcome.is_success());
    assert_eq!(outcome.entries_deleted, 5);
    assert_eq!(outcome.root, PathBuf::from("/t"));
    assert!(!fs.exists("/t"));
}

#[tokio::test]
async fn test_background_elapsed_starts_with_deletion() {
    let fs = MemoryFileSystem::with_jitter();
    deep_tree(&fs);
    let counter = ProgressCounter::new();
    std::thread::sleep(std::time::Duration::from_millis(100));
    let deleter = TreeDeleter::new(fs.clone())
        .with_progress(counter)
        .with_config(small_batches().with_progress_interval_ms(1));

    let mut rx = start_delete(deleter, PathBuf::from("/t"), CancellationToken::new());

    let mut elapsed = Vec::new();
    let mut outcome = None;
    while let Some(event) = rx.recv().await {
        match event {
            DeleteEvent::Progress(progress) => elapsed.push(progress.elapsed),
            DeleteEvent::Complete(complete) => outcome = Some(complete),
        }
    }

    let outcome = outcome.unwrap();
    assert!(outcome.is_success());
    for progress_elapsed in elapsed {
        assert!(progress_elapsed <= outcome.elapsed);
    }
}

#[tokio::test]
async fn test_background_deletion_failure() {
    let fs = MemoryFileSystem::new();
    scenario_tree(&fs);
    fs.fail_remove("/t/sub/c.txt");
    let deleter = TreeDeleter::new(fs);

    let mut rx = start_delete(deleter, PathBuf::from("/t"), CancellationToken::new());

    let mut outcome = None;
    while let Some(event) = rx.recv().await {
        if let DeleteEvent::Complete(complete) = event {
            outcome = Some(complete);
        }
    }

    let outcome = outcome.unwrap();
    assert!(!outcome.is_success());
    assert!(!outcome.cancelled);
    assert!(outcome.error.unwrap().contains("/t/sub/c.txt"));
}
