//! Tests for snapshots, checkpoints and catch-up
//!
//! These tests verify:
//! - Checkpoint persistence and restart from a checkpoint
//! - Corruption detection
//! - Chunked transfer with resume, duplicates and gaps
//! - Follower catch-up below the compaction point

mod common;

use std::fs;
use std::sync::Arc;

use common::{barrier, config_builder, elect, keys, put, put_entry, start, start_with, wait_for};
use crossbeam::channel;
use replikv::snapshot::{SnapshotAssembler, SnapshotSender, SnapshotStatus};
use replikv::{
    pump, LocalLog, LogEvent, ManagerState, ReadOptions, ReplError, ReplicatedState, Role,
    Snapshot, SnapshotSource, WriteOptions,
};
use tempfile::tempdir;

fn sample(count: usize) -> Snapshot {
    let entries = (0..count)
        .map(|i| (format!("key{:04}", i), format!("value-{}", i).into_bytes()))
        .collect();
    Snapshot::new(42, 3, entries)
}

// =============================================================================
// Persistence
// =============================================================================

#[test]
fn test_snapshot_file_detects_corruption() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("snapshot.bin");
    let snapshot = sample(10);
    snapshot.write_to(&path).unwrap();
    assert_eq!(Snapshot::read_from(&path).unwrap(), snapshot);

    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    fs::write(&path, &bytes).unwrap();

    assert!(matches!(
        Snapshot::read_from(&path),
        Err(ReplError::SnapshotCorruption(_))
    ));
}

#[test]
fn test_restart_from_checkpoint() {
    let dir = tempdir().unwrap();
    let config = config_builder("a").data_dir(dir.path()).build();

    let checkpointed = {
        let log = Arc::new(LocalLog::new(true));
        let state = start_with(&log, "a", config.clone(), None);
        elect(&log, &state, "a", 1);
        for i in 0..3 {
            state
                .write(vec![put(&format!("k{}", i), "v")], &WriteOptions::applied())
                .unwrap();
        }
        let index = state.checkpoint().unwrap();
        assert_eq!(index, Some(4));
        assert_eq!(state.status().snapshot.status, SnapshotStatus::Completed);
        4
    };

    // A fresh process: the log only retains history after the checkpoint
    let log = Arc::new(LocalLog::with_base(checkpointed, true));
    let state = start_with(&log, "a", config, None);
    assert_eq!(state.applied_index(), 4);
    let result = state
        .multi_get(&keys(&["k0", "k2"]), &ReadOptions::default())
        .unwrap();
    assert_eq!(result.get("k0"), Some(&b"v".to_vec()));
    assert_eq!(result.get("k2"), Some(&b"v".to_vec()));

    elect(&log, &state, "a", 2);
    let index = state.write(vec![put("after", "restart")], &WriteOptions::applied()).unwrap();
    assert_eq!(index, 6);
}

#[test]
fn test_periodic_checkpoint() {
    let dir = tempdir().unwrap();
    let config = config_builder("a")
        .data_dir(dir.path())
        .checkpoint_interval(2)
        .build();
    let path = config.snapshot_path().unwrap();
    let state = ReplicatedState::open(config, Arc::new(LocalLog::new(true))).unwrap();

    state.on_committed_entry(&put_entry(1, 1, "a", "1")).unwrap();
    assert!(!path.exists());
    state.on_committed_entry(&put_entry(2, 1, "b", "2")).unwrap();
    assert_eq!(Snapshot::read_from(&path).unwrap().index, 2);

    state.on_committed_entry(&put_entry(3, 1, "c", "3")).unwrap();
    assert_eq!(Snapshot::read_from(&path).unwrap().index, 2);
    state.on_committed_entry(&put_entry(4, 1, "d", "4")).unwrap();
    assert_eq!(Snapshot::read_from(&path).unwrap().index, 4);
}

#[test]
fn test_drop_removes_checkpoint() {
    let dir = tempdir().unwrap();
    let config = config_builder("a").data_dir(dir.path()).build();
    let path = config.snapshot_path().unwrap();
    let state = ReplicatedState::open(config, Arc::new(LocalLog::new(true))).unwrap();

    state.on_committed_entry(&put_entry(1, 1, "a", "1")).unwrap();
    state.checkpoint().unwrap();
    assert!(path.exists());

    state.drop_instance().unwrap();
    assert!(!path.exists());
    assert_eq!(state.status().snapshot.status, SnapshotStatus::Uninitialized);
}

#[test]
fn test_open_rejects_corrupt_checkpoint() {
    let dir = tempdir().unwrap();
    let config = config_builder("a").data_dir(dir.path()).build();
    fs::write(config.snapshot_path().unwrap(), b"garbage").unwrap();

    let result = ReplicatedState::open(config, Arc::new(LocalLog::new(true)));
    assert!(matches!(result, Err(ReplError::SnapshotCorruption(_))));
}

// =============================================================================
// Chunked Transfer
// =============================================================================

#[test]
fn test_chunked_transfer_reassembles() {
    let snapshot = sample(200);
    let sender = SnapshotSender::new(&snapshot, 64).unwrap();
    let mut assembler = SnapshotAssembler::new();

    let mut result = None;
    for chunk in sender.chunks_from(0) {
        assert!(result.is_none());
        let last = chunk.is_last();
        result = assembler.accept(chunk).unwrap();
        assert_eq!(result.is_some(), last);
    }

    assert_eq!(result.unwrap(), snapshot);
}

#[test]
fn test_chunked_transfer_resumes_from_offset() {
    let snapshot = sample(200);
    let mut assembler = SnapshotAssembler::new();
    {
        let sender = SnapshotSender::new(&snapshot, 64).unwrap();
        for chunk in sender.chunks_from(0).take(3) {
            assert!(assembler.accept(chunk).unwrap().is_none());
        }
    }
    assert_eq!(assembler.next_offset(), 192);
    assert_eq!(assembler.index(), Some(42));

    // Connection lost; a new sender serves the rest from where we stopped
    let sender = SnapshotSender::new(&snapshot, 64).unwrap();
    let mut result = None;
    for chunk in sender.chunks_from(assembler.next_offset()) {
        result = assembler.accept(chunk).unwrap();
    }
    assert_eq!(result.unwrap(), snapshot);
}

#[test]
fn test_duplicate_chunk_is_ignored() {
    let sender = SnapshotSender::new(&sample(50), 32).unwrap();
    let mut assembler = SnapshotAssembler::new();
    let first = sender.chunk_at(0).unwrap();

    assembler.accept(first.clone()).unwrap();
    assert_eq!(assembler.accept(first).unwrap(), None);
    assert_eq!(assembler.next_offset(), 32);
}

#[test]
fn test_chunk_gap_is_rejected() {
    let sender = SnapshotSender::new(&sample(50), 32).unwrap();
    let mut assembler = SnapshotAssembler::new();
    assembler.accept(sender.chunk_at(0).unwrap()).unwrap();

    let result = assembler.accept(sender.chunk_at(64).unwrap());
    assert!(matches!(result, Err(ReplError::Protocol(_))));
}

#[test]
fn test_corrupt_chunk_is_rejected() {
    let sender = SnapshotSender::new(&sample(50), 32).unwrap();
    let mut chunk = sender.chunk_at(0).unwrap();
    chunk.crc ^= 1;

    let result = SnapshotAssembler::new().accept(chunk);
    assert!(matches!(result, Err(ReplError::SnapshotCorruption(_))));
}

#[test]
fn test_chunk_from_other_snapshot_is_rejected() {
    let first = SnapshotSender::new(&sample(50), 32).unwrap();
    let other = SnapshotSender::new(&Snapshot::new(43, 3, Vec::new()), 32).unwrap();
    let mut assembler = SnapshotAssembler::new();
    assembler.accept(first.chunk_at(0).unwrap()).unwrap();

    let result = assembler.accept(other.chunk_at(0).unwrap());
    assert!(matches!(result, Err(ReplError::Protocol(_))));
}

#[test]
fn test_zero_chunk_size_is_rejected() {
    let result = SnapshotSender::new(&sample(1), 0);
    assert!(matches!(result, Err(ReplError::Config(_))));
}

// =============================================================================
// Catch-up
// =============================================================================

#[test]
fn test_follower_catches_up_below_compaction() {
    let log = Arc::new(LocalLog::new(true));
    let leader = start(&log, "a");
    elect(&log, &leader, "a", 1);
    for i in 0..5 {
        leader
            .write(vec![put(&format!("k{}", i), "v")], &WriteOptions::applied())
            .unwrap();
    }
    log.compact_through(6);

    let source: Arc<dyn SnapshotSource> = leader.clone();
    let follower = start_with(&log, "c", common::test_config("c"), Some(source));
    wait_for("snapshot install", || follower.applied_index() == 6);
    assert_eq!(follower.status().snapshot.status, SnapshotStatus::Completed);

    let index = leader.write(vec![put("later", "x")], &WriteOptions::default()).unwrap();
    let result = follower
        .multi_get(&keys(&["k0", "later"]), &ReadOptions::from_index(index))
        .unwrap();
    assert_eq!(result.get("k0"), Some(&b"v".to_vec()));
    assert_eq!(result.get("later"), Some(&b"x".to_vec()));
}

#[test]
fn test_snapshot_required_without_source_needs_resync() {
    let log = Arc::new(LocalLog::new(true));
    let leader = start(&log, "a");
    elect(&log, &leader, "a", 1);
    leader.write(vec![put("k", "v")], &WriteOptions::applied()).unwrap();
    log.compact_through(2);

    let follower = start(&log, "d");
    wait_for("needs resync", || follower.needs_resync());
    assert_eq!(follower.status().manager_state, ManagerState::NeedsResync);

    // Operator installs a snapshot by hand; apply resumes
    follower.install_snapshot(leader.get_snapshot(None).unwrap()).unwrap();
    assert!(!follower.needs_resync());

    let index = leader.write(vec![put("k", "w")], &WriteOptions::default()).unwrap();
    let result = follower
        .multi_get(&keys(&["k"]), &ReadOptions::from_index(index))
        .unwrap();
    assert_eq!(result.get("k"), Some(&b"w".to_vec()));
}

#[test]
fn test_pump_resyncs_after_gap() {
    let log = Arc::new(LocalLog::new(true));
    let leader = start(&log, "a");
    elect(&log, &leader, "a", 1);
    for i in 0..5 {
        leader
            .write(vec![put(&format!("k{}", i), "v")], &WriteOptions::applied())
            .unwrap();
    }

    let follower = Arc::new(
        ReplicatedState::open(common::test_config("b"), Arc::new(LocalLog::new(true))).unwrap(),
    );
    let (tx, rx) = channel::unbounded();
    let source: Arc<dyn SnapshotSource> = leader.clone();
    pump::spawn_applier(Arc::clone(&follower), rx, Some(source)).unwrap();

    tx.send(LogEvent::LeadershipChanged { generation: 1, role: Role::Follower }).unwrap();
    tx.send(LogEvent::Committed(barrier(1, 1))).unwrap();
    tx.send(LogEvent::Committed(put_entry(4, 1, "k2", "v"))).unwrap();

    wait_for("resync", || follower.applied_index() == 6);
    assert!(!follower.needs_resync());
    assert_eq!(
        follower.get_snapshot(None).unwrap(),
        leader.get_snapshot(None).unwrap()
    );
}
