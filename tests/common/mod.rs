//! Shared helpers for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use replikv::config::ConfigBuilder;
use replikv::{pump, Config, ConsensusLog, Entry, LocalLog, Mutation, Operation, ReplicatedState, SnapshotSource};

/// Config with short timeouts so failing waits fail fast
pub fn test_config(instance: &str) -> Config {
    config_builder(instance).build()
}

pub fn config_builder(instance: &str) -> ConfigBuilder {
    Config::builder()
        .database("testdb")
        .instance_id(instance)
        .write_timeout_ms(3000)
        .read_timeout_ms(3000)
}

/// Open an instance that is not subscribed to any log (entries fed by hand)
pub fn detached(instance: &str) -> ReplicatedState {
    ReplicatedState::open(test_config(instance), Arc::new(LocalLog::new(true))).unwrap()
}

/// Open an instance on `log` with its applier thread running
pub fn start(log: &Arc<LocalLog>, node: &str) -> Arc<ReplicatedState> {
    start_with(log, node, test_config(node), None)
}

pub fn start_with(
    log: &Arc<LocalLog>,
    node: &str,
    config: Config,
    source: Option<Arc<dyn SnapshotSource>>,
) -> Arc<ReplicatedState> {
    let state = Arc::new(
        ReplicatedState::open(config, Arc::clone(log) as Arc<dyn ConsensusLog>).unwrap(),
    );
    let events = log.subscribe(node, state.applied_index());
    pump::spawn_applier(Arc::clone(&state), events, source).unwrap();
    state
}

/// Elect `node` and wait until `state` has seen the new generation
pub fn elect(log: &LocalLog, state: &ReplicatedState, node: &str, generation: u64) -> u64 {
    let barrier = log.elect(node, generation).unwrap();
    wait_for("leadership notification", || state.generation() == generation);
    barrier
}

/// Poll `condition` for up to five seconds
pub fn wait_for(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        if Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        thread::sleep(Duration::from_millis(5));
    }
}

pub fn put(key: &str, value: &str) -> Mutation {
    Mutation::put(key, value.as_bytes().to_vec())
}

pub fn put_entry(index: u64, generation: u64, key: &str, value: &str) -> Entry {
    Entry::new(index, generation, Operation::Write(vec![put(key, value)]))
}

pub fn barrier(index: u64, generation: u64) -> Entry {
    Entry::new(index, generation, Operation::Barrier)
}

pub fn keys(names: &[&str]) -> Vec<String> {
    names.iter().map(|k| k.to_string()).collect()
}
