//! Common test utilities for batchguard tests

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use batchguard::runner::{task, Task};
use tempfile::TempDir;

/// Base time unit for timing scenarios
pub const UNIT: Duration = Duration::from_millis(200);

/// What tasks reported while running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Started(usize),
    Finished(usize),
}

/// Shared event log
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Event>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    /// Indices of tasks that started, in order
    pub fn started(&self) -> Vec<usize> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Started(i) => Some(i),
                Event::Finished(_) => None,
            })
            .collect()
    }

    /// Indices of tasks that finished, in order
    pub fn finished(&self) -> Vec<usize> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Finished(i) => Some(i),
                Event::Started(_) => None,
            })
            .collect()
    }
}

/// Task that sleeps `index * unit` and records start and finish
pub fn journaled_sleep(journal: &Journal, unit: Duration) -> Task {
    let journal = journal.clone();
    task(move |index| {
        journal.push(Event::Started(index));
        std::thread::sleep(unit * index as u32);
        journal.push(Event::Finished(index));
    })
}

/// `count` journaled sleeping tasks
pub fn sleeping_batch(journal: &Journal, count: usize, unit: Duration) -> Vec<Task> {
    (0..count).map(|_| journaled_sleep(journal, unit)).collect()
}

/// Empty directory usable as HOME / cwd so no user config leaks in
pub fn isolated_dir() -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().to_path_buf();
    (dir, path)
}

/// Temp directory containing `config.toml` with the given content
pub fn config_file(content: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("config.toml");
    std::fs::write(&path, content).expect("Failed to write config");
    (dir, path)
}
