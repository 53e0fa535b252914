//! Shared fixtures for session tests.

#![allow(dead_code)]

pub mod fake_engine;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use fdm_core::config::{DownloadConfig, FdmConfig};
use fdm_core::paths::{PathAllocator, UniquePath};
use fdm_core::shell::AppShell;
use fdm_core::store::SessionStore;
use fdm_core::{Session, SessionDeps};

pub use fake_engine::FakeEngine;

pub const SAVE_DIR: &str = "/downloads";

/// Allocator that never renames: `dir/name` every time, so repeated adds collide.
pub struct FixedPaths;

impl PathAllocator for FixedPaths {
    fn unique_path(&self, dir: &Path, name: &str) -> Result<UniquePath> {
        Ok(UniquePath {
            dir: dir.to_path_buf(),
            name: name.to_string(),
            path: dir.join(name),
        })
    }
}

/// Shell that records what was asked of it.
#[derive(Default)]
pub struct RecordingShell {
    pub focused: Mutex<bool>,
    pub notifications: Mutex<Vec<(String, String)>>,
    pub relaunches: Mutex<usize>,
    pub exits: Mutex<Vec<i32>>,
    pub auto_start_calls: Mutex<Vec<bool>>,
    pub fail_auto_start: Mutex<bool>,
}

#[async_trait]
impl AppShell for RecordingShell {
    async fn is_focused(&self) -> Result<bool> {
        Ok(*self.focused.lock().unwrap())
    }

    async fn notify(&self, title: &str, body: &str) -> Result<()> {
        self.notifications
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
        Ok(())
    }

    async fn relaunch(&self) -> Result<()> {
        *self.relaunches.lock().unwrap() += 1;
        Ok(())
    }

    async fn exit(&self, code: i32) -> Result<()> {
        self.exits.lock().unwrap().push(code);
        Ok(())
    }

    async fn set_auto_start(&self, enabled: bool) -> Result<()> {
        self.auto_start_calls.lock().unwrap().push(enabled);
        if *self.fail_auto_start.lock().unwrap() {
            anyhow::bail!("autostart entry not writable");
        }
        Ok(())
    }
}

pub struct Harness {
    pub engine: Arc<FakeEngine>,
    pub shell: Arc<RecordingShell>,
    pub session: Session,
}

pub fn config(max_concurrent_tasks: usize) -> FdmConfig {
    FdmConfig {
        max_concurrent_tasks,
        auto_start: false,
        download: DownloadConfig {
            save_dir: PathBuf::from(SAVE_DIR),
            ..DownloadConfig::default()
        },
    }
}

pub fn deps(engine: &Arc<FakeEngine>, shell: &Arc<RecordingShell>, store: Option<SessionStore>) -> SessionDeps {
    SessionDeps {
        engine: engine.clone(),
        paths: Arc::new(FixedPaths),
        shell: shell.clone(),
        store,
    }
}

pub fn harness(max_concurrent_tasks: usize) -> Harness {
    harness_with_store(max_concurrent_tasks, None)
}

pub fn harness_with_store(max_concurrent_tasks: usize, store: Option<SessionStore>) -> Harness {
    let engine = Arc::new(FakeEngine::new());
    let shell = Arc::new(RecordingShell::default());
    let session = Session::new(deps(&engine, &shell, store), &config(max_concurrent_tasks));
    Harness {
        engine,
        shell,
        session,
    }
}

pub fn url(name: &str) -> String {
    format!("https://files.example.com/{name}")
}

pub fn path(name: &str) -> PathBuf {
    Path::new(SAVE_DIR).join(name)
}

/// Polls `cond` until it holds, yielding to background tasks in between.
pub async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    for _ in 0..2000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("timed out waiting for: {what}");
}
