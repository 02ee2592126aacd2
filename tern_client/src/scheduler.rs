//! Delayed buffer pushes.
//!
//! Timers run on a separate tokio runtime thread. The editor side schedules
//! and cancels pushes through a channel and polls for pushes that came due;
//! the push itself runs on the editor side so buffer text is read there.

use crossbeam_channel::{Receiver, Sender};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A push whose delay has elapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuePush {
    pub key: PathBuf,
    /// Stamp the push was scheduled with.
    pub stamp: Instant,
}

enum Command {
    Schedule {
        key: PathBuf,
        stamp: Instant,
        delay: Duration,
    },
    Cancel(PathBuf),
    Shutdown,
}

/// Owns the timer thread.
pub struct PushScheduler {
    command_tx: mpsc::UnboundedSender<Command>,
    due_rx: Receiver<DuePush>,
    thread: Option<thread::JoinHandle<()>>,
}

impl PushScheduler {
    /// Starts the timer thread.
    pub fn start() -> io::Result<Self> {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (due_tx, due_rx) = crossbeam_channel::unbounded();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;

        let thread = thread::Builder::new()
            .name("tern-push".to_string())
            .spawn(move || runtime.block_on(run_timers(command_rx, due_tx)))?;

        Ok(Self {
            command_tx,
            due_rx,
            thread: Some(thread),
        })
    }

    /// Schedules a push of `key` after `delay`, replacing any pending one.
    pub fn schedule(&self, key: PathBuf, stamp: Instant, delay: Duration) {
        log::debug!("Push of {} scheduled in {:?}", key.display(), delay);
        self.send(Command::Schedule { key, stamp, delay });
    }

    /// Drops the pending push of `key`, if any.
    pub fn cancel(&self, key: &Path) {
        self.send(Command::Cancel(key.to_path_buf()));
    }

    /// Returns a push that came due (non-blocking).
    pub fn try_recv(&self) -> Option<DuePush> {
        self.due_rx.try_recv().ok()
    }

    /// Waits up to `timeout` for a push to come due.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<DuePush> {
        self.due_rx.recv_timeout(timeout).ok()
    }

    fn send(&self, command: Command) {
        if self.command_tx.send(command).is_err() {
            log::warn!("Push timer thread is gone");
        }
    }
}

impl Drop for PushScheduler {
    fn drop(&mut self) {
        let _ = self.command_tx.send(Command::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Push timer thread panicked");
            }
        }
    }
}

async fn run_timers(mut commands: mpsc::UnboundedReceiver<Command>, due_tx: Sender<DuePush>) {
    let mut pending: HashMap<PathBuf, JoinHandle<()>> = HashMap::new();

    while let Some(command) = commands.recv().await {
        pending.retain(|_, timer| !timer.is_finished());

        match command {
            Command::Schedule { key, stamp, delay } => {
                let due_tx = due_tx.clone();
                let due_key = key.clone();
                let timer = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = due_tx.send(DuePush { key: due_key, stamp });
                });
                // A newer schedule always carries a newer stamp.
                if let Some(previous) = pending.insert(key, timer) {
                    previous.abort();
                }
            }
            Command::Cancel(key) => {
                if let Some(timer) = pending.remove(&key) {
                    timer.abort();
                }
            }
            Command::Shutdown => break,
        }
    }

    for (_, timer) in pending.drain() {
        timer.abort();
    }
}
