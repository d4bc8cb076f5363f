//! Background stream workers.
//!
//! `FeedManager::start` runs one `StreamController` per source on its own
//! named thread. Each feed gets a fresh `StopSignal`; `stop_all` sets every
//! signal that belongs to a running feed. Output goes to the presentation
//! thread through a `ChannelSink`, finishing with `ConsoleEvent::Finished`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Context, Result};

use crate::cancel::StopSignal;
use crate::controller::{StreamController, StreamReport, StreamSettings};
use crate::detect::SharedAdapter;
use crate::event::{ChannelSink, ConsoleEvent, LogEntry};
use crate::ingest::{FeedKind, FrameSource};

type ActiveFeeds = Arc<Mutex<Vec<(u64, StopSignal)>>>;

pub struct FeedManager {
    adapter: SharedAdapter,
    settings: StreamSettings,
    sink: ChannelSink,
    active: ActiveFeeds,
    next_id: AtomicU64,
}

/// Handle to one running feed.
pub struct FeedHandle {
    id: u64,
    kind: FeedKind,
    stop: StopSignal,
    worker: JoinHandle<StreamReport>,
}

impl FeedHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> FeedKind {
        self.kind
    }

    /// Ask this feed alone to stop.
    pub fn stop(&self) {
        self.stop.set();
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Wait for the worker and return its report.
    pub fn join(self) -> Result<StreamReport> {
        self.worker
            .join()
            .map_err(|_| anyhow!("feed {} worker panicked", self.id))
    }
}

impl FeedManager {
    pub fn new(adapter: SharedAdapter, settings: StreamSettings, sink: ChannelSink) -> Self {
        Self {
            adapter,
            settings,
            sink,
            active: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Start streaming `source` on a background thread.
    pub fn start<S>(&self, source: S) -> Result<FeedHandle>
    where
        S: FrameSource + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let kind = source.kind();
        let stop = StopSignal::new();
        lock_active(&self.active).push((id, stop.clone()));

        let worker_stop = stop.clone();
        let mut sink = self.sink.clone();
        let active = Arc::clone(&self.active);
        let mut controller =
            StreamController::new(Arc::clone(&self.adapter)).with_settings(self.settings.clone());

        let spawned = thread::Builder::new()
            .name(format!("{kind}-feed-{id}"))
            .spawn(move || {
                let report = controller.run(source, &worker_stop, &mut sink);
                lock_active(&active).retain(|(feed_id, _)| *feed_id != id);
                log::info!(
                    "feed {} finished: {} after {} frames ({} detections)",
                    id,
                    report.state,
                    report.frames_processed,
                    report.detections
                );
                sink.send(ConsoleEvent::Finished {
                    feed_id: id,
                    report: report.clone(),
                });
                report
            });

        let worker = match spawned {
            Ok(worker) => worker,
            Err(err) => {
                lock_active(&self.active).retain(|(feed_id, _)| *feed_id != id);
                return Err(err).with_context(|| format!("failed to spawn {kind} feed worker"));
            }
        };

        log::info!("feed {} started ({})", id, kind);
        Ok(FeedHandle {
            id,
            kind,
            stop,
            worker,
        })
    }

    /// Set the stop signal of every running feed. Returns how many were signalled.
    pub fn stop_all(&self) -> usize {
        let active = lock_active(&self.active);
        for (_, stop) in active.iter() {
            stop.set();
        }
        log::info!("stop requested for {} feeds", active.len());
        self.sink
            .send(ConsoleEvent::Log(LogEntry::new("STOP command received: Stopping all feeds.")));
        active.len()
    }

    pub fn active_count(&self) -> usize {
        lock_active(&self.active).len()
    }
}

/// A worker that panicked mid-update leaves the list usable.
fn lock_active(active: &ActiveFeeds) -> MutexGuard<'_, Vec<(u64, StopSignal)>> {
    active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
