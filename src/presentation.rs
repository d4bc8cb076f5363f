//! Presentation-side state.
//!
//! `ConsoleState` is owned by the presentation thread and is the only place
//! console events are applied. Workers never reach it directly; they send
//! `ConsoleEvent`s over the channel and `pump` folds them in.
//!
//! Detection history is not kept here: the log already carries each
//! detection's line and thumbnail, so only a count and the latest event stay.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::controller::{StreamReport, StreamState};
use crate::event::{ConsoleEvent, DetectionEvent, LogEntry, StatusUpdate};
use crate::log_book::LogBook;

pub const BOOT_MESSAGES: [&str; 3] = ["BOOT: MATRIX Online.", "YOLOv8 Node Initialized.", "Awaiting Commands..."];

#[derive(Debug)]
pub struct ConsoleState {
    status: StatusUpdate,
    last_state: StreamState,
    preview: Option<(u32, u32)>,
    frames_shown: u64,
    log: LogBook,
    detection_count: u64,
    latest_detection: Option<DetectionEvent>,
    finished: Vec<(u64, StreamReport)>,
}

impl ConsoleState {
    pub fn new(log_capacity: usize) -> Self {
        Self {
            status: StatusUpdate::new("STANDBY", "Awaiting Commands..."),
            last_state: StreamState::Idle,
            preview: None,
            frames_shown: 0,
            log: LogBook::new(log_capacity),
            detection_count: 0,
            latest_detection: None,
            finished: Vec::new(),
        }
    }

    /// Seed the log with the start-up banner.
    pub fn boot(&mut self) {
        for message in BOOT_MESSAGES {
            self.log.push(LogEntry::new(message));
        }
    }

    pub fn apply(&mut self, event: ConsoleEvent) {
        match event {
            ConsoleEvent::State { state, update } => {
                self.last_state = state;
                self.status = update;
            }
            ConsoleEvent::Status(update) => self.status = update,
            ConsoleEvent::Frame(frame) => {
                self.preview = Some((frame.width(), frame.height()));
                self.frames_shown += 1;
            }
            ConsoleEvent::Detection(event) => {
                self.detection_count += 1;
                self.latest_detection = Some(event);
            }
            ConsoleEvent::Log(entry) => self.log.push(entry),
            ConsoleEvent::Finished { feed_id, report } => self.finished.push((feed_id, report)),
        }
    }

    /// Wait up to `timeout` for one event, hand it to `observe`, then apply it.
    ///
    /// Returns `false` once every sender is gone.
    pub fn pump<F>(&mut self, rx: &Receiver<ConsoleEvent>, timeout: Duration, mut observe: F) -> bool
    where
        F: FnMut(&ConsoleEvent),
    {
        match rx.recv_timeout(timeout) {
            Ok(event) => {
                observe(&event);
                self.apply(event);
                true
            }
            Err(RecvTimeoutError::Timeout) => true,
            Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    pub fn status(&self) -> &StatusUpdate {
        &self.status
    }

    pub fn last_state(&self) -> StreamState {
        self.last_state
    }

    /// Dimensions of the last frame shown.
    pub fn preview(&self) -> Option<(u32, u32)> {
        self.preview
    }

    pub fn frames_shown(&self) -> u64 {
        self.frames_shown
    }

    pub fn log(&self) -> &LogBook {
        &self.log
    }

    /// Detections applied since start-up.
    pub fn detection_count(&self) -> u64 {
        self.detection_count
    }

    pub fn latest_detection(&self) -> Option<&DetectionEvent> {
        self.latest_detection.as_ref()
    }

    pub fn finished(&self) -> &[(u64, StreamReport)] {
        &self.finished
    }

    /// Report of a feed that has sent its `Finished` event.
    pub fn report_for(&self, feed_id: u64) -> Option<&StreamReport> {
        self.finished
            .iter()
            .find(|(id, _)| *id == feed_id)
            .map(|(_, report)| report)
    }
}

impl Default for ConsoleState {
    fn default() -> Self {
        Self::new(crate::log_book::DEFAULT_LOG_CAPACITY)
    }
}
