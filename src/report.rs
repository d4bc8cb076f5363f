//! Downstream of a primary detection, shared by the streaming and
//! single-image paths: detection event, log line, then thumbnail.

use crate::detect::Detection;
use crate::event::{DetectionEvent, LogEntry, StreamSink};
use crate::frame::Frame;
use crate::ingest::FeedKind;
use crate::thumbnail::ThumbnailRenderer;

#[derive(Clone, Copy, Debug, Default)]
pub struct DetectionReporter {
    renderer: ThumbnailRenderer,
}

impl DetectionReporter {
    /// Emit the detection event, `log_message`, and the thumbnail log entry.
    ///
    /// A thumbnail that cannot be rendered is reported as a log line; the
    /// caller carries on either way.
    pub fn report(
        &self,
        sink: &mut dyn StreamSink,
        detection: &Detection,
        rendered_frame: Frame,
        feed: Option<FeedKind>,
        log_message: String,
    ) -> DetectionEvent {
        let event = DetectionEvent::new(detection, rendered_frame, feed);
        sink.on_detection(&event);
        sink.on_log(LogEntry::new(log_message));

        match self.renderer.render(event.rendered_frame(), &event.label()) {
            Ok(thumbnail) => sink.on_log(LogEntry::thumbnail(thumbnail)),
            Err(err) => {
                log::warn!("thumbnail skipped for frame {}: {}", event.rendered_frame().index(), err);
                sink.on_log(LogEntry::new(format!("ERROR thumbnail -> {err}")));
            }
        }
        event
    }
}
