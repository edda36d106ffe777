//! The status-event sink boundary. `VideoSource` and `StreamConsumer` never
//! log directly to a file or stream; they emit [`StatusUpdate`]s to
//! whatever [`StatusListener`] the caller supplied.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    SourceStateUpdate,
    SourceError,
    FrameCaptured,
    FrameDropped,
    FrameConsumed,
    VideoConsumptionStarted,
    VideoConsumptionFinished,
}

impl EventType {
    fn as_str(self) -> &'static str {
        match self {
            Self::SourceStateUpdate => "SOURCE_STATE_UPDATE",
            Self::SourceError => "SOURCE_ERROR",
            Self::FrameCaptured => "FRAME_CAPTURED",
            Self::FrameDropped => "FRAME_DROPPED",
            Self::FrameConsumed => "FRAME_CONSUMED",
            Self::VideoConsumptionStarted => "VIDEO_CONSUMPTION_STARTED",
            Self::VideoConsumptionFinished => "VIDEO_CONSUMPTION_FINISHED",
        }
    }
}

/// A single structured event. `context` follows the source's convention of
/// `video_source` at the top level and `video_source.video_consumer` for
/// frame-drop events raised from inside the `StreamConsumer`.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub timestamp: SystemTime,
    pub severity: Severity,
    pub event_type: EventType,
    pub context: String,
    pub payload: HashMap<String, String>,
}

impl StatusUpdate {
    pub fn new(severity: Severity, event_type: EventType, context: impl Into<String>) -> Self {
        Self {
            timestamp: SystemTime::now(),
            severity,
            event_type,
            context: context.into(),
            payload: HashMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }
}

pub trait StatusListener: Send + Sync {
    fn on_status(&self, update: &StatusUpdate);
}

/// Dispatches a status update to a listener, catching and logging any
/// panic so a misbehaving listener can never alter the source's control
/// flow (per the "listener exceptions are swallowed and logged" rule).
pub fn notify(listener: &dyn StatusListener, update: &StatusUpdate) {
    let result = catch_unwind(AssertUnwindSafe(|| listener.on_status(update)));
    if result.is_err() {
        log::warn!(
            "status listener panicked while handling {}",
            update.event_type.as_str()
        );
    }
}

/// Default listener: drops every update. Used when the caller doesn't
/// supply one.
pub struct NullStatusListener;

impl StatusListener for NullStatusListener {
    fn on_status(&self, _update: &StatusUpdate) {}
}

/// Forwards every update to the `log` crate at a level derived from
/// [`Severity`].
pub struct LoggingStatusListener;

impl StatusListener for LoggingStatusListener {
    fn on_status(&self, update: &StatusUpdate) {
        let message = format!(
            "[{}] {} payload={:?}",
            update.context,
            update.event_type.as_str(),
            update.payload
        );
        match update.severity {
            Severity::Debug => log::debug!("{message}"),
            Severity::Info => log::info!("{message}"),
            Severity::Warn => log::warn!("{message}"),
            Severity::Error => log::error!("{message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct PanickingListener;
    impl StatusListener for PanickingListener {
        fn on_status(&self, _update: &StatusUpdate) {
            panic!("boom");
        }
    }

    struct CountingListener(AtomicUsize);
    impl StatusListener for CountingListener {
        fn on_status(&self, _update: &StatusUpdate) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn notify_survives_a_panicking_listener() {
        let update = StatusUpdate::new(Severity::Info, EventType::SourceStateUpdate, "video_source");
        notify(&PanickingListener, &update);
    }

    #[test]
    fn notify_delivers_to_a_well_behaved_listener() {
        let listener = CountingListener(AtomicUsize::new(0));
        let update = StatusUpdate::new(Severity::Debug, EventType::FrameCaptured, "video_source");
        notify(&listener, &update);
        assert_eq!(listener.0.load(Ordering::SeqCst), 1);
    }
}
