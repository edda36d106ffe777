//! Shared test fixtures: a scripted decoder and an event-recording listener,
//! used across the lifecycle/scenario integration tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use buffered_video_source::{
    Decoder, EventType, SourceProperties, StatusListener, StatusUpdate, VideoSourceError,
    VideoSourceResult,
};

/// A decoder whose grab/retrieve behavior is fixed at construction: it
/// produces `total_frames` frames (or runs forever if `total_frames == 0`),
/// optionally sleeping before each grab to simulate a slow or fast source.
pub struct ScriptedDecoder {
    opened: bool,
    fail_open: Arc<dyn Fn() -> bool + Send + Sync>,
    total_frames: u64,
    fps: f64,
    grabbed: u64,
    grab_delay: Duration,
}

impl ScriptedDecoder {
    fn properties_for(total_frames: u64, fps: f64) -> SourceProperties {
        SourceProperties {
            width: 64,
            height: 64,
            total_frames,
            fps,
        }
    }
}

impl Decoder for ScriptedDecoder {
    type Frame = u64;
    type Reference = String;

    fn open(&mut self, _reference: &String) -> VideoSourceResult<()> {
        if (self.fail_open)() {
            return Err(VideoSourceError::internal_decoder("connection refused"));
        }
        self.opened = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.opened
    }

    fn grab(&mut self) -> bool {
        if self.total_frames > 0 && self.grabbed >= self.total_frames {
            return false;
        }
        if !self.grab_delay.is_zero() {
            thread::sleep(self.grab_delay);
        }
        self.grabbed += 1;
        true
    }

    fn retrieve(&mut self) -> VideoSourceResult<u64> {
        Ok(self.grabbed)
    }

    fn release(&mut self) {
        self.opened = false;
    }

    fn properties(&self) -> SourceProperties {
        Self::properties_for(self.total_frames, self.fps)
    }
}

/// Builds fresh `ScriptedDecoder`s for a `VideoSource`'s decoder_factory,
/// letting a test control the open-failure count (to simulate a source
/// that becomes reachable after the first failed attempt) independently
/// of frame scripting.
#[derive(Clone)]
pub struct DecoderFactory {
    attempts: Arc<AtomicUsize>,
    fail_first_n_opens: usize,
    total_frames: u64,
    fps: f64,
    grab_delay: Duration,
}

impl DecoderFactory {
    pub fn new(total_frames: u64, fps: f64) -> Self {
        Self {
            attempts: Arc::new(AtomicUsize::new(0)),
            fail_first_n_opens: 0,
            total_frames,
            fps,
            grab_delay: Duration::ZERO,
        }
    }

    pub fn with_grab_delay(mut self, delay: Duration) -> Self {
        self.grab_delay = delay;
        self
    }

    pub fn failing_first_n_opens(mut self, n: usize) -> Self {
        self.fail_first_n_opens = n;
        self
    }

    pub fn make(&self) -> ScriptedDecoder {
        let attempts = Arc::clone(&self.attempts);
        let fail_first_n_opens = self.fail_first_n_opens;
        let fail_open: Arc<dyn Fn() -> bool + Send + Sync> = Arc::new(move || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            attempt < fail_first_n_opens
        });
        ScriptedDecoder {
            opened: false,
            fail_open,
            total_frames: self.total_frames,
            fps: self.fps,
            grabbed: 0,
            grab_delay: self.grab_delay,
        }
    }
}

/// Records every `StatusUpdate` it receives, for post-hoc assertions.
pub struct RecordingListener {
    events: Mutex<VecDeque<StatusUpdate>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(VecDeque::new()),
        })
    }

    pub fn events(&self) -> Vec<StatusUpdate> {
        self.events.lock().unwrap().iter().cloned().collect()
    }

    pub fn count(&self, event_type: EventType) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|update| update.event_type == event_type)
            .count()
    }

    pub fn drop_causes(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|update| update.event_type == EventType::FrameDropped)
            .filter_map(|update| update.payload.get("cause").cloned())
            .collect()
    }
}

impl StatusListener for RecordingListener {
    fn on_status(&self, update: &StatusUpdate) {
        self.events.lock().unwrap().push_back(update.clone());
    }
}

/// Polls `condition` until it's true or `timeout` elapses, panicking on
/// timeout. Used instead of a fixed sleep wherever a test needs to observe
/// an asynchronous worker-thread transition.
pub fn wait_until(mut condition: impl FnMut() -> bool, timeout: Duration) {
    let started = std::time::Instant::now();
    while !condition() {
        if started.elapsed() > timeout {
            panic!("condition not met within {timeout:?}");
        }
        thread::sleep(Duration::from_millis(10));
    }
}
