//! `VideoSource`: owns the lifecycle state machine, spawns and joins the
//! decoder worker thread, and exposes the consumer-facing read API.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::config::VideoSourceConfig;
use crate::consumer::{
    system_time_to_string, BufferConsumptionStrategy, BufferFillingStrategy, ConsumerTuning,
    FrameOutcome, StreamConsumer,
};
use crate::decoder::Decoder;
use crate::error::{VideoSourceError, VideoSourceResult};
use crate::frame::{SourceMetadata, VideoFrame};
use crate::listener::{notify, EventType, Severity, StatusListener, StatusUpdate};
use crate::queue::{BoundedFrameQueue, Item};
use crate::state::{AtomicStreamState, PlaybackGate, StreamState};

const SOURCE_CONTEXT: &str = "video_source";

/// Fields the decoder worker thread needs alongside the calling thread —
/// split out of `VideoSource` itself so the worker closure can hold an
/// `Arc` to exactly this and nothing else.
struct Shared<D: Decoder> {
    state: AtomicStreamState,
    frames_buffering_allowed: AtomicBool,
    playback_gate: PlaybackGate,
    buffer: BoundedFrameQueue<D::Frame>,
    consumer: Mutex<StreamConsumer>,
    listener: Arc<dyn StatusListener>,
    declared_fps: Mutex<f64>,
    /// Set once the worker's end-of-stream sentinel has been consumed by
    /// `read_frame`; cleared again by a successful `start`/`restart`. This
    /// is what makes repeated reads past end of stream keep raising
    /// `EndOfStreamError` instead of blocking again.
    sentinel_seen: AtomicBool,
}

impl<D: Decoder> Shared<D> {
    fn transition(&self, previous: StreamState, new: StreamState) {
        self.state.store(new);
        notify(
            self.listener.as_ref(),
            &StatusUpdate::new(Severity::Info, EventType::SourceStateUpdate, SOURCE_CONTEXT)
                .with("previous_state", previous.to_string())
                .with("new_state", new.to_string()),
        );
    }
}

pub struct VideoSource<D: Decoder> {
    reference_label: String,
    source_reference: D::Reference,
    decoder_factory: Box<dyn Fn() -> D + Send + Sync>,
    shared: Arc<Shared<D>>,
    source_properties: Mutex<Option<crate::frame::SourceProperties>>,
    consumption_strategy: Mutex<Option<BufferConsumptionStrategy>>,
    worker_handle: Mutex<Option<JoinHandle<()>>>,
    state_change_lock: Mutex<()>,
    buffer_size: usize,
}

impl<D: Decoder> VideoSource<D> {
    /// `reference_label` is a human-readable identifier for the source
    /// (shown in `describe_source` and error messages); `source_reference`
    /// is the opaque value handed to `Decoder::open`. `decoder_factory`
    /// builds a fresh decoder for every `start`/`restart`, since the prior
    /// instance is consumed and released by the worker thread it ran on.
    ///
    /// Callers should run `config.validate()` before constructing — this
    /// constructor doesn't, to keep it infallible.
    pub fn new(
        reference_label: impl Into<String>,
        source_reference: D::Reference,
        decoder_factory: impl Fn() -> D + Send + Sync + 'static,
        config: VideoSourceConfig,
        listener: Arc<dyn StatusListener>,
    ) -> Self {
        let fill_strategy = config.buffer_filling_strategy.map(BufferFillingStrategy::from);
        let consumption_strategy = config
            .buffer_consumption_strategy
            .map(BufferConsumptionStrategy::from);
        let tuning = ConsumerTuning {
            adaptive_mode_stream_pace_tolerance: config.adaptive_mode_stream_pace_tolerance,
            adaptive_mode_reader_pace_tolerance: config.adaptive_mode_reader_pace_tolerance,
            minimum_adaptive_mode_samples: config.minimum_adaptive_mode_samples,
            maximum_adaptive_frames_dropped_in_row: config.maximum_adaptive_frames_dropped_in_row,
        };
        let consumer = StreamConsumer::new(fill_strategy, tuning, Arc::clone(&listener));

        let shared = Arc::new(Shared {
            state: AtomicStreamState::new(StreamState::NotStarted),
            frames_buffering_allowed: AtomicBool::new(false),
            playback_gate: PlaybackGate::new(false),
            buffer: BoundedFrameQueue::new(config.buffer_size),
            consumer: Mutex::new(consumer),
            listener,
            declared_fps: Mutex::new(0.0),
            sentinel_seen: AtomicBool::new(false),
        });

        Self {
            reference_label: reference_label.into(),
            source_reference,
            decoder_factory: Box::new(decoder_factory),
            shared,
            source_properties: Mutex::new(None),
            consumption_strategy: Mutex::new(consumption_strategy),
            worker_handle: Mutex::new(None),
            state_change_lock: Mutex::new(()),
            buffer_size: config.buffer_size,
        }
    }

    pub fn state(&self) -> StreamState {
        self.shared.state.load()
    }

    pub fn describe_source(&self) -> SourceMetadata {
        SourceMetadata {
            source_properties: *self.source_properties.lock().unwrap(),
            source_reference: self.reference_label.clone(),
            buffer_size: self.buffer_size,
            state: self.shared.state.load(),
            buffer_filling_strategy: self.shared.consumer.lock().unwrap().fill_strategy(),
            buffer_consumption_strategy: *self.consumption_strategy.lock().unwrap(),
        }
    }

    // ---- Lifecycle -----------------------------------------------------

    pub fn start(&self) -> VideoSourceResult<()> {
        let _guard = self.state_change_lock.lock().unwrap();
        self.start_locked()
    }

    pub fn pause(&self) -> VideoSourceResult<()> {
        let _guard = self.state_change_lock.lock().unwrap();
        self.pause_locked()
    }

    pub fn mute(&self) -> VideoSourceResult<()> {
        let _guard = self.state_change_lock.lock().unwrap();
        self.mute_locked()
    }

    pub fn resume(&self) -> VideoSourceResult<()> {
        let _guard = self.state_change_lock.lock().unwrap();
        self.resume_locked()
    }

    pub fn terminate(&self, drain: bool) -> VideoSourceResult<()> {
        let _guard = self.state_change_lock.lock().unwrap();
        self.terminate_locked(drain)
    }

    pub fn restart(&self, drain: bool) -> VideoSourceResult<()> {
        let _guard = self.state_change_lock.lock().unwrap();
        self.restart_locked(drain)
    }

    fn start_locked(&self) -> VideoSourceResult<()> {
        let current = self.shared.state.load();
        if !matches!(
            current,
            StreamState::NotStarted | StreamState::Restarting | StreamState::Ended
        ) {
            return Err(VideoSourceError::operation_not_allowed(
                "start",
                current.to_string(),
            ));
        }

        self.shared.transition(current, StreamState::Initialising);

        let mut decoder = (self.decoder_factory)();
        if let Err(open_err) = decoder.open(&self.source_reference) {
            self.shared.transition(StreamState::Initialising, StreamState::Error);
            return Err(VideoSourceError::source_connection(
                self.reference_label.clone(),
                open_err.to_string(),
            ));
        }

        let properties = decoder.properties();
        *self.source_properties.lock().unwrap() = Some(properties);
        *self.shared.declared_fps.lock().unwrap() = properties.fps;
        self.shared.consumer.lock().unwrap().reset(&properties);

        {
            let mut strategy = self.consumption_strategy.lock().unwrap();
            if strategy.is_none() {
                *strategy = Some(if properties.is_file() {
                    BufferConsumptionStrategy::Lazy
                } else {
                    BufferConsumptionStrategy::Eager
                });
            }
        }

        self.shared.sentinel_seen.store(false, Ordering::Release);
        self.shared.playback_gate.set();
        self.shared.frames_buffering_allowed.store(true, Ordering::Release);

        let shared = Arc::clone(&self.shared);
        let handle = thread::spawn(move || run_worker(decoder, shared));
        *self.worker_handle.lock().unwrap() = Some(handle);

        Ok(())
    }

    fn pause_locked(&self) -> VideoSourceResult<()> {
        let current = self.shared.state.load();
        if current != StreamState::Running {
            return Err(VideoSourceError::operation_not_allowed(
                "pause",
                current.to_string(),
            ));
        }
        self.shared.playback_gate.clear();
        self.shared.transition(current, StreamState::Paused);
        Ok(())
    }

    fn mute_locked(&self) -> VideoSourceResult<()> {
        let current = self.shared.state.load();
        if current != StreamState::Running {
            return Err(VideoSourceError::operation_not_allowed(
                "mute",
                current.to_string(),
            ));
        }
        self.shared.frames_buffering_allowed.store(false, Ordering::Release);
        self.shared.transition(current, StreamState::Muted);
        Ok(())
    }

    fn resume_locked(&self) -> VideoSourceResult<()> {
        let current = self.shared.state.load();
        match current {
            StreamState::Paused => {
                self.shared.consumer.lock().unwrap().reset_stream_consumption_pace();
                self.shared.playback_gate.set();
                self.shared.transition(current, StreamState::Running);
                Ok(())
            }
            StreamState::Muted => {
                self.shared.frames_buffering_allowed.store(true, Ordering::Release);
                self.shared.transition(current, StreamState::Running);
                Ok(())
            }
            _ => Err(VideoSourceError::operation_not_allowed(
                "resume",
                current.to_string(),
            )),
        }
    }

    fn terminate_locked(&self, drain: bool) -> VideoSourceResult<()> {
        let current = self.shared.state.load();
        if !matches!(
            current,
            StreamState::Muted
                | StreamState::Running
                | StreamState::Paused
                | StreamState::Restarting
                | StreamState::Ended
                | StreamState::Error
        ) {
            return Err(VideoSourceError::operation_not_allowed(
                "terminate",
                current.to_string(),
            ));
        }

        if matches!(current, StreamState::Paused | StreamState::Muted) {
            self.resume_locked()?;
        }

        let pre_terminate = self.shared.state.load();
        self.shared.transition(pre_terminate, StreamState::Terminating);

        if let Some(handle) = self.worker_handle.lock().unwrap().take() {
            let _ = handle.join();
        }
        if drain {
            self.shared.buffer.join();
        }

        let final_state = if current == StreamState::Error {
            StreamState::Error
        } else {
            StreamState::Ended
        };
        self.shared.transition(StreamState::Terminating, final_state);
        Ok(())
    }

    fn restart_locked(&self, drain: bool) -> VideoSourceResult<()> {
        let current = self.shared.state.load();
        if !matches!(
            current,
            StreamState::Muted
                | StreamState::Running
                | StreamState::Paused
                | StreamState::Ended
                | StreamState::Error
        ) {
            return Err(VideoSourceError::operation_not_allowed(
                "restart",
                current.to_string(),
            ));
        }
        self.terminate_locked(drain)?;
        self.shared
            .transition(self.shared.state.load(), StreamState::Restarting);
        self.start_locked()
    }

    // ---- Consumer-facing reads ------------------------------------------

    pub fn frame_ready(&self) -> bool {
        !self.shared.buffer.is_empty()
    }

    pub fn read_frame(&self) -> VideoSourceResult<VideoFrame<D::Frame>> {
        if self.shared.sentinel_seen.load(Ordering::Acquire) {
            return Err(VideoSourceError::end_of_stream());
        }

        let strategy = self
            .consumption_strategy
            .lock()
            .unwrap()
            .unwrap_or(BufferConsumptionStrategy::Lazy);

        let pulled = match strategy {
            BufferConsumptionStrategy::Lazy => vec![self.shared.buffer.get()],
            BufferConsumptionStrategy::Eager => {
                let mut items = self.shared.buffer.drain_all();
                if items.is_empty() {
                    items.push(self.shared.buffer.get());
                    items.extend(self.shared.buffer.drain_all());
                }
                items
            }
        };

        let mut last = None;
        for item in pulled {
            self.shared.buffer.task_done();
            if matches!(item, Item::Frame(_)) {
                self.shared.consumer.lock().unwrap().notify_frame_consumed();
            }
            last = Some(item);
        }

        match last.expect("at least one item was pulled") {
            Item::Frame(frame) => {
                notify(
                    self.shared.listener.as_ref(),
                    &StatusUpdate::new(Severity::Debug, EventType::FrameConsumed, SOURCE_CONTEXT)
                        .with("frame_id", frame.frame_id.to_string())
                        .with("frame_timestamp", system_time_to_string(frame.frame_timestamp)),
                );
                Ok(frame)
            }
            Item::EndOfStream => {
                self.shared.sentinel_seen.store(true, Ordering::Release);
                Err(VideoSourceError::end_of_stream())
            }
        }
    }

    /// A pull-based convenience wrapper: repeated `read_frame` until
    /// `EndOfStreamError`, converted to `None`.
    pub fn frames(&self) -> Frames<'_, D> {
        Frames { source: self }
    }
}

pub struct Frames<'a, D: Decoder> {
    source: &'a VideoSource<D>,
}

impl<'a, D: Decoder> Iterator for Frames<'a, D> {
    type Item = VideoFrame<D::Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.source.read_frame().ok()
    }
}

fn run_worker<D: Decoder>(decoder: D, shared: Arc<Shared<D>>) {
    let previous = shared.state.load();
    shared.transition(previous, StreamState::Running);
    notify(
        shared.listener.as_ref(),
        &StatusUpdate::new(
            Severity::Info,
            EventType::VideoConsumptionStarted,
            SOURCE_CONTEXT,
        ),
    );

    let result = catch_unwind(AssertUnwindSafe(|| {
        let mut decoder = decoder;
        loop {
            if shared.state.load() == StreamState::Terminating {
                break;
            }
            shared.playback_gate.wait();
            let declared_fps = *shared.declared_fps.lock().unwrap();
            // The policy decision is made under the consumer lock, but the
            // lock is released before any enqueue: `buffer.put` can block
            // under WAIT, and `read_frame` needs this same lock to record a
            // consumed frame — holding it across a blocking put deadlocks
            // against a reader that's waiting for the very slot this put
            // would free.
            let outcome = shared.consumer.lock().unwrap().consume_frame(
                &mut decoder,
                declared_fps,
                &shared.buffer,
                &shared.frames_buffering_allowed,
            );
            match outcome {
                FrameOutcome::EndOfStream => break,
                FrameOutcome::Dropped => {}
                FrameOutcome::Enqueue(frame) => shared.buffer.put(Item::Frame(frame)),
            }
        }
        shared.buffer.put_end_of_stream();
        decoder.release();
    }));

    match result {
        Ok(()) => {
            let previous = shared.state.load();
            shared.transition(previous, StreamState::Ended);
            notify(
                shared.listener.as_ref(),
                &StatusUpdate::new(
                    Severity::Info,
                    EventType::VideoConsumptionFinished,
                    SOURCE_CONTEXT,
                ),
            );
        }
        Err(payload) => {
            let reason = panic_message(&payload);
            shared.transition(shared.state.load(), StreamState::Error);
            notify(
                shared.listener.as_ref(),
                &StatusUpdate::new(Severity::Error, EventType::SourceError, SOURCE_CONTEXT)
                    .with("error_type", "InternalDecoderError")
                    .with("error_message", reason),
            );
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "decoder worker panicked with a non-string payload".to_string()
    }
}
