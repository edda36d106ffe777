//! Per-frame policy engine: decides whether a just-grabbed frame is
//! decoded and enqueued, dropped to make room, or skipped outright, based
//! on the configured fill strategy and the three [`PaceMonitor`]s.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use crate::decoder::Decoder;
use crate::frame::{SourceProperties, VideoFrame};
use crate::listener::{notify, EventType, Severity, StatusListener, StatusUpdate};
use crate::pace::{projected_fps_if_tick_now, PaceMonitor};
use crate::queue::{BoundedFrameQueue, Item};

const CONSUMER_CONTEXT: &str = "video_source.video_consumer";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferFillingStrategy {
    Wait,
    DropOldest,
    DropLatest,
    AdaptiveDropOldest,
    AdaptiveDropLatest,
}

impl BufferFillingStrategy {
    pub fn is_adaptive(self) -> bool {
        matches!(self, Self::AdaptiveDropOldest | Self::AdaptiveDropLatest)
    }

    pub fn is_drop_oldest_family(self) -> bool {
        matches!(self, Self::DropOldest | Self::AdaptiveDropOldest)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferConsumptionStrategy {
    Lazy,
    Eager,
}

/// Tunables a `VideoSource` hands down to its `StreamConsumer` at
/// construction; mirrors the `Configuration` table.
#[derive(Debug, Clone, Copy)]
pub struct ConsumerTuning {
    pub adaptive_mode_stream_pace_tolerance: f64,
    pub adaptive_mode_reader_pace_tolerance: f64,
    pub minimum_adaptive_mode_samples: usize,
    pub maximum_adaptive_frames_dropped_in_row: usize,
}

/// What the policy engine decided for one grabbed frame. The caller enqueues
/// `Enqueue` itself, after releasing the `StreamConsumer` lock — `buffer.put`
/// can block under WAIT, and must never be called while holding it.
pub enum FrameOutcome<F> {
    EndOfStream,
    Dropped,
    Enqueue(VideoFrame<F>),
}

pub struct StreamConsumer {
    fill_strategy: Option<BufferFillingStrategy>,
    tuning: ConsumerTuning,
    frame_counter: u64,
    adaptive_frames_dropped_in_row: usize,
    stream_consumption_pace: PaceMonitor,
    decoding_pace: PaceMonitor,
    reader_pace: PaceMonitor,
    listener: Arc<dyn StatusListener>,
}

impl StreamConsumer {
    pub fn new(
        fill_strategy: Option<BufferFillingStrategy>,
        tuning: ConsumerTuning,
        listener: Arc<dyn StatusListener>,
    ) -> Self {
        let floor = tuning.minimum_adaptive_mode_samples;
        Self {
            fill_strategy,
            tuning,
            frame_counter: 0,
            adaptive_frames_dropped_in_row: 0,
            stream_consumption_pace: PaceMonitor::new(floor),
            decoding_pace: PaceMonitor::new(floor),
            reader_pace: PaceMonitor::new(floor),
            listener,
        }
    }

    pub fn fill_strategy(&self) -> Option<BufferFillingStrategy> {
        self.fill_strategy
    }

    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    /// Picks a fill strategy by source kind if one wasn't configured, and
    /// resets all pace state for a fresh decode.
    pub fn reset(&mut self, source_properties: &SourceProperties) {
        if self.fill_strategy.is_none() {
            self.fill_strategy = Some(if source_properties.is_file() {
                BufferFillingStrategy::Wait
            } else {
                BufferFillingStrategy::AdaptiveDropOldest
            });
        }
        self.stream_consumption_pace.reset();
        self.decoding_pace.reset();
        self.reader_pace.reset();
        self.adaptive_frames_dropped_in_row = 0;
        self.frame_counter = 0;
    }

    /// Called when resuming from `PAUSED`: the time spent paused would
    /// otherwise read as a pace collapse.
    pub fn reset_stream_consumption_pace(&mut self) {
        self.stream_consumption_pace.reset();
    }

    /// Ticked by the source every time `read_frame` hands a frame to the
    /// caller. The only pace monitor the consumer doesn't drive itself.
    pub fn notify_frame_consumed(&mut self) {
        self.reader_pace.tick();
    }

    /// One iteration of the decoder worker's loop body. Decides what to do
    /// with a just-grabbed frame but never enqueues it — the caller does
    /// that (via [`FrameOutcome::Enqueue`]) after releasing the lock this
    /// method was called under, since the enqueue can block under WAIT and
    /// `read_frame` needs that same lock to record a consumed frame.
    pub fn consume_frame<D: Decoder>(
        &mut self,
        decoder: &mut D,
        declared_fps: f64,
        buffer: &BoundedFrameQueue<D::Frame>,
        frames_buffering_allowed: &AtomicBool,
    ) -> FrameOutcome<D::Frame> {
        let frame_timestamp = SystemTime::now();

        let grabbed = decoder.grab();
        self.stream_consumption_pace.tick();
        if !grabbed {
            return FrameOutcome::EndOfStream;
        }

        self.frame_counter += 1;
        notify(
            self.listener.as_ref(),
            &StatusUpdate::new(Severity::Debug, EventType::FrameCaptured, CONSUMER_CONTEXT)
                .with("frame_id", self.frame_counter.to_string())
                .with("frame_timestamp", system_time_to_string(frame_timestamp)),
        );

        if !frames_buffering_allowed.load(Ordering::Acquire) {
            self.emit_dropped(self.frame_counter, frame_timestamp, "muted");
            return FrameOutcome::Dropped;
        }

        if self.should_adaptively_drop(declared_fps) {
            self.adaptive_frames_dropped_in_row += 1;
            self.emit_dropped(self.frame_counter, frame_timestamp, "adaptive");
            return FrameOutcome::Dropped;
        }
        self.adaptive_frames_dropped_in_row = 0;

        let fill_strategy = self
            .fill_strategy
            .expect("fill strategy chosen by reset() before any consume_frame call");

        if !buffer.is_full() || fill_strategy == BufferFillingStrategy::Wait {
            return self.decode_frame(decoder, frame_timestamp);
        }

        if fill_strategy.is_drop_oldest_family() {
            if let Ok(dropped) = buffer.try_get_nowait() {
                buffer.task_done();
                if let Item::Frame(dropped) = dropped {
                    self.emit_dropped(dropped.frame_id, dropped.frame_timestamp, "drop_oldest");
                }
            }
            return self.decode_frame(decoder, frame_timestamp);
        }

        // DROP_LATEST family: the frame was grabbed but never retrieved.
        self.emit_dropped(self.frame_counter, frame_timestamp, "drop_latest");
        FrameOutcome::Dropped
    }

    /// Retrieves the grabbed frame's payload and ticks the decode pace, but
    /// leaves enqueueing it to the caller.
    fn decode_frame<D: Decoder>(
        &mut self,
        decoder: &mut D,
        frame_timestamp: SystemTime,
    ) -> FrameOutcome<D::Frame> {
        match decoder.retrieve() {
            Ok(payload) => {
                self.decoding_pace.tick();
                FrameOutcome::Enqueue(VideoFrame {
                    frame_id: self.frame_counter,
                    frame_timestamp,
                    payload,
                })
            }
            Err(_) => FrameOutcome::EndOfStream,
        }
    }

    fn should_adaptively_drop(&self, declared_fps: f64) -> bool {
        let Some(fill_strategy) = self.fill_strategy else {
            return false;
        };
        if !fill_strategy.is_adaptive() {
            return false;
        }
        if self.adaptive_frames_dropped_in_row >= self.tuning.maximum_adaptive_frames_dropped_in_row
        {
            return false;
        }
        if self.stream_consumption_pace.sample_count() <= self.tuning.minimum_adaptive_mode_samples
        {
            return false;
        }

        let measured = self.stream_consumption_pace.fps();
        let announced = if declared_fps > 0.0 {
            declared_fps
        } else {
            measured
        };
        if announced - measured > self.tuning.adaptive_mode_stream_pace_tolerance {
            return true;
        }

        if self.reader_pace.sample_count() <= self.tuning.minimum_adaptive_mode_samples
            || self.decoding_pace.sample_count() <= self.tuning.minimum_adaptive_mode_samples
        {
            return false;
        }
        let projected_reader = projected_fps_if_tick_now(&self.reader_pace);
        let decoding = self.decoding_pace.fps();
        decoding - projected_reader > self.tuning.adaptive_mode_reader_pace_tolerance
    }

    fn emit_dropped(&self, frame_id: u64, frame_timestamp: SystemTime, cause: &str) {
        let update = StatusUpdate::new(Severity::Debug, EventType::FrameDropped, CONSUMER_CONTEXT)
            .with("frame_id", frame_id.to_string())
            .with("cause", cause)
            .with("frame_timestamp", system_time_to_string(frame_timestamp));
        notify(self.listener.as_ref(), &update);
    }
}

/// Seconds since the Unix epoch, as a string, for `StatusUpdate` payloads.
pub(crate) fn system_time_to_string(timestamp: SystemTime) -> String {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs_f64().to_string())
        .unwrap_or_default()
}
