//! # Buffered Video Source
//!
//! A buffered video-source abstraction that sits between a video decoder
//! (a file reader or a live network/camera stream) and a single downstream
//! frame consumer. It decodes frames on a dedicated worker thread, places
//! them into a bounded buffer, and lets a consumer retrieve them — while
//! adapting to mismatches between the producer's frame rate and the
//! consumer's processing rate.
//!
//! ## Architecture
//!
//! - **Synchronous core**: the decoder worker is a plain OS thread, not an
//!   async task — predictable, real-time scheduling without a runtime.
//! - **Bounded, policy-driven buffering**: [`BoundedFrameQueue`] enforces
//!   capacity; [`StreamConsumer`] decides per-frame whether to enqueue,
//!   drop, or adaptively skip.
//! - **Single-writer lifecycle**: every externally triggered transition
//!   (`start`, `pause`, `mute`, `resume`, `terminate`, `restart`) is
//!   serialized under one lock; `state` itself is read lock-free by the
//!   worker thread.
//! - **Pluggable decoder**: the actual decode step is an injected
//!   [`Decoder`] implementation; this crate only owns the buffering,
//!   pacing, and lifecycle logic around it.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use buffered_video_source::config::VideoSourceConfig;
//! use buffered_video_source::listener::NullStatusListener;
//! use buffered_video_source::source::VideoSource;
//! # use buffered_video_source::decoder::Decoder;
//! # use buffered_video_source::error::VideoSourceError;
//! # use buffered_video_source::frame::SourceProperties;
//! # struct MyDecoder;
//! # impl Decoder for MyDecoder {
//! #     type Frame = Vec<u8>;
//! #     type Reference = String;
//! #     fn open(&mut self, _r: &String) -> Result<(), VideoSourceError> { Ok(()) }
//! #     fn is_open(&self) -> bool { true }
//! #     fn grab(&mut self) -> bool { false }
//! #     fn retrieve(&mut self) -> Result<Vec<u8>, VideoSourceError> { Ok(vec![]) }
//! #     fn release(&mut self) {}
//! #     fn properties(&self) -> SourceProperties { SourceProperties { width: 0, height: 0, total_frames: 0, fps: 0.0 } }
//! # }
//!
//! let config = VideoSourceConfig::default();
//! config.validate().expect("invalid config");
//!
//! let source = VideoSource::new(
//!     "clip.mp4",
//!     "clip.mp4".to_string(),
//!     || MyDecoder,
//!     config,
//!     Arc::new(NullStatusListener),
//! );
//!
//! source.start().expect("failed to start");
//! for frame in source.frames() {
//!     println!("got frame {}", frame.frame_id);
//! }
//! ```

pub mod config;
pub mod consumer;
pub mod decoder;
pub mod error;
pub mod frame;
pub mod listener;
pub mod pace;
pub mod queue;
pub mod source;
pub mod state;

pub use config::VideoSourceConfig;
pub use consumer::{BufferConsumptionStrategy, BufferFillingStrategy};
pub use decoder::Decoder;
pub use error::{VideoSourceError, VideoSourceResult};
pub use frame::{SourceMetadata, SourceProperties, VideoFrame};
pub use listener::{EventType, Severity, StatusListener, StatusUpdate};
pub use source::VideoSource;
pub use state::StreamState;
