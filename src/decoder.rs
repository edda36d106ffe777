//! The decoder contract. A `Decoder` is the injected, external collaborator
//! that owns the actual frame-decoding library (a file reader or a live
//! network/camera stream) — this crate never implements one itself, only
//! the plumbing around it.

use crate::error::VideoSourceError;
use crate::frame::SourceProperties;

/// `reference` is an opaque value to the source — a filesystem path, URL,
/// or device index — interpreted only by the decoder implementation.
///
/// `grab`/`retrieve` are split so the adaptive and drop-latest fill
/// strategies can skip the expensive decode step after a cheap grab: a
/// decoder is expected to make `grab` advance its cursor without producing
/// pixel data, and `retrieve` do the actual decode of the most recently
/// grabbed frame.
///
/// Once `open` hands control to the source's worker thread, nothing else
/// touches the decoder until `release` — ownership via `&mut self` gives
/// this exclusivity for free instead of threading an opaque handle value
/// through every call, as a non-Rust binding of this interface would.
pub trait Decoder: Send + 'static {
    type Frame: Send + 'static;
    type Reference: Clone + Send + Sync + 'static;

    fn open(&mut self, reference: &Self::Reference) -> Result<(), VideoSourceError>;
    fn is_open(&self) -> bool;
    /// Advances to the next frame without decoding pixel data. Returns
    /// `false` on end of stream.
    fn grab(&mut self) -> bool;
    /// Decodes the most recently grabbed frame.
    fn retrieve(&mut self) -> Result<Self::Frame, VideoSourceError>;
    fn release(&mut self);
    fn properties(&self) -> SourceProperties;
}
