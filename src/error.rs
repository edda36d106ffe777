//! Error types for the buffered video source.
//!
//! The taxonomy is intentionally narrow: a caller only ever needs to
//! distinguish "you called this from the wrong state", "the decoder
//! couldn't open its source", "there are no more frames", and "the decoder
//! blew up while the worker was running". Everything else is context
//! attached to one of those four kinds.

use std::{error::Error as StdError, fmt, time::SystemTime};

/// Metadata attached to every [`VideoSourceError`]: when it happened and
/// what the source was doing at the time.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub timestamp: SystemTime,
    pub operation: Option<String>,
    pub context: Option<String>,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            timestamp: SystemTime::now(),
            operation: None,
            context: None,
        }
    }
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// The four error kinds a `VideoSource` can raise.
#[derive(Debug)]
pub enum VideoSourceError {
    /// A lifecycle method was invoked from a state it isn't eligible for.
    /// No state change occurs.
    StreamOperationNotAllowed {
        attempted_operation: String,
        current_state: String,
        context: ErrorContext,
    },
    /// The decoder failed to open its reference. The source transitions to
    /// `ERROR`.
    SourceConnection {
        reference: String,
        reason: String,
        context: ErrorContext,
    },
    /// The consumer tried to read past the end-of-stream sentinel.
    EndOfStream { context: ErrorContext },
    /// The decoder raised while the worker was running. Caught inside the
    /// worker, never propagated across the thread boundary directly; the
    /// caller observes it via the `ERROR` state and a `SOURCE_ERROR` event.
    InternalDecoder {
        reason: String,
        context: ErrorContext,
    },
}

impl VideoSourceError {
    pub fn operation_not_allowed(
        attempted_operation: impl Into<String>,
        current_state: impl Into<String>,
    ) -> Self {
        Self::StreamOperationNotAllowed {
            attempted_operation: attempted_operation.into(),
            current_state: current_state.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn source_connection(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SourceConnection {
            reference: reference.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn end_of_stream() -> Self {
        Self::EndOfStream {
            context: ErrorContext::new(),
        }
    }

    pub fn internal_decoder(reason: impl Into<String>) -> Self {
        Self::InternalDecoder {
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context_mut().context = Some(context.into());
        self
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.context_mut().operation = Some(operation.into());
        self
    }

    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::StreamOperationNotAllowed { context, .. } => context,
            Self::SourceConnection { context, .. } => context,
            Self::EndOfStream { context } => context,
            Self::InternalDecoder { context, .. } => context,
        }
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            Self::StreamOperationNotAllowed { context, .. } => context,
            Self::SourceConnection { context, .. } => context,
            Self::EndOfStream { context } => context,
            Self::InternalDecoder { context, .. } => context,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::StreamOperationNotAllowed { .. } => "operation_not_allowed",
            Self::SourceConnection { .. } => "source_connection",
            Self::EndOfStream { .. } => "end_of_stream",
            Self::InternalDecoder { .. } => "internal_decoder",
        }
    }
}

impl fmt::Display for VideoSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StreamOperationNotAllowed {
                attempted_operation,
                current_state,
                ..
            } => write!(
                f,
                "'{attempted_operation}' is not allowed while the source is {current_state}"
            ),
            Self::SourceConnection {
                reference, reason, ..
            } => write!(f, "failed to open source '{reference}': {reason}"),
            Self::EndOfStream { .. } => write!(f, "end of stream"),
            Self::InternalDecoder { reason, .. } => write!(f, "decoder error: {reason}"),
        }
    }
}

impl StdError for VideoSourceError {}

pub type VideoSourceResult<T> = Result<T, VideoSourceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_matches_variant() {
        let err = VideoSourceError::operation_not_allowed("pause", "ENDED");
        assert_eq!(err.category(), "operation_not_allowed");
    }

    #[test]
    fn display_is_human_readable() {
        let err = VideoSourceError::source_connection("rtsp://bad-host", "connection refused");
        assert_eq!(
            err.to_string(),
            "failed to open source 'rtsp://bad-host': connection refused"
        );
    }

    #[test]
    fn context_builder_methods_stack() {
        let err = VideoSourceError::internal_decoder("codec panic")
            .with_operation("consume_frame")
            .with_context("frame 42");
        assert_eq!(err.context().operation.as_deref(), Some("consume_frame"));
        assert_eq!(err.context().context.as_deref(), Some("frame 42"));
    }
}
