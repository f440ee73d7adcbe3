// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use thiserror::Error;

/// Rejected submission. Raised before any I/O happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("nothing to send: type a question or attach an image")]
    EmptySubmission,
    #[error("API key required: enter your OpenAI API key to use the chat feature")]
    MissingCredential,
    #[error("still waiting for the previous reply")]
    TurnInFlight,
}

/// Failure talking to the completion API. Scoped to a single turn.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("cannot reach {endpoint}: {message}")]
    Connection { endpoint: String, message: String },
    #[error("completion API returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("unreadable completion response: {0}")]
    Decode(String),
    #[error("no completion backend configured")]
    Unavailable,
}

impl TransportError {
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("{path} is not an image (detected {mime})")]
    NotAnImage { path: String, mime: String },
    #[error("{path} is {size} bytes; the limit is {limit} bytes")]
    TooLarge { path: String, size: u64, limit: u64 },
    #[error("read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
