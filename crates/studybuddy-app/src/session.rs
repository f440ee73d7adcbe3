// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use secrecy::{ExposeSecret, SecretString};
use time::OffsetDateTime;

use crate::{ChatMessage, ImageAttachment, MessageId, Sender, TransportError, ValidationError};

pub const GREETING: &str = "Hello! I'm your AI study assistant. You can ask me questions, upload photos of problems, or get help with any subject. How can I help you today?";
pub const IMAGE_MARKER: &str = " [User uploaded an image]";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PendingInput {
    pub text: String,
    pub image: Option<ImageAttachment>,
}

impl PendingInput {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.image.is_none()
    }
}

/// Everything the transport needs for one turn.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub request_id: u64,
    pub prompt: String,
    pub credential: SecretString,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Replied(MessageId),
    Failed(TransportError),
    /// The completion belonged to a turn that is no longer in flight.
    Stale,
}

#[derive(Debug)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
    input: PendingInput,
    credential: SecretString,
    in_flight: Option<u64>,
    next_request_id: u64,
    last_message_id: i64,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::empty()
    }
}

impl ChatSession {
    /// A session opened with the assistant greeting.
    pub fn new() -> Self {
        let mut session = Self::empty();
        session.push_message(GREETING.to_owned(), Sender::Assistant, None, now());
        session
    }

    pub fn empty() -> Self {
        Self {
            messages: Vec::new(),
            input: PendingInput::default(),
            credential: SecretString::from(String::new()),
            in_flight: None,
            next_request_id: 0,
            last_message_id: 0,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn input(&self) -> &PendingInput {
        &self.input
    }

    pub fn input_text_mut(&mut self) -> &mut String {
        &mut self.input.text
    }

    pub fn set_input_text(&mut self, text: impl Into<String>) {
        self.input.text = text.into();
    }

    pub fn attach_image(&mut self, image: ImageAttachment) {
        self.input.image = Some(image);
    }

    pub fn clear_image(&mut self) -> bool {
        self.input.image.take().is_some()
    }

    /// Edits the credential in place, as a masked input field does.
    pub fn edit_credential(&mut self, edit: impl FnOnce(&mut String)) {
        let mut value = self.credential.expose_secret().to_owned();
        edit(&mut value);
        self.credential = SecretString::from(value);
    }

    pub fn credential_len(&self) -> usize {
        self.credential.expose_secret().chars().count()
    }

    pub fn has_credential(&self) -> bool {
        !self.credential.expose_secret().trim().is_empty()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn begin_turn(&mut self) -> Result<TurnRequest, ValidationError> {
        self.begin_turn_at(now())
    }

    /// Validates the pending input, appends the user message and marks the
    /// turn in flight. Nothing is appended when validation fails.
    pub fn begin_turn_at(&mut self, at: OffsetDateTime) -> Result<TurnRequest, ValidationError> {
        if self.input.is_empty() {
            return Err(ValidationError::EmptySubmission);
        }
        if !self.has_credential() {
            return Err(ValidationError::MissingCredential);
        }
        if self.in_flight.is_some() {
            return Err(ValidationError::TurnInFlight);
        }

        let PendingInput { text, image } = std::mem::take(&mut self.input);
        let prompt = if image.is_some() {
            format!("{text}{IMAGE_MARKER}")
        } else {
            text.clone()
        };
        self.push_message(
            text,
            Sender::User,
            image.map(|attachment| attachment.data_uri),
            at,
        );

        self.next_request_id = self.next_request_id.wrapping_add(1).max(1);
        let request_id = self.next_request_id;
        self.in_flight = Some(request_id);
        tracing::info!(request_id, prompt_chars = prompt.chars().count(), "chat turn started");

        Ok(TurnRequest {
            request_id,
            prompt,
            credential: self.credential.clone(),
        })
    }

    pub fn finish_turn(
        &mut self,
        request_id: u64,
        result: Result<String, TransportError>,
    ) -> TurnOutcome {
        self.finish_turn_at(request_id, result, now())
    }

    /// Settles the in-flight turn. The in-flight marker is cleared on every
    /// path that matches the outstanding request.
    pub fn finish_turn_at(
        &mut self,
        request_id: u64,
        result: Result<String, TransportError>,
        at: OffsetDateTime,
    ) -> TurnOutcome {
        if self.in_flight != Some(request_id) {
            tracing::debug!(request_id, "ignoring completion for stale turn");
            return TurnOutcome::Stale;
        }
        self.in_flight = None;

        match result {
            Ok(reply) => {
                tracing::info!(request_id, reply_chars = reply.chars().count(), "chat turn answered");
                TurnOutcome::Replied(self.push_message(reply, Sender::Assistant, None, at))
            }
            Err(error) => {
                tracing::warn!(request_id, %error, "chat turn failed");
                TurnOutcome::Failed(error)
            }
        }
    }

    /// Runs both phases of a turn around `send`.
    pub fn submit_turn<F>(&mut self, send: F) -> Result<TurnOutcome, ValidationError>
    where
        F: FnOnce(&TurnRequest) -> Result<String, TransportError>,
    {
        let request = self.begin_turn()?;
        let result = send(&request);
        Ok(self.finish_turn(request.request_id, result))
    }

    fn push_message(
        &mut self,
        text: String,
        sender: Sender,
        image: Option<String>,
        at: OffsetDateTime,
    ) -> MessageId {
        let millis = (at.unix_timestamp_nanos() / 1_000_000) as i64;
        let id = millis.max(self.last_message_id.saturating_add(1));
        self.last_message_id = id;
        let id = MessageId::new(id);
        self.messages.push(ChatMessage {
            id,
            text,
            sender,
            image,
        });
        id
    }
}

fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}
