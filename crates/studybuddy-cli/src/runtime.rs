// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::thread;
use studybuddy_app::{AttachmentError, ImageAttachment, TransportError, TurnRequest};
use studybuddy_llm::Client;
use studybuddy_tui::InternalEvent;

pub struct LlmRuntime {
    client: Client,
    max_image_size: u64,
}

impl LlmRuntime {
    pub fn new(client: Client, max_image_size: u64) -> Self {
        Self {
            client,
            max_image_size,
        }
    }
}

impl studybuddy_tui::AppRuntime for LlmRuntime {
    fn complete_turn(&mut self, request: &TurnRequest) -> Result<String, TransportError> {
        self.client.complete(&request.credential, &request.prompt)
    }

    /// Runs the request on a worker thread so the UI keeps drawing.
    fn spawn_turn(&mut self, request: TurnRequest, tx: Sender<InternalEvent>) -> Result<()> {
        let client = self.client.clone();
        thread::Builder::new()
            .name(format!("chat-turn-{}", request.request_id))
            .spawn(move || {
                report_turn(request.request_id, &tx, || {
                    client.complete(&request.credential, &request.prompt)
                });
            })
            .map_err(|error| anyhow!("spawn chat worker: {error}"))?;
        Ok(())
    }

    fn load_image(&mut self, path: &Path) -> Result<ImageAttachment, AttachmentError> {
        studybuddy_app::load_image(&expand_home(path), self.max_image_size)
    }
}

/// Sends exactly one `ChatTurn` for `request_id`, even when `work` panics,
/// so the session never stays in flight.
fn report_turn<F>(request_id: u64, tx: &Sender<InternalEvent>, work: F)
where
    F: FnOnce() -> Result<String, TransportError>,
{
    let result = panic::catch_unwind(AssertUnwindSafe(work)).unwrap_or_else(|_| {
        tracing::error!(request_id, "chat worker panicked");
        Err(TransportError::Unavailable)
    });
    let _ = tx.send(InternalEvent::ChatTurn { request_id, result });
}

fn expand_home(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}
