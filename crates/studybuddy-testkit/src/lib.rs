// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use studybuddy_app::{CLASS_LEVELS, Difficulty, MaterialId, MaterialKind, StudyMaterial};
use tiny_http::{Header, Response, Server};

/// Base URL nothing listens on.
pub const UNREACHABLE_BASE_URL: &str = "http://127.0.0.1:1/v1";

/// 1x1 transparent PNG.
pub const SAMPLE_PNG: [u8; 67] = [
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

const SUBJECTS: [&str; 8] = [
    "Mathematics",
    "Biology",
    "Chemistry",
    "Physics",
    "History",
    "English",
    "Geography",
    "Economics",
];

const TOPICS: [&str; 16] = [
    "Fractions",
    "Mitosis",
    "Periodic Table",
    "Newton's Laws",
    "French Revolution",
    "Poetry",
    "Plate Tectonics",
    "Supply and Demand",
    "Linear Equations",
    "Genetics",
    "Acids and Bases",
    "Electric Circuits",
    "Cold War",
    "Essay Structure",
    "Climate Zones",
    "Inflation",
];

const QUESTION_STEMS: [&str; 6] = [
    "Can you explain",
    "What is the main idea behind",
    "Give me a quick summary of",
    "How do I study",
    "Why does my textbook emphasize",
    "Quiz me on",
];

const MATERIAL_KINDS: [MaterialKind; 4] = [
    MaterialKind::Notes,
    MaterialKind::Guide,
    MaterialKind::Practice,
    MaterialKind::Video,
];

const DIFFICULTIES: [Difficulty; 3] = [
    Difficulty::Beginner,
    Difficulty::Intermediate,
    Difficulty::Advanced,
];

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }
}

/// Seeded generator for questions and catalog records.
#[derive(Debug, Clone)]
pub struct StudyFaker {
    rng: DeterministicRng,
}

impl StudyFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
        }
    }

    pub fn question(&mut self) -> String {
        let stem = self.pick(&QUESTION_STEMS);
        let topic = self.pick(&TOPICS);
        format!("{stem} {topic}?")
    }

    pub fn material(&mut self, id: i64) -> StudyMaterial {
        let topic = self.pick(&TOPICS);
        let subject = self.pick(&SUBJECTS);
        let class_level = self.pick(&CLASS_LEVELS);
        let kind = MATERIAL_KINDS[self.rng.int_n(MATERIAL_KINDS.len())];
        let difficulty = DIFFICULTIES[self.rng.int_n(DIFFICULTIES.len())];
        StudyMaterial {
            id: MaterialId::new(id),
            title: format!("{topic} {}", title_suffix(kind)),
            description: format!("{} material on {topic} for {class_level}", subject),
            class_level: class_level.to_owned(),
            subject: subject.to_owned(),
            kind,
            difficulty,
        }
    }

    pub fn catalog(&mut self, count: usize) -> Vec<StudyMaterial> {
        (1..=count as i64).map(|id| self.material(id)).collect()
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }
}

fn title_suffix(kind: MaterialKind) -> &'static str {
    match kind {
        MaterialKind::Notes => "Notes",
        MaterialKind::Guide => "Study Guide",
        MaterialKind::Practice => "Practice Set",
        MaterialKind::Video => "Video Lesson",
    }
}

pub fn write_sample_image(dir: &Path, name: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, SAMPLE_PNG).with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}

/// JSON body of a successful chat completion carrying `content`.
pub fn completion_body(content: &str) -> String {
    serde_json::json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop",
        }],
    })
    .to_string()
}

/// JSON body in the OpenAI error envelope shape.
pub fn error_body(message: &str) -> String {
    serde_json::json!({
        "error": { "message": message, "type": "invalid_request_error" },
    })
    .to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockResponse {
    pub status: u16,
    pub body: String,
    pub delay: Duration,
}

impl MockResponse {
    pub fn completion(content: &str) -> Self {
        Self::raw(200, completion_body(content))
    }

    pub fn error(status: u16, message: &str) -> Self {
        Self::raw(status, error_body(message))
    }

    pub fn raw(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub url: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: String,
}

impl RecordedRequest {
    pub fn json(&self) -> Result<serde_json::Value> {
        serde_json::from_str(&self.body).context("decode recorded request body")
    }
}

/// Local HTTP server that answers with queued responses in order and
/// records what it received.
pub struct MockCompletionServer {
    base_url: String,
    handle: Option<JoinHandle<Result<Vec<RecordedRequest>>>>,
}

impl MockCompletionServer {
    pub fn start(responses: Vec<MockResponse>) -> Result<Self> {
        let server =
            Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
        let base_url = format!("http://{}/v1", server.server_addr());

        let handle = thread::spawn(move || serve(&server, responses));
        Ok(Self {
            base_url,
            handle: Some(handle),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Waits for the queued responses to be served, or for the server to
    /// go idle, and returns the recorded requests.
    pub fn finish(mut self) -> Result<Vec<RecordedRequest>> {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| anyhow!("mock server already finished"))?;
        handle
            .join()
            .map_err(|_| anyhow!("mock server thread panicked"))?
    }
}

const IDLE_TIMEOUT: Duration = Duration::from_secs(5);

fn serve(server: &Server, responses: Vec<MockResponse>) -> Result<Vec<RecordedRequest>> {
    let mut recorded = Vec::with_capacity(responses.len());
    for queued in responses {
        let Some(mut request) = server
            .recv_timeout(IDLE_TIMEOUT)
            .context("receive mock request")?
        else {
            break;
        };

        let mut body = String::new();
        request
            .as_reader()
            .read_to_string(&mut body)
            .context("read mock request body")?;
        recorded.push(RecordedRequest {
            method: request.method().to_string(),
            url: request.url().to_owned(),
            authorization: header_value(request.headers(), "Authorization"),
            content_type: header_value(request.headers(), "Content-Type"),
            body,
        });

        if !queued.delay.is_zero() {
            thread::sleep(queued.delay);
        }
        let content_type = Header::from_bytes("Content-Type", "application/json")
            .map_err(|()| anyhow!("build content type header"))?;
        let response = Response::from_string(queued.body)
            .with_status_code(queued.status)
            .with_header(content_type);
        // The client may have given up already; that is what timeout tests expect.
        let _ = request.respond(response);
    }
    Ok(recorded)
}

fn header_value(headers: &[Header], name: &str) -> Option<String> {
    headers
        .iter()
        .find(|header| header.field.to_string().eq_ignore_ascii_case(name))
        .map(|header| header.value.as_str().to_owned())
}
