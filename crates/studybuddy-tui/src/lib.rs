// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Tabs, Wrap};
use std::io;
use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use studybuddy_app::{
    AppCommand, AppState, AttachmentError, ChatSession, Difficulty, ImageAttachment,
    MaterialFilter, MaterialKind, Screen, Sender as Author, StudyMaterial, TransportError,
    TurnOutcome, TurnRequest, ValidationError, builtin_catalog,
};

const STATUS_CLEAR_DELAY: Duration = Duration::from_secs(4);
const TRANSCRIPT_TAIL: usize = 40;
const LANDING_ENTRIES: [Screen; 2] = [Screen::Chat, Screen::Materials];
const THINKING: &str = "Thinking...";

/// Seam between the UI loop and the completion backend.
pub trait AppRuntime {
    fn complete_turn(&mut self, request: &TurnRequest) -> Result<String, TransportError>;
    fn load_image(&mut self, path: &Path) -> Result<ImageAttachment, AttachmentError>;
    fn spawn_turn(&mut self, request: TurnRequest, tx: Sender<InternalEvent>) -> Result<()> {
        let result = self.complete_turn(&request);
        tx.send(InternalEvent::ChatTurn {
            request_id: request.request_id,
            result,
        })
        .map_err(|_| anyhow!("chat event channel closed"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    ClearStatus {
        token: u64,
    },
    ChatTurn {
        request_id: u64,
        result: Result<String, TransportError>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ChatFocus {
    #[default]
    ApiKey,
    Message,
}

impl ChatFocus {
    const fn toggle(self) -> Self {
        match self {
            Self::ApiKey => Self::Message,
            Self::Message => Self::ApiKey,
        }
    }
}

#[derive(Debug)]
struct ChatUiState {
    session: ChatSession,
    focus: ChatFocus,
    attach_prompt: Option<String>,
    notice: Option<String>,
}

impl Default for ChatUiState {
    fn default() -> Self {
        Self {
            session: ChatSession::new(),
            focus: ChatFocus::default(),
            attach_prompt: None,
            notice: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct MaterialsUiState {
    catalog: Vec<StudyMaterial>,
    filter: MaterialFilter,
    cursor: usize,
}

impl Default for MaterialsUiState {
    fn default() -> Self {
        Self {
            catalog: builtin_catalog(),
            filter: MaterialFilter::default(),
            cursor: 0,
        }
    }
}

impl MaterialsUiState {
    fn visible(&self) -> Vec<&StudyMaterial> {
        self.filter.apply(&self.catalog)
    }

    fn selected(&self) -> Option<&StudyMaterial> {
        self.visible().get(self.cursor).copied()
    }

    fn clamp_cursor(&mut self) {
        let len = self.visible().len();
        self.cursor = self.cursor.min(len.saturating_sub(1));
    }
}

#[derive(Debug, Default)]
struct ViewData {
    chat: ChatUiState,
    materials: MaterialsUiState,
    landing_cursor: usize,
    help_visible: bool,
    status_token: u64,
}

pub fn run_app<R: AppRuntime>(state: &mut AppState, runtime: &mut R) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::default();
    let (internal_tx, internal_rx) = mpsc::channel();
    tracing::info!(screen = state.screen.label(), "terminal ui started");

    let mut result = Ok(());
    loop {
        process_internal_events(state, &mut view_data, &internal_tx, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = match event::poll(Duration::from_millis(120)).context("poll event") {
            Ok(has_event) => has_event,
            Err(error) => {
                result = Err(error);
                break;
            }
        };
        if has_event {
            match event::read().context("read event") {
                Ok(Event::Key(key)) => {
                    if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Ok(_) => {}
                Err(error) => {
                    result = Err(error);
                    break;
                }
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    tracing::info!("terminal ui stopped");
    result
}

fn process_internal_events(
    state: &mut AppState,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::ChatTurn { request_id, result } => {
                handle_chat_turn(state, view_data, tx, request_id, result);
            }
        }
    }
}

fn handle_chat_turn(
    state: &mut AppState,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    request_id: u64,
    result: Result<String, TransportError>,
) {
    match view_data.chat.session.finish_turn(request_id, result) {
        TurnOutcome::Replied(_) => {
            view_data.chat.notice = None;
        }
        TurnOutcome::Failed(error) => {
            let message = format!("Error: {error}");
            view_data.chat.notice = Some(message.clone());
            emit_status(state, view_data, tx, message);
        }
        TurnOutcome::Stale => {}
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(STATUS_CLEAR_DELAY);
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    state.dispatch(AppCommand::SetStatus(message.into()));
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn handle_key_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    let control = key.modifiers.contains(KeyModifiers::CONTROL);
    if key.code == KeyCode::Char('q') && control {
        return true;
    }

    if key.code == KeyCode::F(1) {
        view_data.help_visible = !view_data.help_visible;
        return false;
    }

    if view_data.help_visible {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('?')) {
            view_data.help_visible = false;
        }
        return false;
    }

    match key.code {
        KeyCode::Char('n') if control => {
            state.dispatch(AppCommand::NextScreen);
            return false;
        }
        KeyCode::Char('p') if control => {
            state.dispatch(AppCommand::PrevScreen);
            return false;
        }
        _ => {}
    }

    match state.screen {
        Screen::Landing => handle_landing_key(state, view_data, key),
        Screen::Chat => {
            handle_chat_key(state, runtime, view_data, internal_tx, key);
            false
        }
        Screen::Materials => {
            handle_materials_key(state, view_data, internal_tx, key);
            false
        }
    }
}

fn handle_landing_key(state: &mut AppState, view_data: &mut ViewData, key: KeyEvent) -> bool {
    if !key.modifiers.is_empty() && key.modifiers != KeyModifiers::SHIFT {
        return false;
    }
    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Up | KeyCode::Left | KeyCode::Char('k') | KeyCode::Char('h') => {
            move_landing_cursor(view_data, -1);
        }
        KeyCode::Down | KeyCode::Right | KeyCode::Char('j') | KeyCode::Char('l') => {
            move_landing_cursor(view_data, 1);
        }
        KeyCode::Enter => {
            let target = LANDING_ENTRIES[view_data.landing_cursor.min(LANDING_ENTRIES.len() - 1)];
            state.dispatch(AppCommand::Navigate(target));
        }
        KeyCode::Char('c') => {
            state.dispatch(AppCommand::Navigate(Screen::Chat));
        }
        KeyCode::Char('m') => {
            state.dispatch(AppCommand::Navigate(Screen::Materials));
        }
        KeyCode::Char('?') => view_data.help_visible = true,
        _ => {}
    }
    false
}

fn move_landing_cursor(view_data: &mut ViewData, delta: isize) {
    let len = LANDING_ENTRIES.len() as isize;
    let next = (view_data.landing_cursor as isize + delta).rem_euclid(len);
    view_data.landing_cursor = next as usize;
}

fn handle_chat_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    if view_data.chat.attach_prompt.is_some() {
        handle_attach_prompt_key(state, runtime, view_data, internal_tx, key);
        return;
    }

    let control = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Esc => {
            state.dispatch(AppCommand::Navigate(Screen::Landing));
        }
        KeyCode::Tab | KeyCode::BackTab => {
            view_data.chat.focus = view_data.chat.focus.toggle();
        }
        KeyCode::Char('a') if control => {
            view_data.chat.attach_prompt = Some(String::new());
        }
        KeyCode::Char('x') if control => {
            let status = if view_data.chat.session.clear_image() {
                "image removed"
            } else {
                "no image attached"
            };
            emit_status(state, view_data, internal_tx, status);
        }
        KeyCode::Enter => submit_chat_input(state, runtime, view_data, internal_tx),
        KeyCode::Backspace => match view_data.chat.focus {
            ChatFocus::ApiKey => view_data.chat.session.edit_credential(|value| {
                value.pop();
            }),
            ChatFocus::Message => {
                view_data.chat.session.input_text_mut().pop();
            }
        },
        KeyCode::Char(ch) if !control => match view_data.chat.focus {
            ChatFocus::ApiKey => view_data
                .chat
                .session
                .edit_credential(|value| value.push(ch)),
            ChatFocus::Message => view_data.chat.session.input_text_mut().push(ch),
        },
        _ => {}
    }
}

fn handle_attach_prompt_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(path) = view_data.chat.attach_prompt.as_mut() else {
        return;
    };

    match key.code {
        KeyCode::Esc => {
            view_data.chat.attach_prompt = None;
            emit_status(state, view_data, internal_tx, "attach canceled");
        }
        KeyCode::Backspace => {
            path.pop();
        }
        KeyCode::Enter => {
            let raw = path.trim().to_owned();
            if raw.is_empty() {
                emit_status(state, view_data, internal_tx, "type the path of an image file");
                return;
            }
            match runtime.load_image(Path::new(&raw)) {
                Ok(image) => {
                    let message = format!(
                        "attached {} ({})",
                        image.file_name,
                        format_size(image.size_bytes)
                    );
                    view_data.chat.session.attach_image(image);
                    view_data.chat.attach_prompt = None;
                    emit_status(state, view_data, internal_tx, message);
                }
                Err(error) => {
                    tracing::warn!(%error, "image attach failed");
                    emit_status(
                        state,
                        view_data,
                        internal_tx,
                        format!("attach failed: {error}"),
                    );
                }
            }
        }
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => path.push(ch),
        _ => {}
    }
}

fn submit_chat_input<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let request = match view_data.chat.session.begin_turn() {
        Ok(request) => request,
        Err(error) => {
            if error == ValidationError::MissingCredential {
                view_data.chat.focus = ChatFocus::ApiKey;
            }
            let message = error.to_string();
            view_data.chat.notice = Some(message.clone());
            emit_status(state, view_data, internal_tx, message);
            return;
        }
    };

    view_data.chat.notice = None;
    view_data.chat.focus = ChatFocus::Message;
    let request_id = request.request_id;
    if let Err(error) = runtime.spawn_turn(request, internal_tx.clone()) {
        tracing::warn!(request_id, %error, "chat turn could not start");
        view_data
            .chat
            .session
            .finish_turn(request_id, Err(TransportError::Unavailable));
        let message = format!("Error: {error}");
        view_data.chat.notice = Some(message.clone());
        emit_status(state, view_data, internal_tx, message);
    }
}

fn handle_materials_key(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let control = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Esc => {
            state.dispatch(AppCommand::Navigate(Screen::Landing));
        }
        KeyCode::Char('r') if control => {
            view_data.materials.filter.clear();
            view_data.materials.cursor = 0;
            emit_status(state, view_data, internal_tx, "filters cleared");
        }
        KeyCode::Left => {
            view_data.materials.filter.cycle_class(-1);
            view_data.materials.cursor = 0;
        }
        KeyCode::Right => {
            view_data.materials.filter.cycle_class(1);
            view_data.materials.cursor = 0;
        }
        KeyCode::Up => {
            view_data.materials.cursor = view_data.materials.cursor.saturating_sub(1);
        }
        KeyCode::Down => {
            view_data.materials.cursor = view_data.materials.cursor.saturating_add(1);
        }
        KeyCode::Home => view_data.materials.cursor = 0,
        KeyCode::End => view_data.materials.cursor = usize::MAX,
        KeyCode::Backspace => {
            view_data.materials.filter.query.pop();
            view_data.materials.cursor = 0;
        }
        KeyCode::Char(ch) if !control => {
            view_data.materials.filter.query.push(ch);
            view_data.materials.cursor = 0;
        }
        _ => {}
    }
    view_data.materials.clamp_cursor();
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let selected = Screen::ALL
        .iter()
        .position(|screen| *screen == state.screen)
        .unwrap_or(0);
    let titles = Screen::ALL
        .iter()
        .map(|screen| screen.label())
        .collect::<Vec<_>>();
    let tabs = Tabs::new(titles)
        .block(Block::default().title("studybuddy").borders(Borders::ALL))
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .select(selected);
    frame.render_widget(tabs, layout[0]);

    match state.screen {
        Screen::Landing => {
            let body = Paragraph::new(render_landing_text(view_data.landing_cursor))
                .wrap(Wrap { trim: false })
                .block(Block::default().borders(Borders::ALL).title("home"));
            frame.render_widget(body, layout[1]);
        }
        Screen::Chat => render_chat(frame, layout[1], &view_data.chat),
        Screen::Materials => render_materials(frame, layout[1], &view_data.materials),
    }

    let status_widget = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status_widget, layout[2]);

    if state.screen == Screen::Chat
        && let Some(path) = &view_data.chat.attach_prompt
    {
        let area = centered_rect(64, 24, frame.area());
        frame.render_widget(Clear, area);
        let prompt = Paragraph::new(render_attach_prompt_text(path))
            .wrap(Wrap { trim: false })
            .block(Block::default().title("attach image").borders(Borders::ALL));
        frame.render_widget(prompt, area);
    }

    if view_data.help_visible {
        let area = centered_rect(80, 60, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn render_landing_text(cursor: usize) -> String {
    let mut lines = vec![
        "StudyBuddy AI".to_owned(),
        "Your Personal AI Study Assistant".to_owned(),
        String::new(),
        "Get instant help with your studies, upload photos of problems, and access organized study materials for all classes.".to_owned(),
        String::new(),
    ];

    for (index, screen) in LANDING_ENTRIES.iter().enumerate() {
        let marker = if index == cursor { "> " } else { "  " };
        let (title, summary) = match screen {
            Screen::Chat => (
                "AI Chat Assistant",
                "Ask questions, upload photos of problems, and get instant help with your studies",
            ),
            _ => (
                "Study Materials",
                "Browse organized study materials by class and grade level",
            ),
        };
        lines.push(format!("{marker}{title}"));
        lines.push(format!("    {summary}"));
        lines.push(String::new());
    }

    lines.push("Ready to boost your learning? Press enter to start.".to_owned());
    lines.join("\n")
}

fn render_chat(frame: &mut ratatui::Frame<'_>, area: Rect, chat: &ChatUiState) {
    let inner_width = area.width.saturating_sub(2);
    let composer = render_chat_composer_text(chat);
    let composer_rows = wrapped_row_count(&composer, inner_width);
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),
            Constraint::Length(composer_rows.saturating_add(2)),
        ])
        .split(area);

    let transcript = render_chat_transcript_text(chat);
    let transcript_rows = wrapped_row_count(&transcript, inner_width);
    let scroll = transcript_rows.saturating_sub(layout[0].height.saturating_sub(2));
    let body = Paragraph::new(transcript)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0))
        .block(Block::default().borders(Borders::ALL).title("ai assistant"));
    frame.render_widget(body, layout[0]);

    let input = Paragraph::new(composer)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(input, layout[1]);
}

fn render_chat_transcript_text(chat: &ChatUiState) -> String {
    let session = &chat.session;
    let mut lines = Vec::new();

    let key_marker = focus_marker(chat.focus == ChatFocus::ApiKey);
    let masked = if session.has_credential() {
        "*".repeat(session.credential_len())
    } else {
        "(not set)".to_owned()
    };
    lines.push(format!("{key_marker}OpenAI API key: {masked}"));
    lines.push("  Your API key is kept in memory for this session only.".to_owned());
    lines.push(String::new());

    let messages = session.messages();
    let keep = messages.len().saturating_sub(TRANSCRIPT_TAIL);
    for message in messages.iter().skip(keep) {
        let label = match message.sender {
            Author::User => "you",
            Author::Assistant => "assistant",
        };
        if message.text.is_empty() {
            lines.push(format!("{label}:"));
        } else {
            lines.push(format!("{label}: {}", message.text));
        }
        if message.image.is_some() {
            lines.push("  [image attached]".to_owned());
        }
    }

    if session.is_in_flight() {
        lines.push(format!("assistant: {THINKING}"));
    }
    lines.join("\n")
}

/// Notice, attachment and input line; always drawn below the transcript.
fn render_chat_composer_text(chat: &ChatUiState) -> String {
    let session = &chat.session;
    let mut lines = Vec::new();
    if let Some(notice) = &chat.notice {
        lines.push(format!("! {notice}"));
    }
    if let Some(image) = &session.input().image {
        lines.push(format!(
            "attached: {} ({}) | ctrl+x remove",
            image.file_name,
            format_size(image.size_bytes)
        ));
    }
    let message_marker = focus_marker(chat.focus == ChatFocus::Message);
    lines.push(format!("{message_marker}message: {}", session.input().text));
    lines.join("\n")
}

/// Rows `text` occupies once word-wrapped to `width` columns.
fn wrapped_row_count(text: &str, width: u16) -> u16 {
    let width = usize::from(width.max(1));
    let rows: usize = text
        .lines()
        .map(|line| {
            let mut rows = 1;
            let mut used = 0;
            for word in line.split(' ') {
                let len = word.chars().count();
                let needed = if used == 0 { len } else { used + 1 + len };
                if needed <= width {
                    used = needed;
                } else if len <= width {
                    rows += 1;
                    used = len;
                } else {
                    if used > 0 {
                        rows += 1;
                    }
                    rows += (len - 1) / width;
                    used = len - (len - 1) / width * width;
                }
            }
            rows
        })
        .sum();
    u16::try_from(rows.max(1)).unwrap_or(u16::MAX)
}

const fn focus_marker(focused: bool) -> &'static str {
    if focused { "> " } else { "  " }
}

fn render_attach_prompt_text(path: &str) -> String {
    [
        "Path to an image of your problem (png, jpg, gif, webp):".to_owned(),
        String::new(),
        format!("> {path}"),
        String::new(),
        "enter attach | esc cancel".to_owned(),
    ]
    .join("\n")
}

fn render_materials(frame: &mut ratatui::Frame<'_>, area: Rect, materials: &MaterialsUiState) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5),
            Constraint::Min(3),
            Constraint::Length(4),
        ])
        .split(area);

    let visible = materials.visible();
    let header = Paragraph::new(render_materials_header_text(materials, visible.len())).block(
        Block::default()
            .borders(Borders::ALL)
            .title("study materials"),
    );
    frame.render_widget(header, layout[0]);

    if visible.is_empty() {
        let empty = Paragraph::new(render_materials_empty_text())
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(empty, layout[1]);
    } else {
        let header_cells = ["title", "subject", "class", "type", "level"].map(|label| {
            Cell::from(label).style(
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            )
        });
        let rows = visible.iter().enumerate().map(|(index, material)| {
            let selected_row = index == materials.cursor;
            let cells = material_row_cells(material)
                .into_iter()
                .zip(material_cell_styles(material))
                .map(|(text, badge)| {
                    let style = if selected_row {
                        Style::default()
                            .fg(Color::Black)
                            .bg(Color::Cyan)
                            .add_modifier(Modifier::BOLD)
                    } else {
                        badge
                    };
                    Cell::from(text).style(style)
                })
                .collect::<Vec<_>>();
            Row::new(cells)
        });
        let widths = [
            Constraint::Min(24),
            Constraint::Length(12),
            Constraint::Length(9),
            Constraint::Length(9),
            Constraint::Length(13),
        ];
        let table = Table::new(rows, widths)
            .header(Row::new(header_cells))
            .column_spacing(1)
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(table, layout[1]);
    }

    let detail = Paragraph::new(render_material_detail_text(materials.selected()))
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("details"));
    frame.render_widget(detail, layout[2]);
}

fn render_materials_header_text(materials: &MaterialsUiState, count: usize) -> String {
    [
        format!("search: {}_", materials.filter.query),
        format!("class: < {} >", materials.filter.class.label()),
        materials.filter.summary(count),
    ]
    .join("\n")
}

fn render_materials_empty_text() -> String {
    [
        "No materials found",
        "Try adjusting your search or filter criteria.",
        "ctrl+r clear filters",
    ]
    .join("\n")
}

fn material_row_cells(material: &StudyMaterial) -> [String; 5] {
    [
        material.title.clone(),
        material.subject.clone(),
        material.class_level.clone(),
        material.kind.as_str().to_owned(),
        material.difficulty.as_str().to_owned(),
    ]
}

/// Type and level cells carry a colour badge; the rest stay plain.
fn material_cell_styles(material: &StudyMaterial) -> [Style; 5] {
    let kind = match material.kind {
        MaterialKind::Notes => Color::Blue,
        MaterialKind::Guide => Color::Green,
        MaterialKind::Practice => Color::Yellow,
        MaterialKind::Video => Color::Magenta,
    };
    let difficulty = match material.difficulty {
        Difficulty::Beginner => Color::Green,
        Difficulty::Intermediate => Color::Yellow,
        Difficulty::Advanced => Color::Red,
    };
    [
        Style::default(),
        Style::default().fg(Color::LightBlue),
        Style::default(),
        Style::default().fg(kind).add_modifier(Modifier::BOLD),
        Style::default().fg(difficulty).add_modifier(Modifier::BOLD),
    ]
}

fn render_material_detail_text(material: Option<&StudyMaterial>) -> String {
    match material {
        Some(material) => format!(
            "{} ({}, {})\n{}",
            material.title, material.subject, material.class_level, material.description
        ),
        None => String::new(),
    }
}

fn help_overlay_text() -> &'static str {
    "global: ctrl+q quit | ctrl+n/ctrl+p next/prev screen | f1 help\n\
home: up/down or j/k pick | enter open | c chat | m materials | q quit\n\
chat: tab switch key/message | type to edit | enter send | ctrl+a attach image | ctrl+x remove image | esc home\n\
attach: type a file path | enter attach | esc cancel\n\
materials: type to search | left/right class | up/down move | home/end | ctrl+r clear filters | esc home\n\
help: esc or ? close"
}

fn status_text(state: &AppState, view_data: &ViewData) -> String {
    if view_data.help_visible {
        return String::new();
    }

    let default = match state.screen {
        Screen::Landing => "enter open | c chat | m materials | f1 help | ctrl+q",
        Screen::Chat if view_data.chat.attach_prompt.is_some() => "enter attach | esc cancel",
        Screen::Chat => "enter send | tab key/message | ctrl+a attach | ctrl+x remove | esc home",
        Screen::Materials => "type search | left/right class | up/down | ctrl+r clear | esc home",
    };
    let screen = state.screen.label().to_uppercase();
    match &state.status_line {
        Some(status) => format!("{screen} | {status} | {default}"),
        None => format!("{screen} | {default}"),
    }
}

fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    if bytes >= MIB {
        format!("{:.1} MB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::{
        AppRuntime, ChatFocus, ChatUiState, InternalEvent, THINKING, ViewData, format_size,
        handle_key_event, help_overlay_text, material_cell_styles, material_row_cells,
        process_internal_events, render,
        render_attach_prompt_text, render_chat_composer_text, render_chat_transcript_text,
        render_landing_text, render_material_detail_text, render_materials_empty_text,
        render_materials_header_text, status_text, wrapped_row_count,
    };
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use ratatui::style::Color;
    use studybuddy_app::{
        AppState, AttachmentError, ClassFilter, GREETING, ImageAttachment, MAX_IMAGE_SIZE, Screen,
        Sender as Author, TransportError, TurnRequest, load_image,
    };
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::mpsc;
    use studybuddy_testkit::{StudyFaker, write_sample_image};

    /// Answers turns synchronously from a queue of canned results.
    #[derive(Debug, Default)]
    struct TestRuntime {
        replies: VecDeque<Result<String, TransportError>>,
        prompts: Vec<String>,
    }

    impl AppRuntime for TestRuntime {
        fn complete_turn(&mut self, request: &TurnRequest) -> Result<String, TransportError> {
            self.prompts.push(request.prompt.clone());
            self.replies
                .pop_front()
                .unwrap_or_else(|| Ok("ok".to_owned()))
        }

        fn load_image(&mut self, path: &Path) -> Result<ImageAttachment, AttachmentError> {
            load_image(path, MAX_IMAGE_SIZE)
        }
    }

    /// Accepts turns without answering them, like a slow network.
    #[derive(Debug, Default)]
    struct PendingRuntime {
        started: Vec<u64>,
    }

    impl AppRuntime for PendingRuntime {
        fn complete_turn(&mut self, _request: &TurnRequest) -> Result<String, TransportError> {
            Err(TransportError::Unavailable)
        }

        fn load_image(&mut self, _path: &Path) -> Result<ImageAttachment, AttachmentError> {
            Err(AttachmentError::NotAnImage {
                path: "unused".to_owned(),
                mime: "text/plain".to_owned(),
            })
        }

        fn spawn_turn(
            &mut self,
            request: TurnRequest,
            _tx: mpsc::Sender<InternalEvent>,
        ) -> anyhow::Result<()> {
            self.started.push(request.request_id);
            Ok(())
        }
    }

    fn chat_text(chat: &ChatUiState) -> String {
        format!(
            "{}\n{}",
            render_chat_transcript_text(chat),
            render_chat_composer_text(chat)
        )
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(ch: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL)
    }

    fn text_keys(text: &str) -> Vec<KeyEvent> {
        text.chars().map(|ch| key(KeyCode::Char(ch))).collect()
    }

    fn internal_channel() -> (
        mpsc::Sender<InternalEvent>,
        mpsc::Receiver<InternalEvent>,
    ) {
        mpsc::channel()
    }

    fn pump_internal(
        state: &mut AppState,
        view_data: &mut ViewData,
        tx: &mpsc::Sender<InternalEvent>,
        rx: &mpsc::Receiver<InternalEvent>,
    ) {
        process_internal_events(state, view_data, tx, rx);
    }

    fn run_key_script<R: AppRuntime>(
        state: &mut AppState,
        runtime: &mut R,
        view_data: &mut ViewData,
        tx: &mpsc::Sender<InternalEvent>,
        rx: &mpsc::Receiver<InternalEvent>,
        keys: &[KeyEvent],
    ) {
        for key in keys {
            let _ = handle_key_event(state, runtime, view_data, tx, *key);
            pump_internal(state, view_data, tx, rx);
        }
    }

    fn chat_state() -> AppState {
        AppState {
            screen: Screen::Chat,
            ..AppState::default()
        }
    }

    fn enter_key_and_focus_message<R: AppRuntime>(
        state: &mut AppState,
        runtime: &mut R,
        view_data: &mut ViewData,
        tx: &mpsc::Sender<InternalEvent>,
        rx: &mpsc::Receiver<InternalEvent>,
    ) {
        let mut keys = text_keys("sk-test");
        keys.push(key(KeyCode::Tab));
        run_key_script(state, runtime, view_data, tx, rx, &keys);
    }

    #[test]
    fn ctrl_q_quits_from_any_screen() {
        let mut runtime = TestRuntime::default();
        let (tx, _rx) = internal_channel();
        for screen in Screen::ALL {
            let mut state = AppState {
                screen,
                ..AppState::default()
            };
            let mut view_data = ViewData::default();
            assert!(handle_key_event(
                &mut state,
                &mut runtime,
                &mut view_data,
                &tx,
                ctrl('q')
            ));
        }
    }

    #[test]
    fn landing_enter_opens_selected_feature() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::default();
        let mut view_data = ViewData::default();
        let (tx, rx) = internal_channel();

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Down), key(KeyCode::Enter)],
        );
        assert_eq!(state.screen, Screen::Materials);

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Esc), key(KeyCode::Char('c'))],
        );
        assert_eq!(state.screen, Screen::Chat);
    }

    #[test]
    fn ctrl_n_and_ctrl_p_rotate_screens() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::default();
        let mut view_data = ViewData::default();
        let (tx, rx) = internal_channel();

        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &rx, &[ctrl('n')]);
        assert_eq!(state.screen, Screen::Chat);
        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[ctrl('p'), ctrl('p')],
        );
        assert_eq!(state.screen, Screen::Materials);
    }

    #[test]
    fn chat_starts_with_greeting_and_key_focus() {
        let view_data = ViewData::default();
        assert_eq!(view_data.chat.focus, ChatFocus::ApiKey);
        let rendered = chat_text(&view_data.chat);
        assert!(rendered.contains(GREETING));
        assert!(rendered.contains("> OpenAI API key: (not set)"));
    }

    #[test]
    fn api_key_field_is_masked() {
        let mut state = chat_state();
        let mut runtime = TestRuntime::default();
        let mut view_data = ViewData::default();
        let (tx, rx) = internal_channel();

        let mut keys = text_keys("sk-secret");
        keys.push(key(KeyCode::Backspace));
        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &rx, &keys);

        let rendered = chat_text(&view_data.chat);
        assert!(rendered.contains("OpenAI API key: ********"));
        assert!(!rendered.contains("sk-secre"));
    }

    #[test]
    fn successful_turn_appends_reply() {
        let mut state = chat_state();
        let mut runtime = TestRuntime {
            replies: VecDeque::from([Ok("42".to_owned())]),
            ..TestRuntime::default()
        };
        let mut view_data = ViewData::default();
        let (tx, rx) = internal_channel();

        enter_key_and_focus_message(&mut state, &mut runtime, &mut view_data, &tx, &rx);
        let mut keys = text_keys("What is 6 x 7?");
        keys.push(key(KeyCode::Enter));
        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &rx, &keys);

        assert_eq!(runtime.prompts, vec!["What is 6 x 7?".to_owned()]);
        let messages = view_data.chat.session.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].sender, Author::User);
        assert_eq!(messages[2].sender, Author::Assistant);
        assert_eq!(messages[2].text, "42");
        assert!(!view_data.chat.session.is_in_flight());
        assert!(view_data.chat.notice.is_none());
        assert!(chat_text(&view_data.chat).contains("assistant: 42"));
    }

    #[test]
    fn unauthorized_turn_shows_notice_without_assistant_message() {
        let mut state = chat_state();
        let mut runtime = TestRuntime {
            replies: VecDeque::from([Err(TransportError::Status {
                status: 401,
                message: "Incorrect API key provided".to_owned(),
            })]),
            ..TestRuntime::default()
        };
        let mut view_data = ViewData::default();
        let (tx, rx) = internal_channel();

        enter_key_and_focus_message(&mut state, &mut runtime, &mut view_data, &tx, &rx);
        let mut keys = text_keys("hello");
        keys.push(key(KeyCode::Enter));
        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &rx, &keys);

        let messages = view_data.chat.session.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].sender, Author::User);
        assert!(!view_data.chat.session.is_in_flight());
        let notice = view_data.chat.notice.clone().unwrap_or_default();
        assert!(notice.contains("401"), "{notice}");
        assert!(
            state
                .status_line
                .as_deref()
                .is_some_and(|status| status.contains("Incorrect API key provided"))
        );
    }

    #[test]
    fn missing_key_blocks_submission_and_refocuses_key_field() {
        let mut state = chat_state();
        let mut runtime = TestRuntime::default();
        let mut view_data = ViewData::default();
        let (tx, rx) = internal_channel();

        let mut keys = vec![key(KeyCode::Tab)];
        keys.extend(text_keys("hi"));
        keys.push(key(KeyCode::Enter));
        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &rx, &keys);

        assert!(runtime.prompts.is_empty());
        assert_eq!(view_data.chat.session.messages().len(), 1);
        assert_eq!(view_data.chat.focus, ChatFocus::ApiKey);
        assert!(
            view_data
                .chat
                .notice
                .as_deref()
                .is_some_and(|notice| notice.contains("API key required"))
        );
        assert_eq!(view_data.chat.session.input().text, "hi");
    }

    #[test]
    fn empty_message_is_not_sent() {
        let mut state = chat_state();
        let mut runtime = TestRuntime::default();
        let mut view_data = ViewData::default();
        let (tx, rx) = internal_channel();

        enter_key_and_focus_message(&mut state, &mut runtime, &mut view_data, &tx, &rx);
        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Char(' ')), key(KeyCode::Enter)],
        );

        assert!(runtime.prompts.is_empty());
        assert_eq!(view_data.chat.session.messages().len(), 1);
    }

    #[test]
    fn in_flight_turn_shows_thinking_and_refuses_resubmit() {
        let mut state = chat_state();
        let mut runtime = PendingRuntime::default();
        let mut view_data = ViewData::default();
        let (tx, rx) = internal_channel();

        enter_key_and_focus_message(&mut state, &mut runtime, &mut view_data, &tx, &rx);
        let mut keys = text_keys("first");
        keys.push(key(KeyCode::Enter));
        keys.extend(text_keys("second"));
        keys.push(key(KeyCode::Enter));
        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &rx, &keys);

        assert_eq!(runtime.started.len(), 1);
        assert!(view_data.chat.session.is_in_flight());
        let rendered = chat_text(&view_data.chat);
        assert!(rendered.contains(THINKING));
        assert!(rendered.contains("message: second"));

        tx.send(InternalEvent::ChatTurn {
            request_id: runtime.started[0],
            result: Ok("done".to_owned()),
        })
        .expect("channel open");
        pump_internal(&mut state, &mut view_data, &tx, &rx);

        assert!(!view_data.chat.session.is_in_flight());
        assert!(!chat_text(&view_data.chat).contains(THINKING));
    }

    #[test]
    fn stale_turn_events_are_ignored() {
        let mut state = chat_state();
        let mut view_data = ViewData::default();
        let (tx, rx) = internal_channel();

        tx.send(InternalEvent::ChatTurn {
            request_id: 99,
            result: Ok("ghost".to_owned()),
        })
        .expect("channel open");
        pump_internal(&mut state, &mut view_data, &tx, &rx);

        assert_eq!(view_data.chat.session.messages().len(), 1);
    }

    #[test]
    fn attach_prompt_loads_image_and_sends_marker() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_sample_image(dir.path(), "problem.png")?;

        let mut state = chat_state();
        let mut runtime = TestRuntime::default();
        let mut view_data = ViewData::default();
        let (tx, rx) = internal_channel();

        enter_key_and_focus_message(&mut state, &mut runtime, &mut view_data, &tx, &rx);
        let mut keys = vec![ctrl('a')];
        keys.extend(text_keys(&path.display().to_string()));
        keys.push(key(KeyCode::Enter));
        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &rx, &keys);

        assert!(view_data.chat.attach_prompt.is_none());
        assert!(chat_text(&view_data.chat).contains("attached: problem.png"));

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Enter)],
        );
        assert_eq!(runtime.prompts, vec![" [User uploaded an image]".to_owned()]);
        let user = &view_data.chat.session.messages()[1];
        assert!(
            user.image
                .as_deref()
                .is_some_and(|uri| uri.starts_with("data:image/png;base64,"))
        );
        Ok(())
    }

    #[test]
    fn attach_failure_keeps_prompt_open() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "plain text")?;

        let mut state = chat_state();
        let mut runtime = TestRuntime::default();
        let mut view_data = ViewData::default();
        let (tx, rx) = internal_channel();

        let mut keys = vec![ctrl('a')];
        keys.extend(text_keys(&path.display().to_string()));
        keys.push(key(KeyCode::Enter));
        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &rx, &keys);

        assert!(view_data.chat.attach_prompt.is_some());
        assert!(view_data.chat.session.input().image.is_none());
        assert!(
            state
                .status_line
                .as_deref()
                .is_some_and(|status| status.starts_with("attach failed"))
        );

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Esc)],
        );
        assert!(view_data.chat.attach_prompt.is_none());
        assert_eq!(state.screen, Screen::Chat);
        Ok(())
    }

    #[test]
    fn ctrl_x_removes_attached_image() {
        let mut state = chat_state();
        let mut runtime = TestRuntime::default();
        let mut view_data = ViewData::default();
        let (tx, rx) = internal_channel();
        view_data
            .chat
            .session
            .attach_image(ImageAttachment::from_bytes("a.png", "image/png", b"x"));

        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &rx, &[ctrl('x')]);
        assert!(view_data.chat.session.input().image.is_none());
        assert_eq!(state.status_line.as_deref(), Some("image removed"));
    }

    #[test]
    fn materials_typing_filters_and_ctrl_r_clears() {
        let mut state = AppState {
            screen: Screen::Materials,
            ..AppState::default()
        };
        let mut runtime = TestRuntime::default();
        let mut view_data = ViewData::default();
        let (tx, rx) = internal_channel();

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &text_keys("cell"),
        );
        let visible = view_data.materials.visible();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].title, "Cell Structure and Function");
        assert_eq!(
            render_materials_header_text(&view_data.materials, visible.len()),
            "search: cell_\nclass: < All Classes >\nShowing 1 materials matching \"cell\""
        );

        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &rx, &[ctrl('r')]);
        assert_eq!(view_data.materials.visible().len(), 8);
        assert_eq!(state.status_line.as_deref(), Some("filters cleared"));
    }

    #[test]
    fn materials_class_cycling_and_cursor_clamp() {
        let mut state = AppState {
            screen: Screen::Materials,
            ..AppState::default()
        };
        let mut runtime = TestRuntime::default();
        let mut view_data = ViewData::default();
        let (tx, rx) = internal_channel();

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[
                key(KeyCode::Right),
                key(KeyCode::Down),
                key(KeyCode::Down),
                key(KeyCode::Down),
                key(KeyCode::Down),
            ],
        );
        assert_eq!(view_data.materials.filter.class, ClassFilter::parse("Grade 9"));
        assert_eq!(view_data.materials.cursor, 2);
        assert_eq!(
            view_data.materials.selected().map(|m| m.title.as_str()),
            Some("Ancient Greek Civilization")
        );

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Left), key(KeyCode::Left)],
        );
        assert_eq!(view_data.materials.filter.class, ClassFilter::parse("Grade 12"));
        assert_eq!(view_data.materials.cursor, 0);
    }

    #[test]
    fn materials_with_no_match_render_empty_hint() {
        let mut state = AppState {
            screen: Screen::Materials,
            ..AppState::default()
        };
        let mut runtime = TestRuntime::default();
        let mut view_data = ViewData::default();
        let (tx, rx) = internal_channel();

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &text_keys("zzz"),
        );
        assert!(view_data.materials.visible().is_empty());
        assert!(view_data.materials.selected().is_none());
        assert!(render_materials_empty_text().starts_with("No materials found"));
        assert_eq!(render_material_detail_text(None), "");
    }

    #[test]
    fn materials_filter_works_on_generated_catalog() {
        let mut view_data = ViewData::default();
        view_data.materials.catalog = StudyFaker::new(11).catalog(30);
        view_data.materials.filter.class = ClassFilter::parse("Grade 10");

        let visible = view_data.materials.visible();
        assert!(visible.iter().all(|m| m.class_level == "Grade 10"));
        let expected = view_data
            .materials
            .catalog
            .iter()
            .filter(|m| m.class_level == "Grade 10")
            .count();
        assert_eq!(visible.len(), expected);
    }

    #[test]
    fn material_rows_show_kind_and_difficulty_labels() {
        let view_data = ViewData::default();
        let first = &view_data.materials.catalog[0];
        assert_eq!(
            material_row_cells(first),
            [
                "Algebra Basics".to_owned(),
                "Mathematics".to_owned(),
                "Grade 9".to_owned(),
                "notes".to_owned(),
                "beginner".to_owned(),
            ]
        );
        assert!(render_material_detail_text(Some(first)).contains("variables, equations"));
    }

    #[test]
    fn material_badges_are_coloured_by_kind_and_difficulty() {
        let catalog = ViewData::default().materials.catalog;
        let practice = catalog
            .iter()
            .find(|m| m.title == "Chemical Bonding Practice")
            .expect("fixture has chemistry practice");
        let styles = material_cell_styles(practice);
        assert_eq!(styles[3].fg, Some(Color::Yellow));
        assert_eq!(styles[4].fg, Some(Color::Red));
        assert_eq!(styles[0].fg, None);

        let algebra = &catalog[0];
        let styles = material_cell_styles(algebra);
        assert_eq!(styles[3].fg, Some(Color::Blue));
        assert_eq!(styles[4].fg, Some(Color::Green));
    }

    #[test]
    fn wrapped_row_count_accounts_for_soft_wraps() {
        assert_eq!(wrapped_row_count("", 10), 1);
        assert_eq!(wrapped_row_count("short\nlines", 10), 2);
        assert_eq!(wrapped_row_count("aaaa bbbb cccc", 9), 2);
        assert_eq!(wrapped_row_count(&"x".repeat(25), 10), 3);
        assert_eq!(wrapped_row_count(&"word ".repeat(400), 78), 27);
    }

    #[test]
    fn long_reply_keeps_input_line_on_screen() -> anyhow::Result<()> {
        let mut state = chat_state();
        let mut runtime = TestRuntime {
            replies: VecDeque::from([Ok("photosynthesis ".repeat(140))]),
            ..TestRuntime::default()
        };
        let mut view_data = ViewData::default();
        let (tx, rx) = internal_channel();

        enter_key_and_focus_message(&mut state, &mut runtime, &mut view_data, &tx, &rx);
        let mut keys = text_keys("explain");
        keys.push(key(KeyCode::Enter));
        keys.extend(text_keys("next question"));
        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &rx, &keys);
        assert_eq!(view_data.chat.session.messages().len(), 3);

        let mut terminal = Terminal::new(TestBackend::new(48, 20))?;
        terminal.draw(|frame| render(frame, &state, &view_data))?;

        let buffer = terminal.backend().buffer();
        let screen = (0..buffer.area.height)
            .map(|y| {
                (0..buffer.area.width)
                    .map(|x| buffer[(x, y)].symbol())
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n");
        assert!(screen.contains("> message: next question"), "{screen}");
        Ok(())
    }

    #[test]
    fn status_clear_respects_token() {
        let mut state = AppState {
            status_line: Some("old".to_owned()),
            ..AppState::default()
        };
        let mut view_data = ViewData {
            status_token: 2,
            ..ViewData::default()
        };
        let (tx, rx) = internal_channel();

        tx.send(InternalEvent::ClearStatus { token: 1 })
            .expect("channel open");
        pump_internal(&mut state, &mut view_data, &tx, &rx);
        assert_eq!(state.status_line.as_deref(), Some("old"));

        tx.send(InternalEvent::ClearStatus { token: 2 })
            .expect("channel open");
        pump_internal(&mut state, &mut view_data, &tx, &rx);
        assert_eq!(state.status_line, None);
    }

    #[test]
    fn status_text_includes_screen_and_hints() {
        let state = AppState {
            screen: Screen::Materials,
            status_line: Some("filters cleared".to_owned()),
        };
        let view_data = ViewData::default();
        let status = status_text(&state, &view_data);
        assert!(status.starts_with("STUDY MATERIALS | filters cleared |"));
        assert!(status.contains("ctrl+r clear"));
    }

    #[test]
    fn help_overlay_toggles_and_hides_status() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::default();
        let mut view_data = ViewData::default();
        let (tx, rx) = internal_channel();

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::F(1))],
        );
        assert!(view_data.help_visible);
        assert_eq!(status_text(&state, &view_data), "");
        assert!(help_overlay_text().contains("ctrl+a attach image"));

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Esc)],
        );
        assert!(!view_data.help_visible);
        assert_eq!(state.screen, Screen::Landing);
    }

    #[test]
    fn landing_text_marks_selected_entry() {
        let rendered = render_landing_text(1);
        assert!(rendered.contains("  AI Chat Assistant"));
        assert!(rendered.contains("> Study Materials"));
    }

    #[test]
    fn attach_prompt_text_echoes_path() {
        assert!(render_attach_prompt_text("~/hw.png").contains("> ~/hw.png"));
    }

    #[test]
    fn format_size_uses_binary_units() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 << 20), "5.0 MB");
    }
}
