// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::Screen;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub screen: Screen,
    pub status_line: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            screen: Screen::Landing,
            status_line: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    Navigate(Screen),
    NextScreen,
    PrevScreen,
    SetStatus(String),
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    ScreenChanged(Screen),
    StatusUpdated(String),
    StatusCleared,
}

impl AppState {
    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::Navigate(screen) => self.navigate(screen),
            AppCommand::NextScreen => self.rotate_screen(1),
            AppCommand::PrevScreen => self.rotate_screen(-1),
            AppCommand::SetStatus(message) => vec![self.set_status(&message)],
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
        }
    }

    fn navigate(&mut self, screen: Screen) -> Vec<AppEvent> {
        if self.screen == screen {
            return Vec::new();
        }
        self.screen = screen;
        tracing::debug!(screen = screen.label(), "screen changed");
        vec![AppEvent::ScreenChanged(screen)]
    }

    fn rotate_screen(&mut self, delta: isize) -> Vec<AppEvent> {
        let screens = Screen::ALL;
        let current = screens
            .iter()
            .position(|screen| *screen == self.screen)
            .unwrap_or(0) as isize;
        let len = screens.len() as isize;
        let next = (current + delta).rem_euclid(len) as usize;
        self.navigate(screens[next])
    }

    fn set_status(&mut self, message: &str) -> AppEvent {
        self.status_line = Some(message.to_owned());
        AppEvent::StatusUpdated(message.to_owned())
    }
}
