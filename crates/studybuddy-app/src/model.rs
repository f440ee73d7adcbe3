// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};

use crate::ids::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sender {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub text: String,
    pub sender: Sender,
    /// `data:` URI of the attached image, kept for local display only.
    pub image: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaterialKind {
    Notes,
    Guide,
    Practice,
    Video,
}

impl MaterialKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Notes => "notes",
            Self::Guide => "guide",
            Self::Practice => "practice",
            Self::Video => "video",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyMaterial {
    pub id: MaterialId,
    pub title: String,
    pub description: String,
    pub class_level: String,
    pub subject: String,
    pub kind: MaterialKind,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Screen {
    Landing,
    Chat,
    Materials,
}

impl Screen {
    pub const ALL: [Self; 3] = [Self::Landing, Self::Chat, Self::Materials];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Landing => "home",
            Self::Chat => "ai assistant",
            Self::Materials => "study materials",
        }
    }
}
