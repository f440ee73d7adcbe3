// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{Difficulty, MaterialId, MaterialKind, StudyMaterial};

pub const ALL_CLASSES: &str = "all";
pub const CLASS_LEVELS: [&str; 4] = ["Grade 9", "Grade 10", "Grade 11", "Grade 12"];

const CATALOG: [(&str, &str, &str, &str, MaterialKind, Difficulty); 8] = [
    (
        "Algebra Basics",
        "Fundamental algebra concepts including variables, equations, and inequalities",
        "Grade 9",
        "Mathematics",
        MaterialKind::Notes,
        Difficulty::Beginner,
    ),
    (
        "Cell Structure and Function",
        "Comprehensive guide to cell biology covering prokaryotes and eukaryotes",
        "Grade 10",
        "Biology",
        MaterialKind::Guide,
        Difficulty::Intermediate,
    ),
    (
        "World War II Timeline",
        "Detailed timeline of major events during World War II",
        "Grade 11",
        "History",
        MaterialKind::Notes,
        Difficulty::Intermediate,
    ),
    (
        "Chemical Bonding Practice",
        "Practice problems for ionic, covalent, and metallic bonding",
        "Grade 12",
        "Chemistry",
        MaterialKind::Practice,
        Difficulty::Advanced,
    ),
    (
        "Shakespeare's Hamlet Analysis",
        "Character analysis and themes in Hamlet",
        "Grade 11",
        "English",
        MaterialKind::Guide,
        Difficulty::Intermediate,
    ),
    (
        "Quadratic Functions",
        "Understanding parabolas, vertex form, and applications",
        "Grade 10",
        "Mathematics",
        MaterialKind::Video,
        Difficulty::Intermediate,
    ),
    (
        "Photosynthesis Process",
        "Step-by-step breakdown of photosynthesis reactions",
        "Grade 9",
        "Biology",
        MaterialKind::Notes,
        Difficulty::Beginner,
    ),
    (
        "Ancient Greek Civilization",
        "Overview of Greek culture, politics, and philosophy",
        "Grade 9",
        "History",
        MaterialKind::Guide,
        Difficulty::Beginner,
    ),
];

/// The compiled-in study materials, in display order.
pub fn builtin_catalog() -> Vec<StudyMaterial> {
    CATALOG
        .iter()
        .zip(1_i64..)
        .map(
            |(&(title, description, class_level, subject, kind, difficulty), id)| StudyMaterial {
                id: MaterialId::new(id),
                title: title.to_owned(),
                description: description.to_owned(),
                class_level: class_level.to_owned(),
                subject: subject.to_owned(),
                kind,
                difficulty,
            },
        )
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ClassFilter {
    #[default]
    All,
    Level(String),
}

impl ClassFilter {
    pub fn parse(value: &str) -> Self {
        if value == ALL_CLASSES {
            Self::All
        } else {
            Self::Level(value.to_owned())
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::All => "All Classes",
            Self::Level(level) => level,
        }
    }

    pub fn matches(&self, class_level: &str) -> bool {
        match self {
            Self::All => true,
            Self::Level(level) => level == class_level,
        }
    }
}

pub fn matches_query(material: &StudyMaterial, query: &str) -> bool {
    let needle = query.to_lowercase();
    material.title.to_lowercase().contains(&needle)
        || material.subject.to_lowercase().contains(&needle)
        || material.description.to_lowercase().contains(&needle)
}

pub fn filter_materials<'a>(
    catalog: &'a [StudyMaterial],
    query: &str,
    class: &ClassFilter,
) -> Vec<&'a StudyMaterial> {
    catalog
        .iter()
        .filter(|material| matches_query(material, query) && class.matches(&material.class_level))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MaterialFilter {
    pub query: String,
    pub class: ClassFilter,
}

impl MaterialFilter {
    pub fn apply<'a>(&self, catalog: &'a [StudyMaterial]) -> Vec<&'a StudyMaterial> {
        filter_materials(catalog, &self.query, &self.class)
    }

    pub fn clear(&mut self) {
        self.query.clear();
        self.class = ClassFilter::All;
    }

    /// Steps through `all` followed by the known class levels, wrapping.
    pub fn cycle_class(&mut self, delta: isize) {
        let options = class_options();
        let current = options
            .iter()
            .position(|option| *option == self.class)
            .unwrap_or(0) as isize;
        let len = options.len() as isize;
        let next = (current + delta).rem_euclid(len) as usize;
        self.class = options[next].clone();
    }

    pub fn summary(&self, count: usize) -> String {
        let mut out = format!("Showing {count} materials");
        if let ClassFilter::Level(level) = &self.class {
            out.push_str(&format!(" for {level}"));
        }
        if !self.query.is_empty() {
            out.push_str(&format!(" matching \"{}\"", self.query));
        }
        out
    }
}

pub fn class_options() -> Vec<ClassFilter> {
    std::iter::once(ClassFilter::All)
        .chain(
            CLASS_LEVELS
                .iter()
                .map(|level| ClassFilter::Level((*level).to_owned())),
        )
        .collect()
}
