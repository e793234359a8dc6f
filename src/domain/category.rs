//! Content categories and per-category lookup tables.
//!
//! A disc lands in exactly one of three buckets. The bucket selects the
//! encoding profile and the remote destination, both of which are kept in
//! a [`CategoryTable`] where the music entry is mandatory and serves as the
//! fallback for any category left unconfigured.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The three content buckets a disc can be sorted into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Children's content (radio plays, songs for kids)
    Children,

    /// Spoken word: audiobooks, readings
    Audiobook,

    /// Everything else
    Music,
}

impl Category {
    /// All categories in tie-break order (lowest number first)
    pub const ALL: [Category; 3] = [Category::Children, Category::Audiobook, Category::Music];

    /// Stable category number (1 = children, 2 = audiobook, 3 = music)
    pub fn number(self) -> u8 {
        match self {
            Self::Children => 1,
            Self::Audiobook => 2,
            Self::Music => 3,
        }
    }

    /// Look up a category by its number
    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(Self::Children),
            2 => Some(Self::Audiobook),
            3 => Some(Self::Music),
            _ => None,
        }
    }

    /// Human-readable name
    pub fn name(self) -> &'static str {
        match self {
            Self::Children => "children",
            Self::Audiobook => "audiobook",
            Self::Music => "music",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.number(), self.name())
    }
}

/// Outcome of categorizing one disc
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryResult {
    pub category: Category,

    /// Always within [0.0, 1.0]
    pub confidence: f64,

    /// Semicolon-separated trace of the signals that fired
    pub reason: String,
}

/// Values keyed by category, with music as the mandatory fallback entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTable<T> {
    pub children: Option<T>,

    pub audiobook: Option<T>,

    pub music: T,
}

impl<T> CategoryTable<T> {
    /// Table with only the music entry; other categories fall back to it
    pub fn new(music: T) -> Self {
        Self {
            children: None,
            audiobook: None,
            music,
        }
    }

    /// Set the entry for a category
    pub fn with(mut self, category: Category, value: T) -> Self {
        match category {
            Category::Children => self.children = Some(value),
            Category::Audiobook => self.audiobook = Some(value),
            Category::Music => self.music = value,
        }
        self
    }

    /// Entry for a category, or the music entry when it has none
    pub fn get(&self, category: Category) -> &T {
        match category {
            Category::Children => self.children.as_ref().unwrap_or(&self.music),
            Category::Audiobook => self.audiobook.as_ref().unwrap_or(&self.music),
            Category::Music => &self.music,
        }
    }
}
