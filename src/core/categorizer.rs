//! Weighted keyword heuristic that sorts a disc into a content category.
//!
//! Four independent signals (artist, album, genre, first track title) plus a
//! weak track-count signal each vote for a category with a score. Votes are
//! weighted and summed per category; the strongest category wins and its sum
//! is normalised into a confidence. Discs without a clear signal are treated
//! as music.
//!
//! The categorizer is pure: no I/O, no state beyond its keyword sets.

use std::sync::OnceLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::{AlbumDescriptor, Category, CategoryResult, TrackDescriptor};

const ARTIST_WEIGHT: f64 = 1.5;
const ALBUM_WEIGHT: f64 = 1.5;
const GENRE_WEIGHT: f64 = 1.0;
const TRACK_TITLE_WEIGHT: f64 = 0.8;
const TRACK_COUNT_WEIGHT: f64 = 0.5;

/// Keyword score a text signal must exceed to vote
const KEYWORD_THRESHOLD: f64 = 0.5;

/// Below this confidence the disc falls back to music
const MIN_CONFIDENCE: f64 = 0.3;

const DEFAULT_CONFIDENCE: f64 = 0.5;

pub const DEFAULT_REASON: &str = "No clear signal, defaulting to music";

const CHILDREN_KEYWORDS: &[&str] = &[
    "kinder",
    "kinderlied",
    "kindergarten",
    "kind",
    "kids",
    "hörspiel",
    "märchen",
    "geschichten für",
    "disney",
    "für kinder",
    "ab 3",
    "ab 4",
    "ab 5",
    "ab 6",
    "bibi",
    "benjamin",
    "conni",
    "tkkg",
    "drei fragezeichen",
    "die drei ???",
    "europa",
    "karussell",
    "janosch",
    "otfried preußler",
    "astrid lindgren",
    "paul maar",
    "erich kästner",
    "michael ende",
    "children",
    "kid",
    "baby",
    "toddler",
    "nursery",
];

const AUDIOBOOK_KEYWORDS: &[&str] = &[
    "hörbuch",
    "hörspiel",
    "gelesen von",
    "ungekürzt",
    "gekürzt",
    "roman",
    "erzählung",
    "lesung",
    "sprecher",
    "vorgelesen",
    "audible",
    "hörbuchverlag",
    "argon",
    "lübbe audio",
    "audiobook",
    "unabridged",
    "narrated",
    "narration",
    "read by",
    "performed by",
];

const MUSIC_GENRES: &[&str] = &["album", "ep", "single", "compilation", "soundtrack", "live", "remix"];

fn is_chapter_title(title: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(kapitel|chapter|teil|track)\s*\d+").ok())
        .as_ref()
        .map_or(false, |re| re.is_match(&title.to_lowercase()))
}

/// The term lists the signals match against.
///
/// Loaded once (built-in defaults or configuration) and handed to the
/// categorizer; all terms are stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordSets {
    pub children: Vec<String>,
    pub audiobook: Vec<String>,
    pub music_genres: Vec<String>,
}

impl KeywordSets {
    pub fn new(children: Vec<String>, audiobook: Vec<String>, music_genres: Vec<String>) -> Self {
        let lower = |terms: Vec<String>| -> Vec<String> {
            terms.into_iter().map(|t| t.to_lowercase()).collect()
        };
        Self {
            children: lower(children),
            audiobook: lower(audiobook),
            music_genres: lower(music_genres),
        }
    }
}

impl Default for KeywordSets {
    fn default() -> Self {
        let owned = |terms: &[&str]| -> Vec<String> {
            terms.iter().map(|t| t.to_string()).collect()
        };
        Self::new(
            owned(CHILDREN_KEYWORDS),
            owned(AUDIOBOOK_KEYWORDS),
            owned(MUSIC_GENRES),
        )
    }
}

/// One signal's vote
type Vote = Option<(Category, f64)>;

fn slot(category: Category) -> usize {
    usize::from(category.number() - 1)
}

/// Scores how strongly `text` matches a keyword list.
///
/// Counts case-insensitive substring hits: none is 0.0, one is 0.6, two is
/// 0.8, three or more is 1.0.
pub fn keyword_score(text: &str, keywords: &[String]) -> f64 {
    let text = text.to_lowercase();
    let hits = keywords
        .iter()
        .filter(|k| text.contains(k.as_str()))
        .count();

    match hits {
        0 => 0.0,
        1 => 0.6,
        2 => 0.8,
        _ => 1.0,
    }
}

#[derive(Debug, Clone, Default)]
pub struct Categorizer {
    keywords: KeywordSets,
}

impl Categorizer {
    pub fn new(keywords: KeywordSets) -> Self {
        Self { keywords }
    }

    pub fn keywords(&self) -> &KeywordSets {
        &self.keywords
    }

    /// Categorize an identified disc
    pub fn categorize_album(&self, album: &AlbumDescriptor) -> CategoryResult {
        self.categorize(
            &album.artist,
            &album.title,
            album.genre.as_deref(),
            &album.tracks,
            album.year,
        )
    }

    /// Decide the category for a disc's metadata.
    ///
    /// Total and deterministic. `year` is accepted for callers that have it
    /// but does not influence the result.
    pub fn categorize(
        &self,
        artist: &str,
        album: &str,
        genre: Option<&str>,
        tracks: &[TrackDescriptor],
        _year: Option<i32>,
    ) -> CategoryResult {
        let mut scores = [0.0_f64; 3];
        let mut reasons: Vec<String> = Vec::new();

        let mut add = |vote: Vote, weight: f64, label: String| {
            if let Some((category, score)) = vote {
                scores[slot(category)] += score * weight;
                reasons.push(format!("{} → Kat.{}", label, category.number()));
            }
        };

        add(self.text_signal(artist), ARTIST_WEIGHT, format!("Artist: {}", artist));
        add(self.text_signal(album), ALBUM_WEIGHT, format!("Album: {}", album));

        if let Some(genre) = genre {
            add(self.genre_signal(genre), GENRE_WEIGHT, format!("Genre: {}", genre));
        }

        if let Some(first) = tracks.first() {
            add(self.track_title_signal(&first.title), TRACK_TITLE_WEIGHT, "Tracks".to_string());
            add(
                track_count_signal(tracks.len()),
                TRACK_COUNT_WEIGHT,
                format!("Track count: {}", tracks.len()),
            );
        }

        // Lowest category number wins ties.
        let mut best = Category::Children;
        for category in Category::ALL {
            if scores[slot(category)] > scores[slot(best)] {
                best = category;
            }
        }

        let confidence = (scores[slot(best)] / 3.0).min(1.0);

        if confidence < MIN_CONFIDENCE {
            return CategoryResult {
                category: Category::Music,
                confidence: DEFAULT_CONFIDENCE,
                reason: DEFAULT_REASON.to_string(),
            };
        }

        let reason = if reasons.is_empty() {
            "heuristic".to_string()
        } else {
            reasons.join("; ")
        };

        CategoryResult {
            category: best,
            confidence,
            reason,
        }
    }

    /// Children terms first, then audiobook terms
    fn text_signal(&self, text: &str) -> Vote {
        let children = keyword_score(text, &self.keywords.children);
        if children > KEYWORD_THRESHOLD {
            return Some((Category::Children, children));
        }

        let audiobook = keyword_score(text, &self.keywords.audiobook);
        if audiobook > KEYWORD_THRESHOLD {
            return Some((Category::Audiobook, audiobook));
        }

        None
    }

    /// Only the literal "audiobook" and "spoken" mark a spoken-word genre.
    fn genre_signal(&self, genre: &str) -> Vote {
        let genre = genre.to_lowercase();

        if genre.contains("audiobook") || genre.contains("spoken") {
            return Some((Category::Audiobook, 0.9));
        }

        if self
            .keywords
            .music_genres
            .iter()
            .any(|g| genre.contains(g.as_str()))
        {
            return Some((Category::Music, 0.7));
        }

        None
    }

    fn track_title_signal(&self, title: &str) -> Vote {
        if let Some((category, score)) = self.text_signal(title) {
            return Some((category, score * 0.8));
        }

        if is_chapter_title(title) {
            return Some((Category::Audiobook, 0.6));
        }

        None
    }
}

fn track_count_signal(count: usize) -> Vote {
    match count {
        0 => None,
        1..=5 => Some((Category::Audiobook, 0.3)),
        n if n > 50 => Some((Category::Audiobook, 0.4)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_sets() -> KeywordSets {
        KeywordSets::new(
            vec!["Kinder".to_string()],
            vec!["Lesung".to_string()],
            vec!["rock".to_string()],
        )
    }

    #[test]
    fn test_keyword_score_steps() {
        let keywords = small_sets().children;
        assert_eq!(keyword_score("Jazz", &keywords), 0.0);
        assert_eq!(keyword_score("KINDER", &keywords), 0.6);

        let keywords: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        assert_eq!(keyword_score("ab", &keywords), 0.8);
        assert_eq!(keyword_score("abcd", &keywords), 1.0);
    }

    #[test]
    fn test_substituted_keyword_sets() {
        let categorizer = Categorizer::new(small_sets());

        let result = categorizer.categorize("Kinder Chor", "Kinder Lieder", None, &[], None);
        assert_eq!(result.category, Category::Children);
        // 0.6 * 1.5 twice
        assert!((result.confidence - 0.6).abs() < 1e-9);

        // Default lists would catch "Bibi"; the small set does not
        let result = categorizer.categorize("Bibi", "Hexen", None, &[], None);
        assert_eq!(result.reason, DEFAULT_REASON);
    }

    #[test]
    fn test_chapter_numbering_votes_audiobook() {
        let categorizer = Categorizer::new(small_sets());
        let vote = categorizer.track_title_signal("Kapitel 12");
        assert_eq!(vote, Some((Category::Audiobook, 0.6)));
        assert_eq!(categorizer.track_title_signal("Intro"), None);
    }

    #[test]
    fn test_track_count_bounds() {
        assert_eq!(track_count_signal(0), None);
        assert_eq!(track_count_signal(5), Some((Category::Audiobook, 0.3)));
        assert_eq!(track_count_signal(6), None);
        assert_eq!(track_count_signal(50), None);
        assert_eq!(track_count_signal(51), Some((Category::Audiobook, 0.4)));
    }
}
