use serde::{Deserialize, Serialize};
use std::fmt;

/// One timed caption entry. Times are milliseconds from the start of the video.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cue {
    pub start: u64,
    pub end: u64,
    pub text: String,
}

impl Cue {
    pub fn new(start: u64, end: u64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    /// `start <= time_ms < end`. Zero-length cues never contain anything.
    pub fn contains(&self, time_ms: u64) -> bool {
        self.start <= time_ms && time_ms < self.end
    }

    pub fn duration_ms(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// Tokenized view of the text, used for per-word hover translation.
    pub fn items(&self) -> Vec<CueItem> {
        self.text.split_whitespace().map(CueItem::from_token).collect()
    }

    /// Text collapsed onto a single line with normalized spacing.
    pub fn cleaned_text(&self) -> String {
        self.text.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

impl fmt::Display for Cue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}ms --> {}ms] {}", self.start, self.end, self.text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CueItemTag {
    Word,
    Number,
    Punctuation,
}

impl fmt::Display for CueItemTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CueItemTag::Word => "word",
            CueItemTag::Number => "number",
            CueItemTag::Punctuation => "punctuation",
        };
        write!(f, "{label}")
    }
}

/// A word or symbol group of a cue, with its lookup form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CueItem {
    pub text: String,
    pub tag: CueItemTag,
    pub cleaned: String,
}

impl CueItem {
    fn from_token(token: &str) -> Self {
        let cleaned = token
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();

        let tag = if cleaned.is_empty() {
            CueItemTag::Punctuation
        } else if cleaned
            .chars()
            .all(|c| c.is_ascii_digit() || c == '.' || c == ',')
        {
            CueItemTag::Number
        } else {
            CueItemTag::Word
        };

        Self {
            text: token.to_string(),
            tag,
            cleaned,
        }
    }
}

/// Ordered cues of one track, sorted by start time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CueStore {
    cues: Vec<Cue>,
}

impl CueStore {
    pub fn new() -> Self {
        Self { cues: Vec::new() }
    }

    /// Build a store, stably sorting by start so equal starts keep source order.
    pub fn from_cues(mut cues: Vec<Cue>) -> Self {
        cues.sort_by_key(|cue| cue.start);
        Self { cues }
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Cue> {
        self.cues.iter()
    }

    pub fn as_slice(&self) -> &[Cue] {
        &self.cues
    }

    pub fn first(&self) -> Option<&Cue> {
        self.cues.first()
    }

    pub fn last(&self) -> Option<&Cue> {
        self.cues.last()
    }

    pub fn clear(&mut self) {
        self.cues.clear();
    }

    pub fn into_cues(self) -> Vec<Cue> {
        self.cues
    }
}

impl From<Vec<Cue>> for CueStore {
    fn from(cues: Vec<Cue>) -> Self {
        Self::from_cues(cues)
    }
}

impl<'a> IntoIterator for &'a CueStore {
    type Item = &'a Cue;
    type IntoIter = std::slice::Iter<'a, Cue>;

    fn into_iter(self) -> Self::IntoIter {
        self.cues.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_is_half_open() {
        let cue = Cue::new(1_000, 2_000, "x");
        assert!(!cue.contains(999));
        assert!(cue.contains(1_000));
        assert!(cue.contains(1_999));
        assert!(!cue.contains(2_000));
        assert!(!Cue::new(500, 500, "").contains(500));
    }

    #[test]
    fn test_items_tagging() {
        let cue = Cue::new(0, 1_000, "Hello, World! 42 --");
        let items = cue.items();
        assert_eq!(items.len(), 4);
        assert_eq!(items[0].text, "Hello,");
        assert_eq!(items[0].cleaned, "hello");
        assert_eq!(items[0].tag, CueItemTag::Word);
        assert_eq!(items[1].cleaned, "world");
        assert_eq!(items[2].tag, CueItemTag::Number);
        assert_eq!(items[3].tag, CueItemTag::Punctuation);
        assert!(items[3].cleaned.is_empty());
    }

    #[test]
    fn test_items_keep_inner_apostrophe() {
        let items = Cue::new(0, 1, "\"don't\"").items();
        assert_eq!(items[0].cleaned, "don't");
    }

    #[test]
    fn test_cleaned_text_single_line() {
        let cue = Cue::new(0, 1_000, "first line\n  second   line ");
        assert_eq!(cue.cleaned_text(), "first line second line");
    }

    #[test]
    fn test_store_sorts_stably() {
        let store = CueStore::from_cues(vec![
            Cue::new(2_000, 3_000, "c"),
            Cue::new(0, 1_000, "a"),
            Cue::new(2_000, 2_000, "b"),
        ]);
        let texts: Vec<&str> = store.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "c", "b"]);
        assert_eq!(store.last().map(|c| c.text.as_str()), Some("b"));
    }
}
