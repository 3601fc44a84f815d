//! Keyword scoring for the fuzzy resolution tiers.

use serde::{Deserialize, Serialize};

use crate::dom::text::normalize_for_match;

/// Every constant of the keyword scorer. Tunable from config without
/// touching control flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoreTable {
    /// Whole element text equals the keyword.
    pub exact: i32,
    /// Keyword appears as a whole word in the element text.
    pub whole_word: i32,
    /// Element text contains the keyword as a substring.
    pub partial: i32,
    /// Keyword contains one of the element's words.
    pub reverse: i32,
    /// Minimum length for partial and reverse containment.
    pub min_partial_len: usize,
    /// Bonus per matched keyword after the first.
    pub extra_keyword: i32,
    pub short_text_len: usize,
    pub short_text_bonus: i32,
    pub long_text_len: usize,
    pub long_text_penalty: i32,
    pub very_long_text_len: usize,
    pub very_long_text_penalty: i32,
    pub min_score: i32,
    pub max_keywords: usize,
}

impl Default for ScoreTable {
    fn default() -> Self {
        Self {
            exact: 30,
            whole_word: 25,
            partial: 15,
            reverse: 10,
            min_partial_len: 4,
            extra_keyword: 10,
            short_text_len: 30,
            short_text_bonus: 15,
            long_text_len: 50,
            long_text_penalty: 10,
            very_long_text_len: 100,
            very_long_text_penalty: 10,
            min_score: 20,
            max_keywords: 8,
        }
    }
}

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "to", "on", "in", "of", "for", "and", "or", "at", "by", "with", "from", "into",
    "is", "it", "this", "that", "then", "your", "my", "our", "you", "be", "as", "click", "tap",
    "press", "select", "choose", "go", "open", "navigate", "button", "link", "enter", "type",
    "field", "page", "option", "item", "here", "there", "now", "next", "step",
];

pub(crate) fn quoted_phrases(text: &str) -> Vec<String> {
    let mut phrases = Vec::new();
    let mut open: Option<(char, usize)> = None;
    for (idx, c) in text.char_indices() {
        match open {
            None if c == '"' || c == '“' => open = Some((c, idx + c.len_utf8())),
            Some((opener, start)) if (opener == '"' && c == '"') || (opener == '“' && c == '”') => {
                let phrase = normalize_for_match(&text[start..idx]);
                if !phrase.is_empty() && !phrases.contains(&phrase) {
                    phrases.push(phrase);
                }
                open = None;
            }
            _ => {}
        }
    }
    phrases
}

fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .map(|w| w.trim_matches('\''))
        .filter(|w| !w.is_empty())
}

/// Up to `max` lowercase keywords: quoted phrases first, then content words.
pub fn extract_keywords(text: &str, max: usize) -> Vec<String> {
    let mut keywords = quoted_phrases(text);
    let lower = text.to_lowercase();
    for word in words(&lower) {
        if word.chars().count() < 2 || STOP_WORDS.contains(&word) {
            continue;
        }
        if !keywords.iter().any(|k| k == word) {
            keywords.push(word.to_string());
        }
    }
    keywords.truncate(max);
    keywords
}

impl ScoreTable {
    /// Score one candidate text against the keyword list.
    pub fn score(&self, element_text: &str, keywords: &[String]) -> i32 {
        let text = normalize_for_match(element_text);
        if text.is_empty() || keywords.is_empty() {
            return 0;
        }
        let element_words: Vec<&str> = words(&text).collect();
        let mut score = 0;
        let mut matched = 0;

        for keyword in keywords {
            let keyword_len = keyword.chars().count();
            let gained = if text == *keyword {
                self.exact
            } else if contains_phrase(&element_words, keyword) {
                self.whole_word
            } else if keyword_len >= self.min_partial_len && text.contains(keyword.as_str()) {
                self.partial
            } else if element_words
                .iter()
                .any(|w| w.chars().count() >= self.min_partial_len && keyword.contains(w))
            {
                self.reverse
            } else {
                0
            };
            if gained > 0 {
                if matched > 0 {
                    score += self.extra_keyword;
                }
                matched += 1;
                score += gained;
            }
        }

        let len = text.chars().count();
        if matched > 0 && len <= self.short_text_len {
            score += self.short_text_bonus;
        }
        if len > self.long_text_len {
            score -= self.long_text_penalty;
        }
        if len > self.very_long_text_len {
            score -= self.very_long_text_penalty;
        }
        score
    }

    pub fn accepts(&self, score: i32) -> bool {
        score >= self.min_score
    }
}

/// Keyword (possibly several words) occurs as a run of whole words.
fn contains_phrase(element_words: &[&str], keyword: &str) -> bool {
    let needle: Vec<&str> = words(keyword).collect();
    if needle.is_empty() || needle.len() > element_words.len() {
        return false;
    }
    element_words.windows(needle.len()).any(|w| w == needle.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_prefer_quotes() {
        let kws = extract_keywords("Click the \"Edit profile\" button to change your picture", 8);
        assert_eq!(kws, vec!["edit profile", "edit", "profile", "change", "picture"]);
        assert_eq!(extract_keywords("one two three four five six seven eight nine ten", 8).len(), 8);
    }

    #[test]
    fn test_score_components() {
        let table = ScoreTable::default();
        let kws = vec!["edit profile".to_string(), "edit".to_string(), "profile".to_string()];
        // exact 30 + whole word 25 + whole word 25 + two extra keywords + short text
        assert_eq!(table.score("Edit profile", &kws), 30 + 25 + 25 + 20 + 15);
        assert_eq!(table.score("Settings", &kws), 0);

        let kws = vec!["profiles".to_string()];
        // reverse containment of "profile"
        assert_eq!(table.score("Profile", &kws), 10 + 15);
        let long = "profile ".repeat(20);
        assert_eq!(table.score(&long, &["profile".to_string()]), 25 - 10 - 10);
    }

    #[test]
    fn test_partial_requires_min_len() {
        let table = ScoreTable::default();
        assert_eq!(table.score("Repository settings", &["repo".to_string()]), 15 + 15);
        assert_eq!(table.score("Repository settings", &["rep".to_string()]), 0);
    }
}
