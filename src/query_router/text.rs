/// Lowercased alphanumeric form of a token; `"Wasn't,"` becomes `"wasnt"`.
pub fn clean_token(token: &str) -> String {
    token
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Word-level view of an utterance used for keyword and phrase matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Words(Vec<String>);

impl Words {
    pub fn new(text: &str) -> Self {
        Self(split(text))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of times `phrase` occurs as a whole-word sequence.
    pub fn count_phrase(&self, phrase: &str) -> usize {
        let needle = split(phrase);
        if needle.is_empty() || needle.len() > self.0.len() {
            return 0;
        }
        self.0
            .windows(needle.len())
            .filter(|window| *window == needle.as_slice())
            .count()
    }

    pub fn contains_phrase(&self, phrase: &str) -> bool {
        self.count_phrase(phrase) > 0
    }

    pub fn contains_any(&self, phrases: &[String]) -> bool {
        phrases.iter().any(|p| self.contains_phrase(p))
    }
}

fn split(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(clean_token)
        .filter(|w| !w.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phrases_match_whole_words_only() {
        let words = Words::new("Show the contracts, created by Vinod!");
        assert_eq!(words.len(), 6);
        assert!(words.contains_phrase("created by"));
        assert!(words.contains_phrase("CONTRACTS"));
        assert!(!words.contains_phrase("contract"));
        assert!(!words.contains_phrase("by vinod now"));
    }

    #[test]
    fn repeated_phrases_are_counted() {
        let words = Words::new("part AE125 and part AE126");
        assert_eq!(words.count_phrase("part"), 2);
        assert_eq!(words.count_phrase(""), 0);
    }

    #[test]
    fn punctuation_is_stripped() {
        assert_eq!(clean_token("Wasn't,"), "wasnt");
        assert_eq!(clean_token("--"), "");
    }
}
