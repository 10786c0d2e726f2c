use std::collections::BTreeMap;

use anyhow::{Context, Result};
use regex::{NoExpand, Regex};
use tracing::debug;

use crate::query_router::{tables::RuleTables, text::clean_token};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correction {
    pub text: String,
    /// Misspelled key to the correction that was substituted.
    pub corrections: BTreeMap<String, String>,
}

impl Correction {
    pub fn applied(&self) -> bool {
        !self.corrections.is_empty()
    }
}

/// Rewrites known misspelled domain words. Replacements are whole-word and
/// case-insensitive and leave everything else in `text` untouched, so the
/// result equals the input when nothing was corrected.
///
/// A misspelled word glued to a numeric id (`contrst78954632`) is corrected
/// in place and keeps its digits (`contract78954632`).
pub fn correct(text: &str, tables: &RuleTables) -> Result<Correction> {
    let mut corrected = text.to_string();
    let mut corrections = BTreeMap::new();

    for token in text.to_lowercase().split_whitespace() {
        let key = clean_token(token);
        if key.is_empty() {
            continue;
        }

        let (word, fix, replacement) = if let Some(fix) = tables.correction_for(&key) {
            (key.clone(), fix, fix.to_string())
        } else if let Some(caps) = tables.patterns().word_with_id.captures(&key) {
            let Some(fix) = tables.correction_for(&caps[1]) else {
                continue;
            };
            (caps[1].to_string(), fix, format!("{fix}{}", &caps[2]))
        } else {
            continue;
        };

        let replaced = replace_whole_word(&corrected, &key, &replacement)?;
        if replaced != corrected {
            debug!(%word, %replacement, "corrected token");
            corrected = replaced;
            corrections.insert(word, fix.to_string());
        }
    }

    Ok(Correction {
        text: corrected,
        corrections,
    })
}

fn replace_whole_word(text: &str, word: &str, replacement: &str) -> Result<String> {
    let pattern = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(word)))
        .with_context(|| format!("failed to build correction pattern for `{word}`"))?;
    Ok(pattern
        .replace_all(text, NoExpand(replacement))
        .into_owned())
}
