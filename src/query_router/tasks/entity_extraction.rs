//! Pattern-based entity extraction.
//!
//! Rules run in a fixed order and never overwrite a key an earlier rule has
//! set. Identifier rules are aware of each other: a digit run taken as an
//! account number is not offered to the contract rule, and tokens introduced
//! by a contract or account keyword are never taken as part numbers.

use std::ops::Range;

use regex::Match;
use tracing::debug;

use crate::query_router::{
    tables::RuleTables,
    text::Words,
    types::{
        entity::{DateBound, Entities, EntityKind, Extraction, Modifier},
        query::SessionHint,
    },
};

const MAX_NAME_WORDS: usize = 5;

pub fn extract(text: &str, tables: &RuleTables) -> Extraction {
    let mut entities = Entities::default();

    extract_identifiers(text, tables, &mut entities);
    extract_part_number(text, tables, &mut entities);
    extract_customer(text, tables, &mut entities);
    extract_creator(text, tables, &mut entities);
    let (modifiers, temporal_spans) = extract_modifiers(text, tables);
    extract_year(text, tables, &temporal_spans, &mut entities);

    debug!(entities = entities.len(), modifiers = modifiers.len(), "extraction finished");
    Extraction {
        entities,
        modifiers,
    }
}

/// Fills the contract or part number from the caller's prior context when the
/// text refers back to it ("this contract", "that part") and names none.
pub fn apply_hint(
    extraction: &mut Extraction,
    hint: &SessionHint,
    words: &Words,
    tables: &RuleTables,
    text_len: usize,
) {
    let rules = tables.rules();
    if !words.contains_any(&rules.back_references) {
        return;
    }
    if let Some(contract) = &hint.contract_number {
        extraction
            .entities
            .insert_if_absent(EntityKind::ContractNumber, contract, text_len);
    }
    if let Some(part) = &hint.part_number {
        if words.contains_any(&rules.parts_keywords) {
            extraction
                .entities
                .insert_if_absent(EntityKind::PartNumber, part, text_len);
        }
    }
}

/// Account numbers (seven or more digits) first, then contract numbers.
///
/// A long run introduced by a contract keyword ("contract 12345678") is left
/// to the contract rule, unless a standalone six-digit run is present to take
/// the contract slot.
fn extract_identifiers(text: &str, tables: &RuleTables, entities: &mut Entities) {
    let patterns = tables.patterns();
    let keyword_ids: Vec<Range<usize>> = patterns
        .contract_number
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.range())
        .collect();
    let six_digit_runs: Vec<Match> = patterns.six_digits.find_iter(text).collect();

    let account = patterns
        .long_digits
        .find_iter(text)
        .find(|m| !six_digit_runs.is_empty() || !keyword_ids.contains(&m.range()));
    if let Some(m) = account {
        entities.insert_if_absent(EntityKind::AccountNumber, m.as_str(), m.start());
    }
    let account_range = account.map(|m| m.range());

    let contract = keyword_ids
        .iter()
        .find(|range| Some(*range) != account_range.as_ref())
        .cloned()
        .or_else(|| six_digit_runs.first().map(Match::range));
    if let Some(range) = contract {
        entities.insert_if_absent(EntityKind::ContractNumber, &text[range.clone()], range.start);
    }
}

fn is_part_token(text: &str, m: &Match, tables: &RuleTables) -> bool {
    let value = m.as_str();
    value.chars().any(|c| c.is_ascii_alphabetic())
        && value.chars().any(|c| c.is_ascii_digit())
        && !tables.patterns().id_keyword_before.is_match(&text[..m.start()])
}

/// Tokens introduced by part context win over bare part-shaped tokens.
fn extract_part_number(text: &str, tables: &RuleTables, entities: &mut Entities) {
    let patterns = tables.patterns();
    let from_context = patterns
        .part_context
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .find(|m| is_part_token(text, m, tables));
    let candidate = from_context.or_else(|| {
        patterns
            .part_shape
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .find(|m| is_part_token(text, m, tables))
    });
    if let Some(m) = candidate {
        entities.insert_if_absent(
            EntityKind::PartNumber,
            &m.as_str().to_ascii_uppercase(),
            m.start(),
        );
    }
}

fn trim_word(word: &str) -> &str {
    word.trim_matches(|c: char| matches!(c, '.' | '\'' | '"' | ':' | '`'))
}

fn is_name_word(word: &str, tables: &RuleTables) -> bool {
    !word.is_empty()
        && !tables.is_stop_word(word)
        && !tables.is_status_word(word)
        && !word.chars().all(|c| c.is_ascii_digit())
}

/// Words after "customer", "client" or "account name", up to the next stop
/// word or punctuation. Falls back to the company table and to capitalised
/// names followed by a company suffix.
fn extract_customer(text: &str, tables: &RuleTables, entities: &mut Entities) {
    let patterns = tables.patterns();

    for keyword in patterns.customer_keyword.find_iter(text) {
        let rest = &text[keyword.end()..];
        let start = keyword.end() + (rest.len() - rest.trim_start().len());
        let clause = rest
            .split(|c: char| matches!(c, ',' | ';' | '?' | '!' | '(' | ')' | '"'))
            .next()
            .unwrap_or_default();
        let name: Vec<&str> = clause
            .split_whitespace()
            .map(trim_word)
            .take_while(|w| is_name_word(w, tables))
            .take(MAX_NAME_WORDS)
            .collect();
        if !name.is_empty() {
            entities.insert_if_absent(EntityKind::CustomerName, &name.join(" "), start);
            return;
        }
    }

    if let Some(m) = patterns.company_name.as_ref().and_then(|re| re.find(text)) {
        entities.insert_if_absent(EntityKind::CustomerName, m.as_str(), m.start());
        return;
    }

    let Some(suffix) = patterns.company_suffix.as_ref() else {
        return;
    };
    for caps in suffix.captures_iter(text) {
        let Some(m) = caps.get(1) else {
            continue;
        };
        // Sentence-initial verbs are capitalised too ("Show Globex Corp").
        let words: Vec<&str> = m
            .as_str()
            .split_whitespace()
            .skip_while(|w| tables.is_stop_word(w) || tables.is_status_word(w))
            .collect();
        if words.len() >= 2 {
            let offset = m.start() + m.as_str().rfind(words[0]).unwrap_or(0);
            entities.insert_if_absent(EntityKind::CustomerName, &words.join(" "), offset);
            return;
        }
    }
}

fn is_creator(word: &str, tables: &RuleTables) -> bool {
    is_name_word(word, tables) && !tables.is_company_word(word)
}

/// "created by <name>", else a trailing "by <name>" that does not end a
/// sort phrase ("ordered by price").
fn extract_creator(text: &str, tables: &RuleTables, entities: &mut Entities) {
    let patterns = tables.patterns();
    let trailing = patterns.by_word.captures(text).filter(|caps| {
        caps.get(0)
            .is_some_and(|by| !patterns.sort_verb_before.is_match(&text[..by.start()]))
    });
    let creator = patterns
        .created_by
        .captures_iter(text)
        .chain(trailing)
        .filter_map(|caps| caps.get(1))
        .find(|m| is_creator(m.as_str(), tables));
    if let Some(m) = creator {
        entities.insert_if_absent(EntityKind::CreatedBy, m.as_str(), m.start());
    }
}

fn push_bound(
    modifiers: &mut Vec<Modifier>,
    raw: &str,
    offset: usize,
    make: fn(DateBound, usize) -> Modifier,
) {
    match DateBound::parse(raw) {
        Ok(bound) => modifiers.push(make(bound, offset)),
        Err(error) => debug!(%error, "ignoring temporal phrase"),
    }
}

/// Status words and temporal phrases, ordered by position. Also returns the
/// byte ranges covered by temporal phrases.
fn extract_modifiers(text: &str, tables: &RuleTables) -> (Vec<Modifier>, Vec<Range<usize>>) {
    let patterns = tables.patterns();
    let mut modifiers = Vec::new();
    let mut spans = Vec::new();

    for caps in patterns.between.captures_iter(text) {
        let (Some(whole), Some(from), Some(to)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        spans.push(whole.range());
        match (DateBound::parse(from.as_str()), DateBound::parse(to.as_str())) {
            (Ok(from), Ok(to)) => {
                // "from 2024 to 2023" means the same range as "from 2023 to 2024".
                let (from, to) = match (from.start(), to.start()) {
                    (Ok(start), Ok(end)) if start > end => (to, from),
                    _ => (from, to),
                };
                modifiers.push(Modifier::Between {
                    from,
                    to,
                    offset: whole.start(),
                });
            }
            _ => debug!(phrase = whole.as_str(), "ignoring temporal phrase"),
        }
    }
    for caps in patterns.after.captures_iter(text) {
        if let (Some(whole), Some(date)) = (caps.get(0), caps.get(1)) {
            spans.push(whole.range());
            push_bound(&mut modifiers, date.as_str(), whole.start(), |bound, offset| {
                Modifier::After { bound, offset }
            });
        }
    }
    for caps in patterns.before.captures_iter(text) {
        if let (Some(whole), Some(date)) = (caps.get(0), caps.get(1)) {
            spans.push(whole.range());
            push_bound(&mut modifiers, date.as_str(), whole.start(), |bound, offset| {
                Modifier::Before { bound, offset }
            });
        }
    }
    if let Some(status) = patterns.status.as_ref() {
        for m in status.find_iter(text) {
            modifiers.push(Modifier::Status {
                value: m.as_str().to_lowercase(),
                offset: m.start(),
            });
        }
    }

    modifiers.sort_by_key(Modifier::offset);
    (modifiers, spans)
}

/// A year outside every temporal phrase ("contracts created in 2024"). The
/// year of a full ISO date is not taken on its own.
fn extract_year(
    text: &str,
    tables: &RuleTables,
    temporal_spans: &[Range<usize>],
    entities: &mut Entities,
) {
    let year = tables
        .patterns()
        .year
        .captures_iter(text)
        .filter(|caps| caps.get(2).is_none())
        .filter_map(|caps| caps.get(1))
        .find(|m| {
            !temporal_spans
                .iter()
                .any(|span| span.start <= m.start() && m.end() <= span.end)
        });
    if let Some(m) = year {
        entities.insert_if_absent(EntityKind::Year, m.as_str(), m.start());
    }
}
