//! Keyword-weighted intent scoring and action resolution.

use tracing::debug;

use super::confidence;
use crate::query_router::{
    tables::RuleTables,
    text::Words,
    types::{
        entity::{EntityKind, Extraction},
        query::{ActionType, Intent, QueryType},
    },
};

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// `None` when no keyword of any category matched.
    pub intent: Option<Intent>,
    pub query_type: QueryType,
    pub action_type: ActionType,
    /// Matched keyword weight per token, at most 1.
    pub keyword_density: f64,
    pub confidence: f64,
}

/// What an action row may require beyond the query type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Requirement {
    Entity(EntityKind),
    Status,
    Temporal,
    Creation,
    Always,
}

/// First matching row wins.
const ACTION_TABLE: &[(QueryType, Requirement, ActionType)] = &[
    (
        QueryType::Contract,
        Requirement::Entity(EntityKind::ContractNumber),
        ActionType::ContractsByContractNumber,
    ),
    (
        QueryType::Contract,
        Requirement::Entity(EntityKind::CreatedBy),
        ActionType::ContractsByUser,
    ),
    (
        QueryType::Contract,
        Requirement::Entity(EntityKind::CustomerName),
        ActionType::ContractsByCustomerName,
    ),
    (
        QueryType::Contract,
        Requirement::Entity(EntityKind::AccountNumber),
        ActionType::ContractsByAccountNumber,
    ),
    (
        QueryType::Contract,
        Requirement::Status,
        ActionType::ContractsByStatus,
    ),
    (
        QueryType::Contract,
        Requirement::Temporal,
        ActionType::ContractsByDates,
    ),
    (
        QueryType::Contract,
        Requirement::Always,
        ActionType::ContractInfo,
    ),
    (
        QueryType::Parts,
        Requirement::Entity(EntityKind::PartNumber),
        ActionType::PartsByPartNumber,
    ),
    (
        QueryType::Parts,
        Requirement::Entity(EntityKind::ContractNumber),
        ActionType::PartsByContract,
    ),
    (
        QueryType::Parts,
        Requirement::Entity(EntityKind::CustomerName),
        ActionType::PartsByCustomer,
    ),
    (QueryType::Parts, Requirement::Always, ActionType::PartsInfo),
    (
        QueryType::Help,
        Requirement::Creation,
        ActionType::HelpContractCreation,
    ),
    (QueryType::Help, Requirement::Always, ActionType::HelpGeneral),
    (QueryType::Unknown, Requirement::Always, ActionType::Unknown),
    (QueryType::Error, Requirement::Always, ActionType::Error),
];

/// Picks the action for `query_type` from what was found in the text.
pub fn resolve_action(
    query_type: QueryType,
    extraction: &Extraction,
    words: &Words,
    tables: &RuleTables,
) -> ActionType {
    let satisfied = |requirement: &Requirement| match requirement {
        Requirement::Entity(kind) => extraction.entities.contains(*kind),
        Requirement::Status => extraction.has_status(),
        Requirement::Temporal => extraction.has_temporal(),
        Requirement::Creation => words.contains_any(&tables.rules().creation_keywords),
        Requirement::Always => true,
    };
    ACTION_TABLE
        .iter()
        .find(|(qt, requirement, _)| *qt == query_type && satisfied(requirement))
        .map_or(ActionType::Unknown, |(_, _, action)| *action)
}

pub fn classify(words: &Words, extraction: &Extraction, tables: &RuleTables) -> Classification {
    let rules = tables.rules();

    let mut matched_weight = 0.0;
    let mut best: Option<(Intent, f64)> = None;
    for intent in Intent::PRIORITY {
        let Some(table) = rules.intents.iter().find(|t| t.intent == intent) else {
            continue;
        };
        let total: f64 = table.keywords.iter().map(|k| k.weight).sum();
        let raw: f64 = table
            .keywords
            .iter()
            .map(|k| k.weight * words.count_phrase(&k.phrase) as f64)
            .sum();
        matched_weight += raw;
        if raw <= 0.0 || total <= 0.0 {
            continue;
        }
        let normalised = raw / total;
        debug!(intent = intent.as_str(), score = normalised, "intent scored");
        // Strictly greater keeps the higher-priority intent on ties.
        if best.map_or(true, |(_, score)| normalised > score) {
            best = Some((intent, normalised));
        }
    }

    let intent = override_intent(words, extraction, tables).or(best.map(|(intent, _)| intent));

    let has_parts = words.contains_any(&rules.parts_keywords)
        || extraction.entities.contains(EntityKind::PartNumber);
    let query_type = match intent {
        Some(Intent::Help) if !has_parts => QueryType::Help,
        _ if has_parts => QueryType::Parts,
        None if extraction.is_empty() => QueryType::Unknown,
        _ => QueryType::Contract,
    };

    let keyword_density = if words.is_empty() {
        0.0
    } else {
        (matched_weight / words.len() as f64).min(1.0)
    };
    let action_type = resolve_action(query_type, extraction, words, tables);
    let confidence = confidence::score(query_type, extraction, keyword_density, words.len());

    Classification {
        intent,
        query_type,
        action_type,
        keyword_density,
        confidence,
    }
}

/// A status word directly before "contract(s)" forces the status intent and
/// a resolved customer forces the customer intent.
fn override_intent(words: &Words, extraction: &Extraction, tables: &RuleTables) -> Option<Intent> {
    let status_phrase = tables.rules().status_words.iter().any(|status| {
        words.contains_phrase(&format!("{status} contracts"))
            || words.contains_phrase(&format!("{status} contract"))
    });
    if status_phrase {
        Some(Intent::StatusCheck)
    } else if extraction.entities.contains(EntityKind::CustomerName) {
        Some(Intent::Customer)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_router::tasks::entity_extraction::extract;

    fn classify_text(text: &str) -> Classification {
        let tables = RuleTables::builtin().unwrap();
        let extraction = extract(text, &tables);
        classify(&Words::new(text), &extraction, &tables)
    }

    #[test]
    fn creator_query_resolves_to_contracts_by_user() {
        let result =
            classify_text("pull contracts created by vinod after 2020 before 2024 status expired");
        assert_eq!(result.intent, Some(Intent::Creator));
        assert_eq!(result.query_type, QueryType::Contract);
        assert_eq!(result.action_type, ActionType::ContractsByUser);
        assert!(result.keyword_density > 0.0 && result.keyword_density <= 1.0);
    }

    #[test]
    fn status_phrase_overrides_scoring() {
        let result = classify_text("show active contracts created by vinod");
        assert_eq!(result.intent, Some(Intent::StatusCheck));
        assert_eq!(result.query_type, QueryType::Contract);
        assert_eq!(result.action_type, ActionType::ContractsByUser);

        let result = classify_text("list expired contracts");
        assert_eq!(result.action_type, ActionType::ContractsByStatus);
    }

    #[test]
    fn customer_entity_forces_customer_intent() {
        let result = classify_text("parts for customer XYZ Inc");
        assert_eq!(result.intent, Some(Intent::Customer));
        assert_eq!(result.query_type, QueryType::Parts);
        assert_eq!(result.action_type, ActionType::PartsByCustomer);
    }

    #[test]
    fn part_number_makes_a_parts_query() {
        let result = classify_text("why wasn't part AE125 loaded for contract 123456");
        assert_eq!(result.query_type, QueryType::Parts);
        assert_eq!(result.action_type, ActionType::PartsByPartNumber);

        let result = classify_text("datasheet for XJ-220B");
        assert_eq!(result.action_type, ActionType::PartsByPartNumber);
    }

    #[test]
    fn help_intent_without_parts_is_help() {
        let result = classify_text("how do I create a contract");
        assert_eq!(result.intent, Some(Intent::Help));
        assert_eq!(result.query_type, QueryType::Help);
        assert_eq!(result.action_type, ActionType::HelpContractCreation);

        let result = classify_text("help");
        assert_eq!(result.action_type, ActionType::HelpGeneral);
    }

    #[test]
    fn gibberish_is_unknown() {
        let result = classify_text("zzz qqq");
        assert_eq!(result.intent, None);
        assert_eq!(result.query_type, QueryType::Unknown);
        assert_eq!(result.action_type, ActionType::Unknown);
        assert!(result.confidence < confidence::DOWNGRADE_THRESHOLD);
    }

    #[test]
    fn temporal_contract_query_is_by_dates() {
        let result = classify_text("contracts created in 2024");
        assert_eq!(result.query_type, QueryType::Contract);
        assert_eq!(result.action_type, ActionType::ContractsByDates);
    }

    #[test]
    fn fallback_rows_name_their_entity() {
        let tables = RuleTables::builtin().unwrap();
        let words = Words::new("contract details");
        let empty = Extraction::default();
        let action = resolve_action(QueryType::Contract, &empty, &words, &tables);
        assert_eq!(action, ActionType::ContractInfo);
        assert_eq!(action.required_entity(), Some(EntityKind::ContractNumber));
        assert_eq!(
            resolve_action(QueryType::Parts, &empty, &words, &tables),
            ActionType::PartsInfo
        );
    }
}
