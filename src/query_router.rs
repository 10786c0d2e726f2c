pub mod enrichment;
pub mod tables;
pub mod tasks;
pub mod text;
pub mod types;
pub mod utils;

use std::sync::{Arc, PoisonError, RwLock};

use anyhow::Result;
use tracing::{debug, info, instrument, warn};

use crate::query_router::{
    enrichment::{EntityEnricher, NoEnrichment},
    tables::RuleTables,
    tasks::{
        confidence, entity_extraction, intent_classification, operator_builder,
        routing::{self, RoutingSignals},
        spell_correction,
    },
    text::Words,
    types::query::{ActionType, QueryType, Route, SessionHint, StructuredQuery},
};

const UNRECOGNISED_MESSAGE: &str =
    "Sorry, I could not tell what you are looking for. Try one of the suggested questions.";

/// Turns free-text questions about contracts and parts into structured
/// queries.
///
/// The engine holds no per-request state; concurrent calls to
/// [`QueryEngine::process`] share the current rule tables, which
/// [`QueryEngine::reload`] replaces atomically.
pub struct QueryEngine {
    tables: RwLock<Arc<RuleTables>>,
    enricher: Arc<dyn EntityEnricher>,
}

impl QueryEngine {
    pub fn new(tables: RuleTables) -> Self {
        Self::with_enricher(tables, Arc::new(NoEnrichment))
    }

    pub fn with_enricher(tables: RuleTables, enricher: Arc<dyn EntityEnricher>) -> Self {
        Self {
            tables: RwLock::new(Arc::new(tables)),
            enricher,
        }
    }

    /// The tables in effect right now.
    pub fn tables(&self) -> Arc<RuleTables> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swaps in `tables`. Requests already running finish with the tables
    /// they started with.
    pub fn reload(&self, tables: RuleTables) {
        let version = tables.version().to_string();
        *self.tables.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(tables);
        info!(%version, "rule tables reloaded");
    }

    #[instrument(skip_all, fields(len = text.len()))]
    pub fn process(&self, text: &str, hint: Option<&SessionHint>) -> StructuredQuery {
        let tables = self.tables();
        if text.trim().is_empty() {
            return StructuredQuery::empty_input(text, &tables.rules().suggestions);
        }
        let limit = tables.rules().max_query_length;
        if text.chars().count() > limit {
            warn!(limit, "query rejected as too long");
            return StructuredQuery::too_long(text, limit);
        }

        let query = self.run(&tables, text, hint).unwrap_or_else(|error| {
            warn!("failed to process query: {error:#}");
            StructuredQuery::failure(text, &error)
        });
        info!(
            route = ?query.route,
            action = ?query.action_type,
            confidence = query.confidence,
            "query routed"
        );
        utils::pretty_log("Structured query:", &query);
        query
    }

    fn run(
        &self,
        tables: &RuleTables,
        text: &str,
        hint: Option<&SessionHint>,
    ) -> Result<StructuredQuery> {
        let correction = spell_correction::correct(text, tables)?;
        let corrected = correction.text.as_str();
        let words = Words::new(corrected);

        let mut extraction = entity_extraction::extract(corrected, tables);
        if let Some(hint) = hint {
            entity_extraction::apply_hint(&mut extraction, hint, &words, tables, corrected.len());
        }
        enrichment::merge(
            &mut extraction.entities,
            self.enricher.candidates(corrected),
        );

        let classification = intent_classification::classify(&words, &extraction, tables);
        let operators = operator_builder::build(&extraction.entities, &extraction.modifiers)?;

        let signals =
            RoutingSignals::detect(&words, &extraction, classification.query_type, tables);
        let decision = routing::route(&signals);

        let mut query_type = decision.route.query_type(classification.query_type);
        let mut action_type = match decision.route {
            Route::PartsCreateError => ActionType::PartsCreateError,
            _ if query_type == classification.query_type => classification.action_type,
            _ => intent_classification::resolve_action(query_type, &extraction, &words, tables),
        };

        let mut confidence = confidence::score(
            query_type,
            &extraction,
            classification.keyword_density,
            words.len(),
        );
        let mut message = None;
        if let Some(kind) = confidence::missing_entity(action_type, &extraction) {
            confidence *= confidence::MISSING_ENTITY_PENALTY;
            message = Some(format!("Please specify {}.", kind.description()));
        }

        let mut suggestions = Vec::new();
        if decision.business_rule_violation.is_none()
            && confidence::should_downgrade(query_type, confidence)
        {
            debug!(confidence, "downgrading to unknown");
            query_type = QueryType::Unknown;
            action_type = ActionType::Unknown;
            message.get_or_insert_with(|| UNRECOGNISED_MESSAGE.to_string());
            suggestions.clone_from(&tables.rules().suggestions);
        }

        Ok(StructuredQuery {
            original_text: text.to_string(),
            corrected_text: correction.text.clone(),
            query_type,
            action_type,
            route: decision.route,
            entities: extraction.entities.to_map(),
            operators,
            confidence,
            spell_corrected: correction.applied(),
            corrections: correction.corrections,
            business_rule_violation: decision.business_rule_violation,
            enhancement_applied: decision.enhancement_applied,
            message,
            errors: Vec::new(),
            suggestions,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::query_router::{
        enrichment::EntityCandidate,
        tables::RuleSet,
        types::{
            entity::EntityKind,
            query::{Comparison, QueryResponse},
        },
    };

    fn engine() -> QueryEngine {
        QueryEngine::new(RuleTables::builtin().unwrap())
    }

    #[test]
    fn creator_query_with_dates_and_status() {
        let query = engine().process(
            "pull contracts created by vinod after 2020 before 2024 status expired",
            None,
        );
        assert_eq!(query.query_type, QueryType::Contract);
        assert_eq!(query.action_type, ActionType::ContractsByUser);
        assert_eq!(query.route, Route::Contract);
        assert_eq!(query.entities.len(), 1);
        assert_eq!(query.entity(EntityKind::CreatedBy), Some("vinod"));

        let ops: Vec<_> = query
            .operators
            .iter()
            .map(|op| (op.field.as_str(), op.comparison, op.value.clone()))
            .collect();
        assert_eq!(
            ops,
            vec![
                ("created_by", Comparison::Equals, json!("vinod")),
                ("created_date", Comparison::GreaterThan, json!("2020-01-01")),
                ("created_date", Comparison::LessThan, json!("2024-12-31")),
                ("status", Comparison::Equals, json!("expired")),
            ]
        );
        assert!(query.confidence >= confidence::DOWNGRADE_THRESHOLD);
    }

    #[test]
    fn misspelled_keyword_glued_to_an_id() {
        let query = engine().process("Show the contrst78954632", None);
        assert!(query.spell_corrected);
        assert_eq!(query.corrected_text, "Show the contract78954632");
        assert_eq!(
            query.corrections.get("contrst").map(String::as_str),
            Some("contract")
        );
        assert_eq!(query.entity(EntityKind::ContractNumber), Some("78954632"));
        assert_eq!(query.route, Route::Contract);
        assert_eq!(query.action_type, ActionType::ContractsByContractNumber);
    }

    #[test]
    fn blank_input_is_an_error() {
        for text in ["", "   \t"] {
            let query = engine().process(text, None);
            assert_eq!(query.query_type, QueryType::Error);
            assert_eq!(query.route, Route::Error);
            assert_eq!(query.confidence, 0.0);
            assert!(query.message.as_deref().is_some_and(|m| !m.is_empty()));
        }
    }

    #[test]
    fn parts_for_a_customer() {
        let query = engine().process("parts for customer XYZ Inc", None);
        assert_eq!(query.query_type, QueryType::Parts);
        assert_eq!(query.action_type, ActionType::PartsByCustomer);
        assert_eq!(query.route, Route::Parts);
        assert_eq!(query.entity(EntityKind::CustomerName), Some("XYZ Inc"));
    }

    #[test]
    fn account_and_contract_numbers_are_told_apart() {
        let query = engine().process("show 123456 and 987654321", None);
        assert_eq!(query.entity(EntityKind::AccountNumber), Some("987654321"));
        assert_eq!(query.entity(EntityKind::ContractNumber), Some("123456"));
    }

    #[test]
    fn why_question_about_a_part_is_a_parts_query() {
        let query = engine().process("why wasn't part AE125 loaded for contract 123456", None);
        assert_eq!(query.query_type, QueryType::Parts);
        assert_eq!(query.route, Route::Parts);
        assert_eq!(query.entity(EntityKind::PartNumber), Some("AE125"));
        assert_eq!(query.entity(EntityKind::ContractNumber), Some("123456"));
        assert!(query.business_rule_violation.is_none());
    }

    #[test]
    fn past_tense_creation_is_enhanced() {
        let query = engine().process("contracts created in 2024", None);
        assert_eq!(query.query_type, QueryType::Contract);
        assert_eq!(query.route, Route::Contract);
        assert!(query.enhancement_applied.is_some());
    }

    #[test]
    fn creating_parts_is_never_downgraded() {
        let query = engine().process("add parts", None);
        assert_eq!(query.route, Route::PartsCreateError);
        assert_eq!(query.query_type, QueryType::Parts);
        assert_eq!(query.action_type, ActionType::PartsCreateError);
        assert!(query.business_rule_violation.is_some());
    }

    #[test]
    fn creation_help() {
        let query = engine().process("how do I create a contract", None);
        assert_eq!(query.query_type, QueryType::Help);
        assert_eq!(query.route, Route::Help);
        assert_eq!(query.action_type, ActionType::HelpContractCreation);
    }

    #[test]
    fn missing_part_number_is_requested() {
        let query = engine().process("show parts inventory", None);
        assert_eq!(query.route, Route::Parts);
        assert_eq!(query.action_type, ActionType::PartsInfo);
        assert!(query
            .message
            .as_deref()
            .is_some_and(|m| m.starts_with("Please specify a part number")));
    }

    #[test]
    fn weak_lookup_without_an_id_is_downgraded() {
        let query = engine().process("show contract details", None);
        assert_eq!(query.route, Route::Contract);
        assert_eq!(query.query_type, QueryType::Unknown);
        assert_eq!(query.action_type, ActionType::Unknown);
        assert!(query
            .message
            .as_deref()
            .is_some_and(|m| m.starts_with("Please specify a contract number")));
        assert!(!query.suggestions.is_empty());
    }

    #[test]
    fn missing_entity_scales_confidence() {
        let tables = RuleTables::builtin().unwrap();
        let text = "show parts inventory";
        let words = Words::new(text);
        let extraction = entity_extraction::extract(text, &tables);
        let classification = intent_classification::classify(&words, &extraction, &tables);
        let unpenalised = confidence::score(
            QueryType::Parts,
            &extraction,
            classification.keyword_density,
            words.len(),
        );

        let query = engine().process(text, None);
        assert_eq!(query.query_type, QueryType::Parts);
        assert!(
            (query.confidence - unpenalised * confidence::MISSING_ENTITY_PENALTY).abs() < 1e-9
        );

        let query = engine().process("show parts inventory for part AE125", None);
        assert_eq!(query.entity(EntityKind::PartNumber), Some("AE125"));
        assert!(query.message.is_none());
        assert!(query.confidence > unpenalised);
    }

    #[test]
    fn non_ascii_digits_are_not_dates() {
        let query = engine().process("contracts in 20\u{0662}\u{0664}", None);
        assert_ne!(query.query_type, QueryType::Error);
        assert!(query.errors.is_empty());
        assert_eq!(query.entity(EntityKind::Year), None);
        assert!(query.operators.is_empty());
    }

    #[test]
    fn stage_failure_becomes_an_error_result() {
        struct BadYear;
        impl EntityEnricher for BadYear {
            fn candidates(&self, _text: &str) -> Vec<EntityCandidate> {
                vec![EntityCandidate {
                    kind: EntityKind::Year,
                    value: "20x4".to_string(),
                    offset: 0,
                }]
            }
        }

        let engine =
            QueryEngine::with_enricher(RuleTables::builtin().unwrap(), Arc::new(BadYear));
        let query = engine.process("show contract 123456", None);
        assert_eq!(query.query_type, QueryType::Error);
        assert_eq!(query.route, Route::Error);
        assert_eq!(query.confidence, 0.0);
        assert!(query.errors.iter().any(|e| e.contains("20x4")));
        assert!(query.message.is_some());
    }

    #[test]
    fn sort_phrases_are_not_creators() {
        for text in ["show contracts ordered by price", "list contracts sorted by value"] {
            let query = engine().process(text, None);
            assert_eq!(query.entity(EntityKind::CreatedBy), None, "{text}");
            assert_ne!(query.action_type, ActionType::ContractsByUser, "{text}");
        }
        let query = engine().process("contracts by vinod", None);
        assert_eq!(query.entity(EntityKind::CreatedBy), Some("vinod"));
    }

    #[test]
    fn lookups_starting_with_new_are_not_creation() {
        let query = engine().process("new contracts for customer Boeing", None);
        assert_eq!(query.route, Route::Contract);
        assert_eq!(query.action_type, ActionType::ContractsByCustomerName);

        let query = engine().process("new parts for contract 123456", None);
        assert_eq!(query.route, Route::Parts);
        assert_eq!(query.action_type, ActionType::PartsByContract);
        assert!(query.business_rule_violation.is_none());
    }

    #[test]
    fn gibberish_is_unknown_with_suggestions() {
        let query = engine().process("zzz qqq", None);
        assert_eq!(query.query_type, QueryType::Unknown);
        assert_eq!(query.action_type, ActionType::Unknown);
        assert!(query.confidence < 0.3);
        assert!(!query.suggestions.is_empty());
    }

    #[test]
    fn overlong_input_is_rejected() {
        let mut rules = RuleSet::default();
        rules.max_query_length = 10;
        let engine = QueryEngine::new(RuleTables::new(rules).unwrap());
        let query = engine.process("show contract 123456", None);
        assert_eq!(query.query_type, QueryType::Error);
        assert_eq!(query.errors, ["input too long"]);
    }

    #[test]
    fn results_are_deterministic_and_bounded() {
        let engine = engine();
        for text in [
            "pull contracts created by vinod after 2020 before 2024 status expired",
            "Show the contrst78954632",
            "parts for customer XYZ Inc",
            "active contracts for client Acme Aerospace between 2019 and 2021",
            "x",
            "??",
        ] {
            let first = engine.process(text, None);
            let second = engine.process(text, None);
            assert_eq!(first, second, "{text}");
            assert!((0.0..=1.0).contains(&first.confidence), "{text}");
            if first.query_type == QueryType::Unknown {
                assert!(first.confidence < 0.5, "{text}");
            }
            assert!(first.entities.values().all(|v| !v.is_empty()), "{text}");
        }
    }

    #[test]
    fn hint_resolves_back_references() {
        let hint = SessionHint {
            contract_number: Some("555111".to_string()),
            part_number: None,
        };
        let query = engine().process("who created that contract", Some(&hint));
        assert_eq!(query.entity(EntityKind::ContractNumber), Some("555111"));
        assert_eq!(query.action_type, ActionType::ContractsByContractNumber);
    }

    #[test]
    fn enricher_fills_gaps_only() {
        struct Names;
        impl EntityEnricher for Names {
            fn candidates(&self, text: &str) -> Vec<EntityCandidate> {
                text.find("acme")
                    .map(|offset| EntityCandidate {
                        kind: EntityKind::CustomerName,
                        value: "Acme".to_string(),
                        offset,
                    })
                    .into_iter()
                    .collect()
            }
        }

        let engine = QueryEngine::with_enricher(RuleTables::builtin().unwrap(), Arc::new(Names));
        let query = engine.process("contracts with acme", None);
        assert_eq!(query.entity(EntityKind::CustomerName), Some("Acme"));
        assert_eq!(query.action_type, ActionType::ContractsByCustomerName);
    }

    #[test]
    fn reload_swaps_tables() {
        let engine = engine();
        assert_eq!(engine.tables().version(), "builtin-1");
        let before = engine.tables();

        let mut rules = RuleSet::default();
        rules.version = "custom-2".to_string();
        rules
            .misspellings
            .insert("cntrct".to_string(), "contract".to_string());
        engine.reload(RuleTables::new(rules).unwrap());

        assert_eq!(before.version(), "builtin-1");
        assert_eq!(engine.tables().version(), "custom-2");
        let query = engine.process("show cntrct 123456", None);
        assert_eq!(query.corrected_text, "show contract 123456");
    }

    #[test]
    fn flat_response_shape() {
        let query = engine().process("parts for contract 123456", None);
        let value = serde_json::to_value(QueryResponse::from(&query)).unwrap();
        assert_eq!(value["queryType"], json!("PARTS"));
        assert_eq!(value["actionType"], json!("parts_by_contract"));
        assert_eq!(value["contract_number"], json!("123456"));
        assert_eq!(value["route"], json!("PARTS"));
        assert_eq!(
            value["entities"],
            json!([{"attribute": "contract_number", "operation": "EQUALS", "value": "123456"}])
        );
    }
}
