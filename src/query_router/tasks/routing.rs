//! Business-rule routing.
//!
//! Rules are evaluated top to bottom and the first one whose predicate holds
//! decides the route.

use tracing::debug;

use crate::query_router::{
    tables::RuleTables,
    text::Words,
    types::{
        entity::{EntityKind, Extraction},
        query::{QueryType, Route},
    },
};

const PARTS_CREATE_VIOLATION: &str = "Parts cannot be created here. Parts are loaded together \
     with their contract; ask about existing parts or about creating a contract instead.";
const PAST_TENSE_ENHANCEMENT: &str =
    "Past-tense phrasing detected; searching existing contracts rather than creating one.";

/// Boolean facts about an utterance that the routing rules test.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoutingSignals {
    pub parts: bool,
    pub creation: bool,
    pub past_tense: bool,
    pub query_phrased: bool,
    pub help_request: bool,
    pub help_intent: bool,
}

impl RoutingSignals {
    pub fn detect(
        words: &Words,
        extraction: &Extraction,
        classified: QueryType,
        tables: &RuleTables,
    ) -> Self {
        let rules = tables.rules();
        Self {
            parts: words.contains_any(&rules.parts_keywords)
                || extraction.entities.contains(EntityKind::PartNumber),
            creation: words.contains_any(&rules.creation_keywords),
            past_tense: words.contains_any(&rules.past_tense_verbs)
                && words.contains_any(&rules.attribution_markers),
            query_phrased: words.contains_any(&rules.query_verbs),
            help_request: words.contains_any(&rules.help_phrases),
            help_intent: classified == QueryType::Help,
        }
    }
}

pub struct RoutingRule {
    pub name: &'static str,
    pub applies: fn(&RoutingSignals) -> bool,
    pub route: Route,
}

pub const RULES: &[RoutingRule] = &[
    RoutingRule {
        name: "parts_creation",
        applies: |s| s.parts && s.creation && !s.past_tense && !s.query_phrased,
        route: Route::PartsCreateError,
    },
    RoutingRule {
        name: "parts",
        applies: |s| s.parts,
        route: Route::Parts,
    },
    RoutingRule {
        name: "help_phrasing",
        applies: |s| s.help_request && s.creation && !s.past_tense,
        route: Route::Help,
    },
    RoutingRule {
        name: "creation_request",
        applies: |s| s.creation && !s.past_tense && !s.query_phrased,
        route: Route::Help,
    },
    RoutingRule {
        name: "help_intent",
        applies: |s| s.help_intent && !s.past_tense,
        route: Route::Help,
    },
    RoutingRule {
        name: "contract",
        applies: |_| true,
        route: Route::Contract,
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingDecision {
    pub route: Route,
    pub rule: &'static str,
    pub business_rule_violation: Option<String>,
    pub enhancement_applied: Option<String>,
}

pub fn route(signals: &RoutingSignals) -> RoutingDecision {
    let rule = RULES
        .iter()
        .find(|rule| (rule.applies)(signals))
        .unwrap_or(&RULES[RULES.len() - 1]);
    debug!(rule = rule.name, route = rule.route.as_str(), "routing rule matched");

    let business_rule_violation =
        (rule.route == Route::PartsCreateError).then(|| PARTS_CREATE_VIOLATION.to_string());
    let enhancement_applied = (rule.route == Route::Contract && signals.past_tense)
        .then(|| PAST_TENSE_ENHANCEMENT.to_string());

    RoutingDecision {
        route: rule.route,
        rule: rule.name,
        business_rule_violation,
        enhancement_applied,
    }
}
