use std::sync::Arc;

use async_graphql::{Context, Json, Object, Result, SimpleObject};
use serde_json::Value;

use crate::query_router::{
    types::query::{SessionHint, StructuredQuery},
    QueryEngine,
};

#[derive(SimpleObject)]
pub struct ParsedEntity {
    pub kind: String,
    pub value: String,
}

#[derive(SimpleObject)]
pub struct ParsedOperator {
    pub field: String,
    pub comparison_kind: String,
    /// A string, or a `[lower, upper]` pair for `BETWEEN`.
    pub value: Json<Value>,
}

#[derive(SimpleObject)]
pub struct ParsedQuery {
    pub original_text: String,
    pub corrected_text: String,
    pub query_type: String,
    pub action_type: String,
    pub route: String,
    pub entities: Vec<ParsedEntity>,
    pub operators: Vec<ParsedOperator>,
    pub confidence: f64,
    pub spell_corrected: bool,
    pub business_rule_violation: Option<String>,
    pub enhancement_applied: Option<String>,
    pub message: Option<String>,
    pub errors: Vec<String>,
    pub suggestions: Vec<String>,
}

impl From<StructuredQuery> for ParsedQuery {
    fn from(query: StructuredQuery) -> Self {
        Self {
            query_type: query.query_type.as_str().to_string(),
            action_type: query.action_type.as_str().to_string(),
            route: query.route.as_str().to_string(),
            entities: query
                .entities
                .into_iter()
                .map(|(kind, value)| ParsedEntity {
                    kind: kind.as_str().to_string(),
                    value,
                })
                .collect(),
            operators: query
                .operators
                .into_iter()
                .map(|op| ParsedOperator {
                    field: op.field,
                    comparison_kind: op.comparison.as_str().to_string(),
                    value: Json(op.value),
                })
                .collect(),
            original_text: query.original_text,
            corrected_text: query.corrected_text,
            confidence: query.confidence,
            spell_corrected: query.spell_corrected,
            business_rule_violation: query.business_rule_violation,
            enhancement_applied: query.enhancement_applied,
            message: query.message,
            errors: query.errors,
            suggestions: query.suggestions,
        }
    }
}

#[derive(Default)]
pub struct ParseQuery;

#[Object]
impl ParseQuery {
    /// Parses a free-text question. The hints name the contract or part the
    /// user was last looking at.
    async fn parse_query(
        &self,
        ctx: &Context<'_>,
        text: String,
        contract_hint: Option<String>,
        part_hint: Option<String>,
    ) -> Result<ParsedQuery> {
        let engine = ctx.data::<Arc<QueryEngine>>()?;
        let hint = (contract_hint.is_some() || part_hint.is_some()).then(|| SessionHint {
            contract_number: contract_hint,
            part_number: part_hint,
        });
        Ok(engine.process(&text, hint.as_ref()).into())
    }

    /// Version of the rule tables currently in effect.
    async fn rules_version(&self, ctx: &Context<'_>) -> Result<String> {
        let engine = ctx.data::<Arc<QueryEngine>>()?;
        Ok(engine.tables().version().to_string())
    }
}
