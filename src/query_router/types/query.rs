use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::entity::EntityKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryType {
    Contract,
    Parts,
    Help,
    Unknown,
    Error,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Contract => "CONTRACT",
            QueryType::Parts => "PARTS",
            QueryType::Help => "HELP",
            QueryType::Unknown => "UNKNOWN",
            QueryType::Error => "ERROR",
        }
    }
}

/// Intent categories scored by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    StatusCheck,
    Customer,
    Creator,
    Help,
    Parts,
    Contract,
}

impl Intent {
    /// Tie-break order, highest priority first.
    pub const PRIORITY: [Intent; 6] = [
        Intent::StatusCheck,
        Intent::Customer,
        Intent::Creator,
        Intent::Help,
        Intent::Parts,
        Intent::Contract,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::StatusCheck => "status_check",
            Intent::Customer => "customer",
            Intent::Creator => "creator",
            Intent::Help => "help",
            Intent::Parts => "parts",
            Intent::Contract => "contract",
        }
    }
}

/// Final dispatch decision. Differs from [`QueryType`] when a business rule
/// overrides the default handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Route {
    Contract,
    Parts,
    Help,
    PartsCreateError,
    Error,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Contract => "CONTRACT",
            Route::Parts => "PARTS",
            Route::Help => "HELP",
            Route::PartsCreateError => "PARTS_CREATE_ERROR",
            Route::Error => "ERROR",
        }
    }

    /// The query type implied by this route. A contract route keeps an
    /// unrecognised classification so that it can still be reported as such.
    pub fn query_type(&self, classified: QueryType) -> QueryType {
        match self {
            Route::Parts | Route::PartsCreateError => QueryType::Parts,
            Route::Help => QueryType::Help,
            Route::Error => QueryType::Error,
            Route::Contract if classified == QueryType::Unknown => QueryType::Unknown,
            Route::Contract => QueryType::Contract,
        }
    }
}

/// Fine-grained operation code selecting the data-access path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionType {
    #[serde(rename = "contracts_by_contractNumber")]
    ContractsByContractNumber,
    #[serde(rename = "contracts_by_user")]
    ContractsByUser,
    #[serde(rename = "contracts_by_customerName")]
    ContractsByCustomerName,
    #[serde(rename = "contracts_by_accountNumber")]
    ContractsByAccountNumber,
    #[serde(rename = "contracts_by_status")]
    ContractsByStatus,
    #[serde(rename = "contracts_by_dates")]
    ContractsByDates,
    #[serde(rename = "contract_info")]
    ContractInfo,
    #[serde(rename = "parts_by_partNumber")]
    PartsByPartNumber,
    #[serde(rename = "parts_by_contract")]
    PartsByContract,
    #[serde(rename = "parts_by_customer")]
    PartsByCustomer,
    #[serde(rename = "parts_info")]
    PartsInfo,
    #[serde(rename = "parts_create_error")]
    PartsCreateError,
    #[serde(rename = "help_contract_creation")]
    HelpContractCreation,
    #[serde(rename = "help_general")]
    HelpGeneral,
    #[serde(rename = "unknown_query")]
    Unknown,
    #[serde(rename = "error")]
    Error,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::ContractsByContractNumber => "contracts_by_contractNumber",
            ActionType::ContractsByUser => "contracts_by_user",
            ActionType::ContractsByCustomerName => "contracts_by_customerName",
            ActionType::ContractsByAccountNumber => "contracts_by_accountNumber",
            ActionType::ContractsByStatus => "contracts_by_status",
            ActionType::ContractsByDates => "contracts_by_dates",
            ActionType::ContractInfo => "contract_info",
            ActionType::PartsByPartNumber => "parts_by_partNumber",
            ActionType::PartsByContract => "parts_by_contract",
            ActionType::PartsByCustomer => "parts_by_customer",
            ActionType::PartsInfo => "parts_info",
            ActionType::PartsCreateError => "parts_create_error",
            ActionType::HelpContractCreation => "help_contract_creation",
            ActionType::HelpGeneral => "help_general",
            ActionType::Unknown => "unknown_query",
            ActionType::Error => "error",
        }
    }

    /// The entity this action cannot be served without, if any.
    pub fn required_entity(&self) -> Option<EntityKind> {
        match self {
            ActionType::ContractInfo => Some(EntityKind::ContractNumber),
            ActionType::PartsInfo => Some(EntityKind::PartNumber),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Comparison {
    Equals,
    GreaterThan,
    LessThan,
    Between,
}

impl Comparison {
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparison::Equals => "EQUALS",
            Comparison::GreaterThan => "GREATER_THAN",
            Comparison::LessThan => "LESS_THAN",
            Comparison::Between => "BETWEEN",
        }
    }
}

/// Virtual field holding the record creation date.
pub const CREATED_DATE_FIELD: &str = "created_date";

/// A single filter for the downstream query executor. `BETWEEN` carries a
/// two-element array `[lower, upper]` as its value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operator {
    pub field: String,
    #[serde(rename = "comparisonKind")]
    pub comparison: Comparison,
    pub value: Value,
}

impl Operator {
    pub fn equals(kind: EntityKind, value: &str) -> Self {
        Self {
            field: kind.as_str().to_string(),
            comparison: Comparison::Equals,
            value: Value::String(value.to_string()),
        }
    }

    pub fn created_date(comparison: Comparison, value: Value) -> Self {
        Self {
            field: CREATED_DATE_FIELD.to_string(),
            comparison,
            value,
        }
    }
}

/// Prior-context hint supplied by the caller, e.g. the contract the user was
/// just looking at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHint {
    #[serde(default)]
    pub contract_number: Option<String>,
    #[serde(default)]
    pub part_number: Option<String>,
}

/// The engine's output for one utterance.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredQuery {
    pub original_text: String,
    pub corrected_text: String,
    pub query_type: QueryType,
    pub action_type: ActionType,
    pub route: Route,
    pub entities: BTreeMap<EntityKind, String>,
    pub operators: Vec<Operator>,
    pub confidence: f64,
    pub spell_corrected: bool,
    pub corrections: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_rule_violation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enhancement_applied: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub errors: Vec<String>,
    pub suggestions: Vec<String>,
}

impl StructuredQuery {
    fn terminal(original: &str, message: String) -> Self {
        Self {
            original_text: original.to_string(),
            corrected_text: original.to_string(),
            query_type: QueryType::Error,
            action_type: ActionType::Error,
            route: Route::Error,
            entities: BTreeMap::new(),
            operators: Vec::new(),
            confidence: 0.0,
            spell_corrected: false,
            corrections: BTreeMap::new(),
            business_rule_violation: None,
            enhancement_applied: None,
            message: Some(message),
            errors: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    /// Result for blank input.
    pub fn empty_input(original: &str, suggestions: &[String]) -> Self {
        let mut query = Self::terminal(
            original,
            "Please enter a question about contracts or parts.".to_string(),
        );
        query.errors.push("empty input".to_string());
        query.suggestions = suggestions.to_vec();
        query
    }

    /// Result for input longer than `limit` characters.
    pub fn too_long(original: &str, limit: usize) -> Self {
        let mut query = Self::terminal(
            original,
            format!("Please keep questions under {limit} characters."),
        );
        query.errors.push("input too long".to_string());
        query
    }

    /// Result for a request the pipeline could not process.
    pub fn failure(original: &str, error: &anyhow::Error) -> Self {
        let mut query = Self::terminal(
            original,
            "Sorry, that question could not be processed. Please rephrase it.".to_string(),
        );
        query.errors.push(format!("{error:#}"));
        query
    }

    pub fn entity(&self, kind: EntityKind) -> Option<&str> {
        self.entities.get(&kind).map(String::as_str)
    }
}

/// One operator in the flat response shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Criterion {
    pub attribute: String,
    pub operation: Comparison,
    pub value: Value,
}

/// Flat JSON view of a [`StructuredQuery`] handed to presentation clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    pub contract_number: Option<String>,
    pub part_number: Option<String>,
    pub customer_name: Option<String>,
    pub account_number: Option<String>,
    pub created_by: Option<String>,
    #[serde(rename = "queryType")]
    pub query_type: QueryType,
    #[serde(rename = "actionType")]
    pub action_type: ActionType,
    pub entities: Vec<Criterion>,
    pub confidence: f64,
    pub route: Route,
    #[serde(rename = "businessRuleViolation")]
    pub business_rule_violation: Option<String>,
    #[serde(rename = "enhancementApplied")]
    pub enhancement_applied: Option<String>,
    #[serde(rename = "correctedText")]
    pub corrected_text: String,
    pub message: Option<String>,
    pub suggestions: Vec<String>,
}

impl From<&StructuredQuery> for QueryResponse {
    fn from(query: &StructuredQuery) -> Self {
        let entity = |kind| query.entity(kind).map(str::to_string);
        Self {
            contract_number: entity(EntityKind::ContractNumber),
            part_number: entity(EntityKind::PartNumber),
            customer_name: entity(EntityKind::CustomerName),
            account_number: entity(EntityKind::AccountNumber),
            created_by: entity(EntityKind::CreatedBy),
            query_type: query.query_type,
            action_type: query.action_type,
            entities: query
                .operators
                .iter()
                .map(|op| Criterion {
                    attribute: op.field.clone(),
                    operation: op.comparison,
                    value: op.value.clone(),
                })
                .collect(),
            confidence: query.confidence,
            route: query.route,
            business_rule_violation: query.business_rule_violation.clone(),
            enhancement_applied: query.enhancement_applied.clone(),
            corrected_text: query.corrected_text.clone(),
            message: query.message.clone(),
            suggestions: query.suggestions.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn action_codes_serialize_as_wire_names() {
        assert_eq!(
            serde_json::to_value(ActionType::ContractsByUser).unwrap(),
            json!("contracts_by_user")
        );
        assert_eq!(
            serde_json::to_value(ActionType::PartsByPartNumber).unwrap(),
            json!(ActionType::PartsByPartNumber.as_str())
        );
    }

    #[test]
    fn flat_response_uses_stable_field_names() {
        let mut entities = BTreeMap::new();
        entities.insert(EntityKind::CreatedBy, "vinod".to_string());
        let query = StructuredQuery {
            original_text: "contracts by vinod".to_string(),
            corrected_text: "contracts by vinod".to_string(),
            query_type: QueryType::Contract,
            action_type: ActionType::ContractsByUser,
            route: Route::Contract,
            entities,
            operators: vec![Operator::equals(EntityKind::CreatedBy, "vinod")],
            confidence: 0.6,
            spell_corrected: false,
            corrections: BTreeMap::new(),
            business_rule_violation: None,
            enhancement_applied: None,
            message: None,
            errors: Vec::new(),
            suggestions: Vec::new(),
        };

        let value = serde_json::to_value(QueryResponse::from(&query)).unwrap();
        assert_eq!(value["created_by"], json!("vinod"));
        assert_eq!(value["contract_number"], Value::Null);
        assert_eq!(value["queryType"], json!("CONTRACT"));
        assert_eq!(value["actionType"], json!("contracts_by_user"));
        assert_eq!(
            value["entities"],
            json!([{"attribute": "created_by", "operation": "EQUALS", "value": "vinod"}])
        );
        assert_eq!(value["businessRuleViolation"], Value::Null);
    }

    #[test]
    fn structured_query_keys_entities_by_kind_name() {
        let mut query = StructuredQuery::empty_input("", &[]);
        query
            .entities
            .insert(EntityKind::ContractNumber, "123456".to_string());
        let value = serde_json::to_value(&query).unwrap();
        assert_eq!(value["entities"]["contract_number"], json!("123456"));
        assert_eq!(value["route"], json!("ERROR"));
    }
}
