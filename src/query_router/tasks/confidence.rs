use crate::query_router::types::{
    entity::{EntityKind, Extraction},
    query::{ActionType, QueryType},
};

/// Results scoring below this are reported as unrecognised.
pub const DOWNGRADE_THRESHOLD: f64 = 0.3;
/// Factor applied when the chosen action lacks the entity it needs.
pub const MISSING_ENTITY_PENALTY: f64 = 0.7;

const BASE: f64 = 0.3;
const ID_BONUS: f64 = 0.25;
const NAME_BONUS: f64 = 0.2;
const ENTITY_BONUS_CAP: f64 = 0.5;
const DENSITY_WEIGHT: f64 = 0.3;
const SHORT_INPUT_FACTOR: f64 = 0.7;
const NOTHING_EXTRACTED_FACTOR: f64 = 0.8;

pub fn score(
    query_type: QueryType,
    extraction: &Extraction,
    keyword_density: f64,
    token_count: usize,
) -> f64 {
    let entities = &extraction.entities;
    let mut confidence = match query_type {
        QueryType::Unknown | QueryType::Error => 0.0,
        _ => BASE,
    };

    let mut bonus = 0.0;
    for kind in [EntityKind::ContractNumber, EntityKind::PartNumber] {
        if entities.contains(kind) {
            bonus += ID_BONUS;
        }
    }
    for kind in [EntityKind::CustomerName, EntityKind::CreatedBy] {
        if entities.contains(kind) {
            bonus += NAME_BONUS;
        }
    }
    confidence += bonus.min(ENTITY_BONUS_CAP);
    confidence += DENSITY_WEIGHT * keyword_density.clamp(0.0, 1.0);

    if token_count < 2 {
        confidence *= SHORT_INPUT_FACTOR;
    }
    if extraction.is_empty() {
        confidence *= NOTHING_EXTRACTED_FACTOR;
    }
    confidence.clamp(0.0, 1.0)
}

/// The entity `action` needs but `extraction` lacks.
pub fn missing_entity(action: ActionType, extraction: &Extraction) -> Option<EntityKind> {
    action
        .required_entity()
        .filter(|kind| !extraction.entities.contains(*kind))
}

pub fn should_downgrade(query_type: QueryType, confidence: f64) -> bool {
    query_type == QueryType::Unknown || confidence < DOWNGRADE_THRESHOLD
}
