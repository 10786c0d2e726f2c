use tracing::debug;

use crate::query_router::types::entity::{Entities, EntityKind};

/// An entity proposed by an external recogniser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityCandidate {
    pub kind: EntityKind,
    pub value: String,
    /// Byte offset in the corrected text.
    pub offset: usize,
}

/// Source of additional entities, e.g. a statistical NER model.
///
/// Candidates only fill keys the pattern rules left empty; they never replace
/// a value the rules found.
pub trait EntityEnricher: Send + Sync {
    fn candidates(&self, text: &str) -> Vec<EntityCandidate>;
}

/// Enricher that proposes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEnrichment;

impl EntityEnricher for NoEnrichment {
    fn candidates(&self, _text: &str) -> Vec<EntityCandidate> {
        Vec::new()
    }
}

/// Merges `candidates` into `entities` and returns how many were taken.
pub fn merge(entities: &mut Entities, candidates: Vec<EntityCandidate>) -> usize {
    let mut merged = 0;
    for candidate in candidates {
        if entities.insert_if_absent(candidate.kind, &candidate.value, candidate.offset) {
            debug!(kind = candidate.kind.as_str(), "enriched entity");
            merged += 1;
        }
    }
    merged
}
