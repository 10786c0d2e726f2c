pub(crate) mod confidence;
pub(crate) mod entity_extraction;
pub(crate) mod intent_classification;
pub(crate) mod operator_builder;
pub(crate) mod routing;
pub(crate) mod spell_correction;
