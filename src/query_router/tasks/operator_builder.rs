use anyhow::Result;
use serde_json::Value;

use crate::query_router::types::{
    entity::{DateBound, Entities, EntityKind, Modifier},
    query::{Comparison, Operator},
};

fn day(date: chrono::NaiveDate) -> Value {
    Value::String(date.to_string())
}

fn range(from: &DateBound, to: &DateBound) -> Result<Value> {
    Ok(Value::Array(vec![day(from.start()?), day(to.end()?)]))
}

/// Turns entities and modifiers into filters, ordered by where their source
/// appears in the text. Duplicate filters are kept.
pub fn build(entities: &Entities, modifiers: &[Modifier]) -> Result<Vec<Operator>> {
    let mut positioned: Vec<(usize, Operator)> = Vec::new();

    for (kind, entity) in entities.iter() {
        if EntityKind::SCALARS.contains(&kind) {
            positioned.push((entity.offset, Operator::equals(kind, &entity.value)));
        }
    }
    if let Some(year) = entities
        .iter()
        .find_map(|(kind, entity)| (kind == EntityKind::Year).then_some(entity))
    {
        let bound = DateBound::parse(&year.value)?;
        positioned.push((
            year.offset,
            Operator::created_date(Comparison::Between, range(&bound, &bound)?),
        ));
    }

    for modifier in modifiers {
        let operator = match modifier {
            Modifier::Status { value, .. } => Operator::equals(EntityKind::Status, value),
            Modifier::After { bound, .. } => {
                Operator::created_date(Comparison::GreaterThan, day(bound.start()?))
            }
            Modifier::Before { bound, .. } => {
                Operator::created_date(Comparison::LessThan, day(bound.end()?))
            }
            Modifier::Between { from, to, .. } => {
                Operator::created_date(Comparison::Between, range(from, to)?)
            }
        };
        positioned.push((modifier.offset(), operator));
    }

    positioned.sort_by_key(|(offset, _)| *offset);
    Ok(positioned.into_iter().map(|(_, op)| op).collect())
}
