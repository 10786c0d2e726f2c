use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The kinds of entity the extractor knows how to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    ContractNumber,
    PartNumber,
    AccountNumber,
    CustomerName,
    CreatedBy,
    Status,
    Year,
}

impl EntityKind {
    /// Entities that become an EQUALS operator on their own field.
    pub const SCALARS: [EntityKind; 5] = [
        EntityKind::ContractNumber,
        EntityKind::PartNumber,
        EntityKind::AccountNumber,
        EntityKind::CustomerName,
        EntityKind::CreatedBy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::ContractNumber => "contract_number",
            EntityKind::PartNumber => "part_number",
            EntityKind::AccountNumber => "account_number",
            EntityKind::CustomerName => "customer_name",
            EntityKind::CreatedBy => "created_by",
            EntityKind::Status => "status",
            EntityKind::Year => "year",
        }
    }

    /// Phrase used when asking the user to supply this entity.
    pub fn description(&self) -> &'static str {
        match self {
            EntityKind::ContractNumber => "a contract number (e.g. 123456)",
            EntityKind::PartNumber => "a part number (e.g. AE125)",
            EntityKind::AccountNumber => "an account number",
            EntityKind::CustomerName => "a customer name",
            EntityKind::CreatedBy => "the user who created the record",
            EntityKind::Status => "a status such as active or expired",
            EntityKind::Year => "a year",
        }
    }
}

/// An extracted value together with the byte offset it was found at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityValue {
    pub value: String,
    pub offset: usize,
}

/// Entity kind to value. A key is either present with a non-empty value or
/// absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entities(BTreeMap<EntityKind, EntityValue>);

impl Entities {
    /// Sets `kind` unless it is already present or `value` is blank.
    /// Returns whether the value was stored.
    pub fn insert_if_absent(&mut self, kind: EntityKind, value: &str, offset: usize) -> bool {
        let value = value.trim();
        if value.is_empty() || self.0.contains_key(&kind) {
            return false;
        }
        self.0.insert(
            kind,
            EntityValue {
                value: value.to_string(),
                offset,
            },
        );
        true
    }

    pub fn get(&self, kind: EntityKind) -> Option<&str> {
        self.0.get(&kind).map(|v| v.value.as_str())
    }

    pub fn contains(&self, kind: EntityKind) -> bool {
        self.0.contains_key(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityKind, &EntityValue)> {
        self.0.iter().map(|(kind, value)| (*kind, value))
    }

    pub fn to_map(&self) -> BTreeMap<EntityKind, String> {
        self.0
            .iter()
            .map(|(kind, v)| (*kind, v.value.clone()))
            .collect()
    }
}

/// A year or a full calendar day used as a bound of a temporal phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateBound {
    Year(i32),
    Day(NaiveDate),
}

impl DateBound {
    /// Parses `YYYY` or `YYYY-MM-DD`.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.len() == 4 {
            let year = raw
                .parse::<i32>()
                .with_context(|| format!("invalid year `{raw}`"))?;
            return Ok(DateBound::Year(year));
        }
        let day = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .with_context(|| format!("invalid date `{raw}`"))?;
        Ok(DateBound::Day(day))
    }

    /// First day covered by the bound.
    pub fn start(&self) -> Result<NaiveDate> {
        match self {
            DateBound::Year(year) => NaiveDate::from_ymd_opt(*year, 1, 1)
                .with_context(|| format!("year {year} is out of range")),
            DateBound::Day(day) => Ok(*day),
        }
    }

    /// Last day covered by the bound.
    pub fn end(&self) -> Result<NaiveDate> {
        match self {
            DateBound::Year(year) => NaiveDate::from_ymd_opt(*year, 12, 31)
                .with_context(|| format!("year {year} is out of range")),
            DateBound::Day(day) => Ok(*day),
        }
    }
}

/// Status and temporal phrases found in the text. They filter results but are
/// not identifying entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modifier {
    Status { value: String, offset: usize },
    After { bound: DateBound, offset: usize },
    Before { bound: DateBound, offset: usize },
    Between { from: DateBound, to: DateBound, offset: usize },
}

impl Modifier {
    pub fn offset(&self) -> usize {
        match self {
            Modifier::Status { offset, .. }
            | Modifier::After { offset, .. }
            | Modifier::Before { offset, .. }
            | Modifier::Between { offset, .. } => *offset,
        }
    }

    pub fn is_temporal(&self) -> bool {
        !matches!(self, Modifier::Status { .. })
    }
}

/// Everything the extractor found in one utterance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub entities: Entities,
    pub modifiers: Vec<Modifier>,
}

impl Extraction {
    /// True when neither an entity nor a modifier was found.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.modifiers.is_empty()
    }

    pub fn has_status(&self) -> bool {
        self.modifiers
            .iter()
            .any(|m| matches!(m, Modifier::Status { .. }))
    }

    pub fn has_temporal(&self) -> bool {
        self.entities.contains(EntityKind::Year) || self.modifiers.iter().any(Modifier::is_temporal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_are_never_stored() {
        let mut entities = Entities::default();
        assert!(!entities.insert_if_absent(EntityKind::CreatedBy, "   ", 0));
        assert!(entities.is_empty());
    }

    #[test]
    fn first_value_wins() {
        let mut entities = Entities::default();
        assert!(entities.insert_if_absent(EntityKind::ContractNumber, "123456", 5));
        assert!(!entities.insert_if_absent(EntityKind::ContractNumber, "654321", 1));
        assert_eq!(entities.get(EntityKind::ContractNumber), Some("123456"));
    }

    #[test]
    fn year_bounds_cover_the_whole_year() {
        let bound = DateBound::parse("2020").unwrap();
        assert_eq!(bound.start().unwrap().to_string(), "2020-01-01");
        assert_eq!(bound.end().unwrap().to_string(), "2020-12-31");
    }

    #[test]
    fn day_bounds_are_exact() {
        let bound = DateBound::parse("2021-05-17").unwrap();
        assert_eq!(bound.start().unwrap(), bound.end().unwrap());
        assert!(DateBound::parse("2021-13-40").is_err());
    }
}
