pub mod entity;
pub mod query;
