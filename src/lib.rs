mod api;
pub mod query_router;
pub mod settings;
pub mod web;
