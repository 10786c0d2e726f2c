mod query;

use std::sync::Arc;

use async_graphql::{EmptyMutation, EmptySubscription, MergedObject};

use crate::query_router::QueryEngine;

/// A set of queries defined in the schema.
///
/// This is exposed only for [`Schema`], and not used directly.
#[derive(Default, MergedObject)]
pub(crate) struct Query(query::ParseQuery);

pub(crate) type Schema = async_graphql::Schema<Query, EmptyMutation, EmptySubscription>;

pub(crate) fn schema(engine: Arc<QueryEngine>) -> Schema {
    Schema::build(Query::default(), EmptyMutation, EmptySubscription)
        .data(engine)
        .finish()
}

#[cfg(test)]
struct TestSchema {
    engine: Arc<QueryEngine>,
    schema: Schema,
}

#[cfg(test)]
impl TestSchema {
    fn new() -> Self {
        let tables = crate::query_router::tables::RuleTables::builtin().unwrap();
        let engine = Arc::new(QueryEngine::new(tables));
        let schema = schema(engine.clone());
        Self { engine, schema }
    }

    async fn execute(&self, query: &str) -> async_graphql::Response {
        let request: async_graphql::Request = query.into();
        self.schema.execute(request).await
    }
}
