use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use async_graphql_warp::GraphQLResponse;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use warp::{http::StatusCode, Filter, Rejection, Reply};

use crate::{
    api::{self, Schema},
    query_router::{
        types::query::{QueryResponse, SessionHint},
        QueryEngine,
    },
    settings::EngineSettings,
};

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub text: String,
    #[serde(default)]
    pub hint: Option<SessionHint>,
}

fn with_engine(
    engine: Arc<QueryEngine>,
) -> impl Filter<Extract = (Arc<QueryEngine>,), Error = Infallible> + Clone {
    warp::any().map(move || engine.clone())
}

pub(crate) fn routes(
    engine: Arc<QueryEngine>,
    settings: Arc<EngineSettings>,
    schema: Schema,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let query = warp::path("query")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(with_engine(engine.clone()))
        .map(|request: QueryRequest, engine: Arc<QueryEngine>| {
            let query = engine.process(&request.text, request.hint.as_ref());
            warp::reply::json(&QueryResponse::from(&query))
        });

    let reload = warp::path!("rules" / "reload")
        .and(warp::post())
        .and(with_engine(engine))
        .map(move |engine: Arc<QueryEngine>| match settings.load_tables() {
            Ok(tables) => {
                let version = tables.version().to_string();
                engine.reload(tables);
                warp::reply::with_status(
                    warp::reply::json(&json!({ "version": version })),
                    StatusCode::OK,
                )
            }
            Err(error) => {
                warn!("failed to reload rule tables: {error:#}");
                warp::reply::with_status(
                    warp::reply::json(&json!({ "error": format!("{error:#}") })),
                    StatusCode::UNPROCESSABLE_ENTITY,
                )
            }
        });

    let graphql = warp::path("graphql")
        .and(warp::path::end())
        .and(async_graphql_warp::graphql(schema))
        .and_then(
            |(schema, request): (Schema, async_graphql::Request)| async move {
                Ok::<_, Infallible>(GraphQLResponse::from(schema.execute(request).await))
            },
        );

    query.or(reload).or(graphql)
}

pub async fn serve(engine: Arc<QueryEngine>, settings: Arc<EngineSettings>, addr: SocketAddr) {
    let schema = api::schema(engine.clone());
    info!(%addr, "listening");
    warp::serve(routes(engine, settings, schema)).run(addr).await;
}
