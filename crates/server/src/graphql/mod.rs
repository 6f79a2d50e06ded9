//! GraphQL schema and its axum transport
//!
//! Queries and mutations go over `POST /graphql`, subscriptions over the
//! `/ws` websocket. The bearer token is resolved to a [`Caller`] once per
//! request (or per websocket connection) and stored in the request data.

pub mod mutation;
pub mod query;
pub mod subscription;
pub mod types;

use std::sync::Arc;

use async_graphql::http::{GraphiQLSource, ALL_WEBSOCKET_PROTOCOLS};
use async_graphql::{Context, Data, Schema};
use async_graphql_axum::{GraphQLProtocol, GraphQLRequest, GraphQLResponse, GraphQLWebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tracing::debug;

use crate::auth::{AuthManager, Caller};
use crate::config::AppState;
use crate::error::{Error, GqlResultExt};

pub use mutation::MutationRoot;
pub use query::QueryRoot;
pub use subscription::SubscriptionRoot;

pub type YapSchema = Schema<QueryRoot, MutationRoot, SubscriptionRoot>;

pub fn build_schema(state: AppState) -> YapSchema {
    Schema::build(
        QueryRoot::default(),
        MutationRoot::default(),
        SubscriptionRoot::default(),
    )
    .data(state)
    .finish()
}

pub(crate) fn app_state<'a>(ctx: &Context<'a>) -> async_graphql::Result<&'a AppState> {
    ctx.data::<AppState>()
}

/// The authenticated caller, or an `UNAUTHENTICATED` error
pub(crate) fn require_caller<'a>(ctx: &Context<'a>) -> async_graphql::Result<&'a Caller> {
    ctx.data_opt::<Caller>().ok_or(Error::Unauthenticated).extended()
}

#[derive(Clone)]
struct GraphQLState {
    schema: YapSchema,
    auth: Arc<AuthManager>,
}

/// Routes for `/graphql` (queries, mutations, GraphiQL) and `/ws`
pub fn router(schema: YapSchema, auth: Arc<AuthManager>) -> Router {
    Router::new()
        .route("/graphql", get(graphiql).post(graphql_handler))
        .route("/ws", get(graphql_ws_handler))
        .with_state(GraphQLState { schema, auth })
}

async fn graphql_handler(
    State(state): State<GraphQLState>,
    headers: HeaderMap,
    request: GraphQLRequest,
) -> GraphQLResponse {
    let mut request = request.into_inner();
    if let Some(caller) = state.auth.caller_from_headers(&headers) {
        debug!("[Auth] Request from {}", caller.username());
        request = request.data(caller);
    }
    state.schema.execute(request).await.into()
}

async fn graphiql() -> impl IntoResponse {
    Html(
        GraphiQLSource::build()
            .endpoint("/graphql")
            .subscription_endpoint("/ws")
            .finish(),
    )
}

async fn graphql_ws_handler(
    State(state): State<GraphQLState>,
    protocol: GraphQLProtocol,
    websocket: WebSocketUpgrade,
) -> Response {
    let GraphQLState { schema, auth } = state;
    websocket
        .protocols(ALL_WEBSOCKET_PROTOCOLS)
        .on_upgrade(move |stream| {
            GraphQLWebSocket::new(stream, schema, protocol)
                .on_connection_init(move |payload| async move {
                    let mut data = Data::default();
                    if let Some(caller) = auth.caller_from_init_payload(&payload) {
                        debug!("[Auth] Websocket connection from {}", caller.username());
                        data.insert(caller);
                    }
                    Ok(data)
                })
                .serve()
        })
}
