//! Sample routes served by the binary.
//!
//! Each route exercises one gateway stage so the service can be poked at
//! with curl right after startup.

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::ServiceConfig;
use crate::gateway::{Field, Schema, ValidateLayer, ValidatedBody, ValidatedParams, ValidatedQuery};

pub fn echo_schema() -> Schema {
    Schema::new()
        .field("name", Field::string().min(1))
        .field("email", Field::string().email().optional())
        .field("tags", Field::array(Field::string()).max(20).optional())
}

pub fn item_params_schema() -> Schema {
    Schema::new().field("id", Field::string().min(1))
}

pub fn item_query_schema() -> Schema {
    Schema::new()
        .field("count", Field::integer().min(1).max(100).with_default(10))
        .field("active", Field::boolean().optional())
}

#[derive(Debug, Deserialize)]
struct ItemParams {
    id: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct ItemQuery {
    count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    active: Option<bool>,
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn echo(ValidatedBody(body): ValidatedBody<Value>) -> Json<Value> {
    Json(body)
}

async fn item(
    ValidatedParams(params): ValidatedParams<ItemParams>,
    ValidatedQuery(query): ValidatedQuery<ItemQuery>,
) -> Json<Value> {
    Json(json!({ "id": params.id, "query": query }))
}

pub fn demo_routes(config: &ServiceConfig) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/echo",
            post(echo).route_layer(ValidateLayer::body(echo_schema()).configure(config)),
        )
        .route(
            "/items/{id}",
            get(item)
                .route_layer(ValidateLayer::query(item_query_schema()).configure(config))
                .route_layer(ValidateLayer::params(item_params_schema()).configure(config)),
        )
}
