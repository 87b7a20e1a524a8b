//! Informational endpoints that mimic the OpenAI API surface

use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::{json, Value};

use crate::proxy::state::ProxyState;

/// A model entry in `GET /v1/models`
#[derive(Debug, Serialize)]
pub(in crate::proxy) struct ModelObject {
    id: String,
    object: &'static str,
    created: u64,
    owned_by: &'static str,
}

#[derive(Debug, Serialize)]
pub(in crate::proxy) struct ModelList {
    object: &'static str,
    data: Vec<ModelObject>,
}

/// GET /
pub(in crate::proxy) async fn root() -> Json<Value> {
    Json(json!({
        "message": "Welcome to the OpenAI API! Documentation is available at https://platform.openai.com/docs/api-reference"
    }))
}

/// GET /v1
pub(in crate::proxy) async fn v1_root() -> Json<Value> {
    Json(json!({
        "message": "OpenAI API v1 endpoint",
        "endpoints": {
            "chat/completions": "/v1/chat/completions"
        }
    }))
}

/// GET /v1/models - one entry per active backend, in config order
pub(in crate::proxy) async fn list_models(State(state): State<ProxyState>) -> Json<ModelList> {
    let data = state
        .config
        .active_backends()
        .map(|backend| ModelObject {
            id: backend.custom_model_id.clone(),
            object: "model",
            created: 1,
            owned_by: "trae-proxy",
        })
        .collect();

    Json(ModelList {
        object: "list",
        data,
    })
}
