use axum::{Extension, response::Json};
use serde_json::{Value, json};

use crate::api::CallbackState;

pub async fn health(Extension(state): Extension<CallbackState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "auth": state.session.state().to_string(),
    }))
}
