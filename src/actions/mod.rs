pub mod stripe_webhooks;
pub mod subscriptions;
pub mod views;

pub use stripe_webhooks::*;
pub use subscriptions::*;

use axum::{http::StatusCode, response::Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct DataListResponse<T: Serialize> {
    pub data: Vec<T>,
}

pub fn json_error(status: StatusCode, message: &str) -> (StatusCode, Json<serde_json::Value>) {
    (status, Json(serde_json::json!({ "error": message })))
}
