//! HTTP fixture server: the registry served over real sockets.
//!
//! # Design
//! A single fallback handler answers every method and path. Matching goes
//! through [`MockRegistry::serve`], the same path the in-process transport
//! takes, so both mocks agree on what matches.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::warn;

use crate::registry::MockRegistry;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

pub fn app(registry: Arc<MockRegistry>) -> Router {
    Router::new().fallback(serve_fixture).with_state(registry)
}

pub async fn run(listener: TcpListener, registry: Arc<MockRegistry>) -> Result<(), std::io::Error> {
    axum::serve(listener, app(registry)).await
}

async fn serve_fixture(State(registry): State<Arc<MockRegistry>>, method: Method, uri: Uri) -> Response {
    match registry.serve(method.as_str(), uri.path(), uri.query()) {
        Ok(fixture) => {
            let status = StatusCode::from_u16(fixture.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (
                status,
                [(header::CONTENT_TYPE, "application/json")],
                fixture.response.clone(),
            )
                .into_response()
        }
        Err(err) => {
            warn!(%method, %uri, error = %err, "no fixture matched");
            (
                StatusCode::NOT_FOUND,
                Json(ErrorBody {
                    error: err.to_string(),
                }),
            )
                .into_response()
        }
    }
}
