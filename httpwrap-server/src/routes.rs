use std::sync::Arc;

use axum::body::Body;
use axum::extract::{RawQuery, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Json, Router};
use futures_util::TryStreamExt;
use httpwrap_api::api::{Endpoint, ExternalArguments};
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;

use crate::config::parse_method;
use crate::process::invoke;

/// Everything a single handler needs, owned by exactly one route.
#[derive(Debug)]
struct Route {
    path: String,
    endpoint: Endpoint,
    method: Method,
    /// Cancelled once the shutdown grace period is over.
    cancel: CancellationToken,
}

/// Builds the routing table, one handler per configured endpoint.
///
/// Handlers accept every method, mismatches are answered by [`dispatch`].
/// Endpoints must have passed [`crate::config::validate`], invalid methods fall back to GET.
pub fn routes<'a>(
    endpoints: impl IntoIterator<Item = (&'a String, &'a Endpoint)>,
    cancel: &CancellationToken,
) -> Router {
    endpoints
        .into_iter()
        .fold(Router::new(), |router, (path, endpoint)| {
            let route = Arc::new(Route {
                path: path.clone(),
                endpoint: endpoint.clone(),
                method: parse_method(endpoint.http_method()).unwrap_or(Method::GET),
                cancel: cancel.clone(),
            });
            log::debug!(path = path.as_str(), method = route.method.as_str(); "registering endpoint");
            router.route(path, any(dispatch).with_state(route))
        })
}

async fn dispatch(
    State(route): State<Arc<Route>>,
    method: Method,
    RawQuery(query): RawQuery,
    body: Body,
) -> Response {
    let id = fastrand::u64(..);
    log::info!(id, path = route.path.as_str(), method = method.as_str(); "received request");

    if !method.as_str().eq_ignore_ascii_case(route.method.as_str()) {
        log::info!(id, expected = route.method.as_str(); "unconfigured method");
        return (
            StatusCode::BAD_REQUEST,
            format!("unconfigured HTTP method: {method}\n"),
        )
            .into_response();
    }

    let arguments = route
        .endpoint
        .arguments_with(external_arguments(id, query.as_deref()));

    let stdin = route.endpoint.allow_stdin.then(|| {
        StreamReader::new(body.into_data_stream().map_err(std::io::Error::other))
    });

    // The child token lets this request be cancelled alone without touching the others.
    let cancel = route.cancel.child_token();
    let response = invoke(id, &route.endpoint, arguments, &cancel, stdin).await;

    if response.failed_to_start() {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(response)).into_response()
    } else {
        log::info!(id, exit_code = response.exit_code; "completed");
        Json(response).into_response()
    }
}

/// Malformed queries are treated like an empty one.
fn external_arguments(id: u64, query: Option<&str>) -> ExternalArguments {
    let Some(query) = query else {
        return ExternalArguments::default();
    };
    ExternalArguments::from_query(query).unwrap_or_else(|e| {
        log::debug!(id; "ignoring malformed query: {e}");
        ExternalArguments::default()
    })
}
