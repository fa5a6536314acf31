//! HTTP gateway performing fetch interception for the fronted site.
//!
//! Every request that reaches the gateway is rebuilt against the configured
//! origin, classified, and answered by the worker. This is the interception
//! surface: the client talks to the gateway, the gateway decides between
//! cache and network.

use crate::strategy::Destination;
use crate::worker::{OfflineCache, ServedResponse, Source, WorkerRequest};
use axum::Router;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode, header};
use axum::response::Response;
use m360_client::FetchClient;
use m360_core::Error;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Largest inbound request body the gateway will buffer for forwarding.
const MAX_INBOUND_BODY: usize = 5 * 1024 * 1024;

/// Headers never copied from a stored or upstream response. Bodies are
/// held decompressed, so the transfer metadata no longer applies.
const STRIP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
    "content-encoding",
];

pub fn router(worker: Arc<OfflineCache<FetchClient>>) -> Router {
    Router::new()
        .fallback(intercept)
        .layer(TraceLayer::new_for_http())
        .with_state(worker)
}

async fn intercept(
    State(worker): State<Arc<OfflineCache<FetchClient>>>, req: Request,
) -> Response {
    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let url = match worker.settings().origin.join(&path_and_query) {
        Ok(url) => url,
        Err(err) => {
            return plain_response(StatusCode::BAD_REQUEST, &format!("bad request path: {err}"));
        }
    };

    let method = req.method().to_string();
    let destination = destination_of(&req);

    let body = match axum::body::to_bytes(req.into_body(), MAX_INBOUND_BODY).await {
        Ok(bytes) if bytes.is_empty() => None,
        Ok(bytes) => Some(bytes),
        Err(err) => {
            return plain_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                &format!("request body rejected: {err}"),
            );
        }
    };

    let request = WorkerRequest { method, url, destination, body };

    match worker.handle(&request).await {
        Ok(served) => into_http(served),
        Err(err) => {
            tracing::warn!(url = %request.url, %err, "request failed");
            let status = match &err {
                Error::InvalidInput(_) | Error::InvalidUrl(_) | Error::NotControlled(_) => {
                    StatusCode::BAD_REQUEST
                }
                Error::FetchTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
                _ => StatusCode::BAD_GATEWAY,
            };
            plain_response(status, &err.to_string())
        }
    }
}

/// Derive the navigation destination of an inbound request.
///
/// `Sec-Fetch-Dest: document` is authoritative where present; older agents
/// fall back to "GET that accepts HTML".
fn destination_of(req: &Request) -> Destination {
    if let Some(dest) = req.headers().get("sec-fetch-dest").and_then(|v| v.to_str().ok()) {
        return if dest == "document" { Destination::Document } else { Destination::Asset };
    }

    let accepts_html = req
        .headers()
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"));

    if req.method() == Method::GET && accepts_html {
        Destination::Document
    } else {
        Destination::Asset
    }
}

fn into_http(served: ServedResponse) -> Response {
    let status = StatusCode::from_u16(served.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut builder = Response::builder().status(status);

    for (name, value) in &served.headers {
        if is_stripped(name) {
            continue;
        }
        if let (Ok(name), Ok(value)) =
            (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str()))
        {
            builder = builder.header(name, value);
        }
    }

    builder = builder.header("x-m360-cache", source_tag(served.source));

    match builder.body(Body::from(served.body)) {
        Ok(response) => response,
        Err(err) => {
            plain_response(StatusCode::INTERNAL_SERVER_ERROR, &format!("response build failed: {err}"))
        }
    }
}

fn plain_response(status: StatusCode, message: &str) -> Response {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from(message.to_string()))
        .unwrap_or_default()
}

fn source_tag(source: Source) -> &'static str {
    match source {
        Source::Cache => "hit",
        Source::Network => "network",
        Source::Fallback => "fallback",
    }
}

fn is_stripped(name: &str) -> bool {
    STRIP_HEADERS.contains(&name.to_ascii_lowercase().as_str())
}
