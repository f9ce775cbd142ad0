//! Admin HTTP endpoint: health, metrics and read-only registry views

use crate::metrics::RegistryMetrics;
use http_body_util::Full;
use hyper::{
    body::Bytes,
    header::{HeaderValue, CONTENT_TYPE},
    server::conn::http1,
    service::service_fn,
    Method, Request, Response, StatusCode,
};
use hyper_util::rt::TokioIo;
use registry_api::Selector;
use registry_core::Registry;
use registry_selector::RegistrySelector;
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, warn};

pub struct AdminState {
    pub registry: Arc<Registry>,
    pub selector: RegistrySelector,
    pub metrics: RegistryMetrics,
    pub cluster_name: String,
}

/// Accept admin connections until the listener fails
pub async fn serve(listener: TcpListener, state: Arc<AdminState>) {
    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Error accepting admin connection: {}", e);
                continue;
            }
        };
        let io = TokioIo::new(stream);
        let state = state.clone();

        tokio::task::spawn(async move {
            let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                let state = state.clone();
                async move {
                    Ok::<_, hyper::Error>(route(req.method(), req.uri().path(), &state).await)
                }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!("Error serving admin connection from {}: {}", peer_addr, e);
            }
        });
    }
}

pub async fn route(method: &Method, path: &str, state: &AdminState) -> Response<Full<Bytes>> {
    debug!("{} {}", method, path);
    if method != Method::GET {
        return text(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed\n");
    }

    let label = match path {
        "/healthz" | "/metrics" | "/subscribers" | "/cluster" => path,
        p if p.starts_with("/select/") => "/select",
        _ => "other",
    };
    state
        .metrics
        .admin_requests_total
        .with_label_values(&[label])
        .inc();

    match path {
        "/healthz" => text(StatusCode::OK, "OK\n"),
        "/metrics" => {
            match state.registry.list_subscribers().await {
                Ok(subscribers) => state.metrics.set_subscribers(subscribers.len()),
                Err(e) => debug!("Subscriber count unavailable: {}", e),
            }
            match state.metrics.gather() {
                Ok(body) => respond(StatusCode::OK, "text/plain; version=0.0.4", body),
                Err(e) => internal_error(&e.to_string()),
            }
        }
        "/subscribers" => match state.registry.list_subscribers().await {
            Ok(mut subscribers) => {
                subscribers.sort_by(|a, b| a.id.cmp(&b.id));
                json(&subscribers)
            }
            Err(e) => unavailable(&e.to_string()),
        },
        "/cluster" => match state
            .registry
            .find_event_mesh_info_by_cluster(&state.cluster_name)
            .await
        {
            Ok(members) => json(&members),
            Err(e) => unavailable(&e.to_string()),
        },
        p if p.starts_with("/select/") => {
            let service = &p["/select/".len()..];
            match state.selector.select_one(service).await {
                Ok(Some(instance)) => json(&instance),
                Ok(None) => unavailable(&format!("no healthy instance of {}", service)),
                Err(e) => text(StatusCode::NOT_FOUND, &format!("Not Found: {}\n", e)),
            }
        }
        _ => text(StatusCode::NOT_FOUND, "Not Found\n"),
    }
}

fn respond(status: StatusCode, content_type: &'static str, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn text(status: StatusCode, body: &str) -> Response<Full<Bytes>> {
    respond(status, "text/plain", body.to_string())
}

fn json<T: Serialize>(value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_string(value) {
        Ok(body) => respond(StatusCode::OK, "application/json", body),
        Err(e) => internal_error(&e.to_string()),
    }
}

fn unavailable(reason: &str) -> Response<Full<Bytes>> {
    text(
        StatusCode::SERVICE_UNAVAILABLE,
        &format!("Service Unavailable: {}\n", reason),
    )
}

fn internal_error(reason: &str) -> Response<Full<Bytes>> {
    text(
        StatusCode::INTERNAL_SERVER_ERROR,
        &format!("Internal Server Error: {}\n", reason),
    )
}
