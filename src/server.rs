//! HTTP front end: `GET /api/v1?ip=<addr>&port=<port>` runs one probe and
//! answers with the result as JSON.

use crate::error::{ErrorKind, ProbeError};
use crate::model::Target;
use crate::probe::Prober;
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use serde::Serialize;
use serde_json::json;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub const PROBE_PATH: &str = "/api/v1";
pub const HEALTH_PATH: &str = "/health";

pub async fn serve(addr: SocketAddr, prober: Arc<dyn Prober>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "probe API listening");
    serve_listener(listener, prober, async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for shutdown signal");
        }
    })
    .await
}

/// Accepts connections until `shutdown` resolves. Each request runs its own
/// independent probe.
pub async fn serve_listener<F>(
    listener: TcpListener,
    prober: Arc<dyn Prober>,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("probe API shutting down");
                break;
            }
            result = listener.accept() => {
                let (stream, peer) = match result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "accept error");
                        continue;
                    }
                };

                let prober = prober.clone();
                tokio::spawn(async move {
                    let svc = hyper::service::service_fn(move |req: Request<Incoming>| {
                        let prober = prober.clone();
                        async move {
                            let (parts, _body) = req.into_parts();
                            let req = Request::from_parts(parts, ());
                            Ok::<_, Infallible>(handle(&req, prober.as_ref()).await)
                        }
                    });

                    let builder = ConnBuilder::new(TokioExecutor::new());
                    if let Err(e) = builder.serve_connection(TokioIo::new(stream), svc).await {
                        warn!(?peer, error = %e, "serve_connection error");
                    }
                });
            }
        }
    }

    Ok(())
}

pub async fn handle<B>(req: &Request<B>, prober: &dyn Prober) -> Response<Full<Bytes>> {
    if req.method() != Method::GET {
        return json_response(
            StatusCode::METHOD_NOT_ALLOWED,
            &json!({ "error": "Method not allowed" }),
        );
    }

    match req.uri().path() {
        HEALTH_PATH => json_response(StatusCode::OK, &json!({ "status": "healthy" })),
        PROBE_PATH => {
            let target = match target_from_query(req.uri().query().unwrap_or_default()) {
                Ok(target) => target,
                Err(err) => {
                    return json_response(StatusCode::BAD_REQUEST, &json!({ "error": err.to_string() }))
                }
            };
            match prober.probe(&target).await {
                Ok(result) => json_response(StatusCode::OK, &result),
                Err(err) => {
                    warn!(candidate = %target, kind = %err.kind(), error = %err, "probe failed");
                    json_response(
                        status_for(err.kind()),
                        &json!({ "error": err.to_string(), "kind": err.kind() }),
                    )
                }
            }
        }
        _ => json_response(StatusCode::NOT_FOUND, &json!({ "error": "Not found" })),
    }
}

/// Reads `ip` (or `address`) and `port` from a query string.
pub fn target_from_query(query: &str) -> Result<Target, ProbeError> {
    let mut address = None;
    let mut port = None;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "ip" | "address" if !value.is_empty() => address = Some(value.into_owned()),
            "port" if !value.is_empty() => port = Some(value.into_owned()),
            _ => {}
        }
    }

    let (Some(address), Some(port)) = (address, port) else {
        return Err(ProbeError::Validation("Missing ip or port parameter".into()));
    };
    let port = port
        .trim()
        .parse::<u16>()
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| ProbeError::Validation(format!("Invalid port parameter: {port}")))?;
    Ok(Target::new(address, port))
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Transport | ErrorKind::Tls | ErrorKind::Parse => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let (status, bytes) = match serde_json::to_vec(body) {
        Ok(bytes) => (status, bytes),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!(r#"{{"error":"failed to serialize response: {err}"}}"#).into_bytes(),
        ),
    };
    let mut resp = Response::new(Full::new(Bytes::from(bytes)));
    *resp.status_mut() = status;
    resp.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/json"),
    );
    resp
}
