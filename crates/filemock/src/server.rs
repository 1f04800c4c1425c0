//! HTTP server: accept loop and per-request pipeline.
//!
//! Every request independently re-scans the mock tree, resolves the best
//! matching mock and materializes its response. When nothing matches
//! structurally, the request falls through to the configured upstream proxy
//! (optionally recording the response) or to the not-found mock set.

use crate::config::ServerOptions;
use crate::context::{parse_query, RequestContext};
use crate::negotiate::parse_accept;
use crate::recorder::{self, CapturedResponse, RecordOptions};
use crate::repository;
use crate::resolver;
use crate::response::{materialize, ResponseDetails};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// The mock server.
pub struct MockServer {
    options: Arc<ServerOptions>,
    client: reqwest::Client,
}

impl MockServer {
    pub fn new(options: ServerOptions) -> Self {
        Self {
            options: Arc::new(options),
            client: reqwest::Client::new(),
        }
    }

    /// Bind and serve until the process is stopped.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let addr = format!("{}:{}", self.options.host, self.options.port);
        let listener = TcpListener::bind(&addr).await?;
        info!("Server started on: http://{addr}");

        let server = Arc::new(self);
        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let server = Arc::clone(&server);

            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let server = Arc::clone(&server);
                    async move { server.handle(req).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Error serving connection from {remote_addr}: {err}");
                }
            });
        }
    }

    async fn handle(&self, req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
        let method = req.method().to_string();
        let uri = req.uri().clone();
        let headers: BTreeMap<String, String> = req
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|value| (k.as_str().to_lowercase(), value.to_string()))
            })
            .collect();
        let body = match req.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(_) => Bytes::new(),
        };

        let path_and_query = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| uri.path().to_string());
        let details = process_request(
            &self.options,
            Some(&self.client),
            &method,
            &path_and_query,
            &headers,
            body,
        )
        .await;

        if self.options.logs {
            info!(
                "{} {} -> {}",
                method,
                path_and_query,
                details.status
            );
        }
        Ok(build_response(details))
    }
}

/// The full per-request pipeline, transport-free for testability.
///
/// `client` is only consulted for the proxy fallback; passing `None`
/// disables proxying regardless of options.
pub async fn process_request(
    options: &ServerOptions,
    client: Option<&reqwest::Client>,
    method: &str,
    path_and_query: &str,
    headers: &BTreeMap<String, String>,
    body: Bytes,
) -> ResponseDetails {
    let (path, raw_query) = match path_and_query.split_once('?') {
        Some((path, query)) => (path, query),
        None => (path_and_query, ""),
    };
    let req_path = path.trim_start_matches('/').to_string();
    let query = parse_query(raw_query);

    let mut ctx = RequestContext {
        method: method.to_lowercase(),
        query: query.clone(),
        params: BTreeMap::new(),
        headers: headers.clone(),
        body: parse_body(headers, &body),
        files: Vec::new(),
    };

    let accept = parse_accept(headers.get("accept").map(String::as_str));
    let active_set = options.set.as_deref();

    let mocks = repository::load_mocks(
        &options.base_path,
        &options.resolution_ignore(),
        &["**/*".to_string()],
    );

    if let Some(resolved) = resolver::resolve(mocks, method, &req_path, &query, &accept, active_set)
    {
        ctx.params = resolved.params.clone();
        return materialize(&resolved.mock, &ctx, None);
    }

    // No structural match: upstream proxy first, then the not-found mocks.
    if let (Some(proxy), Some(client)) = (&options.proxy, client) {
        info!("No mock found for /{req_path}, proxying request to {proxy}");
        match forward_upstream(client, proxy, method, path_and_query, headers, &body).await {
            Ok(captured) => {
                if options.record {
                    spawn_recording(options, method, path, &query, &captured);
                }
                return ResponseDetails {
                    status: captured.status,
                    headers: captured.headers,
                    body: Some(Bytes::from(captured.body)),
                };
            }
            Err(err) => {
                error!("Proxy request to {proxy} failed: {err}");
                return ResponseDetails::internal_error(&format!(
                    "Error while proxying request: {err}"
                ));
            }
        }
    }

    let not_found_mocks = repository::load_mocks(
        &options.base_path,
        &options.ignore,
        &[options.not_found.clone()],
    );
    if let Some(resolved) =
        resolver::resolve_not_found(not_found_mocks, method, &query, &accept, active_set)
    {
        return materialize(&resolved.mock, &ctx, Some(404));
    }

    ResponseDetails::not_found()
}

fn parse_body(headers: &BTreeMap<String, String>, body: &Bytes) -> serde_json::Value {
    if body.is_empty() {
        return serde_json::Value::Null;
    }
    let is_json = headers
        .get("content-type")
        .is_some_and(|ct| ct.contains("json"));
    if is_json {
        if let Ok(value) = serde_json::from_slice(body) {
            return value;
        }
    }
    serde_json::Value::String(String::from_utf8_lossy(body).to_string())
}

async fn forward_upstream(
    client: &reqwest::Client,
    proxy: &str,
    method: &str,
    path_and_query: &str,
    headers: &BTreeMap<String, String>,
    body: &Bytes,
) -> Result<CapturedResponse, anyhow::Error> {
    let url = format!("{}{}", proxy.trim_end_matches('/'), path_and_query);
    let method = reqwest::Method::from_bytes(method.as_bytes())?;

    let mut request = client.request(method, &url);
    for (name, value) in headers {
        // The upstream sets its own host header.
        if name != "host" && name != "content-length" {
            request = request.header(name, value);
        }
    }
    if !body.is_empty() {
        request = request.body(body.clone());
    }

    let response = request.send().await?;
    let status = response.status().as_u16();
    let headers: Vec<(String, String)> = response
        .headers()
        .iter()
        .filter_map(|(k, v)| {
            v.to_str()
                .ok()
                .map(|value| (k.as_str().to_string(), value.to_string()))
        })
        .filter(|(name, _)| name != "transfer-encoding" && name != "content-length")
        .collect();
    let body = response.bytes().await?.to_vec();

    Ok(CapturedResponse {
        status,
        headers,
        body,
    })
}

/// Persist the recording off the request path; the client already has its
/// response, so failures are log-only.
fn spawn_recording(
    options: &ServerOptions,
    method: &str,
    path: &str,
    query: &BTreeMap<String, String>,
    captured: &CapturedResponse,
) {
    let record_options = RecordOptions {
        base_path: options.base_path.clone(),
        depth: options.depth,
        set: options.set.clone(),
        save_headers: options.save_headers,
        save_query_params: options.save_query_params,
        collection: options.collection.clone(),
    };
    let method = method.to_string();
    let path = path.to_string();
    let query = query.clone();
    let captured = captured.clone();

    tokio::spawn(async move {
        if let Err(err) = recorder::record(&method, &path, &query, &captured, &record_options) {
            warn!("Cannot save mock: {err}");
        }
    });
}

fn build_response(details: ResponseDetails) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(details.status);
    for (name, value) in &details.headers {
        builder = builder.header(name, value);
    }
    builder
        .body(Full::new(details.body.unwrap_or_default()))
        .unwrap_or_else(|err| {
            error!("Error while building response: {err}");
            let mut fallback =
                Response::new(Full::new(Bytes::from_static(b"Internal Server Error")));
            *fallback.status_mut() = hyper::StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        })
}
