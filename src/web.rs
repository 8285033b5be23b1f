//! The single listening socket: push-channel upgrades on [`WS_PATH`] go to
//! [`hub::handle_ws`], everything else is parsed as one HTTP/1.1 request and
//! answered by [`route`] with open CORS headers.

use colored::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::contact::{self, ContactRequest, ContactResponse, ContactSink, LogContactSink};
use crate::error::{Result, SmartOpsError};
use crate::hub::{self, Hub};
use crate::monitoring;
use crate::responder::{ChatResponder, KeywordResponder};
use crate::ticker;

/// Path that accepts WebSocket upgrades for the push channel.
pub const WS_PATH: &str = "/ws";

/// Upper bound on request head + body.
pub const MAX_REQUEST_BYTES: usize = 64 * 1024;

const MAX_HEADERS: usize = 64;

const API_PATHS: &[&str] = &["/api/contact", "/api/health", "/api/monitoring"];

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Everything a connection task needs. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub hub: Hub,
    pub responder: Arc<dyn ChatResponder>,
    pub contact_sink: Arc<dyn ContactSink>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let hub = Hub::new(config.channel_capacity);
        Self {
            config: Arc::new(config),
            hub,
            responder: Arc::new(KeywordResponder),
            contact_sink: Arc::new(LogContactSink),
        }
    }

    pub fn with_responder(mut self, responder: Arc<dyn ChatResponder>) -> Self {
        self.responder = responder;
        self
    }

    pub fn with_contact_sink(mut self, sink: Arc<dyn ContactSink>) -> Self {
        self.contact_sink = sink;
        self
    }
}

// ---------------------------------------------------------------------------
// HTTP request / response
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    fn from_head(head: RequestHead, body: Vec<u8>) -> Self {
        Self {
            method: head.method,
            path: head.path,
            content_type: head.content_type,
            body,
        }
    }

    /// True when the declared media type is `application/json`, parameters ignored.
    pub fn is_json(&self) -> bool {
        self.content_type.as_deref().is_some_and(|t| {
            t.split(';')
                .next()
                .is_some_and(|m| m.trim().eq_ignore_ascii_case("application/json"))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    message: String,
}

pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

impl HttpResponse {
    pub fn json<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => Self {
                status,
                content_type: "application/json",
                body,
            },
            Err(e) => {
                error!(error = %e, "failed to encode response body");
                Self {
                    status: 500,
                    content_type: "application/json",
                    body: r#"{"success":false,"message":"Internal Server Error"}"#.to_string(),
                }
            }
        }
    }

    /// `{success:false, message}` with the given status.
    pub fn failure(status: u16, message: &str) -> Self {
        Self::json(status, &ContactResponse::failure(message))
    }

    pub fn no_content() -> Self {
        Self {
            status: 204,
            content_type: "text/plain",
            body: String::new(),
        }
    }

    /// Serialize status line, CORS headers and body.
    pub fn to_bytes(&self) -> Vec<u8> {
        format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nAccess-Control-Allow-Origin: *\r\nAccess-Control-Allow-Methods: GET, POST, OPTIONS\r\nAccess-Control-Allow-Headers: Content-Type\r\nConnection: close\r\n\r\n{}",
            self.status,
            reason_phrase(self.status),
            self.content_type,
            self.body.len(),
            self.body,
        )
        .into_bytes()
    }
}

/// Request line plus the headers the server acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: String,
    pub path: String,
    pub content_length: usize,
    pub content_type: Option<String>,
    pub upgrade: Option<String>,
    pub websocket_key: Option<String>,
}

impl RequestHead {
    /// Path without its query string.
    pub fn route_path(&self) -> &str {
        self.path.split('?').next().unwrap_or("/")
    }

    pub fn wants_websocket(&self) -> bool {
        self.upgrade
            .as_deref()
            .is_some_and(|u| u.split(',').any(|p| p.trim().eq_ignore_ascii_case("websocket")))
    }
}

/// Read until a complete request head is buffered.
///
/// Returns the parsed head and the offset where it ends in `buf`; any bytes
/// past that offset were read ahead and belong to the body or the next
/// protocol.
pub async fn read_head<R: AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
) -> Result<(RequestHead, usize)> {
    let mut chunk = [0u8; 4096];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Err(SmartOpsError::BadRequest(
                "connection closed before request head".to_string(),
            ));
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > MAX_REQUEST_BYTES {
            return Err(SmartOpsError::PayloadTooLarge {
                limit: MAX_REQUEST_BYTES,
            });
        }

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut req = httparse::Request::new(&mut headers);
        match req.parse(&buf[..]) {
            Ok(httparse::Status::Complete(head_len)) => {
                let head = RequestHead {
                    method: req.method.unwrap_or("").to_string(),
                    path: req.path.unwrap_or("/").to_string(),
                    content_length: content_length(req.headers)?,
                    content_type: header_value(req.headers, "content-type"),
                    upgrade: header_value(req.headers, "upgrade"),
                    websocket_key: header_value(req.headers, "sec-websocket-key"),
                };
                return Ok((head, head_len));
            }
            Ok(httparse::Status::Partial) => continue,
            Err(e) => return Err(SmartOpsError::BadRequest(e.to_string())),
        }
    }
}

/// Read the `Content-Length` body that follows a head already parsed out of `buf`.
async fn read_body<R: AsyncRead + Unpin>(
    reader: &mut R,
    mut buf: Vec<u8>,
    head_len: usize,
    content_length: usize,
) -> Result<Vec<u8>> {
    let total = match head_len.checked_add(content_length) {
        Some(total) if total <= MAX_REQUEST_BYTES => total,
        _ => {
            return Err(SmartOpsError::PayloadTooLarge {
                limit: MAX_REQUEST_BYTES,
            })
        }
    };
    let mut chunk = [0u8; 4096];
    while buf.len() < total {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Err(SmartOpsError::BadRequest("truncated request body".to_string()));
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    buf.truncate(total);
    Ok(buf.split_off(head_len))
}

/// Read one request (head and `Content-Length` body) from `reader`.
pub async fn read_request<R: AsyncRead + Unpin>(reader: &mut R) -> Result<HttpRequest> {
    let mut buf = Vec::with_capacity(4096);
    let (head, head_len) = read_head(reader, &mut buf).await?;
    let body = read_body(reader, buf, head_len, head.content_length).await?;
    Ok(HttpRequest::from_head(head, body))
}

fn header_value(headers: &[httparse::Header<'_>], name: &str) -> Option<String> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .and_then(|h| std::str::from_utf8(h.value).ok())
        .map(|v| v.trim().to_string())
}

fn content_length(headers: &[httparse::Header<'_>]) -> Result<usize> {
    match headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case("content-length"))
    {
        Some(h) => std::str::from_utf8(h.value)
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .ok_or_else(|| SmartOpsError::BadRequest("invalid Content-Length".to_string())),
        None => Ok(0),
    }
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Dispatch a parsed request to its handler.
pub fn route(state: &AppState, request: &HttpRequest) -> HttpResponse {
    let path = request.path.split('?').next().unwrap_or("/");
    match (request.method.as_str(), path) {
        ("OPTIONS", _) => HttpResponse::no_content(),
        ("POST", "/api/contact") => handle_contact(state, request),
        ("GET", "/api/health") => handle_health(&state.config),
        ("GET", "/api/monitoring") => handle_monitoring(),
        (_, p) if API_PATHS.contains(&p) => HttpResponse::failure(405, "Method Not Allowed"),
        _ => HttpResponse::failure(404, "Not Found"),
    }
}

/// Decode the contact form. Only a JSON body is read; an empty or non-JSON
/// body counts as a form with every field missing.
fn contact_form(request: &HttpRequest) -> serde_json::Result<ContactRequest> {
    if !request.is_json() || request.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ContactRequest::default());
    }
    serde_json::from_slice(&request.body)
}

pub fn handle_contact(state: &AppState, request: &HttpRequest) -> HttpResponse {
    let form = match contact_form(request) {
        Ok(form) => form,
        Err(e) => {
            debug!(error = %e, "contact body is not a JSON object");
            return HttpResponse::failure(400, contact::INVALID_BODY_MESSAGE);
        }
    };
    let submission = match contact::validate(form) {
        Ok(s) => s,
        Err(rejection) => return HttpResponse::failure(400, rejection.message()),
    };
    match state.contact_sink.deliver(&submission) {
        Ok(()) => HttpResponse::json(200, &ContactResponse::ok()),
        Err(e) => {
            error!(error = %e, email = %submission.email, "contact delivery failed");
            HttpResponse::failure(500, contact::DELIVERY_FAILED_MESSAGE)
        }
    }
}

pub fn handle_health(config: &ServerConfig) -> HttpResponse {
    HttpResponse::json(
        200,
        &HealthResponse {
            status: "OK",
            message: config.health_message(),
        },
    )
}

pub fn handle_monitoring() -> HttpResponse {
    let snapshot = {
        let mut rng = rand::thread_rng();
        monitoring::snapshot(&mut rng)
    };
    HttpResponse::json(200, &snapshot)
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Bind the configured address, start the broadcast loop and serve until Ctrl-C.
pub async fn serve(config: ServerConfig) -> Result<()> {
    let listener = TcpListener::bind(config.bind_addr()).await?;
    let addr = listener.local_addr()?;

    eprintln!(
        "{}",
        format!("  {} backend running on http://{}", config.service_name, addr).bright_green()
    );
    eprintln!(
        "{}",
        format!("  Push channel at ws://{}{}", addr, WS_PATH).bright_cyan()
    );
    eprintln!("{}", "  Press Ctrl+C to stop.".bright_blue());

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    run(listener, AppState::new(config), shutdown).await
}

/// Accept connections on `listener` until `shutdown` resolves.
///
/// Starts the broadcast loop for `state.hub` and stops it on the way out.
pub async fn run<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let ticker = ticker::spawn(
        state.hub.clone(),
        state.config.broadcast_interval(),
        StdRng::from_entropy(),
    );
    info!(
        addr = %listener.local_addr()?,
        interval_ms = state.config.broadcast_interval_ms,
        "server started"
    );

    tokio::pin!(shutdown);
    let result = loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        continue;
                    }
                };
                let state = state.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, peer, state).await {
                        debug!(peer = %peer, error = %e, "connection error");
                    }
                });
            }
            _ = &mut shutdown => break Ok(()),
        }
    };

    ticker.abort();
    let open = state.hub.connections();
    for connection in &open {
        info!(
            id = %connection.id,
            peer = %connection.peer,
            session_ms = connection.open_for_ms(),
            "connection still open at shutdown"
        );
    }
    info!(open = open.len(), "server stopped");
    result
}

async fn handle_connection(mut stream: TcpStream, peer: SocketAddr, state: AppState) -> Result<()> {
    let mut buf = Vec::with_capacity(4096);
    let response = match read_head(&mut stream, &mut buf).await {
        Ok((head, head_len)) if head.wants_websocket() && head.route_path() == WS_PATH => {
            return upgrade(stream, peer, state, head, buf.split_off(head_len)).await;
        }
        Ok((head, head_len)) => {
            match read_body(&mut stream, buf, head_len, head.content_length).await {
                Ok(body) => {
                    let request = HttpRequest::from_head(head, body);
                    let response = route(&state, &request);
                    debug!(
                        peer = %peer,
                        method = %request.method,
                        path = %request.path,
                        status = response.status,
                        "http request"
                    );
                    response
                }
                Err(e) => error_response(peer, e)?,
            }
        }
        Err(e) => error_response(peer, e)?,
    };
    stream.write_all(&response.to_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

/// Map a request read failure to the response sent back, or pass it on when
/// the connection itself failed.
fn error_response(peer: SocketAddr, err: SmartOpsError) -> Result<HttpResponse> {
    match err {
        SmartOpsError::PayloadTooLarge { .. } => Ok(HttpResponse::failure(413, "Payload Too Large")),
        SmartOpsError::BadRequest(detail) => {
            debug!(peer = %peer, detail = %detail, "malformed request");
            Ok(HttpResponse::failure(400, "Bad Request"))
        }
        e => Err(e),
    }
}

/// Answer the upgrade handshake and hand the socket to the push channel.
///
/// `read_ahead` holds any bytes the client sent after its request head.
async fn upgrade(
    mut stream: TcpStream,
    peer: SocketAddr,
    state: AppState,
    head: RequestHead,
    read_ahead: Vec<u8>,
) -> Result<()> {
    let Some(key) = head.websocket_key.as_deref() else {
        debug!(peer = %peer, "upgrade without Sec-WebSocket-Key");
        stream
            .write_all(&HttpResponse::failure(400, "Bad Request").to_bytes())
            .await?;
        stream.shutdown().await?;
        return Ok(());
    };
    let accept = derive_accept_key(key.as_bytes());
    stream
        .write_all(
            format!(
                "HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: {}\r\n\r\n",
                accept
            )
            .as_bytes(),
        )
        .await?;
    let ws_stream = WebSocketStream::from_partially_read(stream, read_ahead, Role::Server, None).await;
    hub::handle_ws(ws_stream, state.hub.clone(), state.responder.clone(), peer.to_string()).await;
    Ok(())
}
