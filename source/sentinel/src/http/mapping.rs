//! URL→handler mapping and the per-connection hyper dispatcher
//! (spec.md §4.3/§4.4). Multiple config handlers sharing the same
//! `bind+port` register into the same [`HttpDispatcher`] (shared-socket
//! coalescing); the dispatcher routes on exact URL, since spec.md is
//! explicit that `URLMapping` registers an exact URL rather than a prefix —
//! the teacher's `matchit`-based prefix router is therefore not pulled in
//! here (see DESIGN.md).

use std::collections::HashMap;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::FutureExt;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;

use crate::net::listener::{BoxedStream, ConnectionHandler};

use super::auth::extract_credential;

pub type HttpResponse = Response<Full<Bytes>>;

/// One exact-URL registration. `handler_name` is used only for 502 error
/// bodies and logging.
pub struct URLMapping {
    pub url: String,
    pub handler_name: String,
}

#[async_trait]
pub trait HttpHandler: Send + Sync {
    fn mappings(&self) -> Vec<URLMapping>;

    fn handler_name(&self) -> &str;

    /// Whether `credential` authenticates this request (spec.md §4.4).
    fn check_password(&self, credential: Option<&str>) -> bool;

    async fn respond(&self, url: &str, req: Request<Incoming>) -> HttpResponse;
}

/// Routes requests for every handler sharing one bound socket. Built once
/// per `(bind, port, tls)` key and handed to a single [`Listener`].
#[derive(Default)]
pub struct HttpDispatcher {
    mappings: HashMap<String, Arc<dyn HttpHandler>>,
}

impl HttpDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges a handler's URL mappings into this dispatcher (the "union
    /// merge" of spec.md §3). Duplicate URLs from different handlers favor
    /// whichever registers last — config validation is expected to catch
    /// genuine collisions before this point.
    pub fn register(&mut self, handler: Arc<dyn HttpHandler>) {
        for mapping in handler.mappings() {
            self.mappings.insert(mapping.url, handler.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    async fn serve(&self, req: Request<Incoming>) -> HttpResponse {
        let path = req.uri().path().to_string();
        let Some(handler) = self.mappings.get(&path).cloned() else {
            return text_response(StatusCode::NOT_FOUND, "404 Not Found");
        };

        let query = req.uri().query().map(str::to_string);
        let credential = extract_credential(req.headers(), query.as_deref());
        if !handler.check_password(credential.as_deref()) {
            return text_response(StatusCode::UNAUTHORIZED, "401 Unauthorized");
        }

        let handler_name = handler.handler_name().to_string();
        match AssertUnwindSafe(handler.respond(&path, req)).catch_unwind().await {
            Ok(response) => response,
            Err(_) => {
                tracing::error!(handler = %handler_name, url = %path, "panic in request handler");
                text_response(StatusCode::INTERNAL_SERVER_ERROR, "500 Internal Server Error")
            }
        }
    }
}

#[async_trait]
impl ConnectionHandler for HttpDispatcher {
    async fn handle_connection(&self, stream: BoxedStream, peer: SocketAddr) {
        let io = TokioIo::new(stream);
        let service = service_fn(move |req| {
            let dispatcher: &Self = self;
            async move { Ok::<_, std::convert::Infallible>(dispatcher.serve(req).await) }
        });

        if let Err(e) = hyper::server::conn::http1::Builder::new().serve_connection(io, service).await {
            let message = e.to_string();
            if !message.contains("connection closed") && !message.contains("reset by peer") {
                tracing::debug!(error = %message, %peer, "http connection error");
            }
        }
    }
}

pub fn text_response(status: StatusCode, body: &str) -> HttpResponse {
    Response::builder()
        .status(status)
        .header("content-type", "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from(body.to_string())))
        .expect("building a text response with only static-ish headers never fails")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubHandler {
        password: Option<String>,
    }

    #[async_trait]
    impl HttpHandler for StubHandler {
        fn mappings(&self) -> Vec<URLMapping> {
            vec![URLMapping { url: "/stub".to_string(), handler_name: "stub".to_string() }]
        }

        fn handler_name(&self) -> &str {
            "stub"
        }

        fn check_password(&self, credential: Option<&str>) -> bool {
            match &self.password {
                None => true,
                Some(expected) => credential == Some(expected.as_str()),
            }
        }

        async fn respond(&self, _url: &str, _req: Request<Incoming>) -> HttpResponse {
            text_response(StatusCode::OK, "ok")
        }
    }

    #[test]
    fn dispatcher_merges_mappings_from_registered_handlers() {
        let mut dispatcher = HttpDispatcher::new();
        dispatcher.register(Arc::new(StubHandler { password: None }));
        assert!(dispatcher.mappings.contains_key("/stub"));
    }
}
