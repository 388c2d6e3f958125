//! `HandlerManagedExporter`'s reverse-proxy front end: an outbound
//! `http://<agent-addr>/metrics` request rewritten from the incoming
//! request, preserving method and body (spec.md §4.4). Errors from the
//! upstream surface as 502 with a fixed body naming the handler.

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, StatusCode};

use super::auth::PasswordConfig;
use super::mapping::{text_response, HttpHandler, HttpResponse, URLMapping};

pub struct ManagedExporterHandler {
    name: String,
    url: String,
    upstream_addr: String,
    password: PasswordConfig,
    client: reqwest::Client,
}

impl ManagedExporterHandler {
    pub fn new(name: String, url: String, upstream_addr: String, password: PasswordConfig) -> Self {
        Self { name, url, upstream_addr, password, client: reqwest::Client::new() }
    }
}

#[async_trait]
impl HttpHandler for ManagedExporterHandler {
    fn mappings(&self) -> Vec<URLMapping> {
        vec![URLMapping { url: self.url.clone(), handler_name: self.name.clone() }]
    }

    fn handler_name(&self) -> &str {
        &self.name
    }

    fn check_password(&self, credential: Option<&str>) -> bool {
        self.password.check(credential)
    }

    async fn respond(&self, _url: &str, req: Request<Incoming>) -> HttpResponse {
        let method = req.method().clone();
        let body_bytes = match req.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(_) => Bytes::new(),
        };

        let target = format!("http://{}/metrics", self.upstream_addr);
        let reqwest_method =
            reqwest::Method::from_bytes(method.as_str().as_bytes()).unwrap_or(reqwest::Method::GET);

        match self.client.request(reqwest_method, &target).body(body_bytes.to_vec()).send().await {
            Ok(resp) => {
                let status = StatusCode::from_u16(resp.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
                let body = resp.bytes().await.unwrap_or_default();
                hyper::Response::builder()
                    .status(status)
                    .body(Full::new(body))
                    .unwrap_or_else(|_| text_response(StatusCode::BAD_GATEWAY, "502 Bad Gateway"))
            }
            Err(e) => {
                tracing::warn!(error = %e, handler = %self.name, "upstream error proxying to managed exporter");
                text_response(
                    StatusCode::BAD_GATEWAY,
                    &format!("502 Bad Gateway (HandlerManagedExporter: {})", self.name),
                )
            }
        }
    }
}
