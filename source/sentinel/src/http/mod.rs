//! HTTP handler framework (spec.md §4.4): URL→handler mapping, password
//! verification, and the managed-exporter reverse proxy.

pub mod auth;
pub mod managed_exporter;
pub mod mapping;

pub use auth::PasswordConfig;
pub use managed_exporter::ManagedExporterHandler;
pub use mapping::{HttpDispatcher, HttpHandler, HttpResponse, URLMapping};
