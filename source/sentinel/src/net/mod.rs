//! Listener/handler runtime: lifecycle and request-dispatch framework for
//! the concurrent network listeners, shared-socket coalescing, and the
//! per-connection ACL gate (spec.md §4.3).

pub mod listener;
pub mod registry;
pub mod tls;

pub use listener::{BindSpec, Listener, ListenerHandle, ListenerState};
pub use registry::ListenerRegistry;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetError {
    #[error("failed to bind {addr}: {source}")]
    Bind { addr: String, #[source] source: std::io::Error },

    #[error("TLS material missing for a TLS-enabled port ({port})")]
    MissingTlsMaterial { port: u16 },

    #[error("failed to load TLS material: {0}")]
    Tls(String),

    #[error("mismatched TLS configuration for shared listener on port {port}")]
    MismatchedTlsConfig { port: u16 },
}

pub type Result<T> = std::result::Result<T, NetError>;

/// Parses `<n>[s]` port syntax: a trailing `s` means TLS (spec.md §4.3).
pub fn parse_port_spec(raw: &str) -> Option<(u16, bool)> {
    if let Some(stripped) = raw.strip_suffix(['s', 'S']) {
        stripped.parse().ok().map(|port| (port, true))
    } else {
        raw.parse().ok().map(|port| (port, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tls_suffix() {
        assert_eq!(parse_port_spec("8443s"), Some((8443, true)));
        assert_eq!(parse_port_spec("8080"), Some((8080, false)));
        assert_eq!(parse_port_spec("nope"), None);
    }
}
