//! CIDR / literal host ACL shared by every listener (spec.md §4.2), grounded
//! on the teacher's `CidrRangeFilter` (`proxy/filters/builtin/cidr_range.rs`):
//! comma-split, per-token parse, fail construction on the first bad token.
//! Hostname caching follows the same `moka` idiom the teacher uses for
//! rate-limit buckets (`proxy/rate_limiter/storage.rs`), adapted to a sync
//! cache since hostname resolution here is a one-shot `tokio::net::lookup_host`
//! at call sites rather than a background-ticked counter.

use std::net::IpAddr;
use std::time::Duration;

use cidr::IpCidr;
use moka::sync::Cache;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AclError {
    #[error("invalid allowed-hosts rule: {0}")]
    InvalidRule(String),
}

#[derive(Debug, Clone)]
enum Rule {
    Cidr(IpCidr),
    Hostname(String),
}

/// An ordered list of allow rules; a peer is allowed iff it matches at
/// least one. An empty list denies all (spec.md §3).
pub struct AllowedHosts {
    rules: Vec<Rule>,
    cache_dns: bool,
    dns_cache: Option<Cache<String, Vec<IpAddr>>>,
}

impl AllowedHosts {
    /// Parses a comma-separated rule string. Each token is trimmed and
    /// classified as IPv4/IPv6/CIDR (all three parse as `IpCidr`) or a
    /// bare hostname. Malformed rules fail construction; an empty or
    /// blank input produces a deny-all list.
    pub fn parse(raw: &str, cache_dns: bool) -> Result<Self, AclError> {
        let mut rules = Vec::new();
        for token in raw.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let normalized = strip_brackets(token);
            if let Ok(cidr) = normalized.parse::<IpCidr>() {
                rules.push(Rule::Cidr(cidr));
                continue;
            }
            if let Ok(ip) = normalized.parse::<IpAddr>() {
                rules.push(Rule::Cidr(IpCidr::new_host(ip)));
                continue;
            }
            if is_plausible_hostname(normalized) {
                rules.push(Rule::Hostname(normalized.to_ascii_lowercase()));
                continue;
            }
            return Err(AclError::InvalidRule(token.to_string()));
        }

        let dns_cache = cache_dns.then(|| {
            Cache::builder()
                .max_capacity(1024)
                .time_to_live(Duration::from_secs(300))
                .build()
        });

        Ok(Self { rules, cache_dns, dns_cache })
    }

    /// Parses `addr` (stripping `[brackets]` and a trailing `:port` if
    /// present) to an IP and checks it against every rule. Hostname rules
    /// are resolved once at init if caching is enabled, otherwise resolved
    /// per call via the caller-supplied resolver.
    pub async fn check<F, Fut>(&self, addr: &str, resolve: F) -> bool
    where
        F: Fn(String) -> Fut,
        Fut: std::future::Future<Output = Vec<IpAddr>>,
    {
        let Some(ip) = parse_peer_ip(addr) else {
            return false;
        };

        for rule in &self.rules {
            match rule {
                Rule::Cidr(cidr) => {
                    if cidr.contains(&ip) {
                        return true;
                    }
                }
                Rule::Hostname(host) => {
                    let resolved = self.resolved_ips(host, &resolve).await;
                    if resolved.contains(&ip) {
                        return true;
                    }
                }
            }
        }
        false
    }

    async fn resolved_ips<F, Fut>(&self, host: &str, resolve: &F) -> Vec<IpAddr>
    where
        F: Fn(String) -> Fut,
        Fut: std::future::Future<Output = Vec<IpAddr>>,
    {
        if let Some(cache) = &self.dns_cache {
            if let Some(hit) = cache.get(host) {
                return hit;
            }
            let resolved = resolve(host.to_string()).await;
            cache.insert(host.to_string(), resolved.clone());
            return resolved;
        }
        resolve(host.to_string()).await
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn caches_dns(&self) -> bool {
        self.cache_dns
    }
}

fn strip_brackets(token: &str) -> &str {
    token.strip_prefix('[').and_then(|s| s.strip_suffix(']')).unwrap_or(token)
}

fn is_plausible_hostname(token: &str) -> bool {
    !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_')
}

/// Strips `[brackets]` and an optional trailing `:port` from a peer address
/// string, returning the bare IP.
fn parse_peer_ip(addr: &str) -> Option<IpAddr> {
    if let Some(inner) = addr.strip_prefix('[') {
        let (host, _) = inner.split_once(']').unwrap_or((inner, ""));
        return host.parse().ok();
    }
    match addr.parse::<IpAddr>() {
        Ok(ip) => Some(ip),
        Err(_) => {
            let (host, _) = addr.rsplit_once(':')?;
            host.parse().ok()
        }
    }
}
