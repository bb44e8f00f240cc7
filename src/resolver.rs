//! Resolution of raw configuration strings into connectable targets.
//!
//! Two configuration values feed the resolver: the platform API URL
//! (`CF_TARGET`) and a comma-separated trust list (`TRUST_CERTS`). Both are
//! optional. Malformed input never aborts resolution; a bad URL is logged
//! and skipped, bad trust-list entries are dropped silently.

use http::Uri;
use http::uri::Scheme;
use std::fmt;

/// Default port for targets that do not name one explicitly.
pub const DEFAULT_HTTPS_PORT: u16 = 443;

/// A host and port to observe a certificate chain from.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Target {
    /// Hostname or IP address literal.
    pub host: String,
    /// TCP port, in `1..=65535`.
    pub port: u16,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Resolve the primary target URL and the trust list into targets, in
/// configuration order (primary first).
pub fn resolve(cf_target: Option<&str>, trust_certs: Option<&str>) -> Vec<Target> {
    let mut targets = Vec::new();
    if let Some(raw) = cf_target {
        targets.extend(resolve_primary(raw));
    }
    if let Some(raw) = trust_certs {
        targets.extend(raw.split(',').filter_map(resolve_entry));
    }
    targets
}

/// Only an `https` URL yields a target; the port defaults to 443. A string
/// that does not parse as a URL with a host is a (non-fatal) resolution
/// error; any other scheme is skipped silently.
fn resolve_primary(raw: &str) -> Option<Target> {
    let Some((uri, host)) = raw
        .parse::<Uri>()
        .ok()
        .and_then(|uri| uri.host().map(|h| h.to_string()).map(|h| (uri, h)))
    else {
        log::error!("cannot parse CF_TARGET {:?} as a URL", raw);
        return None;
    };
    if uri.scheme() != Some(&Scheme::HTTPS) {
        return None;
    }
    Some(Target {
        host,
        port: uri.port_u16().unwrap_or(DEFAULT_HTTPS_PORT),
    })
}

/// One `host[:port]` trust-list entry. A missing or unparsable port falls
/// back to 443; an empty host or an explicit out-of-range port drops the
/// entry. Text after a second `:` is ignored.
fn resolve_entry(entry: &str) -> Option<Target> {
    let mut parts = entry.split(':');
    let host = parts.next().unwrap_or("");
    let port = match parts.next() {
        None => i64::from(DEFAULT_HTTPS_PORT),
        Some(p) => p.parse::<i64>().unwrap_or(i64::from(DEFAULT_HTTPS_PORT)),
    };
    if host.is_empty() || port < 1 || port > 65535 {
        return None;
    }
    Some(Target {
        host: host.to_string(),
        port: port as u16,
    })
}
