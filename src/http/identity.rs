//! Caller identity resolution at the transport boundary.

use std::net::SocketAddr;

use axum::http::HeaderMap;

use crate::admission::CallerIdentity;
use crate::config::IdentitySource;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// First non-empty entry of `X-Forwarded-For`.
fn first_forwarded(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(X_FORWARDED_FOR)?
        .to_str()
        .ok()?
        .split(',')
        .next()
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
}

impl IdentitySource {
    /// Derive the rate-limit key for a request.
    ///
    /// The peer port is dropped so reconnects share an identity.
    pub fn resolve(self, peer: SocketAddr, headers: &HeaderMap) -> CallerIdentity {
        match self {
            IdentitySource::Peer => CallerIdentity::new(peer.ip().to_string()),
            IdentitySource::ForwardedFor => match first_forwarded(headers) {
                Some(forwarded) => CallerIdentity::new(forwarded),
                None => CallerIdentity::new(peer.ip().to_string()),
            },
        }
    }
}
