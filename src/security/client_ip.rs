//! Client identity resolution.
//!
//! Picks a trust-ordered client IP from proxy headers, falling back to the
//! raw connection address. The first syntactically valid IP literal wins.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::http::HeaderMap;

/// Headers consulted in priority order: CDN first, then the forwarding
/// chain, then legacy client-IP variants.
const IP_HEADERS: [&str; 4] = ["cf-connecting-ip", "x-forwarded-for", "x-real-ip", "client-ip"];

/// Resolve the client IP for a request.
///
/// `X-Forwarded-For` may carry a comma-separated chain; only its first
/// element (the originating client) is considered. Anything that does not
/// parse as an IP literal is skipped. When nothing validates, the all-zero
/// address is returned rather than an error.
pub fn resolve_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> IpAddr {
    for name in IP_HEADERS {
        let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) else {
            continue;
        };
        let candidate = value.split(',').next().unwrap_or("").trim();
        if let Ok(ip) = candidate.parse::<IpAddr>() {
            return ip;
        }
    }
    peer.map(|addr| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> Option<SocketAddr> {
        Some("10.0.0.1:55555".parse().unwrap())
    }

    #[test]
    fn cdn_header_wins_over_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("cf-connecting-ip", HeaderValue::from_static("1.1.1.1"));
        headers.insert("x-forwarded-for", HeaderValue::from_static("2.2.2.2"));
        assert_eq!(
            resolve_client_ip(&headers, peer()),
            "1.1.1.1".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn forwarded_for_takes_first_chain_element() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("3.3.3.3, 10.0.0.2, 10.0.0.3"),
        );
        assert_eq!(
            resolve_client_ip(&headers, peer()),
            "3.3.3.3".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn invalid_header_values_are_skipped() {
        let mut headers = HeaderMap::new();
        headers.insert("cf-connecting-ip", HeaderValue::from_static("not-an-ip"));
        headers.insert("x-real-ip", HeaderValue::from_static("4.4.4.4"));
        assert_eq!(
            resolve_client_ip(&headers, peer()),
            "4.4.4.4".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn falls_back_to_peer_then_unspecified() {
        let headers = HeaderMap::new();
        assert_eq!(
            resolve_client_ip(&headers, peer()),
            "10.0.0.1".parse::<IpAddr>().unwrap()
        );
        assert_eq!(
            resolve_client_ip(&headers, None),
            "0.0.0.0".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn ipv6_literals_are_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("2001:db8::1"));
        assert_eq!(
            resolve_client_ip(&headers, peer()),
            "2001:db8::1".parse::<IpAddr>().unwrap()
        );
    }
}
