//! Endpoint selection by URI scheme.

use url::Url;

/// Pick the first endpoint whose scheme is `scheme`, as `host:port`.
///
/// Endpoints that fail to parse are skipped.
pub fn select(endpoints: &[String], scheme: &str) -> Option<String> {
    endpoints.iter().find_map(|endpoint| match Url::parse(endpoint) {
        Ok(url) if url.scheme() == scheme => authority(&url),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(endpoint = %endpoint, error = %e, "Failed to parse discovery endpoint");
            None
        }
    })
}

fn authority(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port_or_known_default() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_selects_matching_scheme() {
        let eps = endpoints(&["http://10.0.0.1:8000", "grpc://10.0.0.1:9000"]);
        assert_eq!(select(&eps, "grpc").as_deref(), Some("10.0.0.1:9000"));
        assert_eq!(select(&eps, "http").as_deref(), Some("10.0.0.1:8000"));
        assert_eq!(select(&eps, "https"), None);
    }

    #[test]
    fn test_first_match_wins() {
        let eps = endpoints(&["grpc://10.0.0.1:9000", "grpc://10.0.0.2:9000"]);
        assert_eq!(select(&eps, "grpc").as_deref(), Some("10.0.0.1:9000"));
    }

    #[test]
    fn test_skips_unparsable() {
        let eps = endpoints(&["::not a uri::", "grpc://[::1]:9000"]);
        assert_eq!(select(&eps, "grpc").as_deref(), Some("[::1]:9000"));
    }

    #[test]
    fn test_default_port() {
        let eps = endpoints(&["http://example.internal"]);
        assert_eq!(select(&eps, "http").as_deref(), Some("example.internal:80"));
    }
}
