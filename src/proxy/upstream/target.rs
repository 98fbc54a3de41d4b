//! Upstream target URL construction.

/// Mount point of the forwarding route
pub const BACKEND_PREFIX: &str = "/api/backend/";

/// Path after the mount prefix, exactly as received (percent-encoding intact).
/// This is the wildcard segments joined by `/`.
pub fn path_remainder(request_path: &str) -> Option<&str> {
    request_path.strip_prefix(BACKEND_PREFIX)
}

/// `{base}/{path}` plus `?{query}` when the inbound query is non-empty.
/// The query is appended byte-for-byte.
pub fn build_target_url(base_url: &str, path: &str, query: Option<&str>) -> String {
    let base = base_url.trim().trim_end_matches('/');
    match query.filter(|q| !q.is_empty()) {
        Some(qs) => format!("{}/{}?{}", base, path, qs),
        None => format!("{}/{}", base, path),
    }
}
