use std::time::SystemTime;

use chrono::{DateTime, Utc};

/// Joins an API domain and an endpoint with exactly one slash between them.
pub fn join_url(domain: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        domain.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

/// Formats a timestamp as an RFC 7231 HTTP date, e.g. `Thu, 01 Jan 1970 00:00:00 GMT`.
pub fn http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("https://formulae.brew.sh/api", "formula.jws.json"),
            "https://formulae.brew.sh/api/formula.jws.json"
        );
        assert_eq!(
            join_url("https://mirror.example/api/", "/cask.jws.json"),
            "https://mirror.example/api/cask.jws.json"
        );
        assert_eq!(
            join_url("https://formulae.brew.sh/api", "internal/v3/homebrew-core.jws.json"),
            "https://formulae.brew.sh/api/internal/v3/homebrew-core.jws.json"
        );
    }

    #[test]
    fn test_http_date() {
        assert_eq!(http_date(UNIX_EPOCH), "Thu, 01 Jan 1970 00:00:00 GMT");
        assert_eq!(
            http_date(UNIX_EPOCH + Duration::from_secs(784_111_777)),
            "Sun, 06 Nov 1994 08:49:37 GMT"
        );
    }
}
