//! Syntactic URL checks performed before any extractor work.

use url::Url;

/// Returns true when `raw` is an absolute `http`/`https` URL with a non-empty
/// authority. Nothing is resolved or fetched.
pub fn validate(raw: &str) -> bool {
    parse_media_url(raw).is_some()
}

/// Parses `raw` and returns it only if it passes [`validate`].
pub fn parse_media_url(raw: &str) -> Option<Url> {
    if raw.is_empty() || raw.trim() != raw {
        return None;
    }

    // `Url` forgives `http:///host`, so the authority is checked on the raw text.
    let (scheme, rest) = raw.split_once("://")?;
    if !scheme.eq_ignore_ascii_case("http") && !scheme.eq_ignore_ascii_case("https") {
        return None;
    }
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if authority.is_empty() {
        return None;
    }

    let parsed = Url::parse(raw).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    parsed.host_str().filter(|host| !host.is_empty())?;
    Some(parsed)
}

/// True when `url`'s host is one of `domains` or a subdomain of one.
pub fn host_matches(url: &Url, domains: &[String]) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();
    domains.iter().any(|domain| {
        let domain = domain.trim().trim_start_matches('.').to_ascii_lowercase();
        !domain.is_empty() && (host == domain || host.ends_with(&format!(".{domain}")))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_absolute_http_urls() {
        assert!(validate("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(validate("http://example.com"));
        assert!(validate("HTTPS://Example.com/path#frag"));
        assert!(validate("http://user:pw@example.com:8080/a"));
        assert!(validate("http://127.0.0.1/clip"));
    }

    #[test]
    fn rejects_other_schemes_and_missing_authority() {
        for input in [
            "",
            "example.com/watch",
            "/relative/path",
            "ftp://example.com/file",
            "javascript:alert(1)",
            "file:///etc/passwd",
            "http://",
            "https:///no-host",
            "http:example.com",
            " https://example.com",
            "mailto:someone@example.com",
        ] {
            assert!(!validate(input), "{input:?} should be rejected");
        }
    }

    #[test]
    fn host_matching_covers_subdomains_only() {
        let domains = vec!["youtube.com".to_string(), "youtu.be".to_string()];
        let url = |s: &str| Url::parse(s).unwrap();
        assert!(host_matches(&url("https://youtube.com/watch?v=1"), &domains));
        assert!(host_matches(&url("https://m.YouTube.com/watch?v=1"), &domains));
        assert!(host_matches(&url("https://youtu.be/abc"), &domains));
        assert!(!host_matches(&url("https://notyoutube.com/x"), &domains));
        assert!(!host_matches(&url("https://vimeo.com/1"), &domains));
    }
}
