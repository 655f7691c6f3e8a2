/// Canonical form of an inbound `Host` value: lower-cased, without port or trailing dot.
pub fn normalize_host(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let host = if let Some(rest) = raw.strip_prefix('[') {
        // [v6]:port
        rest.split(']').next().unwrap_or_default()
    } else {
        raw.rsplit_once(':').map(|(h, _)| h).unwrap_or(raw)
    };
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

/// Port part of a raw `Host` value, if any
pub fn host_port(raw: &str) -> Option<&str> {
    if raw.ends_with(']') {
        return None;
    }
    raw.rsplit_once(':')
        .map(|(_, port)| port)
        .filter(|port| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
}

/// Best-effort leftmost label for diagnostics on the tenant-not-found page.
///
/// `acme.localhost` yields `acme`; other hosts need at least three labels.
pub fn extract_subdomain(host: &str) -> Option<String> {
    let parts: Vec<&str> = host.split('.').collect();
    if parts.len() >= 2 && parts.last() == Some(&"localhost") {
        return (parts[0] != "localhost").then(|| parts[0].to_string());
    }
    (parts.len() > 2).then(|| parts[0].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_port_case_and_trailing_dot() {
        assert_eq!(normalize_host("Acme.Example.com:8080").as_deref(), Some("acme.example.com"));
        assert_eq!(normalize_host("acme.localhost.").as_deref(), Some("acme.localhost"));
        assert_eq!(normalize_host("[::1]:3000").as_deref(), Some("::1"));
        assert_eq!(normalize_host(""), None);
        assert_eq!(normalize_host(":80"), None);
    }

    #[test]
    fn port_is_split_off() {
        assert_eq!(host_port("acme.localhost:3000"), Some("3000"));
        assert_eq!(host_port("acme.localhost"), None);
        assert_eq!(host_port("[::1]"), None);
        assert_eq!(host_port("[::1]:8080"), Some("8080"));
    }

    #[test]
    fn subdomain_extraction() {
        assert_eq!(extract_subdomain("acme.localhost").as_deref(), Some("acme"));
        assert_eq!(extract_subdomain("localhost"), None);
        assert_eq!(extract_subdomain("acme.app.example.com").as_deref(), Some("acme"));
        assert_eq!(extract_subdomain("example.com"), None);
    }
}
