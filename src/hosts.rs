use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

/// Parse a host-list file content into a deduplicated list of hostnames.
///
/// Supported formats per line:
/// - hostname: `cdn.example.com`
/// - IPv4 literal: `203.0.113.7`
/// - comments: everything after `#` is ignored
/// - whitespace and blank lines are ignored
pub fn parse_hosts_str(s: &str) -> Result<Vec<String>> {
    let mut out: Vec<String> = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for (idx, raw_line) in s.lines().enumerate() {
        let line_no = idx + 1;
        // Strip comments and trim
        let line = raw_line.split('#').next().map(str::trim).unwrap_or("");
        if line.is_empty() {
            continue;
        }

        if !validate_host(line) {
            bail!("line {line_no}: invalid host: {line}");
        }
        if seen.insert(line.to_string()) {
            out.push(line.to_string());
        }
    }

    Ok(out)
}

/// Load a host list from a file path. Errors if the file cannot be read or parsed.
pub fn load_hosts_from_path(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("failed to read hosts file: {}", path.as_ref().display()))?;
    parse_hosts_str(&content)
}

/// Validate a hostname or IPv4 literal.
///
/// Hostnames must follow DNS label syntax: dot-separated labels of at most 63
/// characters, alphanumeric at both ends, hyphens allowed in between, with an
/// alphabetic TLD of at least two characters. Anything carrying scheme, path,
/// port or userinfo separators is rejected.
pub fn validate_host(host: &str) -> bool {
    if host.is_empty() || host.len() > 253 {
        return false;
    }
    if host.chars().any(|c| matches!(c, '/' | '@' | ':' | '?' | '#')) {
        return false;
    }
    if host.parse::<std::net::Ipv4Addr>().is_ok() {
        return true;
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    for label in &labels {
        let bytes = label.as_bytes();
        if bytes.is_empty() || bytes.len() > 63 {
            return false;
        }
        if !bytes[0].is_ascii_alphanumeric() || !bytes[bytes.len() - 1].is_ascii_alphanumeric() {
            return false;
        }
        if !bytes.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'-') {
            return false;
        }
    }
    let tld = labels[labels.len() - 1];
    tld.len() >= 2 && tld.bytes().all(|b| b.is_ascii_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hosts_and_dedup() {
        let input = "cdn.example.com\nexample.org\ncdn.example.com\n";
        let hosts = parse_hosts_str(input).unwrap();
        assert_eq!(hosts, vec!["cdn.example.com", "example.org"]);
    }

    #[test]
    fn parse_with_comments_and_whitespace() {
        let input = r#"
            # edge hosts
            cdn.example.com  # primary
            203.0.113.7

            # blank lines and spaces should be fine
        "#;
        let hosts = parse_hosts_str(input).unwrap();
        assert_eq!(hosts, vec!["cdn.example.com", "203.0.113.7"]);
    }

    #[test]
    fn invalid_host_errors_with_line_number() {
        let input = "cdn.example.com\nhttp://bad/path\n";
        let err = parse_hosts_str(input).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn hostname_validation() {
        assert!(validate_host("cdn.udemy.com"));
        assert!(validate_host("a-b.example.org"));
        assert!(validate_host("192.0.2.1"));
        assert!(!validate_host(""));
        assert!(!validate_host("single-label"));
        assert!(!validate_host("host:443"));
        assert!(!validate_host("-bad.example.com"));
        assert!(!validate_host("bad-.example.com"));
        assert!(!validate_host("double..dot.com"));
        assert!(!validate_host("example.c0m"));
        assert!(!validate_host(&"x".repeat(260)));
    }
}
