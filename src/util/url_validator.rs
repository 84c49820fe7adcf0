use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use thiserror::Error;
use url::{Host, Url};

/// Why a URL was refused.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// Anything but http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    #[error("URL has no host")]
    MissingHost,
    /// Private, link-local, shared or unspecified address.
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(String),
    #[error("Localhost not allowed")]
    Localhost,
}

/// Checks a feed URL before it is stored or fetched.
///
/// Only public `http`/`https` hosts pass: `localhost`, loopback and
/// private address literals are refused so an imported OPML file cannot
/// point the fetcher at the local network.
///
/// ```
/// use newsdesk::util::validate_url;
///
/// let url = validate_url("https://feeds.bbci.co.uk/news/rss.xml").unwrap();
/// assert_eq!(url.host_str(), Some("feeds.bbci.co.uk"));
///
/// assert!(validate_url("http://localhost/feed").is_err());
/// assert!(validate_url("http://192.168.1.1/feed").is_err());
/// assert!(validate_url("file:///etc/passwd").is_err());
/// ```
pub fn validate_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(UrlValidationError::UnsupportedScheme(url.scheme().to_owned()));
    }

    let ip = match url.host() {
        None => return Err(UrlValidationError::MissingHost),
        Some(Host::Domain(domain)) => {
            if domain.eq_ignore_ascii_case("localhost") || domain.ends_with(".localhost") {
                return Err(UrlValidationError::Localhost);
            }
            None
        }
        Some(Host::Ipv4(v4)) => Some(IpAddr::V4(v4)),
        Some(Host::Ipv6(v6)) => Some(IpAddr::V6(v6)),
    };

    match ip {
        Some(ip) if ip.is_loopback() => Err(UrlValidationError::Localhost),
        Some(ip) if is_internal(ip) => Err(UrlValidationError::PrivateIp(ip.to_string())),
        _ => Ok(url),
    }
}

/// Checks a link before handing it to the system browser.
///
/// Only absolute `http`/`https` URLs with a host are opened. Unlike
/// [`validate_url`] private hosts are allowed, since the browser runs as
/// the user anyway.
pub fn validate_url_for_open(url_str: &str) -> Result<Url, String> {
    let url = Url::parse(url_str).map_err(|e| format!("Refusing to open invalid URL: {e}"))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        "http" | "https" => Err("Refusing to open URL without a host".to_string()),
        scheme => Err(format!("Refusing to open {scheme}:// URL")),
    }
}

fn is_internal(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_internal_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => v4.is_loopback() || is_internal_v4(v4),
            None => is_internal_v6(v6),
        },
    }
}

fn is_internal_v4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    // 100.64.0.0/10 is carrier-grade NAT space.
    let shared = a == 100 && (64..128).contains(&b);
    ip.is_private() || ip.is_link_local() || ip.is_unspecified() || ip.is_broadcast() || shared
}

fn is_internal_v6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    let unique_local = first & 0xfe00 == 0xfc00; // fc00::/7
    let link_local = first & 0xffc0 == 0xfe80; // fe80::/10
    ip.is_unspecified() || unique_local || link_local
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_feed_urls_pass() {
        for url in [
            "https://feeds.bbci.co.uk/news/rss.xml",
            "http://news.ycombinator.com/rss",
            "https://www.theguardian.com:443/international/rss",
            "http://93.184.216.34/feed",
        ] {
            assert!(validate_url(url).is_ok(), "{url} should pass");
        }
    }

    #[test]
    fn test_local_and_private_hosts_rejected() {
        for url in [
            "http://localhost/feed",
            "http://LOCALHOST:8080/feed",
            "http://api.localhost/feed",
            "http://127.0.0.1/feed",
            "http://[::1]/feed",
            "http://10.0.0.1:3000/feed",
            "http://172.16.0.1/feed",
            "http://192.168.1.1/feed",
            "http://169.254.169.254/latest/meta-data",
            "http://100.64.0.1/feed",
            "http://0.0.0.0/feed",
            "http://[fe80::1]/feed",
            "http://[fd12:3456::1]/feed",
            "http://[::ffff:192.168.0.1]/feed",
        ] {
            assert!(validate_url(url).is_err(), "{url} should be rejected");
        }
    }

    #[test]
    fn test_error_kinds() {
        assert!(matches!(
            validate_url("ftp://example.com/feed"),
            Err(UrlValidationError::UnsupportedScheme(s)) if s == "ftp"
        ));
        assert!(matches!(
            validate_url("http://127.0.0.1/"),
            Err(UrlValidationError::Localhost)
        ));
        assert!(matches!(
            validate_url("http://10.1.2.3/"),
            Err(UrlValidationError::PrivateIp(ip)) if ip == "10.1.2.3"
        ));
        assert!(matches!(
            validate_url("not a url"),
            Err(UrlValidationError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_open_accepts_web_links() {
        assert!(validate_url_for_open("https://www.bbc.com/news/article-1").is_ok());
        assert!(validate_url_for_open("http://192.168.1.10/intranet").is_ok());
    }

    #[test]
    fn test_open_rejects_other_schemes() {
        assert!(validate_url_for_open("file:///etc/passwd").is_err());
        assert!(validate_url_for_open("javascript:alert(1)").is_err());
        assert!(validate_url_for_open("not a url").is_err());
    }
}
