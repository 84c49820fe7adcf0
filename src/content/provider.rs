use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

use super::extract::extract_from_html;
use super::reader::ReaderError;
use super::ReaderResult;
use crate::config::ReaderConfig;
use crate::http::read_limited_text;

const MAX_PAGE_SIZE: usize = 5 * 1024 * 1024; // 5MB

/// The content proxies, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// Wraps the page in JSON: `{"contents": "<html>..."}`
    AllOrigins,
    /// Returns the page as a JSON string, or sometimes as raw HTML
    JsonProxy,
    /// Returns the page as-is
    CorsSh,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::AllOrigins,
        ProviderKind::JsonProxy,
        ProviderKind::CorsSh,
    ];

    /// Stable identifier used as a storage key.
    pub fn id(self) -> &'static str {
        match self {
            ProviderKind::AllOrigins => "allorigins",
            ProviderKind::JsonProxy => "jsonproxy",
            ProviderKind::CorsSh => "corssh",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }

    pub fn name(self) -> &'static str {
        match self {
            ProviderKind::AllOrigins => "AllOrigins CORS Proxy",
            ProviderKind::JsonProxy => "JSONProxy (Backup)",
            ProviderKind::CorsSh => "CORS.sh (Alternative)",
        }
    }

    /// How long the provider is skipped after a failure.
    pub fn retry_delay(self) -> Duration {
        match self {
            ProviderKind::AllOrigins => Duration::from_secs(30),
            ProviderKind::JsonProxy => Duration::from_secs(60),
            ProviderKind::CorsSh => Duration::from_secs(45),
        }
    }
}

#[derive(Deserialize)]
struct AllOriginsResponse {
    contents: Option<String>,
}

/// A configured content proxy.
pub struct Provider {
    kind: ProviderKind,
    base_url: String,
    api_key: Option<SecretString>,
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("kind", &self.kind)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Provider {
    pub fn new(kind: ProviderKind, base_url: impl Into<String>) -> Self {
        Self {
            kind,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    /// Attaches an API key, sent as `x-cors-api-key` by CORS.sh.
    pub fn with_api_key(mut self, key: SecretString) -> Self {
        self.api_key = Some(key);
        self
    }

    /// Which proxy this is; decides the request URL, response shape and
    /// retry delay.
    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// The proxy URL that fetches `article`.
    pub fn request_url(&self, article: &Url) -> Result<Url, url::ParseError> {
        match self.kind {
            ProviderKind::AllOrigins => Url::parse_with_params(
                &format!("{}/get", self.base_url),
                &[("url", article.as_str())],
            ),
            ProviderKind::JsonProxy => Url::parse_with_params(
                &format!("{}/", self.base_url),
                &[("url", article.as_str())],
            ),
            ProviderKind::CorsSh => Url::parse(&format!("{}/{}", self.base_url, article)),
        }
    }

    /// Fetches `article` through this proxy and extracts it.
    pub async fn fetch(
        &self,
        client: &reqwest::Client,
        article: &Url,
    ) -> Result<ReaderResult, ReaderError> {
        let html = self.fetch_html(client, article).await?;
        Ok(extract_from_html(&html, article.as_str())?)
    }

    /// Fetches the raw page HTML for `article`.
    pub async fn fetch_html(
        &self,
        client: &reqwest::Client,
        article: &Url,
    ) -> Result<String, ReaderError> {
        let url = self
            .request_url(article)
            .map_err(|e| ReaderError::InvalidUrl(e.to_string()))?;
        tracing::debug!(provider = self.name(), url = %url, "Fetching through provider");

        let mut request = client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json");
        if self.kind == ProviderKind::CorsSh {
            request = request.header("X-Requested-With", "XMLHttpRequest");
            if let Some(key) = &self.api_key {
                request = request.header("x-cors-api-key", key.expose_secret());
            }
        }

        let response = request.send().await?;
        let status = response.status();
        tracing::debug!(provider = self.name(), status = %status, "Provider responded");
        if !status.is_success() {
            return Err(ReaderError::HttpStatus(status.as_u16()));
        }

        let body = read_limited_text(response, MAX_PAGE_SIZE).await?;
        let html = match self.kind {
            ProviderKind::AllOrigins => serde_json::from_str::<AllOriginsResponse>(&body)?
                .contents
                .unwrap_or_default(),
            ProviderKind::JsonProxy => {
                serde_json::from_str::<String>(&body).unwrap_or(body)
            }
            ProviderKind::CorsSh => body,
        };

        if html.trim().is_empty() {
            return Err(ReaderError::NoContent(self.name()));
        }
        Ok(html)
    }
}

/// The three providers in fallback order, configured from `config`.
pub fn default_providers(config: &ReaderConfig) -> Vec<Provider> {
    let mut cors_sh = Provider::new(ProviderKind::CorsSh, &config.corssh_url);
    if let Some(key) = config.resolved_corssh_api_key() {
        cors_sh = cors_sh.with_api_key(SecretString::from(key));
    }

    vec![
        Provider::new(ProviderKind::AllOrigins, &config.allorigins_url),
        Provider::new(ProviderKind::JsonProxy, &config.jsonproxy_url),
        cors_sh,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = "<html><head><title>Hello</title></head><body><article><p>Body</p></article></body></html>";

    fn article() -> Url {
        Url::parse("https://example.com/news/1?ref=rss").unwrap()
    }

    #[test]
    fn test_request_urls() {
        let article = article();
        assert_eq!(
            Provider::new(ProviderKind::AllOrigins, "https://api.allorigins.win")
                .request_url(&article)
                .unwrap()
                .as_str(),
            "https://api.allorigins.win/get?url=https%3A%2F%2Fexample.com%2Fnews%2F1%3Fref%3Drss"
        );
        assert_eq!(
            Provider::new(ProviderKind::JsonProxy, "https://jsonp.afeld.me/")
                .request_url(&article)
                .unwrap()
                .as_str(),
            "https://jsonp.afeld.me/?url=https%3A%2F%2Fexample.com%2Fnews%2F1%3Fref%3Drss"
        );
        assert_eq!(
            Provider::new(ProviderKind::CorsSh, "https://cors.sh")
                .request_url(&article)
                .unwrap()
                .as_str(),
            "https://cors.sh/https://example.com/news/1?ref=rss"
        );
    }

    #[test]
    fn test_ids_round_trip() {
        for kind in ProviderKind::ALL {
            assert_eq!(ProviderKind::from_id(kind.id()), Some(kind));
        }
        assert_eq!(ProviderKind::from_id("AllOrigins"), None);
    }

    #[test]
    fn test_retry_delays() {
        assert_eq!(ProviderKind::AllOrigins.retry_delay(), Duration::from_secs(30));
        assert_eq!(ProviderKind::JsonProxy.retry_delay(), Duration::from_secs(60));
        assert_eq!(ProviderKind::CorsSh.retry_delay(), Duration::from_secs(45));
    }

    #[tokio::test]
    async fn test_allorigins_contents() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/get"))
            .and(query_param("url", "https://example.com/news/1?ref=rss"))
            .and(header("accept", "application/json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "contents": PAGE })),
            )
            .mount(&server)
            .await;

        let provider = Provider::new(ProviderKind::AllOrigins, server.uri());
        let result = provider.fetch(&reqwest::Client::new(), &article()).await.unwrap();
        assert_eq!(result.title, "Hello");
        assert_eq!(result.content, "<p>Body</p>");
    }

    #[tokio::test]
    async fn test_allorigins_null_contents_is_no_content() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "contents": null })),
            )
            .mount(&server)
            .await;

        let provider = Provider::new(ProviderKind::AllOrigins, server.uri());
        let result = provider.fetch_html(&reqwest::Client::new(), &article()).await;
        assert!(matches!(result, Err(ReaderError::NoContent(_))));
    }

    #[tokio::test]
    async fn test_jsonproxy_accepts_json_string_and_raw_html() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!(PAGE)))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;

        let provider = Provider::new(ProviderKind::JsonProxy, server.uri());
        let client = reqwest::Client::new();
        assert_eq!(provider.fetch_html(&client, &article()).await.unwrap(), PAGE);
        assert_eq!(provider.fetch_html(&client, &article()).await.unwrap(), PAGE);
    }

    #[tokio::test]
    async fn test_cors_sh_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("x-requested-with", "XMLHttpRequest"))
            .and(header("x-cors-api-key", "secret-key"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .expect(1)
            .mount(&server)
            .await;

        let provider = Provider::new(ProviderKind::CorsSh, server.uri())
            .with_api_key(SecretString::from("secret-key".to_string()));
        let html = provider
            .fetch_html(&reqwest::Client::new(), &article())
            .await
            .unwrap();
        assert_eq!(html, PAGE);
    }

    #[tokio::test]
    async fn test_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let provider = Provider::new(ProviderKind::CorsSh, server.uri());
        let result = provider.fetch_html(&reqwest::Client::new(), &article()).await;
        assert!(matches!(result, Err(ReaderError::HttpStatus(403))));
    }

    #[test]
    fn test_debug_masks_api_key() {
        let provider = Provider::new(ProviderKind::CorsSh, "https://cors.sh")
            .with_api_key(SecretString::from("hunter2".to_string()));
        let debug = format!("{:?}", provider);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }
}
