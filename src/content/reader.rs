use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use url::Url;

use super::extract::ExtractError;
use super::provider::{default_providers, Provider, ProviderKind};
use super::ReaderResult;
use crate::config::ReaderConfig;
use crate::http::BodyError;
use crate::storage::Database;
use crate::util::validate_url_for_open;

/// Domains known to block extraction; matched as substrings of the host.
const PROTECTED_SITES: [&str; 7] = [
    "cnn.com",
    "bbc.com",
    "nytimes.com",
    "wsj.com",
    "washingtonpost.com",
    "ft.com",
    "bloomberg.com",
];

const PROTECTED_REASON: &str = "This news site uses advanced content protection";
const UNAVAILABLE_REASON: &str = "Content extraction temporarily unavailable";

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("Invalid article URL: {0}")]
    InvalidUrl(String),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Failed to read response: {0}")]
    Body(#[from] BodyError),
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("No HTML content received from {0}")]
    NoContent(&'static str),
    #[error(transparent)]
    Extract(#[from] ExtractError),
}

const LAST_REQUEST_KEY: &str = "last_request";
const SUPPRESSED_PREFIX: &str = "suppressed.";

fn suppressed_key(kind: ProviderKind) -> String {
    format!("{SUPPRESSED_PREFIX}{}", kind.id())
}

/// `now + delay`, saturating at the latest representable time.
fn deadline(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[derive(Default)]
struct ReaderState {
    last_request: Option<DateTime<Utc>>,
    /// Providers that failed recently, with the time they become usable
    suppressed_until: HashMap<ProviderKind, DateTime<Utc>>,
}

impl ReaderState {
    /// Folds in persisted timestamps, keeping the later value of each.
    fn merge(&mut self, persisted: Vec<(String, DateTime<Utc>)>) {
        for (key, at) in persisted {
            if key == LAST_REQUEST_KEY {
                self.last_request = self.last_request.max(Some(at));
            } else if let Some(kind) = key
                .strip_prefix(SUPPRESSED_PREFIX)
                .and_then(ProviderKind::from_id)
            {
                let until = self.suppressed_until.entry(kind).or_insert(at);
                *until = (*until).max(at);
            }
        }
    }
}

/// Extracts readable articles through a chain of content proxies.
///
/// Consecutive extractions are spaced at least `request_delay` apart. A
/// provider that fails is skipped until its retry delay has elapsed, unless
/// every provider is currently suppressed, in which case all are tried.
///
/// With a store attached (see [`ReaderService::with_store`]) the spacing and
/// suppression deadlines are kept in the database as wall-clock times, so a
/// provider that failed in one run is still skipped by the next.
pub struct ReaderService {
    client: reqwest::Client,
    providers: Vec<Provider>,
    request_delay: Duration,
    store: Option<Database>,
    state: Mutex<ReaderState>,
}

impl ReaderService {
    pub fn new(client: reqwest::Client, config: &ReaderConfig) -> Self {
        Self::with_providers(
            client,
            default_providers(config),
            Duration::from_millis(config.request_delay_ms),
        )
    }

    pub fn with_providers(
        client: reqwest::Client,
        providers: Vec<Provider>,
        request_delay: Duration,
    ) -> Self {
        Self {
            client,
            providers,
            request_delay,
            store: None,
            state: Mutex::new(ReaderState::default()),
        }
    }

    /// Persists request spacing and provider suppression in `db`.
    pub fn with_store(mut self, db: Database) -> Self {
        self.store = Some(db);
        self
    }

    /// Extracts the article at `url`.
    ///
    /// Only a malformed article URL is an error. When every provider fails
    /// the result is a fallback (`success == false`) explaining why.
    pub async fn extract_article(&self, url: &str) -> Result<ReaderResult, ReaderError> {
        let article = validate_url_for_open(url).map_err(ReaderError::InvalidUrl)?;
        tracing::info!(url = %article, "Extracting article content");

        self.wait_for_slot().await;

        for provider in self.providers_to_try().await {
            tracing::debug!(provider = provider.name(), "Trying provider");
            match provider.fetch(&self.client, &article).await {
                Ok(result) => {
                    tracing::info!(
                        provider = provider.name(),
                        title = %result.title,
                        content_len = result.content.len(),
                        "Extracted article"
                    );
                    let mut state = self.state.lock().await;
                    if state.suppressed_until.remove(&provider.kind()).is_some() {
                        self.persist(&suppressed_key(provider.kind()), None).await;
                    }
                    return Ok(result);
                }
                Err(e) => {
                    let retry_delay = provider.kind().retry_delay();
                    tracing::warn!(
                        provider = provider.name(),
                        error = %e,
                        retry_after_secs = retry_delay.as_secs(),
                        "Provider failed"
                    );
                    let until = deadline(Utc::now(), retry_delay);
                    let mut state = self.state.lock().await;
                    state.suppressed_until.insert(provider.kind(), until);
                    self.persist(&suppressed_key(provider.kind()), Some(until))
                        .await;
                }
            }
        }

        tracing::info!(url = %article, "All providers failed, returning fallback");
        Ok(fallback_result(&article))
    }

    /// Each configured provider with the time it becomes usable again, or
    /// `None` when it is not being skipped.
    pub async fn provider_status(&self) -> Vec<(ProviderKind, Option<DateTime<Utc>>)> {
        let state = self.synced_state().await;
        let now = Utc::now();
        self.providers
            .iter()
            .map(|p| {
                let until = state
                    .suppressed_until
                    .get(&p.kind())
                    .copied()
                    .filter(|until| *until > now);
                (p.kind(), until)
            })
            .collect()
    }

    /// Locks the in-memory state after folding in the store's.
    ///
    /// A store that cannot be read leaves the in-memory state as it is.
    async fn synced_state(&self) -> MutexGuard<'_, ReaderState> {
        let mut state = self.state.lock().await;
        if let Some(db) = &self.store {
            match db.get_reader_timestamps().await {
                Ok(persisted) => state.merge(persisted),
                Err(e) => tracing::warn!(error = %e, "Failed to load reader state"),
            }
        }
        state
    }

    /// Writes one timestamp to the store, or deletes it for `None`.
    async fn persist(&self, key: &str, at: Option<DateTime<Utc>>) {
        let Some(db) = &self.store else {
            return;
        };
        let result = match at {
            Some(at) => db.set_reader_timestamp(key, at).await,
            None => db.delete_reader_timestamp(key).await.map(|_| ()),
        };
        if let Err(e) = result {
            tracing::warn!(key, error = %e, "Failed to persist reader state");
        }
    }

    /// Sleeps until `request_delay` has passed since the previous extraction.
    ///
    /// The lock is held while sleeping so concurrent callers queue up.
    async fn wait_for_slot(&self) {
        let mut state = self.synced_state().await;
        if let Some(last) = state.last_request {
            if let Ok(wait) = (deadline(last, self.request_delay) - Utc::now()).to_std() {
                // A clock set backwards never stretches the wait past one delay.
                let wait = wait.min(self.request_delay);
                if !wait.is_zero() {
                    tracing::debug!(wait_ms = wait.as_millis() as u64, "Rate limiting reader request");
                    tokio::time::sleep(wait).await;
                }
            }
        }
        let now = Utc::now();
        state.last_request = Some(now);
        self.persist(LAST_REQUEST_KEY, Some(now)).await;
    }

    /// Providers not currently suppressed, or all of them if none remain.
    async fn providers_to_try(&self) -> Vec<&Provider> {
        let mut state = self.synced_state().await;
        let now = Utc::now();

        let expired: Vec<ProviderKind> = state
            .suppressed_until
            .iter()
            .filter(|(_, until)| **until <= now)
            .map(|(kind, _)| *kind)
            .collect();
        for kind in expired {
            tracing::info!(provider = kind.name(), "Provider retry timeout expired");
            state.suppressed_until.remove(&kind);
            self.persist(&suppressed_key(kind), None).await;
        }

        let available: Vec<&Provider> = self
            .providers
            .iter()
            .filter(|p| !state.suppressed_until.contains_key(&p.kind()))
            .collect();

        if available.is_empty() {
            self.providers.iter().collect()
        } else {
            available
        }
    }
}

/// The result shown when no provider could extract `article`.
pub fn fallback_result(article: &Url) -> ReaderResult {
    let domain = article
        .host_str()
        .map(|h| h.replacen("www.", "", 1))
        .unwrap_or_default();

    let protected = PROTECTED_SITES.iter().any(|site| domain.contains(site));
    let (reason, hint) = if protected {
        (
            PROTECTED_REASON,
            "Major news sites often block content extraction to protect their business model.",
        )
    } else {
        (
            UNAVAILABLE_REASON,
            "This might be temporary due to rate limiting or technical issues.",
        )
    };

    let content = format!(
        "<h3>{reason}</h3>\
         <p><strong>{domain}</strong> cannot be displayed in reader mode.</p>\
         <p><small>{hint}</small></p>\
         <p><a href=\"{article}\">Read Full Article</a></p>\
         <p><small>Opening the original article supports the publisher and gives you the complete experience.</small></p>"
    );

    ReaderResult {
        title: "Reader Mode Unavailable".to_string(),
        content,
        excerpt: format!("Article from {domain} - content protection active"),
        author: None,
        published_date: None,
        site_name: None,
        image_url: None,
        success: false,
        error: Some(reason.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str =
        "<html><head><title>Hello</title></head><body><article><p>Body</p></article></body></html>";

    fn service(server: &MockServer, delay: Duration) -> ReaderService {
        let base = server.uri();
        ReaderService::with_providers(
            reqwest::Client::new(),
            vec![
                Provider::new(ProviderKind::AllOrigins, format!("{base}/allorigins")),
                Provider::new(ProviderKind::JsonProxy, format!("{base}/jsonp")),
                Provider::new(ProviderKind::CorsSh, format!("{base}/cors")),
            ],
            delay,
        )
    }

    async fn is_suppressed(reader: &ReaderService, kind: ProviderKind) -> bool {
        reader
            .provider_status()
            .await
            .into_iter()
            .any(|(k, until)| k == kind && until.is_some())
    }

    #[tokio::test]
    async fn test_invalid_url_is_error() {
        let server = MockServer::start().await;
        let reader = service(&server, Duration::ZERO);
        assert!(matches!(
            reader.extract_article("not a url").await,
            Err(ReaderError::InvalidUrl(_))
        ));
        assert!(matches!(
            reader.extract_article("ftp://example.com/file").await,
            Err(ReaderError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_first_provider_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/allorigins/get"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "contents": PAGE })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let reader = service(&server, Duration::ZERO);
        let result = reader
            .extract_article("https://example.com/story")
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.title, "Hello");
        assert_eq!(result.site_name.as_deref(), Some("example.com"));
    }

    #[tokio::test]
    async fn test_falls_back_and_suppresses_failed_provider() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/allorigins/get"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/jsonp/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!(PAGE)))
            .expect(2)
            .mount(&server)
            .await;

        let reader = service(&server, Duration::ZERO);
        let first = reader
            .extract_article("https://example.com/one")
            .await
            .unwrap();
        assert!(first.success);
        assert!(is_suppressed(&reader, ProviderKind::AllOrigins).await);
        assert!(!is_suppressed(&reader, ProviderKind::JsonProxy).await);

        // AllOrigins is skipped on the second call (expect(1) above)
        let second = reader
            .extract_article("https://example.com/two")
            .await
            .unwrap();
        assert!(second.success);
    }

    #[tokio::test]
    async fn test_all_providers_fail_returns_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/allorigins/get"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/jsonp/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html><body></body></html>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex("^/cors/"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let reader = service(&server, Duration::ZERO);
        let result = reader
            .extract_article("https://www.example.org/a")
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.title, "Reader Mode Unavailable");
        assert_eq!(result.error.as_deref(), Some(UNAVAILABLE_REASON));
        assert_eq!(result.excerpt, "Article from example.org - content protection active");
        assert!(result.content.contains("https://www.example.org/a"));

        for kind in [ProviderKind::AllOrigins, ProviderKind::JsonProxy, ProviderKind::CorsSh] {
            assert!(is_suppressed(&reader, kind).await);
        }
    }

    #[tokio::test]
    async fn test_all_suppressed_tries_everything_again() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/allorigins/get"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/jsonp/"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex("^/cors/"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let reader = service(&server, Duration::ZERO);
        reader.extract_article("https://example.com/1").await.unwrap();
        let result = reader.extract_article("https://example.com/2").await.unwrap();
        assert!(!result.success);
    }

    #[tokio::test]
    async fn test_suppression_expires() {
        let server = MockServer::start().await;
        let reader = service(&server, Duration::ZERO);
        reader.state.lock().await.suppressed_until.insert(
            ProviderKind::AllOrigins,
            Utc::now() - chrono::Duration::milliseconds(1),
        );

        assert!(!is_suppressed(&reader, ProviderKind::AllOrigins).await);
        let providers = reader.providers_to_try().await;
        assert_eq!(providers.len(), 3);
        assert!(reader.state.lock().await.suppressed_until.is_empty());
    }

    #[tokio::test]
    async fn test_store_state_is_loaded_and_cleared() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/allorigins/get"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "contents": PAGE })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let db = Database::open(":memory:").await.unwrap();
        let past = Utc::now() - chrono::Duration::seconds(5);
        let future = Utc::now() + chrono::Duration::seconds(60);
        db.set_reader_timestamp("suppressed.allorigins", past).await.unwrap();
        db.set_reader_timestamp("suppressed.jsonproxy", future).await.unwrap();

        let reader = service(&server, Duration::ZERO).with_store(db.clone());
        let status = reader.provider_status().await;
        assert_eq!(status[0], (ProviderKind::AllOrigins, None));
        let stored = DateTime::from_timestamp_millis(future.timestamp_millis()).unwrap();
        assert_eq!(status[1], (ProviderKind::JsonProxy, Some(stored)));

        // The expired AllOrigins deadline is dropped and the provider used.
        let result = reader.extract_article("https://example.com/story").await.unwrap();
        assert!(result.success);

        let keys: Vec<String> = db
            .get_reader_timestamps()
            .await
            .unwrap()
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        assert_eq!(keys, ["last_request", "suppressed.jsonproxy"]);
    }

    #[test]
    fn test_merge_keeps_later_timestamps() {
        let early = DateTime::from_timestamp_millis(1_000).unwrap();
        let late = DateTime::from_timestamp_millis(2_000).unwrap();

        let mut state = ReaderState {
            last_request: Some(late),
            suppressed_until: HashMap::from([(ProviderKind::CorsSh, early)]),
        };
        state.merge(vec![
            ("last_request".to_string(), early),
            ("suppressed.corssh".to_string(), late),
            ("suppressed.unknown".to_string(), late),
            ("something_else".to_string(), late),
        ]);

        assert_eq!(state.last_request, Some(late));
        assert_eq!(state.suppressed_until.len(), 1);
        assert_eq!(state.suppressed_until[&ProviderKind::CorsSh], late);
    }

    #[tokio::test]
    async fn test_requests_are_spaced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let reader = service(&server, Duration::from_millis(200));
        let start = std::time::Instant::now();
        reader.extract_article("https://example.com/1").await.unwrap();
        reader.extract_article("https://example.com/2").await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[test]
    fn test_fallback_for_protected_site() {
        let url = Url::parse("https://www.bbc.com/news/world-1").unwrap();
        let result = fallback_result(&url);
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some(PROTECTED_REASON));
        assert_eq!(result.excerpt, "Article from bbc.com - content protection active");
        assert!(result.content.contains("<strong>bbc.com</strong>"));
    }

    #[test]
    fn test_fallback_substring_match() {
        // bbc.co.uk is not in the list; edition.cnn.com matches cnn.com
        let uk = fallback_result(&Url::parse("https://www.bbc.co.uk/news").unwrap());
        assert_eq!(uk.error.as_deref(), Some(UNAVAILABLE_REASON));
        let cnn = fallback_result(&Url::parse("https://edition.cnn.com/x").unwrap());
        assert_eq!(cnn.error.as_deref(), Some(PROTECTED_REASON));
    }
}
