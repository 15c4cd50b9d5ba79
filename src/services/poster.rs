/// Poster lookup waterfall
///
/// 1. TMDB structured search by title (+ year)
/// 2. TMDB again without the year, once, when a year was given and TMDB answered
///    without a usable poster
/// 3. Wikipedia full-text search for "<title> film", taking the page thumbnail
///
/// Every failure along the way degrades to the next source, and finally to `None`.
use std::sync::Arc;

use tracing::instrument;

use crate::{
    config::{credential, Config},
    error::FetchError,
    models::{MovieLookup, TmdbSearchResponse, WikiSearchResponse},
    services::fetch::{fetch_with_retry, HttpRequest, HttpTransport, RetryPolicy},
};

const WIKI_THUMBNAIL_SIZE: &str = "600";

/// Outcome of one TMDB search
#[derive(Debug, PartialEq, Eq)]
enum TmdbSearch {
    Found(String),
    /// TMDB answered, but with an error status, no results or no poster
    Miss,
    /// Retries ran out before TMDB answered
    Unreachable,
}

pub struct PosterResolver {
    transport: Arc<dyn HttpTransport>,
    tmdb_api_key: Option<String>,
    tmdb_api_url: String,
    image_base_url: String,
    wikipedia_api_url: String,
    retry: RetryPolicy,
}

impl PosterResolver {
    pub fn new(transport: Arc<dyn HttpTransport>, config: &Config) -> Self {
        Self {
            transport,
            tmdb_api_key: credential(&config.tmdb_api_key),
            tmdb_api_url: config.tmdb_api_url.trim_end_matches('/').to_string(),
            image_base_url: config.tmdb_image_base_url.trim_end_matches('/').to_string(),
            wikipedia_api_url: config.wikipedia_api_url.clone(),
            retry: RetryPolicy {
                max_attempts: config.fetch_max_attempts,
                base_delay: config.fetch_base_delay(),
            },
        }
    }

    /// Whether the structured provider is usable; Wikipedia needs no key
    pub fn tmdb_configured(&self) -> bool {
        self.tmdb_api_key.is_some()
    }

    /// Resolve a poster URL. Never fails; a miss is `None`.
    ///
    /// TMDB is searched with `tmdb_search_query` when present, Wikipedia with the
    /// display title.
    #[instrument(skip(self, lookup), fields(title = %lookup.title))]
    pub async fn resolve(&self, lookup: &MovieLookup) -> Option<String> {
        let title = lookup.title.trim();
        let search_query = non_empty(lookup.tmdb_search_query.as_deref()).unwrap_or(title);
        let year = non_empty(lookup.year.as_deref());

        if let Some(url) = self.from_tmdb(search_query, year).await {
            return Some(url);
        }

        let wiki_title = if title.is_empty() { search_query } else { title };
        let url = self.from_wikipedia(wiki_title).await;

        if url.is_none() {
            tracing::info!("No poster found");
        }
        url
    }

    async fn from_tmdb(&self, query: &str, year: Option<&str>) -> Option<String> {
        let Some(api_key) = self.tmdb_api_key.as_deref() else {
            tracing::debug!("TMDB_API_KEY not configured, skipping structured search");
            return None;
        };

        match self.search_tmdb(api_key, query, year).await {
            TmdbSearch::Found(url) => return Some(url),
            TmdbSearch::Unreachable => {
                tracing::info!("TMDB unreachable, skipping yearless retry");
                return None;
            }
            TmdbSearch::Miss => {}
        }

        // The recommended year can differ from TMDB's canonical release year
        let year = year?;
        let yearless = strip_trailing_year(query);
        tracing::info!(
            year = %year,
            query = %yearless,
            "No TMDB poster with year filter, retrying without it"
        );
        match self.search_tmdb(api_key, yearless, None).await {
            TmdbSearch::Found(url) => Some(url),
            TmdbSearch::Miss | TmdbSearch::Unreachable => None,
        }
    }

    async fn search_tmdb(&self, api_key: &str, query: &str, year: Option<&str>) -> TmdbSearch {
        if query.is_empty() {
            return TmdbSearch::Miss;
        }

        let url = format!("{}/search/movie", self.tmdb_api_url);
        let mut params = vec![
            ("api_key", api_key),
            ("query", query),
            ("language", "en-US"),
            ("page", "1"),
            ("include_adult", "false"),
        ];
        if let Some(year) = year {
            params.push(("year", year));
        }

        let data: TmdbSearchResponse = match self.fetch_json(&url, &params, "tmdb").await {
            Ok(Some(data)) => data,
            Ok(None) => return TmdbSearch::Miss,
            Err(_) => return TmdbSearch::Unreachable,
        };

        let Some(path) = data
            .results
            .first()
            .and_then(|movie| movie.poster_path.as_deref())
            .filter(|p| !p.is_empty())
        else {
            return TmdbSearch::Miss;
        };

        tracing::info!(query = %query, year = ?year, "Found TMDB poster");

        if path.starts_with('/') {
            TmdbSearch::Found(format!("{}{}", self.image_base_url, path))
        } else {
            TmdbSearch::Found(format!("{}/{}", self.image_base_url, path))
        }
    }

    async fn from_wikipedia(&self, title: &str) -> Option<String> {
        if title.is_empty() {
            return None;
        }

        tracing::info!("Falling back to Wikipedia");

        let search = format!("{} film", title);
        let params = [
            ("action", "query"),
            ("generator", "search"),
            ("gsrsearch", search.as_str()),
            ("gsrlimit", "1"),
            ("prop", "pageimages"),
            ("pithumbsize", WIKI_THUMBNAIL_SIZE),
            ("format", "json"),
        ];

        let data: WikiSearchResponse = self
            .fetch_json(&self.wikipedia_api_url, &params, "wikipedia")
            .await
            .ok()
            .flatten()?;
        data.top_thumbnail()
    }

    /// Fetch and decode. Only retry exhaustion is an error; a bad status or
    /// payload is logged and comes back as `Ok(None)`.
    async fn fetch_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, &str)],
        source: &'static str,
    ) -> Result<Option<T>, FetchError> {
        let request = match HttpRequest::get(url, params) {
            Ok(request) => request,
            Err(e) => {
                tracing::error!(source, error = %e, "Could not build poster request");
                return Ok(None);
            }
        };

        let response = fetch_with_retry(self.transport.as_ref(), &request, self.retry)
            .await
            .map_err(|e| {
                tracing::warn!(source, error = %e, "Poster source unreachable");
                e
            })?;

        if !response.is_success() {
            tracing::warn!(source, status = response.status, "Poster source returned an error");
            return Ok(None);
        }

        match response.json::<T>() {
            Ok(data) => Ok(Some(data)),
            Err(e) => {
                tracing::warn!(source, error = %e, "Failed to parse poster source response");
                Ok(None)
            }
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Drops a trailing whitespace-separated four digit token ("Amélie 2001" -> "Amélie")
pub fn strip_trailing_year(title: &str) -> &str {
    let trimmed = title.trim();
    match trimmed.rsplit_once(char::is_whitespace) {
        Some((head, tail)) if tail.len() == 4 && tail.bytes().all(|b| b.is_ascii_digit()) => {
            head.trim_end()
        }
        _ => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::services::fetch::{HttpResponse, MockHttpTransport};
    use mockall::Sequence;

    const EMPTY_TMDB: &str = r#"{"page":1,"results":[],"total_results":0}"#;
    const AMELIE_TMDB: &str = r#"{"results":[{"id":194,"title":"Amélie","poster_path":"/amelie.jpg"}]}"#;
    const AMELIE_WIKI: &str =
        r#"{"query":{"pages":{"39812":{"index":1,"title":"Amélie","thumbnail":{"source":"https://upload.test/amelie.jpg"}}}}}"#;

    fn resolver(transport: MockHttpTransport, tmdb_key: Option<&str>) -> PosterResolver {
        let config = Config {
            tmdb_api_key: tmdb_key.map(str::to_string),
            tmdb_api_url: "http://tmdb.test/3".to_string(),
            tmdb_image_base_url: "http://img.test/w780".to_string(),
            wikipedia_api_url: "http://wiki.test/w/api.php".to_string(),
            fetch_base_delay_ms: 0,
            ..Config::default()
        };
        PosterResolver::new(Arc::new(transport), &config)
    }

    fn lookup(title: &str, year: Option<&str>) -> MovieLookup {
        MovieLookup {
            title: title.to_string(),
            year: year.map(str::to_string),
            tmdb_search_query: None,
        }
    }

    fn is_tmdb(req: &HttpRequest) -> bool {
        req.url.starts_with("http://tmdb.test/3/search/movie")
    }

    fn is_wiki(req: &HttpRequest) -> bool {
        req.url.starts_with("http://wiki.test/w/api.php")
    }

    #[test]
    fn test_strip_trailing_year() {
        assert_eq!(strip_trailing_year("Amélie 2001"), "Amélie");
        assert_eq!(strip_trailing_year("Amélie"), "Amélie");
        assert_eq!(strip_trailing_year("  Heat   1995 "), "Heat");
        assert_eq!(strip_trailing_year("1917"), "1917");
        assert_eq!(strip_trailing_year("Apollo 13"), "Apollo 13");
        assert_eq!(strip_trailing_year("Room 20491"), "Room 20491");
    }

    #[tokio::test]
    async fn test_tmdb_hit_with_year() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_send()
            .times(1)
            .withf(|req| is_tmdb(req) && req.url.contains("year=2001") && req.url.contains("api_key=k"))
            .returning(|_| Ok(HttpResponse::new(200, AMELIE_TMDB)));

        let url = resolver(transport, Some("k"))
            .resolve(&lookup("Amélie", Some("2001")))
            .await;
        assert_eq!(url, Some("http://img.test/w780/amelie.jpg".to_string()));
    }

    #[tokio::test]
    async fn test_empty_result_triggers_one_yearless_retry() {
        let mut transport = MockHttpTransport::new();
        let mut seq = Sequence::new();
        transport
            .expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| is_tmdb(req) && req.url.contains("year=2001"))
            .returning(|_| Ok(HttpResponse::new(200, EMPTY_TMDB)));
        transport
            .expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| is_tmdb(req) && !req.url.contains("year="))
            .returning(|_| Ok(HttpResponse::new(200, AMELIE_TMDB)));

        let url = resolver(transport, Some("k"))
            .resolve(&lookup("Amélie", Some("2001")))
            .await;
        assert_eq!(url, Some("http://img.test/w780/amelie.jpg".to_string()));
    }

    #[tokio::test]
    async fn test_yearless_retry_then_wikipedia() {
        let mut transport = MockHttpTransport::new();
        let mut seq = Sequence::new();
        transport
            .expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| is_tmdb(req) && req.url.contains("year=2001"))
            .returning(|_| Ok(HttpResponse::new(200, EMPTY_TMDB)));
        transport
            .expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| is_tmdb(req) && !req.url.contains("year="))
            .returning(|_| Ok(HttpResponse::new(200, EMPTY_TMDB)));
        transport
            .expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| is_wiki(req) && req.url.contains("gsrsearch=Am%C3%A9lie+film"))
            .returning(|_| Ok(HttpResponse::new(200, AMELIE_WIKI)));

        let url = resolver(transport, Some("k"))
            .resolve(&lookup("Amélie", Some("2001")))
            .await;
        assert_eq!(url, Some("https://upload.test/amelie.jpg".to_string()));
    }

    #[tokio::test]
    async fn test_yearless_retry_strips_year_from_title() {
        let mut transport = MockHttpTransport::new();
        let mut seq = Sequence::new();
        transport
            .expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| is_tmdb(req) && req.url.contains("query=Am%C3%A9lie+2001"))
            .returning(|_| Ok(HttpResponse::new(200, EMPTY_TMDB)));
        transport
            .expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| is_tmdb(req) && req.url.contains("query=Am%C3%A9lie&"))
            .returning(|_| Ok(HttpResponse::new(200, AMELIE_TMDB)));

        let url = resolver(transport, Some("k"))
            .resolve(&lookup("Amélie 2001", Some("2001")))
            .await;
        assert!(url.is_some());
    }

    #[tokio::test]
    async fn test_no_year_skips_yearless_retry() {
        let mut transport = MockHttpTransport::new();
        let mut seq = Sequence::new();
        transport
            .expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| is_tmdb(req))
            .returning(|_| Ok(HttpResponse::new(200, r#"{"results":[{"poster_path":null}]}"#)));
        transport
            .expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| is_wiki(req))
            .returning(|_| Ok(HttpResponse::new(200, AMELIE_WIKI)));

        let url = resolver(transport, Some("k"))
            .resolve(&lookup("Amélie", None))
            .await;
        assert_eq!(url, Some("https://upload.test/amelie.jpg".to_string()));
    }

    #[tokio::test]
    async fn test_error_status_also_retries_without_year() {
        let mut transport = MockHttpTransport::new();
        let mut seq = Sequence::new();
        transport
            .expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| is_tmdb(req) && req.url.contains("year="))
            .returning(|_| Ok(HttpResponse::new(422, r#"{"errors":["bad year"]}"#)));
        transport
            .expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| is_tmdb(req) && !req.url.contains("year="))
            .returning(|_| Ok(HttpResponse::new(200, AMELIE_TMDB)));

        let url = resolver(transport, Some("k"))
            .resolve(&lookup("Amélie", Some("20O1")))
            .await;
        assert!(url.is_some());
    }

    #[tokio::test]
    async fn test_missing_key_goes_straight_to_wikipedia() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_send()
            .times(1)
            .withf(|req| is_wiki(req))
            .returning(|_| Ok(HttpResponse::new(200, AMELIE_WIKI)));

        let poster = resolver(transport, None);
        assert!(!poster.tmdb_configured());
        let url = poster.resolve(&lookup("Amélie", Some("2001"))).await;
        assert_eq!(url, Some("https://upload.test/amelie.jpg".to_string()));
    }

    #[tokio::test]
    async fn test_search_query_used_for_tmdb_title_for_wikipedia() {
        let mut transport = MockHttpTransport::new();
        let mut seq = Sequence::new();
        transport
            .expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| is_tmdb(req) && req.url.contains("query=Le+Fabuleux+Destin"))
            .returning(|_| Ok(HttpResponse::new(200, EMPTY_TMDB)));
        transport
            .expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| is_wiki(req) && req.url.contains("gsrsearch=Am%C3%A9lie+film"))
            .returning(|_| Ok(HttpResponse::new(200, r#"{"batchcomplete":""}"#)));

        let mut movie = lookup("Amélie", None);
        movie.tmdb_search_query = Some("Le Fabuleux Destin".to_string());

        let url = resolver(transport, Some("k")).resolve(&movie).await;
        assert_eq!(url, None);
    }

    #[tokio::test]
    async fn test_total_upstream_failure_is_none() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_send()
            .returning(|_| Err(TransportError::Network("connection refused".to_string())));

        let url = resolver(transport, Some("k"))
            .resolve(&lookup("Amélie", Some("2001")))
            .await;
        assert_eq!(url, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_tmdb_skips_yearless_retry() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_send()
            .times(3)
            .withf(|req| is_tmdb(req) && req.url.contains("year=2001"))
            .returning(|_| Err(TransportError::Network("connection reset".to_string())));
        transport
            .expect_send()
            .times(1)
            .withf(|req| is_wiki(req))
            .returning(|_| Ok(HttpResponse::new(200, AMELIE_WIKI)));

        let config = Config {
            tmdb_api_key: Some("k".to_string()),
            tmdb_api_url: "http://tmdb.test/3".to_string(),
            wikipedia_api_url: "http://wiki.test/w/api.php".to_string(),
            fetch_max_attempts: 3,
            fetch_base_delay_ms: 1000,
            ..Config::default()
        };
        let poster = PosterResolver::new(Arc::new(transport), &config);

        let start = tokio::time::Instant::now();
        let url = poster.resolve(&lookup("Amélie", Some("2001"))).await;

        assert_eq!(url, Some("https://upload.test/amelie.jpg".to_string()));
        // One backoff round only: 1s + 2s between the three TMDB attempts
        let elapsed = start.elapsed();
        assert!(elapsed >= std::time::Duration::from_millis(3000));
        assert!(elapsed < std::time::Duration::from_millis(4000));
    }

    #[tokio::test]
    async fn test_garbage_payloads_are_none() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_send()
            .returning(|_| Ok(HttpResponse::new(200, "<html>maintenance</html>")));

        let url = resolver(transport, Some("k"))
            .resolve(&lookup("Amélie", Some("2001")))
            .await;
        assert_eq!(url, None);
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_send()
            .times(2)
            .returning(|_| Ok(HttpResponse::new(200, AMELIE_TMDB)));

        let poster = resolver(transport, Some("k"));
        let movie = lookup("Amélie", Some("2001"));
        let first = poster.resolve(&movie).await;
        let second = poster.resolve(&movie).await;
        assert_eq!(first, second);
        assert!(first.is_some());
    }
}
