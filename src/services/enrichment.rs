use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::{
    models::{EnrichedMovie, MovieLookup},
    services::{poster::PosterResolver, ratings::RatingsResolver},
};

/// Poster and ratings for one movie, looked up together
pub async fn enrich_one(
    posters: &PosterResolver,
    ratings: &RatingsResolver,
    item: &MovieLookup,
) -> EnrichedMovie {
    let (poster_url, ratings) = tokio::join!(
        posters.resolve(item),
        ratings.resolve(&item.title, item.year.as_deref())
    );

    EnrichedMovie {
        title: item.title.clone(),
        poster_url,
        ratings,
    }
}

/// Enrich many movies in parallel, at most `max_concurrency` at a time.
///
/// Results keep the input order. A task that dies yields an empty entry
/// rather than failing the batch.
pub async fn enrich_all(
    posters: Arc<PosterResolver>,
    ratings: Arc<RatingsResolver>,
    items: Vec<MovieLookup>,
    max_concurrency: usize,
) -> Vec<EnrichedMovie> {
    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut tasks = Vec::with_capacity(items.len());

    for item in items {
        let posters = posters.clone();
        let ratings = ratings.clone();
        let semaphore = semaphore.clone();
        let title = item.title.clone();

        let task = tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            enrich_one(&posters, &ratings, &item).await
        });
        tasks.push((title, task));
    }

    let mut results = Vec::with_capacity(tasks.len());
    let mut failed = 0;

    for (title, task) in tasks {
        match task.await {
            Ok(enriched) => results.push(enriched),
            Err(e) => {
                tracing::error!(title = %title, error = %e, "Enrichment task join error");
                failed += 1;
                results.push(EnrichedMovie {
                    title,
                    poster_url: None,
                    ratings: None,
                });
            }
        }
    }

    tracing::info!(count = results.len(), failed, "Batch enrichment completed");

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::Ratings;
    use crate::services::fetch::{HttpResponse, HttpTransport, MockHttpTransport};
    use serde_json::json;

    fn resolvers(transport: MockHttpTransport) -> (Arc<PosterResolver>, Arc<RatingsResolver>) {
        let config = Config {
            omdb_api_key: Some("k".to_string()),
            omdb_api_url: "http://omdb.test/".to_string(),
            wikipedia_api_url: "http://wiki.test/w/api.php".to_string(),
            fetch_base_delay_ms: 0,
            ..Config::default()
        };
        let transport: Arc<dyn HttpTransport> = Arc::new(transport);
        (
            Arc::new(PosterResolver::new(transport.clone(), &config)),
            Arc::new(RatingsResolver::new(transport, &config)),
        )
    }

    fn lookup(title: &str) -> MovieLookup {
        MovieLookup {
            title: title.to_string(),
            year: None,
            tmdb_search_query: None,
        }
    }

    /// Wikipedia echoes the request URL as the thumbnail; OMDb knows only "Heat"
    fn scripted_transport() -> MockHttpTransport {
        let mut transport = MockHttpTransport::new();
        transport.expect_send().returning(|req| {
            if req.url.starts_with("http://wiki.test") {
                let body = json!({
                    "query": { "pages": { "1": { "index": 1, "thumbnail": { "source": req.url } } } }
                });
                Ok(HttpResponse::new(200, body.to_string()))
            } else if req.url.contains("t=Heat") {
                Ok(HttpResponse::new(
                    200,
                    r#"{"Response":"True","imdbRating":"8.3","Metascore":"76","Ratings":[]}"#,
                ))
            } else {
                Ok(HttpResponse::new(200, r#"{"Response":"False","Error":"Movie not found!"}"#))
            }
        });
        transport
    }

    #[tokio::test]
    async fn test_enrich_one_combines_sources() {
        let (posters, ratings) = resolvers(scripted_transport());
        let enriched = enrich_one(&posters, &ratings, &lookup("Heat")).await;

        assert_eq!(enriched.title, "Heat");
        assert!(enriched.poster_url.unwrap().contains("gsrsearch=Heat+film"));
        assert_eq!(
            enriched.ratings,
            Some(Ratings {
                imdb: Some("8.3".to_string()),
                rotten_tomatoes: None,
                metacritic: Some("76".to_string()),
            })
        );
    }

    #[tokio::test]
    async fn test_enrich_all_preserves_order() {
        let (posters, ratings) = resolvers(scripted_transport());
        let items = vec![lookup("Drive"), lookup("Heat"), lookup("Thief")];

        let results = enrich_all(posters, ratings, items, 2).await;

        let titles: Vec<_> = results.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Drive", "Heat", "Thief"]);
        for result in &results {
            let expected = format!("gsrsearch={}+film", result.title);
            assert!(result.poster_url.as_deref().unwrap().contains(&expected));
        }
        assert!(results[0].ratings.is_none());
        assert!(results[1].ratings.is_some());
    }

    #[tokio::test]
    async fn test_enrich_all_empty_batch() {
        let (posters, ratings) = resolvers(MockHttpTransport::new());
        let results = enrich_all(posters, ratings, Vec::new(), 0).await;
        assert!(results.is_empty());
    }
}
