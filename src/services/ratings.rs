/// OMDb review scores (IMDb, Rotten Tomatoes, Metacritic)
use std::sync::Arc;

use tracing::instrument;

use crate::{
    config::{credential, Config},
    models::{OmdbResponse, Ratings},
    services::fetch::{HttpRequest, HttpTransport},
};

/// Outcome of a single OMDb query
#[derive(Debug, PartialEq)]
enum Lookup {
    Found(Ratings),
    /// OMDb answered `"Response": "False"`
    NotFound(Option<String>),
    /// Network or payload problem; not worth a second query
    Failed,
}

pub struct RatingsResolver {
    transport: Arc<dyn HttpTransport>,
    omdb_api_key: Option<String>,
    omdb_api_url: String,
}

impl RatingsResolver {
    pub fn new(transport: Arc<dyn HttpTransport>, config: &Config) -> Self {
        Self {
            transport,
            omdb_api_key: credential(&config.omdb_api_key),
            omdb_api_url: config.omdb_api_url.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.omdb_api_key.is_some()
    }

    /// Look up ratings by title and year, retrying once by title alone when
    /// OMDb has no match for the pair. Never fails; a miss is `None`.
    #[instrument(skip(self))]
    pub async fn resolve(&self, title: &str, year: Option<&str>) -> Option<Ratings> {
        let Some(api_key) = self.omdb_api_key.as_deref() else {
            tracing::debug!("OMDB_API_KEY not configured, skipping ratings");
            return None;
        };

        let title = title.trim();
        if title.is_empty() {
            return None;
        }
        let year = year.map(str::trim).filter(|y| !y.is_empty());

        match self.lookup(api_key, title, year).await {
            Lookup::Found(ratings) => Some(ratings),
            Lookup::NotFound(reason) if year.is_some() => {
                tracing::info!(reason = ?reason, "No OMDb match with year, retrying by title only");
                match self.lookup(api_key, title, None).await {
                    Lookup::Found(ratings) => Some(ratings),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    async fn lookup(&self, api_key: &str, title: &str, year: Option<&str>) -> Lookup {
        let mut params = vec![("apikey", api_key), ("t", title)];
        if let Some(year) = year {
            params.push(("y", year));
        }

        let request = match HttpRequest::get(&self.omdb_api_url, &params) {
            Ok(request) => request,
            Err(e) => {
                tracing::error!(error = %e, "Could not build OMDb request");
                return Lookup::Failed;
            }
        };

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, "OMDb fetch error");
                return Lookup::Failed;
            }
        };

        // OMDb reports misses (and bad keys) in the body, whatever the status
        let data: OmdbResponse = match response.json() {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(
                    status = response.status,
                    error = %e,
                    "Failed to parse OMDb response"
                );
                return Lookup::Failed;
            }
        };

        if data.found() {
            Lookup::Found(Ratings::from(data))
        } else {
            Lookup::NotFound(data.error)
        }
    }
}
