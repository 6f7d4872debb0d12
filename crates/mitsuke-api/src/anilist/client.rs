use reqwest::Client;

use super::error::AniListError;
use super::types::{GraphQLResponse, MediaResponse, PageResponse};
use crate::traits::{AnimeRecord, ExternalId, SearchCandidate, SearchClient};

pub const API_URL: &str = "https://graphql.anilist.co";

const SEARCH_QUERY: &str = r#"
query ($search: String, $seasonYear: Int) {
    Page(perPage: 1) {
        media(search: $search, type: ANIME, seasonYear: $seasonYear) {
            id
            title { romaji english native }
        }
    }
}
"#;

/// Every hit on the first result page, for manual identification.
const SEARCH_LIST_QUERY: &str = r#"
query ($search: String) {
    Page {
        media(search: $search, type: ANIME) {
            id
            title { romaji english native }
            coverImage { large extraLarge }
            startDate { year month day }
        }
    }
}
"#;

const GET_ANIME_QUERY: &str = r#"
query ($id: Int) {
    Media(id: $id, type: ANIME) {
        id
        title { romaji english native }
        synonyms
        format
        status
        episodes
        duration
        season
        seasonYear
        startDate { year month day }
        endDate { year month day }
        genres
        studios { nodes { name isAnimationStudio } }
        description
        coverImage { large extraLarge }
        bannerImage
        meanScore
    }
}
"#;

/// AniList GraphQL API client.
///
/// Search and media queries are public, so no token is needed. The client
/// does no pacing of its own; callers go through the shared rate limiter.
pub struct AniListClient {
    endpoint: String,
    http: Client,
}

impl Default for AniListClient {
    fn default() -> Self {
        Self::new()
    }
}

impl AniListClient {
    pub fn new() -> Self {
        Self::with_endpoint(API_URL)
    }

    /// Point the client at a different GraphQL endpoint (mirrors, test servers).
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            http: Client::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn graphql_request<T: serde::de::DeserializeOwned>(
        &self,
        operation: &str,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, AniListError> {
        tracing::debug!(operation, "AniList GraphQL request");

        let resp = self
            .http
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(&serde_json::json!({
                "query": query,
                "variables": variables,
            }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let status_code = status.as_u16();
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(operation, status = status_code, "AniList API error");
            return Err(AniListError::Api {
                status: status_code,
                message: body,
            });
        }

        tracing::debug!(operation, status = %status, "AniList response received");
        resp.json::<T>()
            .await
            .map_err(|e| AniListError::Parse(e.to_string()))
    }

    async fn search_one(&self, query: &str, year: Option<u32>) -> Result<Option<ExternalId>, AniListError> {
        // AniList ignores null variables, so one query serves both variants.
        let resp: GraphQLResponse<PageResponse> = self
            .graphql_request(
                "Search",
                SEARCH_QUERY,
                serde_json::json!({ "search": query, "seasonYear": year }),
            )
            .await?;

        let hit = resp.data.page.media.into_iter().next();
        if let Some(hit) = &hit {
            tracing::debug!(
                query,
                id = hit.id,
                title = hit
                    .title
                    .as_ref()
                    .and_then(|t| t.romaji.as_deref())
                    .unwrap_or_default(),
                "AniList search hit"
            );
        }
        Ok(hit.map(|h| h.external_id()))
    }
}

impl SearchClient for AniListClient {
    type Error = AniListError;

    async fn search_first(&self, query: &str) -> Result<Option<ExternalId>, AniListError> {
        self.search_one(query, None).await
    }

    async fn search_first_in_year(
        &self,
        query: &str,
        year: u32,
    ) -> Result<Option<ExternalId>, AniListError> {
        self.search_one(query, Some(year)).await
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchCandidate>, AniListError> {
        let resp: GraphQLResponse<PageResponse> = self
            .graphql_request(
                "SearchList",
                SEARCH_LIST_QUERY,
                serde_json::json!({ "search": query }),
            )
            .await?;

        let candidates: Vec<SearchCandidate> = resp
            .data
            .page
            .media
            .into_iter()
            .map(|hit| hit.into_candidate())
            .collect();
        tracing::debug!(query, hits = candidates.len(), "AniList search list");
        Ok(candidates)
    }

    async fn fetch_by_id(&self, id: ExternalId) -> Result<Option<AnimeRecord>, AniListError> {
        let resp: Result<GraphQLResponse<MediaResponse>, _> = self
            .graphql_request(
                "GetAnime",
                GET_ANIME_QUERY,
                serde_json::json!({ "id": id.0 }),
            )
            .await;

        match resp {
            Ok(resp) => Ok(resp.data.media.map(|m| m.into_record())),
            // Unknown ids come back as 404 with a GraphQL error body.
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}
