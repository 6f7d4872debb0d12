use serde::Deserialize;

use crate::traits::{AnimeRecord, ExternalId, RecordTitle, SearchCandidate};

// ── GraphQL response wrappers ────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GraphQLResponse<T> {
    pub data: T,
}

// ── Search query ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PageResponse {
    #[serde(rename = "Page")]
    pub page: PageData,
}

#[derive(Debug, Deserialize)]
pub struct PageData {
    pub media: Vec<SearchHit>,
}

/// The slim media shape returned by the search queries.
///
/// The first-hit query only asks for `id` and `title`.
#[derive(Debug, Deserialize)]
pub struct SearchHit {
    pub id: u64,
    pub title: Option<AniListTitle>,
    #[serde(rename = "coverImage")]
    pub cover_image: Option<CoverImage>,
    #[serde(rename = "startDate")]
    pub start_date: Option<FuzzyDate>,
}

// ── Media query ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MediaResponse {
    #[serde(rename = "Media")]
    pub media: Option<AniListMedia>,
}

#[derive(Debug, Deserialize)]
pub struct AniListMedia {
    pub id: u64,
    pub title: Option<AniListTitle>,
    pub synonyms: Option<Vec<String>>,
    pub format: Option<String>,
    pub status: Option<String>,
    pub episodes: Option<u32>,
    pub duration: Option<u32>,
    pub season: Option<String>,
    #[serde(rename = "seasonYear")]
    pub season_year: Option<u32>,
    #[serde(rename = "startDate")]
    pub start_date: Option<FuzzyDate>,
    #[serde(rename = "endDate")]
    pub end_date: Option<FuzzyDate>,
    pub genres: Option<Vec<String>>,
    pub studios: Option<StudioConnection>,
    pub description: Option<String>,
    #[serde(rename = "coverImage")]
    pub cover_image: Option<CoverImage>,
    #[serde(rename = "bannerImage")]
    pub banner_image: Option<String>,
    #[serde(rename = "meanScore")]
    pub mean_score: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct AniListTitle {
    pub romaji: Option<String>,
    pub english: Option<String>,
    pub native: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CoverImage {
    pub large: Option<String>,
    #[serde(rename = "extraLarge")]
    pub extra_large: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StudioConnection {
    pub nodes: Option<Vec<StudioNode>>,
}

#[derive(Debug, Deserialize)]
pub struct StudioNode {
    pub name: String,
    #[serde(rename = "isAnimationStudio")]
    pub is_animation_studio: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct FuzzyDate {
    pub year: Option<u32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

// ── Conversions ──────────────────────────────────────────────────

impl FuzzyDate {
    /// `YYYY`, `YYYY-MM` or `YYYY-MM-DD`, depending on which parts are known.
    pub fn to_string_opt(&self) -> Option<String> {
        let y = self.year?;
        Some(match (self.month, self.day) {
            (Some(m), Some(d)) => format!("{y:04}-{m:02}-{d:02}"),
            (Some(m), None) => format!("{y:04}-{m:02}"),
            (None, _) => format!("{y:04}"),
        })
    }
}

impl From<AniListTitle> for RecordTitle {
    fn from(t: AniListTitle) -> Self {
        RecordTitle {
            romaji: t.romaji,
            english: t.english,
            native: t.native,
        }
    }
}

fn capitalize_season(s: &str) -> String {
    match s {
        "WINTER" => "Winter".into(),
        "SPRING" => "Spring".into(),
        "SUMMER" => "Summer".into(),
        "FALL" => "Fall".into(),
        other => {
            let mut c = other.chars();
            match c.next() {
                Some(first) => first.to_uppercase().to_string() + &c.as_str().to_lowercase(),
                None => String::new(),
            }
        }
    }
}

impl SearchHit {
    pub fn external_id(&self) -> ExternalId {
        ExternalId(self.id)
    }

    pub fn into_candidate(self) -> SearchCandidate {
        SearchCandidate {
            id: ExternalId(self.id),
            title: self.title.map(RecordTitle::from).unwrap_or_default(),
            year: self.start_date.and_then(|d| d.year),
            cover_url: self.cover_image.and_then(|c| c.large.or(c.extra_large)),
        }
    }
}

impl AniListMedia {
    pub fn into_record(self) -> AnimeRecord {
        // Only animation studios; producers are listed in the same connection.
        let studios = self
            .studios
            .and_then(|s| s.nodes)
            .unwrap_or_default()
            .into_iter()
            .filter(|n| n.is_animation_studio.unwrap_or(true))
            .map(|n| n.name)
            .collect();

        AnimeRecord {
            id: ExternalId(self.id),
            title: self.title.map(RecordTitle::from).unwrap_or_default(),
            synonyms: self.synonyms.unwrap_or_default(),
            format: self.format.map(|f| f.to_lowercase()),
            status: self.status.as_deref().map(|s| s.to_lowercase()),
            episodes: self.episodes,
            duration: self.duration,
            season: self.season.as_deref().map(capitalize_season),
            year: self
                .season_year
                .or_else(|| self.start_date.as_ref().and_then(|d| d.year)),
            start_date: self.start_date.as_ref().and_then(FuzzyDate::to_string_opt),
            end_date: self.end_date.as_ref().and_then(FuzzyDate::to_string_opt),
            genres: self.genres.unwrap_or_default(),
            studios,
            description: self.description,
            cover_url: self
                .cover_image
                .and_then(|c| c.extra_large.or(c.large)),
            banner_url: self.banner_image,
            mean_score: self.mean_score.map(|s| s as f32 / 10.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_search_response() {
        let json = r#"{
            "data": {
                "Page": {
                    "media": [
                        {
                            "id": 154587,
                            "title": {
                                "romaji": "Sousou no Frieren",
                                "english": "Frieren: Beyond Journey's End",
                                "native": "葬送のフリーレン"
                            }
                        }
                    ]
                }
            }
        }"#;

        let resp: GraphQLResponse<PageResponse> = serde_json::from_str(json).unwrap();
        let hits = resp.data.page.media;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].external_id(), ExternalId(154587));
    }

    #[test]
    fn test_search_list_into_candidates() {
        let json = r#"{
            "data": {
                "Page": {
                    "media": [
                        {
                            "id": 21,
                            "title": { "romaji": "ONE PIECE", "english": "ONE PIECE", "native": null },
                            "coverImage": { "large": "https://img/21.jpg", "extraLarge": null },
                            "startDate": { "year": 1999, "month": 10, "day": 20 }
                        },
                        {
                            "id": 1253,
                            "title": { "romaji": "ONE PIECE: Taose! Kaizoku Ganzack" },
                            "coverImage": null,
                            "startDate": { "year": null, "month": null, "day": null }
                        }
                    ]
                }
            }
        }"#;

        let resp: GraphQLResponse<PageResponse> = serde_json::from_str(json).unwrap();
        let candidates: Vec<SearchCandidate> =
            resp.data.page.media.into_iter().map(SearchHit::into_candidate).collect();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].id, ExternalId(21));
        assert_eq!(candidates[0].year, Some(1999));
        assert_eq!(candidates[0].cover_url.as_deref(), Some("https://img/21.jpg"));
        assert_eq!(candidates[1].title.preferred(), "ONE PIECE: Taose! Kaizoku Ganzack");
        assert!(candidates[1].year.is_none());
        assert!(candidates[1].cover_url.is_none());
    }

    #[test]
    fn test_fuzzy_date_renders_known_parts_only() {
        let date = |year, month, day| FuzzyDate { year, month, day };
        assert_eq!(date(Some(2023), Some(9), Some(29)).to_string_opt().as_deref(), Some("2023-09-29"));
        assert_eq!(date(Some(2024), Some(3), None).to_string_opt().as_deref(), Some("2024-03"));
        assert_eq!(date(Some(2024), None, None).to_string_opt().as_deref(), Some("2024"));
        assert_eq!(date(Some(2024), None, Some(5)).to_string_opt().as_deref(), Some("2024"));
        assert_eq!(date(None, Some(3), Some(5)).to_string_opt(), None);
    }

    #[test]
    fn test_deserialize_empty_search() {
        let json = r#"{ "data": { "Page": { "media": [] } } }"#;
        let resp: GraphQLResponse<PageResponse> = serde_json::from_str(json).unwrap();
        assert!(resp.data.page.media.is_empty());
    }

    #[test]
    fn test_deserialize_media_response() {
        let json = r#"{
            "data": {
                "Media": {
                    "id": 154587,
                    "title": { "romaji": "Sousou no Frieren", "english": null, "native": "葬送のフリーレン" },
                    "synonyms": ["Frieren at the Funeral"],
                    "format": "TV",
                    "status": "FINISHED",
                    "episodes": 28,
                    "duration": 24,
                    "season": "FALL",
                    "seasonYear": 2023,
                    "startDate": { "year": 2023, "month": 9, "day": 29 },
                    "endDate": { "year": 2024, "month": 3, "day": null },
                    "genres": ["Adventure", "Drama", "Fantasy"],
                    "studios": { "nodes": [
                        { "name": "MADHOUSE", "isAnimationStudio": true },
                        { "name": "Aniplex", "isAnimationStudio": false }
                    ] },
                    "description": "After the party defeats the Demon King...",
                    "coverImage": { "large": "https://img/large.jpg", "extraLarge": "https://img/xl.jpg" },
                    "bannerImage": "https://img/banner.jpg",
                    "meanScore": 90
                }
            }
        }"#;

        let resp: GraphQLResponse<MediaResponse> = serde_json::from_str(json).unwrap();
        let record = resp.data.media.unwrap().into_record();
        assert_eq!(record.id, ExternalId(154587));
        assert_eq!(record.title.preferred(), "Sousou no Frieren");
        assert_eq!(record.format.as_deref(), Some("tv"));
        assert_eq!(record.season.as_deref(), Some("Fall"));
        assert_eq!(record.year, Some(2023));
        assert_eq!(record.start_date.as_deref(), Some("2023-09-29"));
        assert_eq!(record.end_date.as_deref(), Some("2024-03"));
        assert_eq!(record.studios, vec!["MADHOUSE".to_string()]);
        assert_eq!(record.cover_url.as_deref(), Some("https://img/xl.jpg"));
        assert_eq!(record.mean_score, Some(9.0));
    }

    #[test]
    fn test_deserialize_minimal_media() {
        let json = r#"{ "id": 1, "title": { "romaji": "Test" } }"#;
        let media: AniListMedia = serde_json::from_str(json).unwrap();
        let record = media.into_record();
        assert_eq!(record.id, ExternalId(1));
        assert_eq!(record.title.preferred(), "Test");
        assert!(record.cover_url.is_none());
        assert!(record.year.is_none());
        assert!(record.genres.is_empty());
    }

    #[test]
    fn test_year_falls_back_to_start_date() {
        let json = r#"{ "id": 2, "startDate": { "year": 1998 } }"#;
        let media: AniListMedia = serde_json::from_str(json).unwrap();
        assert_eq!(media.into_record().year, Some(1998));
    }
}
