//! Trait definitions for remote anime catalogs.
//!
//! The matching core needs a first-hit title search, the same search
//! constrained to a release year, and a lookup by id. Manual identification
//! additionally lists every hit for a title. Catalog clients implement
//! [`SearchClient`] so the resolver stays catalog-agnostic.

use std::fmt;
use std::future::Future;

/// Opaque identifier of a record in the remote catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ExternalId(pub u64);

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ExternalId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(ExternalId)
    }
}

/// A catalog that can be searched by title and queried by id.
pub trait SearchClient: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Search by title and return the id of the first result, if any.
    fn search_first(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Option<ExternalId>, Self::Error>> + Send;

    /// Search by title, restricted to titles released in `year`.
    fn search_first_in_year(
        &self,
        query: &str,
        year: u32,
    ) -> impl Future<Output = Result<Option<ExternalId>, Self::Error>> + Send;

    /// Search by title and return every result, in catalog order.
    fn search(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Vec<SearchCandidate>, Self::Error>> + Send;

    /// Fetch the full record for `id`. `Ok(None)` means the catalog has no such record.
    fn fetch_by_id(
        &self,
        id: ExternalId,
    ) -> impl Future<Output = Result<Option<AnimeRecord>, Self::Error>> + Send;
}

/// Title variants of a catalog record.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RecordTitle {
    pub romaji: Option<String>,
    pub english: Option<String>,
    pub native: Option<String>,
}

impl RecordTitle {
    /// Romaji, then English, then native.
    pub fn preferred(&self) -> &str {
        self.romaji
            .as_deref()
            .or(self.english.as_deref())
            .or(self.native.as_deref())
            .unwrap_or_default()
    }
}

/// A full record fetched from the catalog.
///
/// Mapping this into host display objects is left to the host.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnimeRecord {
    pub id: ExternalId,
    pub title: RecordTitle,
    pub synonyms: Vec<String>,
    pub format: Option<String>,
    pub status: Option<String>,
    pub episodes: Option<u32>,
    pub duration: Option<u32>,
    pub season: Option<String>,
    pub year: Option<u32>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub genres: Vec<String>,
    pub studios: Vec<String>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub banner_url: Option<String>,
    pub mean_score: Option<f32>,
}

/// One entry of a multi-result search, enough for a user to pick from.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SearchCandidate {
    pub id: ExternalId,
    pub title: RecordTitle,
    pub year: Option<u32>,
    pub cover_url: Option<String>,
}

impl From<&AnimeRecord> for SearchCandidate {
    fn from(record: &AnimeRecord) -> Self {
        Self {
            id: record.id,
            title: record.title.clone(),
            year: record.year,
            cover_url: record.cover_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_id_parses_and_displays() {
        let id: ExternalId = " 154587 ".parse().unwrap();
        assert_eq!(id, ExternalId(154587));
        assert_eq!(id.to_string(), "154587");
        assert!("abc".parse::<ExternalId>().is_err());
    }

    #[test]
    fn preferred_title_falls_back() {
        let title = RecordTitle {
            romaji: None,
            english: Some("Frieren: Beyond Journey's End".into()),
            native: Some("葬送のフリーレン".into()),
        };
        assert_eq!(title.preferred(), "Frieren: Beyond Journey's End");
        assert_eq!(RecordTitle::default().preferred(), "");
    }
}
