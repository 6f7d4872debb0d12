//! Remote catalog access for mitsuke.
//!
//! [`traits::SearchClient`] is the capability the matching core consumes;
//! [`anilist::AniListClient`] is the AniList GraphQL implementation.

pub mod anilist;
pub mod traits;

pub use traits::{AnimeRecord, ExternalId, RecordTitle, SearchCandidate, SearchClient};
