//! Filename → catalog id resolution.
//!
//! [`MatchResolver`] walks a fixed fallback sequence of search candidates
//! derived from one filename, stopping at the first hit:
//!
//! 1. the real name (full normalization pipeline);
//! 2. the strict name (real name minus ambiguous words);
//! 3. up to `max_partial_retries` partial names, each dropping one more
//!    trailing token.
//!
//! Every search waits on the shared [`RateLimiter`] first, and at most
//! `2 + max_partial_retries` searches are issued per lookup.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, PoisonError};

use mitsuke_api::{AnimeRecord, ExternalId, SearchCandidate, SearchClient};
use tokio_util::sync::CancellationToken;

use crate::attempt_log::SharedAttemptLog;
use crate::config::MatchingConfig;
use crate::error::ResolveError;
use crate::normalize::{partial_name, release_year, TitleNormalizer};
use crate::rate_limit::RateLimiter;

/// Partial retries used when none are configured.
const DEFAULT_MAX_PARTIAL_RETRIES: u32 = 1;

/// Which fallback candidate a search was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Real,
    Strict,
    /// The k-th partial retry, starting at 1.
    Partial(u32),
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Real => write!(f, "real"),
            Self::Strict => write!(f, "strict"),
            Self::Partial(k) => write!(f, "partial-{k}"),
        }
    }
}

/// Outcome of a lookup that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    /// The catalog returned a hit for `query` at `stage`.
    Matched {
        id: ExternalId,
        stage: Stage,
        query: String,
    },
    /// Every candidate was tried without a hit.
    NoMatch,
}

impl MatchResult {
    pub fn id(&self) -> Option<ExternalId> {
        match self {
            Self::Matched { id, .. } => Some(*id),
            Self::NoMatch => None,
        }
    }
}

/// Resolver state between searches. Private to one lookup.
#[derive(Debug)]
enum State {
    Init,
    TryReal(String),
    TryStrict { real: String },
    TryPartial { k: u32, previous: String },
    Resolved(MatchResult),
    Exhausted,
}

/// What the host knows about an item it wants metadata for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupRequest {
    /// Filename without extension or directory.
    pub name: String,
    /// A catalog id the host already stored for this item.
    pub provider_id: Option<ExternalId>,
    /// Release year to constrain searches with.
    pub year: Option<u32>,
}

impl LookupRequest {
    /// Build a request from a filename, picking up a bracketed release year.
    pub fn from_filename(name: impl Into<String>) -> Self {
        let name = name.into();
        let year = release_year(&name);
        Self {
            name,
            provider_id: None,
            year,
        }
    }

    pub fn with_provider_id(mut self, id: ExternalId) -> Self {
        self.provider_id = Some(id);
        self
    }
}

/// Matches raw filenames against a remote catalog.
pub struct MatchResolver<S> {
    client: S,
    normalizer: TitleNormalizer,
    limiter: Arc<RateLimiter>,
    max_partial_retries: u32,
    attempt_log: Option<SharedAttemptLog>,
}

impl<S: SearchClient> MatchResolver<S> {
    pub fn new(client: S, normalizer: TitleNormalizer, limiter: Arc<RateLimiter>) -> Self {
        Self {
            client,
            normalizer,
            limiter,
            max_partial_retries: DEFAULT_MAX_PARTIAL_RETRIES,
            attempt_log: None,
        }
    }

    /// Build a resolver with word lists and retry count taken from `config`.
    pub fn from_config(client: S, config: &MatchingConfig, limiter: Arc<RateLimiter>) -> Self {
        let normalizer = TitleNormalizer::new(crate::words::WordFilterSet::from_config(config));
        Self::new(client, normalizer, limiter).with_max_partial_retries(config.max_partial_retries)
    }

    pub fn with_max_partial_retries(mut self, max_partial_retries: u32) -> Self {
        self.max_partial_retries = max_partial_retries;
        self
    }

    /// Record every issued search into `log`.
    pub fn with_attempt_log(mut self, log: SharedAttemptLog) -> Self {
        self.attempt_log = Some(log);
        self
    }

    pub fn client(&self) -> &S {
        &self.client
    }

    pub fn normalizer(&self) -> &TitleNormalizer {
        &self.normalizer
    }

    pub fn max_partial_retries(&self) -> u32 {
        self.max_partial_retries
    }

    /// Upper bound on searches issued by one lookup.
    pub fn max_searches(&self) -> u32 {
        2 + self.max_partial_retries
    }

    /// Resolve a filename to a catalog id.
    #[tracing::instrument(name = "resolve", skip(self, cancel))]
    pub async fn resolve(
        &self,
        raw: &str,
        cancel: &CancellationToken,
    ) -> Result<MatchResult, ResolveError<S::Error>> {
        self.run(raw, None, cancel).await
    }

    /// Resolve a filename, constraining every search to `year`.
    #[tracing::instrument(name = "resolve", skip(self, cancel))]
    pub async fn resolve_with_year(
        &self,
        raw: &str,
        year: u32,
        cancel: &CancellationToken,
    ) -> Result<MatchResult, ResolveError<S::Error>> {
        self.run(raw, Some(year), cancel).await
    }

    /// Find and fetch the full record for a host item.
    ///
    /// A known provider id skips searching entirely. Otherwise the name is
    /// resolved (year-constrained if the request carries a year) and the
    /// matched record fetched. `Ok(None)` means nothing matched.
    pub async fn lookup(
        &self,
        request: &LookupRequest,
        cancel: &CancellationToken,
    ) -> Result<Option<AnimeRecord>, ResolveError<S::Error>> {
        let id = match request.provider_id {
            Some(id) => {
                tracing::debug!(%id, "Known provider id, skipping search");
                id
            }
            None => {
                let result = match request.year {
                    Some(year) => self.resolve_with_year(&request.name, year, cancel).await?,
                    None => self.resolve(&request.name, cancel).await?,
                };
                match result.id() {
                    Some(id) => id,
                    None => return Ok(None),
                }
            }
        };

        self.fetch(id, cancel).await
    }

    /// List every catalog entry a user could pick for a host item.
    ///
    /// The record behind a known provider id comes first, followed by every
    /// hit for the name as given (not normalized). Ids already listed are
    /// not repeated. Both requests go through the rate limiter.
    pub async fn identify(
        &self,
        request: &LookupRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchCandidate>, ResolveError<S::Error>> {
        let mut candidates = Vec::new();

        if let Some(id) = request.provider_id {
            if let Some(record) = self.fetch(id, cancel).await? {
                candidates.push(SearchCandidate::from(&record));
            }
        }

        let name = request.name.trim();
        if name.is_empty() {
            return Ok(candidates);
        }
        if cancel.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }
        cancellable(cancel, self.limiter.tick()).await?;

        tracing::info!(query = name, "Listing catalog matches");
        let hits = cancellable(cancel, self.client.search(name))
            .await?
            .map_err(ResolveError::Transport)?;
        for hit in hits {
            if !candidates.iter().any(|c| c.id == hit.id) {
                candidates.push(hit);
            }
        }
        Ok(candidates)
    }

    /// Rate-limited fetch of one record by id.
    pub async fn fetch(
        &self,
        id: ExternalId,
        cancel: &CancellationToken,
    ) -> Result<Option<AnimeRecord>, ResolveError<S::Error>> {
        if cancel.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }
        cancellable(cancel, self.limiter.tick()).await?;
        tracing::debug!(%id, "Fetching record");
        cancellable(cancel, self.client.fetch_by_id(id))
            .await?
            .map_err(ResolveError::Transport)
    }

    async fn run(
        &self,
        raw: &str,
        year: Option<u32>,
        cancel: &CancellationToken,
    ) -> Result<MatchResult, ResolveError<S::Error>> {
        let mut state = State::Init;

        loop {
            state = match state {
                State::Init => State::TryReal(self.normalizer.real_name(raw)),

                State::TryReal(real) => match self.search_stage(Stage::Real, &real, year, cancel).await? {
                    Some(id) => State::Resolved(matched(id, Stage::Real, real)),
                    None => State::TryStrict { real },
                },

                State::TryStrict { real } => {
                    let strict = self.normalizer.strict_name(&real);
                    let hit = if strict == real {
                        tracing::debug!("Strict name same as real name, not searching again");
                        None
                    } else {
                        self.search_stage(Stage::Strict, &strict, year, cancel).await?
                    };
                    match hit {
                        Some(id) => State::Resolved(matched(id, Stage::Strict, strict)),
                        // Partials start from the last candidate actually searched.
                        None if strict.is_empty() => State::TryPartial { k: 1, previous: real },
                        None => State::TryPartial { k: 1, previous: strict },
                    }
                }

                State::TryPartial { k, previous } => {
                    if k > self.max_partial_retries {
                        State::Exhausted
                    } else {
                        let partial = partial_name(&previous);
                        if partial == previous {
                            tracing::debug!(k, "Partial name cannot shrink further");
                            State::Exhausted
                        } else {
                            let stage = Stage::Partial(k);
                            match self.search_stage(stage, &partial, year, cancel).await? {
                                Some(id) => State::Resolved(matched(id, stage, partial)),
                                None => State::TryPartial {
                                    k: k + 1,
                                    previous: partial,
                                },
                            }
                        }
                    }
                }

                State::Resolved(result) => {
                    tracing::info!(?result, "Resolved");
                    return Ok(result);
                }

                State::Exhausted => {
                    tracing::info!("No match");
                    return Ok(MatchResult::NoMatch);
                }
            };
        }
    }

    /// One rate-limited search. Empty queries are never sent.
    async fn search_stage(
        &self,
        stage: Stage,
        query: &str,
        year: Option<u32>,
        cancel: &CancellationToken,
    ) -> Result<Option<ExternalId>, ResolveError<S::Error>> {
        if query.is_empty() {
            tracing::debug!(%stage, "Empty candidate, not searching");
            return Ok(None);
        }
        if cancel.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }

        cancellable(cancel, self.limiter.tick()).await?;

        tracing::info!(%stage, query, year = ?year, "Searching catalog");
        if let Some(log) = &self.attempt_log {
            log.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(stage, query, year);
        }

        let hit = match year {
            Some(year) => cancellable(cancel, self.client.search_first_in_year(query, year)).await?,
            None => cancellable(cancel, self.client.search_first(query)).await?,
        };
        hit.map_err(|e| {
            tracing::warn!(%stage, query, error = %e, "Catalog search failed");
            ResolveError::Transport(e)
        })
    }
}

fn matched(id: ExternalId, stage: Stage, query: String) -> MatchResult {
    MatchResult::Matched { id, stage, query }
}

/// Race `fut` against the cancellation token; cancellation wins ties.
async fn cancellable<T, E>(
    cancel: &CancellationToken,
    fut: impl Future<Output = T>,
) -> Result<T, ResolveError<E>> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ResolveError::Cancelled),
        value = fut => Ok(value),
    }
}
