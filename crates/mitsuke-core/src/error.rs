use thiserror::Error;

#[derive(Debug, Error)]
pub enum MitsukeError {
    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a lookup ended without a result.
///
/// A lookup that simply finds nothing is not an error; see
/// [`MatchResult::NoMatch`](crate::resolver::MatchResult::NoMatch).
#[derive(Debug, Error)]
pub enum ResolveError<E> {
    /// The catalog client failed. Not retried by the resolver.
    #[error("catalog request failed: {0}")]
    Transport(#[source] E),

    /// The caller's cancellation token fired at a suspension point.
    #[error("lookup cancelled")]
    Cancelled,
}

impl<E> ResolveError<E> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
