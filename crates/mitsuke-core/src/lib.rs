pub mod attempt_log;
pub mod config;
pub mod error;
pub mod normalize;
pub mod rate_limit;
pub mod resolver;
pub mod words;

pub use config::AppConfig;
pub use error::{MitsukeError, ResolveError};
pub use normalize::TitleNormalizer;
pub use rate_limit::RateLimiter;
pub use resolver::{LookupRequest, MatchResolver, MatchResult, Stage};
