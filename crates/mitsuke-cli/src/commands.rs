use std::sync::Arc;

use futures::future::join_all;
use mitsuke_api::anilist::{AniListClient, AniListError};
use mitsuke_api::AnimeRecord;
use mitsuke_core::normalize::release_year;
use mitsuke_core::resolver::{LookupRequest, MatchResolver, MatchResult, Stage};
use mitsuke_core::words::WordFilterSet;
use mitsuke_core::{AppConfig, MitsukeError, RateLimiter, ResolveError, TitleNormalizer};
use tokio_util::sync::CancellationToken;

use crate::cli::{
    Cli, Commands, ConfigArgs, FetchArgs, GlobalArgs, NormalizeArgs, ResolveArgs, SearchArgs,
};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] MitsukeError),

    #[error("{failed} of {total} lookups failed")]
    Lookups { failed: usize, total: usize },

    #[error("interrupted")]
    Cancelled,

    #[error("failed to render output: {0}")]
    Render(String),
}

type Resolver = MatchResolver<AniListClient>;

pub async fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(&cli.global)?;

    match cli.command {
        Commands::Normalize(args) => normalize(&config, &args),
        Commands::Resolve(args) => resolve(&config, &args).await,
        Commands::Fetch(args) => fetch(&config, &args).await,
        Commands::Search(args) => search(&config, &args).await,
        Commands::Config(args) => show_config(&cli.global, &config, &args),
    }
}

fn load_config(global: &GlobalArgs) -> Result<AppConfig, MitsukeError> {
    match &global.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    }
}

fn normalize(config: &AppConfig, args: &NormalizeArgs) -> Result<(), CliError> {
    let normalizer = TitleNormalizer::new(WordFilterSet::from_config(&config.matching));
    let max_partial = args
        .max_partial
        .unwrap_or(config.matching.max_partial_retries);

    for name in &args.names {
        let plan = normalizer.candidates(name, max_partial);
        println!("{name}");
        println!("  {:<10} {}", Stage::Real.to_string(), plan.real);
        println!("  {:<10} {}", Stage::Strict.to_string(), plan.strict);
        for (k, partial) in (1..).zip(&plan.partials) {
            println!("  {:<10} {partial}", Stage::Partial(k).to_string());
        }
        if let Some(year) = release_year(name) {
            println!("  {:<10} {year}", "year");
        }
    }
    Ok(())
}

fn build_resolver(config: &AppConfig) -> (Resolver, Arc<RateLimiter>) {
    let client = AniListClient::with_endpoint(config.anilist.endpoint.clone());
    let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));
    let resolver = MatchResolver::from_config(client, &config.matching, Arc::clone(&limiter));
    (resolver, limiter)
}

/// Cancel `token` on Ctrl-C. Abort the returned handle once work is done.
fn cancel_on_ctrl_c(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling pending lookups");
            token.cancel();
        }
    })
}

enum Outcome {
    Matched(MatchResult),
    Record(Option<AnimeRecord>),
}

async fn resolve(config: &AppConfig, args: &ResolveArgs) -> Result<(), CliError> {
    let requests: Vec<LookupRequest> = args
        .names
        .iter()
        .map(|name| {
            let mut request = LookupRequest::from_filename(name.as_str());
            if args.no_year {
                request.year = None;
            } else if args.year.is_some() {
                request.year = args.year;
            }
            request
        })
        .collect();

    run_lookups(config, &requests, args.fetch).await
}

async fn fetch(config: &AppConfig, args: &FetchArgs) -> Result<(), CliError> {
    let requests: Vec<LookupRequest> = args
        .ids
        .iter()
        .map(|&id| LookupRequest {
            name: id.to_string(),
            ..Default::default()
        }
        .with_provider_id(id))
        .collect();

    run_lookups(config, &requests, true).await
}

async fn search(config: &AppConfig, args: &SearchArgs) -> Result<(), CliError> {
    let (resolver, _) = build_resolver(config);
    let cancel = CancellationToken::new();
    let watcher = cancel_on_ctrl_c(cancel.clone());

    let request = LookupRequest {
        name: args.title.clone(),
        provider_id: args.id,
        year: None,
    };
    let result = resolver.identify(&request, &cancel).await;
    watcher.abort();

    let candidates = match result {
        Ok(candidates) => candidates,
        Err(ResolveError::Cancelled) => return Err(CliError::Cancelled),
        Err(err) => {
            eprintln!("{}: {err}", args.title);
            return Err(CliError::Lookups { failed: 1, total: 1 });
        }
    };

    if args.json {
        let rendered = serde_json::to_string_pretty(&candidates)
            .map_err(|e| CliError::Render(e.to_string()))?;
        println!("{rendered}");
        return Ok(());
    }
    for candidate in &candidates {
        let year = candidate.year.map_or_else(|| "-".to_string(), |y| y.to_string());
        println!("{}\t{year}\t{}", candidate.id, candidate.title.preferred());
    }
    Ok(())
}

async fn run_lookups(
    config: &AppConfig,
    requests: &[LookupRequest],
    with_record: bool,
) -> Result<(), CliError> {
    let (resolver, limiter) = build_resolver(config);
    let cancel = CancellationToken::new();
    let watcher = cancel_on_ctrl_c(cancel.clone());

    let outcomes = join_all(
        requests
            .iter()
            .map(|request| lookup_one(&resolver, request, with_record, &cancel)),
    )
    .await;
    watcher.abort();

    let stats = limiter.stats().await;
    tracing::debug!(
        total = stats.total_grants,
        delayed = stats.delayed_grants,
        "Rate limiter"
    );

    let mut failed = 0;
    for (request, outcome) in requests.iter().zip(outcomes) {
        match outcome {
            Ok(outcome) => print_outcome(request, &outcome)?,
            Err(ResolveError::Cancelled) => {}
            Err(err) => {
                failed += 1;
                eprintln!("{}: {err}", request.name);
            }
        }
    }

    if cancel.is_cancelled() {
        return Err(CliError::Cancelled);
    }
    if failed > 0 {
        return Err(CliError::Lookups {
            failed,
            total: requests.len(),
        });
    }
    Ok(())
}

async fn lookup_one(
    resolver: &Resolver,
    request: &LookupRequest,
    with_record: bool,
    cancel: &CancellationToken,
) -> Result<Outcome, ResolveError<AniListError>> {
    if with_record {
        return resolver.lookup(request, cancel).await.map(Outcome::Record);
    }
    let result = match request.year {
        Some(year) => resolver.resolve_with_year(&request.name, year, cancel).await?,
        None => resolver.resolve(&request.name, cancel).await?,
    };
    Ok(Outcome::Matched(result))
}

fn print_outcome(request: &LookupRequest, outcome: &Outcome) -> Result<(), CliError> {
    match outcome {
        Outcome::Matched(MatchResult::Matched { id, stage, query }) => {
            println!("{}\t{id}\t{stage}\t{query}", request.name);
        }
        Outcome::Matched(MatchResult::NoMatch) => {
            println!("{}\t-", request.name);
        }
        Outcome::Record(record) => {
            let value = serde_json::json!({ "name": request.name, "record": record });
            let rendered =
                serde_json::to_string_pretty(&value).map_err(|e| CliError::Render(e.to_string()))?;
            println!("{rendered}");
        }
    }
    Ok(())
}

fn show_config(global: &GlobalArgs, config: &AppConfig, args: &ConfigArgs) -> Result<(), CliError> {
    let path = global.config.clone().unwrap_or_else(AppConfig::config_path);

    if args.init && global.config.is_none() && !path.exists() {
        config.save()?;
        tracing::info!(path = %path.display(), "Wrote default config");
    }

    println!("# {}", path.display());
    if !path.exists() {
        println!("# not found, built-in defaults in effect");
    }
    let rendered = toml::to_string_pretty(config).map_err(|e| CliError::Render(e.to_string()))?;
    print!("{rendered}");
    Ok(())
}
